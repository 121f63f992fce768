//! Azure CLI version handling.
//!
//! `az login` renamed a few flags over the 2.x line. Only the minor number is
//! consulted; every supported release shares major version 2.

use tracing::warn;

/// First release that accepts `--client-id` for user-assigned identities.
pub const CLIENT_ID_FLAG_MINOR: u32 = 69;

/// First release that accepts `--certificate` for service principals.
pub const CERTIFICATE_FLAG_MINOR: u32 = 67;

/// Extracts the minor component of a `major.minor.patch` version string.
///
/// Returns `None` when the second segment is missing or is not made up
/// entirely of ASCII digits (`"2"`, `"invalid-version"`, `"2.69-beta"`).
/// A numeric segment too large for `u32` saturates to `u32::MAX`.
#[must_use]
pub fn minor_version(version: &str) -> Option<u32> {
    let minor = version.split('.').nth(1)?;
    if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(minor.parse().unwrap_or(u32::MAX))
}

/// Appends the flag identifying a user-assigned managed identity.
///
/// Azure CLI 2.69.0 and later take `--client-id`; older releases take
/// `--username`. A version that cannot be parsed is treated as older.
pub fn append_client_id(version: &str, client_id: &str, args: &mut Vec<String>) {
    let flag = match minor_version(version) {
        Some(minor) if minor >= CLIENT_ID_FLAG_MINOR => "--client-id",
        Some(_) => "--username",
        None => {
            warn!(
                "Failed to parse the minor version of Azure CLI. Assuming the version is less than 2.69.0"
            );
            "--username"
        }
    };
    args.push(flag.to_owned());
    args.push(client_id.to_owned());
}

/// Appends the flag passing a service principal certificate.
///
/// Releases before 2.67.0 only read certificates through `--password`.
pub fn append_certificate(version: &str, certificate: &str, args: &mut Vec<String>) {
    let flag = match minor_version(version) {
        Some(minor) if minor >= CERTIFICATE_FLAG_MINOR => "--certificate",
        Some(_) => "--password",
        None => {
            warn!(
                "Failed to parse the minor version of Azure CLI. Assuming the version is less than 2.67.0"
            );
            "--password"
        }
    };
    args.push(flag.to_owned());
    args.push(certificate.to_owned());
}

/// Finds the `azure-cli` version in the output of `az --version`.
#[must_use]
pub fn parse_cli_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        if words.next()? != "azure-cli" {
            return None;
        }
        let version = words.next()?.trim_end_matches('*');
        version
            .starts_with(|c: char| c.is_ascii_digit())
            .then(|| version.to_owned())
    })
}
