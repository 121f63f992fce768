use std::env;

pub const AZURE_HTTP_USER_AGENT: &str = "AZURE_HTTP_USER_AGENT";
pub const AZUREPS_HOST_ENVIRONMENT: &str = "AZUREPS_HOST_ENVIRONMENT";

/// Diagnostic marker identifying calls made on behalf of the login action.
///
/// The values are passed to each child process instead of being written into
/// this process's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    http_user_agent: String,
    ps_host_environment: String,
}

impl UserAgent {
    /// Extends any user agent already configured for the job.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(
            env::var(AZURE_HTTP_USER_AGENT).ok().as_deref(),
            env::var(AZUREPS_HOST_ENVIRONMENT).ok().as_deref(),
        )
    }

    #[must_use]
    pub fn new(http_user_agent: Option<&str>, ps_host_environment: Option<&str>) -> Self {
        let marker = format!("GITHUBACTIONS/AzureLogin@{}", env!("CARGO_PKG_VERSION"));
        Self {
            http_user_agent: append(http_user_agent, &marker),
            ps_host_environment: append(ps_host_environment, &marker),
        }
    }

    /// Environment variables to set on child processes.
    #[must_use]
    pub fn vars(&self) -> Vec<(String, String)> {
        vec![
            (AZURE_HTTP_USER_AGENT.to_owned(), self.http_user_agent.clone()),
            (
                AZUREPS_HOST_ENVIRONMENT.to_owned(),
                self.ps_host_environment.clone(),
            ),
        ]
    }
}

fn append(existing: Option<&str>, marker: &str) -> String {
    match existing.map(str::trim) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix} {marker}"),
        _ => marker.to_owned(),
    }
}
