//! # Azure CLI Login
//!
//! `azure-cli-login` signs a CI job into Azure by driving the pre-installed
//! [Azure CLI](https://learn.microsoft.com/cli/azure/) and, optionally, the
//! [Az PowerShell](https://learn.microsoft.com/powershell/azure/) module. No
//! network calls are made from this crate; every cloud interaction happens
//! inside those tools.
//!
//! ## Modules
//!
//! - `config`: The login configuration and the credential flow it selects.
//! - `inputs`: Builds the configuration from GitHub Actions style `INPUT_*` variables.
//! - `version`: Adapts `az login` flags to the installed Azure CLI version.
//! - `cli_login`: Azure CLI login with service principals or managed identities.
//! - `azps`: Az PowerShell session login.
//! - `cleanup`: Best-effort removal of cached credentials at the end of a job.
//! - `process`: The [`CommandRunner`] seam used to run the external tools.
//!

#![forbid(unsafe_code)]
#![deny(
    clippy::indexing_slicing,
    clippy::manual_assert,
    clippy::panic,
    clippy::expect_used,
    clippy::unwrap_used
)]

pub mod azps;
pub mod cleanup;
pub mod cli_login;
pub mod config;
mod error;
pub mod inputs;
pub mod process;
pub mod user_agent;
pub mod version;

pub use error::{Error, Result};
pub use process::{CommandOutput, CommandRunner, Invocation, SystemRunner};
