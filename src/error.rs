use std::{path::PathBuf, time::Duration};

/// Errors raised while logging in to, or cleaning up after, the Azure tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to locate executable file: {program}")]
    NotFound { program: String },

    #[error("`{}` could not be spawned", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{}`", .program.display())]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{}` exceeded timeout of {timeout:?}", .program.display())]
    Timeout { program: PathBuf, timeout: Duration },

    #[error(
        "`{command}` exited with {}: {stderr}",
        .code.map_or_else(|| "a signal".to_owned(), |code| format!("code {code}"))
    )]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{0}")]
    InvalidConfig(String),

    #[error("unable to parse 'creds'")]
    Credentials(#[source] serde_json::Error),

    #[error("unable to read federated token from {}", .path.display())]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Azure PowerShell login failed: {0}")]
    PowerShell(String),

    #[error("{0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true when the failure came from running an external tool rather
    /// than from the configuration handed to this crate.
    #[must_use]
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Spawn { .. }
                | Self::Wait { .. }
                | Self::Timeout { .. }
                | Self::NonZeroExit { .. }
                | Self::PowerShell(_)
        )
    }

    /// Renders the error followed by each of its sources, one per line.
    #[must_use]
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            rendered.push_str("\ncaused by: ");
            rendered.push_str(&err.to_string());
            source = err.source();
        }
        rendered
    }
}

pub type Result<T> = std::result::Result<T, Error>;
