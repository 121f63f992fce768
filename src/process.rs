//! Running the external Azure tools.
//!
//! Everything that touches a child process goes through [`CommandRunner`] so
//! the login and cleanup flows can be driven by a recording double in tests.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::{
    env,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::{process::Command, time};
use tracing::{debug, trace};

/// A single external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// A log-safe rendering: the program name and its first argument only,
    /// since later arguments may carry secrets.
    #[must_use]
    pub fn display_name(&self) -> String {
        let program = self
            .program
            .file_stem()
            .map_or_else(|| self.program.to_string_lossy(), |stem| stem.to_string_lossy());
        match self.args.first() {
            Some(first) if !first.starts_with('-') => format!("{program} {first}"),
            _ => program.into_owned(),
        }
    }
}

/// Exit status and captured text of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The seam between the login flows and the operating system.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait CommandRunner: Send + Sync {
    /// Resolves `program` to an absolute path, failing if it is not installed.
    async fn which(&self, program: &str) -> Result<PathBuf>;

    /// Runs the command to completion and captures its output.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Runs the command and converts a non-zero exit into an error.
    async fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation).await?;
        if output.is_success() {
            return Ok(output);
        }
        Err(Error::NonZeroExit {
            command: invocation.display_name(),
            code: output.code,
            stderr: output.stderr.trim().to_owned(),
        })
    }
}

/// Runs commands with [`tokio::process`], searching `PATH` for executables.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl CommandRunner for SystemRunner {
    async fn which(&self, program: &str) -> Result<PathBuf> {
        let path = env::var_os("PATH").unwrap_or_default();
        find_in_path(program, &path)
            .inspect(|found| debug!("resolved {program} to {}", found.display()))
            .ok_or_else(|| Error::NotFound {
                program: program.to_owned(),
            })
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!("running {}", invocation.display_name());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| Error::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let wait = child.wait_with_output();
        let output = match self.timeout {
            Some(timeout) => time::timeout(timeout, wait)
                .await
                .map_err(|_| Error::Timeout {
                    program: invocation.program.clone(),
                    timeout,
                })?,
            None => wait.await,
        }
        .map_err(|source| Error::Wait {
            program: invocation.program.clone(),
            source,
        })?;

        let output = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!(
            "{} exited with {:?}",
            invocation.display_name(),
            output.code
        );
        Ok(output)
    }
}

fn find_in_path(program: &str, path: &OsStr) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    env::split_paths(path)
        .filter(|dir| dir.is_absolute())
        .flat_map(|dir| executable_names(program).map(move |name| dir.join(name)))
        .find(|full| is_executable(full))
}

fn executable_names(program: &str) -> impl Iterator<Item = String> + '_ {
    let extensions: &[&str] = if cfg!(windows) {
        &["", ".exe", ".cmd", ".bat"]
    } else {
        &[""]
    };
    extensions.iter().map(move |ext| format!("{program}{ext}"))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
