//! End-of-job credential cleanup.
//!
//! Cleanup runs whether or not the login succeeded, and must never fail the
//! job: every error is downgraded to a warning.

use crate::{
    azps::{CLEAR_CONTEXT_SCRIPT, PWSH, powershell},
    cli_login::AZ,
    error::Result,
    process::{CommandRunner, Invocation},
    user_agent::UserAgent,
};
use tracing::{debug, info, warn};

/// Awaits `step`, logging any error as a warning instead of returning it.
///
/// Only crate [`Error`](crate::Error) values are absorbed; panics propagate.
pub async fn best_effort<F>(step: F)
where
    F: Future<Output = Result<()>>,
{
    if let Err(err) = step.await {
        warn!("Login cleanup failed with {err}. Cleanup will be skipped.");
        debug!(tool_failure = err.is_tool_failure(), "{}", err.chain());
    }
}

/// Removes cached Azure CLI accounts and, when `enable_azps_session` is set,
/// cached Az PowerShell contexts.
pub async fn cleanup<R>(runner: &R, enable_azps_session: bool)
where
    R: CommandRunner + ?Sized,
{
    cleanup_with_user_agent(runner, enable_azps_session, &UserAgent::from_env()).await;
}

pub async fn cleanup_with_user_agent<R>(
    runner: &R,
    enable_azps_session: bool,
    user_agent: &UserAgent,
) where
    R: CommandRunner + ?Sized,
{
    best_effort(async {
        cleanup_az_cli_accounts(runner, user_agent).await?;
        if enable_azps_session {
            cleanup_az_ps_accounts(runner, user_agent).await?;
        }
        Ok(())
    })
    .await;
}

pub async fn cleanup_az_cli_accounts<R>(runner: &R, user_agent: &UserAgent) -> Result<()>
where
    R: CommandRunner + ?Sized,
{
    info!("Clearing azure cli accounts from the local cache.");
    let az = runner.which(AZ).await?;
    let clear = Invocation::new(az)
        .args(["account", "clear"])
        .envs(user_agent.vars());
    runner.run_checked(&clear).await?;
    Ok(())
}

pub async fn cleanup_az_ps_accounts<R>(runner: &R, user_agent: &UserAgent) -> Result<()>
where
    R: CommandRunner + ?Sized,
{
    info!("Clearing azure powershell accounts from the local cache.");
    let pwsh = runner.which(PWSH).await?;
    let clear = powershell(&pwsh, CLEAR_CONTEXT_SCRIPT).envs(user_agent.vars());
    runner.run_checked(&clear).await?;
    Ok(())
}
