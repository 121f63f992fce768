//! Az PowerShell session login.
//!
//! The session is opened by running a generated script through `pwsh`. The
//! script always prints a JSON object: `{"Success": true}` or
//! `{"Error": "<message>"}`.

use crate::{
    config::{LoginConfig, LoginMethod},
    error::{Error, Result},
    process::{CommandRunner, Invocation},
    user_agent::UserAgent,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

pub const PWSH: &str = "pwsh";

pub const CLEAR_CONTEXT_SCRIPT: &str =
    "Clear-AzContext -Scope Process; Clear-AzContext -Scope CurrentUser -Force -ErrorAction SilentlyContinue";

/// Logs the Az PowerShell module in, mirroring the Azure CLI session.
pub struct AzPsLogin<'a, R: ?Sized> {
    config: &'a LoginConfig,
    runner: &'a R,
    user_agent: UserAgent,
}

impl<'a, R> AzPsLogin<'a, R>
where
    R: CommandRunner + ?Sized,
{
    #[must_use]
    pub fn new(config: &'a LoginConfig, runner: &'a R) -> Self {
        Self {
            config,
            runner,
            user_agent: UserAgent::from_env(),
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub async fn login(&self) -> Result<()> {
        info!("Running Azure PowerShell Login.");
        let pwsh = self.runner.which(PWSH).await?;

        let method = self.config.login_method()?;
        let script = login_script(self.config, &method)?;
        info!(
            "Attempting Azure PowerShell login by using {}...",
            method.describe()
        );

        let output = self
            .runner
            .run_checked(&self.invocation(&pwsh, &script))
            .await?;
        parse_script_result(&output.stdout)?;

        info!(
            "Azure PowerShell login succeeds by using {}.",
            method.describe()
        );
        Ok(())
    }

    fn invocation(&self, pwsh: &Path, script: &str) -> Invocation {
        powershell(pwsh, script).envs(self.user_agent.vars())
    }
}

/// `pwsh` invocation running `script` without a profile or prompts.
#[must_use]
pub fn powershell(pwsh: &Path, script: &str) -> Invocation {
    Invocation::new(pwsh).args([
        "-NoLogo",
        "-NoProfile",
        "-NonInteractive",
        "-Command",
        script,
    ])
}

/// Quotes `value` as a single-quoted PowerShell string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn param(command: &mut String, name: &str, value: Option<&str>) {
    command.push(' ');
    command.push_str(name);
    if let Some(value) = value {
        command.push(' ');
        command.push_str(&quote(value));
    }
}

/// Builds the `Connect-AzAccount` script for `method`.
pub fn login_script(config: &LoginConfig, method: &LoginMethod<'_>) -> Result<String> {
    let mut connect = String::from("Connect-AzAccount");

    match *method {
        LoginMethod::ServicePrincipalSecret {
            client_id,
            tenant_id,
            secret,
        } => {
            param(&mut connect, "-ServicePrincipal", None);
            param(&mut connect, "-Tenant", Some(tenant_id));
            connect.push_str(" -Credential (New-Object System.Management.Automation.PSCredential(");
            connect.push_str(&quote(client_id));
            connect.push_str(",(ConvertTo-SecureString ");
            connect.push_str(&quote(secret.secret()));
            connect.push_str(" -AsPlainText -Force)))");
        }
        LoginMethod::ServicePrincipalFederated {
            client_id,
            tenant_id,
            token,
        } => {
            param(&mut connect, "-ServicePrincipal", None);
            param(&mut connect, "-ApplicationId", Some(client_id));
            param(&mut connect, "-Tenant", Some(tenant_id));
            param(&mut connect, "-FederatedToken", Some(token.secret()));
        }
        LoginMethod::ServicePrincipalCertificate { .. } => {
            return Err(Error::Unsupported(
                "Certificate credentials are not supported for Azure PowerShell sessions."
                    .to_owned(),
            ));
        }
        LoginMethod::SystemAssignedIdentity => param(&mut connect, "-Identity", None),
        LoginMethod::UserAssignedIdentity { client_id } => {
            param(&mut connect, "-Identity", None);
            param(&mut connect, "-AccountId", Some(client_id));
        }
    }

    param(&mut connect, "-Environment", Some(config.environment.as_str()));
    if !config.allow_no_subscriptions && !config.subscription_id.is_empty() {
        param(&mut connect, "-Subscription", Some(config.subscription_id.as_str()));
    }

    debug!("generated Azure PowerShell login script");
    Ok(format!(
        "$ErrorActionPreference = 'Stop'; $WarningPreference = 'SilentlyContinue'; $output = @{{}}; \
         try {{ {CLEAR_CONTEXT_SCRIPT}; {connect} | Out-Null; $output['Success'] = $true }} \
         catch {{ $output['Error'] = $_.Exception.Message }} \
         return ConvertTo-Json $output -Compress"
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScriptResult {
    #[serde(default)]
    success: bool,
    error: Option<String>,
}

/// Interprets the JSON printed by a [`login_script`] run.
fn parse_script_result(stdout: &str) -> Result<()> {
    // the module may print banners ahead of the result
    let json = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .ok_or_else(|| Error::PowerShell("the login script produced no result".to_owned()))?;

    let result: ScriptResult = serde_json::from_str(json)
        .map_err(|err| Error::PowerShell(format!("unreadable login script result: {err}")))?;
    match result {
        ScriptResult {
            error: Some(message),
            ..
        } => Err(Error::PowerShell(message)),
        ScriptResult { success: true, .. } => Ok(()),
        ScriptResult { .. } => Err(Error::PowerShell(
            "the login script did not report success".to_owned(),
        )),
    }
}
