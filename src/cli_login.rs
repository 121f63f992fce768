//! Azure CLI login.

use crate::{
    config::{LoginConfig, LoginMethod},
    error::Result,
    process::{CommandRunner, Invocation},
    user_agent::UserAgent,
    version::{append_certificate, append_client_id, parse_cli_version},
};
use std::path::Path;
use tracing::{debug, info, warn};

pub const AZ: &str = "az";

const AZURE_STACK_CLOUD: &str = "AzureStack";
const AZURE_STACK_PROFILE: &str = "2019-03-01-hybrid";

/// Logs the Azure CLI in with the credential flow chosen by a [`LoginConfig`].
pub struct AzureCliLogin<'a, R: ?Sized> {
    config: &'a LoginConfig,
    runner: &'a R,
    user_agent: UserAgent,
    version: Option<String>,
}

impl<'a, R> AzureCliLogin<'a, R>
where
    R: CommandRunner + ?Sized,
{
    #[must_use]
    pub fn new(config: &'a LoginConfig, runner: &'a R) -> Self {
        Self {
            config,
            runner,
            user_agent: UserAgent::from_env(),
            version: None,
        }
    }

    /// Use `version` instead of asking the installed CLI.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub async fn login(&self) -> Result<()> {
        info!("Running Azure CLI Login.");
        let az = self.runner.which(AZ).await?;

        let version = match &self.version {
            Some(version) => version.clone(),
            None => self.query_version(&az).await?,
        };
        info!("Azure CLI version used: {version}");

        self.set_cloud(&az).await?;

        let method = self.config.login_method()?;
        info!("Attempting Azure CLI login by using {}...", method.describe());
        let args = login_args(self.config, &method, &version);
        self.run(
            Invocation::new(&az)
                .arg("login")
                .args(args)
                .args(["--output", "none"]),
        )
        .await?;

        if self.config.allow_no_subscriptions {
            debug!("subscription selection skipped: allow-no-subscriptions is set");
        } else {
            self.run(
                Invocation::new(&az).args([
                    "account",
                    "set",
                    "--subscription",
                    self.config.subscription_id.as_str(),
                ]),
            )
            .await?;
            info!("Subscription is set successfully.");
        }

        info!("Azure CLI login succeeds by using {}.", method.describe());
        Ok(())
    }

    async fn query_version(&self, az: &Path) -> Result<String> {
        let output = self
            .runner
            .run_checked(&self.invocation(Invocation::new(az).arg("--version")))
            .await?;
        Ok(parse_cli_version(&output.stdout).unwrap_or_else(|| {
            warn!("Unable to determine the Azure CLI version from `az --version`.");
            String::new()
        }))
    }

    async fn set_cloud(&self, az: &Path) -> Result<()> {
        if self.config.is_azure_stack() {
            self.register_azure_stack(az).await?;
        }
        self.run(Invocation::new(az).args([
            "cloud",
            "set",
            "-n",
            self.config.environment.as_str(),
        ]))
        .await?;
        info!("Done setting cloud: \"{}\"", self.config.environment);
        Ok(())
    }

    async fn register_azure_stack(&self, az: &Path) -> Result<()> {
        let endpoint = self
            .config
            .resource_manager_endpoint_url
            .as_deref()
            .unwrap_or_default();
        let (keyvault_suffix, storage_suffix) = azure_stack_suffixes(endpoint);

        // a stale registration from an earlier job is not an error
        let unregister = self.invocation(Invocation::new(az).args([
            "cloud",
            "unregister",
            "-n",
            AZURE_STACK_CLOUD,
        ]));
        match self.runner.run_checked(&unregister).await {
            Ok(_) => debug!("unregistered existing {AZURE_STACK_CLOUD} cloud"),
            Err(err) => debug!("no existing {AZURE_STACK_CLOUD} cloud to unregister: {err}"),
        }

        info!("Registering {AZURE_STACK_CLOUD} cloud for {endpoint}");
        self.run(
            Invocation::new(az).args([
                "cloud",
                "register",
                "-n",
                AZURE_STACK_CLOUD,
                "--endpoint-resource-manager",
                endpoint,
                "--suffix-keyvault-dns",
                keyvault_suffix.as_str(),
                "--suffix-storage-endpoint",
                storage_suffix.as_str(),
                "--profile",
                AZURE_STACK_PROFILE,
            ]),
        )
        .await
    }

    async fn run(&self, invocation: Invocation) -> Result<()> {
        self.runner
            .run_checked(&self.invocation(invocation))
            .await
            .map(|_| ())
    }

    fn invocation(&self, invocation: Invocation) -> Invocation {
        invocation.envs(self.user_agent.vars())
    }
}

/// Arguments following `az login` for `method`.
#[must_use]
pub fn login_args(config: &LoginConfig, method: &LoginMethod<'_>, version: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    match *method {
        LoginMethod::ServicePrincipalSecret {
            client_id,
            tenant_id,
            secret,
        } => {
            service_principal_args(&mut args, client_id, tenant_id);
            args.extend(["--password".to_owned(), secret.secret().to_owned()]);
        }
        LoginMethod::ServicePrincipalCertificate {
            client_id,
            tenant_id,
            certificate,
        } => {
            service_principal_args(&mut args, client_id, tenant_id);
            append_certificate(version, &certificate.to_string_lossy(), &mut args);
        }
        LoginMethod::ServicePrincipalFederated {
            client_id,
            tenant_id,
            token,
        } => {
            service_principal_args(&mut args, client_id, tenant_id);
            args.extend(["--federated-token".to_owned(), token.secret().to_owned()]);
        }
        LoginMethod::SystemAssignedIdentity => {
            args.push("--identity".to_owned());
        }
        LoginMethod::UserAssignedIdentity { client_id } => {
            args.push("--identity".to_owned());
            append_client_id(version, client_id, &mut args);
        }
    }
    if config.allow_no_subscriptions {
        args.push("--allow-no-subscriptions".to_owned());
    }
    args
}

fn service_principal_args(args: &mut Vec<String>, client_id: &str, tenant_id: &str) {
    args.extend(
        ["--service-principal", "--username", client_id, "--tenant", tenant_id]
            .map(str::to_owned),
    );
}

/// Key Vault and storage DNS suffixes derived from an Azure Stack
/// resource manager endpoint such as `https://management.local.azurestack.external`.
fn azure_stack_suffixes(endpoint: &str) -> (String, String) {
    let base = endpoint.trim_end_matches('/');
    let domain = base.split_once('.').map_or("", |(_, rest)| rest);
    (format!(".vault.{domain}"), domain.to_owned())
}
