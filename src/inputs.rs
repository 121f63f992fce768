//! Reads the job parameters handed to a GitHub Actions step.
//!
//! Inputs arrive as `INPUT_<NAME>` environment variables. Values are trimmed
//! and an empty value counts as unset.

use crate::{
    config::{DEFAULT_ENVIRONMENT, LoginConfig},
    error::{Error, Result},
};
use azure_core::credentials::Secret;
use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::PathBuf};
use tracing::{debug, info};

pub const FEDERATED_TOKEN_ENV: &str = "AZURE_FEDERATED_TOKEN";
pub const FEDERATED_TOKEN_FILE_ENV: &str = "AZURE_FEDERATED_TOKEN_FILE";

#[derive(Debug, Clone, Default)]
pub struct ActionInputs {
    vars: BTreeMap<String, String>,
}

impl ActionInputs {
    #[must_use]
    pub fn from_env() -> Self {
        env::vars().collect()
    }

    fn key(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }

    /// The trimmed value of input `name`, or `None` if unset or blank.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.var(&Self::key(name))
    }

    /// A raw environment variable, trimmed, with blank treated as unset.
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// True only when the input is `true`, ignoring case.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

impl FromIterator<(String, String)> for ActionInputs {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// The JSON blob accepted by the `creds` input.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Creds {
    client_id: Option<String>,
    client_secret: Option<String>,
    subscription_id: Option<String>,
    tenant_id: Option<String>,
    resource_manager_endpoint_url: Option<String>,
}

impl LoginConfig {
    /// Builds and validates the configuration from the step's inputs.
    pub fn from_inputs(inputs: &ActionInputs) -> Result<Self> {
        let owned = |name: &str| inputs.get(name).map(str::to_owned).unwrap_or_default();

        let mut config = Self {
            auth_type: inputs
                .get("auth-type")
                .unwrap_or("SERVICE_PRINCIPAL")
                .parse()?,
            service_principal_id: owned("client-id"),
            tenant_id: owned("tenant-id"),
            subscription_id: owned("subscription-id"),
            certificate_path: inputs.get("client-certificate").map(PathBuf::from),
            environment: inputs
                .get("environment")
                .unwrap_or(DEFAULT_ENVIRONMENT)
                .to_lowercase(),
            allow_no_subscriptions: inputs.flag("allow-no-subscriptions"),
            enable_azps_session: inputs.flag("enable-AzPSSession"),
            ..Self::default()
        };

        if let Some(creds) = inputs.get("creds") {
            config.read_creds(creds)?;
        }

        if config.service_principal_secret.is_none() && config.certificate_path.is_none() {
            config.federated_token = federated_token(inputs)?;
        }

        config.validate()?;
        debug!(
            auth_type = %config.auth_type,
            environment = %config.environment,
            "login configuration loaded"
        );
        Ok(config)
    }

    fn read_creds(&mut self, creds: &str) -> Result<()> {
        if !self.service_principal_id.is_empty()
            || !self.tenant_id.is_empty()
            || !self.subscription_id.is_empty()
        {
            info!(
                "At least one of the parameters 'client-id', 'subscription-id' or 'tenant-id' is set. 'creds' will be ignored."
            );
            return Ok(());
        }

        debug!("Reading credentials from 'creds'.");
        let creds: Creds = serde_json::from_str(creds).map_err(Error::Credentials)?;
        self.service_principal_id = creds.client_id.unwrap_or_default();
        self.service_principal_secret = creds
            .client_secret
            .filter(|secret| !secret.is_empty())
            .map(Secret::new);
        self.tenant_id = creds.tenant_id.unwrap_or_default();
        self.subscription_id = creds.subscription_id.unwrap_or_default();
        self.resource_manager_endpoint_url = creds.resource_manager_endpoint_url;
        Ok(())
    }
}

fn federated_token(inputs: &ActionInputs) -> Result<Option<Secret>> {
    if let Some(token) = inputs.var(FEDERATED_TOKEN_ENV) {
        return Ok(Some(Secret::new(token.to_owned())));
    }
    let Some(path) = inputs.var(FEDERATED_TOKEN_FILE_ENV) else {
        return Ok(None);
    };
    let path = PathBuf::from(path);
    let token = fs::read_to_string(&path).map_err(|source| Error::TokenFile {
        path: path.clone(),
        source,
    })?;
    debug!("read federated token from {}", path.display());
    Ok(Some(Secret::new(token.trim().to_owned())))
}
