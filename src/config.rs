//! Login configuration shared by the login and cleanup flows.

use crate::error::{Error, Result};
use azure_core::credentials::Secret;
use std::{fmt, path::PathBuf, str::FromStr};

pub const DEFAULT_ENVIRONMENT: &str = "azurecloud";
pub const AZURE_STACK: &str = "azurestack";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthType {
    #[default]
    ServicePrincipal,
    Identity,
}

impl FromStr for AuthType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SERVICE_PRINCIPAL" => Ok(Self::ServicePrincipal),
            "IDENTITY" => Ok(Self::Identity),
            _ => Err(Error::invalid_config(
                "'auth-type' should be either 'SERVICE_PRINCIPAL' or 'IDENTITY'.",
            )),
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ServicePrincipal => "SERVICE_PRINCIPAL",
            Self::Identity => "IDENTITY",
        })
    }
}

/// Parameters for one job's login.
///
/// Built once, then only read. Fields required by [`AuthType`] are checked by
/// [`LoginConfig::validate`].
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub auth_type: AuthType,
    pub service_principal_id: String,
    pub service_principal_secret: Option<Secret>,
    pub certificate_path: Option<PathBuf>,
    pub federated_token: Option<Secret>,
    pub tenant_id: String,
    pub subscription_id: String,
    pub environment: String,
    pub resource_manager_endpoint_url: Option<String>,
    pub allow_no_subscriptions: bool,
    pub enable_azps_session: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            auth_type: AuthType::default(),
            service_principal_id: String::new(),
            service_principal_secret: None,
            certificate_path: None,
            federated_token: None,
            tenant_id: String::new(),
            subscription_id: String::new(),
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            resource_manager_endpoint_url: None,
            allow_no_subscriptions: false,
            enable_azps_session: false,
        }
    }
}

/// The credential flow selected by a [`LoginConfig`].
#[derive(Debug, Clone, Copy)]
pub enum LoginMethod<'a> {
    ServicePrincipalSecret {
        client_id: &'a str,
        tenant_id: &'a str,
        secret: &'a Secret,
    },
    ServicePrincipalCertificate {
        client_id: &'a str,
        tenant_id: &'a str,
        certificate: &'a std::path::Path,
    },
    ServicePrincipalFederated {
        client_id: &'a str,
        tenant_id: &'a str,
        token: &'a Secret,
    },
    SystemAssignedIdentity,
    UserAssignedIdentity {
        client_id: &'a str,
    },
}

impl LoginMethod<'_> {
    /// Short description for diagnostics.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ServicePrincipalSecret { .. } => "service principal with secret",
            Self::ServicePrincipalCertificate { .. } => "service principal with certificate",
            Self::ServicePrincipalFederated { .. } => "OIDC",
            Self::SystemAssignedIdentity => "system-assigned managed identity",
            Self::UserAssignedIdentity { .. } => "user-assigned managed identity",
        }
    }
}

impl LoginConfig {
    pub fn validate(&self) -> Result<()> {
        if self.auth_type == AuthType::ServicePrincipal {
            if self.service_principal_id.is_empty() || self.tenant_id.is_empty() {
                return Err(Error::invalid_config(
                    "Using auth-type: SERVICE_PRINCIPAL. Not all values are present. Ensure 'client-id' and 'tenant-id' are supplied.",
                ));
            }
            if self.service_principal_secret.is_none()
                && self.certificate_path.is_none()
                && self.federated_token.is_none()
            {
                return Err(Error::invalid_config(
                    "Using auth-type: SERVICE_PRINCIPAL. A client secret, certificate or federated token is required.",
                ));
            }
        }

        if !self.allow_no_subscriptions && self.subscription_id.is_empty() {
            return Err(Error::invalid_config(
                "Ensure 'subscription-id' is supplied or 'allow-no-subscriptions' is 'true'.",
            ));
        }

        if self.is_azure_stack()
            && self
                .resource_manager_endpoint_url
                .as_deref()
                .is_none_or(str::is_empty)
        {
            return Err(Error::invalid_config(
                "resourceManagerEndpointUrl is a required parameter when environment is defined.",
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn is_azure_stack(&self) -> bool {
        self.environment == AZURE_STACK
    }

    /// Selects the credential flow. A secret wins over a certificate, which
    /// wins over a federated token.
    pub fn login_method(&self) -> Result<LoginMethod<'_>> {
        match self.auth_type {
            AuthType::Identity if self.service_principal_id.is_empty() => {
                Ok(LoginMethod::SystemAssignedIdentity)
            }
            AuthType::Identity => Ok(LoginMethod::UserAssignedIdentity {
                client_id: &self.service_principal_id,
            }),
            AuthType::ServicePrincipal => {
                let client_id = self.service_principal_id.as_str();
                let tenant_id = self.tenant_id.as_str();
                self.service_principal_secret
                    .as_ref()
                    .map(|secret| LoginMethod::ServicePrincipalSecret {
                        client_id,
                        tenant_id,
                        secret,
                    })
                    .or_else(|| {
                        self.certificate_path.as_deref().map(|certificate| {
                            LoginMethod::ServicePrincipalCertificate {
                                client_id,
                                tenant_id,
                                certificate,
                            }
                        })
                    })
                    .or_else(|| {
                        self.federated_token
                            .as_ref()
                            .map(|token| LoginMethod::ServicePrincipalFederated {
                                client_id,
                                tenant_id,
                                token,
                            })
                    })
                    .ok_or_else(|| {
                        Error::invalid_config(
                            "Using auth-type: SERVICE_PRINCIPAL. A client secret, certificate or federated token is required.",
                        )
                    })
            }
        }
    }
}
