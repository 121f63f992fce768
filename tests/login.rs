mod common;

use azure_cli_login::{
    CommandOutput, Error, Result,
    azps::AzPsLogin,
    cli_login::AzureCliLogin,
    config::{AuthType, LoginConfig},
    user_agent::UserAgent,
    version::append_client_id,
};
use azure_core::credentials::Secret;
use common::{RecordingRunner, capture_events};

const PARSE_WARNING: &str =
    "Failed to parse the minor version of Azure CLI. Assuming the version is less than 2.69.0";

fn identity_config() -> LoginConfig {
    LoginConfig {
        auth_type: AuthType::Identity,
        service_principal_id: "test-client-id".to_owned(),
        tenant_id: "test-tenant-id".to_owned(),
        subscription_id: "test-subscription-id".to_owned(),
        environment: "azurecloud".to_owned(),
        ..LoginConfig::default()
    }
}

fn user_agent() -> UserAgent {
    UserAgent::new(None, None)
}

fn login_command(runner: &RecordingRunner) -> Option<String> {
    runner
        .commands()
        .into_iter()
        .find(|command| command.starts_with("az login"))
}

#[test]
fn selector_scenarios() {
    for (version, expected) in [
        ("2.68.0", ["--identity", "--username", "test-client-id"]),
        ("2.69.0", ["--identity", "--client-id", "test-client-id"]),
        ("2", ["--identity", "--username", "test-client-id"]),
    ] {
        let mut args = vec!["--identity".to_owned()];
        append_client_id(version, "test-client-id", &mut args);
        assert_eq!(args, expected, "version {version:?}");
    }
}

#[test]
fn selector_warns_once_on_fallback() {
    for version in ["2", "invalid-version", "2.69-beta", ""] {
        let (warnings, _guard) = capture_events();
        let mut args = vec!["--identity".to_owned()];
        append_client_id(version, "test-client-id", &mut args);
        assert_eq!(args, ["--identity", "--username", "test-client-id"]);
        assert_eq!(warnings.messages(), [PARSE_WARNING], "version {version:?}");
    }
}

#[test]
fn selector_is_silent_for_numeric_versions() {
    for version in ["2.0.0", "2.68.0", "2.69.0", "2.100.0"] {
        let (warnings, _guard) = capture_events();
        let mut args = Vec::new();
        append_client_id(version, "test-client-id", &mut args);
        assert_eq!(args.len(), 2);
        assert_eq!(args[1], "test-client-id");
        assert_eq!(warnings.count(), 0, "version {version:?}");
    }
}

#[tokio::test]
async fn user_assigned_identity_uses_username_before_2_69() -> Result<()> {
    let config = identity_config();
    let runner = RecordingRunner::new();
    AzureCliLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .with_version("2.68.0")
        .login()
        .await?;

    assert_eq!(
        login_command(&runner).as_deref(),
        Some("az login --identity --username test-client-id --output none")
    );
    Ok(())
}

#[tokio::test]
async fn user_assigned_identity_uses_client_id_from_2_69() -> Result<()> {
    let config = identity_config();
    for version in ["2.69.0", "2.70.0", "2.100.0"] {
        let runner = RecordingRunner::new();
        AzureCliLogin::new(&config, &runner)
            .with_user_agent(user_agent())
            .with_version(version)
            .login()
            .await?;
        assert_eq!(
            login_command(&runner).as_deref(),
            Some("az login --identity --client-id test-client-id --output none"),
            "version {version}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn queried_version_drives_flag_selection() -> Result<()> {
    let config = identity_config();
    let runner = RecordingRunner::new().respond(
        "az",
        CommandOutput::success("azure-cli                         2.71.0\n\ncore   2.71.0\n"),
    );
    AzureCliLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .login()
        .await?;

    assert_eq!(
        runner.commands(),
        [
            "az --version",
            "az cloud set -n azurecloud",
            "az login --identity --client-id test-client-id --output none",
            "az account set --subscription test-subscription-id",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn system_assigned_identity_has_no_client_id() -> Result<()> {
    let mut config = identity_config();
    config.service_principal_id.clear();
    config.allow_no_subscriptions = true;
    let runner = RecordingRunner::new();
    AzureCliLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .with_version("2.69.0")
        .login()
        .await?;

    assert_eq!(
        runner.commands(),
        [
            "az cloud set -n azurecloud",
            "az login --identity --allow-no-subscriptions --output none",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn every_invocation_carries_the_user_agent() -> Result<()> {
    let config = identity_config();
    let runner = RecordingRunner::new();
    let agent = UserAgent::new(Some("custom/1.0"), None);
    AzureCliLogin::new(&config, &runner)
        .with_user_agent(agent.clone())
        .with_version("2.69.0")
        .login()
        .await?;

    let invocations = runner.invocations();
    assert!(!invocations.is_empty());
    assert!(invocations.iter().all(|invocation| invocation.env == agent.vars()));
    Ok(())
}

#[tokio::test]
async fn failed_login_propagates_without_selecting_subscription() {
    let config = identity_config();
    let runner = RecordingRunner::new().respond(
        "az login",
        CommandOutput::failure(1, "ERROR: No managed identity found\n"),
    );
    let result = AzureCliLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .with_version("2.69.0")
        .login()
        .await;

    assert!(matches!(
        result,
        Err(Error::NonZeroExit { code: Some(1), ref stderr, .. }) if stderr == "ERROR: No managed identity found"
    ));
    assert!(
        !runner
            .commands()
            .iter()
            .any(|command| command.starts_with("az account set"))
    );
}

#[tokio::test]
async fn missing_cli_is_an_error() {
    let config = identity_config();
    let runner = RecordingRunner::new().without("az");
    let result = AzureCliLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .login()
        .await;
    assert!(matches!(result, Err(Error::NotFound { .. })));
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn service_principal_secret_login() -> Result<()> {
    let config = LoginConfig {
        service_principal_id: "client".to_owned(),
        service_principal_secret: Some(Secret::new("s3cret")),
        tenant_id: "tenant".to_owned(),
        subscription_id: "subscription".to_owned(),
        ..LoginConfig::default()
    };
    let runner = RecordingRunner::new();
    AzureCliLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .with_version("2.69.0")
        .login()
        .await?;

    assert_eq!(
        login_command(&runner).as_deref(),
        Some(
            "az login --service-principal --username client --tenant tenant --password s3cret --output none"
        )
    );
    Ok(())
}

#[tokio::test]
async fn azure_stack_registers_cloud_first() -> Result<()> {
    let config = LoginConfig {
        service_principal_id: "client".to_owned(),
        federated_token: Some(Secret::new("jwt")),
        tenant_id: "tenant".to_owned(),
        subscription_id: "subscription".to_owned(),
        environment: "azurestack".to_owned(),
        resource_manager_endpoint_url: Some(
            "https://management.local.azurestack.external".to_owned(),
        ),
        ..LoginConfig::default()
    };
    let runner = RecordingRunner::new();
    AzureCliLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .with_version("2.69.0")
        .login()
        .await?;

    let commands = runner.commands();
    assert_eq!(commands[0], "az cloud unregister -n AzureStack");
    assert_eq!(
        commands[1],
        "az cloud register -n AzureStack --endpoint-resource-manager https://management.local.azurestack.external --suffix-keyvault-dns .vault.local.azurestack.external --suffix-storage-endpoint local.azurestack.external --profile 2019-03-01-hybrid"
    );
    assert_eq!(commands[2], "az cloud set -n azurestack");
    Ok(())
}

#[tokio::test]
async fn powershell_login_reports_script_errors() {
    let mut config = identity_config();
    config.enable_azps_session = true;
    let runner = RecordingRunner::new().respond(
        "pwsh",
        CommandOutput::success("{\"Error\":\"ManagedIdentityCredential authentication unavailable\"}\n"),
    );
    let result = AzPsLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .login()
        .await;
    assert!(matches!(result, Err(Error::PowerShell(_))));

    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].args[..4], ["-NoLogo", "-NoProfile", "-NonInteractive", "-Command"]);
    assert!(invocations[0].args[4].contains("-Identity -AccountId 'test-client-id'"));
}

#[tokio::test]
async fn powershell_login_succeeds() -> Result<()> {
    let mut config = identity_config();
    config.enable_azps_session = true;
    let runner =
        RecordingRunner::new().respond("pwsh", CommandOutput::success("{\"Success\":true}\n"));
    AzPsLogin::new(&config, &runner)
        .with_user_agent(user_agent())
        .login()
        .await
}
