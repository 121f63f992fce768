use azure_cli_login::{
    SystemRunner,
    azps::AzPsLogin,
    cleanup::cleanup,
    cli_login::AzureCliLogin,
    config::LoginConfig,
    inputs::ActionInputs,
};
use clap::{Parser, Subcommand};
use std::{process::ExitCode, time::Duration};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Kill any Azure tool invocation running longer than this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with the credentials described by the step's inputs
    Login,
    /// Remove cached credentials; never fails
    Cleanup,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runner = match cli.timeout {
        Some(secs) => SystemRunner::new().with_timeout(Duration::from_secs(secs)),
        None => SystemRunner::new(),
    };
    let inputs = ActionInputs::from_env();

    match cli.command {
        Command::Login => match login(&inputs, &runner).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!("Login failed with {}", err.chain());
                ExitCode::FAILURE
            }
        },
        Command::Cleanup => {
            cleanup(&runner, inputs.flag("enable-AzPSSession")).await;
            ExitCode::SUCCESS
        }
    }
}

async fn login(inputs: &ActionInputs, runner: &SystemRunner) -> azure_cli_login::Result<()> {
    let config = LoginConfig::from_inputs(inputs)?;
    AzureCliLogin::new(&config, runner).login().await?;
    if config.enable_azps_session {
        AzPsLogin::new(&config, runner).login().await?;
    }
    Ok(())
}
