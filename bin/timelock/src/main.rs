//! timelock is a CLI tool to deploy the TimeLock contracts and verify them on a block explorer.

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use timelock_deploy::{TaskRuntime, TasksConfig, accounts_table, tasks};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = TasksConfig::load(&cli.config)?;
    let runtime = TaskRuntime::new(config, cli.network.clone(), cli.run_options())?;

    let task = match cli.command {
        Command::Compile => return runtime.compile().await,
        Command::Accounts => {
            let accounts = runtime.accounts().await?;
            println!("{}", accounts_table(&accounts));
            return Ok(());
        }
        Command::DeployTimelock(args) => args.apply(tasks::deploy_timelock()),
        Command::DeployTestTimelock { timelock, deploy } => {
            deploy.apply(tasks::deploy_test_timelock(timelock))
        }
    };

    let result = runtime.run(&task).await?;

    tracing::info!(
        contract = %task.contract,
        address = %result.address,
        tx_hash = %result.tx_hash,
        network = runtime.network_name(),
        verification = %result.verification,
        "✓ Task complete!"
    );

    Ok(())
}
