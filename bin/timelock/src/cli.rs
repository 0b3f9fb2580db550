use std::{path::PathBuf, time::Duration};

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use timelock_deploy::{DeployTask, RunOptions, config::CONFIG_FILENAME};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "timelock")]
#[command(author, version, about = "Deploy and verify the TimeLock contracts")]
pub struct Cli {
    /// The verbosity level.
    #[arg(
        short,
        long,
        global = true,
        env = "TIMELOCK_VERBOSITY",
        default_value_t = LevelFilter::INFO
    )]
    pub verbosity: LevelFilter,

    /// The network to run against. Defaults to `default_network` from the config.
    #[arg(short, long, global = true, env = "TIMELOCK_NETWORK")]
    pub network: Option<String>,

    /// Path to the configuration file, or to a directory containing it.
    #[arg(
        long,
        alias = "conf",
        global = true,
        env = "TIMELOCK_CONFIG",
        default_value = CONFIG_FILENAME
    )]
    pub config: PathBuf,

    /// Skip compiling the contracts before deploying.
    #[arg(long, global = true, env = "TIMELOCK_NO_COMPILE")]
    pub no_compile: bool,

    /// Skip source verification on the block explorer.
    #[arg(long, global = true, env = "TIMELOCK_NO_VERIFY")]
    pub no_verify: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            compile: !self.no_compile,
            verify: !self.no_verify,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy TimeLock Contract.
    DeployTimelock(DeployArgs),

    /// Deploy TestTimeLock Contract against an existing TimeLock.
    #[command(name = "deploy-testTimelock", visible_alias = "deploy-test-timelock")]
    DeployTestTimelock {
        /// timelock address
        #[arg(long)]
        timelock: Address,

        #[command(flatten)]
        deploy: DeployArgs,
    },

    /// List the accounts configured for the network with their balances.
    Accounts,

    /// Compile the contracts.
    Compile,
}

/// Overrides shared by the deployment tasks.
#[derive(Debug, Clone, Default, Args)]
pub struct DeployArgs {
    /// Number of block confirmations to wait for before verifying.
    #[arg(long)]
    pub confirmations: Option<u64>,

    /// Seconds to wait after the confirmations before verifying.
    #[arg(long, value_name = "SECS")]
    pub verify_delay: Option<u64>,
}

impl DeployArgs {
    pub fn apply(&self, mut task: DeployTask) -> DeployTask {
        if let Some(confirmations) = self.confirmations {
            task = task.confirmations(confirmations);
        }
        if let Some(secs) = self.verify_delay {
            task = task.verify_delay(Duration::from_secs(secs));
        }
        task
    }
}
