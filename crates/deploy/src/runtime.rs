//! Binds a configuration and a selected network to concrete clients, and runs
//! the common preamble of every task.

use alloy_core::primitives::{Address, U256, utils::format_ether};
use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};

use crate::{
    artifact::ContractArtifact,
    chain::{ChainClient, RpcChainClient},
    compile::Forge,
    config::{NetworkConfig, TasksConfig},
    explorer::EtherscanVerifier,
    signer::{resolve_deployer, resolve_signers},
    task::{DeployTask, DeploymentResult},
};

/// Switches for the optional steps of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Compile the project before deploying.
    pub compile: bool,
    /// Verify the deployed contract on the network's explorer.
    pub verify: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            compile: true,
            verify: true,
        }
    }
}

/// Balance of one configured account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub index: usize,
    pub address: Address,
    pub balance: U256,
}

/// Task runtime for one network.
#[derive(Debug, Clone)]
pub struct TaskRuntime {
    config: TasksConfig,
    network_name: String,
    network: NetworkConfig,
    options: RunOptions,
}

impl TaskRuntime {
    /// Select `network`, or the configured default network when `None`.
    pub fn new(config: TasksConfig, network: Option<String>, options: RunOptions) -> Result<Self> {
        let network_name = network.unwrap_or_else(|| config.default_network.clone());
        let network = config.network(&network_name)?.clone();

        Ok(Self {
            config,
            network_name,
            network,
            options,
        })
    }

    /// Name of the selected network.
    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    /// Compile the contract project.
    pub async fn compile(&self) -> Result<()> {
        Forge::new(self.config.project.clone()).build().await
    }

    async fn connect(&self) -> Result<(RpcChainClient, u64)> {
        let signer = resolve_deployer(&self.network.accounts)?;
        let chain = RpcChainClient::connect(self.network.rpc_url.clone(), signer);
        let chain_id = chain
            .check_chain_id(self.network.chain_id)
            .await
            .with_context(|| format!("Failed to connect to network '{}'", self.network_name))?;
        Ok((chain, chain_id))
    }

    fn verifier(&self, chain_id: u64) -> Result<Option<EtherscanVerifier>> {
        if !self.options.verify {
            return Ok(None);
        }

        let explorer = self.network.explorer.clone().with_context(|| {
            format!(
                "No explorer configured for network '{}'. Add [networks.{}.explorer] to the config or pass --no-verify",
                self.network_name, self.network_name
            )
        })?;

        EtherscanVerifier::new(explorer, chain_id, self.config.project.root.clone()).map(Some)
    }

    /// Compile, resolve the signer, log the task inputs, then deploy and verify.
    pub async fn run(&self, task: &DeployTask) -> Result<DeploymentResult> {
        if self.options.compile {
            self.compile().await?;
        }

        let (chain, chain_id) = self.connect().await?;
        log_signer_and_network(&chain, &self.network_name, chain_id).await?;
        task.log_task_args();

        let artifact = ContractArtifact::find(&self.config.project.out_dir(), &task.contract)?;
        let verifier = self.verifier(chain_id)?;

        task.execute(&chain, verifier.as_ref(), &artifact).await
    }

    /// Balances of every account configured for the network.
    pub async fn accounts(&self) -> Result<Vec<AccountBalance>> {
        let (chain, _) = self.connect().await?;

        let mut balances = Vec::new();
        for (index, signer) in resolve_signers(&self.network.accounts)?.iter().enumerate() {
            let address = signer.address();
            balances.push(AccountBalance {
                index,
                address,
                balance: chain.balance(address).await?,
            });
        }
        Ok(balances)
    }
}

/// Log the deploying signer with its balance, and the active network.
pub async fn log_signer_and_network<C: ChainClient>(
    chain: &C,
    network: &str,
    chain_id: u64,
) -> Result<U256> {
    let address = chain.signer_address();
    let balance = chain.balance(address).await?;

    tracing::info!(at = %address, eth = %format_ether(balance), "Signer");
    tracing::info!(name = network, chain_id, "Network");

    Ok(balance)
}

/// Render account balances as a table.
pub fn accounts_table(accounts: &[AccountBalance]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Address", "ETH"]);
    for account in accounts {
        table.add_row(vec![
            account.index.to_string(),
            account.address.to_string(),
            format_ether(account.balance),
        ]);
    }
    table
}
