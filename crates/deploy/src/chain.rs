//! Chain access used by the deployment tasks.

use std::future::Future;

use alloy_core::primitives::{Address, Bytes, TxHash, U256};
use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_provider::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use url::Url;

/// A confirmed contract deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReceipt {
    /// Address of the created contract.
    pub address: Address,
    /// Hash of the deployment transaction.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
}

/// The operations the tasks need from a chain, bound to one signer.
pub trait ChainClient: Send + Sync {
    /// Address of the signer transactions are sent from.
    fn signer_address(&self) -> Address;

    /// Chain id reported by the node.
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Balance of an account, in wei.
    fn balance(&self, address: Address) -> impl Future<Output = Result<U256>> + Send;

    /// Submit a contract creation transaction and return its hash.
    fn send_deployment(&self, init_code: Bytes) -> impl Future<Output = Result<TxHash>> + Send;

    /// Wait until the transaction has the given number of confirmations.
    ///
    /// Fails if the transaction reverted or created no contract.
    fn wait_for_deployment(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
    ) -> impl Future<Output = Result<DeploymentReceipt>> + Send;
}

/// [`ChainClient`] over a JSON-RPC endpoint, signing with a local key.
#[derive(Clone)]
pub struct RpcChainClient {
    provider: DynProvider,
    signer: Address,
}

impl RpcChainClient {
    /// Connect to `rpc_url`, signing with `signer`.
    pub fn connect(rpc_url: Url, signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();

        Self {
            provider,
            signer: address,
        }
    }

    /// Fetch the chain id and check it against the configured one, if any.
    pub async fn check_chain_id(&self, expected: Option<u64>) -> Result<u64> {
        let chain_id = self.chain_id().await?;
        if let Some(expected) = expected {
            if expected != chain_id {
                anyhow::bail!(
                    "Configured chain id {} does not match the chain id {} reported by the node",
                    expected,
                    chain_id
                );
            }
        }
        Ok(chain_id)
    }
}

impl ChainClient for RpcChainClient {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .context("Failed to fetch chain id")
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .with_context(|| format!("Failed to fetch balance of {}", address))
    }

    async fn send_deployment(&self, init_code: Bytes) -> Result<TxHash> {
        let tx = TransactionRequest::default()
            .with_from(self.signer)
            .with_deploy_code(init_code);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("Failed to send deployment transaction")?;

        Ok(*pending.tx_hash())
    }

    async fn wait_for_deployment(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
    ) -> Result<DeploymentReceipt> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .with_context(|| format!("Failed to wait for deployment transaction {}", tx_hash))?;

        if !receipt.status() {
            anyhow::bail!("Deployment transaction {} reverted", tx_hash);
        }

        let address = receipt
            .contract_address()
            .with_context(|| format!("Transaction {} did not create a contract", tx_hash))?;

        Ok(DeploymentReceipt {
            address,
            tx_hash,
            block_number: receipt.block_number(),
        })
    }
}
