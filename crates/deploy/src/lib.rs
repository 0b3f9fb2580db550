//! timelock-deploy - Deployment tasks for the TimeLock contracts.
//!
//! This crate compiles the contract project, deploys a named contract with its
//! constructor arguments from the network's signer, waits for confirmations and
//! publishes the sources on the network's block explorer.

pub mod artifact;
pub mod chain;
pub mod compile;
pub mod config;
pub mod explorer;
mod runtime;
mod signer;
mod task;
pub mod tasks;

pub use artifact::ContractArtifact;
pub use chain::{ChainClient, DeploymentReceipt, RpcChainClient};
pub use compile::Forge;
pub use config::{AccountsConfig, ExplorerConfig, NetworkConfig, ProjectConfig, TasksConfig};
pub use explorer::{
    EtherscanVerifier, VerificationOutcome, VerificationRequest, VerificationStatus, Verifier,
};
pub use runtime::{
    AccountBalance, RunOptions, TaskRuntime, accounts_table, log_signer_and_network,
};
pub use signer::{resolve_deployer, resolve_signers};
pub use task::{DeployTask, DeploymentResult};
