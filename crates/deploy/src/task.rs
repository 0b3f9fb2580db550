//! The deploy-and-verify sequence shared by all tasks.

use std::time::Duration;

use alloy_core::primitives::{Address, TxHash};
use anyhow::{Context, Result};

use crate::{
    artifact::ContractArtifact,
    chain::ChainClient,
    explorer::{VerificationOutcome, VerificationRequest, Verifier},
};

/// A named contract deployment followed by source verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTask {
    /// Contract to deploy.
    pub contract: String,
    /// Constructor arguments, in order, as strings parsed against the constructor ABI.
    pub constructor_args: Vec<String>,
    /// Confirmations to wait for before verifying.
    pub confirmations: u64,
    /// Extra time given to the explorer to index the contract before verifying.
    pub verify_delay: Duration,
    /// Named task inputs, logged once the signer and network are known.
    pub task_args: Vec<(String, String)>,
}

/// Outcome of a [`DeployTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    /// Deployed contract address.
    pub address: Address,
    /// Hash of the deployment transaction.
    pub tx_hash: TxHash,
    /// Block the deployment was included in.
    pub block_number: Option<u64>,
    /// What happened on the explorer.
    pub verification: VerificationOutcome,
}

impl DeployTask {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            constructor_args: Vec::new(),
            confirmations: 1,
            verify_delay: Duration::ZERO,
            task_args: Vec::new(),
        }
    }

    pub fn constructor_args(mut self, args: Vec<String>) -> Self {
        self.constructor_args = args;
        self
    }

    pub fn confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }

    pub fn task_arg(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.task_args.push((name.into(), value.to_string()));
        self
    }

    /// Log the task inputs, if any.
    pub fn log_task_args(&self) {
        if self.task_args.is_empty() {
            return;
        }

        let args = self
            .task_args
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(task = %self.contract, %args, "Task args");
    }

    /// Deploy `artifact` with the task's constructor arguments, wait for the
    /// confirmations, then verify it.
    ///
    /// Verification is skipped when `verifier` is `None`. Any failure aborts the task.
    pub async fn execute<C, V>(
        &self,
        chain: &C,
        verifier: Option<&V>,
        artifact: &ContractArtifact,
    ) -> Result<DeploymentResult>
    where
        C: ChainClient,
        V: Verifier,
    {
        let encoded_args = artifact.encode_constructor_args(&self.constructor_args)?;
        let init_code = artifact.init_code(&encoded_args);

        tracing::info!(
            contract = %self.contract,
            from = %chain.signer_address(),
            constructor_args = ?self.constructor_args,
            "Deploying contract..."
        );

        let tx_hash = chain
            .send_deployment(init_code)
            .await
            .with_context(|| format!("Failed to deploy {}", self.contract))?;

        tracing::info!(contract = %self.contract, %tx_hash, "Deployment transaction sent");
        tracing::info!(
            confirmations = self.confirmations,
            "Waiting for confirmations..."
        );

        let receipt = chain
            .wait_for_deployment(tx_hash, self.confirmations)
            .await?;

        tracing::info!(
            contract = %self.contract,
            address = %receipt.address,
            block_number = ?receipt.block_number,
            "Contract deployed"
        );

        let verification = match verifier {
            Some(verifier) => {
                if !self.verify_delay.is_zero() {
                    tracing::info!(
                        delay_secs = self.verify_delay.as_secs(),
                        "Waiting before verification..."
                    );
                    tokio::time::sleep(self.verify_delay).await;
                }

                verifier
                    .verify(VerificationRequest {
                        address: receipt.address,
                        artifact,
                        constructor_args: &self.constructor_args,
                        encoded_args: &encoded_args,
                    })
                    .await
                    .with_context(|| {
                        format!("Failed to verify {} at {}", self.contract, receipt.address)
                    })?
            }
            None => {
                tracing::info!("Verification skipped");
                VerificationOutcome::Skipped
            }
        };

        Ok(DeploymentResult {
            address: receipt.address,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            verification,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::{
        future::Future,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use alloy_core::primitives::{Bytes, U256, address, b256};
    use tempdir::TempDir;
    use tokio::time::Instant;

    use crate::{artifact::tests::write_project, chain::DeploymentReceipt};

    pub(crate) const DEPLOYED: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    pub(crate) const TX_HASH: TxHash =
        b256!("0x1111111111111111111111111111111111111111111111111111111111111111");

    /// In-memory chain recording what it was asked to do.
    #[derive(Default)]
    pub(crate) struct MockChain {
        pub sent: Mutex<Vec<Bytes>>,
        pub waited: Mutex<Vec<(TxHash, u64)>>,
        pub confirmed_at: Mutex<Option<Instant>>,
        pub fail_send: bool,
        pub no_address: bool,
    }

    impl ChainClient for MockChain {
        fn signer_address(&self) -> Address {
            Address::repeat_byte(0xaa)
        }

        async fn chain_id(&self) -> Result<u64> {
            Ok(31337)
        }

        async fn balance(&self, _address: Address) -> Result<U256> {
            Ok(U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64)))
        }

        async fn send_deployment(&self, init_code: Bytes) -> Result<TxHash> {
            if self.fail_send {
                anyhow::bail!("insufficient funds for gas");
            }
            self.sent.lock().unwrap().push(init_code);
            Ok(TX_HASH)
        }

        async fn wait_for_deployment(
            &self,
            tx_hash: TxHash,
            confirmations: u64,
        ) -> Result<DeploymentReceipt> {
            self.waited.lock().unwrap().push((tx_hash, confirmations));
            *self.confirmed_at.lock().unwrap() = Some(Instant::now());
            if self.no_address {
                anyhow::bail!("Transaction {} did not create a contract", tx_hash);
            }
            Ok(DeploymentReceipt {
                address: DEPLOYED,
                tx_hash,
                block_number: Some(7),
            })
        }
    }

    /// Verifier recording the requests it received.
    #[derive(Default, Clone)]
    pub(crate) struct MockVerifier {
        pub calls: Arc<Mutex<Vec<(Address, Vec<String>, Bytes)>>>,
        pub attempts: Arc<AtomicUsize>,
        pub verified_at: Arc<Mutex<Option<Instant>>>,
        pub fail: bool,
    }

    impl Verifier for MockVerifier {
        fn verify<'a>(
            &'a self,
            request: VerificationRequest<'a>,
        ) -> impl Future<Output = Result<VerificationOutcome>> + Send + 'a {
            async move {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                *self.verified_at.lock().unwrap() = Some(Instant::now());
                if self.fail {
                    anyhow::bail!("Fail - Unable to verify");
                }
                self.calls.lock().unwrap().push((
                    request.address,
                    request.constructor_args.to_vec(),
                    request.encoded_args.clone(),
                ));
                Ok(VerificationOutcome::Verified)
            }
        }
    }

    fn address_input() -> serde_json::Value {
        serde_json::json!([{ "name": "timelock", "type": "address", "internalType": "address" }])
    }

    #[tokio::test]
    async fn test_deploys_then_verifies_with_same_args() {
        let dir = TempDir::new("timelock-task").unwrap();
        let path = write_project(dir.path(), "TestTimeLock", address_input());
        let artifact = ContractArtifact::load(&path, "TestTimeLock").unwrap();

        let timelock = Address::repeat_byte(0x42);
        let task = DeployTask::new("TestTimeLock")
            .constructor_args(vec![timelock.to_string()])
            .confirmations(5);

        let chain = MockChain::default();
        let verifier = MockVerifier::default();

        let result = task
            .execute(&chain, Some(&verifier), &artifact)
            .await
            .unwrap();

        assert_eq!(result.address, DEPLOYED);
        assert_eq!(result.tx_hash, TX_HASH);
        assert_eq!(result.block_number, Some(7));
        assert_eq!(result.verification, VerificationOutcome::Verified);

        // Deployed with bytecode followed by the encoded address.
        let sent = chain.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with(&artifact.bytecode));
        assert_eq!(&sent[0][sent[0].len() - 20..], timelock.as_slice());

        assert_eq!(*chain.waited.lock().unwrap(), vec![(TX_HASH, 5)]);

        let calls = verifier.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, DEPLOYED);
        assert_eq!(calls[0].1, vec![timelock.to_string()]);
        assert_eq!(calls[0].2.len(), 32);
    }

    #[tokio::test]
    async fn test_skip_verification() {
        let dir = TempDir::new("timelock-task").unwrap();
        let path = write_project(dir.path(), "TimeLock", serde_json::json!([]));
        let artifact = ContractArtifact::load(&path, "TimeLock").unwrap();

        let chain = MockChain::default();
        let result = DeployTask::new("TimeLock")
            .execute(&chain, None::<&MockVerifier>, &artifact)
            .await
            .unwrap();

        assert_eq!(result.verification, VerificationOutcome::Skipped);
        assert_eq!(chain.sent.lock().unwrap()[0], artifact.bytecode);
    }

    #[tokio::test]
    async fn test_deploy_failure_skips_verification() {
        let dir = TempDir::new("timelock-task").unwrap();
        let path = write_project(dir.path(), "TimeLock", serde_json::json!([]));
        let artifact = ContractArtifact::load(&path, "TimeLock").unwrap();

        let chain = MockChain {
            fail_send: true,
            ..MockChain::default()
        };
        let verifier = MockVerifier::default();

        let err = DeployTask::new("TimeLock")
            .execute(&chain, Some(&verifier), &artifact)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("insufficient funds"));
        assert!(chain.waited.lock().unwrap().is_empty());
        assert_eq!(verifier.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_contract_address_skips_verification() {
        let dir = TempDir::new("timelock-task").unwrap();
        let path = write_project(dir.path(), "TimeLock", serde_json::json!([]));
        let artifact = ContractArtifact::load(&path, "TimeLock").unwrap();

        let chain = MockChain {
            no_address: true,
            ..MockChain::default()
        };
        let verifier = MockVerifier::default();

        let err = DeployTask::new("TimeLock")
            .execute(&chain, Some(&verifier), &artifact)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("did not create a contract"));
        assert_eq!(verifier.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_verification_failure_propagates() {
        let dir = TempDir::new("timelock-task").unwrap();
        let path = write_project(dir.path(), "TimeLock", serde_json::json!([]));
        let artifact = ContractArtifact::load(&path, "TimeLock").unwrap();

        let chain = MockChain::default();
        let verifier = MockVerifier {
            fail: true,
            ..MockVerifier::default()
        };

        let err = DeployTask::new("TimeLock")
            .execute(&chain, Some(&verifier), &artifact)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to verify TimeLock"));
        assert_eq!(verifier.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bad_constructor_args_abort_before_sending() {
        let dir = TempDir::new("timelock-task").unwrap();
        let path = write_project(dir.path(), "TestTimeLock", address_input());
        let artifact = ContractArtifact::load(&path, "TestTimeLock").unwrap();

        let chain = MockChain::default();
        let err = DeployTask::new("TestTimeLock")
            .execute(&chain, None::<&MockVerifier>, &artifact)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("constructor argument"));
        assert!(chain.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_delay_before_verifying() {
        let dir = TempDir::new("timelock-task").unwrap();
        let path = write_project(dir.path(), "TimeLock", serde_json::json!([]));
        let artifact = ContractArtifact::load(&path, "TimeLock").unwrap();

        let chain = MockChain::default();
        let verifier = MockVerifier::default();

        DeployTask::new("TimeLock")
            .verify_delay(Duration::from_secs(60))
            .execute(&chain, Some(&verifier), &artifact)
            .await
            .unwrap();

        let confirmed_at = chain.confirmed_at.lock().unwrap().unwrap();
        let verified_at = verifier.verified_at.lock().unwrap().unwrap();
        assert!(verified_at.duration_since(confirmed_at) >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_without_verifier() {
        let dir = TempDir::new("timelock-task").unwrap();
        let path = write_project(dir.path(), "TimeLock", serde_json::json!([]));
        let artifact = ContractArtifact::load(&path, "TimeLock").unwrap();

        let chain = MockChain::default();
        let start = Instant::now();

        DeployTask::new("TimeLock")
            .verify_delay(Duration::from_secs(60))
            .execute(&chain, None::<&MockVerifier>, &artifact)
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
