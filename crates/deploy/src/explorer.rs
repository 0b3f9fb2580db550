//! Source verification on Etherscan-compatible block explorers.
//!
//! The flow mirrors what explorers expect from a standard-JSON submission:
//! check whether the address already has published source, submit
//! `verifysourcecode`, then poll `checkverifystatus` with the returned GUID.

use std::{future::Future, path::PathBuf, time::Duration};

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::Value;

use crate::{artifact::ContractArtifact, config::ExplorerConfig};

/// Timeout for a single explorer request. Submissions carry the full sources.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between verification status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum number of verification status checks.
pub const DEFAULT_MAX_POLLS: usize = 24;

/// What to verify.
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    /// Deployed contract address.
    pub address: Address,
    /// Artifact the contract was deployed from.
    pub artifact: &'a ContractArtifact,
    /// Constructor arguments, as given to the deployment.
    pub constructor_args: &'a [String],
    /// ABI encoding of `constructor_args`.
    pub encoded_args: &'a Bytes,
}

/// Result of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum VerificationOutcome {
    /// The explorer accepted the submitted source.
    Verified,
    /// The explorer already had source for this address.
    AlreadyVerified,
    /// Verification was not requested.
    Skipped,
}

/// Publishes contract sources to a block explorer.
pub trait Verifier: Send + Sync {
    fn verify<'a>(
        &'a self,
        request: VerificationRequest<'a>,
    ) -> impl Future<Output = Result<VerificationOutcome>> + Send + 'a;
}

/// Status reported by `checkverifystatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Verified,
    AlreadyVerified,
    Failed(String),
}

impl VerificationStatus {
    /// Classify the `result` string of a status response.
    pub fn from_result(result: &str) -> Self {
        let lower = result.to_lowercase();
        if lower.contains("pending in queue") || lower.contains("in progress") {
            Self::Pending
        } else if lower.contains("already verified") {
            Self::AlreadyVerified
        } else if lower.starts_with("pass") {
            Self::Verified
        } else {
            Self::Failed(result.to_string())
        }
    }
}

/// Outcome of a `verifysourcecode` submission.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Submission {
    Guid(String),
    AlreadyVerified,
}

/// Envelope shared by all Etherscan API responses.
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    result: Value,
}

impl EtherscanResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    fn result_str(&self) -> &str {
        self.result.as_str().unwrap_or_default()
    }

    fn error(&self, action: &str) -> anyhow::Error {
        anyhow::anyhow!(
            "Explorer {} failed: {} ({})",
            action,
            self.message,
            match &self.result {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        )
    }
}

#[derive(Debug)]
struct StillPending;

impl std::fmt::Display for StillPending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("verification still pending")
    }
}

impl std::error::Error for StillPending {}

/// Create an HTTP client for explorer requests.
pub fn create_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// [`Verifier`] speaking the Etherscan contract API (Etherscan v2, Blockscout, ...).
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    config: ExplorerConfig,
    chain_id: u64,
    project_root: PathBuf,
    poll_interval: Duration,
    max_polls: usize,
}

impl EtherscanVerifier {
    pub fn new(config: ExplorerConfig, chain_id: u64, project_root: PathBuf) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            config,
            chain_id,
            project_root,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// Override the status polling schedule.
    pub fn with_polling(mut self, interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Link to the contract's page on the explorer, if a browser URL is configured.
    pub fn contract_url(&self, address: Address) -> Option<String> {
        self.config.browser_url.as_ref().map(|url| {
            format!(
                "{}/address/{}#code",
                url.as_str().trim_end_matches('/'),
                address
            )
        })
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<EtherscanResponse> {
        let response = self
            .client
            .get(self.config.api_url.clone())
            .query(&[("chainid", self.chain_id.to_string())])
            .query(&[("apikey", self.config.api_key.as_str())])
            .query(params)
            .send()
            .await
            .context("Failed to send explorer request")?;

        response
            .json()
            .await
            .context("Failed to parse explorer response")
    }

    /// Whether the explorer already has source code for `address`.
    pub async fn is_verified(&self, address: Address) -> Result<bool> {
        let response = self
            .get(&[
                ("module", "contract".to_string()),
                ("action", "getsourcecode".to_string()),
                ("address", address.to_string()),
            ])
            .await?;

        parse_source_code_response(&response)
    }

    async fn submit(&self, request: &VerificationRequest<'_>) -> Result<Submission> {
        let artifact = request.artifact;
        let input = artifact.standard_json_input(&self.project_root)?;
        let source_code =
            serde_json::to_string(&input).context("Failed to serialize standard JSON input")?;

        let form = [
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("apikey", self.config.api_key.clone()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", source_code),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", artifact.fully_qualified_name()?),
            ("compilerversion", format!("v{}", artifact.compiler_version()?)),
            // The misspelling is part of the API.
            ("constructorArguements", hex::encode(request.encoded_args)),
        ];

        let response: EtherscanResponse = self
            .client
            .post(self.config.api_url.clone())
            .query(&[("chainid", self.chain_id.to_string())])
            .form(&form)
            .send()
            .await
            .context("Failed to send verification request")?
            .json()
            .await
            .context("Failed to parse verification response")?;

        parse_submit_response(&response)
    }

    /// Query the status of a submitted verification.
    pub async fn check_status(&self, guid: &str) -> Result<VerificationStatus> {
        let response = self
            .get(&[
                ("module", "contract".to_string()),
                ("action", "checkverifystatus".to_string()),
                ("guid", guid.to_string()),
            ])
            .await?;

        Ok(VerificationStatus::from_result(response.result_str()))
    }

    async fn wait_for_status(&self, guid: &str) -> Result<VerificationStatus> {
        let check = || async move {
            match self.check_status(guid).await? {
                VerificationStatus::Pending => Err(anyhow::Error::new(StillPending)),
                status => Ok(status),
            }
        };

        check
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(self.max_polls),
            )
            .when(|e: &anyhow::Error| e.is::<StillPending>())
            .notify(|_, delay: Duration| {
                tracing::debug!(guid, ?delay, "Verification pending, checking again...");
            })
            .await
            .with_context(|| format!("Verification {} did not complete", guid))
    }
}

impl Verifier for EtherscanVerifier {
    fn verify<'a>(
        &'a self,
        request: VerificationRequest<'a>,
    ) -> impl Future<Output = Result<VerificationOutcome>> + Send + 'a {
        async move {
            let address = request.address;

            if self.is_verified(address).await? {
                tracing::info!(%address, "Contract source already verified");
                return Ok(VerificationOutcome::AlreadyVerified);
            }

            tracing::info!(
                %address,
                contract = %request.artifact.name,
                constructor_args = ?request.constructor_args,
                "Submitting source for verification..."
            );

            let guid = match self.submit(&request).await? {
                Submission::Guid(guid) => guid,
                Submission::AlreadyVerified => {
                    tracing::info!(%address, "Contract source already verified");
                    return Ok(VerificationOutcome::AlreadyVerified);
                }
            };

            tracing::debug!(%guid, "Verification submitted");

            let outcome = match self.wait_for_status(&guid).await? {
                VerificationStatus::Verified => VerificationOutcome::Verified,
                VerificationStatus::AlreadyVerified => VerificationOutcome::AlreadyVerified,
                VerificationStatus::Failed(reason) => {
                    anyhow::bail!("Verification of {} failed: {}", address, reason)
                }
                VerificationStatus::Pending => {
                    anyhow::bail!("Verification of {} is still pending", address)
                }
            };

            match self.contract_url(address) {
                Some(url) => tracing::info!(%address, %url, "Contract verified"),
                None => tracing::info!(%address, "Contract verified"),
            }

            Ok(outcome)
        }
    }
}

fn parse_source_code_response(response: &EtherscanResponse) -> Result<bool> {
    if !response.is_ok() {
        return Err(response.error("getsourcecode"));
    }

    Ok(response
        .result
        .get(0)
        .and_then(|entry| entry.get("SourceCode"))
        .and_then(Value::as_str)
        .is_some_and(|source| !source.is_empty()))
}

fn parse_submit_response(response: &EtherscanResponse) -> Result<Submission> {
    if response.is_ok() {
        return Ok(Submission::Guid(response.result_str().to_string()));
    }

    if response
        .result_str()
        .to_lowercase()
        .contains("already verified")
    {
        return Ok(Submission::AlreadyVerified);
    }

    Err(response.error("verifysourcecode"))
}
