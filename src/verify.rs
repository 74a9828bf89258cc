//! Block explorer source verification with a bounded retry budget.
//!
//! Verification never aborts a deployment: every path ends in a
//! [`VerificationReport`], and the caller decides what to do with a skip.

use alloy::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

use crate::chain::{wait_for_block, ChainClient};

pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Everything the explorer needs to rebuild and match a deployed contract.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    /// `path/To.sol:Contract`
    pub contract_name: String,
    /// Long solc version, e.g. `0.8.20+commit.a1b79de6`
    pub compiler_version: String,
    /// Standard JSON compiler input.
    pub source: Value,
    pub constructor_args: Bytes,
}

/// Outcome of a single verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyAttempt {
    Verified,
    AlreadyVerified,
    /// The explorer has not indexed the bytecode yet. Worth retrying.
    NotYetPropagated(String),
    Failed(String),
}

/// Final result after the retry budget is spent or a terminal answer arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationReport {
    Verified { attempts: u32, already: bool },
    Skipped { attempts: u32, reason: String },
}

impl VerificationReport {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Blocks to wait after deployment, and again after each propagation miss.
    pub confirmations: u64,
    /// Fixed pause between attempts.
    pub delay: Duration,
    pub poll_interval: Duration,
    /// Upper bound on any single confirmation wait.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            confirmations: 5,
            delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Verifier {
    async fn verify(&self, request: &VerificationRequest) -> VerifyAttempt;
}

/// Waits for confirmations past `deployed_at`, then verifies, retrying only
/// while the explorer reports the bytecode as not yet visible.
pub async fn verify_with_retry<C, V>(
    chain: &C,
    verifier: &V,
    request: &VerificationRequest,
    deployed_at: u64,
    policy: &RetryPolicy,
) -> VerificationReport
where
    C: ChainClient,
    V: Verifier,
{
    let mut target = deployed_at.saturating_add(policy.confirmations);
    let mut last_reason = String::from("no verification attempt made");

    for attempt in 1..=policy.attempts {
        let head = match timeout(
            policy.max_wait,
            wait_for_block(chain, target, policy.poll_interval),
        )
        .await
        {
            Ok(Ok(head)) => head,
            Ok(Err(e)) => {
                return VerificationReport::Skipped {
                    attempts: attempt - 1,
                    reason: format!("block polling failed: {e:#}"),
                }
            }
            Err(_) => {
                return VerificationReport::Skipped {
                    attempts: attempt - 1,
                    reason: format!("block {target} not reached within {:?}", policy.max_wait),
                }
            }
        };

        debug!(address = %request.address, attempt, head, "🔍 Verification attempt");
        match verifier.verify(request).await {
            VerifyAttempt::Verified => {
                info!(address = %request.address, attempt, "✅ Verified");
                return VerificationReport::Verified {
                    attempts: attempt,
                    already: false,
                };
            }
            VerifyAttempt::AlreadyVerified => {
                info!(address = %request.address, "✅ Already verified");
                return VerificationReport::Verified {
                    attempts: attempt,
                    already: true,
                };
            }
            VerifyAttempt::Failed(reason) => {
                warn!(address = %request.address, attempt, %reason, "❌ Verification failed");
                return VerificationReport::Skipped {
                    attempts: attempt,
                    reason,
                };
            }
            VerifyAttempt::NotYetPropagated(reason) => {
                warn!(address = %request.address, attempt, %reason, "⏳ Bytecode not visible yet");
                last_reason = reason;
                target = head.saturating_add(policy.confirmations);
                if attempt < policy.attempts {
                    sleep(policy.delay).await;
                }
            }
        }
    }

    VerificationReport::Skipped {
        attempts: policy.attempts,
        reason: last_reason,
    }
}

/// Maps explorer messages onto attempt outcomes.
pub fn classify(message: &str) -> VerifyAttempt {
    let lower = message.to_lowercase();
    if lower.contains("already verified") {
        VerifyAttempt::AlreadyVerified
    } else if lower.contains("unable to locate contractcode")
        || lower.contains("does not have bytecode")
    {
        VerifyAttempt::NotYetPropagated(message.to_string())
    } else if lower.contains("pass - verified") {
        VerifyAttempt::Verified
    } else {
        VerifyAttempt::Failed(message.to_string())
    }
}

/// Envelope of every Etherscan API answer.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

impl ApiResponse {
    fn ok(&self) -> bool {
        self.status == "1"
    }

    fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Null => self.message.clone(),
            other => other.to_string(),
        }
    }
}

/// The two explorer endpoints verification needs.
#[allow(async_fn_in_trait)]
pub trait ExplorerApi {
    /// `verifysourcecode`; a successful answer carries the GUID to poll.
    async fn submit(&self, request: &VerificationRequest) -> Result<ApiResponse>;

    /// `checkverifystatus` for a submitted GUID.
    async fn status(&self, guid: &str) -> Result<ApiResponse>;
}

/// Etherscan v2 multichain API over HTTP.
pub struct EtherscanClient {
    client: Client,
    api_url: String,
    api_key: String,
    chain_id: u64,
}

impl EtherscanClient {
    pub fn new(api_key: impl Into<String>, chain_id: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: ETHERSCAN_API_URL.to_string(),
            api_key: api_key.into(),
            chain_id,
        })
    }
}

impl ExplorerApi for EtherscanClient {
    async fn submit(&self, request: &VerificationRequest) -> Result<ApiResponse> {
        let source = serde_json::to_string(&request.source)?;
        let chain_id = self.chain_id.to_string();
        let address = request.address.to_string();
        let compiler = format!("v{}", request.compiler_version);
        let args = hex::encode(&request.constructor_args);

        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", compiler.as_str()),
            // Etherscan's parameter name is misspelled.
            ("constructorArguements", args.as_str()),
        ];

        self.client
            .post(&self.api_url)
            .query(&[("chainid", chain_id.as_str())])
            .form(&form)
            .send()
            .await
            .context("verification request failed")?
            .json::<ApiResponse>()
            .await
            .context("unexpected verification response")
    }

    async fn status(&self, guid: &str) -> Result<ApiResponse> {
        let chain_id = self.chain_id.to_string();
        self.client
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("status request failed")?
            .json::<ApiResponse>()
            .await
            .context("unexpected status response")
    }
}

/// Submits a verification, then polls its status until it leaves "Pending"
/// or the poll budget runs out.
pub struct EtherscanVerifier<A = EtherscanClient> {
    api: A,
    poll_interval: Duration,
    max_polls: u32,
}

impl EtherscanVerifier {
    pub fn new(api_key: impl Into<String>, chain_id: u64) -> Result<Self> {
        Ok(Self::with_api(EtherscanClient::new(api_key, chain_id)?))
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api.api_url = api_url.into();
        self
    }
}

impl<A: ExplorerApi> EtherscanVerifier<A> {
    pub fn with_api(api: A) -> Self {
        Self {
            api,
            poll_interval: Duration::from_secs(5),
            max_polls: 12,
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }
}

impl<A: ExplorerApi> Verifier for EtherscanVerifier<A> {
    async fn verify(&self, request: &VerificationRequest) -> VerifyAttempt {
        let submitted = match self.api.submit(request).await {
            Ok(response) => response,
            Err(e) => return VerifyAttempt::Failed(format!("{e:#}")),
        };
        if !submitted.ok() {
            return classify(&submitted.result_text());
        }

        let guid = submitted.result_text();
        debug!(%guid, "📨 Verification submitted");

        for _ in 0..self.max_polls {
            sleep(self.poll_interval).await;
            let status = match self.api.status(&guid).await {
                Ok(status) => status,
                Err(e) => return VerifyAttempt::Failed(format!("{e:#}")),
            };
            let text = status.result_text();
            if text.to_lowercase().contains("pending") {
                continue;
            }
            return classify(&text);
        }

        VerifyAttempt::Failed(format!("verification {guid} still pending"))
    }
}
