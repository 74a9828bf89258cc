use alloy::primitives::{address, Address};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use std::{env, path::PathBuf, str::FromStr};
use tokio::time::Duration;
use url::Url;

use crate::deployments::DeploymentStore;
use crate::verify::RetryPolicy;

/// Hardhat account #0, used when no deployer key is configured.
pub const HARDHAT_DEFAULT_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Where the first diamond lands on a fresh local Hardhat node.
pub const DEFAULT_DIAMOND_ADDRESS: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Local,
    Sepolia,
    Holesky,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Local => "local",
            Network::Sepolia => "sepolia",
            Network::Holesky => "holesky",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Local => 31337,
            Network::Sepolia => 11_155_111,
            Network::Holesky => 17000,
        }
    }

    /// Public networks have an explorer to verify against.
    pub fn is_live(&self) -> bool {
        !matches!(self, Network::Local)
    }

    fn rpc_var(&self) -> &'static str {
        match self {
            Network::Local => "LOCAL_PROVIDER_URL",
            Network::Sepolia => "SEPOLIA_PROVIDER_URL",
            Network::Holesky => "HOLESKY_PROVIDER_URL",
        }
    }

    fn default_rpc(&self) -> &'static str {
        match self {
            Network::Local => "http://127.0.0.1:8545",
            Network::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            Network::Holesky => "https://ethereum-holesky-rpc.publicnode.com",
        }
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "localhost" | "hardhat" => Ok(Network::Local),
            "sepolia" => Ok(Network::Sepolia),
            "holesky" => Ok(Network::Holesky),
            other => bail!("unknown network `{other}`"),
        }
    }
}

/// Script configuration, loaded from the environment (and `.env`).
#[derive(Clone)]
pub struct Config {
    pub network: Network,
    pub rpc_url: Url,
    pub signer: PrivateKeySigner,
    pub etherscan_api_key: Option<String>,
    pub artifacts_dir: PathBuf,
    pub deployments_dir: PathBuf,
    pub diamond_address: Option<Address>,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let network: Network = var("NETWORK")
            .unwrap_or_else(|| "local".to_string())
            .parse()
            .context("Invalid NETWORK")?;

        let rpc_str = var(network.rpc_var()).unwrap_or_else(|| network.default_rpc().to_string());
        let rpc_url = Url::parse(&rpc_str)
            .with_context(|| format!("Invalid {}='{}'", network.rpc_var(), rpc_str))?;

        let key = var("DEPLOYER_PRIVATE_KEY").unwrap_or_else(|| HARDHAT_DEFAULT_KEY.to_string());
        let signer = PrivateKeySigner::from_str(&key).context("Invalid DEPLOYER_PRIVATE_KEY")?;

        let diamond_address = var("DIAMOND_ADDRESS")
            .map(|s| Address::from_str(&s).with_context(|| format!("Invalid DIAMOND_ADDRESS='{s}'")))
            .transpose()?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            attempts: parse_or(&var, "VERIFY_ATTEMPTS", defaults.attempts)?,
            confirmations: parse_or(&var, "VERIFY_CONFIRMATIONS", defaults.confirmations)?,
            delay: Duration::from_secs(parse_or(
                &var,
                "VERIFY_RETRY_DELAY_SECS",
                defaults.delay.as_secs(),
            )?),
            ..defaults
        };

        Ok(Self {
            network,
            rpc_url,
            signer,
            etherscan_api_key: var("ETHERSCAN_API_KEY"),
            artifacts_dir: var("ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("artifacts")),
            deployments_dir: var("DEPLOYMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("deployments")),
            diamond_address,
            retry,
        })
    }

    /// Only live networks with an explorer key get verified.
    pub fn verification_enabled(&self) -> bool {
        self.network.is_live() && self.etherscan_api_key.is_some()
    }

    pub fn deployment_store(&self) -> DeploymentStore {
        DeploymentStore::new(&self.deployments_dir, self.network)
    }

    /// Diamond to operate on: the recorded deployment, then `DIAMOND_ADDRESS`,
    /// then the local Hardhat default.
    pub fn diamond_address(&self) -> Result<Address> {
        if let Some(record) = self.deployment_store().load("Diamond")? {
            return Ok(record.address);
        }
        Ok(self.diamond_address.unwrap_or(DEFAULT_DIAMOND_ADDRESS))
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key}='{raw}'")),
        None => Ok(default),
    }
}
