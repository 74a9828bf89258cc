//! `deployments/<network>/<Name>.json` records, one per deployed contract.

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::chain::Deployment;
use crate::config::Network;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub address: Address,
    pub transaction_hash: B256,
    pub block_number: u64,
    #[serde(default)]
    pub abi: Value,
    pub deployed_at: String,
}

impl DeploymentRecord {
    pub fn new(deployment: &Deployment, abi: Value) -> Self {
        Self {
            address: deployment.address,
            transaction_hash: deployment.tx_hash,
            block_number: deployment.block_number,
            abi,
            deployed_at: Local::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentStore {
    dir: PathBuf,
}

impl DeploymentStore {
    pub fn new(root: impl AsRef<Path>, network: Network) -> Self {
        Self {
            dir: root.as_ref().join(network.name()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, name: &str, record: &DeploymentRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path(name);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// `None` when the contract was never recorded on this network.
    pub fn load(&self, name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let record = serde_json::from_str(&data)
            .with_context(|| format!("malformed deployment record {}", path.display()))?;
        Ok(Some(record))
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DeploymentStore::new(tmp.path(), Network::Sepolia);
        assert!(store.load("Diamond").unwrap().is_none());

        let deployment = Deployment {
            address: Address::repeat_byte(7),
            tx_hash: B256::repeat_byte(9),
            block_number: 42,
        };
        let path = store
            .save("Diamond", &DeploymentRecord::new(&deployment, json!([])))
            .unwrap();
        assert!(path.ends_with("sepolia/Diamond.json"));

        let record = store.load("Diamond").unwrap().unwrap();
        assert_eq!(record.address, deployment.address);
        assert_eq!(record.block_number, 42);

        let raw: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert!(raw.get("transactionHash").is_some());
        assert!(raw.get("deployedAt").is_some());
    }
}
