//! Hardhat build artifacts: ABI and creation bytecode per contract, plus the
//! build-info compiler input used for explorer verification.

use alloy::primitives::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ArtifactError;
use crate::selectors::FacetAbi;

const BUILD_INFO_DIR: &str = "build-info";

#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: FacetAbi,
    /// The `abi` array as it appears in the artifact, kept for deployment records.
    pub abi_json: Value,
    pub bytecode: Bytes,
    path: PathBuf,
}

impl ContractArtifact {
    /// An artifact that was not read from disk, e.g. one compiled elsewhere.
    /// It has no build-info to verify against.
    pub fn in_memory(
        contract_name: impl Into<String>,
        source_name: impl Into<String>,
        abi_json: Value,
        bytecode: Bytes,
    ) -> Result<Self, ArtifactError> {
        let contract_name = contract_name.into();
        let abi = FacetAbi::from_json(contract_name.clone(), &abi_json)?;
        Ok(Self {
            contract_name,
            source_name: source_name.into(),
            abi,
            abi_json,
            bytecode,
            path: PathBuf::new(),
        })
    }

    /// e.g. `src/contracts/facets/CounterFacet.sol:CounterFacet`
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Creation code followed by the ABI-encoded constructor arguments.
    pub fn deploy_code(&self, constructor_args: &[u8]) -> Bytes {
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(constructor_args);
        code.into()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Compiler version and standard JSON input a contract was built from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    pub input: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: String,
    source_name: String,
    #[serde(default)]
    abi: Value,
    #[serde(default)]
    bytecode: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

/// The `artifacts/` directory of a Hardhat project.
#[derive(Clone, Debug)]
pub struct Artifacts {
    dir: PathBuf,
}

impl Artifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self, name: &str) -> Result<ContractArtifact, ArtifactError> {
        let path = self.locate(name)?;
        let raw: RawArtifact = read_json(&path)?;

        let abi = FacetAbi::from_json(raw.contract_name.clone(), &raw.abi)?;

        let hex_code = raw.bytecode.trim_start_matches("0x");
        if hex_code.is_empty() {
            return Err(ArtifactError::NoBytecode {
                name: name.to_string(),
            });
        }
        let bytecode = hex::decode(hex_code).map_err(|_| ArtifactError::BadBytecode {
            name: name.to_string(),
        })?;

        Ok(ContractArtifact {
            contract_name: raw.contract_name,
            source_name: raw.source_name,
            abi,
            abi_json: raw.abi,
            bytecode: bytecode.into(),
            path,
        })
    }

    /// Follows `<Name>.dbg.json` next to the artifact to its build-info file.
    pub fn build_info(&self, artifact: &ContractArtifact) -> Result<BuildInfo, ArtifactError> {
        let dbg_path = artifact
            .path
            .with_file_name(format!("{}.dbg.json", artifact.contract_name));
        let dbg: DebugFile = read_json(&dbg_path)?;

        let base = dbg_path.parent().unwrap_or(&self.dir);
        read_json(&base.join(dbg.build_info))
    }

    fn locate(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let file_name = format!("{name}.json");
        let mut found = Vec::new();
        collect_matches(&self.dir, &file_name, &mut found)?;

        match found.len() {
            0 => Err(ArtifactError::NotFound {
                name: name.to_string(),
                dir: self.dir.clone(),
            }),
            1 => Ok(found.remove(0)),
            _ => Err(ArtifactError::Ambiguous {
                name: name.to_string(),
                paths: found,
            }),
        }
    }
}

fn collect_matches(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<(), ArtifactError> {
    let entries = fs::read_dir(dir).map_err(|source| ArtifactError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == BUILD_INFO_DIR) {
                continue;
            }
            collect_matches(&path, file_name, found)?;
        } else if path.file_name().is_some_and(|n| n == file_name) {
            found.push(path);
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let data = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SelectorError;
    use serde_json::json;

    fn write(path: &Path, value: &Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn counter_artifact(source: &str) -> Value {
        json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "CounterFacet",
            "sourceName": source,
            "abi": [
                { "type": "function", "name": "getCount", "inputs": [],
                  "outputs": [{ "name": "", "type": "uint256" }], "stateMutability": "view" },
                { "type": "function", "name": "increment", "inputs": [], "outputs": [],
                  "stateMutability": "nonpayable" }
            ],
            "bytecode": "0x6080604052",
            "deployedBytecode": "0x6080"
        })
    }

    #[test]
    fn test_load_nested_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("src/contracts/facets/CounterFacet.sol");
        write(&dir.join("CounterFacet.json"), &counter_artifact("src/contracts/facets/CounterFacet.sol"));

        let artifact = Artifacts::new(tmp.path()).load("CounterFacet").unwrap();
        assert_eq!(artifact.abi.functions().len(), 2);
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(
            artifact.fully_qualified_name(),
            "src/contracts/facets/CounterFacet.sol:CounterFacet"
        );
        assert_eq!(artifact.deploy_code(&[0xaa]).len(), 6);
    }

    #[test]
    fn test_missing_and_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::new(tmp.path());
        assert!(matches!(
            artifacts.load("CounterFacet"),
            Err(ArtifactError::NotFound { .. })
        ));

        write(&tmp.path().join("a/CounterFacet.json"), &counter_artifact("a.sol"));
        write(&tmp.path().join("b/CounterFacet.json"), &counter_artifact("b.sol"));
        assert!(matches!(
            artifacts.load("CounterFacet"),
            Err(ArtifactError::Ambiguous { .. })
        ));
    }

    #[test]
    fn test_interface_has_no_bytecode() {
        let tmp = tempfile::tempdir().unwrap();
        let mut raw = counter_artifact("IDiamondCut.sol");
        raw["bytecode"] = json!("0x");
        write(&tmp.path().join("IDiamondCut.sol/CounterFacet.json"), &raw);

        let err = Artifacts::new(tmp.path()).load("CounterFacet").unwrap_err();
        assert!(matches!(err, ArtifactError::NoBytecode { .. }));
    }

    #[test]
    fn test_artifact_without_abi() {
        let tmp = tempfile::tempdir().unwrap();
        let mut raw = counter_artifact("X.sol");
        raw.as_object_mut().unwrap().remove("abi");
        write(&tmp.path().join("X.sol/CounterFacet.json"), &raw);

        let err = Artifacts::new(tmp.path()).load("CounterFacet").unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Selector(SelectorError::MissingAbi { .. })
        ));
    }

    #[test]
    fn test_artifact_with_empty_abi() {
        let tmp = tempfile::tempdir().unwrap();
        let mut raw = counter_artifact("X.sol");
        raw["abi"] = json!([]);
        write(&tmp.path().join("X.sol/CounterFacet.json"), &raw);

        let err = Artifacts::new(tmp.path()).load("CounterFacet").unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Selector(SelectorError::MissingAbi { .. })
        ));
    }

    #[test]
    fn test_constructor_only_abi_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let mut raw = counter_artifact("Diamond.sol");
        raw["abi"] = json!([
            { "type": "constructor", "stateMutability": "payable",
              "inputs": [{ "name": "_contractOwner", "type": "address" }] },
            { "type": "fallback", "stateMutability": "payable" }
        ]);
        write(&tmp.path().join("Diamond.sol/CounterFacet.json"), &raw);

        let artifact = Artifacts::new(tmp.path()).load("CounterFacet").unwrap();
        assert!(artifact.abi.functions().is_empty());
    }

    #[test]
    fn test_build_info_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("src/CounterFacet.sol");
        write(&dir.join("CounterFacet.json"), &counter_artifact("src/CounterFacet.sol"));
        write(
            &dir.join("CounterFacet.dbg.json"),
            &json!({ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/abc.json" }),
        );
        write(
            &tmp.path().join("build-info/abc.json"),
            &json!({
                "id": "abc",
                "solcVersion": "0.8.20",
                "solcLongVersion": "0.8.20+commit.a1b79de6",
                "input": { "language": "Solidity", "sources": {} }
            }),
        );

        let artifacts = Artifacts::new(tmp.path());
        let artifact = artifacts.load("CounterFacet").unwrap();
        let info = artifacts.build_info(&artifact).unwrap();
        assert_eq!(info.solc_long_version, "0.8.20+commit.a1b79de6");
        assert_eq!(info.input["language"], "Solidity");
    }
}
