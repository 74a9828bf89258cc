use alloy::primitives::{Address, Selector, B256};
use std::path::PathBuf;
use thiserror::Error;

use crate::cut::FacetCutAction;

/// Failures while turning ABIs and signatures into selectors.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("contract {contract} has no ABI")]
    MissingAbi { contract: String },

    #[error("malformed ABI for {contract}: {source}")]
    MalformedAbi {
        contract: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid function signature `{signature}`: {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("function `{signature}` not found in {contract}")]
    UnknownFunction { contract: String, signature: String },

    #[error("function name `{name}` is ambiguous in {contract} ({count} overloads)")]
    AmbiguousFunction {
        contract: String,
        name: String,
        count: usize,
    },

    #[error("selector {selector} appears twice in {contract}")]
    DuplicateSelector { contract: String, selector: Selector },
}

/// Cut records that the diamond would reject anyway, caught before submission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CutError {
    #[error("remove cut must target the zero address, got {address}")]
    RemoveWithFacetAddress { address: Address },

    #[error("{action:?} cut needs a deployed facet address")]
    MissingFacetAddress { action: FacetCutAction },

    #[error("{action:?} cut has no selectors")]
    EmptySelectors { action: FacetCutAction },

    #[error("selector {selector} repeated within one {action:?} cut")]
    DuplicateSelector {
        action: FacetCutAction,
        selector: Selector,
    },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },

    #[error("deployment transaction {tx_hash} produced no contract address")]
    MissingContractAddress { tx_hash: B256 },

    #[error("receipt for {tx_hash} has no block number")]
    MissingBlockNumber { tx_hash: B256 },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact for {name} not found under {dir}")]
    NotFound { name: String, dir: PathBuf },

    #[error("artifact for {name} is ambiguous: {paths:?}")]
    Ambiguous { name: String, paths: Vec<PathBuf> },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{name} has no deployable bytecode")]
    NoBytecode { name: String },

    #[error("{name} bytecode is not valid hex")]
    BadBytecode { name: String },

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("facet {facet}: cannot go from {from} to {to}")]
pub struct StateError {
    pub facet: String,
    pub from: &'static str,
    pub to: &'static str,
}
