//! Deployment, upgrade and verification tooling for EIP-2535 diamonds.

pub mod artifacts;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod cut;
pub mod deployments;
pub mod error;
pub mod loupe;
pub mod orchestrator;
pub mod selectors;
pub mod telemetry;
pub mod verify;

pub use error::{ArtifactError, ChainError, CutError, SelectorError, StateError};
