//! Deployment and upgrade flows: deploy contracts one by one, derive their
//! selectors, submit cuts to the diamond, then optionally verify sources.

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::{SolCall, SolValue};
use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::artifacts::{Artifacts, BuildInfo, ContractArtifact};
use crate::chain::{ChainClient, Deployment, TxOutcome};
use crate::contracts::IDiamondInit;
use crate::cut::{self, build_batch, CutBatch, FacetCut, Initializer};
use crate::deployments::{DeploymentRecord, DeploymentStore};
use crate::error::{SelectorError, StateError};
use crate::selectors::{derive_selectors, SelectorSet};
use crate::verify::{verify_with_retry, RetryPolicy, VerificationReport, VerificationRequest, Verifier};

pub const DIAMOND_CUT_FACET: &str = "DiamondCutFacet";
pub const DIAMOND: &str = "Diamond";
pub const DIAMOND_INIT: &str = "DiamondInit";

/// Facets cut into a freshly deployed diamond.
pub const DEFAULT_FACETS: [&str; 4] = ["DiamondLoupeFacet", "OwnershipFacet", "CounterFacet", "ERC20Facet"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetState {
    Undeployed,
    Deployed { address: Address, block: u64 },
    Verified { address: Address },
    VerificationFailed { address: Address, reason: String },
}

impl FacetState {
    fn label(&self) -> &'static str {
        match self {
            FacetState::Undeployed => "undeployed",
            FacetState::Deployed { .. } => "deployed",
            FacetState::Verified { .. } => "verified",
            FacetState::VerificationFailed { .. } => "verification-failed",
        }
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            FacetState::Undeployed => None,
            FacetState::Deployed { address, .. }
            | FacetState::Verified { address }
            | FacetState::VerificationFailed { address, .. } => Some(*address),
        }
    }
}

/// A contract this run deploys, with where it is in its lifecycle.
#[derive(Debug, Clone)]
pub struct ManagedFacet {
    pub artifact: ContractArtifact,
    pub constructor_args: Bytes,
    pub build_info: Option<BuildInfo>,
    state: FacetState,
}

impl ManagedFacet {
    pub fn new(artifact: ContractArtifact) -> Self {
        Self {
            artifact,
            constructor_args: Bytes::new(),
            build_info: None,
            state: FacetState::Undeployed,
        }
    }

    /// Loads the artifact, and its build-info when it will be verified.
    /// Missing build-info only disables verification for this contract.
    pub fn load(artifacts: &Artifacts, name: &str, with_build_info: bool) -> Result<Self> {
        let artifact = artifacts
            .load(name)
            .with_context(|| format!("failed to load artifact {name}"))?;
        let build_info = if with_build_info {
            match artifacts.build_info(&artifact) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!(contract = name, error = %e, "⚠️ No build info, verification will be skipped");
                    None
                }
            }
        } else {
            None
        };
        Ok(Self {
            build_info,
            ..Self::new(artifact)
        })
    }

    pub fn name(&self) -> &str {
        &self.artifact.contract_name
    }

    pub fn state(&self) -> &FacetState {
        &self.state
    }

    pub fn address(&self) -> Option<Address> {
        self.state.address()
    }

    pub fn selectors(&self) -> Result<SelectorSet, SelectorError> {
        derive_selectors(&self.artifact.abi)
    }

    fn transition(&self, to: &'static str) -> StateError {
        StateError {
            facet: self.name().to_string(),
            from: self.state.label(),
            to,
        }
    }

    fn mark_deployed(&mut self, deployment: &Deployment) -> Result<(), StateError> {
        match self.state {
            FacetState::Undeployed => {
                self.state = FacetState::Deployed {
                    address: deployment.address,
                    block: deployment.block_number,
                };
                Ok(())
            }
            _ => Err(self.transition("deployed")),
        }
    }

    fn settle_verification(&mut self, report: &VerificationReport) -> Result<(), StateError> {
        let FacetState::Deployed { address, .. } = self.state else {
            return Err(self.transition("verified"));
        };
        self.state = match report {
            VerificationReport::Verified { .. } => FacetState::Verified { address },
            VerificationReport::Skipped { reason, .. } => FacetState::VerificationFailed {
                address,
                reason: reason.clone(),
            },
        };
        Ok(())
    }
}

/// Artifacts for a complete initial deployment.
#[derive(Debug, Clone)]
pub struct DiamondPlan {
    pub cut_facet: ManagedFacet,
    pub diamond: ManagedFacet,
    pub init: ManagedFacet,
    pub facets: Vec<ManagedFacet>,
}

impl DiamondPlan {
    pub fn load(artifacts: &Artifacts, facet_names: &[&str], with_build_info: bool) -> Result<Self> {
        Ok(Self {
            cut_facet: ManagedFacet::load(artifacts, DIAMOND_CUT_FACET, with_build_info)?,
            diamond: ManagedFacet::load(artifacts, DIAMOND, with_build_info)?,
            init: ManagedFacet::load(artifacts, DIAMOND_INIT, with_build_info)?,
            facets: facet_names
                .iter()
                .map(|name| ManagedFacet::load(artifacts, name, with_build_info))
                .collect::<Result<_>>()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DiamondDeployment {
    pub diamond: Address,
    pub batch: CutBatch,
    pub cut_tx: TxOutcome,
    /// Every contract deployed, in deployment order.
    pub contracts: Vec<ManagedFacet>,
}

pub struct Orchestrator<C, V> {
    chain: C,
    verifier: Option<V>,
    store: Option<DeploymentStore>,
    policy: RetryPolicy,
}

impl<C, V> Orchestrator<C, V>
where
    C: ChainClient,
    V: Verifier,
{
    pub fn new(chain: C) -> Self {
        Self {
            chain,
            verifier: None,
            store: None,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_verifier(mut self, verifier: V, policy: RetryPolicy) -> Self {
        self.verifier = Some(verifier);
        self.policy = policy;
        self
    }

    pub fn with_store(mut self, store: DeploymentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    #[instrument(skip_all, fields(contract = %facet.name()))]
    pub async fn deploy(&self, facet: &mut ManagedFacet) -> Result<Address> {
        if facet.state != FacetState::Undeployed {
            return Err(facet.transition("deployed").into());
        }

        let code = facet.artifact.deploy_code(&facet.constructor_args);
        let deployment = self
            .chain
            .deploy(code)
            .await
            .with_context(|| format!("failed to deploy {}", facet.name()))?;
        facet.mark_deployed(&deployment)?;
        info!(address = %deployment.address, tx = %deployment.tx_hash, "📦 {} deployed", facet.name());

        if let Some(store) = &self.store {
            let record = DeploymentRecord::new(&deployment, facet.artifact.abi_json.clone());
            store.save(facet.name(), &record)?;
        }
        Ok(deployment.address)
    }

    /// Verifies a deployed contract. Returns `None` when verification is not
    /// configured, leaving the contract in the deployed state.
    pub async fn verify(&self, facet: &mut ManagedFacet) -> Result<Option<VerificationReport>> {
        let Some(verifier) = &self.verifier else {
            return Ok(None);
        };
        let FacetState::Deployed { address, block } = facet.state else {
            return Err(facet.transition("verified").into());
        };

        let report = match &facet.build_info {
            Some(info) => {
                let request = VerificationRequest {
                    address,
                    contract_name: facet.artifact.fully_qualified_name(),
                    compiler_version: info.solc_long_version.clone(),
                    source: info.input.clone(),
                    constructor_args: facet.constructor_args.clone(),
                };
                verify_with_retry(&self.chain, verifier, &request, block, &self.policy).await
            }
            None => VerificationReport::Skipped {
                attempts: 0,
                reason: "no build info".to_string(),
            },
        };

        facet.settle_verification(&report)?;
        if let VerificationReport::Skipped { reason, .. } = &report {
            warn!(contract = %facet.name(), %address, %reason, "⚠️ Verification skipped");
        }
        Ok(Some(report))
    }

    /// Submits one cut batch to the diamond.
    pub async fn apply_cut(
        &self,
        diamond: Address,
        batch: &CutBatch,
        init: Option<&Initializer>,
    ) -> Result<TxOutcome> {
        for cut in batch.cuts() {
            info!(%diamond, "✂️  {cut}");
        }
        let outcome = self
            .chain
            .transact(diamond, batch.encode(init))
            .await
            .with_context(|| format!("diamond cut on {diamond} failed"))?;
        info!(tx = %outcome.tx_hash, block = outcome.block_number, "✅ Diamond cut applied");
        Ok(outcome)
    }

    /// Full initial deployment: cut facet, diamond, initializer, then every
    /// facet in one Add batch executed together with `init()`.
    pub async fn deploy_diamond(&self, mut plan: DiamondPlan) -> Result<DiamondDeployment> {
        let owner = self.chain.deployer();

        let cut_facet = self.deploy(&mut plan.cut_facet).await?;
        plan.diamond.constructor_args = (owner, cut_facet).abi_encode_params().into();
        let diamond = self.deploy(&mut plan.diamond).await?;
        let init = self.deploy(&mut plan.init).await?;

        info!("🔧 Deploying facets");
        let mut cuts: Vec<FacetCut> = Vec::with_capacity(plan.facets.len());
        for facet in plan.facets.iter_mut() {
            let address = self.deploy(facet).await?;
            let selectors = facet
                .selectors()
                .with_context(|| format!("failed to derive selectors for {}", facet.name()))?;
            cuts.push(cut::add(address, selectors)?);
        }

        let batch = build_batch(cuts);
        let initializer = Initializer {
            address: init,
            calldata: IDiamondInit::initCall {}.abi_encode().into(),
        };
        let cut_tx = self.apply_cut(diamond, &batch, Some(&initializer)).await?;

        let mut contracts = vec![plan.cut_facet, plan.diamond, plan.init];
        contracts.extend(plan.facets);
        for contract in contracts.iter_mut() {
            self.verify(contract).await?;
        }

        Ok(DiamondDeployment {
            diamond,
            batch,
            cut_tx,
            contracts,
        })
    }

    /// Deploys `facet` if needed and registers all of its selectors.
    pub async fn add_facet(&self, diamond: Address, facet: &mut ManagedFacet) -> Result<TxOutcome> {
        let address = match facet.address() {
            Some(address) => address,
            None => self.deploy(facet).await?,
        };
        let batch = build_batch([cut::add(address, facet.selectors()?)?]);
        self.apply_cut(diamond, &batch, None).await
    }

    /// Removes `old` selectors, then adds every selector of `new_facet`, as two
    /// separate transactions.
    pub async fn swap_facet(
        &self,
        diamond: Address,
        old: SelectorSet,
        new_facet: &mut ManagedFacet,
    ) -> Result<(TxOutcome, TxOutcome)> {
        let removed = self
            .apply_cut(diamond, &build_batch([cut::remove(old)?]), None)
            .await?;
        let added = self.add_facet(diamond, new_facet).await?;
        Ok((removed, added))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::FakeChain;
    use crate::config::Network;
    use crate::contracts::diamondCutCall;
    use crate::cut::FacetCutAction;
    use crate::error::ChainError;
    use crate::selectors::selector_of;
    use crate::verify::VerifyAttempt;
    use alloy::json_abi::Function;
    use serde_json::{json, Value};

    struct FixedVerifier(VerifyAttempt);

    impl Verifier for FixedVerifier {
        async fn verify(&self, _request: &VerificationRequest) -> VerifyAttempt {
            self.0.clone()
        }
    }

    fn managed(name: &str, sigs: &[&str]) -> ManagedFacet {
        let abi: Value = sigs
            .iter()
            .map(|s| serde_json::to_value(Function::parse(s).unwrap()).unwrap())
            .collect();
        let artifact = ContractArtifact::in_memory(
            name,
            format!("src/{name}.sol"),
            abi,
            Bytes::from(vec![0x60, 0x80]),
        )
        .unwrap();
        ManagedFacet::new(artifact)
    }

    fn diamond_contract() -> ManagedFacet {
        let abi = json!([
            { "type": "constructor", "stateMutability": "payable", "inputs": [
                { "name": "_contractOwner", "type": "address" },
                { "name": "_diamondCutFacet", "type": "address" }
            ] },
            { "type": "fallback", "stateMutability": "payable" }
        ]);
        let artifact = ContractArtifact::in_memory(
            DIAMOND,
            format!("src/{DIAMOND}.sol"),
            abi,
            Bytes::from(vec![0x60, 0x80]),
        )
        .unwrap();
        ManagedFacet::new(artifact)
    }

    fn with_build_info(mut facet: ManagedFacet) -> ManagedFacet {
        facet.build_info = Some(BuildInfo {
            solc_long_version: "0.8.20+commit.a1b79de6".into(),
            input: json!({ "language": "Solidity" }),
        });
        facet
    }

    fn plan() -> DiamondPlan {
        DiamondPlan {
            cut_facet: managed(DIAMOND_CUT_FACET, &["diamondCut((address,uint8,bytes4[])[],address,bytes)"]),
            diamond: diamond_contract(),
            init: managed(DIAMOND_INIT, &["init()"]),
            facets: vec![
                managed("CounterFacet", &["getCount()", "increment()", "decrement()"]),
                managed("ERC20Facet", &["name()", "symbol()", "mint(address,uint256)", "init(bytes)"]),
            ],
        }
    }

    fn decode_cut(calldata: &Bytes) -> diamondCutCall {
        diamondCutCall::abi_decode(calldata, true).unwrap()
    }

    #[tokio::test]
    async fn test_deploy_diamond_cuts_all_facets_with_init() {
        let orchestrator: Orchestrator<_, FixedVerifier> = Orchestrator::new(FakeChain::default());
        let deployment = orchestrator.deploy_diamond(plan()).await.unwrap();

        let chain = orchestrator.chain();
        assert_eq!(chain.deployments(), 5);
        assert_eq!(deployment.diamond, Address::repeat_byte(2));

        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, deployment.diamond);

        let call = decode_cut(&sent[0].1);
        assert_eq!(call._init, Address::repeat_byte(3));
        assert_eq!(call._calldata.as_ref(), &selector_of("init()").unwrap()[..]);
        assert_eq!(call._diamondCut.len(), 2);
        assert_eq!(call._diamondCut[0].facetAddress, Address::repeat_byte(4));
        assert_eq!(call._diamondCut[0].functionSelectors.len(), 3);
        // init(bytes) on a facet is never registered
        assert_eq!(call._diamondCut[1].functionSelectors.len(), 3);
        assert!(call._diamondCut.iter().all(|c| c.action == FacetCutAction::Add as u8));

        // Without a verifier everything stays deployed.
        assert!(deployment
            .contracts
            .iter()
            .all(|c| matches!(c.state(), FacetState::Deployed { .. })));
    }

    #[tokio::test]
    async fn test_diamond_constructor_gets_owner_and_cut_facet() {
        let orchestrator: Orchestrator<_, FixedVerifier> = Orchestrator::new(FakeChain::default());
        orchestrator.deploy_diamond(plan()).await.unwrap();

        let code = orchestrator.chain().state.lock().unwrap().deployed[1].clone();
        let expected = (orchestrator.chain().deployer(), Address::repeat_byte(1)).abi_encode_params();
        assert!(code.ends_with(&expected));
    }

    #[tokio::test]
    async fn test_failed_verification_does_not_abort() {
        let policy = RetryPolicy {
            confirmations: 1,
            delay: Default::default(),
            poll_interval: Default::default(),
            ..RetryPolicy::default()
        };
        let orchestrator = Orchestrator::new(FakeChain::default())
            .with_verifier(FixedVerifier(VerifyAttempt::Failed("Invalid API Key".into())), policy);

        let mut plan = plan();
        plan.facets = plan.facets.into_iter().map(with_build_info).collect();
        let deployment = orchestrator.deploy_diamond(plan).await.unwrap();

        let counter = &deployment.contracts[3];
        assert_eq!(
            counter.state(),
            &FacetState::VerificationFailed {
                address: Address::repeat_byte(4),
                reason: "Invalid API Key".into()
            }
        );
        // No build info at all: skipped without attempts.
        assert!(matches!(
            deployment.contracts[0].state(),
            FacetState::VerificationFailed { reason, .. } if reason == "no build info"
        ));
    }

    #[tokio::test]
    async fn test_verified_state() {
        let orchestrator = Orchestrator::new(FakeChain::default()).with_verifier(
            FixedVerifier(VerifyAttempt::AlreadyVerified),
            RetryPolicy {
                confirmations: 0,
                delay: Default::default(),
                poll_interval: Default::default(),
                ..RetryPolicy::default()
            },
        );
        let mut facet = with_build_info(managed("CalculatorFacet", &["add(uint256)"]));
        let address = orchestrator.deploy(&mut facet).await.unwrap();

        let report = orchestrator.verify(&mut facet).await.unwrap().unwrap();
        assert!(report.is_verified());
        assert_eq!(facet.state(), &FacetState::Verified { address });

        // Terminal: neither redeploying nor reverifying is allowed.
        assert!(orchestrator.verify(&mut facet).await.is_err());
        assert!(orchestrator.deploy(&mut facet).await.is_err());
    }

    #[tokio::test]
    async fn test_swap_facet_removes_then_adds() {
        let orchestrator: Orchestrator<_, FixedVerifier> = Orchestrator::new(FakeChain::default());
        let diamond = Address::repeat_byte(0xd1);

        let old = managed("CounterFacet", &["getCount()", "increment()"]);
        let mut new = managed("CounterFacetV2", &["getCount()", "increment()", "isMultipleOf(uint256)"]);

        orchestrator
            .swap_facet(diamond, old.selectors().unwrap(), &mut new)
            .await
            .unwrap();

        let sent = orchestrator.chain().sent();
        assert_eq!(sent.len(), 2);

        let removal = decode_cut(&sent[0].1);
        assert_eq!(removal._diamondCut[0].action, FacetCutAction::Remove as u8);
        assert_eq!(removal._diamondCut[0].facetAddress, Address::ZERO);
        assert_eq!(removal._diamondCut[0].functionSelectors.len(), 2);

        let addition = decode_cut(&sent[1].1);
        assert_eq!(addition._diamondCut[0].action, FacetCutAction::Add as u8);
        assert_eq!(addition._diamondCut[0].facetAddress, new.address().unwrap());
        assert_eq!(addition._diamondCut[0].functionSelectors.len(), 3);
    }

    #[tokio::test]
    async fn test_reverted_cut_surfaces_hash() {
        let orchestrator: Orchestrator<_, FixedVerifier> = Orchestrator::new(FakeChain::default());
        orchestrator.chain().state.lock().unwrap().revert_next = true;

        let mut facet = managed("CalculatorFacet", &["add(uint256)"]);
        orchestrator.deploy(&mut facet).await.unwrap();
        let err = orchestrator
            .add_facet(Address::repeat_byte(0xd1), &mut facet)
            .await
            .unwrap_err();
        assert!(err.chain().any(|e| e.downcast_ref::<ChainError>().is_some()));
        assert!(format!("{err:#}").contains("reverted"));
    }

    #[tokio::test]
    async fn test_deployments_are_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DeploymentStore::new(tmp.path(), Network::Local);
        let orchestrator: Orchestrator<_, FixedVerifier> =
            Orchestrator::new(FakeChain::default()).with_store(store.clone());

        let mut facet = managed("CalculatorFacet", &["add(uint256)"]);
        let address = orchestrator.deploy(&mut facet).await.unwrap();

        let record = store.load("CalculatorFacet").unwrap().unwrap();
        assert_eq!(record.address, address);
        assert_eq!(record.abi.as_array().unwrap().len(), 1);
    }
}
