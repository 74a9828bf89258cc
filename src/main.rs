use anyhow::Result;
use dotenv::dotenv;
use tracing::{info, warn};

use diamond_engine::{
    artifacts::Artifacts,
    chain,
    config::Config,
    orchestrator::{DiamondPlan, FacetState, Orchestrator, DEFAULT_FACETS},
    telemetry,
    verify::EtherscanVerifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _telemetry = telemetry::init("diamond_engine")?;

    info!("╔═══════════════════════════════════════════════════════════════╗");
    info!("║  💎 DIAMOND DEPLOYMENT                                        ║");
    info!("╚═══════════════════════════════════════════════════════════════╝");

    let config = Config::from_env()?;
    info!(
        network = config.network.name(),
        rpc = %config.rpc_url,
        artifacts = %config.artifacts_dir.display(),
        verify = config.verification_enabled(),
        "⚙️  Config loaded"
    );

    let chain = chain::connect(config.rpc_url.clone(), config.signer.clone()).await?;
    let artifacts = Artifacts::new(&config.artifacts_dir);
    let plan = DiamondPlan::load(&artifacts, &DEFAULT_FACETS, config.verification_enabled())?;

    let mut orchestrator: Orchestrator<_, EtherscanVerifier> =
        Orchestrator::new(chain).with_store(config.deployment_store());
    if config.verification_enabled() {
        if let Some(key) = &config.etherscan_api_key {
            let verifier = EtherscanVerifier::new(key.clone(), config.network.chain_id())?;
            orchestrator = orchestrator.with_verifier(verifier, config.retry);
        }
    }

    let deployment = orchestrator.deploy_diamond(plan).await?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(diamond = %deployment.diamond, tx = %deployment.cut_tx.tx_hash, cuts = deployment.batch.len(), "🏁 Completed diamond cut");
    for contract in &deployment.contracts {
        match contract.state() {
            FacetState::Verified { address } => {
                info!(%address, "  ✅ {} (verified)", contract.name())
            }
            FacetState::VerificationFailed { address, reason } => {
                warn!(%address, %reason, "  ⚠️ {} (not verified)", contract.name())
            }
            state => info!(address = ?state.address(), "  📦 {}", contract.name()),
        }
    }

    Ok(())
}
