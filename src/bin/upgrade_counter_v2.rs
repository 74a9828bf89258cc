use alloy::primitives::U256;
use anyhow::Result;
use dotenv::dotenv;
use tracing::info;

use diamond_engine::{
    artifacts::Artifacts,
    chain::{self, read},
    config::Config,
    contracts::{ICounter, ICounterV2},
    orchestrator::{ManagedFacet, Orchestrator},
    telemetry,
    verify::EtherscanVerifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _telemetry = telemetry::init("upgrade_counter_v2")?;
    info!("=== Counter Facet Upgrade Started ===");

    let config = Config::from_env()?;
    let chain = chain::connect(config.rpc_url.clone(), config.signer.clone()).await?;
    let diamond = config.diamond_address()?;
    info!(%diamond, "💎 Diamond");

    let artifacts = Artifacts::new(&config.artifacts_dir);
    let current = ManagedFacet::load(&artifacts, "CounterFacet", false)?;
    let mut upgraded = ManagedFacet::load(&artifacts, "CounterFacetV2", false)?;

    let old = current.selectors()?;
    info!(selectors = %old, "🗑️  Selectors to remove");
    info!(selectors = %upgraded.selectors()?, "➕ Selectors to add");

    let orchestrator =
        Orchestrator::<_, EtherscanVerifier>::new(chain).with_store(config.deployment_store());
    orchestrator.swap_facet(diamond, old, &mut upgraded).await?;
    info!("✅ CounterFacet replaced by CounterFacetV2");

    let chain = orchestrator.chain();
    let count = read(chain, diamond, ICounter::getCountCall {}).await?._0;
    info!(%count, "Current counter value");

    let even = read(chain, diamond, ICounterV2::isMultipleOfCall { divisor: U256::from(2) })
        .await?
        ._0;
    info!(even, "Is counter a multiple of 2?");

    info!("=== Counter Facet Upgrade Completed ===");
    Ok(())
}
