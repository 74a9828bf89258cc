use anyhow::Result;
use dotenv::dotenv;
use tracing::info;

use diamond_engine::{
    artifacts::Artifacts,
    chain::{self, read, write},
    config::Config,
    contracts::{ICounter, ICounterV3},
    orchestrator::{ManagedFacet, Orchestrator},
    telemetry,
    verify::EtherscanVerifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _telemetry = telemetry::init("upgrade_counter_v3")?;
    info!("=== Counter Storage Upgrade Started ===");

    let config = Config::from_env()?;
    let chain = chain::connect(config.rpc_url.clone(), config.signer.clone()).await?;
    let diamond = config.diamond_address()?;
    info!(%diamond, "💎 Diamond");

    let before = read(&chain, diamond, ICounter::getCountCall {}).await?._0;
    info!(count = %before, "Current counter value");

    let artifacts = Artifacts::new(&config.artifacts_dir);
    let v2 = ManagedFacet::load(&artifacts, "CounterFacetV2", false)?;
    let mut v3 = ManagedFacet::load(&artifacts, "CounterFacetV3", false)?;

    let old = v2.selectors()?;
    info!(selectors = %old, "🗑️  V2 selectors to remove");
    info!(selectors = %v3.selectors()?, "➕ V3 selectors to add");

    let orchestrator =
        Orchestrator::<_, EtherscanVerifier>::new(chain).with_store(config.deployment_store());
    orchestrator.swap_facet(diamond, old, &mut v3).await?;
    info!("✅ CounterFacetV2 replaced by CounterFacetV3");

    let chain = orchestrator.chain();
    info!("Running storage migration...");
    write(chain, diamond, ICounterV3::initializeV3Call {}).await?;
    info!("✅ Storage migration completed");

    let after = read(chain, diamond, ICounter::getCountCall {}).await?._0;
    info!(count = %after, preserved = (after == before), "Counter value after upgrade");

    let counter = read(chain, diamond, ICounterV3::getCounterInfoCall {}).await?;
    info!(
        value = %counter.value,
        last_incremented = %counter.lastIncremented,
        last_decremented = %counter.lastDecremented,
        total_increments = %counter.totalIncrements,
        total_decrements = %counter.totalDecrements,
        last_modifier = %counter.lastModifier,
        "📊 Extended counter information"
    );

    info!("Testing counter increment...");
    write(chain, diamond, ICounter::incrementCall {}).await?;

    let count = read(chain, diamond, ICounter::getCountCall {}).await?._0;
    let increments = read(chain, diamond, ICounterV3::getTotalIncrementsCall {}).await?._0;
    let modifier = read(chain, diamond, ICounterV3::getLastModifierCall {}).await?._0;
    info!(%count, %increments, %modifier, "Counter after increment");

    info!("=== Counter Storage Upgrade Completed ===");
    Ok(())
}
