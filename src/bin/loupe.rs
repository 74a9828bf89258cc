use alloy::primitives::{Address, FixedBytes};
use anyhow::{bail, Result};
use dotenv::dotenv;
use tracing::{info, warn};

use diamond_engine::{
    chain,
    config::Config,
    loupe::{self, STANDARD_INTERFACES},
    orchestrator::{DEFAULT_FACETS, DIAMOND_CUT_FACET},
    telemetry,
};

/// Facets the upgrade scripts may have recorded besides the initial set.
const UPGRADE_FACETS: [&str; 3] = ["CalculatorFacet", "CounterFacetV2", "CounterFacetV3"];

/// Facets that must stay routed for the diamond to remain upgradeable and inspectable.
const CORE_FACETS: [&str; 2] = [DIAMOND_CUT_FACET, "DiamondLoupeFacet"];

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _telemetry = telemetry::init("loupe")?;

    let config = Config::from_env()?;
    let chain = chain::connect(config.rpc_url.clone(), config.signer.clone()).await?;
    let diamond = config.diamond_address()?;
    info!(%diamond, "💎 Diamond");

    let facets = loupe::facets(&chain, diamond).await?;
    let addresses = loupe::facet_addresses(&chain, diamond).await?;
    info!(facets = facets.len(), "🔍 Registered facets");

    let mut mismatches = 0usize;
    for facet in &facets {
        info!(address = %facet.facetAddress, selectors = facet.functionSelectors.len(), "  💠 Facet");

        if !addresses.contains(&facet.facetAddress) {
            warn!(address = %facet.facetAddress, "⚠️ Facet missing from facetAddresses()");
            mismatches += 1;
        }

        let listed = loupe::facet_function_selectors(&chain, diamond, facet.facetAddress).await?;
        if listed != facet.functionSelectors {
            warn!(address = %facet.facetAddress, "⚠️ facetFunctionSelectors() disagrees with facets()");
            mismatches += 1;
        }

        for selector in &facet.functionSelectors {
            let owner = loupe::facet_address(&chain, diamond, *selector).await?;
            if owner != facet.facetAddress {
                warn!(%selector, expected = %facet.facetAddress, got = %owner, "⚠️ Selector routed elsewhere");
                mismatches += 1;
            }
        }
    }

    let unknown = loupe::facet_address(&chain, diamond, FixedBytes([0x12, 0x34, 0x56, 0x78])).await?;
    if unknown != Address::ZERO {
        warn!(%unknown, "⚠️ Unregistered selector resolves to a facet");
        mismatches += 1;
    }

    let store = config.deployment_store();
    let mut recorded = Vec::new();
    for name in [DIAMOND_CUT_FACET].iter().chain(&DEFAULT_FACETS).chain(&UPGRADE_FACETS) {
        if let Some(record) = store.load(name)? {
            recorded.push((name.to_string(), record.address));
        }
    }
    info!(recorded = recorded.len(), dir = %store.dir().display(), "📒 Recorded deployments");

    for (name, address, position) in loupe::locate_recorded(&recorded, &facets) {
        match position {
            Some(position) => info!(%address, position, "  📍 {name}"),
            None if CORE_FACETS.contains(&name) => {
                warn!(%address, "⚠️ {name} is recorded but not registered");
                mismatches += 1;
            }
            None => info!(%address, "  💤 {name} not registered (replaced or never added)"),
        }
    }

    for (interface, id) in STANDARD_INTERFACES {
        let supported = loupe::supports_interface(&chain, diamond, id).await?;
        if supported {
            info!(%id, "  ✅ {interface}");
        } else {
            warn!(%id, "⚠️ {interface} not supported");
            mismatches += 1;
        }
    }

    if mismatches > 0 {
        bail!("{mismatches} loupe inconsistencies on {diamond}");
    }
    info!("✅ Loupe is consistent");
    Ok(())
}
