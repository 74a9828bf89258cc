use alloy::primitives::U256;
use anyhow::Result;
use dotenv::dotenv;
use tracing::info;

use diamond_engine::{
    artifacts::Artifacts,
    chain::{self, read, write},
    config::Config,
    contracts::ICalculator,
    orchestrator::{ManagedFacet, Orchestrator},
    telemetry,
    verify::EtherscanVerifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _telemetry = telemetry::init("add_calculator_facet")?;
    info!("=== Calculator Facet Addition Started ===");

    let config = Config::from_env()?;
    let chain = chain::connect(config.rpc_url.clone(), config.signer.clone()).await?;
    let diamond = config.diamond_address()?;
    info!(%diamond, "💎 Diamond");

    let artifacts = Artifacts::new(&config.artifacts_dir);
    let mut calculator = ManagedFacet::load(&artifacts, "CalculatorFacet", false)?;

    let orchestrator =
        Orchestrator::<_, EtherscanVerifier>::new(chain).with_store(config.deployment_store());
    orchestrator.deploy(&mut calculator).await?;
    info!(selectors = %calculator.selectors()?, "🔑 CalculatorFacet selectors");

    info!("Adding CalculatorFacet to diamond...");
    orchestrator.add_facet(diamond, &mut calculator).await?;
    info!("✅ CalculatorFacet added to diamond!");

    info!("=== Testing Calculator Functions ===");
    let chain = orchestrator.chain();

    write(chain, diamond, ICalculator::setValueCall { value: U256::from(10) }).await?;
    let result = read(chain, diamond, ICalculator::getResultCall {}).await?._0;
    info!(%result, "Initial value");

    write(chain, diamond, ICalculator::addCall { value: U256::from(5) }).await?;
    let result = read(chain, diamond, ICalculator::getResultCall {}).await?._0;
    info!(%result, "After adding 5");

    write(chain, diamond, ICalculator::subtractCall { value: U256::from(3) }).await?;
    let result = read(chain, diamond, ICalculator::getResultCall {}).await?._0;
    info!(%result, "After subtracting 3");

    write(chain, diamond, ICalculator::multiplyCall { value: U256::from(2) }).await?;
    let result = read(chain, diamond, ICalculator::getResultCall {}).await?._0;
    info!(%result, "After multiplying by 2");

    write(chain, diamond, ICalculator::divideCall { value: U256::from(4) }).await?;
    let result = read(chain, diamond, ICalculator::getResultCall {}).await?._0;
    info!(%result, "After dividing by 4");

    let operations = read(chain, diamond, ICalculator::getOperationCountCall {}).await?._0;
    let operator = read(chain, diamond, ICalculator::getLastOperatorCall {}).await?._0;
    info!(%operations, %operator, "📊 Calculator stats");

    write(chain, diamond, ICalculator::resetCall {}).await?;
    let result = read(chain, diamond, ICalculator::getResultCall {}).await?._0;
    info!(%result, "After reset");

    info!("=== Calculator Facet Addition and Tests Completed ===");
    Ok(())
}
