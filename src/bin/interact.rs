use alloy::primitives::{utils::format_units, U256};
use anyhow::Result;
use dotenv::dotenv;
use tracing::info;

use diamond_engine::{
    chain::{self, read, write, ChainClient},
    config::Config,
    contracts::{ICounter, IERC20Facet},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _telemetry = telemetry::init("interact")?;

    let config = Config::from_env()?;
    let chain = chain::connect(config.rpc_url.clone(), config.signer.clone()).await?;
    let diamond = config.diamond_address()?;
    info!(%diamond, "💎 Diamond");

    // Counter
    let count = read(&chain, diamond, ICounter::getCountCall {}).await?._0;
    info!(%count, "Initial count");

    info!("Incrementing counter...");
    write(&chain, diamond, ICounter::incrementCall {}).await?;
    let count = read(&chain, diamond, ICounter::getCountCall {}).await?._0;
    info!(%count, "New count");

    // ERC20
    let name = read(&chain, diamond, IERC20Facet::nameCall {}).await?._0;
    let symbol = read(&chain, diamond, IERC20Facet::symbolCall {}).await?._0;
    let decimals = read(&chain, diamond, IERC20Facet::decimalsCall {}).await?._0;
    info!("Token info: {name} ({symbol}), decimals: {decimals}");

    let owner = chain.deployer();
    let amount = U256::from(1000) * U256::from(10).pow(U256::from(decimals));
    info!(%owner, "Minting 1000 tokens...");
    write(&chain, diamond, IERC20Facet::mintCall { to: owner, amount }).await?;

    let balance = read(&chain, diamond, IERC20Facet::balanceOfCall { account: owner })
        .await?
        ._0;
    info!("Balance of {owner}: {} {symbol}", format_units(balance, decimals)?);

    Ok(())
}
