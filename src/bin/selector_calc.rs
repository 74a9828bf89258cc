use anyhow::{bail, Result};
use std::env;

use diamond_engine::artifacts::Artifacts;
use diamond_engine::selectors::{derive_selectors, selector_of, INITIALIZER_NAME};

// Usage:
//   selector_calc "transfer(address,uint256)" "balanceOf(address)"
//   selector_calc --artifact CounterFacet [artifacts_dir]
fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None => bail!("Usage: selector_calc <signature>... | --artifact <Name> [artifacts_dir]"),
        Some("--artifact") => {
            let Some(name) = args.get(1) else {
                bail!("--artifact needs a contract name");
            };
            let dir = args.get(2).map(String::as_str).unwrap_or("artifacts");
            let artifact = Artifacts::new(dir).load(name)?;

            let selectors = derive_selectors(&artifact.abi)?;
            for function in artifact.abi.functions() {
                if function.name == INITIALIZER_NAME {
                    println!("(skipped)  -> {}", function.signature());
                    continue;
                }
                println!("{} -> {}", function.selector(), function.signature());
            }
            println!("{} selectors: {}", artifact.contract_name, selectors);
        }
        Some(_) => {
            for sig in &args {
                println!("{} -> {}", selector_of(sig)?, sig);
            }
        }
    }

    Ok(())
}
