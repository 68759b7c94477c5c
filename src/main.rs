use anyhow::{bail, Result};
use std::env;
use std::path::Path;

use fleet_profit::{load_seed_file, seed_initial_data, Collection, Config, Gateway};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("seed") => {
            let Some(path) = args.get(2) else {
                bail!("usage: fleet-profit seed <payload.json>");
            };
            run_seed(Path::new(path))
        }
        Some("summary") | None => run_summary(),
        Some(other) => bail!("unknown command {other:?} (expected: seed, summary)"),
    }
}

fn run_seed(path: &Path) -> Result<()> {
    println!("🚚 Fleet Profit - Seed Import");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env()?;
    let gateway = Gateway::new(&config)?;
    println!("✓ Store opened: {}", config.store_endpoint);

    let seed = load_seed_file(path)?;
    let report = seed_initial_data(&gateway, &seed)?;

    println!("✓ Drivers inserted: {}", report.drivers_inserted);
    println!("✓ Units inserted:   {}", report.units_inserted);
    println!("✓ Trips inserted:   {}", report.trips_inserted);
    if report.exchange_rate_applied {
        println!("✓ Exchange rate override applied");
    }

    Ok(())
}

fn run_summary() -> Result<()> {
    println!("🚚 Fleet Profit - Summary");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env()?;
    let gateway = Gateway::new(&config)?;

    println!("✓ Drivers: {}", gateway.count(Collection::Drivers)?);
    println!("✓ Units:   {}", gateway.count(Collection::Units)?);
    println!("✓ Trips:   {}", gateway.count(Collection::Trips)?);
    println!(
        "✓ Exchange rate: {:.2} (primary currency {})",
        gateway.get_exchange_rate()?,
        gateway.get_primary_currency()?
    );

    Ok(())
}
