// Seed loading.
//
// Idempotent bulk-load from a JSON payload. Each collection is guarded
// by its own emptiness check: if any record already exists there, that
// collection's entries are skipped entirely, so partial seeding within
// one collection never occurs. Trip keys arrive in the payload's
// camelCase form.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::entities::{Driver, Trip, Unit};
use crate::gateway::Gateway;
use crate::store::Collection;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub drivers: Vec<DriverSeed>,
    pub units: Vec<UnitSeed>,
    pub trips: Vec<TripSeed>,

    /// Optional override applied after all collection seeding.
    #[serde(rename = "exchangeRate")]
    pub exchange_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DriverSeed {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Pre-hashed; this layer never hashes credentials.
    pub password_hash: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnitSeed {
    pub number: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TripSeed {
    #[serde(rename = "tripNumber")]
    pub trip_number: Option<String>,
    #[serde(rename = "pickupDate")]
    pub pickup_date: Option<String>,
    #[serde(rename = "pickupCity")]
    pub pickup_city: Option<String>,
    #[serde(rename = "pickupState")]
    pub pickup_state: Option<String>,
    #[serde(rename = "deliveryDate")]
    pub delivery_date: Option<String>,
    #[serde(rename = "deliveryCity")]
    pub delivery_city: Option<String>,
    #[serde(rename = "deliveryState")]
    pub delivery_state: Option<String>,
    #[serde(rename = "paymentUSD")]
    pub payment_usd: Option<f64>,
    #[serde(rename = "paymentCAD")]
    pub payment_cad: Option<f64>,
    pub status: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

/// Per-collection insert counts, for the caller to report.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub drivers_inserted: usize,
    pub units_inserted: usize,
    pub trips_inserted: usize,
    pub exchange_rate_applied: bool,
}

pub fn load_seed_file(path: &Path) -> Result<SeedData> {
    let file =
        File::open(path).with_context(|| format!("failed to open seed file {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("seed file {} is not valid JSON", path.display()))
}

pub fn seed_initial_data(gateway: &Gateway, seed: &SeedData) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    if gateway.count(Collection::Drivers)? == 0 {
        for entry in &seed.drivers {
            let driver = Driver {
                name: entry.name.clone(),
                email: entry.email.clone(),
                phone: entry.phone.clone(),
                password_hash: entry.password_hash.clone(),
                created_at: Some(Utc::now()),
                ..Driver::default()
            };
            gateway.create_driver(driver)?;
            report.drivers_inserted += 1;
        }
    }

    if gateway.count(Collection::Units)? == 0 {
        for entry in &seed.units {
            let unit = Unit {
                number: entry.number.clone(),
                make: entry.make.clone(),
                model: entry.model.clone(),
                created_at: Some(Utc::now()),
                ..Unit::default()
            };
            gateway.create_unit(unit)?;
            report.units_inserted += 1;
        }
    }

    if gateway.count(Collection::Trips)? == 0 {
        for entry in &seed.trips {
            let created_at = match &entry.created_at {
                Some(raw) => parse_seed_timestamp(raw)?,
                None => Utc::now(),
            };
            let trip = Trip {
                trip_number: entry.trip_number.clone(),
                driver_id: None,
                unit_id: None,
                pickup_date: entry.pickup_date.clone(),
                pickup_city: entry.pickup_city.clone(),
                pickup_state: entry.pickup_state.clone(),
                delivery_date: entry.delivery_date.clone(),
                delivery_city: entry.delivery_city.clone(),
                delivery_state: entry.delivery_state.clone(),
                payment_usd: entry.payment_usd,
                payment_cad: entry.payment_cad,
                status: entry.status.clone().unwrap_or_default(),
                created_at: Some(created_at),
                ..Trip::default()
            };
            gateway.create_trip(trip)?;
            report.trips_inserted += 1;
        }
    }

    if let Some(rate) = seed.exchange_rate {
        gateway.set_exchange_rate(rate)?;
        report.exchange_rate_applied = true;
    }

    Ok(report)
}

/// Seed timestamps use ISO-8601 with a `Z` UTC designator; the
/// designator is substituted with an explicit `+00:00` offset before
/// parsing.
fn parse_seed_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let normalized = match raw.strip_suffix('Z') {
        Some(head) => format!("{head}+00:00"),
        None => raw.to_string(),
    };
    let parsed = DateTime::parse_from_rfc3339(&normalized)
        .with_context(|| format!("seed timestamp {raw:?} is not a valid ISO-8601 datetime"))?;
    Ok(parsed.with_timezone(&Utc))
}

// ============================================================================
// Tests
// ============================================================================
