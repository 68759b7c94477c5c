// Repository Gateway
//
// Mediates every read and write against the four collections: default
// field population on create, identifier parsing on get, field-level
// merges on update, atomic expense appends, and the settings singleton.
// NotFound is always Ok(None); only store-level failures propagate.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::Config;
use crate::entities::settings::DEFAULT_CURRENCY;
use crate::entities::trip::STATUS_ACTIVE;
use crate::entities::{Driver, Expense, Settings, Trip, Unit};
use crate::store::{Collection, Filter, ParsedId, Store};

pub struct Gateway {
    store: Store,
    default_exchange_rate: f64,
}

impl Gateway {
    /// Connect to the configured store endpoint and ensure the settings
    /// singleton exists, seeding it from the configured default rate on
    /// first construction.
    pub fn new(config: &Config) -> Result<Gateway> {
        Self::with_store(Store::open(&config.store_endpoint)?, config)
    }

    /// Gateway over an in-memory store, for tests and tooling.
    pub fn in_memory(config: &Config) -> Result<Gateway> {
        Self::with_store(Store::in_memory()?, config)
    }

    fn with_store(store: Store, config: &Config) -> Result<Gateway> {
        let gateway = Gateway {
            store,
            default_exchange_rate: config.default_exchange_rate,
        };
        gateway.ensure_settings()?;
        Ok(gateway)
    }

    fn ensure_settings(&self) -> Result<()> {
        if self.store.count(Collection::Settings)? == 0 {
            let settings = Settings::new(self.default_exchange_rate);
            self.store
                .insert(Collection::Settings, serde_json::to_value(settings)?)
                .context("failed to initialize settings record")?;
        }
        Ok(())
    }

    pub fn count(&self, collection: Collection) -> Result<i64> {
        self.store.count(collection)
    }

    // ------------------------------------------------------------------------
    // Shared document plumbing
    // ------------------------------------------------------------------------

    fn list_docs<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> Result<Vec<T>> {
        self.store
            .find(collection, filter)?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Malformed identifiers map to Ok(None); they never surface as an
    /// error from a get.
    fn get_doc<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<Option<T>> {
        match ParsedId::parse(id) {
            ParsedId::Malformed => Ok(None),
            ParsedId::Valid(id) => self.store.find_by_id(collection, &id)?.map(decode).transpose(),
        }
    }

    fn update_doc<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
        fields: &Filter,
    ) -> Result<Option<T>> {
        let id = require_id(id)?;
        self.store
            .update_by_id(collection, &id, fields)?
            .map(decode)
            .transpose()
    }

    fn create_doc<T: Serialize>(&self, collection: Collection, record: &T) -> Result<String> {
        self.store.insert(collection, serde_json::to_value(record)?)
    }

    fn append_expense<T: DeserializeOwned>(
        &self,
        collection: Collection,
        parent_id: &str,
        mut expense: Expense,
    ) -> Result<Option<T>> {
        let id = require_id(parent_id)?;
        expense.stamp();
        self.store
            .push(collection, &id, "expenses", &serde_json::to_value(expense)?)?
            .map(decode)
            .transpose()
    }

    // ------------------------------------------------------------------------
    // Drivers
    // ------------------------------------------------------------------------

    pub fn list_drivers(&self, filter: Option<&Filter>) -> Result<Vec<Driver>> {
        self.list_docs(Collection::Drivers, filter)
    }

    pub fn get_driver(&self, id: &str) -> Result<Option<Driver>> {
        self.get_doc(Collection::Drivers, id)
    }

    pub fn create_driver(&self, mut driver: Driver) -> Result<String> {
        if driver.created_at.is_none() {
            driver.created_at = Some(Utc::now());
        }
        self.create_doc(Collection::Drivers, &driver)
    }

    pub fn update_driver(&self, id: &str, fields: &Filter) -> Result<Option<Driver>> {
        self.update_doc(Collection::Drivers, id, fields)
    }

    // ------------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------------

    pub fn list_units(&self, filter: Option<&Filter>) -> Result<Vec<Unit>> {
        self.list_docs(Collection::Units, filter)
    }

    pub fn get_unit(&self, id: &str) -> Result<Option<Unit>> {
        self.get_doc(Collection::Units, id)
    }

    pub fn create_unit(&self, mut unit: Unit) -> Result<String> {
        if unit.created_at.is_none() {
            unit.created_at = Some(Utc::now());
        }
        self.create_doc(Collection::Units, &unit)
    }

    pub fn update_unit(&self, id: &str, fields: &Filter) -> Result<Option<Unit>> {
        self.update_doc(Collection::Units, id, fields)
    }

    pub fn add_unit_expense(&self, unit_id: &str, expense: Expense) -> Result<Option<Unit>> {
        self.append_expense(Collection::Units, unit_id, expense)
    }

    // ------------------------------------------------------------------------
    // Trips
    // ------------------------------------------------------------------------

    pub fn list_trips(&self, filter: Option<&Filter>) -> Result<Vec<Trip>> {
        self.list_docs(Collection::Trips, filter)
    }

    pub fn get_trip(&self, id: &str) -> Result<Option<Trip>> {
        self.get_doc(Collection::Trips, id)
    }

    pub fn create_trip(&self, mut trip: Trip) -> Result<String> {
        if trip.created_at.is_none() {
            trip.created_at = Some(Utc::now());
        }
        if trip.status.is_empty() {
            trip.status = STATUS_ACTIVE.to_string();
        }
        self.create_doc(Collection::Trips, &trip)
    }

    pub fn update_trip(&self, id: &str, fields: &Filter) -> Result<Option<Trip>> {
        self.update_doc(Collection::Trips, id, fields)
    }

    pub fn add_trip_expense(&self, trip_id: &str, expense: Expense) -> Result<Option<Trip>> {
        self.append_expense(Collection::Trips, trip_id, expense)
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub fn get_exchange_rate(&self) -> Result<f64> {
        let doc = self.store.first(Collection::Settings)?;
        Ok(doc
            .as_ref()
            .and_then(|d| d.get("exchange_rate"))
            .and_then(Value::as_f64)
            .unwrap_or(self.default_exchange_rate))
    }

    pub fn set_exchange_rate(&self, rate: f64) -> Result<Option<Settings>> {
        let mut fields = Filter::new();
        fields.insert("exchange_rate".to_string(), serde_json::json!(rate));
        self.store
            .update_first(Collection::Settings, &fields)?
            .map(decode)
            .transpose()
    }

    pub fn get_primary_currency(&self) -> Result<String> {
        let doc = self.store.first(Collection::Settings)?;
        Ok(doc
            .as_ref()
            .and_then(|d| d.get("primary_currency"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string())
    }

    pub fn set_primary_currency(&self, currency: &str) -> Result<Option<Settings>> {
        let mut fields = Filter::new();
        fields.insert("primary_currency".to_string(), serde_json::json!(currency));
        self.store
            .update_first(Collection::Settings, &fields)?
            .map(decode)
            .transpose()
    }
}

fn decode<T: DeserializeOwned>(doc: Value) -> Result<T> {
    serde_json::from_value(doc).context("stored document does not match the record type")
}

/// Unlike get, writes against a malformed identifier are a caller
/// error and propagate.
fn require_id(raw: &str) -> Result<Uuid> {
    match ParsedId::parse(raw) {
        ParsedId::Valid(id) => Ok(id),
        ParsedId::Malformed => bail!("malformed document identifier: {raw:?}"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn test_config() -> Config {
        Config {
            default_exchange_rate: 1.35,
            ..Config::default()
        }
    }

    fn test_gateway() -> Gateway {
        Gateway::in_memory(&test_config()).unwrap()
    }

    #[test]
    fn construction_seeds_exactly_one_settings_record() {
        let gateway = test_gateway();

        assert_eq!(gateway.count(Collection::Settings).unwrap(), 1);
        let settings = gateway.store.first(Collection::Settings).unwrap().unwrap();
        assert_eq!(settings["exchange_rate"], json!(1.35));
        assert_eq!(settings["primary_currency"], json!("USD"));
        assert!(settings.get("created_at").is_some());

        // re-running initialization must not add a second record
        gateway.ensure_settings().unwrap();
        assert_eq!(gateway.count(Collection::Settings).unwrap(), 1);
    }

    #[test]
    fn create_driver_defaults_created_at_and_round_trips() {
        let gateway = test_gateway();
        let id = gateway
            .create_driver(Driver::new("Ray Dalton", "ray@example.com", "555-0101"))
            .unwrap();

        let driver = gateway.get_driver(&id).unwrap().unwrap();
        assert_eq!(driver.id, id);
        assert_eq!(driver.name.as_deref(), Some("Ray Dalton"));
        assert_eq!(driver.email.as_deref(), Some("ray@example.com"));
        assert!(driver.created_at.is_some(), "created_at must be defaulted");
    }

    #[test]
    fn get_with_malformed_id_is_not_found() {
        let gateway = test_gateway();
        assert!(gateway.get_driver("definitely-not-a-uuid").unwrap().is_none());
        assert!(gateway.get_unit("12345").unwrap().is_none());
        assert!(gateway.get_trip("").unwrap().is_none());
    }

    #[test]
    fn get_with_unknown_id_is_not_found() {
        let gateway = test_gateway();
        let unknown = Uuid::new_v4().to_string();
        assert!(gateway.get_trip(&unknown).unwrap().is_none());
    }

    #[test]
    fn create_trip_fills_status_expenses_and_timestamp() {
        let gateway = test_gateway();
        let trip = Trip {
            trip_number: Some("TRP-1001".to_string()),
            payment_usd: Some(1000.0),
            status: String::new(),
            ..Trip::default()
        };

        let id = gateway.create_trip(trip).unwrap();
        let stored = gateway.get_trip(&id).unwrap().unwrap();

        assert_eq!(stored.status, "active");
        assert!(stored.expenses.is_empty());
        assert!(stored.created_at.is_some());
        assert_eq!(stored.payment_usd, Some(1000.0));
        assert_eq!(stored.payment_cad, None);
    }

    #[test]
    fn update_changes_only_named_fields() {
        let gateway = test_gateway();
        let id = gateway
            .create_unit(Unit::new("U-204", "Freightliner", "Cascadia"))
            .unwrap();

        let mut fields = Filter::new();
        fields.insert("model".to_string(), json!("Cascadia Evolution"));
        let updated = gateway.update_unit(&id, &fields).unwrap().unwrap();

        assert_eq!(updated.model.as_deref(), Some("Cascadia Evolution"));
        assert_eq!(updated.number.as_deref(), Some("U-204"));
        assert_eq!(updated.make.as_deref(), Some("Freightliner"));
    }

    #[test]
    fn update_unknown_id_is_none_but_malformed_id_errors() {
        let gateway = test_gateway();
        let mut fields = Filter::new();
        fields.insert("status".to_string(), json!("completed"));

        let unknown = Uuid::new_v4().to_string();
        assert!(gateway.update_trip(&unknown, &fields).unwrap().is_none());
        assert!(gateway.update_trip("garbage", &fields).is_err());
    }

    #[test]
    fn add_expense_stamps_and_appends() {
        let gateway = test_gateway();
        let id = gateway
            .create_unit(Unit::new("U-1", "Volvo", "VNL 860"))
            .unwrap();

        let mut fields = serde_json::Map::new();
        fields.insert("amount".to_string(), json!(220.40));
        fields.insert("category".to_string(), json!("tires"));
        let unit = gateway
            .add_unit_expense(&id, Expense::new(fields))
            .unwrap()
            .unwrap();

        assert_eq!(unit.expenses.len(), 1);
        assert!(unit.expenses[0].created_at.is_some(), "expense must be stamped");
        assert_eq!(unit.expenses[0].fields["amount"], json!(220.40));
    }

    #[test]
    fn concurrent_expense_appends_lose_nothing() {
        let gateway = Arc::new(test_gateway());
        let id = gateway
            .create_trip(Trip::new("TRP-CONCURRENT"))
            .unwrap();

        const APPENDS: usize = 16;
        let mut handles = Vec::new();
        for n in 0..APPENDS {
            let gateway = Arc::clone(&gateway);
            let id = id.clone();
            handles.push(thread::spawn(move || {
                let mut fields = serde_json::Map::new();
                fields.insert("seq".to_string(), json!(n));
                gateway.add_trip_expense(&id, Expense::new(fields)).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let trip = gateway.get_trip(&id).unwrap().unwrap();
        assert_eq!(trip.expenses.len(), APPENDS, "no append may be lost");

        let mut seen: Vec<i64> = trip
            .expenses
            .iter()
            .map(|e| e.fields["seq"].as_i64().unwrap())
            .collect();
        seen.sort_unstable();
        let expected: Vec<i64> = (0..APPENDS as i64).collect();
        assert_eq!(seen, expected, "every append must land exactly once");
    }

    #[test]
    fn exchange_rate_set_then_get() {
        let gateway = test_gateway();
        assert!((gateway.get_exchange_rate().unwrap() - 1.35).abs() < f64::EPSILON);

        let updated = gateway.set_exchange_rate(1.40).unwrap().unwrap();
        assert!((updated.exchange_rate - 1.40).abs() < f64::EPSILON);
        assert!((gateway.get_exchange_rate().unwrap() - 1.40).abs() < f64::EPSILON);
    }

    #[test]
    fn primary_currency_set_then_get() {
        let gateway = test_gateway();
        assert_eq!(gateway.get_primary_currency().unwrap(), "USD");

        let updated = gateway.set_primary_currency("CAD").unwrap().unwrap();
        assert_eq!(updated.primary_currency, "CAD");
        assert_eq!(gateway.get_primary_currency().unwrap(), "CAD");
    }

    #[test]
    fn list_trips_by_status_filter() {
        let gateway = test_gateway();
        gateway.create_trip(Trip::new("TRP-1")).unwrap();
        let done_id = gateway.create_trip(Trip::new("TRP-2")).unwrap();
        let mut fields = Filter::new();
        fields.insert("status".to_string(), json!("completed"));
        gateway.update_trip(&done_id, &fields).unwrap();

        let mut filter = Filter::new();
        filter.insert("status".to_string(), json!("active"));
        let active = gateway.list_trips(Some(&filter)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].trip_number.as_deref(), Some("TRP-1"));

        let all = gateway.list_trips(None).unwrap();
        assert_eq!(all.len(), 2);
    }
}
