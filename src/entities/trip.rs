// Trip record.
//
// driver_id and unit_id are weak references: id-only, nullable, and
// never validated against the drivers/units collections at write time.
// A dangling reference is possible and accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Expense;

/// Default status tag for a freshly created trip. Status is an open set
/// of string tags ("active", "completed", ...), not a closed enum.
pub const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    /// Store-assigned identifier; empty until the record is inserted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_number: Option<String>,

    /// Weak reference to a Driver; no referential integrity enforced.
    #[serde(default)]
    pub driver_id: Option<String>,

    /// Weak reference to a Unit; no referential integrity enforced.
    #[serde(default)]
    pub unit_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_usd: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_cad: Option<f64>,

    /// Open string tag; the gateway fills "active" when absent.
    #[serde(default)]
    pub status: String,

    /// Append-only; always present in the stored document.
    #[serde(default)]
    pub expenses: Vec<Expense>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for Trip {
    fn default() -> Self {
        Trip {
            id: String::new(),
            trip_number: None,
            driver_id: None,
            unit_id: None,
            pickup_date: None,
            pickup_city: None,
            pickup_state: None,
            delivery_date: None,
            delivery_city: None,
            delivery_state: None,
            payment_usd: None,
            payment_cad: None,
            status: STATUS_ACTIVE.to_string(),
            expenses: Vec::new(),
            created_at: None,
        }
    }
}

impl Trip {
    pub fn new(trip_number: &str) -> Self {
        Trip {
            trip_number: Some(trip_number.to_string()),
            ..Trip::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_document_deserializes_with_defaults() {
        let trip: Trip = serde_json::from_value(json!({
            "trip_number": "TRP-001",
            "payment_usd": 1000.0
        }))
        .unwrap();

        assert_eq!(trip.trip_number.as_deref(), Some("TRP-001"));
        assert!(trip.driver_id.is_none());
        assert!(trip.expenses.is_empty());
        // serde's missing-field default is the empty string; the gateway
        // normalizes it to "active" on create.
        assert!(trip.status.is_empty());
    }

    #[test]
    fn weak_references_serialize_as_null() {
        let trip = Trip::new("TRP-002");
        let doc = serde_json::to_value(&trip).unwrap();
        assert!(doc["driver_id"].is_null());
        assert!(doc["unit_id"].is_null());
        assert_eq!(doc["status"], json!(STATUS_ACTIVE));
    }
}
