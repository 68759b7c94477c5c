// Settings singleton record.
//
// Exactly one settings record exists after gateway construction. Reads
// and writes always target the earliest record so behavior stays
// well-defined even if duplicates ever appear under a race (an accepted
// gap, not prevented here).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Store-assigned identifier; empty until the record is inserted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// USD -> CAD conversion factor.
    pub exchange_rate: f64,

    #[serde(default = "default_currency")]
    pub primary_currency: String,

    pub created_at: DateTime<Utc>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Settings {
    pub fn new(exchange_rate: f64) -> Self {
        Settings {
            id: String::new(),
            exchange_rate,
            primary_currency: default_currency(),
            created_at: Utc::now(),
        }
    }
}
