// Vehicle unit record.
//
// Owns an append-only sequence of expenses; entries are added through
// the gateway's atomic append, never edited or removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Expense;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unit {
    /// Store-assigned identifier; empty until the record is inserted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Append-only; always present in the stored document.
    #[serde(default)]
    pub expenses: Vec<Expense>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Unit {
    pub fn new(number: &str, make: &str, model: &str) -> Self {
        Unit {
            number: Some(number.to_string()),
            make: Some(make.to_string()),
            model: Some(model.to_string()),
            ..Unit::default()
        }
    }
}
