// Expense line item, embedded in a Unit or Trip expenses sequence.
//
// Expenses are free-form: beyond created_at, every attribute lives in a
// flattened open map so callers can attach whatever cost breakdown they
// track (amount, category, receipt reference, ...) without a schema
// change here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expense {
    /// Stamped by the gateway at append time if the caller left it out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Free-form expense attributes.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Expense {
    /// Build an expense from free-form attributes, timestamp unset.
    pub fn new(fields: Map<String, Value>) -> Self {
        Expense {
            created_at: None,
            fields,
        }
    }

    /// Fill created_at with the current UTC time if absent.
    pub fn stamp(&mut self) {
        if self.created_at.is_none() {
            self.created_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn free_form_fields_round_trip() {
        let raw = json!({
            "amount": 89.5,
            "category": "fuel",
            "receipt": "r-1042.pdf"
        });

        let expense: Expense = serde_json::from_value(raw).unwrap();
        assert!(expense.created_at.is_none());
        assert_eq!(expense.fields["amount"], json!(89.5));
        assert_eq!(expense.fields["category"], json!("fuel"));

        let back = serde_json::to_value(&expense).unwrap();
        assert_eq!(back["receipt"], json!("r-1042.pdf"));
        assert!(back.get("created_at").is_none(), "unset timestamp must not serialize");
    }

    #[test]
    fn stamp_only_fills_missing_timestamp() {
        let mut expense = Expense::default();
        expense.stamp();
        let first = expense.created_at.unwrap();

        expense.stamp();
        assert_eq!(expense.created_at.unwrap(), first, "stamp must not overwrite");
    }
}
