// Driver record.
//
// No uniqueness constraint beyond the store-assigned identifier; two
// drivers may share an email. password_hash arrives pre-hashed from the
// caller (credential hashing is not this layer's concern).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Driver {
    /// Store-assigned identifier; empty until the record is inserted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Driver {
    pub fn new(name: &str, email: &str, phone: &str) -> Self {
        Driver {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            phone: Some(phone.to_string()),
            ..Driver::default()
        }
    }
}
