// Document Store
//
// Emulates a document database over SQLite: one table per collection,
// each row holding a JSON document in a TEXT column keyed by a
// store-assigned UUID. Field-level merges and array appends go through
// the JSON1 functions (json_set / json_insert), so each one is a single
// UPDATE statement and therefore atomic per document. A Mutex around
// the connection serializes statements, which is the only concurrency
// guarantee this layer gives (no multi-document transactions).

use anyhow::{bail, ensure, Context, Result};
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Fixed fallback database name, used when the endpoint does not
/// designate one.
pub const DEFAULT_DB_FILE: &str = "trucker_profit.db";

// ============================================================================
// Collections
// ============================================================================

/// The four logical collections. A closed enum keeps table names out of
/// caller hands, so no collection name is ever spliced from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Drivers,
    Units,
    Trips,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Drivers,
        Collection::Units,
        Collection::Trips,
        Collection::Settings,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Collection::Drivers => "drivers",
            Collection::Units => "units",
            Collection::Trips => "trips",
            Collection::Settings => "settings",
        }
    }
}

/// Conjunction of field-equality constraints. An empty filter matches
/// every document. BTreeMap keeps generated SQL deterministic.
pub type Filter = BTreeMap<String, Value>;

// ============================================================================
// Identifier parsing
// ============================================================================

/// Outcome of parsing a caller-supplied identifier string into the
/// store's native format. Callers match on this instead of catching a
/// parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedId {
    Valid(Uuid),
    Malformed,
}

impl ParsedId {
    pub fn parse(raw: &str) -> ParsedId {
        match Uuid::parse_str(raw) {
            Ok(id) => ParsedId::Valid(id),
            Err(_) => ParsedId::Malformed,
        }
    }
}

// ============================================================================
// Endpoint resolution
// ============================================================================

/// Resolve a connection string to a database file path.
///
/// Accepts an optional `sqlite:` scheme prefix. If the endpoint does
/// not designate a database file (empty, trailing separator, or an
/// existing directory), the fixed default name is used under that
/// location. `Path::is_dir` reports false on any probe failure, so a
/// bad endpoint falls through to plain-file treatment instead of
/// raising here.
pub(crate) fn resolve_endpoint(endpoint: &str) -> PathBuf {
    let raw = endpoint.strip_prefix("sqlite:").unwrap_or(endpoint).trim();
    if raw.is_empty() {
        return PathBuf::from(DEFAULT_DB_FILE);
    }

    let path = Path::new(raw);
    let names_directory =
        raw.ends_with('/') || raw.ends_with(std::path::MAIN_SEPARATOR) || path.is_dir();
    if names_directory {
        path.join(DEFAULT_DB_FILE)
    } else {
        path.to_path_buf()
    }
}

// ============================================================================
// Store
// ============================================================================

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at the configured endpoint and ensure
    /// all collection tables exist.
    pub fn open(endpoint: &str) -> Result<Store> {
        let raw = endpoint.strip_prefix("sqlite:").unwrap_or(endpoint).trim();
        if raw == ":memory:" {
            return Store::in_memory();
        }

        let path = resolve_endpoint(endpoint);
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;

        // WAL for crash recovery, file-backed connections only
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::setup(&conn)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and tooling.
    pub fn in_memory() -> Result<Store> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::setup(&conn)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    fn setup(conn: &Connection) -> Result<()> {
        for collection in Collection::ALL {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id TEXT PRIMARY KEY,
                        doc TEXT NOT NULL
                    )",
                    collection.table()
                ),
                [],
            )?;
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection mutex poisoned"))
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn count(&self, collection: Collection) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", collection.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// All documents matching the filter, in natural (insertion) order.
    /// An empty or absent filter matches everything; an empty result is
    /// an empty vector, never an error.
    pub fn find(&self, collection: Collection, filter: Option<&Filter>) -> Result<Vec<Value>> {
        let conn = self.conn()?;

        let mut sql = format!("SELECT doc FROM {}", collection.table());
        let mut clauses: Vec<String> = Vec::new();
        let mut bindings: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(filter) = filter {
            for (field, value) in filter {
                let path = json_path(field)?;
                if value.is_null() {
                    clauses.push(format!("json_extract(doc, '{path}') IS NULL"));
                } else {
                    bindings.push(scalar_binding(field, value)?);
                    clauses.push(format!("json_extract(doc, '{path}') = ?{}", bindings.len()));
                }
            }
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bindings), |row| row.get::<_, String>(0))?;

        let mut docs = Vec::new();
        for raw in rows {
            docs.push(parse_doc(&raw?)?);
        }
        Ok(docs)
    }

    pub fn find_by_id(&self, collection: Collection, id: &Uuid) -> Result<Option<Value>> {
        let conn = self.conn()?;
        Self::select_by_id(&conn, collection, id)
    }

    /// Earliest document in the collection (lowest rowid), which keeps
    /// singleton reads well-defined even if duplicates ever exist.
    pub fn first(&self, collection: Collection) -> Result<Option<Value>> {
        let conn = self.conn()?;
        Self::select_first(&conn, collection)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Insert a document, assigning and injecting its identifier.
    /// Returns the new identifier.
    pub fn insert(&self, collection: Collection, mut doc: Value) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        doc.as_object_mut()
            .context("document must be a JSON object")?
            .insert("id".to_string(), Value::String(id.clone()));

        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO {} (id, doc) VALUES (?1, ?2)", collection.table()),
            params![id, doc.to_string()],
        )?;
        Ok(id)
    }

    /// Field-level merge: only the named fields change. Returns the
    /// post-merge document, or None when no document matched.
    pub fn update_by_id(
        &self,
        collection: Collection,
        id: &Uuid,
        fields: &Filter,
    ) -> Result<Option<Value>> {
        let conn = self.conn()?;
        if fields.is_empty() {
            return Self::select_by_id(&conn, collection, id);
        }

        let (set_expr, mut bindings) = build_merge(fields)?;
        bindings.push(rusqlite::types::Value::Text(id.to_string()));
        let sql = format!(
            "UPDATE {} SET doc = {set_expr} WHERE id = ?{}",
            collection.table(),
            bindings.len()
        );

        let changed = conn.execute(&sql, params_from_iter(bindings))?;
        if changed == 0 {
            return Ok(None);
        }
        Self::select_by_id(&conn, collection, id)
    }

    /// Field-level merge against the earliest document in the
    /// collection. Returns the post-merge document, or None when the
    /// collection is empty.
    pub fn update_first(&self, collection: Collection, fields: &Filter) -> Result<Option<Value>> {
        let conn = self.conn()?;
        if fields.is_empty() {
            return Self::select_first(&conn, collection);
        }

        let (set_expr, bindings) = build_merge(fields)?;
        let table = collection.table();
        let sql = format!(
            "UPDATE {table} SET doc = {set_expr} \
             WHERE rowid = (SELECT MIN(rowid) FROM {table})"
        );

        let changed = conn.execute(&sql, params_from_iter(bindings))?;
        if changed == 0 {
            return Ok(None);
        }
        Self::select_first(&conn, collection)
    }

    /// Atomically append an element to an array field and return the
    /// post-append document, or None when no document matched. The
    /// append and read-back happen under one connection guard; the
    /// UPDATE itself is a single statement, so concurrent appends never
    /// lose entries. The target array must already exist in the
    /// document (inserts always write `expenses: []`).
    pub fn push(
        &self,
        collection: Collection,
        id: &Uuid,
        field: &str,
        element: &Value,
    ) -> Result<Option<Value>> {
        let path = json_path(field)?;
        let conn = self.conn()?;
        let sql = format!(
            "UPDATE {} SET doc = json_insert(doc, '{path}[#]', json(?1)) WHERE id = ?2",
            collection.table()
        );

        let changed = conn.execute(&sql, params![element.to_string(), id.to_string()])?;
        if changed == 0 {
            return Ok(None);
        }
        Self::select_by_id(&conn, collection, id)
    }

    // ------------------------------------------------------------------------
    // Shared row access (single lock guard)
    // ------------------------------------------------------------------------

    fn select_by_id(conn: &Connection, collection: Collection, id: &Uuid) -> Result<Option<Value>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT doc FROM {} WHERE id = ?1",
            collection.table()
        ))?;
        let mut rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(raw) => Ok(Some(parse_doc(&raw?)?)),
            None => Ok(None),
        }
    }

    fn select_first(conn: &Connection, collection: Collection) -> Result<Option<Value>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT doc FROM {} ORDER BY rowid LIMIT 1",
            collection.table()
        ))?;
        let mut rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(raw) => Ok(Some(parse_doc(&raw?)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// SQL fragment helpers
// ============================================================================

fn parse_doc(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("stored document is not valid JSON")
}

/// JSON path for a field name. Names are restricted to alphanumerics
/// and underscore so nothing caller-supplied is spliced into SQL.
fn json_path(field: &str) -> Result<String> {
    ensure!(
        !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "invalid field name {field:?}: expected [A-Za-z0-9_]+"
    );
    Ok(format!("$.{field}"))
}

/// Bindable SQL value for a scalar filter constraint. json_extract
/// yields integers for JSON booleans, so booleans bind as 0/1.
fn scalar_binding(field: &str, value: &Value) -> Result<rusqlite::types::Value> {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Bool(b) => Ok(Sql::Integer(*b as i64)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Sql::Integer(i))
            } else {
                let f = n
                    .as_f64()
                    .with_context(|| format!("filter value for {field:?} is out of range"))?;
                Ok(Sql::Real(f))
            }
        }
        Value::String(s) => Ok(Sql::Text(s.clone())),
        _ => bail!("filter value for {field:?} must be a scalar"),
    }
}

/// json_set expression applying a field-level merge. Each value binds
/// as serialized JSON through json(?), so nulls set JSON null instead
/// of dropping the key.
fn build_merge(fields: &Filter) -> Result<(String, Vec<rusqlite::types::Value>)> {
    let mut expr = String::from("json_set(doc");
    let mut bindings: Vec<rusqlite::types::Value> = Vec::new();
    for (field, value) in fields {
        let path = json_path(field)?;
        bindings.push(rusqlite::types::Value::Text(value.to_string()));
        expr.push_str(&format!(", '{path}', json(?{})", bindings.len()));
    }
    expr.push(')');
    Ok((expr, bindings))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_store() -> Store {
        Store::in_memory().unwrap()
    }

    #[test]
    fn insert_assigns_and_injects_id() {
        let store = sample_store();
        let id = store
            .insert(Collection::Drivers, json!({"name": "Ray"}))
            .unwrap();

        let parsed = Uuid::parse_str(&id).expect("assigned id must be a UUID");
        let doc = store.find_by_id(Collection::Drivers, &parsed).unwrap().unwrap();
        assert_eq!(doc["id"], json!(id));
        assert_eq!(doc["name"], json!("Ray"));
    }

    #[test]
    fn find_with_equality_filter() {
        let store = sample_store();
        store
            .insert(Collection::Trips, json!({"status": "active", "payment_usd": 1000.0}))
            .unwrap();
        store
            .insert(Collection::Trips, json!({"status": "completed", "payment_usd": 900.0}))
            .unwrap();

        let mut filter = Filter::new();
        filter.insert("status".to_string(), json!("active"));
        let active = store.find(Collection::Trips, Some(&filter)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["payment_usd"], json!(1000.0));

        // empty filter matches everything
        let all = store.find(Collection::Trips, None).unwrap();
        assert_eq!(all.len(), 2);

        // no match is an empty vector, not an error
        filter.insert("status".to_string(), json!("cancelled"));
        assert!(store.find(Collection::Trips, Some(&filter)).unwrap().is_empty());
    }

    #[test]
    fn filter_rejects_unsafe_field_names() {
        let store = sample_store();
        let mut filter = Filter::new();
        filter.insert("name'; DROP TABLE drivers; --".to_string(), json!("x"));
        assert!(store.find(Collection::Drivers, Some(&filter)).is_err());
    }

    #[test]
    fn update_merges_only_named_fields() {
        let store = sample_store();
        let id = store
            .insert(
                Collection::Units,
                json!({"number": "U-100", "make": "Volvo", "model": "VNL 860"}),
            )
            .unwrap();
        let id = Uuid::parse_str(&id).unwrap();

        let mut fields = Filter::new();
        fields.insert("model".to_string(), json!("VNL 760"));
        let updated = store.update_by_id(Collection::Units, &id, &fields).unwrap().unwrap();

        assert_eq!(updated["model"], json!("VNL 760"));
        assert_eq!(updated["number"], json!("U-100"), "unnamed field must not change");
        assert_eq!(updated["make"], json!("Volvo"), "unnamed field must not change");
    }

    #[test]
    fn update_with_null_sets_null_instead_of_dropping_key() {
        let store = sample_store();
        let id = store
            .insert(Collection::Trips, json!({"driver_id": "d-1", "status": "active"}))
            .unwrap();
        let id = Uuid::parse_str(&id).unwrap();

        let mut fields = Filter::new();
        fields.insert("driver_id".to_string(), Value::Null);
        let updated = store.update_by_id(Collection::Trips, &id, &fields).unwrap().unwrap();
        assert!(updated["driver_id"].is_null());
        assert!(updated.as_object().unwrap().contains_key("driver_id"));
    }

    #[test]
    fn update_unknown_id_is_none() {
        let store = sample_store();
        let mut fields = Filter::new();
        fields.insert("name".to_string(), json!("ghost"));
        let missing = store
            .update_by_id(Collection::Drivers, &Uuid::new_v4(), &fields)
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn update_first_targets_earliest_document() {
        let store = sample_store();
        store
            .insert(Collection::Settings, json!({"exchange_rate": 1.35}))
            .unwrap();
        store
            .insert(Collection::Settings, json!({"exchange_rate": 9.99}))
            .unwrap();

        let mut fields = Filter::new();
        fields.insert("exchange_rate".to_string(), json!(1.40));
        let updated = store.update_first(Collection::Settings, &fields).unwrap().unwrap();
        assert_eq!(updated["exchange_rate"], json!(1.40));

        // the later duplicate is untouched
        let all = store.find(Collection::Settings, None).unwrap();
        assert_eq!(all[1]["exchange_rate"], json!(9.99));
    }

    #[test]
    fn update_first_on_empty_collection_is_none() {
        let store = sample_store();
        let mut fields = Filter::new();
        fields.insert("exchange_rate".to_string(), json!(1.40));
        assert!(store.update_first(Collection::Settings, &fields).unwrap().is_none());
    }

    #[test]
    fn push_appends_in_order() {
        let store = sample_store();
        let id = store
            .insert(Collection::Units, json!({"number": "U-1", "expenses": []}))
            .unwrap();
        let id = Uuid::parse_str(&id).unwrap();

        store
            .push(Collection::Units, &id, "expenses", &json!({"amount": 10}))
            .unwrap();
        let doc = store
            .push(Collection::Units, &id, "expenses", &json!({"amount": 20}))
            .unwrap()
            .unwrap();

        let expenses = doc["expenses"].as_array().unwrap();
        assert_eq!(expenses.len(), 2);
        assert_eq!(expenses[0]["amount"], json!(10));
        assert_eq!(expenses[1]["amount"], json!(20));
    }

    #[test]
    fn push_to_unknown_parent_is_none() {
        let store = sample_store();
        let missing = store
            .push(Collection::Units, &Uuid::new_v4(), "expenses", &json!({}))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn parsed_id_distinguishes_malformed() {
        assert!(matches!(
            ParsedId::parse("not-an-identifier"),
            ParsedId::Malformed
        ));
        let id = Uuid::new_v4();
        assert_eq!(ParsedId::parse(&id.to_string()), ParsedId::Valid(id));
    }

    #[test]
    fn endpoint_resolution_falls_back_to_default_name() {
        assert_eq!(resolve_endpoint(""), PathBuf::from(DEFAULT_DB_FILE));
        assert_eq!(
            resolve_endpoint("sqlite:data/"),
            PathBuf::from("data").join(DEFAULT_DB_FILE)
        );
        assert_eq!(
            resolve_endpoint("sqlite:data/fleet.db"),
            PathBuf::from("data/fleet.db")
        );
        assert_eq!(resolve_endpoint("fleet.db"), PathBuf::from("fleet.db"));
    }
}
