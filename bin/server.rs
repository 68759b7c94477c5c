// Fleet Profit System - Web Server
// REST API over the repository gateway

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use fleet_profit::{Config, Expense, Filter, Gateway};

/// Shared application state
#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn fail(message: &str) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.to_string()),
        }
    }
}

#[derive(Serialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Deserialize)]
struct ExchangeRatePayload {
    exchange_rate: f64,
}

#[derive(Deserialize)]
struct CurrencyPayload {
    primary_currency: String,
}

// ============================================================================
// Response helpers
// ============================================================================

fn json_ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::fail(&format!("{what} not found"))),
    )
        .into_response()
}

fn internal_error(err: anyhow::Error) -> Response {
    eprintln!("Error: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::fail("internal error")),
    )
        .into_response()
}

/// Query-string parameters as an equality filter. Values that look
/// numeric or boolean are matched as such, everything else as text.
fn query_filter(params: &HashMap<String, String>) -> Option<Filter> {
    if params.is_empty() {
        return None;
    }
    let mut filter = Filter::new();
    for (field, raw) in params {
        let value = if let Ok(i) = raw.parse::<i64>() {
            serde_json::json!(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            serde_json::json!(f)
        } else if raw == "true" || raw == "false" {
            serde_json::json!(raw == "true")
        } else {
            serde_json::json!(raw)
        };
        filter.insert(field.clone(), value);
    }
    Some(filter)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

macro_rules! entity_handlers {
    ($list:ident, $get:ident, $create:ident, $update:ident,
     $entity:ty, $list_op:ident, $get_op:ident, $create_op:ident, $update_op:ident, $label:literal) => {
        async fn $list(
            State(state): State<AppState>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Response {
            let filter = query_filter(&params);
            match state.gateway.$list_op(filter.as_ref()) {
                Ok(records) => json_ok(records),
                Err(e) => internal_error(e),
            }
        }

        async fn $get(State(state): State<AppState>, Path(id): Path<String>) -> Response {
            match state.gateway.$get_op(&id) {
                Ok(Some(record)) => json_ok(record),
                Ok(None) => not_found($label),
                Err(e) => internal_error(e),
            }
        }

        async fn $create(State(state): State<AppState>, Json(record): Json<$entity>) -> Response {
            match state.gateway.$create_op(record) {
                Ok(id) => (
                    StatusCode::CREATED,
                    Json(ApiResponse::ok(CreatedResponse { id })),
                )
                    .into_response(),
                Err(e) => internal_error(e),
            }
        }

        async fn $update(
            State(state): State<AppState>,
            Path(id): Path<String>,
            Json(fields): Json<Filter>,
        ) -> Response {
            match state.gateway.$update_op(&id, &fields) {
                Ok(Some(record)) => json_ok(record),
                Ok(None) => not_found($label),
                Err(e) => internal_error(e),
            }
        }
    };
}

entity_handlers!(
    list_drivers, get_driver, create_driver, update_driver,
    fleet_profit::Driver, list_drivers, get_driver, create_driver, update_driver, "driver"
);
entity_handlers!(
    list_units, get_unit, create_unit, update_unit,
    fleet_profit::Unit, list_units, get_unit, create_unit, update_unit, "unit"
);
entity_handlers!(
    list_trips, get_trip, create_trip, update_trip,
    fleet_profit::Trip, list_trips, get_trip, create_trip, update_trip, "trip"
);

/// POST /api/units/:id/expenses - Append an expense to a unit
async fn add_unit_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(expense): Json<Expense>,
) -> Response {
    match state.gateway.add_unit_expense(&id, expense) {
        Ok(Some(unit)) => json_ok(unit),
        Ok(None) => not_found("unit"),
        Err(e) => internal_error(e),
    }
}

/// POST /api/trips/:id/expenses - Append an expense to a trip
async fn add_trip_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(expense): Json<Expense>,
) -> Response {
    match state.gateway.add_trip_expense(&id, expense) {
        Ok(Some(trip)) => json_ok(trip),
        Ok(None) => not_found("trip"),
        Err(e) => internal_error(e),
    }
}

/// GET /api/settings/exchange-rate
async fn get_exchange_rate(State(state): State<AppState>) -> Response {
    match state.gateway.get_exchange_rate() {
        Ok(rate) => json_ok(serde_json::json!({ "exchange_rate": rate })),
        Err(e) => internal_error(e),
    }
}

/// PUT /api/settings/exchange-rate
async fn set_exchange_rate(
    State(state): State<AppState>,
    Json(payload): Json<ExchangeRatePayload>,
) -> Response {
    match state.gateway.set_exchange_rate(payload.exchange_rate) {
        Ok(Some(settings)) => json_ok(settings),
        Ok(None) => not_found("settings"),
        Err(e) => internal_error(e),
    }
}

/// GET /api/settings/currency
async fn get_primary_currency(State(state): State<AppState>) -> Response {
    match state.gateway.get_primary_currency() {
        Ok(currency) => json_ok(serde_json::json!({ "primary_currency": currency })),
        Err(e) => internal_error(e),
    }
}

/// PUT /api/settings/currency
async fn set_primary_currency(
    State(state): State<AppState>,
    Json(payload): Json<CurrencyPayload>,
) -> Response {
    match state.gateway.set_primary_currency(&payload.primary_currency) {
        Ok(Some(settings)) => json_ok(settings),
        Ok(None) => not_found("settings"),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("🚚 Fleet Profit System - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env()?;
    let gateway = Gateway::new(&config)?;
    println!("✓ Store opened: {}", config.store_endpoint);

    let state = AppState {
        gateway: Arc::new(gateway),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/drivers", get(list_drivers).post(create_driver))
        .route("/drivers/:id", get(get_driver).patch(update_driver))
        .route("/units", get(list_units).post(create_unit))
        .route("/units/:id", get(get_unit).patch(update_unit))
        .route("/units/:id/expenses", axum::routing::post(add_unit_expense))
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/:id", get(get_trip).patch(update_trip))
        .route("/trips/:id/expenses", axum::routing::post(add_trip_expense))
        .route(
            "/settings/exchange-rate",
            get(get_exchange_rate).put(set_exchange_rate),
        )
        .route(
            "/settings/currency",
            get(get_primary_currency).put(set_primary_currency),
        )
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr =
        std::env::var("FLEET_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{addr}");
    println!("   API: http://{addr}/api/trips");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
