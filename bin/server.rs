// Expense Tracker - Web Server
// JSON API over the query, aggregation and alert engine

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Datelike;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use expense_tracker::{
    init_tracing, setup_database, Config, Criteria, Error, ExpenseService, PageRequest,
    SqliteExpenseStore, SummaryService,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<Config>,
}

impl AppState {
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Forbidden { .. } => StatusCode::FORBIDDEN,
        _ => {
            error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    year: Option<i32>,
    month: Option<u32>,
    page: Option<i64>,
    page_size: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct PeriodParams {
    year: Option<i32>,
    month: Option<u32>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/users/:user_id/expenses - One page of expenses for a period
async fn list_expenses(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<ListParams>,
) -> Response {
    let conn = state.conn();
    let store = SqliteExpenseStore::new(&conn);
    let service = ExpenseService::new(&store, &state.config.categories);

    let request = PageRequest::new(
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(state.config.page_size),
    );

    let result = Criteria::new(user_id, params.year.unwrap_or(0), params.month.unwrap_or(0))
        .and_then(|criteria| service.list(&criteria, request));

    match result {
        Ok(listing) => ApiResponse::ok(listing),
        Err(e) => error_response(e),
    }
}

/// GET /api/users/:user_id/dashboard - Totals, averages and alerts for a period
/// (defaults to the current month)
async fn dashboard(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<PeriodParams>,
) -> Response {
    let today = chrono::Local::now().date_naive();
    let year = params.year.unwrap_or(today.year());
    let month = params.month.unwrap_or(today.month());

    let conn = state.conn();
    let store = SqliteExpenseStore::new(&conn);

    let result = Criteria::new(user_id, year, month)
        .and_then(|criteria| SummaryService::new(&store).dashboard(&criteria, &state.config.budgets));

    match result {
        Ok(dashboard) => ApiResponse::ok(dashboard),
        Err(e) => error_response(e),
    }
}

/// GET /api/users/:user_id/alerts - Budget overruns for a period
/// (defaults to the current month)
async fn alerts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<PeriodParams>,
) -> Response {
    let today = chrono::Local::now().date_naive();
    let year = params.year.unwrap_or(today.year());
    let month = params.month.unwrap_or(today.month());

    let conn = state.conn();
    let store = SqliteExpenseStore::new(&conn);

    let result = Criteria::new(user_id, year, month)
        .and_then(|criteria| SummaryService::new(&store).alerts(&criteria, &state.config.budgets));

    match result {
        Ok(alerts) => ApiResponse::ok(alerts),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;

    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn).context("Failed to set up database")?;
    info!(path = ?config.database_path, "database opened");

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/users/:user_id/expenses", get(list_expenses))
        .route("/users/:user_id/dashboard", get(dashboard))
        .route("/users/:user_id/alerts", get(alerts))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = std::env::var("EXPENSE_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "server running");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
