// Ledger Forecast - Web Server
// REST API over the ledger database with Axum

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use ledger_forecast::{
    fetch_merchant_net, fetch_user_ledger, forecast_rows, report, setup_database, Forecaster,
    LedgerConfig, LedgerError,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<LedgerConfig>,
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

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error leaving a handler: status plus message
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match err {
            LedgerError::DataShape(_) => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(kind = err.kind(), "request failed: {}", err);
        }
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("request failed: {}", message);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

impl AppState {
    /// Run `f` against the connection on the blocking pool
    async fn with_db<T, F>(&self, f: F) -> std::result::Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &LedgerConfig) -> ledger_forecast::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| ApiError::internal("database lock poisoned"))?;
            f(&conn, &config).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::internal(format!("worker failed: {}", e)))?
    }
}

#[derive(Deserialize)]
struct ForecastParams {
    test_days: Option<usize>,
    horizon: Option<usize>,
}

#[derive(Serialize)]
struct ForecastResponse {
    merchant_type_code: i64,
    model: Option<ledger_forecast::ModelSummary>,
    mean_absolute_error: Option<f64>,
    rows: Vec<ledger_forecast::ForecastRow>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/users/:user_id/transactions
async fn get_user_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<report::UserLedgerEntry>> {
    let records = state
        .with_db(move |conn, config| fetch_user_ledger(conn, &config.storage, user_id))
        .await?;
    Ok(Json(ApiResponse::ok(report::user_ledger(&records))))
}

/// GET /api/merchants/:code/net
async fn get_merchant_net(
    State(state): State<AppState>,
    Path(code): Path<i64>,
) -> ApiResult<Vec<report::MerchantNetEntry>> {
    let series = state
        .with_db(move |conn, config| {
            fetch_merchant_net(
                conn,
                &config.storage,
                code,
                config.reconciliation.match_policy,
            )
        })
        .await?;
    Ok(Json(ApiResponse::ok(report::merchant_net(&series))))
}

/// GET /api/merchants/:code/forecast?test_days=&horizon=
async fn get_merchant_forecast(
    State(state): State<AppState>,
    Path(code): Path<i64>,
    Query(params): Query<ForecastParams>,
) -> ApiResult<ForecastResponse> {
    let response = state
        .with_db(move |conn, config| {
            let series = fetch_merchant_net(
                conn,
                &config.storage,
                code,
                config.reconciliation.match_policy,
            )?;
            let test_days = params.test_days.unwrap_or(config.forecast.test_days);
            let horizon = params.horizon.unwrap_or(config.forecast.horizon);

            let result = Forecaster::from_config(&config.forecast)
                .forecast_trailing(&series, test_days, horizon)?;
            Ok(ForecastResponse {
                merchant_type_code: code,
                mean_absolute_error: result.mean_absolute_error().map(|mae| mae / 100.0),
                rows: forecast_rows(&result),
                model: result.model,
            })
        })
        .await?;
    Ok(Json(ApiResponse::ok(response)))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_forecast=info,ledger_server=info".into()),
        )
        .init();

    // Optional config path as the only argument
    let config = match std::env::args().nth(1) {
        Some(path) => LedgerConfig::load(std::path::Path::new(&path))
            .with_context(|| format!("loading config {}", path))?,
        None => LedgerConfig::default(),
    };

    let db_path = &config.storage.database_path;
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    setup_database(&conn, &config.storage)?;
    info!(path = %db_path.display(), "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/users/:user_id/transactions", get(get_user_transactions))
        .route("/merchants/:code/net", get(get_merchant_net))
        .route("/merchants/:code/forecast", get(get_merchant_forecast))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = std::env::var("LEDGER_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "server running");

    axum::serve(listener, app).await.context("server stopped")?;
    Ok(())
}
