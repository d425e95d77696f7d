mod price_routes;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use coingecko_client::CoinGeckoClient;
use monitor_core::PriceSource;
use price_store::PriceStore;
use serde::Serialize;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub store: PriceStore,
    pub source: Arc<dyn PriceSource>,
    pub coins: Arc<Vec<String>>,
}

/// Uniform JSON envelope for successful responses.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Route-level error: anything anyhow-convertible becomes a 500 with a JSON
/// body.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(price_routes::price_routes())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Binds the listener and serves until the process is stopped.
pub async fn run_server() -> anyhow::Result<()> {
    let config = ApiConfig::from_env()?;

    sqlx::any::install_default_drivers();
    let pool = sqlx::AnyPool::connect(&config.database_url).await?;
    let store = PriceStore::new(pool, config.vs_currency.clone());
    store.init_tables().await?;

    let source: Arc<dyn PriceSource> = Arc::new(CoinGeckoClient::new(
        config.coingecko_base_url.clone(),
        config.vs_currency.clone(),
    ));

    let state = AppState {
        store,
        source,
        coins: Arc::new(config.coins.clone()),
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Read-side server settings, loaded from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub database_url: String,
    pub vs_currency: String,
    pub coingecko_base_url: String,
    pub coins: Vec<String>,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let coins = std::env::var("TRACKED_COINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://crypto.db?mode=rwc".to_string()),
            vs_currency: std::env::var("VS_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            coingecko_base_url: std::env::var("COINGECKO_BASE_URL")
                .unwrap_or_else(|_| coingecko_client::DEFAULT_BASE_URL.to_string()),
            coins,
        })
    }
}
