//! Price history and live price endpoints.
//!
//! Read-only consumers of the store the sampler writes; the live endpoint
//! proxies the upstream source directly.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use monitor_core::{PriceQuote, PriceSample};
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct PricesQuery {
    pub coin: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub fn price_routes() -> Router<AppState> {
    Router::new()
        .route("/api/prices", get(get_prices))
        .route("/api/live-prices", get(get_live_prices))
}

async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<ApiResponse<Vec<PriceSample>>>, AppError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let samples = state
        .store
        .query(query.coin.as_deref(), limit)
        .await
        .map_err(|e| anyhow::anyhow!("Price query failed: {}", e))?;

    Ok(Json(ApiResponse::success(samples)))
}

async fn get_live_prices(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<HashMap<String, PriceQuote>>>, AppError> {
    let quotes = state
        .source
        .fetch(&state.coins)
        .await
        .map_err(|e| anyhow::anyhow!("Live price fetch failed: {}", e))?;

    Ok(Json(ApiResponse::success(quotes)))
}
