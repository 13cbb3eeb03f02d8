use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::model::Product;
use crate::store::ProductStore;
use crate::updater::{BatchReport, PriceUpdater, UpdateOutcome};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
    pub updater: Arc<PriceUpdater>,
    pub shutdown: tokio::sync::watch::Receiver<bool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/{name}/refresh", post(refresh_product))
        .route("/api/admin/update-all", post(update_all))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.store.list_all().await.map_err(internal)?;
    Ok(Json(products))
}

#[derive(serde::Deserialize)]
struct CreateProductReq {
    name: String,
}

async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductReq>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "empty product name".to_string()));
    }
    let product = state.store.find_or_create(name).await.map_err(internal)?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[derive(serde::Serialize)]
struct RefreshResp {
    outcome: &'static str,
    dropped: bool,
}

async fn refresh_product(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RefreshResp>, ApiError> {
    match state
        .updater
        .update_one_by_name(&name)
        .await
        .map_err(internal)?
    {
        Some(UpdateOutcome::Updated { dropped }) => Ok(Json(RefreshResp {
            outcome: "updated",
            dropped,
        })),
        Some(UpdateOutcome::Skipped) => Ok(Json(RefreshResp {
            outcome: "skipped",
            dropped: false,
        })),
        None => Err((StatusCode::NOT_FOUND, format!("unknown product: {name}"))),
    }
}

async fn update_all(State(state): State<AppState>) -> Result<Json<BatchReport>, ApiError> {
    let report = state
        .updater
        .update_all(state.shutdown.clone())
        .await
        .map_err(internal)?;
    Ok(Json(report))
}
