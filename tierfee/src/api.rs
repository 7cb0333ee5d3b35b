// src/api.rs
// Axum-based query API for the tiered fee module
use crate::error::TierFeeError;
use crate::keeper::Keeper;
use crate::storage::KvStore;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use log::{error, info};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

type ApiResult = Result<Response, ApiError>;

/// Query failure rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(TierFeeError);

impl From<TierFeeError> for ApiError {
    fn from(e: TierFeeError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TierFeeError::InvalidTier { .. }
            | TierFeeError::MalformedTx(_)
            | TierFeeError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            TierFeeError::NotFound(_) => StatusCode::NOT_FOUND,
            other => {
                error!("query failed: {}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body_json = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body_json)).into_response()
    }
}

fn ok<T: Serialize>(body: T) -> ApiResult {
    Ok((StatusCode::OK, Json(body)).into_response())
}

///////////////////////////////////////////////////////////////////////////
// GET /tieredfee/v1/*

async fn get_params<S>(Extension(keeper): Extension<Arc<Keeper<S>>>) -> ApiResult
where
    S: KvStore + Send + Sync + 'static,
{
    ok(keeper.query_params()?)
}

async fn get_gas_prices<S>(Extension(keeper): Extension<Arc<Keeper<S>>>) -> ApiResult
where
    S: KvStore + Send + Sync + 'static,
{
    ok(keeper.query_gas_prices()?)
}

async fn get_gas_price<S>(
    Path(tier): Path<u32>,
    Extension(keeper): Extension<Arc<Keeper<S>>>,
) -> ApiResult
where
    S: KvStore + Send + Sync + 'static,
{
    ok(keeper.query_gas_price(tier)?)
}

async fn get_block_gas_used<S>(Extension(keeper): Extension<Arc<Keeper<S>>>) -> ApiResult
where
    S: KvStore + Send + Sync + 'static,
{
    ok(keeper.query_block_gas_used()?)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

pub fn router<S>(keeper: Arc<Keeper<S>>) -> Router
where
    S: KvStore + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/tieredfee/v1/params", get(get_params::<S>))
        .route("/tieredfee/v1/gas_prices", get(get_gas_prices::<S>))
        .route("/tieredfee/v1/gas_prices/:tier", get(get_gas_price::<S>))
        .route("/tieredfee/v1/block_gas_used", get(get_block_gas_used::<S>))
        .layer(Extension(keeper))
}

/// Bind `addr` and serve the query API until the process exits.
pub async fn serve<S>(keeper: Arc<Keeper<S>>, addr: SocketAddr) -> anyhow::Result<()>
where
    S: KvStore + Send + Sync + 'static,
{
    info!("tieredfee query API listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(router(keeper).into_make_service())
        .await?;
    Ok(())
}
