//! Long-running HTTP service over one shared [`LedgerEngine`].
//!
//! Routes:
//! - `POST /v1/create` creates a wallet.
//! - `POST /v1/wallet` applies `{"walletId", "operationType", "amount"}`.
//! - `GET /v1/wallets/:wallet_id` reads a balance.
//!
//! Every reply, including rejected request bodies, is a [`Response`] envelope.

use super::response::Response;
use crate::application::engine::LedgerEngine;
use crate::domain::wallet::WalletId;
use crate::error::{ErrorKind, LedgerError, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Body of `POST /v1/wallet`.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "walletId", alias = "valletId")]
    pub wallet_id: String,
    #[serde(rename = "operationType")]
    pub operation_type: String,
    pub amount: i64,
}

/// HTTP status for a failed call.
pub fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput | ErrorKind::InvalidOperation => StatusCode::BAD_REQUEST,
        ErrorKind::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn reply(outcome: Result<Response>) -> axum::response::Response {
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (status_code(err.kind()), Json(Response::failure(&err))).into_response(),
    }
}

async fn create_wallet(State(engine): State<LedgerEngine>) -> impl IntoResponse {
    reply(engine.create().await.map(Response::created))
}

async fn update_balance(
    State(engine): State<LedgerEngine>,
    body: std::result::Result<Json<UpdateRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let response = Response::rejected(ErrorKind::InvalidInput, rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    reply(
        engine
            .apply_request(&request.wallet_id, &request.operation_type, request.amount)
            .await
            .map(Response::balance),
    )
}

async fn get_balance(
    State(engine): State<LedgerEngine>,
    Path(wallet_id): Path<String>,
) -> impl IntoResponse {
    let outcome = match wallet_id.parse::<WalletId>() {
        Ok(id) => engine.balance(&id).await.map(Response::balance),
        Err(err) => Err(err),
    };
    reply(outcome)
}

/// Builds the router; the engine is shared by every request.
pub fn router(engine: LedgerEngine) -> Router {
    Router::new()
        .route("/v1/create", post(create_wallet))
        .route("/v1/wallet", post(update_balance))
        .route("/v1/wallets/:wallet_id", get(get_balance))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(engine: LedgerEngine, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(LedgerError::store)?;
    info!(%addr, "wallet ledger listening");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(LedgerError::store)?;

    info!("wallet ledger stopped");
    Ok(())
}
