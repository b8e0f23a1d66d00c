//! HTTP JSON front end over [`App`].

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use clarity_common::session::SessionInfo;
use clarity_common::wallet::Rejection;
use clarity_common::wallet_backend::ConnectorError;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app::{
    ActionError, App, CheckInReport, FeedView, RefreshReport, TransferReport, WalletView,
};

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    refreshing: bool,
    connected: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    reason: &'static str,
}

#[derive(Deserialize)]
struct TransferRequest {
    recipient: String,
    amount: f64,
    #[serde(default)]
    broadcast: bool,
}

#[derive(Deserialize)]
struct ConnectRequest {
    address: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: ActionError) -> ApiError {
    let (status, reason) = match &err {
        ActionError::Rejected(r @ (Rejection::CooldownActive | Rejection::InsufficientBalance)) => {
            (StatusCode::CONFLICT, r.reason())
        }
        ActionError::Rejected(r) => (StatusCode::UNPROCESSABLE_ENTITY, r.reason()),
        ActionError::Connector(ConnectorError::Cancelled) => (StatusCode::CONFLICT, "cancelled"),
        ActionError::Connector(ConnectorError::NotConnected) | ActionError::NoAddress => {
            (StatusCode::BAD_REQUEST, "not_connected")
        }
        ActionError::Connector(ConnectorError::BroadcastFailed(_)) => {
            (StatusCode::BAD_GATEWAY, "broadcast_failed")
        }
        ActionError::Connector(ConnectorError::Unavailable(_)) | ActionError::NoConnector => {
            (StatusCode::SERVICE_UNAVAILABLE, "connector_unavailable")
        }
        ActionError::RefreshInProgress => (StatusCode::CONFLICT, "refresh_in_progress"),
        ActionError::AddressChanged => (StatusCode::CONFLICT, "address_changed"),
        ActionError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            reason,
        }),
    )
}

async fn health_handler(State(app): State<Arc<App>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        refreshing: app.is_refreshing(),
        connected: app.address().await.is_some(),
    })
}

async fn wallet_handler(State(app): State<Arc<App>>) -> Json<WalletView> {
    Json(app.wallet().await)
}

async fn feed_handler(State(app): State<Arc<App>>) -> Json<FeedView> {
    Json(app.feed().await)
}

async fn check_in_handler(
    State(app): State<Arc<App>>,
) -> Result<Json<CheckInReport>, ApiError> {
    app.check_in().await.map(Json).map_err(api_error)
}

async fn transfer_handler(
    State(app): State<Arc<App>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferReport>, ApiError> {
    app.transfer(&req.recipient, req.amount, req.broadcast)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn refresh_handler(
    State(app): State<Arc<App>>,
) -> Result<Json<RefreshReport>, ApiError> {
    app.refresh().await.map(Json).map_err(api_error)
}

/// Connecting pulls chain data right away; a failed pull is reported in the
/// feed, not as a connect failure.
async fn connect_handler(
    State(app): State<Arc<App>>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = app.connect(&req.address).await.map_err(api_error)?;
    let refresh_app = app.clone();
    tokio::spawn(async move {
        if let Err(e) = refresh_app.refresh().await {
            warn!("Refresh after connect skipped: {e}");
        }
    });
    Ok(Json(session))
}

async fn disconnect_handler(State(app): State<Arc<App>>) -> Result<StatusCode, ApiError> {
    app.disconnect().await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/wallet", get(wallet_handler))
        .route("/feed", get(feed_handler))
        .route("/check-in", post(check_in_handler))
        .route("/transfer", post(transfer_handler))
        .route("/refresh", post(refresh_handler))
        .route("/connect", post(connect_handler))
        .route("/disconnect", post(disconnect_handler))
        .layer(cors)
        .with_state(app)
}

pub async fn serve(app: Arc<App>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Clarity wallet listening on {addr}");
    axum::serve(listener, router(app)).await?;
    Ok(())
}
