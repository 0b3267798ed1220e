//! The plugin RPC surface: JSON-over-HTTP on the unix socket.
//!
//! One POST route per lifecycle operation, mirroring the engine's
//! network-driver protocol. Failed operations answer with HTTP 500 and an
//! `Err` envelope, which is how the engine's plugin client expects errors.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use dwgd_proto::{
    ActivateResponse, CapabilitiesResponse, CreateEndpointRequest, CreateEndpointResponse,
    CreateNetworkRequest, DeleteEndpointRequest, DeleteNetworkRequest, ErrorResponse, InfoRequest,
    InfoResponse, JoinRequest, JoinResponse, LeaveRequest,
};
use dwgd_wireguard::WgControl;

use crate::commander::Commander;
use crate::driver::Driver;
use crate::error::DriverError;

/// Error wrapper translating [`DriverError`] into a plugin RPC failure.
struct RpcError(DriverError);

impl<E: Into<DriverError>> From<E> for RpcError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            err: self.0.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Builds the plugin router over a shared driver.
pub fn router<C, W>(driver: Arc<Driver<C, W>>) -> Router
where
    C: Commander + 'static,
    W: WgControl + 'static,
{
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/NetworkDriver.GetCapabilities", post(get_capabilities::<C, W>))
        .route("/NetworkDriver.CreateNetwork", post(create_network::<C, W>))
        .route("/NetworkDriver.DeleteNetwork", post(delete_network::<C, W>))
        .route("/NetworkDriver.CreateEndpoint", post(create_endpoint::<C, W>))
        .route("/NetworkDriver.DeleteEndpoint", post(delete_endpoint::<C, W>))
        .route("/NetworkDriver.EndpointOperInfo", post(endpoint_info::<C, W>))
        .route("/NetworkDriver.Join", post(join::<C, W>))
        .route("/NetworkDriver.Leave", post(leave::<C, W>))
        .with_state(driver)
}

async fn activate() -> Json<ActivateResponse> {
    Json(ActivateResponse::default())
}

async fn get_capabilities<C: Commander + 'static, W: WgControl + 'static>(
    State(driver): State<Arc<Driver<C, W>>>,
) -> Json<CapabilitiesResponse> {
    Json(driver.get_capabilities())
}

async fn create_network<C: Commander + 'static, W: WgControl + 'static>(
    State(driver): State<Arc<Driver<C, W>>>,
    Json(request): Json<CreateNetworkRequest>,
) -> Result<Json<Value>, RpcError> {
    driver.create_network(&request).await?;
    Ok(Json(json!({})))
}

async fn delete_network<C: Commander + 'static, W: WgControl + 'static>(
    State(driver): State<Arc<Driver<C, W>>>,
    Json(request): Json<DeleteNetworkRequest>,
) -> Result<Json<Value>, RpcError> {
    driver.delete_network(&request).await?;
    Ok(Json(json!({})))
}

async fn create_endpoint<C: Commander + 'static, W: WgControl + 'static>(
    State(driver): State<Arc<Driver<C, W>>>,
    Json(request): Json<CreateEndpointRequest>,
) -> Result<Json<CreateEndpointResponse>, RpcError> {
    Ok(Json(driver.create_endpoint(&request).await?))
}

async fn delete_endpoint<C: Commander + 'static, W: WgControl + 'static>(
    State(driver): State<Arc<Driver<C, W>>>,
    Json(request): Json<DeleteEndpointRequest>,
) -> Result<Json<Value>, RpcError> {
    driver.delete_endpoint(&request).await?;
    Ok(Json(json!({})))
}

async fn endpoint_info<C: Commander + 'static, W: WgControl + 'static>(
    State(driver): State<Arc<Driver<C, W>>>,
    Json(request): Json<InfoRequest>,
) -> Result<Json<InfoResponse>, RpcError> {
    Ok(Json(driver.endpoint_info(&request).await?))
}

async fn join<C: Commander + 'static, W: WgControl + 'static>(
    State(driver): State<Arc<Driver<C, W>>>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, RpcError> {
    Ok(Json(driver.join(&request).await?))
}

async fn leave<C: Commander + 'static, W: WgControl + 'static>(
    State(driver): State<Arc<Driver<C, W>>>,
    Json(request): Json<LeaveRequest>,
) -> Result<Json<Value>, RpcError> {
    driver.leave(&request).await?;
    Ok(Json(json!({})))
}
