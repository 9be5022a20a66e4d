//! Instance lifecycle API endpoints
//!
//! - POST /api/instances - create an instance and provision its session
//! - POST /api/instances/{id}/provision - re-run session provisioning
//! - POST /api/instances/{id}/pair - fetch or refresh the pairing QR
//! - GET /api/instances/{id}/status - reconcile and report connectivity
//! - POST /api/instances/{id}/disconnect - tear the session down
//! - GET /api/organizations/{organization_id}/instances - list

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiState, ErrorBody, error_response};
use crate::Error;
use crate::db::Instance;

/// Request body for creating an instance
#[derive(Debug, Deserialize)]
pub struct CreateInstanceBody {
    pub organization_id: String,
    pub label: String,
    pub phone_number: Option<String>,
}

/// Instance as returned by the API
#[derive(Debug, Serialize)]
pub struct InstanceView {
    pub id: String,
    pub organization_id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub status: &'static str,
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

impl From<Instance> for InstanceView {
    fn from(instance: Instance) -> Self {
        Self {
            id: instance.id,
            organization_id: instance.organization_id,
            label: instance.label,
            phone_number: instance.phone_number,
            status: instance.status.as_str(),
            is_connected: instance.is_connected,
            qr_code: instance.qr_code,
        }
    }
}

/// Response for session provisioning
#[derive(Debug, Serialize)]
pub struct ProvisionResponse {
    pub session_id: String,
    pub status: &'static str,
}

/// Response for a pairing attempt
#[derive(Debug, Serialize)]
pub struct PairResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

/// Create an instance row and provision its provider session
async fn create_instance(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<CreateInstanceBody>,
) -> Result<(StatusCode, Json<InstanceView>), (StatusCode, Json<ErrorBody>)> {
    let instance = state
        .instances
        .create(&body.organization_id, &body.label, body.phone_number.as_deref())
        .map_err(|e| error_response(&e))?;

    state
        .sessions
        .create(&instance.id)
        .await
        .map_err(|e| error_response(&e))?;

    let instance = state
        .instances
        .find_required(&instance.id)
        .map_err(|e| error_response(&e))?;

    Ok((StatusCode::CREATED, Json(instance.into())))
}

/// Provision the provider session for an existing instance
///
/// Recovers instances whose create-time provider call failed and left the
/// row without credentials. Idempotent: an instance that already holds
/// credentials gets its stored session id back unchanged.
async fn provision_instance(
    State(state): State<Arc<ApiState>>,
    Path(instance_id): Path<String>,
) -> Result<Json<ProvisionResponse>, (StatusCode, Json<ErrorBody>)> {
    let session_id = state
        .sessions
        .create(&instance_id)
        .await
        .map_err(|e| error_response(&e))?;

    let instance = state
        .instances
        .find_required(&instance_id)
        .map_err(|e| error_response(&e))?;

    Ok(Json(ProvisionResponse {
        session_id,
        status: instance.status.as_str(),
    }))
}

/// Fetch or refresh the pairing QR payload
///
/// A provider that has not generated the payload yet is not an error:
/// the caller gets the current status back and should retry.
async fn pair_instance(
    State(state): State<Arc<ApiState>>,
    Path(instance_id): Path<String>,
) -> Result<Json<PairResponse>, (StatusCode, Json<ErrorBody>)> {
    match state.sessions.pair(&instance_id).await {
        Ok(pairing) => Ok(Json(PairResponse {
            status: pairing.status.as_str(),
            qr_code: pairing.qr_code,
        })),
        Err(Error::PairingNotReady(_)) => {
            let instance = state
                .instances
                .find_required(&instance_id)
                .map_err(|e| error_response(&e))?;
            Ok(Json(PairResponse {
                status: instance.status.as_str(),
                qr_code: None,
            }))
        }
        Err(e) => Err(error_response(&e)),
    }
}

/// Reconcile local state with the provider and report it
async fn instance_status(
    State(state): State<Arc<ApiState>>,
    Path(instance_id): Path<String>,
) -> Result<Json<InstanceView>, (StatusCode, Json<ErrorBody>)> {
    let instance = state
        .sessions
        .check_connection(&instance_id)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(instance.into()))
}

/// Disconnect an instance
async fn disconnect_instance(
    State(state): State<Arc<ApiState>>,
    Path(instance_id): Path<String>,
) -> Result<Json<InstanceView>, (StatusCode, Json<ErrorBody>)> {
    state
        .sessions
        .disconnect(&instance_id)
        .await
        .map_err(|e| error_response(&e))?;

    let instance = state
        .instances
        .find_required(&instance_id)
        .map_err(|e| error_response(&e))?;

    Ok(Json(instance.into()))
}

/// List an organization's instances
async fn list_instances(
    State(state): State<Arc<ApiState>>,
    Path(organization_id): Path<String>,
) -> Result<Json<Vec<InstanceView>>, (StatusCode, Json<ErrorBody>)> {
    let instances = state
        .instances
        .list_for_organization(&organization_id)
        .map_err(|e| error_response(&e))?;

    Ok(Json(instances.into_iter().map(Into::into).collect()))
}

/// Build instances router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/instances", post(create_instance))
        .route(
            "/api/instances/{instance_id}/provision",
            post(provision_instance),
        )
        .route("/api/instances/{instance_id}/pair", post(pair_instance))
        .route("/api/instances/{instance_id}/status", get(instance_status))
        .route(
            "/api/instances/{instance_id}/disconnect",
            post(disconnect_instance),
        )
        .route(
            "/api/organizations/{organization_id}/instances",
            get(list_instances),
        )
        .with_state(state)
}
