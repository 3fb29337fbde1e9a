use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::server::AppState;
use crate::tidy::{TidyConfig, TidyError, TidyStart, TidyStatusSnapshot};

const DEFAULT_SAFETY_BUFFER_SECS: i64 = 259_200; // 72h

/// Error type for the HTTP surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidParameter(String),

    /// Distinct refusal for read requests landing on a performance
    /// secondary: the transport layer should forward them to the
    /// primary instead of failing.
    #[error("node is read-only for this request; forward to the primary")]
    ReadOnly,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TidyError> for ApiError {
    fn from(error: TidyError) -> Self {
        match error {
            TidyError::InvalidSafetyBuffer => ApiError::InvalidParameter(error.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::ReadOnly => StatusCode::MISDIRECTED_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "errors": [self.to_string()] }));
        (status, body).into_response()
    }
}

/// Request body for `POST /tidy`. Missing fields (or a missing body)
/// fall back to the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TidyRequest {
    pub tidy_cert_store: bool,
    pub tidy_revoked_certs: bool,
    pub tidy_revoked_cert_issuer_associations: bool,
    /// Deprecated; synonym for `tidy_revoked_certs`.
    pub tidy_revocation_list: bool,
    /// Seconds past expiration before an entry may be removed.
    pub safety_buffer: i64,
}

impl Default for TidyRequest {
    fn default() -> Self {
        Self {
            tidy_cert_store: false,
            tidy_revoked_certs: false,
            tidy_revoked_cert_issuer_associations: false,
            tidy_revocation_list: false,
            safety_buffer: DEFAULT_SAFETY_BUFFER_SECS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TidyResponse {
    pub warnings: Vec<String>,
}

/// `POST /tidy` — submit a tidy run.
///
/// Always answers 202 once the request validates; whether a run was
/// admitted is conveyed as a warning, and run failures are observable
/// only through `/tidy-status` and the logs.
pub async fn start_tidy(
    State(state): State<AppState>,
    body: Option<Json<TidyRequest>>,
) -> Result<Response, ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    if request.safety_buffer < 1 {
        return Err(ApiError::InvalidParameter(
            "safety_buffer must be greater than zero".to_string(),
        ));
    }

    let config = TidyConfig {
        cert_store: request.tidy_cert_store,
        revoked_certs: request.tidy_revoked_certs || request.tidy_revocation_list,
        issuer_assocs: request.tidy_revoked_cert_issuer_associations,
        safety_buffer: Duration::from_secs(request.safety_buffer as u64),
    };

    let mut warnings = Vec::new();
    match state.tidy.start(config)? {
        TidyStart::InProgress => {
            warnings.push("Tidy operation already in progress.".to_string());
        }
        TidyStart::Started { no_targets: true } => {
            warnings.push(
                "No targets to tidy; specify tidy_cert_store=true or tidy_revoked_certs=true \
                 or tidy_revoked_cert_issuer_associations=true to start a tidy operation."
                    .to_string(),
            );
        }
        TidyStart::Started { no_targets: false } => {
            warnings.push(
                "Tidy operation successfully started. Any information from the operation \
                 will be printed to the server logs."
                    .to_string(),
            );
        }
    }

    Ok((StatusCode::ACCEPTED, Json(TidyResponse { warnings })).into_response())
}

/// `GET /tidy-status` — read-only view of the current or last run.
pub async fn tidy_status(
    State(state): State<AppState>,
) -> Result<Json<TidyStatusSnapshot>, ApiError> {
    // On a performance secondary the status lives on the primary,
    // unless this mount is local.
    if state.replication.performance_secondary && !state.replication.local_mount {
        return Err(ApiError::ReadOnly);
    }
    Ok(Json(state.tidy.status().snapshot()))
}

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
