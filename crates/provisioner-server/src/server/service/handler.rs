use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use provisioner_core::{Error, Provisioner, RequestStatus, StatusReport};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    provisioner: Provisioner,
}

/// Body of `POST /validators`.
#[derive(Debug, Deserialize)]
pub struct CreateValidatorRequest {
    pub num_validators: i64,
    pub fee_recipient: String,
}

#[derive(Debug, Serialize)]
pub struct CreateValidatorResponse {
    pub request_id: String,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: RequestStatus,
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FailedStatusResponse {
    pub status: RequestStatus,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthResponse {
    Healthy,
    Unhealthy { error: String },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Errors a handler turns into a `{ "error": ... }` response.
#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound,
    Internal,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {rejection}");
        Self::BadRequest("Invalid request body")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidCount { .. } => Self::BadRequest("Invalid number of validators"),
            Error::InvalidAddress { .. } => Self::BadRequest("Invalid fee recipient address"),
            Error::NotFound { .. } => Self::NotFound,
            other => {
                tracing::error!("Request failed: {other}");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            Self::NotFound => (StatusCode::NOT_FOUND, "Request not found"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// POST /validators
async fn create_validators(
    State(state): State<AppState>,
    payload: Result<Json<CreateValidatorRequest>, JsonRejection>,
) -> Result<Json<CreateValidatorResponse>, ApiError> {
    let Json(body) = payload?;
    let accepted = state
        .provisioner
        .create_request(body.num_validators, &body.fee_recipient)
        .await?;

    Ok(Json(CreateValidatorResponse {
        request_id: accepted.public_id,
        message: accepted.message,
    }))
}

/// GET /validators/{request_id}
async fn get_validator_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Response, ApiError> {
    let response = match state.provisioner.get_status(&request_id).await? {
        StatusReport::Active { status, keys } => {
            Json(StatusResponse { status, keys }).into_response()
        }
        StatusReport::Failed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(FailedStatusResponse {
                status: RequestStatus::Failed,
                message: "Error processing request",
            }),
        )
            .into_response(),
    };
    Ok(response)
}

/// GET /health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.provisioner.health().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::Healthy)),
        Err(e) => {
            tracing::warn!("Health check failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse::Unhealthy {
                    error: e.to_string(),
                }),
            )
        }
    }
}

/// Builds the API router with request tracing, panic recovery and
/// permissive CORS.
pub fn router(provisioner: Provisioner) -> Router {
    Router::new()
        .route("/validators", post(create_validators))
        .route("/validators/{request_id}", get(get_validator_status))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(AppState { provisioner })
}
