//! Axum route handlers for the slot host.
//!
//! Each HTTP handle resource wraps one [`SlotHandle`]; the handle id is a
//! random UUID returned when the handle is opened. Failures are reported as
//! [`ErrorBody`] JSON carrying the error `kind` and driver errno.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::SlotError;
use crate::registry::{self, ChannelId, ChannelRegistry, RegistrySnapshot, SlotId, TeardownReport};
use crate::session::SlotHandle;

/// Wire kind for a handle id the host does not know.
pub const UNKNOWN_HANDLE: &str = "unknown_handle";

/// Shared application state for the host.
#[derive(Clone)]
pub struct AppState {
    /// The registry every handle operates on.
    pub registry: Arc<ChannelRegistry>,
    /// Open handles keyed by their public id.
    pub handles: Arc<DashMap<Uuid, SlotHandle>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ChannelRegistry::new()))
    }

    /// State backed by the process-wide [`registry::global`] registry.
    pub fn global() -> Self {
        Self::with_registry(registry::global())
    }

    pub fn with_registry(registry: Arc<ChannelRegistry>) -> Self {
        Self {
            registry,
            handles: Arc::new(DashMap::new()),
        }
    }

    /// Drop every open handle and release the registry.
    pub fn shutdown(&self) -> TeardownReport {
        let open = self.handles.len();
        self.handles.clear();
        log::info!("closed {} open handles", open);
        self.registry.teardown_all()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Stable error class, see [`SlotError::kind`].
    pub kind: String,
    /// Driver errno for the condition (0 when not a slot error).
    pub errno: i32,
    /// Free-form detail for message-bearing variants.
    #[serde(default)]
    pub detail: String,
    /// Message length for size errors.
    #[serde(default)]
    pub needed: usize,
    /// Capacity or maximum for size errors.
    #[serde(default)]
    pub limit: usize,
}

/// Response body for a newly opened handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResponse {
    pub handle: Uuid,
    pub slot: SlotId,
}

/// Request body for selecting a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectRequest {
    pub channel_id: ChannelId,
}

/// Response body for a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub written: usize,
}

/// Query parameters for a read.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReadQuery {
    pub capacity: Option<usize>,
}

/// Failure of a host request.
#[derive(Debug)]
pub enum ApiError {
    Slot(SlotError),
    UnknownHandle(Uuid),
}

impl From<SlotError> for ApiError {
    fn from(err: SlotError) -> Self {
        Self::Slot(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Slot(err) => {
                let (needed, limit) = err.sizes();
                let body = ErrorBody {
                    error: err.to_string(),
                    kind: err.kind().to_string(),
                    errno: err.errno(),
                    detail: err.detail().to_string(),
                    needed,
                    limit,
                };
                (status_for(&err), body)
            }
            Self::UnknownHandle(id) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: format!("Handle '{}' not found", id),
                    kind: UNKNOWN_HANDLE.to_string(),
                    errno: 0,
                    detail: id.to_string(),
                    needed: 0,
                    limit: 0,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// HTTP status reported for each slot error.
pub fn status_for(err: &SlotError) -> StatusCode {
    match err {
        SlotError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        SlotError::NotBound => StatusCode::CONFLICT,
        SlotError::NotReady => StatusCode::NOT_FOUND,
        SlotError::BufferTooSmall { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        SlotError::MessageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SlotError::OutOfMemory(_) => StatusCode::INSUFFICIENT_STORAGE,
        SlotError::IoFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    // One byte past the maximum still reaches the handler, which reports the
    // exact length; anything larger is cut off while buffering.
    let body_limit = state
        .registry
        .config()
        .max_message_size
        .saturating_add(1);

    Router::new()
        .route("/health", get(health_handler))
        .route("/slots", get(list_slots_handler))
        .route("/slots/:slot/handles", post(open_handle_handler))
        .route("/handles/:handle", delete(close_handle_handler))
        .route("/handles/:handle/channel", post(select_handler))
        .route(
            "/handles/:handle/message",
            post(write_handler)
                .get(read_handler)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "message-slot",
        "slots": state.registry.slot_count(),
        "handles": state.handles.len(),
    }))
}

/// GET /slots — snapshot of every live slot and its channels.
async fn list_slots_handler(State(state): State<AppState>) -> Json<RegistrySnapshot> {
    Json(state.registry.snapshot())
}

/// POST /slots/:slot/handles — acquire the slot and open an unbound handle.
async fn open_handle_handler(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> Result<(StatusCode, Json<OpenResponse>), ApiError> {
    let slot_id: SlotId = slot
        .parse()
        .map_err(|_| SlotError::InvalidArgument(format!("'{}' is not a slot id", slot)))?;

    let handle = state.registry.open(slot_id)?;
    let id = Uuid::new_v4();
    state.handles.insert(id, handle);

    log::debug!("opened handle {} on slot {}", id, slot_id);
    Ok((
        StatusCode::CREATED,
        Json(OpenResponse {
            handle: id,
            slot: slot_id,
        }),
    ))
}

/// DELETE /handles/:handle — close a handle. Stored messages are untouched.
async fn close_handle_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .handles
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(ApiError::UnknownHandle(id))
}

/// POST /handles/:handle/channel — bind the handle to a channel.
///
/// Request body: `{ "channel_id": 5 }`
async fn select_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut handle = state
        .handles
        .get_mut(&id)
        .ok_or(ApiError::UnknownHandle(id))?;
    handle.select(request.channel_id)?;

    Ok(Json(serde_json::json!({
        "handle": id,
        "slot": handle.slot_id(),
        "binding": handle.binding(),
    })))
}

/// POST /handles/:handle/message — replace the bound channel's message with
/// the raw request body.
async fn write_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<WriteResponse>, ApiError> {
    let handle = state
        .handles
        .get(&id)
        .ok_or(ApiError::UnknownHandle(id))?;
    let body = body.map_err(|e| body_error(&headers, handle.slot().max_message_size(), e))?;
    let written = handle.write(&body)?;
    Ok(Json(WriteResponse { written }))
}

/// Map a failed body read to a slot error. Bodies cut off by the length
/// limit are oversized writes.
fn body_error(headers: &HeaderMap, max: usize, rejection: BytesRejection) -> SlotError {
    if rejection.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return SlotError::IoFailure(rejection.body_text());
    }
    let len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| max.saturating_add(1));
    SlotError::MessageTooLarge { len, max }
}

/// GET /handles/:handle/message?capacity=n — return the bound channel's
/// message as raw bytes. Capacity defaults to the maximum message size.
async fn read_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReadQuery>,
) -> Result<Response, ApiError> {
    let handle = state
        .handles
        .get(&id)
        .ok_or(ApiError::UnknownHandle(id))?;
    let capacity = query
        .capacity
        .unwrap_or_else(|| handle.slot().max_message_size());
    let message = handle.read(capacity)?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        message,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
