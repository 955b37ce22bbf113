//! Axum REST API, the registry's HTTP surface.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::RegistryError;
use crate::events::EventRecord;
use crate::model::{
    Batch, BatchStatus, CompleteBatch, NewBatch, NewUser, ReceiveBatch, Role, SendBatch, Snapshot,
    User,
};
use crate::registry::Registry;

pub struct ApiState {
    pub registry: Arc<Registry>,
}

type ApiResult<T> = Result<T, RegistryError>;

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/roles", get(roles))
        .route("/roles/:sender/can-send-to/:recipient", get(can_send_to))
        .route("/users", post(register_user))
        .route("/users/:address", get(get_user))
        .route("/users/:address/registered", get(is_registered))
        .route("/users/:address/permissions", get(permissions))
        .route("/users/:address/role-conflict/:role", get(role_conflict))
        .route("/registrations/:registration_id", get(get_registration))
        .route("/actors/:registration_id/batches", get(actor_batches))
        .route("/batches", post(create_batch).get(list_batches))
        .route("/batches/:id", get(get_batch))
        .route("/batches/:id/history", get(batch_history))
        .route("/batches/:id/send", post(send_batch))
        .route("/batches/:id/receive", post(receive_batch))
        .route("/batches/:id/complete", post(complete_batch))
        .route(
            "/snapshot",
            get(export_snapshot).put(import_snapshot).delete(clear_registry),
        )
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

#[derive(Serialize)]
pub struct RoleResponse {
    pub role: Role,
    pub prefix: &'static str,
    pub can_originate: bool,
    pub can_send: bool,
    pub can_receive: bool,
    pub terminal: bool,
    pub next_roles: Vec<Role>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        let permissions = role.permissions();
        Self {
            role,
            prefix: role.prefix(),
            can_originate: permissions.can_originate,
            can_send: permissions.can_send,
            can_receive: permissions.can_receive,
            terminal: role.is_terminal(),
            next_roles: permissions.next_roles.to_vec(),
        }
    }
}

#[derive(Serialize)]
pub struct PermissionsResponse {
    pub address: String,
    pub registered: bool,
    pub role: Option<Role>,
    pub can_create_genesis_batch: bool,
    pub can_send_batch: bool,
    pub can_receive_batch: bool,
    pub next_roles: Vec<Role>,
}

#[derive(Serialize)]
pub struct BatchesResponse {
    pub count: usize,
    pub batches: Vec<Batch>,
}

impl From<Vec<Batch>> for BatchesResponse {
    fn from(batches: Vec<Batch>) -> Self {
        Self {
            count: batches.len(),
            batches,
        }
    }
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub batch_id: String,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Deserialize)]
pub struct BatchFilter {
    pub status: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Extractors
// ─────────────────────────────────────────────────────────

/// JSON body whose rejections render as [`ErrorResponse`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RegistryError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections render as [`ErrorResponse`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(RegistryError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for RegistryError {
    fn from(rejection: JsonRejection) -> Self {
        RegistryError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for RegistryError {
    fn from(rejection: QueryRejection) -> Self {
        RegistryError::InvalidInput(rejection.body_text())
    }
}

// ─────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAuthorized(_) => StatusCode::FORBIDDEN,
            Self::DuplicateAddress(_)
            | Self::DuplicateRegistrationId(_)
            | Self::DuplicateBatchId(_) => StatusCode::CONFLICT,
            Self::InvalidRoleTransition { .. } | Self::InvalidStatusTransition { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!("Request failed: {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

fn parse_role(raw: &str) -> ApiResult<Role> {
    raw.parse()
        .map_err(|_| RegistryError::InvalidInput(format!("unknown role {raw:?}")))
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /roles`
///
/// The permission table, for gating UI actions.
pub async fn roles() -> Json<Vec<RoleResponse>> {
    Json(
        Registry::valid_roles()
            .iter()
            .copied()
            .map(RoleResponse::from)
            .collect(),
    )
}

/// `GET /roles/:sender/can-send-to/:recipient`
pub async fn can_send_to(
    Path((sender, recipient)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let allowed = Registry::can_interact_with_role(parse_role(&sender)?, parse_role(&recipient)?);
    Ok(Json(serde_json::json!({ "allowed": allowed })))
}

/// `POST /users`
pub async fn register_user(
    State(state): State<Arc<ApiState>>,
    ApiJson(req): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.registry.register_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users/:address`
pub async fn get_user(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.registry.get_user(&address).await?))
}

/// `GET /users/:address/registered`
pub async fn is_registered(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let registered = state.registry.is_registered(&address).await?;
    Ok(Json(serde_json::json!({ "registered": registered })))
}

/// `GET /users/:address/permissions`
pub async fn permissions(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<PermissionsResponse>> {
    let registry = &state.registry;
    let role = registry.user_role(&address).await?;
    Ok(Json(PermissionsResponse {
        registered: role.is_some(),
        role,
        can_create_genesis_batch: registry.can_create_genesis_batch(&address).await?,
        can_send_batch: registry.can_send_batch(&address).await?,
        can_receive_batch: registry.can_receive_batch(&address).await?,
        next_roles: role
            .map(|r| r.permissions().next_roles.to_vec())
            .unwrap_or_default(),
        address,
    }))
}

/// `GET /users/:address/role-conflict/:role`
pub async fn role_conflict(
    State(state): State<Arc<ApiState>>,
    Path((address, role)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let conflict = state
        .registry
        .has_conflicting_role(&address, parse_role(&role)?)
        .await?;
    Ok(Json(serde_json::json!({ "conflict": conflict })))
}

/// `GET /registrations/:registration_id`
pub async fn get_registration(
    State(state): State<Arc<ApiState>>,
    Path(registration_id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(
        state
            .registry
            .user_by_registration_id(&registration_id)
            .await?,
    ))
}

/// `GET /actors/:registration_id/batches`
pub async fn actor_batches(
    State(state): State<Arc<ApiState>>,
    Path(registration_id): Path<String>,
) -> ApiResult<Json<BatchesResponse>> {
    let batches = state.registry.batches_for_actor(&registration_id).await?;
    Ok(Json(batches.into()))
}

/// `POST /batches`
pub async fn create_batch(
    State(state): State<Arc<ApiState>>,
    ApiJson(req): ApiJson<NewBatch>,
) -> ApiResult<(StatusCode, Json<Batch>)> {
    let batch = state.registry.create_genesis_batch(req).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// `GET /batches[?status=]`
pub async fn list_batches(
    State(state): State<Arc<ApiState>>,
    ApiQuery(filter): ApiQuery<BatchFilter>,
) -> ApiResult<Json<BatchesResponse>> {
    let batches = match filter.status.as_deref() {
        None | Some("") => state.registry.get_all_batches().await?,
        Some(raw) => {
            let status: BatchStatus = raw
                .parse()
                .map_err(|_| RegistryError::InvalidInput(format!("unknown status {raw:?}")))?;
            state.registry.get_batches_by_status(status).await?
        }
    };
    Ok(Json(batches.into()))
}

/// `GET /batches/:id`
pub async fn get_batch(
    State(state): State<Arc<ApiState>>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<Batch>> {
    Ok(Json(state.registry.get_batch(&batch_id).await?))
}

/// `GET /batches/:id/history`
pub async fn batch_history(
    State(state): State<Arc<ApiState>>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let events = state.registry.batch_history(&batch_id).await?;
    Ok(Json(HistoryResponse {
        batch_id,
        count: events.len(),
        events,
    }))
}

/// `POST /batches/:id/send`
pub async fn send_batch(
    State(state): State<Arc<ApiState>>,
    Path(batch_id): Path<String>,
    ApiJson(req): ApiJson<SendBatch>,
) -> ApiResult<Json<Batch>> {
    Ok(Json(state.registry.send_batch(&batch_id, req).await?))
}

/// `POST /batches/:id/receive`
pub async fn receive_batch(
    State(state): State<Arc<ApiState>>,
    Path(batch_id): Path<String>,
    ApiJson(req): ApiJson<ReceiveBatch>,
) -> ApiResult<Json<Batch>> {
    Ok(Json(state.registry.receive_batch(&batch_id, req).await?))
}

/// `POST /batches/:id/complete`
pub async fn complete_batch(
    State(state): State<Arc<ApiState>>,
    Path(batch_id): Path<String>,
    ApiJson(req): ApiJson<CompleteBatch>,
) -> ApiResult<Json<Batch>> {
    Ok(Json(state.registry.complete_batch(&batch_id, req).await?))
}

/// `GET /snapshot`
pub async fn export_snapshot(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Snapshot>> {
    Ok(Json(state.registry.export_snapshot().await?))
}

/// `PUT /snapshot`
///
/// Replaces all registry state.
pub async fn import_snapshot(
    State(state): State<Arc<ApiState>>,
    ApiJson(snapshot): ApiJson<Snapshot>,
) -> ApiResult<StatusCode> {
    state.registry.import_snapshot(snapshot).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /snapshot`
pub async fn clear_registry(State(state): State<Arc<ApiState>>) -> ApiResult<StatusCode> {
    state.registry.clear_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
