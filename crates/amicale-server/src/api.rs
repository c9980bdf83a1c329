use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, Method},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use amicale_shared::constants::CALLER_HEADER;
use amicale_shared::protocol::{
    CreateGroupRequest, EditMessageRequest, GroupDeletedResponse, MediaUploadResponse,
    MessageRecord, RegisterUserRequest, SendMessageRequest, UpdateGroupRequest,
    UpdateProfileRequest,
};
use amicale_shared::types::{ChatTarget, GroupId, MessageId, UserId};
use amicale_shared::{Group, User};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::media::MediaStore;
use crate::store::ChatStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ChatStore>,
    pub media: Arc<MediaStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let max_media = state.config.max_media_size;

    Router::new()
        .route("/health", get(health_check))
        .route("/users", get(list_users).post(register_user))
        .route("/users/{id}", patch(update_profile))
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/{id}", patch(update_group).delete(delete_group))
        .route("/messages", get(list_messages).post(send_message))
        .route("/messages/{id}", patch(edit_message).delete(delete_message))
        .route("/media", post(media_upload))
        .route("/media/{file}", get(media_download))
        .layer(DefaultBodyLimit::max(max_media + 64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve the caller from the `x-caller-id` header and record activity for
/// presence.  Authentication proper lives outside this service; the header
/// is trusted.
async fn require_caller(store: &ChatStore, headers: &HeaderMap) -> Result<UserId, ServerError> {
    let raw = headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Unauthorized("Missing caller header".into()))?;
    let id = Uuid::parse_str(raw)
        .map(UserId)
        .map_err(|e| ServerError::BadRequest(format!("Invalid caller id: {e}")))?;
    if !store.touch(id).await {
        return Err(ServerError::Unauthorized("Unknown caller".into()));
    }
    Ok(id)
}

/// A conversation is addressed by exactly one of the two id fields.
fn resolve_target(
    recipient: Option<UserId>,
    group: Option<GroupId>,
) -> Result<ChatTarget, ServerError> {
    match (recipient, group) {
        (Some(user), None) => Ok(ChatTarget::User(user)),
        (None, Some(group)) => Ok(ChatTarget::Group(group)),
        (Some(_), Some(_)) => Err(ServerError::BadRequest(
            "recipientId and groupId are mutually exclusive".into(),
        )),
        (None, None) => Err(ServerError::BadRequest(
            "Either recipientId or groupId is required".into(),
        )),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    instance: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        instance: state.config.instance_name.clone(),
    })
}

// ─── Users ───

async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<Json<User>, ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("Registration is closed".into()));
    }
    let user = state.store.register_user(request).await?;
    Ok(Json(user))
}

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    Ok(Json(state.store.list_users(caller).await))
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    if caller != UserId(id) {
        return Err(ServerError::Forbidden(
            "Profiles can only be updated by their owner".into(),
        ));
    }
    let user = state.store.update_profile(caller, update).await?;
    Ok(Json(user))
}

// ─── Groups ───

async fn list_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Group>>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    Ok(Json(state.store.list_groups(caller).await))
}

async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateGroupRequest>,
) -> Result<Json<Group>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    let group = state
        .store
        .create_group(caller, &request.name, &request.members)
        .await?;
    Ok(Json(group))
}

async fn update_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateGroupRequest>,
) -> Result<Json<Group>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    let group = state
        .store
        .update_group(caller, GroupId(id), &request.name, &request.members)
        .await?;
    Ok(Json(group))
}

#[derive(Deserialize)]
struct ConfirmQuery {
    confirm: Option<bool>,
}

async fn delete_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<GroupDeletedResponse>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    // Deleting a group cascades to its messages; an explicit confirmation
    // is required so a bare call can never do that.
    if !query.confirm.unwrap_or(false) {
        return Err(ServerError::BadRequest(
            "Group deletion requires confirm=true".into(),
        ));
    }
    let messages_removed = state.store.delete_group(caller, GroupId(id)).await?;
    Ok(Json(GroupDeletedResponse {
        deleted: true,
        messages_removed,
    }))
}

// ─── Messages ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    recipient_id: Option<Uuid>,
    group_id: Option<Uuid>,
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageRecord>>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    let target = resolve_target(
        query.recipient_id.map(UserId),
        query.group_id.map(GroupId),
    )?;
    let history = state.store.fetch_history(caller, target).await?;
    Ok(Json(history.into_iter().map(MessageRecord::from).collect()))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<MessageRecord>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    let target = resolve_target(request.recipient_id, request.group_id)?;
    let message = state
        .store
        .send_message(caller, target, &request.body)
        .await?;
    Ok(Json(MessageRecord::from(message)))
}

async fn edit_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<EditMessageRequest>,
) -> Result<Json<MessageRecord>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    let message = state
        .store
        .edit_message(caller, MessageId(id), &request.body)
        .await?;
    Ok(Json(MessageRecord::from(message)))
}

async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageRecord>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;
    let message = state.store.delete_message(caller, MessageId(id)).await?;
    Ok(Json(MessageRecord::from(message)))
}

// ─── Media ───

async fn media_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<MediaUploadResponse>, ServerError> {
    let caller = require_caller(&state.store, &headers).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;

            let url = state.media.store(&file_name, &data).await?;

            info!(caller = %caller, size = data.len(), url = %url, "Media uploaded");

            return Ok(Json(MediaUploadResponse { url }));
        }
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn media_download(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Vec<u8>, ServerError> {
    state.media.open(&file).await
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target_exactly_one() {
        let user = UserId::new();
        let group = GroupId::new();

        assert_eq!(
            resolve_target(Some(user), None).unwrap(),
            ChatTarget::User(user)
        );
        assert_eq!(
            resolve_target(None, Some(group)).unwrap(),
            ChatTarget::Group(group)
        );
        assert!(resolve_target(Some(user), Some(group)).is_err());
        assert!(resolve_target(None, None).is_err());
    }
}
