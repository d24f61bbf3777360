//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use syncroom_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{RoomCode, RoomSnapshot},
    infrastructure::dto::http::RoomSummaryDto,
    ui::state::AppState,
    usecase::ClearRoomsUseCase,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.registry.list().await;
    Json(rooms.into_iter().map(to_summary).collect())
}

/// Get room detail by code
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
) -> Result<Json<RoomSummaryDto>, StatusCode> {
    let room = RoomCode::new(room).map_err(|_| StatusCode::NOT_FOUND)?;
    let snapshot = state
        .registry
        .snapshot(&room)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(to_summary(snapshot)))
}

/// Admin endpoint: drop every room and session binding
pub async fn clear_rooms(State(state): State<Arc<AppState>>) -> &'static str {
    ClearRoomsUseCase::new(state.registry.clone(), state.index.clone())
        .execute()
        .await;
    "All rooms cleared"
}

fn to_summary(snapshot: RoomSnapshot) -> RoomSummaryDto {
    RoomSummaryDto {
        room: snapshot.code,
        users: snapshot.users,
        created_at: timestamp_to_rfc3339(snapshot.created_at.value()),
    }
}
