use crate::errors::IntoErrorResponse;
use crate::events::ConnId;
use crate::registry::TableRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

use tonk_engine::game::{PlayerAction, PlayerId, TableId};

#[derive(Debug, Deserialize)]
pub struct JoinTableRequest {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// The event-stream connection to subscribe to the table group.
    pub conn_id: ConnId,
}

#[derive(Debug, Deserialize)]
pub struct LeaveTableRequest {
    pub player_id: PlayerId,
    pub conn_id: ConnId,
}

#[derive(Debug, Deserialize)]
pub struct PlayerActionRequest {
    /// Acting identity: the event-stream connection bound at join time.
    pub conn_id: ConnId,
    #[serde(flatten)]
    pub action: PlayerAction,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub player_id: PlayerId,
    pub message: String,
}

/// Seats a player at a table.
///
/// POST `/api/tables/{table_id}/join` with `{ player_id, name, avatar?,
/// conn_id }`. Returns the updated lobby summary, 409 when the table is
/// full, already joined, or mid-game.
pub async fn join_table(
    registry: Arc<TableRegistry>,
    table_id: TableId,
    request: JoinTableRequest,
) -> Response {
    match registry.join_table(
        table_id,
        request.player_id,
        request.name,
        request.avatar,
        request.conn_id,
    ) {
        Ok(summary) => success_response(StatusCode::OK, summary),
        Err(err) => err.into_http_response(),
    }
}

/// POST `/api/tables/{table_id}/leave` with `{ player_id, conn_id }`.
pub async fn leave_table(
    registry: Arc<TableRegistry>,
    table_id: TableId,
    request: LeaveTableRequest,
) -> Response {
    match registry.leave_table(table_id, request.player_id, request.conn_id) {
        Ok(summary) => success_response(StatusCode::OK, summary),
        Err(err) => err.into_http_response(),
    }
}

/// Deals a new game for the table.
///
/// POST `/api/tables/{table_id}/start`. Debits every seat's stake
/// before the deal; 402 with the shortfall when a seat cannot cover it,
/// 409 when a game is already running.
pub async fn start_game(registry: Arc<TableRegistry>, table_id: TableId) -> Response {
    match registry.start_game(table_id) {
        Ok(view) => success_response(StatusCode::CREATED, view),
        Err(err) => err.into_http_response(),
    }
}

/// Submits one turn action.
///
/// POST `/api/tables/{table_id}/actions` with `{ conn_id, kind, ... }`
/// where `kind` is one of `draw_from_deck`, `draw_from_discard`,
/// `discard`, `drop`, `tonk_claim`. Returns the public view after the
/// action; rejections come back as 400 with a stable error code.
pub async fn submit_action(
    registry: Arc<TableRegistry>,
    table_id: TableId,
    request: PlayerActionRequest,
) -> Response {
    match registry.process_action(table_id, request.conn_id, request.action) {
        Ok(view) => success_response(StatusCode::OK, view),
        Err(err) => err.into_http_response(),
    }
}

/// GET `/api/tables/{table_id}/state`: the public projection of a
/// running game. 404 when no game is active at the table.
pub async fn get_state(registry: Arc<TableRegistry>, table_id: TableId) -> Response {
    match registry.state(&table_id) {
        Ok(view) => success_response(StatusCode::OK, view),
        Err(err) => err.into_http_response(),
    }
}

/// GET `/api/tables/{table_id}/hand/{player_id}`: the requesting
/// seat's own cards, for a refresh after reconnecting.
pub async fn get_hand(
    registry: Arc<TableRegistry>,
    table_id: TableId,
    player_id: PlayerId,
) -> Response {
    match registry.hand_view(&table_id, &player_id) {
        Ok(cards) => success_response(StatusCode::OK, cards),
        Err(err) => err.into_http_response(),
    }
}

/// POST `/api/tables/{table_id}/chat` with `{ player_id, message }`.
pub async fn send_chat(
    registry: Arc<TableRegistry>,
    table_id: TableId,
    request: ChatRequest,
) -> Response {
    match registry.chat(table_id, request.player_id, request.message) {
        Ok(()) => success_response(StatusCode::OK, serde_json::json!({ "sent": true })),
        Err(err) => err.into_http_response(),
    }
}

fn success_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    reply::with_status(reply::json(&body), status).into_response()
}
