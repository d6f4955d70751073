//! Chat turn endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use orchestrator::{TurnReply, TurnRequest};
use tracing::info;

use crate::error::Result;
use crate::state::AppState;

/// Answer one user turn.
///
/// The director decision is returned as metadata only; callers must not
/// show it as a chat message.
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnReply>> {
    let Json(request) = payload?;

    let reply = state.orchestrator.handle_turn(&request).await?;

    info!(
        room_id = %request.room_id,
        responses = reply.responses.len(),
        broadcast = reply.director_decision.should_multiple_respond,
        "Chat turn answered"
    );

    Ok(Json(reply))
}
