//! WebSocket handler for live bracket updates.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/tournaments/{tournament_id}`
//! 2. Server checks the tournament exists (`404` otherwise) and upgrades
//! 3. The viewer joins the tournament room, then the current bracket snapshot is sent
//! 4. Every later change to the tournament pushes a fresh full snapshot
//! 5. Anything the client sends is treated as a keepalive; a close frame ends the session
//!
//! Viewers that stop reading are dropped once their outbound queue fills.
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/tournaments/1');
//!
//! ws.onmessage = (event) => {
//!   const bracket = JSON.parse(event.data);
//!   renderRounds(bracket.rounds);
//! };
//! ```

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, future};
use log::{error, warn};
use tourney_engine::EngineError;
use tourney_engine::broadcast::{InboundFrame, Snapshot, serve_viewer, snapshot};
use tourney_engine::db::TournamentStore;
use tourney_engine::tournament::TournamentId;

use super::AppState;
use crate::{logging, metrics};

/// Upgrade an HTTP connection to a viewer websocket for one tournament.
///
/// # Response
///
/// - `101 Switching Protocols` on success
/// - `404 Not Found` if the tournament does not exist
/// - `500 Internal Server Error` if the tournament cannot be read
pub async fn websocket_handler<S: TournamentStore>(
    ws: WebSocketUpgrade,
    Path(tournament_id): Path<TournamentId>,
    State(state): State<AppState<S>>,
) -> Response {
    let fallback = match read_snapshot(&state, tournament_id).await {
        Ok(fallback) => fallback,
        Err(e @ EngineError::TournamentNotFound(_)) => {
            return (StatusCode::NOT_FOUND, e.client_message()).into_response();
        }
        Err(e) => {
            error!("Snapshot for tournament {} failed: {}", tournament_id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.client_message()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, tournament_id, fallback, state))
}

async fn read_snapshot<S: TournamentStore>(
    state: &AppState<S>,
    tournament_id: TournamentId,
) -> Result<Snapshot, EngineError> {
    let view = state.manager.bracket_view(tournament_id).await?;
    Ok(snapshot(&view)?)
}

/// Drive an established viewer connection until either side leaves
async fn handle_socket<S: TournamentStore>(
    socket: WebSocket,
    tournament_id: TournamentId,
    fallback: Snapshot,
    state: AppState<S>,
) {
    metrics::viewer_connected();
    logging::log_viewer_event(tournament_id, None);

    let (sink, stream) = socket.split();
    let writer = sink.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    });
    let reader = stream.map(|frame| match frame {
        Ok(Message::Close(_)) | Err(_) => InboundFrame::Close,
        Ok(_) => InboundFrame::Keepalive,
    });

    // read again once subscribed, so nothing committed since the upgrade is missed
    let initial = async {
        match read_snapshot(&state, tournament_id).await {
            Ok(current) => Some(current),
            Err(e) => {
                warn!(
                    "Re-reading tournament {} failed, sending upgrade snapshot: {}",
                    tournament_id, e
                );
                Some(fallback)
            }
        }
    };

    let exit = serve_viewer(
        state.manager.hub(),
        tournament_id,
        state.viewer_queue_capacity,
        initial,
        writer,
        reader,
    )
    .await;

    metrics::viewer_disconnected(exit);
    logging::log_viewer_event(tournament_id, Some(exit));
}
