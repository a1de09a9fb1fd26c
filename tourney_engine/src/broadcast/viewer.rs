//! Per-connection viewer pumps.
//!
//! A viewer connection is any sink of text frames paired with a stream of
//! inbound frames, so the same code drives an axum websocket in the server
//! and plain channels in tests.

use super::hub::HubHandle;
use super::messages::{ClientHandle, Snapshot};
use crate::tournament::models::TournamentId;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::pin::pin;

/// Frames a viewer can send; payloads are ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame {
    /// Ping, pong, or any text/binary frame
    Keepalive,
    /// Close frame or read error
    Close,
}

/// Why a viewer session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerExit {
    /// The viewer closed the connection or its stream ended
    ClientClosed,
    /// Writing to the viewer failed
    WriteFailed,
    /// The hub dropped the client (slow consumer) or shut down
    Dropped,
    /// The hub was not running when the viewer connected
    HubUnavailable,
}

impl ViewerExit {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewerExit::ClientClosed => "client_closed",
            ViewerExit::WriteFailed => "write_failed",
            ViewerExit::Dropped => "dropped",
            ViewerExit::HubUnavailable => "hub_unavailable",
        }
    }
}

/// Serve one viewer until either side goes away.
///
/// The client is registered in `tournament_id`'s room before `initial` is
/// polled, so any change committed while the initial snapshot is being built
/// is already queued for this viewer. The initial snapshot, if any, is
/// written first. Then two pumps run concurrently: one forwards queued
/// snapshots to `writer`, skipping any whose revision is not newer than the
/// last one written, the other drains `reader` until a close. Whichever pump
/// finishes first ends the session, and the client is unregistered before
/// returning.
pub async fn serve_viewer<I, W, R>(
    hub: &HubHandle,
    tournament_id: TournamentId,
    queue_capacity: usize,
    initial: I,
    writer: W,
    reader: R,
) -> ViewerExit
where
    I: Future<Output = Option<Snapshot>>,
    W: Sink<String>,
    R: Stream<Item = InboundFrame>,
{
    let mut writer = pin!(writer);
    let mut reader = pin!(reader);

    let (client, mut outbound) = ClientHandle::new(queue_capacity);
    let client_id = client.id();
    if hub.subscribe(tournament_id, client).await.is_err() {
        return ViewerExit::HubUnavailable;
    }
    log::debug!("Viewer {} watching tournament {}", client_id, tournament_id);

    let exit = 'session: {
        let mut written = None;
        if let Some(snapshot) = initial.await {
            if writer.send(snapshot.payload().to_string()).await.is_err() {
                break 'session ViewerExit::WriteFailed;
            }
            written = Some(snapshot.revision());
        }

        let send_pump = async {
            while let Some(snapshot) = outbound.recv().await {
                if !snapshot.is_newer_than(written) {
                    continue;
                }
                if writer.send(snapshot.payload().to_string()).await.is_err() {
                    return ViewerExit::WriteFailed;
                }
                written = Some(snapshot.revision());
            }
            ViewerExit::Dropped
        };

        let receive_pump = async {
            while let Some(frame) = reader.next().await {
                if frame == InboundFrame::Close {
                    break;
                }
            }
            ViewerExit::ClientClosed
        };

        tokio::select! {
            exit = send_pump => exit,
            exit = receive_pump => exit,
        }
    };

    hub.unsubscribe(client_id).await;
    log::debug!(
        "Viewer {} left tournament {} ({})",
        client_id,
        tournament_id,
        exit.as_str()
    );
    exit
}
