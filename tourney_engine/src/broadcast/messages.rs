//! Broadcast hub message types.

use crate::bracket::BracketView;
use crate::tournament::models::TournamentId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Viewer connection ID
pub type ClientId = Uuid;

/// Serialized bracket snapshot, shared between every recipient of a broadcast.
///
/// Carries the revision of the view it was built from so that receivers can
/// tell a late delivery of an older state from a newer one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    revision: u64,
    payload: Arc<str>,
}

impl Snapshot {
    pub fn new(revision: u64, payload: impl Into<Arc<str>>) -> Self {
        Self {
            revision,
            payload: payload.into(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Whether this snapshot supersedes one at `revision`
    pub fn is_newer_than(&self, revision: Option<u64>) -> bool {
        revision.is_none_or(|seen| self.revision > seen)
    }
}

/// Serialize a view into a snapshot payload
pub fn snapshot(view: &BracketView) -> serde_json::Result<Snapshot> {
    Ok(Snapshot::new(view.revision, view.to_json()?))
}

/// Hub-side half of one viewer connection
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    outbound: mpsc::Sender<Snapshot>,
}

impl ClientHandle {
    /// New client with a bounded outbound queue of `capacity` snapshots
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Snapshot>) {
        let (outbound, receiver) = mpsc::channel(capacity.max(1));
        let client = Self {
            id: Uuid::new_v4(),
            outbound,
        };
        (client, receiver)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub(crate) fn try_deliver(
        &self,
        payload: &Snapshot,
    ) -> Result<(), mpsc::error::TrySendError<Snapshot>> {
        self.outbound.try_send(payload.clone())
    }
}

/// Messages that can be sent to the broadcast hub
///
/// A single inbox carries every request, so registrations, removals, and
/// broadcasts are handled strictly in send order.
#[derive(Debug)]
pub enum HubMessage {
    /// Add a client to a tournament room
    Register {
        tournament_id: TournamentId,
        client: ClientHandle,
    },

    /// Remove a client from whatever room it is in
    Unregister { client_id: ClientId },

    /// Deliver a snapshot to every client in a room, unless the room has
    /// already seen the same or a later revision
    Broadcast {
        tournament_id: TournamentId,
        payload: Snapshot,
    },

    /// Number of clients currently in a room
    RoomSize {
        tournament_id: TournamentId,
        response: oneshot::Sender<usize>,
    },

    /// Stop the hub loop
    Shutdown,
}
