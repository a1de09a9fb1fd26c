use super::messages::{ClientHandle, ClientId, HubMessage, Snapshot};
use crate::tournament::models::TournamentId;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

/// Default hub inbox capacity
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Handle for talking to a running [`BroadcastHub`]
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubMessage>,
}

impl HubHandle {
    /// Send a raw message to the hub
    pub async fn send(&self, message: HubMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .await
            .map_err(|_| "Broadcast hub is closed".to_string())
    }

    /// Put a client into a tournament room
    pub async fn subscribe(
        &self,
        tournament_id: TournamentId,
        client: ClientHandle,
    ) -> Result<(), String> {
        self.send(HubMessage::Register {
            tournament_id,
            client,
        })
        .await
    }

    /// Take a client out of its room; no-op if it is already gone
    pub async fn unsubscribe(&self, client_id: ClientId) {
        if self
            .send(HubMessage::Unregister { client_id })
            .await
            .is_err()
        {
            log::debug!("Hub closed before client {} unsubscribed", client_id);
        }
    }

    /// Broadcast a snapshot to a room. Never fails the caller.
    pub async fn publish(&self, tournament_id: TournamentId, payload: Snapshot) {
        if self
            .send(HubMessage::Broadcast {
                tournament_id,
                payload,
            })
            .await
            .is_err()
        {
            log::warn!(
                "Broadcast hub closed, dropping snapshot for tournament {}",
                tournament_id
            );
        }
    }

    /// Number of clients in a room, or `None` if the hub has stopped
    pub async fn room_size(&self, tournament_id: TournamentId) -> Option<usize> {
        let (response, receiver) = oneshot::channel();
        self.send(HubMessage::RoomSize {
            tournament_id,
            response,
        })
        .await
        .ok()?;
        receiver.await.ok()
    }

    /// Ask the hub loop to stop
    pub async fn shutdown(&self) {
        let _ = self.send(HubMessage::Shutdown).await;
    }
}

/// Fan-out of bracket snapshots to viewers, grouped by tournament room.
///
/// The hub owns every room; nothing else touches room membership. Delivery
/// never waits on a client: a client whose queue is full or closed is dropped
/// from its room on the spot.
///
/// Publishers race each other between commit and publish, so snapshots can
/// reach the inbox out of order. Each room remembers the last revision it
/// delivered and discards anything that is not newer.
pub struct BroadcastHub {
    inbox: mpsc::Receiver<HubMessage>,
    rooms: HashMap<TournamentId, HashMap<ClientId, ClientHandle>>,
    memberships: HashMap<ClientId, TournamentId>,
    delivered: HashMap<TournamentId, u64>,
}

impl BroadcastHub {
    /// Create a hub and the handle used to reach it
    pub fn new(inbox_capacity: usize) -> (Self, HubHandle) {
        let (sender, inbox) = mpsc::channel(inbox_capacity.max(1));
        let hub = Self {
            inbox,
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            delivered: HashMap::new(),
        };
        (hub, HubHandle { sender })
    }

    /// Spawn the hub loop onto the current runtime
    pub fn spawn(inbox_capacity: usize) -> HubHandle {
        let (hub, handle) = Self::new(inbox_capacity);
        tokio::spawn(hub.run());
        handle
    }

    /// Run the hub event loop until shut down or every handle is dropped
    pub async fn run(mut self) {
        log::info!("Broadcast hub starting");

        while let Some(message) = self.inbox.recv().await {
            if !self.handle_message(message) {
                break;
            }
        }

        log::info!(
            "Broadcast hub stopped with {} clients in {} rooms",
            self.memberships.len(),
            self.rooms.len()
        );
    }

    /// Returns false when the loop should stop
    fn handle_message(&mut self, message: HubMessage) -> bool {
        match message {
            HubMessage::Register {
                tournament_id,
                client,
            } => self.register(tournament_id, client),
            HubMessage::Unregister { client_id } => self.unregister(client_id),
            HubMessage::Broadcast {
                tournament_id,
                payload,
            } => self.broadcast(tournament_id, &payload),
            HubMessage::RoomSize {
                tournament_id,
                response,
            } => {
                let _ = response.send(self.rooms.get(&tournament_id).map_or(0, HashMap::len));
            }
            HubMessage::Shutdown => return false,
        }
        true
    }

    fn register(&mut self, tournament_id: TournamentId, client: ClientHandle) {
        let client_id = client.id();
        // a client watches one room at a time
        self.unregister(client_id);

        self.rooms
            .entry(tournament_id)
            .or_default()
            .insert(client_id, client);
        self.memberships.insert(client_id, tournament_id);
        log::debug!("Client {} joined tournament {} room", client_id, tournament_id);
    }

    fn unregister(&mut self, client_id: ClientId) {
        let Some(tournament_id) = self.memberships.remove(&client_id) else {
            return;
        };

        if let Some(room) = self.rooms.get_mut(&tournament_id) {
            room.remove(&client_id);
            if room.is_empty() {
                self.close_room(tournament_id);
            }
        }
        log::debug!("Client {} left tournament {} room", client_id, tournament_id);
    }

    fn close_room(&mut self, tournament_id: TournamentId) {
        self.rooms.remove(&tournament_id);
        self.delivered.remove(&tournament_id);
    }

    fn broadcast(&mut self, tournament_id: TournamentId, payload: &Snapshot) {
        let Some(room) = self.rooms.get_mut(&tournament_id) else {
            return;
        };

        let last = self.delivered.get(&tournament_id).copied();
        if !payload.is_newer_than(last) {
            log::debug!(
                "Discarding stale snapshot revision {} for tournament {}",
                payload.revision(),
                tournament_id
            );
            return;
        }
        self.delivered.insert(tournament_id, payload.revision());

        let mut dropped = Vec::new();
        room.retain(|client_id, client| match client.try_deliver(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Client {} queue full, disconnecting", client_id);
                dropped.push(*client_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("Client {} disconnected, removing", client_id);
                dropped.push(*client_id);
                false
            }
        });

        if room.is_empty() {
            self.close_room(tournament_id);
        }
        for client_id in dropped {
            self.memberships.remove(&client_id);
        }
    }
}
