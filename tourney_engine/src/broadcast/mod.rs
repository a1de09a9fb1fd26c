//! Live bracket broadcasting to connected viewers.

pub mod hub;
pub mod messages;
pub mod viewer;

pub use hub::{BroadcastHub, DEFAULT_INBOX_CAPACITY, HubHandle};
pub use messages::{ClientHandle, ClientId, HubMessage, Snapshot, snapshot};
pub use viewer::{InboundFrame, ViewerExit, serve_viewer};

/// Default per-viewer outbound queue capacity
pub const DEFAULT_VIEWER_QUEUE_CAPACITY: usize = 32;
