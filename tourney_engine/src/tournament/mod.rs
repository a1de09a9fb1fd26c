//! Tournament module: data model, error taxonomy, and the transactional manager.
//!
//! ## Example
//!
//! ```no_run
//! use tourney_engine::broadcast::BroadcastHub;
//! use tourney_engine::bracket::Score;
//! use tourney_engine::db::{Database, PgTournamentStore};
//! use tourney_engine::tournament::TournamentManager;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let store = Arc::new(PgTournamentStore::new(Arc::new(db.pool().clone())));
//!     let hub = BroadcastHub::spawn(1024);
//!     let manager = TournamentManager::new(store, hub);
//!
//!     // organizer 42 reports that participant 7 won match 15 by 3-1
//!     let outcome = manager.apply_result(15, Some(7), Score::new(3, 1), 42).await?;
//!     if let Some(champion) = outcome.champion {
//!         println!("Tournament won by participant {champion}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{EngineError, EngineResult};
pub use manager::TournamentManager;
pub use models::{
    BracketType, Entrant, Format, FormatSettings, Participant, ParticipantId, ParticipantStatus,
    ParticipantType, Tournament, TournamentId, TournamentStatus, UserId,
};
