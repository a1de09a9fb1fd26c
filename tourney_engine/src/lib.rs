//! # Tourney Engine
//!
//! Tournament lifecycle and bracket progression, with live bracket
//! broadcasting to viewers.
//!
//! ## Core Modules
//!
//! - [`bracket`]: pure bracket engine (single elimination, round robin, standings)
//! - [`tournament`]: data model, errors, and the transactional [`TournamentManager`]
//! - [`lifecycle`]: cluster-safe periodic status sweeps
//! - [`broadcast`]: per-tournament pub/sub hub for viewer connections
//! - [`db`]: persistence gateway with PostgreSQL and in-memory implementations
//!
//! ## Example
//!
//! ```
//! use tourney_engine::bracket::{Score, SeedingStrategy, generate_bracket};
//! use tourney_engine::tournament::Format;
//!
//! let format = Format::single_elimination(1);
//! let mut bracket = generate_bracket(1, &format, &[10, 20], SeedingStrategy::default()).unwrap();
//! let final_id = bracket.final_match().unwrap().id;
//!
//! let outcome = bracket.apply_result(final_id, Some(20), Score::new(1, 3)).unwrap();
//! assert_eq!(outcome.champion, Some(20));
//! ```

pub mod bracket;
pub mod broadcast;
pub mod db;
pub mod lifecycle;
pub mod tournament;

pub use bracket::{Bracket, BracketView, Match, MatchStatus, Score, SeedingStrategy};
pub use broadcast::{BroadcastHub, HubHandle};
pub use lifecycle::{LifecycleScheduler, LockCoordinator, LockOutcome, SweepReport};
pub use tournament::{EngineError, EngineResult, TournamentManager};
