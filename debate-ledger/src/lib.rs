//! Debate Ledger
//!
//! Mirrored match ledger with zero-sum point exchange and a rule-based
//! achievement engine for debate participants.
//!
//! # Architecture
//!
//! - **Mirrored pairs**: every match is stored once per side, linked by a pair id
//! - **Zero-sum points**: a match moves points from one side to the other
//! - **Achievements**: an immutable catalog evaluated after every ledger write
//! - **Whole-collection storage**: load everything, replace everything
//!
//! # Invariants
//!
//! - Both records of a pair exist, or neither does
//! - Outcomes of a pair are inverse, point deltas are negated
//! - Achievements are never re-locked by evaluation
//! - Mutations touching a participant are serialized per participant

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod achievements;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod participants;
pub mod stats;
pub mod storage;
pub mod types;

// Re-exports
pub use achievements::{AchievementEngine, ParticipantAchievements};
pub use config::Config;
pub use error::{Error, Result, Warning};
pub use ledger::{MatchLedger, Receipt};
pub use participants::{ParticipantDirectory, ParticipantStore, Standing};
pub use stats::MatchStats;
pub use storage::{FileStore, MemoryStore, Store};
pub use types::{
    Achievement, AchievementCategory, MatchDraft, MatchId, MatchRecord, Outcome, Participant,
    ParticipantDraft, ParticipantId,
};
