//! Per-participant exclusive access
//!
//! Every mutation that touches a participant's points, history or
//! achievement set runs inside that participant's scope. A match touches two
//! participants, so scopes are always acquired in ascending id order; two
//! callers locking the same pair from opposite sides cannot deadlock.

use crate::types::ParticipantId;
use dashmap::DashMap;
use parking_lot::{lock_api::ArcMutexGuard, Mutex, RawMutex};
use std::sync::Arc;

/// Lazily populated table of one mutex per participant
#[derive(Debug, Default)]
pub struct LockTable {
    slots: DashMap<ParticipantId, Arc<Mutex<()>>>,
}

/// Held scope over one or more participants; released on drop
pub struct ParticipantScope {
    participants: Vec<ParticipantId>,
    _guards: Vec<ArcMutexGuard<RawMutex, ()>>,
}

impl std::fmt::Debug for ParticipantScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantScope")
            .field("participants", &self.participants)
            .finish()
    }
}

impl ParticipantScope {
    /// Participants covered by this scope, ascending
    pub fn participants(&self) -> &[ParticipantId] {
        &self.participants
    }
}

impl LockTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, participant: ParticipantId) -> Arc<Mutex<()>> {
        // Clone out of the map before locking so no shard lock is held while blocking
        self.slots
            .entry(participant)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Exclusive scope over one participant
    pub fn lock(&self, participant: ParticipantId) -> ParticipantScope {
        self.lock_all([participant])
    }

    /// Exclusive scope over every listed participant (duplicates allowed)
    pub fn lock_all(&self, participants: impl IntoIterator<Item = ParticipantId>) -> ParticipantScope {
        let mut ids: Vec<ParticipantId> = participants.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let guards = ids
            .iter()
            .map(|id| self.slot(*id).lock_arc())
            .collect();

        ParticipantScope {
            participants: ids,
            _guards: guards,
        }
    }

    /// Number of participants that ever had a scope
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no scope was ever taken
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
