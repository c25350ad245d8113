//! Participant store
//!
//! Owns participant profiles and points. The ledger only sees the
//! [`ParticipantDirectory`] side: lookups and point deltas.

use crate::{
    storage::Store,
    types::{Participant, ParticipantDraft, ParticipantId},
    Error, Result,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Participant lookup collaborator used by the ledger
pub trait ParticipantDirectory: Send + Sync {
    /// Participant by id, `None` if unknown
    fn get(&self, id: ParticipantId) -> Result<Option<Participant>>;

    /// Add `delta` to the participant's points and return the updated profile
    fn apply_point_delta(&self, id: ParticipantId, delta: i64) -> Result<Participant>;
}

/// Leaderboard entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based position
    pub rank: u32,
    /// Participant at this position
    pub participant: Participant,
}

/// Participant collection backed by a [`Store`]
pub struct ParticipantStore {
    store: Arc<dyn Store>,
    // Serializes read-modify-write of the whole collection
    write_lock: Mutex<()>,
}

impl ParticipantStore {
    /// Create over a store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// All participants in stored order
    pub fn list(&self) -> Result<Vec<Participant>> {
        self.store.load_participants()
    }

    /// Register a participant with a fresh id (max existing id + 1)
    pub fn register(&self, draft: ParticipantDraft) -> Result<Participant> {
        let _guard = self.write_lock.lock();
        let mut participants = self.store.load_participants()?;

        let next = participants.iter().map(|p| p.id.get()).max().unwrap_or(0) + 1;
        let participant = Participant {
            id: ParticipantId::new(next),
            nickname: draft.nickname,
            tier: draft.tier,
            points: draft.points,
            comment: draft.comment,
            profile_image: draft.profile_image,
        };

        participants.push(participant.clone());
        self.store.replace_participants(&participants)?;

        tracing::info!(
            participant_id = %participant.id,
            nickname = %participant.nickname,
            "Participant registered"
        );

        Ok(participant)
    }

    /// Participants ordered by points descending, ties by id ascending
    pub fn leaderboard(&self) -> Result<Vec<Standing>> {
        let mut participants = self.store.load_participants()?;
        participants.sort_by(|a, b| b.points.cmp(&a.points).then(a.id.cmp(&b.id)));

        Ok(participants
            .into_iter()
            .enumerate()
            .map(|(i, participant)| Standing {
                rank: i as u32 + 1,
                participant,
            })
            .collect())
    }

    /// Current leaderboard position of a participant
    pub fn rank_of(&self, id: ParticipantId) -> Result<u32> {
        self.leaderboard()?
            .into_iter()
            .find(|s| s.participant.id == id)
            .map(|s| s.rank)
            .ok_or(Error::ParticipantNotFound(id))
    }
}

impl ParticipantDirectory for ParticipantStore {
    fn get(&self, id: ParticipantId) -> Result<Option<Participant>> {
        Ok(self
            .store
            .load_participants()?
            .into_iter()
            .find(|p| p.id == id))
    }

    fn apply_point_delta(&self, id: ParticipantId, delta: i64) -> Result<Participant> {
        let _guard = self.write_lock.lock();
        let mut participants = self.store.load_participants()?;

        let participant = participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(Error::ParticipantNotFound(id))?;
        participant.points += delta;
        let updated = participant.clone();

        self.store.replace_participants(&participants)?;

        tracing::debug!(
            participant_id = %id,
            delta,
            points = updated.points,
            "Point delta applied"
        );

        Ok(updated)
    }
}
