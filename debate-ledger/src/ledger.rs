//! Match ledger orchestration
//!
//! Ties together storage, the participant directory and the achievement
//! engine into the public API for recording debate matches.
//!
//! Every match is stored twice: once from each side. Both records share a
//! pair id, carry inverted outcomes and negated point deltas, and are written
//! in a single collection replace.
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use debate_ledger::{Config, MatchDraft, MatchLedger, Outcome, ParticipantId};
//!
//! fn main() -> debate_ledger::Result<()> {
//!     let ledger = MatchLedger::open(Config::default())?;
//!
//!     let receipt = ledger.add_match(MatchDraft {
//!         participant_id: ParticipantId::new(7),
//!         opponent_id: ParticipantId::new(9),
//!         outcome: Outcome::Win,
//!         score: "3-1".to_string(),
//!         match_date: NaiveDate::from_ymd_opt(2024, 1, 5).ok_or("invalid date")?,
//!         game_type: "Discord".to_string(),
//!         description: String::new(),
//!         points_change: 10,
//!     })?;
//!
//!     for warning in &receipt.warnings {
//!         eprintln!("{}", warning);
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::{
    achievements::AchievementEngine,
    error::Warning,
    locks::LockTable,
    metrics::Metrics,
    participants::{ParticipantDirectory, ParticipantStore},
    stats::MatchStats,
    storage::{FileStore, Store},
    types::{MatchDraft, MatchId, MatchRecord, ParticipantId},
    Config, Error, Result,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Successful result plus the best-effort side effects that failed
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt<T> {
    /// Primary result
    pub value: T,
    /// Side-effect failures, in the order they happened
    pub warnings: Vec<Warning>,
}

impl<T> Receipt<T> {
    /// Receipt without warnings
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// Receipt carrying warnings
    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    /// True if every side effect succeeded
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Drop the warnings
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Debate match ledger
pub struct MatchLedger {
    store: Arc<dyn Store>,
    participants: Arc<dyn ParticipantDirectory>,
    achievements: AchievementEngine,
    locks: Arc<LockTable>,
    // Serializes read-modify-write of the match collection; always taken
    // before any participant scope
    write_lock: Mutex<()>,
    metrics: Metrics,
    config: Config,
}

impl MatchLedger {
    /// Open a file-backed ledger under `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(FileStore::open(&config)?);
        Self::with_store(store, config)
    }

    /// Ledger over any store, with participants kept in the same store
    pub fn with_store(store: Arc<dyn Store>, config: Config) -> Result<Self> {
        let participants = Arc::new(ParticipantStore::new(store.clone()));
        Self::from_parts(store, participants, config)
    }

    /// Ledger over explicit collaborators
    pub fn from_parts(
        store: Arc<dyn Store>,
        participants: Arc<dyn ParticipantDirectory>,
        config: Config,
    ) -> Result<Self> {
        let locks = Arc::new(LockTable::new());
        let achievements = AchievementEngine::new(store.clone(), locks.clone());

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            "Match ledger ready"
        );

        Ok(Self {
            store,
            participants,
            achievements,
            locks,
            write_lock: Mutex::new(()),
            metrics: Metrics::new()?,
            config,
        })
    }

    /// Record a match and its mirror, apply points and evaluate achievements.
    ///
    /// Returns the stored self-side record.
    pub fn add_match(&self, draft: MatchDraft) -> Result<Receipt<MatchRecord>> {
        let mut warnings = Vec::new();

        let guard = self.write_lock.lock();
        let _scope = self
            .locks
            .lock_all([draft.participant_id, draft.opponent_id]);

        let opponent_name = self.resolve_name(draft.opponent_id, &mut warnings);
        let self_name = self.resolve_name(draft.participant_id, &mut warnings);

        let mut matches = self.store.load_matches()?;
        let id = MatchId::next_after(matches.iter().map(|r| &r.id));

        let mut record = MatchRecord::from_draft(id, Uuid::new_v4(), &draft);
        record.opponent_name = Some(opponent_name);
        let mut mirror = record.mirror(MatchId::new(id.get() + 1));
        mirror.opponent_name = Some(self_name);

        matches.push(record.clone());
        matches.push(mirror.clone());
        let transfers =
            pair_transfers(record.participant_id, record.opponent_id, record.points_change);
        self.commit(&matches, &transfers)?;
        drop(guard);

        self.evaluate_pair(&record, &mirror, &matches, &mut warnings);

        self.metrics.matches_recorded.inc();
        self.metrics.record_warnings(&warnings);

        tracing::info!(
            match_id = %record.id,
            mirror_id = %mirror.id,
            participant_id = %record.participant_id,
            opponent_id = %record.opponent_id,
            outcome = %record.outcome,
            points_change = record.points_change,
            warnings = warnings.len(),
            "Match recorded"
        );

        Ok(Receipt::with_warnings(record, warnings))
    }

    /// Rewrite a match in place and regenerate its mirror.
    ///
    /// The old point effect is reversed and the new one applied, so the self
    /// side's net change is `new delta - old delta`. An unknown id fails with
    /// [`Error::MatchNotFound`] before anything is touched.
    pub fn update_match(&self, id: MatchId, draft: MatchDraft) -> Result<Receipt<MatchRecord>> {
        let mut warnings = Vec::new();

        let guard = self.write_lock.lock();
        let mut matches = self.store.load_matches()?;
        let old = matches
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(Error::MatchNotFound(id))?;

        let _scope = self.locks.lock_all([
            old.participant_id,
            old.opponent_id,
            draft.participant_id,
            draft.opponent_id,
        ]);

        take_mirror(&mut matches, &old, &mut warnings);

        let opponent_name = self.resolve_name(draft.opponent_id, &mut warnings);
        let self_name = self.resolve_name(draft.participant_id, &mut warnings);

        let mut record = MatchRecord::from_draft(id, Uuid::new_v4(), &draft);
        record.opponent_name = Some(opponent_name);

        let slot = matches
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::MatchNotFound(id))?;
        *slot = record.clone();

        let mirror_id = MatchId::next_after(matches.iter().map(|r| &r.id));
        let mut mirror = record.mirror(mirror_id);
        mirror.opponent_name = Some(self_name);
        matches.push(mirror.clone());

        let mut transfers =
            pair_transfers(old.participant_id, old.opponent_id, -old.points_change);
        transfers.extend(pair_transfers(
            record.participant_id,
            record.opponent_id,
            record.points_change,
        ));
        self.commit(&matches, &transfers)?;
        drop(guard);

        self.evaluate_pair(&record, &mirror, &matches, &mut warnings);

        self.metrics.matches_updated.inc();
        self.metrics.record_warnings(&warnings);

        tracing::info!(
            match_id = %id,
            mirror_id = %mirror.id,
            old_points_change = old.points_change,
            points_change = record.points_change,
            warnings = warnings.len(),
            "Match updated"
        );

        Ok(Receipt::with_warnings(record, warnings))
    }

    /// Remove a match and its mirror and reverse the point effect.
    ///
    /// Deleting an unknown id succeeds without doing anything and returns
    /// `None`.
    pub fn delete_match(&self, id: MatchId) -> Result<Receipt<Option<MatchRecord>>> {
        let mut warnings = Vec::new();

        let guard = self.write_lock.lock();
        let mut matches = self.store.load_matches()?;
        let Some(index) = matches.iter().position(|r| r.id == id) else {
            tracing::debug!(match_id = %id, "Delete of unknown match ignored");
            return Ok(Receipt::new(None));
        };

        let record = matches.remove(index);
        let _scope = self
            .locks
            .lock_all([record.participant_id, record.opponent_id]);

        take_mirror(&mut matches, &record, &mut warnings);
        let transfers =
            pair_transfers(record.participant_id, record.opponent_id, -record.points_change);
        self.commit(&matches, &transfers)?;
        drop(guard);

        self.metrics.matches_deleted.inc();
        self.metrics.record_warnings(&warnings);

        tracing::info!(
            match_id = %id,
            participant_id = %record.participant_id,
            opponent_id = %record.opponent_id,
            reversed_points = record.points_change,
            "Match deleted"
        );

        Ok(Receipt::with_warnings(Some(record), warnings))
    }

    /// A participant's records, newest first, with current opponent names
    pub fn matches_for(&self, participant: ParticipantId) -> Result<Vec<MatchRecord>> {
        let mut records: Vec<MatchRecord> = self
            .store
            .load_matches()?
            .into_iter()
            .filter(|r| r.participant_id == participant)
            .collect();

        records.sort_by(|a, b| {
            b.match_date
                .cmp(&a.match_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        self.refresh_names(&mut records);
        Ok(records)
    }

    /// One record with its current opponent name
    pub fn get_match(&self, id: MatchId) -> Result<MatchRecord> {
        let mut record = self
            .store
            .load_matches()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(Error::MatchNotFound(id))?;

        self.refresh_names(std::slice::from_mut(&mut record));
        Ok(record)
    }

    /// Every record in stored order with current opponent names
    pub fn all_matches(&self) -> Result<Vec<MatchRecord>> {
        let mut records = self.store.load_matches()?;
        self.refresh_names(&mut records);
        Ok(records)
    }

    /// Fill in the stored opponent name of every record that lacks one.
    ///
    /// Writes the collection once, and only if something changed. Returns the
    /// number of repaired records.
    pub fn migrate_opponent_names(&self) -> Result<Receipt<usize>> {
        let mut warnings = Vec::new();
        let _guard = self.write_lock.lock();

        let mut matches = self.store.load_matches()?;
        let mut names: HashMap<ParticipantId, String> = HashMap::new();
        let mut repaired = 0;

        for record in matches.iter_mut().filter(|r| r.opponent_name.is_none()) {
            let opponent = record.opponent_id;
            let name = match names.get(&opponent) {
                Some(name) => name.clone(),
                None => {
                    let name = self.resolve_name(opponent, &mut warnings);
                    names.insert(opponent, name.clone());
                    name
                }
            };
            record.opponent_name = Some(name);
            repaired += 1;
        }

        if repaired > 0 {
            self.store.replace_matches(&matches)?;
        }

        self.metrics.record_warnings(&warnings);
        tracing::info!(repaired, "Opponent name migration finished");

        Ok(Receipt::with_warnings(repaired, warnings))
    }

    /// Win/loss/draw statistics of a participant
    pub fn stats(&self, participant: ParticipantId) -> Result<MatchStats> {
        let matches = self.store.load_matches()?;
        Ok(MatchStats::from_history(
            matches.iter().filter(|r| r.participant_id == participant),
        ))
    }

    /// Achievement engine sharing this ledger's store and lock table
    pub fn achievements(&self) -> &AchievementEngine {
        &self.achievements
    }

    /// Participant directory
    pub fn participants(&self) -> &Arc<dyn ParticipantDirectory> {
        &self.participants
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply point moves, then write the match collection.
    ///
    /// A failure at any step reverses the moves already applied, so either
    /// both the records and the points change or neither does.
    fn commit(&self, matches: &[MatchRecord], transfers: &[(ParticipantId, i64)]) -> Result<()> {
        let mut applied = Vec::with_capacity(transfers.len());
        for &(participant, delta) in transfers {
            if let Err(e) = self.participants.apply_point_delta(participant, delta) {
                self.revert_transfers(&applied);
                return Err(e);
            }
            applied.push((participant, delta));
        }

        if let Err(e) = self.store.replace_matches(matches) {
            self.revert_transfers(&applied);
            return Err(e);
        }
        Ok(())
    }

    fn revert_transfers(&self, applied: &[(ParticipantId, i64)]) {
        for &(participant, delta) in applied.iter().rev() {
            if let Err(e) = self.participants.apply_point_delta(participant, -delta) {
                tracing::error!(
                    participant_id = %participant,
                    delta,
                    error = %e,
                    "Failed to reverse point change"
                );
            }
        }
    }

    /// Evaluate both sides of a freshly written pair. Failures become warnings.
    fn evaluate_pair(
        &self,
        record: &MatchRecord,
        mirror: &MatchRecord,
        matches: &[MatchRecord],
        warnings: &mut Vec<Warning>,
    ) {
        let sides = if record.participant_id == mirror.participant_id {
            vec![record]
        } else {
            vec![record, mirror]
        };

        for side in sides {
            let participant = side.participant_id;
            let history: Vec<MatchRecord> = matches
                .iter()
                .filter(|r| r.participant_id == participant)
                .cloned()
                .collect();

            match self
                .achievements
                .evaluate_in_scope(participant, side, &history)
            {
                Ok(unlocked) => self.metrics.record_unlocked(unlocked.len()),
                Err(e) => {
                    tracing::warn!(
                        participant_id = %participant,
                        match_id = %side.id,
                        error = %e,
                        "Achievement evaluation failed"
                    );
                    warnings.push(Warning::AchievementEvaluation {
                        participant,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    fn lookup_name(&self, participant: ParticipantId) -> std::result::Result<String, String> {
        match self.participants.get(participant) {
            Ok(Some(p)) => Ok(p.nickname),
            Ok(None) => Err("participant not registered".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Display name to store, falling back to the configured sentinel
    fn resolve_name(&self, participant: ParticipantId, warnings: &mut Vec<Warning>) -> String {
        match self.lookup_name(participant) {
            Ok(name) => name,
            Err(reason) => {
                tracing::warn!(
                    participant_id = %participant,
                    reason = %reason,
                    "Display name unresolved, storing placeholder"
                );
                warnings.push(Warning::NameUnresolved {
                    participant,
                    reason,
                });
                self.config.unknown_opponent_name.clone()
            }
        }
    }

    /// Overwrite opponent names with the current display names.
    /// A record keeps its stored name when the lookup fails.
    fn refresh_names(&self, records: &mut [MatchRecord]) {
        let mut names: HashMap<ParticipantId, Option<String>> = HashMap::new();

        for record in records.iter_mut() {
            let opponent = record.opponent_id;
            let current = names
                .entry(opponent)
                .or_insert_with(|| self.lookup_name(opponent).ok());

            match current {
                Some(name) => record.opponent_name = Some(name.clone()),
                None if record.opponent_name.is_none() => {
                    record.opponent_name = Some(self.config.unknown_opponent_name.clone());
                }
                None => {}
            }
        }
    }
}

/// Point moves of one pair: `+delta` to `participant`, `-delta` to `opponent`.
/// A zero delta moves nothing.
fn pair_transfers(
    participant: ParticipantId,
    opponent: ParticipantId,
    delta: i64,
) -> Vec<(ParticipantId, i64)> {
    if delta == 0 {
        Vec::new()
    } else {
        vec![(participant, delta), (opponent, -delta)]
    }
}

/// Remove the counter-record of `record` from `matches`.
///
/// With several structural candidates the first in stored order is taken.
fn take_mirror(
    matches: &mut Vec<MatchRecord>,
    record: &MatchRecord,
    warnings: &mut Vec<Warning>,
) -> Option<MatchRecord> {
    let candidates: Vec<usize> = matches
        .iter()
        .enumerate()
        .filter(|(_, other)| record.is_mirrored_by(other))
        .map(|(index, _)| index)
        .collect();

    match candidates.as_slice() {
        [] => {
            tracing::warn!(match_id = %record.id, "Mirror record not found");
            warnings.push(Warning::MirrorMissing {
                match_id: record.id,
            });
            None
        }
        [index] => Some(matches.remove(*index)),
        [first, ..] => {
            tracing::warn!(
                match_id = %record.id,
                candidates = candidates.len(),
                "Several mirror candidates, removing the first"
            );
            warnings.push(Warning::MirrorAmbiguous {
                match_id: record.id,
                candidates: candidates.len(),
            });
            Some(matches.remove(*first))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Fault, MemoryStore};
    use crate::types::{Outcome, Participant};
    use chrono::NaiveDate;

    fn participant(id: u32, nickname: &str, points: i64) -> Participant {
        Participant {
            id: ParticipantId::new(id),
            nickname: nickname.to_string(),
            tier: "Silver".to_string(),
            points,
            comment: String::new(),
            profile_image: None,
        }
    }

    fn seeded_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_participants(vec![
            participant(7, "socrates", 100),
            participant(9, "diogenes", 100),
            participant(11, "hypatia", 100),
        ]))
    }

    fn ledger_over(store: Arc<MemoryStore>) -> MatchLedger {
        MatchLedger::with_store(store, Config::default()).unwrap()
    }

    fn draft(self_id: u32, opponent: u32, outcome: Outcome, delta: i64, day: u32) -> MatchDraft {
        MatchDraft {
            participant_id: ParticipantId::new(self_id),
            opponent_id: ParticipantId::new(opponent),
            outcome,
            score: "3-1".to_string(),
            match_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            game_type: "Discord".to_string(),
            description: String::new(),
            points_change: delta,
        }
    }

    fn points(ledger: &MatchLedger, id: u32) -> i64 {
        ledger
            .participants()
            .get(ParticipantId::new(id))
            .unwrap()
            .unwrap()
            .points
    }

    fn legacy_pair(first_id: u32, score: &str) -> (MatchRecord, MatchRecord) {
        let mut record =
            MatchRecord::from_draft(MatchId::new(first_id), Uuid::new_v4(), &draft(7, 9, Outcome::Win, 10, 5));
        record.score = score.to_string();
        record.pair_id = None;
        let mirror = record.mirror(MatchId::new(first_id + 1));
        (record, mirror)
    }

    #[test]
    fn test_add_writes_mirrored_pair() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());

        let receipt = ledger.add_match(draft(7, 9, Outcome::Win, 10, 5)).unwrap();
        assert!(receipt.is_clean());

        let record = receipt.value;
        assert_eq!(record.opponent_name.as_deref(), Some("diogenes"));

        let stored = store.load_matches().unwrap();
        assert_eq!(stored.len(), 2);
        let mirror = stored.iter().find(|r| r.id != record.id).unwrap();
        assert_eq!(mirror.participant_id, ParticipantId::new(9));
        assert_eq!(mirror.outcome, Outcome::Lose);
        assert_eq!(mirror.points_change, -10);
        assert_eq!(mirror.pair_id, record.pair_id);
        assert_eq!(mirror.opponent_name.as_deref(), Some("socrates"));

        assert_eq!(points(&ledger, 7), 110);
        assert_eq!(points(&ledger, 9), 90);
        assert_eq!(ledger.metrics().matches_recorded.get(), 1);
    }

    #[test]
    fn test_add_evaluates_both_sides() {
        let ledger = ledger_over(seeded_store());
        ledger.add_match(draft(7, 9, Outcome::Win, 10, 5)).unwrap();

        let winner = ledger.achievements().achievements(ParticipantId::new(7)).unwrap();
        assert!(winner.is_unlocked("first_win"));

        let loser = ledger.achievements().achievements(ParticipantId::new(9)).unwrap();
        assert_eq!(loser.unlocked_achievements, 0);

        let history = ledger.matches_for(ParticipantId::new(9)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, Outcome::Lose);
        assert_eq!(history[0].opponent_id, ParticipantId::new(7));
    }

    #[test]
    fn test_zero_delta_leaves_points() {
        let ledger = ledger_over(seeded_store());
        ledger.add_match(draft(7, 9, Outcome::Draw, 0, 5)).unwrap();
        assert_eq!(points(&ledger, 7), 100);
        assert_eq!(points(&ledger, 9), 100);
    }

    #[test]
    fn test_unknown_opponent_gets_placeholder() {
        let ledger = ledger_over(seeded_store());
        let receipt = ledger.add_match(draft(7, 42, Outcome::Win, 0, 5)).unwrap();

        assert_eq!(receipt.value.opponent_name.as_deref(), Some("Unknown participant"));
        assert!(matches!(
            receipt.warnings.as_slice(),
            [Warning::NameUnresolved { participant, .. }] if participant.get() == 42
        ));
    }

    #[test]
    fn test_failed_match_write_changes_nothing() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        store.set_fault(Fault::MatchWrite, true);

        let err = ledger
            .add_match(draft(7, 9, Outcome::Win, 10, 5))
            .unwrap_err();
        assert!(err.is_persistence());
        assert!(store.load_matches().unwrap().is_empty());
        assert_eq!(points(&ledger, 7), 100);
        assert_eq!(points(&ledger, 9), 100);
    }

    #[test]
    fn test_points_to_unregistered_participant_write_nothing() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());

        let err = ledger
            .add_match(draft(7, 42, Outcome::Win, 10, 5))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.load_matches().unwrap().is_empty());
        assert_eq!(points(&ledger, 7), 100);
        assert_eq!(ledger.metrics().matches_recorded.get(), 0);
    }

    #[test]
    fn test_failed_point_write_changes_nothing() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        store.set_fault(Fault::ParticipantWrite, true);

        let err = ledger
            .add_match(draft(7, 9, Outcome::Win, 10, 5))
            .unwrap_err();
        assert!(err.is_persistence());
        assert!(store.load_matches().unwrap().is_empty());

        store.set_fault(Fault::ParticipantWrite, false);
        assert_eq!(points(&ledger, 7), 100);
        assert_eq!(points(&ledger, 9), 100);
    }

    #[test]
    fn test_unreadable_participants_store_placeholders() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        store.set_fault(Fault::ParticipantRead, true);

        let receipt = ledger.add_match(draft(7, 9, Outcome::Draw, 0, 5)).unwrap();
        let unresolved = receipt
            .warnings
            .iter()
            .filter(|w| matches!(w, Warning::NameUnresolved { .. }))
            .count();
        assert_eq!(unresolved, 2);

        let stored = store.load_matches().unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored
            .iter()
            .all(|r| r.opponent_name.as_deref() == Some("Unknown participant")));

        store.set_fault(Fault::ParticipantRead, false);
        assert_eq!(points(&ledger, 7), 100);
        assert_eq!(points(&ledger, 9), 100);
    }

    #[test]
    fn test_achievement_failure_is_a_warning() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        store.set_fault(Fault::AchievementWrite, true);

        let receipt = ledger.add_match(draft(7, 9, Outcome::Win, 10, 5)).unwrap();
        assert!(!receipt.warnings.is_empty());
        assert!(receipt
            .warnings
            .iter()
            .all(|w| matches!(w, Warning::AchievementEvaluation { .. })));
        assert_eq!(store.load_matches().unwrap().len(), 2);
        assert_eq!(points(&ledger, 7), 110);
    }

    #[test]
    fn test_update_applies_net_delta() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        let original = ledger
            .add_match(draft(7, 9, Outcome::Win, 10, 5))
            .unwrap()
            .value;

        let mut rewrite = original.to_draft();
        rewrite.outcome = Outcome::Lose;
        rewrite.points_change = -5;
        let receipt = ledger.update_match(original.id, rewrite).unwrap();
        assert!(receipt.is_clean());
        let updated = receipt.value;

        assert_eq!(updated.id, original.id);
        assert_ne!(updated.pair_id, original.pair_id);
        assert_eq!(points(&ledger, 7), 95);
        assert_eq!(points(&ledger, 9), 105);

        let stored = store.load_matches().unwrap();
        assert_eq!(stored.len(), 2);
        let mirror = stored.iter().find(|r| r.id != updated.id).unwrap();
        assert!(updated.is_mirrored_by(mirror));
        assert_eq!(mirror.outcome, Outcome::Win);
        assert_eq!(mirror.points_change, 5);
    }

    #[test]
    fn test_update_can_change_participants() {
        let ledger = ledger_over(seeded_store());
        let original = ledger
            .add_match(draft(7, 9, Outcome::Win, 10, 5))
            .unwrap()
            .value;

        ledger
            .update_match(original.id, draft(7, 11, Outcome::Win, 10, 5))
            .unwrap();

        assert_eq!(points(&ledger, 7), 110);
        assert_eq!(points(&ledger, 9), 100);
        assert_eq!(points(&ledger, 11), 90);
        assert!(ledger.matches_for(ParticipantId::new(9)).unwrap().is_empty());
    }

    #[test]
    fn test_failed_update_keeps_pair_and_points() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        let original = ledger
            .add_match(draft(7, 9, Outcome::Win, 10, 5))
            .unwrap()
            .value;
        let before = store.load_matches().unwrap();

        let mut rewrite = original.to_draft();
        rewrite.opponent_id = ParticipantId::new(42);
        let err = ledger.update_match(original.id, rewrite).unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(store.load_matches().unwrap(), before);
        assert_eq!(points(&ledger, 7), 110);
        assert_eq!(points(&ledger, 9), 90);
    }

    #[test]
    fn test_failed_delete_keeps_pair_and_points() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        let record = ledger
            .add_match(draft(7, 9, Outcome::Win, 10, 5))
            .unwrap()
            .value;

        store.set_fault(Fault::MatchWrite, true);
        let err = ledger.delete_match(record.id).unwrap_err();
        assert!(err.is_persistence());
        store.set_fault(Fault::MatchWrite, false);

        assert_eq!(store.load_matches().unwrap().len(), 2);
        assert_eq!(points(&ledger, 7), 110);
        assert_eq!(points(&ledger, 9), 90);
    }

    #[test]
    fn test_update_unknown_match() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        ledger.add_match(draft(7, 9, Outcome::Win, 10, 5)).unwrap();
        let before = store.load_matches().unwrap();

        let err = ledger
            .update_match(MatchId::new(99), draft(7, 9, Outcome::Lose, 3, 5))
            .unwrap_err();
        assert!(matches!(err, Error::MatchNotFound(id) if id.get() == 99));
        assert_eq!(store.load_matches().unwrap(), before);
        assert_eq!(points(&ledger, 7), 110);
    }

    #[test]
    fn test_update_legacy_pair_by_structure() {
        let (record, mirror) = legacy_pair(1, "3-1");
        let store = Arc::new(
            MemoryStore::with_participants(vec![
                participant(7, "socrates", 110),
                participant(9, "diogenes", 90),
            ])
            .with_matches(vec![record.clone(), mirror]),
        );
        let ledger = ledger_over(store.clone());

        let receipt = ledger
            .update_match(record.id, draft(7, 9, Outcome::Draw, 0, 5))
            .unwrap();
        assert!(receipt.is_clean());

        let stored = store.load_matches().unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|r| r.pair_id.is_some()));
        assert_eq!(points(&ledger, 7), 100);
        assert_eq!(points(&ledger, 9), 100);
    }

    #[test]
    fn test_update_without_mirror_warns() {
        let (record, _) = legacy_pair(1, "3-1");
        let store = Arc::new(
            MemoryStore::with_participants(vec![
                participant(7, "socrates", 110),
                participant(9, "diogenes", 90),
            ])
            .with_matches(vec![record.clone()]),
        );
        let ledger = ledger_over(store.clone());

        let receipt = ledger
            .update_match(record.id, draft(7, 9, Outcome::Win, 10, 5))
            .unwrap();
        assert_eq!(
            receipt.warnings,
            vec![Warning::MirrorMissing { match_id: record.id }]
        );
        assert_eq!(store.load_matches().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_ambiguous_legacy_mirror() {
        let (record, mirror) = legacy_pair(1, "2-2");
        let duplicate = MatchRecord {
            id: MatchId::new(3),
            ..mirror.clone()
        };
        let store = Arc::new(
            MemoryStore::with_participants(vec![
                participant(7, "socrates", 110),
                participant(9, "diogenes", 90),
            ])
            .with_matches(vec![record.clone(), mirror, duplicate]),
        );
        let ledger = ledger_over(store.clone());

        let receipt = ledger.delete_match(record.id).unwrap();
        assert_eq!(
            receipt.warnings,
            vec![Warning::MirrorAmbiguous {
                match_id: record.id,
                candidates: 2
            }]
        );
        let remaining = store.load_matches().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, MatchId::new(3));
    }

    #[test]
    fn test_delete_removes_pair_and_is_idempotent() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        let record = ledger
            .add_match(draft(7, 9, Outcome::Win, 10, 5))
            .unwrap()
            .value;

        let receipt = ledger.delete_match(record.id).unwrap();
        assert_eq!(receipt.value.map(|r| r.id), Some(record.id));
        assert!(store.load_matches().unwrap().is_empty());
        assert_eq!(points(&ledger, 7), 100);
        assert_eq!(points(&ledger, 9), 100);

        let again = ledger.delete_match(record.id).unwrap();
        assert!(again.value.is_none());
        assert!(again.is_clean());
        assert_eq!(points(&ledger, 7), 100);
    }

    #[test]
    fn test_delete_from_mirror_side() {
        let store = seeded_store();
        let ledger = ledger_over(store.clone());
        ledger.add_match(draft(7, 9, Outcome::Win, 10, 5)).unwrap();
        let mirror = ledger.matches_for(ParticipantId::new(9)).unwrap().remove(0);

        ledger.delete_match(mirror.id).unwrap();
        assert!(store.load_matches().unwrap().is_empty());
        assert_eq!(points(&ledger, 7), 100);
        assert_eq!(points(&ledger, 9), 100);
    }

    #[test]
    fn test_matches_for_newest_first() {
        let ledger = ledger_over(seeded_store());
        ledger.add_match(draft(7, 9, Outcome::Win, 1, 3)).unwrap();
        ledger.add_match(draft(7, 11, Outcome::Lose, 1, 8)).unwrap();
        ledger.add_match(draft(9, 7, Outcome::Draw, 0, 3)).unwrap();

        let history = ledger.matches_for(ParticipantId::new(7)).unwrap();
        let days: Vec<u32> = history
            .iter()
            .map(|r| chrono::Datelike::day(&r.match_date))
            .collect();
        assert_eq!(days, vec![8, 3, 3]);
        // Same day: higher id first
        assert!(history[1].id > history[2].id);
        assert_eq!(history[0].opponent_name.as_deref(), Some("hypatia"));
    }

    #[test]
    fn test_get_match() {
        let ledger = ledger_over(seeded_store());
        let record = ledger
            .add_match(draft(7, 9, Outcome::Win, 10, 5))
            .unwrap()
            .value;

        assert_eq!(ledger.get_match(record.id).unwrap(), record);
        assert!(ledger.get_match(MatchId::new(50)).unwrap_err().is_not_found());
        assert_eq!(ledger.all_matches().unwrap().len(), 2);
    }

    #[test]
    fn test_migrate_opponent_names() {
        let (record, mirror) = legacy_pair(1, "3-1");
        let store = Arc::new(
            MemoryStore::with_participants(vec![
                participant(7, "socrates", 110),
                participant(9, "diogenes", 90),
            ])
            .with_matches(vec![record, mirror]),
        );
        let ledger = ledger_over(store.clone());

        let receipt = ledger.migrate_opponent_names().unwrap();
        assert_eq!(receipt.value, 2);
        assert!(receipt.is_clean());

        let names: Vec<Option<String>> = store
            .load_matches()
            .unwrap()
            .into_iter()
            .map(|r| r.opponent_name)
            .collect();
        assert_eq!(
            names,
            vec![Some("diogenes".to_string()), Some("socrates".to_string())]
        );

        // Nothing left to repair, so no write is attempted
        store.set_fault(Fault::MatchWrite, true);
        assert_eq!(ledger.migrate_opponent_names().unwrap().value, 0);
    }

    #[test]
    fn test_stats() {
        let ledger = ledger_over(seeded_store());
        ledger.add_match(draft(7, 9, Outcome::Win, 0, 1)).unwrap();
        ledger.add_match(draft(7, 9, Outcome::Win, 0, 2)).unwrap();
        ledger.add_match(draft(7, 11, Outcome::Draw, 0, 3)).unwrap();
        ledger.add_match(draft(11, 7, Outcome::Win, 0, 4)).unwrap();

        let stats = ledger.stats(ParticipantId::new(7)).unwrap();
        assert_eq!(stats.total_matches, 4);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.draws, 1);
        assert!((stats.win_rate - 50.0).abs() < f64::EPSILON);

        assert_eq!(ledger.stats(ParticipantId::new(99)).unwrap().total_matches, 0);
    }

    #[test]
    fn test_concurrent_adds_keep_points_consistent() {
        let store = seeded_store();
        let ledger = Arc::new(ledger_over(store.clone()));
        let pairs = [(7, 9), (9, 7), (9, 11), (11, 7)];

        let handles: Vec<_> = pairs
            .iter()
            .map(|&(a, b)| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for day in 1..=20 {
                        ledger
                            .add_match(draft(a, b, Outcome::Win, 3, day))
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let matches = store.load_matches().unwrap();
        assert_eq!(matches.len(), 160);

        let mut ids: Vec<MatchId> = matches.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 160);

        for id in [7, 9, 11] {
            let earned: i64 = matches
                .iter()
                .filter(|r| r.participant_id.get() == id)
                .map(|r| r.points_change)
                .sum();
            assert_eq!(points(&ledger, id), 100 + earned);
        }
    }
}
