//! Storage layer
//!
//! The engine only needs two primitives per kind of record: load the whole
//! collection in order, and atomically replace it. There is no partial-row
//! update.
//!
//! # Collections
//!
//! - `matches.json` - Every match record, both sides of each pair
//! - `participants.json` - Participant profiles and points
//! - `achievements/participant_<id>.json` - One participant's unlock state

use crate::{
    error::{Error, Result},
    types::{Achievement, MatchRecord, Participant, ParticipantId},
    Config,
};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

const MATCHES_FILE: &str = "matches.json";
const PARTICIPANTS_FILE: &str = "participants.json";
const ACHIEVEMENTS_DIR: &str = "achievements";

/// Persistence collaborator
pub trait Store: Send + Sync {
    /// Load all match records in stored order
    fn load_matches(&self) -> Result<Vec<MatchRecord>>;

    /// Replace the whole match collection
    fn replace_matches(&self, records: &[MatchRecord]) -> Result<()>;

    /// Load all participants in stored order
    fn load_participants(&self) -> Result<Vec<Participant>>;

    /// Replace the whole participant collection
    fn replace_participants(&self, participants: &[Participant]) -> Result<()>;

    /// Load one participant's achievement set, `None` if never materialized
    fn load_achievements(&self, participant: ParticipantId) -> Result<Option<Vec<Achievement>>>;

    /// Replace one participant's achievement set
    fn save_achievements(&self, participant: ParticipantId, achievements: &[Achievement])
        -> Result<()>;
}

/// JSON file store rooted at the configured data directory
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    pretty: bool,
}

impl FileStore {
    /// Open or create the data directory
    pub fn open(config: &Config) -> Result<Self> {
        let root = config.data_dir.clone();
        std::fs::create_dir_all(root.join(ACHIEVEMENTS_DIR))?;

        tracing::info!(data_dir = ?root, "Opened file store");

        Ok(Self {
            root,
            pretty: config.pretty_json,
        })
    }

    /// Data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn achievements_path(&self, participant: ParticipantId) -> PathBuf {
        self.root
            .join(ACHIEVEMENTS_DIR)
            .join(format!("participant_{}.json", participant))
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write via temp file + rename so readers never observe a torn file
    fn write<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = ?path, bytes = bytes.len(), "Collection written");
        Ok(())
    }
}

impl Store for FileStore {
    fn load_matches(&self) -> Result<Vec<MatchRecord>> {
        Ok(Self::read(&self.root.join(MATCHES_FILE))?.unwrap_or_default())
    }

    fn replace_matches(&self, records: &[MatchRecord]) -> Result<()> {
        self.write(&self.root.join(MATCHES_FILE), records)
    }

    fn load_participants(&self) -> Result<Vec<Participant>> {
        Ok(Self::read(&self.root.join(PARTICIPANTS_FILE))?.unwrap_or_default())
    }

    fn replace_participants(&self, participants: &[Participant]) -> Result<()> {
        self.write(&self.root.join(PARTICIPANTS_FILE), participants)
    }

    fn load_achievements(&self, participant: ParticipantId) -> Result<Option<Vec<Achievement>>> {
        Self::read(&self.achievements_path(participant))
    }

    fn save_achievements(
        &self,
        participant: ParticipantId,
        achievements: &[Achievement],
    ) -> Result<()> {
        self.write(&self.achievements_path(participant), achievements)
    }
}

/// Fault switches for [`MemoryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `replace_matches` fails
    MatchWrite,
    /// `load_participants` fails
    ParticipantRead,
    /// `replace_participants` fails
    ParticipantWrite,
    /// `save_achievements` fails
    AchievementWrite,
}

/// In-process store, mainly for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    matches: RwLock<Vec<MatchRecord>>,
    participants: RwLock<Vec<Participant>>,
    achievements: RwLock<HashMap<ParticipantId, Vec<Achievement>>>,
    fail_match_write: AtomicBool,
    fail_participant_read: AtomicBool,
    fail_participant_write: AtomicBool,
    fail_achievement_write: AtomicBool,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with participants
    pub fn with_participants(participants: Vec<Participant>) -> Self {
        let store = Self::default();
        *store.participants.write() = participants;
        store
    }

    /// Store seeded with raw match records (e.g. legacy data)
    pub fn with_matches(self, records: Vec<MatchRecord>) -> Self {
        *self.matches.write() = records;
        self
    }

    /// Turn a fault on or off
    pub fn set_fault(&self, fault: Fault, enabled: bool) {
        self.flag(fault).store(enabled, Ordering::SeqCst);
    }

    fn flag(&self, fault: Fault) -> &AtomicBool {
        match fault {
            Fault::MatchWrite => &self.fail_match_write,
            Fault::ParticipantRead => &self.fail_participant_read,
            Fault::ParticipantWrite => &self.fail_participant_write,
            Fault::AchievementWrite => &self.fail_achievement_write,
        }
    }

    fn check(&self, fault: Fault) -> Result<()> {
        if self.flag(fault).load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("injected fault: {:?}", fault)));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn load_matches(&self) -> Result<Vec<MatchRecord>> {
        Ok(self.matches.read().clone())
    }

    fn replace_matches(&self, records: &[MatchRecord]) -> Result<()> {
        self.check(Fault::MatchWrite)?;
        *self.matches.write() = records.to_vec();
        Ok(())
    }

    fn load_participants(&self) -> Result<Vec<Participant>> {
        self.check(Fault::ParticipantRead)?;
        Ok(self.participants.read().clone())
    }

    fn replace_participants(&self, participants: &[Participant]) -> Result<()> {
        self.check(Fault::ParticipantWrite)?;
        *self.participants.write() = participants.to_vec();
        Ok(())
    }

    fn load_achievements(&self, participant: ParticipantId) -> Result<Option<Vec<Achievement>>> {
        Ok(self.achievements.read().get(&participant).cloned())
    }

    fn save_achievements(
        &self,
        participant: ParticipantId,
        achievements: &[Achievement],
    ) -> Result<()> {
        self.check(Fault::AchievementWrite)?;
        self.achievements
            .write()
            .insert(participant, achievements.to_vec());
        Ok(())
    }
}
