//! Core types for the ledger
//!
//! All persisted types serialize to plain JSON so the collections stay
//! readable and hand-editable by administrators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Participant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(u32);

impl ParticipantId {
    /// Create new participant ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw integer value
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Match record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(u32);

impl MatchId {
    /// Create new match ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw integer value
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Next id after the highest one in use, or 1 for an empty ledger
    pub fn next_after<'a>(ids: impl IntoIterator<Item = &'a MatchId>) -> Self {
        Self(ids.into_iter().map(|id| id.0).max().unwrap_or(0) + 1)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a match from one side's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// Self side won
    Win,
    /// Self side lost
    Lose,
    /// Nobody won
    Draw,
}

impl Outcome {
    /// Outcome as seen by the opponent
    pub fn inverse(self) -> Self {
        match self {
            Outcome::Win => Outcome::Lose,
            Outcome::Lose => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }

    /// Wire label
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "WIN",
            Outcome::Lose => "LOSE",
            Outcome::Draw => "DRAW",
        }
    }

    /// Parse from label (case-insensitive)
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "WIN" => Some(Outcome::Win),
            "LOSE" => Some(Outcome::Lose),
            "DRAW" => Some(Outcome::Draw),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique id
    pub id: ParticipantId,

    /// Display name
    pub nickname: String,

    /// Tier label (ordinal rank)
    pub tier: String,

    /// Cumulative points; no floor is enforced
    pub points: i64,

    /// Free-text comment
    #[serde(default)]
    pub comment: String,

    /// Profile image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// Registration input for a participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDraft {
    /// Display name
    pub nickname: String,
    /// Tier label
    pub tier: String,
    /// Starting points
    pub points: i64,
    /// Free-text comment
    pub comment: String,
    /// Profile image reference
    pub profile_image: Option<String>,
}

/// Input for recording or rewriting a match, from the self side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDraft {
    /// Self side
    pub participant_id: ParticipantId,
    /// Opponent
    pub opponent_id: ParticipantId,
    /// Outcome for the self side
    pub outcome: Outcome,
    /// Score label, e.g. "3-1"
    pub score: String,
    /// Day the match took place
    pub match_date: NaiveDate,
    /// Game or platform label
    pub game_type: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Points gained by the self side (the opponent loses the same amount)
    #[serde(default)]
    pub points_change: i64,
}

/// One side of a stored match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Unique record id
    pub id: MatchId,

    /// Self side
    pub participant_id: ParticipantId,

    /// Opponent
    pub opponent_id: ParticipantId,

    /// Outcome for the self side
    pub outcome: Outcome,

    /// Score label
    pub score: String,

    /// Day the match took place
    pub match_date: NaiveDate,

    /// Game or platform label
    pub game_type: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Opponent display name (denormalized, not authoritative)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_name: Option<String>,

    /// Points applied to the self side
    #[serde(default)]
    pub points_change: i64,

    /// Link shared by both records of a pair; absent on legacy records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_id: Option<Uuid>,
}

impl MatchRecord {
    /// Build the self-side record for a draft
    pub fn from_draft(id: MatchId, pair_id: Uuid, draft: &MatchDraft) -> Self {
        Self {
            id,
            participant_id: draft.participant_id,
            opponent_id: draft.opponent_id,
            outcome: draft.outcome,
            score: draft.score.clone(),
            match_date: draft.match_date,
            game_type: draft.game_type.clone(),
            description: draft.description.clone(),
            opponent_name: None,
            points_change: draft.points_change,
            pair_id: Some(pair_id),
        }
    }

    /// Synthesize the opponent-side counter-record
    pub fn mirror(&self, id: MatchId) -> Self {
        Self {
            id,
            participant_id: self.opponent_id,
            opponent_id: self.participant_id,
            outcome: self.outcome.inverse(),
            score: self.score.clone(),
            match_date: self.match_date,
            game_type: self.game_type.clone(),
            description: self.description.clone(),
            opponent_name: None,
            points_change: -self.points_change,
            pair_id: self.pair_id,
        }
    }

    /// Whether `other` is the counter-record of `self`.
    ///
    /// Records carrying a pair id match by link only. Legacy records fall back
    /// to swapped ids plus equal date and score.
    pub fn is_mirrored_by(&self, other: &MatchRecord) -> bool {
        if other.id == self.id {
            return false;
        }
        match self.pair_id {
            Some(pair_id) => other.pair_id == Some(pair_id),
            None => {
                other.participant_id == self.opponent_id
                    && other.opponent_id == self.participant_id
                    && other.match_date == self.match_date
                    && other.score == self.score
            }
        }
    }

    /// Draft carrying this record's data
    pub fn to_draft(&self) -> MatchDraft {
        MatchDraft {
            participant_id: self.participant_id,
            opponent_id: self.opponent_id,
            outcome: self.outcome,
            score: self.score.clone(),
            match_date: self.match_date,
            game_type: self.game_type.clone(),
            description: self.description.clone(),
            points_change: self.points_change,
        }
    }
}

/// Achievement grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AchievementCategory {
    /// Win counts and streaks
    Victory,
    /// Leaderboard placement
    Ranking,
    /// Platform-specific wins
    Platform,
    /// Hand-awarded badges
    Special,
}

/// Achievement with one participant's unlock state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    /// Stable catalog key
    pub id: String,
    /// Display name
    pub name: String,
    /// Display description
    pub description: String,
    /// Display icon
    pub icon: String,
    /// Grouping
    pub category: AchievementCategory,
    /// Numeric threshold of the rule
    pub requirement: u32,
    /// Unlock flag
    pub unlocked: bool,
    /// Set only while unlocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<NaiveDate>,
}

impl Achievement {
    /// Mark unlocked on `today`; returns false if it already was
    pub fn unlock(&mut self, today: NaiveDate) -> bool {
        if self.unlocked {
            return false;
        }
        self.unlocked = true;
        self.unlocked_at = Some(today);
        true
    }

    /// Clear unlock state; returns false if it was already locked
    pub fn lock(&mut self) -> bool {
        let was_unlocked = self.unlocked;
        self.unlocked = false;
        self.unlocked_at = None;
        was_unlocked
    }
}
