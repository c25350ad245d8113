//! Achievement engine
//!
//! The catalog is an immutable rule table shared by every participant. Each
//! participant owns a private copy of the unlock state, materialized from the
//! catalog the first time it is read.
//!
//! Evaluation runs after every ledger mutation and only ever flips entries
//! from locked to unlocked. Locking again is an administrative action.

use crate::{
    locks::LockTable,
    storage::Store,
    types::{Achievement, AchievementCategory, MatchRecord, Outcome, ParticipantId},
    Error, Result,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// How an achievement is earned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Any win
    FirstWin,
    /// Consecutive wins counted back from the most recent match
    WinStreak,
    /// Total wins
    TotalWins,
    /// Wins on one platform (game type label, case-insensitive)
    PlatformWins(&'static str),
    /// Distinct platforms with at least one win
    PlatformVariety,
    /// Leaderboard placement; ranking is not available to evaluation
    Rank,
    /// Awarded by administrators only
    Manual,
}

impl Rule {
    /// Evaluate against a chronological (oldest first) history
    pub fn is_satisfied(&self, requirement: u32, history: &[MatchRecord]) -> bool {
        let requirement = requirement as usize;
        let wins = || history.iter().filter(|r| r.outcome == Outcome::Win);

        match *self {
            Rule::FirstWin => wins().next().is_some(),
            Rule::WinStreak => current_win_streak(history) >= requirement,
            Rule::TotalWins => wins().count() >= requirement,
            Rule::PlatformWins(platform) => {
                wins()
                    .filter(|r| r.game_type.eq_ignore_ascii_case(platform))
                    .count()
                    >= requirement
            }
            Rule::PlatformVariety => {
                let platforms: HashSet<String> =
                    wins().map(|r| r.game_type.to_lowercase()).collect();
                platforms.len() >= requirement
            }
            Rule::Rank | Rule::Manual => false,
        }
    }
}

/// Consecutive wins at the end of a chronological history
pub fn current_win_streak(history: &[MatchRecord]) -> usize {
    history
        .iter()
        .rev()
        .take_while(|r| r.outcome == Outcome::Win)
        .count()
}

/// Catalog entry
#[derive(Debug, Clone, Copy)]
pub struct AchievementDef {
    /// Stable key
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Display description
    pub description: &'static str,
    /// Display icon
    pub icon: &'static str,
    /// Grouping
    pub category: AchievementCategory,
    /// Rule threshold
    pub requirement: u32,
    /// Unlock rule
    pub rule: Rule,
}

impl AchievementDef {
    /// Fresh, locked per-participant copy
    pub fn to_locked(&self) -> Achievement {
        Achievement {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            category: self.category,
            requirement: self.requirement,
            unlocked: false,
            unlocked_at: None,
        }
    }

    /// Whether the rule holds for a chronological history
    pub fn is_satisfied(&self, history: &[MatchRecord]) -> bool {
        self.rule.is_satisfied(self.requirement, history)
    }
}

macro_rules! def {
    ($id:literal, $name:literal, $description:literal, $icon:literal, $category:ident, $requirement:literal, $rule:expr) => {
        AchievementDef {
            id: $id,
            name: $name,
            description: $description,
            icon: $icon,
            category: AchievementCategory::$category,
            requirement: $requirement,
            rule: $rule,
        }
    };
}

/// The fixed, ordered catalog
pub const CATALOG: &[AchievementDef] = &[
    // Victory
    def!("first_win", "First Victory", "Won a first debate", "🥇", Victory, 1, Rule::FirstWin),
    def!("winning_streak_3", "On a Roll", "Won 3 debates in a row", "🔥", Victory, 3, Rule::WinStreak),
    def!("winning_streak_5", "Seasoned Arguer", "Won 5 debates in a row", "🔥🔥", Victory, 5, Rule::WinStreak),
    def!("winning_streak_10", "Debate Royalty", "Won 10 debates in a row", "🔥🔥🔥", Victory, 10, Rule::WinStreak),
    def!("total_wins_10", "Rookie Debater", "Won 10 debates in total", "🏆", Victory, 10, Rule::TotalWins),
    def!("total_wins_50", "Skilled Debater", "Won 50 debates in total", "🏆🏆", Victory, 50, Rule::TotalWins),
    def!("total_wins_100", "Debate Master", "Won 100 debates in total", "🏆🏆🏆", Victory, 100, Rule::TotalWins),
    // Ranking
    def!("reach_rank_1", "Top Debater", "Reached first place on the leaderboard", "👑", Ranking, 1, Rule::Rank),
    def!("reach_rank_3", "Podium Debater", "Entered the top 3 of the leaderboard", "🥉", Ranking, 3, Rule::Rank),
    def!("reach_rank_10", "Top 10", "Entered the top 10 of the leaderboard", "⭐", Ranking, 10, Rule::Rank),
    def!("tier_upgrade", "Promoted", "Moved up to a higher tier", "⬆️", Ranking, 1, Rule::Rank),
    // Platform
    def!("platform_variety_3", "Versatile", "Won debates on 3 different platforms", "💬", Platform, 3, Rule::PlatformVariety),
    def!("platform_variety_5", "Platform Master", "Won debates on 5 different platforms", "💬💬", Platform, 5, Rule::PlatformVariety),
    def!("kakao_master", "KakaoTalk Champion", "Won 10 debates on KakaoTalk", "💬", Platform, 10, Rule::PlatformWins("KakaoTalk")),
    def!("discord_master", "Discord Champion", "Won 10 debates on Discord", "🎧", Platform, 10, Rule::PlatformWins("Discord")),
    def!("youtube_master", "YouTube Champion", "Won 10 debates in YouTube comments", "📺", Platform, 10, Rule::PlatformWins("YouTube")),
    def!("twitter_master", "Twitter Champion", "Won 10 debates on Twitter", "🐦", Platform, 10, Rule::PlatformWins("Twitter")),
    // Special
    def!("comeback_king", "Comeback King", "Came from behind to win 3 debates in a row", "💪", Special, 3, Rule::Manual),
    def!("perfect_win", "Flawless Argument", "Fully convinced the opponent", "💎", Special, 1, Rule::Manual),
    def!("long_debate", "Marathon Debate", "Debated for more than two hours", "⏰", Special, 120, Rule::Manual),
    def!("fact_checker", "Fact Checker", "Won 10 debates by checking the facts", "🔍", Special, 10, Rule::Manual),
    def!("logic_master", "Master of Logic", "Won 20 debates by pointing out fallacies", "🧠", Special, 20, Rule::Manual),
    def!("calm_debater", "Cool Head", "Won 30 debates without losing composure", "😌", Special, 30, Rule::Manual),
    def!("topic_master", "Topic Master", "Won debates across politics, economy and society", "📚", Special, 5, Rule::Manual),
    def!("respect_earner", "Respected Debater", "Won while earning the opponent's respect", "🤝", Special, 10, Rule::Manual),
];

/// Catalog entry by id
pub fn definition(id: &str) -> Option<&'static AchievementDef> {
    CATALOG.iter().find(|def| def.id == id)
}

/// One participant's achievements with totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAchievements {
    /// Owner
    pub participant_id: ParticipantId,
    /// Catalog entries with personal unlock state
    pub achievements: Vec<Achievement>,
    /// Number of entries
    pub total_achievements: usize,
    /// Number of unlocked entries
    pub unlocked_achievements: usize,
}

impl ParticipantAchievements {
    /// Build the view over a set
    pub fn new(participant_id: ParticipantId, achievements: Vec<Achievement>) -> Self {
        let unlocked_achievements = achievements.iter().filter(|a| a.unlocked).count();
        Self {
            participant_id,
            total_achievements: achievements.len(),
            unlocked_achievements,
            achievements,
        }
    }

    /// Entry by id
    pub fn get(&self, id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == id)
    }

    /// Whether an entry exists and is unlocked
    pub fn is_unlocked(&self, id: &str) -> bool {
        self.get(id).map(|a| a.unlocked).unwrap_or(false)
    }

    /// Entries of one category
    pub fn by_category(&self, category: AchievementCategory) -> Vec<&Achievement> {
        self.achievements
            .iter()
            .filter(|a| a.category == category)
            .collect()
    }

    /// Unlocked share in `0.0..=1.0`
    pub fn completion(&self) -> f32 {
        if self.total_achievements == 0 {
            return 0.0;
        }
        self.unlocked_achievements as f32 / self.total_achievements as f32
    }
}

/// Evaluates rules and owns per-participant unlock state
pub struct AchievementEngine {
    store: Arc<dyn Store>,
    locks: Arc<LockTable>,
}

impl AchievementEngine {
    /// Create over a store, sharing the ledger's lock table
    pub fn new(store: Arc<dyn Store>, locks: Arc<LockTable>) -> Self {
        Self { store, locks }
    }

    /// Participant's achievements, materialized from the catalog on first access
    pub fn achievements(&self, participant: ParticipantId) -> Result<ParticipantAchievements> {
        let _scope = self.locks.lock(participant);
        let set = self.materialize(participant)?;
        Ok(ParticipantAchievements::new(participant, set))
    }

    /// Evaluate every locked entry against the participant's full history and
    /// return the ones that became unlocked.
    pub fn evaluate(
        &self,
        participant: ParticipantId,
        new_record: &MatchRecord,
        history: &[MatchRecord],
    ) -> Result<Vec<Achievement>> {
        let _scope = self.locks.lock(participant);
        self.evaluate_in_scope(participant, new_record, history)
    }

    /// Same as [`evaluate`](Self::evaluate); the caller already holds the
    /// participant's scope.
    pub(crate) fn evaluate_in_scope(
        &self,
        participant: ParticipantId,
        new_record: &MatchRecord,
        history: &[MatchRecord],
    ) -> Result<Vec<Achievement>> {
        let mut ordered = history.to_vec();
        ordered.sort_by_key(|r| (r.match_date, r.id));

        let mut set = self.materialize(participant)?;
        let today = today();
        let mut newly_unlocked = Vec::new();

        for achievement in set.iter_mut().filter(|a| !a.unlocked) {
            let satisfied = definition(&achievement.id)
                .map(|def| def.is_satisfied(&ordered))
                .unwrap_or(false);

            if satisfied && achievement.unlock(today) {
                newly_unlocked.push(achievement.clone());
            }
        }

        if !newly_unlocked.is_empty() {
            self.store.save_achievements(participant, &set)?;

            tracing::info!(
                participant_id = %participant,
                match_id = %new_record.id,
                unlocked = ?newly_unlocked.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
                "Achievements unlocked"
            );
        }

        Ok(newly_unlocked)
    }

    /// Flip one entry
    pub fn toggle(&self, participant: ParticipantId, id: &str) -> Result<ParticipantAchievements> {
        let today = today();
        self.modify(participant, |set| {
            let achievement = find_mut(set, id)?;
            if achievement.unlocked {
                achievement.lock();
            } else {
                achievement.unlock(today);
            }
            Ok(())
        })
    }

    /// Unlock one entry; an already unlocked entry keeps its date
    pub fn unlock(&self, participant: ParticipantId, id: &str) -> Result<ParticipantAchievements> {
        let today = today();
        self.modify(participant, |set| {
            find_mut(set, id)?.unlock(today);
            Ok(())
        })
    }

    /// Lock one entry
    pub fn lock(&self, participant: ParticipantId, id: &str) -> Result<ParticipantAchievements> {
        self.modify(participant, |set| {
            find_mut(set, id)?.lock();
            Ok(())
        })
    }

    /// Unlock every entry, stamping today on all of them
    pub fn unlock_all(&self, participant: ParticipantId) -> Result<ParticipantAchievements> {
        let today = today();
        self.modify(participant, |set| {
            for achievement in set.iter_mut() {
                achievement.unlocked = true;
                achievement.unlocked_at = Some(today);
            }
            Ok(())
        })
    }

    /// Lock every entry
    pub fn lock_all(&self, participant: ParticipantId) -> Result<ParticipantAchievements> {
        self.modify(participant, |set| {
            for achievement in set.iter_mut() {
                achievement.lock();
            }
            Ok(())
        })
    }

    /// Administrative read-modify-write of the whole set
    fn modify(
        &self,
        participant: ParticipantId,
        change: impl FnOnce(&mut Vec<Achievement>) -> Result<()>,
    ) -> Result<ParticipantAchievements> {
        let _scope = self.locks.lock(participant);

        // A rejected change writes nothing, not even the first-access copy
        let (mut set, _) = self.load_reconciled(participant)?;
        change(&mut set)?;
        self.store.save_achievements(participant, &set)?;

        tracing::info!(participant_id = %participant, "Achievement set updated by administrator");

        Ok(ParticipantAchievements::new(participant, set))
    }

    /// Load the stored set, creating or completing it from the catalog
    fn materialize(&self, participant: ParticipantId) -> Result<Vec<Achievement>> {
        let (set, changed) = self.load_reconciled(participant)?;
        if changed {
            self.store.save_achievements(participant, &set)?;
        }
        Ok(set)
    }

    /// Stored set completed from the catalog, and whether it differs from storage
    fn load_reconciled(&self, participant: ParticipantId) -> Result<(Vec<Achievement>, bool)> {
        let stored = self.store.load_achievements(participant)?;
        let first_access = stored.is_none();
        let mut set = stored.unwrap_or_default();

        let missing: Vec<Achievement> = CATALOG
            .iter()
            .filter(|def| !set.iter().any(|a| a.id == def.id))
            .map(AchievementDef::to_locked)
            .collect();

        let changed = first_access || !missing.is_empty();
        if changed {
            tracing::debug!(
                participant_id = %participant,
                added = missing.len(),
                "Materializing achievement set from catalog"
            );
            set.extend(missing);
        }

        Ok((set, changed))
    }
}

fn find_mut<'a>(set: &'a mut [Achievement], id: &str) -> Result<&'a mut Achievement> {
    set.iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| Error::AchievementNotFound(id.to_string()))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
