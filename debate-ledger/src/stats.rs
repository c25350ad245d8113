//! Win/loss/draw aggregation over a participant's history

use crate::types::{MatchRecord, Outcome};
use serde::{Deserialize, Serialize};

/// Aggregated match statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchStats {
    /// Number of records
    pub total_matches: u32,
    /// WIN records
    pub wins: u32,
    /// LOSE records
    pub losses: u32,
    /// DRAW records
    pub draws: u32,
    /// wins / total * 100, or 0 for an empty history
    pub win_rate: f64,
}

impl MatchStats {
    /// Aggregate a participant's records
    pub fn from_history<'a>(history: impl IntoIterator<Item = &'a MatchRecord>) -> Self {
        let mut stats = MatchStats::default();

        for record in history {
            stats.total_matches += 1;
            match record.outcome {
                Outcome::Win => stats.wins += 1,
                Outcome::Lose => stats.losses += 1,
                Outcome::Draw => stats.draws += 1,
            }
        }

        if stats.total_matches > 0 {
            stats.win_rate = stats.wins as f64 / stats.total_matches as f64 * 100.0;
        }

        stats
    }
}
