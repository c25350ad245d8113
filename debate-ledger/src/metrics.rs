//! Metrics collection for observability
//!
//! Every ledger instance owns its own registry, so several ledgers can live
//! in one process (tests, embedding) without name clashes.
//!
//! # Metrics
//!
//! - `debate_ledger_matches_recorded_total` - Match pairs written by add
//! - `debate_ledger_matches_updated_total` - Match pairs rewritten by update
//! - `debate_ledger_matches_deleted_total` - Match pairs removed by delete
//! - `debate_ledger_achievements_unlocked_total` - Achievements unlocked by evaluation
//! - `debate_ledger_warnings_total` - Best-effort side effects that failed, by kind

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::error::Warning;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Match pairs recorded
    pub matches_recorded: IntCounter,

    /// Match pairs updated
    pub matches_updated: IntCounter,

    /// Match pairs deleted
    pub matches_deleted: IntCounter,

    /// Achievements unlocked by rule evaluation
    pub achievements_unlocked: IntCounter,

    /// Side-effect warnings, labelled by kind
    pub warnings: IntCounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let matches_recorded = IntCounter::new(
            "debate_ledger_matches_recorded_total",
            "Match pairs written by add",
        )?;
        registry.register(Box::new(matches_recorded.clone()))?;

        let matches_updated = IntCounter::new(
            "debate_ledger_matches_updated_total",
            "Match pairs rewritten by update",
        )?;
        registry.register(Box::new(matches_updated.clone()))?;

        let matches_deleted = IntCounter::new(
            "debate_ledger_matches_deleted_total",
            "Match pairs removed by delete",
        )?;
        registry.register(Box::new(matches_deleted.clone()))?;

        let achievements_unlocked = IntCounter::new(
            "debate_ledger_achievements_unlocked_total",
            "Achievements unlocked by rule evaluation",
        )?;
        registry.register(Box::new(achievements_unlocked.clone()))?;

        let warnings = IntCounterVec::new(
            Opts::new(
                "debate_ledger_warnings_total",
                "Best-effort side effects that failed",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(warnings.clone()))?;

        Ok(Self {
            matches_recorded,
            matches_updated,
            matches_deleted,
            achievements_unlocked,
            warnings,
            registry,
        })
    }

    /// Record achievement unlocks
    pub fn record_unlocked(&self, count: usize) {
        self.achievements_unlocked.inc_by(count as u64);
    }

    /// Record side-effect warnings
    pub fn record_warnings(&self, warnings: &[Warning]) {
        for warning in warnings {
            self.warnings.with_label_values(&[warning_kind(warning)]).inc();
        }
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format
    pub fn gather_text(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::Error::Other(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("matches_recorded", &self.matches_recorded.get())
            .field("matches_updated", &self.matches_updated.get())
            .field("matches_deleted", &self.matches_deleted.get())
            .field("achievements_unlocked", &self.achievements_unlocked.get())
            .finish_non_exhaustive()
    }
}

fn warning_kind(warning: &Warning) -> &'static str {
    match warning {
        Warning::NameUnresolved { .. } => "name_unresolved",
        Warning::MirrorMissing { .. } => "mirror_missing",
        Warning::MirrorAmbiguous { .. } => "mirror_ambiguous",
        Warning::AchievementEvaluation { .. } => "achievement_evaluation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchId, ParticipantId};

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.matches_recorded.get(), 0);
        assert_eq!(metrics.achievements_unlocked.get(), 0);
    }

    #[test]
    fn test_instances_do_not_clash() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.matches_recorded.inc();
        assert_eq!(a.matches_recorded.get(), 1);
        assert_eq!(b.matches_recorded.get(), 0);
    }

    #[test]
    fn test_record_warnings_by_kind() {
        let metrics = Metrics::new().unwrap();
        metrics.record_warnings(&[
            Warning::MirrorMissing {
                match_id: MatchId::new(1),
            },
            Warning::NameUnresolved {
                participant: ParticipantId::new(2),
                reason: "unknown".into(),
            },
            Warning::MirrorMissing {
                match_id: MatchId::new(3),
            },
        ]);

        assert_eq!(
            metrics
                .warnings
                .with_label_values(&["mirror_missing"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .warnings
                .with_label_values(&["name_unresolved"])
                .get(),
            1
        );
    }

    #[test]
    fn test_gather_text() {
        let metrics = Metrics::new().unwrap();
        metrics.matches_deleted.inc();
        metrics.record_unlocked(2);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("debate_ledger_matches_deleted_total 1"));
        assert!(text.contains("debate_ledger_achievements_unlocked_total 2"));
    }
}
