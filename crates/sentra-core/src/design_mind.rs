use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::advisor::{DesignChange, DesignPlan};
use crate::theme::{Theme, ThemePrefs};
use crate::types::UserId;

pub const HISTORY_CAP: usize = 100;
pub const RATE_WINDOW_MS: u64 = 60 * 60 * 1_000;
pub const RATE_CAP: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: u64,
    pub at_ms: u64,
    pub applied_changes: Vec<DesignChange>,
    pub plan: DesignPlan,
    pub theme: Theme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub applied: bool,
    pub record_id: Option<u64>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApplyOutcome {
    fn refused(reason: &str) -> Self {
        ApplyOutcome {
            applied: false,
            record_id: None,
            count: 0,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("change {0} not found")]
    RollbackNotFound(u64),
    #[error("change {0} has no prior state to restore")]
    RollbackNoPriorState(u64),
}

/// The single mutation domain: current theme, capped change history, and the
/// rolling rate limit over it. `apply` checks and appends under one `&mut`
/// borrow, so the check-then-act pair cannot interleave.
pub struct DesignMind {
    theme: Theme,
    history: Vec<ChangeRecord>,
    next_id: u64,
    personal: HashMap<UserId, Theme>,
}

impl DesignMind {
    pub fn new(theme: Theme) -> Self {
        DesignMind {
            theme,
            history: Vec::new(),
            next_id: 1,
            personal: HashMap::new(),
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn recent_applies(&self, now_ms: u64) -> usize {
        self.history
            .iter()
            .filter(|record| now_ms.saturating_sub(record.at_ms) < RATE_WINDOW_MS)
            .count()
    }

    pub fn can_apply(&self, now_ms: u64) -> bool {
        self.recent_applies(now_ms) < RATE_CAP
    }

    pub fn apply(&mut self, plan: DesignPlan, now_ms: u64) -> ApplyOutcome {
        if !self.can_apply(now_ms) {
            return ApplyOutcome::refused("rate limit");
        }
        self.theme = self.theme.adjusted(&plan.theme_adjustments, now_ms);
        let id = self.next_id;
        self.next_id += 1;
        let record = ChangeRecord {
            id,
            at_ms: now_ms,
            applied_changes: plan.changes.clone(),
            plan,
            theme: self.theme.clone(),
        };
        let count = record.applied_changes.len();
        self.history.push(record);
        if self.history.len() > HISTORY_CAP {
            let drain = self.history.len() - HISTORY_CAP;
            self.history.drain(0..drain);
        }
        info!(record = id, changes = count, "design change applied");
        ApplyOutcome {
            applied: true,
            record_id: Some(id),
            count,
            reason: None,
        }
    }

    /// Restores the theme captured by the record immediately preceding
    /// `change_id`. The oldest record has nothing before it.
    pub fn rollback(&mut self, change_id: u64) -> Result<Theme, DesignError> {
        let idx = self
            .history
            .iter()
            .position(|record| record.id == change_id)
            .ok_or(DesignError::RollbackNotFound(change_id))?;
        if idx == 0 {
            return Err(DesignError::RollbackNoPriorState(change_id));
        }
        self.theme = self.history[idx - 1].theme.clone();
        info!(record = change_id, "theme rolled back");
        Ok(self.theme.clone())
    }

    pub fn history(&self, limit: usize) -> Vec<ChangeRecord> {
        let start = self.history.len().saturating_sub(limit);
        self.history[start..].to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Cached per-user derivation. Entries are never invalidated, so a later
    /// platform-theme change does not reach users who already derived one.
    pub fn personalized(&mut self, user: &str, prefs: &ThemePrefs) -> Theme {
        if let Some(cached) = self.personal.get(user) {
            return cached.clone();
        }
        let derived = self.theme.personalized(prefs);
        self.personal.insert(user.to_string(), derived.clone());
        derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeAdjustments;

    fn hue_plan(hue: f32) -> DesignPlan {
        DesignPlan {
            theme_adjustments: ThemeAdjustments {
                primary_hue: Some(hue),
                ..ThemeAdjustments::default()
            },
            ..DesignPlan::default()
        }
    }

    #[test]
    fn fourth_apply_in_the_hour_is_refused() {
        let mut mind = DesignMind::new(Theme::default());
        assert!(mind.apply(hue_plan(10.0), 0).applied);
        assert!(mind.apply(hue_plan(20.0), 1_000).applied);
        assert!(mind.apply(hue_plan(30.0), 2_000).applied);
        let refused = mind.apply(hue_plan(40.0), 3_000);
        assert!(!refused.applied);
        assert_eq!(refused.reason.as_deref(), Some("rate limit"));
        // an hour past the first apply, one slot frees up
        let later = 3_600_001;
        assert!(mind.can_apply(later));
        assert!(mind.apply(hue_plan(40.0), later).applied);
    }

    #[test]
    fn rollback_restores_the_preceding_theme() {
        let mut mind = DesignMind::new(Theme::default());
        let first = mind.apply(hue_plan(100.0), 1_000).record_id.unwrap();
        let second = mind.apply(hue_plan(200.0), 2_000).record_id.unwrap();
        let theme_after_first = mind.history(10)[0].theme.clone();

        let restored = mind.rollback(second).unwrap();
        assert_eq!(restored, theme_after_first);
        assert_eq!(mind.theme(), &theme_after_first);

        assert!(matches!(
            mind.rollback(first),
            Err(DesignError::RollbackNoPriorState(_))
        ));
        assert!(matches!(
            mind.rollback(999),
            Err(DesignError::RollbackNotFound(999))
        ));
    }

    #[test]
    fn history_is_capped_at_the_most_recent_hundred() {
        let mut mind = DesignMind::new(Theme::default());
        for i in 0..120u64 {
            // spread applies out so the rate limit never engages
            mind.apply(hue_plan(i as f32), i * RATE_WINDOW_MS);
        }
        assert_eq!(mind.history_len(), HISTORY_CAP);
        let oldest = &mind.history(HISTORY_CAP)[0];
        assert_eq!(oldest.id, 21);
    }

    #[test]
    fn empty_adjustments_still_stamp_and_record() {
        let mut mind = DesignMind::new(Theme::default());
        let before = mind.theme().clone();
        let outcome = mind.apply(DesignPlan::default(), 5_000);
        assert!(outcome.applied);
        assert_eq!(outcome.count, 0);
        assert_eq!(mind.theme().primary_hue, before.primary_hue);
        assert_eq!(mind.theme().stamped_ms, 5_000);
    }

    #[test]
    fn personalized_theme_is_cached_against_later_changes() {
        let mut mind = DesignMind::new(Theme::default());
        let prefs = ThemePrefs {
            hue: Some(90.0),
            ..ThemePrefs::default()
        };
        let first = mind.personalized("u1", &prefs);
        mind.apply(hue_plan(300.0), 1_000);
        let second = mind.personalized("u1", &ThemePrefs::default());
        assert_eq!(first, second);
        assert_eq!(second.primary_hue, 90.0);
    }
}
