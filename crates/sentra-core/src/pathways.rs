use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::UserId;

pub const PREDICTION_CONFIDENCE_FLOOR: f32 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPrediction {
    pub next: String,
    pub confidence: f32,
    pub observations: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathwayStats {
    pub transitions: usize,
    pub tracked_users: usize,
    pub observations: u64,
}

/// Count-based table of page-to-page navigation, with a per-user cursor for
/// the most recent path seen.
#[derive(Debug, Default)]
pub struct PathwayModel {
    transitions: HashMap<(String, String), u64>,
    last_path: HashMap<UserId, String>,
    observations: u64,
}

impl PathwayModel {
    pub fn new() -> Self {
        PathwayModel::default()
    }

    pub fn observe(&mut self, user: &str, current: &str) {
        if let Some(prior) = self.last_path.get(user) {
            if prior != current {
                *self
                    .transitions
                    .entry((prior.clone(), current.to_string()))
                    .or_default() += 1;
                self.observations += 1;
            }
        }
        self.last_path.insert(user.to_string(), current.to_string());
    }

    /// Highest-count continuation of `current`, reported only above the
    /// strict confidence floor.
    pub fn predict(&self, current: &str) -> Option<PathPrediction> {
        let mut candidates: Vec<(&str, u64)> = self
            .transitions
            .iter()
            .filter(|((from, _), _)| from == current)
            .map(|((_, to), count)| (to.as_str(), *count))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let total: u64 = candidates.iter().map(|(_, count)| count).sum();
        let (next, count) = candidates[0];
        let confidence = count as f32 / total as f32;
        if confidence > PREDICTION_CONFIDENCE_FLOOR {
            Some(PathPrediction {
                next: next.to_string(),
                confidence,
                observations: count,
            })
        } else {
            None
        }
    }

    pub fn stats(&self) -> PathwayStats {
        PathwayStats {
            transitions: self.transitions.len(),
            tracked_users: self.last_path.len(),
            observations: self.observations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(model: &mut PathwayModel, user: &str, pages: &[&str]) {
        for page in pages {
            model.observe(user, page);
        }
    }

    #[test]
    fn dominant_transition_is_predicted_with_its_share() {
        let mut model = PathwayModel::new();
        walk(&mut model, "u1", &["/a", "/b", "/a", "/b", "/a", "/b"]);
        walk(&mut model, "u2", &["/a", "/c", "/a", "/c"]);
        // A->B x3, A->C x2
        let prediction = model.predict("/a").unwrap();
        assert_eq!(prediction.next, "/b");
        assert!((prediction.confidence - 0.6).abs() < 1e-6);
        assert_eq!(prediction.observations, 3);
    }

    #[test]
    fn confidence_at_exactly_the_floor_yields_nothing() {
        let mut model = PathwayModel::new();
        walk(&mut model, "u1", &["/a", "/b", "/a", "/b"]);
        walk(&mut model, "u2", &["/a", "/c", "/a", "/c"]);
        walk(&mut model, "u3", &["/a", "/d"]);
        // top count 2 over total 5 is exactly 0.4, strictly-greater required
        assert!(model.predict("/a").is_none());
    }

    #[test]
    fn unknown_source_yields_nothing() {
        let model = PathwayModel::new();
        assert!(model.predict("/nowhere").is_none());
    }

    #[test]
    fn repeated_path_does_not_self_transition() {
        let mut model = PathwayModel::new();
        walk(&mut model, "u1", &["/a", "/a", "/a", "/b"]);
        assert_eq!(model.stats().transitions, 1);
        let prediction = model.predict("/a").unwrap();
        assert_eq!(prediction.next, "/b");
        assert!((prediction.confidence - 1.0).abs() < 1e-6);
    }
}
