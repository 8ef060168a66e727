use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::signal_field::{SignalField, FEATURE_VOCABULARY};
use crate::types::{InteractionKind, Sentiment};

pub const ANALYSIS_WINDOW_MS: u64 = 5 * 60 * 1_000;
pub const RAPID_CLICK_WINDOW_MS: u64 = 2_000;
pub const RAPID_CLICK_NEIGHBORS: usize = 3;
pub const FRICTION_REPORT_FLOOR: f32 = 0.3;
pub const BOUNCE_UNDER_MS: u64 = 30_000;
pub const BOUNCE_REPORT_FLOOR: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionPoint {
    pub target: String,
    pub score: f32,
    pub clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropOffPage {
    pub page: String,
    pub bounce_rate: f32,
    pub sessions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceShare {
    pub device: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCount {
    pub target: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureUse {
    pub feature: String,
    pub count: u64,
}

/// Derived view over the trailing analysis window. Recomputed whole on every
/// pass, never patched in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub at_ms: u64,
    pub total_interactions: u64,
    pub click_rate: f32,
    pub total_engagements: u64,
    pub sentiment: Sentiment,
    pub friction_points: Vec<FrictionPoint>,
    pub drop_off_pages: Vec<DropOffPage>,
    pub device_breakdown: Vec<DeviceShare>,
    pub top_hovered: Vec<TargetCount>,
    pub top_features: Vec<FeatureUse>,
    pub avg_load_ms: f32,
    pub avg_fcp_ms: f32,
    pub avg_lcp_ms: f32,
    pub avg_cls: f32,
    pub active_sessions: u64,
    pub avg_session_ms: f32,
}

impl AnalysisSnapshot {
    pub fn worst_friction(&self) -> f32 {
        self.friction_points
            .iter()
            .map(|p| p.score)
            .fold(0.0, f32::max)
    }
}

pub fn analyze(field: &SignalField, now_ms: u64) -> AnalysisSnapshot {
    analyze_window(field, now_ms, ANALYSIS_WINDOW_MS)
}

/// Same pass over a caller-chosen trailing window; the deep cycle widens it
/// to cover everything the buffers still hold.
pub fn analyze_window(field: &SignalField, now_ms: u64, window_ms: u64) -> AnalysisSnapshot {
    let cutoff = now_ms.saturating_sub(window_ms);
    let interactions: Vec<_> = field
        .interactions
        .iter()
        .filter(|e| e.at_ms > cutoff)
        .collect();
    let engagements: Vec<_> = field
        .engagements
        .iter()
        .filter(|e| e.at_ms > cutoff)
        .collect();
    let samples: Vec<_> = field
        .performance
        .iter()
        .filter(|s| s.at_ms > cutoff)
        .collect();

    let clicks = interactions
        .iter()
        .filter(|e| e.kind == InteractionKind::Click)
        .count() as u64;
    let click_rate = clicks as f32 / interactions.len().max(1) as f32;

    let mut snapshot = AnalysisSnapshot {
        at_ms: now_ms,
        total_interactions: interactions.len() as u64,
        click_rate,
        total_engagements: engagements.len() as u64,
        sentiment: plurality_sentiment(&engagements),
        friction_points: friction_points(&interactions),
        drop_off_pages: drop_off_pages(field),
        device_breakdown: device_breakdown(&interactions),
        top_hovered: top_hovered(&interactions),
        top_features: top_features(&interactions),
        ..AnalysisSnapshot::default()
    };

    if !samples.is_empty() {
        let n = samples.len() as f32;
        snapshot.avg_load_ms = samples.iter().map(|s| s.load_ms).sum::<f32>() / n;
        snapshot.avg_fcp_ms = samples.iter().map(|s| s.fcp_ms).sum::<f32>() / n;
        snapshot.avg_lcp_ms = samples.iter().map(|s| s.lcp_ms).sum::<f32>() / n;
        snapshot.avg_cls = samples.iter().map(|s| s.cls).sum::<f32>() / n;
    }

    let active: Vec<_> = field
        .sessions
        .values()
        .filter(|t| t.last_activity_ms > cutoff)
        .collect();
    snapshot.active_sessions = active.len() as u64;
    if !active.is_empty() {
        snapshot.avg_session_ms =
            active.iter().map(|t| t.duration_ms() as f32).sum::<f32>() / active.len() as f32;
    }

    snapshot
}

fn plurality_sentiment(engagements: &[&crate::types::EngagementEvent]) -> Sentiment {
    let mut positive = 0u64;
    let mut neutral = 0u64;
    let mut negative = 0u64;
    for event in engagements {
        match event.sentiment {
            Some(Sentiment::Positive) => positive += 1,
            Some(Sentiment::Neutral) => neutral += 1,
            Some(Sentiment::Negative) => negative += 1,
            None => {}
        }
    }
    let top = positive.max(neutral).max(negative);
    if top == 0 {
        return Sentiment::Neutral;
    }
    let contenders = [positive, neutral, negative]
        .iter()
        .filter(|&&count| count == top)
        .count();
    if contenders > 1 {
        return Sentiment::Neutral;
    }
    if positive == top {
        Sentiment::Positive
    } else if negative == top {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// A click counts as rapid-repeat when at least `RAPID_CLICK_NEIGHBORS` other
/// clicks landed on the same target within the preceding
/// `RAPID_CLICK_WINDOW_MS`.
fn friction_points(interactions: &[&crate::types::InteractionEvent]) -> Vec<FrictionPoint> {
    let mut per_target: HashMap<&str, Vec<u64>> = HashMap::new();
    for event in interactions {
        if event.kind == InteractionKind::Click {
            per_target.entry(&event.target).or_default().push(event.at_ms);
        }
    }

    let mut points = Vec::new();
    for (target, mut times) in per_target {
        times.sort_unstable();
        let total = times.len();
        let mut repeated = 0usize;
        for (idx, &at) in times.iter().enumerate() {
            let preceding = times[..idx]
                .iter()
                .rev()
                .take_while(|&&earlier| at - earlier <= RAPID_CLICK_WINDOW_MS)
                .count();
            if preceding >= RAPID_CLICK_NEIGHBORS {
                repeated += 1;
            }
        }
        let score = repeated as f32 / total as f32;
        if score > FRICTION_REPORT_FLOOR {
            points.push(FrictionPoint {
                target: target.to_string(),
                score,
                clicks: total as u64,
            });
        }
    }
    points.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.target.cmp(&b.target))
    });
    points.truncate(5);
    points
}

fn drop_off_pages(field: &SignalField) -> Vec<DropOffPage> {
    let mut per_page: HashMap<&str, (u64, u64)> = HashMap::new();
    for trace in field.sessions.values() {
        let bounced = trace.duration_ms() < BOUNCE_UNDER_MS;
        for page in &trace.pages {
            let entry = per_page.entry(page).or_default();
            entry.0 += 1;
            if bounced {
                entry.1 += 1;
            }
        }
    }

    let mut pages = Vec::new();
    for (page, (total, bounces)) in per_page {
        let bounce_rate = bounces as f32 / total as f32;
        if bounce_rate > BOUNCE_REPORT_FLOOR {
            pages.push(DropOffPage {
                page: page.to_string(),
                bounce_rate,
                sessions: total,
            });
        }
    }
    pages.sort_by(|a, b| {
        b.bounce_rate
            .partial_cmp(&a.bounce_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.page.cmp(&b.page))
    });
    pages.truncate(5);
    pages
}

fn device_breakdown(interactions: &[&crate::types::InteractionEvent]) -> Vec<DeviceShare> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in interactions {
        *counts.entry(&event.device).or_default() += 1;
    }
    let mut shares: Vec<DeviceShare> = counts
        .into_iter()
        .map(|(device, count)| DeviceShare {
            device: device.to_string(),
            count,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.device.cmp(&b.device)));
    shares
}

fn top_hovered(interactions: &[&crate::types::InteractionEvent]) -> Vec<TargetCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in interactions {
        if event.kind == InteractionKind::Hover {
            *counts.entry(&event.target).or_default() += 1;
        }
    }
    let mut top: Vec<TargetCount> = counts
        .into_iter()
        .map(|(target, count)| TargetCount {
            target: target.to_string(),
            count,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.target.cmp(&b.target)));
    top.truncate(10);
    top
}

fn top_features(interactions: &[&crate::types::InteractionEvent]) -> Vec<FeatureUse> {
    let mut counts: HashMap<&'static str, u64> = HashMap::new();
    for event in interactions {
        for feature in FEATURE_VOCABULARY.iter() {
            if event.target.contains(feature) {
                *counts.entry(*feature).or_default() += 1;
            }
        }
    }
    let mut top: Vec<FeatureUse> = counts
        .into_iter()
        .map(|(feature, count)| FeatureUse {
            feature: feature.to_string(),
            count,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.feature.cmp(&b.feature)));
    top.truncate(10);
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_field::FieldConfig;
    use crate::types::{EngagementEvent, EngagementKind, InteractionEvent};

    fn click_at(target: &str, at_ms: u64) -> InteractionEvent {
        InteractionEvent {
            user: "u1".to_string(),
            session: "s1".to_string(),
            kind: InteractionKind::Click,
            target: target.to_string(),
            x: 10.0,
            y: 10.0,
            page: "/home".to_string(),
            device: "desktop".to_string(),
            viewport: "1280x720".to_string(),
            at_ms,
        }
    }

    fn engagement(sentiment: Option<Sentiment>, at_ms: u64) -> EngagementEvent {
        EngagementEvent {
            user: "u1".to_string(),
            kind: EngagementKind::Like,
            target_id: "post-1".to_string(),
            target_type: "post".to_string(),
            sentiment,
            at_ms,
        }
    }

    #[test]
    fn friction_score_matches_hand_computation() {
        let mut field = SignalField::new(FieldConfig::default());
        // five clicks, 500 ms apart: only the 4th and 5th have three or more
        // rapid predecessors, so the score is exactly 2/5
        for at in [0u64, 500, 1_000, 1_500, 2_000] {
            field.record_interaction(click_at("submit-btn", at + 10_000));
        }
        let snapshot = analyze(&field, 20_000);
        assert_eq!(snapshot.friction_points.len(), 1);
        let point = &snapshot.friction_points[0];
        assert_eq!(point.target, "submit-btn");
        assert_eq!(point.clicks, 5);
        assert!((point.score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn spread_out_clicks_produce_no_friction() {
        let mut field = SignalField::new(FieldConfig::default());
        for i in 0..5u64 {
            field.record_interaction(click_at("calm-btn", 10_000 + i * 5_000));
        }
        let snapshot = analyze(&field, 40_000);
        assert!(snapshot.friction_points.is_empty());
    }

    #[test]
    fn session_at_exactly_thirty_seconds_is_not_a_bounce() {
        let mut field = SignalField::new(FieldConfig::default());
        field.record_interaction(click_at("a", 1_000));
        field.record_interaction(click_at("b", 31_000));
        // duration is exactly 30_000 ms: strictly under the bound counts
        let snapshot = analyze(&field, 40_000);
        assert!(snapshot.drop_off_pages.is_empty());
    }

    #[test]
    fn short_sessions_flag_their_pages() {
        let mut field = SignalField::new(FieldConfig::default());
        field.record_interaction(click_at("a", 1_000));
        field.record_interaction(click_at("b", 5_000));
        let snapshot = analyze(&field, 40_000);
        assert_eq!(snapshot.drop_off_pages.len(), 1);
        assert_eq!(snapshot.drop_off_pages[0].page, "/home");
        assert!((snapshot.drop_off_pages[0].bounce_rate - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sentiment_is_plurality_with_neutral_tie() {
        let mut field = SignalField::new(FieldConfig::default());
        field.record_engagement(engagement(Some(Sentiment::Positive), 1_000));
        field.record_engagement(engagement(Some(Sentiment::Positive), 2_000));
        field.record_engagement(engagement(Some(Sentiment::Negative), 3_000));
        let snapshot = analyze(&field, 10_000);
        assert_eq!(snapshot.sentiment, Sentiment::Positive);

        field.record_engagement(engagement(Some(Sentiment::Negative), 4_000));
        let snapshot = analyze(&field, 10_000);
        assert_eq!(snapshot.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn empty_window_stays_neutral_with_zero_click_rate() {
        let field = SignalField::new(FieldConfig::default());
        let snapshot = analyze(&field, 1_000_000);
        assert_eq!(snapshot.sentiment, Sentiment::Neutral);
        assert_eq!(snapshot.click_rate, 0.0);
        assert_eq!(snapshot.total_interactions, 0);
    }

    #[test]
    fn old_events_fall_out_of_the_window() {
        let mut field = SignalField::new(FieldConfig::default());
        field.record_interaction(click_at("old", 1_000));
        field.record_interaction(click_at("fresh", 600_000));
        let snapshot = analyze(&field, 601_000);
        assert_eq!(snapshot.total_interactions, 1);
    }
}
