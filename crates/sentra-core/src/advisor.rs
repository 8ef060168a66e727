use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::insight::{AnalysisSnapshot, DeviceShare, DropOffPage, FeatureUse, FrictionPoint};
use crate::theme::ThemeAdjustments;
use crate::types::Sentiment;

pub const SLOW_LOAD_MS: f32 = 3_000.0;
pub const CRITICAL_LOAD_MS: f32 = 5_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignChange {
    pub category: String,
    pub recommendation: String,
    pub reasoning: String,
    pub expected_impact: String,
    pub implementation: String,
}

/// The collaborator's answer: what to change and how urgently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignPlan {
    pub priority: Priority,
    pub changes: Vec<DesignChange>,
    pub theme_adjustments: ThemeAdjustments,
    pub urgent_issues: Vec<String>,
    pub overall_strategy: String,
}

/// Key metrics handed to the reasoning collaborator, in its wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
    pub total_interactions: u64,
    pub click_rate: f32,
    pub total_engagements: u64,
    pub avg_load_time: f32,
    pub active_sessions: u64,
    pub overall_sentiment: Sentiment,
    pub friction_points: Vec<FrictionPoint>,
    pub drop_off_pages: Vec<DropOffPage>,
    pub device_breakdown: Vec<DeviceShare>,
    pub top_features: Vec<FeatureUse>,
    pub hour_of_day: u8,
    pub time_of_day_label: String,
}

impl AdviceRequest {
    pub fn from_snapshot(snapshot: &AnalysisSnapshot, hour: u8) -> Self {
        AdviceRequest {
            total_interactions: snapshot.total_interactions,
            click_rate: snapshot.click_rate,
            total_engagements: snapshot.total_engagements,
            avg_load_time: snapshot.avg_load_ms,
            active_sessions: snapshot.active_sessions,
            overall_sentiment: snapshot.sentiment,
            friction_points: snapshot.friction_points.clone(),
            drop_off_pages: snapshot.drop_off_pages.clone(),
            device_breakdown: snapshot.device_breakdown.clone(),
            top_features: snapshot.top_features.clone(),
            hour_of_day: hour,
            time_of_day_label: time_of_day(hour).to_string(),
        }
    }
}

pub fn time_of_day(hour: u8) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

pub fn is_night(hour: u8) -> bool {
    hour >= 21 || hour < 6
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("advisor transport failed: {0}")]
    Transport(String),
    #[error("advisor response unparsable: {0}")]
    Parse(String),
    #[error("advisor timed out")]
    Timeout,
}

/// Pluggable reasoning collaborator. Implementations return raw text; the
/// caller parses it defensively and falls back to heuristics on any failure.
#[async_trait]
pub trait DesignAdvisor: Send + Sync {
    async fn advise(&self, request: &AdviceRequest) -> Result<String, AdvisorError>;
}

/// Strips optional fenced-code wrapping, then parses the JSON plan.
pub fn parse_plan(raw: &str) -> Result<DesignPlan, AdvisorError> {
    let text = strip_fences(raw);
    serde_json::from_str(text).map_err(|err| AdvisorError::Parse(err.to_string()))
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.strip_suffix("```").unwrap_or(rest))
        .unwrap_or(trimmed)
        .trim();
    // tolerate prose around the payload by cutting to the outermost braces
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(open), Some(close)) if close > open => &unfenced[open..=close],
        _ => unfenced,
    }
}

/// Deterministic fallback. Never fails, never consults the collaborator.
pub fn heuristic_plan(snapshot: &AnalysisSnapshot, hour: u8) -> DesignPlan {
    let mut plan = DesignPlan {
        overall_strategy: "heuristic pass over current telemetry".to_string(),
        ..DesignPlan::default()
    };

    if snapshot.avg_load_ms > SLOW_LOAD_MS {
        plan.changes.push(DesignChange {
            category: "performance".to_string(),
            recommendation: "reduce initial payload and defer non-critical assets".to_string(),
            reasoning: format!("average load time {:.0} ms", snapshot.avg_load_ms),
            expected_impact: "faster first interaction".to_string(),
            implementation: "lazy-load below-the-fold modules".to_string(),
        });
        plan.priority = Priority::Medium;
    }
    if snapshot.avg_load_ms > CRITICAL_LOAD_MS {
        plan.urgent_issues
            .push(format!("page load critical: {:.0} ms", snapshot.avg_load_ms));
    }

    for point in &snapshot.friction_points {
        plan.changes.push(DesignChange {
            category: "layout".to_string(),
            recommendation: format!("increase '{}' hit area and feedback", point.target),
            reasoning: format!("rapid repeat clicks, friction {:.2}", point.score),
            expected_impact: "less repeated clicking".to_string(),
            implementation: "enlarge control, add pressed state".to_string(),
        });
        plan.priority = Priority::High;
    }

    if is_night(hour) {
        plan.theme_adjustments = ThemeAdjustments::night_mode();
    }

    plan
}

/// Asks the collaborator, bounded by `timeout_ms`; any failure routes to the
/// heuristic plan.
pub async fn request_plan(
    advisor: &dyn DesignAdvisor,
    snapshot: &AnalysisSnapshot,
    hour: u8,
    timeout_ms: u64,
) -> DesignPlan {
    let request = AdviceRequest::from_snapshot(snapshot, hour);
    let attempt = tokio::time::timeout(Duration::from_millis(timeout_ms), advisor.advise(&request));
    let outcome = match attempt.await {
        Ok(Ok(raw)) => parse_plan(&raw),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(AdvisorError::Timeout),
    };
    match outcome {
        Ok(plan) => plan,
        Err(err) => {
            warn!(error = %err, "advisor failed, using heuristic plan");
            heuristic_plan(snapshot, hour)
        }
    }
}

/// Canned collaborator for the CLI demo and tests. Answers are popped in
/// order; an exhausted script behaves as a transport failure.
#[derive(Default)]
pub struct ScriptedAdvisor {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedAdvisor {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedAdvisor {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl DesignAdvisor for ScriptedAdvisor {
    async fn advise(&self, _request: &AdviceRequest) -> Result<String, AdvisorError> {
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| AdvisorError::Transport("script exhausted".to_string()))
    }
}
