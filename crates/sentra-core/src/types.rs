use std::fmt;

use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Click,
    Scroll,
    Hover,
    Keypress,
    Focus,
    Input,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Click => "click",
            InteractionKind::Scroll => "scroll",
            InteractionKind::Hover => "hover",
            InteractionKind::Keypress => "keypress",
            InteractionKind::Focus => "focus",
            InteractionKind::Input => "input",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Like,
    Comment,
    Share,
    Follow,
    Post,
}

impl EngagementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Comment => "comment",
            EngagementKind::Share => "share",
            EngagementKind::Follow => "follow",
            EngagementKind::Post => "post",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user: UserId,
    pub session: SessionId,
    pub kind: InteractionKind,
    pub target: String,
    pub x: f32,
    pub y: f32,
    pub page: String,
    pub device: String,
    pub viewport: String,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub user: UserId,
    pub kind: EngagementKind,
    pub target_id: String,
    pub target_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub user: UserId,
    pub page: String,
    pub load_ms: f32,
    pub fcp_ms: f32,
    pub lcp_ms: f32,
    pub fid_ms: f32,
    pub cls: f32,
    pub ttfb_ms: f32,
    pub device: String,
    pub connection: String,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyLevel {
    Low,
    Medium,
    High,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleKind {
    Fast,
    Standard,
    Deep,
    Manual,
}

impl CycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleKind::Fast => "fast",
            CycleKind::Standard => "standard",
            CycleKind::Deep => "deep",
            CycleKind::Manual => "manual",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown autonomy level: {0} (expected low|medium|high|full)")]
pub struct AutonomyParseError(pub String);

impl AutonomyLevel {
    pub fn parse(input: &str) -> Result<Self, AutonomyParseError> {
        match input.trim().to_lowercase().as_str() {
            "low" => Ok(AutonomyLevel::Low),
            "medium" => Ok(AutonomyLevel::Medium),
            "high" => Ok(AutonomyLevel::High),
            "full" => Ok(AutonomyLevel::Full),
            other => Err(AutonomyParseError(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AutonomyLevel::Low => "low",
            AutonomyLevel::Medium => "medium",
            AutonomyLevel::High => "high",
            AutonomyLevel::Full => "full",
        }
    }
}

impl fmt::Display for AutonomyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autonomy_parse_accepts_known_levels() {
        assert_eq!(AutonomyLevel::parse("low").unwrap(), AutonomyLevel::Low);
        assert_eq!(AutonomyLevel::parse(" Full ").unwrap(), AutonomyLevel::Full);
        assert!(AutonomyLevel::parse("maximal").is_err());
    }
}
