use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::types::{
    EngagementEvent, InteractionEvent, InteractionKind, PerformanceSample, SessionId, UserId,
};

pub const HEAT_GRID_UNITS: f32 = 50.0;

/// Fixed vocabulary matched by substring against interaction targets.
pub static FEATURE_VOCABULARY: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "feed",
        "composer",
        "search",
        "profile",
        "chat",
        "notifications",
        "stories",
        "explore",
        "settings",
        "upload",
    ]
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub max_interactions: usize,
    pub max_engagements: usize,
    pub max_performance: usize,
}

impl Default for FieldConfig {
    fn default() -> Self {
        FieldConfig {
            max_interactions: 10_000,
            max_engagements: 10_000,
            max_performance: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTrace {
    pub started_ms: u64,
    pub last_activity_ms: u64,
    pub interactions: u64,
    pub pages: HashSet<String>,
    pub features: HashSet<String>,
}

impl SessionTrace {
    fn open(at_ms: u64) -> Self {
        SessionTrace {
            started_ms: at_ms,
            last_activity_ms: at_ms,
            interactions: 0,
            pages: HashSet::new(),
            features: HashSet::new(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.last_activity_ms.saturating_sub(self.started_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HeatCell {
    pub clicks: u64,
    pub hovers: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldStats {
    pub interactions: usize,
    pub engagements: usize,
    pub performance_samples: usize,
    pub sessions: usize,
    pub heat_cells: usize,
}

/// Shared telemetry state: bounded event buffers plus the session table and
/// the click/hover heat grid derived from them on ingest.
pub struct SignalField {
    pub config: FieldConfig,
    pub interactions: Vec<InteractionEvent>,
    pub engagements: Vec<EngagementEvent>,
    pub performance: Vec<PerformanceSample>,
    pub sessions: HashMap<(UserId, SessionId), SessionTrace>,
    pub heat: HashMap<(String, i32, i32), HeatCell>,
}

impl SignalField {
    pub fn new(config: FieldConfig) -> Self {
        SignalField {
            config,
            interactions: Vec::new(),
            engagements: Vec::new(),
            performance: Vec::new(),
            sessions: HashMap::new(),
            heat: HashMap::new(),
        }
    }

    pub fn record_interaction(&mut self, event: InteractionEvent) {
        self.touch_session(&event);
        if matches!(event.kind, InteractionKind::Click | InteractionKind::Hover) {
            let cell = self
                .heat
                .entry((
                    event.page.clone(),
                    grid_coord(event.x),
                    grid_coord(event.y),
                ))
                .or_default();
            match event.kind {
                InteractionKind::Click => cell.clicks += 1,
                InteractionKind::Hover => cell.hovers += 1,
                _ => {}
            }
        }
        self.interactions.push(event);
        trim_buffer(&mut self.interactions, self.config.max_interactions);
    }

    pub fn record_engagement(&mut self, event: EngagementEvent) {
        self.engagements.push(event);
        trim_buffer(&mut self.engagements, self.config.max_engagements);
    }

    pub fn record_performance(&mut self, sample: PerformanceSample) {
        self.performance.push(sample);
        trim_buffer(&mut self.performance, self.config.max_performance);
    }

    fn touch_session(&mut self, event: &InteractionEvent) {
        let key = (event.user.clone(), event.session.clone());
        let trace = self
            .sessions
            .entry(key)
            .or_insert_with(|| SessionTrace::open(event.at_ms));
        trace.last_activity_ms = trace.last_activity_ms.max(event.at_ms);
        trace.interactions += 1;
        trace.pages.insert(event.page.clone());
        for feature in FEATURE_VOCABULARY.iter() {
            if event.target.contains(feature) {
                trace.features.insert((*feature).to_string());
            }
        }
    }

    pub fn heat_cell(&self, page: &str, x: f32, y: f32) -> Option<&HeatCell> {
        self.heat
            .get(&(page.to_string(), grid_coord(x), grid_coord(y)))
    }

    pub fn stats(&self) -> FieldStats {
        FieldStats {
            interactions: self.interactions.len(),
            engagements: self.engagements.len(),
            performance_samples: self.performance.len(),
            sessions: self.sessions.len(),
            heat_cells: self.heat.len(),
        }
    }
}

fn grid_coord(value: f32) -> i32 {
    (value / HEAT_GRID_UNITS).floor() as i32
}

fn trim_buffer<T>(buffer: &mut Vec<T>, cap: usize) {
    if buffer.len() > cap {
        let keep = (cap / 2).max(1);
        let drain = buffer.len() - keep;
        buffer.drain(0..drain);
    }
}
