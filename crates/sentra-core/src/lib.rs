pub mod advisor;
pub mod bus;
pub mod conductor;
pub mod design_mind;
pub mod insight;
pub mod pathways;
pub mod signal_field;
pub mod synapse_web;
pub mod theme;
pub mod types;

pub use advisor::{
    heuristic_plan, parse_plan, request_plan, AdviceRequest, AdvisorError, DesignAdvisor,
    DesignChange, DesignPlan, Priority, ScriptedAdvisor,
};
pub use bus::{AnalysisEvent, DesignNotice, SignalBus, SystemNotice};
pub use conductor::{
    autonomy_gate, fast_path_urgent, Conductor, ConductorConfig, Health, InsightReport,
    OptimizeOutcome, SystemStatus,
};
pub use design_mind::{ApplyOutcome, ChangeRecord, DesignError, DesignMind};
pub use insight::{analyze, analyze_window, AnalysisSnapshot, DropOffPage, FrictionPoint};
pub use pathways::{PathPrediction, PathwayModel, PathwayStats};
pub use signal_field::{FieldConfig, FieldStats, SignalField};
pub use synapse_web::{Mood, StateOfMind, SynapseWeb, TopologyView, WebConfig};
pub use theme::{Theme, ThemeAdjustments, ThemeMode, ThemePrefs};
pub use types::{
    AutonomyLevel, AutonomyParseError, CycleKind, EngagementEvent, EngagementKind,
    InteractionEvent, InteractionKind, PerformanceSample, Sentiment,
};
