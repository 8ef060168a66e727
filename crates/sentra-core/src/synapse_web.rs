use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub const SYNAPSE_WEIGHT_CAP: f32 = 10.0;
pub const SYNAPSE_PRUNE_FLOOR: f32 = 0.1;
pub const REGION_HOMEOSTASIS: f32 = 0.9;
pub const RECENT_ACTIVATION_CAP: usize = 64;

static ANALYTICAL_MARKERS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["click", "scroll", "search", "filter", "sort", "read", "keypress"]
});
static EMOTIONAL_MARKERS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["like", "comment", "share", "follow", "react", "hover"]);
static CREATIVE_MARKERS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["post", "compose", "upload", "create", "write", "draft"]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebConfig {
    pub plasticity_rate: f32,
    pub decay_rate: f32,
    pub low_activity_floor: f32,
    pub low_activity_chance: f64,
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            plasticity_rate: 0.5,
            decay_rate: 0.05,
            low_activity_floor: 0.5,
            low_activity_chance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Analytical,
    Emotional,
    Creative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub analytical: f32,
    pub emotional: f32,
    pub creative: f32,
}

impl RegionSnapshot {
    pub fn total(&self) -> f32 {
        self.analytical + self.emotional + self.creative
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Manic,
    Active,
    Calm,
    Meditative,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Manic => "manic",
            Mood::Active => "active",
            Mood::Calm => "calm",
            Mood::Meditative => "meditative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateOfMind {
    Feeling,
    Creating,
    HyperConnected,
    Observing,
}

impl StateOfMind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateOfMind::Feeling => "feeling",
            StateOfMind::Creating => "creating",
            StateOfMind::HyperConnected => "hyper-connected",
            StateOfMind::Observing => "observing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseView {
    pub source: String,
    pub target: String,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyView {
    pub synapses: usize,
    pub regions: RegionSnapshot,
    pub strongest: Vec<SynapseView>,
    pub mood: Mood,
    pub state_of_mind: StateOfMind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusReceipt {
    pub weight: f32,
    pub region: Region,
    pub regions: RegionSnapshot,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DecayReport {
    pub pruned: u32,
    pub total_activity: f32,
    pub low_activity_notice: bool,
}

/// Hebbian-style co-activation graph with three activity regions. Weights
/// grow on stimulation and fade on the background tick; anything under the
/// prune floor disappears.
pub struct SynapseWeb {
    pub config: WebConfig,
    synapses: HashMap<(String, String), f32>,
    regions: RegionSnapshot,
    recent_activations: Vec<String>,
    rng: ChaCha8Rng,
}

impl SynapseWeb {
    pub fn new(config: WebConfig, seed: u64) -> Self {
        SynapseWeb {
            config,
            synapses: HashMap::new(),
            regions: RegionSnapshot::default(),
            recent_activations: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy(config: WebConfig) -> Self {
        Self::new(config, rand::thread_rng().gen())
    }

    pub fn stimulate(
        &mut self,
        event_kind: &str,
        source: &str,
        target: &str,
        intensity: f32,
    ) -> StimulusReceipt {
        let key = (source.to_string(), target.to_string());
        let weight = self.synapses.entry(key).or_insert(0.0);
        *weight = (*weight + self.config.plasticity_rate * intensity).min(SYNAPSE_WEIGHT_CAP);
        let weight = *weight;

        let region = classify_region(event_kind);
        match region {
            Region::Analytical => self.regions.analytical += intensity,
            Region::Emotional => self.regions.emotional += intensity,
            Region::Creative => self.regions.creative += intensity,
        }

        self.recent_activations.push(target.to_string());
        if self.recent_activations.len() > RECENT_ACTIVATION_CAP {
            let drain = self.recent_activations.len() - RECENT_ACTIVATION_CAP;
            self.recent_activations.drain(0..drain);
        }

        StimulusReceipt {
            weight,
            region,
            regions: self.regions,
        }
    }

    /// Background tick: exponential weight decay with pruning, then region
    /// homeostasis. The low-activity notice is drawn from the injected rng.
    pub fn decay_tick(&mut self) -> DecayReport {
        let decay = 1.0 - self.config.decay_rate;
        let mut pruned = 0u32;
        self.synapses.retain(|_, weight| {
            *weight *= decay;
            if *weight < SYNAPSE_PRUNE_FLOOR {
                pruned += 1;
                false
            } else {
                true
            }
        });

        self.regions.analytical *= REGION_HOMEOSTASIS;
        self.regions.emotional *= REGION_HOMEOSTASIS;
        self.regions.creative *= REGION_HOMEOSTASIS;

        let total_activity = self.regions.total();
        let low_activity_notice = total_activity < self.config.low_activity_floor
            && self.rng.gen_bool(self.config.low_activity_chance);

        DecayReport {
            pruned,
            total_activity,
            low_activity_notice,
        }
    }

    pub fn weight(&self, source: &str, target: &str) -> Option<f32> {
        self.synapses
            .get(&(source.to_string(), target.to_string()))
            .copied()
    }

    pub fn regions(&self) -> RegionSnapshot {
        self.regions
    }

    pub fn mood(&self) -> Mood {
        let total = self.regions.total();
        if total > 10.0 {
            Mood::Manic
        } else if total > 5.0 {
            Mood::Active
        } else if total < 1.0 {
            Mood::Meditative
        } else {
            Mood::Calm
        }
    }

    pub fn state_of_mind(&self) -> StateOfMind {
        let r = self.regions;
        if r.emotional > r.analytical && r.emotional > r.creative {
            StateOfMind::Feeling
        } else if r.creative > 2.0 {
            StateOfMind::Creating
        } else if self.synapses.len() > 1_000 {
            StateOfMind::HyperConnected
        } else {
            StateOfMind::Observing
        }
    }

    pub fn topology(&self) -> TopologyView {
        let mut strongest: Vec<SynapseView> = self
            .synapses
            .iter()
            .map(|((source, target), weight)| SynapseView {
                source: source.clone(),
                target: target.clone(),
                weight: *weight,
            })
            .collect();
        strongest.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });
        strongest.truncate(5);
        TopologyView {
            synapses: self.synapses.len(),
            regions: self.regions,
            strongest,
            mood: self.mood(),
            state_of_mind: self.state_of_mind(),
        }
    }
}

fn classify_region(event_kind: &str) -> Region {
    let kind = event_kind.to_lowercase();
    if EMOTIONAL_MARKERS.iter().any(|m| kind.contains(m)) {
        Region::Emotional
    } else if CREATIVE_MARKERS.iter().any(|m| kind.contains(m)) {
        Region::Creative
    } else if ANALYTICAL_MARKERS.iter().any(|m| kind.contains(m)) {
        Region::Analytical
    } else {
        Region::Analytical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_web(seed: u64) -> SynapseWeb {
        SynapseWeb::new(WebConfig::default(), seed)
    }

    #[test]
    fn decay_follows_the_exponential_curve() {
        let mut web = quiet_web(7);
        // two stimulations at plasticity 0.5 leave the weight at 1.0
        web.stimulate("click", "a", "b", 1.0);
        web.stimulate("click", "a", "b", 1.0);
        for k in 1..=10u32 {
            web.decay_tick();
            let expected = 1.0f32 * 0.95f32.powi(k as i32);
            let weight = web.weight("a", "b").unwrap();
            assert!((weight - expected).abs() < 1e-5, "tick {k}");
        }
    }

    #[test]
    fn weights_under_the_floor_are_pruned_from_topology() {
        let mut web = quiet_web(7);
        web.stimulate("click", "a", "b", 0.3);
        // 0.15 decays under 0.1 within a handful of ticks
        for _ in 0..10 {
            web.decay_tick();
        }
        assert!(web.weight("a", "b").is_none());
        let topology = web.topology();
        assert_eq!(topology.synapses, 0);
        assert!(topology.strongest.is_empty());
    }

    #[test]
    fn weight_saturates_at_the_cap() {
        let mut web = quiet_web(7);
        for _ in 0..100 {
            web.stimulate("click", "a", "b", 1.0);
        }
        assert!((web.weight("a", "b").unwrap() - SYNAPSE_WEIGHT_CAP).abs() < 1e-6);
    }

    #[test]
    fn mood_thresholds_track_total_activity() {
        let mut web = quiet_web(7);
        assert_eq!(web.mood(), Mood::Meditative);
        web.stimulate("click", "a", "b", 3.0);
        assert_eq!(web.mood(), Mood::Calm);
        web.stimulate("click", "a", "b", 3.0);
        assert_eq!(web.mood(), Mood::Active);
        web.stimulate("click", "a", "b", 6.0);
        assert_eq!(web.mood(), Mood::Manic);
    }

    #[test]
    fn emotional_dominance_reads_as_feeling() {
        let mut web = quiet_web(7);
        web.stimulate("like", "a", "b", 2.0);
        web.stimulate("click", "a", "c", 1.0);
        assert_eq!(web.state_of_mind(), StateOfMind::Feeling);
    }

    #[test]
    fn creative_load_reads_as_creating() {
        let mut web = quiet_web(7);
        web.stimulate("compose", "a", "b", 3.0);
        web.stimulate("click", "a", "c", 4.0);
        assert_eq!(web.state_of_mind(), StateOfMind::Creating);
    }

    #[test]
    fn low_activity_notices_are_deterministic_per_seed() {
        let run = |seed: u64| -> Vec<bool> {
            let mut web = quiet_web(seed);
            (0..50).map(|_| web.decay_tick().low_activity_notice).collect()
        };
        assert_eq!(run(42), run(42));
        let mut busy = quiet_web(42);
        busy.stimulate("click", "a", "b", 100.0);
        // activity well above the floor: the notice can never fire
        for _ in 0..10 {
            assert!(!busy.decay_tick().low_activity_notice);
        }
    }
}
