use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::insight::AnalysisSnapshot;
use crate::theme::Theme;
use crate::types::CycleKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEvent {
    pub cycle: CycleKind,
    pub snapshot: AnalysisSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignNotice {
    pub at_ms: u64,
    pub record_id: u64,
    pub changes: usize,
    pub theme: Theme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SystemNotice {
    LowActivity { total_activity: f32 },
    Degraded { detail: String },
    RolledBack { record_id: u64 },
}

/// One broadcast channel per event kind; subscribers each see their own
/// ordered stream. Constructed per controller, not process-global.
pub struct SignalBus {
    analysis_tx: broadcast::Sender<AnalysisEvent>,
    design_tx: broadcast::Sender<DesignNotice>,
    notice_tx: broadcast::Sender<SystemNotice>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        let (analysis_tx, _) = broadcast::channel(64);
        let (design_tx, _) = broadcast::channel(64);
        let (notice_tx, _) = broadcast::channel(64);
        SignalBus {
            analysis_tx,
            design_tx,
            notice_tx,
        }
    }

    pub fn publish_analysis(&self, event: AnalysisEvent) {
        let _ = self.analysis_tx.send(event);
    }

    pub fn publish_design(&self, notice: DesignNotice) {
        let _ = self.design_tx.send(notice);
    }

    pub fn publish_notice(&self, notice: SystemNotice) {
        let _ = self.notice_tx.send(notice);
    }

    pub fn subscribe_analysis(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.analysis_tx.subscribe()
    }

    pub fn subscribe_design(&self) -> broadcast::Receiver<DesignNotice> {
        self.design_tx.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SystemNotice> {
        self.notice_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_notices_in_publish_order() {
        let bus = SignalBus::new();
        let mut rx = bus.subscribe_notices();
        bus.publish_notice(SystemNotice::LowActivity {
            total_activity: 0.2,
        });
        bus.publish_notice(SystemNotice::RolledBack { record_id: 4 });
        assert!(matches!(
            rx.recv().await.unwrap(),
            SystemNotice::LowActivity { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SystemNotice::RolledBack { record_id: 4 }
        ));
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = SignalBus::new();
        bus.publish_notice(SystemNotice::Degraded {
            detail: "cycle failed".to_string(),
        });
    }
}
