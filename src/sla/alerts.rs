use async_trait::async_trait;
use log::info;

use crate::shared::models::EscalationAlert;

/// Hand-off point for escalation notifications. The engine decides *that* an
/// alert fires; delivery fan-out (email, in-app) lives behind this trait.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &EscalationAlert);
}

pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, alert: &EscalationAlert) {
        info!(
            "SLA escalation: ticket {} reached level {} at {:.1}% consumption",
            alert.ticket_id, alert.alert_level, alert.consumption_pct
        );
    }
}
