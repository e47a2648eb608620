use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::shared::models::{EscalationAlert, SupportTicket};
use crate::sla::alerts::AlertSink;
use crate::sla::clock::Clock;
use crate::sla::consumption::compute_consumption;
use crate::sla::error::SlaError;
use crate::sla::escalation::evaluate;
use crate::sla::status::SlaStatus;
use crate::sla::store::{SlaStore, SlaUpdate};

/// Outcome counters for one recalculation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub evaluated: usize,
    pub updated: usize,
    pub alerts: usize,
    pub skipped: usize,
}

/// Periodic driver that re-evaluates every open ticket's SLA state. A ticket
/// that fails (missing policy, store hiccup) is logged and skipped; the pass
/// itself is idempotent, so anything dropped is picked up next interval.
#[derive(Clone)]
pub struct SlaMonitor {
    store: Arc<dyn SlaStore>,
    sink: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl SlaMonitor {
    pub fn new(
        store: Arc<dyn SlaStore>,
        sink: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        interval_secs: u64,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub fn start(&self) {
        info!(
            "starting SLA recalculation scheduler, every {}s",
            self.interval.as_secs()
        );
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.interval);
            loop {
                interval.tick().await;
                monitor.tick().await;
            }
        });
    }

    pub async fn tick(&self) -> TickSummary {
        let now = self.clock.now();
        let mut summary = TickSummary::default();

        let tickets = match self.store.open_tickets().await {
            Ok(tickets) => tickets,
            Err(e) => {
                error!("SLA pass aborted, could not list open tickets: {e}");
                return summary;
            }
        };

        for ticket in &tickets {
            summary.evaluated += 1;
            match self.evaluate_ticket(ticket, now).await {
                Ok((updated, alerts)) => {
                    if updated {
                        summary.updated += 1;
                    }
                    summary.alerts += alerts;
                }
                Err(SlaError::Configuration(msg)) => {
                    warn!("skipping ticket {}: {msg}", ticket.ticket_number);
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!(
                        "SLA update for ticket {} dropped this cycle: {e}",
                        ticket.ticket_number
                    );
                    summary.skipped += 1;
                }
            }
        }

        info!(
            "SLA pass: {} evaluated, {} updated, {} alerts, {} skipped",
            summary.evaluated, summary.updated, summary.alerts, summary.skipped
        );
        summary
    }

    async fn evaluate_ticket(
        &self,
        ticket: &SupportTicket,
        now: DateTime<Utc>,
    ) -> Result<(bool, usize), SlaError> {
        let policy = self
            .store
            .policy_for(ticket.solution_id, &ticket.priority)
            .await?
            .ok_or_else(|| {
                SlaError::Configuration(format!(
                    "no active SLA policy for priority {}",
                    ticket.priority
                ))
            })?;
        let holds = self.store.hold_intervals(ticket.id).await?;
        let consumption = compute_consumption(ticket, &holds, &policy, now)?;
        let status = SlaStatus::classify(consumption.resolution_pct);
        let configs = self.store.escalation_levels(ticket.solution_id).await?;
        let escalation = evaluate(consumption.resolution_pct, ticket.escalation_level, &configs);

        // Alerts must be on record before the level column advances: a failed
        // alert write aborts the whole update for this cycle, so the next pass
        // re-derives the same triggered set and record_alert dedups the rows
        // that did land.
        let mut fired = 0;
        for level in escalation.triggered {
            let alert = EscalationAlert {
                id: Uuid::new_v4(),
                ticket_id: ticket.id,
                alert_level: level,
                consumption_pct: consumption.resolution_pct,
                acknowledged: false,
                created_at: now,
            };
            if self.store.record_alert(&alert).await? {
                self.sink.notify(&alert).await;
                fired += 1;
            }
        }

        let changed = ticket.sla_consumption_pct != consumption.resolution_pct
            || ticket.sla_status != status.as_str()
            || ticket.escalation_level != escalation.new_level;
        if changed {
            self.store
                .apply_update(&SlaUpdate {
                    ticket_id: ticket.id,
                    consumption_pct: consumption.resolution_pct,
                    status,
                    escalation_level: escalation.new_level,
                    updated_at: now,
                })
                .await?;
        }
        Ok((changed, fired))
    }
}
