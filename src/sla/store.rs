use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::models::{
    EscalationAlert, EscalationConfig, HoldInterval, SlaPolicy, SupportTicket, OPEN_STATUSES,
};
use crate::shared::schema::{
    support_tickets, ticket_escalation_alerts, ticket_escalation_configs, ticket_hold_intervals,
    ticket_sla_policies,
};
use crate::shared::utils::DbPool;
use crate::sla::error::SlaError;
use crate::sla::hold;
use crate::sla::status::SlaStatus;

/// Computed SLA columns written back by the scheduler, only when changed.
#[derive(Debug, Clone)]
pub struct SlaUpdate {
    pub ticket_id: Uuid,
    pub consumption_pct: f64,
    pub status: SlaStatus,
    pub escalation_level: i32,
    pub updated_at: DateTime<Utc>,
}

/// Persistence seam between the SLA engine and the ticket database. The
/// scheduler and the pause/resume commands only ever talk through this trait,
/// which is what lets the engine tests run against [`MemStore`].
#[async_trait]
pub trait SlaStore: Send + Sync {
    async fn open_tickets(&self) -> Result<Vec<SupportTicket>, SlaError>;
    async fn ticket(&self, ticket_id: Uuid) -> Result<SupportTicket, SlaError>;
    async fn hold_intervals(&self, ticket_id: Uuid) -> Result<Vec<HoldInterval>, SlaError>;
    async fn policy_for(
        &self,
        solution_id: Uuid,
        priority: &str,
    ) -> Result<Option<SlaPolicy>, SlaError>;
    async fn escalation_levels(
        &self,
        solution_id: Uuid,
    ) -> Result<Vec<EscalationConfig>, SlaError>;
    async fn apply_update(&self, update: &SlaUpdate) -> Result<(), SlaError>;

    /// Insert an alert unless one already exists for (ticket, level).
    /// Returns whether a row was inserted; the alert log is the source of
    /// truth for at-most-once alerting, not the ticket's level column.
    async fn record_alert(&self, alert: &EscalationAlert) -> Result<bool, SlaError>;

    /// Open a hold interval. Fails `InvalidState` when already paused.
    async fn pause_ticket(
        &self,
        ticket_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SupportTicket, SlaError>;

    /// Close the open hold interval and push the due dates forward by its
    /// duration. Fails `InvalidState` when not paused.
    async fn resume_ticket(
        &self,
        ticket_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SupportTicket, SlaError>;
}

pub struct PgSlaStore {
    pool: DbPool,
}

impl PgSlaStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn locked_ticket(
        conn: &mut PgConnection,
        ticket_id: Uuid,
    ) -> Result<SupportTicket, SlaError> {
        support_tickets::table
            .find(ticket_id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| SlaError::NotFound(format!("ticket {ticket_id}")))
    }
}

#[async_trait]
impl SlaStore for PgSlaStore {
    async fn open_tickets(&self) -> Result<Vec<SupportTicket>, SlaError> {
        let mut conn = self.pool.get()?;
        let tickets = support_tickets::table
            .filter(support_tickets::status.eq_any(OPEN_STATUSES))
            .order(support_tickets::created_at.asc())
            .load(&mut conn)?;
        Ok(tickets)
    }

    async fn ticket(&self, ticket_id: Uuid) -> Result<SupportTicket, SlaError> {
        let mut conn = self.pool.get()?;
        support_tickets::table
            .find(ticket_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| SlaError::NotFound(format!("ticket {ticket_id}")))
    }

    async fn hold_intervals(&self, ticket_id: Uuid) -> Result<Vec<HoldInterval>, SlaError> {
        let mut conn = self.pool.get()?;
        let holds = ticket_hold_intervals::table
            .filter(ticket_hold_intervals::ticket_id.eq(ticket_id))
            .order(ticket_hold_intervals::paused_at.asc())
            .load(&mut conn)?;
        Ok(holds)
    }

    async fn policy_for(
        &self,
        solution_id: Uuid,
        priority: &str,
    ) -> Result<Option<SlaPolicy>, SlaError> {
        let mut conn = self.pool.get()?;
        let policy = ticket_sla_policies::table
            .filter(ticket_sla_policies::solution_id.eq(solution_id))
            .filter(ticket_sla_policies::priority.eq(priority))
            .filter(ticket_sla_policies::is_active.eq(true))
            .first(&mut conn)
            .optional()?;
        Ok(policy)
    }

    async fn escalation_levels(
        &self,
        solution_id: Uuid,
    ) -> Result<Vec<EscalationConfig>, SlaError> {
        let mut conn = self.pool.get()?;
        let configs = ticket_escalation_configs::table
            .filter(ticket_escalation_configs::solution_id.eq(solution_id))
            .order(ticket_escalation_configs::level.asc())
            .load(&mut conn)?;
        Ok(configs)
    }

    async fn apply_update(&self, update: &SlaUpdate) -> Result<(), SlaError> {
        let mut conn = self.pool.get()?;
        diesel::update(support_tickets::table.find(update.ticket_id))
            .set((
                support_tickets::sla_consumption_pct.eq(update.consumption_pct),
                support_tickets::sla_status.eq(update.status.as_str()),
                support_tickets::escalation_level.eq(update.escalation_level),
                support_tickets::updated_at.eq(update.updated_at),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn record_alert(&self, alert: &EscalationAlert) -> Result<bool, SlaError> {
        let mut conn = self.pool.get()?;
        conn.transaction::<bool, SlaError, _>(|conn| {
            let existing: i64 = ticket_escalation_alerts::table
                .filter(ticket_escalation_alerts::ticket_id.eq(alert.ticket_id))
                .filter(ticket_escalation_alerts::alert_level.eq(alert.alert_level))
                .count()
                .get_result(conn)?;
            if existing > 0 {
                return Ok(false);
            }
            diesel::insert_into(ticket_escalation_alerts::table)
                .values(alert)
                .execute(conn)?;
            Ok(true)
        })
    }

    async fn pause_ticket(
        &self,
        ticket_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SupportTicket, SlaError> {
        let mut conn = self.pool.get()?;
        conn.transaction::<SupportTicket, SlaError, _>(|conn| {
            let mut ticket = Self::locked_ticket(conn, ticket_id)?;
            hold::check_pause(&ticket)?;

            let interval = HoldInterval {
                id: Uuid::new_v4(),
                ticket_id,
                paused_at: now,
                resumed_at: None,
            };
            diesel::insert_into(ticket_hold_intervals::table)
                .values(&interval)
                .execute(conn)?;
            diesel::update(support_tickets::table.find(ticket_id))
                .set((
                    support_tickets::sla_paused_at.eq(Some(now)),
                    support_tickets::updated_at.eq(now),
                ))
                .execute(conn)?;

            ticket.sla_paused_at = Some(now);
            ticket.updated_at = now;
            Ok(ticket)
        })
    }

    async fn resume_ticket(
        &self,
        ticket_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SupportTicket, SlaError> {
        let mut conn = self.pool.get()?;
        conn.transaction::<SupportTicket, SlaError, _>(|conn| {
            let mut ticket = Self::locked_ticket(conn, ticket_id)?;
            let paused_at = hold::check_resume(&ticket)?;
            let held_for = now - paused_at;

            diesel::update(
                ticket_hold_intervals::table
                    .filter(ticket_hold_intervals::ticket_id.eq(ticket_id))
                    .filter(ticket_hold_intervals::resumed_at.is_null()),
            )
            .set(ticket_hold_intervals::resumed_at.eq(Some(now)))
            .execute(conn)?;

            let resolution_due = hold::pushed_due(ticket.sla_resolution_due, held_for);
            let response_due = if ticket.first_response_at.is_none() {
                hold::pushed_due(ticket.sla_response_due, held_for)
            } else {
                ticket.sla_response_due
            };
            diesel::update(support_tickets::table.find(ticket_id))
                .set((
                    support_tickets::sla_paused_at.eq(None::<DateTime<Utc>>),
                    support_tickets::sla_resolution_due.eq(resolution_due),
                    support_tickets::sla_response_due.eq(response_due),
                    support_tickets::updated_at.eq(now),
                ))
                .execute(conn)?;

            ticket.sla_paused_at = None;
            ticket.sla_resolution_due = resolution_due;
            ticket.sla_response_due = response_due;
            ticket.updated_at = now;
            Ok(ticket)
        })
    }
}

/// In-memory store backing the engine tests and local demos. Same invariants
/// as [`PgSlaStore`]; pause/resume take the write lock for the whole
/// check-and-mutate, which is the mutual-exclusion scope here.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<MemInner>,
}

#[derive(Default)]
struct MemInner {
    tickets: Vec<SupportTicket>,
    holds: Vec<HoldInterval>,
    policies: Vec<SlaPolicy>,
    escalations: Vec<EscalationConfig>,
    alerts: Vec<EscalationAlert>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_ticket(&self, ticket: SupportTicket) {
        self.inner.write().await.tickets.push(ticket);
    }

    pub async fn replace_ticket(&self, ticket: SupportTicket) {
        let mut inner = self.inner.write().await;
        if let Some(slot) = inner.tickets.iter_mut().find(|t| t.id == ticket.id) {
            *slot = ticket;
        }
    }

    pub async fn add_policy(&self, policy: SlaPolicy) {
        self.inner.write().await.policies.push(policy);
    }

    pub async fn add_escalation(&self, config: EscalationConfig) {
        self.inner.write().await.escalations.push(config);
    }

    pub async fn alerts(&self) -> Vec<EscalationAlert> {
        self.inner.read().await.alerts.clone()
    }

    pub async fn holds(&self) -> Vec<HoldInterval> {
        self.inner.read().await.holds.clone()
    }
}

#[async_trait]
impl SlaStore for MemStore {
    async fn open_tickets(&self) -> Result<Vec<SupportTicket>, SlaError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tickets
            .iter()
            .filter(|t| OPEN_STATUSES.contains(&t.status.as_str()))
            .cloned()
            .collect())
    }

    async fn ticket(&self, ticket_id: Uuid) -> Result<SupportTicket, SlaError> {
        let inner = self.inner.read().await;
        inner
            .tickets
            .iter()
            .find(|t| t.id == ticket_id)
            .cloned()
            .ok_or_else(|| SlaError::NotFound(format!("ticket {ticket_id}")))
    }

    async fn hold_intervals(&self, ticket_id: Uuid) -> Result<Vec<HoldInterval>, SlaError> {
        let inner = self.inner.read().await;
        Ok(inner
            .holds
            .iter()
            .filter(|h| h.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn policy_for(
        &self,
        solution_id: Uuid,
        priority: &str,
    ) -> Result<Option<SlaPolicy>, SlaError> {
        let inner = self.inner.read().await;
        Ok(inner
            .policies
            .iter()
            .find(|p| p.solution_id == solution_id && p.priority == priority && p.is_active)
            .cloned())
    }

    async fn escalation_levels(
        &self,
        solution_id: Uuid,
    ) -> Result<Vec<EscalationConfig>, SlaError> {
        let inner = self.inner.read().await;
        let mut configs: Vec<EscalationConfig> = inner
            .escalations
            .iter()
            .filter(|c| c.solution_id == solution_id)
            .cloned()
            .collect();
        configs.sort_by_key(|c| c.level);
        Ok(configs)
    }

    async fn apply_update(&self, update: &SlaUpdate) -> Result<(), SlaError> {
        let mut inner = self.inner.write().await;
        let ticket = inner
            .tickets
            .iter_mut()
            .find(|t| t.id == update.ticket_id)
            .ok_or_else(|| SlaError::NotFound(format!("ticket {}", update.ticket_id)))?;
        ticket.sla_consumption_pct = update.consumption_pct;
        ticket.sla_status = update.status.as_str().to_string();
        ticket.escalation_level = update.escalation_level;
        ticket.updated_at = update.updated_at;
        Ok(())
    }

    async fn record_alert(&self, alert: &EscalationAlert) -> Result<bool, SlaError> {
        let mut inner = self.inner.write().await;
        let exists = inner
            .alerts
            .iter()
            .any(|a| a.ticket_id == alert.ticket_id && a.alert_level == alert.alert_level);
        if exists {
            return Ok(false);
        }
        inner.alerts.push(alert.clone());
        Ok(true)
    }

    async fn pause_ticket(
        &self,
        ticket_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SupportTicket, SlaError> {
        let mut inner = self.inner.write().await;
        let ticket = inner
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| SlaError::NotFound(format!("ticket {ticket_id}")))?;
        hold::check_pause(ticket)?;
        ticket.sla_paused_at = Some(now);
        ticket.updated_at = now;
        let ticket = ticket.clone();
        inner.holds.push(HoldInterval {
            id: Uuid::new_v4(),
            ticket_id,
            paused_at: now,
            resumed_at: None,
        });
        Ok(ticket)
    }

    async fn resume_ticket(
        &self,
        ticket_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SupportTicket, SlaError> {
        let mut inner = self.inner.write().await;
        let ticket = inner
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| SlaError::NotFound(format!("ticket {ticket_id}")))?;
        let paused_at = hold::check_resume(ticket)?;
        let held_for = now - paused_at;

        ticket.sla_paused_at = None;
        ticket.sla_resolution_due = hold::pushed_due(ticket.sla_resolution_due, held_for);
        if ticket.first_response_at.is_none() {
            ticket.sla_response_due = hold::pushed_due(ticket.sla_response_due, held_for);
        }
        ticket.updated_at = now;
        let ticket = ticket.clone();

        if let Some(open) = inner
            .holds
            .iter_mut()
            .find(|h| h.ticket_id == ticket_id && h.resumed_at.is_none())
        {
            open.resumed_at = Some(now);
        }
        Ok(ticket)
    }
}
