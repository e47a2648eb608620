use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::schema::{
    support_tickets, ticket_escalation_alerts, ticket_escalation_configs, ticket_hold_intervals,
    ticket_sla_policies,
};

/// Statuses the recalculation pass considers "open" and keeps re-evaluating.
pub const OPEN_STATUSES: [&str; 3] = ["Open", "In Progress", "Waiting"];

/// Terminal statuses. Everything outside this set counts as active.
pub const CLOSED_STATUSES: [&str; 3] = ["complete", "Resolved", "Closed"];

pub const PRIORITIES: [&str; 4] = ["P1", "P2", "P3", "P4"];

pub fn is_closed(status: &str) -> bool {
    CLOSED_STATUSES.contains(&status)
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = support_tickets)]
pub struct SupportTicket {
    pub id: Uuid,
    pub ticket_number: String,
    pub subject: String,
    pub description: Option<String>,
    pub solution_id: Uuid,
    pub status: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub sla_response_due: Option<DateTime<Utc>>,
    pub sla_resolution_due: Option<DateTime<Utc>>,
    pub sla_consumption_pct: f64,
    pub sla_status: String,
    pub escalation_level: i32,
    pub sla_paused_at: Option<DateTime<Utc>>,
}

/// One pause window on a ticket's SLA clocks. Append-only; only the latest
/// row for a ticket may have a null `resumed_at`.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_hold_intervals)]
pub struct HoldInterval {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub paused_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_sla_policies)]
pub struct SlaPolicy {
    pub id: Uuid,
    pub solution_id: Uuid,
    pub priority: String,
    pub response_hours: i32,
    pub resolution_hours: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_escalation_configs)]
pub struct EscalationConfig {
    pub id: Uuid,
    pub solution_id: Uuid,
    pub level: i32,
    pub threshold_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_escalation_alerts)]
pub struct EscalationAlert {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub alert_level: i32,
    pub consumption_pct: f64,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}
