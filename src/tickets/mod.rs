use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::models::{
    is_closed, EscalationAlert, HoldInterval, SlaPolicy, SupportTicket, PRIORITIES,
};
use crate::shared::schema::{
    support_tickets, ticket_escalation_alerts, ticket_hold_intervals, ticket_sla_policies,
};
use crate::shared::state::AppState;
use crate::sla::hold::close_out_hold;
use crate::sla::{compute_consumption, PgSlaStore, SlaError, SlaStatus, SlaStore};

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: Option<String>,
    pub solution_id: Uuid,
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub sla_status: Option<String>,
    pub solution_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub ticket_id: Option<Uuid>,
    pub acknowledged: Option<bool>,
}

/// Live SLA state of one ticket, computed at request time.
#[derive(Debug, Serialize)]
pub struct SlaSnapshot {
    pub ticket_id: Uuid,
    pub ticket_number: String,
    pub response_pct: f64,
    pub resolution_pct: f64,
    pub sla_status: SlaStatus,
    pub escalation_level: i32,
    pub paused: bool,
    pub sla_response_due: Option<DateTime<Utc>>,
    pub sla_resolution_due: Option<DateTime<Utc>>,
}

fn generate_ticket_number(conn: &mut PgConnection) -> String {
    let count: i64 = support_tickets::table
        .count()
        .get_result(conn)
        .unwrap_or(0);
    format!("TKT-{:06}", count + 1)
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<SupportTicket>, SlaError> {
    let mut conn = state.conn.get()?;

    let priority = req.priority.unwrap_or_else(|| "P3".to_string());
    if !PRIORITIES.contains(&priority.as_str()) {
        return Err(SlaError::InvalidState(format!(
            "unknown priority {priority}"
        )));
    }

    let now = Utc::now();
    let ticket_number = generate_ticket_number(&mut conn);

    // Due dates are fixed at creation from the active policy and only move
    // when a hold interval closes. Missing policy leaves them unset and the
    // scheduler keeps flagging the ticket as a configuration error.
    let policy: Option<SlaPolicy> = ticket_sla_policies::table
        .filter(ticket_sla_policies::solution_id.eq(req.solution_id))
        .filter(ticket_sla_policies::priority.eq(&priority))
        .filter(ticket_sla_policies::is_active.eq(true))
        .first(&mut conn)
        .optional()?;
    let (response_due, resolution_due) = match &policy {
        Some(p) => (
            Some(now + Duration::hours(i64::from(p.response_hours))),
            Some(now + Duration::hours(i64::from(p.resolution_hours))),
        ),
        None => {
            warn!(
                "no active SLA policy for solution {} priority {priority}",
                req.solution_id
            );
            (None, None)
        }
    };

    let ticket = SupportTicket {
        id: Uuid::new_v4(),
        ticket_number,
        subject: req.subject,
        description: req.description,
        solution_id: req.solution_id,
        status: "Open".to_string(),
        priority,
        created_at: now,
        updated_at: now,
        first_response_at: None,
        resolved_at: None,
        closed_at: None,
        sla_response_due: response_due,
        sla_resolution_due: resolution_due,
        sla_consumption_pct: 0.0,
        sla_status: SlaStatus::Healthy.as_str().to_string(),
        escalation_level: 0,
        sla_paused_at: None,
    };

    diesel::insert_into(support_tickets::table)
        .values(&ticket)
        .execute(&mut conn)?;

    Ok(Json(ticket))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SupportTicket>>, SlaError> {
    let mut conn = state.conn.get()?;
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let mut q = support_tickets::table.into_boxed();

    if let Some(status) = query.status {
        q = q.filter(support_tickets::status.eq(status));
    }
    if let Some(priority) = query.priority {
        q = q.filter(support_tickets::priority.eq(priority));
    }
    if let Some(sla_status) = query.sla_status {
        q = q.filter(support_tickets::sla_status.eq(sla_status));
    }
    if let Some(solution_id) = query.solution_id {
        q = q.filter(support_tickets::solution_id.eq(solution_id));
    }
    if let Some(search) = query.search {
        let pattern = format!("%{search}%");
        q = q.filter(
            support_tickets::subject
                .ilike(pattern.clone())
                .or(support_tickets::ticket_number.ilike(pattern)),
        );
    }

    let tickets: Vec<SupportTicket> = q
        .order(support_tickets::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    Ok(Json(tickets))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SupportTicket>, SlaError> {
    let store = PgSlaStore::new(state.conn.clone());
    Ok(Json(store.ticket(id).await?))
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<SupportTicket>, SlaError> {
    let mut conn = state.conn.get()?;
    let now = Utc::now();

    conn.transaction::<(), SlaError, _>(|conn| {
        let ticket: SupportTicket = support_tickets::table
            .find(id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| SlaError::NotFound(format!("ticket {id}")))?;

        // A ticket leaving the open set cannot keep a dangling hold; end the
        // open interval at the transition instant, as a resume would.
        if is_closed(&req.status) {
            if let Some(closure) = close_out_hold(&ticket, now) {
                diesel::update(
                    ticket_hold_intervals::table
                        .filter(ticket_hold_intervals::ticket_id.eq(id))
                        .filter(ticket_hold_intervals::resumed_at.is_null()),
                )
                .set(ticket_hold_intervals::resumed_at.eq(Some(now)))
                .execute(conn)?;
                diesel::update(support_tickets::table.find(id))
                    .set((
                        support_tickets::sla_paused_at.eq(None::<DateTime<Utc>>),
                        support_tickets::sla_resolution_due.eq(closure.resolution_due),
                        support_tickets::sla_response_due.eq(closure.response_due),
                    ))
                    .execute(conn)?;
            }
        }

        diesel::update(support_tickets::table.find(id))
            .set((
                support_tickets::status.eq(&req.status),
                support_tickets::updated_at.eq(now),
            ))
            .execute(conn)?;

        if req.status == "Resolved" || req.status == "complete" {
            diesel::update(support_tickets::table.find(id))
                .set(support_tickets::resolved_at.eq(Some(now)))
                .execute(conn)?;
        }
        if req.status == "Closed" {
            diesel::update(support_tickets::table.find(id))
                .set(support_tickets::closed_at.eq(Some(now)))
                .execute(conn)?;
        }
        Ok(())
    })?;

    let store = PgSlaStore::new(state.conn.clone());
    Ok(Json(store.ticket(id).await?))
}

/// External first-response signal: stamps the response clock once; repeated
/// calls are no-ops.
pub async fn record_first_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SupportTicket>, SlaError> {
    let mut conn = state.conn.get()?;
    let now = Utc::now();

    diesel::update(
        support_tickets::table
            .find(id)
            .filter(support_tickets::first_response_at.is_null()),
    )
    .set((
        support_tickets::first_response_at.eq(Some(now)),
        support_tickets::updated_at.eq(now),
    ))
    .execute(&mut conn)?;

    let store = PgSlaStore::new(state.conn.clone());
    Ok(Json(store.ticket(id).await?))
}

pub async fn pause_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SupportTicket>, SlaError> {
    let store = PgSlaStore::new(state.conn.clone());
    let ticket = store.pause_ticket(id, Utc::now()).await?;
    Ok(Json(ticket))
}

pub async fn resume_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SupportTicket>, SlaError> {
    let store = PgSlaStore::new(state.conn.clone());
    let ticket = store.resume_ticket(id, Utc::now()).await?;
    Ok(Json(ticket))
}

/// Snapshot of one ticket's SLA state. Open tickets are computed live;
/// closed tickets are reported as of the instant they left the open set, so
/// the snapshot never rewrites history. A closed ticket whose policy has
/// since been deactivated falls back to the last stored percentage.
fn snapshot_for(
    ticket: &SupportTicket,
    holds: &[HoldInterval],
    policy: Option<&SlaPolicy>,
    now: DateTime<Utc>,
) -> Result<SlaSnapshot, SlaError> {
    let as_of = if is_closed(&ticket.status) {
        ticket
            .closed_at
            .or(ticket.resolved_at)
            .unwrap_or(ticket.updated_at)
    } else {
        now
    };

    let (response_pct, resolution_pct) = match policy {
        Some(policy) => {
            let consumption = compute_consumption(ticket, holds, policy, as_of)?;
            (consumption.response_pct, consumption.resolution_pct)
        }
        None if is_closed(&ticket.status) => (0.0, ticket.sla_consumption_pct),
        None => {
            return Err(SlaError::Configuration(format!(
                "no active SLA policy for priority {}",
                ticket.priority
            )))
        }
    };

    Ok(SlaSnapshot {
        ticket_id: ticket.id,
        ticket_number: ticket.ticket_number.clone(),
        response_pct,
        resolution_pct,
        sla_status: SlaStatus::classify(resolution_pct),
        escalation_level: ticket.escalation_level,
        paused: ticket.sla_paused_at.is_some(),
        sla_response_due: ticket.sla_response_due,
        sla_resolution_due: ticket.sla_resolution_due,
    })
}

pub async fn get_ticket_sla(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlaSnapshot>, SlaError> {
    let store = PgSlaStore::new(state.conn.clone());
    let ticket = store.ticket(id).await?;
    let policy = store
        .policy_for(ticket.solution_id, &ticket.priority)
        .await?;
    let holds = store.hold_intervals(ticket.id).await?;
    Ok(Json(snapshot_for(&ticket, &holds, policy.as_ref(), Utc::now())?))
}

pub async fn list_sla_policies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SlaPolicy>>, SlaError> {
    let mut conn = state.conn.get()?;
    let policies: Vec<SlaPolicy> = ticket_sla_policies::table
        .filter(ticket_sla_policies::is_active.eq(true))
        .order(ticket_sla_policies::priority.asc())
        .load(&mut conn)?;
    Ok(Json(policies))
}

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<EscalationAlert>>, SlaError> {
    let mut conn = state.conn.get()?;

    let mut q = ticket_escalation_alerts::table.into_boxed();
    if let Some(ticket_id) = query.ticket_id {
        q = q.filter(ticket_escalation_alerts::ticket_id.eq(ticket_id));
    }
    if let Some(acknowledged) = query.acknowledged {
        q = q.filter(ticket_escalation_alerts::acknowledged.eq(acknowledged));
    }

    let alerts: Vec<EscalationAlert> = q
        .order(ticket_escalation_alerts::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(alerts))
}

pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EscalationAlert>, SlaError> {
    let mut conn = state.conn.get()?;

    let updated = diesel::update(ticket_escalation_alerts::table.find(id))
        .set(ticket_escalation_alerts::acknowledged.eq(true))
        .execute(&mut conn)?;
    if updated == 0 {
        return Err(SlaError::NotFound(format!("alert {id}")));
    }

    let alert: EscalationAlert = ticket_escalation_alerts::table
        .find(id)
        .first(&mut conn)?;
    Ok(Json(alert))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/sla/policies", get(list_sla_policies))
        .route("/api/tickets/alerts", get(list_alerts))
        .route("/api/tickets/alerts/:id/ack", put(acknowledge_alert))
        .route("/api/tickets/:id", get(get_ticket))
        .route("/api/tickets/:id/status", put(change_status))
        .route("/api/tickets/:id/first-response", put(record_first_response))
        .route("/api/tickets/:id/pause", put(pause_ticket))
        .route("/api/tickets/:id/resume", put(resume_ticket))
        .route("/api/tickets/:id/sla", get(get_ticket_sla))
}
