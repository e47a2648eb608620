use chrono::{DateTime, Duration, Utc};

use crate::shared::models::{is_closed, SupportTicket};
use crate::sla::error::SlaError;

/// Transition guards for the two-state pause machine. A ticket is `PAUSED`
/// exactly when `sla_paused_at` is set; both stores run these checks inside
/// the same transaction that mutates the hold-interval log, with the ticket
/// row locked, so two racing commands cannot both pass.
pub fn check_pause(ticket: &SupportTicket) -> Result<(), SlaError> {
    if is_closed(&ticket.status) {
        return Err(SlaError::NotFound(format!(
            "ticket {} is not open",
            ticket.ticket_number
        )));
    }
    if ticket.sla_paused_at.is_some() {
        return Err(SlaError::InvalidState(format!(
            "ticket {} is already paused",
            ticket.ticket_number
        )));
    }
    Ok(())
}

/// Returns the instant the open hold started; the caller closes that interval.
pub fn check_resume(ticket: &SupportTicket) -> Result<DateTime<Utc>, SlaError> {
    if is_closed(&ticket.status) {
        return Err(SlaError::NotFound(format!(
            "ticket {} is not open",
            ticket.ticket_number
        )));
    }
    ticket.sla_paused_at.ok_or_else(|| {
        SlaError::InvalidState(format!("ticket {} is not paused", ticket.ticket_number))
    })
}

/// Push a due date forward by the duration of a just-closed hold interval.
pub fn pushed_due(
    due: Option<DateTime<Utc>>,
    held_for: Duration,
) -> Option<DateTime<Utc>> {
    due.map(|d| d + held_for)
}

/// Effect of ending the open hold when a ticket leaves the open set.
#[derive(Debug, PartialEq, Eq)]
pub struct HoldClosure {
    pub held_for: Duration,
    pub resolution_due: Option<DateTime<Utc>>,
    pub response_due: Option<DateTime<Utc>>,
}

/// Moving a paused ticket to a terminal status must not leave the interval
/// log dangling: the open hold ends at the transition instant, exactly as a
/// resume would. Returns `None` when the ticket is not paused.
pub fn close_out_hold(ticket: &SupportTicket, now: DateTime<Utc>) -> Option<HoldClosure> {
    let paused_at = ticket.sla_paused_at?;
    let held_for = now - paused_at;
    Some(HoldClosure {
        held_for,
        resolution_due: pushed_due(ticket.sla_resolution_due, held_for),
        response_due: if ticket.first_response_at.is_none() {
            pushed_due(ticket.sla_response_due, held_for)
        } else {
            ticket.sla_response_due
        },
    })
}
