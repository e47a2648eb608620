use chrono::{DateTime, Duration, Utc};

use crate::shared::models::{HoldInterval, SlaPolicy, SupportTicket};
use crate::sla::error::SlaError;

/// Consumption of a ticket's SLA budgets at a given instant. Percentages are
/// uncapped; values over 100 express breach magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consumption {
    pub response_pct: f64,
    pub resolution_pct: f64,
    pub effective_elapsed: Duration,
}

/// Wall-clock time since `created_at` minus every hold overlap up to `at`.
/// An interval that is still open (null `resumed_at`) is clamped to `at`, so
/// consumption stops advancing while a ticket is paused.
fn effective_elapsed(
    created_at: DateTime<Utc>,
    holds: &[HoldInterval],
    at: DateTime<Utc>,
) -> Duration {
    if at <= created_at {
        return Duration::zero();
    }
    let mut paused = Duration::zero();
    for hold in holds {
        let start = hold.paused_at.max(created_at);
        let end = hold.resumed_at.unwrap_or(at).min(at);
        if end > start {
            paused += end - start;
        }
    }
    (at - created_at) - paused
}

fn pct_of(elapsed: Duration, budget_hours: i32) -> f64 {
    let budget_ms = f64::from(budget_hours) * 3_600_000.0;
    elapsed.num_milliseconds() as f64 / budget_ms * 100.0
}

/// Pure computation of response/resolution consumption for one ticket.
///
/// The response clock stops at `first_response_at`; the reported
/// `response_pct` is frozen at its value as of that instant. A zero or
/// negative budget is a configuration error, never a division by zero.
pub fn compute_consumption(
    ticket: &SupportTicket,
    holds: &[HoldInterval],
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> Result<Consumption, SlaError> {
    if policy.resolution_hours <= 0 || policy.response_hours <= 0 {
        return Err(SlaError::Configuration(format!(
            "policy {} for priority {} has non-positive budget",
            policy.id, policy.priority
        )));
    }

    let elapsed = effective_elapsed(ticket.created_at, holds, now);
    let response_at = match ticket.first_response_at {
        Some(first) => first.min(now),
        None => now,
    };
    let response_elapsed = effective_elapsed(ticket.created_at, holds, response_at);

    Ok(Consumption {
        response_pct: pct_of(response_elapsed, policy.response_hours),
        resolution_pct: pct_of(elapsed, policy.resolution_hours),
        effective_elapsed: elapsed,
    })
}
