use serde::{Deserialize, Serialize};

/// Status bucket of a ticket's resolution SLA. Bands are inclusive on the
/// lower bound and exclusive on the upper: exactly 78.0 is `AtRisk`, exactly
/// 100.0 is `Breached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    Healthy,
    Warning,
    AtRisk,
    Critical,
    Breached,
}

impl SlaStatus {
    pub fn classify(resolution_pct: f64) -> Self {
        if resolution_pct >= 100.0 {
            Self::Breached
        } else if resolution_pct >= 90.0 {
            Self::Critical
        } else if resolution_pct >= 78.0 {
            Self::AtRisk
        } else if resolution_pct >= 65.0 {
            Self::Warning
        } else {
            Self::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::AtRisk => "at_risk",
            Self::Critical => "critical",
            Self::Breached => "breached",
        }
    }
}
