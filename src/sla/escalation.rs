use crate::shared::models::EscalationConfig;

/// Outcome of one escalation evaluation. `triggered` lists every level newly
/// crossed in this evaluation, lowest first, so a ticket that jumps several
/// thresholds between passes still fires one alert per level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub new_level: i32,
    pub triggered: Vec<i32>,
}

/// Monotone escalation: the resulting level is the highest configured level
/// whose threshold has been reached, but never below `current_level`. Levels
/// do not regress while a ticket is open, even if consumption later drops.
pub fn evaluate(
    resolution_pct: f64,
    current_level: i32,
    configs: &[EscalationConfig],
) -> Escalation {
    let reached = configs
        .iter()
        .filter(|c| c.threshold_percent <= resolution_pct)
        .map(|c| c.level)
        .max()
        .unwrap_or(0);
    let new_level = reached.max(current_level);

    let mut triggered: Vec<i32> = configs
        .iter()
        .map(|c| c.level)
        .filter(|&l| l > current_level && l <= new_level)
        .collect();
    triggered.sort_unstable();

    Escalation {
        new_level,
        triggered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn configs(thresholds: &[(i32, f64)]) -> Vec<EscalationConfig> {
        let solution_id = Uuid::new_v4();
        thresholds
            .iter()
            .map(|&(level, threshold_percent)| EscalationConfig {
                id: Uuid::new_v4(),
                solution_id,
                level,
                threshold_percent,
            })
            .collect()
    }

    #[test]
    fn skipping_thresholds_triggers_every_level() {
        let cfg = configs(&[(1, 50.0), (2, 75.0), (3, 90.0)]);
        let out = evaluate(95.0, 0, &cfg);
        assert_eq!(out.new_level, 3);
        assert_eq!(out.triggered, vec![1, 2, 3]);
    }

    #[test]
    fn no_change_triggers_nothing() {
        let cfg = configs(&[(1, 50.0), (2, 75.0)]);
        let out = evaluate(60.0, 1, &cfg);
        assert_eq!(out.new_level, 1);
        assert!(out.triggered.is_empty());
    }

    #[test]
    fn level_never_regresses() {
        let cfg = configs(&[(1, 50.0), (2, 75.0), (3, 90.0)]);
        let mut level = 0;
        let mut seen = Vec::new();
        for pct in [40.0, 80.0, 55.0, 92.0, 10.0] {
            let out = evaluate(pct, level, &cfg);
            assert!(out.new_level >= level);
            level = out.new_level;
            seen.push(level);
        }
        assert_eq!(seen, vec![0, 2, 2, 3, 3]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let cfg = configs(&[(1, 50.0)]);
        assert_eq!(evaluate(50.0, 0, &cfg).new_level, 1);
        assert_eq!(evaluate(49.999, 0, &cfg).new_level, 0);
    }

    #[test]
    fn repeated_evaluation_is_idempotent() {
        let cfg = configs(&[(1, 50.0), (2, 75.0)]);
        let first = evaluate(80.0, 0, &cfg);
        let second = evaluate(80.0, first.new_level, &cfg);
        assert_eq!(second.new_level, first.new_level);
        assert!(second.triggered.is_empty());
    }
}
