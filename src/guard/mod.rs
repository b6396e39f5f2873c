//! Motion interlocks.
//!
//! Guards are pure functions over a [`StationSnapshot`]. They never query the
//! remote layer and never mutate axis state, so a rejection is purely
//! advisory. For one rule the clauses are checked in this order, first
//! failure wins:
//!
//! 1. a `wait_for` axis still has an undrained update,
//! 2. a requirement's relation does not hold on the published readback.

pub mod rule;

use crate::{error::Advisory, station::snapshot::StationSnapshot};
use rule::GuardRule;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow,
    Reject(Advisory),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

pub fn evaluate_guard(snapshot: &StationSnapshot, rule: &GuardRule) -> Verdict {
    for name in &rule.wait_for {
        // An axis missing from the snapshot cannot be shown to be at rest.
        let moving = snapshot.get(name).map_or(true, |view| view.moving);
        if moving {
            return Verdict::Reject(Advisory::PrerequisiteMoving {
                rule: rule.name.clone(),
                axis: name.clone(),
            });
        }
    }

    for requirement in &rule.require {
        let readback = snapshot
            .get(&requirement.axis)
            .and_then(|view| view.readback.as_ref())
            .and_then(|value| value.as_f64());

        let met = readback.is_some_and(|value| requirement.is_met(value));
        if !met {
            return Verdict::Reject(Advisory::Interlock {
                rule: rule.name.clone(),
                axis: requirement.axis.clone(),
                message: requirement.advisory.clone(),
            });
        }
    }

    Verdict::Allow
}

/// Evaluate, in table order, every rule covering a move of `axis` to
/// `target`.
pub fn evaluate_guards(
    snapshot: &StationSnapshot,
    rules: &[GuardRule],
    axis: &str,
    target: f64,
) -> Verdict {
    rules
        .iter()
        .filter(|rule| rule.covers(axis, target))
        .map(|rule| evaluate_guard(snapshot, rule))
        .find(|verdict| !verdict.is_allowed())
        .unwrap_or(Verdict::Allow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::value::AxisValue;
    use super::rule::{Relation, Requirement, TargetMatch};

    const X_RAY_ANGLE: f64 = -90.0;
    const PINHOLE_OUT_THRESHOLD: f64 = 0.0;
    const MIRROR_ADVISORY: &str = "First move to X-Ray position and move the pinhole OUT!";

    fn mirror_in() -> GuardRule {
        GuardRule::new("us_mirror_in", "us_mirror")
            .applies_to(TargetMatch::Exactly(0.0))
            .wait_for("omega")
            .wait_for("pinhole")
            .require(Requirement::new(
                "omega",
                Relation::Equal,
                X_RAY_ANGLE,
                MIRROR_ADVISORY,
            ))
            .require(Requirement::new(
                "pinhole",
                Relation::AtMost,
                PINHOLE_OUT_THRESHOLD,
                MIRROR_ADVISORY,
            ))
    }

    fn snapshot(omega: f64, omega_moving: bool, pinhole: f64, pinhole_moving: bool) -> StationSnapshot {
        StationSnapshot::new("13-BMD", true)
            .with_axis("omega", Some(AxisValue::Number(omega)), omega_moving)
            .with_axis("pinhole", Some(AxisValue::Number(pinhole)), pinhole_moving)
            .with_axis("us_mirror", Some(AxisValue::Number(-115.0)), false)
    }

    #[test]
    fn test_mirror_in_allowed_at_x_ray_position_with_pinhole_out() {
        let verdict = evaluate_guard(&snapshot(-90.0, false, -25.0, false), &mirror_in());
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn test_moving_prerequisite_rejects_first() {
        let verdict = evaluate_guard(&snapshot(-45.0, true, 5.0, true), &mirror_in());
        assert_eq!(
            verdict,
            Verdict::Reject(Advisory::PrerequisiteMoving {
                rule: "us_mirror_in".to_string(),
                axis: "omega".to_string(),
            })
        );
    }

    #[test]
    fn test_wrong_omega_angle_rejects_with_advisory() {
        let Verdict::Reject(advisory) = evaluate_guard(&snapshot(-45.0, false, -25.0, false), &mirror_in()) else {
            panic!("expected rejection");
        };
        assert_eq!(advisory.to_string(), MIRROR_ADVISORY);
    }

    #[test]
    fn test_pinhole_in_beam_rejects() {
        let verdict = evaluate_guard(&snapshot(-90.0, false, 0.5, false), &mirror_in());
        assert!(matches!(
            verdict,
            Verdict::Reject(Advisory::Interlock { ref axis, .. }) if axis == "pinhole"
        ));
    }

    #[test]
    fn test_unknown_readback_fails_requirement() {
        let snapshot = StationSnapshot::new("13-BMD", true)
            .with_axis("omega", None, false)
            .with_axis("pinhole", Some(AxisValue::Number(-25.0)), false);
        assert!(!evaluate_guard(&snapshot, &mirror_in()).is_allowed());
    }

    #[test]
    fn test_missing_prerequisite_counts_as_moving() {
        let snapshot = StationSnapshot::new("13-BMD", true)
            .with_axis("omega", Some(AxisValue::Number(-90.0)), false);
        assert!(matches!(
            evaluate_guard(&snapshot, &mirror_in()),
            Verdict::Reject(Advisory::PrerequisiteMoving { ref axis, .. }) if axis == "pinhole"
        ));
    }

    #[test]
    fn test_rules_only_apply_to_matching_targets() {
        let rules = vec![mirror_in()];
        let bad = snapshot(-45.0, false, 5.0, false);

        assert_eq!(evaluate_guards(&bad, &rules, "us_mirror", -115.0), Verdict::Allow);
        assert_eq!(evaluate_guards(&bad, &rules, "ds_mirror", 0.0), Verdict::Allow);
        assert!(!evaluate_guards(&bad, &rules, "us_mirror", 0.0).is_allowed());
    }

    #[test]
    fn test_first_failing_rule_in_table_order_wins() {
        let rules = vec![
            GuardRule::new("first", "pinhole").require(Requirement::new(
                "omega",
                Relation::Equal,
                -90.0,
                "first",
            )),
            GuardRule::new("second", "pinhole").require(Requirement::new(
                "us_mirror",
                Relation::AtMost,
                -114.0,
                "second",
            )),
        ];
        let snap = StationSnapshot::new("s", true)
            .with_axis("omega", Some(AxisValue::Number(0.0)), false)
            .with_axis("us_mirror", Some(AxisValue::Number(0.0)), false);

        let Verdict::Reject(advisory) = evaluate_guards(&snap, &rules, "pinhole", 20.0) else {
            panic!("expected rejection");
        };
        assert_eq!(advisory.to_string(), "first");
    }
}
