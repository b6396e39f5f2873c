use serde::{Deserialize, Serialize};

use crate::axis::value::round_to;

/// Relation a prerequisite readback must satisfy against its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Equal,
    NotEqual,
    Below,
    AtMost,
    Above,
    AtLeast,
}

impl Relation {
    pub fn holds(&self, value: f64, reference: f64) -> bool {
        match self {
            Relation::Equal => value == reference,
            Relation::NotEqual => value != reference,
            Relation::Below => value < reference,
            Relation::AtMost => value <= reference,
            Relation::Above => value > reference,
            Relation::AtLeast => value >= reference,
        }
    }
}

/// Which requested targets a rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMatch {
    #[default]
    Any,
    Exactly(f64),
    Above(f64),
    Below(f64),
}

impl TargetMatch {
    pub fn matches(&self, target: f64) -> bool {
        match *self {
            TargetMatch::Any => true,
            TargetMatch::Exactly(v) => target == v,
            TargetMatch::Above(v) => target > v,
            TargetMatch::Below(v) => target < v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub axis: String,
    pub relation: Relation,
    pub reference: f64,
    /// Round the readback to this many decimals before comparing.
    #[serde(default)]
    pub round_to: Option<u32>,
    pub advisory: String,
}

impl Requirement {
    pub fn new(
        axis: impl Into<String>,
        relation: Relation,
        reference: f64,
        advisory: impl Into<String>,
    ) -> Self {
        Self {
            axis: axis.into(),
            relation,
            reference,
            round_to: None,
            advisory: advisory.into(),
        }
    }

    pub fn rounded(mut self, decimals: u32) -> Self {
        self.round_to = Some(decimals);
        self
    }

    pub fn is_met(&self, readback: f64) -> bool {
        let value = match self.round_to {
            Some(decimals) => round_to(readback, decimals),
            None => readback,
        };
        self.relation.holds(value, self.reference)
    }
}

/// An interlock on moves of one axis, evaluated against other axes' state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardRule {
    pub name: String,
    pub axis: String,
    #[serde(default)]
    pub applies_to: TargetMatch,
    /// Axes that must be at rest, checked in order.
    #[serde(default)]
    pub wait_for: Vec<String>,
    #[serde(default)]
    pub require: Vec<Requirement>,
}

impl GuardRule {
    pub fn new(name: impl Into<String>, axis: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            axis: axis.into(),
            applies_to: TargetMatch::Any,
            wait_for: Vec::new(),
            require: Vec::new(),
        }
    }

    pub fn applies_to(mut self, target: TargetMatch) -> Self {
        self.applies_to = target;
        self
    }

    pub fn wait_for(mut self, axis: impl Into<String>) -> Self {
        self.wait_for.push(axis.into());
        self
    }

    pub fn require(mut self, requirement: Requirement) -> Self {
        self.require.push(requirement);
        self
    }

    pub fn covers(&self, axis: &str, target: f64) -> bool {
        self.axis == axis && self.applies_to.matches(target)
    }

    /// Every axis the rule reads.
    pub fn referenced_axes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.axis.as_str())
            .chain(self.wait_for.iter().map(String::as_str))
            .chain(self.require.iter().map(|r| r.axis.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_requirement_tolerates_jitter() {
        let exact = Requirement::new("omega", Relation::Equal, -90.0, "Move to X-ray position");
        assert!(exact.is_met(-90.0));
        assert!(!exact.is_met(-90.0004));
        assert!(exact.clone().rounded(2).is_met(-90.0004));
    }

    #[test]
    fn test_target_match_variants() {
        assert!(TargetMatch::Any.matches(12.0));
        assert!(TargetMatch::Exactly(0.0).matches(0.0));
        assert!(!TargetMatch::Exactly(0.0).matches(-20.0));
        assert!(TargetMatch::Above(0.0).matches(20.0));
        assert!(!TargetMatch::Above(0.0).matches(0.0));
        assert!(TargetMatch::Below(-100.0).matches(-115.0));
    }

    #[test]
    fn test_rule_deserializes_from_toml() {
        let rule: GuardRule = toml::from_str(
            r#"
            name = "pinhole_above_zero"
            axis = "pinhole"
            applies_to = { above = 0.0 }
            wait_for = ["omega", "us_mirror"]

            [[require]]
            axis = "us_mirror"
            relation = "at_most"
            reference = -114.0
            advisory = "You forgot to remove the upstream mirror."
            "#,
        )
        .unwrap();

        assert_eq!(rule.applies_to, TargetMatch::Above(0.0));
        assert_eq!(rule.require[0].relation, Relation::AtMost);
        assert!(rule.covers("pinhole", 20.0));
        assert!(!rule.covers("pinhole", -20.0));
    }
}
