use tracing::debug;

use super::conditions::Condition;
use super::domain::DailyMetrics;

/// A compiled reward rule: every condition must hold for the rule to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardRule {
    pub box_type: String,
    pub description: String,
    pub conditions: Vec<Condition>,
}

impl RewardRule {
    pub fn matches(&self, metrics: &DailyMetrics) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.holds(metrics))
    }

    pub fn feature_name(&self) -> String {
        format!("rule_{}", self.box_type)
    }
}

/// Ordered rule collection. Metric names were resolved when the rules were
/// compiled, so evaluation itself cannot fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<RewardRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<RewardRule>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RewardRule> {
        self.rules.iter()
    }

    /// Matched rules in configuration order.
    pub fn evaluate(&self, metrics: &DailyMetrics) -> Vec<&RewardRule> {
        let matched: Vec<&RewardRule> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(metrics))
            .collect();
        debug!(
            matched = ?matched.iter().map(|rule| rule.box_type.as_str()).collect::<Vec<_>>(),
            "reward rules evaluated"
        );
        matched
    }
}
