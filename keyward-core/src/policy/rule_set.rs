//! Immutable ordered rule collections

use std::sync::Arc;

use super::{PolicyRule, RuleRecord};

/// An ordered, immutable list of rules. Earlier rules take precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Arc<[PolicyRule]>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RuleSet {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    /// A rule set with no rules; evaluates to the engine's fallback
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PolicyRule> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolicyRule> {
        self.rules.iter()
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Render as policy-text records, in order
    pub fn to_records(&self) -> Vec<RuleRecord> {
        self.rules.iter().map(RuleRecord::from).collect()
    }

    /// Render as indented JSON policy text
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_records())
    }
}

impl FromIterator<PolicyRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = PolicyRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rule_set() {
        let set = RuleSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(set.get(0).is_none());
    }

    #[test]
    fn test_preserves_order() {
        let set: RuleSet = [
            PolicyRule::deny().with_users(["mallory"]),
            PolicyRule::allow().with_users(["alice"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).unwrap().users, vec!["mallory".to_string()]);
        assert_eq!(set.get(1).unwrap().users, vec!["alice".to_string()]);
    }

    #[test]
    fn test_to_json_pretty() {
        let set = RuleSet::new(vec![PolicyRule::allow().with_users(["alice"]).with_resource("*")]);
        let json = set.to_json_pretty().unwrap();
        assert!(json.contains("\"users\""));
        assert!(json.contains("\"resource\": \"*\""));
        assert!(json.contains("\"effect\": \"allow\""));
    }
}
