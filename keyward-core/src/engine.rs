//! Decision engine
//!
//! Evaluation walks the rule set in order and returns the outcome of the first
//! rule whose predicates all hold. Later rules are never consulted once one
//! matches, so a broad allow placed before a narrow deny wins.
//!
//! The engine is a pure function of its inputs: no I/O, no interior state.

use std::fmt;

use crate::policy::{Effect, Matcher, PolicyRule, RuleSet};
use crate::request::{Action, Identity, MalformedRequestError};

/// Outcome of evaluating one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
    /// No rule applied; defer to the next authorizer in the chain
    NoOpinion,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
            Self::NoOpinion => f.write_str("no-opinion"),
        }
    }
}

/// A verdict plus the position of the rule that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    /// `None` when no rule matched and the fallback applied
    pub matched_rule: Option<usize>,
}

impl Decision {
    fn matched(index: usize, effect: Effect) -> Self {
        let verdict = match effect {
            Effect::Allow => Verdict::Allow,
            Effect::Deny => Verdict::Deny,
        };
        Self {
            verdict,
            matched_rule: Some(index),
        }
    }

    fn fallback(verdict: Verdict) -> Self {
        Self {
            verdict,
            matched_rule: None,
        }
    }
}

/// What the engine returns when no rule matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fallback {
    #[default]
    NoOpinion,
    Deny,
}

impl Fallback {
    pub fn from_deny_by_default(deny_by_default: bool) -> Self {
        if deny_by_default {
            Self::Deny
        } else {
            Self::NoOpinion
        }
    }

    fn verdict(self) -> Verdict {
        match self {
            Self::NoOpinion => Verdict::NoOpinion,
            Self::Deny => Verdict::Deny,
        }
    }
}

/// Evaluates requests against a rule set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionEngine {
    fallback: Fallback,
}

impl DecisionEngine {
    pub fn new(fallback: Fallback) -> Self {
        Self { fallback }
    }

    /// Engine that denies requests no rule matched
    pub fn deny_by_default() -> Self {
        Self::new(Fallback::Deny)
    }

    pub fn fallback(&self) -> Fallback {
        self.fallback
    }

    /// Evaluate a request, first match wins
    pub fn evaluate(
        &self,
        identity: &Identity,
        action: &Action,
        rules: &RuleSet,
    ) -> Result<Decision, MalformedRequestError> {
        if identity.user_name.is_empty() {
            return Err(MalformedRequestError::MissingUser);
        }
        action.validate()?;

        let decision = rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule_matches(rule, identity, action))
            .map(|(index, rule)| Decision::matched(index, rule.effect))
            .unwrap_or_else(|| Decision::fallback(self.fallback.verdict()));
        Ok(decision)
    }
}

/// Conjunction of every predicate the rule sets
pub fn rule_matches(rule: &PolicyRule, identity: &Identity, action: &Action) -> bool {
    identity_matches(rule, identity) && action_matches(rule, action)
}

fn identity_matches(rule: &PolicyRule, identity: &Identity) -> bool {
    let user_ok = rule.users.is_empty() || rule.users.iter().any(|u| *u == identity.user_name);
    let role_ok = rule.roles.is_empty() || rule.roles.iter().any(|r| identity.roles.contains(r));
    let project_ok = rule.projects.is_empty()
        || rule.projects.iter().any(|p| {
            (!identity.project_id.is_empty() && *p == identity.project_id)
                || (!identity.project_name.is_empty() && *p == identity.project_name)
        });
    user_ok && role_ok && project_ok
}

/// Verb and target predicates
///
/// A rule naming any resource field (even `resource = "*"`) covers resource
/// requests only, and a `nonResourcePath` rule covers non-resource URLs only.
/// `verb = "*", resource = "*"` therefore matches every resource request but
/// no URL path; a rule that omits both kinds of target covers both.
fn action_matches(rule: &PolicyRule, action: &Action) -> bool {
    if let Some(verb) = &rule.verb
        && !verb.matches(action.verb)
    {
        return false;
    }

    if action.is_non_resource() {
        // Resource-scoped rules never grant non-resource URLs
        if rule.targets_resources() {
            return false;
        }
        return field_matches(&rule.non_resource_path, &action.non_resource_path);
    }

    if rule.targets_non_resource() {
        return false;
    }
    field_matches(&rule.api_group, &action.api_group)
        && field_matches(&rule.resource, &action.resource)
        && field_matches(&rule.namespace, &action.namespace)
        && field_matches(&rule.resource_name, &action.resource_name)
}

fn field_matches(matcher: &Option<Matcher<String>>, value: &str) -> bool {
    matcher.as_ref().is_none_or(|m| m.matches(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Verb;

    fn alice() -> Identity {
        Identity::new("alice")
            .with_project("p-1", "demo")
            .with_roles(["member"])
    }

    fn deny_all() -> PolicyRule {
        PolicyRule::deny()
            .with_verb(Matcher::Any)
            .with_resource("*")
    }

    fn allow_get_pods() -> PolicyRule {
        PolicyRule::allow()
            .with_verb(Matcher::Exact(Verb::Get))
            .with_resource("pods")
    }

    fn get_pods() -> Action {
        Action::resource(Verb::Get, "pods").in_namespace("default")
    }

    #[test]
    fn test_first_match_wins() {
        let engine = DecisionEngine::default();

        let deny_first = RuleSet::new(vec![deny_all(), allow_get_pods()]);
        let decision = engine.evaluate(&alice(), &get_pods(), &deny_first).unwrap();
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.matched_rule, Some(0));

        let allow_first = RuleSet::new(vec![allow_get_pods(), deny_all()]);
        let decision = engine.evaluate(&alice(), &get_pods(), &allow_first).unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(decision.matched_rule, Some(0));
    }

    #[test]
    fn test_deny_does_not_override_earlier_allow() {
        let rules = RuleSet::new(vec![
            allow_get_pods(),
            PolicyRule::deny().with_users(["alice"]),
        ]);
        let decision = DecisionEngine::default()
            .evaluate(&alice(), &get_pods(), &rules)
            .unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);
    }

    #[test]
    fn test_wildcard_rule_matches_every_resource_action() {
        let rules = RuleSet::new(vec![
            PolicyRule::allow()
                .with_verb(Matcher::Any)
                .with_resource("*"),
        ]);
        let engine = DecisionEngine::deny_by_default();
        let actions = [
            Action::resource(Verb::Get, "pods"),
            Action::resource(Verb::Delete, "secrets").in_namespace("kube-system"),
            Action::resource(Verb::List, "deployments").with_api_group("apps"),
            Action::resource(Verb::DeleteCollection, "configmaps").named("x"),
            Action::resource(Verb::All, "*"),
        ];
        for action in actions {
            let decision = engine.evaluate(&alice(), &action, &rules).unwrap();
            assert_eq!(decision.verdict, Verdict::Allow, "{action:?}");
        }
    }

    #[test]
    fn test_empty_rule_set_uses_fallback() {
        let empty = RuleSet::empty();
        let decision = DecisionEngine::default()
            .evaluate(&alice(), &get_pods(), &empty)
            .unwrap();
        assert_eq!(decision, Decision::fallback(Verdict::NoOpinion));

        let decision = DecisionEngine::deny_by_default()
            .evaluate(&alice(), &get_pods(), &empty)
            .unwrap();
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.matched_rule, None);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let rules = RuleSet::new(vec![allow_get_pods(), deny_all()]);
        let engine = DecisionEngine::default();
        let first = engine.evaluate(&alice(), &get_pods(), &rules).unwrap();
        for _ in 0..100 {
            assert_eq!(engine.evaluate(&alice(), &get_pods(), &rules).unwrap(), first);
        }
    }

    #[test]
    fn test_role_intersection() {
        let rules = RuleSet::new(vec![
            PolicyRule::allow()
                .with_roles(["admin", "member"])
                .with_verb(Matcher::Any),
        ]);
        let engine = DecisionEngine::default();

        let decision = engine.evaluate(&alice(), &get_pods(), &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);

        let reader = Identity::new("carol").with_roles(["reader"]);
        let decision = engine.evaluate(&reader, &get_pods(), &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);

        let no_roles = Identity::new("dave");
        let decision = engine.evaluate(&no_roles, &get_pods(), &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);
    }

    #[test]
    fn test_project_matches_id_or_name() {
        let by_name = RuleSet::new(vec![PolicyRule::allow().with_projects(["demo"])]);
        let by_id = RuleSet::new(vec![PolicyRule::allow().with_projects(["p-1"])]);
        let engine = DecisionEngine::default();

        for rules in [by_name, by_id] {
            let decision = engine.evaluate(&alice(), &get_pods(), &rules).unwrap();
            assert_eq!(decision.verdict, Verdict::Allow);
        }

        let unscoped = Identity::new("eve");
        let rules = RuleSet::new(vec![PolicyRule::allow().with_projects(["demo"])]);
        let decision = engine.evaluate(&unscoped, &get_pods(), &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let rules = RuleSet::new(vec![
            PolicyRule::allow()
                .with_users(["Alice"])
                .with_verb(Matcher::Any),
        ]);
        let decision = DecisionEngine::default()
            .evaluate(&alice(), &get_pods(), &rules)
            .unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);
    }

    #[test]
    fn test_wildcard_requires_non_empty_value() {
        let rules = RuleSet::new(vec![
            PolicyRule::allow()
                .with_verb(Matcher::Any)
                .with_resource("*")
                .with_namespace("*"),
        ]);
        let engine = DecisionEngine::default();

        let namespaced = get_pods();
        let decision = engine.evaluate(&alice(), &namespaced, &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);

        let cluster_scoped = Action::resource(Verb::List, "nodes");
        let decision = engine.evaluate(&alice(), &cluster_scoped, &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);
    }

    #[test]
    fn test_wildcard_matches_literal_star() {
        let rules = RuleSet::new(vec![
            PolicyRule::allow()
                .with_verb(Matcher::Any)
                .with_resource("*"),
        ]);
        let action = Action::resource(Verb::All, "*");
        let decision = DecisionEngine::default()
            .evaluate(&alice(), &action, &rules)
            .unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);
    }

    #[test]
    fn test_exact_verb_does_not_match_verb_wildcard_request() {
        let rules = RuleSet::new(vec![allow_get_pods()]);
        let action = Action::resource(Verb::All, "pods");
        let decision = DecisionEngine::default()
            .evaluate(&alice(), &action, &rules)
            .unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);
    }

    #[test]
    fn test_non_resource_rules() {
        let rules = RuleSet::new(vec![
            PolicyRule::allow()
                .with_verb(Matcher::Exact(Verb::Get))
                .with_non_resource_path("/healthz"),
        ]);
        let engine = DecisionEngine::default();

        let healthz = Action::non_resource(Verb::Get, "/healthz");
        let decision = engine.evaluate(&alice(), &healthz, &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);

        let metrics = Action::non_resource(Verb::Get, "/metrics");
        let decision = engine.evaluate(&alice(), &metrics, &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);

        let decision = engine.evaluate(&alice(), &get_pods(), &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);
    }

    #[test]
    fn test_resource_wildcard_does_not_cover_url_paths() {
        let engine = DecisionEngine::default();
        let healthz = Action::non_resource(Verb::Get, "/healthz");

        let rules = RuleSet::new(vec![deny_all()]);
        let decision = engine.evaluate(&alice(), &healthz, &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::NoOpinion);

        // Without a resource field the verb wildcard reaches URL paths too
        let rules = RuleSet::new(vec![PolicyRule::deny().with_verb(Matcher::Any)]);
        let decision = engine.evaluate(&alice(), &healthz, &rules).unwrap();
        assert_eq!(decision.verdict, Verdict::Deny);
    }

    #[test]
    fn test_identity_only_rule_matches_both_kinds() {
        let rules = RuleSet::new(vec![PolicyRule::deny().with_users(["alice"])]);
        let engine = DecisionEngine::default();
        for action in [get_pods(), Action::non_resource(Verb::Get, "/version")] {
            let decision = engine.evaluate(&alice(), &action, &rules).unwrap();
            assert_eq!(decision.verdict, Verdict::Deny);
        }
    }

    #[test]
    fn test_malformed_action_rejected() {
        let action = get_pods().with_non_resource_path("/healthz");
        let err = DecisionEngine::default()
            .evaluate(&alice(), &action, &RuleSet::empty())
            .unwrap_err();
        assert!(matches!(err, MalformedRequestError::ConflictingAttributes { .. }));
    }

    #[test]
    fn test_missing_user_rejected() {
        let err = DecisionEngine::default()
            .evaluate(&Identity::default(), &get_pods(), &RuleSet::empty())
            .unwrap_err();
        assert_eq!(err, MalformedRequestError::MissingUser);
    }

    #[test]
    fn test_later_rule_index_reported() {
        let rules = RuleSet::new(vec![
            PolicyRule::allow().with_users(["bob"]),
            PolicyRule::deny().with_users(["mallory"]),
            allow_get_pods(),
        ]);
        let decision = DecisionEngine::default()
            .evaluate(&alice(), &get_pods(), &rules)
            .unwrap();
        assert_eq!(decision.matched_rule, Some(2));
    }
}
