//! Authorizer facade
//!
//! Combines a resolved [`Identity`] and an [`Action`] with the store's current
//! snapshot and maps the engine's [`Decision`] to a webhook verdict.

use std::sync::Arc;

use serde::Serialize;

use crate::engine::{Decision, DecisionEngine, Fallback, Verdict};
use crate::request::{Action, Identity, MalformedRequestError};
use crate::store::PolicyStore;

/// Reason reported for every request while no policy source is configured
pub const DISABLED_REASON: &str = "authorization disabled";

/// Final webhook verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorization {
    pub allowed: bool,
    /// Set for every refusal the API server must not pass on to another authorizer
    pub denied: bool,
    pub reason: String,
    /// Index of the deciding rule, if one matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<usize>,
}

impl Authorization {
    fn disabled() -> Self {
        Self {
            allowed: true,
            denied: false,
            reason: DISABLED_REASON.to_string(),
            matched_rule: None,
        }
    }

    /// Denial for a request whose attributes could not be evaluated
    pub fn malformed(err: &MalformedRequestError) -> Self {
        Self {
            allowed: false,
            denied: true,
            reason: format!("malformed request: {err}"),
            matched_rule: None,
        }
    }

    fn from_decision(decision: Decision) -> Self {
        let (allowed, denied, reason) = match (decision.verdict, decision.matched_rule) {
            (Verdict::Allow, Some(index)) => (true, false, format!("allowed by rule {index}")),
            (Verdict::Deny, Some(index)) => {
                (false, true, format!("explicitly denied by rule {index}"))
            }
            (Verdict::Deny, None) => (
                false,
                true,
                "denied by default: no matching policy rule".to_string(),
            ),
            // The engine never allows without a matching rule
            (Verdict::Allow, None) | (Verdict::NoOpinion, _) => {
                (false, false, "no matching policy rule".to_string())
            }
        };
        Self {
            allowed,
            denied,
            reason,
            matched_rule: decision.matched_rule,
        }
    }
}

/// Entry point for authorization decisions
///
/// Constructed explicitly and shared via `Arc`; there is no global instance.
#[derive(Debug, Clone)]
pub struct Authorizer {
    inner: Option<Enabled>,
}

#[derive(Debug, Clone)]
struct Enabled {
    store: Arc<PolicyStore>,
    engine: DecisionEngine,
}

impl Authorizer {
    pub fn new(store: Arc<PolicyStore>, engine: DecisionEngine) -> Self {
        Self {
            inner: Some(Enabled { store, engine }),
        }
    }

    /// Authorizer for deployments with no policy source; allows everything
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// The backing store, when authorization is enabled
    pub fn store(&self) -> Option<&Arc<PolicyStore>> {
        self.inner.as_ref().map(|enabled| &enabled.store)
    }

    pub fn fallback(&self) -> Option<Fallback> {
        self.inner.as_ref().map(|enabled| enabled.engine.fallback())
    }

    /// Decide whether `identity` may perform `action`
    pub fn authorize(&self, identity: &Identity, action: &Action) -> Authorization {
        let Some(enabled) = &self.inner else {
            return Authorization::disabled();
        };

        let rules = enabled.store.current();
        let authorization = match enabled.engine.evaluate(identity, action, &rules) {
            Ok(decision) => Authorization::from_decision(decision),
            Err(err) => return self.reject(identity, &err),
        };

        tracing::debug!(
            user = %identity.user_name,
            verb = %action.verb,
            resource = %action.resource,
            namespace = %action.namespace,
            path = %action.non_resource_path,
            allowed = authorization.allowed,
            reason = %authorization.reason,
            "authorization decision"
        );
        authorization
    }

    /// Verdict for a request whose attributes could not be turned into an [`Action`]
    pub fn reject(&self, identity: &Identity, err: &MalformedRequestError) -> Authorization {
        if !self.is_enabled() {
            return Authorization::disabled();
        }
        tracing::warn!(user = %identity.user_name, error = %err, "rejected malformed request");
        Authorization::malformed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Matcher, PolicyRule, RuleSet, Verb};

    fn authorizer(rules: RuleSet, fallback: Fallback) -> Authorizer {
        Authorizer::new(Arc::new(PolicyStore::new(rules)), DecisionEngine::new(fallback))
    }

    fn alice_everything() -> RuleSet {
        RuleSet::new(vec![
            PolicyRule::allow()
                .with_users(["alice"])
                .with_verb(Matcher::Any)
                .with_resource("*"),
        ])
    }

    #[test]
    fn test_allow_references_rule() {
        let authz = authorizer(alice_everything(), Fallback::NoOpinion);
        let result = authz.authorize(
            &Identity::new("alice"),
            &Action::resource(Verb::Delete, "pods"),
        );
        assert!(result.allowed);
        assert!(!result.denied);
        assert_eq!(result.reason, "allowed by rule 0");
        assert_eq!(result.matched_rule, Some(0));
    }

    #[test]
    fn test_explicit_deny() {
        let rules = RuleSet::new(vec![
            PolicyRule::allow().with_users(["bob"]),
            PolicyRule::deny().with_users(["mallory"]),
        ]);
        let authz = authorizer(rules, Fallback::NoOpinion);
        let result = authz.authorize(
            &Identity::new("mallory"),
            &Action::resource(Verb::Get, "pods"),
        );
        assert!(!result.allowed);
        assert!(result.denied);
        assert_eq!(result.reason, "explicitly denied by rule 1");
    }

    #[test]
    fn test_no_match_maps_to_not_allowed() {
        let authz = authorizer(alice_everything(), Fallback::NoOpinion);
        let result = authz.authorize(&Identity::new("bob"), &Action::resource(Verb::Delete, "pods"));
        assert!(!result.allowed);
        assert!(!result.denied);
        assert_eq!(result.reason, "no matching policy rule");
    }

    #[test]
    fn test_deny_by_default_reason() {
        let authz = authorizer(alice_everything(), Fallback::Deny);
        let result = authz.authorize(&Identity::new("bob"), &Action::resource(Verb::Delete, "pods"));
        assert!(!result.allowed);
        assert!(result.denied);
        assert!(result.reason.starts_with("denied by default"));
    }

    #[test]
    fn test_empty_policy_denies() {
        let authz = authorizer(RuleSet::empty(), Fallback::NoOpinion);
        let result = authz.authorize(&Identity::new("alice"), &Action::resource(Verb::Get, "pods"));
        assert!(!result.allowed);
    }

    #[test]
    fn test_disabled_allows_everything() {
        let authz = Authorizer::disabled();
        assert!(!authz.is_enabled());
        assert!(authz.store().is_none());
        let result = authz.authorize(&Identity::new("anyone"), &Action::resource(Verb::Delete, "nodes"));
        assert!(result.allowed);
        assert_eq!(result.reason, DISABLED_REASON);
    }

    #[test]
    fn test_malformed_request_denied_with_reason() {
        let authz = authorizer(alice_everything(), Fallback::NoOpinion);
        let action = Action::resource(Verb::Get, "pods").with_non_resource_path("/healthz");
        let result = authz.authorize(&Identity::new("alice"), &action);
        assert!(!result.allowed);
        assert!(result.denied);
        assert!(result.reason.starts_with("malformed request:"));
    }

    #[test]
    fn test_reject_respects_disabled_mode() {
        let err = MalformedRequestError::UnknownVerb("impersonate".to_string());
        let identity = Identity::new("alice");

        let enabled = authorizer(alice_everything(), Fallback::NoOpinion);
        let result = enabled.reject(&identity, &err);
        assert!(!result.allowed);
        assert!(result.denied);
        assert_eq!(result.reason, "malformed request: unknown verb: impersonate");

        let result = Authorizer::disabled().reject(&identity, &err);
        assert!(result.allowed);
        assert!(!result.denied);
    }

    #[test]
    fn test_sees_swapped_policy() {
        let store = Arc::new(PolicyStore::new(RuleSet::empty()));
        let authz = Authorizer::new(Arc::clone(&store), DecisionEngine::default());
        let identity = Identity::new("alice");
        let action = Action::resource(Verb::Get, "pods");

        assert!(!authz.authorize(&identity, &action).allowed);
        store.swap(alice_everything());
        assert!(authz.authorize(&identity, &action).allowed);
    }
}
