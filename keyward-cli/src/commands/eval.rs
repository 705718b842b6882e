//! Eval command - decide a single request offline

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use keyward_core::{
    Action, Authorization, Authorizer, DecisionEngine, Fallback, Identity, PolicyStore, Verb,
};

use super::check::read_policy;

#[derive(Debug, Args)]
pub struct EvalArgs {
    /// Policy file (JSON or TOML)
    #[arg(long)]
    pub policy: PathBuf,

    /// Keystone user name
    #[arg(short, long)]
    pub user: String,

    /// Role held in the project (repeatable)
    #[arg(short, long = "role")]
    pub roles: Vec<String>,

    /// Project name
    #[arg(long)]
    pub project: Option<String>,

    /// Project id (defaults to the project name)
    #[arg(long)]
    pub project_id: Option<String>,

    /// User domain name
    #[arg(long)]
    pub domain: Option<String>,

    /// Request verb, e.g. get, list, create or *
    #[arg(long)]
    pub verb: Verb,

    /// Resource, with optional subresource (pods/log)
    #[arg(long, required_unless_present = "path", conflicts_with = "path")]
    pub resource: Option<String>,

    /// Non-resource URL path, e.g. /healthz
    #[arg(long)]
    pub path: Option<String>,

    #[arg(short, long)]
    pub namespace: Option<String>,

    /// API group (empty for the core group)
    #[arg(long)]
    pub api_group: Option<String>,

    /// Name of the resource instance
    #[arg(long)]
    pub name: Option<String>,

    /// Deny requests that no policy rule matches
    #[arg(long)]
    pub deny_by_default: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl EvalArgs {
    fn identity(&self) -> Identity {
        let mut identity = Identity::new(&self.user).with_roles(self.roles.iter().cloned());
        if let Some(domain) = &self.domain {
            identity = identity.with_domain(domain);
        }
        if let Some(name) = &self.project {
            let id = self.project_id.as_deref().unwrap_or(name);
            identity = identity.with_project(id, name);
        } else if let Some(id) = &self.project_id {
            identity = identity.with_project(id, "");
        }
        identity
    }

    fn action(&self) -> Action {
        let mut action = match (&self.resource, &self.path) {
            (Some(resource), _) => Action::resource(self.verb, resource),
            (None, Some(path)) => Action::non_resource(self.verb, path),
            (None, None) => Action::resource(self.verb, ""),
        };
        if let Some(namespace) = &self.namespace {
            action = action.in_namespace(namespace);
        }
        if let Some(group) = &self.api_group {
            action = action.with_api_group(group);
        }
        if let Some(name) = &self.name {
            action = action.named(name);
        }
        action
    }
}

/// Decide the request described by `args` against its policy file
pub fn evaluate(args: &EvalArgs) -> Result<Authorization> {
    let rules = read_policy(&args.policy)?;
    let engine = DecisionEngine::new(Fallback::from_deny_by_default(args.deny_by_default));
    let authorizer = Authorizer::new(Arc::new(PolicyStore::new(rules)), engine);

    Ok(authorizer.authorize(&args.identity(), &args.action()))
}

pub fn run(args: EvalArgs) -> Result<()> {
    let result = evaluate(&args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let verdict = if result.allowed {
        "allow"
    } else if result.denied {
        "deny"
    } else {
        "no opinion"
    };
    println!("{verdict}: {}", result.reason);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        eval: EvalArgs,
    }

    const POLICY: &str = r#"[
        {"users": ["mallory"], "verb": "*", "resource": "*", "effect": "deny"},
        {"roles": ["member"], "projects": ["demo"], "verb": "*", "resource": "pods", "namespace": "*"},
        {"users": ["alice"], "verb": "get", "nonResourcePath": "/healthz"}
    ]"#;

    fn eval_with(dir: &TempDir, args: &[&str]) -> Authorization {
        let path = dir.path().join("policy.json");
        std::fs::write(&path, POLICY).unwrap();

        let mut argv = vec!["test", "--policy", path.to_str().unwrap()];
        argv.extend_from_slice(args);
        let cli = TestCli::try_parse_from(argv).unwrap();
        evaluate(&cli.eval).unwrap()
    }

    #[test]
    fn test_eval_args_require_target() {
        let result = TestCli::try_parse_from(["test", "--policy", "p.json", "-u", "alice", "--verb", "get"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_eval_args_resource_and_path_conflict() {
        let result = TestCli::try_parse_from([
            "test", "--policy", "p.json", "-u", "alice", "--verb", "get", "--resource", "pods",
            "--path", "/healthz",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_eval_args_reject_unknown_verb() {
        let result = TestCli::try_parse_from([
            "test", "--policy", "p.json", "-u", "alice", "--verb", "escalate", "--resource", "pods",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_eval_project_member_allowed() {
        let dir = TempDir::new().unwrap();
        let result = eval_with(
            &dir,
            &[
                "-u", "bob", "-r", "member", "--project", "demo", "--verb", "list", "--resource",
                "pods", "-n", "default",
            ],
        );
        assert!(result.allowed);
        assert_eq!(result.matched_rule, Some(1));
    }

    #[test]
    fn test_eval_explicit_deny() {
        let dir = TempDir::new().unwrap();
        let result = eval_with(
            &dir,
            &[
                "-u", "mallory", "-r", "member", "--project", "demo", "--verb", "get",
                "--resource", "pods", "-n", "default",
            ],
        );
        assert!(!result.allowed);
        assert!(result.denied);
        assert_eq!(result.reason, "explicitly denied by rule 0");
    }

    #[test]
    fn test_eval_non_resource_path() {
        let dir = TempDir::new().unwrap();
        let result = eval_with(&dir, &["-u", "alice", "--verb", "get", "--path", "/healthz"]);
        assert!(result.allowed);
        assert_eq!(result.matched_rule, Some(2));
    }

    #[test]
    fn test_eval_fallback_modes() {
        let dir = TempDir::new().unwrap();
        let args = ["-u", "carol", "--verb", "get", "--resource", "secrets", "-n", "default"];

        let result = eval_with(&dir, &args);
        assert!(!result.allowed);
        assert!(!result.denied);
        assert_eq!(result.reason, "no matching policy rule");

        let mut strict = args.to_vec();
        strict.push("--deny-by-default");
        let result = eval_with(&dir, &strict);
        assert!(!result.allowed);
        assert_eq!(result.reason, "denied by default: no matching policy rule");
    }

    #[test]
    fn test_identity_project_id_defaults_to_name() {
        let cli = TestCli::try_parse_from([
            "test", "--policy", "p.json", "-u", "bob", "--project", "demo", "--verb", "get",
            "--resource", "pods",
        ])
        .unwrap();
        let identity = cli.eval.identity();
        assert_eq!(identity.project_id, "demo");
        assert_eq!(identity.project_name, "demo");
    }
}
