//! Policy rules, rule sets, and the policy text loader

mod loader;
mod matcher;
mod rule;
mod rule_set;

pub use loader::{PolicyFormat, PolicyParseError, load, load_as};
pub use matcher::{Matcher, WILDCARD};
pub use rule::{Effect, InvalidRuleError, PolicyRule, RuleRecord, Verb};
pub use rule_set::RuleSet;
