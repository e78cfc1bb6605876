//! Text patterns mined from ticket activity.
//!
//! Each rule pairs a pattern with the readiness it implies and how much of a
//! repository's history it is checked against. Adding a category means adding
//! a row to [`RULES`]; the classifier only walks the table.

use std::sync::OnceLock;

use regex::Regex;
use shipcheck_core::models::{ActivityEntry, RepoReadiness};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RuleKind {
    /// A pull request merged into the default branch.
    Merge,
    /// A commit pushed by the source-control integration.
    Commit,
    /// A deploy announcement for an environment.
    Deploy,
}

/// Which entries of a repository's history a rule is checked against.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Scope {
    /// Only the oldest qualifying entry. Earlier rows win.
    FirstEntry,
    /// Every entry.
    AnyEntry,
}

pub struct RuleDef {
    pub kind: RuleKind,
    pub pattern: &'static str,
    pub readiness: RepoReadiness,
    pub scope: Scope,
}

/// Patterns with a `repo` group name the dependent repository. A pattern with an
/// `env` group only matches when that group equals the environment being checked.
pub const RULES: &[RuleDef] = &[
    RuleDef {
        kind: RuleKind::Merge,
        pattern: r"Merge pull request",
        readiness: RepoReadiness::ReadyToDeploy,
        scope: Scope::FirstEntry,
    },
    RuleDef {
        kind: RuleKind::Commit,
        pattern: r"https?://[^/\s]+/[^/\s]+/(?P<repo>[^/\s]+)/commit/",
        readiness: RepoReadiness::InProgress,
        scope: Scope::FirstEntry,
    },
    RuleDef {
        kind: RuleKind::Deploy,
        pattern: r"Deployed (?P<repo>\S+) to (?P<env>[^:\n]+): ",
        readiness: RepoReadiness::Deployed,
        scope: Scope::AnyEntry,
    },
];

pub struct Rule {
    pub def: &'static RuleDef,
    regex: Regex,
}

fn compiled() -> &'static [Rule] {
    static COMPILED: OnceLock<Vec<Rule>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES.iter().map(|def| Rule { def, regex: Regex::new(def.pattern).unwrap() }).collect()
    })
}

#[derive(Debug, Error)]
#[error("No repository in activity {excerpt:?}")]
pub struct PatternMismatch {
    pub excerpt: String,
}

impl PatternMismatch {
    fn new(text: &str) -> Self { Self { excerpt: text.chars().take(80).collect() } }
}

/// The rule table bound to one environment.
pub struct Rules<'a> {
    environment: &'a str,
    rules: &'static [Rule],
}

impl<'a> Rules<'a> {
    pub fn for_environment(environment: &'a str) -> Self {
        Self { environment: environment.trim(), rules: compiled() }
    }

    pub fn environment(&self) -> &str { self.environment }

    /// Repository named by `text` under `rule`, or `Some("")` for a match on a
    /// rule without a `repo` group.
    fn capture<'t>(&self, rule: &Rule, text: &'t str) -> Option<&'t str> {
        rule.regex.captures_iter(text).find_map(|caps| {
            if let Some(env) = caps.name("env")
                && env.as_str().trim() != self.environment
            {
                return None;
            }
            Some(caps.name("repo").map_or("", |m| m.as_str()))
        })
    }

    pub fn matches(&self, kind: RuleKind, text: &str) -> bool {
        self.rules.iter().filter(|r| r.def.kind == kind).any(|r| self.capture(r, text).is_some())
    }

    /// Commit activity always qualifies; anything else only when it announces a
    /// deploy to this environment.
    pub fn qualifies(&self, entry: &ActivityEntry) -> bool {
        entry.is_commit_activity || self.matches(RuleKind::Deploy, &entry.text)
    }

    /// The dependent repository an entry is about, from the first rule in table
    /// order whose `repo` group matches.
    pub fn repo_for<'t>(&self, entry: &'t ActivityEntry) -> Result<&'t str, PatternMismatch> {
        self.rules
            .iter()
            .filter(|r| r.regex.capture_names().flatten().any(|n| n == "repo"))
            .find_map(|r| self.capture(r, &entry.text).filter(|repo| !repo.is_empty()))
            .ok_or_else(|| PatternMismatch::new(&entry.text))
    }

    /// Readiness implied by the first matching [`Scope::FirstEntry`] rule.
    pub fn first_entry_state(&self, text: &str) -> Option<RepoReadiness> {
        self.rules
            .iter()
            .filter(|r| r.def.scope == Scope::FirstEntry)
            .find(|r| self.capture(r, text).is_some())
            .map(|r| r.def.readiness)
    }

    /// Most advanced readiness implied by any [`Scope::AnyEntry`] rule.
    pub fn any_entry_state(&self, text: &str) -> Option<RepoReadiness> {
        self.rules
            .iter()
            .filter(|r| r.def.scope == Scope::AnyEntry)
            .filter(|r| self.capture(r, text).is_some())
            .map(|r| r.def.readiness)
            .max()
    }
}
