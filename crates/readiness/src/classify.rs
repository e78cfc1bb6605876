use std::collections::BTreeMap;

use shipcheck_core::models::{ActivityEntry, Dependencies, RepoReadiness};

use crate::rules::Rules;

struct RepoHistory<'a> {
    first: &'a str,
    any: Option<RepoReadiness>,
}

/// Classify every dependent repository mentioned in a ticket's activity.
///
/// `activity` is expected newest first, as the tracker returns it. For each
/// repository the oldest qualifying entry decides between ready to deploy and
/// in progress, and a deploy announcement anywhere in its history overrides both.
pub fn classify(activity: &[ActivityEntry], environment: &str) -> BTreeMap<String, RepoReadiness> {
    let rules = Rules::for_environment(environment);
    let mut histories = BTreeMap::<&str, RepoHistory>::new();
    for entry in activity.iter().rev().filter(|e| rules.qualifies(e)) {
        let repo = match rules.repo_for(entry) {
            Ok(repo) => repo,
            Err(e) => {
                tracing::debug!("Skipping activity: {}", e);
                continue;
            }
        };
        let any = rules.any_entry_state(&entry.text);
        histories
            .entry(repo)
            .and_modify(|h| h.any = h.any.max(any))
            .or_insert(RepoHistory { first: &entry.text, any });
    }
    histories
        .into_iter()
        .filter_map(|(repo, history)| {
            let state = rules.first_entry_state(history.first).max(history.any);
            if state.is_none() {
                tracing::debug!("No readiness signal for {} in {}", repo, rules.environment());
            }
            state.map(|s| (repo.to_string(), s))
        })
        .collect()
}

/// [`classify`], partitioned for display.
pub fn dependencies(activity: &[ActivityEntry], environment: &str) -> Dependencies {
    classify(activity, environment).iter().map(|(repo, state)| (repo.as_str(), *state)).collect()
}
