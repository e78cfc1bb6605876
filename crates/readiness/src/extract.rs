use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;
use shipcheck_core::models::TicketId;

fn ticket_ref_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\[#(?P<id>\d+)\]").unwrap())
}

/// Ticket references in a single message, in order of appearance.
pub fn ticket_refs(message: &str) -> impl Iterator<Item = TicketId> + '_ {
    ticket_ref_regex().captures_iter(message).filter_map(|caps| {
        let raw = caps.name("id")?.as_str();
        match raw.parse::<u64>() {
            Ok(0) | Err(_) => {
                tracing::debug!("Ignoring ticket reference [#{}]", raw);
                None
            }
            Ok(id) => Some(TicketId(id)),
        }
    })
}

/// Unique ticket IDs referenced across `messages`, in first-seen order.
pub fn extract<S: AsRef<str>>(messages: &[S]) -> Vec<TicketId> {
    messages.iter().flat_map(|m| ticket_refs(m.as_ref())).unique().collect()
}

/// Whether any message lacks a ticket reference.
pub fn has_unticketed_commits<S: AsRef<str>>(messages: &[S]) -> bool {
    messages.iter().any(|m| !ticket_ref_regex().is_match(m.as_ref()))
}
