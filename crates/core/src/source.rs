//! Seams between the readiness logic and the services it reads from.

use crate::{
    FetchError,
    models::{ActivityEntry, CommitRange, Ticket, TicketId},
};

pub trait CommitSource: Send + Sync + 'static {
    /// Commit messages in `range`, oldest first.
    fn fetch_commit_range(
        &self,
        range: &CommitRange,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;
}

pub trait TicketSource: Send + Sync + 'static {
    fn fetch_ticket(&self, id: TicketId) -> impl Future<Output = Result<Ticket, FetchError>> + Send;

    /// Activity feed for a ticket, newest first.
    fn fetch_activity(
        &self,
        project_id: u64,
        id: TicketId,
    ) -> impl Future<Output = Result<Vec<ActivityEntry>, FetchError>> + Send;

    fn post_comment(
        &self,
        project_id: u64,
        id: TicketId,
        text: &str,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;
}
