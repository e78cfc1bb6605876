use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use anyhow::anyhow;
use shipcheck_core::{
    FetchError,
    models::{ActivityEntry, CommitRange, Ticket, TicketId, TicketStatus},
    source::{CommitSource, TicketSource},
};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

pub fn init_tracing() {
    let env_filter =
        EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).with_test_writer().try_init();
}

pub fn commit_activity(repo: &str) -> ActivityEntry {
    ActivityEntry::commit(format!("Some change\nhttps://github.com/acme/{repo}/commit/0a1b2c3"))
}

pub fn merge_activity(repo: &str) -> ActivityEntry {
    ActivityEntry::commit(format!(
        "Merge pull request #9 from acme/topic\nhttps://github.com/acme/{repo}/commit/4d5e6f7"
    ))
}

pub fn deploy_activity(repo: &str, environment: &str) -> ActivityEntry {
    ActivityEntry::comment(format!("Deployed {repo} to {environment}: 2024-05-01 09:30:00 (UTC)"))
}

/// In-memory tracker. Unknown tickets are reported as not found.
#[derive(Default)]
pub struct FakeTracker {
    tickets: HashMap<TicketId, Ticket>,
    activity: HashMap<TicketId, Vec<ActivityEntry>>,
    delays: HashMap<TicketId, Duration>,
    failing_activity: HashSet<TicketId>,
    pub comments: Mutex<Vec<(u64, TicketId, String)>>,
}

impl FakeTracker {
    /// `activity` is given oldest first and stored newest first, like the tracker.
    pub fn with_ticket(mut self, id: u64, status: TicketStatus, activity: Vec<ActivityEntry>) -> Self {
        let id = TicketId(id);
        self.tickets.insert(id, Ticket {
            id,
            project_id: 1000 + id.0,
            url: format!("https://tracker.test/story/show/{}", id.0),
            status,
        });
        self.activity.insert(id, activity.into_iter().rev().collect());
        self
    }

    pub fn with_delay(mut self, id: u64, delay: Duration) -> Self {
        self.delays.insert(TicketId(id), delay);
        self
    }

    pub fn with_failing_activity(mut self, id: u64) -> Self {
        self.failing_activity.insert(TicketId(id));
        self
    }

    pub fn posted(&self) -> Vec<(u64, TicketId, String)> { self.comments.lock().unwrap().clone() }
}

impl TicketSource for FakeTracker {
    async fn fetch_ticket(&self, id: TicketId) -> Result<Ticket, FetchError> {
        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }
        self.tickets.get(&id).cloned().ok_or(FetchError::NotFound)
    }

    async fn fetch_activity(
        &self,
        _project_id: u64,
        id: TicketId,
    ) -> Result<Vec<ActivityEntry>, FetchError> {
        if self.failing_activity.contains(&id) {
            return Err(FetchError::Internal(anyhow!("connection reset")));
        }
        Ok(self.activity.get(&id).cloned().unwrap_or_default())
    }

    async fn post_comment(
        &self,
        project_id: u64,
        id: TicketId,
        text: &str,
    ) -> Result<(), FetchError> {
        self.comments.lock().unwrap().push((project_id, id, text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCommits {
    ranges: HashMap<CommitRange, Vec<String>>,
}

impl FakeCommits {
    pub fn with_range(mut self, range: CommitRange, messages: &[&str]) -> Self {
        self.ranges.insert(range, messages.iter().map(|m| m.to_string()).collect());
        self
    }
}

impl CommitSource for FakeCommits {
    async fn fetch_commit_range(&self, range: &CommitRange) -> Result<Vec<String>, FetchError> {
        self.ranges.get(range).cloned().ok_or(FetchError::NotFound)
    }
}
