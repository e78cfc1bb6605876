pub mod aggregate;
pub mod announce;
pub mod classify;
pub mod extract;
pub mod rules;
#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use anyhow::Result;
pub use aggregate::{ResolveOptions, resolve};
use shipcheck_core::{
    config::Config,
    models::{CommitRange, ReadinessReport},
    source::{CommitSource, TicketSource},
};
use shipcheck_github::GitHub;
use shipcheck_tracker::Tracker;
use time::OffsetDateTime;

use crate::aggregate::with_timeout;

/// Ties a commit source and a ticket source together for one dashboard.
pub struct Correlator<C, T> {
    pub commits: Arc<C>,
    pub tickets: Arc<T>,
    pub options: ResolveOptions,
}

impl Correlator<GitHub, Tracker> {
    pub async fn connect(config: &Config) -> Result<Self> {
        let commits = GitHub::new(&config.github).await?;
        let tickets = Arc::new(Tracker::new(&config.tracker)?);
        Ok(Self::new(commits, tickets, ResolveOptions::from(&config.readiness)))
    }
}

impl<C: CommitSource, T: TicketSource> Correlator<C, T> {
    pub fn new(commits: Arc<C>, tickets: Arc<T>, options: ResolveOptions) -> Self {
        Self { commits, tickets, options }
    }

    /// Commit messages in `range`. A failed lookup reads as an empty range.
    pub async fn commit_messages(&self, range: &CommitRange) -> Vec<String> {
        match with_timeout(self.options.fetch_timeout, self.commits.fetch_commit_range(range)).await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Failed to fetch commits for {}: {}", range, e);
                vec![]
            }
        }
    }

    /// Readiness of the pending deploy of `range` to `environment`.
    pub async fn correlate(&self, range: &CommitRange, environment: &str) -> ReadinessReport {
        tracing::debug!("Correlating {} for {}", range, environment);
        let messages = self.commit_messages(range).await;
        resolve(&messages, environment, self.tickets.clone(), &self.options).await
    }

    /// Record a finished deploy of `range` on every story it references.
    pub async fn announce_deploy(
        &self,
        range: &CommitRange,
        environment: &str,
        at: OffsetDateTime,
    ) -> usize {
        let messages = self.commit_messages(range).await;
        let ids = extract::extract(&messages);
        if ids.is_empty() {
            tracing::info!("No stories to announce for {}", range);
            return 0;
        }
        announce::announce(
            &ids,
            &range.repository,
            environment,
            at,
            self.tickets.clone(),
            &self.options,
        )
        .await
    }
}
