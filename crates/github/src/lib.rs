use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result, anyhow};
use http::StatusCode;
use octocrab::{GitHubError, Octocrab};
use regex::Regex;
use serde::Deserialize;
use shipcheck_core::{
    FetchError, config::GitHubConfig, models::CommitRange, source::CommitSource,
};

#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
}

impl GitHub {
    pub async fn new(config: &GitHubConfig) -> Result<Arc<Self>> {
        let mut builder = Octocrab::builder().personal_token(config.token.clone());
        if let Some(api_url) = &config.api_url {
            builder = builder
                .base_uri(api_url.as_str())
                .with_context(|| format!("Invalid GitHub API URL {api_url}"))?;
        }
        let client = builder.build().context("Failed to create GitHub client")?;
        let profile = client.current().user().await.context("Failed to fetch current user")?;
        tracing::info!("Logged in as {}", profile.login);
        Ok(Arc::new(Self { client }))
    }

    pub fn with_client(client: Octocrab) -> Self { Self { client } }

    pub async fn compare(&self, range: &CommitRange) -> Result<Vec<String>, FetchError> {
        let route = format!(
            "/repos/{}/{}/compare/{}...{}",
            range.owner, range.repository, range.from, range.to
        );
        let comparison: Comparison = match self.client.get(&route, None::<&()>).await {
            Ok(comparison) => comparison,
            Err(e) => return Err(map_error(e, range)),
        };
        if comparison.total_commits > comparison.commits.len() {
            tracing::warn!(
                "Comparison {} truncated to {} of {} commits",
                range,
                comparison.commits.len(),
                comparison.total_commits
            );
        }
        Ok(comparison.messages())
    }
}

impl CommitSource for GitHub {
    async fn fetch_commit_range(&self, range: &CommitRange) -> Result<Vec<String>, FetchError> {
        self.compare(range).await
    }
}

fn map_error(e: octocrab::Error, range: &CommitRange) -> FetchError {
    match e {
        octocrab::Error::GitHub { source, .. }
            if matches!(*source, GitHubError { status_code: StatusCode::NOT_FOUND, .. }) =>
        {
            FetchError::NotFound
        }
        octocrab::Error::GitHub { source, .. }
            if matches!(*source, GitHubError {
                status_code: StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                ..
            }) =>
        {
            FetchError::AccessDenied
        }
        e => FetchError::Internal(
            anyhow!(e).context(format!("Failed to compare commits for {range}")),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct Comparison {
    #[serde(default)]
    total_commits: usize,
    commits: Vec<ComparisonCommit>,
}

#[derive(Debug, Deserialize)]
struct ComparisonCommit {
    commit: ComparisonCommitDetails,
}

#[derive(Debug, Deserialize)]
struct ComparisonCommitDetails {
    message: String,
}

impl Comparison {
    fn messages(self) -> Vec<String> { self.commits.into_iter().map(|c| c.commit.message).collect() }
}

/// Parse a dashboard compare link such as
/// `https://github.com/owner/repo/compare/abc123...def456`.
pub fn commit_range_from_compare_url(url: &str) -> Option<CommitRange> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let caps = REGEX
        .get_or_init(|| {
            Regex::new(
                r"^https?://github\.com/(?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?/compare/(?P<from>[^/.]+)\.\.\.(?P<to>[^/.?#]+)",
            )
            .unwrap()
        })
        .captures(url)?;
    Some(CommitRange::new(&caps["owner"], &caps["repo"], &caps["from"], &caps["to"]))
}
