//! Client for the project tracker's v5 REST API.
//!
//! Only the handful of endpoints the readiness report needs: story metadata,
//! story comments (which include source-control activity), and posting a
//! comment back when a deploy lands.

use anyhow::{Context, Result};
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};
use shipcheck_core::{
    FetchError,
    config::TrackerConfig,
    models::{ActivityEntry, Ticket, TicketId, TicketStatus},
    source::TicketSource,
    util::UrlExt,
};
use url::Url;

const TOKEN_HEADER: &str = "X-TrackerToken";
/// `commit_type` the tracker assigns to comments created by the GitHub integration.
const GITHUB_COMMIT_TYPE: &str = "github";

#[derive(Clone)]
pub struct Tracker {
    client: reqwest::Client,
    api_url: Url,
}

impl Tracker {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let mut token =
            HeaderValue::from_str(&config.token).context("Tracker token is not a valid header")?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, token);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create tracker client")?;
        Ok(Self { client, api_url: config.api_url.clone() })
    }

    pub async fn story(&self, id: TicketId) -> Result<Ticket, FetchError> {
        let url = self.api_url.with_segments(["stories", &id.0.to_string()]);
        let story: StoryResponse = self.get(url).await?;
        Ok(story.into_ticket(id))
    }

    pub async fn comments(
        &self,
        project_id: u64,
        id: TicketId,
    ) -> Result<Vec<ActivityEntry>, FetchError> {
        let url = self.api_url.with_segments([
            "projects",
            &project_id.to_string(),
            "stories",
            &id.0.to_string(),
            "comments",
        ]);
        let comments: Vec<CommentResponse> = self.get(url).await?;
        Ok(comments.into_iter().map(ActivityEntry::from).collect())
    }

    pub async fn add_comment(
        &self,
        project_id: u64,
        id: TicketId,
        text: &str,
    ) -> Result<(), FetchError> {
        let url = self.api_url.with_segments([
            "projects",
            &project_id.to_string(),
            "stories",
            &id.0.to_string(),
            "comments",
        ]);
        let response = self
            .client
            .post(url.clone())
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .with_context(|| format!("Failed to post to {}", url.path_and_query()))?;
        check_status(response.status(), &url)?;
        tracing::debug!("Commented on story {}", id);
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url.path_and_query()))?;
        check_status(response.status(), &url)?;
        let value = response
            .json()
            .await
            .with_context(|| format!("Failed to decode {}", url.path_and_query()))?;
        Ok(value)
    }
}

fn check_status(status: StatusCode, url: &Url) -> Result<(), FetchError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(FetchError::NotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::AccessDenied),
        s => Err(FetchError::Internal(anyhow::anyhow!(
            "Bad status code returned by tracker for {}: {}",
            url.path_and_query(),
            s
        ))),
    }
}

impl TicketSource for Tracker {
    async fn fetch_ticket(&self, id: TicketId) -> Result<Ticket, FetchError> {
        self.story(id).await
    }

    async fn fetch_activity(
        &self,
        project_id: u64,
        id: TicketId,
    ) -> Result<Vec<ActivityEntry>, FetchError> {
        self.comments(project_id, id).await
    }

    async fn post_comment(
        &self,
        project_id: u64,
        id: TicketId,
        text: &str,
    ) -> Result<(), FetchError> {
        self.add_comment(project_id, id, text).await
    }
}

// Partial representation of the story resource
#[derive(Debug, Deserialize)]
struct StoryResponse {
    project_id: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    current_state: TicketStatus,
}

impl StoryResponse {
    fn into_ticket(self, id: TicketId) -> Ticket {
        Ticket { id, project_id: self.project_id, url: self.url, status: self.current_state }
    }
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    commit_type: Option<String>,
}

impl From<CommentResponse> for ActivityEntry {
    fn from(value: CommentResponse) -> Self {
        Self {
            text: value.text.unwrap_or_default(),
            is_commit_activity: value.commit_type.as_deref() == Some(GITHUB_COMMIT_TYPE),
        }
    }
}
