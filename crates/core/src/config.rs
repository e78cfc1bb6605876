use std::{fs::File, io::BufReader, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub github: GitHubConfig,
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file {}", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse config")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    pub token: String,
    /// Override for GitHub Enterprise installations.
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    pub token: String,
    #[serde(default = "default_tracker_api_url")]
    pub api_url: Url,
}

fn default_tracker_api_url() -> Url {
    Url::parse("https://www.pivotaltracker.com/services/v5/").expect("valid default URL")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Dependent repository whose presence flags a schema migration.
    pub migration_repo: String,
    pub fetch_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            migration_repo: "sql-migrations".to_string(),
            fetch_timeout_secs: 10,
            max_concurrent_fetches: 10,
        }
    }
}

impl ReadinessConfig {
    pub fn fetch_timeout(&self) -> Duration { Duration::from_secs(self.fetch_timeout_secs.max(1)) }

    pub fn max_concurrent_fetches(&self) -> usize { self.max_concurrent_fetches.max(1) }
}
