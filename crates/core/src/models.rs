use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Tracker story number, as written in commit messages (`[#12345]`).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Commits between two revisions of one repository.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct CommitRange {
    pub owner: String,
    pub repository: String,
    pub from: String,
    pub to: String,
}

impl CommitRange {
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for CommitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}...{}", self.owner, self.repository, self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Started,
    Finished,
    Delivered,
    Accepted,
    Rejected,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TicketStatus {
    pub const fn variants() -> &'static [Self] {
        &[
            Self::Started,
            Self::Finished,
            Self::Delivered,
            Self::Accepted,
            Self::Rejected,
            Self::Unknown,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Delivered => "delivered",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "finished" => Ok(Self::Finished),
            "delivered" => Ok(Self::Delivered),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "unknown" => Ok(Self::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Ticket {
    pub id: TicketId,
    pub project_id: u64,
    pub url: String,
    pub status: TicketStatus,
}

/// One comment or event from a ticket's activity feed.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub text: String,
    /// Posted by the source-control integration rather than a person.
    pub is_commit_activity: bool,
}

impl ActivityEntry {
    pub fn comment(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_commit_activity: false }
    }

    pub fn commit(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_commit_activity: true }
    }
}

// Note: Ordering follows deploy progress, so `max` picks the most advanced state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoReadiness {
    InProgress,
    ReadyToDeploy,
    Deployed,
}

impl RepoReadiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::ReadyToDeploy => "ready_to_deploy",
            Self::Deployed => "deployed",
        }
    }
}

impl fmt::Display for RepoReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Dependent repositories partitioned by readiness.
///
/// `all` lists every repository once, in partition order (in progress, then
/// ready to deploy, then deployed).
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Default)]
pub struct Dependencies {
    pub all: Vec<String>,
    pub in_progress: Vec<String>,
    pub ready_to_deploy: Vec<String>,
    pub deployed: Vec<String>,
}

impl Dependencies {
    /// Add `repo` under `readiness`, ignoring repeats within that partition.
    pub fn insert(&mut self, repo: &str, readiness: RepoReadiness) {
        let partition = match readiness {
            RepoReadiness::InProgress => &mut self.in_progress,
            RepoReadiness::ReadyToDeploy => &mut self.ready_to_deploy,
            RepoReadiness::Deployed => &mut self.deployed,
        };
        if !partition.iter().any(|r| r == repo) {
            partition.push(repo.to_string());
        }
        self.rebuild_all();
    }

    pub fn extend(&mut self, other: &Dependencies) {
        for repo in &other.in_progress {
            self.insert(repo, RepoReadiness::InProgress);
        }
        for repo in &other.ready_to_deploy {
            self.insert(repo, RepoReadiness::ReadyToDeploy);
        }
        for repo in &other.deployed {
            self.insert(repo, RepoReadiness::Deployed);
        }
    }

    pub fn contains(&self, repo: &str) -> bool { self.all.iter().any(|r| r == repo) }

    pub fn is_empty(&self) -> bool { self.all.is_empty() }

    fn rebuild_all(&mut self) {
        self.all.clear();
        for repo in self.in_progress.iter().chain(&self.ready_to_deploy).chain(&self.deployed) {
            if !self.all.contains(repo) {
                self.all.push(repo.clone());
            }
        }
    }
}

impl<'a> FromIterator<(&'a str, RepoReadiness)> for Dependencies {
    fn from_iter<I: IntoIterator<Item = (&'a str, RepoReadiness)>>(iter: I) -> Self {
        let mut out = Self::default();
        for (repo, readiness) in iter {
            out.insert(repo, readiness);
        }
        out
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TicketReport {
    pub id: TicketId,
    pub url: String,
    pub status: TicketStatus,
    pub dependencies: Dependencies,
}

/// Everything the dashboard shows for one pending deploy.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Default)]
pub struct ReadinessReport {
    pub tickets: Vec<TicketReport>,
    pub dependencies: Dependencies,
    pub has_unticketed_commits: bool,
    pub has_sql_migration: bool,
    pub no_stories_found: bool,
}

impl ReadinessReport {
    pub fn no_stories(has_unticketed_commits: bool) -> Self {
        Self { has_unticketed_commits, no_stories_found: true, ..Default::default() }
    }

    /// Safe to ship: every commit is ticketed and nothing needs a migration.
    pub fn is_safe(&self) -> bool { !self.has_unticketed_commits && !self.has_sql_migration }
}
