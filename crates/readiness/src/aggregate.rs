use std::{sync::Arc, time::Duration};

use shipcheck_core::{
    FetchError,
    config::ReadinessConfig,
    models::{Dependencies, ReadinessReport, TicketId, TicketReport},
    source::TicketSource,
};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{classify, extract};

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub migration_repo: String,
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self { Self::from(&ReadinessConfig::default()) }
}

impl From<&ReadinessConfig> for ResolveOptions {
    fn from(config: &ReadinessConfig) -> Self {
        Self {
            migration_repo: config.migration_repo.clone(),
            fetch_timeout: config.fetch_timeout(),
            max_concurrent_fetches: config.max_concurrent_fetches(),
        }
    }
}

pub(crate) async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    tokio::time::timeout(limit, fut).await.unwrap_or(Err(FetchError::Timeout(limit)))
}

/// Build the readiness report for a deploy containing `messages`.
///
/// Every referenced ticket is looked up concurrently. Tickets that can't be
/// fetched are left out; tickets whose activity can't be fetched are kept with
/// no dependencies. The report is returned once every lookup has settled.
pub async fn resolve<S: TicketSource>(
    messages: &[String],
    environment: &str,
    source: Arc<S>,
    options: &ResolveOptions,
) -> ReadinessReport {
    let has_unticketed_commits = extract::has_unticketed_commits(messages);
    let ids = extract::extract(messages);
    if ids.is_empty() {
        tracing::info!("No stories found in {} commits", messages.len());
        return ReadinessReport::no_stories(has_unticketed_commits);
    }

    struct TaskResult {
        index: usize,
        id: TicketId,
        result: Result<TicketReport, FetchError>,
    }
    let sem = Arc::new(Semaphore::new(options.max_concurrent_fetches.max(1)));
    let mut set = JoinSet::new();
    for (index, id) in ids.iter().copied().enumerate() {
        let sem = sem.clone();
        let source = source.clone();
        let environment = environment.to_string();
        let limit = options.fetch_timeout;
        set.spawn(async move {
            let _permit = sem.acquire().await.ok();
            let result = fetch_ticket_report(&*source, id, &environment, limit).await;
            TaskResult { index, id, result }
        });
    }

    // Results land by dispatch index so the report keeps extraction order no
    // matter which lookup finishes first.
    let expected = ids.len();
    let mut settled = 0;
    let mut slots: Vec<Option<TicketReport>> = vec![None; expected];
    while let Some(join_result) = set.join_next().await {
        settled += 1;
        match join_result {
            Ok(TaskResult { index, result: Ok(report), .. }) => slots[index] = Some(report),
            Ok(TaskResult { id, result: Err(e), .. }) if e.is_missing() => {
                tracing::info!("Dropping story {}: {}", id, e);
            }
            Ok(TaskResult { id, result: Err(e), .. }) => {
                tracing::warn!("Dropping story {}: {:?}", id, e);
            }
            Err(e) => {
                tracing::error!("Story lookup failed: {:?}", e);
            }
        }
    }
    if settled != expected {
        tracing::error!("Only {} of {} story lookups settled", settled, expected);
    }

    let tickets = slots.into_iter().flatten().collect::<Vec<_>>();
    tracing::info!(
        "Resolved {} of {} stories for {} ({} commits)",
        tickets.len(),
        expected,
        environment,
        messages.len()
    );
    build_report(tickets, has_unticketed_commits, &options.migration_repo)
}

async fn fetch_ticket_report<S: TicketSource>(
    source: &S,
    id: TicketId,
    environment: &str,
    limit: Duration,
) -> Result<TicketReport, FetchError> {
    let ticket = with_timeout(limit, source.fetch_ticket(id)).await?;
    let dependencies =
        match with_timeout(limit, source.fetch_activity(ticket.project_id, id)).await {
            Ok(activity) => classify::dependencies(&activity, environment),
            Err(e) => {
                tracing::warn!("Failed to fetch activity for story {}: {}", id, e);
                Dependencies::default()
            }
        };
    Ok(TicketReport { id, url: ticket.url, status: ticket.status, dependencies })
}

fn build_report(
    tickets: Vec<TicketReport>,
    has_unticketed_commits: bool,
    migration_repo: &str,
) -> ReadinessReport {
    let mut dependencies = Dependencies::default();
    for ticket in &tickets {
        dependencies.extend(&ticket.dependencies);
    }
    let has_sql_migration = tickets.iter().any(|t| t.dependencies.contains(migration_repo));
    ReadinessReport {
        no_stories_found: tickets.is_empty(),
        tickets,
        dependencies,
        has_unticketed_commits,
        has_sql_migration,
    }
}

#[cfg(test)]
mod tests {
    use shipcheck_core::models::{ActivityEntry, TicketStatus};

    use super::*;
    use crate::test_utils::{FakeTracker, commit_activity, deploy_activity, init_tracing};

    fn messages(values: &[&str]) -> Vec<String> { values.iter().map(|s| s.to_string()).collect() }

    #[tokio::test]
    async fn test_no_stories() {
        let tracker = Arc::new(FakeTracker::default());
        for (input, unticketed) in [(vec![], false), (vec!["fix typo", "bump deps"], true)] {
            let report =
                resolve(&messages(&input), "staging", tracker.clone(), &Default::default()).await;
            assert!(report.no_stories_found);
            assert!(report.tickets.is_empty());
            assert!(report.dependencies.is_empty());
            assert_eq!(report.has_unticketed_commits, unticketed);
            assert!(!report.has_sql_migration);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_keeps_others() {
        init_tracing();
        let tracker = Arc::new(
            FakeTracker::default()
                .with_ticket(1, TicketStatus::Started, vec![commit_activity("api")])
                .with_ticket(3, TicketStatus::Delivered, vec![commit_activity("web")])
                .with_delay(1, Duration::from_millis(300))
                .with_delay(3, Duration::from_millis(100)),
        );
        let input = messages(&["[#1] one", "[#2] two", "[#3] three"]);
        let report = resolve(&input, "staging", tracker, &Default::default()).await;
        assert!(!report.no_stories_found);
        let ids = report.tickets.iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids, [TicketId(1), TicketId(3)]);
        assert_eq!(report.tickets[0].status, TicketStatus::Started);
        assert_eq!(report.tickets[0].dependencies.in_progress, ["api"]);
        assert_eq!(report.tickets[1].url, "https://tracker.test/story/show/3");
        assert_eq!(report.tickets[1].dependencies.in_progress, ["web"]);
        assert_eq!(report.dependencies.all, ["api", "web"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_completion_keeps_extraction_order() {
        let mut tracker = FakeTracker::default();
        for (id, delay) in [(10, 500), (20, 10), (30, 250), (40, 0)] {
            tracker = tracker
                .with_ticket(id, TicketStatus::Finished, vec![])
                .with_delay(id, Duration::from_millis(delay));
        }
        let input = messages(&["[#10]", "[#20]", "[#30] [#10]", "[#40]"]);
        let report = resolve(&input, "qa", Arc::new(tracker), &Default::default()).await;
        let ids = report.tickets.iter().map(|t| t.id.0).collect::<Vec<_>>();
        assert_eq!(ids, [10, 20, 30, 40]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_drops_ticket() {
        let tracker = Arc::new(
            FakeTracker::default()
                .with_ticket(1, TicketStatus::Started, vec![])
                .with_ticket(2, TicketStatus::Started, vec![])
                .with_delay(2, Duration::from_secs(3600)),
        );
        let options = ResolveOptions { fetch_timeout: Duration::from_secs(5), ..Default::default() };
        let report = resolve(&messages(&["[#1]", "[#2]"]), "qa", tracker, &options).await;
        assert_eq!(report.tickets.len(), 1);
        assert_eq!(report.tickets[0].id, TicketId(1));
    }

    #[tokio::test]
    async fn test_activity_failure_keeps_ticket() {
        let tracker = Arc::new(
            FakeTracker::default()
                .with_ticket(7, TicketStatus::Accepted, vec![commit_activity("sql-migrations")])
                .with_failing_activity(7),
        );
        let report = resolve(&messages(&["[#7] migrate"]), "qa", tracker, &Default::default()).await;
        assert_eq!(report.tickets.len(), 1);
        assert_eq!(report.tickets[0].status, TicketStatus::Accepted);
        assert!(report.tickets[0].dependencies.is_empty());
        assert!(!report.has_sql_migration);
    }

    #[tokio::test]
    async fn test_sql_migration_flag() {
        let cases: &[(&str, bool)] = &[("sql-migrations", true), ("sql-migrations-tools", false)];
        for &(repo, expected) in cases {
            let tracker = Arc::new(
                FakeTracker::default()
                    .with_ticket(1, TicketStatus::Started, vec![commit_activity("api")])
                    .with_ticket(2, TicketStatus::Started, vec![commit_activity(repo)]),
            );
            let input = messages(&["[#1]", "[#2]"]);
            let report = resolve(&input, "qa", tracker, &Default::default()).await;
            assert_eq!(report.has_sql_migration, expected, "{repo}");
            assert_eq!(report.is_safe(), !expected);
        }
    }

    #[tokio::test]
    async fn test_custom_migration_repo() {
        let tracker = Arc::new(
            FakeTracker::default()
                .with_ticket(1, TicketStatus::Started, vec![deploy_activity("schema", "qa")]),
        );
        let options = ResolveOptions { migration_repo: "schema".to_string(), ..Default::default() };
        let report = resolve(&messages(&["[#1]"]), "qa", tracker, &options).await;
        assert!(report.has_sql_migration);
        assert_eq!(report.dependencies.deployed, ["schema"]);
    }

    #[tokio::test]
    async fn test_repo_in_several_partitions_across_tickets() {
        let tracker = Arc::new(
            FakeTracker::default()
                .with_ticket(1, TicketStatus::Delivered, vec![deploy_activity("api", "qa")])
                .with_ticket(2, TicketStatus::Started, vec![commit_activity("api")])
                .with_ticket(3, TicketStatus::Started, vec![commit_activity("api")]),
        );
        let input = messages(&["[#1]", "[#2]", "[#3] no link"]);
        let report = resolve(&input, "qa", tracker, &Default::default()).await;
        assert_eq!(report.dependencies.in_progress, ["api"]);
        assert_eq!(report.dependencies.deployed, ["api"]);
        assert_eq!(report.dependencies.all, ["api"]);
        assert!(!report.has_unticketed_commits);
    }

    #[tokio::test]
    async fn test_all_lookups_fail() {
        let tracker = Arc::new(FakeTracker::default());
        let report =
            resolve(&messages(&["[#1]", "untracked"]), "qa", tracker, &Default::default()).await;
        assert!(report.no_stories_found);
        assert!(report.has_unticketed_commits);
    }

    #[test]
    fn test_build_report_unticketed_flag_passthrough() {
        let ticket = TicketReport {
            id: TicketId(1),
            url: String::new(),
            status: TicketStatus::Unknown,
            dependencies: crate::classify::dependencies(
                &[ActivityEntry::commit("https://github.com/acme/api/commit/1")],
                "qa",
            ),
        };
        let report = build_report(vec![ticket], true, "sql-migrations");
        assert!(report.has_unticketed_commits);
        assert!(!report.no_stories_found);
        assert_eq!(report.dependencies.in_progress, ["api"]);
    }
}
