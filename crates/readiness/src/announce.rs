use std::sync::Arc;

use shipcheck_core::{FetchError, models::TicketId, source::TicketSource};
use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description,
};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::aggregate::{ResolveOptions, with_timeout};

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Comment posted to a story once `repo` reaches `environment`.
///
/// Must stay in the shape matched by the deploy row of [`crate::rules::RULES`].
pub fn deploy_message(repo: &str, environment: &str, at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    let timestamp = at.format(TIMESTAMP_FORMAT).unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("Deployed {repo} to {environment}: {timestamp} (UTC)")
}

/// Post a deploy comment to every story in `ids`. Returns how many were posted.
pub async fn announce<S: TicketSource>(
    ids: &[TicketId],
    repo: &str,
    environment: &str,
    at: OffsetDateTime,
    source: Arc<S>,
    options: &ResolveOptions,
) -> usize {
    let message = Arc::new(deploy_message(repo, environment, at));
    let sem = Arc::new(Semaphore::new(options.max_concurrent_fetches.max(1)));
    let mut set = JoinSet::new();
    for id in ids.iter().copied() {
        let sem = sem.clone();
        let source = source.clone();
        let message = message.clone();
        let limit = options.fetch_timeout;
        set.spawn(async move {
            let _permit = sem.acquire().await.ok();
            let result: Result<(), FetchError> = async {
                let ticket = with_timeout(limit, source.fetch_ticket(id)).await?;
                with_timeout(limit, source.post_comment(ticket.project_id, id, &message)).await
            }
            .await;
            (id, result)
        });
    }
    let mut posted = 0;
    while let Some(join_result) = set.join_next().await {
        match join_result {
            Ok((_, Ok(()))) => posted += 1,
            Ok((id, Err(e))) => {
                tracing::error!("Failed to post deploy comment to story {}: {:?}", id, e);
            }
            Err(e) => {
                tracing::error!("Failed to post deploy comment: {:?}", e);
            }
        }
    }
    tracing::info!(
        "Announced {} to {} on {} of {} stories",
        repo,
        environment,
        posted,
        ids.len()
    );
    posted
}
