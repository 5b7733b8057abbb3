use crate::db;
use crate::services::cache;
use crate::state::SharedState;
use anyhow::Result;
use chrono::{Duration, Utc};

/// Re-project recently edited question banks into the cache. This is the
/// reconciliation path for the best-effort cache: an eviction or a missed
/// write heals within the hour.
pub async fn refresh_question_projections(state: &SharedState) -> Result<usize> {
    if !state.cache.is_enabled() {
        return Ok(0);
    }

    let since = Utc::now() - Duration::hours(24);
    let activity_ids = db::activities_with_recent_question_edits(&state.pool, since).await?;

    let mut refreshed = 0usize;
    for activity_id in activity_ids {
        let questions = db::list_questions(&state.pool, activity_id).await?;
        match state
            .cache
            .set_json(&cache::questions_key(activity_id), &questions, cache::DEFAULT_TTL_SECS)
            .await
        {
            Ok(()) => refreshed += 1,
            Err(err) => {
                tracing::warn!("Question projection refresh failed for {}: {}", activity_id, err);
            }
        }
    }

    if refreshed > 0 {
        tracing::info!("Refreshed {} question bank projections", refreshed);
    }
    Ok(refreshed)
}
