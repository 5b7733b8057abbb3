use crate::db;
use crate::services::cache;
use crate::state::SharedState;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

/// Hard ceiling on one transcription, covering retries inside the client.
const JOB_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Presigned GET lifetime handed to the transcription service; must outlive
/// the job timeout.
const SOURCE_URL_TTL: Duration = Duration::from_secs(25 * 60);

/// Run one transcription in the background. The caller has already inserted
/// the job row; the HTTP response returns immediately with the job id while
/// this task moves the row through running -> done|failed. Results are also
/// projected into the cache for the lesson player.
pub fn spawn(state: SharedState, job_id: Uuid, lesson_id: Uuid, video_key: String) {
    tokio::spawn(async move {
        if let Err(err) = db::mark_transcription_running(&state.pool, job_id).await {
            tracing::error!("Failed to mark transcription job {} running: {}", job_id, err);
            return;
        }

        let source_url = state.storage.presign_get(&video_key, SOURCE_URL_TTL);

        let outcome = timeout(JOB_TIMEOUT, state.transcriber.transcribe(&source_url)).await;
        match outcome {
            Ok(Ok(transcript)) => {
                if let Err(err) = db::mark_transcription_done(&state.pool, job_id, &transcript).await {
                    tracing::error!("Failed to store transcript for job {}: {}", job_id, err);
                    return;
                }
                if let Err(err) = state
                    .cache
                    .set_json(
                        &cache::transcription_key(lesson_id),
                        &serde_json::json!({ "lessonId": lesson_id, "text": transcript }),
                        cache::DEFAULT_TTL_SECS,
                    )
                    .await
                {
                    tracing::warn!("Cache write for transcription {} failed: {}", lesson_id, err);
                }
                tracing::info!("Transcription job {} for lesson {} done", job_id, lesson_id);
            }
            Ok(Err(err)) => {
                tracing::error!("Transcription job {} failed: {}", job_id, err);
                if let Err(db_err) =
                    db::mark_transcription_failed(&state.pool, job_id, &err.to_string()).await
                {
                    tracing::error!("Failed to mark job {} failed: {}", job_id, db_err);
                }
            }
            Err(_) => {
                tracing::error!("Transcription job {} timed out", job_id);
                if let Err(db_err) =
                    db::mark_transcription_failed(&state.pool, job_id, "timed out").await
                {
                    tracing::error!("Failed to mark job {} failed: {}", job_id, db_err);
                }
            }
        }
    });
}
