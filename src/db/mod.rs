pub mod seed;

use crate::domain::attempts::{AttemptOutcome, MAX_REVIEWED_ATTEMPTS};
use crate::domain::models::{
    ActivityKind, DeliveryStatus, PaymentStatus, QuestionKind, TicketStatus, TranscriptionStatus,
    UserRole,
};
use crate::domain::rollup::WeightedGrade;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub hash: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cover_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct CourseEmbedding {
    pub id: Uuid,
    pub title: String,
    pub embedding: Option<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Materia {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub video_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Parameter {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub weight_pct: i16,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub parameter_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub title: String,
    pub revisada: bool,
    pub weight_pct: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub kind: QuestionKind,
    pub prompt: String,
    pub weight: f64,
    pub answer: serde_json::Value,
    pub position: i32,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Progress {
    pub user_id: Uuid,
    pub activity_id: Uuid,
    pub progress: i16,
    pub is_completed: bool,
    pub final_grade: f64,
    pub attempt_count: i32,
    pub revisada: bool,
    pub last_attempt_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Delivery {
    pub user_id: Uuid,
    pub activity_id: Uuid,
    pub file_key: String,
    pub file_name: String,
    pub mime_type: String,
    pub status: DeliveryStatus,
    pub grade: f64,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct TranscriptionJob {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub status: TranscriptionStatus,
    pub transcript: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub body: String,
    pub status: TicketStatus,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub external_ref: String,
    pub user_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, email, hash, full_name, role, is_active, created_at
        FROM users
        WHERE email = $1
          AND is_active = true
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, email, hash, full_name, role, is_active, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

// ---------------------------------------------------------------------------
// Courses and materias
// ---------------------------------------------------------------------------

pub async fn list_courses(pool: &PgPool) -> Result<Vec<Course>> {
    let courses = sqlx::query_as::<_, Course>(
        "SELECT id, title, description, cover_key, created_at FROM courses ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(courses)
}

pub async fn get_course(pool: &PgPool, id: Uuid) -> Result<Option<Course>> {
    let course = sqlx::query_as::<_, Course>(
        "SELECT id, title, description, cover_key, created_at FROM courses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(course)
}

pub async fn create_course(pool: &PgPool, title: &str, description: Option<&str>) -> Result<Course> {
    let course = sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses (title, description)
        VALUES ($1, $2)
        RETURNING id, title, description, cover_key, created_at
        "#,
    )
    .bind(title)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(course)
}

pub async fn set_course_cover(pool: &PgPool, id: Uuid, cover_key: &str) -> Result<()> {
    sqlx::query("UPDATE courses SET cover_key = $1 WHERE id = $2")
        .bind(cover_key)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_course_embedding(pool: &PgPool, id: Uuid, embedding: &[f64]) -> Result<()> {
    sqlx::query("UPDATE courses SET embedding = $1 WHERE id = $2")
        .bind(embedding)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_course_embeddings(pool: &PgPool) -> Result<Vec<CourseEmbedding>> {
    let rows = sqlx::query_as::<_, CourseEmbedding>(
        "SELECT id, title, embedding FROM courses WHERE embedding IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn create_materia(pool: &PgPool, course_id: Uuid, name: &str) -> Result<Materia> {
    let materia = sqlx::query_as::<_, Materia>(
        r#"
        INSERT INTO materias (course_id, name)
        VALUES ($1, $2)
        RETURNING id, course_id, name
        "#,
    )
    .bind(course_id)
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(materia)
}

pub async fn list_materias(pool: &PgPool, course_id: Uuid) -> Result<Vec<Materia>> {
    let materias = sqlx::query_as::<_, Materia>(
        "SELECT id, course_id, name FROM materias WHERE course_id = $1 ORDER BY name",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;
    Ok(materias)
}

// ---------------------------------------------------------------------------
// Lessons
// ---------------------------------------------------------------------------

pub async fn create_lesson(
    pool: &PgPool,
    course_id: Uuid,
    title: &str,
    video_key: Option<&str>,
) -> Result<Lesson> {
    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons (course_id, title, video_key)
        VALUES ($1, $2, $3)
        RETURNING id, course_id, title, video_key, created_at
        "#,
    )
    .bind(course_id)
    .bind(title)
    .bind(video_key)
    .fetch_one(pool)
    .await?;
    Ok(lesson)
}

pub async fn get_lesson(pool: &PgPool, id: Uuid) -> Result<Option<Lesson>> {
    let lesson = sqlx::query_as::<_, Lesson>(
        "SELECT id, course_id, title, video_key, created_at FROM lessons WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(lesson)
}

pub async fn list_lessons(pool: &PgPool, course_id: Uuid) -> Result<Vec<Lesson>> {
    let lessons = sqlx::query_as::<_, Lesson>(
        "SELECT id, course_id, title, video_key, created_at FROM lessons WHERE course_id = $1 ORDER BY created_at",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;
    Ok(lessons)
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

pub async fn create_parameter(
    pool: &PgPool,
    course_id: Uuid,
    name: &str,
    weight_pct: i16,
) -> Result<Parameter> {
    let parameter = sqlx::query_as::<_, Parameter>(
        r#"
        INSERT INTO parameters (course_id, name, weight_pct)
        VALUES ($1, $2, $3)
        RETURNING id, course_id, name, weight_pct
        "#,
    )
    .bind(course_id)
    .bind(name)
    .bind(weight_pct)
    .fetch_one(pool)
    .await?;
    Ok(parameter)
}

pub async fn get_parameter(pool: &PgPool, id: Uuid) -> Result<Option<Parameter>> {
    let parameter = sqlx::query_as::<_, Parameter>(
        "SELECT id, course_id, name, weight_pct FROM parameters WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(parameter)
}

pub async fn list_parameters(pool: &PgPool, course_id: Uuid) -> Result<Vec<Parameter>> {
    let parameters = sqlx::query_as::<_, Parameter>(
        "SELECT id, course_id, name, weight_pct FROM parameters WHERE course_id = $1 ORDER BY name",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;
    Ok(parameters)
}

pub async fn update_parameter_weight(pool: &PgPool, id: Uuid, weight_pct: i16) -> Result<()> {
    sqlx::query("UPDATE parameters SET weight_pct = $1 WHERE id = $2")
        .bind(weight_pct)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

/// Result of an activity write that is subject to the per-parameter weight
/// budget (activity weights under one parameter must not exceed 100).
#[derive(Debug)]
pub enum ActivityWrite {
    Done(Activity),
    WeightExceeded { occupied: i64, requested: i16 },
}

pub struct NewActivity<'a> {
    pub lesson_id: Uuid,
    pub parameter_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub title: &'a str,
    pub revisada: bool,
    pub weight_pct: i16,
}

/// Insert an activity. When it belongs to a parameter, the parameter row is
/// locked for the duration of the transaction so two concurrent writers cannot
/// both pass the sum check and overshoot 100.
pub async fn create_activity(pool: &PgPool, new: NewActivity<'_>) -> Result<ActivityWrite> {
    let mut tx = pool.begin().await?;

    if let Some(parameter_id) = new.parameter_id {
        sqlx::query("SELECT id FROM parameters WHERE id = $1 FOR UPDATE")
            .bind(parameter_id)
            .fetch_one(&mut *tx)
            .await?;

        let occupied: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(weight_pct), 0) FROM activities WHERE parameter_id = $1",
        )
        .bind(parameter_id)
        .fetch_one(&mut *tx)
        .await?;

        if occupied + new.weight_pct as i64 > 100 {
            tx.rollback().await?;
            return Ok(ActivityWrite::WeightExceeded { occupied, requested: new.weight_pct });
        }
    }

    let activity = sqlx::query_as::<_, Activity>(
        r#"
        INSERT INTO activities (lesson_id, parameter_id, kind, title, revisada, weight_pct)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, lesson_id, parameter_id, kind, title, revisada, weight_pct, created_at
        "#,
    )
    .bind(new.lesson_id)
    .bind(new.parameter_id)
    .bind(new.kind)
    .bind(new.title)
    .bind(new.revisada)
    .bind(new.weight_pct)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ActivityWrite::Done(activity))
}

/// Update the gradable attributes of an activity under the same weight budget
/// lock as `create_activity`.
pub async fn update_activity(
    pool: &PgPool,
    id: Uuid,
    title: &str,
    revisada: bool,
    weight_pct: i16,
) -> Result<ActivityWrite> {
    let mut tx = pool.begin().await?;

    let parameter_id: Option<Uuid> =
        sqlx::query_scalar("SELECT parameter_id FROM activities WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    if let Some(parameter_id) = parameter_id {
        sqlx::query("SELECT id FROM parameters WHERE id = $1 FOR UPDATE")
            .bind(parameter_id)
            .fetch_one(&mut *tx)
            .await?;

        let occupied: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(weight_pct), 0) FROM activities WHERE parameter_id = $1 AND id <> $2",
        )
        .bind(parameter_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if occupied + weight_pct as i64 > 100 {
            tx.rollback().await?;
            return Ok(ActivityWrite::WeightExceeded { occupied, requested: weight_pct });
        }
    }

    let activity = sqlx::query_as::<_, Activity>(
        r#"
        UPDATE activities
        SET title = $1, revisada = $2, weight_pct = $3
        WHERE id = $4
        RETURNING id, lesson_id, parameter_id, kind, title, revisada, weight_pct, created_at
        "#,
    )
    .bind(title)
    .bind(revisada)
    .bind(weight_pct)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ActivityWrite::Done(activity))
}

pub async fn get_activity(pool: &PgPool, id: Uuid) -> Result<Option<Activity>> {
    let activity = sqlx::query_as::<_, Activity>(
        r#"
        SELECT id, lesson_id, parameter_id, kind, title, revisada, weight_pct, created_at
        FROM activities
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(activity)
}

pub async fn list_activities_for_lesson(pool: &PgPool, lesson_id: Uuid) -> Result<Vec<Activity>> {
    let activities = sqlx::query_as::<_, Activity>(
        r#"
        SELECT id, lesson_id, parameter_id, kind, title, revisada, weight_pct, created_at
        FROM activities
        WHERE lesson_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(lesson_id)
    .fetch_all(pool)
    .await?;
    Ok(activities)
}

/// Course an activity rolls up into, via its lesson.
pub async fn course_of_activity(pool: &PgPool, activity_id: Uuid) -> Result<Option<Uuid>> {
    let course_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT l.course_id
        FROM activities a
        JOIN lessons l ON l.id = a.lesson_id
        WHERE a.id = $1
        "#,
    )
    .bind(activity_id)
    .fetch_optional(pool)
    .await?;
    Ok(course_id)
}

// ---------------------------------------------------------------------------
// Questions (durable; the cache holds only a projection)
// ---------------------------------------------------------------------------

pub struct NewQuestion<'a> {
    pub kind: QuestionKind,
    pub prompt: &'a str,
    pub weight: f64,
    pub answer: &'a serde_json::Value,
}

/// Replace the full question bank of an activity in one transaction.
pub async fn replace_questions(
    pool: &PgPool,
    activity_id: Uuid,
    questions: &[NewQuestion<'_>],
) -> Result<Vec<Question>> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM questions WHERE activity_id = $1")
        .bind(activity_id)
        .execute(&mut *tx)
        .await?;

    let mut inserted = Vec::with_capacity(questions.len());
    for (position, question) in questions.iter().enumerate() {
        let row = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (activity_id, kind, prompt, weight, answer, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, activity_id, kind, prompt, weight, answer, position
            "#,
        )
        .bind(activity_id)
        .bind(question.kind)
        .bind(question.prompt)
        .bind(question.weight)
        .bind(question.answer)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await?;
        inserted.push(row);
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn list_questions(pool: &PgPool, activity_id: Uuid) -> Result<Vec<Question>> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, activity_id, kind, prompt, weight, answer, position
        FROM questions
        WHERE activity_id = $1
        ORDER BY position
        "#,
    )
    .bind(activity_id)
    .fetch_all(pool)
    .await?;
    Ok(questions)
}

/// Activities whose question bank changed recently; used by the cache backfill
/// job to refresh projections.
pub async fn activities_with_recent_question_edits(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<Uuid>> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT DISTINCT activity_id FROM questions WHERE updated_at >= $1",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Attempts and progress
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct AttemptRow {
    attempt_count: i32,
    final_grade: f64,
}

/// Record one attempt atomically. The conditional upsert is the enforcement
/// point for the revisada cap: when the guard fails, no row changes and the
/// caller gets `Exhausted` with the grade already on file. There is no
/// check-then-act window for concurrent submissions to slip through.
pub async fn record_attempt(
    pool: &PgPool,
    user_id: Uuid,
    activity_id: Uuid,
    score: f64,
    revisada: bool,
) -> Result<AttemptOutcome> {
    let updated = sqlx::query_as::<_, AttemptRow>(
        r#"
        INSERT INTO user_activity_progress
            (user_id, activity_id, progress, is_completed, final_grade, attempt_count, revisada, last_attempt_at)
        VALUES ($1, $2, 100, TRUE, $3, 1, $4, now())
        ON CONFLICT (user_id, activity_id) DO UPDATE SET
            progress = 100,
            is_completed = TRUE,
            final_grade = EXCLUDED.final_grade,
            attempt_count = user_activity_progress.attempt_count + 1,
            revisada = EXCLUDED.revisada,
            last_attempt_at = now()
        WHERE NOT EXCLUDED.revisada
           OR user_activity_progress.attempt_count < $5
        RETURNING attempt_count, final_grade
        "#,
    )
    .bind(user_id)
    .bind(activity_id)
    .bind(score)
    .bind(revisada)
    .bind(MAX_REVIEWED_ATTEMPTS)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = updated {
        return Ok(AttemptOutcome::Recorded {
            attempt_count: row.attempt_count,
            final_grade: row.final_grade,
        });
    }

    // Guard rejected the write; report the stored state for the locked view.
    let current = sqlx::query_as::<_, AttemptRow>(
        "SELECT attempt_count, final_grade FROM user_activity_progress WHERE user_id = $1 AND activity_id = $2",
    )
    .bind(user_id)
    .bind(activity_id)
    .fetch_one(pool)
    .await?;

    Ok(AttemptOutcome::Exhausted {
        attempt_count: current.attempt_count,
        final_grade: current.final_grade,
    })
}

pub async fn get_progress(
    pool: &PgPool,
    user_id: Uuid,
    activity_id: Uuid,
) -> Result<Option<Progress>> {
    let progress = sqlx::query_as::<_, Progress>(
        r#"
        SELECT user_id, activity_id, progress, is_completed, final_grade, attempt_count, revisada, last_attempt_at
        FROM user_activity_progress
        WHERE user_id = $1 AND activity_id = $2
        "#,
    )
    .bind(user_id)
    .bind(activity_id)
    .fetch_optional(pool)
    .await?;
    Ok(progress)
}

// ---------------------------------------------------------------------------
// Deliveries (file-upload submissions)
// ---------------------------------------------------------------------------

/// Register (or re-register) a file delivery. A re-upload deliberately restarts
/// the review cycle: grade back to 0, status to pending, feedback cleared.
pub async fn upsert_delivery(
    pool: &PgPool,
    user_id: Uuid,
    activity_id: Uuid,
    file_key: &str,
    file_name: &str,
    mime_type: &str,
) -> Result<Delivery> {
    let delivery = sqlx::query_as::<_, Delivery>(
        r#"
        INSERT INTO deliveries (user_id, activity_id, file_key, file_name, mime_type)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, activity_id) DO UPDATE SET
            file_key = EXCLUDED.file_key,
            file_name = EXCLUDED.file_name,
            mime_type = EXCLUDED.mime_type,
            status = 'PENDING',
            grade = 0,
            feedback = NULL,
            submitted_at = now()
        RETURNING user_id, activity_id, file_key, file_name, mime_type, status, grade, feedback, submitted_at
        "#,
    )
    .bind(user_id)
    .bind(activity_id)
    .bind(file_key)
    .bind(file_name)
    .bind(mime_type)
    .fetch_one(pool)
    .await?;
    Ok(delivery)
}

pub async fn get_delivery(
    pool: &PgPool,
    user_id: Uuid,
    activity_id: Uuid,
) -> Result<Option<Delivery>> {
    let delivery = sqlx::query_as::<_, Delivery>(
        r#"
        SELECT user_id, activity_id, file_key, file_name, mime_type, status, grade, feedback, submitted_at
        FROM deliveries
        WHERE user_id = $1 AND activity_id = $2
        "#,
    )
    .bind(user_id)
    .bind(activity_id)
    .fetch_optional(pool)
    .await?;
    Ok(delivery)
}

pub async fn list_pending_deliveries(pool: &PgPool, activity_id: Uuid) -> Result<Vec<Delivery>> {
    let deliveries = sqlx::query_as::<_, Delivery>(
        r#"
        SELECT user_id, activity_id, file_key, file_name, mime_type, status, grade, feedback, submitted_at
        FROM deliveries
        WHERE activity_id = $1 AND status = 'PENDING'
        ORDER BY submitted_at
        "#,
    )
    .bind(activity_id)
    .fetch_all(pool)
    .await?;
    Ok(deliveries)
}

pub async fn review_delivery(
    pool: &PgPool,
    user_id: Uuid,
    activity_id: Uuid,
    grade: f64,
    feedback: Option<&str>,
) -> Result<Option<Delivery>> {
    let delivery = sqlx::query_as::<_, Delivery>(
        r#"
        UPDATE deliveries
        SET status = 'REVIEWED', grade = $1, feedback = $2
        WHERE user_id = $3 AND activity_id = $4
        RETURNING user_id, activity_id, file_key, file_name, mime_type, status, grade, feedback, submitted_at
        "#,
    )
    .bind(grade)
    .bind(feedback)
    .bind(user_id)
    .bind(activity_id)
    .fetch_optional(pool)
    .await?;
    Ok(delivery)
}

// ---------------------------------------------------------------------------
// Grade rollup reads and writes
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
pub struct ActivityGradeRow {
    pub weight_pct: i16,
    pub final_grade: Option<f64>,
}

/// Per-activity (grade, weight) pairs for one parameter and user. Activities
/// without a progress row come back with a NULL grade and count as 0, which
/// keeps missing work in the weight sum.
pub async fn activity_grades_for_parameter(
    pool: &PgPool,
    parameter_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<WeightedGrade>> {
    let rows = sqlx::query_as::<_, ActivityGradeRow>(
        r#"
        SELECT a.weight_pct,
               CASE
                   WHEN a.kind = 'FILE_UPLOAD' THEN d.grade
                   ELSE p.final_grade
               END AS final_grade
        FROM activities a
        LEFT JOIN user_activity_progress p
            ON p.activity_id = a.id AND p.user_id = $2
        LEFT JOIN deliveries d
            ON d.activity_id = a.id AND d.user_id = $2 AND d.status = 'REVIEWED'
        WHERE a.parameter_id = $1
        "#,
    )
    .bind(parameter_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| WeightedGrade {
            grade: row.final_grade.unwrap_or(0.0),
            weight_pct: row.weight_pct as f64,
        })
        .collect())
}

pub async fn upsert_parameter_grade(
    pool: &PgPool,
    parameter_id: Uuid,
    user_id: Uuid,
    grade: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO parameter_grades (parameter_id, user_id, grade, updated_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (parameter_id, user_id) DO UPDATE SET
            grade = EXCLUDED.grade,
            updated_at = now()
        "#,
    )
    .bind(parameter_id)
    .bind(user_id)
    .bind(grade)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_materia_grade(
    pool: &PgPool,
    materia_id: Uuid,
    user_id: Uuid,
    grade: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO materia_grades (materia_id, user_id, grade, updated_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (materia_id, user_id) DO UPDATE SET
            grade = EXCLUDED.grade,
            updated_at = now()
        "#,
    )
    .bind(materia_id)
    .bind(user_id)
    .bind(grade)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Transcription jobs
// ---------------------------------------------------------------------------

pub async fn create_transcription_job(pool: &PgPool, lesson_id: Uuid) -> Result<TranscriptionJob> {
    let job = sqlx::query_as::<_, TranscriptionJob>(
        r#"
        INSERT INTO transcription_jobs (lesson_id)
        VALUES ($1)
        RETURNING id, lesson_id, status, transcript, error, created_at, updated_at
        "#,
    )
    .bind(lesson_id)
    .fetch_one(pool)
    .await?;
    Ok(job)
}

pub async fn mark_transcription_running(pool: &PgPool, job_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE transcription_jobs SET status = 'RUNNING', updated_at = now() WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_transcription_done(pool: &PgPool, job_id: Uuid, transcript: &str) -> Result<()> {
    sqlx::query(
        "UPDATE transcription_jobs SET status = 'DONE', transcript = $1, updated_at = now() WHERE id = $2",
    )
    .bind(transcript)
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_transcription_failed(pool: &PgPool, job_id: Uuid, error: &str) -> Result<()> {
    sqlx::query(
        "UPDATE transcription_jobs SET status = 'FAILED', error = $1, updated_at = now() WHERE id = $2",
    )
    .bind(error)
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn latest_transcription_job(
    pool: &PgPool,
    lesson_id: Uuid,
) -> Result<Option<TranscriptionJob>> {
    let job = sqlx::query_as::<_, TranscriptionJob>(
        r#"
        SELECT id, lesson_id, status, transcript, error, created_at, updated_at
        FROM transcription_jobs
        WHERE lesson_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(lesson_id)
    .fetch_optional(pool)
    .await?;
    Ok(job)
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

pub async fn create_ticket(
    pool: &PgPool,
    user_id: Uuid,
    subject: &str,
    body: &str,
) -> Result<Ticket> {
    let ticket = sqlx::query_as::<_, Ticket>(
        r#"
        INSERT INTO tickets (user_id, subject, body)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, subject, body, status, assignee_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(subject)
    .bind(body)
    .fetch_one(pool)
    .await?;
    Ok(ticket)
}

pub async fn get_ticket(pool: &PgPool, id: Uuid) -> Result<Option<Ticket>> {
    let ticket = sqlx::query_as::<_, Ticket>(
        "SELECT id, user_id, subject, body, status, assignee_id, created_at FROM tickets WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(ticket)
}

pub async fn assign_ticket(pool: &PgPool, id: Uuid, assignee_id: Uuid) -> Result<Option<Ticket>> {
    let ticket = sqlx::query_as::<_, Ticket>(
        r#"
        UPDATE tickets
        SET assignee_id = $1, status = 'ASSIGNED'
        WHERE id = $2
        RETURNING id, user_id, subject, body, status, assignee_id, created_at
        "#,
    )
    .bind(assignee_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(ticket)
}

pub async fn close_ticket(pool: &PgPool, id: Uuid) -> Result<Option<Ticket>> {
    let ticket = sqlx::query_as::<_, Ticket>(
        r#"
        UPDATE tickets
        SET status = 'CLOSED'
        WHERE id = $1
        RETURNING id, user_id, subject, body, status, assignee_id, created_at
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(ticket)
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

pub async fn upsert_payment(
    pool: &PgPool,
    external_ref: &str,
    user_id: Option<Uuid>,
    course_id: Option<Uuid>,
    amount_cents: i64,
    currency: &str,
    status: PaymentStatus,
) -> Result<Payment> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (external_ref, user_id, course_id, amount_cents, currency, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (external_ref) DO UPDATE SET
            status = EXCLUDED.status,
            amount_cents = EXCLUDED.amount_cents,
            user_id = COALESCE(payments.user_id, EXCLUDED.user_id),
            course_id = COALESCE(payments.course_id, EXCLUDED.course_id),
            updated_at = now()
        RETURNING id, external_ref, user_id, course_id, amount_cents, currency, status, created_at, updated_at
        "#,
    )
    .bind(external_ref)
    .bind(user_id)
    .bind(course_id)
    .bind(amount_cents)
    .bind(currency)
    .bind(status)
    .fetch_one(pool)
    .await?;
    Ok(payment)
}

pub async fn get_payment_by_ref(pool: &PgPool, external_ref: &str) -> Result<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, external_ref, user_id, course_id, amount_cents, currency, status, created_at, updated_at
        FROM payments
        WHERE external_ref = $1
        "#,
    )
    .bind(external_ref)
    .fetch_optional(pool)
    .await?;
    Ok(payment)
}

// These run against a throwaway database (sqlx::test applies ./migrations);
// they cover the invariants that live in SQL rather than in Rust.
#[cfg(test)]
mod tests {
    use super::*;

    async fn fixture_activity(pool: &PgPool, revisada: bool, kind: ActivityKind) -> (Uuid, Uuid) {
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, hash, full_name, role) VALUES ($1, 'x', 'Student', 'STUDENT') RETURNING id",
        )
        .bind(format!("student-{}@test.local", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();

        let course_id: Uuid =
            sqlx::query_scalar("INSERT INTO courses (title) VALUES ('Course') RETURNING id")
                .fetch_one(pool)
                .await
                .unwrap();
        let lesson_id: Uuid = sqlx::query_scalar(
            "INSERT INTO lessons (course_id, title) VALUES ($1, 'Lesson') RETURNING id",
        )
        .bind(course_id)
        .fetch_one(pool)
        .await
        .unwrap();
        let activity_id: Uuid = sqlx::query_scalar(
            "INSERT INTO activities (lesson_id, kind, title, revisada, weight_pct) VALUES ($1, $2, 'Activity', $3, 100) RETURNING id",
        )
        .bind(lesson_id)
        .bind(kind)
        .bind(revisada)
        .fetch_one(pool)
        .await
        .unwrap();

        (user_id, activity_id)
    }

    #[sqlx::test]
    async fn reviewed_attempts_stop_at_three(pool: PgPool) {
        let (user_id, activity_id) =
            fixture_activity(&pool, true, ActivityKind::MultipleChoice).await;

        for k in 1..=3 {
            let outcome = record_attempt(&pool, user_id, activity_id, k as f64, true)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                AttemptOutcome::Recorded { attempt_count: k, final_grade: k as f64 }
            );
        }

        // Fourth submission is rejected and the third grade stays on file.
        let outcome = record_attempt(&pool, user_id, activity_id, 5.0, true)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AttemptOutcome::Exhausted { attempt_count: 3, final_grade: 3.0 }
        );

        let progress = get_progress(&pool, user_id, activity_id).await.unwrap().unwrap();
        assert_eq!(progress.attempt_count, 3);
        assert_eq!(progress.final_grade, 3.0);
    }

    #[sqlx::test]
    async fn unreviewed_attempts_are_unbounded(pool: PgPool) {
        let (user_id, activity_id) =
            fixture_activity(&pool, false, ActivityKind::TrueFalse).await;

        for k in 1..=5 {
            let outcome = record_attempt(&pool, user_id, activity_id, 2.0, false)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                AttemptOutcome::Recorded { attempt_count: k, final_grade: 2.0 }
            );
        }
    }

    #[sqlx::test]
    async fn reupload_restarts_the_review_cycle(pool: PgPool) {
        let (user_id, activity_id) =
            fixture_activity(&pool, false, ActivityKind::FileUpload).await;

        upsert_delivery(&pool, user_id, activity_id, "k1", "v1.pdf", "application/pdf")
            .await
            .unwrap();
        let reviewed = review_delivery(&pool, user_id, activity_id, 4.0, Some("good"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reviewed.status, DeliveryStatus::Reviewed);
        assert_eq!(reviewed.grade, 4.0);

        let reuploaded =
            upsert_delivery(&pool, user_id, activity_id, "k2", "v2.pdf", "application/pdf")
                .await
                .unwrap();
        assert_eq!(reuploaded.status, DeliveryStatus::Pending);
        assert_eq!(reuploaded.grade, 0.0);
        assert_eq!(reuploaded.feedback, None);
        assert_eq!(reuploaded.file_key, "k2");
    }

    #[sqlx::test]
    async fn webhook_backfills_payment_linkage(pool: PgPool) {
        let (user_id, _) = fixture_activity(&pool, false, ActivityKind::MultipleChoice).await;

        // Reporting lookup lands first, without knowing whose payment it is.
        let first = upsert_payment(&pool, "pm_42", None, None, 4900, "USD", PaymentStatus::Pending)
            .await
            .unwrap();
        assert_eq!(first.user_id, None);

        let second = upsert_payment(
            &pool,
            "pm_42",
            Some(user_id),
            None,
            4900,
            "USD",
            PaymentStatus::Approved,
        )
        .await
        .unwrap();
        assert_eq!(second.user_id, Some(user_id));
        assert_eq!(second.status, PaymentStatus::Approved);
        assert_eq!(second.id, first.id);
    }
}
