use crate::db;
use crate::domain::rollup::{course_final_grade, parameter_grade, WeightedGrade};
use crate::state::SharedState;
use anyhow::Result;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// One queued recomputation: re-derive every parameter grade and the course
/// final grade for this user. Requests are idempotent, so processing the same
/// pair twice is harmless.
#[derive(Debug, Clone, Copy)]
pub struct RollupRequest {
    pub user_id: Uuid,
    pub course_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterGradeEntry {
    pub parameter_id: Uuid,
    pub name: String,
    pub weight_pct: i16,
    pub grade: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MateriaGradeEntry {
    pub materia_id: Uuid,
    pub name: String,
    pub grade: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRollup {
    pub course_id: Uuid,
    pub parameter_grades: Vec<ParameterGradeEntry>,
    pub final_grade: f64,
    pub materias: Vec<MateriaGradeEntry>,
}

/// Drain the rollup queue for the lifetime of the process. Failures are logged
/// and dropped; the next grade write for the same course re-queues the pair.
pub fn spawn_worker(state: SharedState, mut rx: UnboundedReceiver<RollupRequest>) {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            match recompute_course(&state.pool, request.user_id, request.course_id).await {
                Ok(rollup) => {
                    tracing::debug!(
                        "Rolled up course {} for user {}: final grade {}",
                        request.course_id,
                        request.user_id,
                        rollup.final_grade
                    );
                }
                Err(err) => {
                    tracing::error!(
                        "Rollup failed for user {} course {}: {}",
                        request.user_id,
                        request.course_id,
                        err
                    );
                }
            }
        }
        tracing::info!("Rollup queue closed, worker exiting");
    });
}

/// Full top-down recomputation: activity grades feed parameter grades, which
/// feed the course final grade, which is written to every materia of the
/// course. Safe to call from the queue worker or inline from a read path.
pub async fn recompute_course(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<CourseRollup> {
    let parameters = db::list_parameters(pool, course_id).await?;

    let mut entries = Vec::with_capacity(parameters.len());
    let mut weighted = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        let activities = db::activity_grades_for_parameter(pool, parameter.id, user_id).await?;
        let grade = parameter_grade(&activities);
        db::upsert_parameter_grade(pool, parameter.id, user_id, grade).await?;

        weighted.push(WeightedGrade { grade, weight_pct: parameter.weight_pct as f64 });
        entries.push(ParameterGradeEntry {
            parameter_id: parameter.id,
            name: parameter.name,
            weight_pct: parameter.weight_pct,
            grade,
        });
    }

    let final_grade = course_final_grade(&weighted);

    // Every materia of the course carries the same course-level final grade.
    let materias = db::list_materias(pool, course_id).await?;
    let mut materia_entries = Vec::with_capacity(materias.len());
    for materia in materias {
        db::upsert_materia_grade(pool, materia.id, user_id, final_grade).await?;
        materia_entries.push(MateriaGradeEntry {
            materia_id: materia.id,
            name: materia.name,
            grade: final_grade,
        });
    }

    Ok(CourseRollup {
        course_id,
        parameter_grades: entries,
        final_grade,
        materias: materia_entries,
    })
}
