//! Session persistence. Every query is scoped by `team_id` — a session is
//! only ever touched by its own team's requests. The one-active-session
//! invariant and the finalize dual-write both lean on Postgres rather than
//! application-level checks: a partial unique index makes creation atomic,
//! and finalize runs the session flip and the team denormalization in a
//! single transaction.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use teaminsight_core::scoring::StatusColor;
use teaminsight_core::session::{ReflectionSession, SessionStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::reflection::{RECENT_SUMMARIES_DAYS, RECENT_SUMMARIES_LIMIT};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    team_id: String,
    session_id: Uuid,
    status: String,
    turn_count: i32,
    clarify_count: i32,
    messages: serde_json::Value,
    answers: serde_json::Value,
    running_summary: String,
    profile_key: String,
    weekly_instructions_snapshot: Option<String>,
    evaluation: Option<serde_json::Value>,
    final_score: Option<i32>,
    final_color: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(raw: &str) -> Result<SessionStatus, AppError> {
    match raw {
        "in_progress" => Ok(SessionStatus::InProgress),
        "ready_to_submit" => Ok(SessionStatus::ReadyToSubmit),
        "submitted" => Ok(SessionStatus::Submitted),
        other => Err(AppError::Internal(format!(
            "Unknown session status in database: {other}"
        ))),
    }
}

fn parse_color(raw: &str) -> Result<StatusColor, AppError> {
    match raw {
        "green" => Ok(StatusColor::Green),
        "yellow" => Ok(StatusColor::Yellow),
        "red" => Ok(StatusColor::Red),
        other => Err(AppError::Internal(format!(
            "Unknown status color in database: {other}"
        ))),
    }
}

impl SessionRow {
    fn into_session(self) -> Result<ReflectionSession, AppError> {
        let status = parse_status(&self.status)?;
        let final_color = self
            .final_color
            .as_deref()
            .map(parse_color)
            .transpose()?;
        let evaluation = self
            .evaluation
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| AppError::Internal(format!("Corrupt evaluation document: {e}")))?;

        Ok(ReflectionSession {
            id: self.id,
            team_id: self.team_id,
            session_id: self.session_id,
            status,
            turn_count: self.turn_count,
            clarify_count: self.clarify_count,
            messages: serde_json::from_value(self.messages)
                .map_err(|e| AppError::Internal(format!("Corrupt transcript document: {e}")))?,
            answers: serde_json::from_value(self.answers)
                .map_err(|e| AppError::Internal(format!("Corrupt answers document: {e}")))?,
            running_summary: self.running_summary,
            profile_key: self.profile_key,
            weekly_instructions_snapshot: self.weekly_instructions_snapshot,
            evaluation,
            final_score: self.final_score,
            final_color,
            submitted_at: self.submitted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SESSION_COLUMNS: &str = "id, team_id, session_id, status, turn_count, clarify_count, \
     messages, answers, running_summary, profile_key, weekly_instructions_snapshot, \
     evaluation, final_score, final_color, submitted_at, created_at, updated_at";

/// The unique session in a non-terminal status for this team, if any.
pub async fn find_active_session(
    pool: &PgPool,
    team_id: &str,
) -> Result<Option<ReflectionSession>, AppError> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM reflection_sessions
         WHERE team_id = $1 AND status IN ('in_progress', 'ready_to_submit')"
    ))
    .bind(team_id)
    .fetch_optional(pool)
    .await?;

    row.map(SessionRow::into_session).transpose()
}

/// Insert a fresh session. The partial unique index rejects a second
/// non-terminal session for the team, so two concurrent starts cannot both
/// succeed — the loser sees a Conflict and should re-read the active one.
pub async fn create_session(pool: &PgPool, session: &ReflectionSession) -> Result<(), AppError> {
    let result = sqlx::query(
        "INSERT INTO reflection_sessions
           (id, team_id, session_id, status, turn_count, clarify_count,
            messages, answers, running_summary, profile_key,
            weekly_instructions_snapshot, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(session.id)
    .bind(&session.team_id)
    .bind(session.session_id)
    .bind(session.status.as_str())
    .bind(session.turn_count)
    .bind(session.clarify_count)
    .bind(serde_json::to_value(&session.messages).unwrap_or_default())
    .bind(serde_json::to_value(&session.answers).unwrap_or_default())
    .bind(&session.running_summary)
    .bind(&session.profile_key)
    .bind(&session.weekly_instructions_snapshot)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            Err(AppError::Conflict {
                message: "An active reflection session already exists for this team".to_string(),
                docs_hint: Some("Call /start again to resume it.".to_string()),
            })
        }
        Err(err) => Err(AppError::Database(err)),
    }
}

/// Persist one turn's worth of mutations in a single UPDATE.
pub async fn save_progress(pool: &PgPool, session: &ReflectionSession) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE reflection_sessions
         SET status = $3, turn_count = $4, clarify_count = $5, messages = $6,
             answers = $7, running_summary = $8, profile_key = $9,
             weekly_instructions_snapshot = $10, updated_at = now()
         WHERE team_id = $1 AND id = $2",
    )
    .bind(&session.team_id)
    .bind(session.id)
    .bind(session.status.as_str())
    .bind(session.turn_count)
    .bind(session.clarify_count)
    .bind(serde_json::to_value(&session.messages).unwrap_or_default())
    .bind(serde_json::to_value(&session.answers).unwrap_or_default())
    .bind(&session.running_summary)
    .bind(&session.profile_key)
    .bind(&session.weekly_instructions_snapshot)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource: "Reflection session".to_string(),
        });
    }
    Ok(())
}

/// Summaries of recently submitted sessions, newest first. Feeds the
/// analyst's cross-session continuity.
pub async fn recent_summaries(pool: &PgPool, team_id: &str) -> Result<Vec<String>, AppError> {
    let cutoff = Utc::now() - Duration::days(RECENT_SUMMARIES_DAYS);
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT running_summary FROM reflection_sessions
         WHERE team_id = $1 AND status = 'submitted' AND submitted_at >= $2
         ORDER BY submitted_at DESC
         LIMIT $3",
    )
    .bind(team_id)
    .bind(cutoff)
    .bind(RECENT_SUMMARIES_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(summary,)| summary)
        .filter(|summary| !summary.trim().is_empty())
        .collect())
}

/// Reset: drop the team's non-terminal sessions. Submitted sessions are
/// historical records and are never touched. Idempotent.
pub async fn delete_non_terminal(pool: &PgPool, team_id: &str) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM reflection_sessions
         WHERE team_id = $1 AND status IN ('in_progress', 'ready_to_submit')",
    )
    .bind(team_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Commit a submission: the session's terminal state and the team's
/// denormalized aggregate in one transaction, so a crash cannot leave the
/// dashboard stale while the session already reads `submitted`.
pub async fn finalize(pool: &PgPool, session: &ReflectionSession) -> Result<(), AppError> {
    let evaluation = session.evaluation.as_ref().ok_or_else(|| {
        AppError::Internal("finalize called without an evaluation on the session".to_string())
    })?;
    let color = session.final_color.ok_or_else(|| {
        AppError::Internal("finalize called without a final color on the session".to_string())
    })?;

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE reflection_sessions
         SET status = $3, running_summary = $4, evaluation = $5, final_score = $6,
             final_color = $7, submitted_at = $8, updated_at = now()
         WHERE team_id = $1 AND id = $2 AND status = 'ready_to_submit'",
    )
    .bind(&session.team_id)
    .bind(session.id)
    .bind(session.status.as_str())
    .bind(&session.running_summary)
    .bind(serde_json::to_value(evaluation).unwrap_or_default())
    .bind(session.final_score)
    .bind(color.as_str())
    .bind(session.submitted_at)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict {
            message: "Nothing to confirm".to_string(),
            docs_hint: None,
        });
    }

    sqlx::query(
        "INSERT INTO teams (team_id, status, final_score, health_score, tuckman_stage,
                            risk_level, anomaly_flags, reflection_updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, now())
         ON CONFLICT (team_id) DO UPDATE
         SET status = EXCLUDED.status,
             final_score = EXCLUDED.final_score,
             health_score = EXCLUDED.health_score,
             tuckman_stage = EXCLUDED.tuckman_stage,
             risk_level = EXCLUDED.risk_level,
             anomaly_flags = EXCLUDED.anomaly_flags,
             reflection_updated_at = EXCLUDED.reflection_updated_at",
    )
    .bind(&session.team_id)
    .bind(color.as_str())
    .bind(session.final_score)
    .bind(evaluation.health_score)
    .bind(
        serde_json::to_value(evaluation.tuckman_stage)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string)),
    )
    .bind(evaluation.risk_level)
    .bind(serde_json::to_value(&evaluation.anomaly_flags).unwrap_or_default())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        team_id = %session.team_id,
        session_id = %session.session_id,
        score = ?session.final_score,
        color = color.as_str(),
        "reflection submitted and team aggregate updated"
    );
    Ok(())
}
