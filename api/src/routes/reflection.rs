//! The five reflection lifecycle operations. Handlers stay thin: auth,
//! status checks, one oracle round-trip via the engine, one save. All
//! persistence is scoped to the authenticated team.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use teaminsight_core::error::ApiError;
use teaminsight_core::evaluation::TuckmanStage;
use teaminsight_core::scoring::score_to_color;
use teaminsight_core::session::{ChatMessage, ChatRole, ReflectionSession, SessionStatus};

use crate::auth::TeamSession;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::oracle::ReflectionOracle;
use crate::reflection::controller::{ControllerInput, run_controller_turn};
use crate::reflection::evaluator::{evaluate, final_score, render_final_summary, student_tasks};
use crate::reflection::interviewer::{READY_MESSAGE, render_next_message};
use crate::reflection::policy::{EffectivePolicy, load_profile, resolve_effective_policy};
use crate::reflection::{MAX_TURNS, store};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/reflection/start", post(start))
        .route("/v1/reflection/turn", post(turn))
        .route("/v1/reflection/finish", post(finish))
        .route("/v1/reflection/confirm", post(confirm))
        .route("/v1/reflection/reset", post(reset))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TurnRequest {
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TurnResponse {
    pub assistant_text: String,
    pub ready_to_submit: bool,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FinishResponse {
    pub status: SessionStatus,
    pub summary: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmResponse {
    pub submission_id: Uuid,
    pub health_score: f64,
    pub tuckman_stage: TuckmanStage,
    pub tasks: Vec<String>,
    pub strengths: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    pub deleted: u64,
}

/// The policy a session runs under: the snapshotted profile key and weekly
/// instructions, with the live profile body behind the key. Legacy sessions
/// without a snapshot get one frozen here, on first use.
async fn policy_for_session(
    state: &AppState,
    session: &mut ReflectionSession,
) -> Result<EffectivePolicy, AppError> {
    if session.needs_policy_backfill() {
        let effective = resolve_effective_policy(&state.db).await?;
        session.backfill_policy(&effective.snapshot());
    }
    let profile = load_profile(&state.db, &session.profile_key).await?;
    Ok(EffectivePolicy {
        profile,
        weekly_instructions: session
            .weekly_instructions_snapshot
            .clone()
            .unwrap_or_default(),
    })
}

/// One analyst+facilitator round: fold the analyst's output into the
/// session and produce the next assistant message. Nothing is persisted
/// here — the caller appends the message and saves once. The opening
/// exchange passes `allow_ready = false`: before the students have said
/// anything there is nothing to wrap up, so a readiness claim from the
/// analyst is discarded and a question is asked regardless.
async fn advance(
    oracle: &dyn ReflectionOracle,
    session: &mut ReflectionSession,
    policy: &EffectivePolicy,
    recent_summaries: &[String],
    allow_ready: bool,
) -> Result<(String, bool), AppError> {
    let mut result = run_controller_turn(
        oracle,
        ControllerInput {
            messages: &session.messages,
            answers: &session.answers,
            running_summary: &session.running_summary,
            clarify_count: session.clarify_count,
            turn_count: session.turn_count,
            max_turns: MAX_TURNS,
            recent_summaries,
            policy,
        },
    )
    .await?;

    if !allow_ready {
        result.ready_to_submit = false;
    }

    let ready = result.ready_to_submit;
    let assistant_text = if ready {
        READY_MESSAGE.to_string()
    } else {
        render_next_message(oracle, &session.messages, &result.directive).await?
    };
    session.apply_turn(result.outcome())?;

    Ok((assistant_text, ready))
}

/// Start or resume the team's reflection session
///
/// Returns the existing active session untouched when it already has
/// messages; otherwise creates one (freezing the lecturer policy onto it)
/// and generates the opening question. The running summary is never
/// included — it is lecturer-facing only.
#[utoipa::path(
    post,
    path = "/v1/reflection/start",
    responses(
        (status = 200, description = "Active session (created or resumed)", body = StartResponse),
        (status = 401, description = "Missing or invalid team session", body = ApiError)
    ),
    tag = "reflection"
)]
pub async fn start(
    State(state): State<AppState>,
    team: TeamSession,
) -> Result<impl IntoResponse, AppError> {
    let mut session = match store::find_active_session(&state.db, &team.team_id).await? {
        Some(session) => session,
        None => {
            let effective = resolve_effective_policy(&state.db).await?;
            let session = ReflectionSession::new(&team.team_id, effective.snapshot());
            match store::create_session(&state.db, &session).await {
                Ok(()) => session,
                // Lost a concurrent start race — the other request's session
                // is the active one now, resume it instead.
                Err(AppError::Conflict { .. }) => store::find_active_session(
                    &state.db,
                    &team.team_id,
                )
                .await?
                .ok_or_else(|| {
                    AppError::Internal("Active session vanished after create conflict".to_string())
                })?,
                Err(err) => return Err(err),
            }
        }
    };

    // Idempotent resume: an already-started conversation is returned as-is.
    if !session.messages.is_empty() {
        return Ok(Json(StartResponse {
            session_id: session.session_id,
            status: session.status,
            messages: session.messages,
        }));
    }

    let policy = policy_for_session(&state, &mut session).await?;
    let recent = store::recent_summaries(&state.db, &team.team_id).await?;
    let (assistant_text, _) = advance(
        state.oracle.as_ref(),
        &mut session,
        &policy,
        &recent,
        false,
    )
    .await?;
    session.append_message(ChatRole::Assistant, assistant_text);
    store::save_progress(&state.db, &session).await?;

    tracing::info!(team_id = %team.team_id, session_id = %session.session_id, "reflection session started");
    Ok(Json(StartResponse {
        session_id: session.session_id,
        status: session.status,
        messages: session.messages,
    }))
}

/// Submit one user response in the reflection conversation
#[utoipa::path(
    post,
    path = "/v1/reflection/turn",
    request_body = TurnRequest,
    responses(
        (status = 200, description = "Next assistant message", body = TurnResponse),
        (status = 400, description = "Missing text", body = ApiError),
        (status = 409, description = "No active session", body = ApiError)
    ),
    tag = "reflection"
)]
pub async fn turn(
    State(state): State<AppState>,
    team: TeamSession,
    AppJson(body): AppJson<TurnRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_text = body.text.trim().to_string();
    if user_text.is_empty() {
        return Err(AppError::Validation {
            message: "Missing text".to_string(),
            field: Some("text".to_string()),
            docs_hint: None,
        });
    }

    let mut session = store::find_active_session(&state.db, &team.team_id)
        .await?
        .ok_or_else(|| AppError::Conflict {
            message: "No active reflection session".to_string(),
            docs_hint: Some("Call /v1/reflection/start first.".to_string()),
        })?;

    // More input after the wrap-up reopens the interview.
    if session.status == SessionStatus::ReadyToSubmit {
        session.reopen()?;
    }

    session.append_message(ChatRole::User, user_text);
    session.turn_count += 1;

    let policy = policy_for_session(&state, &mut session).await?;
    let recent = store::recent_summaries(&state.db, &team.team_id).await?;
    let (assistant_text, ready) = advance(
        state.oracle.as_ref(),
        &mut session,
        &policy,
        &recent,
        true,
    )
    .await?;
    session.append_message(ChatRole::Assistant, assistant_text.clone());
    store::save_progress(&state.db, &session).await?;

    Ok(Json(TurnResponse {
        assistant_text,
        ready_to_submit: ready,
        status: session.status,
    }))
}

/// Force summary generation and move to ready_to_submit
#[utoipa::path(
    post,
    path = "/v1/reflection/finish",
    responses(
        (status = 200, description = "Session is ready to submit", body = FinishResponse),
        (status = 409, description = "No in-progress session", body = ApiError)
    ),
    tag = "reflection"
)]
pub async fn finish(
    State(state): State<AppState>,
    team: TeamSession,
) -> Result<impl IntoResponse, AppError> {
    let mut session = store::find_active_session(&state.db, &team.team_id)
        .await?
        .filter(|session| session.status == SessionStatus::InProgress)
        .ok_or_else(|| AppError::Conflict {
            message: "No active session".to_string(),
            docs_hint: None,
        })?;

    let summary = render_final_summary(
        state.oracle.as_ref(),
        &session.answers,
        &session.running_summary,
        &session.messages,
    )
    .await?;

    session.mark_ready(summary.clone())?;
    store::save_progress(&state.db, &session).await?;

    Ok(Json(FinishResponse {
        status: session.status,
        summary,
    }))
}

/// Confirm and submit the reflection
///
/// Runs the final summary and evaluation calls, computes the composite
/// score and color under the session's snapshotted profile, and commits
/// the session flip plus the team aggregate in one transaction.
#[utoipa::path(
    post,
    path = "/v1/reflection/confirm",
    responses(
        (status = 200, description = "Reflection submitted", body = ConfirmResponse),
        (status = 409, description = "Nothing to confirm", body = ApiError)
    ),
    tag = "reflection"
)]
pub async fn confirm(
    State(state): State<AppState>,
    team: TeamSession,
) -> Result<impl IntoResponse, AppError> {
    let mut session = store::find_active_session(&state.db, &team.team_id)
        .await?
        .filter(|session| session.status == SessionStatus::ReadyToSubmit)
        .ok_or_else(|| AppError::Conflict {
            message: "Nothing to confirm".to_string(),
            docs_hint: Some(
                "The reflection must reach ready_to_submit before confirming.".to_string(),
            ),
        })?;

    // The exact profile frozen onto this session, not the current selection.
    let profile = load_profile(&state.db, &session.profile_key).await?;
    let weekly = session
        .weekly_instructions_snapshot
        .clone()
        .unwrap_or_default();

    let summary = render_final_summary(
        state.oracle.as_ref(),
        &session.answers,
        &session.running_summary,
        &session.messages,
    )
    .await?;

    let evaluation = evaluate(
        state.oracle.as_ref(),
        &summary,
        &session.answers,
        &session.messages,
        &profile,
        &weekly,
    )
    .await?;

    let score = final_score(&evaluation);
    let color = score_to_color(score as f64, profile.green_min, profile.red_max);
    let tasks = student_tasks(&summary, &evaluation);
    let strengths: Vec<String> = evaluation.strengths.iter().take(2).cloned().collect();
    let health_score = evaluation.health_score;
    let tuckman_stage = evaluation.tuckman_stage;

    session.submit(summary, evaluation, score, color)?;
    store::finalize(&state.db, &session).await?;

    Ok(Json(ConfirmResponse {
        submission_id: session.id,
        health_score,
        tuckman_stage,
        tasks,
        strengths,
    }))
}

/// Reset the current reflection session
///
/// Deletes the team's non-terminal sessions; submitted sessions are kept
/// as historical records. Idempotent.
#[utoipa::path(
    post,
    path = "/v1/reflection/reset",
    responses(
        (status = 200, description = "Non-terminal sessions deleted", body = ResetResponse),
        (status = 401, description = "Missing or invalid team session", body = ApiError)
    ),
    tag = "reflection"
)]
pub async fn reset(
    State(state): State<AppState>,
    team: TeamSession,
) -> Result<impl IntoResponse, AppError> {
    let deleted = store::delete_non_terminal(&state.db, &team.team_id).await?;
    tracing::info!(team_id = %team.team_id, deleted, "reflection sessions reset");
    Ok(Json(ResetResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::policy::{
        DEFAULT_GREEN_MIN, DEFAULT_PROFILE_KEY, DEFAULT_RED_MAX, ReflectionProfile,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use teaminsight_core::session::PolicySnapshot;

    /// Returns one scripted response per call, in order.
    struct SequenceOracle(Mutex<Vec<&'static str>>);

    impl SequenceOracle {
        fn new(responses: &[&'static str]) -> Self {
            Self(Mutex::new(responses.to_vec()))
        }
    }

    #[async_trait]
    impl ReflectionOracle for SequenceOracle {
        async fn complete(&self, _system: &str, _payload: String) -> Result<String, AppError> {
            let mut remaining = self.0.lock().unwrap();
            Ok(remaining.remove(0).to_string())
        }
    }

    fn policy() -> EffectivePolicy {
        EffectivePolicy {
            profile: ReflectionProfile {
                key: DEFAULT_PROFILE_KEY.to_string(),
                title: "Default".to_string(),
                controller_addendum: String::new(),
                evaluator_addendum: String::new(),
                green_min: DEFAULT_GREEN_MIN,
                red_max: DEFAULT_RED_MAX,
            },
            weekly_instructions: String::new(),
        }
    }

    fn fresh_session() -> ReflectionSession {
        ReflectionSession::new(
            "T1",
            PolicySnapshot {
                profile_key: DEFAULT_PROFILE_KEY.to_string(),
                weekly_instructions: String::new(),
            },
        )
    }

    #[tokio::test]
    async fn opening_turn_discards_premature_readiness() {
        // Analyst claims readiness before the students said a word; the
        // opening exchange must still ask the facilitator's question.
        let oracle = SequenceOracle::new(&[
            r#"{"runningSummary": "", "readyToSubmit": true}"#,
            "מה עבד טוב אצלכם השבוע?",
        ]);
        let mut session = fresh_session();
        let effective = policy();

        let (text, ready) = advance(&oracle, &mut session, &effective, &[], false)
            .await
            .unwrap();

        assert!(!ready);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(text, "מה עבד טוב אצלכם השבוע?");
    }

    #[tokio::test]
    async fn regular_turn_honors_readiness() {
        let oracle = SequenceOracle::new(&[r#"{"runningSummary": "s", "readyToSubmit": true}"#]);
        let mut session = fresh_session();
        let effective = policy();

        let (text, ready) = advance(&oracle, &mut session, &effective, &[], true)
            .await
            .unwrap();

        assert!(ready);
        assert_eq!(session.status, SessionStatus::ReadyToSubmit);
        assert_eq!(text, READY_MESSAGE);
    }
}
