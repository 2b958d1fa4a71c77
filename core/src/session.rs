use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::evaluation::EvaluationResult;
use crate::scoring::StatusColor;

/// Lifecycle status of a reflection session. Transitions are monotonic
/// except for the explicit reopen (ready_to_submit → in_progress) and
/// reset, which deletes non-terminal sessions outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    ReadyToSubmit,
    Submitted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::ReadyToSubmit => "ready_to_submit",
            SessionStatus::Submitted => "submitted",
        }
    }

    /// Submitted sessions are historical records — immutable, never active.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Submitted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry in the conversation transcript. The transcript is append-only:
/// messages are never reordered or edited after the fact.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Structured answer extracted by the analyst oracle for one discussion
/// topic. Unlike the transcript these are merged per turn — a later turn
/// may revise an earlier topic's answer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopicAnswer {
    pub topic_id: String,
    pub prompt: String,
    pub answer: String,
}

/// Lecturer policy captured once at session creation. Later configuration
/// changes must not retroactively alter in-flight sessions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PolicySnapshot {
    pub profile_key: String,
    pub weekly_instructions: String,
}

/// The state the analyst oracle hands back after each turn. Applied to the
/// session as a unit; the directive for the interviewer travels separately
/// and is never persisted.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub running_summary: String,
    pub answers: Vec<TopicAnswer>,
    pub ready_to_submit: bool,
    pub clarify_count: i32,
    pub turn_count: i32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionStateError {
    #[error("session is already submitted")]
    AlreadySubmitted,
    #[error("session is not ready to submit")]
    NotReady,
}

/// One guided reflection conversation for a team. At most one session per
/// team may be in a non-terminal status at any time; the store enforces
/// this with a partial unique index.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReflectionSession {
    pub id: Uuid,
    pub team_id: String,
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub turn_count: i32,
    pub clarify_count: i32,
    pub messages: Vec<ChatMessage>,
    pub answers: Vec<TopicAnswer>,
    pub running_summary: String,
    pub profile_key: String,
    /// None only on sessions created before policy snapshotting existed;
    /// backfilled lazily on the next turn.
    pub weekly_instructions_snapshot: Option<String>,
    pub evaluation: Option<EvaluationResult>,
    pub final_score: Option<i32>,
    pub final_color: Option<StatusColor>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReflectionSession {
    pub fn new(team_id: impl Into<String>, policy: PolicySnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            team_id: team_id.into(),
            session_id: Uuid::now_v7(),
            status: SessionStatus::InProgress,
            turn_count: 0,
            clarify_count: 0,
            messages: Vec::new(),
            answers: Vec::new(),
            running_summary: String::new(),
            profile_key: policy.profile_key,
            weekly_instructions_snapshot: Some(policy.weekly_instructions),
            evaluation: None,
            final_score: None,
            final_color: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn append_message(&mut self, role: ChatRole, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    /// Legacy sessions predate policy snapshotting; detect them so the
    /// caller can resolve and freeze the current policy.
    pub fn needs_policy_backfill(&self) -> bool {
        self.profile_key.trim().is_empty() || self.weekly_instructions_snapshot.is_none()
    }

    pub fn backfill_policy(&mut self, policy: &PolicySnapshot) {
        if self.profile_key.trim().is_empty() {
            self.profile_key = policy.profile_key.clone();
        }
        if self.weekly_instructions_snapshot.is_none() {
            self.weekly_instructions_snapshot = Some(policy.weekly_instructions.clone());
        }
    }

    /// Fold one analyst turn into the session: replace the running summary,
    /// merge the extracted answers, advance the counters, and flip to
    /// ready_to_submit when the analyst says coverage is complete.
    pub fn apply_turn(&mut self, outcome: TurnOutcome) -> Result<(), SessionStateError> {
        if self.status.is_terminal() {
            return Err(SessionStateError::AlreadySubmitted);
        }
        self.running_summary = outcome.running_summary;
        self.answers = outcome.answers;
        self.clarify_count = outcome.clarify_count.max(self.clarify_count);
        self.turn_count = outcome.turn_count.max(self.turn_count);
        if outcome.ready_to_submit {
            self.status = SessionStatus::ReadyToSubmit;
        }
        Ok(())
    }

    /// Force the wrap-up transition (the `finish` operation).
    pub fn mark_ready(&mut self, summary: String) -> Result<(), SessionStateError> {
        if self.status.is_terminal() {
            return Err(SessionStateError::AlreadySubmitted);
        }
        self.running_summary = summary;
        self.status = SessionStatus::ReadyToSubmit;
        Ok(())
    }

    /// Explicit reopen: the student keeps talking after the analyst
    /// declared readiness.
    pub fn reopen(&mut self) -> Result<(), SessionStateError> {
        if self.status.is_terminal() {
            return Err(SessionStateError::AlreadySubmitted);
        }
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    /// Terminal transition. Only valid from ready_to_submit; the caller
    /// persists the session and the team aggregate in one transaction.
    pub fn submit(
        &mut self,
        summary: String,
        evaluation: EvaluationResult,
        final_score: i32,
        final_color: StatusColor,
    ) -> Result<(), SessionStateError> {
        match self.status {
            SessionStatus::Submitted => return Err(SessionStateError::AlreadySubmitted),
            SessionStatus::InProgress => return Err(SessionStateError::NotReady),
            SessionStatus::ReadyToSubmit => {}
        }
        self.running_summary = summary;
        self.evaluation = Some(evaluation);
        self.final_score = Some(final_score);
        self.final_color = Some(final_color);
        self.status = SessionStatus::Submitted;
        self.submitted_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PolicySnapshot {
        PolicySnapshot {
            profile_key: "default".to_string(),
            weekly_instructions: "focus on integration issues".to_string(),
        }
    }

    fn outcome(ready: bool) -> TurnOutcome {
        TurnOutcome {
            running_summary: "summary".to_string(),
            answers: vec![TopicAnswer {
                topic_id: "blockers".to_string(),
                prompt: "what blocked you".to_string(),
                answer: "sensor driver bug".to_string(),
            }],
            ready_to_submit: ready,
            clarify_count: 1,
            turn_count: 2,
        }
    }

    #[test]
    fn new_session_starts_in_progress_with_snapshot() {
        let session = ReflectionSession::new("T1", policy());
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.profile_key, "default");
        assert!(!session.needs_policy_backfill());
        assert!(session.messages.is_empty());
    }

    #[test]
    fn turn_without_readiness_stays_in_progress() {
        let mut session = ReflectionSession::new("T1", policy());
        session.apply_turn(outcome(false)).unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.running_summary, "summary");
        assert_eq!(session.turn_count, 2);
    }

    #[test]
    fn ready_turn_moves_to_ready_to_submit() {
        let mut session = ReflectionSession::new("T1", policy());
        session.apply_turn(outcome(true)).unwrap();
        assert_eq!(session.status, SessionStatus::ReadyToSubmit);
    }

    #[test]
    fn counters_never_regress() {
        let mut session = ReflectionSession::new("T1", policy());
        session.apply_turn(outcome(false)).unwrap();
        let mut stale = outcome(false);
        stale.turn_count = 0;
        stale.clarify_count = 0;
        session.apply_turn(stale).unwrap();
        assert_eq!(session.turn_count, 2);
        assert_eq!(session.clarify_count, 1);
    }

    #[test]
    fn submit_requires_ready_status() {
        let mut session = ReflectionSession::new("T1", policy());
        let err = session
            .submit(
                "final".to_string(),
                EvaluationResult::default(),
                50,
                StatusColor::Yellow,
            )
            .unwrap_err();
        assert_eq!(err, SessionStateError::NotReady);
    }

    #[test]
    fn submitted_session_is_immutable() {
        let mut session = ReflectionSession::new("T1", policy());
        session.mark_ready("done".to_string()).unwrap();
        session
            .submit(
                "final".to_string(),
                EvaluationResult::default(),
                82,
                StatusColor::Green,
            )
            .unwrap();
        assert_eq!(session.status, SessionStatus::Submitted);
        assert!(session.submitted_at.is_some());

        assert_eq!(
            session.apply_turn(outcome(false)),
            Err(SessionStateError::AlreadySubmitted)
        );
        assert_eq!(session.reopen(), Err(SessionStateError::AlreadySubmitted));
        assert_eq!(
            session.mark_ready("again".to_string()),
            Err(SessionStateError::AlreadySubmitted)
        );
        assert_eq!(
            session.submit(
                "again".to_string(),
                EvaluationResult::default(),
                10,
                StatusColor::Red,
            ),
            Err(SessionStateError::AlreadySubmitted)
        );
    }

    #[test]
    fn reopen_returns_ready_session_to_in_progress() {
        let mut session = ReflectionSession::new("T1", policy());
        session.mark_ready("wrap".to_string()).unwrap();
        session.reopen().unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
    }

    #[test]
    fn legacy_session_backfills_only_missing_fields() {
        let mut session = ReflectionSession::new("T1", policy());
        session.weekly_instructions_snapshot = None;
        assert!(session.needs_policy_backfill());

        let current = PolicySnapshot {
            profile_key: "strict".to_string(),
            weekly_instructions: "new instructions".to_string(),
        };
        session.backfill_policy(&current);
        // Profile key was already frozen at creation — must not change.
        assert_eq!(session.profile_key, "default");
        assert_eq!(
            session.weekly_instructions_snapshot.as_deref(),
            Some("new instructions")
        );
    }
}
