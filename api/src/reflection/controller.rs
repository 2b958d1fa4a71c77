//! Turn controller: one analyst-oracle call per user turn. Extracts and
//! merges structured answers, rewrites the running summary, decides
//! readiness, and produces the directive the interviewer renders next.
//! This module never produces student-facing text itself.

use serde::{Deserialize, Serialize};
use serde_json::json;
use teaminsight_core::evaluation::TuckmanStage;
use teaminsight_core::session::{ChatMessage, TopicAnswer, TurnOutcome};

use crate::error::AppError;
use crate::oracle::ReflectionOracle;
use crate::reflection::parse::parse_controller;
use crate::reflection::policy::EffectivePolicy;
use crate::reflection::prompts::ANALYST_PROMPT;
use crate::reflection::topics::REFLECTION_TOPICS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveStrategy {
    ProbeDeeper,
    MediateConflict,
    BreakSilence,
    ChallengeGroupthink,
    AddressLoafer,
    ElevateReflection,
    WrapUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveTone {
    Warm,
    Curious,
    Firm,
    Playful,
    Empathetic,
    Mediator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentTone {
    Tense,
    Apathetic,
    Enthusiastic,
    Frustrated,
    Neutral,
    Defensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectiveDepth {
    Descriptive,
    Comparative,
    Critical,
    Transformative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedPattern {
    SocialLoafer,
    PassiveAggressive,
    Groupthink,
    BlameGame,
    Silence,
    PotentialLoafer,
}

/// Team-dynamics read from the analyst. Logged for the lecturer's benefit
/// but not persisted per turn.
#[derive(Debug, Clone, Serialize)]
pub struct TeamAnalysis {
    pub tuckman_stage: TuckmanStage,
    pub psychological_safety: f64,
    pub sentiment_tone: SentimentTone,
    pub reflective_depth: ReflectiveDepth,
    pub detected_patterns: Vec<DetectedPattern>,
}

impl Default for TeamAnalysis {
    fn default() -> Self {
        Self {
            tuckman_stage: TuckmanStage::Forming,
            psychological_safety: 5.0,
            sentiment_tone: SentimentTone::Neutral,
            reflective_depth: ReflectiveDepth::Descriptive,
            detected_patterns: Vec::new(),
        }
    }
}

/// Abstract instruction for the interviewer: what the next question should
/// accomplish, not its wording.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextDirective {
    pub strategy: DirectiveStrategy,
    pub tone: DirectiveTone,
    pub key_question: String,
    pub anchor: String,
    pub history_reference: String,
    pub avoid_topics: Vec<String>,
    pub urgent_topics: Vec<String>,
}

impl Default for NextDirective {
    fn default() -> Self {
        Self {
            strategy: DirectiveStrategy::ProbeDeeper,
            tone: DirectiveTone::Warm,
            key_question: "ספרו לי על שיתוף הפעולה בצוות השבוע - מה עבד טוב?".to_string(),
            anchor: "בואו נתחיל לדבר על איך עבדתם יחד".to_string(),
            history_reference: String::new(),
            avoid_topics: Vec::new(),
            urgent_topics: vec!["collaboration".to_string()],
        }
    }
}

/// Everything one analyst call yields.
#[derive(Debug, Clone)]
pub struct ControllerResult {
    pub running_summary: String,
    pub answers: Vec<TopicAnswer>,
    pub analysis: TeamAnalysis,
    pub directive: NextDirective,
    pub ready_to_submit: bool,
    pub clarify_count: i32,
    pub turn_count: i32,
}

impl ControllerResult {
    /// The deterministic fallback when the oracle's JSON is unusable: keep
    /// the caller's prior state and a safe default directive, never fail
    /// the turn.
    pub fn fallback(input: &ControllerInput<'_>) -> Self {
        Self {
            running_summary: input.running_summary.to_string(),
            answers: input.answers.to_vec(),
            analysis: TeamAnalysis::default(),
            directive: NextDirective::default(),
            ready_to_submit: false,
            clarify_count: input.clarify_count,
            turn_count: input.turn_count,
        }
    }

    /// The persistable slice of the result.
    pub fn outcome(&self) -> TurnOutcome {
        TurnOutcome {
            running_summary: self.running_summary.clone(),
            answers: self.answers.clone(),
            ready_to_submit: self.ready_to_submit,
            clarify_count: self.clarify_count,
            turn_count: self.turn_count,
        }
    }
}

pub struct ControllerInput<'a> {
    pub messages: &'a [ChatMessage],
    pub answers: &'a [TopicAnswer],
    pub running_summary: &'a str,
    pub clarify_count: i32,
    pub turn_count: i32,
    pub max_turns: i32,
    pub recent_summaries: &'a [String],
    pub policy: &'a EffectivePolicy,
}

/// Run one analyst turn. The oracle call may fail (network/timeout) — that
/// propagates to the route handler and the session stays untouched.
/// Malformed JSON never fails: it degrades to the fallback, per field.
pub async fn run_controller_turn(
    oracle: &dyn ReflectionOracle,
    input: ControllerInput<'_>,
) -> Result<ControllerResult, AppError> {
    let payload = json!({
        "messages": input.messages,
        "answers": input.answers,
        "runningSummary": input.running_summary,
        "clarifyCount": input.clarify_count,
        "turnCount": input.turn_count,
        "maxTurns": input.max_turns,
        "recentSummaries": input.recent_summaries,
        "topics": REFLECTION_TOPICS,
        "policy": input.policy.wire_controller(),
    });

    let raw = oracle.complete(ANALYST_PROMPT, payload.to_string()).await?;
    let fallback = ControllerResult::fallback(&input);
    let result = parse_controller(&raw, fallback);

    tracing::info!(
        turn = result.turn_count,
        ready = result.ready_to_submit,
        stage = ?result.analysis.tuckman_stage,
        patterns = ?result.analysis.detected_patterns,
        "analyst turn completed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::policy::{
        DEFAULT_GREEN_MIN, DEFAULT_PROFILE_KEY, DEFAULT_RED_MAX, ReflectionProfile,
    };
    use async_trait::async_trait;

    struct ScriptedOracle(&'static str);

    #[async_trait]
    impl ReflectionOracle for ScriptedOracle {
        async fn complete(&self, _system: &str, _payload: String) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl ReflectionOracle for FailingOracle {
        async fn complete(&self, _system: &str, _payload: String) -> Result<String, AppError> {
            Err(AppError::Internal("connection refused".to_string()))
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

    fn input<'a>(policy: &'a EffectivePolicy, summaries: &'a [String]) -> ControllerInput<'a> {
        ControllerInput {
            messages: &[],
            answers: &[],
            running_summary: "",
            clarify_count: 0,
            turn_count: 1,
            max_turns: crate::reflection::MAX_TURNS,
            recent_summaries: summaries,
            policy,
        }
    }

    #[tokio::test]
    async fn fenced_json_response_is_parsed() {
        let oracle = ScriptedOracle(
            "```json\n{\"runningSummary\": \"s\", \"readyToSubmit\": true, \"turnCount\": 3}\n```",
        );
        let policy = policy();
        let result = run_controller_turn(&oracle, input(&policy, &[]))
            .await
            .unwrap();
        assert!(result.ready_to_submit);
        assert_eq!(result.running_summary, "s");
        assert_eq!(result.turn_count, 3);
    }

    #[tokio::test]
    async fn refusal_text_degrades_to_prior_state() {
        let oracle = ScriptedOracle("I cannot answer that.");
        let policy = policy();
        let result = run_controller_turn(&oracle, input(&policy, &[]))
            .await
            .unwrap();
        assert!(!result.ready_to_submit);
        assert_eq!(result.turn_count, 1);
        assert_eq!(result.directive.strategy, DirectiveStrategy::ProbeDeeper);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let policy = policy();
        let err = run_controller_turn(&FailingOracle, input(&policy, &[])).await;
        assert!(err.is_err());
    }
}
