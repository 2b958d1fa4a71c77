//! Defensive parsers for oracle responses. The LLM is supposed to return
//! strict JSON, but the contract is duck-typed: fields go missing, types
//! drift, and the whole thing sometimes arrives wrapped in a markdown code
//! fence. Each field is validated independently and substituted with a
//! typed default on failure — parsing never returns an error, because the
//! conversation must always continue.

use serde::de::DeserializeOwned;
use serde_json::Value;
use teaminsight_core::evaluation::{
    AnomalyFlag, ComponentScore, EvaluationResult, HealthComponents, TuckmanStage,
};
use teaminsight_core::scoring::{clamp, composite_score};
use teaminsight_core::session::TopicAnswer;

use crate::reflection::controller::{ControllerResult, NextDirective, TeamAnalysis};

/// Tolerate ```json ... ``` wrapping around the payload.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

fn str_field(obj: &Value, key: &str, fallback: &str) -> String {
    match obj.get(key).and_then(Value::as_str) {
        Some(s) => s.trim().to_string(),
        None => fallback.to_string(),
    }
}

fn number_field(obj: &Value, key: &str, min: f64, max: f64, fallback: f64) -> f64 {
    match obj.get(key).and_then(Value::as_f64) {
        Some(n) if n.is_finite() => clamp(n, min, max),
        _ => fallback,
    }
}

fn count_field(obj: &Value, key: &str, fallback: i32) -> i32 {
    match obj.get(key).and_then(Value::as_i64) {
        Some(n) if n >= 0 => n.min(i32::MAX as i64) as i32,
        _ => fallback,
    }
}

fn string_list(obj: &Value, key: &str, limit: usize) -> Vec<String> {
    match obj.get(key).and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(limit)
            .collect(),
        None => Vec::new(),
    }
}

/// Validate one field against an enum's allow-list; anything the oracle
/// invented outside it falls back.
fn enum_field<T: DeserializeOwned>(obj: &Value, key: &str, fallback: T) -> T {
    obj.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(fallback)
}

fn enum_list<T: DeserializeOwned>(obj: &Value, key: &str) -> Vec<T> {
    match obj.get(key).and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
        None => Vec::new(),
    }
}

fn answers_field(obj: &Value, fallback: &[TopicAnswer]) -> Vec<TopicAnswer> {
    let Some(items) = obj.get("answers").and_then(Value::as_array) else {
        return fallback.to_vec();
    };
    items
        .iter()
        .filter_map(|item| {
            let topic_id = item.get("topicId").and_then(Value::as_str)?.trim();
            let answer = item.get("answer").and_then(Value::as_str)?.trim();
            if topic_id.is_empty() || answer.is_empty() {
                return None;
            }
            Some(TopicAnswer {
                topic_id: topic_id.to_string(),
                prompt: str_field(item, "prompt", ""),
                answer: answer.to_string(),
            })
        })
        .collect()
}

/// Parse the analyst response. Any malformed or type-mismatched field falls
/// back to the caller-supplied prior value; an entirely unusable payload
/// returns the fallback as-is.
pub fn parse_controller(raw: &str, fallback: ControllerResult) -> ControllerResult {
    let cleaned = strip_code_fences(raw);
    let Ok(obj) = serde_json::from_str::<Value>(cleaned) else {
        return fallback;
    };
    if !obj.is_object() {
        return fallback;
    }

    let analysis_raw = obj.get("analysis").cloned().unwrap_or(Value::Null);
    let analysis = TeamAnalysis {
        tuckman_stage: enum_field(&analysis_raw, "tuckmanStage", fallback.analysis.tuckman_stage),
        // 0 means "not assessed" and keeps the prior value, like the
        // other score fields; real readings live on the 1-10 scale.
        psychological_safety: match analysis_raw
            .get("psychologicalSafety")
            .and_then(Value::as_f64)
        {
            Some(n) if n.is_finite() && n > 0.0 => clamp(n, 1.0, 10.0),
            _ => fallback.analysis.psychological_safety,
        },
        sentiment_tone: enum_field(&analysis_raw, "sentimentTone", fallback.analysis.sentiment_tone),
        reflective_depth: enum_field(
            &analysis_raw,
            "reflectiveDepth",
            fallback.analysis.reflective_depth,
        ),
        detected_patterns: enum_list(&analysis_raw, "detectedPatterns"),
    };

    let directive_raw = obj.get("nextDirective").cloned().unwrap_or(Value::Null);
    let directive = NextDirective {
        strategy: enum_field(&directive_raw, "strategy", fallback.directive.strategy),
        tone: enum_field(&directive_raw, "tone", fallback.directive.tone),
        key_question: str_field(&directive_raw, "keyQuestion", &fallback.directive.key_question),
        anchor: str_field(&directive_raw, "anchor", &fallback.directive.anchor),
        history_reference: str_field(&directive_raw, "historyReference", ""),
        avoid_topics: string_list(&directive_raw, "avoidTopics", 10),
        urgent_topics: string_list(&directive_raw, "urgentTopics", 10),
    };

    ControllerResult {
        running_summary: str_field(&obj, "runningSummary", &fallback.running_summary),
        answers: answers_field(&obj, &fallback.answers),
        analysis,
        directive,
        ready_to_submit: obj.get("readyToSubmit") == Some(&Value::Bool(true)),
        clarify_count: count_field(&obj, "clarifyCount", fallback.clarify_count),
        turn_count: count_field(&obj, "turnCount", fallback.turn_count),
    }
}

fn component_field(obj: &Value, key: &str) -> ComponentScore {
    let raw = obj.get(key).cloned().unwrap_or(Value::Null);
    let fallback = ComponentScore::unavailable();
    ComponentScore {
        // A literal 0 counts as "not provided", same as the top-level
        // scores, and takes the unavailable default.
        score: first_positive(
            &[number_field(&raw, "score", 0.0, 100.0, 0.0)],
            fallback.score,
        ),
        breakdown: str_field(&raw, "breakdown", &fallback.breakdown),
    }
}

/// Non-zero chain: the original treats 0 as "not provided" for the
/// top-level scores and falls through to the next candidate.
fn first_positive(candidates: &[f64], fallback: f64) -> f64 {
    candidates
        .iter()
        .copied()
        .find(|n| *n > 0.0)
        .unwrap_or(fallback)
}

/// Parse the evaluation response. Missing components default to 50 with an
/// "unavailable" breakdown; a missing composite is recomputed from the
/// component weights; legacy scores are derived when absent.
pub fn parse_evaluation(raw: &str) -> EvaluationResult {
    let cleaned = strip_code_fences(raw);
    let default = EvaluationResult::default();
    let Ok(obj) = serde_json::from_str::<Value>(cleaned) else {
        return default;
    };
    if !obj.is_object() {
        return default;
    }

    let comps_raw = obj.get("components").cloned().unwrap_or(Value::Null);
    let components = HealthComponents {
        participation_equity: component_field(&comps_raw, "participationEquity"),
        constructive_sentiment: component_field(&comps_raw, "constructiveSentiment"),
        reflective_depth: component_field(&comps_raw, "reflectiveDepth"),
        conflict_resolution: component_field(&comps_raw, "conflictResolution"),
    };

    let reported = number_field(&obj, "teamHealthScore", 0.0, 100.0, 0.0);
    let health_score = first_positive(&[reported], composite_score(&components));

    let risk_level = first_positive(
        &[
            number_field(&obj, "riskLevel", 0.0, 10.0, 0.0),
            number_field(&obj, "risk", 0.0, 10.0, 0.0),
        ],
        default.risk_level,
    );

    let strengths = string_list(&obj, "strengths", 5);
    let concerns = string_list(&obj, "concerns", 5);

    let mut reasons = string_list(&obj, "reasons", 5);
    if reasons.is_empty() {
        reasons = strengths
            .iter()
            .chain(concerns.iter())
            .take(5)
            .cloned()
            .collect();
    }
    if reasons.is_empty() {
        reasons = default.reasons.clone();
    }

    let quality = first_positive(
        &[number_field(&obj, "quality", 0.0, 10.0, 0.0)],
        (components.reflective_depth.score / 10.0).round(),
    );
    let compliance = first_positive(
        &[number_field(&obj, "compliance", 0.0, 10.0, 0.0)],
        default.compliance,
    );

    let risk_explanation = str_field(&obj, "riskExplanation", &default.risk_explanation);

    EvaluationResult {
        health_score,
        risk_level,
        risk_explanation: risk_explanation.clone(),
        tuckman_stage: enum_field(&obj, "tuckmanStage", TuckmanStage::Forming),
        tuckman_explanation: str_field(&obj, "tuckmanExplanation", &default.tuckman_explanation),
        anomaly_flags: enum_list::<AnomalyFlag>(&obj, "anomalyFlags"),
        strengths,
        concerns,
        recommendations: string_list(&obj, "recommendations", 5),
        quality,
        risk: risk_level,
        compliance,
        quality_breakdown: str_field(
            &obj,
            "qualityBreakdown",
            &components.reflective_depth.breakdown,
        ),
        risk_breakdown: str_field(&obj, "riskBreakdown", &risk_explanation),
        compliance_breakdown: str_field(&obj, "complianceBreakdown", &default.compliance_breakdown),
        reasons,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::controller::{DirectiveStrategy, DirectiveTone};
    use teaminsight_core::session::TurnOutcome;

    fn fallback() -> ControllerResult {
        ControllerResult {
            running_summary: "prior summary".to_string(),
            answers: vec![TopicAnswer {
                topic_id: "blockers".to_string(),
                prompt: "p".to_string(),
                answer: "a".to_string(),
            }],
            analysis: TeamAnalysis::default(),
            directive: NextDirective::default(),
            ready_to_submit: false,
            clarify_count: 2,
            turn_count: 4,
        }
    }

    #[test]
    fn strips_fences_with_language_tag() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }

    #[test]
    fn non_json_returns_exact_fallback() {
        let fb = fallback();
        let parsed = parse_controller("I'm sorry, I can't do that.", fb.clone());
        assert_eq!(parsed.running_summary, fb.running_summary);
        assert_eq!(parsed.answers.len(), 1);
        assert_eq!(parsed.clarify_count, 2);
        assert_eq!(parsed.turn_count, 4);
        assert!(!parsed.ready_to_submit);
    }

    #[test]
    fn json_scalar_returns_fallback() {
        let parsed = parse_controller("42", fallback());
        assert_eq!(parsed.running_summary, "prior summary");
    }

    #[test]
    fn valid_fields_override_fallback() {
        let raw = r#"```json
        {
          "runningSummary": "new summary",
          "answers": [{"topicId": "wins", "prompt": "q", "answer": "shipped the demo"}],
          "analysis": {"tuckmanStage": "storming", "psychologicalSafety": 3},
          "nextDirective": {"strategy": "mediate_conflict", "tone": "mediator",
                            "keyQuestion": "מה קרה?", "anchor": "שמעתי אתכם"},
          "readyToSubmit": false,
          "clarifyCount": 3,
          "turnCount": 5
        }
        ```"#;
        let parsed = parse_controller(raw, fallback());
        assert_eq!(parsed.running_summary, "new summary");
        assert_eq!(parsed.answers[0].topic_id, "wins");
        assert_eq!(parsed.directive.strategy, DirectiveStrategy::MediateConflict);
        assert_eq!(parsed.directive.tone, DirectiveTone::Mediator);
        assert_eq!(parsed.turn_count, 5);
    }

    #[test]
    fn invalid_enum_values_fall_back_per_field() {
        let raw = r#"{
          "runningSummary": "s",
          "analysis": {"tuckmanStage": "exploding", "psychologicalSafety": "high"},
          "nextDirective": {"strategy": "hypnotize", "tone": "warm", "keyQuestion": "q?"}
        }"#;
        let parsed = parse_controller(raw, fallback());
        // Unknown strategy falls back, but the valid tone and question stick.
        assert_eq!(parsed.directive.strategy, DirectiveStrategy::ProbeDeeper);
        assert_eq!(parsed.directive.tone, DirectiveTone::Warm);
        assert_eq!(parsed.directive.key_question, "q?");
        assert_eq!(parsed.analysis.psychological_safety, 5.0);
    }

    #[test]
    fn ready_to_submit_requires_literal_true() {
        let fb = fallback();
        for raw in [
            r#"{"readyToSubmit": "true"}"#,
            r#"{"readyToSubmit": 1}"#,
            r#"{}"#,
        ] {
            assert!(!parse_controller(raw, fb.clone()).ready_to_submit);
        }
        assert!(parse_controller(r#"{"readyToSubmit": true}"#, fb).ready_to_submit);
    }

    #[test]
    fn answers_entries_missing_required_keys_are_dropped() {
        let raw = r#"{"answers": [
            {"topicId": "wins", "answer": "good"},
            {"topicId": "", "answer": "x"},
            {"prompt": "no topic", "answer": "x"},
            {"topicId": "risks"}
        ]}"#;
        let parsed = parse_controller(raw, fallback());
        assert_eq!(parsed.answers.len(), 1);
        assert_eq!(parsed.answers[0].topic_id, "wins");
    }

    #[test]
    fn controller_outcome_round_trips_into_session_fields() {
        let parsed = parse_controller(r#"{"readyToSubmit": true, "turnCount": 7}"#, fallback());
        let TurnOutcome {
            ready_to_submit,
            turn_count,
            ..
        } = parsed.outcome();
        assert!(ready_to_submit);
        assert_eq!(turn_count, 7);
    }

    #[test]
    fn psychological_safety_zero_keeps_prior_value() {
        let parsed = parse_controller(r#"{"analysis": {"psychologicalSafety": 0}}"#, fallback());
        assert_eq!(parsed.analysis.psychological_safety, 5.0);

        let parsed = parse_controller(r#"{"analysis": {"psychologicalSafety": 7}}"#, fallback());
        assert_eq!(parsed.analysis.psychological_safety, 7.0);
    }

    #[test]
    fn evaluation_garbage_yields_default() {
        let parsed = parse_evaluation("not json at all");
        assert_eq!(parsed.health_score, 50.0);
        assert_eq!(parsed.risk_level, 5.0);
        assert_eq!(parsed.tuckman_stage, TuckmanStage::Forming);
        assert!(parsed.anomaly_flags.is_empty());
    }

    #[test]
    fn evaluation_composite_is_recomputed_when_missing() {
        let raw = r#"{"components": {
            "participationEquity": {"score": 80, "breakdown": "b"},
            "constructiveSentiment": {"score": 60, "breakdown": "b"},
            "reflectiveDepth": {"score": 90, "breakdown": "b"},
            "conflictResolution": {"score": 70, "breakdown": "b"}
        }}"#;
        let parsed = parse_evaluation(raw);
        // 0.25*80 + 0.15*60 + 0.40*90 + 0.20*70 = 79
        assert_eq!(parsed.health_score, 79.0);
    }

    #[test]
    fn evaluation_component_zero_takes_unavailable_default() {
        let raw = r#"{"components": {
            "participationEquity": {"score": 0, "breakdown": "אין נתונים"}
        }}"#;
        let parsed = parse_evaluation(raw);
        assert_eq!(parsed.components.participation_equity.score, 50.0);
        assert_eq!(parsed.components.participation_equity.breakdown, "אין נתונים");
        // All components sit at 50, so the recomputed composite does too.
        assert_eq!(parsed.health_score, 50.0);
    }

    #[test]
    fn evaluation_reported_score_wins_over_composite() {
        let raw = r#"{"teamHealthScore": 42, "components": {
            "participationEquity": {"score": 100, "breakdown": "b"}
        }}"#;
        let parsed = parse_evaluation(raw);
        assert_eq!(parsed.health_score, 42.0);
    }

    #[test]
    fn evaluation_filters_unknown_anomaly_flags() {
        let raw = r#"{"anomalyFlags": ["red_zone", "made_up_flag", "toxic_spike"]}"#;
        let parsed = parse_evaluation(raw);
        assert_eq!(
            parsed.anomaly_flags,
            vec![AnomalyFlag::RedZone, AnomalyFlag::ToxicSpike]
        );
    }

    #[test]
    fn evaluation_risk_falls_through_legacy_field() {
        let parsed = parse_evaluation(r#"{"risk": 8}"#);
        assert_eq!(parsed.risk_level, 8.0);
        assert_eq!(parsed.risk, 8.0);
    }

    #[test]
    fn evaluation_caps_list_lengths() {
        let raw = r#"{"strengths": ["a","b","c","d","e","f","g"]}"#;
        let parsed = parse_evaluation(raw);
        assert_eq!(parsed.strengths.len(), 5);
    }
}
