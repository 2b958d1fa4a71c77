//! Finalizer: the two confirm-time oracle calls (narrative summary, then
//! evaluation) and the deterministic task extraction for the student's
//! closing screen.

use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use teaminsight_core::evaluation::EvaluationResult;
use teaminsight_core::scoring::legacy_score;
use teaminsight_core::session::{ChatMessage, TopicAnswer};

use crate::error::AppError;
use crate::oracle::ReflectionOracle;
use crate::reflection::parse::parse_evaluation;
use crate::reflection::policy::{ReflectionProfile, wire_evaluator};
use crate::reflection::prompts::{EVALUATION_PROMPT, FINAL_SUMMARY_PROMPT};

/// Longer free-text synthesis for the lecturer dashboard. Never shown to
/// the student.
pub async fn render_final_summary(
    oracle: &dyn ReflectionOracle,
    answers: &[TopicAnswer],
    running_summary: &str,
    messages: &[ChatMessage],
) -> Result<String, AppError> {
    let payload = json!({
        "answers": answers,
        "runningSummary": running_summary,
        "messages": messages,
    });
    let raw = oracle
        .complete(FINAL_SUMMARY_PROMPT, payload.to_string())
        .await?;
    Ok(raw.trim().to_string())
}

pub async fn evaluate(
    oracle: &dyn ReflectionOracle,
    summary: &str,
    answers: &[TopicAnswer],
    messages: &[ChatMessage],
    profile: &ReflectionProfile,
    weekly_instructions: &str,
) -> Result<EvaluationResult, AppError> {
    let payload = json!({
        "summary": summary,
        "answers": answers,
        "messages": messages,
        "policy": wire_evaluator(profile, weekly_instructions),
    });
    let raw = oracle
        .complete(EVALUATION_PROMPT, payload.to_string())
        .await?;
    Ok(parse_evaluation(&raw))
}

/// Pick the score the color derives from: the health score when present,
/// otherwise the legacy composite formula. Both paths must stay — historical
/// records were computed either way.
pub fn final_score(evaluation: &EvaluationResult) -> i32 {
    if evaluation.health_score > 0.0 {
        evaluation.health_score.round() as i32
    } else {
        legacy_score(evaluation.quality, evaluation.risk, evaluation.compliance)
    }
}

fn tasks_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)##[^\n]*משימות[^\n]*\n((?s:.)*?)(\n---|\n##|$)").unwrap())
}

fn task_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+[.)]|\*|-|###)\s*\**").unwrap())
}

/// Extract up to 3 tasks from the final summary's "משימות" markdown section
/// for the student's closing screen.
pub fn extract_tasks(summary: &str) -> Vec<String> {
    let Some(captures) = tasks_section_re().captures(summary) else {
        return Vec::new();
    };
    let section = captures.get(1).map(|m| m.as_str()).unwrap_or("");

    section
        .lines()
        .map(str::trim)
        .filter(|line| task_line_re().is_match(line))
        .map(|line| task_line_re().replace(line, "").trim().to_string())
        .filter(|line| {
            line.chars().count() > 5
                && !line.starts_with("מה לעשות")
                && !line.starts_with("מי אחראי")
                && !line.starts_with("עד מתי")
        })
        .take(3)
        .collect()
}

/// Tasks for the student: from the summary when the section exists, else
/// the evaluator's recommendations.
pub fn student_tasks(summary: &str, evaluation: &EvaluationResult) -> Vec<String> {
    let tasks = extract_tasks(summary);
    if !tasks.is_empty() {
        return tasks;
    }
    evaluation.recommendations.iter().take(3).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_score_prefers_health_score() {
        let evaluation = EvaluationResult {
            health_score: 81.4,
            ..EvaluationResult::default()
        };
        assert_eq!(final_score(&evaluation), 81);
    }

    #[test]
    fn final_score_falls_back_to_legacy_formula() {
        let evaluation = EvaluationResult {
            health_score: 0.0,
            quality: 10.0,
            risk: 0.0,
            compliance: 10.0,
            ..EvaluationResult::default()
        };
        assert_eq!(final_score(&evaluation), 100);
    }

    #[test]
    fn extracts_numbered_tasks_from_hebrew_section() {
        let summary = "סיכום שבועי\n\n## משימות לשבוע הבא\n1. לסגור את באג החיישן עד יום שלישי\n2. דנה תכין דמו ללקוח\n3. לתאם פגישת תכנון לשבוע הבא\n\n## עוד סעיף\nטקסט";
        let tasks = extract_tasks(summary);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0], "לסגור את באג החיישן עד יום שלישי");
    }

    #[test]
    fn short_and_template_lines_are_filtered() {
        let summary = "## משימות\n- אב\n- מה לעשות: משהו ארוך מאוד כאן\n- משימה אמיתית וארוכה";
        let tasks = extract_tasks(summary);
        assert_eq!(tasks, vec!["משימה אמיתית וארוכה".to_string()]);
    }

    #[test]
    fn no_tasks_section_returns_empty() {
        assert!(extract_tasks("סתם טקסט בלי כותרות").is_empty());
    }

    #[test]
    fn student_tasks_fall_back_to_recommendations() {
        let evaluation = EvaluationResult {
            recommendations: vec![
                "המלצה ראשונה".to_string(),
                "המלצה שנייה".to_string(),
                "המלצה שלישית".to_string(),
                "המלצה רביעית".to_string(),
            ],
            ..EvaluationResult::default()
        };
        let tasks = student_tasks("אין כאן סעיף משימות", &evaluation);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0], "המלצה ראשונה");
    }
}
