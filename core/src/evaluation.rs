use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tuckman's stages of group development, as classified by the evaluation
/// oracle. Stored on both the session and the team aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TuckmanStage {
    Forming,
    Storming,
    Norming,
    Performing,
    Adjourning,
}

impl Default for TuckmanStage {
    fn default() -> Self {
        TuckmanStage::Forming
    }
}

/// Anomaly flags raised for lecturer attention. Fixed vocabulary — anything
/// else the oracle invents is dropped during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyFlag {
    RedZone,
    SilentDropout,
    ToxicSpike,
    ChronicIssue,
}

/// One weighted sub-component of the team health score.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentScore {
    /// 0-100
    pub score: f64,
    /// Free-text justification from the evaluator
    pub breakdown: String,
}

impl ComponentScore {
    pub fn unavailable() -> Self {
        Self {
            score: 50.0,
            breakdown: "לא זמין".to_string(),
        }
    }
}

/// The four health-score components. Weights are fixed:
/// participation 25%, sentiment 15%, depth 40%, conflict resolution 20%.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthComponents {
    pub participation_equity: ComponentScore,
    pub constructive_sentiment: ComponentScore,
    pub reflective_depth: ComponentScore,
    pub conflict_resolution: ComponentScore,
}

impl Default for HealthComponents {
    fn default() -> Self {
        Self {
            participation_equity: ComponentScore::unavailable(),
            constructive_sentiment: ComponentScore::unavailable(),
            reflective_depth: ComponentScore::unavailable(),
            conflict_resolution: ComponentScore::unavailable(),
        }
    }
}

/// Full output of the evaluation oracle call, written onto the session at
/// confirm time. Legacy quality/risk/compliance fields are retained because
/// historical records were scored with the old formula.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvaluationResult {
    /// Composite team health score, 0-100
    pub health_score: f64,
    pub components: HealthComponents,
    /// 0-10
    pub risk_level: f64,
    pub risk_explanation: String,
    pub tuckman_stage: TuckmanStage,
    pub tuckman_explanation: String,
    pub anomaly_flags: Vec<AnomalyFlag>,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,

    // Legacy 0-10 scores for the old composite formula
    pub quality: f64,
    pub risk: f64,
    pub compliance: f64,
    pub quality_breakdown: String,
    pub risk_breakdown: String,
    pub compliance_breakdown: String,
    pub reasons: Vec<String>,
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self {
            health_score: 50.0,
            components: HealthComponents::default(),
            risk_level: 5.0,
            risk_explanation: "לא זמין".to_string(),
            tuckman_stage: TuckmanStage::Forming,
            tuckman_explanation: "לא זמין".to_string(),
            anomaly_flags: Vec::new(),
            strengths: Vec::new(),
            concerns: Vec::new(),
            recommendations: Vec::new(),
            quality: 5.0,
            risk: 5.0,
            compliance: 5.0,
            quality_breakdown: "לא הצלחתי לנתח — ברירת מחדל.".to_string(),
            risk_breakdown: "לא הצלחתי לנתח — ברירת מחדל.".to_string(),
            compliance_breakdown: "לא הצלחתי לנתח — ברירת מחדל.".to_string(),
            reasons: vec!["לא הצלחתי לנתח בוודאות — הוחזר סיווג ברירת מחדל.".to_string()],
        }
    }
}
