//! Pure scoring functions. Everything here is deterministic — the oracle
//! produces the raw component numbers, this module turns them into the
//! composite score and the dashboard color.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::evaluation::HealthComponents;

/// Dashboard traffic-light status derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Yellow,
    Red,
}

impl StatusColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusColor::Green => "green",
            StatusColor::Yellow => "yellow",
            StatusColor::Red => "red",
        }
    }
}

/// Component weights for the composite health score.
pub const WEIGHT_PARTICIPATION: f64 = 0.25;
pub const WEIGHT_SENTIMENT: f64 = 0.15;
pub const WEIGHT_DEPTH: f64 = 0.40;
pub const WEIGHT_CONFLICT: f64 = 0.20;

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

/// Map a composite score to the team status color using the profile
/// thresholds. Boundaries are inclusive on both ends: a score exactly at
/// `green_min` is green, exactly at `red_max` is red.
pub fn score_to_color(score: f64, green_min: f64, red_max: f64) -> StatusColor {
    if score >= green_min {
        StatusColor::Green
    } else if score <= red_max {
        StatusColor::Red
    } else {
        StatusColor::Yellow
    }
}

/// Composite health score from the four weighted components, 0-100.
pub fn composite_score(components: &HealthComponents) -> f64 {
    let raw = WEIGHT_PARTICIPATION * components.participation_equity.score
        + WEIGHT_SENTIMENT * components.constructive_sentiment.score
        + WEIGHT_DEPTH * components.reflective_depth.score
        + WEIGHT_CONFLICT * components.conflict_resolution.score;
    clamp(raw, 0.0, 100.0).round()
}

/// Legacy composite formula, retained for records evaluated before the
/// health-score components existed. Inputs are 0-10 scales.
pub fn legacy_score(quality: f64, risk: f64, compliance: f64) -> i32 {
    let score = (quality * 0.45 + (10.0 - risk) * 0.4 + compliance * 0.15) * 10.0;
    clamp(score, 0.0, 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ComponentScore;

    #[test]
    fn legacy_score_perfect_week_is_exactly_100() {
        assert_eq!(legacy_score(10.0, 0.0, 10.0), 100);
    }

    #[test]
    fn legacy_score_worst_week_is_exactly_0() {
        assert_eq!(legacy_score(0.0, 10.0, 0.0), 0);
    }

    #[test]
    fn legacy_score_clamps_out_of_range_inputs() {
        assert_eq!(legacy_score(25.0, -5.0, 25.0), 100);
        assert_eq!(legacy_score(-3.0, 20.0, -1.0), 0);
    }

    #[test]
    fn legacy_score_handles_non_finite_input() {
        assert_eq!(legacy_score(f64::NAN, 5.0, 5.0), 0);
    }

    #[test]
    fn color_boundaries_are_inclusive() {
        assert_eq!(score_to_color(75.0, 75.0, 45.0), StatusColor::Green);
        assert_eq!(score_to_color(45.0, 75.0, 45.0), StatusColor::Red);
        assert_eq!(score_to_color(60.0, 75.0, 45.0), StatusColor::Yellow);
        assert_eq!(score_to_color(74.9, 75.0, 45.0), StatusColor::Yellow);
        assert_eq!(score_to_color(45.1, 75.0, 45.0), StatusColor::Yellow);
    }

    fn components(pe: f64, cs: f64, rd: f64, cr: f64) -> HealthComponents {
        let comp = |score: f64| ComponentScore {
            score,
            breakdown: String::new(),
        };
        HealthComponents {
            participation_equity: comp(pe),
            constructive_sentiment: comp(cs),
            reflective_depth: comp(rd),
            conflict_resolution: comp(cr),
        }
    }

    #[test]
    fn composite_uses_fixed_weights() {
        // 0.25*80 + 0.15*60 + 0.40*90 + 0.20*70 = 20 + 9 + 36 + 14 = 79
        assert_eq!(composite_score(&components(80.0, 60.0, 90.0, 70.0)), 79.0);
    }

    #[test]
    fn composite_of_equal_components_is_that_value() {
        assert_eq!(composite_score(&components(50.0, 50.0, 50.0, 50.0)), 50.0);
        assert_eq!(
            composite_score(&components(100.0, 100.0, 100.0, 100.0)),
            100.0
        );
    }
}
