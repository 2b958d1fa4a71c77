//! Policy snapshot provider. Resolves the lecturer's currently selected
//! profile and the free-text weekly instructions. Pure read — called once
//! at session creation (or on the legacy backfill path) and frozen onto
//! the session; never re-resolved mid-session.

use serde_json::{Value, json};
use sqlx::PgPool;
use teaminsight_core::session::PolicySnapshot;

use crate::error::AppError;

pub const DEFAULT_PROFILE_KEY: &str = "default";
pub const DEFAULT_GREEN_MIN: f64 = 75.0;
pub const DEFAULT_RED_MAX: f64 = 45.0;

/// Lecturer-configured scoring profile.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReflectionProfile {
    pub key: String,
    pub title: String,
    pub controller_addendum: String,
    pub evaluator_addendum: String,
    pub green_min: f64,
    pub red_max: f64,
}

/// The policy in effect right now: selected profile + weekly instructions.
#[derive(Debug, Clone)]
pub struct EffectivePolicy {
    pub profile: ReflectionProfile,
    pub weekly_instructions: String,
}

impl EffectivePolicy {
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            profile_key: self.profile.key.clone(),
            weekly_instructions: self.weekly_instructions.clone(),
        }
    }

    /// Wire shape of the policy block in the analyst payload.
    pub fn wire_controller(&self) -> Value {
        json!({
            "profile": {
                "key": self.profile.key,
                "title": self.profile.title,
                "controllerAddendum": self.profile.controller_addendum,
            },
            "weeklyInstructions": self.weekly_instructions,
        })
    }
}

/// Wire shape of the policy block in the evaluation payload. Takes the
/// weekly instructions from the session snapshot, not the live settings.
pub fn wire_evaluator(profile: &ReflectionProfile, weekly_instructions: &str) -> Value {
    json!({
        "profile": {
            "key": profile.key,
            "evaluatorAddendum": profile.evaluator_addendum,
        },
        "weeklyInstructions": weekly_instructions,
    })
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    active_profile_key: String,
    weekly_instructions: String,
}

/// Look up the profile by key, falling back to the built-in default when
/// the row is missing entirely (a fresh install before the lecturer
/// configured anything).
pub async fn load_profile(pool: &PgPool, key: &str) -> Result<ReflectionProfile, AppError> {
    let key = {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            DEFAULT_PROFILE_KEY
        } else {
            trimmed
        }
    };

    let found = sqlx::query_as::<_, ReflectionProfile>(
        "SELECT key, title, controller_addendum, evaluator_addendum, green_min, red_max
         FROM reflection_profiles WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    if let Some(profile) = found {
        return Ok(profile);
    }

    if key != DEFAULT_PROFILE_KEY {
        tracing::warn!(profile_key = key, "profile missing, falling back to default");
        return Box::pin(load_profile(pool, DEFAULT_PROFILE_KEY)).await;
    }

    Ok(ReflectionProfile {
        key: DEFAULT_PROFILE_KEY.to_string(),
        title: "Default".to_string(),
        controller_addendum: String::new(),
        evaluator_addendum: String::new(),
        green_min: DEFAULT_GREEN_MIN,
        red_max: DEFAULT_RED_MAX,
    })
}

/// Resolve the policy currently in effect. No side effects.
pub async fn resolve_effective_policy(pool: &PgPool) -> Result<EffectivePolicy, AppError> {
    let settings = sqlx::query_as::<_, SettingsRow>(
        "SELECT active_profile_key, weekly_instructions FROM reflection_settings LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    let (profile_key, weekly_instructions) = match settings {
        Some(row) => (row.active_profile_key, row.weekly_instructions),
        None => (DEFAULT_PROFILE_KEY.to_string(), String::new()),
    };

    let profile = load_profile(pool, &profile_key).await?;
    Ok(EffectivePolicy {
        profile,
        weekly_instructions,
    })
}
