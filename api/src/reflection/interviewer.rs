//! Interviewer: renders the analyst's directive into the actual message
//! shown to the student. Pure rendering — no persistence, no decisions.

use serde_json::json;
use teaminsight_core::session::ChatMessage;

use crate::error::AppError;
use crate::oracle::ReflectionOracle;
use crate::reflection::controller::NextDirective;
use crate::reflection::prompts::FACILITATOR_PROMPT;
use crate::reflection::topics::REFLECTION_TOPICS;

/// Shown when the facilitator returns nothing usable. The student must
/// always see a coherent next message.
pub const FALLBACK_CONTINUATION: &str = "קיבלתי. אפשר לשתף עוד קצת?";

/// Closing line when the analyst declares the reflection complete.
pub const READY_MESSAGE: &str =
    "סיימנו ✅ יש לי את כל מה שצריך לרפלקציה. עכשיו אפשר להגיש או לבטל ולהתחיל מחדש דרך הכפתורים למעלה.";

pub async fn render_next_message(
    oracle: &dyn ReflectionOracle,
    messages: &[ChatMessage],
    directive: &NextDirective,
) -> Result<String, AppError> {
    let payload = json!({
        "messages": messages,
        "nextDirective": directive,
        "topics": REFLECTION_TOPICS,
    });

    let raw = oracle
        .complete(FACILITATOR_PROMPT, payload.to_string())
        .await?;
    let text = raw.trim();
    if text.is_empty() {
        tracing::warn!("facilitator returned empty text, using fallback continuation");
        return Ok(FALLBACK_CONTINUATION.to_string());
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct ScriptedOracle(&'static str);

    #[async_trait]
    impl ReflectionOracle for ScriptedOracle {
        async fn complete(&self, _system: &str, _payload: String) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn empty_response_falls_back_to_continuation_phrase() {
        let oracle = ScriptedOracle("   \n  ");
        let text = render_next_message(&oracle, &[], &NextDirective::default())
            .await
            .unwrap();
        assert_eq!(text, FALLBACK_CONTINUATION);
    }

    #[tokio::test]
    async fn non_empty_response_is_trimmed_and_returned() {
        let oracle = ScriptedOracle("  מה עבד טוב השבוע?  ");
        let text = render_next_message(&oracle, &[], &NextDirective::default())
            .await
            .unwrap();
        assert_eq!(text, "מה עבד טוב השבוע?");
    }
}
