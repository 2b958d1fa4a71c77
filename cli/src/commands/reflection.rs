use serde_json::json;

use crate::ReflectionCommands;
use crate::util::post_with_session;

pub async fn run(api_url: &str, command: ReflectionCommands) -> i32 {
    match command {
        ReflectionCommands::Start => {
            post_with_session(api_url, "/v1/reflection/start", None).await
        }
        ReflectionCommands::Turn { text } => {
            post_with_session(api_url, "/v1/reflection/turn", Some(json!({ "text": text }))).await
        }
        ReflectionCommands::Finish => {
            post_with_session(api_url, "/v1/reflection/finish", None).await
        }
        ReflectionCommands::Confirm => {
            post_with_session(api_url, "/v1/reflection/confirm", None).await
        }
        ReflectionCommands::Reset => {
            post_with_session(api_url, "/v1/reflection/reset", None).await
        }
    }
}
