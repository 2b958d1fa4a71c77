use serde_json::{Value, json};

use crate::util::{client, exit_error};

pub async fn run(api_url: &str) -> i32 {
    let response = match client().get(format!("{api_url}/health")).send().await {
        Ok(response) => response,
        Err(err) => exit_error(&format!("Request failed: {err}"), None),
    };

    let status = response.status();
    let body: Value = response.json().await.unwrap_or_else(|_| json!({}));
    println!("{}", serde_json::to_string_pretty(&body).unwrap());

    if status.is_success() { 0 } else { 1 }
}
