use serde_json::{Value, json};

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
    std::process::exit(1);
}

/// Resolve the team session token for API requests. Issuance lives outside
/// this tool — the token comes from the course operator.
pub fn resolve_token() -> String {
    match std::env::var("TEAMINSIGHT_TEAM_TOKEN") {
        Ok(token) if !token.trim().is_empty() => token.trim().to_string(),
        _ => exit_error(
            "No team token found.",
            Some("Set TEAMINSIGHT_TEAM_TOKEN to a valid team session JWT."),
        ),
    }
}

/// POST a reflection endpoint with the team session cookie attached and
/// print the JSON response. Returns the process exit code.
pub async fn post_with_session(api_url: &str, path: &str, body: Option<Value>) -> i32 {
    let token = resolve_token();
    let mut request = client()
        .post(format!("{api_url}{path}"))
        .header("cookie", format!("team_session={token}"));
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => exit_error(&format!("Request failed: {err}"), None),
    };

    let status = response.status();
    let body: Value = response.json().await.unwrap_or_else(|_| json!({}));
    println!("{}", serde_json::to_string_pretty(&body).unwrap());

    if status.is_success() { 0 } else { 1 }
}
