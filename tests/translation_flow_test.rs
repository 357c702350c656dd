use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use formbridge::config::TranslationProvider;
use formbridge::server::router;
use formbridge::{AppConfig, AppState};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app_with(config: AppConfig) -> Router {
    router(Arc::new(AppState::from_config(config).unwrap()))
}

fn base_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.data_dir = dir.path().to_str().unwrap().to_string();
    config
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn call_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = call(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_spanish_answers_exported_in_english() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let translate_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/translate")
            .json_body_partial(r#"{"source": "es", "target": "en", "format": "text"}"#);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"translatedText": ["They stole my wallet on the subway"]}));
    });

    let mut config = base_config(&dir);
    config.translation.provider = TranslationProvider::Libretranslate;
    config.translation.endpoint = Some(server.base_url());
    let app = app_with(config);

    let (status, session) = call_json(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({"form_id": "pr-card", "language": "es"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = session["id"].as_str().unwrap().to_string();

    let values = [
        ("reason", json!("replacement")),
        ("reason_details", json!("Me robaron la cartera en el metro")),
        ("uci", json!("87654321")),
        ("family_name", json!("Hernández")),
        ("given_names", json!("José")),
        ("sex", json!("M")),
        ("date_of_birth", json!("1985-11-30")),
        ("country_of_birth", json!("Colombia")),
        ("citizenship", json!("Colombia")),
        ("marital_status", json!("Common-law")),
        ("date_of_landing", json!("2020-01-20")),
        ("mailing_address", json!("10 Rue Sainte-Catherine")),
        ("city", json!("Montréal")),
        ("province", json!("QC")),
        ("postal_code", json!("H3B 1A7")),
        ("phone", json!("(514) 555-0142")),
        ("correspondence_language", json!("french")),
        ("days_in_canada", json!(900)),
        ("declaration", json!(true)),
    ];
    for (field, value) in values {
        let (status, body) = call_json(
            &app,
            "PUT",
            &format!("/api/sessions/{}/fields/{}", id, field),
            Some(json!({ "value": value })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}: {}", field, body);
    }

    let (status, zip_bytes) = call(&app, "GET", &format!("/api/sessions/{}/export.zip", id), None).await;
    assert_eq!(status, StatusCode::OK);
    translate_mock.assert();

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
    let mut file = archive.by_name("answers.json").unwrap();
    let mut content = String::new();
    std::io::Read::read_to_string(&mut file, &mut content).unwrap();
    let answers: Value = serde_json::from_str(&content).unwrap();

    let find = |id: &str| {
        answers["answers"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["field_id"] == id)
            .cloned()
            .unwrap()
    };
    let details = find("reason_details");
    assert_eq!(details["value"], "They stole my wallet on the subway");
    assert_eq!(details["original"], "Me robaron la cartera en el metro");
    assert_eq!(find("family_name")["value"], "Hernández");
    assert_eq!(find("marital_status")["value"], "Common-law");
    assert_eq!(find("city")["value"], "Montréal");

    assert!(dir.path().join("exports").join(format!("{}.pdf", id)).exists());
}

#[tokio::test]
async fn test_translation_outage_is_bad_gateway() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let failing = server.mock(|when, then| {
        when.method(POST).path("/translate");
        then.status(500)
            .header("Content-Type", "application/json")
            .json_body(json!({"error": "model not loaded"}));
    });

    let mut config = base_config(&dir);
    config.translation.provider = TranslationProvider::Libretranslate;
    config.translation.endpoint = Some(server.base_url());
    let app = app_with(config);

    let (status, body) = call_json(&app, "GET", "/api/forms/pr-card?lang=fr", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "translation_failed");
    assert!(failing.hits() >= 1);

    // English needs no translation service.
    let (status, _) = call_json(&app, "GET", "/api/forms/pr-card?lang=en", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_assistant_suggestion_is_not_stored() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let reply = json!({
        "answer": "You have lived together for two years, so choose Common-law.",
        "suggested_value": "common_law"
    });
    let chat_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer test-key")
            .json_body_partial(r#"{"model": "gpt-4o-mini", "response_format": {"type": "json_object"}}"#);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": reply.to_string()}}]
            }));
    });

    let mut config = base_config(&dir);
    config.assistant.enabled = true;
    config.assistant.endpoint = server.url("/v1");
    config.assistant.api_key = Some("test-key".to_string());
    let app = app_with(config);

    let (_, session) = call_json(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({"form_id": "pr-card", "language": "en"})),
    )
    .await;
    let id = session["id"].as_str().unwrap().to_string();

    let (status, body) = call_json(
        &app,
        "POST",
        &format!("/api/sessions/{}/assist", id),
        Some(json!({
            "field_id": "marital_status",
            "question": "I have lived with my partner for two years, what do I pick?"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    chat_mock.assert();
    assert_eq!(body["suggested_value"], "common_law");
    assert_eq!(body["suggestion_valid"], true);

    let (_, session) = call_json(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert!(session["values"].get("marital_status").is_none());
}

#[tokio::test]
async fn test_assistant_outage_is_bad_gateway() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(429).body("rate limited");
    });

    let mut config = base_config(&dir);
    config.assistant.enabled = true;
    config.assistant.endpoint = server.url("/v1");
    config.assistant.api_key = Some("test-key".to_string());
    let app = app_with(config);

    let (_, session) = call_json(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({"form_id": "pr-card"})),
    )
    .await;
    assert_eq!(session["language"], "en");
    let id = session["id"].as_str().unwrap().to_string();

    let (status, body) = call_json(
        &app,
        "POST",
        &format!("/api/sessions/{}/assist", id),
        Some(json!({"field_id": "uci", "question": "What is this?"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "assistant_failed");
}
