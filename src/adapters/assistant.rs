use crate::domain::ports::{AssistReply, AssistRequest, Assistant};
use crate::utils::error::{FormError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You help people fill in official Canadian immigration forms. \
Answer the applicant's question about one form field. Write the answer in the requested language. \
Explain terms plainly and never invent facts about the applicant. \
Reply with a JSON object {\"answer\": string, \"suggested_value\": string or null}. \
Only suggest a value when the applicant's question contains the information needed; \
for choice fields the suggestion must be one of the listed options.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StructuredReply {
    answer: String,
    #[serde(default)]
    suggested_value: Option<serde_json::Value>,
}

/// Client for an OpenAI compatible chat completions endpoint.
pub struct HttpAssistant {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl HttpAssistant {
    pub fn new(
        endpoint: &str,
        api_key: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            api_key,
            model,
            temperature,
        })
    }
}

pub(crate) fn build_prompt(request: &AssistRequest) -> String {
    let mut prompt = format!(
        "Form: {}\nField: {}\nField type: {}\n",
        request.form_title, request.field_label, request.field_kind
    );
    if let Some(help) = &request.field_help {
        prompt.push_str(&format!("Official help text: {}\n", help));
    }
    if !request.options.is_empty() {
        prompt.push_str(&format!("Options: {}\n", request.options.join(" | ")));
    }
    if let Some(value) = &request.current_value {
        prompt.push_str(&format!("Current value: {}\n", value));
    }
    for (term, definition) in &request.definitions {
        prompt.push_str(&format!("Definition of \"{}\": {}\n", term, definition));
    }
    prompt.push_str(&format!(
        "Answer language: {}\nQuestion: {}",
        request.language, request.question
    ));
    prompt
}

/// Accepts a JSON object reply, a JSON object wrapped in a code fence, or
/// plain text (treated as the answer with no suggestion).
pub(crate) fn parse_reply(content: &str) -> AssistReply {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    match serde_json::from_str::<StructuredReply>(unfenced) {
        Ok(reply) => AssistReply {
            answer: reply.answer,
            suggested_value: match reply.suggested_value {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
                _ => None,
            },
        },
        Err(_) => AssistReply {
            answer: trimmed.to_string(),
            suggested_value: None,
        },
    }
}

#[async_trait]
impl Assistant for HttpAssistant {
    async fn ask(&self, request: &AssistRequest) -> Result<AssistReply> {
        let prompt = build_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            response_format: serde_json::json!({"type": "json_object"}),
        };

        tracing::debug!("Assistant request for field '{}'", request.field_label);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FormError::AssistantError {
                message: format!("HTTP {}: {}", status, text.chars().take(200).collect::<String>()),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| FormError::AssistantError {
            message: format!("Malformed response: {}", e),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| FormError::AssistantError {
                message: "Response contained no message".to_string(),
            })?;

        Ok(parse_reply(&content))
    }
}

/// Used when no assistant service is configured: answers from the official
/// help text and glossary definitions, already in the applicant's language.
#[derive(Debug, Clone, Default)]
pub struct OfflineAssistant;

#[async_trait]
impl Assistant for OfflineAssistant {
    async fn ask(&self, request: &AssistRequest) -> Result<AssistReply> {
        let mut parts = Vec::new();
        if let Some(help) = &request.field_help {
            parts.push(help.clone());
        }
        for (term, definition) in &request.definitions {
            parts.push(format!("{}: {}", term, definition));
        }
        if !request.options.is_empty() {
            parts.push(request.options.join(" / "));
        }
        if parts.is_empty() {
            parts.push(request.field_label.clone());
        }
        Ok(AssistReply {
            answer: parts.join("\n"),
            suggested_value: None,
        })
    }
}
