use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ChatError;
use crate::model::Message;
use crate::providers::http_errors::transport_error;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

fn chat_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage<'_>> {
    messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        })
        .collect()
}

fn encode_request(cfg: &Config, messages: &[Message]) -> Result<Vec<u8>, ChatError> {
    // serde_json writes NaN and infinities as `null` instead of failing.
    if !cfg.temperature.is_finite() {
        return Err(ChatError::InvalidTemperature(cfg.temperature));
    }
    let body = ChatRequest {
        model: &cfg.model,
        temperature: cfg.temperature,
        messages: to_chat_messages(messages),
    };
    serde_json::to_vec(&body).map_err(ChatError::Encode)
}

fn embedded_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .filter(|message| !message.is_empty())
}

/// Status first, then an embedded `error.message`, then the choice list.
fn interpret_response(status: StatusCode, body: &str) -> Result<String, ChatError> {
    if status != StatusCode::OK {
        return Err(ChatError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    if let Some(message) = embedded_error_message(body) {
        return Err(ChatError::Api(message));
    }

    let parsed: ChatResponse = serde_json::from_str(body).map_err(ChatError::Decode)?;
    let first = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(ChatError::EmptyResponse)?;
    Ok(first
        .message
        .and_then(|message| message.content)
        .unwrap_or_default())
}

pub async fn chat(
    client: &Client,
    cfg: &Config,
    messages: &[Message],
) -> Result<String, ChatError> {
    let api_url = chat_url(&cfg.api_base_url);
    let payload = encode_request(cfg, messages)?;
    debug!(
        api_url = %api_url,
        model = %cfg.model,
        message_count = messages.len(),
        "sending chat completion request"
    );

    let response = client
        .post(&api_url)
        .header(CONTENT_TYPE, "application/json")
        .bearer_auth(&cfg.api_key)
        .body(payload)
        .send()
        .await
        .map_err(|err| {
            warn!(
                api_url = %api_url,
                model = %cfg.model,
                error = %err,
                "chat completion request failed"
            );
            transport_error(err, &api_url, cfg.request_timeout_secs)
        })?;

    let status = response.status();
    let body = response.text().await.map_err(ChatError::Body)?;
    if status != StatusCode::OK {
        warn!(
            api_url = %api_url,
            model = %cfg.model,
            status = %status,
            response_body_len = body.len(),
            "chat API returned non-OK status"
        );
    }

    let reply = interpret_response(status, &body)?;
    debug!(
        model = %cfg.model,
        response_len = reply.len(),
        "received chat completion response"
    );
    Ok(reply)
}
