//! Health insights from an OpenAI-compatible chat completion API.
//!
//! The server holds one [`AiClient`] when an API key is configured. Record
//! data is condensed into a plain-text summary before it is sent.

use crate::config::AiSettings;
use crate::models::HealthRecord;
use crate::stats::{self, HIGH_HEART_RATE_BPM, LOW_SLEEP_HOURS};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str =
    "You are a helpful health monitoring AI assistant. Provide clear, actionable health insights.";

pub const DEFAULT_PROMPT: &str = "You are a health monitoring AI assistant. Analyze the following health data and provide:
1. Overall health assessment
2. Key trends and patterns
3. Specific recommendations for improvement
4. Any concerns that should be addressed

Be concise, professional, and actionable in your response.";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;
const MAX_LOGGED_BODY: usize = 500;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI is not configured on this server.")]
    MissingApiKey,
    #[error("AI is busy, try again in a minute.")]
    RateLimited,
    #[error("Request timed out, try again.")]
    Timeout,
    #[error("AI service rejected the API key: {0}")]
    Auth(String),
    #[error("No insights were returned. Please try again.")]
    EmptyResponse,
    #[error("Error calling AI service: {0}")]
    Request(String),
    #[error("Error calling AI service: {0}")]
    Api(String),
    #[error("Error calling AI service: {0}")]
    Parse(String),
}

impl AiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Auth(_) => "auth",
            Self::EmptyResponse => "empty_response",
            Self::Request(_) | Self::Api(_) | Self::Parse(_) => "unknown",
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct AiClient {
    client: Client,
    settings: AiSettings,
}

impl AiClient {
    pub fn new(settings: AiSettings) -> Result<Self, AiError> {
        if settings.api_key.trim().is_empty() {
            return Err(AiError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AiError::Request(e.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// Sends `prompt` followed by `summary` and returns the completion text.
    pub async fn insights(&self, prompt: Option<&str>, summary: &str) -> Result<String, AiError> {
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROMPT);
        let user_message = format!("{prompt}\n\n{summary}");

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        info!("requesting AI insights from model {}", self.settings.model);
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}: {}", truncate(&body, MAX_LOGGED_BODY)));
            warn!("AI request failed: status={status} message={message}");
            return Err(classify_status(status, message));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| AiError::Parse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}

fn classify_transport(err: reqwest::Error) -> AiError {
    if err.is_timeout() {
        return AiError::Timeout;
    }
    if let Some(status) = err.status() {
        return classify_status(status, err.to_string());
    }
    AiError::Request(err.to_string())
}

fn classify_status(status: StatusCode, message: String) -> AiError {
    let lowered = message.to_ascii_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        || (lowered.contains("rate") && lowered.contains("limit"))
    {
        AiError::RateLimited
    } else if status == StatusCode::UNAUTHORIZED {
        AiError::Auth(message)
    } else if status == StatusCode::GATEWAY_TIMEOUT
        || lowered.contains("timeout")
        || lowered.contains("timed out")
    {
        AiError::Timeout
    } else {
        AiError::Api(message)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Plain-text digest of the records used as the completion context.
pub fn health_summary(records: &[HealthRecord]) -> String {
    let Some(summary) = stats::summarize(records) else {
        return "No health data available.".to_string();
    };
    let Some(latest) = stats::latest(records) else {
        return "No health data available.".to_string();
    };

    let high_hr_days = records.iter().filter(|r| stats::is_high_heart_rate(r)).count();
    let low_sleep_days = records.iter().filter(|r| stats::is_low_sleep(r)).count();
    let avg_heart_rate = summary
        .avg_heart_rate
        .map(|bpm| format!("{bpm:.1} bpm"))
        .unwrap_or_else(|| "not recorded".to_string());
    let latest_heart_rate = latest
        .heart_rate
        .map(|bpm| format!("{bpm} bpm"))
        .unwrap_or_else(|| "not recorded".to_string());

    format!(
        "Health Data Summary (Last {days} days):

Average Metrics:
- Heart Rate: {avg_heart_rate}
- Sleep: {sleep:.1} hours per night
- Steps: {steps:.0} steps per day

Alert Days:
- High Heart Rate (>{HIGH_HEART_RATE_BPM} bpm): {high_hr_days} days
- Low Sleep (<{LOW_SLEEP_HOURS:.0} hours): {low_sleep_days} days

Latest Record ({date}):
- Heart Rate: {latest_heart_rate}
- Sleep: {latest_sleep:.1} hours
- Steps: {latest_steps} steps
",
        days = summary.total_days,
        sleep = summary.avg_sleep,
        steps = summary.avg_steps,
        date = latest.date.format("%Y-%m-%d"),
        latest_sleep = latest.sleep_hours,
        latest_steps = latest.steps,
    )
}

/// Strips markdown decoration the page renders as plain text.
pub fn clean_ai_response(text: &str) -> String {
    let mut lines = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if is_horizontal_rule(trimmed) {
            continue;
        }
        let line = strip_heading(line);
        let line = strip_paired(&line, "**");
        let line = strip_paired(&line, "__");
        let line = strip_paired(&line, "`");
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

fn is_horizontal_rule(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| matches!(c, '-' | '*' | '_'))
}

fn strip_heading(line: &str) -> String {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &trimmed[hashes..];
        if rest.starts_with(char::is_whitespace) {
            return rest.trim_start().to_string();
        }
    }
    line.to_string()
}

/// Removes balanced `marker` pairs, leaving unmatched markers untouched.
fn strip_paired(line: &str, marker: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find(marker) {
        let after = &rest[start + marker.len()..];
        match after.find(marker) {
            Some(end) if end > 0 => {
                out.push_str(&rest[..start]);
                out.push_str(&after[..end]);
                rest = &after[end + marker.len()..];
            }
            _ => break,
        }
    }
    out.push_str(rest);
    out
}
