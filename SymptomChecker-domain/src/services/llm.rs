//! Language model fallback
//!
//! Only consulted when neither the emergency check nor the rule table
//! produced an answer. Without an API key a deterministic mock stands in for
//! the model, so the service works offline.

use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::entities::symptom::UNCLEAR_CONDITION;

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_RAW_LOG: &str = "data/llm_raw_logs.txt";
const MAX_TOKENS: u32 = 700;

const SYSTEM_MESSAGE: &str =
    "You are a conservative educational medical assistant. Output ONLY valid JSON with no extra text.";

const PROMPT_TEMPLATE: &str = r#"
You are a conservative educational medical assistant. IMPORTANT: Output ONLY valid JSON (no commentary, no code fences, no explanation). If you cannot produce valid JSON, output {"error":"cannot_respond"}.

Output must match this schema exactly:

{
  "input": "<original symptoms string>",
  "probable_conditions": [
    {"condition":"", "rationale":"", "confidence":"", "relative_score": 0.0}
  ],
  "recommended_next_steps": ["..."],
  "disclaimer": "..."
}

Rules:
- Provide 1-5 probable_conditions with short rationale (1-2 sentences) and confidence (low/medium/high).
- If emergency signs exist (chest pain, severe breathlessness, severe bleeding, fainting) return a single high-confidence emergency condition and recommended_next_steps starting with "Seek emergency care immediately".
- Do NOT include treatments, dosages, or prescriptions.
Input symptoms: {symptoms}
"#;

/// Errors raised by language model clients
#[derive(Debug, Error)]
pub enum LlmError {
    /// The per-minute call budget is spent
    #[error("LLM rate limit exceeded")]
    RateLimited,

    /// Transport failure talking to the provider
    #[error("LLM request failed: {0}")]
    Request(String),

    /// Provider answered with a non-success status
    #[error("LLM provider returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Provider answer did not contain any text
    #[error("LLM response had no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        LlmError::Request(error.to_string())
    }
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key; mock mode when absent
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// File receiving every raw model output; disabled when None
    pub raw_log_path: Option<PathBuf>,
    /// Calls allowed per minute, 0 for unlimited
    pub rate_limit_per_minute: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
            raw_log_path: Some(PathBuf::from(DEFAULT_RAW_LOG)),
            rate_limit_per_minute: 0,
        }
    }
}

impl LlmConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let model = env::var("OPENAI_MODEL").unwrap_or(defaults.model);
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url);

        let timeout = env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let raw_log_path = match env::var("LLM_RAW_LOG") {
            Ok(path) if path.is_empty() => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => defaults.raw_log_path,
        };

        let rate_limit_per_minute = env::var("LLM_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);

        Self {
            api_key,
            model,
            base_url,
            timeout,
            raw_log_path,
            rate_limit_per_minute,
        }
    }
}

/// A source of raw model output for a symptom description
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Ask the model about the symptoms and return its raw text
    async fn complete(&self, symptoms: &str) -> Result<String, LlmError>;

    /// Short description of the backing model, for health reports
    fn describe(&self) -> String;
}

/// Append-only log of raw model outputs
#[derive(Debug, Clone, Default)]
pub struct RawOutputLog {
    path: Option<PathBuf>,
}

impl RawOutputLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Append a marker line and the text. Failures are logged and ignored.
    pub async fn append(&self, marker: &str, text: &str) {
        let Some(path) = &self.path else {
            return;
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    debug!("Could not create raw log directory {:?}: {}", parent, e);
                    return;
                }
            }
        }

        let entry = format!("----{}----\n{}\n", marker, text);
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(entry.as_bytes()).await
        }
        .await;

        if let Err(e) = result {
            debug!("Could not write raw LLM output to {:?}: {}", path, e);
        }
    }
}

/// Fixed one-minute window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    limit_per_minute: u32,
    window: Mutex<(Instant, u32)>,
}

impl RateLimiter {
    /// A limit of 0 allows every call
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            limit_per_minute,
            window: Mutex::new((Instant::now(), 0)),
        }
    }

    /// Consume one call from the current window
    pub fn allow(&self) -> bool {
        if self.limit_per_minute == 0 {
            return true;
        }

        let mut window = match self.window.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if window.0.elapsed() >= Duration::from_secs(60) {
            *window = (Instant::now(), 0);
        }

        if window.1 < self.limit_per_minute {
            window.1 += 1;
            true
        } else {
            false
        }
    }
}

/// Well-formed output in the shape the model is asked to produce
pub fn mock_llm_output(symptoms: &str) -> String {
    serde_json::json!({
        "input": symptoms,
        "probable_conditions": [
            {
                "condition": UNCLEAR_CONDITION,
                "rationale": "Based on matching keywords.",
                "confidence": "low",
                "relative_score": 0.0
            }
        ],
        "recommended_next_steps": [
            "Educational only. Monitor symptoms and consult a healthcare provider if worsening.",
            "If severe or emergency signs: seek emergency care."
        ],
        "disclaimer": "Educational use only. Not medical advice."
    })
    .to_string()
}

/// Offline stand-in for the model
#[derive(Debug, Clone, Default)]
pub struct OfflineLlmClient {
    raw_log: RawOutputLog,
}

impl OfflineLlmClient {
    pub fn new(raw_log: RawOutputLog) -> Self {
        Self { raw_log }
    }
}

#[async_trait]
impl LlmClient for OfflineLlmClient {
    async fn complete(&self, symptoms: &str) -> Result<String, LlmError> {
        let raw = mock_llm_output(symptoms);
        self.raw_log.append("MOCK CALL", &raw).await;
        Ok(raw)
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint
#[derive(Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    raw_log: RawOutputLog,
    limiter: RateLimiter,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            raw_log: RawOutputLog::new(config.raw_log_path.clone()),
            limiter: RateLimiter::new(config.rate_limit_per_minute),
        }
    }

    async fn request(&self, symptoms: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_MESSAGE.to_string() },
                ChatMessage { role: "user", content: PROMPT_TEMPLATE.replace("{symptoms}", symptoms) },
            ],
            temperature: 0.0,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let response: ChatResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, symptoms: &str) -> Result<String, LlmError> {
        if !self.limiter.allow() {
            warn!("LLM rate limit exceeded");
            return Err(LlmError::RateLimited);
        }

        match self.request(symptoms).await {
            Ok(text) => {
                self.raw_log.append("CALL", &text).await;
                Ok(text)
            },
            Err(e) => {
                error!("LLM call failed, using mock output: {}", e);
                self.raw_log.append("OPENAI_ERROR", &e.to_string()).await;
                let text = mock_llm_output(symptoms);
                self.raw_log.append("FALLBACK_MOCK_OUTPUT", &text).await;
                Ok(text)
            }
        }
    }

    fn describe(&self) -> String {
        self.model.clone()
    }
}

/// Pick the client implied by the configuration
pub fn create_llm_client(config: &LlmConfig) -> Arc<dyn LlmClient> {
    match &config.api_key {
        Some(key) => {
            info!("Using LLM model {} at {}", config.model, config.base_url);
            Arc::new(OpenAiClient::new(config, key.clone()))
        },
        None => {
            info!("OPENAI_API_KEY not set, using mock LLM");
            Arc::new(OfflineLlmClient::new(RawOutputLog::new(config.raw_log_path.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, raw_log: Option<PathBuf>) -> LlmConfig {
        LlmConfig {
            api_key: Some("test-key".to_string()),
            base_url: server.uri(),
            raw_log_path: raw_log,
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_mock_output_is_valid_json() {
        let value: serde_json::Value = serde_json::from_str(&mock_llm_output("mild rash")).unwrap();
        assert_eq!(value["input"], "mild rash");
        assert_eq!(value["probable_conditions"][0]["confidence"], "low");
        assert_eq!(value["recommended_next_steps"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_rate_limiter() {
        let unlimited = RateLimiter::new(0);
        assert!((0..1000).all(|_| unlimited.allow()));

        let limiter = RateLimiter::new(2);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[tokio::test]
    async fn test_mock_client_writes_raw_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("logs").join("raw.txt");
        let client = OfflineLlmClient::new(RawOutputLog::new(Some(log_path.clone())));

        let raw = client.complete("itchy eyes").await.unwrap();
        assert!(raw.contains("itchy eyes"));

        let logged = std::fs::read_to_string(&log_path).unwrap();
        assert!(logged.starts_with("----MOCK CALL----\n"));
        assert!(logged.contains("itchy eyes"));
    }

    #[tokio::test]
    async fn test_raw_log_write_failure_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let log = RawOutputLog::new(Some(blocker.join("raw.txt")));
        log.append("CALL", "ignored").await;

        let client = OfflineLlmClient::new(RawOutputLog::new(Some(blocker.join("logs").join("raw.txt"))));
        let raw = client.complete("sneezing").await.unwrap();
        assert!(raw.contains("sneezing"));
        assert_eq!(std::fs::read(&blocker).unwrap(), b"not a directory");
    }

    #[tokio::test]
    async fn test_create_client_without_key_is_mock() {
        let client = create_llm_client(&LlmConfig { raw_log_path: None, ..LlmConfig::default() });
        assert_eq!(client.describe(), "mock");
    }

    #[tokio::test]
    async fn test_openai_client_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"input\":\"x\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("raw.txt");
        let client = OpenAiClient::new(&config_for(&server, Some(log_path.clone())), "test-key".to_string());

        let text = client.complete("x").await.unwrap();
        assert_eq!(text, "{\"input\":\"x\"}");
        assert!(std::fs::read_to_string(&log_path).unwrap().contains("----CALL----"));
    }

    #[tokio::test]
    async fn test_openai_client_falls_back_to_mock_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("raw.txt");
        let client = OpenAiClient::new(&config_for(&server, Some(log_path.clone())), "test-key".to_string());

        let text = client.complete("odd tingling").await.unwrap();
        assert_eq!(text, mock_llm_output("odd tingling"));

        let logged = std::fs::read_to_string(&log_path).unwrap();
        assert!(logged.contains("----OPENAI_ERROR----"));
        assert!(logged.contains("----FALLBACK_MOCK_OUTPUT----"));
    }

    #[tokio::test]
    async fn test_openai_client_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let config = LlmConfig { rate_limit_per_minute: 1, ..config_for(&server, None) };
        let client = OpenAiClient::new(&config, "test-key".to_string());

        assert!(client.complete("a").await.is_ok());
        assert!(matches!(client.complete("b").await, Err(LlmError::RateLimited)));
    }
}
