//! Google Gemini adapter over the `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::trait_def::GenerationService;
use super::types::{CallOutcome, GenerationRequest, UpstreamSignal};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL without a trailing slash.
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`GenerationService`] backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("masterplan/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn body(request: &GenerationRequest) -> serde_json::Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }],
            }],
        });
        if request.json_output {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        body
    }

    fn transport_failure(err: &reqwest::Error) -> CallOutcome {
        let signal = UpstreamSignal::new(err.status().map(|s| s.as_u16()), err.to_string());
        if err.is_timeout() || err.is_connect() {
            CallOutcome::Transient(signal)
        } else {
            CallOutcome::from_signal(signal)
        }
    }
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl GenerationService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> CallOutcome {
        let response = match self
            .http
            .post(self.url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&Self::body(request))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "gemini request failed before a response");
                return Self::transport_failure(&err);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return Self::transport_failure(&err),
        };

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "gemini returned an error status");
            return CallOutcome::from_signal(UpstreamSignal::new(Some(status.as_u16()), body));
        }

        match serde_json::from_str::<GenerateContentResponse>(&body) {
            Ok(parsed) => CallOutcome::Completed(candidate_text(&parsed)),
            Err(err) => CallOutcome::Permanent(UpstreamSignal::new(
                Some(status.as_u16()),
                format!("unreadable response envelope: {err}"),
            )),
        }
    }
}
