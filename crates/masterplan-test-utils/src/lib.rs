//! Shared test utilities for masterplan integration tests.
//!
//! Provides a scripted [`GenerationService`] that replays canned outcomes
//! and records what it was asked, plus builders for the JSON plan bodies
//! the model is expected to return.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use masterplan_core::service::{CallOutcome, GenerationRequest, GenerationService, UpstreamSignal};

// ---------------------------------------------------------------------------
// Scripted service
// ---------------------------------------------------------------------------

/// A [`GenerationService`] that answers from a fixed script.
///
/// Outcomes are returned in order. Once the script is down to its last
/// entry, that entry repeats forever.
pub struct ScriptedService {
    script: Mutex<VecDeque<CallOutcome>>,
    latency: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedService {
    pub fn new(script: impl IntoIterator<Item = CallOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer `text`.
    pub fn completing(text: impl Into<String>) -> Self {
        Self::new([CallOutcome::Completed(text.into())])
    }

    /// Sleep for `latency` before every answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Prompt of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests.lock().unwrap().last().map(|r| r.prompt.clone())
    }

    fn next_outcome(&self) -> CallOutcome {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| CallOutcome::Completed(String::new()))
        }
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> CallOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.next_outcome()
    }
}

// ---------------------------------------------------------------------------
// Outcome shorthands
// ---------------------------------------------------------------------------

/// A 503 "model overloaded" failure.
pub fn overloaded() -> CallOutcome {
    CallOutcome::Transient(UpstreamSignal::new(
        Some(503),
        "The model is overloaded. Please try again later.",
    ))
}

/// A 429 quota failure.
pub fn quota_exhausted() -> CallOutcome {
    CallOutcome::Permanent(UpstreamSignal::new(
        Some(429),
        "RESOURCE_EXHAUSTED: quota exceeded for this project",
    ))
}

/// A 400 rejection.
pub fn rejected() -> CallOutcome {
    CallOutcome::Permanent(UpstreamSignal::new(Some(400), "INVALID_ARGUMENT"))
}

// ---------------------------------------------------------------------------
// Response fixtures
// ---------------------------------------------------------------------------

/// A generated campaign object using the model's Portuguese keys.
pub fn campaign_json(name: &str, campaign_type: &str, channel: &str, format: &str, budget: f64) -> Value {
    json!({
        "nome": name,
        "tipoCampanha": campaign_type,
        "canal": channel,
        "formato": format,
        "budget": budget,
    })
}

/// A full plan response body with the given month buckets.
pub fn plan_json(campaign_name: &str, months: Vec<(&str, Vec<Value>)>) -> String {
    let months: serde_json::Map<String, Value> = months
        .into_iter()
        .map(|(key, campaigns)| (key.to_string(), Value::Array(campaigns)))
        .collect();
    json!({
        "campaignName": campaign_name,
        "objective": "Vendas",
        "targetAudience": "Adultos 25-45",
        "location": "São Paulo",
        "aiImagePrompt": "pão artesanal em mesa de madeira",
        "months": months,
    })
    .to_string()
}

/// Wrap `body` in a Markdown JSON code fence with some chatter around it.
pub fn fenced(body: &str) -> String {
    format!("Aqui está o plano:\n```json\n{body}\n```\n")
}
