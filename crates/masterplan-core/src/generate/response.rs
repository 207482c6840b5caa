//! Parsing the upstream text into a [`GeneratedPlanDraft`].
//!
//! The model is asked for bare JSON but often wraps it in a Markdown code
//! fence or a sentence of preamble. Both are stripped before parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use super::error::GenerationError;
use crate::channels::{ChannelFormatTable, validate_format};
use crate::metrics::{CampaignMetrics, lenient};
use crate::period::MonthKey;

/// One campaign as generated, before objective seeding and reconciliation.
///
/// Serializes flat (labels and metrics side by side). Deserialization reads
/// the same object twice, once for the labels and once for the metrics, so
/// the Portuguese field aliases of both halves are honoured.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDraft {
    pub name: String,
    pub campaign_type: String,
    pub channel: String,
    pub format: String,
    #[serde(flatten)]
    pub metrics: CampaignMetrics,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftLabels {
    #[serde(default, alias = "nome", deserialize_with = "lenient::text")]
    name: String,
    #[serde(
        default,
        alias = "tipoCampanha",
        alias = "type",
        deserialize_with = "lenient::text"
    )]
    campaign_type: String,
    #[serde(default, alias = "canal", deserialize_with = "lenient::text")]
    channel: String,
    #[serde(default, alias = "formato", deserialize_with = "lenient::text")]
    format: String,
}

impl<'de> Deserialize<'de> for CampaignDraft {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let labels = DraftLabels::deserialize(&value).map_err(de::Error::custom)?;
        let metrics = CampaignMetrics::deserialize(&value).map_err(de::Error::custom)?;
        Ok(Self {
            name: labels.name,
            campaign_type: labels.campaign_type,
            channel: labels.channel,
            format: labels.format,
            metrics,
        })
    }
}

/// Plan-level fields the model may fill in. All optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMeta {
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "lenient::text")]
    pub campaign_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "lenient::text")]
    pub objective: String,
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "lenient::text")]
    pub target_audience: String,
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "lenient::text")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total_investment: f64,
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "lenient::text")]
    pub ai_image_prompt: String,
}

/// A generated plan, owned by one generation request.
///
/// Buckets iterate in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlanDraft {
    #[serde(flatten)]
    pub meta: DraftMeta,
    pub months: BTreeMap<MonthKey, Vec<CampaignDraft>>,
}

impl GeneratedPlanDraft {
    pub fn campaign_count(&self) -> usize {
        self.months.values().map(Vec::len).sum()
    }

    /// Sum of campaign budgets in bucket `key`.
    pub fn bucket_total(&self, key: &MonthKey) -> f64 {
        self.months
            .get(key)
            .map(|campaigns| campaigns.iter().map(|c| c.metrics.budget).sum())
            .unwrap_or(0.0)
    }

    /// Restrict the draft to the requested buckets.
    ///
    /// Buckets outside `keys` are dropped and returned. A requested bucket
    /// that is missing or has no campaigns cannot carry its share of the
    /// budget and fails the draft.
    pub fn align_buckets(&mut self, keys: &[MonthKey]) -> Result<Vec<MonthKey>, GenerationError> {
        let unrequested: Vec<MonthKey> = self
            .months
            .keys()
            .filter(|key| !keys.contains(key))
            .copied()
            .collect();
        for key in &unrequested {
            self.months.remove(key);
            tracing::warn!(month = %key, "dropped bucket outside the requested period");
        }

        let missing: Vec<String> = keys
            .iter()
            .filter(|key| self.months.get(key).is_none_or(Vec::is_empty))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(GenerationError::ParseFailure(format!(
                "response has no campaigns for {}",
                missing.join(", ")
            )));
        }
        Ok(unrequested)
    }

    /// Replace every format that is not valid for its channel. Returns the
    /// number of campaigns changed.
    pub fn repair_formats(&mut self, table: &ChannelFormatTable) -> usize {
        let mut repaired = 0;
        for (key, campaigns) in self.months.iter_mut() {
            for campaign in campaigns.iter_mut() {
                let valid = validate_format(&campaign.channel, &campaign.format, table);
                if valid != campaign.format {
                    tracing::warn!(
                        month = %key,
                        channel = %campaign.channel,
                        from = %campaign.format,
                        to = %valid,
                        "repaired campaign format"
                    );
                    campaign.format = valid;
                    repaired += 1;
                }
            }
        }
        repaired
    }
}

/// Remove a surrounding Markdown fence and any text outside the outermost
/// JSON object.
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.split_once('\n').map(|(_, after)| after).unwrap_or("");
        body = body.trim_end();
        body = body.strip_suffix("```").unwrap_or(body).trim();
    }
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    }
}

/// Parse the model's response text.
///
/// Fails when the text is not JSON, has no `months` object, has no
/// buckets, or uses a bucket key that is not a month key. Buckets whose keys
/// name the same month are merged.
pub fn parse_plan_response(text: &str) -> Result<GeneratedPlanDraft, GenerationError> {
    let body = strip_code_fences(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GenerationError::ParseFailure(format!("invalid JSON: {e}")))?;
    if !value.is_object() {
        return Err(GenerationError::ParseFailure(
            "response is not a JSON object".into(),
        ));
    }

    let meta = DraftMeta::deserialize(&value)
        .map_err(|e| GenerationError::ParseFailure(format!("invalid plan fields: {e}")))?;
    let raw_months: BTreeMap<String, Option<Vec<CampaignDraft>>> = match value.get("months") {
        Some(months @ Value::Object(_)) => BTreeMap::deserialize(months)
            .map_err(|e| GenerationError::ParseFailure(format!("invalid campaign: {e}")))?,
        _ => {
            return Err(GenerationError::ParseFailure(
                "response has no \"months\" object".into(),
            ));
        }
    };
    if raw_months.is_empty() {
        return Err(GenerationError::ParseFailure(
            "response has no monthly buckets".into(),
        ));
    }

    let mut months: BTreeMap<MonthKey, Vec<CampaignDraft>> = BTreeMap::new();
    for (key, campaigns) in raw_months {
        let month: MonthKey = key
            .parse()
            .map_err(|e| GenerationError::ParseFailure(format!("{e}")))?;
        months
            .entry(month)
            .or_default()
            .extend(campaigns.unwrap_or_default());
    }

    Ok(GeneratedPlanDraft { meta, months })
}
