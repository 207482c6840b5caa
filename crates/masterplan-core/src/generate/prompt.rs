//! Structured prompt for plan generation.
//!
//! The prompt pins down everything the model must not improvise: the exact
//! total, the exact bucket keys with their budgets, the allowed channels and
//! formats, and the JSON shape of the answer.

use crate::channels::ChannelFormatTable;
use crate::extract::PlanConstraints;
use crate::period::MonthKey;
use crate::service::Language;

/// JSON shape the model must return.
const RESPONSE_SCHEMA: &str = r#"## Response format

Return ONLY a valid JSON object, with no text before or after it:

```json
{
  "campaignName": "string",
  "objective": "string",
  "targetAudience": "string",
  "location": "string",
  "totalInvestment": 20000,
  "aiImagePrompt": "string, a prompt for generating ad imagery",
  "months": {
    "<bucket key>": [
      {
        "name": "string",
        "campaignType": "Awareness | Consideration | Traffic | Conversion | Retargeting",
        "channel": "one of the channels listed below",
        "format": "one of the formats listed for that channel",
        "budget": 5000,
        "purchaseUnit": "cpc | cpm",
        "cpc": 1.5,
        "cpm": 12.0,
        "ctr": 1.8,
        "conversionRate": 3.0,
        "connectRate": 80
      }
    ]
  }
}
```

Rates (`ctr`, `conversionRate`, `connectRate`) are percentages from 0 to 100.
Do not compute impressions, clicks, conversions or costs per result; they are derived afterwards.
"#;

/// Budget-allocation rules stated in every prompt.
const ALLOCATION_RULES: &str = r#"## Budget rules

1. Use exactly the bucket keys listed above, spelled exactly as shown, and no others.
2. The campaign budgets inside each bucket must add up to that bucket's budget.
3. The budgets of all buckets must add up to the total investment.
4. Follow the funnel split of each bucket when choosing campaign types.
"#;

/// Share of a bucket's budget per funnel stage, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunnelSplit {
    pub awareness: u8,
    pub consideration: u8,
    pub conversion: u8,
}

const EARLY: FunnelSplit = FunnelSplit {
    awareness: 60,
    consideration: 30,
    conversion: 10,
};
const MIDDLE: FunnelSplit = FunnelSplit {
    awareness: 30,
    consideration: 40,
    conversion: 30,
};
const LATE: FunnelSplit = FunnelSplit {
    awareness: 10,
    consideration: 30,
    conversion: 60,
};

/// Funnel split for bucket `position` of `count`.
///
/// The first third of the plan leans to awareness, the last bucket (and the
/// last third) to conversion, and everything between is balanced. A
/// single-bucket plan is balanced.
pub fn funnel_split(position: usize, count: usize) -> FunnelSplit {
    if count <= 1 {
        return MIDDLE;
    }
    if position + 1 >= count {
        return LATE;
    }
    match position * 3 / count {
        0 => EARLY,
        1 => MIDDLE,
        _ => LATE,
    }
}

/// Build the generation prompt.
pub fn build_plan_prompt(
    user_prompt: &str,
    constraints: &PlanConstraints,
    buckets: &[(MonthKey, f64)],
    language: Language,
    table: &ChannelFormatTable,
) -> String {
    let mut prompt = String::with_capacity(4096);

    prompt.push_str(language.instruction());
    prompt.push_str("\n\n");

    prompt.push_str("# Media Plan Request\n\n");
    prompt.push_str(
        "You are a senior media planner. Build a detailed paid-media plan \
         for the request below, split into monthly buckets.\n\n",
    );
    prompt.push_str(&format!("Request: \"{}\"\n\n", user_prompt.trim()));

    // Fixed numbers.
    prompt.push_str("## Budget\n\n");
    prompt.push_str(&format!(
        "- **Total investment:** exactly {:.2}\n",
        constraints.total_budget
    ));
    prompt.push_str(&format!(
        "- **Period:** {} to {} ({} month(s))\n\n",
        constraints.start_key(),
        MonthKey::new(constraints.end_year, constraints.end_month),
        constraints.month_count
    ));

    prompt.push_str("### Buckets\n\n");
    for (position, (key, budget)) in buckets.iter().enumerate() {
        let split = funnel_split(position, buckets.len());
        prompt.push_str(&format!(
            "- `{key}`: {budget:.2} (awareness {}%, consideration {}%, conversion {}%)\n",
            split.awareness, split.consideration, split.conversion
        ));
    }
    prompt.push('\n');

    prompt.push_str(ALLOCATION_RULES);
    prompt.push('\n');

    // Allowed channels.
    prompt.push_str("## Channels and formats\n\n");
    prompt.push_str("Use only these channels, and only the formats listed for each:\n\n");
    for channel in table.channels() {
        prompt.push_str(&format!(
            "- **{}:** {}\n",
            channel.name,
            channel.formats.join(", ")
        ));
    }
    prompt.push('\n');

    prompt.push_str(RESPONSE_SCHEMA);

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::buckets::bucket_targets;

    fn constraints() -> PlanConstraints {
        PlanConstraints {
            start_month: 1,
            start_year: 2026,
            end_month: 3,
            end_year: 2026,
            month_count: 3,
            total_budget: 10_000.0,
        }
    }

    #[test]
    fn prompt_embeds_total_and_bucket_keys() {
        let c = constraints();
        let prompt = build_plan_prompt(
            "padaria em Curitiba",
            &c,
            &bucket_targets(&c),
            Language::PtBr,
            &ChannelFormatTable::default(),
        );

        assert!(prompt.starts_with("Responda em Português."));
        assert!(prompt.contains("Request: \"padaria em Curitiba\""));
        assert!(prompt.contains("exactly 10000.00"));
        assert!(prompt.contains("2026-Fevereiro to 2026-Abril (3 month(s))"));
        assert!(prompt.contains("- `2026-Fevereiro`: 3333.00 (awareness 60%"));
        assert!(prompt.contains("- `2026-Março`: 3333.00 (awareness 30%"));
        assert!(prompt.contains("- `2026-Abril`: 3334.00 (awareness 10%"));
    }

    #[test]
    fn prompt_lists_channels_and_schema() {
        let c = constraints();
        let prompt = build_plan_prompt(
            "x",
            &c,
            &bucket_targets(&c),
            Language::En,
            &ChannelFormatTable::default(),
        );

        assert!(prompt.starts_with("Respond in English."));
        assert!(prompt.contains("- **Google Ads:** Search, Display, Performance Max"));
        assert!(prompt.contains("- **TikTok Ads:** In-Feed, TopView, Spark Ads"));
        assert!(prompt.contains("## Response format"));
        assert!(prompt.contains("## Budget rules"));
        assert!(prompt.contains("\"campaignType\""));
    }

    #[test]
    fn funnel_moves_toward_conversion() {
        assert_eq!(funnel_split(0, 1), MIDDLE);
        assert_eq!(funnel_split(0, 2), EARLY);
        assert_eq!(funnel_split(1, 2), LATE);

        let seven: Vec<FunnelSplit> = (0..7).map(|i| funnel_split(i, 7)).collect();
        assert_eq!(seven[0], EARLY);
        assert_eq!(seven[2], EARLY);
        assert_eq!(seven[3], MIDDLE);
        assert_eq!(seven[5], LATE);
        assert_eq!(seven[6], LATE);

        for split in seven {
            assert_eq!(
                split.awareness + split.consideration + split.conversion,
                100
            );
        }
    }
}
