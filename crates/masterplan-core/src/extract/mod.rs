//! Planning-constraint extraction from a free-text request.
//!
//! Looks for a month range ("fevereiro a agosto de 2026") and a monetary
//! budget ("R$ 50.000", "orçamento de 80 mil") with ordered regex cascades.
//! The first pattern that yields a valid value wins. Nothing here fails: an
//! unrecognised month, an out-of-range year or a non-positive amount just
//! means "no match" and the next pattern is tried.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::period::{MonthCatalog, MonthKey};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Period and budget for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanConstraints {
    /// Zero-based start month (0 = January).
    pub start_month: u32,
    pub start_year: i32,
    /// Zero-based end month, inclusive.
    pub end_month: u32,
    pub end_year: i32,
    /// Number of monthly buckets, at least 1.
    pub month_count: u32,
    pub total_budget: f64,
}

impl PlanConstraints {
    /// First bucket of the plan.
    pub fn start_key(&self) -> MonthKey {
        MonthKey::new(self.start_year, self.start_month)
    }

    /// Every bucket key, in chronological order.
    pub fn bucket_keys(&self) -> Vec<MonthKey> {
        self.start_key().span(self.month_count.max(1))
    }
}

/// Tunables for [`extract_constraints`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub months: MonthCatalog,
    /// Accepted year range, inclusive.
    pub min_year: i32,
    pub max_year: i32,
    /// Longest plan accepted from an explicit range or month count.
    pub max_months: u32,
    /// Plan length when the request names no period.
    pub default_months: u32,
    /// Budget when the request names none. Supplied by the caller.
    pub default_budget: f64,
}

impl ExtractorConfig {
    pub const DEFAULT_BUDGET: f64 = 20_000.0;
    pub const DEFAULT_MONTHS: u32 = 3;
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            months: MonthCatalog::portuguese(),
            min_year: 2020,
            max_year: 2050,
            max_months: 36,
            default_months: Self::DEFAULT_MONTHS,
            default_budget: Self::DEFAULT_BUDGET,
        }
    }
}

/// A detected period, before the budget is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Period {
    start: MonthKey,
    month_count: u32,
}

impl Period {
    fn end(&self) -> MonthKey {
        self.start.plus_months(self.month_count.saturating_sub(1))
    }

    fn with_budget(self, total_budget: f64) -> PlanConstraints {
        let end = self.end();
        PlanConstraints {
            start_month: self.start.month,
            start_year: self.start.year,
            end_month: end.month,
            end_year: end.year,
            month_count: self.month_count,
            total_budget,
        }
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Separators between the two months of a range.
const RANGE_SEP: &str = r"(?:\s+(?:a|até|ate|ao|e|to|until|through)\s+|\s*[-–]\s*)";

/// Range with a year on each side: "novembro de 2025 a fevereiro de 2026".
static RANGE_TWO_YEARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<start>\p{{L}}+)\s+(?:(?:de|of)\s+)?(?P<start_year>\d{{4}}){RANGE_SEP}(?P<end>\p{{L}}+)\s+(?:(?:de|of)\s+)?(?P<end_year>\d{{4}})\b"
    ))
    .expect("two-year range regex")
});

/// Range sharing a trailing year: "fevereiro a agosto de 2026".
static RANGE_TRAILING_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<start>\p{{L}}+){RANGE_SEP}(?P<end>\p{{L}}+)(?:\s+(?:de|of)\s+|\s*,\s*|\s+)(?P<year>\d{{4}})\b"
    ))
    .expect("trailing-year range regex")
});

/// Range sharing a leading year: "janeiro de 2026 até março".
static RANGE_LEADING_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<start>\p{{L}}+)\s+(?:(?:de|of)\s+)?(?P<year>\d{{4}}){RANGE_SEP}(?P<end>\p{{L}}+)\b"
    ))
    .expect("leading-year range regex")
});

/// Bare month count: "6 meses", "4 months".
static MONTH_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?P<count>\d{1,2})\s*(?:meses|mês|mes|months?)\b").expect("month count regex")
});

/// Currency symbol: "R$ 50.000", "$12k".
static BUDGET_SYMBOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:R\$|US\$|\$|€|£)\s*(?P<num>\d[\d.,]*)(?:\s*(?P<mult>mil\b|k\b|thousand\b))?")
        .expect("currency symbol regex")
});

/// Labelled amount: "orçamento de 30.000", "budget: 15000".
static BUDGET_LABELLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:investimento|orçamento|orcamento|verba|budget|investment)\b\D{0,40}?(?P<num>\d[\d.,]*)(?:\s*(?P<mult>mil\b|k\b|thousand\b))?",
    )
    .expect("labelled budget regex")
});

/// Rest of a labelled phrase after a skipped year: "verba para março de 2027 de 5.000".
static BUDGET_CONTINUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\D{0,40}?(?P<num>\d[\d.,]*)(?:\s*(?P<mult>mil\b|k\b|thousand\b))?")
        .expect("labelled budget continuation regex")
});

/// Thousand shorthand: "80 mil", "25k".
static BUDGET_THOUSANDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?P<num>\d[\d.,]*)\s*(?P<mult>mil|k|thousand)\b").expect("thousands regex")
});

/// Amount followed by a currency word: "50000 reais".
static BUDGET_CURRENCY_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?P<num>\d[\d.,]*)\s*(?:reais|real|dólares|dolares|dollars|euros|brl|usd|eur)\b")
        .expect("currency word regex")
});

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract period and budget from `prompt`.
///
/// Returns `None` when the prompt names neither a period nor a budget, in
/// which case the caller applies its defaults. When only one of them is
/// found, the other comes from `config` (the period defaults to
/// `config.default_months` months starting at `now`).
pub fn extract_constraints(
    prompt: &str,
    now: NaiveDate,
    config: &ExtractorConfig,
) -> Option<PlanConstraints> {
    let period = extract_period(prompt, now, config);
    let budget = extract_budget(prompt, config);

    if period.is_none() && budget.is_none() {
        return None;
    }

    let period = period.unwrap_or_else(|| default_period(now, config));
    Some(period.with_budget(budget.unwrap_or(config.default_budget)))
}

/// Like [`extract_constraints`], but falls back to the configured defaults
/// when nothing explicit is found.
pub fn resolve_constraints(
    prompt: &str,
    now: NaiveDate,
    config: &ExtractorConfig,
) -> PlanConstraints {
    match extract_constraints(prompt, now, config) {
        Some(constraints) => constraints,
        None => {
            tracing::warn!(
                default_months = config.default_months,
                default_budget = config.default_budget,
                "no explicit period or budget in prompt, applying defaults"
            );
            default_period(now, config).with_budget(config.default_budget)
        }
    }
}

fn default_period(now: NaiveDate, config: &ExtractorConfig) -> Period {
    Period {
        start: MonthKey::from_date(now),
        month_count: config.default_months.max(1),
    }
}

/// Range patterns first, then a bare month count anchored at `now`.
fn extract_period(prompt: &str, now: NaiveDate, config: &ExtractorConfig) -> Option<Period> {
    let range = first_valid(&RANGE_TWO_YEARS, prompt, |caps| {
        two_year_range(caps, config)
    })
    .or_else(|| {
        first_valid(&RANGE_TRAILING_YEAR, prompt, |caps| {
            shared_year_range(caps, config)
        })
    })
    .or_else(|| {
        first_valid(&RANGE_LEADING_YEAR, prompt, |caps| {
            shared_year_range(caps, config)
        })
    });

    if range.is_some() {
        return range;
    }

    first_valid(&MONTH_COUNT, prompt, |caps| {
        let count: u32 = caps.name("count")?.as_str().parse().ok()?;
        (1..=config.max_months).contains(&count).then(|| Period {
            start: MonthKey::from_date(now),
            month_count: count,
        })
    })
}

fn first_valid<T>(
    regex: &Regex,
    text: &str,
    mut accept: impl FnMut(&Captures<'_>) -> Option<T>,
) -> Option<T> {
    regex.captures_iter(text).find_map(|caps| accept(&caps))
}

fn month(caps: &Captures<'_>, group: &str, config: &ExtractorConfig) -> Option<u32> {
    config.months.index_of(caps.name(group)?.as_str())
}

fn year(caps: &Captures<'_>, group: &str, config: &ExtractorConfig) -> Option<i32> {
    let year: i32 = caps.name(group)?.as_str().parse().ok()?;
    (config.min_year..=config.max_year)
        .contains(&year)
        .then_some(year)
}

fn two_year_range(caps: &Captures<'_>, config: &ExtractorConfig) -> Option<Period> {
    let start = month(caps, "start", config)?;
    let end = month(caps, "end", config)?;
    let start_year = year(caps, "start_year", config)?;
    let end_year = year(caps, "end_year", config)?;

    let count = (end_year - start_year) * 12 + end as i32 - start as i32 + 1;
    if count < 1 || count as u32 > config.max_months {
        return None;
    }
    Some(Period {
        start: MonthKey::new(start_year, start),
        month_count: count as u32,
    })
}

/// A range whose months share one stated year. An end month before the
/// start month rolls over into the following year.
fn shared_year_range(caps: &Captures<'_>, config: &ExtractorConfig) -> Option<Period> {
    let start = month(caps, "start", config)?;
    let end = month(caps, "end", config)?;
    let year = year(caps, "year", config)?;

    let count = if end < start {
        (12 - start) + end + 1
    } else {
        end - start + 1
    };
    Some(Period {
        start: MonthKey::new(year, start),
        month_count: count,
    })
}

/// Try each budget pattern in order; the first positive amount wins.
fn extract_budget(prompt: &str, config: &ExtractorConfig) -> Option<f64> {
    let amount = |regex: &Regex| {
        first_valid(regex, prompt, |caps| budget_from_captures(caps, prompt, config))
    };
    amount(&*BUDGET_SYMBOL)
        .or_else(|| labelled_budget(prompt, config))
        .or_else(|| amount(&*BUDGET_THOUSANDS))
        .or_else(|| amount(&*BUDGET_CURRENCY_WORD))
}

/// A label followed by an amount. A year in between ("verba de março a
/// junho de 2027 é 40000") is skipped and the search goes on past it.
fn labelled_budget(prompt: &str, config: &ExtractorConfig) -> Option<f64> {
    BUDGET_LABELLED.captures_iter(prompt).find_map(|caps| {
        let mut num = caps.name("num")?;
        if let Some(amount) = budget_from_captures(&caps, prompt, config) {
            return Some(amount);
        }
        let mut offset = 0;
        while is_dated_year(num.as_str(), &prompt[..offset + num.start()], config) {
            offset += num.end();
            let rest = &prompt[offset..];
            let next = BUDGET_CONTINUATION.captures(rest)?;
            if let Some(amount) = budget_from_captures(&next, rest, config) {
                return Some(amount);
            }
            num = next.name("num")?;
        }
        None
    })
}

/// `haystack` is the text `caps` was matched against.
fn budget_from_captures(caps: &Captures<'_>, haystack: &str, config: &ExtractorConfig) -> Option<f64> {
    let num = caps.name("num")?;
    let multiplied = caps.name("mult").is_some();
    if !multiplied && is_dated_year(num.as_str(), &haystack[..num.start()], config) {
        return None;
    }
    let amount = normalize_amount(num.as_str())?;
    let amount = if multiplied { amount * 1000.0 } else { amount };
    (amount.is_finite() && amount > 0.0).then_some(amount)
}

/// A bare four-digit year in the accepted range that directly follows a
/// month name, optionally through "de"/"of" ("junho de 2027", "June 2027").
fn is_dated_year(raw: &str, preceding: &str, config: &ExtractorConfig) -> bool {
    let digits = raw.trim_end_matches(['.', ',']);
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(year) = digits.parse::<i32>() else {
        return false;
    };
    if !(config.min_year..=config.max_year).contains(&year) {
        return false;
    }

    let mut words = preceding
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .rev();
    let mut last = words.next();
    if last.is_some_and(|w| w.eq_ignore_ascii_case("de") || w.eq_ignore_ascii_case("of")) {
        last = words.next();
    }
    last.is_some_and(|w| config.months.index_of(w).is_some())
}

/// Read a pt-BR style numeral: `.` groups thousands, `,` marks decimals.
///
/// Without a comma every dot is treated as a grouping separator.
pub fn normalize_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_end_matches(['.', ',']);
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.replace('.', "")
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
