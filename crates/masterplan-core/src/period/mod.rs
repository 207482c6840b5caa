//! Calendar months: the canonical month-name catalog and bucket keys.
//!
//! Plan buckets are keyed `"<year>-<Month>"` with the canonical pt-BR month
//! names (`2026-Fevereiro`). English names and accent-free spellings are
//! accepted as aliases when reading.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical month names, January first.
pub const MONTHS: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Ordered month names used to recognise months in free text.
///
/// Index `i` of the catalog is month `i` (0 = January). Each month has a
/// canonical display name and any number of aliases; matching is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCatalog {
    names: Vec<Vec<String>>,
}

impl MonthCatalog {
    /// Build a catalog from twelve canonical names.
    pub fn new(canonical: [&str; 12]) -> Self {
        Self {
            names: canonical.iter().map(|n| vec![n.to_string()]).collect(),
        }
    }

    /// Add an alias for month `index`. Out-of-range indexes are ignored.
    pub fn with_alias(mut self, index: usize, alias: &str) -> Self {
        if let Some(entry) = self.names.get_mut(index) {
            entry.push(alias.to_string());
        }
        self
    }

    /// The canonical pt-BR catalog with English and accent-free aliases.
    pub fn portuguese() -> Self {
        let mut catalog = Self::new(MONTHS).with_alias(2, "Marco");
        for (i, name) in ENGLISH_MONTHS.iter().enumerate() {
            catalog = catalog.with_alias(i, name);
        }
        catalog
    }

    /// Zero-based month index for `name`, if it is a known month.
    pub fn index_of(&self, name: &str) -> Option<u32> {
        let needle = name.trim().to_lowercase();
        self.names
            .iter()
            .position(|aliases| aliases.iter().any(|a| a.to_lowercase() == needle))
            .map(|i| i as u32)
    }

    /// Canonical name of month `index`.
    pub fn name(&self, index: u32) -> Option<&str> {
        self.names
            .get(index as usize)
            .and_then(|aliases| aliases.first())
            .map(|s| s.as_str())
    }
}

impl Default for MonthCatalog {
    fn default() -> Self {
        Self::portuguese()
    }
}

// ---------------------------------------------------------------------------
// Month keys
// ---------------------------------------------------------------------------

/// A calendar month used as a plan bucket key.
///
/// Orders chronologically (year first, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    /// Zero-based month index (0 = January).
    pub month: u32,
}

impl MonthKey {
    /// Build a key; `month` is reduced modulo 12 into the right year.
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year: year + (month / 12) as i32,
            month: month % 12,
        }
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month0())
    }

    /// The key `n` months after this one.
    pub fn plus_months(self, n: u32) -> Self {
        Self::new(self.year, self.month + n)
    }

    /// `count` consecutive months starting at this one.
    pub fn span(self, count: u32) -> Vec<MonthKey> {
        (0..count).map(|i| self.plus_months(i)).collect()
    }

    /// Canonical month name for this key.
    pub fn month_name(&self) -> &'static str {
        MONTHS[self.month as usize % 12]
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month_name())
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, name) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| MonthKeyParseError(s.to_owned()))?;
        let year: i32 = year
            .trim()
            .parse()
            .map_err(|_| MonthKeyParseError(s.to_owned()))?;
        let month = MonthCatalog::portuguese()
            .index_of(name)
            .ok_or_else(|| MonthKeyParseError(s.to_owned()))?;
        Ok(Self { year, month })
    }
}

/// Error returned when parsing an invalid [`MonthKey`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid month key: {0:?} (expected e.g. \"2026-Fevereiro\")")]
pub struct MonthKeyParseError(pub String);

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
