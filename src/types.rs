use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Market question used when an activity carries no title.
pub const UNKNOWN_MARKET: &str = "Unknown Market";

/// A numeric field the data API sends either as a JSON number or as a string.
/// Anything else lands in `Other` and reads as absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Lenient {
    Number(serde_json::Number),
    Text(String),
    Other(Value),
}

impl Lenient {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Lenient::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Lenient::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            Lenient::Other(_) => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        let text = match self {
            Lenient::Number(n) => n.to_string(),
            Lenient::Text(s) => s.trim().to_string(),
            Lenient::Other(_) => return None,
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    }
}

/// One activity object exactly as returned by `GET /activity`.
///
/// Every field is optional and a field of the wrong JSON type decodes as absent;
/// normalization substitutes defaults for missing ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Lenient>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub condition_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub market_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default)]
    pub size: Option<Lenient>,
    #[serde(default)]
    pub usdc_size: Option<Lenient>,
    #[serde(default)]
    pub price: Option<Lenient>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub outcome: Option<String>,
    #[serde(default)]
    pub outcome_index: Option<Lenient>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub side: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_hash: Option<String>,
}

impl RawActivity {
    /// Decode one element of an activity page. Non-object elements become an
    /// all-default record so they still count toward the page length.
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// A text field; any non-string JSON value reads as absent.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Activity category, lower-cased. Anything other than a trade keeps its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Trade,
    Other(String),
}

impl ActivityKind {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()) {
            None => ActivityKind::Trade,
            Some(s) if s.is_empty() || s == "trade" => ActivityKind::Trade,
            Some(s) => ActivityKind::Other(s),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::Trade => "trade",
            ActivityKind::Other(name) => name,
        }
    }
}

impl Serialize for ActivityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
    Unknown,
}

impl Side {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("BUY") => Side::Buy,
            Some("SELL") => Side::Sell,
            _ => Side::Unknown,
        }
    }
}

/// Canonical activity record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub timestamp: DateTime<Utc>,
    /// Condition id when present, otherwise the market id.
    pub market_id: String,
    pub market_question: String,
    pub side: Side,
    pub outcome: Option<String>,
    pub outcome_index: Option<i64>,
    pub size: Option<Decimal>,
    pub usdc_size: Option<Decimal>,
    pub price: Option<Decimal>,
}

/// Statistics derived from a full record set. Always rebuilt from scratch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityStats {
    /// Number of BUY-side records.
    pub total_predictions: usize,
    /// Number of distinct market ids.
    pub total_markets: usize,
    /// Earliest timestamp seen.
    pub date_joined: Option<DateTime<Utc>>,
    /// Local calendar day key (`YYYY-MM-DD`) → number of records that day.
    pub activity_by_date: HashMap<String, u32>,
    pub longest_streak: u32,
    /// Distinct (market, outcome) pairs among BUY records.
    #[serde(skip)]
    pub distinct_predictions: usize,
}

/// Normalized records (newest first) plus their statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivitySummary {
    pub records: Vec<ActivityRecord>,
    pub stats: ActivityStats,
}

impl ActivitySummary {
    /// The `limit` most recent records and how many were left out.
    pub fn recent(&self, limit: usize) -> (&[ActivityRecord], usize) {
        let shown = self.records.len().min(limit);
        (&self.records[..shown], self.records.len() - shown)
    }
}

/// Trailing day range the heatmap is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Month,
    Quarter,
    Year,
}

impl TimeRange {
    pub fn days(self) -> u32 {
        match self {
            TimeRange::Month => 30,
            TimeRange::Quarter => 90,
            TimeRange::Year => 365,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRange::Month => "Month",
            TimeRange::Quarter => "3 Months",
            TimeRange::Year => "Year",
        }
    }
}

/// One calendar day of the heatmap window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub date_key: String,
    pub count: u32,
}

impl DayCell {
    /// Hover text, e.g. `2024-01-02: 3 activities`.
    pub fn tooltip(&self) -> String {
        let noun = if self.count == 1 { "activity" } else { "activities" };
        format!("{}: {} {}", self.date_key, self.count, noun)
    }
}

/// Pixel dimensions available to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub tile_size_px: u32,
    pub gap_px: u32,
    pub corner_radius_px: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthLabel {
    /// Index of the day cell the label sits above.
    pub index: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatCell {
    #[serde(flatten)]
    pub day: DayCell,
    /// Colour level 0..=4.
    pub intensity: u8,
}

/// Everything needed to draw the heatmap for one range and container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    pub range: TimeRange,
    pub cells: Vec<HeatCell>,
    pub layout: GridLayout,
    pub month_labels: Vec<MonthLabel>,
    /// Highest day count inside the window.
    pub max_count: u32,
}

/// Public profile fields, as returned by the profile endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pseudonym: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.pseudonym.as_deref().filter(|s| !s.is_empty()))
    }
}
