use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::types::{
    ActivityKind, ActivityRecord, ActivityStats, ActivitySummary, RawActivity, Side, TimeRange,
    UNKNOWN_MARKET,
};

/// Day-key format. Fixed width, so lexicographic order is chronological order.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

const SECS_PER_DAY: i64 = 86_400;

/// Map a raw activity to its canonical shape, substituting defaults for
/// missing or malformed fields instead of rejecting the record.
pub fn normalize(raw: &RawActivity) -> ActivityRecord {
    let timestamp = raw
        .timestamp
        .as_ref()
        .and_then(|t| t.as_i64())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(|| {
            debug!("Activity without a usable timestamp, defaulting to epoch");
            DateTime::<Utc>::default()
        });

    let market_id = raw
        .condition_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(raw.market_id.as_deref())
        .unwrap_or_default()
        .to_string();

    let market_question = raw
        .title
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_MARKET)
        .to_string();

    ActivityRecord {
        kind: ActivityKind::parse(raw.kind.as_deref()),
        timestamp,
        market_id,
        market_question,
        side: Side::parse(raw.side.as_deref()),
        outcome: raw.outcome.clone(),
        outcome_index: raw.outcome_index.as_ref().and_then(|i| i.as_i64()),
        size: raw.size.as_ref().and_then(|v| v.as_decimal()),
        usdc_size: raw.usdc_size.as_ref().and_then(|v| v.as_decimal()),
        price: raw.price.as_ref().and_then(|v| v.as_decimal()),
    }
}

/// Calendar day key (`YYYY-MM-DD`) of `instant` as seen in `tz`.
pub fn fold_day_key<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> String {
    instant
        .with_timezone(tz)
        .date_naive()
        .format(DAY_KEY_FORMAT)
        .to_string()
}

/// Day key in the viewer's local timezone.
pub fn local_day_key(instant: &DateTime<Utc>) -> String {
    fold_day_key(instant, &Local)
}

/// Drop exact repeats produced by overlapping pages.
///
/// Two raw records are the same activity when they share a transaction hash,
/// market, outcome, side, timestamp and size. Records without a hash are kept.
pub fn dedupe(raws: Vec<RawActivity>) -> Vec<RawActivity> {
    let mut seen: HashSet<String> = HashSet::new();
    let before = raws.len();
    let kept: Vec<RawActivity> = raws
        .into_iter()
        .filter(|raw| match dedup_key(raw) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect();
    if kept.len() < before {
        debug!("Dropped {} duplicate activities", before - kept.len());
    }
    kept
}

fn dedup_key(raw: &RawActivity) -> Option<String> {
    let hash = raw.transaction_hash.as_deref().filter(|h| !h.is_empty())?;
    let market = raw
        .condition_id
        .as_deref()
        .or(raw.market_id.as_deref())
        .unwrap_or_default();
    let outcome = raw
        .outcome_index
        .as_ref()
        .and_then(|i| i.as_i64())
        .map(|i| i.to_string())
        .or_else(|| raw.outcome.clone())
        .unwrap_or_default();
    let side = raw.side.as_deref().unwrap_or_default();
    let ts = raw.timestamp.as_ref().and_then(|t| t.as_i64()).unwrap_or_default();
    let size = raw
        .size
        .as_ref()
        .and_then(|s| s.as_decimal())
        .map(|d| d.normalize().to_string())
        .unwrap_or_default();
    Some(format!("{hash}|{market}|{outcome}|{side}|{ts}|{size}"))
}

/// Compute statistics over `records`, bucketing days in the local timezone.
pub fn aggregate(records: &[ActivityRecord]) -> ActivityStats {
    aggregate_in(records, &Local)
}

/// Compute statistics over `records`, bucketing days in `tz`.
///
/// Result does not depend on the order of `records`.
pub fn aggregate_in<Tz: TimeZone>(records: &[ActivityRecord], tz: &Tz) -> ActivityStats {
    let mut markets: HashSet<&str> = HashSet::new();
    let mut predictions: HashSet<(&str, String)> = HashSet::new();
    let mut activity_by_date: HashMap<String, u32> = HashMap::new();
    let mut date_joined: Option<DateTime<Utc>> = None;
    let mut total_predictions = 0;

    for record in records {
        markets.insert(record.market_id.as_str());
        *activity_by_date
            .entry(fold_day_key(&record.timestamp, tz))
            .or_insert(0) += 1;

        if date_joined.is_none_or(|joined| record.timestamp < joined) {
            date_joined = Some(record.timestamp);
        }

        if record.side == Side::Buy {
            total_predictions += 1;
            let outcome = record
                .outcome_index
                .map(|i| i.to_string())
                .or_else(|| record.outcome.clone())
                .unwrap_or_default();
            predictions.insert((record.market_id.as_str(), outcome));
        }
    }

    let longest_streak = longest_streak(&activity_by_date);

    ActivityStats {
        total_predictions,
        total_markets: markets.len(),
        date_joined,
        activity_by_date,
        longest_streak,
        distinct_predictions: predictions.len(),
    }
}

/// Longest run of consecutive calendar days with at least one activity.
///
/// Keys that are not `YYYY-MM-DD` dates are ignored.
pub fn longest_streak(activity_by_date: &HashMap<String, u32>) -> u32 {
    let mut keys: Vec<&str> = activity_by_date
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(key, _)| key.as_str())
        .collect();
    keys.sort_unstable();

    let mut max_streak = 0;
    let mut current = 0;
    let mut prev: Option<NaiveDate> = None;

    for key in keys {
        let Ok(date) = NaiveDate::parse_from_str(key, DAY_KEY_FORMAT) else {
            continue;
        };
        current = match prev {
            Some(p) if (date - p).num_days() == 1 => current + 1,
            _ => 1,
        };
        max_streak = max_streak.max(current);
        prev = Some(date);
    }
    max_streak
}

/// De-duplicate, normalize, order newest first and aggregate, in local time.
pub fn summarize(raws: Vec<RawActivity>) -> ActivitySummary {
    summarize_in(raws, &Local)
}

pub fn summarize_in<Tz: TimeZone>(raws: Vec<RawActivity>, tz: &Tz) -> ActivitySummary {
    let mut records: Vec<ActivityRecord> = dedupe(raws).iter().map(normalize).collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let stats = aggregate_in(&records, tz);
    ActivitySummary { records, stats }
}

/// Range to show first for an account: the shortest one covering its history.
pub fn default_range(date_joined: Option<DateTime<Utc>>, now: DateTime<Utc>) -> TimeRange {
    let Some(joined) = date_joined else {
        return TimeRange::Year;
    };
    let secs = (now - joined).num_seconds().max(0);
    let days = (secs + SECS_PER_DAY - 1) / SECS_PER_DAY;
    if days <= i64::from(TimeRange::Month.days()) {
        TimeRange::Month
    } else if days <= i64::from(TimeRange::Quarter.days()) {
        TimeRange::Quarter
    } else {
        TimeRange::Year
    }
}
