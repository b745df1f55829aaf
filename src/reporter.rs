use std::fmt::Write as _;

use serde::Serialize;

use crate::types::{ActivityRecord, ActivityStats, Heatmap, Profile, TimeRange};

/// Glyph per colour level, lightest first.
const LEVEL_GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];

/// Machine-readable report for one account and range.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReport<'a> {
    pub address: &'a str,
    pub display_name: Option<&'a str>,
    pub profile_image: Option<&'a str>,
    pub avatar_gradient: String,
    pub range: TimeRange,
    pub stats: &'a ActivityStats,
    pub recent: &'a [ActivityRecord],
    pub more: usize,
    pub heatmap: &'a Heatmap,
}

impl<'a> AccountReport<'a> {
    pub fn new(
        address: &'a str,
        profile: Option<&'a Profile>,
        stats: &'a ActivityStats,
        recent: (&'a [ActivityRecord], usize),
        heatmap: &'a Heatmap,
    ) -> Self {
        Self {
            address,
            display_name: profile.and_then(|p| p.display_name()),
            profile_image: profile.and_then(|p| p.profile_image.as_deref()),
            avatar_gradient: avatar_gradient(address),
            range: heatmap.range,
            stats,
            recent: recent.0,
            more: recent.1,
            heatmap,
        }
    }
}

/// Emit the report as pretty-printed JSON to stdout.
pub fn report_json(report: &AccountReport<'_>) {
    if let Ok(json) = serde_json::to_string_pretty(report) {
        println!("{json}");
    }
}

/// Emit the report as plain text to stdout.
pub fn report_text(report: &AccountReport<'_>) {
    print!("{}", render_text(report));
}

/// `0x1234...abcd` for addresses long enough to shorten.
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_char_boundary(6) || !address.is_char_boundary(address.len() - 4) {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Three hues seeded by the first 8 hex digits after `0x`.
pub fn gradient_hues(address: &str) -> [u32; 3] {
    let digits: String = address
        .strip_prefix("0x")
        .unwrap_or(address)
        .chars()
        .take(8)
        .collect();
    let seed = u32::from_str_radix(&digits, 16).unwrap_or(0);
    let h1 = seed % 360;
    [h1, (h1 + 40) % 360, (h1 + 90) % 360]
}

/// CSS gradient used as a placeholder avatar.
pub fn avatar_gradient(address: &str) -> String {
    let [h1, h2, h3] = gradient_hues(address);
    format!(
        "linear-gradient(135deg, hsl({h1}, 85%, 65%), hsl({h2}, 80%, 70%), hsl({h3}, 75%, 60%))"
    )
}

pub fn render_text(report: &AccountReport<'_>) -> String {
    let mut out = String::new();
    let title = report
        .display_name
        .map(|name| format!("{name} ({})", short_address(report.address)))
        .unwrap_or_else(|| short_address(report.address));
    let _ = writeln!(out, "=== {title} ===");

    let stats = report.stats;
    let joined = stats
        .date_joined
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let _ = writeln!(out, "Total Predictions:  {}", stats.total_predictions);
    let _ = writeln!(out, "Markets Interacted: {}", stats.total_markets);
    let _ = writeln!(out, "Longest Streak:     {} days", stats.longest_streak);
    let _ = writeln!(out, "Date Joined:        {joined}");
    let _ = writeln!(out);

    let _ = writeln!(out, "--- Activity Heatmap ({}) ---", report.range.label());
    out.push_str(&render_heatmap(report.heatmap));
    let legend: String = LEVEL_GLYPHS.iter().collect();
    let _ = writeln!(out, "Less {legend} More");
    let _ = writeln!(out);

    let _ = writeln!(out, "--- Activity History ---");
    for record in report.recent {
        let _ = writeln!(
            out,
            "{:<12} {:<10} {}",
            record.timestamp.format("%Y-%m-%d"),
            record.kind.as_str(),
            record.market_question
        );
    }
    if report.more > 0 {
        let _ = writeln!(out, "... and {} more activities", report.more);
    }
    out
}

/// Grid drawn column by column, oldest cell top-left, with a month label row.
pub fn render_heatmap(heatmap: &Heatmap) -> String {
    let rows = heatmap.layout.rows.max(1) as usize;
    let columns = heatmap.cells.len().div_ceil(rows);
    let mut out = String::new();

    let mut label_line = vec![' '; columns * 2];
    for label in &heatmap.month_labels {
        let start = (label.index / rows) * 2;
        for (offset, ch) in label.label.chars().enumerate() {
            if let Some(slot) = label_line.get_mut(start + offset) {
                *slot = ch;
            }
        }
    }
    let label_line: String = label_line.into_iter().collect();
    let _ = writeln!(out, "{}", label_line.trim_end());

    for row in 0..rows {
        let line: String = (0..columns)
            .filter_map(|col| heatmap.cells.get(col * rows + row))
            .map(|cell| format!("{} ", LEVEL_GLYPHS[usize::from(cell.intensity.min(4))]))
            .collect();
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}
