use std::collections::HashMap;

use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::aggregator::DAY_KEY_FORMAT;
use crate::types::{
    ContainerSize, DayCell, GridLayout, HeatCell, Heatmap, MonthLabel, TimeRange,
};

/// Smallest tile ever returned, in pixels.
pub const MIN_TILE_PX: u32 = 1;

/// Windows shorter than this get the roomiest tiles.
const SMALL_WINDOW_DAYS: usize = 70;
/// Windows shorter than this (and not small) get medium tiles.
const MEDIUM_WINDOW_DAYS: usize = 200;

/// The `window_days + 1` calendar days ending at `today`, oldest first.
///
/// Days without activity are present with a zero count.
pub fn build_day_window(
    histogram: &HashMap<String, u32>,
    window_days: u32,
    today: NaiveDate,
) -> Vec<DayCell> {
    (0..=i64::from(window_days))
        .rev()
        .filter_map(|back| today.checked_sub_signed(Duration::days(back)))
        .map(|date| {
            let date_key = date.format(DAY_KEY_FORMAT).to_string();
            let count = histogram.get(&date_key).copied().unwrap_or(0);
            DayCell {
                date,
                date_key,
                count,
            }
        })
        .collect()
}

/// Same as [`build_day_window`], ending at the viewer's local today.
pub fn build_local_day_window(histogram: &HashMap<String, u32>, window_days: u32) -> Vec<DayCell> {
    build_day_window(histogram, window_days, Local::now().date_naive())
}

/// `(gap_px, corner_radius_px)` for a grid of `day_count` tiles.
pub fn choose_density_params(day_count: usize) -> (u32, u32) {
    if day_count < SMALL_WINDOW_DAYS {
        (4, 4)
    } else if day_count < MEDIUM_WINDOW_DAYS {
        (3, 3)
    } else {
        (2, 2)
    }
}

/// Largest square tile that fits `item_count` tiles into the container.
///
/// Returns `(tile_size_px, columns)`. Candidates run from the container height
/// down to 1px; if none fits, falls back to an area estimate. Never returns a
/// tile below [`MIN_TILE_PX`] or zero columns.
pub fn solve_tile_size(width: u32, height: u32, item_count: usize, gap: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (MIN_TILE_PX, 1);
    }
    let items = item_count.max(1) as u64;
    let (w, h, g) = (u64::from(width), u64::from(height), u64::from(gap));

    // A tile can exceed neither side, nor leave room for fewer than `items`
    // steps of (tile + gap) in the padded area.
    let area_bound = ((w + g) as f64 * (h + g) as f64 / items as f64).sqrt() as u64;
    let largest = w.min(h).min(area_bound.saturating_sub(g) + 1);

    for tile in (1..=largest).rev() {
        let step = tile + g;
        let columns = (w + g) / step;
        let rows = (h + g) / step;
        if columns * rows >= items {
            return (tile as u32, columns as u32);
        }
    }

    let estimate = ((w * h) as f64 / items as f64).sqrt() - gap as f64;
    let tile = if estimate.is_finite() && estimate >= f64::from(MIN_TILE_PX) {
        estimate.floor() as u32
    } else {
        MIN_TILE_PX
    };
    let columns = ((w + g) / (u64::from(tile) + g)).max(1) as u32;
    (tile, columns)
}

/// Full layout for `day_count` tiles inside `container`.
pub fn compute_layout(container: ContainerSize, day_count: usize) -> GridLayout {
    let (gap_px, corner_radius_px) = choose_density_params(day_count);
    let (tile_size_px, columns) =
        solve_tile_size(container.width_px, container.height_px, day_count, gap_px);
    let rows = day_count.max(1).div_ceil(columns as usize) as u32;
    GridLayout {
        columns,
        rows,
        tile_size_px,
        gap_px,
        corner_radius_px: corner_radius_px.min(tile_size_px / 2),
    }
}

/// Colour level for a day: 0 when empty, otherwise 1..=4 by share of `max_in_window`.
pub fn color_bucket(count: u32, max_in_window: u32) -> u8 {
    if count == 0 {
        return 0;
    }
    let fraction = (f64::from(count) / f64::from(max_in_window.max(1))).min(1.0);
    if fraction < 0.25 {
        1
    } else if fraction < 0.5 {
        2
    } else if fraction < 0.75 {
        3
    } else {
        4
    }
}

/// Month labels for the grid.
///
/// A label is a candidate on the first cell and wherever the month changes; it is
/// kept only when more than a quarter of the window lies since the last kept label.
pub fn month_label_placement(days: &[DayCell]) -> Vec<MonthLabel> {
    let min_spacing = days.len() / 4;
    let mut labels: Vec<MonthLabel> = Vec::new();
    let mut prev_month: Option<(i32, u32)> = None;

    for (index, day) in days.iter().enumerate() {
        let month = (day.date.year(), day.date.month());
        let is_new_month = prev_month != Some(month);
        prev_month = Some(month);
        if !is_new_month {
            continue;
        }
        let spaced = labels
            .last()
            .is_none_or(|last| index - last.index > min_spacing);
        if spaced {
            labels.push(MonthLabel {
                index,
                label: day.date.format("%b").to_string(),
            });
        }
    }
    labels
}

/// Cells, intensities, layout and labels for `range` ending at `today`.
///
/// Intensities are scaled by the busiest day inside the window, not the whole history.
pub fn render_heatmap(
    histogram: &HashMap<String, u32>,
    range: TimeRange,
    container: ContainerSize,
    today: NaiveDate,
) -> Heatmap {
    let days = build_day_window(histogram, range.days(), today);
    let max_count = days.iter().map(|d| d.count).max().unwrap_or(0);
    let layout = compute_layout(container, days.len());
    let month_labels = month_label_placement(&days);
    let cells = days
        .into_iter()
        .map(|day| HeatCell {
            intensity: color_bucket(day.count, max_count),
            day,
        })
        .collect();

    Heatmap {
        range,
        cells,
        layout,
        month_labels,
        max_count,
    }
}
