//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks of aligned series and factor scores
//! - deterministic output (helpful for golden tests)
//!
//! Each series gets its own marker (`*`, `+`, `x`, `o`, `#`, then repeats).
//! Undefined values break the line.

use crate::domain::{FactorAnalysisResult, TimeSeriesCollection, Timestamp};

const MARKERS: [char; 5] = ['*', '+', 'x', 'o', '#'];

/// Render several series sharing one time axis.
pub fn render_series_plot(
    title: &str,
    index: &[Timestamp],
    series: &[(&str, &[f64])],
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (Some(&start), Some(&end)) = (index.first(), index.last()) else {
        return format!("{title}: no data\n");
    };
    let Some((y_min, y_max)) = y_range(series) else {
        return format!("{title}: no data\n");
    };
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let t_max = seconds_since(start, end);
    let t_max = if t_max > 0.0 { t_max } else { 1.0 };

    let mut grid = vec![vec![' '; width]; height];
    for (i, (_, values)) in series.iter().enumerate() {
        let marker = MARKERS[i % MARKERS.len()];
        let points = index.iter().zip(values.iter()).map(|(&t, &v)| {
            v.is_finite()
                .then(|| (map_x(seconds_since(start, t), 0.0, t_max, width), map_y(v, y_min, y_max, height)))
        });
        draw_series(&mut grid, points, marker);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{title}: {} .. {} | y=[{y_min:.2}, {y_max:.2}]\n",
        start.format("%Y-%m-%d %H:%M:%S"),
        end.format("%Y-%m-%d %H:%M:%S")
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    let legend: Vec<String> = series
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} {name}", MARKERS[i % MARKERS.len()]))
        .collect();
    out.push_str(&format!("  {}\n", legend.join("  ")));

    out
}

/// One plot per factor score series.
pub fn render_factor_plots(result: &FactorAnalysisResult, width: usize, height: usize) -> String {
    let mut out = String::new();
    for (i, name) in result.factor_names.iter().enumerate() {
        let values = result.factor_series(i);
        out.push_str(&render_series_plot(
            name,
            &result.index,
            &[(name.as_str(), values.as_slice())],
            width,
            height,
        ));
        out.push('\n');
    }
    out
}

/// One plot per dataset, all numeric columns overlaid.
pub fn render_dataset_plots(collection: &TimeSeriesCollection, width: usize, height: usize) -> String {
    let mut out = String::new();
    for dataset in collection.iter() {
        let Some(index) = dataset.index.as_deref() else {
            continue;
        };
        let series: Vec<(&str, &[f64])> = dataset
            .columns
            .iter()
            .filter_map(|c| c.data.as_numeric().map(|v| (c.name.as_str(), v)))
            .collect();
        out.push_str(&render_series_plot(&dataset.id, index, &series, width, height));
        out.push('\n');
    }
    out
}

fn seconds_since(start: Timestamp, t: Timestamp) -> f64 {
    (t - start).num_milliseconds() as f64 / 1000.0
}

fn y_range(series: &[(&str, &[f64])]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, values) in series {
        for &v in values.iter().filter(|v| v.is_finite()) {
            min_y = min_y.min(v);
            max_y = max_y.max(v);
        }
    }

    if !(min_y.is_finite() && max_y.is_finite()) {
        None
    } else if max_y > min_y {
        Some((min_y, max_y))
    } else {
        Some((min_y - 0.5, max_y + 0.5))
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_series(grid: &mut [Vec<char>], points: impl Iterator<Item = Option<(usize, usize)>>, ch: char) {
    let mut prev = None;
    for point in points {
        let Some((x, y)) = point else {
            prev = None;
            continue;
        };
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, y, ch),
            None if grid[y][x] == ' ' => grid[y][x] = ch,
            None => {}
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
