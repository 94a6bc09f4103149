// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Line chart rendering for range query results.
//!
//! Each series becomes one line named after its label set. The x-axis spans
//! the sample timestamps and the y-axis the finite sample values; NaN and
//! infinite samples leave gaps in the line. Output is an RGB PNG.

use std::io::Cursor;
use std::sync::OnceLock;

use chrono::{DateTime, TimeDelta, Utc};
use image::{ImageFormat, RgbImage};
use plotters::backend::RGBPixel;
use plotters::prelude::*;
use plotters::style::{FontStyle, register_font};

use crate::error::ToolError;
use crate::model::Series;

pub const WIDTH: u32 = 1024;
pub const HEIGHT: u32 = 576;

const FONT_FAMILY: &str = "sans-serif";
const FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Legend entries longer than this are cut with an ellipsis.
const MAX_LEGEND_CHARS: usize = 96;

/// Largest magnitude drawn on the value axis. The axis span, padding
/// included, must stay finite or the tick computation never ends.
const MAX_AXIS_VALUE: f64 = f64::MAX / 4.0;

const PALETTE: [RGBColor; 5] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
];

static FONT_REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

/// One series projected onto the plot plane.
#[derive(Debug)]
struct Line {
    name: String,
    /// Runs of consecutive finite points.
    segments: Vec<Vec<(DateTime<Utc>, f64)>>,
}

/// Renders `series` as a PNG. `window` bounds the x-axis when the series
/// carry no samples at all.
pub fn render_png(
    title: &str,
    series: &[Series],
    window: (DateTime<Utc>, DateTime<Utc>),
) -> Result<Vec<u8>, ToolError> {
    ensure_font()?;

    let lines: Vec<Line> = series.iter().map(project).collect();
    let (x_range, y_range) = bounds(series, &lines, window);
    let (y_min, y_max) = (y_range.start, y_range.end);

    let mut pixels = vec![0u8; (WIDTH as usize) * (HEIGHT as usize) * 3];
    {
        let backend =
            BitMapBackend::<RGBPixel>::with_buffer_and_format(&mut pixels, (WIDTH, HEIGHT))
                .map_err(render_error)?;
        let root = backend.into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let span = x_range.end.signed_duration_since(x_range.start);
        let time_format = if span > TimeDelta::days(1) {
            "%m-%d %H:%M"
        } else {
            "%H:%M:%S"
        };

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT_FAMILY, 24))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(80)
            .build_cartesian_2d(x_range, y_range)
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .x_labels(8)
            .y_labels(8)
            .x_desc("time (UTC)")
            .y_desc("value")
            .x_label_formatter(&|t: &DateTime<Utc>| t.format(time_format).to_string())
            .y_label_formatter(&|v: &f64| format_value(*v))
            .label_style((FONT_FAMILY, 13))
            .draw()
            .map_err(render_error)?;

        for (line, color) in lines.iter().zip(PALETTE.iter().cycle()) {
            let style = color.stroke_width(2);
            // Empty series carrying the legend entry, so gaps do not repeat it.
            chart
                .draw_series(LineSeries::new(
                    std::iter::empty::<(DateTime<Utc>, f64)>(),
                    style,
                ))
                .map_err(render_error)?
                .label(line.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            for segment in &line.segments {
                chart
                    .draw_series(LineSeries::new(
                        segment.iter().map(|&(t, v)| (t, v.clamp(y_min, y_max))),
                        style,
                    ))
                    .map_err(render_error)?;
            }
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .label_font((FONT_FAMILY, 13))
            .draw()
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    encode_png(pixels)
}

fn ensure_font() -> Result<(), ToolError> {
    FONT_REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT)
                .map_err(|_| "embedded font could not be loaded".to_string())
        })
        .clone()
        .map_err(ToolError::Render)
}

fn render_error<E: std::fmt::Display>(err: E) -> ToolError {
    ToolError::Render(err.to_string())
}

fn encode_png(pixels: Vec<u8>) -> Result<Vec<u8>, ToolError> {
    let image = RgbImage::from_raw(WIDTH, HEIGHT, pixels)
        .ok_or_else(|| ToolError::Render("pixel buffer does not match chart size".to_string()))?;
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(render_error)?;
    Ok(png.into_inner())
}

fn project(series: &Series) -> Line {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for sample in series.samples() {
        match (sample.timestamp_secs().and_then(sample_time), sample.finite_value()) {
            (Some(t), Some(v)) => current.push((t, v)),
            _ if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            _ => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    Line {
        name: legend_name(&series.metric.to_string()),
        segments,
    }
}

fn sample_time(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

fn legend_name(name: &str) -> String {
    match name.char_indices().nth(MAX_LEGEND_CHARS) {
        Some((cut, _)) => format!("{}…", name.get(..cut).unwrap_or(name)),
        None => name.to_string(),
    }
}

type Bounds = (std::ops::Range<DateTime<Utc>>, std::ops::Range<f64>);

fn bounds(series: &[Series], lines: &[Line], window: (DateTime<Utc>, DateTime<Utc>)) -> Bounds {
    // The x-axis covers every sample, including the ones without a finite value.
    let times = series
        .iter()
        .flat_map(|s| s.samples().iter())
        .filter_map(|sample| sample.timestamp_secs().and_then(sample_time));
    let (mut x0, mut x1) = min_max(times).unwrap_or(window);
    if x0 >= x1 {
        x0 -= TimeDelta::seconds(30);
        x1 = x0 + TimeDelta::seconds(60);
    }

    let values = lines
        .iter()
        .flat_map(|l| l.segments.iter().flatten())
        .map(|(_, v)| v.clamp(-MAX_AXIS_VALUE, MAX_AXIS_VALUE));
    let (y0, y1) = match values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    }) {
        None => (0.0, 1.0),
        Some((lo, hi)) if lo == hi => {
            let pad = if lo == 0.0 {
                1.0
            } else {
                (lo.abs() * 0.1).max(f64::MIN_POSITIVE)
            };
            (lo - pad, hi + pad)
        }
        Some((lo, hi)) => {
            let pad = (hi - lo) * 0.05;
            (lo - pad, hi + pad)
        }
    };

    (x0..x1, y0..y1)
}

fn min_max<T: PartialOrd + Copy>(items: impl Iterator<Item = T>) -> Option<(T, T)> {
    items.fold(None, |acc, item| match acc {
        None => Some((item, item)),
        Some((lo, hi)) => Some((
            if item < lo { item } else { lo },
            if item > hi { item } else { hi },
        )),
    })
}

fn format_value(v: f64) -> String {
    let magnitude = v.abs();
    if magnitude != 0.0 && !(1e-3..1e6).contains(&magnitude) {
        format!("{v:.2e}")
    } else {
        let s = format!("{v:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
