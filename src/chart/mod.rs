// src/chart/mod.rs
use crate::config::ChartConfig;
use crate::database::models::{JoinPair, JoinedRow};
use crate::error::ChartError;
use base64::Engine as _;
use chrono::{DateTime, NaiveDateTime};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const FONT_FAMILY: &str = "sans-serif";
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Renders the two joined close series as a PNG line chart
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
    labels: bool,
}

impl ChartRenderer {
    /// Registers the configured label font; without one the chart carries
    /// only the two lines.
    pub fn new(config: &ChartConfig) -> Self {
        let labels = config
            .font_path
            .as_deref()
            .map(register_label_font)
            .unwrap_or(false);

        Self {
            width: config.width,
            height: config.height,
            labels,
        }
    }

    pub fn unlabeled(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            labels: false,
        }
    }

    pub fn has_labels(&self) -> bool {
        self.labels
    }

    pub fn render_png(&self, pair: &JoinPair, rows: &[JoinedRow]) -> Result<Vec<u8>, ChartError> {
        if self.width == 0 || self.height == 0 {
            return Err(ChartError::Buffer {
                width: self.width,
                height: self.height,
            });
        }

        let left: Vec<(f64, f64)> = points(rows, |row| row.left_close);
        let right: Vec<(f64, f64)> = points(rows, |row| row.right_close);
        if left.is_empty() && right.is_empty() {
            return Err(ChartError::EmptySeries);
        }

        let x_range = day_range(left.iter().chain(&right).map(|p| p.0));
        let y_range = padded_range(left.iter().chain(&right).map(|p| p.1), 0.05);

        let mut buffer = vec![0u8; self.width as usize * self.height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height))
                .into_drawing_area();
            root.fill(&WHITE).map_err(drawing)?;

            let mut builder = ChartBuilder::on(&root);
            builder.margin(12);
            if self.labels {
                builder
                    .caption(
                        format!("{} vs {} daily close", pair.left(), pair.right()),
                        (FONT_FAMILY, 20),
                    )
                    .x_label_area_size(30)
                    .y_label_area_size(50);
            }

            let mut chart = builder
                .build_cartesian_2d(x_range, y_range)
                .map_err(drawing)?;

            if self.labels {
                chart
                    .configure_mesh()
                    .x_labels(6)
                    .y_labels(8)
                    .x_label_formatter(&|x| axis_date(*x))
                    .label_style((FONT_FAMILY, 12))
                    .draw()
                    .map_err(drawing)?;
            }

            chart
                .draw_series(LineSeries::new(left, &BLUE))
                .map_err(drawing)?
                .label(pair.left_column())
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

            chart
                .draw_series(LineSeries::new(right, &RED))
                .map_err(drawing)?
                .label(pair.right_column())
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

            if self.labels {
                chart
                    .configure_series_labels()
                    .position(SeriesLabelPosition::UpperLeft)
                    .background_style(WHITE.mix(0.8))
                    .border_style(&BLACK)
                    .label_font((FONT_FAMILY, 12))
                    .draw()
                    .map_err(drawing)?;
            }

            root.present().map_err(drawing)?;
        }

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(&buffer, self.width, self.height, ColorType::Rgb8)?;

        debug!("Rendered {} rows into {} PNG bytes", rows.len(), png.len());
        Ok(png)
    }

    /// PNG bytes base64-encoded for an inline `data:` URI
    pub fn render_base64(&self, pair: &JoinPair, rows: &[JoinedRow]) -> Result<String, ChartError> {
        let png = self.render_png(pair, rows)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(png))
    }
}

fn drawing<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Drawing(e.to_string())
}

fn font_registry() -> &'static Mutex<HashMap<PathBuf, bool>> {
    static REGISTERED: OnceLock<Mutex<HashMap<PathBuf, bool>>> = OnceLock::new();
    REGISTERED.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers each font path at most once per process and remembers the
/// outcome for later renderers.
fn register_label_font(path: &Path) -> bool {
    let mut registered = font_registry().lock();
    if let Some(&usable) = registered.get(path) {
        return usable;
    }

    let usable = load_label_font(path);
    registered.insert(path.to_path_buf(), usable);
    usable
}

fn load_label_font(path: &Path) -> bool {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Chart font {} unavailable ({}), rendering without labels", path.display(), e);
            return false;
        }
    };

    // The font registry keeps its data for the life of the process
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
        Ok(()) => {
            info!("Registered chart font {}", path.display());
            true
        }
        Err(_) => {
            warn!("{} is not a usable font, rendering without labels", path.display());
            false
        }
    }
}

/// Days since the epoch, so one x unit is one bar
fn day_number(ts: &NaiveDateTime) -> f64 {
    ts.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

fn axis_date(day: f64) -> String {
    DateTime::from_timestamp((day * SECONDS_PER_DAY) as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn points(rows: &[JoinedRow], value: impl Fn(&JoinedRow) -> f64) -> Vec<(f64, f64)> {
    rows.iter()
        .map(|row| (day_number(&row.timestamp), value(row)))
        .filter(|(_, y)| y.is_finite())
        .collect()
}

/// First to last day, widened by one day each side
fn day_range(days: impl Iterator<Item = f64>) -> Range<f64> {
    let (first, last) = days.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
        (lo.min(d), hi.max(d))
    });
    (first - 1.0)..(last + 1.0)
}

// Span of `values` widened by `pad` of its width; a zero-width span is
// widened by one unit each side so a single row still plots.
fn padded_range(values: impl Iterator<Item = f64>, pad: f64) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let span = max - min;
    if span <= 0.0 {
        return (min - 1.0)..(max + 1.0);
    }
    (min - span * pad)..(max + span * pad)
}
