//! Headless PNG rendering of ECG leads and their attribution maps.

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;

use super::colormap::inferno_r;
use crate::core::util::{finite_range, linspace};
use crate::error::{EcgError, Result};

const FIG_WIDTH_PX: u32 = 2400;
const SIGNAL_ROW_PX: u32 = 80;
const SALIENCY_ROW_PX: u32 = 300;
/// Colour bar share of a saliency row, relative to the signal panel.
const COLORBAR_RATIO: f32 = 0.025;
const COLORBAR_LABEL_PX: u32 = 70;
const COLORBAR_STEPS: usize = 64;

/// Optional per-lead transform applied before drawing.
pub type Preprocess<'a> = &'a dyn Fn(&[f32]) -> Result<Vec<f32>>;

/// Maps values linearly onto `[0, 1]`, clamping outside `[vmin, vmax]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub vmin: f32,
    pub vmax: f32,
}

impl Normalize {
    pub fn new(vmin: f32, vmax: f32) -> Self {
        Self { vmin, vmax }
    }

    /// Range of the finite values in `values`; `(0, 0)` when there are none.
    pub fn from_values(values: &[f32]) -> Self {
        let (vmin, vmax) = finite_range(values).unwrap_or((0.0, 0.0));
        Self { vmin, vmax }
    }

    pub fn apply(&self, v: f32) -> f32 {
        let span = self.vmax - self.vmin;
        if !(span > 0.0) || !v.is_finite() {
            return 0.0;
        }
        ((v - self.vmin) / span).clamp(0.0, 1.0)
    }
}

/// Consecutive point pairs `[(x_i, y_i), (x_{i+1}, y_{i+1})]`.
pub fn line_segments(ticks: &[f32], values: &[f32]) -> Vec<[(f32, f32); 2]> {
    let points: Vec<(f32, f32)> = ticks.iter().copied().zip(values.iter().copied()).collect();
    points.windows(2).map(|w| [w[0], w[1]]).collect()
}

/// Axis range that is never empty.
fn padded_range(values: &[f32]) -> (f32, f32) {
    match finite_range(values) {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((v, _)) => (v - 1.0, v + 1.0),
        None => (-1.0, 1.0),
    }
}

fn check_leads(leads: &[Vec<f32>]) -> Result<()> {
    if leads.is_empty() || leads.iter().any(Vec::is_empty) {
        return Err(EcgError::Data("nothing to draw: empty leads".into()));
    }
    Ok(())
}

/// One captioned panel per lead, stacked vertically.
pub fn draw_signal(
    path: impl AsRef<Path>,
    leads: &[Vec<f32>],
    preprocess: Option<Preprocess<'_>>,
) -> Result<()> {
    check_leads(leads)?;
    let leads = match preprocess {
        Some(f) => leads.iter().map(|lead| f(lead)).collect::<Result<Vec<_>>>()?,
        None => leads.to_vec(),
    };
    render_signal(path.as_ref(), &leads).map_err(|e| EcgError::Plot(e.to_string()))
}

fn render_signal(out_path: &Path, leads: &[Vec<f32>]) -> std::result::Result<(), Box<dyn Error>> {
    let height = SIGNAL_ROW_PX * leads.len() as u32;
    let root = BitMapBackend::new(out_path, (FIG_WIDTH_PX, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let rows = root.split_evenly((leads.len(), 1));

    for (i, (row, lead)) in rows.iter().zip(leads).enumerate() {
        let (y_min, y_max) = padded_range(lead);
        let x_max = (lead.len().max(2) - 1) as f32;
        let mut chart = ChartBuilder::on(row)
            .caption(format!("Lead {}", i + 1), ("sans-serif", 14))
            .margin(4)
            .y_label_area_size(40)
            .build_cartesian_2d(0.0f32..x_max, y_min..y_max)?;
        chart.configure_mesh().x_labels(10).y_labels(3).draw()?;
        chart.draw_series(LineSeries::new(
            lead.iter().enumerate().map(|(x, y)| (x as f32, *y)),
            &BLUE,
        ))?;
    }

    root.present()?;
    Ok(())
}

/// Each lead drawn as segments coloured by `attribution`, next to a colour
/// bar spanning that lead's attribution range.
pub fn draw_signal_with_interpretability(
    path: impl AsRef<Path>,
    leads: &[Vec<f32>],
    attribution: &[Vec<f32>],
    fs: f32,
    line_width: u32,
) -> Result<()> {
    check_leads(leads)?;
    let same_shape = leads.len() == attribution.len()
        && leads.iter().zip(attribution).all(|(l, a)| l.len() == a.len());
    if !same_shape {
        return Err(EcgError::Data(
            "signal and attribution shapes differ".into(),
        ));
    }
    if !(fs > 0.0) {
        return Err(EcgError::Config(format!("sample rate must be positive, got {fs}")));
    }
    render_interpretability(path.as_ref(), leads, attribution, fs, line_width.max(1))
        .map_err(|e| EcgError::Plot(e.to_string()))
}

fn render_interpretability(
    out_path: &Path,
    leads: &[Vec<f32>],
    attribution: &[Vec<f32>],
    fs: f32,
    line_width: u32,
) -> std::result::Result<(), Box<dyn Error>> {
    let height = SALIENCY_ROW_PX * leads.len() as u32;
    let root = BitMapBackend::new(out_path, (FIG_WIDTH_PX, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let rows = root.split_evenly((leads.len(), 1));

    for (i, ((row, lead), attr)) in rows.iter().zip(leads).zip(attribution).enumerate() {
        let (w, _) = row.dim_in_pixel();
        let bar_px = (w as f32 * COLORBAR_RATIO / (1.0 + COLORBAR_RATIO)) as u32 + COLORBAR_LABEL_PX;
        let (signal_area, bar_area) = row.split_horizontally(w.saturating_sub(bar_px));

        let duration = lead.len() as f32 / fs;
        let ticks = linspace(0.0, duration, lead.len());
        let (y_min, y_max) = padded_range(lead);
        let x_max = if duration > 0.0 { duration } else { 1.0 };
        let norm = Normalize::from_values(attr);

        let mut chart = ChartBuilder::on(&signal_area)
            .margin(5)
            .build_cartesian_2d(0.0f32..x_max, y_min..y_max)?;
        chart.draw_series(
            line_segments(&ticks, lead)
                .into_iter()
                .zip(attr)
                .map(|(seg, v)| {
                    PathElement::new(seg.to_vec(), inferno_r(norm.apply(*v)).stroke_width(line_width))
                }),
        )?;

        let (c_min, c_max) = if norm.vmax > norm.vmin {
            (norm.vmin, norm.vmax)
        } else {
            (norm.vmin, norm.vmin + 1.0)
        };
        let mut bar = ChartBuilder::on(&bar_area)
            .margin(5)
            .y_label_area_size(COLORBAR_LABEL_PX - 10)
            .build_cartesian_2d(0.0f32..1.0f32, c_min..c_max)?;
        bar.configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(5)
            .y_desc(format!("Lead {} cmap", i + 1))
            .draw()?;
        let step = (c_max - c_min) / COLORBAR_STEPS as f32;
        bar.draw_series((0..COLORBAR_STEPS).map(|k| {
            let lo = c_min + step * k as f32;
            let t = (k as f32 + 0.5) / COLORBAR_STEPS as f32;
            Rectangle::new([(0.0, lo), (1.0, lo + step)], inferno_r(t).filled())
        }))?;
    }

    root.present()?;
    Ok(())
}
