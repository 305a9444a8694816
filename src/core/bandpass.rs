//! Butterworth band-pass design and zero-phase filtering for ECG leads.
//!
//! The design follows the classic analog-prototype route: Butterworth
//! low-pass poles, pre-warped low-pass to band-pass transform, bilinear
//! transform, then grouping into second-order sections. Filtering runs the
//! cascade forward and backward over an odd-reflected extension of the
//! signal, starting every section from its steady-state so edges do not
//! ring.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use crate::core::biquad::Biquad;
use crate::error::{EcgError, Result};

const IMAG_EPS: f64 = 1e-12;

/// Digital Butterworth band-pass of `order`, passband `[low_hz, high_hz]`.
///
/// Returns `order` second-order sections; the overall gain sits on the first.
pub fn butter_bandpass(order: usize, low_hz: f64, high_hz: f64, fs: f64) -> Result<Vec<Biquad>> {
    if order == 0 {
        return Err(EcgError::Config("filter order must be positive".into()));
    }
    let nyq = fs / 2.0;
    if !(fs.is_finite() && fs > 0.0) || !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyq) {
        return Err(EcgError::Config(format!(
            "invalid band [{low_hz}, {high_hz}] Hz for fs={fs} Hz"
        )));
    }

    // Work at a normalized rate of 2 so the band edges are fractions of Nyquist.
    let fs_n = 2.0;
    let fs2 = 2.0 * fs_n;
    let warp = |wn: f64| 2.0 * fs_n * (PI * wn / fs_n).tan();
    let w1 = warp(low_hz / nyq);
    let w2 = warp(high_hz / nyq);
    let bw = w2 - w1;
    let w0 = (w1 * w2).sqrt();

    let n = order as i32;
    let mut analog_poles = Vec::with_capacity(2 * order);
    for m in (-n + 1..n).step_by(2) {
        let p = -Complex::from_polar(1.0, PI * m as f64 / (2.0 * order as f64));
        let p_lp = p * (bw / 2.0);
        let disc = (p_lp * p_lp - w0 * w0).sqrt();
        analog_poles.push(p_lp + disc);
        analog_poles.push(p_lp - disc);
    }

    // Analog zeros: `order` at the origin. Gain k = bw^order.
    let mut gain = Complex::new(bw.powi(n), 0.0) * fs2.powi(n);
    let mut digital_poles = Vec::with_capacity(analog_poles.len());
    for p in &analog_poles {
        gain /= Complex::new(fs2, 0.0) - *p;
        digital_poles.push((Complex::new(fs2, 0.0) + *p) / (Complex::new(fs2, 0.0) - *p));
    }

    // Zeros land on z = +1 (from s = 0) and z = -1 (from s = inf), one of each
    // per section: numerator (1 - z^-1)(1 + z^-1) = 1 - z^-2.
    let dens = pair_poles(&digital_poles);
    let mut sections: Vec<Biquad> = dens
        .into_iter()
        .map(|(a1, a2)| Biquad::new(1.0, 0.0, -1.0, a1, a2))
        .collect();
    let k = gain.re;
    if let Some(first) = sections.first_mut() {
        first.b0 *= k;
        first.b1 *= k;
        first.b2 *= k;
    }
    Ok(sections)
}

/// Group poles into `(a1, a2)` denominators: conjugate pairs first, then
/// leftover real poles two at a time.
fn pair_poles(poles: &[Complex<f64>]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(poles.len() / 2);
    let mut reals = Vec::new();
    for p in poles {
        if p.im > IMAG_EPS {
            out.push((-2.0 * p.re, p.norm_sqr()));
        } else if p.im.abs() <= IMAG_EPS {
            reals.push(p.re);
        }
    }
    reals.sort_by(|a, b| a.total_cmp(b));
    for pair in reals.chunks(2) {
        match pair {
            [p1, p2] => out.push((-(p1 + p2), p1 * p2)),
            [p1] => out.push((-p1, 0.0)),
            _ => {}
        }
    }
    out
}

/// Magnitude of the cascade at `f_hz`.
pub fn cascade_gain(sections: &[Biquad], f_hz: f64, fs: f64) -> f64 {
    let omega = 2.0 * PI * f_hz / fs;
    sections
        .iter()
        .map(|s| s.response(omega))
        .fold(Complex::new(1.0, 0.0), |acc, h| acc * h)
        .norm()
}

/// Per-section initial states for a unit step, scaled through the cascade.
fn cascade_step_states(sections: &[Biquad]) -> Vec<(f64, f64)> {
    let mut scale = 1.0;
    sections
        .iter()
        .map(|s| {
            let (z1, z2) = s.step_state();
            let st = (z1 * scale, z2 * scale);
            scale *= s.dc_gain();
            st
        })
        .collect()
}

fn run_cascade(sections: &[Biquad], zi: &[(f64, f64)], x: &mut [f64]) {
    let Some(&x0) = x.first() else {
        return;
    };
    for (s, &(z1, z2)) in sections.iter().zip(zi) {
        let mut s = *s;
        s.set_state(z1 * x0, z2 * x0);
        s.process_in_place(x);
    }
}

/// Zero-phase forward-backward filtering through a biquad cascade.
pub fn filtfilt(sections: &[Biquad], x: &[f32]) -> Vec<f32> {
    let n = x.len();
    if n == 0 || sections.is_empty() {
        return x.to_vec();
    }
    let padlen = (3 * (2 * sections.len() + 1)).min(n - 1);

    // Odd extension about both end points.
    let first = x[0] as f64;
    let last = x[n - 1] as f64;
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i] as f64));
    ext.extend(x.iter().map(|&v| v as f64));
    ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i] as f64));

    let zi = cascade_step_states(sections);
    run_cascade(sections, &zi, &mut ext);
    ext.reverse();
    run_cascade(sections, &zi, &mut ext);
    ext.reverse();

    ext[padlen..padlen + n].iter().map(|&v| v as f32).collect()
}

/// Band-pass an ECG lead with a Butterworth filter, zero phase.
pub fn signal_preprocessing(lead: &[f32], fs: f64, borders: (f64, f64), order: usize) -> Result<Vec<f32>> {
    let sections = butter_bandpass(order, borders.0, borders.1, fs)?;
    Ok(filtfilt(&sections, lead))
}
