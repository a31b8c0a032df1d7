//! Spectral analysis of recorded tones
//!
//! Uses FFT (Fast Fourier Transform) to find the peaks in a channel's
//! frequency content.
//!
//! # How Peaks Are Picked
//!
//! The whole signal is windowed and transformed in one go, so the bin
//! resolution is `rate / len` (1 Hz for one second of audio). Magnitudes are
//! scaled so that a sine of amplitude `A` shows up with coefficient `A`:
//!
//! ```text
//! coefficient(k) = 2 * |X[k]| / sum(window)     (k > 0)
//! coefficient(0) =     |X[0]| / sum(window)     (DC)
//! ```
//!
//! A bin counts as a peak when it is the largest bin within ±20 Hz and its
//! coefficient is at least 1% of the strongest bin. The Hann window keeps
//! the leakage of a clean tone inside that neighbourhood, so a pure sine
//! yields a single peak.

use super::{SpectralPeak, Spectrum};
use rustfft::{num_complex::Complex, FftPlanner};
use std::cmp::Ordering;

/// Half-width of the neighbourhood a peak must dominate
const PEAK_WINDOW_HZ: f64 = 20.0;

/// Peaks weaker than this fraction of the strongest bin are dropped
const MIN_PEAK_RATIO: f64 = 0.01;

/// Hanning window function
fn hanning_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        })
        .collect()
}

/// Scaled magnitude of every bin from DC up to Nyquist
fn coefficients(signal: &[f64]) -> Vec<f64> {
    let window = hanning_window(signal.len());
    let window_sum: f64 = window.iter().sum();
    if window_sum <= 0.0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(signal.len());

    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| Complex::new(s * w, 0.0))
        .collect();
    fft.process(&mut buffer);

    buffer
        .iter()
        .take(signal.len() / 2 + 1)
        .enumerate()
        .map(|(k, c)| {
            let scale = if k == 0 { 1.0 } else { 2.0 };
            scale * c.norm() / window_sum
        })
        .collect()
}

/// Local maxima of `coeffs` that dominate `±half_width` bins
fn pick_peaks(coeffs: &[f64], half_width: usize) -> Vec<usize> {
    let strongest = coeffs.iter().cloned().fold(0.0, f64::max);
    if strongest <= 0.0 {
        return Vec::new();
    }
    let floor = strongest * MIN_PEAK_RATIO;

    (0..coeffs.len())
        .filter(|&k| {
            let value = coeffs[k];
            if value < floor {
                return false;
            }
            let lo = k.saturating_sub(half_width);
            let hi = (k + half_width).min(coeffs.len() - 1);
            // Strict on the left so a flat top yields a single peak
            coeffs[lo..k].iter().all(|&c| c < value) && coeffs[k + 1..=hi].iter().all(|&c| c <= value)
        })
        .collect()
}

/// Estimate the spectrum of a normalized signal.
///
/// Returns peaks ordered by descending coefficient (ties broken by ascending
/// frequency). An empty or silent signal has no peaks.
pub fn spectral_analysis(signal: &[f64], rate: f64) -> Spectrum {
    if signal.len() < 2 || rate <= 0.0 {
        return Vec::new();
    }

    let coeffs = coefficients(signal);
    let bin_hz = rate / signal.len() as f64;
    let half_width = ((PEAK_WINDOW_HZ / bin_hz).round() as usize).max(1);

    let mut peaks: Spectrum = pick_peaks(&coeffs, half_width)
        .into_iter()
        .map(|k| SpectralPeak::new(k as f64 * bin_hz, coeffs[k]))
        .collect();

    peaks.sort_by(|a, b| {
        b.coefficient
            .partial_cmp(&a.coefficient)
            .unwrap_or(Ordering::Equal)
            .then(a.frequency.total_cmp(&b.frequency))
    });
    peaks
}
