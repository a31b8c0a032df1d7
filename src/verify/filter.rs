//! Frequency suppression
//!
//! Two passes run over every channel's spectrum:
//!
//! 1. The ignore list: configured frequencies (power-line hum and the like)
//!    and their 2nd and 3rd harmonics, plus DC.
//! 2. Self-harmonics: multiples 2..=9 of the chosen dominant frequency, which
//!    an imperfect sine produces as distortion.

use crate::analyzer::{SpectralPeak, Spectrum};

/// Drop every peak within `tolerance` Hz of any target, keeping order.
pub fn suppress(spectrum: &[SpectralPeak], targets: &[f64], tolerance: f64) -> Spectrum {
    spectrum
        .iter()
        .filter(|peak| {
            !targets
                .iter()
                .any(|&target| (peak.frequency - target).abs() <= tolerance)
        })
        .copied()
        .collect()
}

/// Ignore-list targets: each frequency times 1, 2 and 3, then DC
pub fn ignore_targets(ignore_frequencies: &[f64]) -> Vec<f64> {
    ignore_frequencies
        .iter()
        .flat_map(|&f| (1..=3).map(move |n| f * n as f64))
        .chain(std::iter::once(0.0))
        .collect()
}

/// Distortion harmonics of the dominant tone, 2nd through 9th
pub fn harmonic_targets(dominant_frequency: f64) -> Vec<f64> {
    (2..=9).map(|n| dominant_frequency * n as f64).collect()
}
