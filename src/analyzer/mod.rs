//! Signal analysis collaborators
//!
//! The verification engine never looks at samples itself. It asks two
//! collaborators for what it needs:
//!
//! - a [`SpectrumEstimator`], which turns a normalized signal into a
//!   [`Spectrum`] of peaks ordered by descending coefficient, and
//! - a [`PlaybackInspector`], which finds anomalies around an expected tone
//!   and measures playback artifacts ([`ArtifactReport`]).
//!
//! [`FftSpectrum`] and [`BlockInspector`] are the default implementations.
//! Tests and harnesses with their own DSP can plug in anything else.

pub mod anomaly;
pub mod quality;
pub mod spectral;

pub use anomaly::detect_anomaly;
pub use quality::measure_quality;
pub use spectral::spectral_analysis;

use serde::{Deserialize, Serialize};
use std::fmt;

/// One peak of a spectrum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    pub frequency: f64,
    pub coefficient: f64,
}

impl SpectralPeak {
    pub fn new(frequency: f64, coefficient: f64) -> Self {
        Self {
            frequency,
            coefficient,
        }
    }
}

impl From<(f64, f64)> for SpectralPeak {
    fn from((frequency, coefficient): (f64, f64)) -> Self {
        Self::new(frequency, coefficient)
    }
}

impl fmt::Display for SpectralPeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.frequency, self.coefficient)
    }
}

/// Peaks ordered by descending coefficient
pub type Spectrum = Vec<SpectralPeak>;

/// A span of time in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub duration: f64,
}

impl TimeWindow {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeDirection {
    Down,
    Up,
}

impl VolumeDirection {
    /// +1 for up, -1 for down
    pub fn sign(self) -> i8 {
        match self {
            VolumeDirection::Up => 1,
            VolumeDirection::Down => -1,
        }
    }

    pub fn from_sign(sign: i64) -> Option<Self> {
        match sign {
            1 => Some(VolumeDirection::Up),
            -1 => Some(VolumeDirection::Down),
            _ => None,
        }
    }
}

impl fmt::Display for VolumeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.sign())
    }
}

/// A detected step in playback volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeChange {
    pub time: f64,
    pub direction: VolumeDirection,
}

impl fmt::Display for VolumeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.time, self.direction)
    }
}

/// Playback artifacts found in one channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub noise_before_playback: Vec<TimeWindow>,
    pub noise_after_playback: Vec<TimeWindow>,
    /// Mutes and dropouts while playing, in time order
    pub delay_during_playback: Vec<TimeWindow>,
    pub burst_during_playback: Vec<f64>,
    pub equivalent_noise_level: f64,
    /// Detected volume steps, in time order
    pub volume_changes: Vec<VolumeChange>,
}

/// Produces the spectrum of a normalized signal
pub trait SpectrumEstimator: Send + Sync {
    fn spectrum(&self, signal: &[f64], rate: f64) -> Spectrum;
}

/// Inspects a normalized signal for playback problems
pub trait PlaybackInspector: Send + Sync {
    /// Timestamps (seconds) where the signal departs from a tone at `frequency`
    fn detect_anomaly(&self, signal: &[f64], rate: f64, frequency: f64) -> Vec<f64>;

    fn measure_quality(&self, signal: &[f64], rate: f64, dominant_frequency: f64) -> ArtifactReport;
}

/// FFT-based [`SpectrumEstimator`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FftSpectrum;

impl SpectrumEstimator for FftSpectrum {
    fn spectrum(&self, signal: &[f64], rate: f64) -> Spectrum {
        spectral_analysis(signal, rate)
    }
}

/// Block-envelope [`PlaybackInspector`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockInspector;

impl PlaybackInspector for BlockInspector {
    fn detect_anomaly(&self, signal: &[f64], rate: f64, frequency: f64) -> Vec<f64> {
        detect_anomaly(signal, rate, frequency)
    }

    fn measure_quality(&self, signal: &[f64], rate: f64, dominant_frequency: f64) -> ArtifactReport {
        measure_quality(signal, rate, dominant_frequency)
    }
}

// Shared block helpers for the anomaly and quality passes.

const MIN_BLOCK_SECONDS: f64 = 0.01;

/// Blocks span at least 10 ms and at least two periods of the tone
pub(crate) fn block_size(rate: f64, frequency: f64) -> usize {
    let by_time = rate * MIN_BLOCK_SECONDS;
    let by_period = if frequency > 0.0 { 2.0 * rate / frequency } else { 0.0 };
    (by_time.max(by_period).round() as usize).max(1)
}

pub(crate) fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&x| x * x).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

pub(crate) fn peak(samples: &[f64]) -> f64 {
    samples.iter().fold(0.0, |acc: f64, &x| acc.max(x.abs()))
}

/// Energy of a block and what is left of it after a least-squares sine fit
#[derive(Debug, Clone, Copy)]
pub(crate) struct SineFit {
    pub energy: f64,
    pub residual: f64,
}

/// Fit `a*sin(wt) + b*cos(wt)` to the block and report the residual energy.
pub(crate) fn fit_sine(block: &[f64], rate: f64, frequency: f64) -> SineFit {
    let w = 2.0 * std::f64::consts::PI * frequency / rate;

    let (mut ss, mut sc, mut cc, mut xs, mut xc, mut energy) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for (n, &x) in block.iter().enumerate() {
        let (s, c) = (w * n as f64).sin_cos();
        ss += s * s;
        sc += s * c;
        cc += c * c;
        xs += x * s;
        xc += x * c;
        energy += x * x;
    }

    let det = ss * cc - sc * sc;
    if det.abs() < f64::EPSILON {
        return SineFit {
            energy,
            residual: energy,
        };
    }
    let a = (xs * cc - xc * sc) / det;
    let b = (xc * ss - xs * sc) / det;

    // Projection is orthogonal, so residual = |x|^2 - |fit|^2
    let fitted = a * xs + b * xc;
    SineFit {
        energy,
        residual: (energy - fitted).max(0.0),
    }
}
