//! Pass/fail thresholds and optional checks

use crate::analyzer::VolumeDirection;
use crate::error::{Result, VerifyError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The second dominant frequency should have energy less than -26dB of the
/// first dominant frequency in the spectrum.
pub const DEFAULT_SECOND_PEAK_RATIO: f64 = 0.05;

/// Maximum deviation (Hz) of the dominant frequency from the golden one
pub const DEFAULT_FREQUENCY_DIFF_THRESHOLD: f64 = 5.0;

/// Durations with relative error below this are the same mute
pub const DEFAULT_EQUIVALENCE_THRESHOLD: f64 = 0.2;

/// Peaks below this frequency are DC
pub const DEFAULT_DC_FREQ_THRESHOLD: f64 = 0.001;

/// Largest tolerated DC coefficient
pub const DEFAULT_DC_COEFF_THRESHOLD: f64 = 0.01;

/// Maximum tolerated equivalent noise level
pub const DEFAULT_TOLERANT_NOISE_LEVEL: f64 = 0.01;

/// Numeric thresholds applied to every channel of a run.
///
/// Loaded from JSON with every field optional:
///
/// ```json
/// { "second_peak_ratio": 0.1, "ignore_frequencies": [60.0] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    /// Fail when the second peak's coefficient exceeds this share of the first
    pub second_peak_ratio: f64,
    /// Hz; also the tolerance for ignore-list and harmonic suppression
    pub frequency_diff_threshold: f64,
    /// Frequencies (and their 2nd/3rd harmonics) to drop from every spectrum
    pub ignore_frequencies: Vec<f64>,
    pub dc_freq_threshold: f64,
    pub dc_coeff_threshold: f64,
    pub tolerant_noise_level: f64,
    pub duration_equivalence_threshold: f64,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            second_peak_ratio: DEFAULT_SECOND_PEAK_RATIO,
            frequency_diff_threshold: DEFAULT_FREQUENCY_DIFF_THRESHOLD,
            ignore_frequencies: Vec::new(),
            dc_freq_threshold: DEFAULT_DC_FREQ_THRESHOLD,
            dc_coeff_threshold: DEFAULT_DC_COEFF_THRESHOLD,
            tolerant_noise_level: DEFAULT_TOLERANT_NOISE_LEVEL,
            duration_equivalence_threshold: DEFAULT_EQUIVALENCE_THRESHOLD,
        }
    }
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let criteria: Self = serde_json::from_str(&text)?;
        criteria.validate()?;
        Ok(criteria)
    }

    pub fn with_second_peak_ratio(mut self, ratio: f64) -> Self {
        self.second_peak_ratio = ratio;
        self
    }

    pub fn with_frequency_diff_threshold(mut self, hz: f64) -> Self {
        self.frequency_diff_threshold = hz;
        self
    }

    pub fn with_ignore_frequencies(mut self, frequencies: Vec<f64>) -> Self {
        self.ignore_frequencies = frequencies;
        self
    }

    pub fn with_dc_thresholds(mut self, freq: f64, coeff: f64) -> Self {
        self.dc_freq_threshold = freq;
        self.dc_coeff_threshold = coeff;
        self
    }

    pub fn with_tolerant_noise_level(mut self, level: f64) -> Self {
        self.tolerant_noise_level = level;
        self
    }

    pub fn with_duration_equivalence_threshold(mut self, threshold: f64) -> Self {
        self.duration_equivalence_threshold = threshold;
        self
    }

    /// Check every field is inside its valid range
    pub fn validate(&self) -> Result<()> {
        let open_unit = |name: &str, value: f64| {
            if value > 0.0 && value < 1.0 {
                Ok(())
            } else {
                Err(VerifyError::InvalidCriteria(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )))
            }
        };
        open_unit("second_peak_ratio", self.second_peak_ratio)?;
        open_unit("duration_equivalence_threshold", self.duration_equivalence_threshold)?;

        if !(self.frequency_diff_threshold > 0.0) {
            return Err(VerifyError::InvalidCriteria(format!(
                "frequency_diff_threshold must be positive, got {}",
                self.frequency_diff_threshold
            )));
        }
        if !(self.tolerant_noise_level >= 0.0) {
            return Err(VerifyError::InvalidCriteria(format!(
                "tolerant_noise_level must not be negative, got {}",
                self.tolerant_noise_level
            )));
        }
        if let Some(f) = self.ignore_frequencies.iter().find(|f| !f.is_finite()) {
            return Err(VerifyError::InvalidCriteria(format!(
                "ignore frequency {} is not a number",
                f
            )));
        }
        Ok(())
    }
}

/// Which optional checks a run performs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckOptions {
    pub check_anomaly: bool,
    pub check_artifacts: bool,
    /// Expected mute durations in seconds; empty means no expectation
    pub mute_durations: Vec<f64>,
    /// Expected volume steps in order; empty means no expectation
    pub volume_changes: Vec<VolumeDirection>,
}

impl CheckOptions {
    /// Whether the quality collaborator has to run at all
    pub fn needs_quality(&self) -> bool {
        self.check_artifacts || !self.mute_durations.is_empty() || !self.volume_changes.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        // Relative error is taken against these, so zero is meaningless
        match self.mute_durations.iter().find(|&&d| !(d > 0.0 && d.is_finite())) {
            Some(d) => Err(VerifyError::InvalidCriteria(format!(
                "mute durations must be positive, got {}",
                d
            ))),
            None => Ok(()),
        }
    }
}
