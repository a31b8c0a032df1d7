//! Conformance verification
//!
//! Decides whether a recording carries the expected test tones.
//!
//! # Flow
//!
//! ```text
//! raw bytes ─► decode ─► normalize ─► spectrum ─┐
//!                                               ▼
//!            channel map ─────────────► verify_channel (per channel)
//!                                               │
//!                                               ▼
//!                                      VerificationRun ─► verdict
//! ```
//!
//! Each entry of the channel map either names the golden channel a test
//! channel is compared against or skips the test channel entirely. Skipped
//! channels produce neither results nor errors.
//!
//! Channels are checked in parallel; results are collected back in channel
//! map order, so the verdict and its error message are the same as a
//! sequential run.
//!
//! # Verdict
//!
//! A run passes only if no channel produced an error. Otherwise the failure
//! carries every message from every channel, not just the first one.

pub mod channel;
pub mod criteria;
pub mod filter;
pub mod matching;

pub use channel::{verify_channel, ChannelInput, ChannelResult};
pub use criteria::{CheckOptions, Criteria};

use crate::analyzer::{
    BlockInspector, FftSpectrum, PlaybackInspector, SpectralPeak, SpectrumEstimator,
    VolumeDirection,
};
use crate::error::{ChannelError, Result, VerifyError};
use crate::format::{decode, normalize, saturation_value, DataFormat};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// Golden channel index per test channel; `None` skips the test channel
pub type ChannelMap = Vec<Option<usize>>;

/// Result of checking one mapped test channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelOutcome {
    pub test_channel: usize,
    pub golden_channel: usize,
    pub golden_frequency: f64,
    pub peak: Option<SpectralPeak>,
    pub errors: Vec<ChannelError>,
}

impl ChannelOutcome {
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.peak.is_some()
    }
}

/// Every channel outcome of one verification, in channel map order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationRun {
    pub channels: Vec<ChannelOutcome>,
    /// Number of channel map entries that were skipped
    pub skipped: usize,
}

impl VerificationRun {
    pub fn passed(&self) -> bool {
        self.channels.iter().all(|c| c.errors.is_empty())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ChannelError> {
        self.channels.iter().flat_map(|c| c.errors.iter())
    }

    /// Accepted peaks in order, or a failure carrying every channel error
    pub fn into_verdict(self) -> Result<Vec<SpectralPeak>> {
        let errors: Vec<ChannelError> = self.errors().cloned().collect();
        if !errors.is_empty() {
            return Err(VerifyError::Failed { errors });
        }
        Ok(self.channels.into_iter().filter_map(|c| c.peak).collect())
    }
}

/// Checks recordings against golden frequencies.
///
/// # Example
///
/// ```no_run
/// use tonecheck::{Criteria, DataFormat, SampleFormat, Verifier};
///
/// let buffer = std::fs::read("capture.raw").unwrap();
/// let format = DataFormat::new(SampleFormat::S16Le, 2, 48000.0);
///
/// let verifier = Verifier::new(Criteria::default()).with_artifact_check(true);
/// match verifier.verify(&buffer, &format, &[1000.0, 2000.0], &[Some(0), Some(1)]) {
///     Ok(peaks) => println!("dominant peaks: {:?}", peaks),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub struct Verifier {
    criteria: Criteria,
    options: CheckOptions,
    estimator: Box<dyn SpectrumEstimator>,
    inspector: Box<dyn PlaybackInspector>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(Criteria::default())
    }
}

impl Verifier {
    /// Verifier with the FFT estimator and block inspector
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            options: CheckOptions::default(),
            estimator: Box::new(FftSpectrum),
            inspector: Box::new(BlockInspector),
        }
    }

    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_anomaly_check(mut self, enabled: bool) -> Self {
        self.options.check_anomaly = enabled;
        self
    }

    pub fn with_artifact_check(mut self, enabled: bool) -> Self {
        self.options.check_artifacts = enabled;
        self
    }

    pub fn with_mute_durations(mut self, durations: Vec<f64>) -> Self {
        self.options.mute_durations = durations;
        self
    }

    pub fn with_volume_changes(mut self, changes: Vec<VolumeDirection>) -> Self {
        self.options.volume_changes = changes;
        self
    }

    pub fn with_estimator<E: SpectrumEstimator + 'static>(mut self, estimator: E) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn with_inspector<I: PlaybackInspector + 'static>(mut self, inspector: I) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// Decode a raw buffer and check every mapped channel.
    pub fn run(
        &self,
        buffer: &[u8],
        format: &DataFormat,
        golden_frequencies: &[f64],
        channel_map: &[Option<usize>],
    ) -> Result<VerificationRun> {
        let channels = decode(buffer, format)?;
        let saturate_value = saturation_value(format.sample_format);
        debug!("saturate_value: {}", saturate_value);

        let normalized: Vec<Vec<f64>> = channels
            .iter()
            .map(|signal| normalize(signal, saturate_value))
            .collect();

        self.run_signals(&normalized, format.sample_rate, golden_frequencies, channel_map)
    }

    /// Check already normalized per-channel signals.
    pub fn run_signals(
        &self,
        signals: &[Vec<f64>],
        rate: f64,
        golden_frequencies: &[f64],
        channel_map: &[Option<usize>],
    ) -> Result<VerificationRun> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(VerifyError::InvalidCriteria(format!(
                "sample rate must be positive, got {}",
                rate
            )));
        }
        self.criteria.validate()?;
        self.options.validate()?;
        validate_channel_map(channel_map, signals.len(), golden_frequencies.len())?;

        let channels: Vec<ChannelOutcome> = channel_map
            .par_iter()
            .enumerate()
            .filter_map(|(test_channel, golden_channel)| match *golden_channel {
                Some(golden_channel) => Some(self.check_channel(
                    test_channel,
                    golden_channel,
                    &signals[test_channel],
                    rate,
                    golden_frequencies[golden_channel],
                )),
                None => {
                    info!("Skipped channel {}", test_channel);
                    None
                }
            })
            .collect();

        let run = VerificationRun {
            skipped: channel_map.len() - channels.len(),
            channels,
        };
        info!(
            "Verified {} channel(s), {} skipped: {}",
            run.channels.len(),
            run.skipped,
            if run.passed() { "pass" } else { "fail" }
        );
        Ok(run)
    }

    fn check_channel(
        &self,
        test_channel: usize,
        golden_channel: usize,
        signal: &[f64],
        rate: f64,
        golden_frequency: f64,
    ) -> ChannelOutcome {
        let spectrum = self.estimator.spectrum(signal, rate);
        debug!("Channel {} spectral: {:?}", test_channel, spectrum);

        let input = ChannelInput {
            channel: test_channel,
            signal,
            rate,
            spectrum: &spectrum,
            golden_frequency,
        };
        let result = verify_channel(input, &self.criteria, &self.options, self.inspector.as_ref());

        ChannelOutcome {
            test_channel,
            golden_channel,
            golden_frequency,
            peak: result.peak,
            errors: result.errors,
        }
    }

    /// Decode, check and reduce to a verdict.
    pub fn verify(
        &self,
        buffer: &[u8],
        format: &DataFormat,
        golden_frequencies: &[f64],
        channel_map: &[Option<usize>],
    ) -> Result<Vec<SpectralPeak>> {
        self.run(buffer, format, golden_frequencies, channel_map)?
            .into_verdict()
    }

    /// Check normalized signals and reduce to a verdict.
    pub fn verify_signals(
        &self,
        signals: &[Vec<f64>],
        rate: f64,
        golden_frequencies: &[f64],
        channel_map: &[Option<usize>],
    ) -> Result<Vec<SpectralPeak>> {
        self.run_signals(signals, rate, golden_frequencies, channel_map)?
            .into_verdict()
    }
}

fn validate_channel_map(channel_map: &[Option<usize>], channels: usize, goldens: usize) -> Result<()> {
    if channel_map.len() > channels {
        return Err(VerifyError::InvalidChannelMap(format!(
            "{} entries but the recording has {} channel(s)",
            channel_map.len(),
            channels
        )));
    }
    for (test_channel, entry) in channel_map.iter().enumerate() {
        if let Some(golden) = *entry {
            if golden >= goldens {
                return Err(VerifyError::InvalidChannelMap(format!(
                    "test channel {} maps to golden channel {} but only {} golden frequencies were given",
                    test_channel, golden, goldens
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{ArtifactReport, Spectrum};

    // ==========================================================================
    // TEST DOUBLES
    // ==========================================================================
    //
    // Each fake signal carries its channel id in the first sample; the fake
    // estimator hands back the scripted spectrum for that id.
    // ==========================================================================

    struct TableSpectrum(Vec<Spectrum>);

    impl SpectrumEstimator for TableSpectrum {
        fn spectrum(&self, signal: &[f64], _rate: f64) -> Spectrum {
            self.0[signal[0] as usize].clone()
        }
    }

    struct Quiet;

    impl PlaybackInspector for Quiet {
        fn detect_anomaly(&self, _: &[f64], _: f64, _: f64) -> Vec<f64> {
            Vec::new()
        }

        fn measure_quality(&self, _: &[f64], _: f64, _: f64) -> ArtifactReport {
            ArtifactReport::default()
        }
    }

    fn signals(count: usize) -> Vec<Vec<f64>> {
        (0..count).map(|i| vec![i as f64; 4]).collect()
    }

    fn spectra(table: &[&[(f64, f64)]]) -> TableSpectrum {
        TableSpectrum(
            table
                .iter()
                .map(|peaks| peaks.iter().map(|&p| SpectralPeak::from(p)).collect())
                .collect(),
        )
    }

    fn verifier(table: &[&[(f64, f64)]]) -> Verifier {
        Verifier::default()
            .with_estimator(spectra(table))
            .with_inspector(Quiet)
    }

    // ==========================================================================
    // AGGREGATION TESTS
    // ==========================================================================

    #[test]
    fn test_all_channels_pass() {
        let v = verifier(&[&[(1000.0, 1.0)], &[(2000.0, 0.8)]]);
        let peaks = v
            .verify_signals(&signals(2), 48000.0, &[1000.0, 2000.0], &[Some(0), Some(1)])
            .unwrap();

        assert_eq!(
            peaks,
            vec![SpectralPeak::new(1000.0, 1.0), SpectralPeak::new(2000.0, 0.8)]
        );
    }

    #[test]
    fn test_channel_map_can_swap_channels() {
        let v = verifier(&[&[(2000.0, 1.0)], &[(1000.0, 1.0)]]);
        let peaks = v
            .verify_signals(&signals(2), 48000.0, &[1000.0, 2000.0], &[Some(1), Some(0)])
            .unwrap();

        assert_eq!(peaks[0].frequency, 2000.0);
        assert_eq!(peaks[1].frequency, 1000.0);
    }

    #[test]
    fn test_skipped_channel_is_omitted() {
        // Channel 0 would fail badly, but it is skipped
        let v = verifier(&[&[], &[(1000.0, 1.0)]]);
        let run = v
            .run_signals(&signals(2), 48000.0, &[1000.0], &[None, Some(0)])
            .unwrap();

        assert_eq!(run.channels.len(), 1);
        assert_eq!(run.skipped, 1);
        assert_eq!(run.channels[0].test_channel, 1);
        assert_eq!(run.into_verdict().unwrap(), vec![SpectralPeak::new(1000.0, 1.0)]);
    }

    #[test]
    fn test_failure_carries_every_channel_error() {
        let v = verifier(&[&[(1100.0, 1.0)], &[(1000.0, 1.0)], &[]]);
        let err = v
            .verify_signals(&signals(3), 48000.0, &[1000.0], &[Some(0), Some(0), Some(0)])
            .unwrap_err();

        let message = err.to_string();
        assert_eq!(err.messages().len(), 3, "{}", message);
        assert!(message.starts_with("Channel 0: Dominant frequency 1100 is away from golden 1000"));
        assert!(message.contains(", Channel 2: Can not find dominant frequency."));
        assert!(!message.contains("Channel 1"));
    }

    #[test]
    fn test_errors_keep_channel_map_order() {
        let table: Vec<&[(f64, f64)]> = vec![&[]; 8];
        let v = verifier(&table);
        let map: Vec<Option<usize>> = (0..8).map(|_| Some(0)).collect();

        let err = v.verify_signals(&signals(8), 48000.0, &[1000.0], &map).unwrap_err();

        let channels: Vec<usize> = match err {
            VerifyError::Failed { errors } => errors.iter().map(|e| e.channel).collect(),
            other => panic!("unexpected error: {}", other),
        };
        let mut sorted = channels.clone();
        sorted.sort();
        assert_eq!(channels, sorted);
        assert_eq!(channels.len(), 16);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let v = verifier(&[&[(1000.0, 1.0), (1500.0, 0.2)], &[(2000.0, 1.0)]]);
        let first = v.run_signals(&signals(2), 48000.0, &[1000.0, 2000.0], &[Some(0), Some(1)]);
        let second = v.run_signals(&signals(2), 48000.0, &[1000.0, 2000.0], &[Some(0), Some(1)]);

        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_map_shorter_than_recording() {
        let v = verifier(&[&[(1000.0, 1.0)], &[]]);
        let peaks = v
            .verify_signals(&signals(2), 48000.0, &[1000.0], &[Some(0)])
            .unwrap();
        assert_eq!(peaks.len(), 1);
    }

    // ==========================================================================
    // INPUT VALIDATION
    // ==========================================================================

    #[test]
    fn test_map_longer_than_recording_is_rejected() {
        let v = verifier(&[&[(1000.0, 1.0)]]);
        let err = v
            .run_signals(&signals(1), 48000.0, &[1000.0], &[Some(0), Some(0)])
            .unwrap_err();
        assert!(matches!(err, VerifyError::InvalidChannelMap(_)));
    }

    #[test]
    fn test_unknown_golden_channel_is_rejected() {
        let v = verifier(&[&[(1000.0, 1.0)]]);
        let err = v
            .run_signals(&signals(1), 48000.0, &[1000.0], &[Some(3)])
            .unwrap_err();
        assert!(matches!(err, VerifyError::InvalidChannelMap(_)));
    }

    #[test]
    fn test_zero_mute_duration_is_rejected() {
        let v = verifier(&[&[(1000.0, 1.0)]]).with_mute_durations(vec![0.0]);
        let err = v
            .run_signals(&signals(1), 48000.0, &[1000.0], &[Some(0)])
            .unwrap_err();
        assert!(matches!(err, VerifyError::InvalidCriteria(_)));
    }

    #[test]
    fn test_non_positive_rate_is_rejected() {
        let v = verifier(&[&[(1000.0, 1.0)]]);
        for rate in [0.0, -48000.0, f64::NAN] {
            let err = v
                .run_signals(&signals(1), rate, &[1000.0], &[Some(0)])
                .unwrap_err();
            assert!(matches!(err, VerifyError::InvalidCriteria(_)), "rate {}: {}", rate, err);
        }
    }

    #[test]
    fn test_decode_error_aborts_run() {
        let v = Verifier::default();
        let format = DataFormat::new(crate::format::SampleFormat::S16Le, 2, 48000.0);
        let err = v.verify(&[0u8; 3], &format, &[1000.0], &[Some(0)]).unwrap_err();
        assert!(matches!(err, VerifyError::Decode(_)));
    }
}
