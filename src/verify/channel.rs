//! Per-channel verification
//!
//! Every check appends to the channel's error list and moves on; only an
//! empty spectrum after the ignore list ends a channel early, since there is
//! no dominant frequency to check anything against.
//!
//! ```text
//! spectrum ─► ignore list ─► dominant vs golden ─► anomaly ─► quality
//!                  │                                             │
//!                  └──► DC ─► self-harmonics ─► second peak ─► result
//! ```

use super::criteria::{CheckOptions, Criteria};
use super::filter::{harmonic_targets, ignore_targets, suppress};
use super::matching::align;
use crate::analyzer::{ArtifactReport, PlaybackInspector, SpectralPeak, TimeWindow};
use crate::error::ChannelError;
use std::fmt::Display;
use tracing::{debug, info};

/// Everything the verifier knows about one test channel
#[derive(Debug, Clone, Copy)]
pub struct ChannelInput<'a> {
    /// Index of the channel in the recording
    pub channel: usize,
    /// Normalized samples
    pub signal: &'a [f64],
    pub rate: f64,
    pub spectrum: &'a [SpectralPeak],
    pub golden_frequency: f64,
}

/// Outcome of checking one channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelResult {
    /// Accepted (frequency, coefficient), present when a peak survived filtering
    pub peak: Option<SpectralPeak>,
    pub errors: Vec<ChannelError>,
}

impl ChannelResult {
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.peak.is_some()
    }
}

/// Render a sequence as `[a, b, c]`
fn list<T: Display>(items: &[T]) -> String {
    let inner: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", inner.join(", "))
}

struct Checker<'a> {
    input: ChannelInput<'a>,
    criteria: &'a Criteria,
    options: &'a CheckOptions,
    inspector: &'a dyn PlaybackInspector,
    errors: Vec<ChannelError>,
}

impl<'a> Checker<'a> {
    fn fail(&mut self, message: String) {
        debug!("Channel {}: {}", self.input.channel, message);
        self.errors.push(ChannelError::new(self.input.channel, message));
    }

    fn nothing_left(&mut self, remaining: &[SpectralPeak]) {
        let message = format!(
            "No frequency left after removing unwanted frequencies. Spectral: {}; \
             After removing unwanted frequencies: {}",
            list(self.input.spectrum),
            list(remaining)
        );
        self.fail(message);
    }

    fn run(mut self) -> ChannelResult {
        let input = self.input;
        let criteria = self.criteria;
        let tolerance = criteria.frequency_diff_threshold;

        if input.spectrum.is_empty() {
            self.fail("Can not find dominant frequency.".to_string());
        }

        let filtered = suppress(
            input.spectrum,
            &ignore_targets(&criteria.ignore_frequencies),
            tolerance,
        );
        if filtered.is_empty() {
            self.nothing_left(&filtered);
            return self.finish(None);
        }

        let dominant = filtered[0];
        if (dominant.frequency - input.golden_frequency).abs() > tolerance {
            self.fail(format!(
                "Dominant frequency {} is away from golden {}",
                dominant.frequency, input.golden_frequency
            ));
        }

        if self.options.check_anomaly {
            self.check_anomaly();
        }

        if self.options.needs_quality() {
            let mut report =
                self.inspector
                    .measure_quality(input.signal, input.rate, dominant.frequency);
            debug!("Channel {} quality measurement: {:?}", input.channel, report);
            self.check_quality(&mut report);
        }

        for peak in &filtered {
            if peak.frequency < criteria.dc_freq_threshold
                && peak.coefficient > criteria.dc_coeff_threshold
            {
                self.fail(format!(
                    "Found large DC coefficient: ({:.6} Hz, {:.6})",
                    peak.frequency, peak.coefficient
                ));
            }
        }

        let clean = suppress(&filtered, &harmonic_targets(dominant.frequency), tolerance);

        if clean.len() > 1 && clean[1].coefficient > clean[0].coefficient * criteria.second_peak_ratio {
            self.fail(format!("Found large second dominant frequencies: {}", list(&clean)));
        }

        match clean.first() {
            Some(&peak) => self.finish(Some(peak)),
            None => {
                self.nothing_left(&clean);
                self.finish(None)
            }
        }
    }

    fn check_anomaly(&mut self) {
        let input = self.input;
        let anomalies =
            self.inspector
                .detect_anomaly(input.signal, input.rate, input.golden_frequency);
        if anomalies.is_empty() {
            info!("Channel {}: Quality is good as there is no anomaly", input.channel);
        } else {
            self.fail(format!("Detect anomaly near these time: {}", list(&anomalies)));
        }
    }

    fn check_quality(&mut self, report: &mut ArtifactReport) {
        let options = self.options;
        let criteria = self.criteria;

        if options.check_artifacts {
            if !report.noise_before_playback.is_empty() {
                self.fail(format!(
                    "Detects artifacts before playing near these time and duration: {}",
                    list(&report.noise_before_playback)
                ));
            }
            if !report.noise_after_playback.is_empty() {
                self.fail(format!(
                    "Detects artifacts after playing near these time and duration: {}",
                    list(&report.noise_after_playback)
                ));
            }
        }

        if !options.mute_durations.is_empty() {
            let delay_durations: Vec<f64> =
                report.delay_during_playback.iter().map(|d| d.duration).collect();
            let (mute_matched, delay_matched) = align(
                &options.mute_durations,
                &delay_durations,
                criteria.duration_equivalence_threshold,
            );

            // Only delays nobody asked for are left to judge
            let unexpected: Vec<TimeWindow> = report
                .delay_during_playback
                .iter()
                .zip(&delay_matched)
                .filter(|&(_, &matched)| !matched)
                .map(|(delay, _)| *delay)
                .collect();
            report.delay_during_playback = unexpected;

            let unmatched: Vec<f64> = options
                .mute_durations
                .iter()
                .zip(&mute_matched)
                .filter(|&(_, &matched)| !matched)
                .map(|(duration, _)| *duration)
                .collect();
            if !unmatched.is_empty() {
                self.fail(format!("Unmatched mute duration: {}", list(&unmatched)));
            }
        }

        if options.check_artifacts {
            if !report.delay_during_playback.is_empty() {
                self.fail(format!(
                    "Detects delay during playing near these time and duration: {}",
                    list(&report.delay_during_playback)
                ));
            }
            if !report.burst_during_playback.is_empty() {
                self.fail(format!(
                    "Detects burst/pop near these time: {}",
                    list(&report.burst_during_playback)
                ));
            }
            if report.equivalent_noise_level > criteria.tolerant_noise_level {
                self.fail(format!(
                    "noise level is higher than tolerant noise level: {:.6} > {:.6}",
                    report.equivalent_noise_level, criteria.tolerant_noise_level
                ));
            }
        }

        if !options.volume_changes.is_empty() {
            let detected = report.volume_changes.iter().map(|c| c.direction);
            let matched = report.volume_changes.len() == options.volume_changes.len()
                && detected.eq(options.volume_changes.iter().copied());
            if !matched {
                self.fail(format!(
                    "volume changing is not as expected, found changing time and events are: {} \
                     while expected changing events are {}",
                    list(&report.volume_changes),
                    list(&options.volume_changes)
                ));
            }
        }
    }

    fn finish(self, peak: Option<SpectralPeak>) -> ChannelResult {
        ChannelResult {
            peak,
            errors: self.errors,
        }
    }
}

/// Run every check on one channel, collecting all failures.
pub fn verify_channel(
    input: ChannelInput<'_>,
    criteria: &Criteria,
    options: &CheckOptions,
    inspector: &dyn PlaybackInspector,
) -> ChannelResult {
    debug!(
        "Checking channel {} spectral {} against frequency {}",
        input.channel,
        list(input.spectrum),
        input.golden_frequency
    );
    Checker {
        input,
        criteria,
        options,
        inspector,
        errors: Vec::new(),
    }
    .run()
}
