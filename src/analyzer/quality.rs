//! Playback quality measurement
//!
//! Works on a block envelope of the signal (RMS and peak per block):
//!
//! ```text
//!   level
//!     │        ┌──────┐   ┌───┐  ┌──────────┐
//!     │        │      │   │   │  │          │
//!     │ ▁▁▁    │      └───┘   └──┘          │      ▁
//!     └────────┴────────────────────────────┴──────────► time
//!      noise    playback  delay  volume step   noise
//!      before                                   after
//! ```
//!
//! - **Playback** runs from the first to the last block louder than 10% of
//!   the loudest block.
//! - **Noise before/after** are runs of blocks outside playback that are
//!   above an absolute noise floor.
//! - **Delays** are runs of blocks inside playback quieter than 5% of the
//!   loudest block.
//! - **Bursts** are blocks whose peak is well above both neighbours.
//! - **Volume changes** are steps of more than 25% against a running
//!   reference level; steps in the same direction close together count once.
//! - **Equivalent noise level** is what a sine fit at the dominant frequency
//!   leaves behind, as an amplitude ratio over the playback.

use super::anomaly::ACTIVE_RATIO;
use super::{
    block_size, fit_sine, peak, rms, ArtifactReport, TimeWindow, VolumeChange, VolumeDirection,
};
use std::ops::Range;
use tracing::debug;

/// Absolute RMS above which a block outside playback counts as noise
const NOISE_FLOOR: f64 = 0.001;

/// Blocks below this fraction of the loudest block are muted
const MUTE_RATIO: f64 = 0.05;

/// Peak ratio against both neighbours that marks a burst
const BURST_RATIO: f64 = 1.5;

/// Level ratio against the reference that marks a volume step
const VOLUME_CHANGE_RATIO: f64 = 1.25;

/// Same-direction steps closer than this many blocks are one change
const STABLE_BLOCKS: usize = 20;

struct Envelope<'a> {
    blocks: Vec<&'a [f64]>,
    levels: Vec<f64>,
    size: usize,
    rate: f64,
}

impl<'a> Envelope<'a> {
    fn new(signal: &'a [f64], rate: f64, frequency: f64) -> Self {
        let size = block_size(rate, frequency);
        let blocks: Vec<&[f64]> = signal.chunks(size).collect();
        let levels = blocks.iter().map(|b| rms(b)).collect();
        Self {
            blocks,
            levels,
            size,
            rate,
        }
    }

    fn time(&self, index: usize) -> f64 {
        (index * self.size) as f64 / self.rate
    }

    /// Maximal runs of blocks in `range` satisfying `pred`
    fn runs(&self, range: Range<usize>, pred: impl Fn(usize) -> bool) -> Vec<TimeWindow> {
        let mut windows = Vec::new();
        let mut run_start: Option<usize> = None;

        for i in range.clone() {
            match (pred(i), run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(s)) => {
                    windows.push(self.window(s, i));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = run_start {
            windows.push(self.window(s, range.end));
        }
        windows
    }

    fn window(&self, first: usize, end: usize) -> TimeWindow {
        let samples: usize = self.blocks[first..end].iter().map(|b| b.len()).sum();
        TimeWindow::new(self.time(first), samples as f64 / self.rate)
    }
}

/// Measure playback artifacts of a normalized signal whose tone is at
/// `dominant_frequency`.
pub fn measure_quality(signal: &[f64], rate: f64, dominant_frequency: f64) -> ArtifactReport {
    let mut report = ArtifactReport::default();
    if signal.is_empty() || rate <= 0.0 {
        return report;
    }

    let env = Envelope::new(signal, rate, dominant_frequency);
    let loudest = env.levels.iter().cloned().fold(0.0, f64::max);
    if loudest <= 0.0 {
        return report;
    }

    let active = |i: usize| env.levels[i] > loudest * ACTIVE_RATIO;
    let count = env.levels.len();
    let (start, end) = match (
        (0..count).find(|&i| active(i)),
        (0..count).rev().find(|&i| active(i)),
    ) {
        (Some(s), Some(e)) => (s, e),
        _ => return report,
    };

    report.noise_before_playback = env.runs(0..start, |i| env.levels[i] > NOISE_FLOOR);
    report.noise_after_playback = env.runs(end + 1..count, |i| env.levels[i] > NOISE_FLOOR);

    let muted: Vec<bool> = env.levels.iter().map(|&l| l < loudest * MUTE_RATIO).collect();
    report.delay_during_playback = env.runs(start..end + 1, |i| muted[i]);

    report.burst_during_playback = find_bursts(&env, start, end, &muted);
    report.volume_changes = find_volume_changes(&env, start, end, &muted);
    report.equivalent_noise_level = noise_level(&env, start, end, &muted, dominant_frequency);

    debug!(
        "Playback blocks {}..={} of {} ({} samples each), loudest rms {:.4}",
        start, end, count, env.size, loudest
    );
    report
}

fn find_bursts(env: &Envelope, start: usize, end: usize, muted: &[bool]) -> Vec<f64> {
    // Both neighbours must be unmuted playback blocks
    (start + 1..end)
        .filter(|&i| !muted[i - 1] && !muted[i] && !muted[i + 1])
        .filter(|&i| {
            let neighbours = peak(env.blocks[i - 1]).max(peak(env.blocks[i + 1]));
            peak(env.blocks[i]) > neighbours * BURST_RATIO
        })
        .map(|i| env.time(i))
        .collect()
}

fn find_volume_changes(
    env: &Envelope,
    start: usize,
    end: usize,
    muted: &[bool],
) -> Vec<VolumeChange> {
    let mut changes = Vec::new();
    let mut reference: Option<f64> = None;
    let mut trend: Option<VolumeDirection> = None;
    let mut stable = 0usize;

    for i in start..=end {
        if muted[i] {
            // A mute is a delay, not a volume change
            reference = None;
            continue;
        }
        let level = env.levels[i];
        let Some(ref_level) = reference else {
            reference = Some(level);
            continue;
        };

        let direction = if level > ref_level * VOLUME_CHANGE_RATIO {
            Some(VolumeDirection::Up)
        } else if level * VOLUME_CHANGE_RATIO < ref_level {
            Some(VolumeDirection::Down)
        } else {
            None
        };

        match direction {
            Some(direction) => {
                if trend != Some(direction) || stable >= STABLE_BLOCKS {
                    changes.push(VolumeChange {
                        time: env.time(i),
                        direction,
                    });
                }
                trend = Some(direction);
                reference = Some(level);
                stable = 0;
            }
            None => stable += 1,
        }
    }
    changes
}

fn noise_level(env: &Envelope, start: usize, end: usize, muted: &[bool], frequency: f64) -> f64 {
    let (mut residual, mut energy) = (0.0, 0.0);
    for i in start..=end {
        if muted[i] || env.blocks[i].len() < env.size {
            continue;
        }
        let fit = fit_sine(env.blocks[i], env.rate, frequency);
        residual += fit.residual;
        energy += fit.energy;
    }
    if energy <= 0.0 {
        return 0.0;
    }
    (residual / energy).sqrt()
}
