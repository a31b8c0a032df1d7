//! Anomaly detection around an expected tone
//!
//! The signal is cut into blocks (see [`block_size`](super::block_size)).
//! Each block that is part of the playback gets a least-squares sine fit at
//! the expected frequency; a block whose residual is a large share of its
//! energy does not look like the tone and is reported by its start time.

use super::{block_size, fit_sine, rms};
use tracing::debug;

/// Blocks quieter than this fraction of the loudest block are not playback
pub(crate) const ACTIVE_RATIO: f64 = 0.1;

/// Residual share of block energy above which a block is anomalous
const ANOMALY_RESIDUAL_RATIO: f64 = 0.3;

/// Start times (seconds) of blocks that deviate from a tone at `frequency`.
pub fn detect_anomaly(signal: &[f64], rate: f64, frequency: f64) -> Vec<f64> {
    if signal.is_empty() || rate <= 0.0 || frequency <= 0.0 {
        return Vec::new();
    }

    let size = block_size(rate, frequency);
    let levels: Vec<f64> = signal.chunks(size).map(rms).collect();
    let loudest = levels.iter().cloned().fold(0.0, f64::max);
    if loudest <= 0.0 {
        return Vec::new();
    }

    let mut anomalies = Vec::new();
    for (index, (block, &level)) in signal.chunks(size).zip(levels.iter()).enumerate() {
        // A trailing partial block is too short to fit reliably
        if block.len() < size || level <= loudest * ACTIVE_RATIO {
            continue;
        }
        let fit = fit_sine(block, rate, frequency);
        if fit.residual > fit.energy * ANOMALY_RESIDUAL_RATIO {
            anomalies.push((index * size) as f64 / rate);
        }
    }

    debug!(
        "Anomaly detection at {} Hz over {} blocks: {:?}",
        frequency,
        levels.len(),
        anomalies
    );
    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f64 = 48000.0;

    fn sine(freq: f64, amplitude: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|n| amplitude * (2.0 * std::f64::consts::PI * freq * n as f64 / RATE).sin())
            .collect()
    }

    #[test]
    fn test_clean_tone_has_no_anomaly() {
        let signal = sine(1000.0, 0.5, 48000);
        assert!(detect_anomaly(&signal, RATE, 1000.0).is_empty());
    }

    #[test]
    fn test_wrong_tone_is_anomalous_everywhere() {
        let signal = sine(1500.0, 0.5, 4800);
        let anomalies = detect_anomaly(&signal, RATE, 1000.0);
        assert_eq!(anomalies.len(), 10);
        assert_eq!(anomalies[0], 0.0);
    }

    #[test]
    fn test_glitch_block_is_reported() {
        // Block 20 (0.2 s) replaced by a different tone
        let mut signal = sine(1000.0, 0.5, 48000);
        let glitch = sine(3000.0, 0.5, 480);
        signal[9600..10080].copy_from_slice(&glitch);

        let anomalies = detect_anomaly(&signal, RATE, 1000.0);

        assert_eq!(anomalies.len(), 1, "anomalies: {:?}", anomalies);
        assert!((anomalies[0] - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_silence_is_not_anomalous() {
        assert!(detect_anomaly(&vec![0.0; 4800], RATE, 1000.0).is_empty());
        assert!(detect_anomaly(&[], RATE, 1000.0).is_empty());
    }
}
