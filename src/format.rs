//! Raw PCM sample formats and decoding
//!
//! Test captures are headerless, interleaved, little-endian PCM. The
//! [`DataFormat`] passed alongside a buffer says how to slice it into frames
//! and samples; [`decode`] turns it into one sample vector per channel.
//!
//! ```text
//! Format    | Width | Saturation value
//! ----------|-------|------------------
//! U8        | 1     | 128 (re-centred around 0)
//! S16_LE    | 2     | 32768
//! S24_LE    | 4     | 8388608 (24 bits in a 32-bit container)
//! S32_LE    | 4     | 2147483648
//! FLOAT_LE  | 4     | 1.0
//! ```

use crate::error::{Result, VerifyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum SampleFormat {
    #[serde(rename = "U8")]
    #[value(name = "U8")]
    U8,
    #[serde(rename = "S16_LE")]
    #[value(name = "S16_LE")]
    S16Le,
    #[serde(rename = "S24_LE")]
    #[value(name = "S24_LE")]
    S24Le,
    #[serde(rename = "S32_LE")]
    #[value(name = "S32_LE")]
    S32Le,
    #[serde(rename = "FLOAT_LE")]
    #[value(name = "FLOAT_LE")]
    FloatLe,
}

impl SampleFormat {
    /// Bytes occupied by one sample in the buffer
    pub fn width(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16Le => 2,
            SampleFormat::S24Le | SampleFormat::S32Le | SampleFormat::FloatLe => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "U8",
            SampleFormat::S16Le => "S16_LE",
            SampleFormat::S24Le => "S24_LE",
            SampleFormat::S32Le => "S32_LE",
            SampleFormat::FloatLe => "FLOAT_LE",
        }
    }

    fn read(self, bytes: &[u8]) -> f64 {
        match self {
            SampleFormat::U8 => bytes[0] as f64 - 128.0,
            SampleFormat::S16Le => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            SampleFormat::S24Le => {
                // Sign-extend the low 24 bits of the container
                let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                ((raw << 8) >> 8) as f64
            }
            SampleFormat::S32Le => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            SampleFormat::FloatLe => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "U8" => Ok(SampleFormat::U8),
            "S16_LE" => Ok(SampleFormat::S16Le),
            "S24_LE" => Ok(SampleFormat::S24Le),
            "S32_LE" => Ok(SampleFormat::S32Le),
            "FLOAT_LE" => Ok(SampleFormat::FloatLe),
            other => Err(VerifyError::Decode(format!("unknown sample format '{}'", other))),
        }
    }
}

/// Describes one raw audio stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataFormat {
    pub sample_format: SampleFormat,
    pub channel_count: usize,
    pub sample_rate: f64,
}

impl DataFormat {
    pub fn new(sample_format: SampleFormat, channel_count: usize, sample_rate: f64) -> Self {
        Self {
            sample_format,
            channel_count,
            sample_rate,
        }
    }

    /// Bytes per interleaved frame
    pub fn frame_size(&self) -> usize {
        self.sample_format.width() * self.channel_count
    }
}

/// Largest magnitude a sample of `format` can reach
pub fn saturation_value(format: SampleFormat) -> f64 {
    match format {
        SampleFormat::U8 => 128.0,
        SampleFormat::S16Le => 32768.0,
        SampleFormat::S24Le => 8_388_608.0,
        SampleFormat::S32Le => 2_147_483_648.0,
        SampleFormat::FloatLe => 1.0,
    }
}

/// Split an interleaved buffer into per-channel sample vectors.
pub fn decode(buffer: &[u8], format: &DataFormat) -> Result<Vec<Vec<f64>>> {
    if format.channel_count == 0 {
        return Err(VerifyError::Decode("channel count must be positive".into()));
    }
    if !(format.sample_rate > 0.0) {
        return Err(VerifyError::Decode(format!(
            "sample rate must be positive, got {}",
            format.sample_rate
        )));
    }

    let frame_size = format.frame_size();
    if buffer.len() % frame_size != 0 {
        return Err(VerifyError::Decode(format!(
            "buffer of {} bytes is not a whole number of {}-byte {} frames",
            buffer.len(),
            frame_size,
            format.sample_format
        )));
    }

    let frames = buffer.len() / frame_size;
    let width = format.sample_format.width();
    let mut channels = vec![Vec::with_capacity(frames); format.channel_count];

    for frame in buffer.chunks_exact(frame_size) {
        for (channel, sample) in channels.iter_mut().zip(frame.chunks_exact(width)) {
            channel.push(format.sample_format.read(sample));
        }
    }

    Ok(channels)
}

/// Scale a signal so that the saturation value maps to 1.0
pub fn normalize(signal: &[f64], saturate_value: f64) -> Vec<f64> {
    signal.iter().map(|&s| s / saturate_value).collect()
}
