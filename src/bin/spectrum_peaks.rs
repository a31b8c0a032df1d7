//! Per-channel spectral peaks and playback artifacts of a raw capture, for
//! investigating why a channel fails verification

use std::env;
use std::process::ExitCode;
use tonecheck::analyzer::{BlockInspector, PlaybackInspector};
use tonecheck::format::{decode, normalize, saturation_value};
use tonecheck::{DataFormat, FftSpectrum, SampleFormat, SpectrumEstimator};

const DEFAULT_PEAK_COUNT: usize = 10;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!("Usage: spectrum_peaks <file> <format> <channels> <rate> [peaks]");
        eprintln!("  e.g. spectrum_peaks capture.raw S16_LE 2 48000");
        return ExitCode::FAILURE;
    }

    match analyze_file(&args[1..]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn analyze_file(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let path = &args[0];
    let sample_format: SampleFormat = args[1].parse()?;
    let channel_count: usize = args[2].parse()?;
    let rate: f64 = args[3].parse()?;
    let peak_count = match args.get(4) {
        Some(n) => n.parse()?,
        None => DEFAULT_PEAK_COUNT,
    };

    let data = std::fs::read(path)?;
    let format = DataFormat::new(sample_format, channel_count, rate);
    let channels = decode(&data, &format)?;
    let saturate_value = saturation_value(sample_format);

    println!("\n{}", "=".repeat(60));
    println!("FILE: {}", path);
    println!("{}", "=".repeat(60));
    let frames = channels.first().map_or(0, Vec::len);
    println!("Format: {} x {} @ {} Hz", sample_format, channel_count, rate);
    println!("Frames: {} ({:.2}s)", frames, frames as f64 / rate);

    for (index, raw) in channels.iter().enumerate() {
        let signal = normalize(raw, saturate_value);
        let spectrum = FftSpectrum.spectrum(&signal, rate);

        println!("\nChannel {}:", index);
        println!("{:>12} {:>12} {:>10}", "Freq (Hz)", "Coeff", "dB");
        for peak in spectrum.iter().take(peak_count) {
            println!(
                "{:>12.2} {:>12.6} {:>10.1}",
                peak.frequency,
                peak.coefficient,
                to_db(peak.coefficient)
            );
        }

        // Artifacts are measured against the strongest peak
        if let Some(dominant) = spectrum.first() {
            let report = BlockInspector.measure_quality(&signal, rate, dominant.frequency);
            println!("  Noise level: {:.6}", report.equivalent_noise_level);
            println!("  Delays: {:?}", report.delay_during_playback);
            println!("  Bursts: {:?}", report.burst_during_playback);
            println!("  Volume changes: {:?}", report.volume_changes);
        }
    }

    Ok(())
}

fn to_db(coefficient: f64) -> f64 {
    if coefficient <= 0.0 {
        -120.0
    } else {
        20.0 * coefficient.log10()
    }
}
