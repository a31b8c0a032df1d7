use clap::Parser;
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tonecheck::report::{self, Summary};
use tonecheck::{
    CheckOptions, Criteria, DataFormat, SampleFormat, VerificationRun, Verifier, VerifyError,
    VolumeDirection,
};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EXIT_FAILED: u8 = 1;
const EXIT_INPUT_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "tonecheck")]
#[command(author, version, about = "Check that a raw capture carries the expected test tones")]
struct Args {
    /// Frequency (Hz) of the tone played on each golden channel
    #[arg(short, long, num_args = 1.., required = true)]
    golden_frequencies: Vec<f64>,

    /// Raw, headerless, interleaved capture to check
    #[arg(short, long)]
    test_file: PathBuf,

    /// Sample format of the capture
    #[arg(short = 'f', long, value_enum, default_value_t = SampleFormat::S16Le)]
    sample_format: SampleFormat,

    /// Number of interleaved channels in the capture
    #[arg(short, long, default_value_t = 2)]
    channels: usize,

    /// Sample rate of the capture, usually 48000 or 44100
    #[arg(short, long, default_value_t = 48000.0)]
    rate: f64,

    /// Golden channel for each test channel, or "none" to skip it.
    /// "1 0 none" checks test channel 0 against golden 1, 1 against 0, and
    /// skips channel 2.
    #[arg(short = 'm', long, num_args = 1.., required = true, value_parser = parse_channel_entry)]
    channel_map: Vec<Option<usize>>,

    /// JSON file with criteria; flags below override its fields
    #[arg(long)]
    criteria: Option<PathBuf>,

    /// Fail when the second peak exceeds this share of the first (0-1)
    #[arg(long)]
    second_peak_ratio: Option<f64>,

    /// Allowed deviation (Hz) of the dominant frequency from the golden one
    #[arg(long)]
    frequency_diff_threshold: Option<f64>,

    /// Frequencies to drop before checking, with their 2nd and 3rd harmonics
    #[arg(long, num_args = 1..)]
    ignore_frequencies: Option<Vec<f64>>,

    /// Maximum tolerated equivalent noise level
    #[arg(long)]
    tolerant_noise_level: Option<f64>,

    /// Relative error under which a detected mute matches an expected one
    #[arg(long)]
    equivalence_threshold: Option<f64>,

    /// Peaks below this frequency (Hz) count as DC
    #[arg(long)]
    dc_freq_threshold: Option<f64>,

    /// Largest tolerated DC coefficient
    #[arg(long)]
    dc_coeff_threshold: Option<f64>,

    /// Look for blocks that do not look like the golden sine
    #[arg(long)]
    check_anomaly: bool,

    /// Look for noise, dropouts and bursts around playback
    #[arg(long)]
    check_artifacts: bool,

    /// Expected mute durations in seconds, in order
    #[arg(long, num_args = 1..)]
    mute_durations: Vec<f64>,

    /// Expected volume steps in order: +1 up, -1 down
    #[arg(long, num_args = 1.., allow_negative_numbers = true, value_parser = parse_volume_change)]
    volume_changes: Vec<VolumeDirection>,

    /// Output report file (.json, .csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Show per-channel details and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Only report failures
    #[arg(short, long)]
    quiet: bool,
}

fn parse_channel_entry(s: &str) -> Result<Option<usize>, String> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    s.parse::<usize>()
        .map(Some)
        .map_err(|_| format!("expected a channel index or 'none', got '{}'", s))
}

fn parse_volume_change(s: &str) -> Result<VolumeDirection, String> {
    s.parse::<i64>()
        .ok()
        .and_then(VolumeDirection::from_sign)
        .ok_or_else(|| format!("expected +1 or -1, got '{}'", s))
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tonecheck=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tonecheck=warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Flag > criteria file > default
fn build_criteria(args: &Args) -> tonecheck::Result<Criteria> {
    let mut criteria = match args.criteria {
        Some(ref path) => Criteria::from_json_file(path)?,
        None => Criteria::default(),
    };

    if let Some(ratio) = args.second_peak_ratio {
        criteria.second_peak_ratio = ratio;
    }
    if let Some(hz) = args.frequency_diff_threshold {
        criteria.frequency_diff_threshold = hz;
    }
    if let Some(ref frequencies) = args.ignore_frequencies {
        criteria.ignore_frequencies = frequencies.clone();
    }
    if let Some(level) = args.tolerant_noise_level {
        criteria.tolerant_noise_level = level;
    }
    if let Some(threshold) = args.equivalence_threshold {
        criteria.duration_equivalence_threshold = threshold;
    }
    if let Some(freq) = args.dc_freq_threshold {
        criteria.dc_freq_threshold = freq;
    }
    if let Some(coeff) = args.dc_coeff_threshold {
        criteria.dc_coeff_threshold = coeff;
    }

    criteria.validate()?;
    Ok(criteria)
}

fn execute(args: &Args) -> tonecheck::Result<VerificationRun> {
    let criteria = build_criteria(args)?;
    debug!("criteria: {:?}", criteria);

    let options = CheckOptions {
        check_anomaly: args.check_anomaly,
        check_artifacts: args.check_artifacts,
        mute_durations: args.mute_durations.clone(),
        volume_changes: args.volume_changes.clone(),
    };

    let buffer = std::fs::read(&args.test_file)?;
    let format = DataFormat::new(args.sample_format, args.channels, args.rate);

    Verifier::new(criteria).with_options(options).run(
        &buffer,
        &format,
        &args.golden_frequencies,
        &args.channel_map,
    )
}

fn print_run(run: &VerificationRun, verbose: bool) {
    for channel in &run.channels {
        let color = if channel.errors.is_empty() {
            "\x1b[32m" // Green
        } else {
            "\x1b[31m" // Red
        };
        let reset = "\x1b[0m";
        let peak = channel
            .peak
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());

        eprintln!(
            "{}{:<6}{} channel {:<3} golden {:<3} {:>9.2} Hz  peak {}",
            color,
            if channel.errors.is_empty() { "[PASS]" } else { "[FAIL]" },
            reset,
            channel.test_channel,
            channel.golden_channel,
            channel.golden_frequency,
            peak
        );

        if verbose {
            for error in &channel.errors {
                eprintln!("    {}", error.message);
            }
        }
    }

    let summary = Summary::from_run(run);
    eprintln!("\n{}", "─".repeat(60));
    eprintln!("\x1b[1mSummary:\x1b[0m");
    eprintln!("  \x1b[32m✓ Verified:\x1b[0m {}", summary.verified);
    eprintln!("  \x1b[31m✗ Failed:\x1b[0m   {}", summary.failed);
    if summary.skipped > 0 {
        eprintln!("  \x1b[90mSkipped:\x1b[0m    {}", summary.skipped);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    // Set up thread pool
    if let Some(jobs) = args.jobs {
        ThreadPoolBuilder::new().num_threads(jobs).build_global().ok();
    }

    let run = match execute(&args) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INPUT_ERROR);
        }
    };

    if !args.quiet {
        print_run(&run, args.verbose);
    }

    if let Some(ref output_path) = args.output {
        if let Err(e) = report::generate(output_path, &run) {
            eprintln!("Failed to write report: {}", e);
            return ExitCode::from(EXIT_INPUT_ERROR);
        }
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }
    }

    match run.into_verdict() {
        Ok(peaks) => {
            let rendered: Vec<String> = peaks.iter().map(ToString::to_string).collect();
            println!("[{}]", rendered.join(", "));
            ExitCode::SUCCESS
        }
        Err(VerifyError::Failed { errors }) => {
            for error in &errors {
                println!("{}", error);
            }
            ExitCode::from(EXIT_FAILED)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_INPUT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_entry() {
        assert_eq!(parse_channel_entry("1"), Ok(Some(1)));
        assert_eq!(parse_channel_entry("none"), Ok(None));
        assert_eq!(parse_channel_entry("None"), Ok(None));
        assert!(parse_channel_entry("-1").is_err());
    }

    #[test]
    fn test_parse_volume_change() {
        assert_eq!(parse_volume_change("+1"), Ok(VolumeDirection::Up));
        assert_eq!(parse_volume_change("1"), Ok(VolumeDirection::Up));
        assert_eq!(parse_volume_change("-1"), Ok(VolumeDirection::Down));
        assert!(parse_volume_change("2").is_err());
    }

    #[test]
    fn test_cli_parses_full_command_line() {
        let args = Args::try_parse_from([
            "tonecheck", "-g", "1000", "2000", "-t", "capture.raw", "-f", "S32_LE", "-c", "4",
            "-m", "1", "0", "none", "none", "--check-artifacts", "--volume-changes", "-1", "+1",
        ])
        .unwrap();

        assert_eq!(args.golden_frequencies, vec![1000.0, 2000.0]);
        assert_eq!(args.sample_format, SampleFormat::S32Le);
        assert_eq!(args.channels, 4);
        assert_eq!(args.channel_map, vec![Some(1), Some(0), None, None]);
        assert_eq!(
            args.volume_changes,
            vec![VolumeDirection::Down, VolumeDirection::Up]
        );
        assert!(args.check_artifacts);
        assert_eq!(args.rate, 48000.0);
    }

    #[test]
    fn test_flags_override_criteria_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"second_peak_ratio": 0.2, "tolerant_noise_level": 0.05}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from([
            "tonecheck", "-g", "1000", "-t", "x.raw", "-m", "0", "--criteria", &path,
            "--second-peak-ratio", "0.1",
        ])
        .unwrap();
        let criteria = build_criteria(&args).unwrap();

        assert_eq!(criteria.second_peak_ratio, 0.1);
        assert_eq!(criteria.tolerant_noise_level, 0.05);
        assert_eq!(criteria.frequency_diff_threshold, 5.0);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = Args::try_parse_from([
            "tonecheck", "-g", "1000", "-t", "x.raw", "-m", "0", "--second-peak-ratio", "3",
        ])
        .unwrap();
        assert!(matches!(build_criteria(&args), Err(VerifyError::InvalidCriteria(_))));
    }
}
