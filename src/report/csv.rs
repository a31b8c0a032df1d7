//! CSV report output
//!
//! One row per checked channel. Multiple errors on a channel are joined with
//! `; ` in the last column.

use crate::error::Result;
use crate::verify::VerificationRun;
use std::io::Write;

const HEADER: &str =
    "test_channel,golden_channel,golden_frequency,peak_frequency,peak_coefficient,status,errors";

pub fn write<W: Write>(writer: &mut W, run: &VerificationRun) -> Result<()> {
    writeln!(writer, "{}", HEADER)?;

    for channel in &run.channels {
        let (frequency, coefficient) = match channel.peak {
            Some(peak) => (peak.frequency.to_string(), format!("{:.6}", peak.coefficient)),
            None => (String::new(), String::new()),
        };
        let status = if channel.errors.is_empty() { "PASS" } else { "FAIL" };
        let errors: Vec<&str> = channel.errors.iter().map(|e| e.message.as_str()).collect();

        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            channel.test_channel,
            channel.golden_channel,
            channel.golden_frequency,
            frequency,
            coefficient,
            status,
            escape(&errors.join("; "))
        )?;
    }

    Ok(())
}

/// Quote a field when it contains a separator, quote or newline
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
