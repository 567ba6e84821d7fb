//! Logging setup

use color_eyre::eyre::{Result, WrapErr};
use std::fmt;
use std::fs::File;
use std::sync::Mutex;
use std::time::SystemTime as StdSystemTime;
use tracing::info;
use tracing_subscriber::{
    filter::LevelFilter, fmt::format::Writer, fmt::layer, fmt::time::FormatTime,
    layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = StdSystemTime::now();
        let duration = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();

        // Format as HH:MM:SS (only seconds precision)
        let total_seconds = duration.as_secs();
        let hours = (total_seconds / 3600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Setup output logging to file or stdout.
///
/// A subscriber that is already installed (e.g. by a test harness) is left in
/// place.
pub fn setup_output(output_path: Option<&String>, verbosity: u8) -> Result<()> {
    let level = level_filter(verbosity);

    match output_path {
        Some(path) => {
            let log = File::create(path)
                .wrap_err_with(|| format!("Could not create output file: {}", path))?;
            let file_layer = layer()
                .with_writer(Mutex::new(log))
                .with_timer(SecondPrecisionTimer)
                .with_ansi(false)
                .with_filter(level);
            if Registry::default().with(file_layer).try_init().is_ok() {
                info!("Output will be written to: {}", path);
            }
        }
        None => {
            let stdout_layer = layer()
                .with_writer(std::io::stdout)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(true)
                .with_filter(level);
            if Registry::default().with(stdout_layer).try_init().is_ok() {
                info!("Output will be printed to stdout");
            }
        }
    }

    Ok(())
}
