use crate::modules::settings::cli::SETTINGS;
use chrono::Local;
use std::process;
use tracing::Level;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

mod file;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

pub fn initialize_logging() {
    if SETTINGS.curator_log_to_file {
        file::setup_file_logger().unwrap();
    } else {
        setup_stdout_logger().unwrap();
    }
}

// Writes to stderr, never stdout: the MCP stdio transport owns stdout for
// the JSON-RPC stream.
fn setup_stdout_logger() -> Result<(), tracing::dispatcher::SetGlobalDefaultError> {
    validate_log_level(&SETTINGS.curator_log_level);
    let level = SETTINGS.curator_log_level.parse::<Level>().unwrap();

    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(true)
        .with_timer(LocalTimer);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(SETTINGS.curator_ansi_logs)
        .with_writer(std::io::stderr)
        .event_format(format)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

fn validate_log_level(value: &str) {
    if value.parse::<Level>().is_err() {
        eprintln!(
            "invalid log level '{value}'; use one of: error, warn, info, debug, trace"
        );
        process::exit(1);
    }
}
