//! Provides helper functions for initializing log collection.
use std::io::IsTerminal;

use anyhow::Result;
use clap::ValueEnum;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter, Registry};

/// Output format of log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human readable lines.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Initialize tracing.
///
/// Logs are written to stderr so stdout stays reserved for menus and reports.
pub fn init(format: LogFormat) -> Result<()> {
    // Default to INFO if no env is specified
    let log_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    match format {
        LogFormat::Compact => {
            let logger = tracing_subscriber::fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr)
                .compact()
                .with_filter(log_filter);
            tracing::subscriber::set_global_default(Registry::default().with(logger))?;
        }
        LogFormat::Json => {
            let logger = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .with_filter(log_filter);
            tracing::subscriber::set_global_default(Registry::default().with(logger))?;
        }
    }

    Ok(())
}
