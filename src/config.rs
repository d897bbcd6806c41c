use clap::ValueEnum;

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE: &str = "ledger.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, multi-field lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Runtime settings resolved from command-line flags and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: String,
    pub log_format: LogFormat,
    pub verbose: bool,
}

impl Settings {
    /// Filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "fin_ledger=debug,sqlx=warn"
        } else {
            "fin_ledger=info,sqlx=warn"
        }
    }
}
