//! CLI-specific option bundle (ambient stack; SPEC_FULL.md §6).
//!
//! A small struct threading `debug`/output-format preferences from
//! `clap` into the rest of the program. No binlog-subscription fields
//! here (`print_logs`, `to_subscribe_options`) — this crate's only job
//! is to open one `client::Connection` and run a REPL.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Tsv,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s {
            "tsv" => OutputFormat::Tsv,
            _ => OutputFormat::Table,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CliOptions {
    pub debug: bool,
    pub format: OutputFormat,
}

impl CliOptions {
    pub fn new(debug: bool, format: OutputFormat) -> Self {
        CliOptions { debug, format }
    }
}

impl Default for CliOptions {
    fn default() -> Self {
        CliOptions::new(false, OutputFormat::Table)
    }
}
