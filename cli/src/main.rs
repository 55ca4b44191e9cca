mod cli_client;
mod cli_options;
mod pretty_util;

use clap::Parser;
use client::ConnectionOptions;

use crate::cli_client::CliClient;
use crate::cli_options::{CliOptions, OutputFormat};

/// A minimal REPL over `client::Connection` (SPEC_FULL.md §1): exercises
/// the protocol engine end to end without pulling in a higher-level
/// convenience layer.
#[derive(Parser, Debug)]
#[command(name = "mysql-proto-cli")]
#[command(version, about = "Talk to a MySQL 4.1+ server over the raw wire protocol", long_about = None)]
struct CliArgs {
    #[arg(long = "host", default_value = "127.0.0.1", help = "server host")]
    host: String,

    #[arg(long = "port", default_value_t = 3306, help = "server port")]
    port: u16,

    #[arg(short, long = "user", default_value = "root", help = "username")]
    user: String,

    #[arg(short, long = "password", default_value = "", help = "password")]
    password: String,

    #[arg(short = 'D', long = "database", help = "initial database to use")]
    database: Option<String>,

    #[arg(short, long, help = "enable debug logging", default_value_t = false)]
    debug: bool,

    #[arg(short, long, help = "output format: table | tsv", default_value = "table")]
    format: String,

    #[arg(short = 'e', long = "execute", help = "run one statement non-interactively and exit")]
    execute: Option<String>,
}

fn main() -> Result<(), client::Error> {
    let args = CliArgs::parse();

    let level = if args.debug { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    let mut connect_options = ConnectionOptions::new(&args.host, args.port, &args.user, &args.password);
    if let Some(db) = &args.database {
        connect_options = connect_options.with_database(db.clone());
    }

    let cli_options = CliOptions::new(args.debug, OutputFormat::parse(&args.format));
    let mut client = CliClient::connect(cli_options, connect_options)?;

    if let Some(sql) = args.execute {
        return client.run_one_and_print(&sql);
    }

    client.start()
}
