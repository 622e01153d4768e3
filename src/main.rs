use anyhow::Result;
use clap::Parser;
use rentscout::cli::Cli;
use rentscout::dispatcher;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    dispatcher::dispatch(&cli)
}

/// Logs go to stderr so tables and JSON on stdout stay clean.
/// `RUST_LOG` takes precedence over `-v`.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
