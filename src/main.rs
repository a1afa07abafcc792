use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;

/// Environment variable holding an `EnvFilter` directive, e.g. `cardfile=debug`.
const LOG_ENV: &str = "CARDFILE_LOG";

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    cli::run(cli)
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) => match cli.verbose {
            0 if cli.quiet => EnvFilter::new("error"),
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        },
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(cli.verbose >= 2),
        )
        .init();
}
