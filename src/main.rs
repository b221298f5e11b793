use clap::Parser;
use tracing_subscriber::EnvFilter;

mod alignment;
mod cli;
mod config;
mod core;
mod ingest;
mod parsing;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("genome_ingest=debug,info")
    } else {
        EnvFilter::new("genome_ingest=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Load(args) => {
            cli::load::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Formats => {
            cli::formats::run(cli.format)?;
        }
    }

    Ok(())
}
