//! Daylog CLI - personal life tracking from the command line.

use clap::Parser;
use daylog::cli::Cli;
use daylog::commands;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    // Storage plugins log through tracing; RUST_LOG adjusts verbosity.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("daylog=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match commands::run(cli.command, cli.backend) {
        Ok(output) => output.print(human),
        Err(e) => {
            if human {
                eprintln!("Error: {}", e);
            } else {
                eprintln!("{}", serde_json::json!({"error": e.to_string()}));
            }
            process::exit(1);
        }
    }
}
