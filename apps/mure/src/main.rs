//! # Mure
//!
//! JSON documents as selector-queryable graphs, from the command line.
//!
//! ## Usage
//!
//! ```bash
//! # Store a file and look inside it
//! mure upload -f people.json
//! mure select '@{"_id":"application/json;people.json"}$.contents.*'
//!
//! # Connect two items and tag one
//! mure link '@{"_id":"application/json;people.json"}$.contents.ann' \
//!           '@{"_id":"application/json;people.json"}$.contents.bob'
//! mure tag '@{"_id":"application/json;people.json"}$.contents.ann' friends
//!
//! # Graph formats
//! mure import --id 'application/json;miserables.json' -i miserables.json
//! mure export --id 'application/json;miserables.json' -t gexf -o out.gexf
//! ```

use clap::Parser;
use mure::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // MURE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MURE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mure=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode && cli.command.is_none() {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Mure banner.
fn print_banner() {
    eprintln!(
        "mure v{} - JSON documents as selector-queryable graphs\n",
        env!("CARGO_PKG_VERSION")
    );
}
