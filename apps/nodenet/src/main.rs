//! # nodenet
//!
//! Command-line driver for the nodenet grouping engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │              apps/nodenet (THE BINARY)            │
//! │                                                   │
//! │  ┌─────────────┐  ┌──────────────┐  ┌──────────┐  │
//! │  │    CLI      │  │  Scenario    │  │ HTTP API │  │
//! │  │   (clap)    │─▶│   runner     │─▶│  (axum)  │  │
//! │  └─────────────┘  └──────┬───────┘  └──────────┘  │
//! │                          ▼                        │
//! │                  ┌───────────────┐                │
//! │                  │ nodenet-core  │                │
//! │                  │  (THE ENGINE) │                │
//! │                  └───────────────┘                │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! nodenet kinds --config kinds.toml
//! nodenet run --scenario demos/split.json --verbose
//! nodenet verify --scenario demos/split.json
//! nodenet serve --scenario demos/split.json --port 8080
//! ```

use clap::Parser;
use nodenet::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // NODENET_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("NODENET_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nodenet=info,nodenet_core=info,tower_http=debug".into());

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

    if !cli.quiet && !cli.json {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ┌┐┌┌─┐┌┬┐┌─┐┌┐┌┌─┐┌┬┐
  ││││ │ ││├┤ │││├┤  │
  ┘└┘└─┘─┴┘└─┘┘└┘└─┘ ┴

  node-grouping engine v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
