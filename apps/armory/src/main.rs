//! # Armory - Inventory Server
//!
//! The main binary for the Armory weapon and material catalog.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for catalog operations
//! - TOML configuration with environment overrides
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/armory (THE BINARY)              │
//! │                                                      │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────┐  │
//! │   │    CLI      │    │  HTTP API   │    │ Config  │  │
//! │   │   (clap)    │    │   (axum)    │    │ (toml)  │  │
//! │   └──────┬──────┘    └──────┬──────┘    └────┬────┘  │
//! │          └──────────────────┼────────────────┘       │
//! │                             ▼                        │
//! │                    ┌─────────────────┐               │
//! │                    │   armory-core   │               │
//! │                    │ (resolver, DB)  │               │
//! │                    └─────────────────┘               │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server, seeding it from a catalog document
//! armory server --port 8080 --import catalog.json
//!
//! # CLI operations
//! armory import -f catalog.json
//! armory max-quantity --weapon 1
//! armory update-material 6 --base-power 40
//! ```

use armory::cli::{Cli, execute};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // ARMORY_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ARMORY_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "armory=info,armory_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Armory startup banner.
fn print_banner() {
    println!(
        r#"
   █████╗ ██████╗ ███╗   ███╗ ██████╗ ██████╗ ██╗   ██╗
  ██╔══██╗██╔══██╗████╗ ████║██╔═══██╗██╔══██╗╚██╗ ██╔╝
  ███████║██████╔╝██╔████╔██║██║   ██║██████╔╝ ╚████╔╝
  ██╔══██║██╔══██╗██║╚██╔╝██║██║   ██║██╔══██╗  ╚██╔╝
  ██║  ██║██║  ██║██║ ╚═╝ ██║╚██████╔╝██║  ██║   ██║
  ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝     ╚═╝ ╚═════╝ ╚═╝  ╚═╝   ╚═╝

  Inventory Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
