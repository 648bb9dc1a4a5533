//! glint-server - serves GL rendering sessions over a Unix socket.

use clap::Parser;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "glint-server")]
#[command(about = "Serve GL rendering sessions over a Unix socket")]
struct Cli {
    /// Path to the Unix socket to listen on
    #[arg(long, default_value = "/tmp/glint-bridge.sock")]
    socket: PathBuf,
}

/// Initialize logging with a default filter.
///
/// Use the `RUST_LOG` environment variable to override the default.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,glint_server=debug,glint_core=debug"));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = glint_server::serve(&cli.socket).await {
        error!("server error: {err}");
        std::process::exit(1);
    }
}
