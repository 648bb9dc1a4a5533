//! Unix-socket display server for the glint bridge.
//!
//! Each accepted connection is one display session owning one
//! [`glint_core::Context`]; sessions run independently on spawned tasks.

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::net::UnixListener;
use tracing::{error, info};

pub mod session;

/// Listen on `socket_path` and serve one session per connection.
///
/// An existing socket file at the path is removed before binding.
pub async fn serve(socket_path: &Path) -> io::Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    info!("glint bridge listening on {}", socket_path.display());

    let mut error_count = 0;
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                error_count = 0;
                info!("display session connected");
                tokio::spawn(async move {
                    if let Err(err) = session::run_session(stream).await {
                        error!("session error: {err:#}");
                    }
                });
            }
            Err(err) => {
                error!("failed to accept connection: {err}");
                error_count += 1;
                if error_count > 10 {
                    error!("too many consecutive accept errors, shutting down");
                    return Err(err);
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
