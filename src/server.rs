//! Unix socket server for socketcmd connections.
//!
//! Binds the socket, prepares its permissions and ownership, and spawns one
//! task per accepted connection until the shutdown future resolves.

use crate::config::Config;
use crate::handler::{handle_connection, Dispatcher, HandlerError};
use crate::oracle::Oracle;
use crate::privileges::{self, SetupError};
use std::future::Future;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Server instance
pub struct Server<O> {
    socket: PathBuf,
    listener: UnixListener,
    dispatcher: Arc<Dispatcher<O>>,
}

impl<O: Oracle> Server<O> {
    /// Bind the socket and apply the configured mode and ownership.
    pub fn bind(config: &Config, oracle: O) -> Result<Self, SetupError> {
        let socket = config.socket.clone();
        remove_stale_socket(&socket).map_err(|e| SetupError::Bind(socket.clone(), e))?;

        let listener =
            UnixListener::bind(&socket).map_err(|e| SetupError::Bind(socket.clone(), e))?;

        let server = Server {
            socket,
            listener,
            dispatcher: Arc::new(Dispatcher::new(oracle)),
        };

        if let Some(mode) = config.mode {
            privileges::set_mode(&server.socket, mode)?;
        }
        privileges::set_owner(&server.socket, config.socket_uid, config.socket_gid)?;

        Ok(server)
    }

    /// Accept connections until `shutdown` resolves, then remove the socket.
    pub async fn serve<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(socket = %self.socket.display(), "Server running");
        tokio::pin!(shutdown);
        let mut next_id: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        next_id += 1;
                        let span = info_span!("conn", id = next_id);
                        let dispatcher = Arc::clone(&self.dispatcher);

                        tokio::spawn(
                            async move {
                                info!("Connection opened");
                                log_disconnect(handle_connection(stream, &dispatcher).await);
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        info!("Goodbye!");
        drop(self.listener);
        if let Err(e) = std::fs::remove_file(&self.socket) {
            warn!(socket = %self.socket.display(), error = %e, "Failed to remove socket");
        }
    }
}

/// Peer resets and broken pipes are routine; anything else is worth a warning.
fn log_disconnect(result: Result<(), HandlerError>) {
    match result {
        Ok(()) => info!("Disconnected"),
        Err(e @ HandlerError::Io(_)) => debug!(error = %e, "Connection error"),
        Err(e) => warn!(error = %e, "Disconnected with error"),
    }
}

/// Resolve on the first SIGINT or SIGTERM.
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => debug!("Received SIGINT"),
            _ = terminate.recv() => debug!("Received SIGTERM"),
        }
    })
}

/// Remove a socket left behind by a previous run. Any other kind of file
/// is left alone and makes the bind fail.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!(socket = %path.display(), "Removing stale socket");
            std::fs::remove_file(path)
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
