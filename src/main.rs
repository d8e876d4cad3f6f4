//! socketcmd: a line-oriented command server on a Unix domain socket
//!
//! Clients send newline-terminated commands and get one status line back
//! per command:
//! - `hi` greets
//! - `bool [true|false]` runs `true`/`false` and reports the exit status
//! - `date` reports the Unix time as printed by `date +%s`
//! - `sleep` answers after five seconds
//!
//! Features:
//! - One task per connection, lines handled strictly in order
//! - Socket permissions/ownership and a privilege drop at startup
//! - Clean socket removal on SIGINT/SIGTERM
//! - Configuration via CLI arguments or TOML file

mod config;
mod framer;
mod handler;
mod oracle;
mod privileges;
mod protocol;
mod server;

use config::Config;
use oracle::SystemOracle;
use server::Server;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        socket = %config.socket.display(),
        uid = config.uid,
        gid = config.gid,
        workers = ?config.workers,
        "Starting socketcmd server"
    );

    let runtime = match config.workers {
        Some(workers) if workers > 1 => {
            info!(workers, "Using multi-threaded runtime");
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(workers)
                .enable_all()
                .build()?
        }
        _ => {
            info!("Using single-threaded runtime");
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.uid != 0 {
        debug!(uid = config.uid, "Running as unprivileged user");
    } else {
        debug!("Running as root -- proceed with care");
    }

    let server = Server::bind(&config, SystemOracle)?;
    if let Err(e) = privileges::drop_to(config.uid, config.gid) {
        let _ = std::fs::remove_file(&config.socket);
        return Err(e.into());
    }

    let shutdown = server::shutdown_signal()?;
    server.serve(shutdown).await;
    Ok(())
}
