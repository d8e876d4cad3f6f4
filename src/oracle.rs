//! External command oracles.
//!
//! `bool` and `date` are answered by running system utilities rather than
//! computing the value in-process. The [`Oracle`] trait is the seam the
//! dispatcher talks to; [`SystemOracle`] is the process-spawning
//! implementation used by the server.

use crate::protocol::BoolValue;
use std::future::Future;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::trace;

/// Source of answers for the `bool` and `date` commands.
pub trait Oracle: Send + Sync + 'static {
    /// Run the boolean command named by `value` and return its exit code.
    fn exit_status(&self, value: BoolValue) -> impl Future<Output = io::Result<i32>> + Send;

    /// Current Unix time in seconds, as printed by the epoch-time command.
    fn epoch_seconds(&self) -> impl Future<Output = io::Result<String>> + Send;
}

/// Oracle backed by the `true`, `false` and `date` executables on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemOracle;

impl Oracle for SystemOracle {
    async fn exit_status(&self, value: BoolValue) -> io::Result<i32> {
        let status = Command::new(value.as_str())
            .stdin(Stdio::null())
            .status()
            .await?;
        let code = exit_code(status);
        trace!(command = value.as_str(), code, "Boolean command exited");
        Ok(code)
    }

    async fn epoch_seconds(&self) -> io::Result<String> {
        let output = Command::new("date")
            .arg("+%s")
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await?;
        trace!(status = ?output.status, "Date command exited");
        String::from_utf8(output.stdout)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Exit code of a finished process; signal deaths map to `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}
