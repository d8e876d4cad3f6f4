//! Per-connection command handling.
//!
//! Reads chunks from the stream, frames them into batches of lines, and
//! runs each line through the [`Dispatcher`] in order. A line's response is
//! fully written before the next line is looked at.

use crate::framer::{Batch, DecodeError, LineFramer};
use crate::oracle::Oracle;
use crate::protocol::{BoolArg, BoolValue, Command, Response};
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};

/// How long `sleep` holds the connection.
pub const SLEEP_DURATION: Duration = Duration::from_secs(5);

/// Read chunk size
const CHUNK_SIZE: usize = 4 * 1024;

/// Errors that end a connection's handling.
#[derive(Debug)]
pub enum HandlerError {
    /// Reading from or writing to the peer failed.
    Io(io::Error),
    /// The peer sent bytes that are not UTF-8.
    Decode(DecodeError),
    /// An external command could not be run.
    Oracle(io::Error),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Io(e) => write!(f, "I/O error: {}", e),
            HandlerError::Decode(e) => write!(f, "{}", e),
            HandlerError::Oracle(e) => write!(f, "External command failed: {}", e),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<io::Error> for HandlerError {
    fn from(e: io::Error) -> Self {
        HandlerError::Io(e)
    }
}

impl From<DecodeError> for HandlerError {
    fn from(e: DecodeError) -> Self {
        HandlerError::Decode(e)
    }
}

/// Maps commands to responses.
#[derive(Debug)]
pub struct Dispatcher<O> {
    oracle: O,
}

impl<O: Oracle> Dispatcher<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Execute one command and produce its response.
    pub async fn execute(&self, command: &Command) -> Result<Response, HandlerError> {
        let response = match command {
            Command::Hi => Response::Hi,
            Command::Sleep => {
                tokio::time::sleep(SLEEP_DURATION).await;
                Response::Zzz
            }
            Command::Bool(arg) => {
                let value = match arg {
                    BoolArg::Random => BoolValue::from(rand::random::<bool>()),
                    BoolArg::Value(value) => *value,
                    BoolArg::Invalid(token) => {
                        debug!(token = token.as_str(), "Invalid bool argument");
                        return Ok(Response::InvalidArgument);
                    }
                };
                let exit_code = self
                    .oracle
                    .exit_status(value)
                    .await
                    .map_err(HandlerError::Oracle)?;
                if exit_code == 0 {
                    Response::BoolOk(value)
                } else {
                    Response::BoolError { value, exit_code }
                }
            }
            Command::Date => {
                let output = self
                    .oracle
                    .epoch_seconds()
                    .await
                    .map_err(HandlerError::Oracle)?;
                Response::Date(output)
            }
            Command::Unknown(name) => {
                debug!(command = name.as_str(), "Unknown command");
                Response::BadCommand
            }
        };
        Ok(response)
    }
}

/// Handle a single client connection.
pub async fn handle_connection<S, O>(
    mut stream: S,
    dispatcher: &Dispatcher<O>,
) -> Result<(), HandlerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    O: Oracle,
{
    let mut framer = LineFramer::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            trace!("End of stream");
            if let Some(batch) = framer.finish()? {
                handle_batch(&mut stream, dispatcher, &batch).await?;
            }
            // The peer may already be gone; its half of the stream is closed.
            let _ = stream.shutdown().await;
            return Ok(());
        }

        if let Some(batch) = framer.push(&chunk[..n])? {
            handle_batch(&mut stream, dispatcher, &batch).await?;
        }
    }
}

/// Run every non-blank line of a batch, in order.
async fn handle_batch<S, O>(
    stream: &mut S,
    dispatcher: &Dispatcher<O>,
    batch: &Batch,
) -> Result<(), HandlerError>
where
    S: AsyncWrite + Unpin,
    O: Oracle,
{
    for line in batch.lines() {
        let Some(command) = Command::parse(line) else {
            continue;
        };
        info!(request = line.trim(), "Received request");

        let response = dispatcher.execute(&command).await?;
        let encoded = response.encode();
        stream.write_all(&encoded).await?;
        let sent = String::from_utf8_lossy(&encoded);
        info!(response = sent.trim_end(), "Response sent");
    }
    Ok(())
}
