//! Demo client for socketcmd.
//!
//! Connects to a server, sends a script of commands one at a time and prints
//! each request (prefixed with `<<< `) followed by the server's response.

use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

const DEFAULT_SCRIPT: &[&str] = &[
    "hi",
    "bool",
    "bool",
    "bool true",
    "bool false",
    "date",
    "sleep",
    "date",
];

/// Command-line arguments for the demo client
#[derive(Parser, Debug)]
#[command(name = "socketcmd-client")]
#[command(version = "0.1.0")]
#[command(about = "Send a script of commands to a socketcmd server", long_about = None)]
struct ClientArgs {
    /// Socket to connect to
    #[arg(default_value = "socketcmd.sock")]
    socket: PathBuf,

    /// Command to send instead of the demo script (repeatable)
    #[arg(long = "command")]
    commands: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    println!("Connecting to {}.", args.socket.display());
    let stream = UnixStream::connect(&args.socket).await?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let script: Vec<String> = if args.commands.is_empty() {
        DEFAULT_SCRIPT.iter().map(|c| c.to_string()).collect()
    } else {
        args.commands
    };

    for command in &script {
        println!("<<< {}", command);
        writer.write_all(format!("{command}\n").as_bytes()).await?;

        // Blank commands get no answer
        if command.trim().is_empty() {
            continue;
        }
        match lines.next_line().await? {
            Some(response) => println!("{}", response),
            None => return Err("server closed the connection".into()),
        }
    }

    println!("Disconnecting.");
    Ok(())
}
