//! Command line interface for the `streamwire` demo binary.
//!
//! `listen` accepts TCP connections and echoes every request body back;
//! `send` connects, issues one request and prints the response.

use clap::{Parser, Subcommand};

/// Command line arguments for the `streamwire` binary.
#[derive(Debug, Parser)]
#[command(name = "streamwire", version, about = "Streaming protocol demo peer")]
pub struct Cli {
    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Demo operations.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Accept connections and echo request bodies.
    Listen {
        /// Address to bind.
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        addr: String,
    },
    /// Send one request and print the response.
    Send {
        /// Address of the listening peer.
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        addr: String,
        /// Request verb.
        #[arg(long, default_value = "POST")]
        verb: String,
        /// Request path.
        #[arg(long, default_value = "/echo")]
        path: String,
        /// Request body sent as one content stream.
        #[arg(short, long)]
        body: Option<String>,
        /// Seconds to wait for the response.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
}
