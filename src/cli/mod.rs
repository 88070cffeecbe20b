//! Command-line arguments for the voxstream server binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// voxstream server
#[derive(Parser, Debug)]
#[command(
    name = "voxstream",
    version,
    about = "Streaming voice answers: transcription, RAG chat and chunked speech"
)]
pub struct Cli {
    /// TOML config file (falls back to $VOXSTREAM_CONFIG)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, overriding config and environment
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn default_filter(&self) -> &'static str {
        if self.verbose {
            "voxstream=debug,info"
        } else {
            "voxstream=info,warn"
        }
    }
}
