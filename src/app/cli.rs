use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "agent-telegram")]
#[command(about = "Background daemon holding a messaging session behind a local JSON-RPC socket")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the daemon (detaches unless --foreground)
    Serve {
        /// Unix socket to listen on
        #[arg(short, long)]
        socket: Option<PathBuf>,

        /// Stored session file
        #[arg(long)]
        session: Option<PathBuf>,

        /// Stay attached to the terminal
        #[arg(short, long)]
        foreground: bool,
    },

    /// Show daemon status
    Status {
        /// Print the raw status object
        #[arg(long)]
        json: bool,

        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Stop a running daemon
    Stop {
        /// Send SIGKILL instead of asking for a clean shutdown
        #[arg(short, long)]
        force: bool,

        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Invoke a method on the daemon
    Call {
        method: String,

        /// Parameters as a JSON value
        params: Option<String>,

        #[arg(short, long)]
        socket: Option<PathBuf>,
    },
}

impl Command {
    /// Whether this invocation should re-execute itself in the background.
    pub fn wants_detach(&self) -> bool {
        matches!(self, Command::Serve { foreground: false, .. })
    }
}
