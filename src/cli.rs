//! CLI command definitions for kanban-board.
//!
//! The board server is the default command. The remaining subcommands are
//! thin clients that drive a [`BoardSession`](crate::board::BoardSession)
//! against a running server.

use clap::{Args, Parser, Subcommand};

/// Kanban board server and command-line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the board API server (default if no subcommand given)
    Serve(ServeArgs),

    /// Print the board, column by column
    Show(ClientArgs),

    /// Move a column to a new position (0-based indices)
    MoveColumn {
        /// Current position of the column
        #[arg(long)]
        from: usize,

        /// Position to move it to
        #[arg(long)]
        to: usize,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Move a task within or between columns (0-based indices)
    MoveTask {
        /// Column id the task is in
        #[arg(long)]
        from_column: i64,

        /// Current position of the task within its column
        #[arg(long)]
        from: usize,

        /// Column id to move it into
        #[arg(long)]
        to_column: i64,

        /// Position within the destination column
        #[arg(long)]
        to: usize,

        #[command(flatten)]
        client: ClientArgs,
    },
}

/// Arguments for `serve`.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments shared by the client subcommands.
#[derive(Args, Debug, Default, Clone)]
pub struct ClientArgs {
    /// Board API base URL (overrides config and KANBAN_API_URL)
    #[arg(long)]
    pub url: Option<String>,
}
