use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "confab")]
#[command(version)]
#[command(about = "Terminal chat client for a local model bridge server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Bridge server URL (overrides config and CONFAB_BACKEND_URL default)
    #[arg(long, value_name = "URL", global = true)]
    pub backend_url: Option<String>,

    /// Model identifier to use for this run
    #[arg(long, value_name = "MODEL", global = true)]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Starts an interactive chat (default)
    Chat,
    /// Sends a single prompt and streams the reply
    Exec {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// Target an existing session by ID
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },
    /// Manage bridge sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Lists the models the bridge reports
    Models,
    /// Imports a transcript file into a session
    Import {
        /// Target an existing session by ID (defaults to the current one)
        #[arg(long, value_name = "ID")]
        session: Option<String>,

        /// Transcript file ({"messages": [...]})
        file: PathBuf,
    },
    /// Exports a session's history to a transcript file
    Export {
        /// Target an existing session by ID (defaults to the current one)
        #[arg(long, value_name = "ID")]
        session: Option<String>,

        /// Destination file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Lists sessions known to the bridge
    List,
}
