use clap::{Parser, Subcommand};

/// Fillgate — bookmarklet authorization & form-fill service
#[derive(Parser)]
#[command(name = "fillgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "8443")]
        port: u16,
    },

    /// Manage capability tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Generate fill scripts
    Script {
        #[command(subcommand)]
        command: ScriptCommands,
    },

    /// Run one expired-token sweep and exit
    Sweep,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a new capability token for a project
    Issue {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        owner_id: String,
        /// Subscription tier to apply (defaults to free)
        #[arg(long, default_value = "free")]
        tier: String,
    },
    /// List tokens for an owner (truncated prefixes only)
    List {
        #[arg(long)]
        owner_id: String,
    },
    /// Deactivate a token (irreversible)
    Deactivate {
        #[arg(long)]
        token_id: String,
        #[arg(long)]
        owner_id: String,
    },
}

#[derive(Subcommand)]
pub enum ScriptCommands {
    /// Print the bookmarklet for an existing token's snapshot
    Generate {
        #[arg(long)]
        token_id: String,
        /// Emit the raw script instead of the javascript: URL
        #[arg(long)]
        raw: bool,
    },
}
