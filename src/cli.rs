//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// LTI 1.3 Tool - OIDC launch endpoint with LTI Advantage service clients
#[derive(Parser, Debug)]
#[command(name = "lti-tool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "LTI_TOOL_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LTI_TOOL_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LTI_TOOL_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the tool server (default)
    Serve,

    /// Load and validate the configuration, print the platform table
    Check,

    /// Smoke-test a platform integration over the LTI Advantage APIs
    #[command(subcommand)]
    Platform(PlatformCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Platform service subcommands
#[derive(Subcommand, Debug)]
pub enum PlatformCommand {
    /// Run a client-credentials token exchange and print the grant
    Token {
        /// Issuer of the registered platform
        #[arg(long)]
        issuer: String,

        /// Scope URI to request (repeatable)
        #[arg(long, required = true)]
        scope: Vec<String>,
    },

    /// List the gradebook columns behind an AGS lineitems URL
    LineItems {
        /// Issuer of the registered platform
        #[arg(long)]
        issuer: String,

        /// The launch's AGS `lineitems` URL
        #[arg(long)]
        url: String,
    },

    /// List the roster behind an NRPS membership URL
    Memberships {
        /// Issuer of the registered platform
        #[arg(long)]
        issuer: String,

        /// The launch's `context_memberships_url`
        #[arg(long)]
        url: String,
    },
}
