//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// confvault - Versioned backups of host configuration directories
#[derive(Parser, Debug)]
#[command(name = "confvault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: $CONFVAULT_CONFIG or ~/.config/confvault/config.toml)
    #[arg(short, long, global = true, env = "CONFVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run even if the configuration is bound to another hostname
    #[arg(long, global = true)]
    pub ignore_host_mismatch: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Initialize the local store and bind this host
    Init,

    /// Snapshot every configured path into one commit
    ///
    /// Examples:
    ///   confvault backup
    ///   confvault backup --validate-first --restart-services
    Backup {
        /// Run pre-flight validation and abort on blocking issues
        #[arg(long)]
        validate_first: bool,

        /// Restart services whose configuration changed
        #[arg(long)]
        restart_services: bool,
    },

    /// Restore configuration from a snapshot
    ///
    /// Examples:
    ///   confvault restore latest mysql
    ///   confvault restore 3f2a9c1 /etc/nginx --restart-services
    ///   confvault restore latest            # choose interactively
    Restore {
        /// Commit id or `latest`
        commit: String,

        /// Component name or live path; asks when omitted
        path: Option<String>,

        /// Restart services for the restored paths
        #[arg(long)]
        restart_services: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Compare live configuration with a snapshot
    ///
    /// Exits with status 1 when drift is found.
    ///
    /// Examples:
    ///   confvault drift-check
    ///   confvault drift-check 3f2a9c1 --json
    ///   confvault drift-check --continuous 600
    DriftCheck {
        /// Reference commit
        #[arg(default_value = "latest")]
        reference: String,

        /// Keep checking, every INTERVAL seconds (default from config)
        #[arg(long, value_name = "INTERVAL")]
        continuous: Option<Option<u64>>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run backups periodically
    Monitor {
        /// Seconds between cycles (default from config)
        #[arg(long)]
        interval: Option<u64>,

        /// Validate before each backup
        #[arg(long)]
        validate_first: bool,

        /// Restart services whose configuration changed
        #[arg(long)]
        restart_services: bool,

        /// Stop after this many cycles
        #[arg(long, hide = true)]
        cycles: Option<u64>,
    },

    /// Run pre-flight validation
    ///
    /// Exits with status 1 when a blocking issue is found.
    Validate {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restart services for the named components (all when none given)
    RestartServices {
        /// Component names
        names: Vec<String>,
    },

    /// Enable webhook notifications and send a test event
    ///
    /// Examples:
    ///   confvault setup-webhook https://hooks.example.com/confvault
    ///   confvault setup-webhook https://hooks.example.com/x backup_failed drift_detected
    SetupWebhook {
        /// Endpoint URL
        url: String,

        /// Events to send (all when none given)
        events: Vec<String>,

        /// Do not send a test event
        #[arg(long)]
        no_test: bool,
    },

    /// List snapshot history
    List {
        /// Maximum number of commits
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Only commits whose message contains this text
        #[arg(long)]
        grep: Option<String>,
    },

    /// Show details of one snapshot
    Show {
        /// Commit id or `latest`
        #[arg(default_value = "latest")]
        reference: String,
    },

    /// Bind the configuration to this machine's current hostname
    RebindHost,

    /// Generate shell completions
    ///
    /// Examples:
    ///   confvault completions bash > ~/.local/share/bash-completion/completions/confvault
    ///   confvault completions zsh > ~/.zfunc/_confvault
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
