//! CLI - Command-line argument parsing

use clap::{Parser, Subcommand, ValueEnum};

/// TechCare CLI
#[derive(Parser)]
#[command(name = "techcarectl")]
#[command(about = "TechCare - computer diagnostics and guided maintenance", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Daemon URL (overrides $TECHCARE_SERVER and the saved session)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Log requests to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show daemon health
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Log in and save the session
    Login {
        username: String,
        /// Password (default: $TECHCARE_PASSWORD, then prompt)
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the saved session
    Logout,

    /// Create an account
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
        /// Role for the new account (admins only)
        #[arg(long)]
        role: Option<String>,
    },

    /// Run a full diagnostic
    Diagnose {
        #[arg(long)]
        json: bool,
    },

    /// List past diagnostics
    History {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one diagnostic
    Show {
        id: String,
        #[arg(long)]
        json: bool,
        /// Print recommendations as Markdown
        #[arg(long)]
        markdown: bool,
    },

    /// Disk cleanup
    Clean {
        #[command(subcommand)]
        action: CleanCommands,
    },

    /// Repair plans built from diagnostics
    Repair {
        #[command(subcommand)]
        action: RepairCommands,
    },

    /// Scheduled maintenance plans
    Plans {
        #[command(subcommand)]
        action: PlanCommands,
    },

    /// Chat with the assistant
    Chat,

    /// List maintenance guides
    Guides,

    /// Set the display theme
    Theme {
        theme: String,
        #[arg(long)]
        font_scale: Option<f32>,
    },

    /// User administration
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum CleanCommands {
    /// Show what could be freed
    Analyze {
        #[arg(long)]
        json: bool,
    },
    /// Delete files
    Run {
        /// temp_files, browser_cache, logs, downloads, recycle_bin
        #[arg(long, value_delimiter = ',', default_value = "temp_files")]
        kinds: Vec<String>,
        #[arg(long)]
        dry_run: bool,
        /// Only files older than this many hours
        #[arg(long)]
        older_than_hours: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum RepairCommands {
    /// Build a plan (default: from the latest diagnostic)
    Plan { diagnostic_id: Option<String> },
    /// List plans
    List,
    /// Show one plan
    Show { plan: String },
    /// Mark a step done
    Done { plan: String, step: String },
    /// Skip a step
    Skip { plan: String, step: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Every {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// List plans
    List,
    /// Create a plan
    Add {
        name: String,
        #[arg(long, value_delimiter = ',', required = true)]
        kinds: Vec<String>,
        #[arg(long, value_enum, default_value = "daily")]
        every: Every,
        /// For weekly plans, e.g. mon
        #[arg(long)]
        weekday: Option<String>,
        /// For monthly plans, 1-31
        #[arg(long)]
        day: Option<u32>,
        /// Time of day (UTC), HH:MM
        #[arg(long, default_value = "03:00")]
        at: String,
        #[arg(long)]
        disabled: bool,
    },
    /// Delete a plan
    Rm { id: String },
    /// Recent scheduled runs, newest first
    Runs {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List accounts
    List,
    /// Change a user's role
    SetRole { id: String, role: String },
    /// Disable an account
    Disable { id: String },
    /// Re-enable an account
    Enable { id: String },
}
