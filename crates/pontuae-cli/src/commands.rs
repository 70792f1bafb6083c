//! Command-line arguments.

use clap::{Parser, Subcommand};

/// Pontuae - track weekly habits from the terminal.
#[derive(Debug, Parser)]
#[command(name = "pontuae")]
#[command(about = "Command-line client for the Pontuae habit tracker")]
#[command(version, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Keep credentials in memory only; nothing is written to disk or keychain
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Log in
    Login {
        /// Account email (prompted when omitted)
        email: Option<String>,
    },

    /// Create an account
    Register,

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List this month's tasks for a week
    Tasks {
        /// Week of the month (default: current)
        #[arg(value_parser = clap::value_parser!(u32).range(1..=6))]
        week: Option<u32>,
    },

    /// Create a task
    Add {
        title: String,
        /// Times per week
        goal: i32,
        category: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Change a task's title and weekly goal
    Edit {
        id: i64,
        title: String,
        goal: i32,
        /// Replace the description (kept when omitted)
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a task
    Delete { id: i64 },

    /// Add one to a task's progress
    Inc { id: i64 },

    /// Take one from a task's progress
    Dec { id: i64 },

    /// Weekly points for a month
    History {
        /// Month (default: current)
        #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        /// Year (default: current)
        year: Option<i32>,
    },

    /// Update name and email
    Profile { name: String, email: String },

    /// Change password
    Passwd,
}

impl Command {
    /// Commands that only make sense with a logged-in session.
    pub fn needs_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. } | Command::Register | Command::Logout | Command::Whoami
        )
    }
}
