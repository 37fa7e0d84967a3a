use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use dllup_model::ModuleFamily;

#[derive(Parser, Debug)]
#[command(
    name = "dllup",
    about = "Find installed games and update their DLSS, XeSS, FSR, DirectStorage and Streamline DLLs",
    version
)]
pub struct Cli {
    /// Configuration file (defaults to the per-user location)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan installed games and print the update plan without writing anything
    Scan {
        /// Also list modules that will be skipped
        #[arg(short, long)]
        all: bool,
    },

    /// Scan, then back up and replace every outdated module (Ctrl-C stops dispatching)
    Update,

    /// List stored backups, newest first
    Backups {
        /// Only backups of this game
        #[arg(long)]
        game: Option<String>,

        /// Only backups of this module family (e.g. dlss, xess, fsr)
        #[arg(long)]
        family: Option<ModuleFamily>,
    },

    /// Put a backed-up original back in place
    #[command(group(ArgGroup::new("which").required(true).args(["id", "path"])))]
    Restore {
        /// Backup id as shown by `backups`
        id: Option<String>,

        /// Restore the newest backup taken from this file
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,
    },

    /// Delete old backups
    Prune {
        /// Remove backups older than this many days
        #[arg(long, default_value_t = 30)]
        older_than_days: i64,

        /// Always keep this many backups per file
        #[arg(long, default_value_t = 1)]
        keep: usize,
    },

    /// Never update games matching a name, id, glob or path
    Exclude { pattern: String },

    /// Always update games matching a name, id, glob or path
    Include { pattern: String },

    /// Drop a previous include or exclude
    Forget { pattern: String },
}
