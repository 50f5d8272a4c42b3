// Command-line surface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "courtcast")]
#[command(version, about = "NBA player-points projections from scraped daily stats", long_about = None)]
pub struct Cli {
    /// Directory holding `defaults/`, `config/` and the store.
    #[arg(long, env = "COURTCAST_BASE_DIR", default_value = ".")]
    pub base_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Back-fill stat tables and boxscores, refresh today's matchups, lines and injuries.
    Scrape {
        /// Scrape as if today were this date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Rebuild the derived injury table from the roster and boxscores.
    DeriveInjuries,
    /// Assemble the training frame, back-test, fit and save the model.
    Train,
    /// Project points for a game date and write the projections report.
    Predict {
        /// Game date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}
