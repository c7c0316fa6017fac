use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vocab_core::model::{FamilyId, ListId, Scope};

#[derive(Parser, Debug)]
#[command(name = "vocab-srs", version, about = "Vocabulary review scheduling")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "vocab.toml")]
    pub config: PathBuf,

    /// `SQLite` database; overrides the configured `database_url`.
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Insert a demo family with French and German lists.
    Seed {
        #[arg(long, default_value_t = 1)]
        user: u64,
        /// Past sessions to generate for progress reports.
        #[arg(long, default_value_t = storage::seed::DEFAULT_SUMMARIES)]
        summaries: u32,
    },
    /// List facts due for review.
    Due {
        #[arg(long)]
        user: u64,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Record one review outcome.
    Review {
        #[arg(long)]
        user: u64,
        #[arg(long)]
        fact: u64,
        #[command(flatten)]
        outcome: OutcomeArgs,
    },
    /// Print a progress report.
    Summary {
        #[arg(long)]
        user: u64,
        /// day, week, month, year or all (default: week).
        #[arg(long)]
        period: Option<String>,
        /// Comma-separated ISO 639-3 codes.
        #[arg(long)]
        languages: Option<String>,
    },
}

/// At most one of the scope flags; none means every owned fact.
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct ScopeArgs {
    #[arg(long)]
    pub list: Option<u64>,
    #[arg(long, value_delimiter = ',')]
    pub lists: Option<Vec<u64>>,
    #[arg(long)]
    pub family: Option<u64>,
}

impl ScopeArgs {
    pub fn scope(&self) -> Scope {
        if let Some(id) = self.list {
            return Scope::List(ListId::new(id));
        }
        if let Some(ids) = &self.lists {
            return Scope::Lists(ids.iter().copied().map(ListId::new).collect());
        }
        if let Some(id) = self.family {
            return Scope::Family(FamilyId::new(id));
        }
        Scope::All
    }
}

/// Exactly one of `--success` or `--failure`.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct OutcomeArgs {
    #[arg(long)]
    pub success: bool,
    #[arg(long)]
    pub failure: bool,
}
