use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lmevals",
    version,
    about = "Run prompts against several hosted LLMs, score them with an LLM judge, publish the results"
)]
pub struct Cli {
    /// sqlite database holding runs, results, upvotes and credits
    #[arg(long, global = true, default_value = ".lmevals/lmevals.db")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit an evaluation run and stream NDJSON progress to stdout
    Run(RunArgs),
    /// Print one run with its per-model results and upvote count
    Show {
        run_id: String,
    },
    /// List the public feed, or one user's library with --mine
    List(ListArgs),
    /// Rename a run (owner only)
    Title {
        run_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        title: String,
    },
    /// Make a run public (owner only)
    Publish {
        run_id: String,
        #[arg(long)]
        user: String,
    },
    /// Make a run private again (owner only)
    Unpublish {
        run_id: String,
        #[arg(long)]
        user: String,
    },
    /// Upvote a run (idempotent)
    Upvote {
        run_id: String,
        #[arg(long)]
        user: String,
    },
    /// Remove an upvote
    Unupvote {
        run_id: String,
        #[arg(long)]
        user: String,
    },
    /// Delete a run and everything attached to it (owner only)
    Delete {
        run_id: String,
        #[arg(long)]
        user: String,
    },
    /// Show or grant run credits
    Credits(CreditsArgs),
    Version,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// run request yaml: models, prompt, rubric, title, user
    #[arg(long, default_value = "run.yaml")]
    pub request: PathBuf,

    /// trials per model
    #[arg(long, default_value_t = 5)]
    pub trials: u32,

    /// concurrently running models
    #[arg(long, default_value_t = 5)]
    pub parallel: usize,

    /// per-call deadline in seconds for completion and judge requests
    #[arg(long, default_value_t = 120)]
    pub call_timeout_secs: u64,

    /// overall run deadline in seconds; unfinished models emit a timeout event
    #[arg(long)]
    pub run_timeout_secs: Option<u64>,

    /// use the offline fake provider instead of the live API
    #[arg(long)]
    pub offline: bool,

    /// write a sample request file and exit
    #[arg(long)]
    pub init: bool,
}

#[derive(Parser, Clone)]
pub struct ListArgs {
    /// list runs owned by this user instead of the public feed
    #[arg(long)]
    pub mine: Option<String>,
}

#[derive(Parser, Clone)]
pub struct CreditsArgs {
    #[arg(long)]
    pub user: String,

    /// grant this many credits instead of showing the balance
    #[arg(long)]
    pub grant: Option<i64>,
}
