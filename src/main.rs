//! # Quackstack CLI (`quack`)
//!
//! Index a repository and ask questions about it.
//!
//! ## Usage
//!
//! ```bash
//! quack --config ./quack.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quack init` | Create the SQLite database and schema |
//! | `quack ingest` | Re-index the project root |
//! | `quack search "<query>"` | Ranked source fragments only |
//! | `quack ask "<query>"` | Ranked sources plus a synthesized answer |
//! | `quack status` | Index summary and changes since the last ingest |
//! | `quack history` | Author activity and recently changed files (git) |
//! | `quack readme` | Draft README.md from the index |
//! | `quack agents` | Draft AGENTS.md from the index |
//!
//! Logging goes to stderr and is controlled by `QUACK_LOG` (an `EnvFilter`
//! directive) or `-v` / `-vv`.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use quackstack::config::{self, Config, DEFAULT_CONFIG_PATH};
use quackstack::index::CodeIndex;
use quackstack::progress::ProgressMode;
use quackstack::docs::DocKind;
use quackstack::{activity, answer, docs, ingest, migrate, search, status};
use quackstack_core::search::RankOptions;

/// Quackstack: a local code index for asking questions about a repository.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/quack.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "quack", version, about = "Ask questions about your codebase")]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `QUACK_LOG` wins.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Re-index the project from scratch.
    ///
    /// Scans the root, segments every matching file, attaches git history,
    /// rebuilds the vector space, and replaces all stored fragments of the
    /// project.
    Ingest {
        #[command(flatten)]
        target: TargetArgs,

        /// Skip git history enrichment.
        #[arg(long)]
        no_history: bool,

        /// Progress output on stderr. Defaults to human on a TTY, else off.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Rank indexed fragments against a query.
    Search {
        /// The search query string.
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Answer a question from the indexed code.
    ///
    /// Requires `QUACKSTACK_OPENAI_KEY` or `QUACKSTACK_ANTHROPIC_KEY`.
    Ask {
        /// The question.
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Show what is indexed and what changed since.
    Status {
        #[command(flatten)]
        target: TargetArgs,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Summarize git activity: commits and churn per author, and files
    /// changed recently. With `--file`, show that file's primary author.
    History {
        #[command(flatten)]
        target: TargetArgs,

        /// Window for recently changed files.
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Path relative to the root.
        #[arg(long)]
        file: Option<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Draft a README.md for the project from its indexed fragments.
    ///
    /// Requires an answer provider, like `ask`.
    Readme(DocArgs),

    /// Draft an AGENTS.md (agents.md format) from the indexed fragments.
    ///
    /// Requires an answer provider, like `ask`.
    Agents(DocArgs),
}

#[derive(Args)]
struct DocArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Output file. Defaults to the document name under the root.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Replace an existing file.
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct TargetArgs {
    /// Source root. Defaults to `[project] root`.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Project name. Defaults to `[project] name`, else the root's basename.
    #[arg(long)]
    project: Option<String>,
}

impl TargetArgs {
    fn resolve(&self, config: &Config) -> (PathBuf, String) {
        let root = self
            .root
            .clone()
            .unwrap_or_else(|| config.project.root.clone());
        let project = match (&self.project, &self.root) {
            (Some(name), _) => name.clone(),
            (None, Some(root)) if config.project.name.is_none() => config::project_name_for(root),
            _ => config.project.resolved_name(),
        };
        (root, project)
    }
}

#[derive(Args)]
struct RetrievalArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Only fragments last committed or mostly written by this email.
    #[arg(long)]
    author: Option<String>,

    /// Boost fragments committed within `--recent-days`.
    #[arg(long)]
    boost_recent: bool,

    /// Boost frequently changed fragments.
    #[arg(long)]
    boost_frequent: bool,

    #[arg(long)]
    recent_days: Option<u32>,

    /// Maximum number of results.
    #[arg(long)]
    limit: Option<usize>,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

impl RetrievalArgs {
    fn rank_options(&self, config: &Config) -> RankOptions {
        RankOptions {
            boost_recent: self.boost_recent || config.retrieval.boost_recent,
            boost_frequent: self.boost_frequent || config.retrieval.boost_frequent,
            filter_author: self.author.clone(),
            recent_days: self.recent_days.unwrap_or(config.retrieval.recent_days).max(1),
            limit: self.limit.unwrap_or(config.retrieval.limit).max(1),
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("QUACK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config_or_default(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized at {}", cfg.db.path.display());
        return Ok(());
    }

    if let Commands::History {
        target,
        days,
        file,
        json,
    } = &cli.command
    {
        let (root, _) = target.resolve(&cfg);
        return activity::run_history(&root, cfg.ingest.history_depth, *days, file.as_deref(), *json);
    }

    // Fail before touching the store when no provider can answer.
    let provider = match &cli.command {
        Commands::Ask { .. } | Commands::Readme(_) | Commands::Agents(_) => {
            Some(answer::create_provider(&cfg.answer)?)
        }
        _ => None,
    };

    let index = CodeIndex::open(&cfg).await?;
    let result = run(&index, &cfg, cli.command, provider.as_deref()).await;
    index.close().await;
    result
}

async fn run(
    index: &CodeIndex,
    cfg: &Config,
    command: Commands,
    provider: Option<&dyn answer::AnswerProvider>,
) -> Result<()> {
    match command {
        Commands::Init | Commands::History { .. } => {}
        Commands::Ingest {
            target,
            no_history,
            progress,
        } => {
            let (root, project) = target.resolve(cfg);
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(index, cfg, &root, &project, !no_history, progress).await?;
        }
        Commands::Search { query, retrieval } => {
            let (_, project) = retrieval.target.resolve(cfg);
            let options = retrieval.rank_options(cfg);
            search::run_search(index, &query, &project, &options, retrieval.json).await?;
        }
        Commands::Ask { query, retrieval } => {
            let (_, project) = retrieval.target.resolve(cfg);
            let options = retrieval.rank_options(cfg);
            if let Some(provider) = provider {
                search::run_ask(index, &query, &project, &options, provider, retrieval.json)
                    .await?;
            }
        }
        Commands::Status { target, json } => {
            let (root, project) = target.resolve(cfg);
            status::run_status(index, cfg, &root, &project, json).await?;
        }
        Commands::Readme(args) => generate(index, cfg, DocKind::Readme, args, provider).await?,
        Commands::Agents(args) => generate(index, cfg, DocKind::Agents, args, provider).await?,
    }
    Ok(())
}

async fn generate(
    index: &CodeIndex,
    cfg: &Config,
    kind: DocKind,
    args: DocArgs,
    provider: Option<&dyn answer::AnswerProvider>,
) -> Result<()> {
    let (root, project) = args.target.resolve(cfg);
    if let Some(provider) = provider {
        docs::run_generate(index, &root, &project, kind, provider, args.output, args.force)
            .await?;
    }
    Ok(())
}
