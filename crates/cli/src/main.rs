use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use devagent_code_units::UnitKind;
use devagent_embedding_index::HashEmbedder;
use devagent_indexer::{SyncConfig, SyncController};
use devagent_retrieval::{ContextRetriever, RetrievalQuery};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "devagent")]
#[command(about = "Code context engine for developer assistants", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the index with the project's source files
    Index(IndexArgs),

    /// Retrieve code context for a task description
    Context(ContextArgs),

    /// Show what the index currently covers
    Status(StatusArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Project directory to index (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Discard all index state and re-index from scratch
    #[arg(long)]
    rebuild: bool,

    /// Best-effort time budget in seconds; nothing is persisted when
    /// the budget runs out
    #[arg(long)]
    budget_secs: Option<u64>,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ContextArgs {
    /// Free-text description of the task at hand
    query: String,

    /// Project directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Restrict to one language (python, javascript, typescript)
    #[arg(long, short = 'l')]
    language: Option<String>,

    /// Restrict to one unit kind (module, class, function, method)
    #[arg(long)]
    kind: Option<String>,

    /// Restrict to files under a path prefix
    #[arg(long)]
    path_prefix: Option<String>,

    /// Qualified name or id of the unit being worked on; related units
    /// rank higher
    #[arg(long, short = 'a')]
    anchor: Option<String>,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatusArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing
    let json_output = match &cli.command {
        Commands::Index(args) => args.json,
        Commands::Context(args) => args.json,
        Commands::Status(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Index(args) => run_index(args).await?,
        Commands::Context(args) => run_context(args).await?,
        Commands::Status(args) => run_status(args).await?,
    }

    Ok(())
}

async fn run_index(args: IndexArgs) -> Result<()> {
    let path = args.path.canonicalize().context("Invalid project path")?;
    let controller = SyncController::with_config(
        &path,
        Arc::new(HashEmbedder::new()),
        SyncConfig::default(),
    )?;

    let summary = if args.rebuild {
        controller.rebuild().await?
    } else if let Some(secs) = args.budget_secs {
        controller
            .sync_with_budget(Duration::from_secs(secs))
            .await?
    } else {
        controller.sync().await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        eprintln!(
            "Indexed {} files ({} skipped, {} removed): {} units embedded, {} reused in {}ms",
            summary.files_processed,
            summary.files_skipped,
            summary.files_removed,
            summary.units_embedded,
            summary.units_reused,
            summary.time_ms
        );
        for error in &summary.parse_errors {
            eprintln!("  parse error: {error}");
        }
        for (unit_id, message) in &summary.embed_failures {
            eprintln!("  embed failure: {unit_id}: {message}");
        }
    }
    Ok(())
}

async fn run_context(args: ContextArgs) -> Result<()> {
    let path = args.path.canonicalize().context("Invalid project path")?;
    let retriever = ContextRetriever::open(&path, Arc::new(HashEmbedder::new())).await?;

    let mut query = RetrievalQuery::new(&args.query);
    if let Some(limit) = args.limit {
        query = query.with_k(limit);
    }
    if let Some(language) = &args.language {
        query = query.with_language(language);
    }
    if let Some(kind) = &args.kind {
        let kind = UnitKind::from_tag(kind)
            .with_context(|| format!("Unknown unit kind: {kind}"))?;
        query = query.with_kind(kind);
    }
    if let Some(prefix) = &args.path_prefix {
        query = query.with_path_prefix(prefix);
    }
    if let Some(anchor) = &args.anchor {
        query = query.with_anchor(anchor);
    }

    let results = retriever.retrieve(&query).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        eprintln!("Found {} results for '{}'", results.len(), args.query);
        eprintln!();
        for (i, hit) in results.iter().enumerate() {
            println!(
                "# {} {} lines {}-{} (score: {:.3}) [{} {}]",
                i + 1,
                hit.unit.file_path,
                hit.unit.start_line,
                hit.unit.end_line,
                hit.score,
                hit.unit.kind.as_str(),
                hit.unit.qualified_name
            );
            if let Some(doc) = &hit.unit.doc {
                println!("   {doc}");
            }
            println!("{}", hit.unit.source);
            println!();
        }
    }
    Ok(())
}

async fn run_status(args: StatusArgs) -> Result<()> {
    let path = args.path.canonicalize().context("Invalid project path")?;
    let controller = SyncController::new(&path, Arc::new(HashEmbedder::new()))?;
    let status = controller.status().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else if !status.indexed {
        eprintln!("No index yet; run `devagent index`");
    } else {
        eprintln!(
            "Indexed: {} files, {} units ({} pending), model {}",
            status.files,
            status.units,
            status.pending_units,
            status.model.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}
