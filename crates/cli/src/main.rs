use anyhow::{bail, Context, Result};
use archrag_indexer::{ingest_documents, ingest_from_confluence, JsonExportSource};
use archrag_search::{build_context, KnowledgeBase, Retriever};
use archrag_vector_store::{EmbeddingConfig, EmbeddingProvider, VectorStore};
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod report;

#[derive(Parser)]
#[command(name = "archrag")]
#[command(about = "Retrieval over architecture standards, ADRs and policies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for results)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file (default: ./archrag.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index directory (overrides config and INDEX_PATH)
    #[arg(long, global = true)]
    index: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from the docs folder
    Ingest(IngestArgs),

    /// Index Confluence pages from a JSON export
    Sync(SyncArgs),

    /// Retrieve the chunks most relevant to a question
    Search(SearchArgs),

    /// Retrieve the standards and ADRs to audit a solution design against
    Audit(AuditArgs),

    /// Describe the saved index
    Stats(StatsArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Docs folder (overrides config and DOCS_PATH)
    #[arg(long)]
    docs: Option<PathBuf>,

    /// Output stats as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SyncArgs {
    /// JSON array of pages ({id, title, content, version, space_key?, labels?})
    #[arg(long)]
    pages: PathBuf,

    /// Confluence space key
    #[arg(long)]
    space: String,

    /// Only pages carrying this label (repeatable; all must match)
    #[arg(long = "label")]
    labels: Vec<String>,

    /// Replace the index instead of merging into it
    #[arg(long)]
    replace: bool,

    /// Output the outcome as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Question or search query
    query: String,

    /// Number of chunks to retrieve (default: 10 for listing questions, else 6)
    #[arg(short, long)]
    k: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Print the assembled prompt context instead of the ranked list
    #[arg(long, conflicts_with = "json")]
    context: bool,
}

#[derive(Args)]
struct AuditArgs {
    /// Solution design document (plain text or Markdown)
    file: PathBuf,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Print the assembled standards context instead of the ranked list
    #[arg(long, conflicts_with = "json")]
    context: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(index) = cli.index {
        config.index_path = index;
    }

    match cli.command {
        Commands::Ingest(args) => run_ingest(args, config).await,
        Commands::Sync(args) => run_sync(args, config).await,
        Commands::Search(args) => run_search(args, config).await,
        Commands::Audit(args) => run_audit(args, config).await,
        Commands::Stats(args) => run_stats(args, config).await,
    }
}

fn embedding_provider() -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = EmbeddingConfig::from_env()
        .context("Embedding provider is not configured")?
        .build()?;
    Ok(provider)
}

async fn run_ingest(args: IngestArgs, mut config: AppConfig) -> Result<()> {
    if let Some(docs) = args.docs {
        config.docs_path = docs;
    }
    config.validate()?;
    let provider = embedding_provider()?;

    let ingest = config.ingest_config();
    let (_, stats) = ingest_documents(&ingest, provider)
        .await
        .context("Ingestion failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", report::render_ingest(&ingest.index_path, &stats));
    }
    Ok(())
}

async fn run_sync(args: SyncArgs, config: AppConfig) -> Result<()> {
    config.validate()?;
    let provider = embedding_provider()?;
    let source = JsonExportSource::new(&args.pages);

    let outcome = ingest_from_confluence(
        &config.ingest_config(),
        provider,
        &source,
        &args.space,
        &args.labels,
        !args.replace,
    )
    .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", report::render_sync(&outcome));
    }
    if !outcome.success {
        bail!("Confluence sync did not complete");
    }
    Ok(())
}

async fn run_search(args: SearchArgs, config: AppConfig) -> Result<()> {
    config.validate()?;
    let provider = embedding_provider()?;
    let knowledge_base = Arc::new(KnowledgeBase::new(&config.index_path, provider));
    let retriever = Retriever::new(knowledge_base, config.retriever_config());

    let sources = match args.k {
        Some(k) => retriever.retrieve_k(&args.query, k).await,
        None => retriever.retrieve(&args.query).await,
    }
    .context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
    } else if args.context {
        println!("{}", build_context(&sources));
    } else {
        print!("{}", report::render_sources(&sources));
    }
    Ok(())
}

async fn run_audit(args: AuditArgs, config: AppConfig) -> Result<()> {
    config.validate()?;
    let design = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read design {}", args.file.display()))?;
    if design.trim().is_empty() {
        bail!("Design {} is empty", args.file.display());
    }

    let provider = embedding_provider()?;
    let knowledge_base = Arc::new(KnowledgeBase::new(&config.index_path, provider));
    let retriever = Retriever::new(knowledge_base, config.retriever_config());
    let sources = retriever
        .retrieve_for_audit(&design)
        .await
        .context("Audit retrieval failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
    } else if args.context {
        println!("{}", build_context(&sources));
    } else {
        print!("{}", report::render_sources(&sources));
    }
    Ok(())
}

async fn run_stats(args: StatsArgs, config: AppConfig) -> Result<()> {
    let provider = embedding_provider()?;
    let (store, load_report) = VectorStore::load_local_with_report(&config.index_path, provider)
        .await
        .context("Failed to load index")?;

    let summary = report::IndexSummary::new(&config.index_path, &store, &load_report);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render());
    }
    Ok(())
}
