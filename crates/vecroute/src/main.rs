use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use vecroute_common::{logger, AppConfig};
use vecroute_vector::{
    BackendKind, Embedding, Metadata, SearchQuery, VectorBackend, VectorEntry, VectorRouter,
    DEFAULT_SEARCH_LIMIT,
};

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "vecroute")]
#[command(about = "VecRoute - vector similarity search over pluggable storage tiers", long_about = None)]
struct Cli {
    /// Force a backend tier for this invocation
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Directory of the file record store
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report each tier's availability and the tier that would be selected
    Probe,

    /// Add entries from a JSON Lines file
    Import {
        /// One `{"id", "vector", "metadata", "source"}` object per line
        #[arg(long)]
        file: PathBuf,
    },

    /// Nearest neighbours of a vector
    Search {
        /// Comma-separated components
        #[arg(long)]
        vector: String,

        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// Minimum similarity (inclusive)
        #[arg(long)]
        threshold: Option<f64>,

        /// Metadata equality filter, repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },

    /// Print one entry
    Get { id: String },

    /// Remove one entry
    Remove { id: String },

    /// Print the number of entries
    Count,

    /// Remove every entry
    Clear,
}

/// One line of an import file
#[derive(Debug, Deserialize)]
struct ImportLine {
    id: Option<String>,
    vector: Vec<f32>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    source: String,
}

fn parse_vector(raw: &str) -> Result<Vec<f32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .with_context(|| format!("Invalid vector component '{}'", s))
        })
        .collect()
}

fn parse_filters(raw: &[String]) -> Result<Metadata> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("Filter must be KEY=VALUE, got '{}'", pair),
        })
        .collect()
}

fn parse_import(contents: &str) -> Result<Vec<VectorEntry>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| -> Result<VectorEntry> {
            let parsed: ImportLine = serde_json::from_str(line)
                .with_context(|| format!("Line {}: invalid import record", n + 1))?;
            let id = parsed
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            Ok(VectorEntry::new(
                id,
                Embedding::new(parsed.vector, parsed.source),
                parsed.metadata,
            ))
        })
        .collect()
}

async fn import(router: &VectorRouter, file: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let entries = parse_import(&contents)?;

    let total = entries.len();
    let ids = router.add_batch(entries).await?;
    tracing::info!("Imported {} of {} entries from {}", ids.len(), total, file.display());
    println!("{}", serde_json::to_string_pretty(&ids)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_dotenv_from_project_root();

    // CLI arguments take precedence over the environment
    if let Some(path) = &cli.store_path {
        std::env::set_var("VECROUTE_STORE_PATH", path);
    }

    let config = AppConfig::from_env()?;
    logger::setup_logging(&config.log_dir, &config.log_level)?;

    let router = VectorRouter::from_config(&config)?;
    if let Some(name) = &cli.backend {
        let kind: BackendKind = name.parse()?;
        router.force_backend(kind).await?;
    }

    match cli.command {
        Commands::Probe => {
            for (kind, outcome) in router.probe_all() {
                match outcome.reason {
                    Some(reason) => println!("{:<16} unavailable ({})", kind, reason),
                    None => println!("{:<16} available", kind),
                }
            }
            let selected = match router.selected_kind().await {
                Some(kind) => kind,
                None => router.resolve_kind(),
            };
            println!("selected: {}", selected);
        }
        Commands::Import { file } => import(&router, &file).await?,
        Commands::Search {
            vector,
            limit,
            threshold,
            filters,
        } => {
            let mut query = SearchQuery::new(parse_vector(&vector)?)
                .with_limit(limit)
                .with_filters(parse_filters(&filters)?);
            if let Some(threshold) = threshold {
                query = query.with_threshold(threshold);
            }

            let results = router.search(&query).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Get { id } => match router.get(&id).await? {
            Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            None => bail!("No entry with id '{}'", id),
        },
        Commands::Remove { id } => {
            let removed = router.remove(&id).await?;
            println!("{}", if removed { "removed" } else { "not found" });
        }
        Commands::Count => println!("{}", router.count().await?),
        Commands::Clear => println!("cleared {}", router.clear().await?),
    }

    Ok(())
}
