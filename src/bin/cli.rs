// CLI tool for clustering and searching an analyzed footage catalog
// Uses shared core functionality from the montage_engine library

use clap::{Parser, Subcommand};
use montage_engine::{
    append_to_store, cluster_by_orientation, enhanced_search_text, is_spaced_from, kmeans_clusters,
    load_catalog,
    search_cluster, semantic_search, validate_catalog, ClusterStore, EngineConfig, EngineError,
    Item, JsonClusterStore, Orientation, PrecomputedEmbedder, QueryEmbedder, StoreError,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "montage-cli")]
#[command(version = "0.1.0")]
#[command(about = "Cluster and search analyzed stock footage", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Catalog JSON (array of analyzed items)
    #[arg(long, env = "MONTAGE_CATALOG", default_value = "data/catalog.json", global = true)]
    catalog: PathBuf,

    /// Cluster collection JSON
    #[arg(long, env = "MONTAGE_CLUSTERS", default_value = "data/clusters.json", global = true)]
    clusters: PathBuf,

    /// Engine configuration JSON; omitted fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild color clusters for both orientations (replaces the cluster file)
    Cluster,

    /// Cluster one orientation by embedding and append the clusters
    Kmeans {
        #[arg(short, long, default_value = "portrait")]
        orientation: Orientation,
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Rank the catalog against a query
    Search {
        #[arg(short, long)]
        query: String,
        /// JSON map of query text to embedding
        #[arg(long)]
        queries: Option<PathBuf>,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long)]
        include_humans: bool,
    },

    /// Build a cluster from a single query and append it
    SearchCluster {
        #[arg(short, long)]
        query: String,
        #[arg(long)]
        queries: Option<PathBuf>,
        #[arg(short, long, default_value = "portrait")]
        orientation: Orientation,
        #[arg(long, default_value = "5")]
        max_videos: usize,
        /// Cluster label (defaults to the query)
        #[arg(long)]
        theme: Option<String>,
    },

    /// Corroborated, color-aware search; appends the resulting cluster
    Enhanced {
        #[arg(short, long)]
        query: String,
        /// Related prompts, comma separated
        #[arg(long, value_delimiter = ',')]
        related: Vec<String>,
        #[arg(long)]
        queries: Option<PathBuf>,
        #[arg(short, long, default_value = "portrait")]
        orientation: Orientation,
        #[arg(long)]
        max_videos: Option<usize>,
        #[arg(long)]
        min_similarity: Option<f32>,
        #[arg(long)]
        theme: Option<String>,
        /// Print results without saving a cluster
        #[arg(long)]
        dry_run: bool,
    },

    /// Check the catalog for data problems
    Validate {
        #[arg(long)]
        expected_dim: Option<usize>,
    },
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, StoreError> {
    match path {
        Some(path) => EngineConfig::from_file(path),
        None => Ok(EngineConfig::default()),
    }
}

/// Query embeddings come from a precomputed map, or a local model when built with it
fn build_embedder(queries: Option<&Path>) -> Result<Box<dyn QueryEmbedder>, Box<dyn std::error::Error>> {
    if let Some(path) = queries {
        let content = fs::read_to_string(path)?;
        let embedder: PrecomputedEmbedder = serde_json::from_str(&content)?;
        info!(queries = embedder.len(), "loaded precomputed query embeddings");
        return Ok(Box::new(embedder));
    }

    #[cfg(feature = "fastembed")]
    {
        Ok(Box::new(montage_engine::FastEmbedder::new().with_progress(true)))
    }

    #[cfg(not(feature = "fastembed"))]
    {
        Err("no query embeddings: pass --queries <file> or build with --features fastembed".into())
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn append_cluster(
    store: &JsonClusterStore,
    orientation: Orientation,
    cluster: montage_engine::Cluster,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = cluster.len();
    let quality = cluster.quality;
    match append_to_store(store, orientation, cluster) {
        Ok(index) => {
            eprintln!(
                "Saved {} cluster #{} ({} items, quality {:.3}, lower is better)",
                orientation, index, size, quality
            );
            Ok(())
        }
        Err(StoreError::Engine(EngineError::DuplicateCluster)) => {
            warn!(orientation = %orientation, "identical cluster already saved, skipping");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let store = JsonClusterStore::new(&cli.clusters);
    let items: Vec<Item> = load_catalog(&cli.catalog)?;
    info!(items = items.len(), catalog = %cli.catalog.display(), "loaded catalog");

    match cli.command {
        Commands::Cluster => {
            let collection = cluster_by_orientation(&items, &config.greedy)?;
            store.save(&collection)?;
            eprintln!("Portrait clusters: {}", collection.portrait.len());
            eprintln!("Landscape clusters: {}", collection.landscape.len());
        }

        Commands::Kmeans { orientation, seed } => {
            let mut kmeans = config.kmeans.clone();
            if let Some(seed) = seed {
                kmeans = kmeans.with_seed(seed);
            }
            let clusters = kmeans_clusters(&items, orientation, &kmeans)?;
            if clusters.is_empty() {
                eprintln!("No {} items with embeddings to cluster", orientation);
            }
            for cluster in clusters {
                let existing = store.load()?;
                if !is_spaced_from(&existing, orientation, &cluster, &items, &config.greedy) {
                    warn!(
                        orientation = %orientation,
                        center = ?cluster.center(),
                        "cluster starts too close to a saved cluster, skipping"
                    );
                    continue;
                }
                append_cluster(&store, orientation, cluster)?;
            }
        }

        Commands::Search { query, queries, top_k, include_humans } => {
            let embedder = build_embedder(queries.as_deref())?;
            let mut options = config.search.clone();
            if let Some(k) = top_k {
                options.top_k = k;
            }
            if include_humans {
                options.filter_humans = false;
            }
            let embedding = embedder.embed_query(&query)?;
            let results = semantic_search(&items, &embedding, &options)?;
            print_json(&results)?;
        }

        Commands::SearchCluster { query, queries, orientation, max_videos, theme } => {
            let embedder = build_embedder(queries.as_deref())?;
            let embedding = embedder.embed_query(&query)?;
            let theme = theme.unwrap_or_else(|| query.clone());
            match search_cluster(&items, &embedding, orientation, max_videos, Some(&theme), &config.search)? {
                Some(cluster) => append_cluster(&store, orientation, cluster)?,
                None => eprintln!("No {} items match \"{}\"", orientation, query),
            }
        }

        Commands::Enhanced {
            query,
            related,
            queries,
            orientation,
            max_videos,
            min_similarity,
            theme,
            dry_run,
        } => {
            let embedder = build_embedder(queries.as_deref())?;
            let mut aggregator = config.aggregator.clone();
            if let Some(max) = max_videos {
                aggregator.max_videos = max;
            }
            if let Some(min) = min_similarity {
                aggregator.min_similarity = min;
            }

            let outcome =
                enhanced_search_text(&*embedder, &items, &query, &related, orientation, &aggregator)?;
            print_json(&outcome)?;

            let theme = theme.unwrap_or_else(|| query.clone());
            match outcome.to_cluster(Some(&theme)) {
                Some(cluster) if !dry_run => append_cluster(&store, orientation, cluster)?,
                Some(_) => {}
                None => eprintln!(
                    "No {} items reach similarity {} for \"{}\"",
                    orientation, aggregator.min_similarity, query
                ),
            }
        }

        Commands::Validate { expected_dim } => {
            let result = validate_catalog(&items, expected_dim);
            println!("Valid: {}", result.valid);
            println!("Count: {}", result.count);
            if let Some(dim) = result.dimension {
                println!("Dimension: {}", dim);
            }
            if !result.valid {
                println!("Issues:");
                for issue in &result.issues {
                    println!("  - {}", issue);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
