use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{RawExports, UserId};
use pipeline::{AssembledDataset, DataLoader, FeatureMode, PipelineConfig};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// recprep - feature preparation for the hybrid recommender
#[derive(Parser)]
#[command(name = "recprep")]
#[command(about = "Turns tenant exports into matrix-factorization inputs", long_about = None)]
struct Cli {
    /// Directory holding the tenant's CSV exports
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// JSON pipeline configuration; defaults apply to every key it omits
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tenant to process (overrides the configuration)
    #[arg(short, long)]
    tenant: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write the feature snapshots
    Prepare {
        /// Feature mode: none, indicator_only or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: FeatureMode,

        /// Write the assembled dataset as JSON to this path
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Show how one user ends up in the assembled dataset
    Inspect {
        /// Feature mode: none, indicator_only or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: FeatureMode,

        /// User ID to display
        #[arg(long)]
        user_id: UserId,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    println!(
        "Loading exports for tenant {} from {}...",
        config.tenant,
        cli.data_dir.display()
    );
    let start = Instant::now();
    let exports = RawExports::load_from_dir(&cli.data_dir, &config.tenant)
        .context("Failed to load tenant exports")?;
    println!("{} Loaded exports in {:?}", "✓".green(), start.elapsed());

    match cli.command {
        Commands::Prepare { mode, dump } => {
            let config = with_default_output_dir(config, &cli.data_dir);
            handle_prepare(config, &exports, mode, dump.as_deref())?
        }
        Commands::Inspect { mode, user_id } => handle_inspect(config, &exports, mode, user_id)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    Ok(match &cli.tenant {
        Some(tenant) => config.with_tenant(tenant.clone()),
        None => config,
    })
}

/// Snapshots go to the configured directory, or next to the exports
fn with_default_output_dir(config: PipelineConfig, data_dir: &Path) -> PipelineConfig {
    match config.output_dir {
        Some(_) => config,
        None => config.with_output_dir(data_dir),
    }
}

/// Handle the 'prepare' command
fn handle_prepare(
    config: PipelineConfig,
    exports: &RawExports,
    mode: FeatureMode,
    dump: Option<&Path>,
) -> Result<()> {
    let start = Instant::now();
    let dataset = DataLoader::new(config)
        .load_exports(exports, mode)
        .context("Pipeline run failed")?;
    println!("{} Prepared dataset in {:?}", "✓".green(), start.elapsed());

    print_summary(&dataset, mode);

    if let Some(path) = dump {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &dataset)
            .context("Failed to write dataset dump")?;
        println!("{} Dumped dataset to {}", "✓".green(), path.display());
    }
    Ok(())
}

/// Handle the 'inspect' command
fn handle_inspect(
    config: PipelineConfig,
    exports: &RawExports,
    mode: FeatureMode,
    user_id: UserId,
) -> Result<()> {
    let dataset = DataLoader::new(config)
        .load_exports(exports, mode)
        .context("Pipeline run failed")?;

    let row = *dataset
        .mapping
        .user_id_map
        .get(&user_id)
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;

    println!("{}", format!("User ID: {} (row {})", user_id, row).bold().blue());

    let items: Vec<(usize, f32)> = dataset.weights.row(row).collect();
    let positive = dataset.positive_index.get(&user_id).map_or(0, Vec::len);
    println!("{}Interactions: {}", "• ".green(), items.len());
    println!("{}Positive items: {}", "• ".green(), positive);
    for item_id in dataset.positive_index.get(&user_id).into_iter().flatten() {
        let item_type = dataset.item_types.get(item_id).map_or("unknown", String::as_str);
        println!("  - {} ({})", item_id, item_type);
    }

    match &dataset.user_features {
        Some(features) => {
            let names = invert(&dataset.mapping.user_feature_map);
            let mut weights: Vec<(usize, f32)> = features.row(row).collect();
            weights.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            println!("{}Features: {}", "• ".cyan(), weights.len());
            for (col, weight) in weights {
                let name = names.get(col).map_or("?", String::as_str);
                println!("  - {}: {:.4}", name, weight);
            }
        }
        None => println!("{}No features in mode {}", "• ".cyan(), mode),
    }
    Ok(())
}

/// Column index -> feature name
fn invert(map: &std::collections::BTreeMap<String, usize>) -> Vec<String> {
    let mut names = vec![String::new(); map.len()];
    for (name, index) in map {
        if let Some(slot) = names.get_mut(*index) {
            *slot = name.clone();
        }
    }
    names
}

fn print_summary(dataset: &AssembledDataset, mode: FeatureMode) {
    let (users, items) = dataset.weights.shape();
    print!("{}", format!("Dataset summary (mode {}):\n", mode).bold().blue());
    println!("{}Users: {}", "• ".green(), users);
    println!("{}Items: {}", "• ".green(), items);
    println!("{}Reduced interactions: {}", "• ".green(), dataset.weights.nnz());
    println!("{}Positive interactions: {}", "• ".green(), dataset.interactions.nnz());
    println!(
        "{}Users with positive interactions: {}",
        "• ".green(),
        dataset.positive_index.len()
    );

    if mode.uses_features() {
        println!(
            "{}User features: {}",
            "• ".cyan(),
            dataset.mapping.user_feature_map.len()
        );
        println!(
            "{}Item features: {}",
            "• ".cyan(),
            dataset.mapping.item_feature_map.len()
        );
    }

    let mut per_type: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for label in dataset.item_types.values() {
        *per_type.entry(label.as_str()).or_insert(0) += 1;
    }
    println!("Items per type:");
    for (label, count) in per_type {
        println!("  - {}: {}", label, count);
    }
}
