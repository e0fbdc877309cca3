//! lisagis CLI - Spatial autocorrelation analysis

mod table;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lisagis_algorithms::analysis::{run_analysis, AnalysisConfig};
use lisagis_algorithms::statistics::{
    global_moran, local_moran, Alternative, GlobalMoranResult, LocalMoranResult,
    LocalMoranSummary, DEFAULT_ALPHA, DEFAULT_PERMUTATIONS,
};
use lisagis_algorithms::weights::{
    build_weights, Contiguity, WeightsInput, WeightsParams, WeightsStrategy, DEFAULT_K,
};
use lisagis_algorithms::permutation::DEFAULT_SEED;
use lisagis_core::{AttributeVector, NeighborGraph};
use lisagis_parallel::ProcessingMode;

use table::{grid_adjacency, read_table, Table};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "lisagis")]
#[command(author, version, about = "Spatial autocorrelation analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads (0 = all cores, 1 = sequential)
    #[arg(short, long, global = true, default_value = "0")]
    threads: usize,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build spatial weights and report their structure
    Weights {
        #[command(flatten)]
        weights: WeightsArgs,
    },
    /// Global Moran's I
    Global {
        #[command(flatten)]
        weights: WeightsArgs,
        #[command(flatten)]
        perm: PermutationArgs,
        /// Tail of the pseudo p-value
        #[arg(long, value_enum, default_value = "directional")]
        alternative: AlternativeArg,
    },
    /// Local Moran's I (LISA) cluster map
    Local {
        #[command(flatten)]
        weights: WeightsArgs,
        #[command(flatten)]
        perm: PermutationArgs,
        /// Significance threshold
        #[arg(long, default_value_t = DEFAULT_ALPHA)]
        alpha: f64,
        /// Write per-unit results to this file (CSV) instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Global and local Moran's I in one run
    Analyze {
        #[command(flatten)]
        weights: WeightsArgs,
        #[command(flatten)]
        perm: PermutationArgs,
        #[arg(long, default_value_t = DEFAULT_ALPHA)]
        alpha: f64,
        #[arg(long, value_enum, default_value = "directional")]
        alternative: AlternativeArg,
    },
}

#[derive(clap::Args)]
struct WeightsArgs {
    /// Input table with x, y, value columns
    input: PathBuf,
    /// Neighbor rule
    #[arg(short, long, value_enum, default_value = "knn")]
    rule: RuleArg,
    /// Neighbor count for KNN
    #[arg(short, long, default_value_t = DEFAULT_K)]
    k: usize,
}

#[derive(clap::Args)]
struct PermutationArgs {
    /// Number of permutations
    #[arg(short, long, default_value_t = DEFAULT_PERMUTATIONS)]
    permutations: usize,
    /// Random seed
    #[arg(short, long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleArg {
    /// k nearest neighbors
    Knn,
    /// Shared grid edge (points on a regular grid)
    Rook,
    /// Shared grid edge or corner (points on a regular grid)
    Queen,
}

impl RuleArg {
    fn strategy(self) -> WeightsStrategy {
        match self {
            RuleArg::Knn => WeightsStrategy::Knn,
            RuleArg::Rook => WeightsStrategy::Contiguity(Contiguity::Rook),
            RuleArg::Queen => WeightsStrategy::Contiguity(Contiguity::Queen),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AlternativeArg {
    Directional,
    Greater,
    Less,
    TwoSided,
}

impl From<AlternativeArg> for Alternative {
    fn from(arg: AlternativeArg) -> Self {
        match arg {
            AlternativeArg::Directional => Alternative::Directional,
            AlternativeArg::Greater => Alternative::Greater,
            AlternativeArg::Less => Alternative::Less,
            AlternativeArg::TwoSided => Alternative::TwoSided,
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn processing_mode(threads: usize) -> ProcessingMode {
    match threads {
        0 => ProcessingMode::Parallel,
        1 => ProcessingMode::Sequential,
        n => ProcessingMode::ParallelWith(n),
    }
}

fn read_input(path: &Path) -> Result<Table> {
    let pb = spinner("Reading table...");
    let table = read_table(path)?;
    pb.finish_and_clear();
    info!("Input: {} units", table.len());
    Ok(table)
}

/// Adjacency for contiguity rules, derived from the grid the points sit on
fn contiguity_rows(table: &Table, rule: RuleArg) -> Result<Option<Vec<Vec<usize>>>> {
    match rule.strategy() {
        WeightsStrategy::Knn => Ok(None),
        WeightsStrategy::Contiguity(c) => grid_adjacency(&table.points, c).map(Some),
    }
}

fn weights_input<'a>(table: &'a Table, adjacency: &'a Option<Vec<Vec<usize>>>) -> WeightsInput<'a> {
    match adjacency {
        Some(rows) => WeightsInput::Adjacency(rows),
        None => WeightsInput::Points(&table.points),
    }
}

fn build_graph(table: &Table, args: &WeightsArgs) -> Result<NeighborGraph> {
    let adjacency = contiguity_rows(table, args.rule)?;
    let params = WeightsParams {
        k: args.k,
        strategy: args.rule.strategy(),
    };
    let pb = spinner("Building weights...");
    let graph = build_weights(weights_input(table, &adjacency), &params)
        .context("Failed to build weights")?;
    pb.finish_and_clear();
    Ok(graph)
}

fn attributes(table: &Table) -> Result<AttributeVector> {
    AttributeVector::new(table.values.clone())
        .context("Invalid attribute values")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_global(r: &GlobalMoranResult) {
    println!("Moran's I:        {:.6}", r.i);
    println!("Expected I:       {:.6}", r.expected);
    println!("Variance:         {:.6}", r.variance);
    println!("z-score:          {:.4}", r.z_score);
    println!("p (normal):       {:.6}", r.p_norm);
    println!(
        "p (permutation):  {:.6}  [{} permutations, seed {}]",
        r.p_value, r.permutations, r.seed
    );
}

fn print_summary(s: &LocalMoranSummary, alpha: f64) {
    println!("Cluster map (alpha = {}):", alpha);
    println!("  High-High:       {}", s.high_high);
    println!("  Low-High:        {}", s.low_high);
    println!("  Low-Low:         {}", s.low_low);
    println!("  High-Low:        {}", s.high_low);
    println!("  Not significant: {}", s.not_significant);
}

fn local_csv(local: &[LocalMoranResult]) -> String {
    let mut out = String::from("unit,i,z,standardized_lag,quadrant,p_value,cluster\n");
    for r in local {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            r.unit,
            r.i,
            r.z,
            r.standardized_lag,
            r.quadrant.code(),
            r.p_value,
            r.cluster.code()
        ));
    }
    out
}

fn done(name: &str, elapsed: std::time::Duration) {
    info!("{} completed in {:.2?}", name, elapsed);
}

#[derive(Serialize)]
struct WeightsReport {
    units: usize,
    min_neighbors: usize,
    max_neighbors: usize,
    mean_neighbors: f64,
    symmetric: bool,
    s0: f64,
    s1: f64,
    s2: f64,
}

impl WeightsReport {
    fn new(graph: &NeighborGraph) -> Self {
        let card = graph.cardinalities();
        let moments = graph.moments();
        Self {
            units: graph.len(),
            min_neighbors: card.iter().copied().min().unwrap_or(0),
            max_neighbors: card.iter().copied().max().unwrap_or(0),
            mean_neighbors: card.iter().sum::<usize>() as f64 / card.len().max(1) as f64,
            symmetric: graph.is_symmetric(),
            s0: moments.s0,
            s1: moments.s1,
            s2: moments.s2,
        }
    }
}

#[derive(Serialize)]
struct LocalReport<'a> {
    alpha: f64,
    summary: &'a LocalMoranSummary,
    units: &'a [LocalMoranResult],
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let mode = processing_mode(cli.threads);

    match cli.command {
        Commands::Weights { weights } => {
            let table = read_input(&weights.input)?;
            let start = Instant::now();
            let graph = build_graph(&table, &weights)?;
            done("Weights", start.elapsed());

            let report = WeightsReport::new(&graph);
            if cli.json {
                print_json(&report)?;
            } else {
                println!("Units:      {}", report.units);
                println!(
                    "Neighbors:  min {}, max {}, mean {:.2}",
                    report.min_neighbors, report.max_neighbors, report.mean_neighbors
                );
                println!("Symmetric:  {}", report.symmetric);
                println!("S0 = {:.4}, S1 = {:.4}, S2 = {:.4}", report.s0, report.s1, report.s2);
            }
        }

        Commands::Global { weights, perm, alternative } => {
            let table = read_input(&weights.input)?;
            let values = attributes(&table)?;
            let graph = build_graph(&table, &weights)?;
            let config = AnalysisConfig {
                permutations: perm.permutations,
                seed: perm.seed,
                alternative: alternative.into(),
                mode,
                ..Default::default()
            };

            let start = Instant::now();
            let pb = spinner("Computing global Moran's I...");
            let result = global_moran(&values, &graph, &config.global_params())?;
            pb.finish_and_clear();
            done("Global Moran's I", start.elapsed());

            if cli.json {
                print_json(&result)?;
            } else {
                print_global(&result);
            }
        }

        Commands::Local { weights, perm, alpha, output } => {
            let table = read_input(&weights.input)?;
            let values = attributes(&table)?;
            let graph = build_graph(&table, &weights)?;
            let config = AnalysisConfig {
                permutations: perm.permutations,
                seed: perm.seed,
                alpha,
                mode,
                ..Default::default()
            };

            let start = Instant::now();
            let pb = spinner("Computing local Moran's I...");
            let local = local_moran(&values, &graph, &config.local_params())?;
            pb.finish_and_clear();
            done("Local Moran's I", start.elapsed());

            let summary = LocalMoranSummary::from_results(&local);
            if let Some(path) = output {
                std::fs::write(&path, local_csv(&local))
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Saved: {}", path.display());
            }
            if cli.json {
                print_json(&LocalReport { alpha, summary: &summary, units: &local })?;
            } else {
                print_summary(&summary, alpha);
            }
        }

        Commands::Analyze { weights, perm, alpha, alternative } => {
            let table = read_input(&weights.input)?;
            let values = attributes(&table)?;
            let adjacency = contiguity_rows(&table, weights.rule)?;
            let config = AnalysisConfig {
                k: weights.k,
                strategy: weights.rule.strategy(),
                permutations: perm.permutations,
                seed: perm.seed,
                alpha,
                alternative: alternative.into(),
                mode,
            };

            let start = Instant::now();
            let pb = spinner("Running analysis...");
            let analysis = run_analysis(weights_input(&table, &adjacency), &values, &config)?;
            pb.finish_and_clear();
            done("Analysis", start.elapsed());

            if cli.json {
                print_json(&analysis)?;
            } else {
                print_global(&analysis.global);
                println!();
                print_summary(&analysis.summary, alpha);
            }
        }
    }

    Ok(())
}
