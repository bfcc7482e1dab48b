/*
 * SPDX-FileCopyrightText: 2024 Tommaso Fontana
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The command-line interface of the `graphclust` binary.

use crate::algorithms::{
    CdHit, Clustering, Leiden, LeidenParams, Linkage, SetCover, SingleLinkageBfs, UClust,
};
use crate::graphs::{
    ClusterGraph, ColumnFilter, DistEntry, DistanceTransform, GraphNamed, GraphNumbered,
    LoadConfig, MatrixElement, MiniEntry,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use itertools::Itertools;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Single linkage (connected components).
    Single,
    /// Complete linkage.
    Complete,
    /// Greedy star clustering à la UCLUST.
    Uclust,
    /// Greedy set cover.
    SetCover,
    /// Greedy incremental clustering à la CD-HIT.
    CdHit,
    /// Community detection (requires the `leiden` feature).
    Leiden,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Single => "single",
            Algorithm::Complete => "complete",
            Algorithm::Uclust => "uclust",
            Algorithm::SetCover => "set-cover",
            Algorithm::CdHit => "cd-hit",
            Algorithm::Leiden => "leiden",
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "graphclust", version)]
/// Clusters objects connected by a sparse graph of pairwise distances.
///
/// The input is a TSV/CSV table with a header; by default the first two
/// columns identify the endpoints and the third carries the distance.
pub struct Cli {
    /// Input TSV/CSV table with pairwise distances.
    pub distances: PathBuf,

    /// Output TSV/CSV table with cluster assignments.
    pub output: PathBuf,

    /// Clustering algorithm.
    #[arg(long, value_enum, default_value_t = Algorithm::Single)]
    pub algo: Algorithm,

    /// Optional TSV/CSV file with object names in the first column,
    /// sorted decreasingly w.r.t. representativeness.
    #[arg(long)]
    pub objects_file: Option<PathBuf>,

    /// Names of the two columns with object identifiers (default: the
    /// two first columns).
    #[arg(long, num_args = 2, value_names = ["COLUMN1", "COLUMN2"])]
    pub id_cols: Option<Vec<String>>,

    /// Name of the column with pairwise distances or similarities
    /// (default: the third column).
    #[arg(long)]
    pub distance_col: Option<String>,

    /// Treat the distance column as similarities in [0, 1].
    #[arg(long)]
    pub similarity: bool,

    /// Treat the distance column as percent similarities in [0, 100].
    #[arg(long, conflicts_with = "similarity")]
    pub percent_similarity: bool,

    /// Accept rows whose COLUMN value is greater than or equal to VALUE
    /// (repeatable).
    #[arg(long, num_args = 2, value_names = ["COLUMN", "VALUE"], action = clap::ArgAction::Append)]
    pub min: Vec<String>,

    /// Accept rows whose COLUMN value is lower than or equal to VALUE
    /// (repeatable).
    #[arg(long, num_args = 2, value_names = ["COLUMN", "VALUE"], action = clap::ArgAction::Append)]
    pub max: Vec<String>,

    /// Objects in the distance file are represented by non-negative
    /// integers (mappable to names through the objects file).
    #[arg(long)]
    pub numeric_ids: bool,

    /// Output a representative object for each cluster instead of a
    /// numerical cluster identifier.
    #[arg(long)]
    pub out_representatives: bool,

    /// Output a CSV table instead of the default TSV.
    #[arg(long)]
    pub out_csv: bool,

    /// Resolution parameter for the leiden algorithm.
    #[arg(long, default_value_t = 0.7)]
    pub leiden_resolution: f64,

    /// Beta parameter for the leiden algorithm.
    #[arg(long, default_value_t = 0.01)]
    pub leiden_beta: f64,

    /// Number of iterations for the leiden algorithm.
    #[arg(long, default_value_t = 2)]
    pub leiden_iterations: usize,

    /// Number of threads (default: all logical cores).
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Verbose logging.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Initializes the logger; the default filter is `info`, raised to
/// `debug` in verbose mode (`RUST_LOG` overrides both).
pub fn init_env_logger(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default));
    let start = Instant::now();
    builder.format(move |buf, record| {
        use std::io::Write;
        let style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{:>9.3}s {style}{:>5}{style:#} {}",
            start.elapsed().as_secs_f64(),
            record.level(),
            record.args()
        )
    });
    builder.init();
    Ok(())
}

fn needs_distances(algo: Algorithm) -> bool {
    matches!(
        algo,
        Algorithm::Complete | Algorithm::Leiden | Algorithm::Uclust
    )
}

fn parse_filters(pairs: &[String], flag: &str) -> Result<Vec<(String, f64)>> {
    pairs
        .iter()
        .tuples()
        .map(|(column, value)| {
            let value: f64 = value
                .parse()
                .with_context(|| format!("invalid {} threshold {:?}", flag, value))?;
            Ok((column.clone(), value))
        })
        .collect()
}

fn load_config(cli: &Cli) -> Result<LoadConfig> {
    let mut config = LoadConfig {
        id_columns: cli
            .id_cols
            .as_ref()
            .map(|cols| (cols[0].clone(), cols[1].clone())),
        distance_column: cli.distance_col.clone(),
        transform: if cli.percent_similarity {
            DistanceTransform::PercentSimilarity
        } else if cli.similarity {
            DistanceTransform::Similarity
        } else {
            DistanceTransform::Distance
        },
        num_threads: cli.threads.unwrap_or_else(num_cpus::get),
        ..LoadConfig::default()
    };

    // repeated bounds on the same column tighten each other
    for (column, value) in parse_filters(&cli.min, "--min")? {
        let filter = config.filters.entry(column).or_insert_with(ColumnFilter::default);
        filter.min = filter.min.max(value);
    }
    for (column, value) in parse_filters(&cli.max, "--max")? {
        let filter = config.filters.entry(column).or_insert_with(ColumnFilter::default);
        filter.max = filter.max.min(value);
    }

    Ok(config)
}

fn make_algorithm<E: MatrixElement>(cli: &Cli) -> Result<Box<dyn Clustering<E>>> {
    Ok(match cli.algo {
        Algorithm::Single => Box::new(SingleLinkageBfs),
        Algorithm::Complete => Box::new(Linkage::complete()),
        Algorithm::Uclust => Box::new(UClust),
        Algorithm::SetCover => Box::new(SetCover),
        Algorithm::CdHit => Box::new(CdHit),
        Algorithm::Leiden => Box::new(Leiden::new(LeidenParams {
            resolution: cli.leiden_resolution,
            beta: cli.leiden_beta,
            iterations: cli.leiden_iterations,
        })?),
    })
}

fn execute<E: MatrixElement, G: ClusterGraph<E>>(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    log::info!(
        "Loading pairwise distances from {}...",
        cli.distances.display()
    );
    let start = Instant::now();
    let file = File::open(&cli.distances)
        .with_context(|| format!("unable to open distance file {}", cli.distances.display()))?;
    let mut reader = BufReader::with_capacity(1 << 20, file);
    let (mut graph, n_total_dists) = G::load(&mut reader, &config)?;
    log::info!(
        "  input graph: {} nodes, {} edges",
        graph.num_input_vertices(),
        n_total_dists
    );
    log::info!(
        "  filtered graph: {} nodes, {} edges",
        graph.num_vertices(),
        graph.num_edges()
    );
    log::info!("  time [s]: {:.3}", start.elapsed().as_secs_f64());

    let mut names = Vec::new();
    let mut objects: Vec<u32> = (0..graph.num_vertices() as u32).collect();
    if let Some(path) = &cli.objects_file {
        log::info!("Loading objects from {}...", path.display());
        let start = Instant::now();
        let file = File::open(path)
            .with_context(|| format!("unable to open objects file {}", path.display()))?;
        names = crate::graphs::load_objects(&mut BufReader::new(file))?;
        graph.reorder_objects(&names, &mut objects);
        log::info!("  total objects: {}", names.len());
        log::info!("  time [s]: {:.3}", start.elapsed().as_secs_f64());
    }

    let mut assignments = Vec::new();
    if graph.num_edges() > 0 {
        log::info!("Clustering (algorithm: {})...", cli.algo);
        let start = Instant::now();
        let mut algorithm = make_algorithm::<E>(cli)?;
        let n_clusters =
            algorithm.run(graph.matrix_mut(), &objects, f64::MAX, &mut assignments)?;
        log::info!(
            "  objects: {}, clusters: {}",
            graph.num_vertices(),
            n_clusters
        );
        log::info!("  time [s]: {:.3}", start.elapsed().as_secs_f64());
    } else if graph.num_vertices() > 0 {
        // no edges survived the filters: every vertex is a singleton
        assignments = (0..graph.num_vertices() as u32).collect();
    }

    log::info!(
        "Saving clusters (representatives = {})...",
        cli.out_representatives
    );
    let start = Instant::now();
    let separator = if cli.out_csv { b',' } else { b'\t' };
    let out = File::create(&cli.output)
        .with_context(|| format!("unable to create output file {}", cli.output.display()))?;
    let n_total_clusters =
        graph.save_assignments(out, &names, &assignments, separator, cli.out_representatives)?;
    log::info!(
        "  total clusters (including singletons): {}",
        n_total_clusters
    );
    log::info!("  time [s]: {:.3}", start.elapsed().as_secs_f64());

    Ok(())
}

/// Entry point of the command-line interface.
pub fn main(cli: Cli) -> Result<()> {
    match (cli.numeric_ids, needs_distances(cli.algo)) {
        (false, true) => execute::<DistEntry, GraphNamed<DistEntry>>(&cli),
        (false, false) => execute::<MiniEntry, GraphNamed<MiniEntry>>(&cli),
        (true, true) => execute::<DistEntry, GraphNumbered<DistEntry>>(&cli),
        (true, false) => execute::<MiniEntry, GraphNumbered<MiniEntry>>(&cli),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("graphclust").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_positional_arguments_and_defaults() {
        let cli = parse(&["in.tsv", "out.tsv"]);
        assert_eq!(cli.distances.to_str(), Some("in.tsv"));
        assert_eq!(cli.output.to_str(), Some("out.tsv"));
        assert_eq!(cli.algo, Algorithm::Single);
        assert!(!cli.numeric_ids);
        assert!(!cli.out_csv);
    }

    #[test]
    fn test_algorithm_names() {
        for (name, algo) in [
            ("single", Algorithm::Single),
            ("complete", Algorithm::Complete),
            ("uclust", Algorithm::Uclust),
            ("set-cover", Algorithm::SetCover),
            ("cd-hit", Algorithm::CdHit),
            ("leiden", Algorithm::Leiden),
        ] {
            let cli = parse(&["in.tsv", "out.tsv", "--algo", name]);
            assert_eq!(cli.algo, algo);
            assert_eq!(cli.algo.to_string(), name);
        }
    }

    #[test]
    fn test_repeated_filters_tighten() {
        let cli = parse(&[
            "in.tsv", "out.tsv", "--min", "score", "10", "--min", "score", "20", "--max",
            "score", "80", "--max", "pident", "99.5",
        ]);
        let config = load_config(&cli).unwrap();
        let score = &config.filters["score"];
        assert_eq!(score.min, 20.0);
        assert_eq!(score.max, 80.0);
        let pident = &config.filters["pident"];
        assert_eq!(pident.min, f64::NEG_INFINITY);
        assert_eq!(pident.max, 99.5);
    }

    #[test]
    fn test_id_columns_and_transform() {
        let cli = parse(&[
            "in.tsv",
            "out.tsv",
            "--id-cols",
            "query",
            "reference",
            "--distance-col",
            "ani",
            "--similarity",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(
            config.id_columns,
            Some(("query".to_string(), "reference".to_string()))
        );
        assert_eq!(config.distance_column.as_deref(), Some("ani"));
        assert_eq!(config.transform, DistanceTransform::Similarity);
    }

    #[test]
    fn test_similarity_flags_conflict() {
        let result = Cli::try_parse_from([
            "graphclust",
            "in.tsv",
            "out.tsv",
            "--similarity",
            "--percent-similarity",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_filter_value() {
        let cli = parse(&["in.tsv", "out.tsv", "--max", "score", "high"]);
        assert!(load_config(&cli).is_err());
    }
}
