/*
 * SPDX-FileCopyrightText: 2024 Tommaso Fontana
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Full command-line round trips over on-disk files.

#![cfg(feature = "cli")]

use anyhow::Result;
use graphclust::cli::{self, Algorithm, Cli};
use std::path::{Path, PathBuf};

/// A `Cli` with everything at its command-line default.
fn cli_defaults(distances: &Path, output: &Path) -> Cli {
    Cli {
        distances: distances.to_path_buf(),
        output: output.to_path_buf(),
        algo: Algorithm::Single,
        objects_file: None,
        id_cols: None,
        distance_col: None,
        similarity: false,
        percent_similarity: false,
        min: Vec::new(),
        max: Vec::new(),
        numeric_ids: false,
        out_representatives: false,
        out_csv: false,
        leiden_resolution: 0.7,
        leiden_beta: 0.01,
        leiden_iterations: 2,
        threads: Some(4),
        verbose: false,
    }
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_end_to_end_single_linkage() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let distances = write_file(
        dir.path(),
        "distances.tsv",
        "a\tb\tdist\nA\tB\t0.1\nB\tC\t0.1\nC\tD\t0.1\n",
    );
    let output = dir.path().join("assignments.tsv");

    cli::main(cli_defaults(&distances, &output))?;

    let table = std::fs::read_to_string(&output)?;
    assert_eq!(table, "object\tcluster\nA\t0\nB\t0\nC\t0\nD\t0\n");
    Ok(())
}

#[test]
fn test_end_to_end_numeric_ids_csv() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let distances = write_file(
        dir.path(),
        "distances.csv",
        "a,b,dist\n10,11,0.1\n11,12,0.1\n20,21,0.1\n",
    );
    let output = dir.path().join("assignments.csv");

    let mut cli = cli_defaults(&distances, &output);
    cli.numeric_ids = true;
    cli.out_csv = true;
    cli::main(cli)?;

    let table = std::fs::read_to_string(&output)?;
    // larger cluster first; objects by ascending global id within it
    assert_eq!(
        table,
        "object,cluster\n10,0\n11,0\n12,0\n20,1\n21,1\n"
    );
    Ok(())
}

#[test]
fn test_end_to_end_objects_file_and_representatives() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let distances = write_file(
        dir.path(),
        "distances.tsv",
        "a\tb\tdist\nA\tB\t0.1\nC\tD\t0.1\nC\tE\t0.1\n",
    );
    let objects = write_file(
        dir.path(),
        "objects.tsv",
        "object\tlength\nE\t100\nD\t90\nC\t80\nB\t70\nA\t60\nX\t50\n",
    );
    let output = dir.path().join("assignments.tsv");

    let mut cli = cli_defaults(&distances, &output);
    cli.objects_file = Some(objects);
    cli.out_representatives = true;
    cli::main(cli)?;

    let table = std::fs::read_to_string(&output)?;
    assert_eq!(
        table,
        "object\tcluster\nE\tE\nD\tE\nC\tE\nB\tB\nA\tB\nX\tX\n"
    );
    Ok(())
}

#[test]
fn test_end_to_end_filters_and_similarity() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let distances = write_file(
        dir.path(),
        "distances.tsv",
        "x\ty\tsim\tq\nA\tB\t0.9\t10\nA\tC\t0.2\t10\nA\tD\t0.9\t50\n",
    );
    let output = dir.path().join("assignments.tsv");

    let mut cli = cli_defaults(&distances, &output);
    cli.similarity = true;
    cli.max = vec!["q".to_string(), "20".to_string()];
    cli.algo = Algorithm::Uclust;
    cli::main(cli)?;

    let table = std::fs::read_to_string(&output)?;
    // the A-D row is filtered out entirely, so D never appears; with an
    // effectively infinite threshold, B and C both join A's cluster
    assert_eq!(table, "object\tcluster\nA\t0\nB\t0\nC\t0\n");
    Ok(())
}

#[test]
fn test_unopenable_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli_defaults(&dir.path().join("missing.tsv"), &dir.path().join("out.tsv"));
    let err = cli::main(cli).err().unwrap();
    assert!(format!("{:#}", err).contains("unable to open"));
}

#[test]
fn test_leiden_unavailable_without_feature() {
    if cfg!(feature = "leiden") {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let distances = write_file(dir.path(), "distances.tsv", "a\tb\tdist\nA\tB\t0.1\n");
    let mut cli = cli_defaults(&distances, &dir.path().join("out.tsv"));
    cli.algo = Algorithm::Leiden;
    let err = cli::main(cli).err().unwrap();
    assert!(format!("{:#}", err).contains("leiden"));
}