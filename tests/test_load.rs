/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Invariants of the loader pipeline.

use anyhow::Result;
use graphclust::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::io::Cursor;

/// Small input buffers keep the fixtures light; semantics do not depend
/// on the buffer size.
fn test_config() -> LoadConfig {
    LoadConfig {
        buffer_size: 1 << 16,
        ..LoadConfig::default()
    }
}

fn load_named_with(input: &str, config: &LoadConfig) -> Result<(GraphNamed<DistEntry>, u64)> {
    GraphNamed::load(&mut Cursor::new(input.as_bytes()), config)
}

fn load_named(input: &str) -> Result<(GraphNamed<DistEntry>, u64)> {
    load_named_with(input, &test_config())
}

/// Dumps the adjacency as (row, id, distance) triples.
fn dump<E: MatrixElement, G: ClusterGraph<E>>(graph: &G) -> Vec<(usize, u32, f64)> {
    let mut out = Vec::new();
    for i in 0..graph.num_vertices() {
        for e in graph.matrix().neighbors(i) {
            out.push((i, e.id(), e.d()));
        }
    }
    out
}

fn check_invariants<E: MatrixElement, G: ClusterGraph<E>>(graph: &G) {
    let matrix = graph.matrix();
    let mut total = 0;
    for i in 0..graph.num_vertices() {
        let row = matrix.neighbors(i);
        total += row.len();
        for pair in row.windows(2) {
            // strictly sorted: ordering and uniqueness in one shot
            assert!(pair[0].id() < pair[1].id(), "row {} not strictly sorted", i);
        }
        for e in row {
            assert_ne!(e.id() as usize, i, "self-loop in row {}", i);
            assert!(e.d().is_finite());
            // mirrored entry with the same distance
            let mirror = matrix
                .neighbors(e.id() as usize)
                .iter()
                .find(|f| f.id() as usize == i)
                .unwrap_or_else(|| panic!("missing mirror of ({}, {})", i, e.id()));
            assert_eq!(mirror.d(), e.d());
        }
    }
    assert_eq!(matrix.num_elements(), total / 2, "edge count invariant");
}

#[test]
fn test_symmetry_sorting_and_edge_count() -> Result<()> {
    let input = "a\tb\tdist\nC\tA\t0.3\nA\tB\t0.1\nB\tC\t0.2\nA\tD\t0.4\n";
    let (graph, n_total) = load_named(input)?;
    assert_eq!(n_total, 4);
    assert_eq!(graph.num_vertices(), 4);
    assert_eq!(graph.num_edges(), 4);
    check_invariants(&graph);
    Ok(())
}

#[test]
fn test_duplicate_edges_keep_minimum_distance() -> Result<()> {
    let input = "a\tb\tdist\nA\tB\t0.5\nB\tA\t0.2\nA\tB\t0.9\n";
    let (graph, n_total) = load_named(input)?;
    assert_eq!(n_total, 3);
    assert_eq!(graph.num_edges(), 1);
    let row = graph.matrix().neighbors(0);
    assert_eq!(row.len(), 1);
    assert_eq!(row[0].d(), 0.2);
    check_invariants(&graph);
    Ok(())
}

#[test]
fn test_named_self_loops_register_the_identifier() -> Result<()> {
    // Z appears only on the diagonal: it still becomes a vertex, with an
    // empty row
    let input = "a\tb\tdist\nA\tB\t0.1\nZ\tZ\t0.0\n";
    let (graph, _) = load_named(input)?;
    assert_eq!(graph.num_vertices(), 3);
    assert_eq!(graph.num_edges(), 1);
    assert_eq!(graph.ids().get(b"Z"), Some(2));
    assert!(graph.matrix().neighbors(2).is_empty());
    check_invariants(&graph);
    Ok(())
}

#[test]
fn test_numbered_self_loops_are_dropped_at_parse() -> Result<()> {
    let input = "a\tb\tdist\n5\t6\t0.1\n9\t9\t0.0\n";
    let (graph, n_total) =
        GraphNumbered::<DistEntry>::load(&mut Cursor::new(input.as_bytes()), &test_config())?;
    assert_eq!(n_total, 2);
    // 9 never becomes a vertex
    assert_eq!(graph.num_vertices(), 2);
    assert_eq!(graph.ids().get_local(9), None);
    assert_eq!(graph.ids().global(0), 5);
    assert_eq!(graph.ids().global(1), 6);
    check_invariants(&graph);
    Ok(())
}

#[test]
fn test_crlf_and_mixed_separators() -> Result<()> {
    let input = "a,b\tdist\r\nA,B\t0.1\r\nB\tC,0.2\r\n";
    let (graph, n_total) = load_named(input)?;
    assert_eq!(n_total, 2);
    assert_eq!(graph.num_vertices(), 3);
    assert_eq!(graph.num_edges(), 2);
    check_invariants(&graph);
    Ok(())
}

#[test]
fn test_missing_final_newline() -> Result<()> {
    let input = "a\tb\tdist\nA\tB\t0.1\nB\tC\t0.2";
    let (graph, n_total) = load_named(input)?;
    assert_eq!(n_total, 2);
    assert_eq!(graph.num_edges(), 2);
    Ok(())
}

#[test]
fn test_named_columns_and_swap() -> Result<()> {
    // identifier columns picked by name, in either order
    let input = "dist\tright\tleft\n0.1\tB\tA\n0.2\tC\tB\n";
    let config = LoadConfig {
        id_columns: Some(("left".to_string(), "right".to_string())),
        distance_column: Some("dist".to_string()),
        ..test_config()
    };
    let (graph, _) = load_named_with(input, &config)?;
    assert_eq!(graph.num_vertices(), 3);
    assert_eq!(graph.num_edges(), 2);
    check_invariants(&graph);
    Ok(())
}

#[test]
fn test_missing_column_name_fails_fast() {
    let input = "a\tb\tdist\nA\tB\t0.1\n";
    let config = LoadConfig {
        distance_column: Some("nope".to_string()),
        ..test_config()
    };
    let err = load_named_with(input, &config).err().unwrap();
    assert!(err.to_string().contains("nope"));
}

#[test]
fn test_wrong_column_count_is_an_error() {
    let input = "a\tb\tdist\nA\tB\t0.1\nA\tB\n";
    let err = load_named(input).err().unwrap();
    assert!(format!("{:#}", err).contains("ill-formatted"));
}

#[test]
fn test_unparseable_distance_is_an_error() {
    let input = "a\tb\tdist\nA\tB\tx.1\n";
    let err = load_named(input).err().unwrap();
    assert!(format!("{:#}", err).contains("ill-formatted"));
}

#[test]
fn test_header_requires_three_columns() {
    let input = "a\tb\nA\tB\n";
    let err = load_named(input).err().unwrap();
    assert!(err.to_string().contains("three columns"));
}

#[test]
fn test_filter_monotonicity() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    let mut input = String::from("a\tb\tdist\n");
    for _ in 0..500 {
        let u = rng.random_range(0..40u32);
        let v = rng.random_range(0..40u32);
        writeln!(input, "n{}\tn{}\t{:.3}", u, v, rng.random_range(0.0..1.0)).unwrap();
    }

    // compare by name pairs: local ids are not comparable across loads
    let name_edges = |max: f64| -> Result<std::collections::BTreeSet<(Vec<u8>, Vec<u8>)>> {
        let mut config = test_config();
        config.filters.insert(
            "dist".to_string(),
            ColumnFilter {
                min: f64::NEG_INFINITY,
                max,
            },
        );
        let (graph, _) = load_named_with(&input, &config)?;
        check_invariants(&graph);
        let mut set = std::collections::BTreeSet::new();
        for (i, j, _) in dump(&graph) {
            let a = graph.ids().name(i as u32).as_bytes().to_vec();
            let b = graph.ids().name(j).as_bytes().to_vec();
            set.insert((a.clone().min(b.clone()), a.max(b)));
        }
        Ok(set)
    };

    let loose = name_edges(0.8)?;
    let tight = name_edges(0.3)?;
    assert!(tight.is_subset(&loose));
    Ok(())
}

#[test]
fn test_load_is_idempotent_and_portion_independent() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut input = String::from("a\tb\tdist\n");
    for _ in 0..2000 {
        let u = rng.random_range(0..100u32);
        let v = rng.random_range(0..100u32);
        writeln!(input, "s{}\ts{}\t{:.4}", u, v, rng.random_range(0.0..1.0)).unwrap();
    }

    let (reference, total_ref) = load_named(&input)?;
    check_invariants(&reference);

    // small buffers force many portions through the pipeline; extra
    // threads exercise several parsers and updaters
    for (buffer_size, threads) in [(256, 4), (1024, 8), (4096, 16)] {
        let config = LoadConfig {
            buffer_size,
            num_threads: threads,
            ..test_config()
        };
        let (graph, total) = load_named_with(&input, &config)?;
        check_invariants(&graph);
        assert_eq!(total, total_ref);
        assert_eq!(graph.num_vertices(), reference.num_vertices());
        assert_eq!(graph.num_edges(), reference.num_edges());
        // identifier allocation is in input order, so the adjacencies
        // must be identical, not merely isomorphic
        for i in 0..reference.num_vertices() {
            assert_eq!(graph.ids().name(i as u32), reference.ids().name(i as u32));
        }
        let (a, b) = (dump(&graph), dump(&reference));
        assert_eq!(a, b);
    }
    Ok(())
}

#[test]
fn test_numbered_matches_named_on_the_same_graph() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut named_input = String::from("a\tb\tdist\n");
    let mut numbered_input = String::from("a\tb\tdist\n");
    let mut pairs = Vec::new();
    for _ in 0..300 {
        let u = rng.random_range(0..50u32);
        let v = rng.random_range(0..50u32);
        if u == v {
            continue;
        }
        let d = rng.random_range(0.0..1.0);
        writeln!(named_input, "n{}\tn{}\t{:.4}", u, v, d).unwrap();
        writeln!(numbered_input, "{}\t{}\t{:.4}", u, v, d).unwrap();
        pairs.push((u, v));
    }

    let (named, _) = load_named(&named_input)?;
    let (numbered, _) = GraphNumbered::<DistEntry>::load(
        &mut Cursor::new(numbered_input.as_bytes()),
        &test_config(),
    )?;
    check_invariants(&named);
    check_invariants(&numbered);

    // identical first-appearance order makes local indices line up
    assert_eq!(named.num_vertices(), numbered.num_vertices());
    assert_eq!(named.num_edges(), numbered.num_edges());
    assert_eq!(dump(&named), dump(&numbered));
    for i in 0..named.num_vertices() as u32 {
        let name = named.ids().name(i);
        let global = numbered.ids().global(i);
        assert_eq!(name.as_bytes(), format!("n{}", global).as_bytes());
    }
    Ok(())
}

#[test]
fn test_min_and_max_filters_combine() -> Result<()> {
    let input = "a\tb\tdist\tscore\n\
                 A\tB\t0.1\t5\n\
                 A\tC\t0.1\t15\n\
                 A\tD\t0.1\t25\n";
    let mut config = test_config();
    config.filters.insert(
        "score".to_string(),
        ColumnFilter { min: 10.0, max: 20.0 },
    );
    let (graph, n_total) = load_named_with(input, &config)?;
    assert_eq!(n_total, 3);
    // only the A-C row survives; B and D never become vertices
    assert_eq!(graph.num_edges(), 1);
    assert_eq!(graph.num_vertices(), 2);
    assert_eq!(graph.ids().get(b"B"), None);
    assert_eq!(graph.ids().get(b"D"), None);
    Ok(())
}

#[test]
fn test_empty_body() -> Result<()> {
    let (graph, n_total) = load_named("a\tb\tdist\n")?;
    assert_eq!(n_total, 0);
    assert_eq!(graph.num_vertices(), 0);
    assert_eq!(graph.num_edges(), 0);
    Ok(())
}

#[cfg(feature = "slow_tests")]
#[test]
fn test_large_load_stress() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(0xbeef);
    let mut input = String::from("a\tb\tdist\n");
    for _ in 0..500_000 {
        let u = rng.random_range(0..20_000u32);
        let v = rng.random_range(0..20_000u32);
        writeln!(input, "g{}\tg{}\t{:.4}", u, v, rng.random_range(0.0..1.0)).unwrap();
    }
    let config = LoadConfig {
        buffer_size: 1 << 20,
        num_threads: 16,
        ..LoadConfig::default()
    };
    let (graph, n_total) = load_named_with(&input, &config)?;
    assert_eq!(n_total, 500_000);
    check_invariants(&graph);
    Ok(())
}
