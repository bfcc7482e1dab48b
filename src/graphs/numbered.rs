/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Graph over objects identified by non-negative integers.

use crate::graphs::load::{process_header, run_pipeline, LoadConfig};
use crate::graphs::matrix::{MatrixElement, SparseMatrix};
use crate::graphs::ids::NumberedIds;
use crate::graphs::ClusterGraph;
use crate::output;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};

/// A sparse distance graph whose objects are numbered in the input.
///
/// Self-loop rows are dropped by the parsers, so an object mentioned only
/// on the diagonal never receives a local index.
pub struct GraphNumbered<E: MatrixElement> {
    matrix: SparseMatrix<E>,
    ids: NumberedIds,
}

impl<E: MatrixElement> GraphNumbered<E> {
    /// Streams a distance table, returning the graph and the total number
    /// of data rows observed before filtering.
    pub fn load<R: BufRead>(reader: &mut R, config: &LoadConfig) -> Result<(Self, u64)> {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .context("error reading the header of the distance file")?;
        let header = process_header(&line, config)?;

        let mut ids = NumberedIds::new();
        let (rows, n_total) = run_pipeline::<R, NumberedIds, E>(
            reader,
            &header,
            config.transform,
            &mut ids,
            config.num_threads,
            config.buffer_size,
        )?;

        let mut matrix = SparseMatrix::from_rows(rows);
        matrix.finalize();
        matrix.log_distance_histogram();

        Ok((GraphNumbered { matrix, ids }, n_total))
    }

    pub fn ids(&self) -> &NumberedIds {
        &self.ids
    }
}

impl<E: MatrixElement> ClusterGraph<E> for GraphNumbered<E> {
    fn load<R: BufRead>(reader: &mut R, config: &LoadConfig) -> Result<(Self, u64)> {
        GraphNumbered::load(reader, config)
    }

    fn num_vertices(&self) -> usize {
        self.matrix.num_objects()
    }

    fn num_input_vertices(&self) -> usize {
        self.ids.len()
    }

    fn num_edges(&self) -> usize {
        self.matrix.num_elements()
    }

    fn matrix(&self) -> &SparseMatrix<E> {
        &self.matrix
    }

    fn matrix_mut(&mut self) -> &mut SparseMatrix<E> {
        &mut self.matrix
    }

    fn reorder_objects(&self, external_names: &[String], objects: &mut [u32]) {
        // the i-th row of the objects file names global identifier i
        let mut at = 0;
        for gi in 0..external_names.len() {
            if let Some(local_id) = self.ids.get_local(gi as u64) {
                objects[at] = local_id;
                at += 1;
            }
        }
    }

    fn save_assignments<W: Write>(
        &self,
        out: W,
        external_names: &[String],
        assignments: &[u32],
        separator: u8,
        representatives: bool,
    ) -> Result<usize> {
        let old2new = output::sort_clusters_by_size(assignments);

        if external_names.is_empty() {
            let mut rows: Vec<(u64, u32)> = assignments
                .iter()
                .enumerate()
                .map(|(i, &a)| (self.ids.global(i as u32), old2new[a as usize]))
                .collect();
            rows.sort_unstable_by(|p, q| (p.1, p.0).cmp(&(q.1, q.0)));

            if representatives {
                output::write_pairs(out, &output::fill_representatives(&rows), separator)?;
            } else {
                output::write_pairs(out, &rows, separator)?;
            }
            Ok(old2new.len())
        } else {
            output::save_with_external(
                out,
                external_names,
                assignments,
                &old2new,
                |gi, _| self.ids.get_local(gi as u64),
                separator,
                representatives,
            )
        }
    }
}
