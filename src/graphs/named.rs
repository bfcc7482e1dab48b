/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Graph over objects identified by arbitrary byte strings.

use crate::graphs::load::{process_header, run_pipeline, LoadConfig};
use crate::graphs::matrix::{MatrixElement, SparseMatrix};
use crate::graphs::ids::NamedIds;
use crate::graphs::ClusterGraph;
use crate::output;
use crate::utils::chunked_bytes::NameRef;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};

/// A sparse distance graph whose objects are named by strings.
///
/// Self-loop rows are parsed and their identifiers registered (so an
/// object mentioned only on the diagonal still gets a local index), but
/// the loop itself never reaches the adjacency.
pub struct GraphNamed<E: MatrixElement> {
    matrix: SparseMatrix<E>,
    ids: NamedIds,
}

impl<E: MatrixElement> GraphNamed<E> {
    /// Streams a distance table, returning the graph and the total number
    /// of data rows observed before filtering.
    pub fn load<R: BufRead>(reader: &mut R, config: &LoadConfig) -> Result<(Self, u64)> {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .context("error reading the header of the distance file")?;
        let header = process_header(&line, config)?;

        let mut ids = NamedIds::new();
        let (rows, n_total) = run_pipeline::<R, NamedIds, E>(
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

        Ok((GraphNamed { matrix, ids }, n_total))
    }

    pub fn ids(&self) -> &NamedIds {
        &self.ids
    }

    /// Dumps the adjacency as `name,name,distance` rows, objects sorted
    /// by name; meant for debugging small graphs.
    pub fn write_edges<W: Write>(&self, mut out: W) -> Result<()> {
        let mut names: Vec<NameRef> = (0..self.ids.len() as u32).map(|i| self.ids.name(i)).collect();
        names.sort_unstable();
        for name in names {
            let i = match self.ids.get(name.as_bytes()) {
                Some(i) => i,
                None => continue,
            };
            for e in self.matrix.neighbors(i as usize) {
                out.write_all(name.as_bytes())?;
                out.write_all(b",")?;
                out.write_all(self.ids.name(e.id()).as_bytes())?;
                writeln!(out, ",{:.6}", e.d())?;
            }
        }
        Ok(())
    }
}

impl<E: MatrixElement> ClusterGraph<E> for GraphNamed<E> {
    fn load<R: BufRead>(reader: &mut R, config: &LoadConfig) -> Result<(Self, u64)> {
        GraphNamed::load(reader, config)
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
        let mut at = 0;
        for name in external_names {
            if let Some(local_id) = self.ids.get(name.as_bytes()) {
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
            let mut rows: Vec<(NameRef, u32)> = assignments
                .iter()
                .enumerate()
                .map(|(i, &a)| (self.ids.name(i as u32), old2new[a as usize]))
                .collect();
            rows.sort_by(|p, q| (p.1, p.0).cmp(&(q.1, q.0)));

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
                |_, name| self.ids.get(name.as_bytes()),
                separator,
                representatives,
            )
        }
    }
}
