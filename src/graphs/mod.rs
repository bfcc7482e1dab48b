/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Sparse distance graphs and their loader.

pub mod ids;
pub mod load;
pub mod matrix;
pub mod named;
pub mod numbered;

pub use load::{ColumnFilter, DistanceTransform, LoadConfig};
pub use matrix::{DistEntry, MatrixElement, MiniEntry, SparseMatrix};
pub use named::GraphNamed;
pub use numbered::GraphNumbered;

use anyhow::{Context, Result};
use std::io::{BufRead, Write};

/// The operations the clustering driver needs from a loaded graph,
/// independent of the identifier flavor.
pub trait ClusterGraph<E: MatrixElement>: Sized {
    /// Streams a distance table, returning the graph and the total number
    /// of data rows observed before filtering.
    fn load<R: BufRead>(reader: &mut R, config: &LoadConfig) -> Result<(Self, u64)>;

    /// Number of objects in the adjacency.
    fn num_vertices(&self) -> usize;

    /// Number of distinct identifiers seen in the input.
    fn num_input_vertices(&self) -> usize;

    /// Number of distinct edges.
    fn num_edges(&self) -> usize;

    fn matrix(&self) -> &SparseMatrix<E>;

    fn matrix_mut(&mut self) -> &mut SparseMatrix<E>;

    /// Rewrites the prefix of `objects` with the local indices of the
    /// externally listed objects present in the graph, in list order.
    fn reorder_objects(&self, external_names: &[String], objects: &mut [u32]);

    /// Renders the assignment table; returns the total number of clusters
    /// including the singletons created for external objects absent from
    /// the graph.
    fn save_assignments<W: Write>(
        &self,
        out: W,
        external_names: &[String],
        assignments: &[u32],
        separator: u8,
        representatives: bool,
    ) -> Result<usize>;
}

/// Reads an objects file: a header line, then one object name per row,
/// taken from the first column. The file order is the representativeness
/// order.
pub fn load_objects<R: BufRead>(reader: &mut R) -> Result<Vec<String>> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("error reading the header of the objects file")?;

    let mut names = Vec::new();
    loop {
        line.clear();
        if reader
            .read_line(&mut line)
            .context("error reading the objects file")?
            == 0
        {
            break;
        }
        let first = line
            .split(|c| c == ',' || c == '\t' || c == '\r' || c == '\n')
            .next()
            .unwrap_or("");
        if !first.is_empty() {
            names.push(first.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_load_objects() {
        let data = "object\tsize\nB\t10\nA,3\nC\n\n";
        let names = load_objects(&mut Cursor::new(data)).unwrap();
        assert_eq!(names, vec!["B", "A", "C"]);
    }
}
