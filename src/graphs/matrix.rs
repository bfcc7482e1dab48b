/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The compact per-row adjacency built by the loader.

use rayon::prelude::*;

/// An entry of an adjacency row: the second endpoint plus, depending on
/// the implementation, a distance.
///
/// Algorithms that ignore distances run on [`MiniEntry`], halving (and
/// more) the memory footprint of the adjacency.
pub trait MatrixElement: Copy + Send + Sync + 'static {
    fn new(id: u32, d: f64) -> Self;
    /// The second endpoint (local index).
    fn id(&self) -> u32;
    /// The distance to the second endpoint.
    fn d(&self) -> f64;
}

/// Entry with an explicit distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistEntry {
    id: u32,
    d: f64,
}

impl MatrixElement for DistEntry {
    #[inline(always)]
    fn new(id: u32, d: f64) -> Self {
        DistEntry { id, d }
    }

    #[inline(always)]
    fn id(&self) -> u32 {
        self.id
    }

    #[inline(always)]
    fn d(&self) -> f64 {
        self.d
    }
}

/// Entry without a distance; reports distance zero, which is below every
/// threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MiniEntry {
    id: u32,
}

impl MatrixElement for MiniEntry {
    #[inline(always)]
    fn new(id: u32, _d: f64) -> Self {
        MiniEntry { id }
    }

    #[inline(always)]
    fn id(&self) -> u32 {
        self.id
    }

    #[inline(always)]
    fn d(&self) -> f64 {
        0.0
    }
}

/// A sparse symmetric adjacency: one sorted, deduplicated row of entries
/// per local index.
///
/// Row `i` and row `j` contain mirrored entries, and
/// `num_elements() == ½ Σᵢ |row(i)|`. Rows are written once during load
/// and are read-only afterwards, except for consumers that deliberately
/// destroy them to release memory ([`clear_row`](SparseMatrix::clear_row)).
pub struct SparseMatrix<E> {
    rows: Vec<Vec<E>>,
    n_elements: usize,
}

impl<E: MatrixElement> SparseMatrix<E> {
    pub fn new() -> Self {
        SparseMatrix {
            rows: Vec::new(),
            n_elements: 0,
        }
    }

    /// Wraps freshly loaded rows; call [`finalize`](Self::finalize) before
    /// using the matrix.
    pub(crate) fn from_rows(rows: Vec<Vec<E>>) -> Self {
        SparseMatrix {
            rows,
            n_elements: 0,
        }
    }

    /// Number of objects (rows).
    #[inline(always)]
    pub fn num_objects(&self) -> usize {
        self.rows.len()
    }

    /// Number of distinct edges.
    #[inline(always)]
    pub fn num_elements(&self) -> usize {
        self.n_elements
    }

    #[inline(always)]
    pub fn num_neighbors(&self, i: usize) -> usize {
        self.rows[i].len()
    }

    #[inline(always)]
    pub fn neighbors(&self, i: usize) -> &[E] {
        &self.rows[i]
    }

    /// Destroys row `i`, releasing its storage.
    #[inline]
    pub fn clear_row(&mut self, i: usize) -> Vec<E> {
        std::mem::take(&mut self.rows[i])
    }

    /// Sorts every row by (endpoint, distance), removes duplicate
    /// endpoints keeping the first (minimum-distance) entry, and recomputes
    /// the edge count.
    pub fn finalize(&mut self) {
        let total: usize = self
            .rows
            .par_iter_mut()
            .map(|row| {
                row.sort_unstable_by(|a, b| {
                    a.id().cmp(&b.id()).then_with(|| a.d().total_cmp(&b.d()))
                });
                row.dedup_by_key(|e| e.id());
                row.len()
            })
            .sum();
        self.n_elements = total / 2;
    }

    /// Logs a histogram of the stored distances at debug level.
    pub fn log_distance_histogram(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let mut bounds = vec![0.0f64];
        while *bounds.last().unwrap() < 0.05 {
            bounds.push(bounds.last().unwrap() + 0.001);
        }
        bounds.push(f64::MAX);
        let mut histo = vec![0usize; bounds.len()];
        for row in &self.rows {
            for e in row {
                for (i, b) in bounds.iter().enumerate() {
                    if e.d() < *b {
                        histo[i] += 1;
                        break;
                    }
                }
            }
        }
        log::debug!("Distance histogram");
        for (b, count) in bounds.iter().zip(&histo) {
            log::debug!("  d < {}: {}", b, count);
        }
    }

    /// Builds a matrix from undirected edges, mirroring every edge; meant
    /// for tests and small graphs.
    pub fn from_symmetric_edges(
        num_objects: usize,
        edges: impl IntoIterator<Item = (u32, u32, f64)>,
    ) -> Self {
        let mut rows = vec![Vec::new(); num_objects];
        for (u, v, d) in edges {
            if u == v {
                continue;
            }
            rows[u as usize].push(E::new(v, d));
            rows[v as usize].push(E::new(u, d));
        }
        let mut matrix = Self::from_rows(rows);
        matrix.finalize();
        matrix
    }
}

impl<E: MatrixElement> Default for SparseMatrix<E> {
    fn default() -> Self {
        Self::new()
    }
}
