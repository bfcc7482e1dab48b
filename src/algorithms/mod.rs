/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Clustering algorithms over the sparse adjacency.
//!
//! All algorithms share one contract: given the adjacency, an ordering of
//! the local indices (most representative first) and an inclusive distance
//! threshold, fill the assignment vector and return the number of
//! clusters. Edges with distance above the threshold are ignored.

pub mod cd_hit;
pub mod leiden;
pub mod linkage;
pub mod set_cover;
pub mod single_bfs;
pub mod uclust;

pub use cd_hit::CdHit;
pub use leiden::{Leiden, LeidenParams};
pub use linkage::{Dendrogram, Linkage};
pub use set_cover::SetCover;
pub use single_bfs::SingleLinkageBfs;
pub use uclust::UClust;

use crate::graphs::matrix::{MatrixElement, SparseMatrix};
use anyhow::Result;

/// Marks a local index not yet assigned to any cluster.
pub(crate) const UNASSIGNED: u32 = u32::MAX;

/// A threshold-based clustering algorithm.
///
/// The matrix is taken mutably: the agglomerative engine and the
/// community-detection adapter consume rows destructively to release
/// memory as they go.
pub trait Clustering<E: MatrixElement> {
    /// Fills `assignments` (one cluster id per local index) and returns
    /// the number of clusters.
    fn run(
        &mut self,
        matrix: &mut SparseMatrix<E>,
        objects: &[u32],
        threshold: f64,
        assignments: &mut Vec<u32>,
    ) -> Result<usize>;
}
