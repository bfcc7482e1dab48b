/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Single linkage as connected-component search.

use super::{Clustering, UNASSIGNED};
use crate::graphs::matrix::{MatrixElement, SparseMatrix};
use anyhow::Result;
use std::collections::VecDeque;

/// Breadth-first connected components over edges with distance within the
/// threshold.
pub struct SingleLinkageBfs;

impl<E: MatrixElement> Clustering<E> for SingleLinkageBfs {
    fn run(
        &mut self,
        matrix: &mut SparseMatrix<E>,
        objects: &[u32],
        threshold: f64,
        assignments: &mut Vec<u32>,
    ) -> Result<usize> {
        assignments.clear();
        assignments.resize(objects.len(), UNASSIGNED);

        let mut cluster = 0u32;
        let mut queue = VecDeque::new();

        for &obj in objects {
            if assignments[obj as usize] != UNASSIGNED {
                continue;
            }
            queue.push_back(obj);
            while let Some(node) = queue.pop_front() {
                if assignments[node as usize] != UNASSIGNED {
                    continue;
                }
                assignments[node as usize] = cluster;
                for e in matrix.neighbors(node as usize) {
                    if e.d() <= threshold && assignments[e.id() as usize] == UNASSIGNED {
                        queue.push_back(e.id());
                    }
                }
            }
            cluster += 1;
        }

        Ok(cluster as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::matrix::DistEntry;

    #[test]
    fn test_chain_is_one_cluster() {
        let mut m: SparseMatrix<DistEntry> =
            SparseMatrix::from_symmetric_edges(4, [(0, 1, 0.1), (1, 2, 0.1), (2, 3, 0.1)]);
        let objects: Vec<u32> = (0..4).collect();
        let mut assignments = Vec::new();
        let n = SingleLinkageBfs
            .run(&mut m, &objects, 0.5, &mut assignments)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(assignments, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_threshold_splits_components() {
        let mut m: SparseMatrix<DistEntry> =
            SparseMatrix::from_symmetric_edges(4, [(0, 1, 0.1), (1, 2, 0.9), (2, 3, 0.1)]);
        let objects: Vec<u32> = (0..4).collect();
        let mut assignments = Vec::new();
        let n = SingleLinkageBfs
            .run(&mut m, &objects, 0.5, &mut assignments)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(assignments[0], assignments[1]);
        assert_eq!(assignments[2], assignments[3]);
        assert_ne!(assignments[0], assignments[2]);
    }
}
