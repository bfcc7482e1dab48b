/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Greedy incremental clustering à la CD-HIT.

use super::{Clustering, UNASSIGNED};
use crate::graphs::matrix::{MatrixElement, SparseMatrix};
use anyhow::Result;

/// Walks the objects in representativeness order; every unassigned object
/// seeds a cluster and claims its still-unassigned neighbors within the
/// threshold. Claims do not cascade.
pub struct CdHit;

impl<E: MatrixElement> Clustering<E> for CdHit {
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
        for &obj in objects {
            if assignments[obj as usize] == UNASSIGNED {
                assignments[obj as usize] = cluster;
                for e in matrix.neighbors(obj as usize) {
                    if e.d() <= threshold && assignments[e.id() as usize] == UNASSIGNED {
                        assignments[e.id() as usize] = cluster;
                    }
                }
                cluster += 1;
            }
        }

        Ok(cluster as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::matrix::DistEntry;

    #[test]
    fn test_no_cascading() {
        // A-B and B-C: C cannot join through the already-assigned B
        let mut m: SparseMatrix<DistEntry> =
            SparseMatrix::from_symmetric_edges(3, [(0, 1, 0.1), (1, 2, 0.1)]);
        let objects: Vec<u32> = (0..3).collect();
        let mut assignments = Vec::new();
        let n = CdHit.run(&mut m, &objects, 0.5, &mut assignments).unwrap();
        assert_eq!(n, 2);
        assert_eq!(assignments, vec![0, 0, 1]);
    }
}
