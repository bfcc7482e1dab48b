/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Greedy set cover clustering.

use super::{Clustering, UNASSIGNED};
use crate::graphs::matrix::{MatrixElement, SparseMatrix};
use anyhow::Result;

/// Processes objects by decreasing degree (stably, so the given object
/// order breaks ties); every unassigned object seeds a cluster and claims
/// all its unassigned neighbors within the threshold.
pub struct SetCover;

impl<E: MatrixElement> Clustering<E> for SetCover {
    fn run(
        &mut self,
        matrix: &mut SparseMatrix<E>,
        objects: &[u32],
        threshold: f64,
        assignments: &mut Vec<u32>,
    ) -> Result<usize> {
        assignments.clear();
        assignments.resize(objects.len(), UNASSIGNED);

        let mut by_degree: Vec<(u32, usize)> = objects
            .iter()
            .map(|&obj| (obj, matrix.num_neighbors(obj as usize)))
            .collect();
        by_degree.sort_by(|p, q| q.1.cmp(&p.1));

        let mut cluster = 0u32;
        for &(obj, _) in &by_degree {
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
