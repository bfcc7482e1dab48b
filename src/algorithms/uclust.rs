/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Greedy star clustering à la UCLUST.

use super::Clustering;
use crate::graphs::matrix::{MatrixElement, SparseMatrix};
use anyhow::Result;
use std::collections::HashMap;

/// The first object always seeds cluster 0. Every further object joins
/// the cluster of its closest already-seeded neighbor if that one lies
/// within the threshold, and becomes a new seed otherwise.
///
/// The closest-seed selection scans the whole neighbor list; with sorted
/// rows, ties on the distance go to the smaller neighbor index.
pub struct UClust;

impl<E: MatrixElement> Clustering<E> for UClust {
    fn run(
        &mut self,
        matrix: &mut SparseMatrix<E>,
        objects: &[u32],
        threshold: f64,
        assignments: &mut Vec<u32>,
    ) -> Result<usize> {
        assignments.clear();
        assignments.resize(objects.len(), 0);
        if objects.is_empty() {
            return Ok(0);
        }

        let mut seeds2clusters: HashMap<u32, u32> = HashMap::new();

        let first = objects[0];
        assignments[first as usize] = 0;
        seeds2clusters.insert(first, 0);

        for &obj in &objects[1..] {
            let mut closest: Option<(u32, f64)> = None;
            for e in matrix.neighbors(obj as usize) {
                if seeds2clusters.contains_key(&e.id())
                    && closest.map_or(true, |(_, d)| e.d() < d)
                {
                    closest = Some((e.id(), e.d()));
                }
            }

            match closest {
                Some((seed, d)) if d <= threshold => {
                    assignments[obj as usize] = seeds2clusters[&seed];
                }
                _ => {
                    let cluster = seeds2clusters.len() as u32;
                    seeds2clusters.insert(obj, cluster);
                    assignments[obj as usize] = cluster;
                }
            }
        }

        Ok(seeds2clusters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::matrix::DistEntry;

    #[test]
    fn test_closest_seed_pick() {
        // A-B at 0.4, A-C at 0.2, threshold 0.3: B becomes a seed, C
        // joins A
        let mut m: SparseMatrix<DistEntry> =
            SparseMatrix::from_symmetric_edges(3, [(0, 1, 0.4), (0, 2, 0.2)]);
        let objects: Vec<u32> = (0..3).collect();
        let mut assignments = Vec::new();
        let n = UClust.run(&mut m, &objects, 0.3, &mut assignments).unwrap();
        assert_eq!(n, 2);
        assert_eq!(assignments, vec![0, 1, 0]);
    }

    #[test]
    fn test_prefers_nearest_seed() {
        // both 0 and 1 are seeds; 2 is adjacent to both but closer to 1
        let mut m: SparseMatrix<DistEntry> =
            SparseMatrix::from_symmetric_edges(3, [(0, 1, 0.9), (0, 2, 0.3), (1, 2, 0.1)]);
        let objects: Vec<u32> = (0..3).collect();
        let mut assignments = Vec::new();
        let n = UClust.run(&mut m, &objects, 0.5, &mut assignments).unwrap();
        assert_eq!(n, 2);
        assert_eq!(assignments, vec![0, 1, 1]);
    }
}
