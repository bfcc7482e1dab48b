/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Rendering of cluster assignments.
//!
//! Clusters are relabeled so that the largest cluster gets id 0 (ties
//! broken stably by original id); rows are emitted with clusters in
//! ascending new-id order and, within a cluster, in the externally
//! specified object order when an objects file was loaded, in ascending
//! identifier order otherwise. The representative of a cluster is its
//! first object in the emitted order.

use crate::utils::text::{Column, TableWriter};
use anyhow::{bail, Result};
use std::io::Write;

/// Computes the old→new cluster id mapping that relabels clusters by
/// decreasing size, stably by original id.
pub fn sort_clusters_by_size(assignments: &[u32]) -> Vec<u32> {
    let Some(&max) = assignments.iter().max() else {
        return Vec::new();
    };
    let n_clusters = max as usize + 1;

    let mut clusters_and_sizes: Vec<(u32, usize)> =
        (0..n_clusters as u32).map(|c| (c, 0)).collect();
    for &a in assignments {
        clusters_and_sizes[a as usize].1 += 1;
    }
    // sort_by is stable, so equal sizes keep ascending original ids
    clusters_and_sizes.sort_by(|p, q| q.1.cmp(&p.1));

    let mut old2new = vec![0u32; n_clusters];
    for (new_id, &(old_id, _)) in clusters_and_sizes.iter().enumerate() {
        old2new[old_id as usize] = new_id as u32;
    }
    old2new
}

/// Replaces cluster ids by the representative object of each cluster: the
/// first object of the cluster in `rows`, which must already be in final
/// emission order.
pub(crate) fn fill_representatives<O: Copy>(rows: &[(O, u32)]) -> Vec<(O, O)> {
    let mut out = Vec::with_capacity(rows.len());
    let Some(&(first, mut cluster)) = rows.first() else {
        return out;
    };
    let mut representative = first;
    for &(object, c) in rows {
        if c != cluster {
            cluster = c;
            representative = object;
        }
        out.push((object, representative));
    }
    out
}

/// Writes `object<sep>cluster` rows through the buffered table writer.
pub(crate) fn write_pairs<W: Write, A: Column, B: Column>(
    out: W,
    rows: &[(A, B)],
    separator: u8,
) -> Result<()> {
    let mut writer = TableWriter::new(out, separator);
    writer.header(&["object", "cluster"])?;
    for (object, cluster) in rows {
        writer.pair(object, cluster)?;
    }
    writer.finish()?;
    Ok(())
}

/// Common rendering path when an objects file dictates the order.
///
/// `lookup` maps (row index in the objects file, object name) to the local
/// index in the graph, if any. Objects absent from the graph are emitted
/// at the end, each as a singleton with a fresh id; the total number of
/// clusters including those singletons is returned.
pub(crate) fn save_with_external<W, L>(
    out: W,
    names: &[String],
    assignments: &[u32],
    old2new: &[u32],
    lookup: L,
    separator: u8,
    representatives: bool,
) -> Result<usize>
where
    W: Write,
    L: Fn(usize, &str) -> Option<u32>,
{
    let mut singleton_id = old2new.len() as u32;
    let mut entries: Vec<(&str, u32, usize)> = vec![("", 0, 0); names.len()];
    let mut inside = 0usize;
    let mut outside = assignments.len();

    for (gi, name) in names.iter().enumerate() {
        match lookup(gi, name) {
            Some(local_id) => {
                entries[inside] = (name, old2new[assignments[local_id as usize] as usize], gi);
                inside += 1;
            }
            None => {
                if outside >= entries.len() {
                    bail!("names mismatch between distance and objects files");
                }
                entries[outside] = (name, singleton_id, gi);
                singleton_id += 1;
                outside += 1;
            }
        }
    }
    if inside != assignments.len() {
        bail!("names mismatch between distance and objects files");
    }

    // inside part: ascending by cluster, then by objects-file position
    entries[..inside].sort_by(|p, q| (p.1, p.2).cmp(&(q.1, q.2)));

    let rows: Vec<(&str, u32)> = entries.iter().map(|&(name, cluster, _)| (name, cluster)).collect();
    if representatives {
        write_pairs(out, &fill_representatives(&rows), separator)?;
    } else {
        write_pairs(out, &rows, separator)?;
    }

    Ok(singleton_id as usize)
}
