/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Agglomerative linkage over an integrated sparse-matrix / indexed-heap
//! structure.
//!
//! The structure couples an outer vector of open-addressed row maps, an
//! indexed binary min-heap whose nodes carry their own position, and a
//! slab arena owning the shared elements: for every matrix cell (i, j)
//! with i < j exactly one element exists, referenced by row i under key j,
//! by row j under key i, and by the heap. A merge step pops the global
//! minimum, builds the merged row by aggregating the two parent rows, and
//! recycles the parents' heap slots in place instead of popping and
//! re-pushing, so the heap size stays bounded by the running number of
//! matrix cells.

mod dendrogram;
mod heap;
mod row_map;

pub use dendrogram::{Dendrogram, Merge};

use self::heap::IndexedHeap;
use self::row_map::RowMap;
use super::Clustering;
use crate::graphs::matrix::{MatrixElement, SparseMatrix};
use crate::utils::arena::{ElemId, ElementArena};
use anyhow::Result;
use dsi_progress_logger::prelude::*;

/// A cell of the upper-triangular matrix, simultaneously a heap node.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Element {
    pub value: f64,
    pub row: u32,
    pub col: u32,
    /// Position in the heap; maintained under every swap.
    pub heap_pos: u32,
}

pub(crate) const NO_POS: u32 = u32::MAX;

impl Element {
    /// Total order: by value, then row, then column.
    #[inline(always)]
    pub fn less(&self, other: &Element) -> bool {
        match self.value.total_cmp(&other.value) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => (self.row, self.col) < (other.row, other.col),
        }
    }
}

/// How two parent distances to a common neighbor combine; a missing
/// counterpart enters as `f64::MAX`, and aggregations yielding `f64::MAX`
/// are not materialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    /// Single linkage.
    Min,
    /// Complete linkage: neighbors unknown to either parent stay unknown,
    /// so merged rows shrink to the intersection.
    Max,
}

impl Aggregation {
    #[inline(always)]
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Aggregation::Min => a.min(b),
            Aggregation::Max => a.max(b),
        }
    }
}

/// The matrix-plus-heap state of one agglomeration.
struct HeapMatrix {
    /// Row maps indexed by group id; `None` marks removed or never-created
    /// rows.
    rows: Vec<Option<RowMap>>,
    arena: ElementArena<Element>,
    heap: IndexedHeap,
}

impl HeapMatrix {
    fn new() -> Self {
        HeapMatrix {
            rows: Vec::new(),
            arena: ElementArena::new(),
            heap: IndexedHeap::new(),
        }
    }

    fn ensure_row(&mut self, w: usize) {
        if w >= self.rows.len() {
            let new_len = ((w + 1).max(16) * 6) / 5;
            self.rows.resize_with(new_len, || None);
        }
        if self.rows[w].is_none() {
            self.rows[w] = Some(RowMap::new());
        }
    }

    fn exists_cell(&self, w: usize, k: usize) -> bool {
        match self.rows.get(w) {
            Some(Some(map)) => map.find(k as u64).is_some(),
            _ => false,
        }
    }

    /// Registers cell (w, k); later insertions of the same cell are
    /// ignored.
    fn add_value(&mut self, w: usize, k: usize, value: f64) {
        let (w, k) = (w.min(k), w.max(k));
        if self.exists_cell(w, k) {
            return;
        }
        self.ensure_row(w);
        self.ensure_row(k);
        let id = self.arena.alloc(Element {
            value,
            row: w as u32,
            col: k as u32,
            heap_pos: NO_POS,
        });
        self.rows[w].as_mut().unwrap().insert(k as u64, id);
        self.rows[k].as_mut().unwrap().insert(w as u64, id);
        self.heap.push_unordered(id);
    }

    /// Moves the adjacency into the structure, destroying its rows as they
    /// are consumed, then heapifies.
    fn load<E: MatrixElement>(&mut self, matrix: &mut SparseMatrix<E>) {
        self.heap
            .reserve(matrix.num_elements() + matrix.num_elements() / 10);
        for i in 0..matrix.num_objects() {
            let row = matrix.clear_row(i);
            for e in &row {
                if e.d() < f64::MAX && e.id() as usize != i {
                    self.add_value(i, e.id() as usize, e.d());
                }
            }
        }
        self.heap.rebuild(&mut self.arena);
    }
}

/// Runs the merge loop to exhaustion, recording merges in `dendro`.
fn agglomerate(
    hm: &mut HeapMatrix,
    aggregation: Aggregation,
    dendro: &mut Dendrogram,
    pl: &mut impl ProgressLog,
) {
    let mut merged_column: Vec<ElemId> = Vec::new();
    let mut insert_buffer: Vec<ElemId> = Vec::new();

    while let Some(min_id) = hm.heap.top() {
        // read the minimum but leave it in place: it is torn down with
        // its rows below
        let (mut r, mut c, delta) = {
            let e = hm.arena.get(min_id);
            (e.row as usize, e.col as usize, e.value)
        };
        if r > c {
            std::mem::swap(&mut r, &mut c);
        }
        let next_id = dendro.next_id();
        dendro.push(r as u32, c as u32, delta);

        merged_column.clear();
        insert_buffer.clear();
        let mut merged_row = RowMap::new();

        {
            let HeapMatrix { rows, arena, .. } = &mut *hm;
            let row_r = rows[r].as_ref().expect("merging a removed row");
            let row_c = rows[c].as_ref().expect("merging a removed row");

            for (k, e_rk) in row_r.iter() {
                if k == c as u64 {
                    continue;
                }
                let v_rk = arena.get(e_rk).value;
                let merged = match row_c.find(k) {
                    Some(e_ck) => aggregation.apply(v_rk, arena.get(e_ck).value),
                    None => aggregation.apply(v_rk, f64::MAX),
                };
                if merged != f64::MAX {
                    let id = arena.alloc(Element {
                        value: merged,
                        row: k as u32,
                        col: next_id as u32,
                        heap_pos: NO_POS,
                    });
                    insert_buffer.push(id);
                    merged_row.insert(k, id);
                    merged_column.push(id);
                }
            }

            // neighbors of c with no counterpart in r (common ones were
            // merged above)
            for (k, e_ck) in row_c.iter() {
                if k == r as u64 || row_r.find(k).is_some() {
                    continue;
                }
                let merged = aggregation.apply(f64::MAX, arena.get(e_ck).value);
                if merged != f64::MAX {
                    let id = arena.alloc(Element {
                        value: merged,
                        row: k as u32,
                        col: next_id as u32,
                        heap_pos: NO_POS,
                    });
                    insert_buffer.push(id);
                    merged_row.insert(k, id);
                    merged_column.push(id);
                }
            }
        }

        // install the merged row and the mirrored column entries
        hm.ensure_row(next_id);
        hm.rows[next_id] = Some(merged_row);
        for &id in &merged_column {
            let row = hm.arena.get(id).row as usize;
            let col = hm.arena.get(id).col as u64;
            hm.rows[row].as_mut().expect("missing mirror row").insert(col, id);
        }

        // tear down rows r and c: recycle their heap slots for the new
        // elements, clean the mirrored column entries, free the elements
        for row_id in [r, c] {
            if let Some(Some(map)) = hm.rows.get(row_id) {
                map.prefetch();
            }
            let old = hm.rows[row_id].take().expect("tearing down a removed row");
            let HeapMatrix { rows, arena, heap } = &mut *hm;
            for (k, p) in old.iter() {
                if let Some(new_id) = insert_buffer.pop() {
                    heap.replace(arena, p, new_id);
                } else {
                    heap.remove(arena, p);
                }
                if let Some(map) = rows[k as usize].as_mut() {
                    map.erase(row_id as u64);
                }
                arena.free(p);
            }
        }

        // whatever the recycling did not place goes through a regular
        // insertion
        for id in insert_buffer.drain(..) {
            hm.heap.insert(&mut hm.arena, id);
        }

        pl.light_update();
    }
}

/// Agglomerative linkage driven by the heap-matrix structure.
///
/// The aggregation rule decides the flavor; in practice the structure is
/// used for complete linkage, single linkage being served much more
/// cheaply by [`SingleLinkageBfs`](super::SingleLinkageBfs).
pub struct Linkage {
    aggregation: Aggregation,
}

impl Linkage {
    pub fn new(aggregation: Aggregation) -> Self {
        Linkage { aggregation }
    }

    pub fn complete() -> Self {
        Self::new(Aggregation::Max)
    }

    pub fn single() -> Self {
        Self::new(Aggregation::Min)
    }

    /// Consumes the adjacency and builds the full merge forest over
    /// `n_objects` leaves.
    pub fn dendrogram<E: MatrixElement>(
        &self,
        matrix: &mut SparseMatrix<E>,
        n_objects: usize,
    ) -> Dendrogram {
        let mut pl = ProgressLogger::default();
        pl.item_name("merges");

        log::debug!("Loading distances into the heap-matrix structure");
        let mut hm = HeapMatrix::new();
        hm.load(matrix);

        pl.start("Performing linkage");
        let mut dendro = Dendrogram::new(n_objects);
        agglomerate(&mut hm, self.aggregation, &mut dendro, &mut pl);
        pl.done();

        hm.arena.release();
        dendro
    }
}

impl<E: MatrixElement> Clustering<E> for Linkage {
    fn run(
        &mut self,
        matrix: &mut SparseMatrix<E>,
        objects: &[u32],
        threshold: f64,
        assignments: &mut Vec<u32>,
    ) -> Result<usize> {
        let dendro = self.dendrogram(matrix, objects.len());
        assignments.clear();
        assignments.resize(objects.len(), 0);
        Ok(dendro.cut(threshold, assignments))
    }
}
