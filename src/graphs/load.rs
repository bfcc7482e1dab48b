/*
 * SPDX-FileCopyrightText: 2024 Tommaso Fontana
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The pipelined, multithreaded graph loader.
//!
//! The input stream is processed by four thread classes connected by
//! bounded channels:
//!
//! 1. the *loader* (running on the calling thread) fills large input
//!    buffers drawn from a pool, trimming each block back to the last
//!    newline and carrying the tail into the next buffer;
//! 2. the *parsers* split blocks into lines, apply column filters and the
//!    distance transformation, and emit collections of raw edges;
//! 3. the *mapper* consumes collections in input order (identifier
//!    allocation must be deterministic), resolves raw identifiers to dense
//!    local indices, extends the adjacency while the updaters are
//!    quiescent, and broadcasts each collection to every updater;
//! 4. the *updaters* append edges to the rows of their residue class
//!    modulo the number of updaters, so that every row has exactly one
//!    writer and the hot path needs no synchronization.
//!
//! Buffers and edge collections rotate through free-pool channels;
//! dropping the senders of a queue is the completion signal. A parser
//! failure travels to the mapper as a portion payload, and from there
//! tears the pipeline down; the first error is reported after all workers
//! have been joined.

use crate::graphs::matrix::MatrixElement;
use crate::utils::sync::{OrderedReceiver, Semaphore};
use crate::utils::text;
use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::bounded;
use dsi_progress_logger::prelude::*;
use std::cell::UnsafeCell;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};

/// Default input buffer size (128 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 128 << 20;

/// An inclusive acceptance interval over a numeric column.
#[derive(Clone, Copy, Debug)]
pub struct ColumnFilter {
    pub min: f64,
    pub max: f64,
}

impl Default for ColumnFilter {
    fn default() -> Self {
        ColumnFilter {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }
}

/// How the value of the distance column maps to a distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DistanceTransform {
    /// The column already contains distances.
    #[default]
    Distance,
    /// The column contains similarities in [0, 1]; distance is `1 − x`.
    Similarity,
    /// The column contains percent similarities in [0, 100]; distance is
    /// `1 − x/100`.
    PercentSimilarity,
}

impl DistanceTransform {
    #[inline(always)]
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            DistanceTransform::Distance => value,
            DistanceTransform::Similarity => 1.0 - value,
            DistanceTransform::PercentSimilarity => 1.0 - value * 0.01,
        }
    }
}

/// Configuration of a graph load.
#[derive(Clone, Debug)]
pub struct LoadConfig {
    /// Names of the two identifier columns; defaults to the first two
    /// columns.
    pub id_columns: Option<(String, String)>,
    /// Name of the distance column; defaults to the third column.
    pub distance_column: Option<String>,
    pub transform: DistanceTransform,
    /// Filters keyed by column name; naming a column absent from the
    /// header fails the load.
    pub filters: BTreeMap<String, ColumnFilter>,
    pub num_threads: usize,
    pub buffer_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            id_columns: None,
            distance_column: None,
            transform: DistanceTransform::Distance,
            filters: BTreeMap::new(),
            num_threads: 4,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Per-column predicate resolved against the header.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Filter {
    pub min: f64,
    pub max: f64,
    pub enabled: bool,
}

/// Column roles resolved from the header line.
pub(crate) struct Header {
    pub id_cols: [usize; 2],
    pub dist_col: usize,
    /// One entry per column; disabled filters have infinite bounds.
    pub filters: Vec<Filter>,
}

#[inline(always)]
fn is_newline(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

/// Tokenizes the header line and resolves column roles.
pub(crate) fn process_header(line: &str, config: &LoadConfig) -> Result<Header> {
    let columns: Vec<&str> = line
        .split(|c| c == ',' || c == '\t' || c == ' ' || c == '\r' || c == '\n')
        .filter(|s| !s.is_empty())
        .collect();

    if columns.len() < 3 {
        bail!("error loading distances: at least three columns are required");
    }

    let mut id_cols = [0usize, 1];
    let mut dist_col = 2;

    if let Some((first, second)) = &config.id_columns {
        let c0 = columns.iter().position(|&c| c == first.as_str());
        let c1 = columns.iter().position(|&c| c == second.as_str());
        match (c0, c1) {
            (Some(c0), Some(c1)) => {
                id_cols = [c0.min(c1), c0.max(c1)];
            }
            _ => bail!("error loading distances: id columns not found"),
        }
    }

    if let Some(name) = &config.distance_column {
        dist_col = columns
            .iter()
            .position(|&c| c == name.as_str())
            .ok_or_else(|| anyhow!("error loading distances: {} column not found", name))?;
    }

    let mut filters = vec![
        Filter {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            enabled: false
        };
        columns.len()
    ];
    for (name, filter) in &config.filters {
        let col = columns
            .iter()
            .position(|&c| c == name.as_str())
            .ok_or_else(|| anyhow!("error loading distances: {} column not found", name))?;
        filters[col] = Filter {
            min: filter.min,
            max: filter.max,
            enabled: true,
        };
    }

    Ok(Header {
        id_cols,
        dist_col,
        filters,
    })
}

/// Maps raw identifiers of one flavor (names or non-negative integers) to
/// dense local indices.
///
/// The two implementations share this single contract; the pipeline is
/// generic over it.
pub(crate) trait IdResolver: Send {
    /// Raw edge record accumulated by the parsers.
    type Edge: Copy + Send + Sync;

    /// True if the parser copies identifiers out of the input buffer, so
    /// that buffers can be recycled right after parsing; otherwise the
    /// mapper returns the buffer after resolution.
    const PARSER_RELEASES_BUFFER: bool;

    /// Parses a block of complete lines, accumulating accepted edges.
    /// Returns the number of data rows seen (accepted or not).
    fn parse_block(
        header: &Header,
        transform: DistanceTransform,
        block: &[u8],
        edges: &mut Vec<Self::Edge>,
    ) -> Result<u64>;

    /// Resolves the raw identifiers of `edges` to local indices,
    /// allocating new indices in order of first appearance.
    fn resolve(&mut self, edges: &mut [Self::Edge]);

    /// Number of local indices allocated so far.
    fn num_locals(&self) -> usize;

    /// Endpoints and distance of a resolved edge.
    fn endpoints(edge: &Self::Edge) -> (u32, u32, f64);
}

fn row_error(row: u64, line: &[u8]) -> String {
    let prefix = &line[..line.len().min(50)];
    format!(
        "ill-formatted input table in row {}: {:?}",
        row,
        String::from_utf8_lossy(prefix)
    )
}

/// Walks a block line by line, splitting fields on tab or comma, applying
/// filters and the distance transformation, and calling `emit` with the
/// two raw identifier fields and the transformed distance of every
/// accepted row.
///
/// Returns the number of data rows seen. Rows failing a filter are
/// skipped silently; rows with a wrong column count or an unparseable
/// numeric field fail the whole block.
pub(crate) fn parse_block_lines<F>(
    header: &Header,
    transform: DistanceTransform,
    block: &[u8],
    mut emit: F,
) -> Result<u64>
where
    F: FnMut(&[u8], &[u8], f64) -> Result<()>,
{
    let n_columns = header.filters.len();
    let mut n_rows = 0u64;
    let mut pos = 0;

    while pos < block.len() {
        while pos < block.len() && is_newline(block[pos]) {
            pos += 1;
        }
        if pos == block.len() {
            break;
        }
        let line_start = pos;
        while pos < block.len() && !is_newline(block[pos]) {
            pos += 1;
        }
        let line = &block[line_start..pos];
        n_rows += 1;

        let mut ids: [&[u8]; 2] = [b"", b""];
        let mut k = 0usize;
        let mut d = f64::MAX;
        let mut filtered = false;
        let mut c = 0usize;

        for field in line.split(|&b| b == b'\t' || b == b',') {
            if c == n_columns {
                bail!(row_error(n_rows, line));
            }
            if k < 2 && c == header.id_cols[k] {
                ids[k] = field;
                k += 1;
            } else if c == header.dist_col || header.filters[c].enabled {
                let (value, _) =
                    text::parse_f64(field).ok_or_else(|| anyhow!(row_error(n_rows, line)))?;
                if c == header.dist_col {
                    d = transform.apply(value);
                }
                let filter = &header.filters[c];
                if value < filter.min || value > filter.max {
                    filtered = true;
                    break;
                }
            }
            c += 1;
        }

        if filtered {
            continue;
        }
        if c != n_columns {
            bail!(row_error(n_rows, line));
        }
        if let Err(e) = emit(ids[0], ids[1], d) {
            return Err(e.context(row_error(n_rows, line)));
        }
    }

    Ok(n_rows)
}

/// A pooled input buffer.
///
/// `data[..filled]` is the content (carried tail plus freshly read
/// bytes); `data[..valid]` is the parseable prefix, which ends on a line
/// boundary except for the final block of the stream.
struct InputBuffer {
    data: Box<[u8]>,
    filled: usize,
    valid: usize,
}

impl InputBuffer {
    fn new(size: usize) -> Self {
        InputBuffer {
            data: vec![0u8; size].into_boxed_slice(),
            filled: 0,
            valid: 0,
        }
    }
}

struct ParseTask {
    buf: InputBuffer,
    portion: usize,
}

/// A parsed portion travelling from a parser to the mapper.
struct Portion<T> {
    edges: Vec<T>,
    /// Present when the parser deferred the buffer hand-back (the edges
    /// still reference identifier bytes inside it).
    buf: Option<InputBuffer>,
}

/// The adjacency rows under construction, shared between the mapper and
/// the updaters. Each row sits in its own cell, so writers of different
/// rows never materialize overlapping references.
///
/// # Safety
///
/// [`extend_to`](RowCell::extend_to) may only be called while no updater
/// is processing a portion (the mapper enforces this through the
/// active-updaters semaphore). [`push_row`](RowCell::push_row) may only be
/// called by the single updater owning the row's residue class. Under this
/// discipline every row has exactly one writer at any time, and the outer
/// vector is never resized while anybody holds a reference into it.
struct RowCell<E> {
    rows: UnsafeCell<Vec<UnsafeCell<Vec<E>>>>,
}

unsafe impl<E: Send> Sync for RowCell<E> {}

impl<E> RowCell<E> {
    fn new() -> Self {
        RowCell {
            rows: UnsafeCell::new(Vec::new()),
        }
    }

    /// Extends the outer vector to `n` rows.
    ///
    /// # Safety
    ///
    /// Caller must guarantee that no other thread is accessing the rows.
    unsafe fn extend_to(&self, n: usize) {
        let rows = &mut *self.rows.get();
        if n > rows.len() {
            rows.resize_with(n, || UnsafeCell::new(Vec::new()));
        }
    }

    /// Appends `e` to row `i`, growing the row by a factor of 1.5 from an
    /// initial capacity of 16.
    ///
    /// # Safety
    ///
    /// Caller must be the unique writer of row `i`, and the outer vector
    /// must not be concurrently resized.
    unsafe fn push_row(&self, i: usize, e: E) {
        let outer = &*self.rows.get();
        let row = &mut *outer[i].get();
        if row.len() == row.capacity() {
            let additional = if row.capacity() == 0 {
                16
            } else {
                (row.capacity() + 1) / 2
            };
            row.reserve_exact(additional);
        }
        row.push(e);
    }

    fn into_inner(self) -> Vec<Vec<E>> {
        self.rows
            .into_inner()
            .into_iter()
            .map(|cell| cell.into_inner())
            .collect()
    }
}

/// Runs the loader pipeline over the body of the input (the header line
/// must have been consumed already).
///
/// Returns the built rows (unsorted, mirrored, possibly with duplicates)
/// and the total number of data rows observed before filtering.
pub(crate) fn run_pipeline<R, V, E>(
    reader: &mut R,
    header: &Header,
    transform: DistanceTransform,
    ids: &mut V,
    num_threads: usize,
    buffer_size: usize,
) -> Result<(Vec<Vec<E>>, u64)>
where
    R: BufRead,
    V: IdResolver,
    E: MatrixElement,
{
    let t = num_threads.max(4);
    let n_parsers = ((t - 2) / 2).max(1);
    let n_updaters = ((t - 2) / 2).max(1);
    let n_buffers = n_parsers + 2;
    let edges_prealloc = (buffer_size / 64).max(16);

    let rows = RowCell::<E>::new();
    let total_rows = AtomicU64::new(0);
    let sem = Semaphore::new();
    let barrier = Barrier::new(n_updaters);

    let (free_buf_tx, free_buf_rx) = bounded::<InputBuffer>(n_buffers);
    let (free_col_tx, free_col_rx) = bounded::<Vec<V::Edge>>(n_buffers);
    let (task_tx, task_rx) = bounded::<ParseTask>(n_buffers);
    let (mapped_tx, mapped_rx) = bounded::<(usize, Result<Portion<V::Edge>>)>(n_buffers);

    for _ in 0..n_buffers {
        free_buf_tx.send(InputBuffer::new(buffer_size)).unwrap();
        free_col_tx.send(Vec::with_capacity(edges_prealloc)).unwrap();
    }

    let mut updater_txs = Vec::with_capacity(n_updaters);
    let mut updater_rxs = Vec::with_capacity(n_updaters);
    for _ in 0..n_updaters {
        let (tx, rx) = bounded::<Arc<Vec<V::Edge>>>(1);
        updater_txs.push(tx);
        updater_rxs.push(rx);
    }

    let loader_result = std::thread::scope(|s| -> Result<()> {
        // parsers
        let mut workers = Vec::new();
        for _ in 0..n_parsers {
            let task_rx = task_rx.clone();
            let free_col_rx = free_col_rx.clone();
            let free_buf_tx = free_buf_tx.clone();
            let mapped_tx = mapped_tx.clone();
            let total_rows = &total_rows;
            workers.push(s.spawn(move || -> Result<()> {
                loop {
                    let mut edges = match free_col_rx.recv() {
                        Ok(v) => v,
                        Err(_) => break,
                    };
                    let ParseTask { buf, portion } = match task_rx.recv() {
                        Ok(t) => t,
                        Err(_) => break,
                    };
                    edges.clear();
                    match V::parse_block(header, transform, &buf.data[..buf.valid], &mut edges)
                    {
                        Ok(rows_seen) => {
                            total_rows.fetch_add(rows_seen, Ordering::Relaxed);
                            let buf = if V::PARSER_RELEASES_BUFFER {
                                let _ = free_buf_tx.send(buf);
                                None
                            } else {
                                Some(buf)
                            };
                            if mapped_tx.send((portion, Ok(Portion { edges, buf }))).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = mapped_tx.send((
                                portion,
                                Err(e.context(format!("in input portion {}", portion))),
                            ));
                            break;
                        }
                    }
                }
                Ok(())
            }));
        }

        // mapper
        {
            let rows = &rows;
            let sem = &sem;
            let free_buf_tx = free_buf_tx.clone();
            let updater_txs = std::mem::take(&mut updater_txs);
            let ids = &mut *ids;
            workers.push(s.spawn(move || -> Result<()> {
                let mut ordered = OrderedReceiver::new(mapped_rx);
                let mut pl = ProgressLogger::default();
                pl.display_memory(true).item_name("edges");
                pl.start("Loading pairwise distances");
                while let Some(res) = ordered.recv() {
                    let Portion { mut edges, buf } = res?;
                    let n_edges = edges.len();
                    ids.resolve(&mut edges);

                    // wait with the extension until the updaters finish
                    // the previous portion
                    sem.wait_zero();
                    unsafe {
                        rows.extend_to(ids.num_locals());
                    }

                    sem.add(updater_txs.len());
                    let shared = Arc::new(edges);
                    let mut stopped = false;
                    for tx in &updater_txs {
                        if tx.send(shared.clone()).is_err() {
                            stopped = true;
                            break;
                        }
                    }
                    drop(shared);
                    if let Some(buf) = buf {
                        let _ = free_buf_tx.send(buf);
                    }
                    pl.update_with_count(n_edges);
                    if stopped {
                        break;
                    }
                }
                pl.done();
                Ok(())
            }));
        }

        // updaters
        for (tid, rx) in updater_rxs.drain(..).enumerate() {
            let rows = &rows;
            let sem = &sem;
            let barrier = &barrier;
            let free_col_tx = free_col_tx.clone();
            workers.push(s.spawn(move || -> Result<()> {
                while let Ok(shared) = rx.recv() {
                    for e in shared.iter() {
                        let (u, v, d) = V::endpoints(e);
                        if u == v {
                            continue;
                        }
                        if !(d < f64::MAX) {
                            continue;
                        }
                        let (u, v) = (u as usize, v as usize);
                        if u % n_updaters == tid {
                            unsafe {
                                rows.push_row(u, E::new(v as u32, d));
                            }
                        }
                        if v % n_updaters == tid {
                            unsafe {
                                rows.push_row(v, E::new(u as u32, d));
                            }
                        }
                    }
                    if tid == 0 {
                        sem.dec();
                        barrier.wait();
                        // everybody else dropped their handle before the
                        // barrier
                        if let Ok(mut edges) = Arc::try_unwrap(shared) {
                            edges.clear();
                            let _ = free_col_tx.send(edges);
                        }
                    } else {
                        drop(shared);
                        sem.dec();
                        barrier.wait();
                    }
                }
                Ok(())
            }));
        }

        // the calling thread is the loader
        drop(task_rx);
        drop(free_col_rx);
        drop(mapped_tx);
        drop(free_buf_tx);
        drop(free_col_tx);

        let loader_result = (|| -> Result<()> {
            let mut portion = 0usize;
            let mut buf = match free_buf_rx.recv() {
                Ok(b) => b,
                Err(_) => return Ok(()),
            };
            loop {
                let mut filled = buf.filled;
                let mut eof = false;
                while filled < buf.data.len() {
                    let n = reader
                        .read(&mut buf.data[filled..])
                        .context("error reading the distance file")?;
                    if n == 0 {
                        eof = true;
                        break;
                    }
                    filled += n;
                }
                buf.filled = filled;

                if eof {
                    buf.valid = filled;
                    if buf.valid > 0 {
                        let _ = task_tx.send(ParseTask { buf, portion });
                    }
                    return Ok(());
                }

                let last_newline = match buf.data[..filled].iter().rposition(|&b| is_newline(b)) {
                    Some(p) => p,
                    None => bail!(
                        "input row longer than the {} B read buffer",
                        buf.data.len()
                    ),
                };
                buf.valid = last_newline + 1;
                let tail = filled - buf.valid;

                let mut next = match free_buf_rx.recv() {
                    Ok(b) => b,
                    Err(_) => return Ok(()),
                };
                next.data[..tail].copy_from_slice(&buf.data[buf.valid..filled]);
                next.filled = tail;
                next.valid = 0;

                if task_tx.send(ParseTask { buf, portion }).is_err() {
                    return Ok(());
                }
                portion += 1;
                buf = next;
            }
        })();
        drop(task_tx);
        drop(free_buf_rx);

        // join everybody; the first worker error wins over a loader error
        let mut first_err = None;
        for worker in workers {
            if let Err(e) = worker.join().expect("loader worker panicked") {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => loader_result,
        }
    });

    loader_result?;

    Ok((rows.into_inner(), total_rows.load(Ordering::Relaxed)))
}
