/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Identifier interning: raw names or integers ↔ dense local indices.
//!
//! Both tables assign local indices in strict order of first appearance,
//! which makes identifier allocation deterministic given the input order
//! the mapper sees.

use crate::graphs::load::{parse_block_lines, DistanceTransform, Header, IdResolver};
use crate::utils::chunked_bytes::{ChunkedBytes, NameRef};
use crate::utils::{murmur3_64, text};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};

/// [`Hasher`] feeding byte strings through Murmur3-64.
pub struct Murmur3Hasher(u64);

impl Hasher for Murmur3Hasher {
    #[inline(always)]
    fn write(&mut self, bytes: &[u8]) {
        self.0 = murmur3_64(bytes);
    }

    #[inline(always)]
    fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Default)]
pub struct BuildMurmur3;

impl BuildHasher for BuildMurmur3 {
    type Hasher = Murmur3Hasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        Murmur3Hasher(0)
    }
}

/// An endpoint of a parsed edge: a raw name before resolution, a local
/// index after.
#[derive(Clone, Copy)]
pub(crate) enum End {
    Name(NameRef),
    Local(u32),
}

/// Edge record of the named variant. Name views point into the input
/// buffer that produced them, which the pipeline keeps alive until the
/// mapper has resolved the portion.
#[derive(Clone, Copy)]
pub(crate) struct NamedEdge {
    pub ends: [End; 2],
    pub d: f64,
}

/// String identifiers interned in an open-addressed table keyed by
/// content views, with the bytes copied once into a chunked store.
pub struct NamedIds {
    names2ids: HashMap<NameRef, u32, BuildMurmur3>,
    ids2names: Vec<NameRef>,
    store: ChunkedBytes,
}

impl NamedIds {
    pub fn new() -> Self {
        NamedIds {
            names2ids: HashMap::with_hasher(BuildMurmur3),
            ids2names: Vec::new(),
            store: ChunkedBytes::new(),
        }
    }

    /// Number of distinct identifiers seen.
    pub fn len(&self) -> usize {
        self.ids2names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids2names.is_empty()
    }

    /// Local index of `name`, if registered.
    pub fn get(&self, name: &[u8]) -> Option<u32> {
        self.names2ids.get(&NameRef::new(name)).copied()
    }

    /// The stored name of local index `id`.
    pub fn name(&self, id: u32) -> NameRef {
        self.ids2names[id as usize]
    }
}

impl Default for NamedIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdResolver for NamedIds {
    type Edge = NamedEdge;

    // edges keep views into the input buffer until resolution
    const PARSER_RELEASES_BUFFER: bool = false;

    fn parse_block(
        header: &Header,
        transform: DistanceTransform,
        block: &[u8],
        edges: &mut Vec<NamedEdge>,
    ) -> Result<u64> {
        // self-loops are kept: their identifiers must still be registered
        parse_block_lines(header, transform, block, |a, b, d| {
            edges.push(NamedEdge {
                ends: [End::Name(NameRef::new(a)), End::Name(NameRef::new(b))],
                d,
            });
            Ok(())
        })
    }

    fn resolve(&mut self, edges: &mut [NamedEdge]) {
        for edge in edges {
            for end in &mut edge.ends {
                if let End::Name(name) = *end {
                    let id = match self.names2ids.get(&name) {
                        Some(&id) => id,
                        None => {
                            let stored = self.store.store(name.as_bytes());
                            let id = self.ids2names.len() as u32;
                            self.names2ids.insert(stored, id);
                            self.ids2names.push(stored);
                            id
                        }
                    };
                    *end = End::Local(id);
                }
            }
        }
    }

    fn num_locals(&self) -> usize {
        self.ids2names.len()
    }

    #[inline(always)]
    fn endpoints(edge: &NamedEdge) -> (u32, u32, f64) {
        match (edge.ends[0], edge.ends[1]) {
            (End::Local(u), End::Local(v)) => (u, v, edge.d),
            _ => unreachable!("unresolved edge reached an updater"),
        }
    }
}

/// Edge record of the numbered variant: global identifiers, rewritten to
/// local indices by [`NumberedIds::resolve`].
#[derive(Clone, Copy)]
pub(crate) struct NumberedEdge {
    pub ids: [u64; 2],
    pub d: f64,
}

const NO_LOCAL: u32 = u32::MAX;

/// Non-negative integer identifiers mapped through a dense global→local
/// vector with a sentinel for unseen ids.
pub struct NumberedIds {
    global2local: Vec<u32>,
    local2global: Vec<u64>,
}

impl NumberedIds {
    pub fn new() -> Self {
        NumberedIds {
            global2local: Vec::new(),
            local2global: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.local2global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local2global.is_empty()
    }

    /// Local index of global identifier `gid`, if seen.
    pub fn get_local(&self, gid: u64) -> Option<u32> {
        match self.global2local.get(gid as usize) {
            Some(&lid) if lid != NO_LOCAL => Some(lid),
            _ => None,
        }
    }

    /// The global identifier of local index `lid`.
    pub fn global(&self, lid: u32) -> u64 {
        self.local2global[lid as usize]
    }
}

impl Default for NumberedIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdResolver for NumberedIds {
    type Edge = NumberedEdge;

    // identifiers are parsed to integers on the spot, so the input buffer
    // can be recycled as soon as a block is parsed
    const PARSER_RELEASES_BUFFER: bool = true;

    fn parse_block(
        header: &Header,
        transform: DistanceTransform,
        block: &[u8],
        edges: &mut Vec<NumberedEdge>,
    ) -> Result<u64> {
        parse_block_lines(header, transform, block, |a, b, d| {
            let (ga, _) = text::parse_u64(a).ok_or_else(|| anyhow!("invalid numeric identifier"))?;
            let (gb, _) = text::parse_u64(b).ok_or_else(|| anyhow!("invalid numeric identifier"))?;
            // diagonal entries are assumed to have distance zero
            if ga != gb {
                edges.push(NumberedEdge { ids: [ga, gb], d });
            }
            Ok(())
        })
    }

    fn resolve(&mut self, edges: &mut [NumberedEdge]) {
        for edge in edges {
            for id in &mut edge.ids {
                let gid = *id as usize;
                if gid >= self.global2local.len() {
                    self.global2local.resize(gid + 1, NO_LOCAL);
                }
                let mut lid = self.global2local[gid];
                if lid == NO_LOCAL {
                    lid = self.local2global.len() as u32;
                    self.local2global.push(gid as u64);
                    self.global2local[gid] = lid;
                }
                *id = lid as u64;
            }
        }
    }

    fn num_locals(&self) -> usize {
        self.local2global.len()
    }

    #[inline(always)]
    fn endpoints(edge: &NumberedEdge) -> (u32, u32, f64) {
        (edge.ids[0] as u32, edge.ids[1] as u32, edge.d)
    }
}
