/*
 * SPDX-FileCopyrightText: 2024 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

pub mod algorithms;
pub mod graphs;
pub mod output;
pub mod utils;

#[cfg(feature = "cli")]
pub mod cli;

pub mod prelude {
    pub use crate::algorithms::{
        CdHit, Clustering, Dendrogram, Leiden, LeidenParams, Linkage, SetCover, SingleLinkageBfs,
        UClust,
    };
    pub use crate::graphs::{
        ClusterGraph, ColumnFilter, DistEntry, DistanceTransform, GraphNamed, GraphNumbered,
        LoadConfig, MatrixElement, MiniEntry, SparseMatrix,
    };
    pub use crate::output::sort_clusters_by_size;
}
