/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Grammar-based compression of hyperedge-labelled multigraphs.
//!
//! A [`Writer`](writer::Writer) ingests `(label, nodes)` hyperedges, runs a
//! RePair-style grammar compressor over them, and serializes the result (a
//! straight-line hyperedge-replacement grammar plus a label dictionary) into
//! a single self-contained file. A [`Reader`](reader::Reader) opens that file
//! and answers structural queries — `extract`, `locate`, `search`,
//! `neighborhood`, `edge_exists` — directly against the compressed
//! representation, by lazily expanding non-terminal edges on demand.
#![deny(unconditional_recursion)]
#![deny(unreachable_patterns)]

pub mod bits;
pub mod fm_index;
pub mod format;
pub mod grammar;
pub mod reader;
pub mod succinct;
pub mod utils;
pub mod writer;

pub use grammar::{HEdge, HGraph, NodeId};
pub use reader::Reader;
pub use writer::{Writer, WriterParams};

/// Hard ceiling on hyperedge rank, baked into the on-disk layout.
pub const LIMIT_MAX_RANK: usize = 128;

/// Magic bytes identifying a compressed graph file.
pub const MAGIC: &[u8; 8] = b"CGRAPH1\0";
