/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! On-disk start symbol: a k²-tree incidence matrix between sorted edges and
//! their nodes, an Elias–Fano label table in row order, and a deduplicated
//! pool of index functions that reorder each edge's sorted node set back
//! into its original connection order.

use crate::bits::{bits_needed, BitReader, BitWriter, ByteSource};
use crate::grammar::{hedge_cmp, HEdge, HGraph, NodeId};
use crate::succinct::{BitsequenceParams, EliasFano, K2Tree};
use anyhow::Result;
use itertools::Itertools;
use std::collections::HashMap;

/// An edge's index function: `elements[i]` is the rank of `nodes[i]` among
/// the edge's own distinct sorted node values. Applying it to the sorted
/// node list read back out of the k²-tree reproduces the edge's original
/// ordered connection list.
fn index_function(nodes: &[NodeId]) -> Vec<u64> {
    let mut sorted: Vec<NodeId> = nodes.to_vec();
    sorted.sort_unstable();
    let sorted: Vec<NodeId> = sorted.into_iter().dedup().collect();
    nodes
        .iter()
        .map(|n| sorted.binary_search(n).expect("n is a member of its own sorted dedup") as u64)
        .collect()
}

#[derive(Clone, Debug)]
pub struct StartSymbol {
    edge_count: u64,
    node_count: u64,
    matrix: K2Tree,
    labels: EliasFano,
    /// Per-edge index-function id, bit-packed on disk but held decoded here.
    edge_ifs: Vec<u64>,
    /// The deduplicated pool of index functions, in the order they were
    /// first seen while sorting the start symbol's edges.
    ifs: Vec<Vec<u64>>,
}

impl StartSymbol {
    pub fn build(g: &HGraph, node_count: u64, params: &BitsequenceParams) -> Self {
        let mut edges: Vec<&HEdge> = g.edges().collect();
        edges.sort_by(|a, b| hedge_cmp(a, b));
        let edge_count = edges.len() as u64;

        let mut labels = Vec::with_capacity(edges.len());
        let mut matrix_edges: Vec<(u64, u64)> = Vec::new();
        let mut pool: Vec<Vec<u64>> = Vec::new();
        let mut pool_index: HashMap<Vec<u64>, u64> = HashMap::new();
        let mut edge_ifs = Vec::with_capacity(edges.len());

        for (row, edge) in edges.iter().enumerate() {
            labels.push(edge.label);

            let mut sorted: Vec<NodeId> = edge.nodes.clone();
            sorted.sort_unstable();
            let sorted: Vec<NodeId> = sorted.into_iter().dedup().collect();
            for &node in &sorted {
                matrix_edges.push((node, row as u64));
            }

            let elements = index_function(&edge.nodes);
            let id = *pool_index.entry(elements.clone()).or_insert_with(|| {
                let id = pool.len() as u64;
                pool.push(elements);
                id
            });
            edge_ifs.push(id);
        }

        let matrix = K2Tree::build(node_count, edge_count, matrix_edges, params);
        let labels = EliasFano::build(&labels, params);

        StartSymbol {
            edge_count,
            node_count,
            matrix,
            labels,
            edge_ifs,
            ifs: pool,
        }
    }

    pub fn edge_count(&self) -> u64 {
        self.edge_count
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Nodes incident to `node` (rows of the incidence matrix).
    pub fn edges_with_node(&self, node: u64) -> impl Iterator<Item = u64> + '_ {
        self.matrix.col_iter(node)
    }

    pub fn label(&self, row: u64) -> u64 {
        self.labels.get(row)
    }

    /// Lowest row whose label is `label`, or the lowest row at/after
    /// `first_nt` if no terminal match exists — mirrors the predicate-query
    /// candidate scan.
    pub fn first_row_for_label(&self, label: u64, first_nt: u64) -> Option<u64> {
        if self.labels.is_empty() {
            return None;
        }
        if label == self.labels.get(0) {
            return Some(0);
        }
        self.labels
            .binary_search_lowest(label)
            .or_else(|| self.labels.binary_search_lowest_or_next(first_nt))
    }

    pub fn label_iter(&self, label: u64, first_nt: u64) -> impl Iterator<Item = u64> + '_ {
        self.labels.iter_label(label, first_nt)
    }

    /// Reconstructs edge `row`'s `(label, nodes)` in its original connection
    /// order.
    pub fn get_edge(&self, row: u64) -> (u64, Vec<NodeId>) {
        let label = self.labels.get(row);
        let id = self.edge_ifs[row as usize] as usize;
        let func = &self.ifs[id];
        let sorted: Vec<NodeId> = self.matrix.row_iter(row).collect();
        let nodes = func.iter().map(|&i| sorted[i as usize]).collect();
        (label, nodes)
    }

    pub fn write(&self, w: &mut BitWriter, params: &BitsequenceParams) {
        let mut w_matrix = BitWriter::new();
        self.matrix.write(&mut w_matrix);

        let mut w_labels = BitWriter::new();
        self.labels.write(&mut w_labels);

        let max_if = self.ifs.len().saturating_sub(1) as u64;
        let bits_per_id = bits_needed(max_if);
        let mut w_ifs_ids = BitWriter::new();
        w_ifs_ids.write_vbyte(bits_per_id as u64);
        for &id in &self.edge_ifs {
            w_ifs_ids.write_bits(id, bits_per_id);
        }
        w_ifs_ids.flush();

        // Two passes over the index-function pool: measure each function's
        // exact bit length first, build the Elias-Fano offset table from
        // those, then re-emit the same codes back to back with no padding
        // between them.
        let mut bit_lens = Vec::with_capacity(self.ifs.len());
        for func in &self.ifs {
            let mut probe = BitWriter::new();
            probe.write_elias_delta(func.len() as u64);
            for &e in func {
                probe.write_elias_delta(e);
            }
            bit_lens.push(probe.bit_len());
        }
        let mut offsets = Vec::with_capacity(self.ifs.len());
        let mut acc = 0u64;
        for len in &bit_lens {
            offsets.push(acc);
            acc += len;
        }
        let offsets_ef = EliasFano::build(&offsets, params);
        let mut w_offsets = BitWriter::new();
        offsets_ef.write(&mut w_offsets);

        let mut w_bodies = BitWriter::new();
        for func in &self.ifs {
            w_bodies.write_elias_delta(func.len() as u64);
            for &e in func {
                w_bodies.write_elias_delta(e);
            }
        }

        w.write_vbyte(w_matrix.byte_len());
        w.write_vbyte(w_labels.byte_len());
        w.write_vbyte(w_ifs_ids.byte_len());
        w.write_sub_block(&w_matrix.into_bytes());
        w.write_sub_block(&w_labels.into_bytes());
        w.write_sub_block(&w_ifs_ids.into_bytes());
        w.write_vbyte(w_offsets.byte_len());
        w.write_sub_block(&w_offsets.into_bytes());
        w.write_sub_block(&w_bodies.into_bytes());
        w.flush();
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>, node_count: u64) -> Result<Self> {
        let len_matrix = r.read_vbyte()?;
        let len_labels = r.read_vbyte()?;
        let len_ifs_ids = r.read_vbyte()?;

        let start = r.abs_byte_offset();
        let matrix = K2Tree::read(r)?;
        r.seek_to_byte(start + len_matrix);
        let edge_count = matrix.height();

        let start = r.abs_byte_offset();
        let labels = EliasFano::read(r)?;
        r.seek_to_byte(start + len_labels);

        let start = r.abs_byte_offset();
        let bits_per_id = r.read_vbyte()? as u32;
        let mut edge_ifs = Vec::with_capacity(edge_count as usize);
        for _ in 0..edge_count {
            edge_ifs.push(if bits_per_id == 0 { 0 } else { r.read_bits(bits_per_id)? });
        }
        r.align_byte();
        r.seek_to_byte(start + len_ifs_ids);

        let len_offsets = r.read_vbyte()?;
        let start = r.abs_byte_offset();
        let offsets_ef = EliasFano::read(r)?;
        let pool_size = offsets_ef.len();
        r.seek_to_byte(start + len_offsets);

        let mut ifs = Vec::with_capacity(pool_size as usize);
        for _ in 0..pool_size {
            let n = r.read_elias_delta()?;
            let mut func = Vec::with_capacity(n as usize);
            for _ in 0..n {
                func.push(r.read_elias_delta()?);
            }
            ifs.push(func);
        }

        Ok(StartSymbol {
            edge_count,
            node_count,
            matrix,
            labels,
            edge_ifs,
            ifs,
        })
    }
}
