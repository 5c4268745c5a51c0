/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A Huffman-shaped wavelet tree over a byte string, used for the
//! concatenated rule/label dictionary text that backs the FM-index.
//! `access(i)` recovers the `i`-th byte (plus its rank among equal bytes);
//! `rank(c, i)` counts occurrences of `c` in the first `i + 1` bytes.

use crate::bits::{BitReader, BitWriter, ByteSource};
use crate::succinct::{BitArray, Bitsequence, BitsequenceParams};
use anyhow::Result;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Clone, Debug)]
enum FlatNode {
    Leaf(u8),
    Internal {
        bitoff: u64,
        bitoff_rank1: u64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug)]
pub struct WaveletTree {
    len: u64,
    bits: Bitsequence,
    nodes: Vec<FlatNode>,
    coding: HashMap<u8, Vec<bool>>,
}

enum HuffNode {
    Leaf(u8),
    Internal(Box<HuffNode>, Box<HuffNode>),
}

struct HeapEntry {
    freq: u64,
    seq: u64,
    node: HuffNode,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.freq == other.freq && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the lowest frequency (ties
        // broken by earlier insertion) comes out first.
        other.freq.cmp(&self.freq).then(other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn huffman_codes(data: &[u8]) -> HashMap<u8, Vec<bool>> {
    let mut freq = [0u64; 256];
    for &b in data {
        freq[b as usize] += 1;
    }

    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    for (v, &f) in freq.iter().enumerate() {
        if f > 0 {
            heap.push(HeapEntry { freq: f, seq, node: HuffNode::Leaf(v as u8) });
            seq += 1;
        }
    }

    if heap.is_empty() {
        return HashMap::new();
    }

    while heap.len() > 1 {
        let a = heap.pop().unwrap();
        let b = heap.pop().unwrap();
        heap.push(HeapEntry {
            freq: a.freq + b.freq,
            seq,
            node: HuffNode::Internal(Box::new(a.node), Box::new(b.node)),
        });
        seq += 1;
    }

    let root = heap.pop().unwrap().node;
    let mut coding = HashMap::new();
    fn walk(node: &HuffNode, path: &mut Vec<bool>, coding: &mut HashMap<u8, Vec<bool>>) {
        match node {
            HuffNode::Leaf(v) => {
                coding.insert(*v, path.clone());
            }
            HuffNode::Internal(l, r) => {
                path.push(false);
                walk(l, path, coding);
                path.pop();
                path.push(true);
                walk(r, path, coding);
                path.pop();
            }
        }
    }
    walk(&root, &mut Vec::new(), &mut coding);
    coding
}

enum Template {
    Leaf(u8),
    Internal { bitmap: BitArray, left: Box<Template>, right: Box<Template> },
}

fn build_template(data: &[u8], depth: usize, coding: &HashMap<u8, Vec<bool>>) -> Template {
    if data.iter().all(|&v| v == data[0]) {
        return Template::Leaf(data[0]);
    }
    let mut bitmap = BitArray::with_len(data.len() as u64);
    let mut left_data = Vec::new();
    let mut right_data = Vec::new();
    for (i, &v) in data.iter().enumerate() {
        let bit = coding[&v][depth];
        bitmap.set(i as u64, bit);
        if bit {
            right_data.push(v);
        } else {
            left_data.push(v);
        }
    }
    let left = Box::new(build_template(&left_data, depth + 1, coding));
    let right = Box::new(build_template(&right_data, depth + 1, coding));
    Template::Internal { bitmap, left, right }
}

fn flatten(template: &Template, nodes: &mut Vec<FlatNode>, bits: &mut BitArray) -> usize {
    match template {
        Template::Leaf(v) => {
            let idx = nodes.len();
            nodes.push(FlatNode::Leaf(*v));
            idx
        }
        Template::Internal { bitmap, left, right } => {
            let idx = nodes.len();
            nodes.push(FlatNode::Internal { bitoff: 0, bitoff_rank1: 0, left: 0, right: 0 });
            bits.append(bitmap);
            let l = flatten(left, nodes, bits);
            let r = flatten(right, nodes, bits);
            if let FlatNode::Internal { left: ll, right: rr, .. } = &mut nodes[idx] {
                *ll = l;
                *rr = r;
            }
            idx
        }
    }
}

/// Computes `bitoff`/`bitoff_rank1` for every internal node, mirroring the
/// way each node's own segment length is derived purely from the ones-count
/// within the combined bitsequence rather than stored explicitly.
fn assign_offsets(nodes: &mut [FlatNode], bits: &Bitsequence, idx: usize, len: u64, bitoff_cursor: &mut u64) {
    let (left, right) = match &nodes[idx] {
        FlatNode::Leaf(_) => return,
        FlatNode::Internal { left, right, .. } => (*left, *right),
    };

    let node_bitoff = *bitoff_cursor;
    *bitoff_cursor += len;
    let bitoff_rank1 = if node_bitoff > 0 { bits.rank1((node_bitoff - 1) as i64) } else { 0 };
    let len_right = bits.rank1((node_bitoff + len - 1) as i64) - bitoff_rank1;
    let len_left = len - len_right;

    if let FlatNode::Internal { bitoff, bitoff_rank1: br, .. } = &mut nodes[idx] {
        *bitoff = node_bitoff;
        *br = bitoff_rank1;
    }

    assign_offsets(nodes, bits, left, len_left, bitoff_cursor);
    assign_offsets(nodes, bits, right, len_right, bitoff_cursor);
}

fn build_coding_from_tree(nodes: &[FlatNode]) -> HashMap<u8, Vec<bool>> {
    let mut coding = HashMap::new();
    fn walk(nodes: &[FlatNode], idx: usize, path: &mut Vec<bool>, coding: &mut HashMap<u8, Vec<bool>>) {
        match &nodes[idx] {
            FlatNode::Leaf(v) => {
                coding.insert(*v, path.clone());
            }
            FlatNode::Internal { left, right, .. } => {
                path.push(false);
                walk(nodes, *left, path, coding);
                path.pop();
                path.push(true);
                walk(nodes, *right, path, coding);
                path.pop();
            }
        }
    }
    walk(nodes, 0, &mut Vec::new(), &mut coding);
    coding
}

impl WaveletTree {
    pub fn build(data: &[u8], params: &BitsequenceParams) -> Self {
        if data.is_empty() {
            return WaveletTree {
                len: 0,
                bits: Bitsequence::build(&BitArray::new(), params),
                nodes: vec![FlatNode::Leaf(0)],
                coding: HashMap::new(),
            };
        }
        let len = data.len() as u64;
        let coding = huffman_codes(data);
        let template = build_template(data, 0, &coding);
        let mut nodes = Vec::new();
        let mut bits_accum = BitArray::new();
        flatten(&template, &mut nodes, &mut bits_accum);
        let bits = Bitsequence::build(&bits_accum, params);
        let mut cursor = 0u64;
        assign_offsets(&mut nodes, &bits, 0, len, &mut cursor);
        WaveletTree { len, bits, nodes, coding }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `(byte, rank)` where `rank` is the 1-based count of that byte
    /// value among positions `0..=i`.
    pub fn access(&self, i: u64) -> (u8, u64) {
        let mut idx = 0usize;
        let mut i = i;
        loop {
            match &self.nodes[idx] {
                FlatNode::Leaf(v) => return (*v, i + 1),
                FlatNode::Internal { bitoff, bitoff_rank1, left, right } => {
                    if !self.bits.access(bitoff + i) {
                        i = self.bits.rank0((bitoff + i) as i64) - (bitoff - bitoff_rank1) - 1;
                        idx = *left;
                    } else {
                        i = self.bits.rank1((bitoff + i) as i64) - bitoff_rank1 - 1;
                        idx = *right;
                    }
                }
            }
        }
    }

    /// Count of byte `c` within positions `0..=i`, or `0` if `c` never
    /// occurs (including the degenerate case where the whole text is a
    /// single repeated byte, matching the source's early-out on a
    /// zero-length code).
    pub fn rank(&self, c: u8, i: u64) -> u64 {
        let code = match self.coding.get(&c) {
            Some(code) if !code.is_empty() => code,
            _ => return 0,
        };
        let mut idx = 0usize;
        let mut level = 0usize;
        let mut i = i;
        loop {
            match &self.nodes[idx] {
                FlatNode::Leaf(v) => {
                    return if *v == c { i + 1 } else { 0 };
                }
                FlatNode::Internal { bitoff, bitoff_rank1, left, right } => {
                    let bit = code[level];
                    level += 1;
                    if !bit {
                        i = self.bits.rank0((bitoff + i) as i64) - (bitoff - bitoff_rank1) - 1;
                        idx = *left;
                    } else {
                        i = self.bits.rank1((bitoff + i) as i64) - bitoff_rank1 - 1;
                        idx = *right;
                    }
                }
            }
        }
    }

    fn write_nodes(nodes: &[FlatNode], idx: usize, w: &mut BitWriter) {
        match &nodes[idx] {
            FlatNode::Leaf(v) => {
                w.write_bit(true);
                w.write_byte(*v);
            }
            FlatNode::Internal { left, right, .. } => {
                w.write_bit(false);
                Self::write_nodes(nodes, *left, w);
                Self::write_nodes(nodes, *right, w);
            }
        }
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_vbyte(self.len);
        let mut w0 = BitWriter::new();
        Self::write_nodes(&self.nodes, 0, &mut w0);
        let bytes = w0.into_bytes();
        w.write_vbyte(bytes.len() as u64);
        w.write_sub_block(&bytes);
        self.bits.write(w);
    }

    fn read_nodes<S: ByteSource>(r: &mut BitReader<S>, nodes: &mut Vec<FlatNode>) -> Result<usize> {
        let idx = nodes.len();
        nodes.push(FlatNode::Leaf(0));
        if r.read_bit()? {
            let v = r.read_byte()?;
            nodes[idx] = FlatNode::Leaf(v);
        } else {
            let left = Self::read_nodes(r, nodes)?;
            let right = Self::read_nodes(r, nodes)?;
            nodes[idx] = FlatNode::Internal { bitoff: 0, bitoff_rank1: 0, left, right };
        }
        Ok(idx)
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let len = r.read_vbyte()?;
        let node_byte_len = r.read_vbyte()?;
        let start_byte = r.abs_byte_offset();

        let mut nodes = Vec::new();
        Self::read_nodes(r, &mut nodes)?;
        r.seek_to_byte(start_byte + node_byte_len);

        let bits = Bitsequence::read(r)?;
        let mut cursor = 0u64;
        assign_offsets(&mut nodes, &bits, 0, len, &mut cursor);
        let coding = build_coding_from_tree(&nodes);

        Ok(WaveletTree { len, bits, nodes, coding })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSource(Vec<u8>);
    impl ByteSource for VecSource {
        fn len(&self) -> u64 {
            self.0.len() as u64
        }
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
            let start = offset as usize;
            buf.copy_from_slice(&self.0[start..start + buf.len()]);
            Ok(())
        }
    }

    #[test]
    fn access_recovers_original_string() {
        let data = b"mississippi";
        let tree = WaveletTree::build(data, &BitsequenceParams::default());
        for (i, &b) in data.iter().enumerate() {
            assert_eq!(tree.access(i as u64).0, b);
        }
    }

    #[test]
    fn rank_matches_naive_count() {
        let data = b"abracadabra";
        let tree = WaveletTree::build(data, &BitsequenceParams::default());
        for &c in b"abcdr" {
            for i in 0..data.len() {
                let naive = data[..=i].iter().filter(|&&b| b == c).count() as u64;
                assert_eq!(tree.rank(c, i as u64), naive, "c={}, i={}", c as char, i);
            }
        }
    }

    #[test]
    fn write_read_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let tree = WaveletTree::build(data, &BitsequenceParams::default());
        let mut w = BitWriter::new();
        tree.write(&mut w);
        let bytes = w.into_bytes();
        let src = VecSource(bytes);
        let mut r = BitReader::new(&src, 0);
        let tree2 = WaveletTree::read(&mut r).unwrap();
        for (i, &b) in data.iter().enumerate() {
            assert_eq!(tree2.access(i as u64).0, b);
        }
        assert_eq!(tree2.rank(b'o', data.len() as u64 - 1), tree.rank(b'o', data.len() as u64 - 1));
    }

    #[test]
    fn single_repeated_byte_is_degenerate_leaf() {
        let data = vec![b'x'; 5];
        let tree = WaveletTree::build(&data, &BitsequenceParams::default());
        assert_eq!(tree.access(2).0, b'x');
        // matches the source's early-out: a zero-length huffman code always
        // reports rank 0, even for the only byte value present.
        assert_eq!(tree.rank(b'x', 4), 0);
    }
}
