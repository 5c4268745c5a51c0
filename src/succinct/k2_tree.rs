/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A k²-tree (fixed `k = 2`) over a sparse `height x width` binary matrix,
//! used to store each rule's adjacency structure: which pairs of right-hand
//! side positions participate together in an edge.
//!
//! The tree splits the matrix recursively into four quadrants; `t` records,
//! for every internal node visited in breadth-first order, which of its four
//! children are non-empty, and `l` records, for the final (leaf) level,
//! which of the four cells are set.

use crate::bits::{BitReader, BitWriter, ByteSource};
use crate::succinct::{BitArray, Bitsequence, BitsequenceParams};
use anyhow::{bail, Result};
use std::collections::VecDeque;

const K: u64 = 2;
const K2: u64 = K * K;

#[derive(Clone, Debug)]
pub struct K2Tree {
    width: u64,
    height: u64,
    n: u64,
    t: Option<Bitsequence>,
    l: Option<BitArray>,
}

impl K2Tree {
    /// `edges` are `(col, row)` pairs, row < height, col < width.
    pub fn build(
        width: u64,
        height: u64,
        mut edges: Vec<(u64, u64)>,
        params: &BitsequenceParams,
    ) -> Self {
        let nodes = width.max(height).max(2);
        let n = nodes.next_power_of_two();

        if edges.is_empty() {
            return K2Tree {
                width,
                height,
                n,
                t: None,
                l: None,
            };
        }

        let total_levels = n.trailing_zeros() as i64;
        let maxl = total_levels - 1;

        let mut t_bits = BitArray::new();
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        queue.push_back((0, edges.len()));

        for i in 0..maxl {
            let shift = (maxl - i) as u32;
            let mask = (1u64 << shift) - 1;
            let dequeues = queue.len();
            for _ in 0..dequeues {
                let (start, end) = queue.pop_front().unwrap();
                let mut buckets: [Vec<(u64, u64)>; 4] = Default::default();
                for &(x, y) in &edges[start..end] {
                    let kx = x >> shift;
                    let ky = y >> shift;
                    buckets[(kx + ky * K) as usize].push((x & mask, y & mask));
                }
                let mut pos = start;
                for bucket in buckets {
                    let blen = bucket.len();
                    if blen > 0 {
                        t_bits.append_bit(true);
                        edges[pos..pos + blen].copy_from_slice(&bucket);
                        queue.push_back((pos, pos + blen));
                    } else {
                        t_bits.append_bit(false);
                    }
                    pos += blen;
                }
            }
        }

        let mut l_bits = BitArray::new();
        while let Some((start, end)) = queue.pop_front() {
            let mut counter = [0u32; 4];
            for &(x, y) in &edges[start..end] {
                counter[((x % K) + (y % K) * K) as usize] += 1;
            }
            for c in counter {
                l_bits.append_bit(c > 0);
            }
        }

        K2Tree {
            width,
            height,
            n,
            t: Some(Bitsequence::build(&t_bits, params)),
            l: Some(l_bits),
        }
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn get(&self, row: u64, col: u64) -> bool {
        if row >= self.height || col >= self.width {
            return false;
        }
        let (t, l) = match (&self.t, &self.l) {
            (Some(t), Some(l)) => (t, l),
            _ => return false,
        };

        let mut n = self.n / K;
        let mut p = row % n;
        let mut q = col % n;
        let mut x = K * (row / n) + col / n;

        while x < t.len() {
            if !t.access(x) {
                return false;
            }
            n /= K;
            x = t.rank1(x as i64) * K2 + K * (p / n) + q / n;
            p %= n;
            q %= n;
        }

        l.get(x - t.len())
    }

    fn k2reverse(&self, t: &Bitsequence, l: &BitArray, n: u64, q: u64, p: u64, x: i64, out: &mut Vec<u64>) {
        if p >= self.height {
            return;
        }
        if x >= t.len() as i64 {
            if l.get((x - t.len() as i64) as u64) {
                out.push(p);
            }
        } else if x == -1 || t.access(x as u64) {
            let nnew = n / K;
            let y = t.rank1(x) as i64 * K2 as i64 + (q / nnew) as i64;
            for j in 0..K {
                self.k2reverse(t, l, nnew, q % nnew, p + nnew * j, y + (j * K) as i64, out);
            }
        }
    }

    /// Rows that have an edge in column `q`.
    pub fn column(&self, q: u64) -> Vec<u64> {
        if q >= self.width {
            return Vec::new();
        }
        let (t, l) = match (&self.t, &self.l) {
            (Some(t), Some(l)) => (t, l),
            _ => return Vec::new(),
        };
        let mut out = Vec::new();
        self.k2reverse(t, l, self.n, q, 0, -1, &mut out);
        out
    }

    pub fn row_iter(&self, p: u64) -> K2AxisIter<'_> {
        self.axis_iter(p, true)
    }

    pub fn col_iter(&self, q: u64) -> K2AxisIter<'_> {
        self.axis_iter(q, false)
    }

    fn axis_iter(&self, v: u64, row: bool) -> K2AxisIter<'_> {
        let mut queue = VecDeque::new();
        if self.t.is_some() {
            let (p, q) = if row { (v, 0) } else { (0, v) };
            queue.push_back(K2IterElem { n: self.n, p, q, x: -1 });
        }
        K2AxisIter { tree: self, row, queue }
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_vbyte(self.width);
        w.write_vbyte(self.height);
        w.write_vbyte(K);
        w.write_vbyte(self.n);
        match (&self.t, &self.l) {
            (Some(t), Some(l)) => {
                let mut w0 = BitWriter::new();
                t.write(&mut w0);
                let bytes = w0.into_bytes();
                w.write_vbyte(bytes.len() as u64);
                w.write_vbyte(l.len());
                w.write_sub_block(&bytes);
                w.write_bitarray(l);
            }
            _ => {
                w.write_vbyte(0);
            }
        }
        w.flush();
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let width = r.read_vbyte()?;
        let height = r.read_vbyte()?;
        let k = r.read_vbyte()?;
        if k != K {
            bail!("unsupported k2-tree arity {k}");
        }
        let n = r.read_vbyte()?;
        let t_byte_len = r.read_vbyte()?;
        if t_byte_len == 0 {
            return Ok(K2Tree {
                width,
                height,
                n,
                t: None,
                l: None,
            });
        }
        let len_l = r.read_vbyte()?;
        let t = Bitsequence::read(r)?;

        let mut l = BitArray::with_len(len_l);
        let mut i = 0u64;
        while i < len_l {
            let chunk = (len_l - i).min(64) as u32;
            let v = r.read_bits(chunk)?;
            for bi in 0..chunk {
                l.set(i + bi as u64, (v >> (chunk - 1 - bi)) & 1 != 0);
            }
            i += chunk as u64;
        }
        r.align_byte();

        Ok(K2Tree {
            width,
            height,
            n,
            t: Some(t),
            l: Some(l),
        })
    }
}

struct K2IterElem {
    n: u64,
    p: u64,
    q: u64,
    x: i64,
}

pub struct K2AxisIter<'a> {
    tree: &'a K2Tree,
    row: bool,
    queue: VecDeque<K2IterElem>,
}

impl<'a> Iterator for K2AxisIter<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let t = self.tree.t.as_ref()?;
        let l = self.tree.l.as_ref()?;
        while let Some(el) = self.queue.pop_front() {
            if self.row {
                if el.q >= self.tree.width {
                    continue;
                }
            } else if el.p >= self.tree.height {
                continue;
            }

            if el.x >= t.len() as i64 {
                if l.get((el.x - t.len() as i64) as u64) {
                    return Some(if self.row { el.q } else { el.p });
                }
                continue;
            }

            if el.x == -1 || t.access(el.x as u64) {
                let nnew = el.n / K;
                let mut y = t.rank1(el.x) as i64 * K2 as i64;
                if self.row {
                    y += (K * (el.p / nnew)) as i64;
                } else {
                    y += (el.q / nnew) as i64;
                }
                for j in 0..K {
                    let (p2, q2, x2) = if self.row {
                        (el.p % nnew, el.q + nnew * j, y + j as i64)
                    } else {
                        (el.p + nnew * j, el.q % nnew, y + (j * K) as i64)
                    };
                    self.queue.push_back(K2IterElem { n: nnew, p: p2, q: q2, x: x2 });
                }
            }
        }
        None
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

    fn naive_matrix(edges: &[(u64, u64)], width: u64, height: u64) -> Vec<Vec<bool>> {
        let mut m = vec![vec![false; width as usize]; height as usize];
        for &(c, r) in edges {
            m[r as usize][c as usize] = true;
        }
        m
    }

    #[test]
    fn get_matches_naive_dense_matrix() {
        let edges = vec![(0u64, 0u64), (3, 1), (2, 2), (4, 4), (4, 0)];
        let width = 5;
        let height = 5;
        let tree = K2Tree::build(width, height, edges.clone(), &BitsequenceParams::default());
        let m = naive_matrix(&edges, width, height);
        for r in 0..height {
            for c in 0..width {
                assert_eq!(tree.get(r, c), m[r as usize][c as usize], "at ({r},{c})");
            }
        }
    }

    #[test]
    fn column_and_row_iter_match_naive() {
        let edges = vec![(0u64, 1u64), (0, 3), (1, 1), (2, 2), (2, 3)];
        let width = 3;
        let height = 4;
        let tree = K2Tree::build(width, height, edges.clone(), &BitsequenceParams::default());

        let mut col0: Vec<u64> = tree.column(0);
        col0.sort();
        assert_eq!(col0, vec![1, 3]);

        let mut row3: Vec<u64> = tree.row_iter(3).collect();
        row3.sort();
        assert_eq!(row3, vec![0, 2]);

        let mut col_iter2: Vec<u64> = tree.col_iter(2).collect();
        col_iter2.sort();
        assert_eq!(col_iter2, vec![2, 3]);
    }

    #[test]
    fn write_read_round_trip() {
        let edges = vec![(0u64, 0u64), (1, 1), (2, 2), (3, 3)];
        let tree = K2Tree::build(4, 4, edges.clone(), &BitsequenceParams::default());
        let mut w = BitWriter::new();
        tree.write(&mut w);
        let bytes = w.into_bytes();
        let src = VecSource(bytes);
        let mut r = BitReader::new(&src, 0);
        let tree2 = K2Tree::read(&mut r).unwrap();
        for row in 0..4 {
            for col in 0..4 {
                assert_eq!(tree.get(row, col), tree2.get(row, col));
            }
        }
    }

    #[test]
    fn empty_tree_reports_no_edges() {
        let tree = K2Tree::build(4, 4, Vec::new(), &BitsequenceParams::default());
        assert!(!tree.get(0, 0));
        assert!(tree.column(0).is_empty());
    }
}
