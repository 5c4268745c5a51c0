/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A monotone, Elias–Fano-compressed list of `u64` values, used to store the
//! sorted per-edge labels of the start symbol so that all edges carrying a
//! given label (or a non-terminal, whose labels all sit above
//! `first_nt`) can be found by binary search rather than a linear scan.

use crate::bits::{BitReader, BitWriter, ByteSource};
use crate::succinct::{Bitsequence, BitsequenceParams};
use anyhow::Result;

#[derive(Clone, Debug)]
pub struct EliasFano {
    n: u64,
    low_bits: u32,
    low: Vec<u8>, // packed low-bit fields, `low_bits` bits each, MSB-first
    high: Bitsequence,
}

impl EliasFano {
    /// `list` must be sorted non-decreasing.
    pub fn build(list: &[u64], params: &BitsequenceParams) -> Self {
        let n = list.len() as u64;
        let universe = list.last().copied().unwrap_or(0);
        let low_bits = if universe > n {
            bits_needed_ceil_log2(universe as f64 / n as f64)
        } else {
            0
        };
        let mask = if low_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << low_bits) - 1
        };

        let higher_len = n + (universe >> low_bits) + 1;
        let mut hi = crate::succinct::BitArray::with_len(higher_len);
        let mut low = crate::succinct::BitArray::new();

        for (i, &elem) in list.iter().enumerate() {
            let high = (elem >> low_bits) + i as u64;
            hi.set(high, true);
            if low_bits > 0 {
                low.append_bits(elem & mask, low_bits);
            }
        }

        EliasFano {
            n,
            low_bits,
            low: low.raw_bytes().to_vec(),
            high: Bitsequence::build(&hi, params),
        }
    }

    pub fn len(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn low_bits_array(&self) -> crate::succinct::BitArray {
        // Rehydrate a borrow-free view; cheap, only used for `get`.
        let mut a = crate::succinct::BitArray::with_len(self.low.len() as u64 * 8);
        for (i, &byte) in self.low.iter().enumerate() {
            for bit in 0..8u32 {
                a.set(i as u64 * 8 + bit as u64, (byte >> (7 - bit)) & 1 != 0);
            }
        }
        a
    }

    pub fn get(&self, i: u64) -> u64 {
        assert!(i < self.n, "elias-fano index out of range");
        let lval = if self.low_bits > 0 {
            let off = i * self.low_bits as u64;
            self.low_bits_array().get_bits(off, self.low_bits)
        } else {
            0
        };
        let hval = self.high.select1(i + 1) as u64 - i;
        (hval << self.low_bits) | lval
    }

    /// Lowest index `j` with `self.get(j) == target`, or `None`.
    pub fn binary_search_lowest(&self, target: u64) -> Option<u64> {
        self.binary_search_lowest_in(target, 0, self.n as i64 - 1)
    }

    fn binary_search_lowest_in(&self, target: u64, mut left: i64, mut right: i64) -> Option<u64> {
        if self.n == 0 || self.get(0) > target {
            return None;
        }
        while left <= right {
            let mid = left + (right - left) / 2;
            let l = self.get(mid as u64);
            if l == target {
                if mid == 0 || self.get((mid - 1) as u64) < l {
                    return Some(mid as u64);
                }
                right = mid - 1;
            } else if l > target {
                right = mid - 1;
            } else {
                left = mid + 1;
            }
        }
        None
    }

    /// Lowest index `j` with `self.get(j) == target`, or (if absent) the
    /// lowest index whose value exceeds `target`.
    pub fn binary_search_lowest_or_next(&self, target: u64) -> Option<u64> {
        self.binary_search_lowest_or_next_in(target, 0, self.n as i64 - 1)
    }

    fn binary_search_lowest_or_next_in(
        &self,
        target: u64,
        mut left: i64,
        mut right: i64,
    ) -> Option<u64> {
        if self.n == 0 || self.get(0) > target {
            return None;
        }
        while left <= right {
            let mid = left + (right - left) / 2;
            let l = self.get(mid as u64);
            if l == target {
                if mid == 0 || self.get((mid - 1) as u64) < l {
                    return Some(mid as u64);
                }
                right = mid - 1;
            } else if l > target {
                right = mid - 1;
            } else {
                left = mid + 1;
            }
        }
        if left as u64 >= self.n {
            None
        } else {
            Some(left as u64)
        }
    }

    /// Iterates the indices whose value is either exactly `label` or at
    /// least `first_nt` (i.e. every matching terminal edge plus every
    /// non-terminal expansion, since non-terminal ids always sort above
    /// `first_nt`).
    pub fn iter_label(&self, label: u64, first_nt: u64) -> EliasFanoLabelIter<'_> {
        if self.n == 0 {
            return EliasFanoLabelIter {
                ef: self,
                label,
                first_nt,
                next: None,
            };
        }
        let next = if label == self.get(0) {
            Some(0)
        } else {
            self.binary_search_lowest(label)
                .or_else(|| self.binary_search_lowest_or_next(first_nt))
        };
        EliasFanoLabelIter {
            ef: self,
            label,
            first_nt,
            next,
        }
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_vbyte(self.n);
        w.write_vbyte(self.low_bits as u64);
        w.write_vbyte(self.low.len() as u64);
        for &b in &self.low {
            w.write_byte(b);
        }
        w.flush();
        self.high.write(w);
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let n = r.read_vbyte()?;
        let low_bits = r.read_vbyte()? as u32;
        let low_byte_len = r.read_vbyte()?;
        let low = r.read_bytes(low_byte_len)?;
        let high = Bitsequence::read(r)?;
        Ok(EliasFano {
            n,
            low_bits,
            low,
            high,
        })
    }
}

fn bits_needed_ceil_log2(x: f64) -> u32 {
    if x <= 1.0 {
        0
    } else {
        x.log2().ceil() as u32
    }
}

pub struct EliasFanoLabelIter<'a> {
    ef: &'a EliasFano,
    label: u64,
    first_nt: u64,
    next: Option<u64>,
}

impl<'a> Iterator for EliasFanoLabelIter<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let cur = self.next?;
        if cur >= self.ef.n {
            self.next = None;
            return None;
        }
        let l = self.ef.get(cur);
        if l != self.label && l < self.first_nt {
            match self
                .ef
                .binary_search_lowest_or_next_in(self.first_nt, cur as i64, self.ef.n as i64 - 1)
            {
                None => {
                    self.next = None;
                    return None;
                }
                Some(jumped) => {
                    self.next = Some(jumped + 1);
                    return Some(jumped);
                }
            }
        }
        if l == self.label || l >= self.first_nt {
            self.next = Some(cur + 1);
            Some(cur)
        } else {
            self.next = None;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::ByteSource;

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
    fn get_round_trips_sorted_list() {
        let list = vec![1u64, 1, 4, 7, 7, 7, 20, 500, 500];
        let ef = EliasFano::build(&list, &BitsequenceParams::default());
        for (i, &v) in list.iter().enumerate() {
            assert_eq!(ef.get(i as u64), v);
        }
    }

    #[test]
    fn write_read_round_trip() {
        let list = vec![0u64, 2, 2, 9, 100, 250, 250, 251];
        let ef = EliasFano::build(&list, &BitsequenceParams::default());
        let mut w = BitWriter::new();
        ef.write(&mut w);
        let bytes = w.into_bytes();
        let src = VecSource(bytes);
        let mut r = BitReader::new(&src, 0);
        let ef2 = EliasFano::read(&mut r).unwrap();
        for (i, &v) in list.iter().enumerate() {
            assert_eq!(ef2.get(i as u64), v);
        }
    }

    #[test]
    fn binary_search_lowest_finds_first_occurrence() {
        let list = vec![1u64, 3, 3, 3, 5, 9];
        let ef = EliasFano::build(&list, &BitsequenceParams::default());
        assert_eq!(ef.binary_search_lowest(3), Some(1));
        assert_eq!(ef.binary_search_lowest(4), None);
        assert_eq!(ef.binary_search_lowest_or_next(4), Some(4));
    }

    #[test]
    fn iter_label_includes_terminal_matches_and_nonterminal_tail() {
        // labels 0..=4 terminal, first_nt = 5: searching for label 2 should
        // also surface the trailing non-terminal-labelled edges.
        let list = vec![0u64, 1, 2, 2, 4, 5, 6];
        let ef = EliasFano::build(&list, &BitsequenceParams::default());
        let hits: Vec<u64> = ef.iter_label(2, 5).collect();
        assert_eq!(hits, vec![2, 3, 5, 6]);
    }
}
