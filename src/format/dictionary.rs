/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Label dictionary: the sorted set of distinct byte-string labels used as
//! node or edge labels, with an FM-index over their `\0`-delimited
//! concatenation for extract/locate/prefix/substring queries, plus two
//! membership bitsequences distinguishing node labels from edge labels.
//!
//! Dictionary ids are NOT assignment order — they are the 0-based rank of
//! the label in sorted (lexicographic) order, since that is the order the
//! FM-index's backing text is built in.

use crate::bits::{BitReader, BitWriter, ByteSource};
use crate::fm_index::{FmIndex, FmIndexParams};
use crate::succinct::{BitArray, Bitsequence, BitsequenceParams};
use anyhow::Result;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct Dictionary {
    n: u64,
    disjoint: bool,
    bv: Bitsequence,
    be: Option<Bitsequence>,
    fmi: FmIndex,
}

impl Dictionary {
    /// `entries` maps a label's bytes to `(is_node, is_edge)`, the set of
    /// roles it plays in the source graph. Every entry must have at least
    /// one of the two set.
    pub fn build(
        entries: &BTreeMap<Vec<u8>, (bool, bool)>,
        fm_params: &FmIndexParams,
        bs_params: &BitsequenceParams,
    ) -> Self {
        let n = entries.len() as u64;
        let disjoint = entries.values().all(|&(is_node, is_edge)| !(is_node && is_edge));

        let mut bv_bits = BitArray::with_len(n);
        let mut be_bits = BitArray::with_len(n);
        let mut text = Vec::new();
        text.push(0u8);

        for (i, (label, &(is_node, is_edge))) in entries.iter().enumerate() {
            bv_bits.set(i as u64, is_node);
            be_bits.set(i as u64, is_edge);
            text.extend_from_slice(label);
            text.push(0u8);
        }

        let mut separators = BitArray::with_len(text.len() as u64);
        for (i, &b) in text.iter().enumerate() {
            if b == 0 {
                separators.set(i as u64, true);
            }
        }

        let bv = Bitsequence::build(&bv_bits, bs_params);
        let be = if disjoint { None } else { Some(Bitsequence::build(&be_bits, bs_params)) };
        let fmi = FmIndex::build(&text, Some(&separators), fm_params, bs_params);

        Dictionary { n, disjoint, bv, be, fmi }
    }

    pub fn len(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Total number of distinct node labels (`bv`'s popcount).
    pub fn node_count(&self) -> u64 {
        if self.n == 0 {
            0
        } else {
            self.bv.rank1(self.n as i64 - 1)
        }
    }

    /// Total number of distinct edge labels.
    pub fn edge_label_count(&self) -> u64 {
        if self.n == 0 {
            return 0;
        }
        match &self.be {
            Some(be) => be.rank1(self.n as i64 - 1),
            None => self.bv.rank0(self.n as i64 - 1),
        }
    }

    pub fn is_node_label(&self, id: u64) -> bool {
        self.bv.access(id)
    }

    pub fn is_edge_label(&self, id: u64) -> bool {
        match &self.be {
            Some(be) => be.access(id),
            None => !self.bv.access(id),
        }
    }

    /// The compact node-id space is the subsequence of dictionary ids with
    /// `is_node_label` set, numbered from 0.
    pub fn node_rank(&self, id: u64) -> u64 {
        self.bv.rank1(id as i64 - 1)
    }

    pub fn edge_label_rank(&self, id: u64) -> u64 {
        match &self.be {
            Some(be) => be.rank1(id as i64 - 1),
            None => self.bv.rank0(id as i64 - 1),
        }
    }

    /// Inverse of [`Dictionary::node_rank`]: the dictionary id of the
    /// `rank`-th (0-based) node label.
    pub fn node_id(&self, rank: u64) -> u64 {
        self.bv.select1(rank + 1) as u64
    }

    pub fn edge_label_id(&self, rank: u64) -> u64 {
        match &self.be {
            Some(be) => be.select1(rank + 1) as u64,
            None => self.bv.select0(rank + 1) as u64,
        }
    }

    /// Dictionary row ↔ id mapping, ported verbatim from the original's
    /// `dict.c`: row 0 is an unreachable wraparound marker, so `extract` and
    /// `locate` use asymmetric offsets rather than literal inverses.
    fn row_for_id(&self, id: u64) -> u64 {
        if id == self.n - 1 {
            0
        } else {
            id + 2
        }
    }

    pub fn extract_entry(&self, id: u64) -> Vec<u8> {
        let row = self.row_for_id(id);
        let mut bytes = self.fmi.extract(row);
        bytes.pop(); // trailing '\0'
        bytes
    }

    /// The id of the entry exactly equal to `label`, if present.
    pub fn locate_entry(&self, label: &[u8]) -> Option<u64> {
        let mut pattern = Vec::with_capacity(label.len() + 2);
        pattern.push(0u8);
        pattern.extend_from_slice(label);
        pattern.push(0u8);
        let (sp, ep) = self.fmi.locate(&pattern)?;
        debug_assert_eq!(sp, ep, "a dictionary entry is unique");
        Some(sp - 1)
    }

    /// The `[lo, hi]` (inclusive) id range of every entry starting with
    /// `prefix`, in sorted order.
    pub fn locate_prefix(&self, prefix: &[u8]) -> Option<(u64, u64)> {
        let mut pattern = Vec::with_capacity(prefix.len() + 1);
        pattern.push(0u8);
        pattern.extend_from_slice(prefix);
        let (sp, ep) = self.fmi.locate(&pattern)?;
        Some((sp - 1, ep - 1))
    }

    /// The raw BWT row range matching `pattern` occurring anywhere inside an
    /// entry (not necessarily at its start). Each row in the returned range
    /// resolves to an entry id via [`Dictionary::match_at`]; unlike
    /// [`Dictionary::locate_entry`]/[`Dictionary::locate_prefix`], no `-1`
    /// adjustment applies here since [`FmIndex::locate_match`] already
    /// returns dictionary-entry indices when sampling was built with
    /// separators.
    pub fn locate_substr(&self, pattern: &[u8]) -> Option<(u64, u64)> {
        self.fmi.locate(pattern)
    }

    pub fn match_at(&self, row: u64) -> u64 {
        self.fmi.locate_match(row)
    }

    pub fn write(&self, w: &mut BitWriter) {
        let mut w_bv = BitWriter::new();
        self.bv.write(&mut w_bv);
        let mut w_be = BitWriter::new();
        if let Some(be) = &self.be {
            be.write(&mut w_be);
        }

        w.write_vbyte(self.n);
        w.write_byte(self.disjoint as u8);
        w.write_vbyte(w_bv.byte_len());
        if !self.disjoint {
            w.write_vbyte(w_be.byte_len());
        }
        w.write_sub_block(&w_bv.into_bytes());
        if !self.disjoint {
            w.write_sub_block(&w_be.into_bytes());
        }
        self.fmi.write(w);
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let n = r.read_vbyte()?;
        let disjoint = r.read_byte()? != 0;

        let len_bv = r.read_vbyte()?;
        let len_be = if !disjoint { Some(r.read_vbyte()?) } else { None };

        let start = r.abs_byte_offset();
        let bv = Bitsequence::read(r)?;
        r.seek_to_byte(start + len_bv);

        let be = if !disjoint {
            let start = r.abs_byte_offset();
            let be = Bitsequence::read(r)?;
            r.seek_to_byte(start + len_be.unwrap());
            Some(be)
        } else {
            None
        };

        let fmi = FmIndex::read(r)?;

        Ok(Dictionary { n, disjoint, bv, be, fmi })
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

    fn sample_entries() -> BTreeMap<Vec<u8>, (bool, bool)> {
        let mut m = BTreeMap::new();
        m.insert(b"alpha".to_vec(), (true, false));
        m.insert(b"beta".to_vec(), (false, true));
        m.insert(b"gamma".to_vec(), (true, true));
        m
    }

    #[test]
    fn extract_recovers_every_label_by_sorted_rank_id() {
        let entries = sample_entries();
        let sorted_keys: Vec<Vec<u8>> = entries.keys().cloned().collect();
        let dict = Dictionary::build(&entries, &FmIndexParams::default(), &BitsequenceParams::default());
        for (id, key) in sorted_keys.iter().enumerate() {
            assert_eq!(dict.extract_entry(id as u64), *key);
        }
    }

    #[test]
    fn locate_entry_finds_the_assigned_sorted_rank_id() {
        let entries = sample_entries();
        let sorted_keys: Vec<Vec<u8>> = entries.keys().cloned().collect();
        let dict = Dictionary::build(&entries, &FmIndexParams::default(), &BitsequenceParams::default());
        for (id, key) in sorted_keys.iter().enumerate() {
            assert_eq!(dict.locate_entry(key), Some(id as u64));
        }
        assert_eq!(dict.locate_entry(b"delta"), None);
    }

    #[test]
    fn membership_flags_match_input_roles() {
        let entries = sample_entries();
        let dict = Dictionary::build(&entries, &FmIndexParams::default(), &BitsequenceParams::default());
        let alpha_id = dict.locate_entry(b"alpha").unwrap();
        let beta_id = dict.locate_entry(b"beta").unwrap();
        let gamma_id = dict.locate_entry(b"gamma").unwrap();
        assert!(dict.is_node_label(alpha_id) && !dict.is_edge_label(alpha_id));
        assert!(!dict.is_node_label(beta_id) && dict.is_edge_label(beta_id));
        assert!(dict.is_node_label(gamma_id) && dict.is_edge_label(gamma_id));
        assert!(!dict.disjoint); // gamma plays both roles
    }

    #[test]
    fn write_read_round_trip_preserves_extract_and_locate() {
        let entries = sample_entries();
        let sorted_keys: Vec<Vec<u8>> = entries.keys().cloned().collect();
        let dict = Dictionary::build(&entries, &FmIndexParams::default(), &BitsequenceParams::default());

        let mut w = BitWriter::new();
        dict.write(&mut w);
        let bytes = w.into_bytes();
        let src = VecSource(bytes);
        let mut r = BitReader::new(&src, 0);
        let dict2 = Dictionary::read(&mut r).unwrap();

        for (id, key) in sorted_keys.iter().enumerate() {
            assert_eq!(dict2.extract_entry(id as u64), *key);
            assert_eq!(dict2.locate_entry(key), Some(id as u64));
        }
    }
}
