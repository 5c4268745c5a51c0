/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Rank/select over a [`BitArray`], in one of three on-disk encodings
//! selected by a magic byte: `Regular` (no super-blocks, for short bitmaps),
//! `Rg` (Raman–Goyal-style 32-bit blocks aggregated into super-blocks), and
//! the optional `Rrr` (15-bit blocks classified by popcount, with
//! combinatorially-ranked within-class offsets).

use crate::bits::{bits_needed, BitReader, BitWriter, ByteSource};
use crate::succinct::BitArray;
use anyhow::{bail, Result};

const BLOCKW: u32 = 32;
const KIND_REGULAR: u8 = 0x1;
const KIND_RG: u8 = 0x2;
#[cfg(feature = "rrr")]
const KIND_RRR: u8 = 0x3;
const REGULAR_THRESHOLD: u64 = 200;

#[derive(Clone, Copy, Debug)]
pub struct BitsequenceParams {
    pub factor: u32,
    #[cfg(feature = "rrr")]
    pub rrr: bool,
}

impl Default for BitsequenceParams {
    fn default() -> Self {
        Self {
            factor: 8,
            #[cfg(feature = "rrr")]
            rrr: false,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Bitsequence {
    Regular {
        bits: BitArray,
        ones: u64,
    },
    Rg {
        bits: BitArray,
        factor: u32,
        super_rank: Vec<u64>,
        ones: u64,
    },
    #[cfg(feature = "rrr")]
    Rrr(rrr::Rrr),
}

impl Bitsequence {
    pub fn build(bits: &BitArray, params: &BitsequenceParams) -> Self {
        if bits.len() <= REGULAR_THRESHOLD {
            let ones = bits.count(0, bits.len() as u32, true);
            return Bitsequence::Regular {
                bits: bits.clone(),
                ones,
            };
        }
        #[cfg(feature = "rrr")]
        if params.rrr {
            return Bitsequence::Rrr(rrr::Rrr::build(bits, params.factor.max(1)));
        }
        Self::build_rg(bits, params.factor)
    }

    fn build_rg(bits: &BitArray, factor: u32) -> Self {
        let factor = factor.max(1);
        let s = BLOCKW * factor;
        let num_sblock = (bits.len() / s as u64) as usize + 1;
        let mut super_rank = vec![0u64; num_sblock];
        for i in 1..num_sblock {
            let mut acc = super_rank[i - 1];
            let start_block = (i - 1) as u32 * factor;
            for b in 0..factor {
                let block = start_block + b;
                let bit_start = block as u64 * BLOCKW as u64;
                if bit_start < bits.len() {
                    let len = ((bits.len() - bit_start).min(BLOCKW as u64)) as u32;
                    acc += bits.count(bit_start, len, true);
                }
            }
            super_rank[i] = acc;
        }
        let ones = Self::rg_rank1_impl(bits, factor, s, &super_rank, bits.len() as i64 - 1);
        Bitsequence::Rg {
            bits: bits.clone(),
            factor,
            super_rank,
            ones,
        }
    }

    fn rg_rank1_impl(
        bits: &BitArray,
        factor: u32,
        s: u32,
        super_rank: &[u64],
        i: i64,
    ) -> u64 {
        if i < 0 {
            return 0;
        }
        let ip1 = (i + 1) as u64;
        let sblock = (ip1 / s as u64) as usize;
        let mut res = super_rank[sblock];
        let aux = sblock as u64 * factor as u64;
        let bit_len = ip1 - BLOCKW as u64 * aux;
        if bit_len > 0 {
            res += bits.count(BLOCKW as u64 * aux, bit_len as u32, true);
        }
        res
    }

    pub fn len(&self) -> u64 {
        match self {
            Bitsequence::Regular { bits, .. } => bits.len(),
            Bitsequence::Rg { bits, .. } => bits.len(),
            #[cfg(feature = "rrr")]
            Bitsequence::Rrr(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ones(&self) -> u64 {
        match self {
            Bitsequence::Regular { ones, .. } => *ones,
            Bitsequence::Rg { ones, .. } => *ones,
            #[cfg(feature = "rrr")]
            Bitsequence::Rrr(r) => r.ones(),
        }
    }

    pub fn access(&self, i: u64) -> bool {
        match self {
            Bitsequence::Regular { bits, .. } => bits.get(i),
            Bitsequence::Rg { bits, .. } => bits.get(i),
            #[cfg(feature = "rrr")]
            Bitsequence::Rrr(r) => r.access(i),
        }
    }

    pub fn rank1(&self, i: i64) -> u64 {
        match self {
            Bitsequence::Regular { bits, ones } => {
                if i < 0 {
                    0
                } else if i as u64 >= bits.len() {
                    *ones
                } else {
                    bits.count(0, (i + 1) as u32, true)
                }
            }
            Bitsequence::Rg {
                bits,
                factor,
                super_rank,
                ones,
            } => {
                if i < 0 {
                    0
                } else if i as u64 >= bits.len() {
                    *ones
                } else {
                    Self::rg_rank1_impl(bits, *factor, BLOCKW * factor, super_rank, i)
                }
            }
            #[cfg(feature = "rrr")]
            Bitsequence::Rrr(r) => r.rank1(i),
        }
    }

    pub fn rank0(&self, i: i64) -> u64 {
        if i < 0 {
            0
        } else {
            (i + 1) as u64 - self.rank1(i)
        }
    }

    /// 0-based position of the `i`-th (1-indexed) one bit, or `-1` if `i == 0`
    /// or `i` exceeds the number of one bits.
    pub fn select1(&self, i: u64) -> i64 {
        if i == 0 || i > self.ones() {
            return -1;
        }
        // binary search over rank1, which is monotone non-decreasing.
        let mut lo: i64 = 0;
        let mut hi: i64 = self.len() as i64 - 1;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.rank1(mid) < i {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn select0(&self, i: u64) -> i64 {
        let zeros = self.len() - self.ones();
        if i == 0 || i > zeros {
            return -1;
        }
        let mut lo: i64 = 0;
        let mut hi: i64 = self.len() as i64 - 1;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.rank0(mid) < i {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Position of the nearest one bit at or before `i`, or `-1` if none.
    pub fn selectprev1(&self, i: i64) -> i64 {
        if i < 0 {
            return -1;
        }
        let r = self.rank1(i);
        if r == 0 {
            return -1;
        }
        self.select1(r)
    }

    pub fn write(&self, w: &mut BitWriter) {
        match self {
            Bitsequence::Regular { bits, .. } => {
                w.write_byte(KIND_REGULAR);
                w.write_vbyte(bits.len());
                w.write_bitarray(bits);
                w.flush();
            }
            Bitsequence::Rg {
                bits,
                factor,
                super_rank,
                ..
            } => {
                let bits_per_rs = bits_needed(*super_rank.last().unwrap_or(&0));
                w.write_byte(KIND_RG);
                w.write_vbyte(bits.len());
                w.write_vbyte(*factor as u64);
                w.write_vbyte(bits_per_rs as u64);
                w.write_bitarray(bits);
                for (idx, r) in super_rank.iter().enumerate() {
                    if idx > 0 {
                        w.write_bits(*r, bits_per_rs);
                    }
                }
                w.flush();
            }
            #[cfg(feature = "rrr")]
            Bitsequence::Rrr(r) => r.write(w),
        }
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let kind = r.read_byte()?;
        match kind {
            KIND_REGULAR => {
                let len = r.read_vbyte()?;
                let mut bits = BitArray::with_len(len);
                let mut i = 0u64;
                while i < len {
                    let chunk = (len - i).min(64) as u32;
                    let v = r.read_bits(chunk)?;
                    for k in 0..chunk {
                        bits.set(i + k as u64, (v >> (chunk - 1 - k)) & 1 != 0);
                    }
                    i += chunk as u64;
                }
                r.align_byte();
                let ones = bits.count(0, len as u32, true);
                Ok(Bitsequence::Regular { bits, ones })
            }
            KIND_RG => {
                let len = r.read_vbyte()?;
                let factor = r.read_vbyte()? as u32;
                let bits_per_rs = r.read_vbyte()? as u32;
                let mut bits = BitArray::with_len(len);
                let mut i = 0u64;
                while i < len {
                    let chunk = (len - i).min(64) as u32;
                    let v = r.read_bits(chunk)?;
                    for k in 0..chunk {
                        bits.set(i + k as u64, (v >> (chunk - 1 - k)) & 1 != 0);
                    }
                    i += chunk as u64;
                }
                let s = BLOCKW * factor;
                let num_sblock = (len / s as u64) as usize + 1;
                let mut super_rank = vec![0u64; num_sblock];
                for item in super_rank.iter_mut().skip(1) {
                    *item = r.read_bits(bits_per_rs)?;
                }
                r.align_byte();
                let ones = if len == 0 {
                    0
                } else {
                    Self::rg_rank1_impl(&bits, factor, s, &super_rank, len as i64 - 1)
                };
                Ok(Bitsequence::Rg {
                    bits,
                    factor,
                    super_rank,
                    ones,
                })
            }
            #[cfg(feature = "rrr")]
            KIND_RRR => Ok(Bitsequence::Rrr(rrr::Rrr::read(r)?)),
            other => bail!("invalid bitsequence kind byte {other:#x}"),
        }
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

    fn make_bits(pattern: &[bool]) -> BitArray {
        let mut a = BitArray::with_len(pattern.len() as u64);
        for (i, &b) in pattern.iter().enumerate() {
            a.set(i as u64, b);
        }
        a
    }

    fn round_trip(bits: &BitArray, params: &BitsequenceParams) -> Bitsequence {
        let built = Bitsequence::build(bits, params);
        let mut w = BitWriter::new();
        built.write(&mut w);
        let bytes = w.into_bytes();
        let source = VecSource(bytes);
        let mut r = BitReader::new(&source, 0);
        Bitsequence::read(&mut r).unwrap()
    }

    #[test]
    fn regular_rank_select_match_naive() {
        let pattern: Vec<bool> = (0..64).map(|i| i % 7 == 0).collect();
        let bits = make_bits(&pattern);
        let bs = Bitsequence::build(&bits, &BitsequenceParams::default());
        let mut ones_seen = 0u64;
        for (i, &b) in pattern.iter().enumerate() {
            if b {
                ones_seen += 1;
            }
            assert_eq!(bs.rank1(i as i64), ones_seen);
            assert_eq!(bs.access(i as u64), b);
        }
        assert_eq!(bs.select1(1), pattern.iter().position(|&b| b).unwrap() as i64);
    }

    #[test]
    fn rg_round_trips_and_matches_rank() {
        let pattern: Vec<bool> = (0..1000).map(|i| i % 3 == 0 || i % 11 == 0).collect();
        let bits = make_bits(&pattern);
        let params = BitsequenceParams {
            factor: 4,
            #[cfg(feature = "rrr")]
            rrr: false,
        };
        let bs = round_trip(&bits, &params);
        let mut ones_seen = 0u64;
        for (i, &b) in pattern.iter().enumerate() {
            if b {
                ones_seen += 1;
            }
            assert_eq!(bs.rank1(i as i64), ones_seen, "mismatch at {i}");
            assert_eq!(bs.access(i as u64), b);
        }
        assert_eq!(bs.ones(), ones_seen);
        let third_one = (0..).filter(|&i| pattern[i]).nth(2).unwrap() as i64;
        assert_eq!(bs.select1(3), third_one);
        assert_eq!(bs.selectprev1(third_one), third_one);
    }

    #[cfg(feature = "rrr")]
    #[test]
    fn rrr_round_trips_and_matches_rank() {
        let pattern: Vec<bool> = (0..500).map(|i| (i * 7) % 13 < 4).collect();
        let bits = make_bits(&pattern);
        let params = BitsequenceParams { factor: 4, rrr: true };
        let bs = round_trip(&bits, &params);
        let mut ones_seen = 0u64;
        for (i, &b) in pattern.iter().enumerate() {
            if b {
                ones_seen += 1;
            }
            assert_eq!(bs.rank1(i as i64), ones_seen, "mismatch at {i}");
            assert_eq!(bs.access(i as u64), b);
        }
        assert_eq!(bs.ones(), ones_seen);
    }
}

#[cfg(feature = "rrr")]
mod rrr {
    use super::*;

    const BLOCK_BITS: u32 = 15;
    const CLASS_BITS: u32 = 4;
    const KIND_RRR: u8 = super::KIND_RRR;

    fn binom(n: i64, k: i64) -> u64 {
        if k < 0 || k > n || n < 0 {
            return 0;
        }
        let k = k.min(n - k);
        let mut result: u128 = 1;
        for i in 0..k {
            result = result * (n - i) as u128 / (i + 1) as u128;
        }
        result as u64
    }

    fn class_size(c: u32) -> u64 {
        binom(BLOCK_BITS as i64, c as i64)
    }

    fn offset_width(c: u32) -> u32 {
        let size = class_size(c);
        if size <= 1 {
            0
        } else {
            bits_needed(size - 1)
        }
    }

    /// Rank, in the combinatorial number system, of the ascending position
    /// list of set bits (bit 0 = most significant of the block).
    fn subset_rank(positions: &[u32]) -> u64 {
        let mut rank = 0u64;
        for (i, &p) in positions.iter().enumerate() {
            rank += binom(p as i64, (i + 1) as i64);
        }
        rank
    }

    fn subset_unrank(k: u32, mut rank: u64) -> Vec<u32> {
        let mut positions = Vec::with_capacity(k as usize);
        let mut kk = k as i64;
        let mut upper = BLOCK_BITS as i64 - 1;
        while kk > 0 {
            let mut c = upper;
            while c >= kk - 1 && binom(c, kk) > rank {
                c -= 1;
            }
            rank -= binom(c, kk);
            positions.push(c as u32);
            upper = c - 1;
            kk -= 1;
        }
        positions.reverse();
        positions
    }

    fn block_value(bits: &BitArray, block_start: u64, block_len: u32) -> u32 {
        let mut v = 0u32;
        for k in 0..block_len {
            v = (v << 1) | bits.get(block_start + k as u64) as u32;
        }
        v
    }

    fn block_class_and_offset(value: u32, block_len: u32) -> (u32, u64) {
        let mut positions = Vec::new();
        for pos in 0..block_len {
            if (value >> (block_len - 1 - pos)) & 1 != 0 {
                positions.push(pos);
            }
        }
        let c = positions.len() as u32;
        (c, subset_rank(&positions))
    }

    #[derive(Clone, Debug)]
    pub struct Rrr {
        len: u64,
        ones: u64,
        sample_rate: u32,
        block_types: Vec<u8>,  // class id per block
        offsets: BitArray,     // concatenated variable-width combinadic ranks
        offset_start: Vec<u64>, // bit offset into `offsets` where each block's code starts, sampled per super-block start only is not enough for O(1) scan; we keep one entry per block for simplicity
        super_rank: Vec<u64>,
    }

    impl Rrr {
        pub fn build(bits: &BitArray, sample_rate: u32) -> Self {
            let len = bits.len();
            let num_blocks = ((len + BLOCK_BITS as u64 - 1) / BLOCK_BITS as u64) as usize;
            let mut block_types = Vec::with_capacity(num_blocks);
            let mut offsets = BitArray::new();
            let mut offset_start = Vec::with_capacity(num_blocks + 1);
            let num_sblock = num_blocks / sample_rate as usize + 1;
            let mut super_rank = vec![0u64; num_sblock];

            let mut running_rank = 0u64;
            for blk in 0..num_blocks {
                let start = blk as u64 * BLOCK_BITS as u64;
                let block_len = (len - start).min(BLOCK_BITS as u64) as u32;
                let value = block_value(bits, start, block_len);
                let (class, offset) = block_class_and_offset(value, block_len);
                offset_start.push(offsets.len());
                block_types.push(class as u8);
                let width = offset_width(class);
                if width > 0 {
                    offsets.append_bits(offset, width);
                }
                running_rank += class as u64;
                if (blk + 1) % sample_rate as usize == 0 {
                    super_rank[(blk + 1) / sample_rate as usize] = running_rank;
                }
            }
            offset_start.push(offsets.len());
            let ones = running_rank;

            Rrr {
                len,
                ones,
                sample_rate,
                block_types,
                offsets,
                offset_start,
                super_rank,
            }
        }

        pub fn len(&self) -> u64 {
            self.len
        }

        pub fn ones(&self) -> u64 {
            self.ones
        }

        fn block_len_at(&self, blk: usize) -> u32 {
            let start = blk as u64 * BLOCK_BITS as u64;
            (self.len - start).min(BLOCK_BITS as u64) as u32
        }

        fn decode_block(&self, blk: usize) -> Vec<u32> {
            let class = self.block_types[blk] as u32;
            let width = offset_width(class);
            let off_bit = self.offset_start[blk];
            let offset = if width > 0 {
                self.offsets.get_bits(off_bit, width)
            } else {
                0
            };
            subset_unrank(class, offset)
        }

        pub fn access(&self, i: u64) -> bool {
            let blk = (i / BLOCK_BITS as u64) as usize;
            let block_len = self.block_len_at(blk);
            let pos_in_block = (i % BLOCK_BITS as u64) as u32;
            let positions = self.decode_block(blk);
            let _ = block_len;
            positions.contains(&pos_in_block)
        }

        pub fn rank1(&self, i: i64) -> u64 {
            if i < 0 {
                return 0;
            }
            if i as u64 >= self.len {
                return self.ones;
            }
            let target_blk = (i as u64 / BLOCK_BITS as u64) as usize;
            let sblock = target_blk / self.sample_rate as usize;
            let mut rank = self.super_rank[sblock];
            let first_blk = sblock * self.sample_rate as usize;
            for blk in first_blk..target_blk {
                rank += self.block_types[blk] as u64;
            }
            let pos_in_block = (i as u64 % BLOCK_BITS as u64) as u32;
            let positions = self.decode_block(target_blk);
            rank += positions.iter().filter(|&&p| p <= pos_in_block).count() as u64;
            rank
        }

        pub fn write(&self, w: &mut BitWriter) {
            let ptr_width = bits_needed(*self.super_rank.last().unwrap_or(&0));
            let sampling_field_bits = bits_needed(self.offsets.len());
            w.write_byte(KIND_RRR);
            w.write_vbyte(self.len);
            w.write_vbyte(self.sample_rate as u64);
            w.write_vbyte(ptr_width as u64);
            w.write_vbyte(sampling_field_bits as u64);
            w.write_vbyte(self.block_types.len() as u64);
            w.write_vbyte(self.offsets.len());

            for &c in &self.block_types {
                w.write_bits(c as u64, CLASS_BITS);
            }
            w.write_bitarray(&self.offsets);
            for (idx, r) in self.super_rank.iter().enumerate() {
                if idx > 0 {
                    w.write_bits(*r, ptr_width);
                }
            }
            // per-superblock starting bit offset into the `offsets` stream
            for sb in 0..self.super_rank.len() {
                if sb > 0 {
                    let blk = sb * self.sample_rate as usize;
                    let pos = self.offset_start.get(blk).copied().unwrap_or(self.offsets.len());
                    w.write_bits(pos, sampling_field_bits);
                }
            }
            w.flush();
        }

        pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
            let len = r.read_vbyte()?;
            let sample_rate = r.read_vbyte()? as u32;
            let ptr_width = r.read_vbyte()? as u32;
            let sampling_field_bits = r.read_vbyte()? as u32;
            let num_blocks = r.read_vbyte()? as usize;
            let offsets_len = r.read_vbyte()?;

            let mut block_types = Vec::with_capacity(num_blocks);
            for _ in 0..num_blocks {
                block_types.push(r.read_bits(CLASS_BITS)? as u8);
            }

            let mut offsets = BitArray::with_len(offsets_len);
            let mut i = 0u64;
            while i < offsets_len {
                let chunk = (offsets_len - i).min(64) as u32;
                let v = r.read_bits(chunk)?;
                for k in 0..chunk {
                    offsets.set(i + k as u64, (v >> (chunk - 1 - k)) & 1 != 0);
                }
                i += chunk as u64;
            }

            let num_sblock = num_blocks / sample_rate.max(1) as usize + 1;
            let mut super_rank = vec![0u64; num_sblock];
            for item in super_rank.iter_mut().skip(1) {
                *item = r.read_bits(ptr_width)?;
            }
            let mut super_offset_start = vec![0u64; num_sblock];
            for item in super_offset_start.iter_mut().skip(1) {
                *item = r.read_bits(sampling_field_bits)?;
            }
            r.align_byte();

            // Rebuild per-block offset start positions by scanning forward from
            // each super-block's sampled starting position.
            let mut offset_start = Vec::with_capacity(num_blocks + 1);
            let mut pos = 0u64;
            for (blk, &class) in block_types.iter().enumerate() {
                let sblock = blk / sample_rate.max(1) as usize;
                if blk % sample_rate.max(1) as usize == 0 {
                    pos = super_offset_start[sblock];
                }
                offset_start.push(pos);
                pos += offset_width(class as u32) as u64;
            }
            offset_start.push(offsets_len);

            let total_ones: u64 = block_types.iter().map(|&c| c as u64).sum();

            Ok(Rrr {
                len,
                ones: total_ones,
                sample_rate,
                block_types,
                offsets,
                offset_start,
                super_rank,
            })
        }
    }

}
