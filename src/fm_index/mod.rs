/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! FM-index over the `\0`-delimited label-dictionary text: a wavelet-tree
//! BWT, an Elias–Fano cumulative character-count table, and optional
//! run-length encoding of the BWT plus suffix-array sampling for
//! `locate_match`/`extract`.

mod suffix_array;

use crate::bits::{bits_needed, BitReader, BitWriter, ByteSource};
use crate::succinct::{BitArray, Bitsequence, BitsequenceParams, EliasFano, WaveletTree};
use anyhow::Result;
use bitflags::bitflags;

const EOF_BYTE: u8 = 0;

bitflags! {
    /// Which optional sections follow the Elias–Fano character-count table
    /// in the serialized index.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct SectionFlags: u8 {
        const SAMPLING = 0b0001_0000;
        const RLE = 0b0000_0001;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FmIndexParams {
    /// Suffix-array sampling rate; `0` disables sampling.
    pub sampling: u64,
    pub rle: bool,
}

impl Default for FmIndexParams {
    fn default() -> Self {
        FmIndexParams { sampling: 0, rle: false }
    }
}

#[derive(Clone, Debug)]
struct Sampling {
    sample_bits: u32,
    table: Vec<u64>,
    sampled: Bitsequence,
}

#[derive(Clone, Debug)]
struct Rle {
    bits: Bitsequence,
    select_bits: Bitsequence,
}

#[derive(Clone, Debug)]
pub struct FmIndex {
    /// Length of the (possibly RLE-compacted) BWT.
    n: u64,
    c: EliasFano,
    sampling: Option<Sampling>,
    rle: Option<Rle>,
    bwt: WaveletTree,
}

fn rank_signed(bwt: &WaveletTree, c: u8, i: i64) -> u64 {
    if i < 0 {
        0
    } else {
        bwt.rank(c, i as u64)
    }
}

/// Run-length-encodes `bwt` in place: returns the compacted BWT plus the two
/// bit arrays describing run starts (`bits`, length `n`) and, grouping runs
/// by byte value, where each character's runs begin in the expanded `n`-bit
/// domain (`select_bits`, length `n + 1`).
fn rle_create(bwt: &[u8]) -> (Vec<u8>, BitArray, BitArray) {
    let n = bwt.len();
    let mut bits = BitArray::with_len(n as u64);
    let mut compacted = Vec::new();
    let mut run_lengths = Vec::new();

    let mut last: i32 = -1;
    for (i, &b) in bwt.iter().enumerate() {
        if b as i32 != last {
            bits.set(i as u64, true);
            compacted.push(b);
            run_lengths.push(1u64);
        } else {
            *run_lengths.last_mut().expect("a run is open once a byte has been seen") += 1;
        }
        last = b as i32;
    }

    let rle_len = compacted.len();
    let mut indices: Vec<usize> = (0..rle_len).collect();
    indices.sort_by(|&i, &j| compacted[i].cmp(&compacted[j]).then(i.cmp(&j)));

    let mut select_bits = BitArray::with_len(n as u64 + 1);
    let mut index_bits = 0u64;
    let mut i = 0usize;
    while i < rle_len && index_bits < n as u64 {
        select_bits.set(index_bits, true);
        index_bits += run_lengths[indices[i]];
        i += 1;
    }
    select_bits.set(n as u64, true);

    (compacted, bits, select_bits)
}

impl FmIndex {
    /// `text` must end with the `\0` sentinel. `separators`, when sampling is
    /// enabled, marks dictionary-entry boundaries so sampled suffix-array
    /// positions are stored as entry indices rather than raw byte offsets.
    pub fn build(
        text: &[u8],
        separators: Option<&BitArray>,
        params: &FmIndexParams,
        bs_params: &BitsequenceParams,
    ) -> Self {
        assert!(!text.is_empty() && *text.last().unwrap() == EOF_BYTE, "text must end with the EOF sentinel");

        let n_orig = text.len();
        let sa = suffix_array::build(text);
        let bwt_full: Vec<u8> = sa
            .iter()
            .map(|&p| if p == 0 { text[n_orig - 1] } else { text[p as usize - 1] })
            .collect();

        let (bwt, rle) = if params.rle {
            let (compacted, bits, select_bits) = rle_create(&bwt_full);
            (
                compacted,
                Some(Rle {
                    bits: Bitsequence::build(&bits, bs_params),
                    select_bits: Bitsequence::build(&select_bits, bs_params),
                }),
            )
        } else {
            (bwt_full, None)
        };
        let n = bwt.len() as u64;

        let mut counts = [0u64; 257];
        let mut max_byte = 0usize;
        for &b in &bwt {
            counts[b as usize + 1] += 1;
            max_byte = max_byte.max(b as usize);
        }
        let len_c = max_byte + 2;
        for i in 1..len_c {
            counts[i] += counts[i - 1];
        }
        let c = EliasFano::build(&counts[..len_c], bs_params);

        let sampling = if params.sampling > 0 {
            let sample_rate = params.sampling;
            let table_size = (n_orig as u64 + sample_rate - 1) / sample_rate;
            let mut table = Vec::with_capacity(table_size as usize);
            let mut sampled_bits = BitArray::with_len(n_orig as u64 + 1);
            for (i, &pos) in sa.iter().enumerate() {
                if pos % sample_rate == 0 {
                    table.push(pos);
                    sampled_bits.set(i as u64, true);
                }
            }
            sampled_bits.set(n_orig as u64, true);

            if let Some(seps) = separators {
                let sep_bits = Bitsequence::build(seps, &BitsequenceParams::default());
                for v in table.iter_mut() {
                    *v = sep_bits.rank1(*v as i64).saturating_sub(1);
                }
            }

            let max_sampled = table.iter().copied().max().unwrap_or(0);
            Some(Sampling {
                sample_bits: bits_needed(max_sampled),
                table,
                sampled: Bitsequence::build(&sampled_bits, bs_params),
            })
        } else {
            None
        };

        FmIndex {
            n,
            c,
            sampling,
            rle,
            bwt: WaveletTree::build(&bwt, bs_params),
        }
    }

    /// Bounds-checked lookup into the cumulative-count table: a byte beyond
    /// the indexed alphabet can never match, so callers treat `None` as an
    /// empty range rather than panicking.
    fn c_get(&self, b: u8) -> Option<u64> {
        let idx = b as u64;
        if idx + 1 >= self.c.len() {
            None
        } else {
            Some(self.c.get(idx))
        }
    }

    fn locate_reg(&self, pattern: &[u8]) -> Option<(u64, u64)> {
        let mut i = pattern.len() - 1;
        let c0 = self.c_get(pattern[i])?;
        let c1 = self.c.get(pattern[i] as u64 + 1);
        let mut sp = c0 as i64;
        let mut ep = c1 as i64 - 1;

        while sp <= ep && i >= 1 {
            i -= 1;
            let ch = pattern[i];
            let c0 = self.c_get(ch)?;
            sp = c0 as i64 + rank_signed(&self.bwt, ch, sp - 1) as i64;
            ep = c0 as i64 + rank_signed(&self.bwt, ch, ep) as i64 - 1;
        }

        if sp <= ep {
            Some((sp as u64, ep as u64))
        } else {
            None
        }
    }

    fn locate_rle(&self, pattern: &[u8]) -> Option<(u64, u64)> {
        let rle = self.rle.as_ref().expect("locate_rle only called when rle is configured");
        let mut i = pattern.len() - 1;
        let ch0 = pattern[i];
        let c0 = self.c_get(ch0)?;
        let c1 = self.c.get(ch0 as u64 + 1);
        let mut sp = rle.select_bits.select1(c0 + 1);
        let mut ep = rle.select_bits.select1(c1 + 1) - 1;

        while sp <= ep && i >= 1 {
            i -= 1;
            let ch = pattern[i];
            let c0 = self.c_get(ch)?;

            let rank_sp = rle.bits.rank1(sp) as i64 - 1;
            sp = if rank_signed(&self.bwt, ch, rank_sp) == ch as u64 {
                sp - rle.bits.selectprev1(sp)
            } else {
                0
            };
            sp += rle.select_bits.select1(c0 + 1 + rank_signed(&self.bwt, ch, rank_sp - 1));

            let rank_ep = rle.bits.rank1(ep) as i64 - 1;
            ep = if rank_signed(&self.bwt, ch, rank_ep) == ch as u64 {
                ep - rle.bits.selectprev1(ep)
            } else {
                -1
            };
            ep += rle.select_bits.select1(c0 + 1 + rank_signed(&self.bwt, ch, rank_ep - 1));
        }

        if sp <= ep {
            Some((sp as u64, ep as u64))
        } else {
            None
        }
    }

    fn wavelet_rank_at(&self, c: u8, i: i64) -> u64 {
        rank_signed(&self.bwt, c, i)
    }

    /// Backward search for `pattern`, returning the matching `[sp, ep]` BWT
    /// row range, or `None` if the pattern never occurs.
    pub fn locate(&self, pattern: &[u8]) -> Option<(u64, u64)> {
        if pattern.is_empty() {
            return None;
        }
        if self.rle.is_some() {
            self.locate_rle(pattern)
        } else {
            self.locate_reg(pattern)
        }
    }

    fn sampled_get(&self, sampling: &Sampling, i: u64) -> u64 {
        if sampling.sample_bits == 0 {
            return 0;
        }
        sampling.table[i as usize]
    }

    fn is_sampled(&self, i: u64) -> bool {
        match &self.sampling {
            Some(s) => s.sampled.access(i),
            None => false,
        }
    }

    /// Resolves BWT row `i` to its original text position (or, with
    /// sampling, the stored entry index). Walks LF backward until a sampled
    /// row or the EOF byte is hit.
    pub fn locate_match(&self, mut i: u64) -> u64 {
        if let Some(rle) = &self.rle {
            let mut c = 0xffu8;
            loop {
                if self.is_sampled(i) {
                    break;
                }
                let rank = rle.bits.rank1(i as i64) as i64 - 1;
                c = self.bwt.access(rank as u64).0;
                if c == EOF_BYTE {
                    break;
                }
                let c0 = self.c_get(c).expect("byte observed in the bwt is always in range");
                i = rle
                    .select_bits
                    .select1(c0 + 1 + self.wavelet_rank_at(c, rank - 1)) as u64
                    + i
                    - rle.bits.selectprev1(i as i64) as u64;
            }

            if self.is_sampled(i) {
                let sampling = self.sampling.as_ref().expect("sampling configured when is_sampled can be true");
                let rank = sampling.sampled.rank1(i as i64) - 1;
                self.sampled_get(sampling, rank)
            } else {
                let rank = rle.bits.rank1(i as i64) as i64 - 1;
                let c0 = self.c_get(c).expect("byte observed in the bwt is always in range");
                let first_run = rle.select_bits.select1(c0 + 1 + self.wavelet_rank_at(c, rank)) as u64;
                let index = i - rle.bits.selectprev1(i as i64) as u64;
                let first_ch = rle.select_bits.select1(c0 + 1) as u64;
                first_run + index + first_ch - 1
            }
        } else {
            let mut c = 0xffu8;
            loop {
                if self.is_sampled(i) {
                    break;
                }
                let (byte, rank) = self.bwt.access(i);
                c = byte;
                if c == EOF_BYTE {
                    break;
                }
                let c0 = self.c_get(c).expect("byte observed in the bwt is always in range");
                i = c0 + rank - 1;
            }

            if self.is_sampled(i) {
                let sampling = self.sampling.as_ref().expect("sampling configured when is_sampled can be true");
                let rank = sampling.sampled.rank1(i as i64) - 1;
                self.sampled_get(sampling, rank)
            } else {
                self.wavelet_rank_at(c, i as i64).saturating_sub(2)
            }
        }
    }

    /// Reconstructs the original text ending at row `i`, stopping at the
    /// leading `\0`.
    pub fn extract(&self, mut i: u64) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(rle) = &self.rle {
            loop {
                let rank = rle.bits.rank1(i as i64) as i64 - 1;
                let c = self.bwt.access(rank as u64).0;
                if c == EOF_BYTE {
                    break;
                }
                out.push(c);

                i = i - rle.bits.selectprev1(i as i64) as u64;
                let c0 = self.c_get(c).expect("byte observed in the bwt is always in range");
                i += rle.select_bits.select1(c0 + self.wavelet_rank_at(c, rank - 1) + 1) as u64;
            }
        } else {
            loop {
                let (c, rank) = self.bwt.access(i);
                if c == EOF_BYTE {
                    break;
                }
                out.push(c);
                let c0 = self.c_get(c).expect("byte observed in the bwt is always in range");
                i = c0 + rank - 1;
            }
        }
        out.reverse();
        out
    }

    pub fn write(&self, w: &mut BitWriter) {
        let mut w0 = BitWriter::new();
        self.c.write(&mut w0);

        let mut w1 = BitWriter::new();
        let mut w2 = BitWriter::new();
        if let Some(s) = &self.sampling {
            w1.write_vbyte(s.sample_bits as u64);
            w1.write_vbyte(s.table.len() as u64);
            for &v in &s.table {
                w1.write_bits(v, s.sample_bits);
            }
            w1.flush();
            s.sampled.write(&mut w2);
        }

        let mut w3 = BitWriter::new();
        let mut w4 = BitWriter::new();
        if let Some(r) = &self.rle {
            r.bits.write(&mut w3);
            r.select_bits.write(&mut w4);
        }

        w.write_vbyte(self.n);
        let mut opts = SectionFlags::empty();
        opts.set(SectionFlags::SAMPLING, self.sampling.is_some());
        opts.set(SectionFlags::RLE, self.rle.is_some());
        w.write_byte(opts.bits());
        w.write_vbyte(w0.byte_len());
        if self.sampling.is_some() {
            w.write_vbyte(w1.byte_len());
            w.write_vbyte(w2.byte_len());
        }
        if self.rle.is_some() {
            w.write_vbyte(w3.byte_len());
            w.write_vbyte(w4.byte_len());
        }

        w.write_sub_block(&w0.into_bytes());
        if self.sampling.is_some() {
            w.write_sub_block(&w1.into_bytes());
            w.write_sub_block(&w2.into_bytes());
        }
        if self.rle.is_some() {
            w.write_sub_block(&w3.into_bytes());
            w.write_sub_block(&w4.into_bytes());
        }
        self.bwt.write(w);
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let n = r.read_vbyte()?;
        let opts = SectionFlags::from_bits_truncate(r.read_byte()?);
        let with_sampling = opts.contains(SectionFlags::SAMPLING);
        let with_rle = opts.contains(SectionFlags::RLE);

        let len_c = r.read_vbyte()?;
        let (len_suff, len_sampled_bits) = if with_sampling {
            (Some(r.read_vbyte()?), Some(r.read_vbyte()?))
        } else {
            (None, None)
        };
        let (len_rle, len_rle_select) = if with_rle {
            (Some(r.read_vbyte()?), Some(r.read_vbyte()?))
        } else {
            (None, None)
        };

        let c_start = r.abs_byte_offset();
        let c = EliasFano::read(r)?;
        r.seek_to_byte(c_start + len_c);

        let sampling = if with_sampling {
            let start = r.abs_byte_offset();
            let sample_bits = r.read_vbyte()? as u32;
            let count = r.read_vbyte()?;
            let mut table = Vec::with_capacity(count as usize);
            for _ in 0..count {
                table.push(r.read_bits(sample_bits)?);
            }
            r.align_byte();
            r.seek_to_byte(start + len_suff.unwrap());

            let sampled = Bitsequence::read(r)?;
            r.seek_to_byte(start + len_suff.unwrap() + len_sampled_bits.unwrap());

            Some(Sampling { sample_bits, table, sampled })
        } else {
            None
        };

        let rle = if with_rle {
            let start = r.abs_byte_offset();
            let bits = Bitsequence::read(r)?;
            r.seek_to_byte(start + len_rle.unwrap());

            let select_bits = Bitsequence::read(r)?;
            r.seek_to_byte(start + len_rle.unwrap() + len_rle_select.unwrap());

            Some(Rle { bits, select_bits })
        } else {
            None
        };

        let bwt = WaveletTree::read(r)?;

        Ok(FmIndex { n, c, sampling, rle, bwt })
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

    fn text() -> Vec<u8> {
        b"\0alpha\0beta\0gamma\0alpha\0".to_vec()
    }

    #[test]
    fn locate_finds_every_exact_occurrence() {
        let idx = FmIndex::build(&text(), None, &FmIndexParams::default(), &BitsequenceParams::default());
        let hits = idx.locate(b"\0alpha\0");
        assert!(hits.is_some());
        let (sp, ep) = hits.unwrap();
        assert_eq!(ep - sp + 1, 2); // "alpha" occurs twice
    }

    #[test]
    fn locate_rejects_absent_pattern() {
        let idx = FmIndex::build(&text(), None, &FmIndexParams::default(), &BitsequenceParams::default());
        assert!(idx.locate(b"\0delta\0").is_none());
    }

    #[test]
    fn extract_recovers_each_entry() {
        let t = text();
        let idx = FmIndex::build(&t, None, &FmIndexParams::default(), &BitsequenceParams::default());
        let (sp, _) = idx.locate(b"\0beta\0").unwrap();
        let extracted = idx.extract(sp);
        assert_eq!(extracted, b"beta\0");
    }

    #[test]
    fn write_read_round_trips_locate_and_extract() {
        let t = text();
        let idx = FmIndex::build(&t, None, &FmIndexParams::default(), &BitsequenceParams::default());
        let mut w = BitWriter::new();
        idx.write(&mut w);
        let bytes = w.into_bytes();
        let src = VecSource(bytes);
        let mut r = BitReader::new(&src, 0);
        let idx2 = FmIndex::read(&mut r).unwrap();

        assert_eq!(idx.locate(b"\0gamma\0"), idx2.locate(b"\0gamma\0"));
        let (sp, _) = idx2.locate(b"\0gamma\0").unwrap();
        assert_eq!(idx2.extract(sp), b"gamma\0");
    }

    #[test]
    fn rle_variant_round_trips_locate_and_extract() {
        let t = b"\0aaaa\0bbbb\0aaaa\0".to_vec();
        let params = FmIndexParams { sampling: 0, rle: true };
        let idx = FmIndex::build(&t, None, &params, &BitsequenceParams::default());
        let (sp, ep) = idx.locate(b"\0aaaa\0").unwrap();
        assert_eq!(ep - sp + 1, 2);
        assert_eq!(idx.extract(sp), b"aaaa\0");
    }

    #[test]
    fn sampling_variant_locate_match_resolves_to_sampled_position() {
        let t = text();
        let params = FmIndexParams { sampling: 2, rle: false };
        let idx = FmIndex::build(&t, None, &params, &BitsequenceParams::default());
        let (sp, _) = idx.locate(b"\0alpha\0").unwrap();
        // Shouldn't panic and should terminate.
        let _ = idx.locate_match(sp);
    }
}
