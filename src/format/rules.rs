/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! On-disk rule table: every non-terminal's right-hand side, Elias-δ encoded
//! back to back with no byte padding between bodies, addressed through an
//! Elias–Fano offset table.

use crate::bits::{BitReader, BitWriter, ByteSource};
use crate::grammar::{HEdge, HGraph, SlhrGrammar, START_SYMBOL};
use crate::succinct::{BitsequenceParams, EliasFano};
use anyhow::Result;

#[derive(Clone, Debug)]
pub struct RuleTable {
    first_nt: u64,
    /// `bodies[i]` is the rule body for symbol `first_nt + i`.
    bodies: Vec<HGraph>,
}

fn body_bit_len(body: &HGraph) -> u64 {
    let mut probe = BitWriter::new();
    encode_body(body, &mut probe);
    probe.bit_len()
}

fn encode_body(body: &HGraph, w: &mut BitWriter) {
    w.write_elias_delta(body.len() as u64);
    for edge in body.edges() {
        w.write_elias_delta(edge.label);
        w.write_elias_delta(edge.rank as u64);
        for &node in &edge.nodes {
            w.write_elias_delta(node);
        }
    }
}

fn decode_body<S: ByteSource>(r: &mut BitReader<S>, rank: Option<usize>) -> Result<HGraph> {
    let n = r.read_elias_delta()?;
    let mut g = HGraph::new(rank);
    for _ in 0..n {
        let label = r.read_elias_delta()?;
        let edge_rank = r.read_elias_delta()? as usize;
        let mut nodes = Vec::with_capacity(edge_rank);
        for _ in 0..edge_rank {
            nodes.push(r.read_elias_delta()?);
        }
        g.add_edge(HEdge::new(label, nodes));
    }
    Ok(g)
}

impl RuleTable {
    pub fn build(grammar: &SlhrGrammar) -> Self {
        let first_nt = grammar.min_nt;
        let mut bodies = Vec::new();
        let mut symbol = grammar.next_rule(Some(START_SYMBOL));
        while let Some(s) = symbol {
            let slot = (s - first_nt) as usize;
            if slot >= bodies.len() {
                bodies.resize_with(slot + 1, || HGraph::new(None));
            }
            bodies[slot] = grammar.rule_get(s).expect("next_rule only yields present rules").clone();
            symbol = grammar.next_rule(Some(s));
        }
        RuleTable { first_nt, bodies }
    }

    pub fn first_nt(&self) -> u64 {
        self.first_nt
    }

    pub fn rule_count(&self) -> u64 {
        self.bodies.len() as u64
    }

    pub fn get(&self, symbol: u64) -> Option<&HGraph> {
        if symbol < self.first_nt {
            return None;
        }
        self.bodies.get((symbol - self.first_nt) as usize)
    }

    pub fn write(&self, w: &mut BitWriter, params: &BitsequenceParams) {
        w.write_vbyte(self.first_nt);
        w.write_vbyte(self.bodies.len() as u64);

        let mut offsets = Vec::with_capacity(self.bodies.len());
        let mut acc = 0u64;
        for body in &self.bodies {
            offsets.push(acc);
            acc += body_bit_len(body);
        }
        let offsets_ef = EliasFano::build(&offsets, params);
        let mut w_offsets = BitWriter::new();
        offsets_ef.write(&mut w_offsets);

        let mut w_bodies = BitWriter::new();
        for body in &self.bodies {
            encode_body(body, &mut w_bodies);
        }

        w.write_vbyte(w_offsets.byte_len());
        w.write_sub_block(&w_offsets.into_bytes());
        w.write_sub_block(&w_bodies.into_bytes());
        w.flush();
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let first_nt = r.read_vbyte()?;
        let rule_count = r.read_vbyte()?;

        let len_offsets = r.read_vbyte()?;
        let start = r.abs_byte_offset();
        let offsets_ef = EliasFano::read(r)?;
        r.seek_to_byte(start + len_offsets);

        debug_assert_eq!(offsets_ef.len(), rule_count);

        let mut bodies = Vec::with_capacity(rule_count as usize);
        for _ in 0..rule_count {
            bodies.push(decode_body(r, None)?);
        }

        Ok(RuleTable { first_nt, bodies })
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

    fn sample_grammar() -> SlhrGrammar {
        let mut g = SlhrGrammar::new(HGraph::new(None), 10);
        let mut r0 = HGraph::new(Some(2));
        r0.add_edge(HEdge::new(1, vec![0, 1]));
        r0.add_edge(HEdge::new(2, vec![1, 0]));
        g.rule_add(r0);
        let mut r1 = HGraph::new(Some(3));
        r1.add_edge(HEdge::new(3, vec![0, 1, 2]));
        g.rule_add(r1);
        g
    }

    #[test]
    fn get_returns_each_rule_body_unchanged() {
        let grammar = sample_grammar();
        let table = RuleTable::build(&grammar);
        assert_eq!(table.rule_count(), 2);
        for symbol in [10u64, 11u64] {
            let expected = grammar.rule_get(symbol).unwrap();
            let got = table.get(symbol).unwrap();
            let exp_edges: Vec<_> = expected.edges().cloned().collect();
            let got_edges: Vec<_> = got.edges().cloned().collect();
            assert_eq!(got_edges, exp_edges);
        }
    }

    #[test]
    fn write_read_round_trip_preserves_every_body() {
        let grammar = sample_grammar();
        let table = RuleTable::build(&grammar);
        let params = BitsequenceParams::default();

        let mut w = BitWriter::new();
        table.write(&mut w, &params);
        let bytes = w.into_bytes();
        let src = VecSource(bytes);
        let mut r = BitReader::new(&src, 0);
        let table2 = RuleTable::read(&mut r).unwrap();

        assert_eq!(table2.first_nt(), table.first_nt());
        assert_eq!(table2.rule_count(), table.rule_count());
        for symbol in table.first_nt()..table.first_nt() + table.rule_count() {
            let a: Vec<_> = table.get(symbol).unwrap().edges().cloned().collect();
            let b: Vec<_> = table2.get(symbol).unwrap().edges().cloned().collect();
            assert_eq!(a, b);
        }
    }
}
