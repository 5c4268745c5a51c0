/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Writer: accepts hyperedges, builds the label dictionary, runs RePair, and
//! serializes the result to a single file. Mirrors the original's two-state
//! design — a pre-compress container that dedups and interns labels, and a
//! post-compress grammar+dictionary pair that is purely write-only.

use crate::fm_index::FmIndexParams;
use crate::format::{Dictionary, Grammar};
use crate::grammar::{repair, HEdge, HGraph};
use crate::succinct::BitsequenceParams;
use crate::utils::ProgressLogger;
use anyhow::{ensure, Context, Result};
use log::info;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write as _;

#[derive(Clone, Copy, Debug)]
pub struct WriterParams {
    pub max_rank: usize,
    pub monograms: bool,
    pub factor: u32,
    pub sampling: u64,
    pub rle: bool,
    pub nt_table: bool,
    #[cfg(feature = "rrr")]
    pub rrr: bool,
}

impl Default for WriterParams {
    fn default() -> Self {
        WriterParams {
            max_rank: 12,
            monograms: false,
            factor: 8,
            sampling: 32,
            rle: true,
            nt_table: true,
            #[cfg(feature = "rrr")]
            rrr: false,
        }
    }
}

impl WriterParams {
    fn bs_params(&self) -> BitsequenceParams {
        BitsequenceParams {
            factor: self.factor,
            #[cfg(feature = "rrr")]
            rrr: self.rrr,
        }
    }

    fn fm_params(&self) -> FmIndexParams {
        FmIndexParams {
            sampling: self.sampling,
            rle: self.rle,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct RawEdge {
    label: Vec<u8>,
    nodes: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Pending {
    /// Every distinct byte-string label seen, either as a node or as an
    /// edge label (or both), with the roles it has been used in so far.
    dict: HashMap<Vec<u8>, (bool, bool)>,
    edges: HashSet<RawEdge>,
}

enum State {
    Building(Pending),
    Compressed { grammar: Grammar, dictionary: Dictionary },
    Destroyed,
}

pub struct Writer {
    params: WriterParams,
    state: State,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            params: WriterParams::default(),
            state: State::Building(Pending::default()),
        }
    }

    pub fn set_params(&mut self, params: WriterParams) {
        self.params = params;
    }

    fn pending_mut(&mut self) -> &mut Pending {
        match &mut self.state {
            State::Building(p) => p,
            _ => panic!("cannot add edges or nodes after compress()"),
        }
    }

    pub fn add_node(&mut self, label: &[u8]) {
        let pending = self.pending_mut();
        let entry = pending.dict.entry(label.to_vec()).or_insert((false, false));
        entry.0 = true;
    }

    /// `nodes.len()` is the edge's rank.
    pub fn add_edge(&mut self, label: &[u8], nodes: &[&[u8]]) {
        ensure_rank_limit(nodes.len());
        let pending = self.pending_mut();
        pending.dict.entry(label.to_vec()).or_insert((false, false)).1 = true;
        for &n in nodes {
            pending.dict.entry(n.to_vec()).or_insert((false, false)).0 = true;
        }
        pending.edges.insert(RawEdge {
            label: label.to_vec(),
            nodes: nodes.iter().map(|n| n.to_vec()).collect(),
        });
    }

    /// Builds the dictionary, remaps every edge to compact ids, runs
    /// RePair, and flips the writer into its post-compress state.
    pub fn compress(&mut self) {
        let pending = match std::mem::replace(&mut self.state, State::Destroyed) {
            State::Building(p) => p,
            _ => panic!("compress() called twice"),
        };

        let dict: BTreeMap<Vec<u8>, (bool, bool)> = pending.dict.into_iter().collect();

        let mut node_id_of: HashMap<&[u8], u64> = HashMap::new();
        let mut edge_id_of: HashMap<&[u8], u64> = HashMap::new();
        let mut node_ctr = 0u64;
        let mut edge_ctr = 0u64;
        for (key, &(is_node, is_edge)) in &dict {
            if is_node {
                node_id_of.insert(key.as_slice(), node_ctr);
                node_ctr += 1;
            }
            if is_edge {
                edge_id_of.insert(key.as_slice(), edge_ctr);
                edge_ctr += 1;
            }
        }
        let node_count = node_ctr;
        let terminals = edge_ctr;

        let mut start_symbol = HGraph::new(None);
        let mut progress = ProgressLogger::new("writer: remapping edges");
        progress.start();
        for edge in &pending.edges {
            let label = *edge_id_of.get(edge.label.as_slice()).expect("every edge label was registered in the dictionary");
            let nodes = edge
                .nodes
                .iter()
                .map(|n| *node_id_of.get(n.as_slice()).expect("every edge node was registered in the dictionary"))
                .collect();
            start_symbol.add_edge(HEdge::new(label, nodes));
            progress.light_update();
        }
        progress.done();

        info!(
            "writer: compressing {} edges over {} nodes, {} distinct labels",
            start_symbol.len(),
            node_count,
            terminals
        );
        let slhr = repair(start_symbol, node_count, terminals, self.params.max_rank, self.params.monograms);

        let bs_params = self.params.bs_params();
        let grammar = Grammar::build(&slhr, node_count, terminals, self.params.nt_table, &bs_params);
        let dictionary = Dictionary::build(&dict, &self.params.fm_params(), &bs_params);

        self.state = State::Compressed { grammar, dictionary };
    }

    /// Serializes the compressed graph to `path`. `compress()` must have
    /// been called first.
    pub fn write<P: AsRef<std::path::Path>>(&self, path: P, verbose: bool) -> Result<()> {
        let (grammar, dictionary) = match &self.state {
            State::Compressed { grammar, dictionary } => (grammar, dictionary),
            State::Building(_) => panic!("write() called before compress()"),
            State::Destroyed => panic!("write() called on a destroyed writer"),
        };

        let bs_params = self.params.bs_params();

        let mut w_grammar = crate::bits::BitWriter::new();
        grammar.write(&mut w_grammar, &bs_params);
        let grammar_bytes = w_grammar.into_bytes();

        let mut w_dict = crate::bits::BitWriter::new();
        dictionary.write(&mut w_dict);
        let dict_bytes = w_dict.into_bytes();

        if verbose {
            info!(
                "writer: grammar section {} bytes, dictionary section {} bytes",
                grammar_bytes.len(),
                dict_bytes.len()
            );
        }

        let mut header = crate::bits::BitWriter::new();
        header.write_vbyte(grammar_bytes.len() as u64);
        let header_bytes = header.into_bytes();

        let path = path.as_ref();
        let mut file = std::fs::File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        file.write_all(crate::MAGIC).with_context(|| format!("cannot write to {}", path.display()))?;
        file.write_all(&header_bytes)?;
        file.write_all(&grammar_bytes)?;
        file.write_all(&dict_bytes)?;
        Ok(())
    }

    pub fn destroy(mut self) {
        self.state = State::Destroyed;
    }
}

fn ensure_rank_limit(rank: usize) {
    ensure_within_limit(rank).expect("edge rank exceeds the hard limit");
}

fn ensure_within_limit(rank: usize) -> Result<()> {
    ensure!(rank <= crate::LIMIT_MAX_RANK, "edge rank {rank} exceeds LIMIT_MAX_RANK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_assigns_compact_ids_by_sorted_label_rank() {
        let mut w = Writer::new();
        w.add_edge(b"knows", &[b"bob", b"alice"]);
        w.add_edge(b"knows", &[b"alice", b"carol"]);
        w.compress();
        match &w.state {
            State::Compressed { grammar, dictionary } => {
                assert_eq!(grammar.node_count, 3);
                assert_eq!(dictionary.node_count(), 3);
                assert_eq!(dictionary.edge_label_count(), 1);
            }
            _ => panic!("expected compressed state"),
        }
    }

    #[test]
    fn write_round_trips_through_a_temp_file() {
        let mut w = Writer::new();
        w.add_edge(b"knows", &[b"bob", b"alice"]);
        w.add_edge(b"likes", &[b"alice", b"coffee"]);
        w.compress();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.cg");
        w.write(&path, false).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > crate::MAGIC.len() as u64);
    }
}
