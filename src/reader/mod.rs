/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Reader: opens a compressed file and answers dictionary and graph
//! queries against it without ever materializing the decompressed graph.

mod neighborhood;
pub use neighborhood::{Edge, EdgeIter, Query};

use crate::bits::{BitReader, BlockCacheSource, ByteSource, MmapSource};
use crate::format::{Dictionary, Grammar};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::Path;

pub struct Reader {
    grammar: Grammar,
    dictionary: Dictionary,
}

impl Reader {
    /// Opens a compressed graph file, mapping it whole into memory. The
    /// mapping is dropped once the grammar and dictionary have been parsed
    /// out of it, so the returned `Reader` owns no file handle.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = MmapSource::load(path).with_context(|| format!("cannot open {}", path.display()))?;
        Self::parse(&source, path)
    }

    /// Like [`Reader::open`], but reads the file through a small LRU block
    /// cache instead of mapping it whole — for files too large to map, or
    /// platforms where `mmap` isn't available.
    pub fn open_with_cache<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = BlockCacheSource::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        Self::parse(&source, path)
    }

    fn parse<S: ByteSource>(source: &S, path: &Path) -> Result<Self> {
        let mut r = BitReader::new(source, 0);

        let magic = r.read_bytes(crate::MAGIC.len())?;
        if magic.as_slice() != crate::MAGIC.as_slice() {
            bail!("{}: not a compressed graph file (bad magic)", path.display());
        }

        let grammar_byte_len = r.read_vbyte()?;
        let grammar_start = r.abs_byte_offset();
        let grammar = Grammar::read(&mut r)?;
        r.seek_to_byte(grammar_start + grammar_byte_len);

        let dictionary = Dictionary::read(&mut r)?;

        Ok(Reader { grammar, dictionary })
    }

    pub fn node_count(&self) -> u64 {
        self.dictionary.node_count()
    }

    pub fn edge_label_count(&self) -> u64 {
        self.dictionary.edge_label_count()
    }

    /// The byte-string label of compact node id `id`.
    pub fn extract_node(&self, id: u64) -> Option<Vec<u8>> {
        if id >= self.dictionary.node_count() {
            return None;
        }
        Some(self.dictionary.extract_entry(self.dictionary.node_id(id)))
    }

    pub fn extract_edge_label(&self, id: u64) -> Option<Vec<u8>> {
        if id >= self.dictionary.edge_label_count() {
            return None;
        }
        Some(self.dictionary.extract_entry(self.dictionary.edge_label_id(id)))
    }

    /// The compact node id assigned to `label`, if it is used as a node.
    pub fn locate_node(&self, label: &[u8]) -> Option<u64> {
        let id = self.dictionary.locate_entry(label)?;
        if !self.dictionary.is_node_label(id) {
            return None;
        }
        Some(self.dictionary.node_rank(id))
    }

    pub fn locate_edge_label(&self, label: &[u8]) -> Option<u64> {
        let id = self.dictionary.locate_entry(label)?;
        if !self.dictionary.is_edge_label(id) {
            return None;
        }
        Some(self.dictionary.edge_label_rank(id))
    }

    /// Compact node ids of every node label starting with `prefix`, in
    /// sorted order.
    pub fn locate_node_prefix(&self, prefix: &[u8]) -> Vec<u64> {
        let (lo, hi) = match self.dictionary.locate_prefix(prefix) {
            Some(range) => range,
            None => return Vec::new(),
        };
        (lo..=hi)
            .filter(|&id| self.dictionary.is_node_label(id))
            .map(|id| self.dictionary.node_rank(id))
            .collect()
    }

    /// Compact node ids of every node label containing `substring`
    /// anywhere, deduplicated.
    pub fn search_node(&self, substring: &[u8]) -> Vec<u64> {
        let (sp, ep) = match self.dictionary.locate_substr(substring) {
            Some(range) => range,
            None => return Vec::new(),
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in sp..=ep {
            let id = self.dictionary.match_at(row);
            if !self.dictionary.is_node_label(id) {
                continue;
            }
            if seen.insert(id) {
                out.push(self.dictionary.node_rank(id));
            }
        }
        out.sort_unstable();
        out
    }

    /// Every rank-`rank` edge matching `query`.
    pub fn edges(&self, query: Query) -> EdgeIter<'_> {
        EdgeIter::new(&self.grammar, query)
    }

    /// Every edge labelled `label`, of any rank.
    pub fn edges_by_label(&self, label: u64) -> EdgeIter<'_> {
        self.edges(Query::any_rank().with_label(label))
    }

    pub fn edge_exists(&self, label: u64, nodes: &[u64]) -> bool {
        let mut query = Query::new(nodes.len()).with_label(label);
        for (slot, &n) in nodes.iter().enumerate() {
            query = query.with_node(slot, n);
        }
        self.edges(query).next().is_some()
    }

    /// Every edge of rank `nodes.len()` connecting exactly `nodes` in
    /// order, regardless of label.
    pub fn edges_connecting(&self, nodes: &[u64]) -> Vec<Edge> {
        let mut query = Query::new(nodes.len());
        for (slot, &n) in nodes.iter().enumerate() {
            query = query.with_node(slot, n);
        }
        self.edges(query).collect()
    }

    /// Every distinct node connected to `node` by some edge, deduplicated.
    pub fn nodes_connected(&self, node: u64) -> Vec<u64> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for edge in self.edges(Query::any_rank().with_connected_node(node)) {
            for &n in &edge.nodes {
                if n != node && seen.insert(n) {
                    out.push(n);
                }
            }
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Writer;

    #[test]
    fn open_round_trips_a_tiny_graph() {
        let mut w = Writer::new();
        w.add_edge(b"knows", &[b"alice", b"bob"]);
        w.add_edge(b"knows", &[b"bob", b"carol"]);
        w.add_edge(b"likes", &[b"alice", b"coffee"]);
        w.compress();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.cg");
        w.write(&path, false).unwrap();

        let reader = Reader::open(&path).unwrap();
        assert_eq!(reader.node_count(), 4);
        assert_eq!(reader.edge_label_count(), 2);

        let alice = reader.locate_node(b"alice").unwrap();
        let bob = reader.locate_node(b"bob").unwrap();
        assert!(reader.locate_edge_label(b"knows").is_some());
        assert!(reader.edge_exists(reader.locate_edge_label(b"knows").unwrap(), &[alice, bob]));

        let connected = reader.nodes_connected(alice);
        assert!(connected.contains(&bob));
    }

    #[test]
    fn open_with_cache_round_trips_the_same_graph_as_open() {
        let mut w = Writer::new();
        w.add_edge(b"knows", &[b"alice", b"bob"]);
        w.add_edge(b"knows", &[b"bob", b"carol"]);
        w.compress();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.cg");
        w.write(&path, false).unwrap();

        let reader = Reader::open_with_cache(&path).unwrap();
        assert_eq!(reader.node_count(), 3);
        assert_eq!(reader.edge_label_count(), 1);

        let alice = reader.locate_node(b"alice").unwrap();
        let bob = reader.locate_node(b"bob").unwrap();
        let label = reader.locate_edge_label(b"knows").unwrap();
        assert!(reader.edge_exists(label, &[alice, bob]));
    }
}
