/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Grammar-expansion query engine: given a partially-bound pattern over an
//! edge's label and node connections, lazily walk the start symbol and
//! expand non-terminal edges only as far as needed to decide a match.

use crate::format::Grammar;
use std::collections::VecDeque;

/// A query over compact node/edge-label ids. `rank` of `None` matches
/// edges of any rank, in which case `nodes` must stay empty. `nodes[i] ==
/// Some(n)` pins connection `i` to node `n`; `None` leaves it
/// unconstrained. `label` pins the edge label; `None` leaves it
/// unconstrained.
#[derive(Clone, Debug)]
pub struct Query {
    pub rank: Option<usize>,
    pub label: Option<u64>,
    pub nodes: Vec<Option<u64>>,
    pub connected: Vec<u64>,
}

impl Query {
    pub fn new(rank: usize) -> Self {
        Query { rank: Some(rank), label: None, nodes: vec![None; rank], connected: Vec::new() }
    }

    /// A query matching edges of any rank. Only the label and node
    /// *membership* (via [`Query::with_connected_node`]) can be
    /// constrained, since there is no fixed slot to pin a node to.
    pub fn any_rank() -> Self {
        Query { rank: None, label: None, nodes: Vec::new(), connected: Vec::new() }
    }

    pub fn with_label(mut self, label: u64) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_node(mut self, slot: usize, node: u64) -> Self {
        self.nodes[slot] = Some(node);
        self
    }

    /// Requires `node` to be one of the edge's connections, at any slot.
    /// Meaningful for both fixed- and any-rank queries.
    pub fn with_connected_node(mut self, node: u64) -> Self {
        self.connected.push(node);
        self
    }

    fn matches(&self, label: u64, nodes: &[u64]) -> bool {
        if let Some(rank) = self.rank {
            if nodes.len() != rank {
                return false;
            }
        }
        if let Some(want) = self.label {
            if want != label {
                return false;
            }
        }
        for (slot, want) in self.nodes.iter().enumerate() {
            if let Some(want) = want {
                if nodes[slot] != *want {
                    return false;
                }
            }
        }
        for want in &self.connected {
            if !nodes.contains(want) {
                return false;
            }
        }
        true
    }

    /// Any node value this query pins, used to prune non-terminal edges
    /// before expanding them.
    fn fixed_nodes(&self) -> impl Iterator<Item = u64> + '_ {
        self.nodes.iter().filter_map(|n| *n).chain(self.connected.iter().copied())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub label: u64,
    pub nodes: Vec<u64>,
}

/// Lazily enumerates every terminal edge reachable by expanding the start
/// symbol that matches `query`. Candidate start-symbol rows are drawn from
/// whichever index is cheapest for the query's bound fields; non-terminal
/// edges are pruned by the reachability table (when present) and by
/// node-membership before being expanded.
pub struct EdgeIter<'r> {
    grammar: &'r Grammar,
    query: Query,
    candidates: Box<dyn Iterator<Item = u64> + 'r>,
    queue: VecDeque<Edge>,
    finished: bool,
}

impl<'r> EdgeIter<'r> {
    pub fn new(grammar: &'r Grammar, query: Query) -> Self {
        let candidates: Box<dyn Iterator<Item = u64> + 'r> = match (query.label, query.fixed_nodes().next()) {
            (Some(label), _) => {
                let first_nt = grammar.rules.first_nt();
                Box::new(grammar.start_symbol.label_iter(label, first_nt))
            }
            (None, Some(node)) => Box::new(grammar.start_symbol.edges_with_node(node)),
            (None, None) => Box::new(0..grammar.start_symbol.edge_count()),
        };

        EdgeIter { grammar, query, candidates, queue: VecDeque::new(), finished: false }
    }

    /// Stops the expansion early, dropping any queued but unexamined
    /// candidates. Idempotent — a second call, or letting the iterator
    /// drop without calling it, is equally safe since [`Drop`] calls the
    /// same cleanup.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.queue.clear();
        self.candidates = Box::new(std::iter::empty());
        self.finished = true;
    }

    /// Pushes a non-terminal edge's expansion onto the queue, unless the
    /// reachability table or a node-membership check already rules it out.
    fn expand(&mut self, label: u64, nodes: Vec<u64>) {
        if let Some(nt_table) = &self.grammar.nt_table {
            if let Some(want) = self.query.label {
                let nt_index = self.grammar.nt_index(label);
                if !nt_table.derives(nt_index, want) {
                    return;
                }
            }
        }
        for want in self.query.fixed_nodes() {
            if !nodes.contains(&want) {
                return;
            }
        }

        let body = match self.grammar.rules.get(label) {
            Some(body) => body,
            None => return,
        };
        for body_edge in body.edges() {
            let remapped: Vec<u64> = body_edge.nodes.iter().map(|&slot| nodes[slot as usize]).collect();
            self.queue.push_back(Edge { label: body_edge.label, nodes: remapped });
        }
    }
}

impl<'r> Drop for EdgeIter<'r> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<'r> Iterator for EdgeIter<'r> {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        loop {
            while let Some(edge) = self.queue.pop_front() {
                if self.grammar.rules.first_nt() <= edge.label {
                    self.expand(edge.label, edge.nodes);
                    continue;
                }
                if self.query.matches(edge.label, &edge.nodes) {
                    return Some(edge);
                }
            }

            let row = self.candidates.next()?;
            let (label, nodes) = self.grammar.start_symbol.get_edge(row);
            if self.grammar.rules.first_nt() <= label {
                self.expand(label, nodes);
            } else if self.query.matches(label, &nodes) {
                return Some(Edge { label, nodes });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{repair, HEdge, HGraph};
    use crate::succinct::BitsequenceParams;

    // Builds a tiny grammar over a triangle a-b, b-c, c-a (label 0) plus a
    // disjoint edge a-d (label 1), with node ids 0..4 and terminals 0..2,
    // then runs it through repair so some edges end up inside rules.
    fn sample_grammar() -> Grammar {
        let mut g = HGraph::new(None);
        g.add_edge(HEdge::new(0, vec![0, 1]));
        g.add_edge(HEdge::new(0, vec![1, 2]));
        g.add_edge(HEdge::new(0, vec![2, 0]));
        g.add_edge(HEdge::new(1, vec![0, 3]));

        let slhr = repair(g, 4, 2, 12, false);
        Grammar::build(&slhr, 4, 2, true, &BitsequenceParams::default())
    }

    #[test]
    fn finds_every_edge_with_an_unconstrained_query() {
        let grammar = sample_grammar();
        let query = Query::new(2);
        let found: Vec<Edge> = EdgeIter::new(&grammar, query).collect();
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn finds_edges_by_fixed_label() {
        let grammar = sample_grammar();
        let query = Query::new(2).with_label(1);
        let found: Vec<Edge> = EdgeIter::new(&grammar, query).collect();
        assert_eq!(found, vec![Edge { label: 1, nodes: vec![0, 3] }]);
    }

    #[test]
    fn finds_edges_incident_to_a_fixed_node() {
        let grammar = sample_grammar();
        let query = Query::new(2).with_node(0, 2);
        let mut found: Vec<Edge> = EdgeIter::new(&grammar, query).collect();
        found.sort_by(|a, b| a.nodes.cmp(&b.nodes));
        assert_eq!(found, vec![Edge { label: 0, nodes: vec![2, 0] }]);
    }
}
