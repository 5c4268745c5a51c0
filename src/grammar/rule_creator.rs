/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Builds rule bodies for newly-created non-terminals, and the replacement
//! edges that stand in for a matched digram/monogram occurrence or a rule
//! inlined back into its call sites.

use super::{AdjacencyType, HEdge, HGraph, Label, Monogram, NodeId};

/// One side of a 2-edge digram rule body: the shared node is always `0`;
/// every other connection gets a fresh id starting at `node_offset`.
fn digram_build_edge(label: Label, rank: usize, conn_type: usize, node_offset: NodeId) -> HEdge {
    let mut nodes = Vec::with_capacity(rank);
    let mut next = node_offset;
    for i in 0..rank {
        if i == conn_type {
            nodes.push(0);
        } else {
            nodes.push(next);
            next += 1;
        }
    }
    HEdge::new(label, nodes)
}

/// Rule body merging two hyperedges, `adj0`-shaped and `adj1`-shaped, at
/// their shared connection.
pub fn rule_creator_digram_init(adj0: AdjacencyType, rank0: usize, adj1: AdjacencyType, rank1: usize) -> HGraph {
    let edge0 = digram_build_edge(adj0.label, rank0, adj0.conn_type, 1);
    let edge1 = digram_build_edge(adj1.label, rank1, adj1.conn_type, rank0 as u64);
    let mut g = HGraph::new(Some(rank0 + rank1 - 1));
    g.add_edge(edge0);
    g.add_edge(edge1);
    g
}

/// Rule body collapsing `mono`'s two connections into one shared node `0`.
fn monogram_build_edge(label: Label, rank: usize, conn0: usize, conn1: usize) -> HEdge {
    let mut nodes = Vec::with_capacity(rank - 1);
    let mut next = 1u64;
    for i in 0..rank {
        if i == conn1 {
            continue;
        }
        if i == conn0 {
            nodes.push(0);
        } else {
            nodes.push(next);
            next += 1;
        }
    }
    HEdge::new(label, nodes)
}

pub fn rule_creator_monogram_init(mono: Monogram, rank: usize) -> HGraph {
    let edge = monogram_build_edge(mono.label, rank, mono.conn0, mono.conn1);
    let mut g = HGraph::new(Some(rank - 1));
    g.add_edge(edge);
    g
}

/// The edge that replaces a matched digram occurrence at its call site:
/// the shared node first, then `edge0`'s remaining nodes, then `edge1`'s.
pub fn rule_creator_digram_new_edge(
    new_label: Label,
    shared_node: NodeId,
    edge0: &HEdge,
    conn0: usize,
    edge1: &HEdge,
    conn1: usize,
) -> HEdge {
    let mut nodes = Vec::with_capacity(edge0.rank + edge1.rank - 1);
    nodes.push(shared_node);
    for (i, &n) in edge0.nodes.iter().enumerate() {
        if i != conn0 {
            nodes.push(n);
        }
    }
    for (i, &n) in edge1.nodes.iter().enumerate() {
        if i != conn1 {
            nodes.push(n);
        }
    }
    HEdge::new(new_label, nodes)
}

/// The edge that replaces a matched monogram occurrence: `edge` with its
/// `conn1`-th connection dropped.
pub fn rule_creator_monogram_new_edge(new_label: Label, edge: &HEdge, conn1: usize) -> HEdge {
    let nodes = edge
        .nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != conn1)
        .map(|(_, &n)| n)
        .collect();
    HEdge::new(new_label, nodes)
}

/// Expands `rule`'s body edges inline at the position of `hyperedge`
/// (whose label references `rule`), remapping each body edge's
/// connection-slot node ids through `hyperedge`'s actual nodes. Used by
/// pruning to inline a rarely-used rule back into every call site.
pub fn rule_inserter_edges_for_hyperedge(rule: &HGraph, hyperedge: &HEdge) -> Vec<HEdge> {
    rule.edges()
        .map(|body_edge| {
            let nodes = body_edge
                .nodes
                .iter()
                .map(|&idx| hyperedge.nodes[idx as usize])
                .collect();
            HEdge::new(body_edge.label, nodes)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digram_init_shares_node_zero() {
        let adj0 = AdjacencyType { label: 10, conn_type: 1 };
        let adj1 = AdjacencyType { label: 20, conn_type: 0 };
        let rule = rule_creator_digram_init(adj0, 2, adj1, 2);
        assert_eq!(rule.rank(), Some(3));
        let e0 = rule.get(0).unwrap();
        let e1 = rule.get(1).unwrap();
        assert_eq!(e0.nodes[1], 0);
        assert_eq!(e1.nodes[0], 0);
    }

    #[test]
    fn monogram_init_collapses_connections() {
        let mono = Monogram { label: 5, conn0: 0, conn1: 2 };
        let rule = rule_creator_monogram_init(mono, 3);
        assert_eq!(rule.rank(), Some(2));
        let e = rule.get(0).unwrap();
        assert_eq!(e.nodes[0], 0);
    }

    #[test]
    fn digram_new_edge_orders_shared_then_remaining() {
        let edge0 = HEdge::new(10, vec![100, 200]);
        let edge1 = HEdge::new(20, vec![200, 300]);
        let e = rule_creator_digram_new_edge(99, 200, &edge0, 1, &edge1, 0);
        assert_eq!(e.nodes, vec![200, 100, 300]);
    }

    #[test]
    fn rule_inserter_remaps_through_hyperedge_nodes() {
        let mut rule = HGraph::new(Some(3));
        rule.add_edge(HEdge::new(1, vec![0, 1]));
        rule.add_edge(HEdge::new(2, vec![1, 2]));
        let hyperedge = HEdge::new(50, vec![7, 8, 9]);
        let edges = rule_inserter_edges_for_hyperedge(&rule, &hyperedge);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].nodes, vec![7, 8]);
        assert_eq!(edges[1].nodes, vec![8, 9]);
    }
}
