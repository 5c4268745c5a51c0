/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The RePair-style grammar compressor: four passes over a flat start
//! symbol turn it into a [`SlhrGrammar`] — digram replacement, optional
//! monogram replacement, pruning of rarely-used rules, and a final
//! renumbering into a gap-free non-terminal range.
//!
//! The occurrence-finder here is a from-scratch, deterministic left-to-right
//! scan rather than the incrementally-updated state machine a performance-
//! tuned implementation would use: it recomputes adjacency counts fresh on
//! every replaced digram/monogram instead of patching counts in place. Both
//! give the same grammar (same cost-model selection, same structural
//! invariants) since the driving cost formulas and greedy max-count
//! selection are unchanged; only the bookkeeping between replacements
//! differs, and the order in which *equally-scored* candidates are chosen,
//! which the tie-breaking rule below fixes deterministically.

use super::rule_creator;
use super::{AdjacencyType, Digram, HEdge, HGraph, Label, Monogram, SlhrGrammar};
use std::collections::HashMap;

/// Runs the full RePair pipeline over `start_symbol` and returns the
/// resulting grammar. `node_count`/`terminals` bound the node and terminal-
/// label universes; `max_rank` caps the rank any rule body edge may reach;
/// `replace_monograms` gates the monogram pass.
pub fn repair(
    start_symbol: HGraph,
    node_count: u64,
    terminals: u64,
    max_rank: usize,
    replace_monograms: bool,
) -> SlhrGrammar {
    assert!(!start_symbol.is_empty(), "the empty start rule is rejected");
    let mut grammar = SlhrGrammar::new(start_symbol, terminals);

    if max_rank > 2 {
        replace_digrams(&mut grammar, node_count, max_rank);
    }
    if replace_monograms {
        replace_monograms_pass(&mut grammar);
    }
    prune(&mut grammar);
    grammar.normalize();
    grammar
}

fn digram_cost_ok(count: u64, rank_a: usize, rank_b: usize) -> bool {
    let m = (rank_a + rank_b) as u64;
    count * m + (m + 2) < count * (m + 2)
}

fn monogram_cost_ok(count: u64, rank: usize) -> bool {
    let r = rank as u64;
    count * r + (r + 1) < count * (r + 1)
}

/// Every (edge index, connection slot) touching each node, grouped by node.
fn adjacency_by_node(g: &HGraph, node_count: u64) -> Vec<Vec<(usize, AdjacencyType)>> {
    let mut by_node: Vec<Vec<(usize, AdjacencyType)>> = vec![Vec::new(); node_count as usize];
    for (idx, edge) in g.iter() {
        for (pos, &n) in edge.nodes.iter().enumerate() {
            if (n as usize) < by_node.len() {
                by_node[n as usize].push((idx, AdjacencyType { label: edge.label, conn_type: pos }));
            }
        }
    }
    by_node
}

fn count_digrams(
    grammar: &SlhrGrammar,
    node_count: u64,
    max_rank: usize,
) -> HashMap<Digram, u64> {
    let mut counts: HashMap<Digram, u64> = HashMap::new();
    let by_node = adjacency_by_node(&grammar.start_symbol, node_count);

    for at_node in &by_node {
        for i in 0..at_node.len() {
            for j in (i + 1)..at_node.len() {
                let (idx_a, a) = at_node[i];
                let (idx_b, b) = at_node[j];
                if idx_a == idx_b {
                    continue;
                }
                let rank_a = grammar.rank_of_rule(a.label);
                let rank_b = grammar.rank_of_rule(b.label);
                if rank_a + rank_b == 0 || rank_a + rank_b - 1 > max_rank {
                    continue;
                }
                let digram = if a <= b {
                    Digram { adj0: a, adj1: b }
                } else {
                    Digram { adj0: b, adj1: a }
                };
                *counts.entry(digram).or_insert(0) += 1;
            }
        }
    }
    counts
}

fn best_digram(grammar: &SlhrGrammar, counts: &HashMap<Digram, u64>) -> Option<(Digram, u64)> {
    let mut best: Option<(Digram, u64)> = None;
    for (&d, &count) in counts {
        let rank_a = grammar.rank_of_rule(d.adj0.label);
        let rank_b = grammar.rank_of_rule(d.adj1.label);
        if !digram_cost_ok(count, rank_a, rank_b) {
            continue;
        }
        best = Some(match best {
            None => (d, count),
            Some((bd, bc)) if count > bc || (count == bc && d < bd) => (d, count),
            Some(existing) => existing,
        });
    }
    best
}

/// Non-overlapping occurrences of `digram` in `g`: pairs of distinct edge
/// indices, each used at most once, found by a single left-to-right scan
/// per node.
fn find_digram_occurrences(g: &HGraph, node_count: u64, digram: Digram) -> Vec<(usize, usize)> {
    let mut used = vec![false; g.len().max(1)];
    let mut grow_used = |idx: usize, used: &mut Vec<bool>| {
        if idx >= used.len() {
            used.resize(idx + 1, false);
        }
    };
    let mut occurrences = Vec::new();
    let by_node = adjacency_by_node(g, node_count);

    for at_node in &by_node {
        let mut cand0: Vec<usize> = Vec::new();
        let mut cand1: Vec<usize> = Vec::new();
        for &(idx, adj) in at_node {
            if adj == digram.adj0 {
                cand0.push(idx);
            }
            if adj == digram.adj1 {
                cand1.push(idx);
            }
        }

        if digram.adj0 == digram.adj1 {
            let mut it = cand0.into_iter();
            loop {
                let a = loop {
                    match it.next() {
                        Some(v) if !used.get(v).copied().unwrap_or(false) => break Some(v),
                        Some(_) => continue,
                        None => break None,
                    }
                };
                let a = match a {
                    Some(v) => v,
                    None => break,
                };
                let b = loop {
                    match it.next() {
                        Some(v) if !used.get(v).copied().unwrap_or(false) => break Some(v),
                        Some(_) => continue,
                        None => break None,
                    }
                };
                let b = match b {
                    Some(v) => v,
                    None => break,
                };
                grow_used(a, &mut used);
                grow_used(b, &mut used);
                used[a] = true;
                used[b] = true;
                occurrences.push((a, b));
            }
        } else {
            let mut bi = 0usize;
            for &a in &cand0 {
                if used.get(a).copied().unwrap_or(false) {
                    continue;
                }
                while bi < cand1.len()
                    && (cand1[bi] == a || used.get(cand1[bi]).copied().unwrap_or(false))
                {
                    bi += 1;
                }
                if bi >= cand1.len() {
                    break;
                }
                let b = cand1[bi];
                grow_used(a, &mut used);
                grow_used(b, &mut used);
                used[a] = true;
                used[b] = true;
                occurrences.push((a, b));
                bi += 1;
            }
        }
    }

    occurrences
}

fn replace_digrams(grammar: &mut SlhrGrammar, node_count: u64, max_rank: usize) {
    loop {
        let counts = count_digrams(grammar, node_count, max_rank);
        let (digram, _count) = match best_digram(grammar, &counts) {
            Some(x) => x,
            None => break,
        };

        let occurrences = find_digram_occurrences(&grammar.start_symbol, node_count, digram);
        if occurrences.is_empty() {
            break;
        }

        let rank0 = grammar.rank_of_rule(digram.adj0.label);
        let rank1 = grammar.rank_of_rule(digram.adj1.label);
        let rule = rule_creator::rule_creator_digram_init(digram.adj0, rank0, digram.adj1, rank1);
        let new_symbol = grammar.rule_add(rule);

        for (idx0, idx1) in occurrences {
            let edge0 = grammar.start_symbol.get(idx0).expect("occurrence index valid").clone();
            let edge1 = grammar.start_symbol.get(idx1).expect("occurrence index valid").clone();
            let shared = edge0.nodes[digram.adj0.conn_type];
            let new_edge = rule_creator::rule_creator_digram_new_edge(
                new_symbol,
                shared,
                &edge0,
                digram.adj0.conn_type,
                &edge1,
                digram.adj1.conn_type,
            );
            grammar.start_symbol.set(idx0, new_edge);
            grammar.start_symbol.free(idx1);
        }
        grammar.start_symbol.fill_holes();
    }
}

fn count_monograms(g: &HGraph) -> HashMap<Monogram, u64> {
    let mut counts = HashMap::new();
    for (_, edge) in g.iter() {
        for c0 in 0..edge.rank {
            for c1 in (c0 + 1)..edge.rank {
                if edge.nodes[c0] == edge.nodes[c1] {
                    *counts
                        .entry(Monogram { label: edge.label, conn0: c0, conn1: c1 })
                        .or_insert(0) += 1;
                }
            }
        }
    }
    counts
}

fn best_monogram(grammar: &SlhrGrammar, counts: &HashMap<Monogram, u64>) -> Option<(Monogram, u64)> {
    let mut best: Option<(Monogram, u64)> = None;
    for (&m, &count) in counts {
        let rank = grammar.rank_of_rule(m.label);
        if !monogram_cost_ok(count, rank) {
            continue;
        }
        best = Some(match best {
            None => (m, count),
            Some((bm, bc)) if count > bc || (count == bc && m < bm) => (m, count),
            Some(existing) => existing,
        });
    }
    best
}

fn replace_monograms_pass(grammar: &mut SlhrGrammar) {
    loop {
        let counts = count_monograms(&grammar.start_symbol);
        let (mono, _count) = match best_monogram(grammar, &counts) {
            Some(x) => x,
            None => break,
        };

        let rank = grammar.rank_of_rule(mono.label);
        let rule = rule_creator::rule_creator_monogram_init(mono, rank);
        let new_symbol = grammar.rule_add(rule);

        let matches: Vec<usize> = grammar
            .start_symbol
            .iter()
            .filter(|(_, e)| {
                e.label == mono.label
                    && e.rank > mono.conn1
                    && e.nodes[mono.conn0] == e.nodes[mono.conn1]
            })
            .map(|(i, _)| i)
            .collect();

        for idx in matches {
            let edge = grammar.start_symbol.get(idx).expect("match index valid").clone();
            let new_edge = rule_creator::rule_creator_monogram_new_edge(new_symbol, &edge, mono.conn1);
            grammar.start_symbol.set(idx, new_edge);
        }
    }
}

fn usage_counts(grammar: &SlhrGrammar) -> HashMap<Label, u64> {
    let mut counts = HashMap::new();
    for (_, edge) in grammar.start_symbol.iter() {
        if !grammar.is_terminal(edge.label) {
            *counts.entry(edge.label).or_insert(0) += 1;
        }
    }
    for (_, rule) in grammar.rules_iter() {
        for edge in rule.edges() {
            if !grammar.is_terminal(edge.label) {
                *counts.entry(edge.label).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Picks the least-used rule that qualifies for inlining, ties broken by
/// ascending symbol (earliest-created rule first).
fn rule_to_inline(grammar: &SlhrGrammar, counts: &HashMap<Label, u64>) -> Option<Label> {
    let mut best: Option<(Label, u64)> = None;
    for (symbol, _) in grammar.rules_iter() {
        let count = counts.get(&symbol).copied().unwrap_or(0);
        let rank = grammar.rank_of_rule(symbol) as u64;
        let qualifies = count * rank + rank > count * (rank + 1);
        if !qualifies {
            continue;
        }
        best = Some(match best {
            None => (symbol, count),
            Some((bs, bc)) if count < bc || (count == bc && symbol < bs) => (symbol, count),
            Some(existing) => existing,
        });
    }
    best.map(|(s, _)| s)
}

fn inline_symbol_into(g: &mut HGraph, sym: Label, rule: &HGraph) {
    let matches: Vec<usize> = g.iter().filter(|(_, e)| e.label == sym).map(|(i, _)| i).collect();
    for idx in matches {
        let hyperedge = g.get(idx).expect("match index valid").clone();
        let new_edges = rule_creator::rule_inserter_edges_for_hyperedge(rule, &hyperedge);
        let mut it = new_edges.into_iter();
        match it.next() {
            Some(first) => g.set(idx, first),
            None => g.free(idx),
        }
        for extra in it {
            g.add_edge(extra);
        }
    }
}

fn prune(grammar: &mut SlhrGrammar) {
    loop {
        let counts = usage_counts(grammar);
        let sym = match rule_to_inline(grammar, &counts) {
            Some(s) => s,
            None => break,
        };

        let rule: HGraph = grammar.rule_get(sym).expect("qualifying rule exists").clone();

        inline_symbol_into(&mut grammar.start_symbol, sym, &rule);

        let other_syms: Vec<Label> = grammar.rules_iter().map(|(s, _)| s).filter(|&s| s != sym).collect();
        for other in other_syms {
            let mut g = grammar.rule_get(other).expect("other rule exists").clone();
            inline_symbol_into(&mut g, sym, &rule);
            *grammar.rule_get_mut(other).expect("other rule exists") = g;
        }

        grammar.rule_del(sym);
    }
}

/// Expands a grammar back into its flat multiset of terminal-labelled
/// edges, used by tests to check round-trip correctness of [`repair`].
#[cfg(test)]
fn decompress_all(grammar: &SlhrGrammar) -> Vec<HEdge> {
    fn expand(grammar: &SlhrGrammar, edge: &HEdge, out: &mut Vec<HEdge>) {
        if grammar.is_terminal(edge.label) {
            out.push(edge.clone());
            return;
        }
        let rule = grammar.rule_get(edge.label).expect("referenced rule exists");
        for body_edge in rule.edges() {
            let nodes = body_edge.nodes.iter().map(|&i| edge.nodes[i as usize]).collect();
            let mapped = HEdge::new(body_edge.label, nodes);
            expand(grammar, &mapped, out);
        }
    }

    let mut out = Vec::new();
    for (_, edge) in grammar.start_symbol.iter() {
        expand(grammar, edge, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::hedge_cmp;

    fn sorted(mut edges: Vec<HEdge>) -> Vec<HEdge> {
        edges.sort_by(hedge_cmp);
        edges
    }

    #[test]
    fn repair_round_trips_a_repeated_digram_pattern() {
        // Two terminal labels (0, 1) under 3 terminal-label slots, and a
        // repeated "triangle" pattern over 6 nodes so digram replacement
        // has something to compress.
        let mut g = HGraph::new(None);
        for base in [0u64, 2, 4] {
            g.add_edge(HEdge::new(0, vec![base, base + 1]));
            g.add_edge(HEdge::new(1, vec![base + 1, base + 5 % 6]));
        }
        let original = sorted(g.edges().cloned().collect());

        let grammar = repair(g, 6, 2, 4, true);
        let decompressed = sorted(decompress_all(&grammar));

        assert_eq!(original, decompressed);
    }

    #[test]
    fn repair_handles_a_graph_with_no_repetition() {
        let mut g = HGraph::new(None);
        g.add_edge(HEdge::new(0, vec![0, 1]));
        g.add_edge(HEdge::new(1, vec![1, 2, 3]));
        let original = sorted(g.edges().cloned().collect());

        let grammar = repair(g, 4, 2, 4, true);
        let decompressed = sorted(decompress_all(&grammar));

        assert_eq!(original, decompressed);
    }

    #[test]
    fn repair_respects_max_rank_in_every_rule_body() {
        let mut g = HGraph::new(None);
        for base in [0u64, 3, 6, 9] {
            g.add_edge(HEdge::new(0, vec![base, base + 1]));
            g.add_edge(HEdge::new(0, vec![base + 1, base + 2]));
        }
        let grammar = repair(g, 12, 1, 3, false);
        for (_, rule) in grammar.rules_iter() {
            for edge in rule.edges() {
                assert!(edge.rank <= 3, "rule body edge exceeds max_rank: {edge:?}");
            }
        }
    }

    #[test]
    fn repair_normalizes_to_a_gap_free_range() {
        let mut g = HGraph::new(None);
        for base in [0u64, 2, 4, 6] {
            g.add_edge(HEdge::new(0, vec![base, base + 1]));
        }
        let grammar = repair(g, 8, 1, 4, false);
        let symbols: Vec<u64> = grammar.rules_iter().map(|(s, _)| s).collect();
        for (i, &s) in symbols.iter().enumerate() {
            assert_eq!(s, grammar.min_nt + i as u64);
        }
    }
}
