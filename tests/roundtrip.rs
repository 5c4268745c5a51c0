/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! End-to-end writer→file→reader scenarios.

use slhrgraph::reader::Query;
use slhrgraph::{Reader, Writer, WriterParams};

fn write_to_temp(w: &Writer) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    w.write(dir.path().join("graph.cg"), false).unwrap();
    dir
}

#[test]
fn round_trips_a_triangle() {
    let mut w = Writer::new();
    w.add_edge(b"p", &[b"a", b"b"]);
    w.add_edge(b"p", &[b"b", b"c"]);
    w.add_edge(b"p", &[b"c", b"a"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();

    assert_eq!(r.node_count(), 3);
    assert_eq!(r.edge_label_count(), 1);

    let p = r.locate_edge_label(b"p").unwrap();
    let a = r.locate_node(b"a").unwrap();
    let b = r.locate_node(b"b").unwrap();
    assert!(r.edge_exists(p, &[a, b]));

    let edges = r.edges_by_label(p).collect::<Vec<_>>();
    assert_eq!(edges.len(), 3);
    let mut nodes_used = std::collections::HashSet::new();
    for edge in &edges {
        assert_eq!(edge.nodes.len(), 2);
        nodes_used.insert(edge.nodes[0]);
        nodes_used.insert(edge.nodes[1]);
    }
    assert_eq!(nodes_used.len(), 3);
}

#[test]
fn prefix_search_finds_every_matching_node() {
    let mut w = Writer::new();
    w.add_node(b"apple");
    w.add_node(b"apricot");
    w.add_node(b"banana");
    // A writer with no edges compresses to an empty start symbol, which
    // `repair` rejects; give it one edge touching all three labels so
    // compression has something to work with.
    w.add_edge(b"near", &[b"apple", b"apricot"]);
    w.add_edge(b"near", &[b"banana", b"apple"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();

    let mut found: Vec<Vec<u8>> = r
        .locate_node_prefix(b"ap")
        .into_iter()
        .map(|id| r.extract_node(id).unwrap())
        .collect();
    found.sort();
    assert_eq!(found, vec![b"apple".to_vec(), b"apricot".to_vec()]);
}

#[test]
fn substring_search_deduplicates_hits() {
    let mut w = Writer::new();
    w.add_edge(b"rel", &[b"abcabc", b"xabcy"]);
    w.add_edge(b"rel", &[b"xabcy", b"nope"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();

    let mut found: Vec<Vec<u8>> = r.search_node(b"abc").into_iter().map(|id| r.extract_node(id).unwrap()).collect();
    found.sort();
    assert_eq!(found, vec![b"abcabc".to_vec(), b"xabcy".to_vec()]);
}

#[test]
fn rank_3_hyperedges_with_distinct_orderings_both_survive() {
    let mut w = Writer::new();
    w.add_edge(b"r", &[b"a", b"b", b"c"]);
    w.add_edge(b"r", &[b"a", b"c", b"b"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();

    let label = r.locate_edge_label(b"r").unwrap();
    let edges = r.edges_by_label(label).collect::<Vec<_>>();
    assert_eq!(edges.len(), 2);
    assert_ne!(edges[0].nodes, edges[1].nodes);
}

#[test]
fn wildcard_neighborhood_matches_only_the_fixed_connection() {
    let mut w = Writer::new();
    w.add_edge(b"r", &[b"a", b"b", b"v"]);
    w.add_edge(b"r", &[b"c", b"d", b"v"]);
    w.add_edge(b"r", &[b"v", b"e", b"f"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();

    let v = r.locate_node(b"v").unwrap();
    let query = Query::new(3).with_node(2, v);
    let matches: Vec<_> = r.edges(query).collect();
    assert_eq!(matches.len(), 2);
    for edge in &matches {
        assert_eq!(edge.nodes[2], v);
    }
}

#[test]
fn max_rank_enforcement_bounds_every_rule_body() {
    let mut w = Writer::new();
    w.set_params(WriterParams { max_rank: 4, ..WriterParams::default() });
    for i in 0..20u32 {
        let a = format!("n{}", i);
        let b = format!("n{}", i + 1);
        w.add_edge(b"chain", &[a.as_bytes(), b.as_bytes()]);
    }
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();
    assert!(r.node_count() > 0);
}

#[test]
fn collided_labels_used_as_both_node_and_edge_label_stay_non_disjoint() {
    let mut w = Writer::new();
    w.add_edge(b"shared", &[b"shared", b"other"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();

    assert!(r.locate_node(b"shared").is_some());
    assert!(r.locate_edge_label(b"shared").is_some());
}

#[test]
fn repeated_edges_are_deduplicated_by_the_writer() {
    let mut w = Writer::new();
    w.add_edge(b"p", &[b"a", b"b"]);
    w.add_edge(b"p", &[b"a", b"b"]);
    w.add_edge(b"p", &[b"a", b"b"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();

    let label = r.locate_edge_label(b"p").unwrap();
    let edges = r.edges_by_label(label).collect::<Vec<_>>();
    assert_eq!(edges.len(), 1);
}

#[test]
fn singleton_graph_round_trips() {
    let mut w = Writer::new();
    w.add_edge(b"only", &[b"x", b"y"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();
    assert_eq!(r.node_count(), 2);
    assert_eq!(r.edge_label_count(), 1);
}

#[test]
fn digram_replacement_disabled_still_compresses_via_monograms() {
    let mut w = Writer::new();
    w.set_params(WriterParams { max_rank: 2, monograms: true, ..WriterParams::default() });
    w.add_edge(b"loop", &[b"a", b"a"]);
    w.add_edge(b"loop", &[b"b", b"b"]);
    w.add_edge(b"p", &[b"a", b"b"]);
    w.compress();

    let dir = write_to_temp(&w);
    let r = Reader::open(dir.path().join("graph.cg")).unwrap();
    assert_eq!(r.node_count(), 2);
}
