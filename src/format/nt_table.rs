/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Non-terminal reachability table: for every rule, which terminal labels
//! its expansion can ever emit. Computed once as a transitive closure over
//! direct terminal/non-terminal uses, then serialized as a k²-tree so the
//! reader can prune a candidate non-terminal edge before paying to expand it.

use crate::bits::{BitReader, BitWriter, ByteSource};
use crate::grammar::SlhrGrammar;
use crate::succinct::{BitsequenceParams, K2Tree};
use anyhow::Result;

#[derive(Clone, Debug)]
pub struct NtTable {
    matrix: K2Tree,
}

impl NtTable {
    pub fn build(grammar: &SlhrGrammar, terminals: u64, params: &BitsequenceParams) -> Self {
        let min_nt = grammar.min_nt;
        let nt_count = if grammar.rule_max >= min_nt {
            grammar.rule_max - min_nt + 1
        } else {
            0
        };
        let width = terminals + nt_count;

        let mut table = vec![false; (nt_count * width) as usize];
        let idx = |nt: u64, col: u64| (nt * width + col) as usize;

        for nt_index in 0..nt_count {
            let symbol = min_nt + nt_index;
            let body = match grammar.rule_get(symbol) {
                Some(b) => b,
                None => continue,
            };
            for edge in body.edges() {
                let col = if grammar.is_terminal(edge.label) {
                    edge.label
                } else {
                    terminals + (edge.label - min_nt)
                };
                table[idx(nt_index, col)] = true;
            }
        }

        for k in 0..nt_count {
            for i in 0..nt_count {
                if !table[idx(i, terminals + k)] {
                    continue;
                }
                for j in 0..width {
                    if !table[idx(i, j)] && table[idx(k, j)] {
                        table[idx(i, j)] = true;
                    }
                }
            }
        }

        let mut edges = Vec::new();
        for nt_index in 0..nt_count {
            for label in 0..terminals {
                if table[idx(nt_index, label)] {
                    edges.push((label, nt_index));
                }
            }
        }

        let matrix = K2Tree::build(terminals, nt_count, edges, params);
        NtTable { matrix }
    }

    /// Whether rule `nt_index`'s expansion can ever emit a terminal edge
    /// labelled `label`.
    pub fn derives(&self, nt_index: u64, label: u64) -> bool {
        self.matrix.get(nt_index, label)
    }

    pub fn write(&self, w: &mut BitWriter) {
        self.matrix.write(w);
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let matrix = K2Tree::read(r)?;
        Ok(NtTable { matrix })
    }
}
