/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! On-disk grammar section: a start symbol, a rule table, and an optional
//! non-terminal reachability table, laid out exactly as
//! `slhr_grammar_write`/`grammar_init` describe. The dictionary section
//! (label text plus its FM-index) lives alongside it in [`dictionary`].

mod dictionary;
mod nt_table;
mod rules;
mod start_symbol;

pub use dictionary::Dictionary;
pub use nt_table::NtTable;
pub use rules::RuleTable;
pub use start_symbol::StartSymbol;

use crate::bits::{BitReader, BitWriter, ByteSource};
use crate::grammar::SlhrGrammar;
use crate::succinct::BitsequenceParams;
use anyhow::Result;

/// The compressed grammar: a start symbol over compact node/edge ids plus
/// the rule table it references, and (optionally) a reachability table that
/// lets the reader prune non-terminal candidates by label before expanding
/// them.
#[derive(Clone, Debug)]
pub struct Grammar {
    pub node_count: u64,
    pub start_symbol: StartSymbol,
    pub rules: RuleTable,
    pub nt_table: Option<NtTable>,
}

impl Grammar {
    pub fn build(
        grammar: &SlhrGrammar,
        node_count: u64,
        terminals: u64,
        build_nt_table: bool,
        params: &BitsequenceParams,
    ) -> Self {
        let start_symbol = StartSymbol::build(&grammar.start_symbol, node_count, params);
        let rules = RuleTable::build(grammar);
        let nt_table = if build_nt_table {
            Some(NtTable::build(grammar, terminals, params))
        } else {
            None
        };
        Grammar {
            node_count,
            start_symbol,
            rules,
            nt_table,
        }
    }

    pub fn has_nt_table(&self) -> bool {
        self.nt_table.is_some()
    }

    /// Resolves non-terminal `symbol`'s 0-based index into the reachability
    /// table (`symbol - rules.first_nt()`).
    pub fn nt_index(&self, symbol: u64) -> u64 {
        symbol - self.rules.first_nt()
    }

    pub fn write(&self, w: &mut BitWriter, params: &BitsequenceParams) {
        let mut w_start = BitWriter::new();
        self.start_symbol.write(&mut w_start, params);

        let mut w_rules = BitWriter::new();
        self.rules.write(&mut w_rules, params);

        w.write_vbyte(self.node_count);
        w.write_byte(self.has_nt_table() as u8);
        w.write_vbyte(w_start.byte_len());
        if self.has_nt_table() {
            w.write_vbyte(w_rules.byte_len());
        }
        w.write_sub_block(&w_start.into_bytes());
        w.write_sub_block(&w_rules.into_bytes());
        if let Some(nt_table) = &self.nt_table {
            nt_table.write(w);
        }
        w.flush();
    }

    pub fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let node_count = r.read_vbyte()?;
        let has_nt_table = r.read_byte()? != 0;
        let len_start = r.read_vbyte()?;
        let len_rules = if has_nt_table { Some(r.read_vbyte()?) } else { None };

        let start = r.abs_byte_offset();
        let start_symbol = StartSymbol::read(r, node_count)?;
        r.seek_to_byte(start + len_start);

        let rules_start = r.abs_byte_offset();
        let rules = RuleTable::read(r)?;
        if let Some(len_rules) = len_rules {
            r.seek_to_byte(rules_start + len_rules);
        }

        let nt_table = if has_nt_table { Some(NtTable::read(r)?) } else { None };

        Ok(Grammar {
            node_count,
            start_symbol,
            rules,
            nt_table,
        })
    }
}
