//! This module contains a live variable analysis over a [`Cfg`].
//!
//! The walker uses the analysis to drop the bindings of variables that can no
//! longer be read, which lets paths that differ only in dead variables compare
//! equal and merge.

use std::collections::BTreeSet;

use crate::cfg::{
    instruction::{AssignmentKind, AssignmentTarget, Instruction},
    symbol::SymbolId,
    BlockId,
    BranchKind,
    Cfg,
    Node,
    Terminator,
};

/// The result of a backward may-liveness analysis over the locals and
/// parameters of a method.
///
/// Symbols that are captured by a closure may be read at points that the graph
/// does not show, so they are always live. Fields are never tracked.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LiveVariables {
    /// The symbols that are subject to the analysis.
    tracked: BTreeSet<SymbolId>,

    /// The symbols live on entry to each block.
    live_in: Vec<BTreeSet<SymbolId>>,

    /// The symbols live on exit from each block.
    live_out: Vec<BTreeSet<SymbolId>>,
}

impl LiveVariables {
    /// Runs the analysis on `cfg`.
    #[must_use]
    pub fn analyze(cfg: &Cfg) -> Self {
        let tracked: BTreeSet<SymbolId> = cfg
            .symbols()
            .iter()
            .filter(|(_, s)| s.is_local_or_parameter() && !s.captured)
            .map(|(id, _)| id)
            .collect();

        let block_count = cfg.blocks().len();
        let summaries: Vec<BlockSummary> = cfg
            .blocks()
            .iter()
            .map(|block| BlockSummary::of(&block.nodes, &block.terminator, &tracked))
            .collect();

        let mut live_in = vec![BTreeSet::new(); block_count];
        let mut live_out = vec![BTreeSet::new(); block_count];

        // Iterate to a fixed point. Walking the blocks in reverse converges
        // faster for the mostly-forward graphs the host produces.
        let mut changed = true;
        while changed {
            changed = false;
            for block in cfg.blocks().iter().rev() {
                let index = block.id.index();
                let out: BTreeSet<SymbolId> = block
                    .terminator
                    .successors()
                    .into_iter()
                    .filter_map(|s| live_in.get(s.index()))
                    .flatten()
                    .copied()
                    .collect();

                let summary = &summaries[index];
                let mut new_in: BTreeSet<SymbolId> =
                    out.difference(&summary.defined).copied().collect();
                new_in.extend(summary.used.iter().copied());

                if new_in != live_in[index] || out != live_out[index] {
                    live_in[index] = new_in;
                    live_out[index] = out;
                    changed = true;
                }
            }
        }

        Self {
            tracked,
            live_in,
            live_out,
        }
    }

    /// Gets the tracked symbols that are live on entry to `block`.
    #[must_use]
    pub fn live_in(&self, block: BlockId) -> Option<&BTreeSet<SymbolId>> {
        self.live_in.get(block.index())
    }

    /// Gets the tracked symbols that are live on exit from `block`.
    #[must_use]
    pub fn live_out(&self, block: BlockId) -> Option<&BTreeSet<SymbolId>> {
        self.live_out.get(block.index())
    }

    /// Checks if the binding of `symbol` may still be read after control
    /// leaves `block`.
    ///
    /// Symbols that are not subject to the analysis are always live.
    #[must_use]
    pub fn is_live_out(&self, block: BlockId, symbol: SymbolId) -> bool {
        if !self.tracked.contains(&symbol) {
            return true;
        }

        self.live_out(block).map_or(true, |out| out.contains(&symbol))
    }
}

/// The upward-exposed uses and the definitions of a single block.
#[derive(Debug, Default)]
struct BlockSummary {
    used:    BTreeSet<SymbolId>,
    defined: BTreeSet<SymbolId>,
}

impl BlockSummary {
    fn of(
        nodes: &[Node],
        terminator: &Terminator,
        tracked: &BTreeSet<SymbolId>,
    ) -> Self {
        let mut summary = Self::default();

        for node in nodes {
            match &node.instruction {
                Instruction::Read { symbol, .. } => summary.use_of(*symbol, tracked),
                Instruction::Declaration { symbol, .. } => summary.def_of(*symbol, tracked),
                Instruction::Assignment {
                    target: AssignmentTarget::Symbol(symbol),
                    kind,
                } => {
                    if *kind != AssignmentKind::Simple {
                        summary.use_of(*symbol, tracked);
                    }
                    summary.def_of(*symbol, tracked);
                }
                Instruction::IsPattern(pattern) => {
                    for symbol in pattern.designated_symbols() {
                        summary.def_of(symbol, tracked);
                    }
                }
                _ => (),
            }
        }

        if let Terminator::BinaryBranch {
            kind: BranchKind::CaseLabel(pattern),
            ..
        } = terminator
        {
            for symbol in pattern.designated_symbols() {
                summary.def_of(symbol, tracked);
            }
        }

        summary
    }

    fn use_of(&mut self, symbol: SymbolId, tracked: &BTreeSet<SymbolId>) {
        if tracked.contains(&symbol) && !self.defined.contains(&symbol) {
            self.used.insert(symbol);
        }
    }

    fn def_of(&mut self, symbol: SymbolId, tracked: &BTreeSet<SymbolId>) {
        if tracked.contains(&symbol) {
            self.defined.insert(symbol);
        }
    }
}
