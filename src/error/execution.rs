//! This module contains errors pertaining to the symbolic execution of a
//! control flow graph.
//!
//! None of these describe conditions in the analyzed program. Infeasible paths
//! and exhausted budgets are ordinary outcomes of a walk, so an error here
//! always points at a malformed input graph or at a defect in the transition
//! rules, and aborts only the walk in which it occurs.

use thiserror::Error;

use crate::{
    cfg::{symbol::SymbolId, BlockId},
    error::located::Located,
};

/// Errors that occur during the walk of a control flow graph by the
/// [`crate::graph::ExplodedGraph`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("No operand was available at stack depth {depth}")]
    NoSuchStackFrame { depth: usize },

    #[error(
        "Instruction {instruction} left a stack of depth {actual} where {expected} was expected"
    )]
    StackImbalance {
        instruction: String,
        expected:    usize,
        actual:      usize,
    },

    #[error("The instruction kind {kind} is not supported by the instruction visitor")]
    UnsupportedInstruction { kind: String },

    #[error("The block {block} does not exist in the control flow graph")]
    NoSuchBlock { block: BlockId },

    #[error("The control flow graph has no exit block")]
    MissingExitBlock,

    #[error("The symbol {symbol} does not exist in the symbol table")]
    NoSuchSymbol { symbol: SymbolId },

    #[error("Offset {offset} is out of bounds in a block of {length} instructions")]
    InvalidProgramPoint { offset: usize, length: usize },

    #[error("The walk was started on an exploded graph that has already been executed")]
    AlreadyExecuted,
}

/// An execution error with the program point at which it occurred.
pub type LocatedError = Located<Error>;

/// The result type for methods that may have execution errors.
pub type Result<T> = std::result::Result<T, LocatedError>;
