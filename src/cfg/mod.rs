//! This module contains the control flow graph that the analyzer consumes.
//!
//! The graph is produced by the host compiler and handed to the analyzer
//! already built. It consists of basic blocks in a fixed enumeration order,
//! each holding a sequence of [`Node`]s and ending in a [`Terminator`] that
//! names the block's successors.

pub mod builder;
pub mod instruction;
pub mod liveness;
pub mod symbol;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::cfg::{
    instruction::{Instruction, Pattern},
    symbol::{SymbolId, SymbolTable},
};

/// The identifier of a basic block within a [`Cfg`].
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct BlockId(u32);

impl BlockId {
    /// Constructs a new block identifier from its `index` in the graph.
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Gets the index of the block in the graph.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for BlockId {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A location in the analyzed source.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Span {
    pub line:   u32,
    pub column: u32,
}

impl Span {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single node in a basic block.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Node {
    /// The syntactic unit at this node.
    pub instruction: Instruction,

    /// Where the node appears in the source, if known.
    pub span: Option<Span>,
}

impl Node {
    /// Constructs a new node for `instruction` at the provided `span`.
    #[must_use]
    pub fn new(instruction: Instruction, span: Option<Span>) -> Self {
        Self { instruction, span }
    }
}

impl From<Instruction> for Node {
    fn from(instruction: Instruction) -> Self {
        Self::new(instruction, None)
    }
}

/// The kind of an unconditional jump out of a block.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum JumpKind {
    /// An ordinary jump, such as `break` or `continue`.
    Plain,

    /// A `return`, consuming the returned value if there is one.
    Return { has_value: bool },

    /// A `throw`, consuming the thrown value if there is one.
    Throw { has_value: bool },

    /// Entry into a `using` statement, consuming the resource expression if
    /// the statement has one.
    Using { has_resource: bool },

    /// Entry into a `lock` statement, consuming the lock expression.
    Lock,
}

/// The construct that a two-way branch implements.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum BranchKind {
    /// The condition of an `if`, loop, or conditional expression.
    Condition,

    /// The filter of a `catch` clause.
    CatchFilter,

    /// The left operand of a short-circuiting `&&`.
    ///
    /// `push_result` is set when the value of the whole expression is consumed
    /// by an instruction rather than by another branch.
    LogicalAnd { push_result: bool },

    /// The left operand of a short-circuiting `||`.
    LogicalOr { push_result: bool },

    /// The left operand of `??`. The true branch is taken when the operand is
    /// null.
    Coalesce { push_result: bool },

    /// The receiver of `?.`. The true branch is taken when the receiver is
    /// null.
    ConditionalAccess { push_result: bool },

    /// A `case` label of a switch, testing the switch value against a
    /// pattern. The true branch is taken when the pattern matches.
    CaseLabel(Pattern),

    /// The test for another element in a `foreach` loop, which consumes the
    /// enumerated collection.
    ForEach,
}

/// The construct that a multi-way branch implements.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum MultiBranchKind {
    /// The end of a `finally` block, continuing to every possible successor.
    Finally,

    /// The dispatch of a switch to its sections.
    Switch,

    /// Entry into a `try` block, and the exceptional edges to its handlers.
    Try,
}

/// The way control leaves a basic block.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Terminator {
    /// Falls through to `target`.
    Goto(BlockId),

    /// Jumps unconditionally to `target`.
    Jump { target: BlockId, kind: JumpKind },

    /// Consumes the branching value on the top of the stack and continues to
    /// one or both of the targets.
    BinaryBranch {
        kind:         BranchKind,
        true_target:  BlockId,
        false_target: BlockId,
    },

    /// Continues to every one of `targets` with the same state.
    Branch {
        targets: Vec<BlockId>,
        kind:    MultiBranchKind,
    },

    /// The method exits.
    Exit,
}

impl Terminator {
    /// Gets the blocks that control may flow to from this terminator.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Goto(target) | Self::Jump { target, .. } => vec![*target],
            Self::BinaryBranch {
                true_target,
                false_target,
                ..
            } => vec![*true_target, *false_target],
            Self::Branch { targets, .. } => targets.clone(),
            Self::Exit => Vec::new(),
        }
    }
}

/// A basic block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
    pub id:         BlockId,
    pub nodes:      Vec<Node>,
    pub terminator: Terminator,
}

impl Block {
    /// Gets the number of nodes in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Checks if the block holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The control flow graph of a single method body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cfg {
    method:     String,
    blocks:     Vec<Block>,
    entry:      BlockId,
    exit:       BlockId,
    parameters: Vec<SymbolId>,
    symbols:    SymbolTable,
}

impl Cfg {
    /// Gets the identity of the method that the graph was built for.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Gets the blocks of the graph in enumeration order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Gets the block with the identifier `id`, if it exists.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    /// Gets the block at which execution of the method starts.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Gets the block that every path leaving the method passes through.
    #[must_use]
    pub fn exit(&self) -> BlockId {
        self.exit
    }

    /// Gets the parameters of the method.
    #[must_use]
    pub fn parameters(&self) -> &[SymbolId] {
        &self.parameters
    }

    /// Gets the symbol table for the method.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}
