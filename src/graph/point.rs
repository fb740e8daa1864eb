//! This module contains the program point and the exploded graph node, which
//! together identify the units of work of a walk.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{cfg::BlockId, state::ProgramState};

/// A location in the control flow graph.
///
/// An `offset` equal to the number of nodes in the block refers to the block's
/// terminator.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ProgramPoint {
    pub block:  BlockId,
    pub offset: usize,
}

impl ProgramPoint {
    /// Constructs a new program point at `offset` in `block`.
    #[must_use]
    pub fn new(block: BlockId, offset: usize) -> Self {
        Self { block, offset }
    }

    /// Constructs the program point at the start of `block`.
    #[must_use]
    pub fn start_of(block: BlockId) -> Self {
        Self::new(block, 0)
    }

    /// Gets the program point immediately after this one in the same block.
    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.block, self.offset + 1)
    }
}

impl Display for ProgramPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.block, self.offset)
    }
}

/// A node of the exploded graph, being the pairing of a program point with
/// the state in which it is reached.
///
/// Nodes compare and hash structurally, which is what allows the walker to
/// recognise that it has already explored a node.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ExplodedNode {
    pub point: ProgramPoint,
    pub state: ProgramState,
}

impl ExplodedNode {
    #[must_use]
    pub fn new(point: ProgramPoint, state: ProgramState) -> Self {
        Self { point, state }
    }
}
