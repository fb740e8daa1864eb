//! This module contains a builder that allows hosts and tests to assemble a
//! [`Cfg`] block by block.

use crate::{
    cfg::{
        symbol::{PropertyRole, Symbol, SymbolId, SymbolKind, SymbolTable, TypeInfo},
        Block,
        BlockId,
        Cfg,
        Node,
        Terminator,
    },
    error::execution::Error,
};

/// A builder for control flow graphs.
///
/// Blocks are first reserved, so that terminators can refer to blocks that
/// have not been defined yet, and are then defined with their contents.
///
/// ```
/// use symbolic_defect_analyzer::cfg::{
///     builder::CfgBuilder,
///     instruction::{Instruction, Literal},
///     symbol::TypeInfo,
///     Terminator,
/// };
///
/// let mut builder = CfgBuilder::new("Example.Method");
/// let o = builder.local("o", TypeInfo::reference("object"));
/// let entry = builder.block();
/// let exit = builder.exit();
/// builder.define(
///     entry,
///     vec![
///         Instruction::Literal(Literal::Null),
///         Instruction::Declaration { symbol: o, initialized: true },
///     ],
///     Terminator::Goto(exit),
/// );
///
/// let cfg = builder.build(entry).unwrap();
/// assert_eq!(cfg.blocks().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct CfgBuilder {
    method:     String,
    blocks:     Vec<Option<(Vec<Node>, Terminator)>>,
    exit:       Option<BlockId>,
    parameters: Vec<SymbolId>,
    symbols:    SymbolTable,
}

impl CfgBuilder {
    /// Constructs a new builder for the body of `method`.
    pub fn new(method: impl Into<String>) -> Self {
        let method = method.into();
        Self {
            method,
            blocks: Vec::new(),
            exit: None,
            parameters: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    /// Declares an arbitrary `symbol`.
    pub fn symbol(&mut self, symbol: Symbol) -> SymbolId {
        let is_parameter = symbol.kind == SymbolKind::Parameter;
        let id = self.symbols.add(symbol);
        if is_parameter {
            self.parameters.push(id);
        }
        id
    }

    /// Declares a local variable.
    pub fn local(&mut self, name: impl Into<String>, ty: TypeInfo) -> SymbolId {
        self.symbol(Symbol::new(name, SymbolKind::Local, ty))
    }

    /// Declares a parameter of the method.
    pub fn parameter(&mut self, name: impl Into<String>, ty: TypeInfo) -> SymbolId {
        self.symbol(Symbol::new(name, SymbolKind::Parameter, ty))
    }

    /// Declares an instance field.
    pub fn field(&mut self, name: impl Into<String>, ty: TypeInfo) -> SymbolId {
        let kind = SymbolKind::Field {
            is_static: false,
            is_const:  false,
        };
        self.symbol(Symbol::new(name, kind, ty))
    }

    /// Declares a static field.
    pub fn static_field(&mut self, name: impl Into<String>, ty: TypeInfo) -> SymbolId {
        let kind = SymbolKind::Field {
            is_static: true,
            is_const:  false,
        };
        self.symbol(Symbol::new(name, kind, ty))
    }

    /// Declares an instance property with the provided `role`.
    pub fn property(
        &mut self,
        name: impl Into<String>,
        ty: TypeInfo,
        role: PropertyRole,
    ) -> SymbolId {
        let kind = SymbolKind::Property {
            is_static: false,
            role,
        };
        self.symbol(Symbol::new(name, kind, ty))
    }

    /// Reserves a new block, returning its identifier.
    ///
    /// # Panics
    ///
    /// Panics if the graph would hold more than [`u32::MAX`] blocks. This is a
    /// programmer bug.
    pub fn block(&mut self) -> BlockId {
        let index = u32::try_from(self.blocks.len())
            .unwrap_or_else(|_| panic!("Block count should not exceed {}", u32::MAX));
        self.blocks.push(None);
        BlockId::new(index)
    }

    /// Reserves and defines the exit block of the method, returning its
    /// identifier.
    ///
    /// Calling this more than once returns the same block.
    pub fn exit(&mut self) -> BlockId {
        if let Some(exit) = self.exit {
            return exit;
        }

        let exit = self.block();
        self.blocks[exit.index()] = Some((Vec::new(), Terminator::Exit));
        self.exit = Some(exit);
        exit
    }

    /// Defines the contents of the previously reserved block `id`.
    ///
    /// Defining a block twice replaces its earlier definition.
    pub fn define(
        &mut self,
        id: BlockId,
        nodes: impl IntoIterator<Item = impl Into<Node>>,
        terminator: Terminator,
    ) -> &mut Self {
        let nodes = nodes.into_iter().map(Into::into).collect();
        if let Some(slot) = self.blocks.get_mut(id.index()) {
            *slot = Some((nodes, terminator));
        }
        self
    }

    /// Finishes building the graph, with execution starting at `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if a reserved block was never defined, if a terminator
    /// refers to a block that does not exist, or if no exit block was
    /// declared.
    pub fn build(self, entry: BlockId) -> Result<Cfg, Error> {
        let exit = self.exit.ok_or(Error::MissingExitBlock)?;
        let block_count = self.blocks.len();
        if entry.index() >= block_count {
            return Err(Error::NoSuchBlock { block: entry });
        }

        let mut blocks = Vec::with_capacity(block_count);
        for (index, slot) in self.blocks.into_iter().enumerate() {
            let id = BlockId::new(index as u32);
            let (nodes, terminator) = slot.ok_or(Error::NoSuchBlock { block: id })?;
            if let Some(missing) = terminator
                .successors()
                .into_iter()
                .find(|successor| successor.index() >= block_count)
            {
                return Err(Error::NoSuchBlock { block: missing });
            }
            blocks.push(Block {
                id,
                nodes,
                terminator,
            });
        }

        Ok(Cfg {
            method: self.method,
            blocks,
            entry,
            exit,
            parameters: self.parameters,
            symbols: self.symbols,
        })
    }
}
