//! This library implements a path-sensitive symbolic execution engine that
//! walks the control flow graph of a single method and reports the defects it
//! can prove on at least one feasible path: null dereferences, reads of empty
//! nullables, double disposal, locks that are never released, reads from empty
//! collections, and conditions that always evaluate the same way.
//!
//! Note that this library does not parse source code or build control flow
//! graphs itself. Those are provided by the host through the types in
//! [`cfg`].
//!
//! # How it Works
//!
//! From a very high level, the analysis of a method is performed as follows:
//!
//! 1. The host describes the method as a [`cfg::Cfg`], a graph of basic blocks
//!    whose nodes are [`cfg::instruction::Instruction`]s over a
//!    [`cfg::symbol::SymbolTable`].
//! 2. The [`graph::ExplodedGraph`] explores the feasible paths through the
//!    method, pairing every program point with the
//!    [`state::ProgramState`]s in which it is reached. Paths that reach the
//!    same point in equal states are merged.
//! 3. At every step, the [`visitor::InstructionVisitor`] computes the effect
//!    of an instruction on the state, and the
//!    [`value::propagation::ConstraintSolver`] forks the state at branches,
//!    pruning the outcomes that contradict what is already known.
//! 4. The [`check::Checks`] observe every step, learning facts and publishing
//!    [`finding::Finding`]s.
//! 5. The findings are collected into an [`AnalysisReport`].
//!
//! # Basic Usage
//!
//! For the most basic usage of the library, it is sufficient to construct an
//! `Analyzer` and call the `.analyze` method, passing your control flow graph.
//!
//! ```
//! use symbolic_defect_analyzer as sda;
//! use symbolic_defect_analyzer::{
//!     cfg::{
//!         builder::CfgBuilder,
//!         instruction::{Instruction, Literal, Receiver},
//!         symbol::{PropertyRole, TypeInfo},
//!         Terminator,
//!     },
//!     check::Checks,
//!     graph,
//!     watchdog::LazyWatchdog,
//! };
//!
//! let mut builder = CfgBuilder::new("C.M(string)");
//! let s = builder.local("s", TypeInfo::reference("string"));
//! let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
//! let entry = builder.block();
//! let exit = builder.exit();
//! builder.define(
//!     entry,
//!     [
//!         Instruction::Literal(Literal::Null),                 // null
//!         Instruction::Declaration { symbol: s, initialized: true }, // string s = null;
//!         Instruction::Read { symbol: s, ref_or_out: false },  // s
//!         Instruction::MemberAccess { member: length, receiver: Receiver::Instance }, // s.Length
//!         Instruction::Discard,                                // ;
//!     ],
//!     Terminator::Goto(exit),
//! );
//! let cfg = builder.build(entry).unwrap();
//!
//! let report = sda::new(
//!     cfg,
//!     graph::Config::default(),
//!     Checks::default(),
//!     LazyWatchdog.in_arc(),
//! )
//! .analyze()
//! .unwrap();
//!
//! assert_eq!(report.findings.len(), 1);
//! assert_eq!(report.findings[0].rule_id, "null-dereference");
//! ```
//!
//! To analyze many methods, possibly in parallel, use a [`Session`].

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod analyzer;
pub mod cfg;
pub mod check;
pub mod constant;
pub mod error;
pub mod finding;
pub mod graph;
pub mod report;
pub mod session;
pub mod state;
pub mod value;
pub mod visitor;
pub mod watchdog;

// Re-exports to provide the library interface.
pub use analyzer::new;
pub use finding::Finding;
pub use report::AnalysisReport;
pub use session::Session;
