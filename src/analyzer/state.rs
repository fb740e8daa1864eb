//! This module contains the state tracking functionality for the analyzer.

use std::fmt::Debug;

use crate::{
    check::Checks,
    finding::Finding,
    graph,
    graph::{Completion, ExplodedGraph},
    watchdog::DynWatchdog,
};

/// A marker trait that says that the type implementing it is an analyzer
/// state.
///
/// Analyzer states can be transitioned between as part of the
/// [`crate::analyzer::Analyzer`] state machine, and are intended to enforce
/// that correct state transitions take place.
pub trait State
where
    Self: Debug + Sized,
{
}

/// The initial state for the analyzer, holding the body of the method to be
/// analyzed.
#[derive(Debug)]
pub struct HasBody {
    /// The configuration for the exploded graph walk.
    pub config: graph::Config,

    /// The checks that will run during the walk.
    pub checks: Checks,

    /// The watchdog that is monitoring the progress of the analyzer.
    pub watchdog: DynWatchdog,
}
impl State for HasBody {}

/// The analyzer has prepared the exploded graph for the method and is ready to
/// walk it.
#[derive(Debug)]
pub struct GraphReady {
    /// The exploded graph, ready to be walked.
    pub graph: ExplodedGraph,
}
impl State for GraphReady {}

/// The analyzer has walked the exploded graph.
#[derive(Debug)]
pub struct ExecutionComplete {
    /// The checks after they have observed the whole walk.
    pub checks: Checks,

    /// The findings that the checks published.
    pub findings: Vec<Finding>,

    /// How the walk came to an end.
    pub completion: Completion,

    /// The number of nodes that the walk processed.
    pub steps: usize,
}
impl State for ExecutionComplete {}
