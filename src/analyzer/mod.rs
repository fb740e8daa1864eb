//! This module contains the definition of the analyzer itself.

pub mod state;

use std::rc::Rc;

use crate::{
    analyzer::state::State,
    cfg::Cfg,
    check::Checks,
    error,
    graph,
    graph::ExplodedGraph,
    report::AnalysisReport,
    watchdog::DynWatchdog,
};

/// Creates a new analyzer wrapping the provided `cfg`.
///
/// The analyzer will walk the method using the provided `config`, running the
/// provided `checks`, and polling the `watchdog` to see whether it should stop.
#[must_use]
pub fn new(
    cfg: Cfg,
    config: graph::Config,
    checks: Checks,
    watchdog: DynWatchdog,
) -> Analyzer<state::HasBody> {
    let cfg = Rc::new(cfg);
    let state = state::HasBody {
        config,
        checks,
        watchdog,
    };
    Analyzer { cfg, state }
}

/// The core of the defect analysis, the `Analyzer` is responsible for
/// ingesting the control flow graph of a single method and outputting the
/// defects found in it.
///
/// # Basic Usage
///
/// For the most basic usage of the library, it is sufficient to construct an
/// `Analyzer` and call the `.analyze` method on it.
///
/// # Enforcing Valid State Transitions
///
/// The analyzer enforces that only correct state transitions can occur through
/// use of structs that implement the exact state required by it at any given
/// point.
///
/// There is the [`Self::state`] function that provides access to the state data
/// of whichever state it is in.
pub struct Analyzer<S: State> {
    /// The control flow graph of the method being analyzed.
    cfg: Rc<Cfg>,

    /// The internal state of the analyzer.
    state: S,
}

/// Safe operations available in all states.
impl<S: State> Analyzer<S> {
    /// Gets a reference to the control flow graph being analyzed.
    #[must_use]
    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    /// Gets a reference to the current state of the analyzer.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }
}

/// Unsafe operations available in all states.
///
/// These operations are capable of **violating the state invariants** of the
/// analyzer, and must be used with the _utmost_ care.
impl<S: State> Analyzer<S> {
    /// Gets a mutable reference to the current state of the analyzer.
    ///
    /// # Safety
    ///
    /// Do not mutate the state instance unless you totally understand the
    /// state that the analyzer is in, and the implications of doing so.
    pub unsafe fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Forces the analyzer into `new_state`, disregarding any safety with
    /// regards to state transitions.
    ///
    /// # Safety
    ///
    /// Do not force a state transition for the analyzer unless you totally
    /// understand the state that the analyzer is in, and the implications
    /// of doing so.
    pub unsafe fn set_state<NS: State>(self, new_state: NS) -> Analyzer<NS> {
        Analyzer {
            cfg:   self.cfg,
            state: new_state,
        }
    }

    /// Forces the analyzer into the state `NS`, with the value of the state
    /// created by applying `transform` to the analyzer's current state and
    /// disregarding any safety with regard to state transitions.
    ///
    /// # Safety
    ///
    /// Do not force a state transition for the analyzer unless you totally
    /// understand the state that the analyzer is in, and the implications
    /// of doing so.
    pub unsafe fn transform_state<NS: State>(
        self,
        transform: impl FnOnce(S) -> error::Result<NS>,
    ) -> error::Result<Analyzer<NS>> {
        let state = transform(self.state)?;
        let cfg = self.cfg;

        Ok(Analyzer { cfg, state })
    }
}

/// A type alias for an analyzer that has just been created.
pub type InitialAnalyzer = Analyzer<state::HasBody>;

/// Operations available on a newly-created analyzer.
impl Analyzer<state::HasBody> {
    /// Executes the analysis process from beginning to end, performing all the
    /// intermediate steps automatically.
    ///
    /// # Errors
    ///
    /// If the control flow graph is malformed, or contains instructions that
    /// the engine cannot interpret.
    pub fn analyze(self) -> error::Result<AnalysisReport> {
        let analyzer = self.prepare_graph();
        let analyzer = analyzer.execute()?;

        Ok(analyzer.report())
    }

    /// Prepares the exploded graph for walking the method.
    #[must_use]
    pub fn prepare_graph(self) -> Analyzer<state::GraphReady> {
        let Analyzer { cfg, state } = self;
        let graph = ExplodedGraph::new(
            Rc::clone(&cfg),
            state.config,
            state.checks,
            state.watchdog,
        );
        let state = state::GraphReady { graph };

        Analyzer { cfg, state }
    }
}

/// Operations available on an analyzer that has an exploded graph ready to be
/// walked.
impl Analyzer<state::GraphReady> {
    /// Walks the exploded graph, running the checks on every step.
    ///
    /// # Errors
    ///
    /// If the walk encounters a malformed part of the control flow graph.
    pub fn execute(self) -> error::Result<Analyzer<state::ExecutionComplete>> {
        unsafe {
            self.transform_state(|mut old_state| {
                let completion = old_state.graph.walk()?;
                let steps = old_state.graph.steps();
                let (checks, findings) = old_state.graph.into_parts();
                Ok(state::ExecutionComplete {
                    checks,
                    findings,
                    completion,
                    steps,
                })
            })
        }
    }
}

/// Operations available on an analyzer that has completed its walk.
impl Analyzer<state::ExecutionComplete> {
    /// Gets the checks as they were at the end of the walk.
    #[must_use]
    pub fn checks(&self) -> &Checks {
        &self.state.checks
    }

    /// Builds the report of the analysis.
    #[must_use]
    pub fn report(&self) -> AnalysisReport {
        AnalysisReport::new(
            self.cfg.method(),
            self.state.findings.clone(),
            self.state.completion,
            self.state.steps,
        )
    }
}

#[cfg(test)]
mod test {
    use crate::{
        cfg::{
            builder::CfgBuilder,
            instruction::{AssignmentKind, AssignmentTarget, Instruction, Literal, Receiver},
            symbol::{PropertyRole, TypeInfo},
            Terminator,
        },
        check::{null_dereference, Checks},
        graph::{Completion, Config},
        watchdog::LazyWatchdog,
    };

    #[test]
    fn analyzes_a_method_from_start_to_end() -> anyhow::Result<()> {
        let mut builder = CfgBuilder::new("C.M()");
        let f = builder.static_field("f", TypeInfo::reference("string"));
        let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
        let entry = builder.block();
        let exit = builder.exit();
        builder.define(
            entry,
            [
                Instruction::Literal(Literal::Null),
                Instruction::Assignment {
                    target: AssignmentTarget::Member {
                        member:   f,
                        receiver: Receiver::Static,
                    },
                    kind:   AssignmentKind::Simple,
                },
                Instruction::Discard,
                Instruction::MemberAccess {
                    member:   f,
                    receiver: Receiver::Static,
                },
                Instruction::MemberAccess {
                    member:   length,
                    receiver: Receiver::Instance,
                },
                Instruction::Discard,
            ],
            Terminator::Goto(exit),
        );
        let cfg = builder.build(entry)?;

        let analyzer = crate::new(
            cfg,
            Config::default(),
            Checks::default(),
            LazyWatchdog.in_arc(),
        );
        assert_eq!(analyzer.cfg().method(), "C.M()");

        let report = analyzer.analyze()?;
        assert_eq!(report.method, "C.M()");
        assert_eq!(report.completion, Completion::Complete);
        assert_eq!(report.findings_for(null_dereference::RULE_ID).count(), 1);

        Ok(())
    }

    #[test]
    fn checks_are_kept_after_execution() -> anyhow::Result<()> {
        let mut builder = CfgBuilder::new("M");
        let exit = builder.exit();
        let cfg = builder.build(exit)?;

        let analyzer = crate::new(
            cfg,
            Config::default(),
            Checks::default(),
            LazyWatchdog.in_arc(),
        )
        .prepare_graph()
        .execute()?;

        assert_eq!(analyzer.checks().len(), Checks::default().len());
        assert!(analyzer.report().findings.is_empty());

        Ok(())
    }
}
