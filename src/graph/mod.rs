//! This module contains the exploded graph walker, which explores the feasible
//! paths through a control flow graph by pairing program points with the
//! program states in which they are reached.
//!
//! # Exploration
//!
//! The walker maintains a worklist of [`ExplodedNode`]s. Processing a node at
//! an instruction applies the transfer function of that instruction, and
//! processing a node at a block's terminator transfers the state to the
//! successor blocks, forking it where the terminator branches. Each node is
//! explored at most once, so paths that reach the same point in equal states
//! are merged.
//!
//! # Termination
//!
//! A single path may visit each program point a bounded number of times, and
//! the walk as a whole may take a bounded number of steps. Running out of
//! either is not an error. Findings that have already been published stand,
//! and the paths that were not explored produce no further findings.

pub mod data;
pub mod point;

use std::{
    collections::{HashSet, VecDeque},
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use crate::{
    cfg::{
        instruction::{Instruction, Literal, Pattern},
        liveness::LiveVariables,
        symbol::Symbol,
        Block,
        BlockId,
        BranchKind,
        Cfg,
        JumpKind,
        Node,
        Terminator,
    },
    check::{CheckContext, Checks},
    constant::{
        DEFAULT_MAX_CONSTRAINT_FORKS,
        DEFAULT_MAX_PROGRAM_POINT_VISITS,
        DEFAULT_MAX_STEPS,
        DEFAULT_PRUNE_DEAD_BINDINGS,
    },
    error::{
        execution::{Error, Result},
        located::Locatable,
    },
    finding::Finding,
    graph::{
        data::Findings,
        point::{ExplodedNode, ProgramPoint},
    },
    state::ProgramState,
    value::{
        constraint::{BoolConstraint, Constraint},
        propagation::ConstraintSolver,
        SymbolicValue,
    },
    visitor::InstructionVisitor,
    watchdog::DynWatchdog,
};

/// How a walk came to an end.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Completion {
    /// Every reachable node was explored.
    Complete,

    /// The walk stopped after taking [`Config::max_steps`] steps.
    StepBudgetExceeded,

    /// The walk was stopped by its watchdog.
    Cancelled,
}

/// The exploded graph for a single control flow graph, along with the
/// machinery needed to walk it.
#[derive(Debug)]
pub struct ExplodedGraph {
    /// The graph being explored.
    cfg: Rc<Cfg>,

    /// The live variables of `cfg`, used to prune dead bindings.
    liveness: LiveVariables,

    /// The configuration of the walk.
    config: Config,

    /// The solver used to assert constraints at branches.
    solver: ConstraintSolver,

    /// The checks that observe and constrain every step.
    checks: Checks,

    /// The nodes that are waiting to be processed.
    worklist: VecDeque<ExplodedNode>,

    /// Every node that has ever been enqueued.
    visited: HashSet<ExplodedNode>,

    /// The findings published by the checks.
    findings: Findings,

    /// The number of nodes processed so far.
    steps: usize,

    /// Whether the walk has already been run.
    executed: bool,

    /// A watchdog that gets polled at intervals to check whether the walk needs
    /// to stop.
    watchdog: DynWatchdog,
}

impl ExplodedGraph {
    /// Constructs a new exploded graph over `cfg`, which will be walked with
    /// the provided `checks`.
    #[must_use]
    pub fn new(
        cfg: impl Into<Rc<Cfg>>,
        config: Config,
        checks: Checks,
        watchdog: DynWatchdog,
    ) -> Self {
        let cfg = cfg.into();
        let liveness = LiveVariables::analyze(&cfg);
        let solver = ConstraintSolver::new(config.max_constraint_forks);

        Self {
            cfg,
            liveness,
            config,
            solver,
            checks,
            worklist: VecDeque::new(),
            visited: HashSet::new(),
            findings: Findings::new(),
            steps: 0,
            executed: false,
            watchdog,
        }
    }

    /// Explores every feasible path through the graph, within the limits of
    /// the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the graph is malformed, in which case the walk stops
    /// at the first node that exhibits the problem. The findings published
    /// before that point remain available.
    pub fn walk(&mut self) -> Result<Completion> {
        let entry = ProgramPoint::start_of(self.cfg.entry());
        if self.executed {
            return Err(Error::AlreadyExecuted).locate(entry);
        }
        self.executed = true;

        log::debug!(
            "Starting walk of {} over {} blocks",
            self.cfg.method(),
            self.cfg.blocks().len()
        );

        let initial = self.initial_state().locate(entry)?;
        self.enqueue(entry, initial);

        let poll_interval = self.watchdog.poll_every().max(1);
        let completion = loop {
            if self.worklist.is_empty() {
                break Completion::Complete;
            }
            if self.steps >= self.config.max_steps {
                log::warn!(
                    "Walk of {} exhausted its budget of {} steps with {} nodes unexplored",
                    self.cfg.method(),
                    self.config.max_steps,
                    self.worklist.len()
                );
                break Completion::StepBudgetExceeded;
            }
            if self.steps % poll_interval == 0 && self.watchdog.should_stop() {
                log::debug!("Walk of {} stopped by its watchdog", self.cfg.method());
                break Completion::Cancelled;
            }
            let Some(node) = self.worklist.pop_front() else {
                break Completion::Complete;
            };

            self.steps += 1;
            self.process(node)?;
        };

        let cfg = Rc::clone(&self.cfg);
        let mut ctx = CheckContext::new(&cfg, entry, None, &self.solver, &mut self.findings);
        self.checks.exploration_ended(&mut ctx, completion);

        log::debug!(
            "Finished walk of {} in {} steps with {} findings ({completion:?})",
            self.cfg.method(),
            self.steps,
            self.findings.len()
        );

        Ok(completion)
    }

    /// Gets the control flow graph being walked.
    #[must_use]
    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    /// Gets the configuration of the walk.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets the checks that run during the walk.
    #[must_use]
    pub fn checks(&self) -> &Checks {
        &self.checks
    }

    /// Gets the findings published so far.
    #[must_use]
    pub fn findings(&self) -> &Findings {
        &self.findings
    }

    /// Gets the number of nodes processed so far.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Consumes the exploded graph to get the findings of the walk.
    #[must_use]
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings.into_findings()
    }

    /// Consumes the exploded graph to get its checks and the findings of the
    /// walk.
    #[must_use]
    pub fn into_parts(self) -> (Checks, Vec<Finding>) {
        (self.checks, self.findings.into_findings())
    }

    /// Builds the state in which the method is entered, where every parameter
    /// holds a value about which only its type is known.
    fn initial_state(&self) -> std::result::Result<ProgramState, Error> {
        let mut state = ProgramState::new();
        for parameter in self.cfg.parameters() {
            let symbol = self
                .cfg
                .symbols()
                .get(*parameter)
                .ok_or(Error::NoSuchSymbol { symbol: *parameter })?;
            let value = SymbolicValue::fresh();
            if symbol.ty.is_value_type() {
                state = state
                    .set_constraint(&value, Constraint::NOT_NULL)
                    .unwrap_or(state);
            }
            state = state.store_binding(*parameter, value);
        }

        Ok(state)
    }

    /// Adds a node for `state` at `point` to the worklist, unless the path has
    /// visited `point` too often or an equal node has already been seen.
    fn enqueue(&mut self, point: ProgramPoint, state: ProgramState) {
        let limit = self.config.max_program_point_visits;
        if state.visit_count(point) >= limit {
            log::trace!("Dropping path at {point} after {limit} visits");
            return;
        }

        let node = ExplodedNode::new(point, state.mark_visited(point));
        if self.visited.insert(node.clone()) {
            self.worklist.push_back(node);
        }
    }

    fn process(&mut self, node: ExplodedNode) -> Result<()> {
        let ExplodedNode { point, state } = node;
        log::trace!("Processing {point} with stack depth {}", state.stack().size());

        let cfg = Rc::clone(&self.cfg);
        let block = cfg
            .block(point.block)
            .ok_or(Error::NoSuchBlock { block: point.block })
            .locate(point)?;

        match block.nodes.get(point.offset) {
            Some(node) => self.process_node(&cfg, point, node, state),
            None if point.offset == block.len() => {
                self.process_terminator(&cfg, block, point, state)
            }
            None => Err(Error::InvalidProgramPoint {
                offset: point.offset,
                length: block.len(),
            })
            .locate(point),
        }
    }

    fn process_node(
        &mut self,
        cfg: &Cfg,
        point: ProgramPoint,
        node: &Node,
        state: ProgramState,
    ) -> Result<()> {
        let instruction = &node.instruction;
        let Some(effect) = instruction.stack_effect() else {
            let kind = match instruction {
                Instruction::Unsupported { kind } => kind.clone(),
                other => other.as_text_code(),
            };
            return Err(Error::UnsupportedInstruction { kind }).locate(point);
        };

        let mut ctx = CheckContext::new(cfg, point, node.span, &self.solver, &mut self.findings);
        let Some(mut state) = self.checks.pre_process_instruction(&mut ctx, instruction, state)
        else {
            log::trace!("Path ended by a check at {point}");
            return Ok(());
        };
        if let Instruction::ObjectCreation { ty, .. } = instruction {
            state = self.checks.object_creating(&mut ctx, ty, state);
        }

        let depth_before = state.stack().size();
        let visitor = InstructionVisitor::new(cfg, &self.solver);
        let Some(mut state) = visitor.visit(instruction, &state).locate(point)? else {
            log::trace!("Path is infeasible at {point}");
            return Ok(());
        };

        let expected = (depth_before + effect.pushes).saturating_sub(effect.pops);
        let actual = state.stack().size();
        if actual != expected {
            return Err(Error::StackImbalance {
                instruction: instruction.as_text_code(),
                expected,
                actual,
            })
            .locate(point);
        }

        if let Instruction::ObjectCreation { ty, arg_count } = instruction {
            let value = state.peek_value(0).cloned().locate(point)?;
            state = self
                .checks
                .object_created(&mut ctx, ty, *arg_count, &value, state);
        }
        let state = self
            .checks
            .post_process_instruction(&mut ctx, instruction, state);

        self.enqueue(point.next(), state);
        Ok(())
    }

    fn process_terminator(
        &mut self,
        cfg: &Cfg,
        block: &Block,
        point: ProgramPoint,
        state: ProgramState,
    ) -> Result<()> {
        let span = block.nodes.last().and_then(|node| node.span);
        match &block.terminator {
            Terminator::Goto(target) => self.leave_block(block.id, *target, state),
            Terminator::Jump { target, kind } => {
                let state = match kind {
                    JumpKind::Plain => state,
                    JumpKind::Return { has_value } | JumpKind::Throw { has_value } => {
                        if *has_value {
                            state.pop_value().locate(point)?.0
                        } else {
                            state
                        }
                    }
                    JumpKind::Using { has_resource } => {
                        if *has_resource {
                            let (state, resource) = state.pop_value().locate(point)?;
                            let mut ctx = CheckContext::new(
                                cfg,
                                point,
                                span,
                                &self.solver,
                                &mut self.findings,
                            );
                            let Some(state) =
                                self.checks
                                    .pre_process_using_statement(&mut ctx, &resource, state)
                            else {
                                return Ok(());
                            };
                            InstructionVisitor::new(cfg, &self.solver).clear_fields(&state)
                        } else {
                            state
                        }
                    }
                    JumpKind::Lock => {
                        // Other threads may have written to the fields before
                        // the lock was taken.
                        let (state, _) = state.pop_value().locate(point)?;
                        InstructionVisitor::new(cfg, &self.solver).clear_fields(&state)
                    }
                };
                self.leave_block(block.id, *target, state);
            }
            Terminator::BinaryBranch {
                kind,
                true_target,
                false_target,
            } => {
                let targets = BranchTargets {
                    from:        block.id,
                    true_target: *true_target,
                    false_target: *false_target,
                };
                self.process_branch(cfg, block, point, kind, targets, state)?;
            }
            Terminator::Branch { targets, .. } => {
                for target in targets {
                    self.leave_block(block.id, *target, state.clone());
                }
            }
            Terminator::Exit => {
                let mut ctx = CheckContext::new(cfg, point, span, &self.solver, &mut self.findings);
                self.checks.exit_block_reached(&mut ctx, &state);
            }
        }

        Ok(())
    }

    fn process_branch(
        &mut self,
        cfg: &Cfg,
        block: &Block,
        point: ProgramPoint,
        kind: &BranchKind,
        targets: BranchTargets,
        state: ProgramState,
    ) -> Result<()> {
        let (state, value) = state.pop_value().locate(point)?;
        let null = Constraint::NULL;
        let not_null = Constraint::NOT_NULL;

        match kind {
            BranchKind::Condition | BranchKind::CatchFilter => {
                let is_condition = *kind == BranchKind::Condition;
                let is_literal = is_condition
                    && block.nodes.last().is_some_and(|node| {
                        matches!(
                            node.instruction,
                            Instruction::Literal(Literal::True | Literal::False)
                        )
                    });
                let span = block.nodes.last().and_then(|node| node.span);

                for outcome in [true, false] {
                    let constraint = Constraint::Bool(BoolConstraint::from_bool(outcome));
                    for state in self.solver.with_constraint(&state, &value, constraint) {
                        if is_condition {
                            let mut ctx = CheckContext::new(
                                cfg,
                                point,
                                span,
                                &self.solver,
                                &mut self.findings,
                            );
                            self.checks
                                .condition_evaluated(&mut ctx, &value, is_literal, outcome, &state);
                        }
                        self.leave_block(targets.from, targets.select(outcome), state);
                    }
                }
            }
            BranchKind::LogicalAnd { push_result } => {
                let short_circuit = push_result.then(SymbolicValue::false_value);
                self.assert_and_leave(&targets, &state, &value, Constraint::TRUE, true, None);
                self.assert_and_leave(
                    &targets,
                    &state,
                    &value,
                    Constraint::FALSE,
                    false,
                    short_circuit,
                );
            }
            BranchKind::LogicalOr { push_result } => {
                let short_circuit = push_result.then(SymbolicValue::true_value);
                self.assert_and_leave(
                    &targets,
                    &state,
                    &value,
                    Constraint::TRUE,
                    true,
                    short_circuit,
                );
                self.assert_and_leave(&targets, &state, &value, Constraint::FALSE, false, None);
            }
            BranchKind::Coalesce { push_result } => {
                let kept = push_result.then(|| value.clone());
                self.assert_and_leave(&targets, &state, &value, null, true, None);
                self.assert_and_leave(&targets, &state, &value, not_null, false, kept);
            }
            BranchKind::ConditionalAccess { push_result } => {
                let result = push_result.then(SymbolicValue::null);
                self.assert_and_leave(&targets, &state, &value, null, true, result);
                self.assert_and_leave(&targets, &state, &value, not_null, false, Some(value.clone()));
            }
            BranchKind::CaseLabel(pattern) => {
                self.process_case_label(cfg, point, pattern, &targets, &state, &value)?;
            }
            BranchKind::ForEach => {
                // Enumerating a collection that is known to be empty never
                // enters the loop body.
                if !state.has_constraint(&value, Constraint::EMPTY_COLLECTION) {
                    self.leave_block(targets.from, targets.true_target, state.clone());
                }
                self.leave_block(targets.from, targets.false_target, state);
            }
        }

        Ok(())
    }

    /// Handles the test of the switch value `value` against the `pattern` of a
    /// case label. The switch value stays on the stack for the labels that
    /// follow a failed match.
    fn process_case_label(
        &mut self,
        cfg: &Cfg,
        point: ProgramPoint,
        pattern: &Pattern,
        targets: &BranchTargets,
        state: &ProgramState,
        value: &SymbolicValue,
    ) -> Result<()> {
        let null = Constraint::NULL;
        let not_null = Constraint::NOT_NULL;
        let kept = Some(value.clone());

        match pattern {
            Pattern::Null => {
                self.assert_and_leave(targets, state, value, null, true, None);
                self.assert_and_leave(targets, state, value, not_null, false, kept);
            }
            Pattern::Type { designation, .. } => {
                let visitor = InstructionVisitor::new(cfg, &self.solver);
                let matched = self
                    .solver
                    .with_constraint(state, value, not_null)
                    .into_iter()
                    .map(|s| visitor.bind_designation(&s, designation, value))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .locate(point)?;
                for state in matched {
                    self.leave_block(targets.from, targets.true_target, state);
                }
                self.leave_block(targets.from, targets.false_target, state.push_value(value.clone()));
            }
            Pattern::Var(designation) => {
                let state = InstructionVisitor::new(cfg, &self.solver)
                    .bind_designation(state, designation, value)
                    .locate(point)?;
                self.leave_block(targets.from, targets.true_target, state);
            }
            Pattern::Discard => {
                self.leave_block(targets.from, targets.true_target, state.clone());
            }
            Pattern::Constant => {
                self.assert_and_leave(targets, state, value, not_null, true, None);
                self.leave_block(targets.from, targets.false_target, state.push_value(value.clone()));
            }
        }

        Ok(())
    }

    /// Asserts `constraint` on `value` and leaves the block towards the target
    /// for `outcome` in every resulting state, pushing `result` first if there
    /// is one.
    fn assert_and_leave(
        &mut self,
        targets: &BranchTargets,
        state: &ProgramState,
        value: &SymbolicValue,
        constraint: Constraint,
        outcome: bool,
        result: Option<SymbolicValue>,
    ) {
        for state in self.solver.with_constraint(state, value, constraint) {
            let state = match &result {
                Some(result) => state.push_value(result.clone()),
                None => state,
            };
            self.leave_block(targets.from, targets.select(outcome), state);
        }
    }

    /// Transfers `state` from the end of `from` to the start of `to`.
    ///
    /// Bindings of variables that are dead at the end of `from` are dropped on
    /// the way, along with the constraints of values that can no longer be
    /// observed.
    fn leave_block(&mut self, from: BlockId, to: BlockId, state: ProgramState) {
        let state = if self.config.prune_dead_bindings {
            let symbols = self.cfg.symbols();
            let liveness = &self.liveness;
            state
                .remove_bindings_matching(|symbol, _| {
                    symbols.get(symbol).is_some_and(Symbol::is_local_or_parameter)
                        && !liveness.is_live_out(from, symbol)
                })
                .collect_garbage()
        } else {
            state
        };

        self.enqueue(ProgramPoint::start_of(to), state);
    }
}

/// The successors of a two-way branch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct BranchTargets {
    from:         BlockId,
    true_target:  BlockId,
    false_target: BlockId,
}

impl BranchTargets {
    fn select(&self, outcome: bool) -> BlockId {
        if outcome {
            self.true_target
        } else {
            self.false_target
        }
    }
}

/// The configuration for the exploded graph walk.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The maximum number of nodes that a single walk will process.
    ///
    /// Defaults to [`DEFAULT_MAX_STEPS`].
    pub max_steps: usize,

    /// The maximum number of times a single path will visit each program
    /// point.
    ///
    /// This limit is enforced _per-path_, and is what bounds the exploration
    /// of loops.
    ///
    /// Defaults to [`DEFAULT_MAX_PROGRAM_POINT_VISITS`].
    pub max_program_point_visits: usize,

    /// The maximum number of states a single constraint assertion may fork
    /// into before the solver stops reasoning about operands.
    ///
    /// Defaults to [`DEFAULT_MAX_CONSTRAINT_FORKS`].
    pub max_constraint_forks: usize,

    /// Whether to drop the bindings of dead variables at block boundaries.
    ///
    /// Defaults to [`DEFAULT_PRUNE_DEAD_BINDINGS`].
    pub prune_dead_bindings: bool,
}

impl Config {
    /// Sets the `max_steps` config parameter to `value`.
    #[must_use]
    pub fn with_max_steps(mut self, value: usize) -> Self {
        self.max_steps = value;
        self
    }

    /// Sets the `max_program_point_visits` config parameter to `value`.
    #[must_use]
    pub fn with_max_program_point_visits(mut self, value: usize) -> Self {
        self.max_program_point_visits = value;
        self
    }

    /// Sets the `max_constraint_forks` config parameter to `value`.
    #[must_use]
    pub fn with_max_constraint_forks(mut self, value: usize) -> Self {
        self.max_constraint_forks = value;
        self
    }

    /// Sets the `prune_dead_bindings` config parameter to `value`.
    #[must_use]
    pub fn with_prune_dead_bindings(mut self, value: bool) -> Self {
        self.prune_dead_bindings = value;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let max_steps = DEFAULT_MAX_STEPS;
        let max_program_point_visits = DEFAULT_MAX_PROGRAM_POINT_VISITS;
        let max_constraint_forks = DEFAULT_MAX_CONSTRAINT_FORKS;
        let prune_dead_bindings = DEFAULT_PRUNE_DEAD_BINDINGS;
        Self {
            max_steps,
            max_program_point_visits,
            max_constraint_forks,
            prune_dead_bindings,
        }
    }
}
