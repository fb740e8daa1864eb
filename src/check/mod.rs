//! This module contains the definition of the `Check` trait that allows
//! pluggable rules to observe and constrain the program states of a walk, and
//! the ordered container that the walker drives them through.

pub mod collection;
pub mod condition;
pub mod dispose;
pub mod lock;
pub mod null_dereference;
pub mod nullable;

use std::{
    any::{Any, TypeId},
    fmt::Debug,
};

use derivative::Derivative;
use downcast_rs::Downcast;

use crate::{
    cfg::{instruction::Instruction, symbol::TypeInfo, Cfg, Span},
    check::{
        collection::EmptyCollectionCheck,
        condition::ConstantConditionCheck,
        dispose::DisposedTwiceCheck,
        lock::LockReleaseCheck,
        null_dereference::NullDereferenceCheck,
        nullable::EmptyNullableCheck,
    },
    finding::Finding,
    graph::{data::Findings, point::ProgramPoint, Completion},
    state::ProgramState,
    value::{constraint::Constraint, propagation::ConstraintSolver, SymbolicValue, SymbolicValueData},
};

/// Everything a check can see of the walk while one of its hooks runs.
#[derive(Debug)]
pub struct CheckContext<'a> {
    /// The graph being walked.
    pub cfg: &'a Cfg,

    /// The program point at which the hook was triggered.
    pub point: ProgramPoint,

    /// The source span of the node at `point`, if known.
    pub span: Option<Span>,

    /// The solver to use for asserting constraints.
    pub solver: &'a ConstraintSolver,

    /// The sink for findings.
    findings: &'a mut Findings,
}

impl<'a> CheckContext<'a> {
    /// Constructs a new context for a hook triggered at `point`.
    pub fn new(
        cfg: &'a Cfg,
        point: ProgramPoint,
        span: Option<Span>,
        solver: &'a ConstraintSolver,
        findings: &'a mut Findings,
    ) -> Self {
        Self {
            cfg,
            point,
            span,
            solver,
            findings,
        }
    }

    /// Publishes `finding`, keyed on the `value` it concerns.
    ///
    /// Returns `true` if the finding had not been published before.
    pub fn publish(&mut self, finding: Finding, value: Option<&SymbolicValue>) -> bool {
        self.findings.publish(finding, value.cloned())
    }

    /// Creates a finding for `rule_id` at the current program point.
    pub fn finding(&self, rule_id: &str, message: impl Into<String>) -> Finding {
        Finding::new(rule_id, self.point, self.span, message)
    }

    /// Gets a human-readable name for `value` in `state`, being the name of a
    /// symbol bound to it if there is one.
    #[must_use]
    pub fn name_of(&self, state: &ProgramState, value: &SymbolicValue) -> String {
        let symbols = self.cfg.symbols();
        state
            .symbols_bound_to(value)
            .into_iter()
            .find_map(|id| symbols.get(id))
            .map(|symbol| symbol.name.clone())
            .or_else(|| (*value.data() == SymbolicValueData::This).then(|| "this".to_string()))
            .unwrap_or_else(|| "Object".to_string())
    }

    /// Gets the name of the variable or member whose read pushed the operand
    /// at `depth` on the stack at the current point.
    ///
    /// Unlike [`Self::name_of`], this tells apart symbols that are bound to
    /// the same value. It is [`None`] if the operand was computed, or was
    /// pushed in an earlier block.
    #[must_use]
    pub fn operand_name(&self, depth: usize) -> Option<String> {
        self.name_pushed_before(self.point.offset, depth)
    }

    /// Gets the name of the receiver of the method group called by an
    /// invocation with `arg_count` arguments at the current point.
    #[must_use]
    pub fn receiver_name(&self, arg_count: usize) -> Option<String> {
        let (group_at, _) = self.producer_before(self.point.offset, arg_count)?;
        self.name_pushed_before(group_at, 0)
    }

    fn name_pushed_before(&self, offset: usize, depth: usize) -> Option<String> {
        let (at, instruction) = self.producer_before(offset, depth)?;
        let symbol = match instruction {
            Instruction::Read { symbol, .. } => *symbol,
            Instruction::MemberAccess { member, .. } => *member,
            Instruction::Cast(_) => return self.name_pushed_before(at, 0),
            _ => return None,
        };
        self.cfg.symbols().get(symbol).map(|symbol| symbol.name.clone())
    }

    /// Finds the node before `offset` in the current block that pushed the
    /// operand found at `depth` once the nodes up to `offset` have run.
    fn producer_before(&self, offset: usize, depth: usize) -> Option<(usize, &'a Instruction)> {
        let cfg: &'a Cfg = self.cfg;
        let nodes = &cfg.block(self.point.block)?.nodes;
        let mut depth = depth;
        for at in (0..offset.min(nodes.len())).rev() {
            let instruction = &nodes[at].instruction;
            let effect = instruction.stack_effect()?;
            if depth < effect.pushes {
                return Some((at, instruction));
            }
            depth = depth + effect.pops - effect.pushes;
        }
        None
    }

    /// Asserts that `value` satisfies `constraint`, keeping the first
    /// resulting state.
    ///
    /// Returns [`None`] if the assertion is infeasible.
    #[must_use]
    pub fn constrain(
        &self,
        state: &ProgramState,
        value: &SymbolicValue,
        constraint: Constraint,
    ) -> Option<ProgramState> {
        self.solver
            .with_constraint(state, value, constraint)
            .into_iter()
            .next()
    }
}

/// A trait representing a pluggable rule that observes the states of a walk,
/// narrows them using its domain knowledge, and publishes findings.
///
/// Every hook has a default implementation that leaves the state untouched,
/// so a check only implements the hooks it needs.
///
/// # Lifetime
///
/// A check is created for a single walk. It may hold caches for that walk, and
/// is discarded when the walk ends.
pub trait Check
where
    Self: Any + Debug + Downcast,
{
    /// Runs before `instruction` is visited.
    ///
    /// Returning [`None`] says that the path cannot continue past this point,
    /// and the node is dropped without further processing.
    fn pre_process_instruction(
        &mut self,
        _ctx: &mut CheckContext<'_>,
        _instruction: &Instruction,
        state: ProgramState,
    ) -> Option<ProgramState> {
        Some(state)
    }

    /// Runs after `instruction` has been visited.
    fn post_process_instruction(
        &mut self,
        _ctx: &mut CheckContext<'_>,
        _instruction: &Instruction,
        state: ProgramState,
    ) -> ProgramState {
        state
    }

    /// Runs when a `using` statement takes ownership of `resource`.
    fn pre_process_using_statement(
        &mut self,
        _ctx: &mut CheckContext<'_>,
        _resource: &SymbolicValue,
        state: ProgramState,
    ) -> Option<ProgramState> {
        Some(state)
    }

    /// Runs before an object of type `ty` is created.
    fn object_creating(
        &mut self,
        _ctx: &mut CheckContext<'_>,
        _ty: &TypeInfo,
        state: ProgramState,
    ) -> ProgramState {
        state
    }

    /// Runs after `value`, an object of type `ty` constructed from
    /// `arg_count` operands, has been created.
    fn object_created(
        &mut self,
        _ctx: &mut CheckContext<'_>,
        _ty: &TypeInfo,
        _arg_count: usize,
        _value: &SymbolicValue,
        state: ProgramState,
    ) -> ProgramState {
        state
    }

    /// Runs for every feasible outcome of a branch condition.
    ///
    /// `is_literal` is set when the condition is written as a literal in the
    /// source.
    fn condition_evaluated(
        &mut self,
        _ctx: &mut CheckContext<'_>,
        _condition: &SymbolicValue,
        _is_literal: bool,
        _outcome: bool,
        _state: &ProgramState,
    ) {
    }

    /// Runs when a path reaches the exit block of the method.
    fn exit_block_reached(&mut self, _ctx: &mut CheckContext<'_>, _state: &ProgramState) {}

    /// Runs once when the walk has finished, however it finished.
    fn exploration_ended(&mut self, _ctx: &mut CheckContext<'_>, _completion: Completion) {}
}

/// A container for a set of checks that will be run in **registration order**.
///
/// # Ordering
///
/// Later checks see the state as narrowed by earlier ones, and a check that
/// rules a path out stops the checks after it from seeing that path at all.
#[derive(Debug)]
pub struct Checks {
    checks: Vec<ChecksItem>,
}

impl Checks {
    /// Constructs a new container with no checks.
    #[must_use]
    pub fn new() -> Self {
        let checks = Vec::new();
        Self { checks }
    }

    /// Adds the `check` to the end of the ordering.
    ///
    /// If a check of the given type already exists in the ordering, it will
    /// not be added.
    pub fn add<C: Check>(&mut self, check: C) {
        let item = ChecksItem::new(check);
        if !self.checks.contains(&item) {
            self.checks.push(item);
        }
    }

    /// Gets the check of type `C`, if one is registered.
    #[must_use]
    pub fn get<C: Check>(&self) -> Option<&C> {
        self.checks
            .iter()
            .find_map(|item| item.check.as_ref().as_any().downcast_ref::<C>())
    }

    /// Gets the number of registered checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Checks if no checks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Runs [`Check::pre_process_instruction`] for every check in order,
    /// stopping at the first that rules the path out.
    pub fn pre_process_instruction(
        &mut self,
        ctx: &mut CheckContext<'_>,
        instruction: &Instruction,
        state: ProgramState,
    ) -> Option<ProgramState> {
        self.checks.iter_mut().try_fold(state, |state, item| {
            item.check.pre_process_instruction(ctx, instruction, state)
        })
    }

    /// Runs [`Check::post_process_instruction`] for every check in order.
    pub fn post_process_instruction(
        &mut self,
        ctx: &mut CheckContext<'_>,
        instruction: &Instruction,
        state: ProgramState,
    ) -> ProgramState {
        self.checks.iter_mut().fold(state, |state, item| {
            item.check.post_process_instruction(ctx, instruction, state)
        })
    }

    /// Runs [`Check::pre_process_using_statement`] for every check in order,
    /// stopping at the first that rules the path out.
    pub fn pre_process_using_statement(
        &mut self,
        ctx: &mut CheckContext<'_>,
        resource: &SymbolicValue,
        state: ProgramState,
    ) -> Option<ProgramState> {
        self.checks.iter_mut().try_fold(state, |state, item| {
            item.check.pre_process_using_statement(ctx, resource, state)
        })
    }

    /// Runs [`Check::object_creating`] for every check in order.
    pub fn object_creating(
        &mut self,
        ctx: &mut CheckContext<'_>,
        ty: &TypeInfo,
        state: ProgramState,
    ) -> ProgramState {
        self.checks
            .iter_mut()
            .fold(state, |state, item| item.check.object_creating(ctx, ty, state))
    }

    /// Runs [`Check::object_created`] for every check in order.
    pub fn object_created(
        &mut self,
        ctx: &mut CheckContext<'_>,
        ty: &TypeInfo,
        arg_count: usize,
        value: &SymbolicValue,
        state: ProgramState,
    ) -> ProgramState {
        self.checks.iter_mut().fold(state, |state, item| {
            item.check.object_created(ctx, ty, arg_count, value, state)
        })
    }

    /// Runs [`Check::condition_evaluated`] for every check in order.
    pub fn condition_evaluated(
        &mut self,
        ctx: &mut CheckContext<'_>,
        condition: &SymbolicValue,
        is_literal: bool,
        outcome: bool,
        state: &ProgramState,
    ) {
        for item in &mut self.checks {
            item.check
                .condition_evaluated(ctx, condition, is_literal, outcome, state);
        }
    }

    /// Runs [`Check::exit_block_reached`] for every check in order.
    pub fn exit_block_reached(&mut self, ctx: &mut CheckContext<'_>, state: &ProgramState) {
        for item in &mut self.checks {
            item.check.exit_block_reached(ctx, state);
        }
    }

    /// Runs [`Check::exploration_ended`] for every check in order.
    pub fn exploration_ended(&mut self, ctx: &mut CheckContext<'_>, completion: Completion) {
        for item in &mut self.checks {
            item.check.exploration_ended(ctx, completion);
        }
    }
}

impl Default for Checks {
    fn default() -> Self {
        // The nullability checks go first so that the others see receivers
        // that are already known to be non-null.
        let mut checks = Self::new();
        checks.add(NullDereferenceCheck);
        checks.add(EmptyNullableCheck);
        checks.add(DisposedTwiceCheck);
        checks.add(LockReleaseCheck::default());
        checks.add(EmptyCollectionCheck);
        checks.add(ConstantConditionCheck::default());

        checks
    }
}

/// An internal type to make it possible to identify checks by their type.
#[derive(Debug, Derivative)]
#[derivative(Eq, PartialEq)]
struct ChecksItem {
    /// A field used to identify the check.
    pub type_key: TypeId,

    /// The check itself.
    #[derivative(PartialEq = "ignore")]
    pub check: Box<dyn Check>,
}

impl ChecksItem {
    /// Constructs a new checks item.
    pub fn new<C: Check>(check: C) -> Self {
        let type_key = TypeId::of::<C>();
        let check = Box::new(check);

        Self { type_key, check }
    }
}
