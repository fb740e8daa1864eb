//! This module contains the program state that is tracked for every path
//! through the exploded graph.

pub mod stack;

use std::{
    collections::BTreeSet,
    hash::{Hash, Hasher},
};

use rpds::RedBlackTreeMap;

use crate::{
    cfg::symbol::SymbolId,
    error::execution::Error,
    graph::{data::VisitCounts, point::ProgramPoint},
    state::stack::Stack,
    value::{
        constraint::{Constraint, ConstraintSet, Domain},
        SymbolicValue,
    },
};

/// An immutable snapshot of everything the engine knows at a point on a path.
///
/// It consists of the operand stack, the bindings of symbols to the values
/// they currently hold, and the constraints known about those values. All
/// three are persistent structures, so deriving a new state from an old one
/// shares everything that did not change.
///
/// # Identity
///
/// Two states are equal exactly when their stacks, bindings, and constraints
/// are equal. The per-path visit counts that the walker uses to bound loops
/// travel with the state but are not part of its identity.
#[derive(Clone, Debug)]
pub struct ProgramState {
    stack:       Stack,
    bindings:    RedBlackTreeMap<SymbolId, SymbolicValue>,
    constraints: RedBlackTreeMap<SymbolicValue, ConstraintSet>,
    visits:      VisitCounts,
}

impl ProgramState {
    /// Constructs a new state with an empty stack and no bindings, in which
    /// only the constants are constrained.
    #[must_use]
    pub fn new() -> Self {
        let seed = [
            (SymbolicValue::true_value(), Constraint::TRUE),
            (SymbolicValue::false_value(), Constraint::FALSE),
            (SymbolicValue::null(), Constraint::NULL),
            (SymbolicValue::this(), Constraint::NOT_NULL),
        ];
        let constraints = seed
            .into_iter()
            .fold(RedBlackTreeMap::new(), |map, (value, constraint)| {
                let set = ConstraintSet::new()
                    .with(constraint)
                    .unwrap_or_else(ConstraintSet::new);
                map.insert(value, set)
            });

        Self {
            stack: Stack::new(),
            bindings: RedBlackTreeMap::new(),
            constraints,
            visits: VisitCounts::new(),
        }
    }

    /// Gets the operand stack.
    #[must_use]
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Pushes `value` onto the operand stack.
    #[must_use]
    pub fn push_value(&self, value: SymbolicValue) -> Self {
        let mut state = self.clone();
        state.stack = self.stack.push(value);
        state
    }

    /// Pops the top value off the operand stack.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the stack is empty.
    pub fn pop_value(&self) -> Result<(Self, SymbolicValue), Error> {
        let (stack, value) = self.stack.pop()?;
        let mut state = self.clone();
        state.stack = stack;
        Ok((state, value))
    }

    /// Pops the top `count` values off the operand stack, returning them in
    /// the order in which they were pushed.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the stack holds fewer than `count` values.
    pub fn pop_values(&self, count: usize) -> Result<(Self, Vec<SymbolicValue>), Error> {
        let (stack, values) = self.stack.pop_many(count)?;
        let mut state = self.clone();
        state.stack = stack;
        Ok((state, values))
    }

    /// Reads the value at `depth` on the operand stack without popping it.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no value exists at `depth`.
    pub fn peek_value(&self, depth: usize) -> Result<&SymbolicValue, Error> {
        self.stack.read(depth)
    }

    /// Binds `symbol` to `value`, replacing any earlier binding.
    #[must_use]
    pub fn store_binding(&self, symbol: SymbolId, value: SymbolicValue) -> Self {
        let mut state = self.clone();
        state.bindings = self.bindings.insert(symbol, value);
        state
    }

    /// Gets the value currently bound to `symbol`, if any.
    #[must_use]
    pub fn lookup_binding(&self, symbol: SymbolId) -> Option<&SymbolicValue> {
        self.bindings.get(&symbol)
    }

    /// Removes the binding of `symbol`.
    #[must_use]
    pub fn remove_binding(&self, symbol: SymbolId) -> Self {
        let mut state = self.clone();
        state.bindings = self.bindings.remove(&symbol);
        state
    }

    /// Removes every binding for which `predicate` holds.
    #[must_use]
    pub fn remove_bindings_matching(
        &self,
        mut predicate: impl FnMut(SymbolId, &SymbolicValue) -> bool,
    ) -> Self {
        let doomed: Vec<SymbolId> = self
            .bindings
            .iter()
            .filter(|(symbol, value)| predicate(**symbol, value))
            .map(|(symbol, _)| *symbol)
            .collect();
        if doomed.is_empty() {
            return self.clone();
        }

        let mut state = self.clone();
        for symbol in doomed {
            state.bindings.remove_mut(&symbol);
        }
        state
    }

    /// Iterates over the bindings in the state.
    pub fn bindings(&self) -> impl Iterator<Item = (SymbolId, &SymbolicValue)> {
        self.bindings.iter().map(|(symbol, value)| (*symbol, value))
    }

    /// Gets the symbols currently bound to `value`.
    #[must_use]
    pub fn symbols_bound_to(&self, value: &SymbolicValue) -> Vec<SymbolId> {
        self.bindings()
            .filter(|(_, bound)| *bound == value)
            .map(|(symbol, _)| symbol)
            .collect()
    }

    /// Gets the constraints known about `value`.
    #[must_use]
    pub fn constraints_of(&self, value: &SymbolicValue) -> ConstraintSet {
        self.constraints.get(value).copied().unwrap_or_default()
    }

    /// Gets the constraint known about `value` in `domain`, if any.
    #[must_use]
    pub fn constraint_in(&self, value: &SymbolicValue, domain: Domain) -> Option<Constraint> {
        self.constraints_of(value).get(domain)
    }

    /// Checks if `value` is known to satisfy `constraint`.
    #[must_use]
    pub fn has_constraint(&self, value: &SymbolicValue, constraint: Constraint) -> bool {
        self.constraints_of(value).implies(constraint)
    }

    /// Records that `value` satisfies `constraint`, without propagating the
    /// fact into any other value.
    ///
    /// Returns [`None`] if the constraint contradicts what is already known
    /// about `value`, meaning that the state is infeasible.
    ///
    /// See [`crate::value::propagation::ConstraintSolver`] for the operation
    /// that also reasons through composite values.
    #[must_use]
    pub fn set_constraint(&self, value: &SymbolicValue, constraint: Constraint) -> Option<Self> {
        let current = self.constraints_of(value);
        let updated = current.with(constraint)?;
        if updated == current && self.constraints.contains_key(value) {
            return Some(self.clone());
        }

        let mut state = self.clone();
        state.constraints = self.constraints.insert(value.clone(), updated);
        Some(state)
    }

    /// Forgets the constraint known about `value` in `domain`.
    #[must_use]
    pub fn remove_constraint(&self, value: &SymbolicValue, domain: Domain) -> Self {
        let Some(current) = self.constraints.get(value) else {
            return self.clone();
        };
        let updated = current.without(domain);

        let mut state = self.clone();
        state.constraints = if updated.is_empty() {
            self.constraints.remove(value)
        } else {
            self.constraints.insert(value.clone(), updated)
        };
        state
    }

    /// Forgets everything known about `value`.
    #[must_use]
    pub fn remove_constraints(&self, value: &SymbolicValue) -> Self {
        let mut state = self.clone();
        state.constraints = self.constraints.remove(value);
        state
    }

    /// Iterates over the values that have constraints, along with those
    /// constraints.
    pub fn constrained_values(&self) -> impl Iterator<Item = (&SymbolicValue, &ConstraintSet)> {
        self.constraints.iter()
    }

    /// Drops the constraints of every value that can no longer be observed.
    ///
    /// A value is observable if it is on the stack, bound to a symbol, a
    /// constant, or an operand of an observable value. A composite whose
    /// operands are all observable is kept too, as evaluating it again yields
    /// the same value. Values that hold a lock are kept regardless, as a lock
    /// that is never released must still be seen at the exit of the method.
    #[must_use]
    pub fn collect_garbage(&self) -> Self {
        let mut reachable: BTreeSet<&SymbolicValue> = BTreeSet::new();
        let mut pending: Vec<&SymbolicValue> = self
            .stack
            .iter()
            .chain(self.bindings.values())
            .collect();
        while let Some(value) = pending.pop() {
            if reachable.insert(value) {
                pending.extend(value.operands());
            }
        }

        let doomed: Vec<SymbolicValue> = self
            .constraints
            .iter()
            .filter(|(value, constraints)| {
                let operands = value.operands();
                let derivable =
                    !operands.is_empty() && operands.iter().all(|o| reachable.contains(o));
                !value.is_constant()
                    && !reachable.contains(value)
                    && !derivable
                    && !constraints.implies(Constraint::HELD)
            })
            .map(|(value, _)| value.clone())
            .collect();
        if doomed.is_empty() {
            return self.clone();
        }

        let mut state = self.clone();
        for value in &doomed {
            state.constraints.remove_mut(value);
        }
        state
    }

    /// Gets the number of times the path leading to this state has visited
    /// `point`.
    #[must_use]
    pub fn visit_count(&self, point: ProgramPoint) -> usize {
        self.visits.count(point)
    }

    /// Records another visit to `point` by the path leading to this state.
    #[must_use]
    pub fn mark_visited(&self, point: ProgramPoint) -> Self {
        let mut state = self.clone();
        state.visits = self.visits.mark_visited(point);
        state
    }
}

impl Default for ProgramState {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ProgramState {
    fn eq(&self, other: &Self) -> bool {
        self.stack == other.stack
            && self.bindings == other.bindings
            && self.constraints == other.constraints
    }
}

impl Eq for ProgramState {}

impl Hash for ProgramState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stack.hash(state);
        self.bindings.size().hash(state);
        for (symbol, value) in &self.bindings {
            symbol.hash(state);
            value.hash(state);
        }
        self.constraints.size().hash(state);
        for (value, constraints) in &self.constraints {
            value.hash(state);
            constraints.hash(state);
        }
    }
}
