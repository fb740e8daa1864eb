//! This module contains the constraint solver, which asserts facts about
//! symbolic values and reasons through composite values to learn facts about
//! their operands.
//!
//! # Forking
//!
//! Asserting a fact can yield zero, one, or several states. Zero states means
//! that the fact contradicts what is already known, and the path is
//! infeasible. Several states arise when the fact can be satisfied in more
//! than one way, such as asserting that `a & b` is false. The number of states
//! is bounded by [`ConstraintSolver::max_forks`]; beyond that bound the solver
//! records the fact on the composite alone and stops reasoning about the
//! operands.

use crate::{
    constant::DEFAULT_MAX_CONSTRAINT_FORKS,
    state::ProgramState,
    value::{
        constraint::{BoolConstraint, Constraint, Domain, ObjectConstraint, StringConstraint},
        SymbolicValue,
        SymbolicValueData,
    },
};

/// Asserts constraints on values with propagation through composites.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConstraintSolver {
    max_forks: usize,
}

impl ConstraintSolver {
    /// Constructs a new solver that allows at most `max_forks` states to
    /// result from a single assertion.
    #[must_use]
    pub fn new(max_forks: usize) -> Self {
        let max_forks = max_forks.max(1);
        Self { max_forks }
    }

    /// Gets the maximum number of states a single assertion may yield.
    #[must_use]
    pub fn max_forks(&self) -> usize {
        self.max_forks
    }

    /// Asserts that `value` satisfies `constraint` in `state`.
    ///
    /// The result is every state in which the assertion holds, which is empty
    /// if the assertion is infeasible.
    #[must_use]
    pub fn with_constraint(
        &self,
        state: &ProgramState,
        value: &SymbolicValue,
        constraint: Constraint,
    ) -> Vec<ProgramState> {
        let mut states = self.assert(state, value, constraint);
        if states.len() > self.max_forks {
            log::trace!("Constraint on {value} forked {} ways, not propagating", states.len());
            states = state.set_constraint(value, constraint).into_iter().collect();
        }
        states
    }

    /// Asserts that `value` does not satisfy `constraint` in `state`.
    ///
    /// This is infeasible if `value` is already known to satisfy `constraint`.
    /// Where the domain has no opposite to assert, the state is returned
    /// unchanged.
    #[must_use]
    pub fn with_opposite_constraint(
        &self,
        state: &ProgramState,
        value: &SymbolicValue,
        constraint: Constraint,
    ) -> Vec<ProgramState> {
        if state.has_constraint(value, constraint) {
            return Vec::new();
        }

        match constraint.opposite() {
            Some(opposite) => self.with_constraint(state, value, opposite),
            None => vec![state.clone()],
        }
    }

    /// Asserts that each of `constraints` holds on its value, in order.
    fn assert_all(
        &self,
        state: &ProgramState,
        constraints: &[(&SymbolicValue, Constraint)],
    ) -> Vec<ProgramState> {
        let mut states = vec![state.clone()];
        for (value, constraint) in constraints {
            states = states
                .iter()
                .flat_map(|s| self.assert(s, value, *constraint))
                .collect();
            if states.is_empty() || states.len() > self.max_forks {
                break;
            }
        }
        states
    }

    /// Asserts each of the `alternatives`, collecting the states of those that
    /// are feasible.
    fn assert_any(
        &self,
        state: &ProgramState,
        alternatives: &[&[(&SymbolicValue, Constraint)]],
    ) -> Vec<ProgramState> {
        alternatives
            .iter()
            .flat_map(|alternative| self.assert_all(state, alternative))
            .collect()
    }

    fn assert(
        &self,
        state: &ProgramState,
        value: &SymbolicValue,
        constraint: Constraint,
    ) -> Vec<ProgramState> {
        // An assertion that is already known adds nothing.
        if state.has_constraint(value, constraint) {
            return vec![state.clone()];
        }
        let Some(state) = state.set_constraint(value, constraint) else {
            return Vec::new();
        };

        match constraint {
            Constraint::Bool(b) => self.propagate_bool(&state, value, b),
            _ => vec![state],
        }
    }

    fn propagate_bool(
        &self,
        state: &ProgramState,
        value: &SymbolicValue,
        b: BoolConstraint,
    ) -> Vec<ProgramState> {
        use BoolConstraint::{False as F, True as T};

        let t = Constraint::TRUE;
        let f = Constraint::FALSE;
        match (value.data(), b) {
            (SymbolicValueData::Not { value }, _) => {
                self.assert(state, value, Constraint::Bool(b.negate()))
            }
            (SymbolicValueData::And { left, right }, T) => {
                self.assert_all(state, &[(left, t), (right, t)])
            }
            (SymbolicValueData::And { left, right }, F) => self.assert_any(state, &[
                &[(left, f), (right, t)],
                &[(left, t), (right, f)],
                &[(left, f), (right, f)],
            ]),
            (SymbolicValueData::Or { left, right }, T) => self.assert_any(state, &[
                &[(left, t), (right, f)],
                &[(left, f), (right, t)],
                &[(left, t), (right, t)],
            ]),
            (SymbolicValueData::Or { left, right }, F) => {
                self.assert_all(state, &[(left, f), (right, f)])
            }
            (SymbolicValueData::Xor { left, right }, T) => {
                self.assert_any(state, &[&[(left, t), (right, f)], &[(left, f), (right, t)]])
            }
            (SymbolicValueData::Xor { left, right }, F) => {
                self.assert_any(state, &[&[(left, t), (right, t)], &[(left, f), (right, f)]])
            }
            (SymbolicValueData::ReferenceEquals { left, right }, _) => {
                self.propagate_equality(state, left, right, b == T, false)
            }
            (SymbolicValueData::ValueEquals { left, right }, _) => {
                self.propagate_equality(state, left, right, b == T, true)
            }
            (SymbolicValueData::IsNullOrEmpty { value, whitespace }, T) => {
                let shape = if *whitespace {
                    StringConstraint::EMPTY_OR_WHITESPACE
                } else {
                    StringConstraint::EMPTY
                };
                self.assert_any(state, &[&[(value, Constraint::NULL)], &[(
                    value,
                    Constraint::String(shape),
                )]])
            }
            (SymbolicValueData::IsNullOrEmpty { value, whitespace }, F) => {
                let shape = if *whitespace {
                    StringConstraint::FULL_NOT_WHITESPACE
                } else {
                    StringConstraint::FULL_STRING
                };
                self.assert(state, value, Constraint::String(shape))
            }
            (SymbolicValueData::IsType { value }, T)
            | (SymbolicValueData::HasValue { value }, T) => {
                self.assert(state, value, Constraint::NOT_NULL)
            }
            (SymbolicValueData::HasValue { value }, F) => {
                self.assert(state, value, Constraint::NULL)
            }
            _ => vec![state.clone()],
        }
    }

    /// Propagates the outcome of an equality test between `left` and `right`.
    ///
    /// When the operands are equal they share their nullability and, for
    /// value equality, their truth. When they are not, they cannot both be
    /// null, cannot be the same value, and for value equality cannot share
    /// their truth.
    fn propagate_equality(
        &self,
        state: &ProgramState,
        left: &SymbolicValue,
        right: &SymbolicValue,
        holds: bool,
        by_value: bool,
    ) -> Vec<ProgramState> {
        let mut facts: Vec<(&SymbolicValue, Constraint)> = Vec::new();

        if holds {
            if left == right {
                return vec![state.clone()];
            }
            for (from, to) in [(left, right), (right, left)] {
                if let Some(c) = state.constraint_in(from, Domain::Object) {
                    facts.push((to, c));
                }
                if by_value {
                    if let Some(c) = state.constraint_in(from, Domain::Bool) {
                        facts.push((to, c));
                    }
                }
            }
        } else {
            let null = Constraint::Object(ObjectConstraint::Null);
            if left == right || (state.has_constraint(left, null) && state.has_constraint(right, null))
            {
                return Vec::new();
            }
            for (from, to) in [(left, right), (right, left)] {
                if state.has_constraint(from, null) {
                    facts.push((to, Constraint::NOT_NULL));
                }
                if by_value {
                    if let Some(Constraint::Bool(b)) = state.constraint_in(from, Domain::Bool) {
                        facts.push((to, Constraint::Bool(b.negate())));
                    }
                }
            }
        }

        self.assert_all(state, &facts)
    }
}

impl Default for ConstraintSolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONSTRAINT_FORKS)
    }
}
