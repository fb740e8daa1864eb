//! This module contains the instruction visitor, which gives every
//! [`Instruction`] its transfer function over [`ProgramState`]s.
//!
//! # Transitions
//!
//! A transition consumes its operands from the operand stack and pushes its
//! result, if it has one, in accordance with [`Instruction::stack_effect`].
//! Operands that the visitor cannot reason about produce fresh values, so the
//! visitor never fails on well-formed input. A transition whose outcome
//! contradicts what is already known yields no state, ending the path.

pub mod invocation;

use crate::{
    cfg::{
        instruction::{
            AssignmentKind,
            AssignmentTarget,
            BinaryOperator,
            Designation,
            EqualityKind,
            Instruction,
            Literal,
            Pattern,
            Receiver,
            UnaryOperator,
        },
        symbol::{PropertyRole, Symbol, SymbolId, TypeInfo},
        Cfg,
    },
    error::execution::Error,
    state::ProgramState,
    value::{
        constraint::{BoolConstraint, Constraint, Domain, StringConstraint},
        propagation::ConstraintSolver,
        SymbolicValue,
        SymbolicValueData,
    },
};

/// The result of a single transition.
///
/// `Ok(None)` means that the transition is infeasible in the input state.
pub type Transition = Result<Option<ProgramState>, Error>;

/// Computes the state after an instruction from the state before it.
#[derive(Clone, Copy, Debug)]
pub struct InstructionVisitor<'a> {
    cfg:    &'a Cfg,
    solver: &'a ConstraintSolver,
}

impl<'a> InstructionVisitor<'a> {
    /// Constructs a new visitor for instructions of `cfg`.
    #[must_use]
    pub fn new(cfg: &'a Cfg, solver: &'a ConstraintSolver) -> Self {
        Self { cfg, solver }
    }

    /// Applies the transfer function of `instruction` to `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the instruction is unsupported, if it refers to a
    /// symbol that does not exist, or if the stack does not hold its operands.
    pub fn visit(&self, instruction: &Instruction, state: &ProgramState) -> Transition {
        match instruction {
            Instruction::Literal(literal) => self.visit_literal(literal, state),
            Instruction::This | Instruction::Base => Ok(Some(state.push_value(SymbolicValue::this()))),
            Instruction::Read { symbol, ref_or_out } => self.visit_read(*symbol, *ref_or_out, state),
            Instruction::Declaration {
                symbol,
                initialized,
            } => {
                self.symbol(*symbol)?;
                if *initialized {
                    let (state, value) = state.pop_value()?;
                    Ok(Some(state.store_binding(*symbol, value)))
                } else {
                    Ok(Some(state.remove_binding(*symbol)))
                }
            }
            Instruction::MemberAccess { member, receiver } => {
                self.visit_member_access(*member, *receiver, state)
            }
            Instruction::MethodGroup { name, receiver } => {
                let (state, value) = match receiver {
                    Receiver::Instance => {
                        let (state, receiver) = state.pop_value()?;
                        (state, SymbolicValue::method_group(receiver, name.as_str()))
                    }
                    Receiver::Static => (state.clone(), SymbolicValue::fresh()),
                };
                Ok(Some(state.push_value(value)))
            }
            Instruction::Invocation { method, arg_count } => {
                self.visit_invocation(method, *arg_count, state)
            }
            Instruction::Assignment { target, kind } => self.visit_assignment(target, *kind, state),
            Instruction::Binary(operator) => self.visit_binary(*operator, state),
            Instruction::Unary(operator) => {
                let (state, operand) = state.pop_value()?;
                let value = match operator {
                    UnaryOperator::Not => negate(&state, operand),
                    UnaryOperator::Other => SymbolicValue::fresh(),
                };
                Ok(Some(state.push_value(value)))
            }
            Instruction::Cast(_) => {
                state.peek_value(0)?;
                Ok(Some(state.clone()))
            }
            Instruction::As { .. } => {
                let (state, operand) = state.pop_value()?;
                let value = if state.has_constraint(&operand, Constraint::NULL) {
                    SymbolicValue::null()
                } else {
                    SymbolicValue::fresh()
                };
                Ok(Some(state.push_value(value)))
            }
            Instruction::Is { .. } => {
                let (state, operand) = state.pop_value()?;
                let value = if state.has_constraint(&operand, Constraint::NULL) {
                    SymbolicValue::false_value()
                } else {
                    SymbolicValue::is_type(operand)
                };
                Ok(Some(state.push_value(value)))
            }
            Instruction::IsPattern(pattern) => self.visit_is_pattern(pattern, state),
            Instruction::ObjectCreation { ty, arg_count } => {
                let (state, _) = state.pop_values(*arg_count)?;
                let value = SymbolicValue::fresh();
                let constraint = if ty.is_nullable_value() && *arg_count == 0 {
                    Constraint::NULL
                } else {
                    Constraint::NOT_NULL
                };
                Ok(self.narrow(&state, &value, constraint).map(|s| s.push_value(value)))
            }
            Instruction::ArrayCreation { arg_count: count }
            | Instruction::AnonymousObjectCreation {
                member_count: count,
            }
            | Instruction::Tuple { arity: count } => {
                let (state, _) = state.pop_values(*count)?;
                Ok(self.push_fresh(&state, Some(Constraint::NOT_NULL)))
            }
            Instruction::Lambda => Ok(self.push_fresh(state, Some(Constraint::NOT_NULL))),
            Instruction::ElementAccess { arg_count } => {
                let (state, _) = state.pop_values(arg_count + 1)?;
                Ok(self.push_fresh(&state, None))
            }
            Instruction::Await => {
                let (state, _) = state.pop_value()?;
                let state = self.clear_fields(&state);
                Ok(self.push_fresh(&state, None))
            }
            Instruction::Default { ty } => {
                if ty.can_be_null() {
                    Ok(Some(state.push_value(SymbolicValue::null())))
                } else {
                    Ok(self.push_fresh(state, Some(Constraint::NOT_NULL)))
                }
            }
            Instruction::NameOf => Ok(self.push_fresh(
                state,
                Some(Constraint::String(StringConstraint::FULL_NOT_WHITESPACE)),
            )),
            Instruction::Discard => {
                let (state, _) = state.pop_value()?;
                Ok(Some(state))
            }
            Instruction::Unsupported { kind } => {
                Err(Error::UnsupportedInstruction { kind: kind.clone() })
            }
        }
    }

    fn visit_literal(&self, literal: &Literal, state: &ProgramState) -> Transition {
        let state = match literal {
            Literal::True => state.push_value(SymbolicValue::true_value()),
            Literal::False => state.push_value(SymbolicValue::false_value()),
            Literal::Null => state.push_value(SymbolicValue::null()),
            Literal::String(text) => {
                let shape = StringConstraint::of_literal(text);
                return Ok(self.push_fresh(state, Some(Constraint::String(shape))));
            }
            Literal::Numeric | Literal::Char => {
                return Ok(self.push_fresh(state, Some(Constraint::NOT_NULL)));
            }
        };

        Ok(Some(state))
    }

    fn visit_read(&self, symbol: SymbolId, ref_or_out: bool, state: &ProgramState) -> Transition {
        let ty = self.symbol(symbol)?.ty.clone();

        // A `ref` or `out` argument may be written by the callee, so whatever
        // the symbol held before can no longer be relied upon.
        let existing = if ref_or_out {
            None
        } else {
            state.lookup_binding(symbol).cloned()
        };
        let (state, value) = match existing {
            Some(value) => (state.clone(), value),
            None => {
                let value = SymbolicValue::fresh();
                (state.store_binding(symbol, value.clone()), value)
            }
        };

        Ok(self
            .narrow_to_type(&state, &value, &ty)
            .map(|s| s.push_value(value)))
    }

    fn visit_member_access(
        &self,
        member: SymbolId,
        receiver: Receiver,
        state: &ProgramState,
    ) -> Transition {
        let symbol = self.symbol(member)?;
        let (state, receiver) = match receiver {
            Receiver::Instance => {
                let (state, value) = state.pop_value()?;
                (state, Some(value))
            }
            Receiver::Static => (state.clone(), None),
        };
        let on_this = receiver
            .as_ref()
            .is_some_and(|r| *r.data() == SymbolicValueData::This);

        let (state, value) = match (symbol.property_role(), receiver) {
            (PropertyRole::NullableHasValue, Some(receiver)) => {
                (state, SymbolicValue::has_value(receiver))
            }
            (PropertyRole::NullableValue, _) => {
                let value = SymbolicValue::fresh();
                let Some(state) = self.narrow(&state, &value, Constraint::NOT_NULL) else {
                    return Ok(None);
                };
                (state, value)
            }
            _ if symbol.is_bindable_member(on_this) => match state.lookup_binding(member).cloned() {
                Some(value) => (state, value),
                None => {
                    let value = SymbolicValue::fresh();
                    (state.store_binding(member, value.clone()), value)
                }
            },
            (_, Some(receiver)) => (state, SymbolicValue::member_access(receiver, member)),
            (_, None) => (state, SymbolicValue::fresh()),
        };

        Ok(self
            .narrow_to_type(&state, &value, &symbol.ty)
            .map(|s| s.push_value(value)))
    }

    fn visit_assignment(
        &self,
        target: &AssignmentTarget,
        kind: AssignmentKind,
        state: &ProgramState,
    ) -> Transition {
        let (state, operand) = state.pop_value()?;

        // An increment has already read its operand, so its receiver is not
        // on the stack.
        let (state, receiver) = match (target, kind) {
            (_, AssignmentKind::Increment) => (state, None),
            (
                AssignmentTarget::Member {
                    receiver: Receiver::Instance,
                    ..
                },
                _,
            ) => {
                let (state, receiver) = state.pop_value()?;
                (state, Some(receiver))
            }
            (AssignmentTarget::Element { arg_count }, _) => {
                let (state, _) = state.pop_values(arg_count + 1)?;
                (state, None)
            }
            _ => (state, None),
        };

        let (state, value) = match kind {
            AssignmentKind::Simple => (state, operand),
            AssignmentKind::Compound | AssignmentKind::Increment => {
                let value = SymbolicValue::fresh();
                let state = match self.target_type(target)? {
                    Some(ty) => match self.narrow_to_type(&state, &value, &ty) {
                        Some(state) => state,
                        None => return Ok(None),
                    },
                    None => state,
                };
                (state, value)
            }
        };

        let state = match target {
            AssignmentTarget::Symbol(symbol) => {
                self.symbol(*symbol)?;
                state.store_binding(*symbol, value.clone())
            }
            AssignmentTarget::Member {
                member,
                receiver: reached,
            } => {
                let symbol = self.symbol(*member)?;
                match (reached, receiver) {
                    (_, Some(receiver)) => {
                        let on_this = *receiver.data() == SymbolicValueData::This;
                        if symbol.is_bindable_member(on_this) {
                            state.store_binding(*member, value.clone())
                        } else {
                            // Whatever was known about the member through this
                            // receiver no longer holds.
                            state.remove_constraints(&SymbolicValue::member_access(
                                receiver, *member,
                            ))
                        }
                    }
                    (Receiver::Static, None) if symbol.is_bindable_member(false) => {
                        state.store_binding(*member, value.clone())
                    }
                    // The receiver of an increment is not on the stack, so the
                    // binding may be stale whichever instance it was.
                    (Receiver::Instance, None) => state.remove_binding(*member),
                    (Receiver::Static, None) => state,
                }
            }
            AssignmentTarget::Element { .. } | AssignmentTarget::Discard => state,
        };

        Ok(Some(state.push_value(value)))
    }

    fn visit_binary(&self, operator: BinaryOperator, state: &ProgramState) -> Transition {
        let (state, operands) = state.pop_values(2)?;
        let [left, right]: [SymbolicValue; 2] = operands
            .try_into()
            .map_err(|_| Error::NoSuchStackFrame { depth: 1 })?;

        let value = match operator {
            BinaryOperator::And => SymbolicValue::and(left, right),
            BinaryOperator::Or => SymbolicValue::or(left, right),
            BinaryOperator::Xor => SymbolicValue::xor(left, right),
            BinaryOperator::Equals(kind) => equality(&state, kind, left, right),
            BinaryOperator::NotEquals(kind) => {
                let equals = equality(&state, kind, left, right);
                negate(&state, equals)
            }
            BinaryOperator::Relational { lifted } => {
                let null = Constraint::NULL;
                if lifted && (state.has_constraint(&left, null) || state.has_constraint(&right, null))
                {
                    SymbolicValue::false_value()
                } else {
                    SymbolicValue::fresh()
                }
            }
            BinaryOperator::Arithmetic => SymbolicValue::fresh(),
        };

        Ok(Some(state.push_value(value)))
    }

    fn visit_is_pattern(&self, pattern: &Pattern, state: &ProgramState) -> Transition {
        let (state, operand) = state.pop_value()?;
        let (state, value) = match pattern {
            Pattern::Null => {
                let value = equality(
                    &state,
                    EqualityKind::Reference,
                    operand,
                    SymbolicValue::null(),
                );
                (state, value)
            }
            Pattern::Type { designation, .. } => {
                if state.has_constraint(&operand, Constraint::NULL) {
                    (state, SymbolicValue::false_value())
                } else {
                    let state = self.bind_designation(&state, designation, &operand)?;
                    (state, SymbolicValue::is_type(operand))
                }
            }
            Pattern::Var(designation) => {
                let state = self.bind_designation(&state, designation, &operand)?;
                (state, SymbolicValue::true_value())
            }
            Pattern::Discard => (state, SymbolicValue::true_value()),
            Pattern::Constant => (state, SymbolicValue::fresh()),
        };

        Ok(Some(state.push_value(value)))
    }

    /// Binds the symbols of `designation` for a match against `value`.
    ///
    /// A deconstruction binds each of its variables to a fresh value.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if a designated symbol does not exist.
    pub fn bind_designation(
        &self,
        state: &ProgramState,
        designation: &Designation,
        value: &SymbolicValue,
    ) -> Result<ProgramState, Error> {
        let state = match designation {
            Designation::None | Designation::Discard => state.clone(),
            Designation::Single(symbol) => {
                self.symbol(*symbol)?;
                state.store_binding(*symbol, value.clone())
            }
            Designation::Tuple(symbols) => {
                let mut state = state.clone();
                for symbol in symbols {
                    self.symbol(*symbol)?;
                    state = state.store_binding(*symbol, SymbolicValue::fresh());
                }
                state
            }
        };

        Ok(state)
    }

    /// Forgets the bindings of every field, as happens when control leaves the
    /// method and other code may write to them.
    #[must_use]
    pub fn clear_fields(&self, state: &ProgramState) -> ProgramState {
        let symbols = self.cfg.symbols();
        state.remove_bindings_matching(|symbol, _| symbols.is_field(symbol))
    }

    /// Asserts a non-boolean `constraint` on `value`.
    ///
    /// Such constraints never propagate, so the assertion yields at most one
    /// state.
    fn narrow(
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

    /// Records that a `value` of static type `ty` cannot be null if `ty` is a
    /// value type.
    fn narrow_to_type(
        &self,
        state: &ProgramState,
        value: &SymbolicValue,
        ty: &TypeInfo,
    ) -> Option<ProgramState> {
        if ty.is_value_type() {
            self.narrow(state, value, Constraint::NOT_NULL)
        } else {
            Some(state.clone())
        }
    }

    fn push_fresh(&self, state: &ProgramState, constraint: Option<Constraint>) -> Option<ProgramState> {
        let value = SymbolicValue::fresh();
        let state = match constraint {
            Some(constraint) => self.narrow(state, &value, constraint)?,
            None => state.clone(),
        };
        Some(state.push_value(value))
    }

    fn target_type(&self, target: &AssignmentTarget) -> Result<Option<TypeInfo>, Error> {
        let ty = match target {
            AssignmentTarget::Symbol(symbol) | AssignmentTarget::Member { member: symbol, .. } => {
                Some(self.symbol(*symbol)?.ty.clone())
            }
            AssignmentTarget::Element { .. } | AssignmentTarget::Discard => None,
        };
        Ok(ty)
    }

    fn symbol(&self, symbol: SymbolId) -> Result<&'a Symbol, Error> {
        self.cfg
            .symbols()
            .get(symbol)
            .ok_or(Error::NoSuchSymbol { symbol })
    }
}

/// Computes the value of comparing `left` with `right` for equality.
///
/// The comparison folds to a constant when the operands are the same value,
/// are both null, or when exactly one of them is null and the other is known
/// not to be.
#[must_use]
pub fn equality(
    state: &ProgramState,
    kind: EqualityKind,
    left: SymbolicValue,
    right: SymbolicValue,
) -> SymbolicValue {
    let null = Constraint::NULL;
    let not_null = Constraint::NOT_NULL;
    let left_null = state.has_constraint(&left, null);
    let right_null = state.has_constraint(&right, null);

    if left == right || (left_null && right_null) {
        SymbolicValue::true_value()
    } else if (left_null && state.has_constraint(&right, not_null))
        || (right_null && state.has_constraint(&left, not_null))
    {
        SymbolicValue::false_value()
    } else {
        SymbolicValue::equals(kind, left, right)
    }
}

/// Computes the logical negation of `value`, folding constants and values
/// whose truth is already known.
#[must_use]
pub fn negate(state: &ProgramState, value: SymbolicValue) -> SymbolicValue {
    match state.constraint_in(&value, Domain::Bool) {
        Some(Constraint::Bool(BoolConstraint::True)) => SymbolicValue::false_value(),
        Some(Constraint::Bool(BoolConstraint::False)) => SymbolicValue::true_value(),
        _ => SymbolicValue::not(value),
    }
}
