//! This module contains the transfer function for method invocations, which
//! recognises a handful of methods by their resolved identity and treats
//! every other method as opaque.

use crate::{
    cfg::{
        instruction::EqualityKind,
        symbol::{KnownMethod, MethodInfo},
    },
    error::execution::Error,
    state::ProgramState,
    value::{
        constraint::{Constraint, StringConstraint},
        SymbolicValue,
    },
    visitor::{equality, InstructionVisitor, Transition},
};

/// The operands of an invocation, as they sit on the stack before it runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvocationOperands {
    /// The instance the method is invoked on, if it is an instance method.
    pub receiver: Option<SymbolicValue>,

    /// The arguments, in source order.
    pub arguments: Vec<SymbolicValue>,
}

/// Reads the operands of an invocation with `arg_count` arguments from
/// `state` without consuming them.
///
/// # Errors
///
/// Returns [`Err`] if the stack does not hold the method group and all of the
/// arguments.
pub fn peek_invocation(
    state: &ProgramState,
    arg_count: usize,
) -> Result<InvocationOperands, Error> {
    let group = state.peek_value(arg_count)?;
    let receiver = group.receiver().cloned();
    let arguments = (0..arg_count)
        .rev()
        .map(|depth| state.peek_value(depth).cloned())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InvocationOperands {
        receiver,
        arguments,
    })
}

impl<'a> InstructionVisitor<'a> {
    pub(super) fn visit_invocation(
        &self,
        method: &MethodInfo,
        arg_count: usize,
        state: &ProgramState,
    ) -> Transition {
        let (state, arguments) = state.pop_values(arg_count)?;
        let (mut state, group) = state.pop_value()?;
        let receiver = group.receiver().cloned();

        for index in &method.validated_not_null {
            if let Some(argument) = arguments.get(*index) {
                match self.narrow(&state, argument, Constraint::NOT_NULL) {
                    Some(narrowed) => state = narrowed,
                    None => return Ok(None),
                }
            }
        }

        let value = match (method.known, arguments.as_slice(), receiver) {
            (KnownMethod::StaticEquals, [left, right], _) => {
                equality(&state, EqualityKind::Value, left.clone(), right.clone())
            }
            (KnownMethod::InstanceEquals, [argument], Some(receiver)) => {
                equality(&state, EqualityKind::Value, receiver, argument.clone())
            }
            (KnownMethod::ReferenceEquals, [left, right], _) => {
                // A value type argument is boxed into a new object for the
                // call, which no other reference can be identical to.
                if method.value_type_arguments.iter().any(|i| *i < 2) {
                    SymbolicValue::false_value()
                } else {
                    equality(&state, EqualityKind::Reference, left.clone(), right.clone())
                }
            }
            (KnownMethod::StringIsNullOrEmpty, [argument], _) => {
                is_null_or_empty(&state, argument, false)
            }
            (KnownMethod::StringIsNullOrWhiteSpace, [argument], _) => {
                is_null_or_empty(&state, argument, true)
            }
            _ => {
                let value = SymbolicValue::fresh();
                match self.narrow_to_type(&state, &value, &method.return_type) {
                    Some(narrowed) => state = narrowed,
                    None => return Ok(None),
                }
                value
            }
        };

        if !keeps_fields(method) {
            state = self.clear_fields(&state);
        }

        Ok(Some(state.push_value(value)))
    }
}

/// Computes the result of `string.IsNullOrEmpty(argument)`, or of
/// `string.IsNullOrWhiteSpace` if `whitespace` is set.
fn is_null_or_empty(state: &ProgramState, argument: &SymbolicValue, whitespace: bool) -> SymbolicValue {
    let (matching, failing) = if whitespace {
        (
            StringConstraint::EMPTY_OR_WHITESPACE,
            StringConstraint::FULL_NOT_WHITESPACE,
        )
    } else {
        (StringConstraint::EMPTY, StringConstraint::FULL_STRING)
    };

    if state.has_constraint(argument, Constraint::NULL)
        || state.has_constraint(argument, Constraint::String(matching))
    {
        SymbolicValue::true_value()
    } else if state.has_constraint(argument, Constraint::String(failing)) {
        SymbolicValue::false_value()
    } else {
        SymbolicValue::is_null_or_empty(argument.clone(), whitespace)
    }
}

/// Checks if the field bindings of the analyzed type survive invoking
/// `method`.
///
/// Fields read to find a lock keep their values until it is released.
fn keeps_fields(method: &MethodInfo) -> bool {
    method.is_pure
        || matches!(
            method.known,
            KnownMethod::StaticEquals
                | KnownMethod::InstanceEquals
                | KnownMethod::ReferenceEquals
                | KnownMethod::StringIsNullOrEmpty
                | KnownMethod::StringIsNullOrWhiteSpace
                | KnownMethod::LockAcquire
        )
}
