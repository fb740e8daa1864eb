//! This module contains the check that reports reads from collections that are
//! known to be empty.

use crate::{
    cfg::{
        instruction::Instruction,
        symbol::{KnownMethod, TypeInfo},
    },
    check::{Check, CheckContext},
    state::ProgramState,
    value::{
        constraint::{Constraint, Domain},
        SymbolicValue,
    },
    visitor::invocation::peek_invocation,
};

/// The identifier of the rule raised by [`EmptyCollectionCheck`].
pub const RULE_ID: &str = "empty-collection-access";

/// This check tracks the emptiness of collections that are created in the
/// analyzed method:
///
/// ```text
/// var c = new List<T>();   // empty
/// c.Add(x);                // not empty
/// c.Clear();               // empty
/// c[0]; c.First();         // reported when empty
/// ```
///
/// Handing a collection to a method the engine knows nothing about forgets
/// its emptiness, as the method may have changed it.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct EmptyCollectionCheck;

impl EmptyCollectionCheck {
    fn report(ctx: &mut CheckContext<'_>, collection: &SymbolicValue, what: &str) {
        let finding = ctx.finding(
            RULE_ID,
            format!("Remove this {what}, the collection is known to be empty here."),
        );
        ctx.publish(finding, Some(collection));
    }

    fn visit_invocation(
        ctx: &mut CheckContext<'_>,
        known: KnownMethod,
        is_pure: bool,
        arg_count: usize,
        state: ProgramState,
    ) -> Option<ProgramState> {
        let Ok(operands) = peek_invocation(&state, arg_count) else {
            return Some(state);
        };

        match (known, operands.receiver) {
            (KnownMethod::CollectionElementAccess, Some(receiver)) => {
                if state.has_constraint(&receiver, Constraint::EMPTY_COLLECTION) {
                    Self::report(ctx, &receiver, "call");
                }
                Some(state)
            }
            (KnownMethod::CollectionAdd, Some(receiver)) => {
                let state = state.remove_constraint(&receiver, Domain::Collection);
                ctx.constrain(&state, &receiver, Constraint::NOT_EMPTY_COLLECTION)
            }
            (KnownMethod::CollectionClear, Some(receiver)) => {
                let state = state.remove_constraint(&receiver, Domain::Collection);
                ctx.constrain(&state, &receiver, Constraint::EMPTY_COLLECTION)
            }
            (KnownMethod::Other, receiver) if !is_pure => {
                let state = operands
                    .arguments
                    .iter()
                    .chain(receiver.as_ref())
                    .fold(state, |state, value| {
                        state.remove_constraint(value, Domain::Collection)
                    });
                Some(state)
            }
            _ => Some(state),
        }
    }
}

impl Check for EmptyCollectionCheck {
    fn pre_process_instruction(
        &mut self,
        ctx: &mut CheckContext<'_>,
        instruction: &Instruction,
        state: ProgramState,
    ) -> Option<ProgramState> {
        match instruction {
            Instruction::Invocation { method, arg_count } => {
                Self::visit_invocation(ctx, method.known, method.is_pure, *arg_count, state)
            }
            Instruction::ElementAccess { arg_count } => {
                if let Ok(collection) = state.peek_value(*arg_count) {
                    if state.has_constraint(collection, Constraint::EMPTY_COLLECTION) {
                        let collection = collection.clone();
                        Self::report(ctx, &collection, "access");
                    }
                }
                Some(state)
            }
            _ => Some(state),
        }
    }

    fn object_created(
        &mut self,
        ctx: &mut CheckContext<'_>,
        ty: &TypeInfo,
        arg_count: usize,
        value: &SymbolicValue,
        state: ProgramState,
    ) -> ProgramState {
        if !ty.is_collection || arg_count != 0 {
            return state;
        }

        match ctx.constrain(&state, value, Constraint::EMPTY_COLLECTION) {
            Some(constrained) => constrained,
            None => state,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        cfg::{
            builder::CfgBuilder,
            instruction::Instruction,
            symbol::{KnownMethod, MethodInfo, TypeInfo},
        },
        check::{collection::EmptyCollectionCheck, Check, CheckContext},
        graph::{data::Findings, point::ProgramPoint},
        state::ProgramState,
        value::{
            constraint::{CollectionConstraint, Constraint},
            propagation::ConstraintSolver,
            SymbolicValue,
        },
    };

    #[test]
    fn collections_fill_and_empty() -> anyhow::Result<()> {
        let mut builder = CfgBuilder::new("M");
        let exit = builder.exit();
        let cfg = builder.build(exit)?;
        let solver = ConstraintSolver::default();
        let mut findings = Findings::new();
        let mut ctx = CheckContext::new(
            &cfg,
            ProgramPoint::start_of(exit),
            None,
            &solver,
            &mut findings,
        );
        let mut check = EmptyCollectionCheck;

        let list = SymbolicValue::fresh();
        let state = check.object_created(
            &mut ctx,
            &TypeInfo::collection("List"),
            0,
            &list,
            ProgramState::new(),
        );
        assert!(state.has_constraint(&list, Constraint::Collection(CollectionConstraint::Empty)));

        let add = Instruction::Invocation {
            method:    MethodInfo::new("Add", TypeInfo::value("void")).known(KnownMethod::CollectionAdd),
            arg_count: 1,
        };
        let call = state
            .push_value(SymbolicValue::method_group(list.clone(), "Add"))
            .push_value(SymbolicValue::fresh());
        let state = check
            .pre_process_instruction(&mut ctx, &add, call)
            .ok_or_else(|| anyhow::anyhow!("path was ended"))?;
        assert!(state.has_constraint(
            &list,
            Constraint::Collection(CollectionConstraint::NotEmpty)
        ));

        Ok(())
    }

    #[test]
    fn indexing_an_empty_collection_is_reported() -> anyhow::Result<()> {
        let mut builder = CfgBuilder::new("M");
        let exit = builder.exit();
        let cfg = builder.build(exit)?;
        let solver = ConstraintSolver::default();
        let mut findings = Findings::new();
        let mut ctx = CheckContext::new(
            &cfg,
            ProgramPoint::start_of(exit),
            None,
            &solver,
            &mut findings,
        );
        let mut check = EmptyCollectionCheck;

        let list = SymbolicValue::fresh();
        let state = check
            .object_created(
                &mut ctx,
                &TypeInfo::collection("List"),
                0,
                &list,
                ProgramState::new(),
            )
            .push_value(list)
            .push_value(SymbolicValue::fresh());
        let state =
            check.pre_process_instruction(&mut ctx, &Instruction::ElementAccess { arg_count: 1 }, state);

        assert!(state.is_some());
        assert_eq!(findings.len(), 1);

        Ok(())
    }
}
