//! This module contains the check that reports reads of the underlying value
//! of an empty nullable value type.

use crate::{
    cfg::{
        instruction::{CastKind, Instruction, Receiver},
        symbol::PropertyRole,
    },
    check::{Check, CheckContext},
    state::ProgramState,
    value::constraint::Constraint,
};

/// The identifier of the rule raised by [`EmptyNullableCheck`].
pub const RULE_ID: &str = "empty-nullable-access";

/// This check looks at the two ways of unwrapping a nullable value type:
///
/// ```text
/// n.Value    (T)n
/// ```
///
/// An unwrap of a nullable that is empty on the current path throws, so it is
/// reported and the path is ended. Otherwise the nullable is learned to hold a
/// value.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct EmptyNullableCheck;

impl Check for EmptyNullableCheck {
    fn pre_process_instruction(
        &mut self,
        ctx: &mut CheckContext<'_>,
        instruction: &Instruction,
        state: ProgramState,
    ) -> Option<ProgramState> {
        let unwraps = match instruction {
            Instruction::MemberAccess {
                member,
                receiver: Receiver::Instance,
            } => ctx
                .cfg
                .symbols()
                .get(*member)
                .is_some_and(|s| s.property_role() == PropertyRole::NullableValue),
            Instruction::Cast(CastKind::UnwrapNullable) => true,
            _ => false,
        };
        if !unwraps {
            return Some(state);
        }

        let Ok(nullable) = state.peek_value(0).cloned() else {
            return Some(state);
        };
        if state.has_constraint(&nullable, Constraint::NULL) {
            let name = ctx
                .operand_name(0)
                .unwrap_or_else(|| ctx.name_of(&state, &nullable));
            let finding = ctx
                .finding(RULE_ID, format!("'{name}' is null."))
                .with_arguments([name]);
            ctx.publish(finding, Some(&nullable));
            return None;
        }

        ctx.constrain(&state, &nullable, Constraint::NOT_NULL)
    }
}
