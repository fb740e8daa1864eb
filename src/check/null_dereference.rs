//! This module contains the check that reports dereferences of values that
//! are null on the path being explored.

use crate::{
    cfg::{
        instruction::{AssignmentKind, AssignmentTarget, Instruction, Receiver},
        symbol::PropertyRole,
        Cfg,
    },
    check::{Check, CheckContext},
    state::ProgramState,
    value::constraint::Constraint,
};

/// The identifier of the rule raised by [`NullDereferenceCheck`].
pub const RULE_ID: &str = "null-dereference";

/// This check looks at every instruction that dereferences a receiver from the
/// operand stack:
///
/// ```text
/// o.Member    o.Method(...)    o[...]    o.Member = v    await o
/// ```
///
/// If the receiver is `null` on the current path, a finding is published and
/// the path is ended, as execution cannot continue past the dereference.
/// Otherwise the receiver is learned to be non-null for the remainder of the
/// path.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct NullDereferenceCheck;

impl Check for NullDereferenceCheck {
    fn pre_process_instruction(
        &mut self,
        ctx: &mut CheckContext<'_>,
        instruction: &Instruction,
        state: ProgramState,
    ) -> Option<ProgramState> {
        let Some(depth) = receiver_depth(ctx.cfg, instruction) else {
            return Some(state);
        };

        // A missing operand is a malformed graph, which the visitor reports.
        let Ok(receiver) = state.peek_value(depth).cloned() else {
            return Some(state);
        };

        if state.has_constraint(&receiver, Constraint::NULL) {
            let name = ctx
                .operand_name(depth)
                .unwrap_or_else(|| ctx.name_of(&state, &receiver));
            let finding = ctx
                .finding(
                    RULE_ID,
                    format!("'{name}' is null on at least one execution path."),
                )
                .with_arguments([name]);
            ctx.publish(finding, Some(&receiver));
            return None;
        }

        ctx.constrain(&state, &receiver, Constraint::NOT_NULL)
    }
}

/// Gets the depth on the operand stack of the receiver that `instruction`
/// dereferences, if it dereferences one.
fn receiver_depth(cfg: &Cfg, instruction: &Instruction) -> Option<usize> {
    match instruction {
        Instruction::MemberAccess {
            member,
            receiver: Receiver::Instance,
        } => {
            // Reading the members of an empty nullable is the concern of the
            // nullable check.
            let role = cfg.symbols().get(*member)?.property_role();
            (role == PropertyRole::Plain).then_some(0)
        }
        Instruction::MethodGroup {
            receiver: Receiver::Instance,
            ..
        }
        | Instruction::Await => Some(0),
        Instruction::ElementAccess { arg_count } => Some(*arg_count),
        Instruction::Assignment {
            target:
                AssignmentTarget::Member {
                    receiver: Receiver::Instance,
                    ..
                },
            kind: AssignmentKind::Simple | AssignmentKind::Compound,
        } => Some(1),
        Instruction::Assignment {
            target: AssignmentTarget::Element { arg_count },
            kind: AssignmentKind::Simple | AssignmentKind::Compound,
        } => Some(arg_count + 1),
        _ => None,
    }
}
