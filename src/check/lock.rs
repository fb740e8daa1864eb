//! This module contains the check that reports locks that are acquired but not
//! released on some path through a method.

use std::collections::BTreeMap;

use crate::{
    cfg::{instruction::Instruction, symbol::KnownMethod},
    check::{Check, CheckContext},
    finding::{Finding, Location},
    state::ProgramState,
    value::{
        constraint::{Constraint, Domain},
        SymbolicValue,
    },
    visitor::invocation::peek_invocation,
};

/// The identifier of the rule raised by [`LockReleaseCheck`].
pub const RULE_ID: &str = "lock-not-released";

/// This check pairs explicit lock acquisitions with their releases:
///
/// ```text
/// Monitor.Enter(l) ... Monitor.Exit(l)
/// ```
///
/// A lock that is still held when a path reaches the exit of the method is
/// reported at the point where it was acquired.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LockReleaseCheck {
    /// Where each lock value was first acquired during the walk.
    acquisitions: BTreeMap<SymbolicValue, Acquisition>,
}

/// The first acquisition of a lock.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Acquisition {
    location: Location,

    /// The name of the variable or field the lock was read from, if known.
    name: Option<String>,
}

impl LockReleaseCheck {
    /// Gets the location at which `lock` was first acquired, if it was.
    #[must_use]
    pub fn acquisition_of(&self, lock: &SymbolicValue) -> Option<Location> {
        self.acquisitions.get(lock).map(|acquisition| acquisition.location)
    }
}

impl Check for LockReleaseCheck {
    fn pre_process_instruction(
        &mut self,
        ctx: &mut CheckContext<'_>,
        instruction: &Instruction,
        state: ProgramState,
    ) -> Option<ProgramState> {
        let Instruction::Invocation { method, arg_count } = instruction else {
            return Some(state);
        };
        if !matches!(method.known, KnownMethod::LockAcquire | KnownMethod::LockRelease) {
            return Some(state);
        }

        let Ok(operands) = peek_invocation(&state, *arg_count) else {
            return Some(state);
        };
        let lock = if method.is_static {
            operands.arguments.first().cloned()
        } else {
            operands.receiver
        };
        let Some(lock) = lock else {
            return Some(state);
        };

        if method.known == KnownMethod::LockAcquire {
            self.acquisitions.entry(lock.clone()).or_insert_with(|| Acquisition {
                location: Location::new(ctx.point, ctx.span),
                name:     if method.is_static {
                    arg_count.checked_sub(1).and_then(|depth| ctx.operand_name(depth))
                } else {
                    ctx.receiver_name(*arg_count)
                },
            });
            ctx.constrain(&state, &lock, Constraint::HELD)
        } else {
            Some(state.remove_constraint(&lock, Domain::Lock))
        }
    }

    fn exit_block_reached(&mut self, ctx: &mut CheckContext<'_>, state: &ProgramState) {
        let held: Vec<SymbolicValue> = state
            .constrained_values()
            .filter(|(_, constraints)| constraints.implies(Constraint::HELD))
            .map(|(value, _)| value.clone())
            .collect();

        for lock in held {
            let Some(acquired) = self.acquisitions.get(&lock) else {
                continue;
            };
            let name = acquired
                .name
                .clone()
                .unwrap_or_else(|| ctx.name_of(state, &lock));
            let finding = Finding::new(
                RULE_ID,
                acquired.location.point,
                acquired.location.span,
                format!("Unlock '{name}' along all execution paths of this method."),
            )
            .with_secondary_location(Location::new(ctx.point, ctx.span))
            .with_arguments([name]);
            ctx.publish(finding, Some(&lock));
        }
    }
}
