//! This module contains the check that reports objects that are disposed more
//! than once.

use crate::{
    cfg::{instruction::Instruction, symbol::KnownMethod},
    check::{Check, CheckContext},
    state::ProgramState,
    value::{constraint::Constraint, SymbolicValue},
    visitor::invocation::peek_invocation,
};

/// The identifier of the rule raised by [`DisposedTwiceCheck`].
pub const RULE_ID: &str = "object-disposed-twice";

/// This check tracks the disposal of objects through explicit calls and
/// `using` statements:
///
/// ```text
/// d.Dispose()    using (d) { ... }
/// ```
///
/// Disposing an object that is already disposed on the current path is
/// reported. Exploration continues past the second disposal, as doing so is
/// usually harmless at runtime.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct DisposedTwiceCheck;

impl DisposedTwiceCheck {
    fn dispose(
        ctx: &mut CheckContext<'_>,
        resource: &SymbolicValue,
        name: Option<String>,
        state: ProgramState,
    ) -> Option<ProgramState> {
        if state.has_constraint(resource, Constraint::NULL) {
            return Some(state);
        }

        if state.has_constraint(resource, Constraint::DISPOSED) {
            let name = name.unwrap_or_else(|| ctx.name_of(&state, resource));
            let finding = ctx
                .finding(
                    RULE_ID,
                    format!("Refactor this code to make sure '{name}' is disposed only once."),
                )
                .with_arguments([name]);
            ctx.publish(finding, Some(resource));
            return Some(state);
        }

        ctx.constrain(&state, resource, Constraint::DISPOSED)
    }
}

impl Check for DisposedTwiceCheck {
    fn pre_process_instruction(
        &mut self,
        ctx: &mut CheckContext<'_>,
        instruction: &Instruction,
        state: ProgramState,
    ) -> Option<ProgramState> {
        let Instruction::Invocation { method, arg_count } = instruction else {
            return Some(state);
        };
        if method.known != KnownMethod::Dispose {
            return Some(state);
        }
        let Some(receiver) = peek_invocation(&state, *arg_count)
            .ok()
            .and_then(|operands| operands.receiver)
        else {
            return Some(state);
        };

        let name = ctx.receiver_name(*arg_count);
        Self::dispose(ctx, &receiver, name, state)
    }

    fn pre_process_using_statement(
        &mut self,
        ctx: &mut CheckContext<'_>,
        resource: &SymbolicValue,
        state: ProgramState,
    ) -> Option<ProgramState> {
        let name = ctx.operand_name(0);
        Self::dispose(ctx, resource, name, state)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        cfg::{builder::CfgBuilder, symbol::TypeInfo},
        check::{dispose::DisposedTwiceCheck, Check, CheckContext},
        graph::{data::Findings, point::ProgramPoint},
        state::ProgramState,
        value::{constraint::Constraint, propagation::ConstraintSolver, SymbolicValue},
    };

    #[test]
    fn second_using_of_a_resource_is_reported() -> anyhow::Result<()> {
        let mut builder = CfgBuilder::new("M");
        let d = builder.local("d", TypeInfo::disposable("Stream"));
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

        let resource = SymbolicValue::fresh();
        let state = ProgramState::new().store_binding(d, resource.clone());
        let mut check = DisposedTwiceCheck;
        let state = check
            .pre_process_using_statement(&mut ctx, &resource, state)
            .ok_or_else(|| anyhow::anyhow!("path was ended"))?;
        assert!(state.has_constraint(&resource, Constraint::DISPOSED));

        let state = check.pre_process_using_statement(&mut ctx, &resource, state);
        assert!(state.is_some());
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings.findings()[0].message_arguments,
            vec!["d".to_string()]
        );

        Ok(())
    }

    #[test]
    fn null_resources_are_ignored() -> anyhow::Result<()> {
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

        let state = DisposedTwiceCheck.pre_process_using_statement(
            &mut ctx,
            &SymbolicValue::null(),
            ProgramState::new(),
        );
        assert_eq!(state, Some(ProgramState::new()));
        assert!(findings.is_empty());

        Ok(())
    }
}
