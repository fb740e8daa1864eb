//! This module contains the check that reports branch conditions whose outcome
//! is the same on every path that reaches them.

use std::collections::BTreeMap;

use crate::{
    cfg::Span,
    check::{Check, CheckContext},
    finding::Finding,
    graph::{point::ProgramPoint, Completion},
    state::ProgramState,
    value::SymbolicValue,
};

/// The identifier of the rule raised for conditions that are always true.
pub const ALWAYS_TRUE_RULE_ID: &str = "condition-always-true";

/// The identifier of the rule raised for conditions that are always false.
pub const ALWAYS_FALSE_RULE_ID: &str = "condition-always-false";

/// The outcomes observed for a single branch condition.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct Outcomes {
    span:       Option<Span>,
    seen_true:  bool,
    seen_false: bool,
}

/// This check records which way every branch condition goes on every path
/// that reaches it.
///
/// Only once the whole graph has been explored can it be known that a
/// condition never goes one of the ways, so findings are published when the
/// exploration ends, and only if it ran to completion. Conditions that are
/// written as `true` or `false` literals are intentional and never reported.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConstantConditionCheck {
    outcomes: BTreeMap<ProgramPoint, Outcomes>,
}

impl ConstantConditionCheck {
    /// Gets the single outcome of the condition at `point`, if it only ever
    /// went one way.
    #[must_use]
    pub fn constant_outcome(&self, point: ProgramPoint) -> Option<bool> {
        let outcomes = self.outcomes.get(&point)?;
        match (outcomes.seen_true, outcomes.seen_false) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }
}

impl Check for ConstantConditionCheck {
    fn condition_evaluated(
        &mut self,
        ctx: &mut CheckContext<'_>,
        _condition: &SymbolicValue,
        is_literal: bool,
        outcome: bool,
        _state: &ProgramState,
    ) {
        if is_literal {
            return;
        }

        let entry = self.outcomes.entry(ctx.point).or_default();
        entry.span = entry.span.or(ctx.span);
        if outcome {
            entry.seen_true = true;
        } else {
            entry.seen_false = true;
        }
    }

    fn exploration_ended(&mut self, ctx: &mut CheckContext<'_>, completion: Completion) {
        if completion != Completion::Complete {
            log::debug!("Skipping constant conditions for an incomplete walk ({completion:?})");
            return;
        }

        for (point, outcomes) in &self.outcomes {
            let Some(outcome) = self.constant_outcome(*point) else {
                continue;
            };
            let rule_id = if outcome {
                ALWAYS_TRUE_RULE_ID
            } else {
                ALWAYS_FALSE_RULE_ID
            };
            let finding = Finding::new(
                rule_id,
                *point,
                outcomes.span,
                format!("Change this condition so that it does not always evaluate to '{outcome}'."),
            )
            .with_arguments([outcome.to_string()]);
            ctx.publish(finding, None);
        }
    }
}
