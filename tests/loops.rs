//! This module is an integration test that checks that walks over methods
//! with loops terminate, and that they report what they can prove.
#![cfg(test)]

use common::{declare, instance_call, null, read};
use symbolic_defect_analyzer::{
    cfg::{
        builder::CfgBuilder,
        instruction::{
            AssignmentKind,
            AssignmentTarget,
            BinaryOperator,
            EqualityKind,
            Instruction,
            Literal,
        },
        symbol::{KnownMethod, TypeInfo},
        BranchKind,
        Terminator,
    },
    check::{collection, condition},
    graph::{point::ProgramPoint, Completion, Config},
};

mod common;

#[test_log::test]
fn loops_over_unknown_conditions_complete() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(bool)");
    let cond = builder.parameter("cond", TypeInfo::value("bool"));
    let i = builder.local("i", TypeInfo::value("int"));
    let entry = builder.block();
    let head = builder.block();
    let body = builder.block();
    let exit = builder.exit();
    builder
        .define(
            entry,
            [Instruction::Literal(Literal::Numeric), declare(i)],
            Terminator::Goto(head),
        )
        .define(head, [read(cond)], Terminator::BinaryBranch {
            kind:         BranchKind::Condition,
            true_target:  body,
            false_target: exit,
        })
        .define(
            body,
            [
                read(i),
                Instruction::Assignment {
                    target: AssignmentTarget::Symbol(i),
                    kind:   AssignmentKind::Increment,
                },
                Instruction::Discard,
            ],
            Terminator::Goto(head),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.completion, Completion::Complete);
    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn literal_infinite_loops_terminate_without_findings() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let entry = builder.block();
    let head = builder.block();
    let exit = builder.exit();
    builder
        .define(entry, Vec::<Instruction>::new(), Terminator::Goto(head))
        .define(
            head,
            [Instruction::Literal(Literal::True)],
            Terminator::BinaryBranch {
                kind:         BranchKind::Condition,
                true_target:  head,
                false_target: exit,
            },
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.completion, Completion::Complete);
    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn constant_conditions_are_only_reported_for_complete_walks() -> anyhow::Result<()> {
    let build = || -> anyhow::Result<_> {
        let mut builder = CfgBuilder::new("M()");
        let x = builder.local("x", TypeInfo::reference("object"));
        let entry = builder.block();
        let then = builder.block();
        let exit = builder.exit();
        builder
            .define(
                entry,
                [
                    null(),
                    declare(x),
                    read(x),
                    null(),
                    Instruction::Binary(BinaryOperator::Equals(EqualityKind::Value)),
                ],
                Terminator::BinaryBranch {
                    kind:         BranchKind::Condition,
                    true_target:  then,
                    false_target: exit,
                },
            )
            .define(then, Vec::<Instruction>::new(), Terminator::Goto(exit));
        Ok((builder.build(entry)?, entry))
    };

    let (cfg, entry) = build()?;
    let report = common::analyze(cfg)?;
    assert_eq!(report.completion, Completion::Complete);
    assert!(report.has_finding(
        condition::ALWAYS_TRUE_RULE_ID,
        ProgramPoint::new(entry, 5)
    ));

    // Six steps reach the branch, but leave its successors unexplored.
    let (cfg, _) = build()?;
    let report = common::analyze_with(cfg, Config::default().with_max_steps(6))?;
    assert_eq!(report.completion, Completion::StepBudgetExceeded);
    assert_eq!(report.steps, 6);
    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn enumerating_an_empty_collection_skips_the_body() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let list = builder.local("list", TypeInfo::collection("List"));
    let entry = builder.block();
    let head = builder.block();
    let body = builder.block();
    let exit = builder.exit();
    builder
        .define(
            entry,
            [
                Instruction::ObjectCreation {
                    ty:        TypeInfo::collection("List"),
                    arg_count: 0,
                },
                declare(list),
            ],
            Terminator::Goto(head),
        )
        .define(head, [read(list)], Terminator::BinaryBranch {
            kind:         BranchKind::ForEach,
            true_target:  body,
            false_target: exit,
        })
        .define(
            body,
            [
                read(list),
                Instruction::Literal(Literal::Numeric),
                Instruction::ElementAccess { arg_count: 1 },
                Instruction::Discard,
            ],
            Terminator::Goto(head),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.completion, Completion::Complete);
    assert_eq!(report.findings_for(collection::RULE_ID).count(), 0);
    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn reassignments_in_a_loop_body_keep_the_value_non_null() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(bool)");
    let cond = builder.parameter("cond", TypeInfo::value("bool"));
    let o = builder.local("o", TypeInfo::reference("object"));
    let entry = builder.block();
    let head = builder.block();
    let body = builder.block();
    let after = builder.block();
    let exit = builder.exit();

    let create = || Instruction::ObjectCreation {
        ty:        TypeInfo::reference("object"),
        arg_count: 0,
    };
    let mut dereference = instance_call(
        read(o),
        "ToString",
        KnownMethod::Other,
        Vec::new(),
        TypeInfo::reference("string"),
    );
    dereference.push(Instruction::Discard);

    builder
        .define(entry, [create(), declare(o)], Terminator::Goto(head))
        .define(head, [read(cond)], Terminator::BinaryBranch {
            kind:         BranchKind::Condition,
            true_target:  body,
            false_target: after,
        })
        .define(
            body,
            [
                create(),
                Instruction::Assignment {
                    target: AssignmentTarget::Symbol(o),
                    kind:   AssignmentKind::Simple,
                },
                Instruction::Discard,
            ],
            Terminator::Goto(head),
        )
        .define(after, dereference, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.completion, Completion::Complete);
    assert_eq!(report.finding_count(), 0);

    Ok(())
}
