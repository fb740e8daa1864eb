//! This module is an integration test that checks the analysis of null
//! dereferences across branches, coalescing, and recognised null tests.
#![cfg(test)]

use common::{declare, instance_call, member, null, read, static_call};
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
            UnaryOperator,
        },
        symbol::{KnownMethod, PropertyRole, TypeInfo},
        BlockId,
        BranchKind,
        JumpKind,
        Terminator,
    },
    check::{condition, null_dereference, nullable},
    graph::point::ProgramPoint,
};

mod common;

fn branch_on(true_target: BlockId, false_target: BlockId) -> Terminator {
    Terminator::BinaryBranch {
        kind: BranchKind::Condition,
        true_target,
        false_target,
    }
}

#[test_log::test]
fn dereferencing_a_null_local_is_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let s = builder.local("s", TypeInfo::reference("string"));
    let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
    let entry = builder.block();
    let exit = builder.exit();
    builder.define(
        entry,
        [
            null(),
            declare(s),
            read(s),
            member(length),
            Instruction::Discard,
        ],
        Terminator::Goto(exit),
    );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(null_dereference::RULE_ID, ProgramPoint::new(entry, 3)));
    assert_eq!(
        report.findings[0].message,
        "'s' is null on at least one execution path."
    );
    assert_eq!(report.findings[0].message_arguments, vec!["s".to_string()]);

    Ok(())
}

#[test]
fn null_check_guards_the_dereference() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(string)");
    let s = builder.parameter("s", TypeInfo::reference("string"));
    let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
    let entry = builder.block();
    let bail = builder.block();
    let body = builder.block();
    let exit = builder.exit();
    builder
        .define(
            entry,
            [
                read(s),
                null(),
                Instruction::Binary(BinaryOperator::Equals(EqualityKind::Value)),
            ],
            branch_on(bail, body),
        )
        .define(bail, Vec::<Instruction>::new(), Terminator::Jump {
            target: exit,
            kind:   JumpKind::Return { has_value: false },
        })
        .define(
            body,
            [read(s), member(length), Instruction::Discard],
            Terminator::Goto(exit),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert!(report.is_complete());
    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn dereference_after_an_ineffective_check_is_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(string)");
    let s = builder.parameter("s", TypeInfo::reference("string"));
    let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
    let entry = builder.block();
    let then = builder.block();
    let join = builder.block();
    let exit = builder.exit();
    builder
        .define(
            entry,
            [
                read(s),
                null(),
                Instruction::Binary(BinaryOperator::NotEquals(EqualityKind::Value)),
            ],
            branch_on(then, join),
        )
        .define(then, Vec::<Instruction>::new(), Terminator::Goto(join))
        .define(
            join,
            [read(s), member(length), Instruction::Discard],
            Terminator::Goto(exit),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(null_dereference::RULE_ID, ProgramPoint::new(join, 1)));

    Ok(())
}

#[test]
fn coalesced_values_are_not_null() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(string)");
    let s = builder.parameter("s", TypeInfo::reference("string"));
    let t = builder.local("t", TypeInfo::reference("string"));
    let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
    let entry = builder.block();
    let fallback = builder.block();
    let join = builder.block();
    let exit = builder.exit();
    builder
        .define(entry, [read(s)], Terminator::BinaryBranch {
            kind:         BranchKind::Coalesce { push_result: true },
            true_target:  fallback,
            false_target: join,
        })
        .define(
            fallback,
            [Instruction::Literal(Literal::String("default".into()))],
            Terminator::Goto(join),
        )
        .define(
            join,
            [declare(t), read(t), member(length), Instruction::Discard],
            Terminator::Goto(exit),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn is_null_or_white_space_rules_out_null() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(string)");
    let s = builder.parameter("s", TypeInfo::reference("string"));
    let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
    let entry = builder.block();
    let bail = builder.block();
    let body = builder.block();
    let exit = builder.exit();
    builder
        .define(
            entry,
            static_call(
                "IsNullOrWhiteSpace",
                KnownMethod::StringIsNullOrWhiteSpace,
                [read(s)],
                TypeInfo::value("bool"),
            ),
            branch_on(bail, body),
        )
        .define(bail, Vec::<Instruction>::new(), Terminator::Jump {
            target: exit,
            kind:   JumpKind::Return { has_value: false },
        })
        .define(
            body,
            [read(s), member(length), Instruction::Discard],
            Terminator::Goto(exit),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn reference_equality_of_two_nulls_always_holds() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let a = builder.local("a", TypeInfo::reference("object"));
    let b = builder.local("b", TypeInfo::reference("object"));
    let entry = builder.block();
    let then = builder.block();
    let otherwise = builder.block();
    let exit = builder.exit();

    let mut nodes = vec![null(), declare(a), null(), declare(b)];
    nodes.extend(static_call(
        "ReferenceEquals",
        KnownMethod::ReferenceEquals,
        [read(a), read(b)],
        TypeInfo::value("bool"),
    ));
    let branch_point = ProgramPoint::new(entry, nodes.len());

    let mut dereference = instance_call(
        read(a),
        "ToString",
        KnownMethod::Other,
        Vec::new(),
        TypeInfo::reference("string"),
    );
    dereference.push(Instruction::Discard);

    builder
        .define(entry, nodes, branch_on(then, otherwise))
        .define(then, Vec::<Instruction>::new(), Terminator::Goto(exit))
        .define(otherwise, dereference, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    // The dereference sits on a path that can never be taken.
    assert_eq!(report.findings_for(null_dereference::RULE_ID).count(), 0);
    assert!(report.has_finding(condition::ALWAYS_TRUE_RULE_ID, branch_point));
    assert_eq!(report.finding_count(), 1);

    Ok(())
}

#[test]
fn reading_the_value_of_an_empty_nullable_is_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let n = builder.local("n", TypeInfo::nullable("int"));
    let value = builder.property("Value", TypeInfo::value("int"), PropertyRole::NullableValue);
    let entry = builder.block();
    let exit = builder.exit();
    builder.define(
        entry,
        [null(), declare(n), read(n), member(value), Instruction::Discard],
        Terminator::Goto(exit),
    );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(nullable::RULE_ID, ProgramPoint::new(entry, 3)));
    assert_eq!(report.findings[0].message, "'n' is null.");

    Ok(())
}

#[test]
fn dereference_on_the_branch_that_keeps_null_is_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(bool)");
    let cond = builder.parameter("cond", TypeInfo::value("bool"));
    let o = builder.local("o", TypeInfo::reference("object"));
    let entry = builder.block();
    let then = builder.block();
    let otherwise = builder.block();
    let exit = builder.exit();

    let mut dereference = instance_call(
        read(o),
        "ToString",
        KnownMethod::Other,
        Vec::new(),
        TypeInfo::reference("string"),
    );
    dereference.push(Instruction::Discard);

    builder
        .define(entry, [null(), declare(o), read(cond)], branch_on(then, otherwise))
        .define(then, dereference, Terminator::Goto(exit))
        .define(
            otherwise,
            [
                Instruction::ObjectCreation {
                    ty:        TypeInfo::reference("object"),
                    arg_count: 0,
                },
                Instruction::Assignment {
                    target: AssignmentTarget::Symbol(o),
                    kind:   AssignmentKind::Simple,
                },
                Instruction::Discard,
            ],
            Terminator::Goto(exit),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(null_dereference::RULE_ID, ProgramPoint::new(then, 1)));
    assert_eq!(report.findings[0].message_arguments, vec!["o".to_string()]);

    Ok(())
}

#[test]
fn negated_is_null_or_white_space_guards_the_dereference() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(string)");
    let s = builder.parameter("s", TypeInfo::reference("string"));
    let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
    let entry = builder.block();
    let body = builder.block();
    let exit = builder.exit();

    let mut nodes = static_call(
        "IsNullOrWhiteSpace",
        KnownMethod::StringIsNullOrWhiteSpace,
        [read(s)],
        TypeInfo::value("bool"),
    );
    nodes.push(Instruction::Unary(UnaryOperator::Not));

    builder
        .define(entry, nodes, branch_on(body, exit))
        .define(
            body,
            [read(s), member(length), Instruction::Discard],
            Terminator::Goto(exit),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn findings_name_the_dereferenced_variable() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let a = builder.local("a", TypeInfo::reference("object"));
    let b = builder.local("b", TypeInfo::reference("object"));
    let entry = builder.block();
    let exit = builder.exit();

    let mut nodes = vec![null(), declare(a), null(), declare(b)];
    nodes.extend(instance_call(
        read(b),
        "ToString",
        KnownMethod::Other,
        Vec::new(),
        TypeInfo::reference("string"),
    ));
    nodes.push(Instruction::Discard);
    builder.define(entry, nodes, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(null_dereference::RULE_ID, ProgramPoint::new(entry, 5)));
    assert_eq!(
        report.findings[0].message,
        "'b' is null on at least one execution path."
    );

    Ok(())
}
