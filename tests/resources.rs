//! This module is an integration test that checks the tracking of locks,
//! disposable objects, and collections through whole methods.
#![cfg(test)]

use common::{declare, instance_call, member, read, static_call, void};
use symbolic_defect_analyzer::{
    cfg::{
        builder::CfgBuilder,
        instruction::{Instruction, Literal, Receiver},
        symbol::{KnownMethod, MethodInfo, SymbolId, TypeInfo},
        BranchKind,
        JumpKind,
        Terminator,
    },
    check::{collection, dispose, lock},
    finding::Location,
    graph::point::ProgramPoint,
};

mod common;

/// Calls `Monitor.<name>(this.<gate>)`, discarding the result.
fn monitor_on_field(name: &str, known: KnownMethod, gate: SymbolId) -> Vec<Instruction> {
    vec![
        Instruction::MethodGroup {
            name:     name.into(),
            receiver: Receiver::Static,
        },
        Instruction::This,
        member(gate),
        Instruction::Invocation {
            method:    MethodInfo::new(name, void()).known(known).static_method(),
            arg_count: 1,
        },
        Instruction::Discard,
    ]
}

#[test_log::test]
fn lock_held_on_one_path_is_reported_at_acquisition() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(object, bool)");
    let l = builder.parameter("l", TypeInfo::reference("object"));
    let c = builder.parameter("c", TypeInfo::value("bool"));
    let entry = builder.block();
    let release = builder.block();
    let exit = builder.exit();

    let mut acquire = static_call("Enter", KnownMethod::LockAcquire, [read(l)], void());
    let acquired_at = ProgramPoint::new(entry, acquire.len() - 1);
    acquire.extend([Instruction::Discard, read(c)]);

    let mut unlock = static_call("Exit", KnownMethod::LockRelease, [read(l)], void());
    unlock.push(Instruction::Discard);

    builder
        .define(entry, acquire, Terminator::BinaryBranch {
            kind:         BranchKind::Condition,
            true_target:  release,
            false_target: exit,
        })
        .define(release, unlock, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.rule_id, lock::RULE_ID);
    assert_eq!(finding.location.point, acquired_at);
    assert_eq!(finding.secondary_locations, vec![Location::new(
        ProgramPoint::start_of(exit),
        None
    )]);
    assert_eq!(
        finding.message,
        "Unlock 'l' along all execution paths of this method."
    );

    Ok(())
}

#[test]
fn lock_released_on_every_path_is_not_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(object)");
    let l = builder.parameter("l", TypeInfo::reference("object"));
    let entry = builder.block();
    let exit = builder.exit();

    let mut nodes = static_call("Enter", KnownMethod::LockAcquire, [read(l)], void());
    nodes.push(Instruction::Discard);
    nodes.extend(static_call("Exit", KnownMethod::LockRelease, [read(l)], void()));
    nodes.push(Instruction::Discard);
    builder.define(entry, nodes, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn disposing_twice_is_reported_once() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(Stream)");
    let d = builder.parameter("d", TypeInfo::disposable("Stream"));
    let entry = builder.block();
    let exit = builder.exit();

    let mut nodes = instance_call(read(d), "Dispose", KnownMethod::Dispose, Vec::new(), void());
    nodes.push(Instruction::Discard);
    nodes.extend(instance_call(
        read(d),
        "Dispose",
        KnownMethod::Dispose,
        Vec::new(),
        void(),
    ));
    let second = ProgramPoint::new(entry, nodes.len() - 1);
    nodes.push(Instruction::Discard);
    builder.define(entry, nodes, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(dispose::RULE_ID, second));
    assert_eq!(report.findings[0].message_arguments, vec!["d".to_string()]);

    Ok(())
}

#[test]
fn using_a_disposed_resource_is_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(Stream)");
    let d = builder.parameter("d", TypeInfo::disposable("Stream"));
    let entry = builder.block();
    let exit = builder.exit();

    let mut nodes = instance_call(read(d), "Dispose", KnownMethod::Dispose, Vec::new(), void());
    nodes.extend([Instruction::Discard, read(d)]);
    let end_of_using = ProgramPoint::new(entry, nodes.len());
    builder.define(entry, nodes, Terminator::Jump {
        target: exit,
        kind:   JumpKind::Using { has_resource: true },
    });

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(dispose::RULE_ID, end_of_using));

    Ok(())
}

#[test]
fn reading_from_a_new_collection_is_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let list = builder.local("list", TypeInfo::collection("List"));
    let entry = builder.block();
    let exit = builder.exit();

    let mut nodes = vec![
        Instruction::ObjectCreation {
            ty:        TypeInfo::collection("List"),
            arg_count: 0,
        },
        declare(list),
    ];
    nodes.extend(instance_call(
        read(list),
        "First",
        KnownMethod::CollectionElementAccess,
        Vec::new(),
        TypeInfo::reference("object"),
    ));
    let first = ProgramPoint::new(entry, nodes.len() - 1);
    nodes.push(Instruction::Discard);
    builder.define(entry, nodes, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(collection::RULE_ID, first));

    Ok(())
}

#[test]
fn reading_from_a_filled_collection_is_not_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let list = builder.local("list", TypeInfo::collection("List"));
    let entry = builder.block();
    let exit = builder.exit();

    let mut nodes = vec![
        Instruction::ObjectCreation {
            ty:        TypeInfo::collection("List"),
            arg_count: 0,
        },
        declare(list),
    ];
    nodes.extend(instance_call(
        read(list),
        "Add",
        KnownMethod::CollectionAdd,
        [Instruction::Literal(Literal::Numeric)],
        void(),
    ));
    nodes.push(Instruction::Discard);
    nodes.extend(instance_call(
        read(list),
        "First",
        KnownMethod::CollectionElementAccess,
        Vec::new(),
        TypeInfo::reference("object"),
    ));
    nodes.push(Instruction::Discard);
    builder.define(entry, nodes, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn lock_on_a_field_released_on_every_path_is_not_reported() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M()");
    let gate = builder.field("_gate", TypeInfo::reference("object"));
    let entry = builder.block();
    let exit = builder.exit();

    let mut nodes = monitor_on_field("Enter", KnownMethod::LockAcquire, gate);
    nodes.extend(monitor_on_field("Exit", KnownMethod::LockRelease, gate));
    builder.define(entry, nodes, Terminator::Goto(exit));

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn lock_on_a_field_held_on_one_path_names_the_field() -> anyhow::Result<()> {
    let mut builder = CfgBuilder::new("M(bool)");
    let c = builder.parameter("c", TypeInfo::value("bool"));
    let gate = builder.field("_gate", TypeInfo::reference("object"));
    let entry = builder.block();
    let release = builder.block();
    let exit = builder.exit();

    let mut acquire = monitor_on_field("Enter", KnownMethod::LockAcquire, gate);
    let acquired_at = ProgramPoint::new(entry, 3);
    acquire.push(read(c));

    builder
        .define(entry, acquire, Terminator::BinaryBranch {
            kind:         BranchKind::Condition,
            true_target:  release,
            false_target: exit,
        })
        .define(
            release,
            monitor_on_field("Exit", KnownMethod::LockRelease, gate),
            Terminator::Goto(exit),
        );

    let report = common::analyze(builder.build(entry)?)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(lock::RULE_ID, acquired_at));
    assert_eq!(
        report.findings[0].message,
        "Unlock '_gate' along all execution paths of this method."
    );

    Ok(())
}
