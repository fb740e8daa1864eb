//! This module is an integration test that checks when the walk stops
//! trusting what it knows about the fields of the analyzed object.
#![cfg(test)]

use common::{member, null, read};
use symbolic_defect_analyzer::{
    cfg::{
        builder::CfgBuilder,
        instruction::{AssignmentKind, AssignmentTarget, Instruction, Receiver},
        symbol::{PropertyRole, TypeInfo},
        BlockId,
        Cfg,
        JumpKind,
        Terminator,
    },
    check::null_dereference,
    graph::point::ProgramPoint,
};

mod common;

/// Builds `this.f = null; <jump>; this.f.Length;`, where the jump is of the
/// provided `kind`. A `lock` guards `l`, and a `using` guards `d`.
fn null_field_across(kind: JumpKind) -> anyhow::Result<(Cfg, BlockId)> {
    let mut builder = CfgBuilder::new("M(object, Stream)");
    let l = builder.parameter("l", TypeInfo::reference("object"));
    let d = builder.parameter("d", TypeInfo::disposable("Stream"));
    let f = builder.field("f", TypeInfo::reference("string"));
    let length = builder.property("Length", TypeInfo::value("int"), PropertyRole::Plain);
    let entry = builder.block();
    let body = builder.block();
    let exit = builder.exit();

    let mut nodes = vec![
        Instruction::This,
        null(),
        Instruction::Assignment {
            target: AssignmentTarget::Member {
                member:   f,
                receiver: Receiver::Instance,
            },
            kind:   AssignmentKind::Simple,
        },
        Instruction::Discard,
    ];
    match kind {
        JumpKind::Lock => nodes.push(read(l)),
        JumpKind::Using { has_resource: true } => nodes.push(read(d)),
        _ => {}
    }

    builder
        .define(entry, nodes, Terminator::Jump { target: body, kind })
        .define(
            body,
            [
                Instruction::This,
                member(f),
                member(length),
                Instruction::Discard,
            ],
            Terminator::Goto(exit),
        );

    Ok((builder.build(entry)?, body))
}

#[test_log::test]
fn fields_survive_plain_jumps() -> anyhow::Result<()> {
    let (cfg, body) = null_field_across(JumpKind::Plain)?;
    let report = common::analyze(cfg)?;

    assert_eq!(report.finding_count(), 1);
    assert!(report.has_finding(null_dereference::RULE_ID, ProgramPoint::new(body, 2)));

    Ok(())
}

#[test]
fn entering_a_lock_forgets_fields() -> anyhow::Result<()> {
    let (cfg, _) = null_field_across(JumpKind::Lock)?;
    let report = common::analyze(cfg)?;

    assert!(report.is_complete());
    assert_eq!(report.finding_count(), 0);

    Ok(())
}

#[test]
fn entering_a_using_statement_forgets_fields() -> anyhow::Result<()> {
    let (cfg, _) = null_field_across(JumpKind::Using { has_resource: true })?;
    let report = common::analyze(cfg)?;

    assert!(report.is_complete());
    assert_eq!(report.finding_count(), 0);

    Ok(())
}
