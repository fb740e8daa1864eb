//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.

#![cfg(test)]

use symbolic_defect_analyzer as sda;
use symbolic_defect_analyzer::{
    analyzer::InitialAnalyzer,
    cfg::{
        instruction::{Instruction, Literal, Receiver},
        symbol::{KnownMethod, MethodInfo, SymbolId, TypeInfo},
        Cfg,
    },
    check::Checks,
    graph,
    watchdog::{DynWatchdog, LazyWatchdog},
    AnalysisReport,
};

/// Constructs a new analyzer for the method described by `cfg`.
///
/// It uses the default configuration and checks.
#[allow(unused)] // It is actually
pub fn new_analyzer(cfg: Cfg, watchdog: DynWatchdog) -> InitialAnalyzer {
    sda::new(cfg, graph::Config::default(), Checks::default(), watchdog)
}

/// Analyzes the method described by `cfg` with the default configuration.
#[allow(unused)] // It is actually
pub fn analyze(cfg: Cfg) -> anyhow::Result<AnalysisReport> {
    analyze_with(cfg, graph::Config::default())
}

/// Analyzes the method described by `cfg` with the provided `config`.
#[allow(unused)] // It is actually
pub fn analyze_with(cfg: Cfg, config: graph::Config) -> anyhow::Result<AnalysisReport> {
    let report = sda::new(cfg, config, Checks::default(), LazyWatchdog.in_arc()).analyze()?;
    Ok(report)
}

/// Reads the value of `symbol`.
#[allow(unused)] // It is actually
pub fn read(symbol: SymbolId) -> Instruction {
    Instruction::Read {
        symbol,
        ref_or_out: false,
    }
}

/// Declares `symbol`, initialized with the value on top of the stack.
#[allow(unused)] // It is actually
pub fn declare(symbol: SymbolId) -> Instruction {
    Instruction::Declaration {
        symbol,
        initialized: true,
    }
}

/// Pushes `null`.
#[allow(unused)] // It is actually
pub fn null() -> Instruction {
    Instruction::Literal(Literal::Null)
}

/// Accesses `member` on the value on top of the stack.
#[allow(unused)] // It is actually
pub fn member(member: SymbolId) -> Instruction {
    Instruction::MemberAccess {
        member,
        receiver: Receiver::Instance,
    }
}

/// Calls the static method `name`, identified as `known`, on the values that
/// `arguments` push.
#[allow(unused)] // It is actually
pub fn static_call(
    name: &str,
    known: KnownMethod,
    arguments: impl IntoIterator<Item = Instruction>,
    returns: TypeInfo,
) -> Vec<Instruction> {
    let mut instructions = vec![Instruction::MethodGroup {
        name:     name.into(),
        receiver: Receiver::Static,
    }];
    let before = instructions.len();
    instructions.extend(arguments);
    let arg_count = instructions.len() - before;

    let method = MethodInfo::new(name, returns).known(known).static_method();
    instructions.push(Instruction::Invocation { method, arg_count });
    instructions
}

/// Calls the instance method `name`, identified as `known`, on the value that
/// `receiver` pushes and with the values that `arguments` push.
#[allow(unused)] // It is actually
pub fn instance_call(
    receiver: Instruction,
    name: &str,
    known: KnownMethod,
    arguments: impl IntoIterator<Item = Instruction>,
    returns: TypeInfo,
) -> Vec<Instruction> {
    let mut instructions = vec![receiver, Instruction::MethodGroup {
        name:     name.into(),
        receiver: Receiver::Instance,
    }];
    let before = instructions.len();
    instructions.extend(arguments);
    let arg_count = instructions.len() - before;

    let method = MethodInfo::new(name, returns).known(known);
    instructions.push(Instruction::Invocation { method, arg_count });
    instructions
}

/// Gets the return type of methods that return nothing.
#[allow(unused)] // It is actually
pub fn void() -> TypeInfo {
    TypeInfo::value("void")
}
