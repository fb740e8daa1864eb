//! This module contains the [`Instruction`] type, a closed union of every
//! syntactic unit that can appear as a node in a block of the control flow
//! graph.
//!
//! # Operand Stack Contract
//!
//! Each instruction consumes its operands from the top of the operand stack and
//! pushes at most one result. The operands are evaluated by earlier
//! instructions, so the topmost operand is always the one evaluated last. The
//! exact counts are given by [`Instruction::stack_effect`] and are checked by
//! the visitor after every transition.

use crate::cfg::symbol::{MethodInfo, SymbolId, TypeInfo};

/// A literal value.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Literal {
    True,
    False,
    Null,
    String(String),
    Numeric,
    Char,
}

/// Which equality a resolved `==` or `!=` operator stands for.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum EqualityKind {
    /// The root object type's identity comparison.
    Reference,

    /// A value comparison or a user-defined operator.
    Value,
}

/// A binary operator.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum BinaryOperator {
    /// Non-short-circuiting conjunction (`&`) on booleans.
    And,

    /// Non-short-circuiting disjunction (`|`) on booleans.
    Or,

    /// Exclusive or (`^`) on booleans.
    Xor,

    /// `==`.
    Equals(EqualityKind),

    /// `!=`.
    NotEquals(EqualityKind),

    /// `<`, `<=`, `>` and `>=`, possibly lifted over nullable operands.
    Relational { lifted: bool },

    /// Every other operator.
    Arithmetic,
}

/// A unary operator.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum UnaryOperator {
    /// Logical negation (`!`).
    Not,

    /// Every other operator.
    Other,
}

/// How a member is reached.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Receiver {
    /// Through an instance on the operand stack.
    Instance,

    /// Statically, with no operand.
    Static,
}

/// The target of an assignment.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum AssignmentTarget {
    /// A local, parameter, or field referenced by simple name.
    Symbol(SymbolId),

    /// A member, reached through `receiver`.
    Member { member: SymbolId, receiver: Receiver },

    /// An indexer on a receiver with `arg_count` index arguments.
    Element { arg_count: usize },

    /// The discard `_`.
    Discard,
}

/// The kind of an assignment.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum AssignmentKind {
    /// `a = b`.
    Simple,

    /// `a += b` and friends.
    Compound,

    /// `a++`, `++a`, `a--` and `--a`, whose operand has already been read.
    Increment,
}

/// The kind of a cast that passes its operand through.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum CastKind {
    Explicit,
    Checked,
    Unchecked,
    Parenthesized,

    /// An explicit conversion from a nullable value type to its underlying
    /// type.
    UnwrapNullable,
}

/// The variables that a pattern captures.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Designation {
    None,
    Discard,
    Single(SymbolId),

    /// A deconstruction into several variables.
    Tuple(Vec<SymbolId>),
}

impl Designation {
    /// Gets the symbols the designation introduces.
    #[must_use]
    pub fn symbols(&self) -> Vec<SymbolId> {
        match self {
            Self::None | Self::Discard => Vec::new(),
            Self::Single(symbol) => vec![*symbol],
            Self::Tuple(symbols) => symbols.clone(),
        }
    }
}

/// A pattern tested by `is` or by a case label.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Pattern {
    /// `null`.
    Null,

    /// A type test, optionally capturing the tested value.
    Type { ty: TypeInfo, designation: Designation },

    /// `var x`, which always matches.
    Var(Designation),

    /// `_`, which always matches.
    Discard,

    /// A constant other than `null`.
    Constant,
}

impl Pattern {
    /// Checks if the pattern matches every value.
    #[must_use]
    pub fn is_irrefutable(&self) -> bool {
        matches!(self, Self::Var(_) | Self::Discard)
    }

    /// Gets the symbols the pattern introduces.
    #[must_use]
    pub fn designated_symbols(&self) -> Vec<SymbolId> {
        match self {
            Self::Type { designation, .. } | Self::Var(designation) => designation.symbols(),
            _ => Vec::new(),
        }
    }
}

/// The effect of an instruction on the depth of the operand stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StackEffect {
    /// The number of operands consumed.
    pub pops: usize,

    /// The number of results produced.
    pub pushes: usize,
}

impl StackEffect {
    fn new(pops: usize, pushes: usize) -> Self {
        Self { pops, pushes }
    }
}

/// A single node of a basic block, as seen by the instruction visitor.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Instruction {
    /// A literal.
    Literal(Literal),

    /// `this`.
    This,

    /// `base`.
    Base,

    /// A read of a local, parameter, or implicitly-`this` field by simple
    /// name. `ref_or_out` is set when the read is a `ref` or `out` argument.
    Read { symbol: SymbolId, ref_or_out: bool },

    /// A variable declarator, which consumes its initializer if it has one.
    Declaration { symbol: SymbolId, initialized: bool },

    /// A field or property access.
    MemberAccess { member: SymbolId, receiver: Receiver },

    /// The method being invoked, which occupies one stack slot below the
    /// arguments.
    MethodGroup { name: String, receiver: Receiver },

    /// An invocation consuming `arg_count` arguments and the method group.
    Invocation { method: MethodInfo, arg_count: usize },

    /// An assignment, compound assignment, or increment.
    Assignment {
        target: AssignmentTarget,
        kind:   AssignmentKind,
    },

    /// A binary operator that does not short circuit.
    Binary(BinaryOperator),

    /// A unary operator.
    Unary(UnaryOperator),

    /// A cast or parenthesization that passes its operand through.
    Cast(CastKind),

    /// `x as T`.
    As { ty: TypeInfo },

    /// `x is T`.
    Is { ty: TypeInfo },

    /// `x is <pattern>`.
    IsPattern(Pattern),

    /// `new T(...)` with `arg_count` constructor and initializer operands.
    ObjectCreation { ty: TypeInfo, arg_count: usize },

    /// `new T[...]` with `arg_count` size and initializer operands.
    ArrayCreation { arg_count: usize },

    /// `new { ... }` with `member_count` initializer operands.
    AnonymousObjectCreation { member_count: usize },

    /// `x[...]` with `arg_count` index arguments.
    ElementAccess { arg_count: usize },

    /// `await x`.
    Await,

    /// `default(T)`.
    Default { ty: TypeInfo },

    /// `nameof(...)`, whose argument is never evaluated.
    NameOf,

    /// A tuple literal of `arity` elements.
    Tuple { arity: usize },

    /// A lambda or anonymous method.
    Lambda,

    /// The end of an expression statement, whose value is discarded.
    Discard,

    /// A syntactic kind that the visitor does not model.
    Unsupported { kind: String },
}

impl Instruction {
    /// Gets the effect that the instruction has on the operand stack, or
    /// [`None`] if the instruction is unsupported.
    #[must_use]
    pub fn stack_effect(&self) -> Option<StackEffect> {
        let effect = match self {
            Self::Literal(_)
            | Self::This
            | Self::Base
            | Self::Read { .. }
            | Self::Default { .. }
            | Self::NameOf
            | Self::Lambda => StackEffect::new(0, 1),
            Self::Declaration { initialized, .. } => StackEffect::new(usize::from(*initialized), 0),
            Self::MemberAccess { receiver, .. } | Self::MethodGroup { receiver, .. } => {
                StackEffect::new(usize::from(*receiver == Receiver::Instance), 1)
            }
            Self::Invocation { arg_count, .. } => StackEffect::new(arg_count + 1, 1),
            Self::Assignment { target, kind } => {
                let operand = 1;
                let receiver = match (target, kind) {
                    (_, AssignmentKind::Increment) => 0,
                    (
                        AssignmentTarget::Member {
                            receiver: Receiver::Instance,
                            ..
                        },
                        _,
                    ) => 1,
                    (AssignmentTarget::Element { arg_count }, _) => arg_count + 1,
                    _ => 0,
                };
                StackEffect::new(operand + receiver, 1)
            }
            Self::Binary(_) => StackEffect::new(2, 1),
            Self::Unary(_)
            | Self::Cast(_)
            | Self::As { .. }
            | Self::Is { .. }
            | Self::IsPattern(_)
            | Self::Await => StackEffect::new(1, 1),
            Self::ObjectCreation { arg_count, .. } | Self::ArrayCreation { arg_count } => {
                StackEffect::new(*arg_count, 1)
            }
            Self::AnonymousObjectCreation { member_count } => StackEffect::new(*member_count, 1),
            Self::ElementAccess { arg_count } => StackEffect::new(arg_count + 1, 1),
            Self::Tuple { arity } => StackEffect::new(*arity, 1),
            Self::Discard => StackEffect::new(1, 0),
            Self::Unsupported { .. } => return None,
        };

        Some(effect)
    }

    /// Gets a textual representation of the instruction kind to aid in
    /// debugging.
    #[must_use]
    pub fn as_text_code(&self) -> String {
        match self {
            Self::Literal(_) => "LITERAL".into(),
            Self::This => "THIS".into(),
            Self::Base => "BASE".into(),
            Self::Read { .. } => "READ".into(),
            Self::Declaration { .. } => "DECLARE".into(),
            Self::MemberAccess { .. } => "MEMBER".into(),
            Self::MethodGroup { name, .. } => format!("METHOD_GROUP({name})"),
            Self::Invocation { method, .. } => format!("INVOKE({})", method.name),
            Self::Assignment { .. } => "ASSIGN".into(),
            Self::Binary(_) => "BINARY".into(),
            Self::Unary(_) => "UNARY".into(),
            Self::Cast(_) => "CAST".into(),
            Self::As { .. } => "AS".into(),
            Self::Is { .. } => "IS".into(),
            Self::IsPattern(_) => "IS_PATTERN".into(),
            Self::ObjectCreation { ty, .. } => format!("NEW({})", ty.name),
            Self::ArrayCreation { .. } => "NEW_ARRAY".into(),
            Self::AnonymousObjectCreation { .. } => "NEW_ANONYMOUS".into(),
            Self::ElementAccess { .. } => "ELEMENT".into(),
            Self::Await => "AWAIT".into(),
            Self::Default { .. } => "DEFAULT".into(),
            Self::NameOf => "NAMEOF".into(),
            Self::Tuple { .. } => "TUPLE".into(),
            Self::Lambda => "LAMBDA".into(),
            Self::Discard => "DISCARD".into(),
            Self::Unsupported { kind } => format!("UNSUPPORTED({kind})"),
        }
    }
}
