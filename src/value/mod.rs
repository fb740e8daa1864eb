//! This module contains the definition of the [`SymbolicValue`] and its
//! supporting types.

pub mod constraint;
pub mod propagation;

use std::{
    fmt::{Display, Formatter},
    rc::Rc,
};

use uuid::Uuid;

use crate::cfg::{instruction::EqualityKind, symbol::SymbolId};

/// A symbolic value stands in for an unknown or partially-known runtime value
/// during the walk of a control flow graph.
///
/// Fresh values compare by their identity. Composite values compare
/// structurally on their operands, so that evaluating the same expression
/// over the same operands twice produces the same value.
///
/// Values are immutable and cheap to clone, sharing their data.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SymbolicValue(Rc<SymbolicValueData>);

impl SymbolicValue {
    /// Constructs a new symbolic value from its `data`.
    #[must_use]
    pub fn new(data: SymbolicValueData) -> Self {
        Self(Rc::new(data))
    }

    /// Constructs a new value with a fresh identity, about which nothing is
    /// known.
    #[must_use]
    pub fn fresh() -> Self {
        let id = Uuid::new_v4();
        Self::new(SymbolicValueData::Value { id })
    }

    /// The constant `true`.
    #[must_use]
    pub fn true_value() -> Self {
        Self::new(SymbolicValueData::True)
    }

    /// The constant `false`.
    #[must_use]
    pub fn false_value() -> Self {
        Self::new(SymbolicValueData::False)
    }

    /// The constant boolean `value`.
    #[must_use]
    pub fn bool_value(value: bool) -> Self {
        if value {
            Self::true_value()
        } else {
            Self::false_value()
        }
    }

    /// The constant `null`.
    #[must_use]
    pub fn null() -> Self {
        Self::new(SymbolicValueData::Null)
    }

    /// The receiver of the analyzed method, which `base` also refers to.
    #[must_use]
    pub fn this() -> Self {
        Self::new(SymbolicValueData::This)
    }

    /// The logical negation of `value`.
    #[must_use]
    pub fn not(value: Self) -> Self {
        Self::new(SymbolicValueData::Not { value })
    }

    /// The non-short-circuiting conjunction of `left` and `right`.
    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::new(SymbolicValueData::And { left, right })
    }

    /// The non-short-circuiting disjunction of `left` and `right`.
    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::new(SymbolicValueData::Or { left, right })
    }

    /// The exclusive or of `left` and `right`.
    #[must_use]
    pub fn xor(left: Self, right: Self) -> Self {
        Self::new(SymbolicValueData::Xor { left, right })
    }

    /// The equality test of `left` and `right` of the provided `kind`.
    #[must_use]
    pub fn equals(kind: EqualityKind, left: Self, right: Self) -> Self {
        match kind {
            EqualityKind::Reference => Self::new(SymbolicValueData::ReferenceEquals { left, right }),
            EqualityKind::Value => Self::new(SymbolicValueData::ValueEquals { left, right }),
        }
    }

    /// The test of whether the string `value` is null or empty, or also only
    /// whitespace if `whitespace` is set.
    #[must_use]
    pub fn is_null_or_empty(value: Self, whitespace: bool) -> Self {
        Self::new(SymbolicValueData::IsNullOrEmpty { value, whitespace })
    }

    /// A runtime type test of `value`.
    #[must_use]
    pub fn is_type(value: Self) -> Self {
        Self::new(SymbolicValueData::IsType { value })
    }

    /// The `HasValue` property of the nullable `value`.
    #[must_use]
    pub fn has_value(value: Self) -> Self {
        Self::new(SymbolicValueData::HasValue { value })
    }

    /// The read of `member` through `receiver`.
    #[must_use]
    pub fn member_access(receiver: Self, member: SymbolId) -> Self {
        Self::new(SymbolicValueData::MemberAccess { receiver, member })
    }

    /// The method `name` bound to the instance `receiver`, awaiting
    /// invocation.
    #[must_use]
    pub fn method_group(receiver: Self, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(SymbolicValueData::MethodGroup { receiver, name })
    }

    /// Gets the receiver of a member access or method group, if this is one.
    #[must_use]
    pub fn receiver(&self) -> Option<&SymbolicValue> {
        match self.data() {
            SymbolicValueData::MemberAccess { receiver, .. }
            | SymbolicValueData::MethodGroup { receiver, .. } => Some(receiver),
            _ => None,
        }
    }

    /// Gets the data of the value.
    #[must_use]
    pub fn data(&self) -> &SymbolicValueData {
        &self.0
    }

    /// Checks if the value is one of the constants, whose constraints are
    /// fixed for the whole walk.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(
            self.data(),
            SymbolicValueData::True
                | SymbolicValueData::False
                | SymbolicValueData::Null
                | SymbolicValueData::This
        )
    }

    /// Gets the values that this value is directly composed from.
    #[must_use]
    pub fn operands(&self) -> Vec<&SymbolicValue> {
        match self.data() {
            SymbolicValueData::Value { .. }
            | SymbolicValueData::True
            | SymbolicValueData::False
            | SymbolicValueData::Null
            | SymbolicValueData::This => Vec::new(),
            SymbolicValueData::Not { value }
            | SymbolicValueData::IsNullOrEmpty { value, .. }
            | SymbolicValueData::IsType { value }
            | SymbolicValueData::HasValue { value } => vec![value],
            SymbolicValueData::MemberAccess { receiver, .. }
            | SymbolicValueData::MethodGroup { receiver, .. } => vec![receiver],
            SymbolicValueData::And { left, right }
            | SymbolicValueData::Or { left, right }
            | SymbolicValueData::Xor { left, right }
            | SymbolicValueData::ReferenceEquals { left, right }
            | SymbolicValueData::ValueEquals { left, right } => vec![left, right],
        }
    }
}

impl Display for SymbolicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.data() {
            SymbolicValueData::Value { id } => {
                let text = id.simple().to_string();
                write!(f, "#{}", &text[..8])
            }
            SymbolicValueData::True => write!(f, "true"),
            SymbolicValueData::False => write!(f, "false"),
            SymbolicValueData::Null => write!(f, "null"),
            SymbolicValueData::This => write!(f, "this"),
            SymbolicValueData::Not { value } => write!(f, "!{value}"),
            SymbolicValueData::And { left, right } => write!(f, "({left} & {right})"),
            SymbolicValueData::Or { left, right } => write!(f, "({left} | {right})"),
            SymbolicValueData::Xor { left, right } => write!(f, "({left} ^ {right})"),
            SymbolicValueData::ReferenceEquals { left, right } => {
                write!(f, "ReferenceEquals({left}, {right})")
            }
            SymbolicValueData::ValueEquals { left, right } => write!(f, "({left} == {right})"),
            SymbolicValueData::IsNullOrEmpty { value, whitespace } => {
                if *whitespace {
                    write!(f, "IsNullOrWhiteSpace({value})")
                } else {
                    write!(f, "IsNullOrEmpty({value})")
                }
            }
            SymbolicValueData::IsType { value } => write!(f, "({value} is T)"),
            SymbolicValueData::HasValue { value } => write!(f, "{value}.HasValue"),
            SymbolicValueData::MemberAccess { receiver, member } => {
                write!(f, "{receiver}.{member}")
            }
            SymbolicValueData::MethodGroup { receiver, name } => write!(f, "{receiver}.{name}"),
        }
    }
}

/// The structures that a [`SymbolicValue`] can take.
///
/// Only the composites that the engine can reason through are represented.
/// Every other operation produces a fresh [`SymbolicValueData::Value`].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SymbolicValueData {
    /// A value with identity, but about which nothing else is known.
    Value { id: Uuid },

    /// The constant `true`.
    True,

    /// The constant `false`.
    False,

    /// The constant `null`.
    Null,

    /// The receiver of the analyzed method.
    This,

    /// Logical negation.
    Not { value: SymbolicValue },

    /// Conjunction without short-circuiting.
    And {
        left:  SymbolicValue,
        right: SymbolicValue,
    },

    /// Disjunction without short-circuiting.
    Or {
        left:  SymbolicValue,
        right: SymbolicValue,
    },

    /// Exclusive or.
    Xor {
        left:  SymbolicValue,
        right: SymbolicValue,
    },

    /// Identity comparison of two references.
    ReferenceEquals {
        left:  SymbolicValue,
        right: SymbolicValue,
    },

    /// Value comparison, or a comparison through a user-defined operator.
    ValueEquals {
        left:  SymbolicValue,
        right: SymbolicValue,
    },

    /// `string.IsNullOrEmpty` or, if `whitespace` is set,
    /// `string.IsNullOrWhiteSpace`.
    IsNullOrEmpty {
        value:      SymbolicValue,
        whitespace: bool,
    },

    /// A runtime type test, which can only succeed on a non-null value.
    IsType { value: SymbolicValue },

    /// The `HasValue` property of a nullable value.
    HasValue { value: SymbolicValue },

    /// The read of a member that is not given a persistent binding.
    MemberAccess {
        receiver: SymbolicValue,
        member:   SymbolId,
    },

    /// An instance method bound to its receiver.
    MethodGroup {
        receiver: SymbolicValue,
        name:     String,
    },
}

#[cfg(test)]
mod test {
    use crate::{
        cfg::{instruction::EqualityKind, symbol::SymbolId},
        value::SymbolicValue,
    };

    #[test]
    fn fresh_values_are_distinct() {
        assert_ne!(SymbolicValue::fresh(), SymbolicValue::fresh());
    }

    #[test]
    fn composites_compare_structurally() {
        let a = SymbolicValue::fresh();
        let b = SymbolicValue::fresh();
        assert_eq!(
            SymbolicValue::equals(EqualityKind::Reference, a.clone(), b.clone()),
            SymbolicValue::equals(EqualityKind::Reference, a.clone(), b.clone())
        );
        assert_ne!(
            SymbolicValue::equals(EqualityKind::Reference, a.clone(), b.clone()),
            SymbolicValue::equals(EqualityKind::Value, a.clone(), b.clone())
        );
        assert_eq!(
            SymbolicValue::member_access(a.clone(), SymbolId::new(3)),
            SymbolicValue::member_access(a, SymbolId::new(3))
        );
    }

    #[test]
    fn constants_are_recognised() {
        assert!(SymbolicValue::null().is_constant());
        assert!(SymbolicValue::this().is_constant());
        assert!(!SymbolicValue::fresh().is_constant());
        assert!(!SymbolicValue::not(SymbolicValue::true_value()).is_constant());
    }

    #[test]
    fn operands_are_exposed() {
        let a = SymbolicValue::fresh();
        let b = SymbolicValue::fresh();
        let and = SymbolicValue::and(a.clone(), b.clone());
        assert_eq!(and.operands(), vec![&a, &b]);
        assert!(a.operands().is_empty());

        let group = SymbolicValue::method_group(b.clone(), "Dispose");
        assert_eq!(group.receiver(), Some(&b));
    }
}
