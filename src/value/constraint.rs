//! This module contains the abstract domains whose facts can be attached to a
//! [`super::SymbolicValue`] in a program state.

use std::fmt::{Display, Formatter};

/// The domains that constraints belong to.
///
/// A value holds at most one constraint from each domain at any one time.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Domain {
    Object,
    Bool,
    String,
    Collection,
    Disposable,
    Lock,
}

/// Nullability.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ObjectConstraint {
    Null,
    NotNull,
}

/// Boolean truth.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum BoolConstraint {
    True,
    False,
}

impl BoolConstraint {
    /// Gets the boolean constraint corresponding to `value`.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }

    /// Gets the other boolean constraint.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
        }
    }
}

/// The shape of a non-null string.
///
/// This is a small lattice over three disjoint shapes (empty, whitespace only,
/// and containing a non-whitespace character), represented as the set of
/// shapes the string may still have. Constraining an already-constrained
/// string narrows it to the intersection of the two sets.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StringConstraint(u8);

impl StringConstraint {
    /// The string is `""`.
    pub const EMPTY: Self = Self(0b001);

    /// The string is either empty or only contains whitespace.
    pub const EMPTY_OR_WHITESPACE: Self = Self(0b011);

    /// The string contains at least one non-whitespace character.
    pub const FULL_NOT_WHITESPACE: Self = Self(0b100);

    /// The string is not empty.
    pub const FULL_STRING: Self = Self(0b110);

    /// The string is not empty, but contains only whitespace.
    pub const WHITESPACE: Self = Self(0b010);

    const ALL: u8 = 0b111;

    /// Gets the shape of the string literal `text`.
    #[must_use]
    pub fn of_literal(text: &str) -> Self {
        if text.is_empty() {
            Self::EMPTY
        } else if text.chars().all(char::is_whitespace) {
            Self::WHITESPACE
        } else {
            Self::FULL_NOT_WHITESPACE
        }
    }

    /// Narrows `self` by `other`, returning [`None`] if no shape remains.
    #[must_use]
    pub fn meet(self, other: Self) -> Option<Self> {
        let bits = self.0 & other.0;
        (bits != 0).then_some(Self(bits))
    }

    /// Checks if every shape allowed by `self` is also allowed by `other`.
    #[must_use]
    pub fn implies(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Gets the shapes that `self` does not allow.
    #[must_use]
    pub fn complement(self) -> Option<Self> {
        let bits = !self.0 & Self::ALL;
        (bits != 0).then_some(Self(bits))
    }
}

/// The emptiness of a collection.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CollectionConstraint {
    Empty,
    NotEmpty,
}

/// Whether a disposable object has been disposed.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum DisposableConstraint {
    Disposed,
}

/// Whether a lock object is held.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LockConstraint {
    Held,
}

/// A single fact from one of the abstract domains.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Constraint {
    Object(ObjectConstraint),
    Bool(BoolConstraint),
    String(StringConstraint),
    Collection(CollectionConstraint),
    Disposable(DisposableConstraint),
    Lock(LockConstraint),
}

impl Constraint {
    pub const DISPOSED: Self = Self::Disposable(DisposableConstraint::Disposed);
    pub const EMPTY_COLLECTION: Self = Self::Collection(CollectionConstraint::Empty);
    pub const FALSE: Self = Self::Bool(BoolConstraint::False);
    pub const HELD: Self = Self::Lock(LockConstraint::Held);
    pub const NOT_EMPTY_COLLECTION: Self = Self::Collection(CollectionConstraint::NotEmpty);
    pub const NOT_NULL: Self = Self::Object(ObjectConstraint::NotNull);
    pub const NULL: Self = Self::Object(ObjectConstraint::Null);
    pub const TRUE: Self = Self::Bool(BoolConstraint::True);

    /// Gets the domain of the constraint.
    #[must_use]
    pub fn domain(self) -> Domain {
        match self {
            Self::Object(_) => Domain::Object,
            Self::Bool(_) => Domain::Bool,
            Self::String(_) => Domain::String,
            Self::Collection(_) => Domain::Collection,
            Self::Disposable(_) => Domain::Disposable,
            Self::Lock(_) => Domain::Lock,
        }
    }

    /// Gets the constraint that holds exactly when `self` does not, if the
    /// domain has one.
    ///
    /// Disposal and lock state have no opposite, as the absence of the
    /// constraint is what expresses the negation.
    #[must_use]
    pub fn opposite(self) -> Option<Self> {
        match self {
            Self::Object(ObjectConstraint::Null) => Some(Self::NOT_NULL),
            Self::Object(ObjectConstraint::NotNull) => Some(Self::NULL),
            Self::Bool(b) => Some(Self::Bool(b.negate())),
            Self::String(s) => s.complement().map(Self::String),
            Self::Collection(CollectionConstraint::Empty) => Some(Self::NOT_EMPTY_COLLECTION),
            Self::Collection(CollectionConstraint::NotEmpty) => Some(Self::EMPTY_COLLECTION),
            Self::Disposable(_) | Self::Lock(_) => None,
        }
    }

    /// Checks if holding the constraint means that the value is not null.
    #[must_use]
    pub fn implies_not_null(self) -> bool {
        !matches!(self, Self::Object(_))
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Object(ObjectConstraint::Null) => write!(f, "Null"),
            Self::Object(ObjectConstraint::NotNull) => write!(f, "NotNull"),
            Self::Bool(BoolConstraint::True) => write!(f, "True"),
            Self::Bool(BoolConstraint::False) => write!(f, "False"),
            Self::String(s) => match s {
                StringConstraint::EMPTY => write!(f, "EmptyString"),
                StringConstraint::WHITESPACE => write!(f, "WhiteSpaceString"),
                StringConstraint::EMPTY_OR_WHITESPACE => write!(f, "EmptyOrWhiteSpaceString"),
                StringConstraint::FULL_NOT_WHITESPACE => write!(f, "FullNotWhiteSpaceString"),
                StringConstraint::FULL_STRING => write!(f, "FullString"),
                StringConstraint(bits) => write!(f, "String({bits:#05b})"),
            },
            Self::Collection(CollectionConstraint::Empty) => write!(f, "EmptyCollection"),
            Self::Collection(CollectionConstraint::NotEmpty) => write!(f, "NotEmptyCollection"),
            Self::Disposable(DisposableConstraint::Disposed) => write!(f, "Disposed"),
            Self::Lock(LockConstraint::Held) => write!(f, "LockHeld"),
        }
    }
}

/// The constraints held by a single value, at most one per [`Domain`].
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ConstraintSet {
    object:     Option<ObjectConstraint>,
    bool:       Option<BoolConstraint>,
    string:     Option<StringConstraint>,
    collection: Option<CollectionConstraint>,
    disposable: Option<DisposableConstraint>,
    lock:       Option<LockConstraint>,
}

impl ConstraintSet {
    /// Constructs an empty constraint set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the constraint held in `domain`, if any.
    #[must_use]
    pub fn get(&self, domain: Domain) -> Option<Constraint> {
        match domain {
            Domain::Object => self.object.map(Constraint::Object),
            Domain::Bool => self.bool.map(Constraint::Bool),
            Domain::String => self.string.map(Constraint::String),
            Domain::Collection => self.collection.map(Constraint::Collection),
            Domain::Disposable => self.disposable.map(Constraint::Disposable),
            Domain::Lock => self.lock.map(Constraint::Lock),
        }
    }

    /// Checks if the set guarantees that `constraint` holds.
    #[must_use]
    pub fn implies(&self, constraint: Constraint) -> bool {
        match (self.get(constraint.domain()), constraint) {
            (Some(Constraint::String(held)), Constraint::String(asked)) => held.implies(asked),
            (Some(held), asked) => held == asked,
            (None, _) => false,
        }
    }

    /// Adds `constraint` to the set, returning [`None`] if it contradicts the
    /// constraint already held in its domain.
    ///
    /// Constraints from every domain but nullability also imply that the value
    /// is not null.
    #[must_use]
    pub fn with(mut self, constraint: Constraint) -> Option<Self> {
        if constraint.implies_not_null() {
            self = self.with(Constraint::NOT_NULL)?;
        }

        match constraint {
            Constraint::Object(c) => {
                if c == ObjectConstraint::Null && self.has_non_object_constraints() {
                    return None;
                }
                merge(&mut self.object, c)?;
            }
            Constraint::Bool(c) => merge(&mut self.bool, c)?,
            Constraint::String(c) => {
                let narrowed = match self.string {
                    Some(held) => held.meet(c)?,
                    None => c,
                };
                self.string = Some(narrowed);
            }
            Constraint::Collection(c) => merge(&mut self.collection, c)?,
            Constraint::Disposable(c) => merge(&mut self.disposable, c)?,
            Constraint::Lock(c) => merge(&mut self.lock, c)?,
        }

        Some(self)
    }

    /// Removes any constraint held in `domain`.
    #[must_use]
    pub fn without(mut self, domain: Domain) -> Self {
        match domain {
            Domain::Object => self.object = None,
            Domain::Bool => self.bool = None,
            Domain::String => self.string = None,
            Domain::Collection => self.collection = None,
            Domain::Disposable => self.disposable = None,
            Domain::Lock => self.lock = None,
        }
        self
    }

    /// Checks if the set holds no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Iterates over the constraints in the set.
    pub fn iter(&self) -> impl Iterator<Item = Constraint> + '_ {
        [
            Domain::Object,
            Domain::Bool,
            Domain::String,
            Domain::Collection,
            Domain::Disposable,
            Domain::Lock,
        ]
        .into_iter()
        .filter_map(|domain| self.get(domain))
    }

    fn has_non_object_constraints(&self) -> bool {
        self.iter().any(Constraint::implies_not_null)
    }
}

/// Merges `constraint` into the single-valued `slot`, returning [`None`] on a
/// contradiction.
fn merge<T: Copy + Eq>(slot: &mut Option<T>, constraint: T) -> Option<()> {
    match slot {
        Some(held) if *held != constraint => None,
        _ => {
            *slot = Some(constraint);
            Some(())
        }
    }
}
