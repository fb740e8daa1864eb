//! This module contains the resolved symbol and type information that the host
//! compiler's semantic model provides for the instructions of a control flow
//! graph.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// The identifier of a declared symbol in a [`SymbolTable`].
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Constructs a new symbol identifier from its `index` in the table.
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Gets the index of the symbol in its table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for SymbolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// The broad shape of a static type, as far as nullability is concerned.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum TypeKind {
    /// A reference type, whose values may be null.
    Reference,

    /// A non-nullable value type.
    Value,

    /// A nullable wrapper around a value type.
    NullableValue,
}

/// The static type of a symbol or expression.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TypeInfo {
    /// The display name of the type.
    pub name: String,

    /// Whether and how values of the type can be null.
    pub kind: TypeKind,

    /// Whether the type is a collection whose emptiness can be tracked.
    pub is_collection: bool,

    /// Whether the type is disposable.
    pub is_disposable: bool,
}

impl TypeInfo {
    /// Constructs a reference type called `name`.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Reference)
    }

    /// Constructs a non-nullable value type called `name`.
    pub fn value(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Value)
    }

    /// Constructs a nullable value type called `name`.
    pub fn nullable(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::NullableValue)
    }

    /// Constructs a collection reference type called `name`.
    pub fn collection(name: impl Into<String>) -> Self {
        let mut ty = Self::reference(name);
        ty.is_collection = true;
        ty
    }

    /// Constructs a disposable reference type called `name`.
    pub fn disposable(name: impl Into<String>) -> Self {
        let mut ty = Self::reference(name);
        ty.is_disposable = true;
        ty
    }

    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        Self {
            name,
            kind,
            is_collection: false,
            is_disposable: false,
        }
    }

    /// Checks if the type is a value type that can never be null.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.kind == TypeKind::Value
    }

    /// Checks if the type is a nullable value type.
    #[must_use]
    pub fn is_nullable_value(&self) -> bool {
        self.kind == TypeKind::NullableValue
    }

    /// Checks if values of the type can be null at all.
    #[must_use]
    pub fn can_be_null(&self) -> bool {
        !self.is_value_type()
    }
}

/// The special meaning of a property, as recognised from its resolved
/// identity.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum PropertyRole {
    /// A property with no special meaning.
    Plain,

    /// The `Value` property of a nullable value type.
    NullableValue,

    /// The `HasValue` property of a nullable value type.
    NullableHasValue,
}

/// The kind of a declared symbol.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum SymbolKind {
    /// A local variable.
    Local,

    /// A parameter of the analyzed method.
    Parameter,

    /// A field.
    Field { is_static: bool, is_const: bool },

    /// A property.
    Property { is_static: bool, role: PropertyRole },
}

/// A symbol declared in or referenced from the analyzed method.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Symbol {
    /// The name of the symbol as written in the source.
    pub name: String,

    /// What sort of symbol this is.
    pub kind: SymbolKind,

    /// The static type of the symbol.
    pub ty: TypeInfo,

    /// Whether the symbol is captured by a closure, and hence can be read at
    /// points that the control flow graph does not show.
    pub captured: bool,
}

impl Symbol {
    /// Constructs a new symbol.
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: TypeInfo) -> Self {
        let name = name.into();
        Self {
            name,
            kind,
            ty,
            captured: false,
        }
    }

    /// Marks the symbol as captured by a closure.
    #[must_use]
    pub fn captured(mut self) -> Self {
        self.captured = true;
        self
    }

    /// Checks if the symbol is a field.
    #[must_use]
    pub fn is_field(&self) -> bool {
        matches!(self.kind, SymbolKind::Field { .. })
    }

    /// Checks if the symbol is a local or a parameter, which are the symbols
    /// that liveness is computed for.
    #[must_use]
    pub fn is_local_or_parameter(&self) -> bool {
        matches!(self.kind, SymbolKind::Local | SymbolKind::Parameter)
    }

    /// Checks if reads of the symbol through a member access should observe a
    /// persistent binding for the duration of a walk.
    ///
    /// This is the case for fields accessed on `this` and for static or
    /// constant fields.
    #[must_use]
    pub fn is_bindable_member(&self, on_this: bool) -> bool {
        match self.kind {
            SymbolKind::Field {
                is_static,
                is_const,
            } => on_this || is_static || is_const,
            _ => false,
        }
    }

    /// Gets the role of the symbol if it is a property.
    #[must_use]
    pub fn property_role(&self) -> PropertyRole {
        match self.kind {
            SymbolKind::Property { role, .. } => role,
            _ => PropertyRole::Plain,
        }
    }
}

/// The symbol-resolution oracle for a single control flow graph.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Constructs a new, empty, symbol table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `symbol` to the table, returning its identifier.
    ///
    /// # Panics
    ///
    /// Panics if the table would hold more than [`u32::MAX`] symbols. This is a
    /// programmer bug.
    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        let index = u32::try_from(self.symbols.len())
            .unwrap_or_else(|_| panic!("Symbol count should not exceed {}", u32::MAX));
        self.symbols.push(symbol);
        SymbolId::new(index)
    }

    /// Gets the symbol with the identifier `id`, if it exists.
    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Gets the number of symbols in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Checks if the table contains no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterates over the symbols in the table along with their identifiers.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId::new(i as u32), s))
    }

    /// Checks if the symbol `id` is a field.
    ///
    /// Unknown symbols are not fields.
    #[must_use]
    pub fn is_field(&self, id: SymbolId) -> bool {
        self.get(id).is_some_and(Symbol::is_field)
    }
}

/// The methods that the invocation visitor and the checks recognise, by their
/// resolved identity.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum KnownMethod {
    /// The static two-argument `object.Equals`.
    StaticEquals,

    /// An instance `Equals(object)` call.
    InstanceEquals,

    /// `object.ReferenceEquals`.
    ReferenceEquals,

    /// `string.IsNullOrEmpty`.
    StringIsNullOrEmpty,

    /// `string.IsNullOrWhiteSpace`.
    StringIsNullOrWhiteSpace,

    /// `IDisposable.Dispose`.
    Dispose,

    /// `Monitor.Enter` or an equivalent lock acquisition.
    LockAcquire,

    /// `Monitor.Exit` or an equivalent lock release.
    LockRelease,

    /// A method that adds elements to the receiving collection.
    CollectionAdd,

    /// A method that removes every element from the receiving collection.
    CollectionClear,

    /// A method that reads an element from the receiving collection.
    CollectionElementAccess,

    /// Any other method, which is opaque to the engine.
    Other,
}

/// The resolved target of an invocation.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MethodInfo {
    /// The name of the method.
    pub name: String,

    /// The recognised identity of the method.
    pub known: KnownMethod,

    /// Whether the method is static.
    pub is_static: bool,

    /// The return type of the method.
    pub return_type: TypeInfo,

    /// The indices of the parameters that the method validates to be non-null.
    pub validated_not_null: Vec<usize>,

    /// Whether the method is known to have no side effects on instance state.
    pub is_pure: bool,

    /// The indices of the arguments at this call whose static type is a
    /// non-nullable value type, which are boxed into fresh objects when passed
    /// as references.
    pub value_type_arguments: Vec<usize>,
}

impl MethodInfo {
    /// Constructs an opaque instance method called `name` returning
    /// `return_type`.
    pub fn new(name: impl Into<String>, return_type: TypeInfo) -> Self {
        let name = name.into();
        Self {
            name,
            known: KnownMethod::Other,
            is_static: false,
            return_type,
            validated_not_null: Vec::new(),
            is_pure: false,
            value_type_arguments: Vec::new(),
        }
    }

    /// Sets the recognised identity of the method.
    #[must_use]
    pub fn known(mut self, known: KnownMethod) -> Self {
        self.known = known;
        self
    }

    /// Marks the method as static.
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Marks the method as free of side effects.
    #[must_use]
    pub fn pure(mut self) -> Self {
        self.is_pure = true;
        self
    }

    /// Records that the parameter at `index` is validated to be non-null.
    #[must_use]
    pub fn validates_not_null(mut self, index: usize) -> Self {
        self.validated_not_null.push(index);
        self
    }

    /// Records that the argument at `index` is of a non-nullable value type.
    #[must_use]
    pub fn value_type_argument(mut self, index: usize) -> Self {
        self.value_type_arguments.push(index);
        self
    }
}
