//! Managed universe reflection interface
//!
//! The bridge never walks the managed universe itself. Everything it knows
//! about namespaces, types and members comes through [`ReflectionProvider`],
//! which a production embedding backs with the real reflection API and tests
//! back with [`crate::memory::InMemoryUniverse`].
//!
//! The descriptors in this module (`ForeignType`, `ForeignMethod`,
//! `ForeignMember`) are the live values held by deferred-failure handles.
//! They stay valid only for the universe that produced them.

mod events;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use events::{NamespaceCallback, NamespaceEvents, Subscription, SubscriptionId};

/// Delimiter between namespace segments in the managed universe
pub const NAMESPACE_SEPARATOR: char = '.';

/// Marker between a generic type's base name and its arity (`Bag`1`)
pub const GENERIC_ARITY_MARKER: char = '`';

/// Method name used by the managed universe for constructors
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Join a namespace and a simple name
///
/// The root namespace is the empty string, so qualifying under it returns
/// the name unchanged.
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, name)
    }
}

/// A type living in the managed universe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignType {
    full_name: Arc<str>,
    namespace: Arc<str>,
}

impl ForeignType {
    /// Create a type descriptor from its namespace-qualified name
    ///
    /// Everything before the last separator is the namespace.
    pub fn new(full_name: impl Into<Arc<str>>) -> Self {
        let full_name = full_name.into();
        let namespace = full_name
            .rsplit_once(NAMESPACE_SEPARATOR)
            .map(|(ns, _)| Arc::from(ns))
            .unwrap_or_else(|| Arc::from(""));
        Self {
            full_name,
            namespace,
        }
    }

    /// Namespace-qualified name (e.g. `Acme.Widgets.Gear`)
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Declaring namespace (empty for the global namespace)
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name without its namespace
    pub fn simple_name(&self) -> &str {
        match self.full_name.rsplit_once(NAMESPACE_SEPARATOR) {
            Some((_, name)) => name,
            None => &self.full_name,
        }
    }

    /// Simple name with any generic arity suffix removed (`Bag`1` -> `Bag`)
    pub fn base_name(&self) -> &str {
        let simple = self.simple_name();
        match simple.split_once(GENERIC_ARITY_MARKER) {
            Some((base, _)) => base,
            None => simple,
        }
    }

    /// Check if this is a generic type definition
    pub fn is_generic(&self) -> bool {
        self.simple_name().contains(GENERIC_ARITY_MARKER)
    }
}

impl fmt::Display for ForeignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// A method or constructor overload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignMethod {
    /// Type declaring the method
    pub declaring_type: ForeignType,
    /// Method name (`.ctor` for constructors)
    pub name: Arc<str>,
    /// Full names of the parameter types, in order
    pub parameter_types: Vec<String>,
    /// Whether the method is static
    pub is_static: bool,
}

impl ForeignMethod {
    /// Check if this overload is a constructor
    pub fn is_constructor(&self) -> bool {
        &*self.name == CONSTRUCTOR_NAME
    }

    /// Human-readable signature (`Acme.Widgets.Gear.Spin(System.Int32)`)
    pub fn signature(&self) -> String {
        format!(
            "{}.{}({})",
            self.declaring_type.full_name(),
            self.name,
            self.parameter_types.join(", ")
        )
    }

    /// Check if the parameter list matches exactly
    pub fn matches_parameters(&self, parameter_types: &[String]) -> bool {
        self.parameter_types == parameter_types
    }
}

impl fmt::Display for ForeignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Kind of a non-method member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Field
    Field,
    /// Property
    Property,
    /// Event
    Event,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Field => write!(f, "field"),
            MemberKind::Property => write!(f, "property"),
            MemberKind::Event => write!(f, "event"),
        }
    }
}

/// A field, property or event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignMember {
    /// Type declaring the member
    pub declaring_type: ForeignType,
    /// Member name
    pub name: Arc<str>,
    /// Member kind
    pub kind: MemberKind,
}

impl ForeignMember {
    /// Qualified member name (`Acme.Widgets.Gear.Teeth`)
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type.full_name(), self.name)
    }
}

impl fmt::Display for ForeignMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Capability interface to the managed universe
///
/// Implementations must be cheap to query repeatedly; the bridge memoizes
/// results in the namespace tree but rehydration after a reload issues fresh
/// lookups for every cached handle.
pub trait ReflectionProvider: Send + Sync {
    /// Every namespace declared by a loaded type, in any order
    fn namespaces(&self) -> Vec<String>;

    /// Direct child names of a namespace
    ///
    /// Includes type names (generic types by base name) and may include
    /// nested namespace segments. The root namespace is `""`.
    fn children(&self, namespace: &str) -> Vec<String>;

    /// Resolve a namespace-qualified type name
    fn lookup_type(&self, full_name: &str) -> Option<ForeignType>;

    /// Resolve a bare generic base name (`Bag`) to a full generic type name
    fn generic_type_name(&self, namespace: &str, base_name: &str) -> Option<String> {
        let _ = (namespace, base_name);
        None
    }

    /// All overloads of a method (or constructor) declared by a type
    fn methods(&self, declaring_type: &ForeignType, name: &str) -> Vec<ForeignMethod>;

    /// A field, property or event declared by a type
    fn member(&self, declaring_type: &ForeignType, name: &str) -> Option<ForeignMember>;

    /// Notifications for namespaces contributed by newly loaded code
    fn events(&self) -> &NamespaceEvents;
}
