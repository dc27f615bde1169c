//! Host interpreter interface
//!
//! The host's object model is opaque to the bridge. What crosses the boundary
//! is a [`HostValue`]: a handful of plain values the import protocol needs
//! (strings, tuples, ints), the bridge's own module-like objects, and opaque
//! host objects the bridge only passes along.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::gil::Gil;
use crate::handle::StaleReferenceError;
use crate::import::RootModule;
use crate::tree::{MemberProxy, NamespaceModule, TypeProxy};
use crate::BridgeError;

/// A value exchanged with the host interpreter
#[derive(Clone)]
pub enum HostValue {
    /// The host's none value
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// String
    Str(Arc<str>),
    /// Tuple
    Tuple(Arc<[HostValue]>),
    /// A namespace module from the tree
    Namespace(Arc<NamespaceModule>),
    /// The bridge's reserved root module
    Root(Arc<RootModule>),
    /// Proxy for a foreign type
    Type(Arc<TypeProxy>),
    /// Proxy for a foreign method group, field, property or event
    Member(Arc<MemberProxy>),
    /// A host object the bridge does not interpret
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl HostValue {
    /// Create a string value
    pub fn str(value: &str) -> Self {
        HostValue::Str(Arc::from(value))
    }

    /// Create a tuple of strings
    pub fn str_tuple(items: &[&str]) -> Self {
        HostValue::Tuple(items.iter().map(|item| HostValue::str(item)).collect())
    }

    /// Get the string value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the namespace module, if this is one
    pub fn as_namespace(&self) -> Option<&Arc<NamespaceModule>> {
        match self {
            HostValue::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    /// Get the root module, if this is it
    pub fn as_root(&self) -> Option<&Arc<RootModule>> {
        match self {
            HostValue::Root(root) => Some(root),
            _ => None,
        }
    }

    /// Get the type proxy, if this is one
    pub fn as_type(&self) -> Option<&Arc<TypeProxy>> {
        match self {
            HostValue::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Check if this is the none value
    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }

    /// Host truthiness for the values the import protocol inspects
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::None => false,
            HostValue::Bool(b) => *b,
            HostValue::Int(i) => *i != 0,
            HostValue::Str(s) => !s.is_empty(),
            HostValue::Tuple(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Identity comparison for reference values, equality for plain values
    pub fn is_same(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::None, HostValue::None) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Tuple(a), HostValue::Tuple(b)) => Arc::ptr_eq(a, b),
            (HostValue::Namespace(a), HostValue::Namespace(b)) => Arc::ptr_eq(a, b),
            (HostValue::Root(a), HostValue::Root(b)) => Arc::ptr_eq(a, b),
            (HostValue::Type(a), HostValue::Type(b)) => Arc::ptr_eq(a, b),
            (HostValue::Member(a), HostValue::Member(b)) => Arc::ptr_eq(a, b),
            (HostValue::Opaque(a), HostValue::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Short name of the value's kind, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::None => "none",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Str(_) => "str",
            HostValue::Tuple(_) => "tuple",
            HostValue::Namespace(_) | HostValue::Root(_) => "module",
            HostValue::Type(_) => "type",
            HostValue::Member(_) => "member",
            HostValue::Opaque(_) => "object",
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => write!(f, "None"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Int(i) => write!(f, "{}", i),
            HostValue::Str(s) => write!(f, "{:?}", s),
            HostValue::Tuple(items) => f.debug_list().entries(items.iter()).finish(),
            HostValue::Namespace(ns) => write!(f, "<module '{}'>", ns.module_name()),
            HostValue::Root(root) => write!(f, "<module '{}'>", root.name()),
            HostValue::Type(ty) => write!(f, "<type '{}'>", ty.name()),
            HostValue::Member(member) => write!(f, "<member '{}'>", member.qualified_name()),
            HostValue::Opaque(_) => write!(f, "<object>"),
        }
    }
}

/// Category of a host-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    /// No module with that name
    ModuleNotFound,
    /// Other import failure
    Import,
    /// Malformed arguments
    Type,
    /// Missing attribute
    Attribute,
    /// Access to a foreign entity that did not survive a reload
    Stale,
    /// Anything else
    Other,
}

impl fmt::Display for HostErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostErrorKind::ModuleNotFound => "ModuleNotFoundError",
            HostErrorKind::Import => "ImportError",
            HostErrorKind::Type => "TypeError",
            HostErrorKind::Attribute => "AttributeError",
            HostErrorKind::Stale => "StaleReferenceError",
            HostErrorKind::Other => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// An exception raised into (or by) the host interpreter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct HostError {
    /// Error category
    pub kind: HostErrorKind,
    /// Message shown to host code
    pub message: String,
}

impl HostError {
    /// Create an error of the given kind
    pub fn new(kind: HostErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The error the host raises when a module cannot be found
    pub fn module_not_found(name: &str) -> Self {
        Self::new(
            HostErrorKind::ModuleNotFound,
            format!("No module named '{}'", name),
        )
    }

    /// Malformed-argument error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Type, message)
    }

    /// Check if this error means "not found" to the import machinery
    ///
    /// True for module-not-found and for generic import errors, mirroring
    /// hosts where the former is a subclass of the latter.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, HostErrorKind::ModuleNotFound | HostErrorKind::Import)
    }
}

impl From<StaleReferenceError> for HostError {
    fn from(err: StaleReferenceError) -> Self {
        HostError::new(HostErrorKind::Stale, err.to_string())
    }
}

impl From<BridgeError> for HostError {
    fn from(err: BridgeError) -> Self {
        let kind = match &err {
            BridgeError::NotAModule(_) => HostErrorKind::Import,
            BridgeError::AttributeNotFound { .. } => HostErrorKind::Attribute,
            BridgeError::StaleReference(_) => HostErrorKind::Stale,
            _ => HostErrorKind::Other,
        };
        HostError::new(kind, err.to_string())
    }
}

/// The host's dotted-name import entry point
///
/// Takes the positional arguments of an import call: name, globals, locals,
/// from-list and level, of which only the name is required.
pub type ImportFn = Arc<dyn Fn(&[HostValue]) -> Result<HostValue, HostError> + Send + Sync>;

/// Capabilities the bridge consumes from the host interpreter
pub trait HostInterpreter: Send + Sync {
    /// The host's global critical section
    fn gil(&self) -> &Gil;

    /// Look up a module in the host's module table
    fn module(&self, name: &str) -> Option<HostValue>;

    /// Register a module in the host's module table
    fn set_module(&self, name: &str, module: HostValue);

    /// The currently installed import entry point
    fn import_function(&self) -> ImportFn;

    /// Replace the import entry point
    fn set_import_function(&self, import: ImportFn);

    /// Whether the host runs an interactive session
    fn is_interactive(&self) -> bool {
        false
    }

    /// Register a callback run synchronously at interpreter shutdown
    fn register_at_exit(&self, callback: Box<dyn FnOnce() + Send>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!HostValue::None.is_truthy());
        assert!(!HostValue::str_tuple(&[]).is_truthy());
        assert!(HostValue::str_tuple(&["*"]).is_truthy());
        assert!(!HostValue::Int(0).is_truthy());
    }

    #[test]
    fn test_not_found_kinds() {
        assert!(HostError::module_not_found("json").is_not_found());
        assert!(HostError::new(HostErrorKind::Import, "boom").is_not_found());
        assert!(!HostError::type_error("bad").is_not_found());
    }

    #[test]
    fn test_error_message() {
        let err = HostError::module_not_found("Acme.Widgets.Gear");
        assert_eq!(
            err.to_string(),
            "ModuleNotFoundError: No module named 'Acme.Widgets.Gear'"
        );
    }

    #[test]
    fn test_bridge_error_conversion() {
        let err: HostError = BridgeError::AttributeNotFound {
            owner: "Acme".into(),
            name: "Nope".into(),
        }
        .into();
        assert_eq!(err.kind, HostErrorKind::Attribute);
    }
}
