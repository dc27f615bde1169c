//! Captured identities and rehydration
//!
//! A captured identity is everything needed to find an entity again in a
//! freshly loaded universe: type name, declaring type, member name and the
//! exact parameter-type list. It is captured from the live value when the
//! handle is created, never later.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reflect::{ForeignMember, ForeignMethod, ForeignType, MemberKind, ReflectionProvider};

/// Why an entity could not be found again
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RehydrateError {
    /// The type no longer exists
    #[error("type {0} not found")]
    TypeNotFound(String),

    /// No overload with that name and parameter list exists
    #[error("no method {name}({}) on {declaring_type}", .parameter_types.join(", "))]
    MethodNotFound {
        /// Declaring type name
        declaring_type: String,
        /// Method name
        name: String,
        /// Parameter type names
        parameter_types: Vec<String>,
    },

    /// No member with that name and kind exists
    #[error("no {kind} {name} on {declaring_type}")]
    MemberNotFound {
        /// Declaring type name
        declaring_type: String,
        /// Member name
        name: String,
        /// Expected member kind
        kind: MemberKind,
    },

    /// The identity describes a different kind of entity
    #[error("identity {0} does not describe this kind of entity")]
    KindMismatch(String),
}

/// Persistable identity of a foreign entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum CapturedIdentity {
    /// A type, by full name
    Type {
        /// Namespace-qualified type name
        name: String,
    },
    /// A method overload
    Method {
        /// Declaring type name
        declaring_type: String,
        /// Method name
        name: String,
        /// Exact parameter type names
        parameter_types: Vec<String>,
    },
    /// A field, property or event
    Member {
        /// Declaring type name
        declaring_type: String,
        /// Member name
        name: String,
        /// Member kind
        kind: MemberKind,
    },
}

impl CapturedIdentity {
    /// Stable human-readable name of the captured entity
    pub fn display_name(&self) -> String {
        match self {
            CapturedIdentity::Type { name } => name.clone(),
            CapturedIdentity::Method {
                declaring_type,
                name,
                parameter_types,
            } => format!("{}.{}({})", declaring_type, name, parameter_types.join(", ")),
            CapturedIdentity::Member {
                declaring_type,
                name,
                ..
            } => format!("{}.{}", declaring_type, name),
        }
    }
}

/// Entities that can be captured and found again after a reload
pub trait Rehydrate: Sized {
    /// Short noun for error messages ("type", "method", "member")
    const ENTITY: &'static str;

    /// Capture the identity of a live value
    fn capture(&self) -> CapturedIdentity;

    /// Find the entity described by `identity` in the current universe
    fn rehydrate(
        identity: &CapturedIdentity,
        provider: &dyn ReflectionProvider,
    ) -> Result<Self, RehydrateError>;
}

fn resolve_type(name: &str, provider: &dyn ReflectionProvider) -> Result<ForeignType, RehydrateError> {
    provider
        .lookup_type(name)
        .ok_or_else(|| RehydrateError::TypeNotFound(name.to_string()))
}

impl Rehydrate for ForeignType {
    const ENTITY: &'static str = "type";

    fn capture(&self) -> CapturedIdentity {
        CapturedIdentity::Type {
            name: self.full_name().to_string(),
        }
    }

    fn rehydrate(
        identity: &CapturedIdentity,
        provider: &dyn ReflectionProvider,
    ) -> Result<Self, RehydrateError> {
        match identity {
            CapturedIdentity::Type { name } => resolve_type(name, provider),
            other => Err(RehydrateError::KindMismatch(other.display_name())),
        }
    }
}

impl Rehydrate for ForeignMethod {
    const ENTITY: &'static str = "method";

    fn capture(&self) -> CapturedIdentity {
        CapturedIdentity::Method {
            declaring_type: self.declaring_type.full_name().to_string(),
            name: self.name.to_string(),
            parameter_types: self.parameter_types.clone(),
        }
    }

    fn rehydrate(
        identity: &CapturedIdentity,
        provider: &dyn ReflectionProvider,
    ) -> Result<Self, RehydrateError> {
        let CapturedIdentity::Method {
            declaring_type,
            name,
            parameter_types,
        } = identity
        else {
            return Err(RehydrateError::KindMismatch(identity.display_name()));
        };

        let ty = resolve_type(declaring_type, provider)?;
        provider
            .methods(&ty, name)
            .into_iter()
            .find(|method| method.matches_parameters(parameter_types))
            .ok_or_else(|| RehydrateError::MethodNotFound {
                declaring_type: declaring_type.clone(),
                name: name.clone(),
                parameter_types: parameter_types.clone(),
            })
    }
}

impl Rehydrate for ForeignMember {
    const ENTITY: &'static str = "member";

    fn capture(&self) -> CapturedIdentity {
        CapturedIdentity::Member {
            declaring_type: self.declaring_type.full_name().to_string(),
            name: self.name.to_string(),
            kind: self.kind,
        }
    }

    fn rehydrate(
        identity: &CapturedIdentity,
        provider: &dyn ReflectionProvider,
    ) -> Result<Self, RehydrateError> {
        let CapturedIdentity::Member {
            declaring_type,
            name,
            kind,
        } = identity
        else {
            return Err(RehydrateError::KindMismatch(identity.display_name()));
        };

        let ty = resolve_type(declaring_type, provider)?;
        match provider.member(&ty, name) {
            Some(member) if member.kind == *kind => Ok(member),
            _ => Err(RehydrateError::MemberNotFound {
                declaring_type: declaring_type.clone(),
                name: name.clone(),
                kind: *kind,
            }),
        }
    }
}

/// Build a method identity without a live value
pub fn method_identity(
    declaring_type: &str,
    name: &str,
    parameter_types: &[&str],
) -> CapturedIdentity {
    CapturedIdentity::Method {
        declaring_type: declaring_type.to_string(),
        name: name.to_string(),
        parameter_types: parameter_types.iter().map(|p| p.to_string()).collect(),
    }
}
