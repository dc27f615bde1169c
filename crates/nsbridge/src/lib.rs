//! Namespace bridge between a host interpreter and a managed object universe
//!
//! This crate provides the import-time plumbing that exposes a reflected
//! object universe (namespaces, types, methods) to a dynamic host interpreter:
//! - Deferred-failure handles to foreign reflection metadata (`handle`)
//! - A registry of namespaces known to the managed universe (`registry`)
//! - A lazy tree of namespace modules materialized on first access (`tree`)
//! - An import dispatcher that consults the tree when the host's own import
//!   fails (`import`)
//! - Capture and restore of the bridge's root state across a hot reload of
//!   the managed universe (`state`)
//!
//! # Example
//!
//! ```rust,ignore
//! use nsbridge::{Bridge, BridgeOptions};
//! use nsbridge::memory::{InMemoryHost, InMemoryUniverse};
//!
//! let universe = Arc::new(InMemoryUniverse::new());
//! universe.define_type("Acme.Widgets.Gear").method("Spin", &["System.Int32"]);
//!
//! let host = InMemoryHost::new();
//! let bridge = Bridge::initialize(BridgeOptions::default(), universe, host.clone())?;
//!
//! // Falls through the host's own import, then walks the namespace tree
//! let acme = host.import("Acme.Widgets")?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod gil;
pub mod handle;
pub mod host;
pub mod import;
pub mod memory;
pub mod options;
pub mod reflect;
pub mod registry;
pub mod state;
pub mod tree;

pub use bridge::Bridge;
pub use gil::{Gil, GilGuard};
pub use handle::{
    CapturedIdentity, Deferred, MaybeMember, MaybeMethod, MaybeType, RehydrateError,
    StaleReferenceError,
};
pub use host::{HostError, HostErrorKind, HostInterpreter, HostValue, ImportFn};
pub use import::{DottedName, ImportCall, ImportDispatcher, RootModule};
pub use options::{BridgeOptions, OptionsError, PreloadMode};
pub use reflect::{
    ForeignMember, ForeignMethod, ForeignType, MemberKind, NamespaceEvents, ReflectionProvider,
    Subscription,
};
pub use registry::NamespaceRegistry;
pub use state::{ReloadReport, StateBag, StateEntry};
pub use tree::{Binding, MemberProxy, MemberTarget, NamespaceModule, TreeContext, TypeProxy};

/// Bridge errors
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A dotted segment resolved to something that is not a namespace
    #[error("'{0}' is not a namespace module")]
    NotAModule(String),

    /// Attribute lookup failed on a namespace, root module or type
    #[error("'{owner}' has no attribute '{name}'")]
    AttributeNotFound {
        /// Name of the object the lookup ran against
        owner: String,
        /// Requested attribute
        name: String,
    },

    /// Access to a handle whose entity did not survive a reload
    #[error(transparent)]
    StaleReference(#[from] StaleReferenceError),

    /// Attempt to wrap an entity that does not exist
    #[error("Cannot wrap an absent {0}")]
    AbsentEntity(&'static str),

    /// The bridge was used after shutdown
    #[error("Bridge has been shut down")]
    ShutDown,

    /// A required key is missing from a state bag
    #[error("Missing state entry: {key}")]
    MissingState {
        /// The missing key
        key: String,
    },

    /// Restored state entries do not belong together
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// A handle identity could not be encoded into or decoded from a state bag
    #[error("Failed to encode handle state: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Invalid configuration
    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// Bridge result
pub type BridgeResult<T> = Result<T, BridgeError>;
