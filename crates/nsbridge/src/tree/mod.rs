//! Lazy namespace/module tree
//!
//! ```text
//! NamespaceModule ("clr", namespace "")
//!   ├── Acme            NamespaceModule
//!   │    └── Widgets    NamespaceModule
//!   │         └── Gear  TypeProxy ── MaybeType
//!   │                     └── Spin  MemberProxy ── [MaybeMethod]
//!   └── System          NamespaceModule
//! ```
//!
//! Nodes are created on first traversal. In just-in-time mode only the
//! requested segment is resolved; in preload mode every direct child of a
//! resolved namespace is materialized immediately.

mod context;
mod namespace;
mod type_proxy;

pub use context::{PreloadSwitch, TreeContext};
pub use namespace::{Binding, NamespaceModule};
pub use type_proxy::{MemberProxy, MemberTarget, TypeProxy};
