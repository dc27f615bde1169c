//! Namespace modules
//!
//! One [`NamespaceModule`] exists per namespace segment that has been
//! traversed. Children are resolved on first access and memoized, so asking
//! for the same name twice returns the same `Arc`. The host sees these nodes
//! as modules and shares ownership of them through its module table.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::context::TreeContext;
use super::type_proxy::TypeProxy;
use crate::handle::MaybeType;
use crate::host::HostValue;
use crate::reflect::{qualify, NAMESPACE_SEPARATOR};
use crate::{BridgeError, BridgeResult};

/// Result of resolving a name under a namespace
#[derive(Clone)]
pub enum Binding {
    /// A nested namespace
    Namespace(Arc<NamespaceModule>),
    /// A type declared in the namespace
    Type(Arc<TypeProxy>),
}

impl Binding {
    /// Get the namespace, if this is one
    pub fn as_namespace(&self) -> Option<&Arc<NamespaceModule>> {
        match self {
            Binding::Namespace(ns) => Some(ns),
            Binding::Type(_) => None,
        }
    }

    /// Get the type proxy, if this is one
    pub fn as_type(&self) -> Option<&Arc<TypeProxy>> {
        match self {
            Binding::Type(ty) => Some(ty),
            Binding::Namespace(_) => None,
        }
    }

    /// Identity comparison
    pub fn is_same(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Namespace(a), Binding::Namespace(b)) => Arc::ptr_eq(a, b),
            (Binding::Type(a), Binding::Type(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The host-visible object for this binding
    pub fn to_host_value(&self) -> HostValue {
        match self {
            Binding::Namespace(ns) => HostValue::Namespace(ns.clone()),
            Binding::Type(ty) => HostValue::Type(ty.clone()),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Namespace(ns) => write!(f, "Namespace({})", ns.module_name()),
            Binding::Type(ty) => write!(f, "Type({})", ty.name()),
        }
    }
}

/// A lazily populated namespace node
pub struct NamespaceModule {
    /// Namespace in the managed universe (`""` for the root)
    namespace: Arc<str>,
    /// Name the host knows this module by
    module_name: Arc<str>,
    /// Back-reference only; the parent owns its children, not the reverse
    parent: Weak<NamespaceModule>,
    /// Memoized children; entries are never replaced once inserted
    children: RwLock<FxHashMap<Arc<str>, Binding>>,
    /// Attributes assigned by host code, which shadow tree resolution
    attrs: RwLock<FxHashMap<String, HostValue>>,
    names_loaded: AtomicBool,
}

impl NamespaceModule {
    /// Create a tree root exposed to the host under `module_name`
    pub fn root(module_name: &str) -> Arc<Self> {
        Arc::new(Self {
            namespace: Arc::from(""),
            module_name: Arc::from(module_name),
            parent: Weak::new(),
            children: RwLock::new(FxHashMap::default()),
            attrs: RwLock::new(FxHashMap::default()),
            names_loaded: AtomicBool::new(false),
        })
    }

    fn child(self: &Arc<Self>, name: &str) -> Arc<Self> {
        let namespace: Arc<str> = Arc::from(qualify(&self.namespace, name));
        Arc::new(Self {
            module_name: namespace.clone(),
            namespace,
            parent: Arc::downgrade(self),
            children: RwLock::new(FxHashMap::default()),
            attrs: RwLock::new(FxHashMap::default()),
            names_loaded: AtomicBool::new(false),
        })
    }

    /// Namespace in the managed universe
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of this module in the host's module table
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Parent node, if it is still alive
    pub fn parent(&self) -> Option<Arc<NamespaceModule>> {
        self.parent.upgrade()
    }

    /// Check if this is a tree root
    pub fn is_root(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Check if every child has been enumerated
    pub fn names_loaded(&self) -> bool {
        self.names_loaded.load(Ordering::Acquire)
    }

    /// Previously resolved child, without consulting reflection
    pub fn cached(&self, name: &str) -> Option<Binding> {
        self.children.read().get(name).cloned()
    }

    /// Snapshot of every resolved child, sorted by name
    pub fn children(&self) -> Vec<(String, Binding)> {
        let mut children: Vec<_> = self
            .children
            .read()
            .iter()
            .map(|(name, binding)| (name.to_string(), binding.clone()))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children
    }

    /// Number of resolved children
    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Resolve a simple name under this namespace
    ///
    /// A known namespace wins over a type of the same name. A bare generic
    /// base name falls back to the arity-qualified generic type.
    /// When `load_eagerly` is set and the result is a namespace, all of its
    /// direct children are materialized before returning.
    ///
    /// # Returns
    /// * `Some(Binding)` - The child; the same `Arc` on every call
    /// * `None` - Not part of the managed universe
    pub fn resolve(
        self: &Arc<Self>,
        ctx: &TreeContext<'_>,
        name: &str,
        load_eagerly: bool,
    ) -> Option<Binding> {
        if let Some(binding) = self.cached(name) {
            if load_eagerly {
                if let Binding::Namespace(ns) = &binding {
                    ns.load_names(ctx);
                }
            }
            return Some(binding);
        }

        if name.is_empty() || name.contains(NAMESPACE_SEPARATOR) {
            return None;
        }

        let qualified = qualify(&self.namespace, name);
        let binding = if ctx.registry.contains(&qualified) {
            Binding::Namespace(self.child(name))
        } else if let Some(ty) = ctx.provider.lookup_type(&qualified) {
            Binding::Type(TypeProxy::new(MaybeType::wrap(ty)))
        } else {
            let generic = ctx.provider.generic_type_name(&self.namespace, name)?;
            let ty = ctx.provider.lookup_type(&generic)?;
            Binding::Type(TypeProxy::new(MaybeType::wrap(ty)))
        };

        // Another thread may have raced us here; the first insertion wins
        let binding = self
            .children
            .write()
            .entry(Arc::from(name))
            .or_insert(binding)
            .clone();
        tracing::trace!(namespace = %self.namespace, name, ?binding, "resolved");

        if load_eagerly {
            if let Binding::Namespace(ns) = &binding {
                ns.load_names(ctx);
            }
        }
        Some(binding)
    }

    /// Materialize every direct child of this namespace
    ///
    /// Names already set as host attributes are left alone. A second call on
    /// a loaded node does nothing.
    pub fn load_names(self: &Arc<Self>, ctx: &TreeContext<'_>) {
        if self.names_loaded() {
            return;
        }

        let mut names: BTreeSet<String> = ctx.registry.child_segments(&self.namespace);
        names.extend(ctx.provider.children(&self.namespace));

        for name in &names {
            if self.children.read().contains_key(name.as_str()) {
                continue;
            }
            if self.attrs.read().contains_key(name) {
                continue;
            }
            self.resolve(ctx, name, false);
        }

        self.names_loaded.store(true, Ordering::Release);
        tracing::debug!(namespace = %self.namespace, count = self.child_count(), "names loaded");
    }

    /// Forget that children were enumerated, here and in every nested
    /// namespace already resolved
    pub(crate) fn invalidate_names(&self) {
        self.names_loaded.store(false, Ordering::Release);
        for (_, binding) in self.children() {
            if let Binding::Namespace(ns) = binding {
                ns.invalidate_names();
            }
        }
    }

    /// Forget that children were enumerated on this node and on every
    /// resolved namespace along `namespace`
    ///
    /// Called when newly loaded code adds `namespace`, so the next
    /// enumeration of any of its ancestors picks it up.
    pub(crate) fn invalidate_path(self: &Arc<Self>, namespace: &str) {
        let mut current = self.clone();
        current.names_loaded.store(false, Ordering::Release);

        for segment in namespace.split(NAMESPACE_SEPARATOR) {
            let Some(Binding::Namespace(next)) = current.cached(segment) else {
                return;
            };
            next.names_loaded.store(false, Ordering::Release);
            current = next;
        }
    }

    /// Attribute access from the host
    ///
    /// Host-assigned attributes shadow the tree.
    pub fn get_attr(self: &Arc<Self>, ctx: &TreeContext<'_>, name: &str) -> BridgeResult<HostValue> {
        if let Some(value) = self.attrs.read().get(name) {
            return Ok(value.clone());
        }
        self.resolve(ctx, name, ctx.preload)
            .map(|binding| binding.to_host_value())
            .ok_or_else(|| BridgeError::AttributeNotFound {
                owner: self.module_name.to_string(),
                name: name.to_string(),
            })
    }

    /// Attribute assignment from the host
    pub fn set_attr(&self, name: &str, value: HostValue) {
        self.attrs.write().insert(name.to_string(), value);
    }

    /// Every exposed name, sorted
    pub fn dir(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .children
            .read()
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.extend(self.attrs.read().keys().cloned());
        names.into_iter().collect()
    }

    /// Walk a dotted path below this node
    ///
    /// Every segment but the last must be a namespace.
    pub fn resolve_path(self: &Arc<Self>, ctx: &TreeContext<'_>, dotted: &str) -> BridgeResult<Binding> {
        let mut current = Binding::Namespace(self.clone());
        let mut walked = String::new();

        for segment in dotted.split(NAMESPACE_SEPARATOR) {
            let ns = match &current {
                Binding::Namespace(ns) => ns.clone(),
                Binding::Type(_) => return Err(BridgeError::NotAModule(walked)),
            };
            current = ns
                .resolve(ctx, segment, ctx.preload)
                .ok_or_else(|| BridgeError::AttributeNotFound {
                    owner: ns.module_name.to_string(),
                    name: segment.to_string(),
                })?;
            walked = qualify(&walked, segment);
        }

        Ok(current)
    }
}

impl fmt::Debug for NamespaceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceModule")
            .field("module_name", &self.module_name)
            .field("children", &self.child_count())
            .field("names_loaded", &self.names_loaded())
            .finish()
    }
}
