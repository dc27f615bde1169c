//! The bridge's reserved root module
//!
//! Host code imports the root module by its reserved name (`clr` by default).
//! Its attributes are a copy of the tree root's children, refreshed on every
//! import of the root name, plus whatever the host assigned to it. Lookups
//! that miss the copy fall through to the tree root.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::host::{HostInterpreter, HostValue};
use crate::tree::{NamespaceModule, PreloadSwitch, TreeContext};
use crate::BridgeResult;

/// Host-visible root module
pub struct RootModule {
    name: Arc<str>,
    tree: Arc<NamespaceModule>,
    attrs: RwLock<FxHashMap<String, HostValue>>,
    preload: Arc<PreloadSwitch>,
    attached: AtomicBool,
}

impl RootModule {
    /// Create the root module over a tree root
    pub fn new(name: &str, tree: Arc<NamespaceModule>, preload: Arc<PreloadSwitch>) -> Arc<Self> {
        Arc::new(Self {
            name: Arc::from(name),
            tree,
            attrs: RwLock::new(FxHashMap::default()),
            preload,
            attached: AtomicBool::new(false),
        })
    }

    /// Reserved module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tree root behind this module
    pub fn tree(&self) -> &Arc<NamespaceModule> {
        &self.tree
    }

    /// The preload switch this module controls
    pub fn preload_switch(&self) -> &Arc<PreloadSwitch> {
        &self.preload
    }

    /// Check if a running bridge currently serves this module
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Mark the module as served by a bridge
    ///
    /// # Returns
    /// * `true` - The module was free and is now attached
    /// * `false` - Another bridge still serves it
    pub(crate) fn attach(&self) -> bool {
        self.attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the module at bridge shutdown
    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    /// Whether namespaces are enumerated as soon as they are resolved
    pub fn preload(&self, host: &dyn HostInterpreter) -> bool {
        self.preload.is_enabled(host)
    }

    /// Turn preload mode on or off for subsequent resolutions
    pub fn set_preload(&self, enabled: bool) {
        tracing::debug!(enabled, "preload mode set");
        self.preload.set(enabled);
    }

    /// Attribute access from the host
    pub fn get_attr(&self, ctx: &TreeContext<'_>, name: &str) -> BridgeResult<HostValue> {
        if let Some(value) = self.attrs.read().get(name) {
            return Ok(value.clone());
        }
        self.tree.get_attr(ctx, name)
    }

    /// Attribute assignment from the host
    pub fn set_attr(&self, name: &str, value: HostValue) {
        self.attrs.write().insert(name.to_string(), value);
    }

    /// Check if the module's own attributes contain `name`
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.read().contains_key(name)
    }

    /// Every exposed name, sorted
    pub fn dir(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.attrs.read().keys().cloned().collect();
        names.extend(self.tree.dir());
        names.into_iter().collect()
    }

    /// Bring the exposed attributes up to date with the tree root
    ///
    /// Enumerates the tree root, copies every child into this module's
    /// attributes, then resolves each explicitly requested name that is still
    /// missing.
    pub fn refresh(&self, ctx: &TreeContext<'_>, from_list: Option<&[String]>) {
        self.tree.load_names(ctx);

        let mut attrs = self.attrs.write();
        for (name, binding) in self.tree.children() {
            attrs.insert(name, binding.to_host_value());
        }

        for name in from_list.unwrap_or_default() {
            if attrs.contains_key(name) {
                continue;
            }
            if let Some(binding) = self.tree.resolve(ctx, name, true) {
                attrs.insert(name.clone(), binding.to_host_value());
            }
        }
        tracing::trace!(module = %self.name, count = attrs.len(), "root module refreshed");
    }
}

impl fmt::Debug for RootModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootModule")
            .field("name", &self.name)
            .field("attrs", &self.attrs.read().len())
            .field("attached", &self.is_attached())
            .finish()
    }
}
