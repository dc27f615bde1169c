//! Import dispatcher
//!
//! Replaces the host's import entry point. Every request is handed to the
//! original entry point first; the namespace tree is consulted only when that
//! fails with "not found".
//!
//! ```text
//! import(name, globals, locals, fromlist, level)
//!   ├── name == root name ──► refresh root module ──► module table ──► return
//!   ├── original(...) ok ──► (wildcard? load names) ──► return
//!   ├── original(...) other error ──► propagate
//!   ├── empty name ──► original error
//!   ├── module table hit ──► tail (from-list) or head
//!   └── walk tree root → seg₁ → … → segₙ, registering each prefix
//!         ├── any miss ──► original error
//!         └── tail (from-list) or head
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

use super::args::ImportCall;
use super::dotted::DottedName;
use crate::bridge::Bridge;
use crate::host::{HostError, HostInterpreter, HostValue, ImportFn};
use crate::tree::{Binding, NamespaceModule, TreeContext};

/// Owner of the original import entry point while the hook is installed
#[derive(Default)]
pub struct ImportDispatcher {
    original: Mutex<Option<ImportFn>>,
}

impl ImportDispatcher {
    /// Create a dispatcher with nothing installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `hook` as the host's import entry point
    ///
    /// `original` is kept for fallback and restored by
    /// [`uninstall`](Self::uninstall). Installing twice keeps the first
    /// original.
    pub fn install(&self, host: &dyn HostInterpreter, original: ImportFn, hook: ImportFn) {
        let mut slot = self.original.lock();
        if slot.is_some() {
            tracing::warn!("import hook already installed");
            return;
        }
        *slot = Some(original);
        host.set_import_function(hook);
        tracing::debug!("import hook installed");
    }

    /// Restore the original import entry point
    pub fn uninstall(&self, host: &dyn HostInterpreter) {
        if let Some(original) = self.original.lock().take() {
            host.set_import_function(original);
            tracing::debug!("import hook removed");
        }
    }

    /// Check if the hook is installed
    pub fn is_installed(&self) -> bool {
        self.original.lock().is_some()
    }

    /// The entry point that was active before the hook
    pub fn original(&self) -> Option<ImportFn> {
        self.original.lock().clone()
    }

    /// Handle one import request
    ///
    /// Errors from the tree walk never reach the caller; a name that is not
    /// part of the managed universe fails with the original entry point's
    /// error.
    pub fn dispatch(&self, bridge: &Bridge, args: &[HostValue]) -> Result<HostValue, HostError> {
        let call = ImportCall::parse(args)?;
        let host = bridge.host();
        let _gil = host.gil().acquire();

        let Some(original) = self.original() else {
            return Err(HostError::module_not_found(&call.name));
        };
        let Some(root) = bridge.root_module() else {
            return original(args);
        };

        let options = bridge.options();
        let ctx = bridge.tree_context();
        let wildcard = call.is_wildcard(&options.wildcard);

        if call.name == options.root_name {
            root.refresh(&ctx, call.from_list.as_deref());
            let module = HostValue::Root(root);
            host.set_module(&options.root_name, module.clone());
            return Ok(module);
        }

        let original_err = match original(args) {
            Ok(value) => {
                if wildcard {
                    if let Some(ns) = value.as_namespace() {
                        ns.load_names(&ctx);
                    }
                }
                return Ok(value);
            }
            Err(err) if !err.is_not_found() => return Err(err),
            Err(err) => err,
        };

        let Some(dotted) = DottedName::parse(&call.name) else {
            return Err(original_err);
        };

        if let Some(existing) = host.module(dotted.full_name()) {
            if !call.has_from_list() {
                return host.module(dotted.top_level()).ok_or(original_err);
            }
            if wildcard {
                if let Some(ns) = existing.as_namespace() {
                    ns.load_names(&ctx);
                }
            }
            return Ok(existing);
        }

        // Only namespaces can have children
        if !dotted.is_simple() && !bridge.registry().contains(dotted.top_level()) {
            tracing::trace!(name = %dotted, "not a managed namespace");
            return Err(original_err);
        }

        let Some((head, tail)) = walk(host.as_ref(), &ctx, root.tree(), &dotted) else {
            tracing::trace!(name = %dotted, "not part of the managed universe");
            return Err(original_err);
        };
        tracing::debug!(name = %dotted, "import resolved from namespace tree");

        if !call.has_from_list() {
            return Ok(head);
        }
        if wildcard {
            if let Some(ns) = tail.as_namespace() {
                ns.load_names(&ctx);
            }
        }
        Ok(tail)
    }
}

/// Walk the tree one segment at a time, registering every prefix
///
/// Every segment but the last must be a namespace.
fn walk(
    host: &dyn HostInterpreter,
    ctx: &TreeContext<'_>,
    root: &Arc<NamespaceModule>,
    dotted: &DottedName,
) -> Option<(HostValue, HostValue)> {
    let last = dotted.depth() - 1;
    let mut current = root.clone();
    let mut head = None;
    let mut tail = None;

    for (depth, segment) in dotted.parts().iter().enumerate() {
        let binding = current.resolve(ctx, segment, ctx.preload)?;
        if depth != last && binding.as_namespace().is_none() {
            return None;
        }

        let value = binding.to_host_value();
        host.set_module(&dotted.name_at_depth(depth + 1), value.clone());
        head.get_or_insert_with(|| value.clone());
        tail = Some(value);

        if let Binding::Namespace(ns) = binding {
            current = ns;
        }
    }

    Some((head?, tail?))
}
