//! Bridge lifecycle
//!
//! A [`Bridge`] owns everything one embedding needs: the namespace registry
//! and its subscription, the tree root and root module, and the installed
//! import hook. Nothing is global, so several bridges can run side by side
//! against separate hosts.
//!
//! ```text
//! initialize ──► running ──save──► (bag) ──shutdown──► shut down
//!                   ▲                                       │
//!                   └──────────── restore(bag) ◄────────────┘
//! ```

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::host::{HostInterpreter, HostValue, ImportFn};
use crate::import::{ImportDispatcher, RootModule};
use crate::options::BridgeOptions;
use crate::reflect::{ReflectionProvider, Subscription};
use crate::registry::NamespaceRegistry;
use crate::state::{self, ReloadReport, StateBag, StateEntry, ROOT_MODULE_KEY, ROOT_NODE_KEY};
use crate::tree::{NamespaceModule, PreloadSwitch, TreeContext};
use crate::{BridgeError, BridgeResult};

struct RootState {
    node: Arc<NamespaceModule>,
    module: Arc<RootModule>,
}

/// Process-scoped bridge context
pub struct Bridge {
    options: BridgeOptions,
    provider: Arc<dyn ReflectionProvider>,
    host: Arc<dyn HostInterpreter>,
    registry: Arc<NamespaceRegistry>,
    dispatcher: ImportDispatcher,
    subscription: Mutex<Option<Subscription>>,
    root: RwLock<Option<RootState>>,
    running: AtomicBool,
    reload_report: Option<ReloadReport>,
}

impl Bridge {
    /// Start a bridge with a fresh tree
    ///
    /// Populates the registry, subscribes to namespace notifications,
    /// installs the import hook and registers an at-exit shutdown.
    pub fn initialize(
        options: BridgeOptions,
        provider: Arc<dyn ReflectionProvider>,
        host: Arc<dyn HostInterpreter>,
    ) -> BridgeResult<Arc<Self>> {
        options.validate()?;

        let node = NamespaceModule::root(&options.root_name);
        let preload = Arc::new(PreloadSwitch::new(options.preload));
        let module = RootModule::new(&options.root_name, node.clone(), preload);
        module.attach();

        let bridge = Self::assemble(options, provider, host, RootState { node, module }, None);
        bridge.start();
        tracing::info!(root = %bridge.options.root_name, namespaces = bridge.registry.len(), "bridge initialized");
        Ok(bridge)
    }

    /// Start a bridge over the root state saved by a previous one
    ///
    /// The saved tree root and root module are adopted as they are, so host
    /// references to them stay valid. Every cached handle is rehydrated
    /// against `provider`; the ones that cannot be found go dead.
    ///
    /// The bridge that saved the bag must be shut down first; restoring a
    /// root module another bridge still serves fails with
    /// [`BridgeError::InconsistentState`].
    pub fn restore(
        options: BridgeOptions,
        provider: Arc<dyn ReflectionProvider>,
        host: Arc<dyn HostInterpreter>,
        bag: &StateBag,
    ) -> BridgeResult<Arc<Self>> {
        options.validate()?;

        let node = bag.node(ROOT_NODE_KEY)?;
        let module = bag.module(ROOT_MODULE_KEY)?;
        if !Arc::ptr_eq(module.tree(), &node) {
            return Err(BridgeError::InconsistentState(
                "root module does not wrap the saved tree root".to_string(),
            ));
        }
        if module.name() != options.root_name {
            return Err(BridgeError::InconsistentState(format!(
                "saved root module is '{}', options name '{}'",
                module.name(),
                options.root_name
            )));
        }
        if !module.attach() {
            return Err(BridgeError::InconsistentState(format!(
                "root module '{}' is still served by a running bridge",
                module.name()
            )));
        }

        let report = {
            let _gil = host.gil().acquire();
            state::rehydrate_handles(&node, bag, provider.as_ref())
        };

        let bridge = Self::assemble(
            options,
            provider,
            host,
            RootState { node, module },
            Some(report),
        );
        bridge.start();
        if let Some(report) = &bridge.reload_report {
            tracing::info!(live = report.live, dead = report.dead.len(), "bridge restored");
        }
        Ok(bridge)
    }

    fn assemble(
        options: BridgeOptions,
        provider: Arc<dyn ReflectionProvider>,
        host: Arc<dyn HostInterpreter>,
        root: RootState,
        reload_report: Option<ReloadReport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            options,
            provider,
            host,
            registry: Arc::new(NamespaceRegistry::new()),
            dispatcher: ImportDispatcher::new(),
            subscription: Mutex::new(None),
            root: RwLock::new(Some(root)),
            running: AtomicBool::new(false),
            reload_report,
        })
    }

    fn start(self: &Arc<Self>) {
        let _gil = self.host.gil().acquire();

        // Namespaces published while the registry is being populated are
        // delivered once the critical section is released
        let weak = Arc::downgrade(self);
        let subscription = self.provider.events().subscribe(move |namespace| {
            let Some(bridge) = weak.upgrade() else {
                return;
            };
            let _gil = bridge.host.gil().acquire();
            if bridge.registry.notify_added(namespace) {
                if let Some(node) = bridge.root_node() {
                    node.invalidate_path(namespace);
                }
            }
        });
        self.registry.populate(self.provider.namespaces());
        *self.subscription.lock() = Some(subscription);

        let original = self.host.import_function();
        let fallback = original.clone();
        let weak = Arc::downgrade(self);
        let hook: ImportFn = Arc::new(move |args: &[HostValue]| match weak.upgrade() {
            Some(bridge) => bridge.dispatcher.dispatch(&bridge, args),
            None => fallback(args),
        });
        self.dispatcher.install(self.host.as_ref(), original, hook);

        if let Some(module) = self.root_module() {
            self.host
                .set_module(&self.options.root_name, HostValue::Root(module));
        }

        let weak = Arc::downgrade(self);
        self.host.register_at_exit(Box::new(move || {
            if let Some(bridge) = weak.upgrade() {
                bridge.shutdown();
            }
        }));

        self.running.store(true, Ordering::Release);
    }

    /// Stop the bridge
    ///
    /// Unsubscribes from namespace notifications before the registry is
    /// torn down, restores the original import entry point and releases the
    /// tree. A second call does nothing.
    pub fn shutdown(&self) {
        let _gil = self.host.gil().acquire();
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(mut subscription) = self.subscription.lock().take() {
            subscription.cancel();
        }
        self.registry.teardown();
        self.dispatcher.uninstall(self.host.as_ref());
        if let Some(root) = self.root.write().take() {
            root.module.detach();
        }

        tracing::info!(root = %self.options.root_name, "bridge shut down");
    }

    /// Store the root state and every cached handle identity in `bag`
    ///
    /// The bag shares ownership of the tree root and root module, so they
    /// outlive the shutdown that normally follows.
    pub fn save(&self, bag: &mut StateBag) -> BridgeResult<()> {
        let _gil = self.host.gil().acquire();
        let root = self.root.read();
        let state = root.as_ref().ok_or(BridgeError::ShutDown)?;

        bag.insert(ROOT_NODE_KEY, StateEntry::Node(state.node.clone()));
        bag.insert(ROOT_MODULE_KEY, StateEntry::Module(state.module.clone()));
        let handles = state::capture_handles(&state.node, bag)?;

        tracing::info!(handles, "bridge state saved");
        Ok(())
    }

    /// Attribute access on a bridge object, as the host performs it
    pub fn getattr(&self, target: &HostValue, name: &str) -> BridgeResult<HostValue> {
        let _gil = self.host.gil().acquire();
        let ctx = self.tree_context();
        match target {
            HostValue::Namespace(ns) => ns.get_attr(&ctx, name),
            HostValue::Root(module) => module.get_attr(&ctx, name),
            HostValue::Type(ty) => ty
                .member(self.provider.as_ref(), name)
                .map(HostValue::Member),
            other => Err(BridgeError::AttributeNotFound {
                owner: other.type_name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Resolution context over this bridge's collaborators
    pub fn tree_context(&self) -> TreeContext<'_> {
        TreeContext::new(self.provider.as_ref(), self.registry.as_ref(), self.preload())
    }

    /// Whether namespaces are enumerated as soon as they are resolved
    pub fn preload(&self) -> bool {
        self.root_module()
            .map(|module| module.preload(self.host.as_ref()))
            .unwrap_or(false)
    }

    /// Turn preload mode on or off
    pub fn set_preload(&self, enabled: bool) -> BridgeResult<()> {
        let module = self.root_module().ok_or(BridgeError::ShutDown)?;
        module.set_preload(enabled);
        Ok(())
    }

    /// Options the bridge was started with
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Reflection collaborator
    pub fn provider(&self) -> &Arc<dyn ReflectionProvider> {
        &self.provider
    }

    /// Host collaborator
    pub fn host(&self) -> &Arc<dyn HostInterpreter> {
        &self.host
    }

    /// Namespace registry
    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    /// Import dispatcher
    pub fn dispatcher(&self) -> &ImportDispatcher {
        &self.dispatcher
    }

    /// Tree root, until shutdown
    pub fn root_node(&self) -> Option<Arc<NamespaceModule>> {
        self.root.read().as_ref().map(|state| state.node.clone())
    }

    /// Root module, until shutdown
    pub fn root_module(&self) -> Option<Arc<RootModule>> {
        self.root.read().as_ref().map(|state| state.module.clone())
    }

    /// Check if the bridge is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Outcome of handle rehydration, for restored bridges
    pub fn reload_report(&self) -> Option<&ReloadReport> {
        self.reload_report.as_ref()
    }

    /// Check if the namespace subscription is active
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("root_name", &self.options.root_name)
            .field("running", &self.is_running())
            .field("namespaces", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryHost, InMemoryUniverse};
    use crate::options::PreloadMode;

    fn universe() -> Arc<InMemoryUniverse> {
        let universe = Arc::new(InMemoryUniverse::new());
        universe
            .define_type("Acme.Widgets.Gear")
            .method("Spin", &["System.Int32"]);
        universe
    }

    #[test]
    fn test_initialize_populates_and_installs() {
        let host = InMemoryHost::new();
        let bridge = Bridge::initialize(BridgeOptions::default(), universe(), host.clone()).unwrap();

        assert!(bridge.is_running());
        assert!(bridge.is_subscribed());
        assert!(bridge.registry().contains("Acme.Widgets"));
        assert!(bridge.dispatcher().is_installed());
        assert!(host.module("clr").unwrap().as_root().is_some());
        assert_eq!(host.at_exit_count(), 1);
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let options = BridgeOptions {
            root_name: String::new(),
            ..BridgeOptions::default()
        };
        let result = Bridge::initialize(options, universe(), InMemoryHost::new());
        assert!(matches!(result, Err(BridgeError::Options(_))));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let host = InMemoryHost::new();
        let bridge = Bridge::initialize(BridgeOptions::default(), universe(), host.clone()).unwrap();

        bridge.shutdown();
        bridge.shutdown();
        assert!(!bridge.is_running());
        assert!(!bridge.is_subscribed());
        assert!(bridge.registry().is_torn_down());
        assert!(bridge.root_node().is_none());
        assert!(matches!(bridge.save(&mut StateBag::new()), Err(BridgeError::ShutDown)));
    }

    #[test]
    fn test_at_exit_shuts_down() {
        let host = InMemoryHost::new();
        let bridge = Bridge::initialize(BridgeOptions::default(), universe(), host.clone()).unwrap();
        host.run_at_exit();
        assert!(!bridge.is_running());
    }

    #[test]
    fn test_new_namespace_reaches_registry() {
        let universe = universe();
        let host = InMemoryHost::new();
        let bridge =
            Bridge::initialize(BridgeOptions::default(), universe.clone(), host.clone()).unwrap();

        universe.define_type("Acme.Tools.Wrench");
        assert!(bridge.registry().contains("Acme.Tools"));
        assert!(host.import("Acme.Tools.Wrench").is_ok());
    }

    #[test]
    fn test_getattr() {
        let host = InMemoryHost::new();
        let bridge = Bridge::initialize(BridgeOptions::default(), universe(), host.clone()).unwrap();

        let acme = bridge.getattr(&host.import("clr").unwrap(), "Acme").unwrap();
        let widgets = bridge.getattr(&acme, "Widgets").unwrap();
        let gear = bridge.getattr(&widgets, "Gear").unwrap();
        let spin = bridge.getattr(&gear, "Spin").unwrap();
        assert!(matches!(spin, HostValue::Member(ref m) if m.is_method_group()));

        assert!(matches!(
            bridge.getattr(&HostValue::Int(1), "real"),
            Err(BridgeError::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn test_set_preload() {
        let host = InMemoryHost::new();
        let options = BridgeOptions::default().with_preload(PreloadMode::Disabled);
        let bridge = Bridge::initialize(options, universe(), host.clone()).unwrap();

        assert!(!bridge.preload());
        bridge.set_preload(true).unwrap();
        assert!(bridge.preload());
    }

    #[test]
    fn test_restore_rejects_mismatched_state() {
        let host = InMemoryHost::new();
        let mut bag = StateBag::new();
        assert!(matches!(
            Bridge::restore(BridgeOptions::default(), universe(), host.clone(), &bag),
            Err(BridgeError::MissingState { .. })
        ));

        let switch = Arc::new(PreloadSwitch::new(PreloadMode::Auto));
        bag.insert(ROOT_NODE_KEY, StateEntry::Node(NamespaceModule::root("clr")));
        bag.insert(
            ROOT_MODULE_KEY,
            StateEntry::Module(RootModule::new("clr", NamespaceModule::root("clr"), switch)),
        );
        assert!(matches!(
            Bridge::restore(BridgeOptions::default(), universe(), host, &bag),
            Err(BridgeError::InconsistentState(_))
        ));
    }

    #[test]
    fn test_restore_requires_shutdown() {
        let host = InMemoryHost::new();
        let bridge = Bridge::initialize(BridgeOptions::default(), universe(), host.clone()).unwrap();
        let mut bag = StateBag::new();
        bridge.save(&mut bag).unwrap();

        let result = Bridge::restore(BridgeOptions::default(), universe(), host.clone(), &bag);
        assert!(matches!(result, Err(BridgeError::InconsistentState(_))));
        assert!(bridge.is_running());
        assert!(bridge.root_module().unwrap().is_attached());

        bridge.shutdown();
        assert!(!bag.module(ROOT_MODULE_KEY).unwrap().is_attached());
        let restored = Bridge::restore(BridgeOptions::default(), universe(), host, &bag).unwrap();
        assert!(restored.root_module().unwrap().is_attached());
    }
}
