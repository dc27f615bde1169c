//! In-memory collaborators
//!
//! [`InMemoryUniverse`] is a managed universe whose types are declared in
//! code, and [`InMemoryHost`] is a host interpreter with a module table, a
//! set of native modules and a replaceable import entry point. Together they
//! let the bridge run end to end without a real runtime on either side.
//!
//! ```rust,ignore
//! let universe = InMemoryUniverse::new();
//! universe
//!     .define_type("Acme.Widgets.Gear")
//!     .constructor(&[])
//!     .method("Spin", &["System.Int32"])
//!     .property("Size");
//! ```

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::gil::Gil;
use crate::host::{HostError, HostErrorKind, HostInterpreter, HostValue, ImportFn};
use crate::reflect::{
    ForeignMember, ForeignMethod, ForeignType, MemberKind, NamespaceEvents, ReflectionProvider,
    CONSTRUCTOR_NAME, NAMESPACE_SEPARATOR,
};

#[derive(Debug)]
struct TypeEntry {
    ty: ForeignType,
    methods: Vec<ForeignMethod>,
    members: Vec<ForeignMember>,
}

/// A managed universe declared in code
#[derive(Debug, Default)]
pub struct InMemoryUniverse {
    types: RwLock<BTreeMap<String, TypeEntry>>,
    events: NamespaceEvents,
    children_calls: AtomicUsize,
}

impl InMemoryUniverse {
    /// Create an empty universe
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a type, or reopen one already declared
    ///
    /// If the type's namespace is new, subscribers are notified after the
    /// type is in place.
    pub fn define_type(&self, full_name: &str) -> TypeDefinition<'_> {
        let ty = ForeignType::new(full_name);
        let new_namespace = {
            let mut types = self.types.write();
            let new_namespace = !ty.namespace().is_empty()
                && !types
                    .values()
                    .any(|entry| entry.ty.namespace() == ty.namespace());
            types.entry(full_name.to_string()).or_insert_with(|| TypeEntry {
                ty: ty.clone(),
                methods: Vec::new(),
                members: Vec::new(),
            });
            new_namespace
        };

        if new_namespace {
            self.events.publish(ty.namespace());
        }
        TypeDefinition { universe: self, ty }
    }

    /// Remove a type
    pub fn remove_type(&self, full_name: &str) -> bool {
        self.types.write().remove(full_name).is_some()
    }

    /// Number of `children` enumerations served so far
    pub fn children_calls(&self) -> usize {
        self.children_calls.load(Ordering::Relaxed)
    }

    fn with_entry(&self, ty: &ForeignType, f: impl FnOnce(&mut TypeEntry)) {
        if let Some(entry) = self.types.write().get_mut(ty.full_name()) {
            f(entry);
        }
    }
}

/// Builder returned by [`InMemoryUniverse::define_type`]
pub struct TypeDefinition<'a> {
    universe: &'a InMemoryUniverse,
    ty: ForeignType,
}

impl TypeDefinition<'_> {
    fn add_method(self, name: &str, parameter_types: &[&str], is_static: bool) -> Self {
        let method = ForeignMethod {
            declaring_type: self.ty.clone(),
            name: Arc::from(name),
            parameter_types: parameter_types.iter().map(|p| p.to_string()).collect(),
            is_static,
        };
        self.universe
            .with_entry(&self.ty, |entry| entry.methods.push(method));
        self
    }

    fn add_member(self, name: &str, kind: MemberKind) -> Self {
        let member = ForeignMember {
            declaring_type: self.ty.clone(),
            name: Arc::from(name),
            kind,
        };
        self.universe.with_entry(&self.ty, |entry| {
            entry.members.retain(|existing| &*existing.name != name);
            entry.members.push(member);
        });
        self
    }

    /// Add an instance method overload
    pub fn method(self, name: &str, parameter_types: &[&str]) -> Self {
        self.add_method(name, parameter_types, false)
    }

    /// Add a static method overload
    pub fn static_method(self, name: &str, parameter_types: &[&str]) -> Self {
        self.add_method(name, parameter_types, true)
    }

    /// Add a constructor overload
    pub fn constructor(self, parameter_types: &[&str]) -> Self {
        self.add_method(CONSTRUCTOR_NAME, parameter_types, false)
    }

    /// Add a field
    pub fn field(self, name: &str) -> Self {
        self.add_member(name, MemberKind::Field)
    }

    /// Add a property
    pub fn property(self, name: &str) -> Self {
        self.add_member(name, MemberKind::Property)
    }

    /// Add an event
    pub fn event(self, name: &str) -> Self {
        self.add_member(name, MemberKind::Event)
    }

    /// The declared type
    pub fn foreign_type(&self) -> &ForeignType {
        &self.ty
    }
}

impl ReflectionProvider for InMemoryUniverse {
    fn namespaces(&self) -> Vec<String> {
        let namespaces: BTreeSet<String> = self
            .types
            .read()
            .values()
            .map(|entry| entry.ty.namespace())
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .collect();
        namespaces.into_iter().collect()
    }

    fn children(&self, namespace: &str) -> Vec<String> {
        self.children_calls.fetch_add(1, Ordering::Relaxed);

        let mut names = BTreeSet::new();
        for entry in self.types.read().values() {
            let declared_in = entry.ty.namespace();
            if declared_in == namespace {
                names.insert(entry.ty.base_name().to_string());
                continue;
            }
            let rest = if namespace.is_empty() {
                Some(declared_in)
            } else {
                declared_in
                    .strip_prefix(namespace)
                    .and_then(|rest| rest.strip_prefix(NAMESPACE_SEPARATOR))
            };
            if let Some(segment) = rest.and_then(|rest| rest.split(NAMESPACE_SEPARATOR).next()) {
                if !segment.is_empty() {
                    names.insert(segment.to_string());
                }
            }
        }
        names.into_iter().collect()
    }

    fn lookup_type(&self, full_name: &str) -> Option<ForeignType> {
        self.types.read().get(full_name).map(|entry| entry.ty.clone())
    }

    fn generic_type_name(&self, namespace: &str, base_name: &str) -> Option<String> {
        self.types
            .read()
            .values()
            .map(|entry| &entry.ty)
            .find(|ty| ty.is_generic() && ty.namespace() == namespace && ty.base_name() == base_name)
            .map(|ty| ty.full_name().to_string())
    }

    fn methods(&self, declaring_type: &ForeignType, name: &str) -> Vec<ForeignMethod> {
        self.types
            .read()
            .get(declaring_type.full_name())
            .map(|entry| {
                entry
                    .methods
                    .iter()
                    .filter(|method| &*method.name == name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn member(&self, declaring_type: &ForeignType, name: &str) -> Option<ForeignMember> {
        self.types
            .read()
            .get(declaring_type.full_name())?
            .members
            .iter()
            .find(|member| &*member.name == name)
            .cloned()
    }

    fn events(&self) -> &NamespaceEvents {
        &self.events
    }
}

/// A module provided by the host itself rather than the bridge
#[derive(Debug)]
pub struct NativeModule {
    /// Module name
    pub name: String,
}

/// A host interpreter with a module table and a replaceable import
pub struct InMemoryHost {
    gil: Gil,
    modules: RwLock<FxHashMap<String, HostValue>>,
    native: RwLock<FxHashSet<String>>,
    import: RwLock<ImportFn>,
    interactive: AtomicBool,
    at_exit: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl InMemoryHost {
    /// Create a host whose import knows only its module table and native
    /// modules
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<InMemoryHost>| {
            let weak = weak.clone();
            let import: ImportFn = Arc::new(move |args: &[HostValue]| match weak.upgrade() {
                Some(host) => host.builtin_import(args),
                None => Err(HostError::new(HostErrorKind::Other, "interpreter has exited")),
            });
            Self {
                gil: Gil::new(),
                modules: RwLock::new(FxHashMap::default()),
                native: RwLock::new(FxHashSet::default()),
                import: RwLock::new(import),
                interactive: AtomicBool::new(false),
                at_exit: Mutex::new(Vec::new()),
            }
        })
    }

    /// The host's own import: module table first, then native modules
    ///
    /// Without a from-list the top-level module is returned.
    fn builtin_import(&self, args: &[HostValue]) -> Result<HostValue, HostError> {
        let name = args
            .first()
            .and_then(HostValue::as_str)
            .ok_or_else(|| HostError::type_error("module name must be str"))?;
        let has_from_list = args.get(3).is_some_and(HostValue::is_truthy);
        let top = name.split(NAMESPACE_SEPARATOR).next().unwrap_or(name);

        if self.modules.read().contains_key(name) {
            let lookup = if has_from_list { name } else { top };
            return self
                .module(lookup)
                .ok_or_else(|| HostError::module_not_found(lookup));
        }

        if !name.is_empty() && self.native.read().contains(name) {
            let mut prefix = String::new();
            for segment in name.split(NAMESPACE_SEPARATOR) {
                if !prefix.is_empty() {
                    prefix.push(NAMESPACE_SEPARATOR);
                }
                prefix.push_str(segment);
                let module = HostValue::Opaque(Arc::new(NativeModule {
                    name: prefix.clone(),
                }));
                self.modules
                    .write()
                    .entry(prefix.clone())
                    .or_insert(module);
            }
            let lookup = if has_from_list { name } else { top };
            return self
                .module(lookup)
                .ok_or_else(|| HostError::module_not_found(lookup));
        }

        Err(HostError::module_not_found(name))
    }

    /// Make a module importable by the host's own import
    pub fn add_native_module(&self, name: &str) {
        self.native.write().insert(name.to_string());
    }

    /// `import name`
    pub fn import(&self, name: &str) -> Result<HostValue, HostError> {
        self.call_import(&[HostValue::str(name)])
    }

    /// `from name import a, b`
    pub fn import_from(&self, name: &str, from_list: &[&str]) -> Result<HostValue, HostError> {
        self.call_import(&[
            HostValue::str(name),
            HostValue::None,
            HostValue::None,
            HostValue::str_tuple(from_list),
            HostValue::Int(0),
        ])
    }

    /// Call the currently installed import entry point
    pub fn call_import(&self, args: &[HostValue]) -> Result<HostValue, HostError> {
        let import = self.import.read().clone();
        import(args)
    }

    /// Mark the session as interactive or not
    pub fn set_interactive(&self, interactive: bool) {
        self.interactive.store(interactive, Ordering::Relaxed);
    }

    /// Run every registered at-exit callback, most recent first
    pub fn run_at_exit(&self) {
        let callbacks: Vec<_> = self.at_exit.lock().drain(..).collect();
        for callback in callbacks.into_iter().rev() {
            callback();
        }
    }

    /// Number of registered at-exit callbacks
    pub fn at_exit_count(&self) -> usize {
        self.at_exit.lock().len()
    }

    /// Names in the module table, sorted
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.modules.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a module from the module table
    pub fn remove_module(&self, name: &str) -> Option<HostValue> {
        self.modules.write().remove(name)
    }
}

impl HostInterpreter for InMemoryHost {
    fn gil(&self) -> &Gil {
        &self.gil
    }

    fn module(&self, name: &str) -> Option<HostValue> {
        self.modules.read().get(name).cloned()
    }

    fn set_module(&self, name: &str, module: HostValue) {
        self.modules.write().insert(name.to_string(), module);
    }

    fn import_function(&self) -> ImportFn {
        self.import.read().clone()
    }

    fn set_import_function(&self, import: ImportFn) {
        *self.import.write() = import;
    }

    fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::Relaxed)
    }

    fn register_at_exit(&self, callback: Box<dyn FnOnce() + Send>) {
        self.at_exit.lock().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_lists_types_and_segments() {
        let universe = InMemoryUniverse::new();
        universe.define_type("Acme.Widgets.Gear");
        universe.define_type("Acme.Widgets.Parts.Bolt");
        universe.define_type("Acme.Collections.Bag`1");
        universe.define_type("Acme.Root");
        universe.define_type("Globals");

        assert_eq!(universe.children("Acme"), vec!["Collections", "Root", "Widgets"]);
        assert_eq!(universe.children("Acme.Widgets"), vec!["Gear", "Parts"]);
        assert_eq!(universe.children("Acme.Collections"), vec!["Bag"]);
        assert_eq!(universe.children(""), vec!["Acme", "Globals"]);
        assert_eq!(universe.children_calls(), 4);
    }

    #[test]
    fn test_namespaces() {
        let universe = InMemoryUniverse::new();
        universe.define_type("Acme.Widgets.Gear");
        universe.define_type("Acme.Widgets.Sprocket");
        universe.define_type("System.String");
        universe.define_type("Globals");
        assert_eq!(universe.namespaces(), vec!["Acme.Widgets", "System"]);
    }

    #[test]
    fn test_generic_type_name() {
        let universe = InMemoryUniverse::new();
        universe.define_type("Acme.Collections.Bag`1");
        assert_eq!(
            universe.generic_type_name("Acme.Collections", "Bag"),
            Some("Acme.Collections.Bag`1".to_string())
        );
        assert_eq!(universe.generic_type_name("Acme", "Bag"), None);
    }

    #[test]
    fn test_new_namespace_is_published() {
        let universe = InMemoryUniverse::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = universe
            .events()
            .subscribe(move |ns| sink.lock().push(ns.to_string()));

        universe.define_type("Acme.Widgets.Gear");
        universe.define_type("Acme.Widgets.Sprocket");
        universe.define_type("Acme.Tools.Wrench");
        assert_eq!(*seen.lock(), vec!["Acme.Widgets", "Acme.Tools"]);
    }

    #[test]
    fn test_members() {
        let universe = InMemoryUniverse::new();
        let gear = universe
            .define_type("Acme.Widgets.Gear")
            .method("Spin", &["System.Int32"])
            .property("Size")
            .foreign_type()
            .clone();

        assert_eq!(universe.methods(&gear, "Spin").len(), 1);
        assert!(universe.methods(&gear, "Size").is_empty());
        assert_eq!(universe.member(&gear, "Size").unwrap().kind, MemberKind::Property);
        assert!(universe.member(&gear, "Spin").is_none());
    }

    #[test]
    fn test_host_import() {
        let host = InMemoryHost::new();
        host.add_native_module("os.path");

        let os = host.import("os.path").unwrap();
        assert!(matches!(os, HostValue::Opaque(_)));
        assert_eq!(host.module_names(), vec!["os", "os.path"]);

        let path = host.import_from("os.path", &["join"]).unwrap();
        assert!(path.is_same(&host.module("os.path").unwrap()));

        let err = host.import("Acme").unwrap_err();
        assert_eq!(err, HostError::module_not_found("Acme"));
    }

    #[test]
    fn test_at_exit_runs_once() {
        let host = InMemoryHost::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        host.register_at_exit(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        host.run_at_exit();
        host.run_at_exit();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
