//! State snapshot and restore
//!
//! A [`StateBag`] carries the bridge's root state across a reload of the
//! managed universe. Two entries are required: the tree root and the root
//! module. Every cached handle adds one more entry holding its captured
//! identity as JSON, so it can be rehydrated without the original live
//! object.
//!
//! ```text
//! nsbridge.root                               Node(tree root)
//! nsbridge.module                             Module(root module)
//! nsbridge.handle:Acme.Widgets.Gear           {"entity":"type",...}
//! nsbridge.handle:Acme.Widgets.Gear::Spin     [{"entity":"method",...},...]
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::handle::CapturedIdentity;
use crate::import::RootModule;
use crate::reflect::ReflectionProvider;
use crate::tree::{Binding, MemberProxy, NamespaceModule, TypeProxy};
use crate::{BridgeError, BridgeResult};

/// Key of the tree root
pub const ROOT_NODE_KEY: &str = "nsbridge.root";

/// Key of the root module
pub const ROOT_MODULE_KEY: &str = "nsbridge.module";

const HANDLE_KEY_PREFIX: &str = "nsbridge.handle:";

/// Key holding a type proxy's identity
pub fn type_key(type_name: &str) -> String {
    format!("{}{}", HANDLE_KEY_PREFIX, type_name)
}

/// Key holding a member proxy's identities
pub fn member_key(type_name: &str, member: &str) -> String {
    format!("{}{}::{}", HANDLE_KEY_PREFIX, type_name, member)
}

/// One value in a state bag
#[derive(Debug, Clone)]
pub enum StateEntry {
    /// A tree node, kept alive by the bag
    Node(Arc<NamespaceModule>),
    /// The root module, kept alive by the bag
    Module(Arc<RootModule>),
    /// Plain data
    Value(serde_json::Value),
}

/// Flat key/value storage that outlives a reload
#[derive(Debug, Clone, Default)]
pub struct StateBag {
    entries: BTreeMap<String, StateEntry>,
}

impl StateBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, entry: StateEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Get an entry
    pub fn get(&self, key: &str) -> Option<&StateEntry> {
        self.entries.get(key)
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &str) -> Option<StateEntry> {
        self.entries.remove(key)
    }

    /// Get a required tree node
    pub fn node(&self, key: &str) -> BridgeResult<Arc<NamespaceModule>> {
        match self.get(key) {
            Some(StateEntry::Node(node)) => Ok(node.clone()),
            Some(_) => Err(BridgeError::InconsistentState(format!(
                "entry '{}' is not a tree node",
                key
            ))),
            None => Err(BridgeError::MissingState {
                key: key.to_string(),
            }),
        }
    }

    /// Get a required root module
    pub fn module(&self, key: &str) -> BridgeResult<Arc<RootModule>> {
        match self.get(key) {
            Some(StateEntry::Module(module)) => Ok(module.clone()),
            Some(_) => Err(BridgeError::InconsistentState(format!(
                "entry '{}' is not a module",
                key
            ))),
            None => Err(BridgeError::MissingState {
                key: key.to_string(),
            }),
        }
    }

    /// Get a plain-data entry
    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        match self.get(key) {
            Some(StateEntry::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Check if a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the bag is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Outcome of rehydrating every cached handle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Handles found again in the new universe
    pub live: usize,
    /// Names of handles that did not survive, sorted
    pub dead: Vec<String>,
}

impl ReloadReport {
    /// Check if every handle survived
    pub fn is_clean(&self) -> bool {
        self.dead.is_empty()
    }

    fn record(&mut self, name: &str, valid: bool) {
        if valid {
            self.live += 1;
        } else {
            self.dead.push(name.to_string());
        }
    }
}

fn for_each_type(node: &Arc<NamespaceModule>, f: &mut impl FnMut(&Arc<TypeProxy>)) {
    for (_, binding) in node.children() {
        match binding {
            Binding::Namespace(child) => for_each_type(&child, f),
            Binding::Type(ty) => f(&ty),
        }
    }
}

/// Store the identity of every cached type and member proxy under `root`
///
/// # Returns
/// Number of entries written
pub fn capture_handles(root: &Arc<NamespaceModule>, bag: &mut StateBag) -> BridgeResult<usize> {
    let mut written = 0;
    let mut result = Ok(());

    for_each_type(root, &mut |ty| {
        if result.is_err() {
            return;
        }
        result = capture_type(ty, bag, &mut written);
    });

    result.map(|()| written)
}

fn capture_type(ty: &TypeProxy, bag: &mut StateBag, written: &mut usize) -> BridgeResult<()> {
    let identity = serde_json::to_value(ty.handle().identity())?;
    bag.insert(type_key(ty.name()), StateEntry::Value(identity));
    *written += 1;

    for member in ty.cached_members() {
        let identities = serde_json::to_value(member.target().identities())?;
        bag.insert(
            member_key(ty.name(), member.name()),
            StateEntry::Value(identities),
        );
        *written += 1;
    }
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(bag: &StateBag, key: &str) -> Option<T> {
    let value = bag.value(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::warn!(key, %err, "unreadable handle state, using the handle's own identity");
            None
        }
    }
}

/// Rebuild every cached handle under `root` against a new universe
///
/// Identities come from the bag when present, otherwise from the handles
/// themselves. Never fails; handles that cannot be found go dead. Every
/// namespace is marked for re-enumeration.
pub fn rehydrate_handles(
    root: &Arc<NamespaceModule>,
    bag: &StateBag,
    provider: &dyn ReflectionProvider,
) -> ReloadReport {
    let mut report = ReloadReport::default();
    // The new universe may declare names the old one did not
    root.invalidate_names();

    for_each_type(root, &mut |ty| {
        let identity: CapturedIdentity = decode(bag, &type_key(ty.name()))
            .unwrap_or_else(|| ty.handle().identity().clone());
        ty.rehydrate(identity, provider);
        report.record(ty.name(), ty.is_valid());

        for member in ty.cached_members() {
            rehydrate_member(ty, &member, bag, provider, &mut report);
        }
    });

    report.dead.sort();
    report
}

fn rehydrate_member(
    ty: &TypeProxy,
    member: &MemberProxy,
    bag: &StateBag,
    provider: &dyn ReflectionProvider,
    report: &mut ReloadReport,
) {
    let identities: Vec<CapturedIdentity> = decode(bag, &member_key(ty.name(), member.name()))
        .unwrap_or_else(|| member.target().identities());
    member.rehydrate(identities, provider);
    report.record(&member.qualified_name(), member.is_valid());
}
