//! Namespace registry
//!
//! The registry is the set of namespace prefixes known to exist in the
//! managed universe. The import dispatcher uses it to reject non-managed
//! dotted names without touching reflection, and the tree uses it to decide
//! whether a child name is a namespace.
//!
//! Lifecycle: `Uninitialized -> Populated -> TornDown`. Names are only ever
//! added while populated; once torn down every notification is a no-op.

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

use crate::reflect::NAMESPACE_SEPARATOR;

#[derive(Debug)]
enum RegistryState {
    Uninitialized,
    Populated(FxHashSet<String>),
    TornDown,
}

/// Registry of known namespace prefixes
#[derive(Debug)]
pub struct NamespaceRegistry {
    state: RwLock<RegistryState>,
}

/// Every dotted prefix of a namespace (`A.B.C` -> `A`, `A.B`, `A.B.C`)
fn prefixes(namespace: &str) -> impl Iterator<Item = &str> {
    namespace
        .match_indices(NAMESPACE_SEPARATOR)
        .map(move |(idx, _)| &namespace[..idx])
        .chain(std::iter::once(namespace))
        .filter(|prefix| !prefix.is_empty())
}

fn insert_with_prefixes(set: &mut FxHashSet<String>, namespace: &str) -> bool {
    let mut added = false;
    for prefix in prefixes(namespace) {
        if !set.contains(prefix) {
            set.insert(prefix.to_string());
            added = true;
        }
    }
    added
}

impl NamespaceRegistry {
    /// Create an uninitialized registry
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::Uninitialized),
        }
    }

    /// Fill the registry from a full enumeration of the managed universe
    ///
    /// Every prefix of every namespace is recorded, so `Acme.Widgets` also
    /// makes `Acme` known.
    pub fn populate<I, S>(&self, namespaces: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = FxHashSet::default();
        for namespace in namespaces {
            insert_with_prefixes(&mut set, namespace.as_ref());
        }
        tracing::debug!(count = set.len(), "namespace registry populated");
        *self.state.write() = RegistryState::Populated(set);
    }

    /// Check if a namespace is known
    pub fn contains(&self, namespace: &str) -> bool {
        match &*self.state.read() {
            RegistryState::Populated(set) => set.contains(namespace),
            _ => false,
        }
    }

    /// Sorted copy of every known namespace
    pub fn snapshot(&self) -> BTreeSet<String> {
        match &*self.state.read() {
            RegistryState::Populated(set) => set.iter().cloned().collect(),
            _ => BTreeSet::new(),
        }
    }

    /// Record a namespace contributed by newly loaded code
    ///
    /// # Returns
    /// * `true` - At least one new prefix was recorded
    /// * `false` - Already known, or the registry is not populated
    pub fn notify_added(&self, namespace: &str) -> bool {
        let mut state = self.state.write();
        match &mut *state {
            RegistryState::Populated(set) => {
                let added = insert_with_prefixes(set, namespace);
                if added {
                    tracing::debug!(namespace, "namespace added");
                }
                added
            }
            RegistryState::Uninitialized => {
                tracing::trace!(namespace, "namespace notification before population ignored");
                false
            }
            RegistryState::TornDown => {
                tracing::trace!(namespace, "namespace notification after teardown ignored");
                false
            }
        }
    }

    /// Direct child segments of a namespace (`""` is the root)
    pub fn child_segments(&self, parent: &str) -> BTreeSet<String> {
        let state = self.state.read();
        let RegistryState::Populated(set) = &*state else {
            return BTreeSet::new();
        };

        set.iter()
            .filter_map(|namespace| {
                let rest = if parent.is_empty() {
                    namespace.as_str()
                } else {
                    namespace
                        .strip_prefix(parent)?
                        .strip_prefix(NAMESPACE_SEPARATOR)?
                };
                (!rest.is_empty() && !rest.contains(NAMESPACE_SEPARATOR))
                    .then(|| rest.to_string())
            })
            .collect()
    }

    /// Clear the registry and mark it unavailable
    ///
    /// Callers must cancel their namespace subscription first.
    pub fn teardown(&self) {
        *self.state.write() = RegistryState::TornDown;
        tracing::debug!("namespace registry torn down");
    }

    /// Check if the registry has been populated and not torn down
    pub fn is_populated(&self) -> bool {
        matches!(*self.state.read(), RegistryState::Populated(_))
    }

    /// Check if the registry has been torn down
    pub fn is_torn_down(&self) -> bool {
        matches!(*self.state.read(), RegistryState::TornDown)
    }

    /// Number of known namespaces
    pub fn len(&self) -> usize {
        match &*self.state.read() {
            RegistryState::Populated(set) => set.len(),
            _ => 0,
        }
    }

    /// Check if no namespace is known
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
