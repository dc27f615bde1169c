//! Type and member proxies
//!
//! A [`TypeProxy`] is the host-visible container for a foreign type. The
//! container itself survives a reload; only the handle inside it is swapped
//! for a rehydrated one, which may be dead.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::handle::{
    CapturedIdentity, Deferred, MaybeMember, MaybeMethod, MaybeType, StaleReferenceError,
};
use crate::reflect::{ForeignMember, ForeignMethod, ForeignType, ReflectionProvider};
use crate::{BridgeError, BridgeResult};

/// Proxy for a foreign type
pub struct TypeProxy {
    name: Arc<str>,
    handle: RwLock<MaybeType>,
    members: RwLock<FxHashMap<Arc<str>, Arc<MemberProxy>>>,
}

impl TypeProxy {
    /// Create a proxy around a type handle
    pub fn new(handle: MaybeType) -> Arc<Self> {
        Arc::new(Self {
            name: Arc::from(handle.name()),
            handle: RwLock::new(handle),
            members: RwLock::new(FxHashMap::default()),
        })
    }

    /// Type name captured when the proxy was created
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current handle
    pub fn handle(&self) -> MaybeType {
        self.handle.read().clone()
    }

    /// Check if the type still exists
    pub fn is_valid(&self) -> bool {
        self.handle.read().is_valid()
    }

    /// The live type
    pub fn foreign_type(&self) -> Result<ForeignType, StaleReferenceError> {
        self.handle.read().value().cloned()
    }

    /// Resolve a member by name, memoized
    ///
    /// Methods (including constructors under `.ctor`) become a method group
    /// of every overload; otherwise a field, property or event is looked up.
    pub fn member(
        &self,
        provider: &dyn ReflectionProvider,
        name: &str,
    ) -> BridgeResult<Arc<MemberProxy>> {
        if let Some(member) = self.members.read().get(name) {
            return Ok(member.clone());
        }

        let ty = self.foreign_type()?;
        let overloads = provider.methods(&ty, name);
        let target = if !overloads.is_empty() {
            MemberTarget::Methods(overloads.into_iter().map(MaybeMethod::wrap).collect())
        } else if let Some(member) = provider.member(&ty, name) {
            MemberTarget::Member(MaybeMember::wrap(member))
        } else {
            return Err(BridgeError::AttributeNotFound {
                owner: self.name.to_string(),
                name: name.to_string(),
            });
        };

        let proxy = Arc::new(MemberProxy {
            name: Arc::from(name),
            declaring_type: self.name.clone(),
            target: RwLock::new(target),
        });
        Ok(self
            .members
            .write()
            .entry(Arc::from(name))
            .or_insert(proxy)
            .clone())
    }

    /// Every member resolved so far, sorted by name
    pub fn cached_members(&self) -> Vec<Arc<MemberProxy>> {
        let mut members: Vec<_> = self.members.read().values().cloned().collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }

    /// Swap in a handle rebuilt from `identity` against a new universe
    pub(crate) fn rehydrate(&self, identity: CapturedIdentity, provider: &dyn ReflectionProvider) {
        *self.handle.write() = MaybeType::rehydrate(identity, provider);
    }
}

impl fmt::Debug for TypeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeProxy")
            .field("name", &self.name)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// What a member proxy refers to
#[derive(Debug, Clone)]
pub enum MemberTarget {
    /// Every overload of a method
    Methods(Vec<MaybeMethod>),
    /// A field, property or event
    Member(MaybeMember),
}

impl MemberTarget {
    /// Identities of every handle in the target
    pub fn identities(&self) -> Vec<CapturedIdentity> {
        match self {
            MemberTarget::Methods(overloads) => {
                overloads.iter().map(|m| m.identity().clone()).collect()
            }
            MemberTarget::Member(member) => vec![member.identity().clone()],
        }
    }
}

/// Proxy for a method group or a single member of a foreign type
pub struct MemberProxy {
    name: Arc<str>,
    declaring_type: Arc<str>,
    target: RwLock<MemberTarget>,
}

impl MemberProxy {
    /// Member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `DeclaringType.Member`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    /// Current target
    pub fn target(&self) -> MemberTarget {
        self.target.read().clone()
    }

    /// Check if this is a method group
    pub fn is_method_group(&self) -> bool {
        matches!(*self.target.read(), MemberTarget::Methods(_))
    }

    /// Check if at least one handle is live
    pub fn is_valid(&self) -> bool {
        match &*self.target.read() {
            MemberTarget::Methods(overloads) => overloads.iter().any(Deferred::is_valid),
            MemberTarget::Member(member) => member.is_valid(),
        }
    }

    /// Live overloads of a method group
    ///
    /// Dead overloads are skipped. If none is live, the first dead overload's
    /// error is returned. A non-method member has no overloads.
    pub fn methods(&self) -> Result<Vec<ForeignMethod>, StaleReferenceError> {
        let target = self.target.read();
        let MemberTarget::Methods(overloads) = &*target else {
            return Ok(Vec::new());
        };

        let live: Vec<ForeignMethod> = overloads
            .iter()
            .filter_map(|overload| overload.value().ok().cloned())
            .collect();
        if live.is_empty() {
            if let Some(Err(err)) = overloads.first().map(|overload| overload.value()) {
                return Err(err);
            }
        }
        Ok(live)
    }

    /// The field, property or event this proxy refers to
    ///
    /// `Ok(None)` for method groups.
    pub fn member(&self) -> Result<Option<ForeignMember>, StaleReferenceError> {
        match &*self.target.read() {
            MemberTarget::Methods(_) => Ok(None),
            MemberTarget::Member(member) => member.value().cloned().map(Some),
        }
    }

    /// Rebuild every handle from `identities` against a new universe
    pub(crate) fn rehydrate(&self, identities: Vec<CapturedIdentity>, provider: &dyn ReflectionProvider) {
        let mut target = self.target.write();
        let rebuilt = match &*target {
            MemberTarget::Methods(_) => MemberTarget::Methods(
                identities
                    .into_iter()
                    .map(|identity| MaybeMethod::rehydrate(identity, provider))
                    .collect(),
            ),
            MemberTarget::Member(current) => {
                let identity = identities
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| current.identity().clone());
                MemberTarget::Member(MaybeMember::rehydrate(identity, provider))
            }
        };
        *target = rebuilt;
    }
}

impl fmt::Debug for MemberProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberProxy")
            .field("name", &self.qualified_name())
            .field("valid", &self.is_valid())
            .finish()
    }
}
