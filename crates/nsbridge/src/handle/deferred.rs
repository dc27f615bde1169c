//! Deferred-failure handle
//!
//! A [`Deferred`] either holds a live foreign entity or remembers the name of
//! one that could not be found again after a reload. Reading a dead handle
//! fails with [`StaleReferenceError`] at the call site; creating one never
//! fails.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::identity::{CapturedIdentity, Rehydrate, RehydrateError};
use crate::reflect::{ForeignMember, ForeignMethod, ForeignType, ReflectionProvider};
use crate::{BridgeError, BridgeResult};

/// Access to an entity that did not survive a reload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("The foreign entity {name} no longer exists. Cause: {cause}")]
pub struct StaleReferenceError {
    /// Name captured when the handle was live
    pub name: String,
    /// Why rehydration failed
    pub cause: RehydrateError,
}

#[derive(Debug, Clone)]
enum HandleState<T> {
    Live(T),
    Dead(RehydrateError),
}

/// Handle to a foreign entity whose failure is deferred to the point of use
#[derive(Debug, Clone)]
pub struct Deferred<T> {
    identity: CapturedIdentity,
    name: Arc<str>,
    state: HandleState<T>,
}

/// Handle to a type
pub type MaybeType = Deferred<ForeignType>;

/// Handle to a method or constructor overload
pub type MaybeMethod = Deferred<ForeignMethod>;

/// Handle to a field, property or event
pub type MaybeMember = Deferred<ForeignMember>;

impl<T: Rehydrate> Deferred<T> {
    /// Wrap a live value, capturing its identity and name eagerly
    pub fn wrap(value: T) -> Self {
        let identity = value.capture();
        let name = Arc::from(identity.display_name());
        Self {
            identity,
            name,
            state: HandleState::Live(value),
        }
    }

    /// Wrap a value that may be absent
    ///
    /// An absent value is a programming error on the caller's side, reported
    /// as [`BridgeError::AbsentEntity`].
    pub fn try_wrap(value: Option<T>) -> BridgeResult<Self> {
        value
            .map(Self::wrap)
            .ok_or(BridgeError::AbsentEntity(T::ENTITY))
    }

    /// Rebuild a handle from a persisted identity
    ///
    /// Never fails: if the entity cannot be found the handle is created dead
    /// and every later [`value`](Self::value) call reports why.
    pub fn rehydrate(identity: CapturedIdentity, provider: &dyn ReflectionProvider) -> Self {
        let name: Arc<str> = Arc::from(identity.display_name());
        let state = match T::rehydrate(&identity, provider) {
            Ok(value) => HandleState::Live(value),
            Err(cause) => {
                tracing::warn!(entity = T::ENTITY, name = %name, %cause, "foreign entity did not survive reload");
                HandleState::Dead(cause)
            }
        };
        Self {
            identity,
            name,
            state,
        }
    }

    /// Rehydrate this handle's own identity against another universe
    pub fn reload(&self, provider: &dyn ReflectionProvider) -> Self {
        Self::rehydrate(self.identity.clone(), provider)
    }
}

impl<T> Deferred<T> {
    /// The live value
    ///
    /// # Returns
    /// * `Ok(&T)` - The handle is live
    /// * `Err(StaleReferenceError)` - The entity did not survive a reload
    pub fn value(&self) -> Result<&T, StaleReferenceError> {
        match &self.state {
            HandleState::Live(value) => Ok(value),
            HandleState::Dead(cause) => Err(StaleReferenceError {
                name: self.name.to_string(),
                cause: cause.clone(),
            }),
        }
    }

    /// Check if the handle is live
    pub fn is_valid(&self) -> bool {
        matches!(self.state, HandleState::Live(_))
    }

    /// Name captured at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the missing entity, only for dead handles
    pub fn dead_name(&self) -> Option<&str> {
        match self.state {
            HandleState::Live(_) => None,
            HandleState::Dead(_) => Some(&self.name),
        }
    }

    /// Identity used to persist and rehydrate this handle
    ///
    /// Dead handles keep their original identity so a later reload that
    /// brings the entity back produces a live handle again.
    pub fn identity(&self) -> &CapturedIdentity {
        &self.identity
    }

    /// Message describing why the handle is dead
    pub fn deleted_message(&self) -> Option<String> {
        match &self.state {
            HandleState::Live(_) => None,
            HandleState::Dead(cause) => Some(format!(
                "The foreign entity {} no longer exists. Cause: {}",
                self.name, cause
            )),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            HandleState::Live(value) => value.fmt(f),
            HandleState::Dead(_) => write!(f, "missing: {}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryUniverse;

    #[test]
    fn test_live_handle() {
        let handle = MaybeType::wrap(ForeignType::new("Acme.Widgets.Gear"));
        assert!(handle.is_valid());
        assert_eq!(handle.name(), "Acme.Widgets.Gear");
        assert_eq!(handle.dead_name(), None);
        assert_eq!(handle.value().unwrap().simple_name(), "Gear");
        assert_eq!(handle.to_string(), "Acme.Widgets.Gear");
    }

    #[test]
    fn test_try_wrap_absent() {
        let result = MaybeType::try_wrap(None);
        assert!(matches!(result, Err(BridgeError::AbsentEntity("type"))));
    }

    #[test]
    fn test_rehydrate_missing_type_is_dead() {
        let universe = InMemoryUniverse::new();
        let handle = MaybeType::wrap(ForeignType::new("Acme.Widgets.Gear"));

        let reloaded = handle.reload(&universe);
        assert!(!reloaded.is_valid());
        assert_eq!(reloaded.dead_name(), Some("Acme.Widgets.Gear"));
        assert_eq!(reloaded.to_string(), "missing: Acme.Widgets.Gear");

        let err = reloaded.value().unwrap_err();
        assert_eq!(err.name, "Acme.Widgets.Gear");
        assert_eq!(err.cause, RehydrateError::TypeNotFound("Acme.Widgets.Gear".into()));
        assert!(reloaded.deleted_message().unwrap().contains("no longer exists"));

        // The original handle is untouched
        assert!(handle.is_valid());
    }

    #[test]
    fn test_dead_handle_revives_on_later_reload() {
        let empty = InMemoryUniverse::new();
        let handle = MaybeType::wrap(ForeignType::new("Acme.Widgets.Gear"));
        let dead = handle.reload(&empty);
        assert!(!dead.is_valid());

        let restored = InMemoryUniverse::new();
        restored.define_type("Acme.Widgets.Gear");
        let live = dead.reload(&restored);
        assert!(live.is_valid());
        assert!(!dead.is_valid());
    }

    #[test]
    fn test_method_name_includes_signature() {
        let universe = InMemoryUniverse::new();
        universe
            .define_type("Acme.Widgets.Gear")
            .method("Spin", &["System.Int32"]);
        let ty = ForeignType::new("Acme.Widgets.Gear");
        let method = universe.methods(&ty, "Spin").remove(0);

        let handle = MaybeMethod::wrap(method);
        assert_eq!(handle.name(), "Acme.Widgets.Gear.Spin(System.Int32)");
    }
}
