//! Resolution context and the process-wide preload switch

use parking_lot::Mutex;

use crate::host::HostInterpreter;
use crate::options::PreloadMode;
use crate::reflect::ReflectionProvider;
use crate::registry::NamespaceRegistry;

/// Everything tree resolution needs, passed explicitly
#[derive(Clone, Copy)]
pub struct TreeContext<'a> {
    /// Reflection over the current managed universe
    pub provider: &'a dyn ReflectionProvider,
    /// Known namespaces
    pub registry: &'a NamespaceRegistry,
    /// Whether namespaces are enumerated as soon as they are resolved
    pub preload: bool,
}

impl<'a> TreeContext<'a> {
    /// Create a context
    pub fn new(
        provider: &'a dyn ReflectionProvider,
        registry: &'a NamespaceRegistry,
        preload: bool,
    ) -> Self {
        Self {
            provider,
            registry,
            preload,
        }
    }

    /// Same context with preload forced on or off
    pub fn with_preload(self, preload: bool) -> Self {
        Self { preload, ..self }
    }
}

/// Preload flag, resolved lazily from the configured mode
///
/// `Auto` is decided on first use from whether the host is interactive,
/// then latched. An explicit [`set`](Self::set) always wins.
#[derive(Debug)]
pub struct PreloadSwitch {
    mode: PreloadMode,
    enabled: Mutex<Option<bool>>,
}

impl PreloadSwitch {
    /// Create a switch for the configured mode
    pub fn new(mode: PreloadMode) -> Self {
        Self {
            mode,
            enabled: Mutex::new(None),
        }
    }

    /// Current value, deciding `Auto` on first call
    pub fn is_enabled(&self, host: &dyn HostInterpreter) -> bool {
        *self.enabled.lock().get_or_insert_with(|| {
            let enabled = match self.mode {
                PreloadMode::Enabled => true,
                PreloadMode::Disabled => false,
                PreloadMode::Auto => host.is_interactive(),
            };
            tracing::debug!(mode = ?self.mode, enabled, "preload mode decided");
            enabled
        })
    }

    /// Override the flag
    pub fn set(&self, enabled: bool) {
        *self.enabled.lock() = Some(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryHost;

    #[test]
    fn test_auto_follows_interactive_host() {
        let host = InMemoryHost::new();
        host.set_interactive(true);
        let switch = PreloadSwitch::new(PreloadMode::Auto);
        assert!(switch.is_enabled(host.as_ref()));

        // Latched once decided
        host.set_interactive(false);
        assert!(switch.is_enabled(host.as_ref()));
    }

    #[test]
    fn test_explicit_modes() {
        let host = InMemoryHost::new();
        host.set_interactive(true);
        assert!(!PreloadSwitch::new(PreloadMode::Disabled).is_enabled(host.as_ref()));
        assert!(PreloadSwitch::new(PreloadMode::Enabled).is_enabled(host.as_ref()));
    }

    #[test]
    fn test_set_overrides() {
        let host = InMemoryHost::new();
        let switch = PreloadSwitch::new(PreloadMode::Disabled);
        switch.set(true);
        assert!(switch.is_enabled(host.as_ref()));
    }
}
