//! Import dispatch tests
//!
//! Drives the bridge through the host's import entry point the way host code
//! would, covering:
//! - Memoized resolution (same identity on every import)
//! - Fallback precedence of the host's own import
//! - Just-in-time and preload modes
//! - Wildcard and explicit from-lists
//! - Restoration of the original error for names the tree cannot resolve

use nsbridge::memory::{InMemoryHost, InMemoryUniverse};
use nsbridge::{
    Bridge, BridgeOptions, HostError, HostErrorKind, HostInterpreter, HostValue, PreloadMode,
    ReflectionProvider,
};
use std::sync::Arc;

fn acme_universe() -> Arc<InMemoryUniverse> {
    let universe = Arc::new(InMemoryUniverse::new());
    universe
        .define_type("Acme.Widgets.Gear")
        .constructor(&[])
        .method("Spin", &["System.Int32"]);
    universe.define_type("Acme.Widgets.Sprocket");
    universe.define_type("Acme.Widgets.Parts.Bolt");
    universe.define_type("Acme.Tools.Wrench");
    universe.define_type("Acme.Collections.Bag`1");
    universe
}

fn start(preload: PreloadMode) -> (Arc<InMemoryUniverse>, Arc<InMemoryHost>, Arc<Bridge>) {
    let universe = acme_universe();
    let host = InMemoryHost::new();
    host.add_native_module("json");
    let options = BridgeOptions::default().with_preload(preload);
    let bridge = Bridge::initialize(options, universe.clone(), host.clone()).unwrap();
    (universe, host, bridge)
}

fn namespace(value: &HostValue) -> &Arc<nsbridge::NamespaceModule> {
    value.as_namespace().expect("namespace module")
}

// ===== Identity =====

#[test]
fn test_import_twice_returns_same_module() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);

    let first = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    let second = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    assert!(first.is_same(&second));
}

#[test]
fn test_identity_survives_module_table_eviction() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);

    let first = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    host.remove_module("Acme.Widgets");
    host.remove_module("Acme");

    let second = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    assert!(first.is_same(&second));
}

#[test]
fn test_import_and_attribute_access_agree() {
    let (_universe, host, bridge) = start(PreloadMode::Disabled);

    let imported = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    let acme = bridge.getattr(&host.import("clr").unwrap(), "Acme").unwrap();
    let walked = bridge.getattr(&acme, "Widgets").unwrap();
    assert!(imported.is_same(&walked));
}

// ===== Fallback precedence =====

#[test]
fn test_host_import_wins() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);
    host.add_native_module("Acme");

    let acme = host.import("Acme").unwrap();
    assert!(matches!(acme, HostValue::Opaque(_)));
}

#[test]
fn test_host_import_wins_for_dotted_names() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);
    host.add_native_module("Acme.Widgets");

    let widgets = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    assert!(widgets.as_namespace().is_none());
}

#[test]
fn test_non_managed_names_pass_through() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);

    assert!(matches!(host.import("json").unwrap(), HostValue::Opaque(_)));
    assert_eq!(
        host.import("yaml.loader").unwrap_err(),
        HostError::module_not_found("yaml.loader")
    );
}

// ===== Tree walk =====

#[test]
fn test_gear_scenario() {
    let universe = Arc::new(InMemoryUniverse::new());
    universe.define_type("Acme.Widgets.Gear");
    let host = InMemoryHost::new();
    let bridge = Bridge::initialize(BridgeOptions::default(), universe, host.clone()).unwrap();
    assert_eq!(
        bridge.registry().snapshot().into_iter().collect::<Vec<_>>(),
        vec!["Acme", "Acme.Widgets"]
    );

    let gear = host.import_from("Acme.Widgets.Gear", &["Spin"]).unwrap();
    assert_eq!(gear.as_type().unwrap().name(), "Acme.Widgets.Gear");

    let err = host.import("Acme.Widgets.Cog").unwrap_err();
    assert_eq!(err, HostError::module_not_found("Acme.Widgets.Cog"));
}

#[test]
fn test_walk_registers_every_prefix() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);

    let head = host.import("Acme.Widgets.Parts").unwrap();
    assert_eq!(namespace(&head).module_name(), "Acme");

    for name in ["Acme", "Acme.Widgets", "Acme.Widgets.Parts"] {
        assert!(host.module(name).is_some(), "{} not registered", name);
    }
}

#[test]
fn test_module_table_hit_returns_head() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);
    host.import("Acme.Widgets").unwrap();

    let head = host
        .call_import(&[HostValue::str("Acme.Widgets")])
        .unwrap();
    assert_eq!(namespace(&head).module_name(), "Acme");
}

#[test]
fn test_generic_type_by_base_name() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);

    let bag = host.import_from("Acme.Collections.Bag", &["Add"]).unwrap();
    assert_eq!(bag.as_type().unwrap().name(), "Acme.Collections.Bag`1");
}

#[test]
fn test_malformed_from_list_surfaces() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);
    let err = host
        .call_import(&[
            HostValue::str("Acme"),
            HostValue::None,
            HostValue::None,
            HostValue::Int(3),
        ])
        .unwrap_err();
    assert_eq!(err.kind, HostErrorKind::Type);
}

// ===== Preload =====

#[test]
fn test_just_in_time_resolves_only_the_path() {
    let (universe, host, _bridge) = start(PreloadMode::Disabled);

    let widgets = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    assert_eq!(namespace(&widgets).child_count(), 0);
    assert_eq!(universe.children_calls(), 0);
}

#[test]
fn test_preload_materializes_direct_children() {
    let (universe, host, _bridge) = start(PreloadMode::Enabled);

    let widgets = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    let widgets = namespace(&widgets);
    for child in universe.children("Acme.Widgets") {
        assert!(widgets.cached(&child).is_some(), "{} not preloaded", child);
    }

    let acme = namespace(&host.module("Acme").unwrap()).clone();
    for child in universe.children("Acme") {
        assert!(acme.cached(&child).is_some(), "{} not preloaded", child);
    }
}

#[test]
fn test_auto_preload_follows_interactive_host() {
    let universe = acme_universe();
    let host = InMemoryHost::new();
    host.set_interactive(true);
    let bridge = Bridge::initialize(BridgeOptions::default(), universe, host.clone()).unwrap();
    assert!(bridge.preload());

    let widgets = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    assert!(namespace(&widgets).names_loaded());
}

// ===== From-lists =====

#[test]
fn test_wildcard_import_is_complete_without_preload() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);

    let widgets = host.import_from("Acme.Widgets", &["*"]).unwrap();
    let widgets = namespace(&widgets);
    assert!(widgets.names_loaded());
    assert_eq!(widgets.dir(), vec!["Gear", "Parts", "Sprocket"]);
}

#[test]
fn test_wildcard_on_already_imported_module() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);

    let widgets = host.import_from("Acme.Widgets", &["Gear"]).unwrap();
    assert!(!namespace(&widgets).names_loaded());

    let again = host.import_from("Acme.Widgets", &["*"]).unwrap();
    assert!(again.is_same(&widgets));
    assert_eq!(namespace(&again).dir(), vec!["Gear", "Parts", "Sprocket"]);
}

#[test]
fn test_wildcard_matches_load_names() {
    let (universe, host, bridge) = start(PreloadMode::Disabled);

    let tools = host.import_from("Acme.Tools", &["*"]).unwrap();
    let expected: Vec<String> = {
        let mut names: Vec<String> = universe.children("Acme.Tools");
        names.extend(bridge.registry().child_segments("Acme.Tools"));
        names.sort();
        names.dedup();
        names
    };
    assert_eq!(namespace(&tools).dir(), expected);
}

#[test]
fn test_wildcard_sees_namespace_loaded_later() {
    let (universe, host, _bridge) = start(PreloadMode::Disabled);

    let acme = host.import_from("Acme", &["*"]).unwrap();
    assert_eq!(namespace(&acme).dir(), vec!["Collections", "Tools", "Widgets"]);

    universe.define_type("Acme.Gadgets.Lever");
    let again = host.import_from("Acme", &["*"]).unwrap();
    assert!(again.is_same(&acme));
    assert_eq!(
        namespace(&again).dir(),
        vec!["Collections", "Gadgets", "Tools", "Widgets"]
    );
}

#[test]
fn test_root_module_sees_namespace_loaded_later() {
    let (universe, host, _bridge) = start(PreloadMode::Disabled);
    let clr = host.import("clr").unwrap();
    assert!(!clr.as_root().unwrap().has_attr("Globex"));

    universe.define_type("Globex.Things.Thing");
    let clr = host.import("clr").unwrap();
    assert!(clr.as_root().unwrap().has_attr("Globex"));
}

#[test]
fn test_root_module_explicit_from_list() {
    let (_universe, host, bridge) = start(PreloadMode::Disabled);

    let clr = host.import_from("clr", &["Acme", "Nope"]).unwrap();
    let root = clr.as_root().unwrap();
    assert!(root.has_attr("Acme"));
    assert!(!root.has_attr("Nope"));
    assert!(Arc::ptr_eq(root, &bridge.root_module().unwrap()));
}

#[test]
fn test_root_module_import_never_defers() {
    let (_universe, host, _bridge) = start(PreloadMode::Disabled);
    host.add_native_module("clr");

    let clr = host.import("clr").unwrap();
    assert!(clr.as_root().is_some());
}
