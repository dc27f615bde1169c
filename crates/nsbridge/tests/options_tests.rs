//! Options file loading tests

use nsbridge::memory::{InMemoryHost, InMemoryUniverse};
use nsbridge::{Bridge, BridgeOptions, OptionsError, PreloadMode};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nsbridge.toml");
    fs::write(
        &path,
        r#"
root_name = "dotnet"
preload = "enabled"
"#,
    )
    .unwrap();

    let options = BridgeOptions::load(&path).unwrap();
    assert_eq!(options.root_name, "dotnet");
    assert_eq!(options.preload, PreloadMode::Enabled);
    assert_eq!(options.wildcard, "*");
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = BridgeOptions::load(&temp_dir.path().join("missing.toml"));
    assert!(matches!(result, Err(OptionsError::Io(_))));
}

#[test]
fn test_load_invalid_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nsbridge.toml");
    fs::write(&path, "wildcard = \"\"\n").unwrap();

    assert!(matches!(
        BridgeOptions::load(&path),
        Err(OptionsError::Invalid(_))
    ));
}

#[test]
fn test_loaded_root_name_is_reserved() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nsbridge.toml");
    fs::write(&path, "root_name = \"dotnet\"\npreload = \"disabled\"\n").unwrap();
    let options = BridgeOptions::load(&path).unwrap();

    let universe = Arc::new(InMemoryUniverse::new());
    universe.define_type("Acme.Widgets.Gear");
    let host = InMemoryHost::new();
    let _bridge = Bridge::initialize(options, universe, host.clone()).unwrap();

    let root = host.import("dotnet").unwrap();
    assert!(root.as_root().unwrap().has_attr("Acme"));
    assert!(host.import("clr").is_err());
}
