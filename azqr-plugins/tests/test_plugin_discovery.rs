//! YAML plugin discovery and registration

use std::fs;
use std::path::Path;

use rstest::rstest;

use azqr_plugins::{PluginRegistry, PluginType, discover_yaml_plugins, register_yaml_plugins};

// ── Helpers ──

fn plugin_yaml(name: &str, guid: &str) -> String {
    format!(
        "name: {name}\nversion: 2.0.0\nqueries:\n  - aprlGuid: {guid}\n    description: Check {guid}\n    recommendationResourceType: Microsoft.Web/sites\n    query: resources | take 1\n"
    )
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

// ── Tests ──

#[test]
fn test_discovery_skips_invalid_and_non_yaml_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.yaml", &plugin_yaml("alpha", "a-1"));
    write(dir.path(), "b.yml", &plugin_yaml("beta", "b-1"));
    write(dir.path(), "broken.yaml", "name: [unterminated");
    write(dir.path(), "notes.txt", &plugin_yaml("gamma", "g-1"));

    let plugins = discover_yaml_plugins(&[dir.path().to_path_buf()]);
    let names: Vec<&str> = plugins.iter().map(|p| p.metadata.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert!(plugins.iter().all(|p| p.metadata.plugin_type == PluginType::Yaml));
}

#[test]
fn test_first_plugin_with_a_name_wins() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write(first.path(), "dup.yaml", &plugin_yaml("shared", "first-1"));
    write(second.path(), "dup.yaml", &plugin_yaml("shared", "second-1"));

    let plugins = discover_yaml_plugins(&[first.path().to_path_buf(), second.path().to_path_buf()]);
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].yaml_recommendations[0].recommendation_id, "first-1");
}

#[test]
fn test_nested_directories_are_walked() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("team/security")).unwrap();
    write(&dir.path().join("team/security"), "sec.yaml", &plugin_yaml("security", "s-1"));

    let plugins = discover_yaml_plugins(&[dir.path().to_path_buf()]);
    assert_eq!(plugins.len(), 1);
}

#[rstest]
#[case::missing("does/not/exist")]
#[case::file("Cargo.toml")]
fn test_non_directories_are_ignored(#[case] dir: &str) {
    assert!(discover_yaml_plugins(&[dir.into()]).is_empty());
}

#[test]
fn test_register_yaml_plugins_fills_registry() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.yaml", &plugin_yaml("alpha", "a-1"));
    write(dir.path(), "b.yaml", &plugin_yaml("beta", "b-1"));

    let registry = PluginRegistry::new();
    assert_eq!(register_yaml_plugins(&registry, &[dir.path().to_path_buf()]), 2);
    assert_eq!(registry.count(), 2);
    let alpha = registry.get("alpha").unwrap();
    assert_eq!(alpha.metadata.version, "2.0.0");
    assert_eq!(alpha.yaml_recommendations[0].source, "alpha");
}
