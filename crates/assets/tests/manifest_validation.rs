//! Manifest validation against a synthetic assets tree

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use scenecheck_assets::manifest::DEFAULT_SPOTLIGHT;
use scenecheck_assets::{ManifestError, ManifestValidator, Spotlight};

/// Lay out `public/assets` with the given files and a manifest listing `keys`
fn create_project(dir: &Path, keys: &[&str], present: &[&str]) {
    let assets = dir.join("public/assets");
    fs::create_dir_all(&assets).unwrap();

    for file in present {
        let path = assets.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"\x89PNG").unwrap();
    }

    let mut sheets = serde_json::Map::new();
    for (i, key) in keys.iter().enumerate() {
        sheets.insert(
            key.to_string(),
            serde_json::json!({ "frameWidth": 32, "frameHeight": 32, "frames": i + 1 }),
        );
    }
    let manifest = serde_json::json!({ "sheets": sheets });
    fs::write(
        assets.join("spritesheet_config.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_missing_files_in_manifest_order() {
    let dir = TempDir::new().unwrap();
    let keys = [
        "Tiles/grass.png",
        "Characters/Workers/CyanWorker/FarmerCyan.png",
        "Buildings/house.png",
        "Characters/Goat.png",
        "Effects/dust.png",
    ];
    create_project(dir.path(), &keys, &["Characters/Workers/CyanWorker/FarmerCyan.png", "Characters/Goat.png"]);

    let report = ManifestValidator::for_project(dir.path())
        .validate(Some(DEFAULT_SPOTLIGHT))
        .unwrap();

    assert_eq!(report.total_entries, 5);
    assert_eq!(report.missing_count(), 3);
    assert_eq!(
        report.missing,
        vec!["Tiles/grass.png", "Buildings/house.png", "Effects/dust.png"]
    );
    assert!(!report.is_complete());
}

#[test]
fn test_complete_manifest() {
    let dir = TempDir::new().unwrap();
    let keys = ["a.png", "b/c.png"];
    create_project(dir.path(), &keys, &keys);

    let report = ManifestValidator::for_project(dir.path()).validate(None).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.spotlight, Spotlight::NotRequested);
}

#[test]
fn test_missing_manifest_is_an_error() {
    let dir = TempDir::new().unwrap();

    let err = ManifestValidator::for_project(dir.path()).validate(None).unwrap_err();
    assert!(matches!(err, ManifestError::NotFound(_)), "{err}");
}

#[test]
fn test_malformed_manifest_is_an_error() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("spritesheet_config.json");

    fs::write(&manifest, "{ not json").unwrap();
    let err = ManifestValidator::new(&manifest, dir.path()).validate(None).unwrap_err();
    assert!(matches!(err, ManifestError::Malformed { .. }), "{err}");

    // Valid JSON without a sheets map is not an empty manifest either
    fs::write(&manifest, r#"{"frames": []}"#).unwrap();
    let err = ManifestValidator::new(&manifest, dir.path()).validate(None).unwrap_err();
    assert!(matches!(err, ManifestError::Malformed { .. }), "{err}");
}

#[test]
fn test_spotlight_echoes_configuration() {
    let dir = TempDir::new().unwrap();
    create_project(dir.path(), &["Tiles/grass.png", DEFAULT_SPOTLIGHT], &[]);

    let report = ManifestValidator::for_project(dir.path())
        .validate(Some(DEFAULT_SPOTLIGHT))
        .unwrap();

    // Present key with a missing file shows up in both places
    assert!(report.missing.contains(&DEFAULT_SPOTLIGHT.to_string()));
    match report.spotlight {
        Spotlight::Present { key, config, pretty } => {
            assert_eq!(key, DEFAULT_SPOTLIGHT);
            assert_eq!(config["frames"], 2);
            let reparsed: serde_json::Value = serde_json::from_str(&pretty).unwrap();
            assert_eq!(reparsed, config);
        }
        other => panic!("expected present spotlight, got {:?}", other),
    }
}

#[test]
fn test_absent_spotlight_is_distinct_from_missing_file() {
    let dir = TempDir::new().unwrap();
    create_project(dir.path(), &["Tiles/grass.png"], &["Tiles/grass.png"]);

    let report = ManifestValidator::for_project(dir.path())
        .validate(Some(DEFAULT_SPOTLIGHT))
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(
        report.spotlight,
        Spotlight::Absent { key: DEFAULT_SPOTLIGHT.to_string() }
    );
}

#[test]
fn test_traversal_key_aborts_validation() {
    let dir = TempDir::new().unwrap();
    create_project(dir.path(), &["ok.png", "../outside.png"], &["ok.png"]);

    let err = ManifestValidator::for_project(dir.path()).validate(None).unwrap_err();
    assert!(matches!(err, ManifestError::PathTraversal(ref k) if k == "../outside.png"), "{err}");
}
