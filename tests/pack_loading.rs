//! Module pack loading tests

use promptloom_core::library::{Library, LibraryError};
use std::fs;

fn write_pack(dir: &std::path::Path, name: &str, engine_min: &str, modules_json: &str) {
    let pack = format!(
        r#"{{
            "pack_version": "1.0.0",
            "engine_min_version": "{engine_min}",
            "modules": {modules_json}
        }}"#
    );
    fs::write(dir.join(name), pack).unwrap();
}

#[test]
fn loads_and_merges_packs_from_dir() {
    let dir = tempfile::tempdir().unwrap();

    write_pack(
        dir.path(),
        "poses.json",
        "1.0.0",
        r#"[
            {"id": "pose-wall-lean", "category": "anatomy_pose", "label": "Wall lean",
             "prompt_text": "Relaxed lean.", "constraints": ["No motion blur"]},
            {"id": "rules-contact-sheet", "category": "global_rules", "label": "Contact sheet",
             "prompt_text": "Render a contact sheet."}
        ]"#,
    );
    write_pack(
        dir.path(),
        "apparel.json",
        "1.0.0",
        r#"[
            {"id": "apparel-denim", "category": "apparel_textile", "label": "Denim",
             "prompt_text": "Raw denim jacket."}
        ]"#,
    );

    let library = Library::load_from_dir(dir.path()).unwrap();
    assert_eq!(library.len(), 3);
    assert!(library.get("apparel-denim").is_some());
    assert_eq!(library.globals().len(), 1);
}

#[test]
fn duplicate_id_across_packs_is_fatal() {
    let dir = tempfile::tempdir().unwrap();

    let record = r#"[{"id": "pose-dup", "category": "anatomy_pose", "label": "Dup",
                      "prompt_text": "Dup."}]"#;
    write_pack(dir.path(), "a.json", "1.0.0", record);
    write_pack(dir.path(), "b.json", "1.0.0", record);

    let result = Library::load_from_dir(dir.path());
    assert!(matches!(result, Err(LibraryError::DuplicateModuleId(id)) if id == "pose-dup"));
}

#[test]
fn newer_engine_requirement_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "future.json", "99.0.0", "[]");

    let result = Library::load_from_dir(dir.path());
    assert!(matches!(result, Err(LibraryError::EngineVersionMismatch(..))));
}

#[test]
fn missing_dir_yields_empty_library() {
    let dir = tempfile::tempdir().unwrap();
    let library = Library::load_from_dir(&dir.path().join("does-not-exist")).unwrap();
    assert!(library.is_empty());
}
