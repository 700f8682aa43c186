use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_repo.json")
}

fn explorer() -> Command {
    let mut cmd = Command::cargo_bin("asset-relations-explorer").unwrap();
    cmd.env_remove("ASSET_EXPLORER_MANIFEST").env_remove("ASSET_EXPLORER_LOG");
    cmd
}

#[test]
fn usages_lists_every_asset() {
    explorer()
        .arg("usages")
        .arg("--manifest")
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("Assets/Textures/Unused.png"))
        .stdout(predicate::str::contains("Used by"))
        .stdout(predicate::str::contains("8 of 8 entries"));
}

#[test]
fn usages_excluded_json() {
    explorer()
        .args(["usages", "--included", "excluded", "--format", "json", "--manifest"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"path\": \"Assets/Textures/Unused.png\""))
        .stdout(predicate::str::contains("\"included\": false"))
        .stdout(predicate::str::contains("Assets/Textures/A.png").not());
}

#[test]
fn manifest_from_environment() {
    explorer()
        .env("ASSET_EXPLORER_MANIFEST", fixture())
        .args(["usages", "--filter", "t:texture", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Assets/Textures/Unused.png"))
        .stdout(predicate::str::contains("Assets/Prefabs/Wall.prefab").not())
        .stdout(predicate::str::contains("entries").not());
}

#[test]
fn references_filtered_by_root() {
    explorer()
        .args(["references", "--filter", "wall", "--manifest"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("Assets/Prefabs/Wall.prefab"))
        .stdout(predicate::str::contains("m_Mesh"))
        .stdout(predicate::str::contains("Assets/Prefabs/P.prefab").not());
}

#[test]
fn referenced_by_json() {
    explorer()
        .args(["referenced-by", "--format", "json", "--manifest"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"asset\": \"Assets/Materials/M.mat\""))
        .stdout(predicate::str::contains("\"property\": \"m_Material\""));
}

#[test]
fn included_explains_reason() {
    explorer()
        .args(["included", "Assets/Textures/A.png", "--manifest"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("Assets/Textures/A.png: included (used by an included asset)"));
    explorer()
        .args(["included", "Assets/Scripts/Player.cs", "--manifest"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("included (script)"));
    explorer()
        .args(["included", "Assets/Textures/Unused.png", "--manifest"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("not included"));
}

#[test]
fn included_unknown_asset_fails() {
    explorer()
        .args(["included", "Assets/Nope.png", "--manifest"])
        .arg(fixture())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown asset"));
}

#[test]
fn density_grades_follow_level() {
    explorer()
        .args(["density", "--manifest"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("Assets/Prefabs/Wall.prefab"))
        .stdout(predicate::str::contains("64x64"))
        .stdout(predicate::str::contains("Density level 4 (100 px per meter)"));
    explorer()
        .args(["density", "--level", "1", "--manifest"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("excessive"));
}

#[test]
fn missing_manifest_is_usage_error() {
    explorer()
        .arg("usages")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Missing manifest"));
}

#[test]
fn invalid_filter_is_usage_error() {
    explorer()
        .args(["usages", "--filter", r"a\z", "--manifest"])
        .arg(fixture())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid filter"))
        .stderr(predicate::str::contains("cannot be escaped"));
}

#[test]
fn unreadable_manifest_fails() {
    explorer()
        .args(["references", "--manifest", "does/not/exist.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Load manifest failed"));
}

#[test]
fn completions_generate() {
    explorer()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("asset-relations-explorer"));
}
