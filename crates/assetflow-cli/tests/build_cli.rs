//! Integration tests for `assetflow build`.

use serial_test::serial;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "assetflow-cli", "--bin", "assetflow", "--"]);
    cmd
}

fn scaffold(dir: &Path) {
    std::fs::create_dir_all(dir.join("src/scss")).unwrap();
    std::fs::create_dir_all(dir.join("src/js")).unwrap();
    std::fs::write(
        dir.join("src/scss/main.scss"),
        ".nav { user-select: none; a { color: red; } }\n",
    )
    .unwrap();
    std::fs::write(dir.join("src/js/app.ts"), "const count: number = 1;\nconsole.log(count);\n")
        .unwrap();
}

#[test]
#[serial]
fn test_build_production_by_default() {
    let dir = tempdir().unwrap();
    scaffold(dir.path());

    let output = cargo_bin()
        .args(["build", "--json", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run build command");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
    assert_eq!(json["ok"], true);
    assert_eq!(json["mode"], "production");
    assert_eq!(json["pipelines"].as_array().unwrap().len(), 3);

    let css = std::fs::read_to_string(dir.path().join("assets/css/main.css")).unwrap();
    assert!(css.contains("-webkit-user-select"));
    assert!(!css.contains("sourceMappingURL"));
    assert!(dir.path().join("assets/js/app.js").exists());
}

#[test]
#[serial]
fn test_build_mode_override_writes_maps() {
    let dir = tempdir().unwrap();
    scaffold(dir.path());

    let output = cargo_bin()
        .args(["build", "--mode", "development", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run build command");

    assert!(output.status.success());
    assert!(dir.path().join("assets/css/main.css.map").exists());
    assert!(dir.path().join("assets/js/app.js.map").exists());
}

#[test]
#[serial]
fn test_build_fails_on_invalid_scss() {
    let dir = tempdir().unwrap();
    scaffold(dir.path());
    std::fs::write(dir.path().join("src/scss/broken.scss"), ".x { color: ").unwrap();

    let output = cargo_bin()
        .args(["build", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run build command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: "), "stderr: {stderr}");
    assert!(stderr.contains("broken.scss"));
    // The valid stylesheet is still written.
    assert!(dir.path().join("assets/css/main.css").exists());
}

#[test]
#[serial]
fn test_build_with_explicit_config() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("site/styles")).unwrap();
    std::fs::write(dir.path().join("site/styles/theme.scss"), ".t { top: 0 }").unwrap();
    std::fs::write(
        dir.path().join("site.json"),
        r#"{"rootDir": "site", "srcDir": ".", "scssDir": "styles", "distDir": "public", "cssDist": "styles"}"#,
    )
    .unwrap();

    let output = cargo_bin()
        .args(["build", "--config", "site.json", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run build command");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(dir.path().join("site/public/styles/theme.css").exists());
}
