use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn build_rejects_missing_manifest() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = Command::cargo_bin("sflowg")?;

    cmd.arg("build").arg(dir.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("build failed"));

    Ok(())
}

#[test]
fn check_validates_manifest_without_compiling() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("sflowg.yaml"),
        "name: demo\nplugins:\n  - source: http\n",
    )?;

    let mut cmd = Command::cargo_bin("sflowg")?;
    cmd.arg("build").arg(dir.path()).arg("--check");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("manifest valid"));

    Ok(())
}
