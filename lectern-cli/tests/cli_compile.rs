use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[allow(deprecated)]
fn lectern() -> Command {
    Command::cargo_bin("lectern").expect("lectern binary")
}

#[test]
fn init_then_compile_writes_pages() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    lectern()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("lectern initialized"));
    assert!(dir.path().join("lectern.yml").exists());
    assert!(dir.path().join("content/hello-world.md").exists());

    lectern()
        .current_dir(dir.path())
        .arg("compile")
        .assert()
        .success()
        .stdout(predicate::str::contains("Compiled 1 entries: 2 pages written"));

    let page = fs::read_to_string(dir.path().join("output/2024/hello-world/index.html"))?;
    assert!(page.contains("<h2>Hello</h2>"));
    assert!(dir.path().join("output/index.html").exists());

    lectern()
        .current_dir(dir.path())
        .arg("compile")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 pages written"));

    Ok(())
}

#[test]
fn renaming_the_site_rewrites_pages() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    lectern().current_dir(dir.path()).arg("init").assert().success();
    lectern().current_dir(dir.path()).arg("compile").assert().success();

    let config_path = dir.path().join("lectern.yml");
    let config = fs::read_to_string(&config_path)?;
    fs::write(&config_path, config.replace("\"My Blog\"", "\"Field Notes\""))?;

    lectern()
        .current_dir(dir.path())
        .arg("compile")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 pages written"));

    let page = fs::read_to_string(dir.path().join("output/index.html"))?;
    assert!(page.contains("Field Notes"));

    Ok(())
}

#[test]
fn compile_reports_unknown_filters() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("content"))?;
    fs::write(dir.path().join("lectern.yml"), "site:\n  title: Test\n")?;
    fs::write(
        dir.path().join("content/post.md"),
        "---\ntitle: Post\ndate: 2024-02-02\nfilter: glitter\n---\nbody\n",
    )?;

    lectern()
        .current_dir(dir.path())
        .arg("compile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No such filter: glitter"));

    lectern()
        .current_dir(dir.path())
        .args(["compile", "--ignore"])
        .assert()
        .success();
    assert!(dir.path().join("output/2024/post/index.html").exists());

    Ok(())
}

#[test]
fn clean_removes_cache() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    lectern().current_dir(dir.path()).arg("init").assert().success();
    lectern().current_dir(dir.path()).arg("compile").assert().success();

    let cache = dir.path().join(".cache/lectern");
    assert!(fs::read_dir(&cache)?.next().is_some());

    lectern()
        .current_dir(dir.path())
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cache buckets"));
    assert!(fs::read_dir(&cache)?.next().is_none());

    Ok(())
}

#[test]
fn missing_config_fails() {
    let dir = tempdir().unwrap();
    lectern()
        .current_dir(dir.path())
        .arg("compile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
