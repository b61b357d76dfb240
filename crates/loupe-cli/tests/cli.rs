use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use loupe_testing::ClassFileBuilder;

fn loupe() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("loupe"))
}

fn write_class(temp: &TempDir, dir: &str, internal: &str, bytes: Vec<u8>) {
    temp.child(format!("{dir}/{internal}.class"))
        .write_binary(&bytes)
        .unwrap();
}

#[test]
fn help_mentions_core_commands() {
    loupe().arg("--help").assert().success().stdout(
        predicate::str::contains("xref")
            .and(predicate::str::contains("structure"))
            .and(predicate::str::contains("archives")),
    );
}

#[test]
fn archives_reports_class_counts_as_json() {
    let temp = TempDir::new().unwrap();
    write_class(
        &temp,
        "classes",
        "com/util/Helper",
        ClassFileBuilder::new("com/util/Helper").build(),
    );
    write_class(
        &temp,
        "classes",
        "com/util/Other",
        ClassFileBuilder::new("com/util/Other").build(),
    );

    let output = loupe()
        .arg("archives")
        .arg("--archive")
        .arg(temp.child("classes").path())
        .arg("--json")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let archives = v["archives"].as_array().unwrap();
    assert_eq!(archives.len(), 1);
    assert_eq!(archives[0]["name"], "classes");
    assert_eq!(archives[0]["classes"].as_u64().unwrap(), 2);
}

#[test]
fn archives_prints_a_human_summary_by_default() {
    let temp = TempDir::new().unwrap();
    write_class(
        &temp,
        "deps",
        "com/util/Helper",
        ClassFileBuilder::new("com/util/Helper").build(),
    );

    loupe()
        .arg("archives")
        .arg("--archive")
        .arg(temp.child("deps").path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("archives: 1")
                .and(predicate::str::contains("deps: 1 classes")),
        );
}

#[test]
fn structure_reports_super_interfaces_and_methods() {
    let temp = TempDir::new().unwrap();
    write_class(
        &temp,
        "classes",
        "demo/Worker",
        ClassFileBuilder::new("demo/Worker")
            .super_class("demo/Base")
            .interface("java/io/Closeable")
            .method("run", "()V")
            .build(),
    );

    let output = loupe()
        .arg("structure")
        .arg("--class")
        .arg("demo/Worker")
        .arg("--archive")
        .arg(temp.child("classes").path())
        .arg("--json")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["class"], "demo/Worker");
    assert_eq!(v["archive"], "classes");
    assert_eq!(v["super_class"], "demo/Base");
    assert_eq!(v["interfaces"][0], "java/io/Closeable");
    assert_eq!(v["methods"][0]["name"], "run");
    assert_eq!(v["methods"][0]["descriptor"], "()V");
}

#[test]
fn structure_for_a_missing_class_is_a_hard_error() {
    let temp = TempDir::new().unwrap();
    write_class(
        &temp,
        "classes",
        "demo/Present",
        ClassFileBuilder::new("demo/Present").build(),
    );

    loupe()
        .arg("structure")
        .arg("--class")
        .arg("demo/Absent")
        .arg("--archive")
        .arg(temp.child("classes").path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("demo/Absent"));
}

#[test]
fn xref_links_types_resolved_from_the_corpus() {
    let temp = TempDir::new().unwrap();
    write_class(
        &temp,
        "classes",
        "com/app/Main",
        ClassFileBuilder::new("com/app/Main").build(),
    );
    write_class(
        &temp,
        "classes",
        "com/util/Helper",
        ClassFileBuilder::new("com/util/Helper").build(),
    );
    temp.child("Main.java")
        .write_str(
            r#"package com.app;

import com.util.Helper;

public class Main {
    Helper helper;
}
"#,
        )
        .unwrap();

    let output = loupe()
        .arg("xref")
        .arg("--source")
        .arg(temp.child("Main.java").path())
        .arg("--class")
        .arg("com/app/Main")
        .arg("--archive")
        .arg(temp.child("classes").path())
        .arg("--json")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["class"], "com/app/Main");
    let links = v["links"].as_array().unwrap();
    assert_eq!(links.len(), 2);
    assert!(links
        .iter()
        .all(|l| l["class_name"] == "com/util/Helper" && l["archive"] == "classes"));
    // The import link carries no anchor; the field type anchors on the name.
    assert!(links[0].get("anchor").is_none());
    assert_eq!(links[1]["anchor"]["kind"], "type");
    assert_eq!(links[1]["anchor"]["name"], "Helper");
}

#[test]
fn unparseable_sources_exit_nonzero_with_annotated_text() {
    let temp = TempDir::new().unwrap();
    temp.child("Broken.java").write_str("class {{{{").unwrap();

    loupe()
        .arg("xref")
        .arg("--source")
        .arg(temp.child("Broken.java").path())
        .arg("--class")
        .arg("demo/Broken")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Hyperlinks are disabled"));
}
