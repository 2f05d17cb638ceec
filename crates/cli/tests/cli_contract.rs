use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const BASE_ID: &str = "a1b2c3d4-0000-4000-8000-000000000001";
const OVERLAY_ID: &str = "a1b2c3d4-0000-4000-8000-000000000002";

fn legacy_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("legacy.ep");
    fs::write(
        &path,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="http://www.evolus.vn/Namespace/Pencil">
  <Properties><Property name="title">Wireframes</Property></Properties>
  <Pages>
    <Page>
      <Properties>
        <Property name="id">{BASE_ID}</Property>
        <Property name="name">Base</Property>
        <Property name="width">400</Property>
        <Property name="height">300</Property>
        <Property name="backgroundColor">#336699FF</Property>
      </Properties>
      <Content><g id="base"/></Content>
    </Page>
    <Page>
      <Properties>
        <Property name="id">{OVERLAY_ID}</Property>
        <Property name="name">Overlay</Property>
        <Property name="width">400</Property>
        <Property name="height">300</Property>
        <Property name="background">{BASE_ID}</Property>
        <Property name="parent">{BASE_ID}</Property>
      </Properties>
      <Content/>
    </Page>
  </Pages>
</Document>"#
        ),
    )
    .expect("fixture should be written");
    path
}

fn info(file: &Path) -> Value {
    let output = cargo_bin_cmd!("folio").arg("info").arg(file).assert().success().get_output().stdout.clone();

    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let value = info(&legacy_fixture(temp.path()));

    assert_eq!(value["name"], "legacy");
    assert_eq!(value["format"], "single-file");
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["properties"]["title"], "Wireframes");
    assert_eq!(value["pages"][0]["id"], BASE_ID);
    assert_eq!(value["pages"][0]["width"], 400);
    assert_eq!(value["pages"][0]["children"][0], OVERLAY_ID);
    assert_eq!(value["pages"][1]["background"], BASE_ID);
    assert_eq!(value["pages"][1]["parent"], BASE_ID);
}

#[test]
fn new_creates_archive_with_requested_pages() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let output_path = temp.path().join("out").join("blank.epz");

    cargo_bin_cmd!("folio")
        .arg("new")
        .arg("--output")
        .arg(&output_path)
        .arg("--pages")
        .arg("3")
        .arg("--width")
        .arg("320")
        .arg("--height")
        .arg("200")
        .assert()
        .success()
        .stdout(predicate::str::contains("blank.epz"));

    let value = info(&output_path);
    assert_eq!(value["format"], "archive");
    assert_eq!(value["page_count"], 3);
    for page in value["pages"].as_array().expect("pages should be an array") {
        assert_eq!(page["width"], 320);
        assert_eq!(page["height"], 200);
    }
}

#[test]
fn convert_keeps_pages_and_links() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let legacy = legacy_fixture(temp.path());
    let output_path = temp.path().join("converted.epz");

    cargo_bin_cmd!("folio").arg("convert").arg(&legacy).arg("--output").arg(&output_path).assert().success();

    let value = info(&output_path);
    assert_eq!(value["format"], "archive");
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["pages"][1]["background"], BASE_ID);
    assert_eq!(value["properties"]["title"], "Wireframes");
}

#[test]
fn thumbnail_writes_png_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let legacy = legacy_fixture(temp.path());
    let archive = temp.path().join("thumbs.epz");
    let output_path = temp.path().join("thumb.png");

    cargo_bin_cmd!("folio").arg("convert").arg(&legacy).arg("--output").arg(&archive).assert().success();
    cargo_bin_cmd!("folio")
        .arg("thumbnail")
        .arg(&archive)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    assert!(output_path.exists(), "thumbnail output file should exist");

    let image = image::open(&output_path).expect("thumbnail should be readable image").to_rgba8();
    assert_eq!(image.dimensions(), (256, 192));
    assert_eq!(image.get_pixel(0, 0).0, [0x33, 0x66, 0x99, 0xFF]);
}

#[test]
fn info_fails_for_missing_file() {
    cargo_bin_cmd!("folio")
        .arg("info")
        .arg("missing.epz")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_unknown_format() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("notes.txt");
    fs::write(&path, "plain text").expect("file should be written");

    cargo_bin_cmd!("folio")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open document"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("folio")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
