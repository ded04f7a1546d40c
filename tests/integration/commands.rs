use predicates::prelude::*;

use crate::common::{BROKEN_SITE, TestSite};
use pagescope::test_utils::SAMPLE_SITE;

#[test]
fn test_render_to_stdout() {
    let site = TestSite::new(SAMPLE_SITE).unwrap();
    site.command()
        .args(["render", "catalog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<li>Kettle: 30<section><span>red</span>"));
}

#[test]
fn test_render_with_params_and_output_file() {
    let site = TestSite::new(
        r#"
[engine]
indent = 0

[pages.search]
[[pages.search.children]]
kind = "component"
template = "Results for {Request.q}"
"#,
    )
    .unwrap();
    site.command()
        .args(["render", "search", "--param", "q=lamps", "--requests", "4", "-o", "out.html"])
        .assert()
        .success();

    let html = std::fs::read_to_string(site.path().join("out.html")).unwrap();
    assert_eq!(html, "<main class=\"search\">Results for lamps</main>");
}

#[test]
fn test_render_unknown_page() {
    let site = TestSite::new(SAMPLE_SITE).unwrap();
    site.command()
        .args(["render", "home"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("home").and(predicate::str::contains("catalog")));
}

#[test]
fn test_missing_site_file() {
    let site = TestSite::new(SAMPLE_SITE).unwrap();
    site.command()
        .args(["--site", "nowhere.toml", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere.toml"));
}

#[test]
fn test_plan_text_and_json() {
    let site = TestSite::new(SAMPLE_SITE).unwrap();
    site.command()
        .args(["plan", "catalog"])
        .env("NO_COLOR", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("list<Product>@catalog <- products (static)"));

    let output = site.command().args(["plan", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["catalog"][0]["label"], "page");
}

#[test]
fn test_validate_success() {
    let site = TestSite::new(SAMPLE_SITE).unwrap();
    site.command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓").and(predicate::str::contains("catalog")));
}

#[test]
fn test_validate_reports_failing_page() {
    let site = TestSite::new(BROKEN_SITE).unwrap();
    site.command()
        .args(["validate", "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"valid\": false"))
        .stderr(predicate::str::contains("1 of 2 pages failed"));
}

#[test]
fn test_site_from_environment() {
    let site = TestSite::new(SAMPLE_SITE).unwrap();
    let mut cmd = site.command();
    cmd.current_dir(std::env::temp_dir()).env("PAGESCOPE_SITE", site.site_path());
    cmd.args(["render", "catalog"]).assert().success();
}
