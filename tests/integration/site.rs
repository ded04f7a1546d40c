use pagescope::config::SiteConfig;
use pagescope::core::ScopeError;
use pagescope::render::RequestParams;
use pagescope::test_utils::SAMPLE_SITE;
use std::sync::Arc;

use crate::common::{BROKEN_SITE, TestSite};

#[test]
fn test_load_and_render_from_disk() {
    let site_dir = TestSite::new(SAMPLE_SITE).unwrap();
    let site = SiteConfig::load(&site_dir.site_path()).unwrap();
    let page = site.assemble_page("catalog", Arc::new(site.build_catalog())).unwrap();

    let html = page.render(RequestParams::new()).unwrap();
    assert!(html.starts_with("<main class=\"catalog\"><h1>Catalog</h1>"));
    assert!(html.contains("<li>Toaster: 45<section><span>white</span></section></li>"));
    assert_eq!(page.tree().late_supply_count(), 0);
}

#[test]
fn test_unsatisfiable_dependency_suggests_name() {
    let site_dir = TestSite::new(BROKEN_SITE).unwrap();
    let site = SiteConfig::load(&site_dir.site_path()).unwrap();
    let catalog = Arc::new(site.build_catalog());

    assert!(site.assemble_page("home", Arc::clone(&catalog)).is_ok());
    match site.assemble_page("broken", catalog) {
        Err(ScopeError::UnsatisfiableDependency {
            dependency,
            suggestions,
            ..
        }) => {
            assert_eq!(dependency.to_string(), "Custmer");
            assert_eq!(suggestions, vec!["Customer".to_string()]);
        }
        other => panic!("expected UnsatisfiableDependency, got {other:?}"),
    }
}

#[test]
fn test_invalid_site_file_reports_path() {
    let site_dir = TestSite::new("[pages.home\n").unwrap();
    let error = SiteConfig::load(&site_dir.site_path()).unwrap_err();
    assert!(format!("{error:#}").contains("Failed to parse config file"));
}

#[test]
fn test_template_replacement_is_repaired_and_persisted() {
    let site_dir = TestSite::new(
        r#"
[engine]
indent = 0

[[data]]
name = "customer"
provides = "Customer"
value = { name = "Ada" }

[[data]]
name = "basket"
provides = "Basket"
value = { items = 3 }

[pages.home]
[[pages.home.children]]
kind = "component"
name = "greeting"
template = "Hi {Customer.name}"
"#,
    )
    .unwrap();
    let site = SiteConfig::load(&site_dir.site_path()).unwrap();
    let page = site.assemble_page("home", Arc::new(site.build_catalog())).unwrap();
    assert_eq!(page.render(RequestParams::new()).unwrap(), "<main class=\"home\">Hi Ada</main>");

    page.update_template("greeting", "Hi {Customer.name}, {Basket.items} items").unwrap();
    let expected = "<main class=\"home\">Hi Ada, 3 items</main>";
    assert_eq!(page.render(RequestParams::new()).unwrap(), expected);
    assert_eq!(page.tree().late_supply_count(), 1);

    // The late supply is part of the plan from now on
    assert_eq!(page.render(RequestParams::new()).unwrap(), expected);
    assert_eq!(page.tree().late_supply_count(), 1);
}
