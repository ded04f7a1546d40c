use futures::future::join_all;
use pagescope::config::SiteConfig;
use pagescope::render::RequestParams;
use std::sync::{Arc, Barrier};

const PERSONAL_SITE: &str = r#"
[engine]
indent = 0

[pages.hello]
[[pages.hello.children]]
kind = "component"
template = "Hello {Request.user}"
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requests_do_not_share_data() {
    let site = SiteConfig::from_toml_str(PERSONAL_SITE).unwrap();
    let page = Arc::new(site.assemble_page("hello", Arc::new(site.build_catalog())).unwrap());

    let handles = (0..32).map(|i| {
        let page = Arc::clone(&page);
        tokio::task::spawn_blocking(move || {
            let mut request = RequestParams::new();
            request.insert("user".to_string(), format!("user{i}"));
            (i, page.render(request))
        })
    });

    for joined in join_all(handles).await {
        let (i, html) = joined.unwrap();
        assert_eq!(html.unwrap(), format!("<main class=\"hello\">Hello user{i}</main>"));
    }
}

#[test]
fn test_repaired_plan_shared_across_threads() {
    let site = SiteConfig::from_toml_str(
        r#"
[engine]
indent = 0

[[data]]
name = "weather"
provides = "Weather"
value = "sunny"

[pages.home]
[[pages.home.children]]
kind = "component"
name = "forecast"
template = "-"
"#,
    )
    .unwrap();
    let page = Arc::new(site.assemble_page("home", Arc::new(site.build_catalog())).unwrap());
    page.update_template("forecast", "{Weather}").unwrap();
    assert_eq!(page.render(RequestParams::new()).unwrap(), "<main class=\"home\">sunny</main>");

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let page = Arc::clone(&page);
            std::thread::spawn(move || page.render(RequestParams::new()))
        })
        .collect();
    for thread in threads {
        assert_eq!(thread.join().unwrap().unwrap(), "<main class=\"home\">sunny</main>");
    }
    assert_eq!(page.tree().late_supply_count(), 1);
}

#[test]
fn test_concurrent_repairs_agree() {
    let site = SiteConfig::from_toml_str(
        r#"
[engine]
indent = 0

[[data]]
name = "weather"
provides = "Weather"
value = "rain"

[pages.home]
[[pages.home.children]]
kind = "component"
name = "forecast"
template = "-"
"#,
    )
    .unwrap();
    let page = Arc::new(site.assemble_page("home", Arc::new(site.build_catalog())).unwrap());
    page.update_template("forecast", "{Weather}").unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let page = Arc::clone(&page);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                page.render(RequestParams::new())
            })
        })
        .collect();
    for thread in threads {
        assert_eq!(thread.join().unwrap().unwrap(), "<main class=\"home\">rain</main>");
    }
    assert_eq!(page.tree().late_supply_count(), 1);
    assert_eq!(page.tree().generation(), 1);
}
