//! `pagescope render`: render one page, optionally as many concurrent
//! requests sharing the same resolved plan.

use anyhow::{Context, Result, bail};
use clap::Args;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SiteConfig;
use crate::elements::Page;
use crate::render::RequestParams;

#[derive(Args, Debug)]
pub struct RenderCommand {
    /// Name of the page (`[pages.<name>]`)
    pub(super) page: String,

    /// Request parameter, available to templates as `{Request.<key>}`
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub(super) params: Vec<(String, String)>,

    /// Number of concurrent requests to render
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub(super) requests: u16,

    /// Write the HTML to a file instead of stdout
    #[arg(short, long)]
    pub(super) output: Option<PathBuf>,
}

fn parse_param(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{text}'")),
    }
}

impl RenderCommand {
    pub async fn execute(self, site_path: &Path) -> Result<()> {
        let site = SiteConfig::load(site_path)?;
        let catalog = Arc::new(site.build_catalog());
        let page = Arc::new(site.assemble_page(&self.page, catalog)?);
        let request: RequestParams = self.params.into_iter().collect();

        let html = render_concurrently(page, request, usize::from(self.requests)).await?;
        match self.output {
            Some(path) => {
                tokio::fs::write(&path, &html)
                    .await
                    .with_context(|| format!("Failed to write output file: {}", path.display()))?;
                info!("Wrote page '{}' to {}", self.page, path.display());
            }
            None => println!("{html}"),
        }
        Ok(())
    }
}

/// Render `requests` copies of the same request on blocking worker threads.
///
/// Every request gets its own data context tree; only the page's resolved
/// plan is shared. All renders must produce the same HTML.
pub async fn render_concurrently(
    page: Arc<Page>,
    request: RequestParams,
    requests: usize,
) -> Result<String> {
    let handles = (0..requests).map(|index| {
        let page = Arc::clone(&page);
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            debug!("Rendering request {} of page '{}'", index + 1, page.name());
            page.render(request)
        })
    });

    let mut first: Option<String> = None;
    for (index, joined) in join_all(handles).await.into_iter().enumerate() {
        let html = joined.context("Render task panicked")??;
        match &first {
            None => first = Some(html),
            Some(expected) if *expected != html => {
                bail!("Request {} of page '{}' rendered different output", index + 1, page.name())
            }
            Some(_) => {}
        }
    }

    let html = first.context("No requests were rendered")?;
    info!("Rendered page '{}' for {} request(s)", page.name(), requests);
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SAMPLE_SITE;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("q=a=b").unwrap(), ("q".to_string(), "a=b".to_string()));
        assert_eq!(parse_param("empty=").unwrap(), ("empty".to_string(), String::new()));
        assert!(parse_param("=x").is_err());
        assert!(parse_param("flag").is_err());
    }

    #[tokio::test]
    async fn test_concurrent_requests_agree() {
        let site = SiteConfig::from_toml_str(SAMPLE_SITE).unwrap();
        let page = Arc::new(site.assemble_page("catalog", Arc::new(site.build_catalog())).unwrap());
        let single = page.render(RequestParams::new()).unwrap();

        let html = render_concurrently(page, RequestParams::new(), 16).await.unwrap();
        assert_eq!(html, single);
    }
}
