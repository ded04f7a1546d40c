//! `pagescope validate`: resolve every page of a site without rendering.
//!
//! Resolution errors (unsatisfiable dependencies, supplier mismatches and
//! supply cycles) surface here rather than on the first request.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::OutputFormat;
use crate::config::SiteConfig;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct PageReport {
    page: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope_nodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn check_pages(site: &SiteConfig) -> Vec<PageReport> {
    let catalog = Arc::new(site.build_catalog());
    site.page_names()
        .into_iter()
        .map(|page| match site.assemble_page(&page, Arc::clone(&catalog)) {
            Ok(assembled) => PageReport {
                page,
                valid: true,
                scope_nodes: Some(assembled.tree().len()),
                error: None,
            },
            Err(e) => PageReport {
                page,
                valid: false,
                scope_nodes: None,
                error: Some(e.to_string()),
            },
        })
        .collect()
}

impl ValidateCommand {
    pub fn execute(self, site_path: &Path) -> Result<()> {
        let site = SiteConfig::load(site_path)?;
        let reports = check_pages(&site);

        match self.format {
            OutputFormat::Text => {
                for report in &reports {
                    match &report.error {
                        None => println!(
                            "{} {} ({} scope nodes)",
                            "✓".green(),
                            report.page,
                            report.scope_nodes.unwrap_or_default()
                        ),
                        Some(error) => println!("{} {}: {}", "✗".red(), report.page, error),
                    }
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        }

        let failed = reports.iter().filter(|report| !report.valid).count();
        if failed > 0 {
            bail!("{failed} of {} pages failed to resolve", reports.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SAMPLE_SITE;

    #[test]
    fn test_reports_each_page() {
        let mut source = SAMPLE_SITE.to_string();
        source.push_str(
            r#"
[pages.broken]
[[pages.broken.children]]
kind = "component"
template = "{Weather.today}"
"#,
        );
        let site = SiteConfig::from_toml_str(&source).unwrap();
        let reports = check_pages(&site);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].page, "broken");
        assert!(!reports[0].valid);
        assert!(reports[0].error.as_deref().unwrap().contains("Weather"));
        assert_eq!(reports[1].page, "catalog");
        assert!(reports[1].valid);
    }
}
