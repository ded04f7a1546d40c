//! `pagescope plan`: show where every supply of a page was placed.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::OutputFormat;
use crate::config::SiteConfig;
use crate::resolver::PlannedNode;

#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Page to show; all pages when omitted
    page: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl PlanCommand {
    pub fn execute(self, site_path: &Path) -> Result<()> {
        let site = SiteConfig::load(site_path)?;
        print!("{}", self.plan_output(&site)?);
        Ok(())
    }

    fn plan_output(&self, site: &SiteConfig) -> Result<String> {
        let names = match &self.page {
            Some(page) => vec![page.clone()],
            None => site.page_names(),
        };
        let catalog = Arc::new(site.build_catalog());

        let mut text = String::new();
        let mut plans: BTreeMap<String, Vec<PlannedNode>> = BTreeMap::new();
        for name in names {
            let page = site.assemble_page(&name, Arc::clone(&catalog))?;
            match self.format {
                OutputFormat::Text => {
                    text.push_str(&format!("{}\n", name.bold()));
                    text.push_str(&page.tree().to_tree_string());
                    text.push('\n');
                }
                OutputFormat::Json => {
                    plans.insert(name, page.tree().plan());
                }
            }
        }

        if self.format == OutputFormat::Json {
            text = serde_json::to_string_pretty(&plans)?;
            text.push('\n');
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SAMPLE_SITE;

    #[test]
    fn test_text_plan() {
        colored::control::set_override(false);
        let site = SiteConfig::from_toml_str(SAMPLE_SITE).unwrap();
        let command = PlanCommand {
            page: None,
            format: OutputFormat::Text,
        };
        let output = command.plan_output(&site).unwrap();
        assert!(output.starts_with("catalog\n#0 page"));
        assert!(output.contains("list<Product>@catalog <- products (static)"));
        assert!(output.contains("list<Variant>@product <- variants"));
    }

    #[test]
    fn test_json_plan() {
        let site = SiteConfig::from_toml_str(SAMPLE_SITE).unwrap();
        let command = PlanCommand {
            page: Some("catalog".to_string()),
            format: OutputFormat::Json,
        };
        let output = command.plan_output(&site).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        let nodes = json["catalog"].as_array().unwrap();
        assert_eq!(nodes[0]["label"], "page");
        assert!(nodes.len() >= 3);
    }

    #[test]
    fn test_unknown_page() {
        let site = SiteConfig::from_toml_str(SAMPLE_SITE).unwrap();
        let command = PlanCommand {
            page: Some("missing".to_string()),
            format: OutputFormat::Text,
        };
        assert!(command.plan_output(&site).is_err());
    }
}
