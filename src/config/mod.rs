//! Site configuration.
//!
//! A site is described by one TOML file:
//!
//! - `[engine]` - render settings ([`EngineConfig`])
//! - `[[data]]` - fixed values registered as catalog suppliers
//! - `[[derived]]` - values projected out of other dependencies
//! - `[pages.<name>]` - page element trees ([`crate::elements::PageDefinition`])
//!
//! The file is read once at startup. Its catalog and pages are then built
//! and resolved before any request is rendered, so configuration mistakes
//! such as a dependency nobody supplies stop the process early.
//!
//! ```rust,no_run
//! use pagescope::config::SiteConfig;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let site = SiteConfig::load(Path::new("site.toml"))?;
//! let catalog = Arc::new(site.build_catalog());
//! let page = site.assemble_page("catalog", catalog)?;
//! println!("{}", page.render(Default::default())?);
//! # Ok(())
//! # }
//! ```

mod parser;
mod site;

pub use parser::parse_config;
pub use site::{DataEntry, DerivedEntry, EngineConfig, SiteConfig};
