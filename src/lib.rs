//! pagescope - data scope and supply resolution for page rendering
//!
//! Pages are trees of elements. Some elements own a *scope node* that holds
//! data during a render; leaf components *consume* typed data dependencies
//! such as `Customer` or `Product@current`. Before any request is served,
//! pagescope decides once, per page, which supplier fills each dependency and
//! at which scope node. Every request then only runs that plan.
//!
//! # Architecture Overview
//!
//! ```text
//! site.toml ──► SiteConfig ──► DataCatalog ─┐
//!                    │                      ▼
//!                    └──► PageAssembler ──► ScopeTreeBuilder
//!                                              │ resolve_supplies()
//!                                              ▼
//!                 request ──► Page::render ──► ScopeTree (immutable, shared)
//!                                              │ setup_data_context()
//!                                              ▼
//!                                         RenderContext ──► HTML
//! ```
//!
//! - Resolution errors (no supplier, supplier mismatch, supply cycle) are
//!   raised by [`resolver::ScopeTreeBuilder::resolve_supplies`] and make the
//!   page unusable.
//! - A dependency first discovered during a render (for example after a
//!   template was replaced) is resolved late, persisted in the tree, and the
//!   render is retried once.
//! - One resolved [`elements::Page`] serves any number of concurrent requests;
//!   each request owns its data contexts.
//!
//! # Core Modules
//!
//! - [`data`] - dependencies, values, supplies, suppliers and the catalog
//! - [`resolver`] - scope tree construction and supply resolution
//! - [`render`] - per-request data contexts and the HTML writer
//! - [`elements`] - page definitions, templates and page assembly
//! - [`config`] - the site file
//! - [`cli`] - the `pagescope` command
//! - [`core`] - node ids and error types
//!
//! # Example
//!
//! ```rust,no_run
//! use pagescope::config::SiteConfig;
//! use pagescope::render::RequestParams;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let site = SiteConfig::load(Path::new("site.toml"))?;
//! let catalog = Arc::new(site.build_catalog());
//! let page = site.assemble_page("catalog", catalog)?;
//!
//! let html = page.render(RequestParams::new())?;
//! println!("{html}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod data;
pub mod elements;
pub mod render;
pub mod resolver;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
