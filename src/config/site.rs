//! The site file: engine settings, data suppliers and page definitions.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::parse_config;
use crate::constants::{DEFAULT_INDENT, DEFAULT_MAX_REPEAT_DEPTH};
use crate::core::ScopeError;
use crate::data::{
    DataCatalog, DataDependency, DataValue, DerivedValueSupplier, RequestSupplier,
    StaticValueSupplier,
};
use crate::elements::{Page, PageAssembler, PageDefinition, RenderSettings};

/// A whole site.
///
/// ```toml
/// [engine]
/// repair_missing_data = true
/// max_repeat_depth = 16
/// indent = 2
///
/// [[data]]
/// name = "products"
/// provides = "list<Product>@catalog"
/// value = [{ name = "Kettle" }]
///
/// [[derived]]
/// name = "variants"
/// provides = "list<Variant>@product"
/// source = "Product@current"
/// path = "variants"
///
/// [pages.catalog]
/// title = "Catalog"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    /// Fixed values registered in the data catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<DataEntry>,

    /// Values projected out of other dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedEntry>,

    #[serde(default)]
    pub pages: BTreeMap<String, PageDefinition>,
}

/// `[engine]` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Resolve dependencies discovered missing mid-render and retry once.
    #[serde(default = "default_repair_missing_data")]
    pub repair_missing_data: bool,

    #[serde(default = "default_max_repeat_depth")]
    pub max_repeat_depth: usize,

    /// Spaces per nesting level in the output; 0 writes compact markup.
    #[serde(default = "default_indent")]
    pub indent: usize,
}

const fn default_repair_missing_data() -> bool {
    true
}

const fn default_max_repeat_depth() -> usize {
    DEFAULT_MAX_REPEAT_DEPTH
}

const fn default_indent() -> usize {
    DEFAULT_INDENT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repair_missing_data: default_repair_missing_data(),
            max_repeat_depth: default_max_repeat_depth(),
            indent: default_indent(),
        }
    }
}

impl From<EngineConfig> for RenderSettings {
    fn from(engine: EngineConfig) -> Self {
        Self {
            repair_missing_data: engine.repair_missing_data,
            max_repeat_depth: engine.max_repeat_depth,
            indent: engine.indent,
        }
    }
}

/// `[[data]]`: a static value supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub name: String,
    pub provides: DataDependency,
    pub value: DataValue,
}

/// `[[derived]]`: a supplier projecting `path` out of `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedEntry {
    pub name: String,
    pub provides: DataDependency,
    pub source: DataDependency,
    #[serde(default)]
    pub path: String,
}

impl SiteConfig {
    /// Load and validate a site file.
    pub fn load(path: &Path) -> Result<Self> {
        let site: Self = parse_config(path)?;
        site.validate().with_context(|| format!("Invalid site file: {}", path.display()))?;
        Ok(site)
    }

    /// Parse and validate a site from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let site: Self = toml::from_str(content).context("Failed to parse site definition")?;
        site.validate()?;
        Ok(site)
    }

    /// Check constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ScopeError> {
        if self.engine.max_repeat_depth == 0 {
            return Err(ScopeError::ConfigError {
                message: "engine.max_repeat_depth must be at least 1".to_string(),
            });
        }

        let mut names = HashSet::new();
        let supplier_names = self
            .data
            .iter()
            .map(|entry| &entry.name)
            .chain(self.derived.iter().map(|entry| &entry.name));
        for name in supplier_names {
            if name == "request" {
                return Err(ScopeError::ConfigError {
                    message: "supplier name 'request' is reserved".to_string(),
                });
            }
            if !names.insert(name) {
                return Err(ScopeError::ConfigError {
                    message: format!("supplier '{name}' is defined more than once"),
                });
            }
        }

        for entry in &self.derived {
            if entry.source == entry.provides {
                return Err(ScopeError::ConfigError {
                    message: format!("derived supplier '{}' reads what it provides", entry.name),
                });
            }
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        self.engine.into()
    }

    /// The data catalog described by this site. The request supplier comes
    /// first, then `[[data]]` and `[[derived]]` entries in file order.
    pub fn build_catalog(&self) -> DataCatalog {
        let mut catalog = DataCatalog::new();
        catalog.register(Arc::new(RequestSupplier::new()));
        for entry in &self.data {
            catalog.register(Arc::new(StaticValueSupplier::new(
                &entry.name,
                entry.provides.clone(),
                entry.value.clone(),
            )));
        }
        for entry in &self.derived {
            catalog.register(Arc::new(DerivedValueSupplier::new(
                &entry.name,
                entry.provides.clone(),
                entry.source.clone(),
                &entry.path,
            )));
        }
        debug!("Built data catalog with {} suppliers", catalog.len());
        catalog
    }

    pub fn page_names(&self) -> Vec<String> {
        self.pages.keys().cloned().collect()
    }

    /// Assemble and resolve one page against `catalog`.
    pub fn assemble_page(&self, name: &str, catalog: Arc<DataCatalog>) -> Result<Page, ScopeError> {
        let definition = self.pages.get(name).ok_or_else(|| ScopeError::PageNotFound {
            name: name.to_string(),
            available: self.page_names(),
        })?;
        PageAssembler::assemble(name, definition, catalog, self.render_settings())
    }
}
