//! Declarative page definitions, as read from the `[pages.<name>]` tables of a
//! site file.
//!
//! ```toml
//! [pages.catalog]
//! title = "Catalog"
//!
//! [[pages.catalog.children]]
//! kind = "region"
//! class = "products"
//! repeat = { list = "list<Product>@catalog", item = "Product@current" }
//!
//! [[pages.catalog.children.children]]
//! kind = "component"
//! template = "{Product@current.name}"
//! ```

use serde::{Deserialize, Serialize};

use crate::data::DataDependency;

/// One page: the root scope node and its elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Dependencies resolved on the page node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<DataDependency>,

    #[serde(default)]
    pub children: Vec<ElementDefinition>,
}

/// An element of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ElementDefinition {
    /// Structural container. It introduces a scope node only when it
    /// declares scopes.
    Layout {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        scopes: Vec<DataDependency>,
        #[serde(default)]
        children: Vec<ElementDefinition>,
    },

    /// A scope node, optionally repeating its children once per list item.
    Region {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        scopes: Vec<DataDependency>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repeat: Option<RepeatDefinition>,
        #[serde(default)]
        children: Vec<ElementDefinition>,
    },

    /// Template text with data placeholders.
    Component {
        /// Name under which the template can be replaced later. Generated
        /// when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        template: String,
    },
}

/// How a region repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatDefinition {
    /// List-typed dependency to iterate.
    pub list: DataDependency,
    /// Dependency each item is supplied as.
    pub item: DataDependency,
    /// Element wrapping each item.
    #[serde(default = "default_item_tag")]
    pub tag: String,
}

fn default_item_tag() -> String {
    "div".to_string()
}

impl ElementDefinition {
    /// Number of elements in this subtree, including this one.
    pub fn element_count(&self) -> usize {
        match self {
            Self::Layout {
                children,
                ..
            }
            | Self::Region {
                children,
                ..
            } => 1 + children.iter().map(Self::element_count).sum::<usize>(),
            Self::Component {
                ..
            } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged_elements() {
        let page: PageDefinition = toml::from_str(
            r#"
title = "Home"
scopes = ["Customer"]

[[children]]
kind = "layout"
class = "main"

[[children.children]]
kind = "component"
name = "greeting"
template = "Hi {Customer.name}"

[[children]]
kind = "region"
repeat = { list = "list<Product>@catalog", item = "Product@current" }
"#,
        )
        .unwrap();

        assert_eq!(page.title.as_deref(), Some("Home"));
        assert_eq!(page.scopes, vec![DataDependency::unscoped("Customer")]);
        assert_eq!(page.children.len(), 2);
        assert_eq!(page.children[0].element_count(), 2);
        match &page.children[1] {
            ElementDefinition::Region {
                repeat: Some(repeat),
                ..
            } => {
                assert_eq!(repeat.list, DataDependency::scoped("list<Product>", "catalog"));
                assert_eq!(repeat.tag, "div");
            }
            other => panic!("expected a repeating region, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<PageDefinition, _> = toml::from_str(
            r#"
[[children]]
kind = "carousel"
"#,
        );
        assert!(result.is_err());
    }
}
