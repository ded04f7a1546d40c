//! Page assembly and per-request rendering.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Element, ElementDefinition, PageDefinition, Repeat, Template, WriteContext};
use crate::constants::{DEFAULT_INDENT, DEFAULT_MAX_REPEAT_DEPTH};
use crate::core::{BuilderId, ScopeError};
use crate::data::{
    ConsumerNeeds, DataCatalog, DataConsumer, DataDependency, ItemSupply, ScopeRules,
};
use crate::render::{HtmlWriter, RenderContext, RequestParams, escape_html};
use crate::resolver::{ScopeTree, ScopeTreeBuilder};

/// Engine settings applied when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Resolve dependencies discovered missing mid-render and retry once.
    pub repair_missing_data: bool,
    pub max_repeat_depth: usize,
    /// Spaces per nesting level; 0 writes compact markup.
    pub indent: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            repair_missing_data: true,
            max_repeat_depth: DEFAULT_MAX_REPEAT_DEPTH,
            indent: DEFAULT_INDENT,
        }
    }
}

/// Declared needs of one element.
struct ElementConsumer {
    name: String,
    needs: ConsumerNeeds,
}

impl DataConsumer for ElementConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs(&self) -> ConsumerNeeds {
        self.needs.clone()
    }
}

/// Turns a [`PageDefinition`] into a resolved [`Page`].
pub struct PageAssembler {
    name: String,
    builder: ScopeTreeBuilder,
    templates: DashMap<String, Template>,
    components: usize,
}

impl PageAssembler {
    fn new(name: &str, scopes: &[DataDependency], catalog: Arc<DataCatalog>) -> Self {
        Self {
            name: name.to_string(),
            builder: ScopeTreeBuilder::new(scope_rules(scopes), catalog),
            templates: DashMap::new(),
            components: 0,
        }
    }

    /// Assemble and resolve a page.
    ///
    /// # Errors
    ///
    /// Template errors, and every resolution error of
    /// [`ScopeTreeBuilder::resolve_supplies`].
    pub fn assemble(
        name: &str,
        definition: &PageDefinition,
        catalog: Arc<DataCatalog>,
        settings: RenderSettings,
    ) -> Result<Page, ScopeError> {
        let mut assembler = Self::new(name, &definition.scopes, catalog);
        assembler.builder.set_label(BuilderId::ROOT, name)?;
        let elements = assembler.add_elements(BuilderId::ROOT, &definition.children)?;

        let tree = assembler.builder.resolve_supplies()?;
        info!("Assembled page '{}' with {} scope nodes", name, tree.len());
        Ok(Page {
            name: assembler.name,
            title: definition.title.clone(),
            tree,
            elements,
            templates: assembler.templates,
            settings,
        })
    }

    fn add_elements(
        &mut self,
        parent: BuilderId,
        definitions: &[ElementDefinition],
    ) -> Result<Vec<Element>, ScopeError> {
        definitions.iter().map(|definition| self.add_element(parent, definition)).collect()
    }

    fn add_element(
        &mut self,
        parent: BuilderId,
        definition: &ElementDefinition,
    ) -> Result<Element, ScopeError> {
        match definition {
            ElementDefinition::Layout {
                class,
                scopes,
                children,
            } => {
                let node = if scopes.is_empty() {
                    None
                } else {
                    let node = self.builder.add_child(parent, scope_rules(scopes))?;
                    self.builder.set_label(node, label("layout", class.as_deref()))?;
                    Some(node)
                };
                Ok(Element::Layout {
                    class: class.clone(),
                    node,
                    children: self.add_elements(node.unwrap_or(parent), children)?,
                })
            }
            ElementDefinition::Region {
                class,
                scopes,
                repeat,
                children,
            } => {
                let mut rules = scope_rules(scopes);
                if let Some(repeat) = repeat {
                    if !rules.declares(&repeat.item) {
                        rules = rules.with_scope(repeat.item.clone());
                    }
                    rules = rules.with_supply(Arc::new(ItemSupply::new(repeat.item.clone())));
                }
                let node = self.builder.add_child(parent, rules)?;
                let region_label = label("region", class.as_deref());
                self.builder.set_label(node, region_label.clone())?;

                if let Some(repeat) = repeat {
                    self.builder.add_consumer(
                        parent,
                        Arc::new(ElementConsumer {
                            name: region_label,
                            needs: ConsumerNeeds::new().with_dependency(repeat.list.clone()),
                        }),
                    )?;
                }

                Ok(Element::Region {
                    class: class.clone(),
                    node,
                    repeat: repeat.as_ref().map(|repeat| Repeat {
                        list: repeat.list.clone(),
                        item: repeat.item.clone(),
                        tag: repeat.tag.clone(),
                    }),
                    children: self.add_elements(node, children)?,
                })
            }
            ElementDefinition::Component {
                name,
                template,
            } => {
                self.components += 1;
                let name = name.clone().unwrap_or_else(|| format!("component{}", self.components));
                if self.templates.contains_key(&name) {
                    return Err(ScopeError::InvalidTemplate {
                        name,
                        reason: "another component already uses this name".to_string(),
                    });
                }

                let parsed = Template::parse(&name, template)?;
                let needs = parsed
                    .dependencies()
                    .into_iter()
                    .fold(ConsumerNeeds::new(), ConsumerNeeds::with_dependency);
                self.builder.add_consumer(
                    parent,
                    Arc::new(ElementConsumer {
                        name: name.clone(),
                        needs,
                    }),
                )?;
                self.templates.insert(name.clone(), parsed);
                Ok(Element::Component {
                    template: name,
                })
            }
        }
    }
}

fn scope_rules(scopes: &[DataDependency]) -> ScopeRules {
    scopes.iter().cloned().fold(ScopeRules::new(), ScopeRules::with_scope)
}

fn label(kind: &str, class: Option<&str>) -> String {
    match class {
        Some(class) => format!("{kind}.{class}"),
        None => kind.to_string(),
    }
}

/// An assembled page, shared by every request that renders it.
pub struct Page {
    name: String,
    title: Option<String>,
    tree: ScopeTree,
    elements: Vec<Element>,
    templates: DashMap<String, Template>,
    settings: RenderSettings,
}

impl Page {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    /// Names of the component templates, sorted.
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Replace a component's template after the page was resolved.
    ///
    /// Dependencies the new text introduces are not resolved here; the first
    /// render that reads them repairs the plan.
    pub fn update_template(&self, name: &str, source: &str) -> Result<(), ScopeError> {
        let parsed = Template::parse(name, source)?;
        match self.templates.get_mut(name) {
            Some(mut entry) => {
                debug!("Replacing template '{}' of page '{}'", name, self.name);
                *entry = parsed;
                Ok(())
            }
            None => Err(ScopeError::InvalidTemplate {
                name: name.to_string(),
                reason: format!("page '{}' has no component with this name", self.name),
            }),
        }
    }

    /// Render the page for one request.
    ///
    /// A dependency discovered missing mid-render is resolved, the data
    /// context tree rebuilt and the page written again, once. Failing again
    /// is reported as [`ScopeError::RenderFailed`].
    pub fn render(&self, request: RequestParams) -> Result<String, ScopeError> {
        let mut render_context = RenderContext::new(request, HtmlWriter::new(self.settings.indent));
        self.tree.setup_data_context(&mut render_context)?;

        match self.write(&mut render_context) {
            Ok(()) => Ok(render_context.into_output()),
            Err(ScopeError::MissingAtRender {
                dependency,
                node,
            }) if self.settings.repair_missing_data => {
                warn!("Page '{}' read unresolved {} in scope node {}", self.name, dependency, node);
                self.repair_and_retry(&mut render_context, &dependency, node)?;
                Ok(render_context.into_output())
            }
            Err(error) => Err(error),
        }
    }

    fn repair_and_retry(
        &self,
        render_context: &mut RenderContext,
        dependency: &DataDependency,
        node: BuilderId,
    ) -> Result<(), ScopeError> {
        let failed = |error: ScopeError| ScopeError::RenderFailed {
            page: self.name.clone(),
            reason: error.to_string(),
        };

        render_context.select_data_context(node).map_err(failed)?;
        self.tree.add_missing_data(render_context, dependency).map_err(failed)?;

        render_context.writer_mut().clear();
        render_context.select_data_context(BuilderId::ROOT).map_err(failed)?;
        self.write(render_context).map_err(failed)
    }

    fn write(&self, render_context: &mut RenderContext) -> Result<(), ScopeError> {
        let cx = WriteContext {
            tree: &self.tree,
            templates: &self.templates,
            max_repeat_depth: self.settings.max_repeat_depth,
        };

        render_context.writer_mut().open_element("main", Some(&self.name));
        if let Some(title) = &self.title {
            render_context.writer_mut().write_raw(&format!("<h1>{}</h1>", escape_html(title)));
        }
        for element in &self.elements {
            element.write(&cx, render_context)?;
        }
        render_context.writer_mut().close_element("main");
        Ok(())
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("name", &self.name)
            .field("nodes", &self.tree.len())
            .field("templates", &self.template_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{product_catalog, product_list_dependency};
    use serde_json::json;

    fn compact() -> RenderSettings {
        RenderSettings {
            indent: 0,
            ..RenderSettings::default()
        }
    }

    fn catalog_page() -> PageDefinition {
        toml::from_str(
            r#"
title = "Shop"

[[children]]
kind = "component"
name = "greeting"
template = "Hello {Customer.name}"

[[children]]
kind = "region"
class = "products"
repeat = { list = "list<Product>@catalog", item = "Product@current", tag = "li" }

[[children.children]]
kind = "component"
template = "{Product@current.name}"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_product_catalog_scenario() {
        let page =
            PageAssembler::assemble("shop", &catalog_page(), Arc::new(product_catalog()), compact())
                .unwrap();

        let html = page.render(RequestParams::new()).unwrap();
        assert_eq!(
            html,
            "<main class=\"shop\"><h1>Shop</h1>Hello Ada<section class=\"products\">\
             <li>Kettle</li><li>Toaster</li></section></main>"
        );

        // The item is only ever supplied to the region, never to the page
        let root = page.tree().root();
        assert!(root.supply_of(&crate::test_utils::current_product_dependency()).is_none());
        assert!(root.supply_of(&product_list_dependency()).is_some());
    }

    #[test]
    fn test_absent_list_renders_nothing() {
        let catalog = DataCatalog::new().with_supplier(Arc::new(crate::data::FnSupplier::new(
            "nothing",
            product_list_dependency(),
            true,
            Arc::new(|_| Ok(None)),
        )));
        let definition: PageDefinition = toml::from_str(
            r#"
[[children]]
kind = "region"
repeat = { list = "list<Product>@catalog", item = "Product@current" }
[[children.children]]
kind = "component"
template = "{Product@current.name}"
"#,
        )
        .unwrap();
        let page =
            PageAssembler::assemble("empty", &definition, Arc::new(catalog), compact()).unwrap();
        assert_eq!(
            page.render(RequestParams::new()).unwrap(),
            "<main class=\"empty\"><section></section></main>"
        );
    }

    #[test]
    fn test_non_list_value_is_a_type_mismatch() {
        let catalog = DataCatalog::new().with_supplier(Arc::new(
            crate::data::StaticValueSupplier::new("bad", product_list_dependency(), json!("oops")),
        ));
        let definition: PageDefinition = toml::from_str(
            r#"
[[children]]
kind = "region"
repeat = { list = "list<Product>@catalog", item = "Product@current" }
"#,
        )
        .unwrap();
        let page = PageAssembler::assemble("bad", &definition, Arc::new(catalog), compact()).unwrap();
        assert!(matches!(
            page.render(RequestParams::new()),
            Err(ScopeError::DataTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_updated_template_is_repaired_once() {
        crate::test_utils::init_test_logging(None);
        let catalog = product_catalog().with_supplier(Arc::new(
            crate::data::StaticValueSupplier::new(
                "basket",
                DataDependency::unscoped("Basket"),
                json!({ "count": 2 }),
            ),
        ));
        let page =
            PageAssembler::assemble("shop", &catalog_page(), Arc::new(catalog), compact()).unwrap();
        assert_eq!(page.tree().late_supply_count(), 0);
        page.update_template("greeting", "Hello {Customer.name}, {Basket.count} items").unwrap();

        let html = page.render(RequestParams::new()).unwrap();
        assert!(html.starts_with("<main class=\"shop\"><h1>Shop</h1>Hello Ada, 2 items<section"));
        assert_eq!(html.matches("<li>").count(), 2);
        assert_eq!(page.tree().late_supply_count(), 1);

        // The next request takes the steady-state path
        assert_eq!(page.render(RequestParams::new()).unwrap(), html);
        assert_eq!(page.tree().late_supply_count(), 1);
    }

    #[test]
    fn test_unrepairable_dependency_fails_the_request() {
        let page =
            PageAssembler::assemble("shop", &catalog_page(), Arc::new(product_catalog()), compact())
                .unwrap();
        page.update_template("greeting", "{Weather.today}").unwrap();

        match page.render(RequestParams::new()) {
            Err(ScopeError::RenderFailed {
                page,
                reason,
            }) => {
                assert_eq!(page, "shop");
                assert!(reason.contains("Weather"));
            }
            other => panic!("expected render failure, got {other:?}"),
        }
    }

    #[test]
    fn test_repair_disabled_surfaces_missing_data() {
        let settings = RenderSettings {
            repair_missing_data: false,
            ..compact()
        };
        let page =
            PageAssembler::assemble("shop", &catalog_page(), Arc::new(product_catalog()), settings)
                .unwrap();
        page.update_template("greeting", "{Customer.name}").unwrap();
        assert!(page.render(RequestParams::new()).is_ok());

        page.update_template("greeting", "{Basket}").unwrap();
        assert!(matches!(
            page.render(RequestParams::new()),
            Err(ScopeError::MissingAtRender { .. })
        ));
    }

    #[test]
    fn test_update_unknown_template() {
        let page =
            PageAssembler::assemble("shop", &catalog_page(), Arc::new(product_catalog()), compact())
                .unwrap();
        assert!(matches!(
            page.update_template("footer", "x"),
            Err(ScopeError::InvalidTemplate { .. })
        ));
        assert_eq!(page.template_names(), vec!["component2".to_string(), "greeting".to_string()]);
    }

    #[test]
    fn test_nested_repeat_too_deep() {
        let settings = RenderSettings {
            max_repeat_depth: 1,
            ..compact()
        };
        let definition: PageDefinition = toml::from_str(
            r#"
[[children]]
kind = "region"
repeat = { list = "list<Product>@catalog", item = "Product@current" }
[[children.children]]
kind = "region"
repeat = { list = "list<Product>@catalog", item = "Product@inner" }
"#,
        )
        .unwrap();
        let page =
            PageAssembler::assemble("deep", &definition, Arc::new(product_catalog()), settings)
                .unwrap();
        assert!(matches!(
            page.render(RequestParams::new()),
            Err(ScopeError::RepeatTooDeep { depth: 2, max: 1 })
        ));
    }
}
