//! Reusable catalogs, suppliers and consumers for tests.

use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::ScopeError;
use crate::data::{
    ConsumerNeeds, DataCatalog, DataConsumer, DataDependency, DataSupplier, DataSupply, DataType,
    DataValue, StaticValueSupplier,
};

/// A consumer with fixed needs.
#[derive(Clone)]
pub struct TestConsumer {
    name: String,
    needs: ConsumerNeeds,
}

impl TestConsumer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            needs: ConsumerNeeds::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: DataDependency) -> Self {
        self.needs = self.needs.with_dependency(dependency);
        self
    }

    pub fn with_supplier(
        mut self,
        supplier: Arc<dyn DataSupplier>,
        dependency: DataDependency,
    ) -> Self {
        self.needs = self.needs.with_supplier(supplier, dependency);
        self
    }

    pub fn with_supply(mut self, supply: Arc<dyn DataSupply>) -> Self {
        self.needs = self.needs.with_supply(supply);
        self
    }

    pub fn into_arc(self) -> Arc<dyn DataConsumer> {
        Arc::new(self)
    }
}

impl DataConsumer for TestConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs(&self) -> ConsumerNeeds {
        self.needs.clone()
    }
}

/// Wraps a supplier and counts how many supplies it handed out.
pub struct CountingSupplier {
    inner: Arc<dyn DataSupplier>,
    supplies: AtomicUsize,
}

impl CountingSupplier {
    pub fn new(inner: Arc<dyn DataSupplier>) -> Self {
        Self {
            inner,
            supplies: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.supplies.load(Ordering::SeqCst)
    }
}

impl DataSupplier for CountingSupplier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supplied_types(&self) -> Vec<DataType> {
        self.inner.supplied_types()
    }

    fn default_dependency(&self) -> DataDependency {
        self.inner.default_dependency()
    }

    fn is_scoped(&self) -> bool {
        self.inner.is_scoped()
    }

    fn is_supplier_of(&self, dependency: &DataDependency) -> bool {
        self.inner.is_supplier_of(dependency)
    }

    fn get_supply(&self, dependency: &DataDependency) -> Result<Arc<dyn DataSupply>, ScopeError> {
        self.supplies.fetch_add(1, Ordering::SeqCst);
        self.inner.get_supply(dependency)
    }

    fn needs(&self) -> Option<ConsumerNeeds> {
        self.inner.needs()
    }
}

/// A supplier that claims a dependency but refuses to supply it.
pub struct LyingSupplier {
    dependency: DataDependency,
}

impl LyingSupplier {
    pub fn new(dependency: DataDependency) -> Self {
        Self {
            dependency,
        }
    }
}

impl DataSupplier for LyingSupplier {
    fn name(&self) -> &str {
        "liar"
    }

    fn supplied_types(&self) -> Vec<DataType> {
        vec![self.dependency.data_type.clone()]
    }

    fn default_dependency(&self) -> DataDependency {
        self.dependency.clone()
    }

    fn is_scoped(&self) -> bool {
        self.dependency.is_scoped()
    }

    fn is_supplier_of(&self, _dependency: &DataDependency) -> bool {
        false
    }

    fn get_supply(&self, dependency: &DataDependency) -> Result<Arc<dyn DataSupply>, ScopeError> {
        Err(ScopeError::SupplierMismatch {
            supplier: self.name().to_string(),
            dependency: dependency.clone(),
        })
    }
}

/// `list<Product>@catalog`
pub fn product_list_dependency() -> DataDependency {
    DataDependency::scoped("list<Product>", "catalog")
}

/// `Product@current`
pub fn current_product_dependency() -> DataDependency {
    DataDependency::scoped("Product", "current")
}

/// Two products, each with two variants.
pub fn product_list() -> DataValue {
    json!([
        {
            "name": "Kettle",
            "price": 30,
            "variants": [{ "color": "red" }, { "color": "steel" }]
        },
        {
            "name": "Toaster",
            "price": 45,
            "variants": [{ "color": "white" }, { "color": "black" }]
        }
    ])
}

/// A catalog with the product list and an unscoped `Customer`.
pub fn product_catalog() -> DataCatalog {
    DataCatalog::new()
        .with_supplier(Arc::new(StaticValueSupplier::new(
            "products",
            product_list_dependency(),
            product_list(),
        )))
        .with_supplier(Arc::new(StaticValueSupplier::new(
            "customer",
            DataDependency::unscoped("Customer"),
            json!({ "name": "Ada" }),
        )))
}

/// A site definition exercising every element kind.
pub const SAMPLE_SITE: &str = r#"
[engine]
indent = 0

[[data]]
name = "products"
provides = "list<Product>@catalog"
value = [
    { name = "Kettle", price = 30, variants = [{ color = "red" }, { color = "steel" }] },
    { name = "Toaster", price = 45, variants = [{ color = "white" }] },
]

[[data]]
name = "customer"
provides = "Customer"
value = { name = "Ada" }

[[derived]]
name = "variants"
provides = "list<Variant>@product"
source = "Product@current"
path = "variants"

[pages.catalog]
title = "Catalog"
[[pages.catalog.children]]
kind = "component"
template = "<h1>Hello {Customer.name}</h1>"

[[pages.catalog.children]]
kind = "region"
class = "products"
repeat = { list = "list<Product>@catalog", item = "Product@current", tag = "li" }
scopes = ["Product@current", "list<Variant>@product"]
[[pages.catalog.children.children]]
kind = "component"
template = "{Product@current.name}: {Product@current.price}"
[[pages.catalog.children.children]]
kind = "region"
repeat = { list = "list<Variant>@product", item = "Variant@current", tag = "span" }
[[pages.catalog.children.children.children]]
kind = "component"
template = "{Variant@current.color}"
"#;
