//! The data catalog: the resolver's fallback source of suppliers.
//!
//! Suppliers are registered while the application initializes. After that the
//! catalog is shared read-only (normally as `Arc<DataCatalog>`) and looked up
//! concurrently, both by the resolver and by render-time repairs. Lookup
//! results are memoized in a [`DashMap`] so repeated lookups for the same
//! dependency do not rescan the registry.

use dashmap::DashMap;
use std::sync::Arc;
use strsim::levenshtein;
use tracing::debug;

use super::{DataDependency, DataSupplier};
use crate::constants::{MAX_SUGGESTIONS, SIMILARITY_THRESHOLD_PERCENT};

/// Registry mapping dependencies to the suppliers that can fulfil them.
#[derive(Default)]
pub struct DataCatalog {
    suppliers: Vec<Arc<dyn DataSupplier>>,
    lookups: DashMap<DataDependency, Option<usize>>,
}

impl DataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a supplier. Earlier registrations win ties.
    pub fn register(&mut self, supplier: Arc<dyn DataSupplier>) {
        debug!(
            "Registering supplier '{}' for {}",
            supplier.name(),
            supplier.default_dependency()
        );
        self.suppliers.push(supplier);
        self.lookups.clear();
    }

    /// Builder-style [`DataCatalog::register`].
    pub fn with_supplier(mut self, supplier: Arc<dyn DataSupplier>) -> Self {
        self.register(supplier);
        self
    }

    /// Find the supplier for `dependency`.
    ///
    /// A scoped supplier of exactly this dependency is preferred over an
    /// unscoped supplier of the type.
    pub fn find_supplier(&self, dependency: &DataDependency) -> Option<Arc<dyn DataSupplier>> {
        if let Some(cached) = self.lookups.get(dependency) {
            let cached = *cached;
            return cached.map(|index| Arc::clone(&self.suppliers[index]));
        }

        let found = self
            .suppliers
            .iter()
            .position(|s| s.is_scoped() && s.is_supplier_of(dependency))
            .or_else(|| {
                self.suppliers.iter().position(|s| !s.is_scoped() && s.is_supplier_of(dependency))
            });
        self.lookups.insert(dependency.clone(), found);
        found.map(|index| Arc::clone(&self.suppliers[index]))
    }

    /// Dependencies advertised by the registered suppliers, in registration order.
    pub fn known_dependencies(&self) -> Vec<DataDependency> {
        self.suppliers.iter().map(|s| s.default_dependency()).collect()
    }

    /// Advertised dependencies whose spelling is close to `dependency`.
    pub fn suggestions_for(&self, dependency: &DataDependency) -> Vec<String> {
        let wanted = dependency.to_string().to_lowercase();
        let threshold = (wanted.len() * SIMILARITY_THRESHOLD_PERCENT / 100).max(1);

        let mut scored: Vec<(usize, String)> = self
            .known_dependencies()
            .into_iter()
            .map(|known| known.to_string())
            .filter_map(|known| {
                let distance = levenshtein(&wanted, &known.to_lowercase());
                (distance <= threshold).then_some((distance, known))
            })
            .collect();
        scored.sort();
        scored.dedup_by(|a, b| a.1 == b.1);
        scored.into_iter().take(MAX_SUGGESTIONS).map(|(_, known)| known).collect()
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StaticValueSupplier;
    use serde_json::json;

    fn supplier(name: &str, dependency: DataDependency) -> Arc<dyn DataSupplier> {
        Arc::new(StaticValueSupplier::new(name, dependency, json!(null)))
    }

    #[test]
    fn test_scoped_supplier_preferred() {
        let catalog = DataCatalog::new()
            .with_supplier(supplier("any-products", DataDependency::unscoped("list<Product>")))
            .with_supplier(supplier(
                "catalog-products",
                DataDependency::scoped("list<Product>", "catalog"),
            ));

        let found =
            catalog.find_supplier(&DataDependency::scoped("list<Product>", "catalog")).unwrap();
        assert_eq!(found.name(), "catalog-products");

        let found =
            catalog.find_supplier(&DataDependency::scoped("list<Product>", "featured")).unwrap();
        assert_eq!(found.name(), "any-products");
    }

    #[test]
    fn test_missing_supplier_is_none_and_cached() {
        let catalog = DataCatalog::new()
            .with_supplier(supplier("customer", DataDependency::unscoped("Customer")));
        let order = DataDependency::unscoped("Order");
        assert!(catalog.find_supplier(&order).is_none());
        assert!(catalog.find_supplier(&order).is_none());
        assert_eq!(catalog.lookups.len(), 1);
    }

    #[test]
    fn test_register_invalidates_cache() {
        let mut catalog = DataCatalog::new();
        let order = DataDependency::unscoped("Order");
        assert!(catalog.find_supplier(&order).is_none());

        catalog.register(supplier("orders", order.clone()));
        assert_eq!(catalog.find_supplier(&order).unwrap().name(), "orders");
    }

    #[test]
    fn test_suggestions_for_misspelled_dependency() {
        let catalog = DataCatalog::new()
            .with_supplier(supplier("customer", DataDependency::unscoped("Customer")))
            .with_supplier(supplier("orders", DataDependency::unscoped("Order")));

        let suggestions = catalog.suggestions_for(&DataDependency::unscoped("Custmer"));
        assert_eq!(suggestions, vec!["Customer".to_string()]);
        assert!(catalog.suggestions_for(&DataDependency::unscoped("Zebra")).is_empty());
    }
}
