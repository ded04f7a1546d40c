//! Scope rules and consumer declarations.
//!
//! Scope-introducing elements describe themselves to the resolver with
//! [`ScopeRules`]; anything that reads data describes what it reads with
//! [`ConsumerNeeds`]. Both are plain declarations: the resolver inspects them
//! once while the page is wired and never again.

use std::fmt;
use std::sync::Arc;

use super::{DataDependency, DataSupplier, DataSupply};

/// A supplier together with the dependency it is expected to fulfil.
#[derive(Clone)]
pub struct SuppliedDependency {
    pub supplier: Arc<dyn DataSupplier>,
    pub dependency: DataDependency,
}

impl SuppliedDependency {
    pub fn new(supplier: Arc<dyn DataSupplier>, dependency: DataDependency) -> Self {
        Self {
            supplier,
            dependency,
        }
    }
}

impl fmt::Debug for SuppliedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.dependency, self.supplier.name())
    }
}

/// What a scope-introducing element declares about its data scope.
#[derive(Clone, Default)]
pub struct ScopeRules {
    /// Dependencies this node resolves locally instead of delegating upward.
    pub data_scopes: Vec<DataDependency>,
    /// Suppliers this node already knows about, such as a repeating region
    /// supplying its own item.
    pub supplied_dependencies: Vec<SuppliedDependency>,
    /// Pre-resolved supplies injected by configuration.
    pub data_supplies: Vec<Arc<dyn DataSupply>>,
}

impl ScopeRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, dependency: DataDependency) -> Self {
        self.data_scopes.push(dependency);
        self
    }

    pub fn with_supplier(
        mut self,
        supplier: Arc<dyn DataSupplier>,
        dependency: DataDependency,
    ) -> Self {
        self.supplied_dependencies.push(SuppliedDependency::new(supplier, dependency));
        self
    }

    pub fn with_supply(mut self, supply: Arc<dyn DataSupply>) -> Self {
        self.data_supplies.push(supply);
        self
    }

    /// Whether `dependency` is one of this node's declared scopes.
    pub fn declares(&self, dependency: &DataDependency) -> bool {
        self.data_scopes.contains(dependency)
    }
}

impl fmt::Debug for ScopeRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRules")
            .field("data_scopes", &self.data_scopes)
            .field("supplied_dependencies", &self.supplied_dependencies)
            .field(
                "data_supplies",
                &self.data_supplies.iter().map(|s| s.dependency()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Everything a consumer needs supplied before it can render.
#[derive(Clone, Default)]
pub struct ConsumerNeeds {
    /// Already resolved supplies, added verbatim to the consumer's node.
    pub supplies: Vec<Arc<dyn DataSupply>>,
    /// Typed dependencies resolved through scopes and the catalog.
    pub dependencies: Vec<DataDependency>,
    /// Explicitly named suppliers, placed as high in the tree as scoping allows.
    pub supplier_dependencies: Vec<SuppliedDependency>,
}

impl ConsumerNeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dependency(mut self, dependency: DataDependency) -> Self {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn with_supplier(
        mut self,
        supplier: Arc<dyn DataSupplier>,
        dependency: DataDependency,
    ) -> Self {
        self.supplier_dependencies.push(SuppliedDependency::new(supplier, dependency));
        self
    }

    pub fn with_supply(mut self, supply: Arc<dyn DataSupply>) -> Self {
        self.supplies.push(supply);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.supplies.is_empty()
            && self.dependencies.is_empty()
            && self.supplier_dependencies.is_empty()
    }

    /// Every dependency mentioned by these needs, in declaration order.
    pub fn all_dependencies(&self) -> Vec<DataDependency> {
        let mut all = Vec::new();
        let mentioned = self
            .supplies
            .iter()
            .map(|supply| supply.dependency())
            .chain(self.dependencies.iter())
            .chain(self.supplier_dependencies.iter().map(|pair| &pair.dependency));
        for dependency in mentioned {
            if !all.contains(dependency) {
                all.push(dependency.clone());
            }
        }
        all
    }
}

impl fmt::Debug for ConsumerNeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.all_dependencies()).finish()
    }
}

/// Anything that reads data while rendering.
pub trait DataConsumer: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// The data this consumer reads. Called once, during resolution.
    fn needs(&self) -> ConsumerNeeds;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ComputedSupply;
    use serde_json::json;

    #[test]
    fn test_declares_matches_case_insensitive_scope() {
        let rules = ScopeRules::new().with_scope(DataDependency::scoped("Product", "Current"));
        assert!(rules.declares(&DataDependency::scoped("Product", "current")));
        assert!(!rules.declares(&DataDependency::unscoped("Product")));
    }

    #[test]
    fn test_all_dependencies_deduplicates() {
        let customer = DataDependency::unscoped("Customer");
        let needs = ConsumerNeeds::new()
            .with_supply(Arc::new(ComputedSupply::fixed(customer.clone(), json!({}))))
            .with_dependency(customer.clone())
            .with_dependency(DataDependency::unscoped("Cart"))
            .with_dependency(DataDependency::unscoped("Cart"));

        assert_eq!(needs.dependencies.len(), 2);
        assert_eq!(needs.all_dependencies(), vec![customer, DataDependency::unscoped("Cart")]);
        assert!(!needs.is_empty());
        assert!(ConsumerNeeds::new().is_empty());
    }
}
