//! Data suppliers.
//!
//! A supplier advertises the dependencies it can produce and hands out a
//! [`DataSupply`] for each one the resolver asks it to fulfil. Suppliers that
//! need other data to do their work declare it through
//! [`DataSupplier::needs`] and are resolved like any other consumer.

use std::fmt;
use std::sync::Arc;

use super::supply::{ComputedSupply, DataSupply, Producer};
use super::{ConsumerNeeds, DataDependency, DataType, DataValue, select_path};
use crate::constants::REQUEST_TYPE;
use crate::core::ScopeError;

/// A capability that produces values for one or more dependencies.
pub trait DataSupplier: Send + Sync {
    /// Name used in plans and diagnostics.
    fn name(&self) -> &str;

    /// Types this supplier can produce.
    fn supplied_types(&self) -> Vec<DataType>;

    /// The dependency this supplier advertises in the catalog.
    fn default_dependency(&self) -> DataDependency;

    /// Scoped suppliers only supply their advertised scope; unscoped suppliers
    /// supply their types in any scope.
    fn is_scoped(&self) -> bool;

    /// Exact test: can this supplier fulfil `dependency`?
    fn is_supplier_of(&self, dependency: &DataDependency) -> bool;

    /// Produce the supply binding this supplier to `dependency`.
    ///
    /// Asking for a dependency the supplier does not supply is a
    /// configuration bug and fails with [`ScopeError::SupplierMismatch`].
    fn get_supply(&self, dependency: &DataDependency) -> Result<Arc<dyn DataSupply>, ScopeError>;

    /// Consumer capability. Suppliers whose production needs other data
    /// return those needs here.
    fn needs(&self) -> Option<ConsumerNeeds> {
        None
    }
}

impl fmt::Debug for dyn DataSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataSupplier({} -> {})", self.name(), self.default_dependency())
    }
}

/// Standard matching rule for suppliers that advertise a single dependency.
fn advertises(advertised: &DataDependency, requested: &DataDependency) -> bool {
    if advertised.is_scoped() {
        advertised == requested
    } else {
        advertised.data_type == requested.data_type
    }
}

fn mismatch(supplier: &dyn DataSupplier, dependency: &DataDependency) -> ScopeError {
    ScopeError::SupplierMismatch {
        supplier: supplier.name().to_string(),
        dependency: dependency.clone(),
    }
}

/// Supplies one fixed value, computed once per request.
pub struct StaticValueSupplier {
    name: String,
    dependency: DataDependency,
    value: DataValue,
}

impl StaticValueSupplier {
    pub fn new(name: impl Into<String>, dependency: DataDependency, value: DataValue) -> Self {
        Self {
            name: name.into(),
            dependency,
            value,
        }
    }
}

impl DataSupplier for StaticValueSupplier {
    fn name(&self) -> &str {
        &self.name
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

    fn is_supplier_of(&self, dependency: &DataDependency) -> bool {
        advertises(&self.dependency, dependency)
    }

    fn get_supply(&self, dependency: &DataDependency) -> Result<Arc<dyn DataSupply>, ScopeError> {
        if !self.is_supplier_of(dependency) {
            return Err(mismatch(self, dependency));
        }
        Ok(Arc::new(ComputedSupply::fixed(dependency.clone(), self.value.clone())))
    }
}

/// Projects a path out of another dependency's value.
///
/// The supply is dynamic: when the source is a repeated item, the projection
/// is recomputed for every item.
pub struct DerivedValueSupplier {
    name: String,
    dependency: DataDependency,
    source: DataDependency,
    path: String,
}

impl DerivedValueSupplier {
    pub fn new(
        name: impl Into<String>,
        dependency: DataDependency,
        source: DataDependency,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            dependency,
            source,
            path: path.into(),
        }
    }

    pub fn source(&self) -> &DataDependency {
        &self.source
    }
}

impl DataSupplier for DerivedValueSupplier {
    fn name(&self) -> &str {
        &self.name
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

    fn is_supplier_of(&self, dependency: &DataDependency) -> bool {
        advertises(&self.dependency, dependency)
    }

    fn get_supply(&self, dependency: &DataDependency) -> Result<Arc<dyn DataSupply>, ScopeError> {
        if !self.is_supplier_of(dependency) {
            return Err(mismatch(self, dependency));
        }
        let source = self.source.clone();
        let path = self.path.clone();
        let producer: Producer = Arc::new(move |view| {
            Ok(view.get(&source).and_then(|value| select_path(value, &path)).cloned())
        });
        let supply =
            ComputedSupply::new(dependency.clone(), false, producer).with_supplier(&self.name);
        Ok(Arc::new(supply))
    }

    fn needs(&self) -> Option<ConsumerNeeds> {
        Some(ConsumerNeeds::new().with_dependency(self.source.clone()))
    }
}

/// Supplies the current request's parameters as an object of strings.
pub struct RequestSupplier {
    dependency: DataDependency,
}

impl RequestSupplier {
    pub fn new() -> Self {
        Self {
            dependency: DataDependency::unscoped(REQUEST_TYPE),
        }
    }
}

impl Default for RequestSupplier {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSupplier for RequestSupplier {
    fn name(&self) -> &str {
        "request"
    }

    fn supplied_types(&self) -> Vec<DataType> {
        vec![self.dependency.data_type.clone()]
    }

    fn default_dependency(&self) -> DataDependency {
        self.dependency.clone()
    }

    fn is_scoped(&self) -> bool {
        false
    }

    fn is_supplier_of(&self, dependency: &DataDependency) -> bool {
        advertises(&self.dependency, dependency)
    }

    fn get_supply(&self, dependency: &DataDependency) -> Result<Arc<dyn DataSupply>, ScopeError> {
        if !self.is_supplier_of(dependency) {
            return Err(mismatch(self, dependency));
        }
        let producer: Producer = Arc::new(|view| {
            let params = view
                .request()
                .iter()
                .map(|(key, value)| (key.clone(), DataValue::String(value.clone())))
                .collect::<serde_json::Map<_, _>>();
            Ok(Some(DataValue::Object(params)))
        });
        Ok(Arc::new(ComputedSupply::new(dependency.clone(), true, producer)))
    }
}

/// Closure-backed supplier for applications embedding the engine.
pub struct FnSupplier {
    name: String,
    dependency: DataDependency,
    is_static: bool,
    needs: Option<ConsumerNeeds>,
    producer: Producer,
}

impl FnSupplier {
    pub fn new(
        name: impl Into<String>,
        dependency: DataDependency,
        is_static: bool,
        producer: Producer,
    ) -> Self {
        Self {
            name: name.into(),
            dependency,
            is_static,
            needs: None,
            producer,
        }
    }

    pub fn with_needs(mut self, needs: ConsumerNeeds) -> Self {
        self.needs = Some(needs);
        self
    }
}

impl DataSupplier for FnSupplier {
    fn name(&self) -> &str {
        &self.name
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

    fn is_supplier_of(&self, dependency: &DataDependency) -> bool {
        advertises(&self.dependency, dependency)
    }

    fn get_supply(&self, dependency: &DataDependency) -> Result<Arc<dyn DataSupply>, ScopeError> {
        if !self.is_supplier_of(dependency) {
            return Err(mismatch(self, dependency));
        }
        Ok(Arc::new(
            ComputedSupply::new(dependency.clone(), self.is_static, Arc::clone(&self.producer))
                .with_supplier(&self.name),
        ))
    }

    fn needs(&self) -> Option<ConsumerNeeds> {
        self.needs.clone()
    }
}
