//! Data supplies: resolved, invocable bindings between a supplier and one
//! dependency.
//!
//! A supply is produced by [`DataSupplier::get_supply`] during resolution and
//! replayed on every request. Static supplies run once per request when their
//! scope node's data context is created. Dynamic supplies are recomputed
//! whenever the supply they depend on runs again, which is how repeating
//! regions rebind per-item data.
//!
//! [`DataSupplier::get_supply`]: super::DataSupplier::get_supply

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

use super::{DataDependency, DataValue};
use crate::core::{BuilderId, ScopeError};
use crate::render::{DataView, RenderContext};

/// Callback run every time a supply has run.
pub type OnSupplyAction = Arc<dyn Fn(&mut RenderContext) -> Result<(), ScopeError> + Send + Sync>;

/// Computes a value from the data visible at the target scope node.
///
/// Returning `Ok(None)` clears any value left by a previous run.
pub type Producer =
    Arc<dyn Fn(&DataView<'_>) -> Result<Option<DataValue>, ScopeError> + Send + Sync>;

/// A resolved binding between one supplier and one dependency.
pub trait DataSupply: Send + Sync {
    /// The dependency this supply fulfils.
    fn dependency(&self) -> &DataDependency;

    /// Static supplies are computed once when their data context is created.
    fn is_static(&self) -> bool;

    /// Event-driven supplies are never run while a context tree is set up.
    /// Their owner runs them explicitly, as a repeating region does once per
    /// item.
    fn is_event_driven(&self) -> bool {
        false
    }

    /// Insert this supply's value into the data context of `target`, then run
    /// the registered on-supply actions.
    fn supply(&self, render_context: &mut RenderContext, target: BuilderId)
    -> Result<(), ScopeError>;

    /// Register an action to run after every call to [`DataSupply::supply`].
    fn add_on_supply_action(&self, action: OnSupplyAction);
}

/// On-supply action list shared by the supply implementations.
///
/// Actions are added while resolving (or repairing) the plan and read on
/// every supply. The list is cloned before running so an action may register
/// further actions without deadlocking.
#[derive(Default)]
pub struct SupplyActions {
    actions: RwLock<Vec<OnSupplyAction>>,
}

impl SupplyActions {
    pub fn add(&self, action: OnSupplyAction) {
        self.actions.write().unwrap_or_else(PoisonError::into_inner).push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered action in registration order.
    pub fn run(&self, render_context: &mut RenderContext) -> Result<(), ScopeError> {
        let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner).clone();
        for action in actions {
            action(render_context)?;
        }
        Ok(())
    }
}

/// Supply backed by a [`Producer`] closure.
pub struct ComputedSupply {
    dependency: DataDependency,
    is_static: bool,
    producer: Producer,
    supplier: Option<String>,
    actions: SupplyActions,
}

impl ComputedSupply {
    pub fn new(dependency: DataDependency, is_static: bool, producer: Producer) -> Self {
        Self {
            dependency,
            is_static,
            producer,
            supplier: None,
            actions: SupplyActions::default(),
        }
    }

    /// Name the supplier reported when the producer fails.
    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    /// A static supply of a fixed value.
    pub fn fixed(dependency: DataDependency, value: DataValue) -> Self {
        Self::new(dependency, true, Arc::new(move |_| Ok(Some(value.clone()))))
    }
}

impl DataSupply for ComputedSupply {
    fn dependency(&self) -> &DataDependency {
        &self.dependency
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn supply(
        &self,
        render_context: &mut RenderContext,
        target: BuilderId,
    ) -> Result<(), ScopeError> {
        let value = (self.producer)(&render_context.view(target)).map_err(|error| match error {
            ScopeError::MissingAtRender {
                ..
            }
            | ScopeError::SupplyFailed {
                ..
            } => error,
            other => ScopeError::SupplyFailed {
                supplier: self.supplier.clone().unwrap_or_else(|| "<anonymous>".to_string()),
                dependency: self.dependency.clone(),
                reason: other.to_string(),
            },
        })?;
        trace!(
            "Supplying {} into {} ({})",
            self.dependency,
            target,
            if value.is_some() {
                "value"
            } else {
                "cleared"
            }
        );
        render_context.data_mut().set(target, self.dependency.clone(), value)?;
        self.actions.run(render_context)
    }

    fn add_on_supply_action(&self, action: OnSupplyAction) {
        self.actions.add(action);
    }
}

impl fmt::Debug for ComputedSupply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedSupply")
            .field("dependency", &self.dependency)
            .field("is_static", &self.is_static)
            .field("supplier", &self.supplier)
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Supply for the item a repeating region is currently iterating over.
///
/// The region writes the item value itself; running this supply only notifies
/// the dynamic supplies that depend on the item.
pub struct ItemSupply {
    dependency: DataDependency,
    actions: SupplyActions,
}

impl ItemSupply {
    pub fn new(dependency: DataDependency) -> Self {
        Self {
            dependency,
            actions: SupplyActions::default(),
        }
    }
}

impl DataSupply for ItemSupply {
    fn dependency(&self) -> &DataDependency {
        &self.dependency
    }

    fn is_static(&self) -> bool {
        false
    }

    fn is_event_driven(&self) -> bool {
        true
    }

    fn supply(
        &self,
        render_context: &mut RenderContext,
        _target: BuilderId,
    ) -> Result<(), ScopeError> {
        self.actions.run(render_context)
    }

    fn add_on_supply_action(&self, action: OnSupplyAction) {
        self.actions.add(action);
    }
}

impl fmt::Debug for ItemSupply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemSupply")
            .field("dependency", &self.dependency)
            .field("actions", &self.actions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HtmlWriter, RequestParams};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context_with_root() -> RenderContext {
        let mut rc = RenderContext::new(RequestParams::new(), HtmlWriter::new(0));
        rc.data_mut().create_root(BuilderId::ROOT);
        rc
    }

    #[test]
    fn test_fixed_supply_inserts_value() {
        let dep = DataDependency::unscoped("Customer");
        let supply = ComputedSupply::fixed(dep.clone(), json!({ "name": "Ada" }));
        let mut rc = context_with_root();

        supply.supply(&mut rc, BuilderId::ROOT).unwrap();

        assert!(supply.is_static());
        assert_eq!(rc.data().get(BuilderId::ROOT, &dep), Some(&json!({ "name": "Ada" })));
    }

    #[test]
    fn test_producer_returning_none_clears_value() {
        let dep = DataDependency::unscoped("Banner");
        let mut rc = context_with_root();
        rc.data_mut().set(BuilderId::ROOT, dep.clone(), Some(json!("old"))).unwrap();

        let supply = ComputedSupply::new(dep.clone(), false, Arc::new(|_| Ok(None)));
        supply.supply(&mut rc, BuilderId::ROOT).unwrap();

        assert_eq!(rc.data().get(BuilderId::ROOT, &dep), None);
    }

    #[test]
    fn test_actions_run_after_each_supply() {
        let dep = DataDependency::scoped("Product", "current");
        let supply = ItemSupply::new(dep);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        supply.add_on_supply_action(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let mut rc = context_with_root();
        supply.supply(&mut rc, BuilderId::ROOT).unwrap();
        supply.supply(&mut rc, BuilderId::ROOT).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(supply.is_event_driven());
    }

    #[test]
    fn test_supply_into_missing_context_fails() {
        let supply = ComputedSupply::fixed(DataDependency::unscoped("Customer"), json!(1));
        let mut rc = context_with_root();
        let result = supply.supply(&mut rc, BuilderId::new(7));
        assert!(matches!(result, Err(ScopeError::UnknownNode { .. })));
    }
}
