//! Build-time resolution of data supplies onto the scope tree.
//!
//! Every scope-introducing element of a page owns one builder node. The page
//! assembles the nodes into a [`ScopeTreeBuilder`], registers consumers on
//! them, then calls [`ScopeTreeBuilder::resolve_supplies`] exactly once. The
//! result is a [`ScopeTree`]: an immutable plan saying which supply fills
//! which node's data context, in which order.
//!
//! # Resolution
//!
//! Nodes are resolved top-down. For each node:
//!
//! 1. The supplies and (supplier, dependency) pairs configured in the node's
//!    [`ScopeRules`] are added to the node
//! 2. The needs of every consumer registered on the node are resolved
//! 3. Children are resolved, so they can see everything their ancestors
//!    already supply
//!
//! Once the whole tree is resolved, the supplies on each node are ordered so
//! that a supply runs after the same-node supplies it reads (see
//! [`SupplyGraph`]), and the plan is frozen.
//!
//! ## Typed dependencies
//!
//! A typed dependency is looked up from the requesting node upward. The walk
//! stops at the first node that already supplies it, or at the first node
//! that is in scope for it (see [`ScopeTreeBuilder::is_in_scope`]), in which
//! case the [`DataCatalog`] is asked for a supplier. The root is in scope for
//! everything, so the walk always terminates.
//!
//! ## Named suppliers
//!
//! A consumer may name the supplier it wants for a dependency. Such a pair is
//! placed as high in the tree as scoping allows: at the highest node of the
//! consumer's ancestor chain whose rules declare the dependency, or at the
//! root when none does. Nothing is placed when a node on the chain already
//! supplies the dependency.
//!
//! Suppliers are consumers too: every newly placed supplier has its own needs
//! resolved at the node it was placed on.
//!
//! # Example
//!
//! ```rust,no_run
//! use pagescope::data::{DataCatalog, DataDependency, ScopeRules, StaticValueSupplier};
//! use pagescope::resolver::ScopeTreeBuilder;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), pagescope::core::ScopeError> {
//! let catalog = DataCatalog::new().with_supplier(Arc::new(StaticValueSupplier::new(
//!     "products",
//!     DataDependency::scoped("list<Product>", "catalog"),
//!     json!([{ "name": "Kettle" }]),
//! )));
//!
//! let mut builder = ScopeTreeBuilder::new(ScopeRules::new(), Arc::new(catalog));
//! let region = builder.add_child(builder.root(), ScopeRules::new())?;
//! builder.set_label(region, "products")?;
//! let tree = builder.resolve_supplies()?;
//! println!("{}", tree.to_tree_string());
//! # Ok(())
//! # }
//! ```

mod supply_graph;
mod tree;


pub use supply_graph::SupplyGraph;
pub use tree::{
    CONFIGURED_SUPPLY, PlannedNode, PlannedSupply, ResolvedNode, ResolvedSupply, ScopeTree,
};

use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{BuilderId, ScopeError};
use crate::data::{
    ConsumerNeeds, DataCatalog, DataConsumer, DataDependency, DataSupplier, DataSupply,
    ScopeRules, SuppliedDependency,
};

/// One scope node while the tree is being assembled and resolved.
struct BuilderNode {
    id: BuilderId,
    parent: Option<BuilderId>,
    children: Vec<BuilderId>,
    label: String,
    rules: ScopeRules,
    consumers: Vec<Arc<dyn DataConsumer>>,
    /// Supplies placed on this node, in placement order.
    supplies: Vec<ResolvedSupply>,
}

impl BuilderNode {
    fn new(id: BuilderId, parent: Option<BuilderId>, rules: ScopeRules) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            label: if parent.is_none() {
                "page".to_string()
            } else {
                format!("scope{}", id.index())
            },
            rules,
            consumers: Vec::new(),
            supplies: Vec::new(),
        }
    }

    fn supplies(&self, dependency: &DataDependency) -> bool {
        self.supplies.iter().any(|s| s.dependency == *dependency)
    }
}

/// Arena of scope nodes under construction.
///
/// Node ids are handed out in creation order and a child can only be created
/// under an existing node, so a parent's id is always lower than its
/// children's.
pub struct ScopeTreeBuilder {
    nodes: Vec<BuilderNode>,
    catalog: Arc<DataCatalog>,
}

impl ScopeTreeBuilder {
    /// Start a tree whose root node is governed by `root_rules`.
    pub fn new(root_rules: ScopeRules, catalog: Arc<DataCatalog>) -> Self {
        Self {
            nodes: vec![BuilderNode::new(BuilderId::ROOT, None, root_rules)],
            catalog,
        }
    }

    pub fn root(&self) -> BuilderId {
        BuilderId::ROOT
    }

    pub fn catalog(&self) -> &Arc<DataCatalog> {
        &self.catalog
    }

    fn node(&self, id: BuilderId) -> Result<&BuilderNode, ScopeError> {
        self.nodes.get(id.index()).ok_or(ScopeError::UnknownNode {
            node: id,
        })
    }

    fn node_mut(&mut self, id: BuilderId) -> Result<&mut BuilderNode, ScopeError> {
        self.nodes.get_mut(id.index()).ok_or(ScopeError::UnknownNode {
            node: id,
        })
    }

    /// Create a child scope node seeded from `rules`.
    pub fn add_child(
        &mut self,
        parent: BuilderId,
        rules: ScopeRules,
    ) -> Result<BuilderId, ScopeError> {
        let id = BuilderId::new(self.nodes.len());
        self.node_mut(parent)?.children.push(id);
        self.nodes.push(BuilderNode::new(id, Some(parent), rules));
        Ok(id)
    }

    /// Name shown for the node in plans and logs.
    pub fn set_label(&mut self, node: BuilderId, label: impl Into<String>) -> Result<(), ScopeError> {
        self.node_mut(node)?.label = label.into();
        Ok(())
    }

    /// Record that `consumer`'s needs must be satisfied for `node`.
    pub fn add_consumer(
        &mut self,
        node: BuilderId,
        consumer: Arc<dyn DataConsumer>,
    ) -> Result<(), ScopeError> {
        self.node_mut(node)?.consumers.push(consumer);
        Ok(())
    }

    /// True for the root, or when the node's rules declare `dependency`.
    pub fn is_in_scope(&self, node: BuilderId, dependency: &DataDependency) -> bool {
        node.is_root() || self.node(node).is_ok_and(|n| n.rules.declares(dependency))
    }

    pub fn parent(&self, node: BuilderId) -> Option<BuilderId> {
        self.nodes.get(node.index()).and_then(|n| n.parent)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve every node's data supplies and freeze the plan.
    ///
    /// # Errors
    ///
    /// - [`ScopeError::UnsatisfiableDependency`] when a typed dependency has
    ///   neither a supply on the way up nor a catalog entry
    /// - [`ScopeError::SupplierMismatch`] when a supplier is asked for a
    ///   dependency it does not supply
    /// - [`ScopeError::CircularSupply`] when supplies on one node read each
    ///   other in a cycle
    pub fn resolve_supplies(mut self) -> Result<ScopeTree, ScopeError> {
        self.resolve_node(BuilderId::ROOT)?;

        let mut resolved = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            let supplies = Self::materialize(node.id, node.supplies)?;
            resolved.push(ResolvedNode {
                id: node.id,
                parent: node.parent,
                children: node.children,
                label: node.label,
                rules: node.rules,
                supplies,
                setup_supplies: Vec::new(),
            });
        }

        let tree = ScopeTree::from_resolved(resolved, self.catalog)?;
        info!(
            "Resolved {} scope nodes with {} supplies",
            tree.len(),
            tree.nodes().iter().map(|n| n.supplies().len()).sum::<usize>()
        );
        Ok(tree)
    }

    fn resolve_node(&mut self, id: BuilderId) -> Result<(), ScopeError> {
        let node = self.node(id)?;
        debug!("Resolving scope node {} ({})", id, node.label);
        let configured = node.rules.data_supplies.clone();
        let pairs = node.rules.supplied_dependencies.clone();
        let consumers = node.consumers.clone();
        let children = node.children.clone();

        for supply in configured {
            self.add_supply(id, tree::CONFIGURED_SUPPLY, Vec::new(), supply);
        }
        for pair in pairs {
            if !pair.supplier.is_supplier_of(&pair.dependency) {
                return Err(mismatch(&pair));
            }
            self.add_supplier(id, &pair.supplier, &pair.dependency)?;
        }

        // Explicit bindings of every consumer go first so a typed request
        // never claims a dependency another consumer names a supplier for
        let needs: Vec<ConsumerNeeds> = consumers
            .iter()
            .map(|consumer| {
                let needs = consumer.needs();
                if !needs.is_empty() {
                    debug!("Resolving needs of '{}' on {}: {:?}", consumer.name(), id, needs);
                }
                needs
            })
            .collect();
        for consumer_needs in &needs {
            self.place_explicit_needs(id, consumer_needs)?;
        }
        for consumer_needs in &needs {
            self.resolve_typed_needs(id, consumer_needs)?;
        }

        for child in children {
            self.resolve_node(child)?;
        }
        Ok(())
    }

    fn resolve_needs(&mut self, id: BuilderId, needs: &ConsumerNeeds) -> Result<(), ScopeError> {
        self.place_explicit_needs(id, needs)?;
        self.resolve_typed_needs(id, needs)
    }

    /// Direct supplies and named `(supplier, dependency)` pairs.
    fn place_explicit_needs(
        &mut self,
        id: BuilderId,
        needs: &ConsumerNeeds,
    ) -> Result<(), ScopeError> {
        for supply in &needs.supplies {
            self.add_supply(id, tree::CONFIGURED_SUPPLY, Vec::new(), Arc::clone(supply));
        }
        for pair in &needs.supplier_dependencies {
            self.place_named_supplier(id, pair)?;
        }
        Ok(())
    }

    fn resolve_typed_needs(
        &mut self,
        id: BuilderId,
        needs: &ConsumerNeeds,
    ) -> Result<(), ScopeError> {
        for dependency in &needs.dependencies {
            self.resolve_dependency(id, dependency)?;
        }
        Ok(())
    }

    /// Resolve a typed dependency requested at `id`.
    fn resolve_dependency(
        &mut self,
        id: BuilderId,
        dependency: &DataDependency,
    ) -> Result<(), ScopeError> {
        let mut current = id;
        loop {
            let node = self.node(current)?;
            if node.supplies(dependency) {
                return Ok(());
            }
            if self.is_in_scope(current, dependency) {
                break;
            }
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let supplier = self.catalog.find_supplier(dependency).ok_or_else(|| {
            ScopeError::UnsatisfiableDependency {
                dependency: dependency.clone(),
                node: id,
                suggestions: self.catalog.suggestions_for(dependency),
            }
        })?;
        if !supplier.is_supplier_of(dependency) {
            return Err(ScopeError::SupplierMismatch {
                supplier: supplier.name().to_string(),
                dependency: dependency.clone(),
            });
        }
        debug!(
            "Catalog supplier '{}' supplies {} on {} (requested by {})",
            supplier.name(),
            dependency,
            current,
            id
        );
        self.add_supplier(current, &supplier, dependency)
    }

    /// Place an explicitly named supplier as high up `id`'s chain as scoping
    /// allows.
    fn place_named_supplier(
        &mut self,
        id: BuilderId,
        pair: &SuppliedDependency,
    ) -> Result<(), ScopeError> {
        if !pair.supplier.is_supplier_of(&pair.dependency) {
            return Err(mismatch(pair));
        }

        let mut target = None;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            if node.supplies(&pair.dependency) {
                return Ok(());
            }
            if node.rules.declares(&pair.dependency) {
                target = Some(node_id);
            }
            current = node.parent;
        }

        let target = target.unwrap_or(BuilderId::ROOT);
        debug!(
            "Named supplier '{}' supplies {} on {} (requested by {})",
            pair.supplier.name(),
            pair.dependency,
            target,
            id
        );
        self.add_supplier(target, &pair.supplier, &pair.dependency)
    }

    /// Add `supplier`'s supply of `dependency` to `id`, then resolve the
    /// supplier's own needs there.
    fn add_supplier(
        &mut self,
        id: BuilderId,
        supplier: &Arc<dyn DataSupplier>,
        dependency: &DataDependency,
    ) -> Result<(), ScopeError> {
        if self.node(id)?.supplies(dependency) {
            return Ok(());
        }
        let supply = supplier.get_supply(dependency)?;
        let needs = supplier.needs();
        let mentioned = needs.as_ref().map(ConsumerNeeds::all_dependencies).unwrap_or_default();

        if self.add_supply(id, supplier.name(), mentioned, supply)
            && let Some(needs) = needs
        {
            self.resolve_needs(id, &needs)?;
        }
        Ok(())
    }

    /// Returns false when the node already supplies the dependency.
    fn add_supply(
        &mut self,
        id: BuilderId,
        supplier: &str,
        needs: Vec<DataDependency>,
        supply: Arc<dyn DataSupply>,
    ) -> bool {
        let Some(node) = self.nodes.get_mut(id.index()) else {
            return false;
        };
        let dependency = supply.dependency().clone();
        if node.supplies(&dependency) {
            debug!("{} already supplied on {}; skipping '{}'", dependency, id, supplier);
            return false;
        }
        node.supplies.push(ResolvedSupply {
            dependency,
            supplier: supplier.to_string(),
            needs,
            supply,
            deferred: false,
        });
        true
    }

    /// Order a node's supplies so each runs after the same-node supplies it
    /// reads.
    fn materialize(
        id: BuilderId,
        supplies: Vec<ResolvedSupply>,
    ) -> Result<Vec<ResolvedSupply>, ScopeError> {
        if supplies.len() < 2 {
            return Ok(supplies);
        }

        let mut graph = SupplyGraph::new();
        for supply in &supplies {
            graph.add_supply(supply.dependency.clone());
        }
        for supply in &supplies {
            for need in &supply.needs {
                graph.add_need(&supply.dependency, need);
            }
        }

        let order = graph.supply_order().map_err(|cycle| ScopeError::CircularSupply {
            node: id,
            cycle: cycle.iter().map(ToString::to_string).collect::<Vec<_>>().join(" → "),
        })?;

        let mut remaining: Vec<Option<ResolvedSupply>> = supplies.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(remaining.len());
        for dependency in order {
            if let Some(slot) = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|s| s.dependency == dependency))
                && let Some(supply) = slot.take()
            {
                ordered.push(supply);
            }
        }
        Ok(ordered)
    }
}

fn mismatch(pair: &SuppliedDependency) -> ScopeError {
    ScopeError::SupplierMismatch {
        supplier: pair.supplier.name().to_string(),
        dependency: pair.dependency.clone(),
    }
}
