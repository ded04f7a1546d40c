//! The resolved plan and per-request data context materialization.
//!
//! A [`ScopeTree`] is what [`ScopeTreeBuilder::resolve_supplies`] produces: for
//! every scope node, the ordered list of supplies that fill its data context.
//! The plan is immutable and shared (`Arc<ScopeTree>`) by all concurrent
//! requests. Each request replays it into its own [`RenderContext`]:
//!
//! 1. [`ScopeTree::setup_data_context`] creates the root context, selects it,
//!    then creates one child context per child node, running each node's
//!    setup supplies as soon as its context exists
//! 2. Elements read data with [`ScopeTree::lookup`], which tells a value that
//!    is legitimately absent apart from one that was never resolved
//! 3. A never-resolved dependency is repaired with
//!    [`ScopeTree::add_missing_data`], which resolves it late and rebuilds the
//!    whole context tree
//!
//! Late resolutions are kept in a concurrent map so later requests set up
//! their contexts with them from the start. Every late resolution bumps the
//! plan generation; a request whose contexts predate it reports a lookup of a
//! late dependency as missing, so it rebuilds instead of rendering nothing.
//!
//! [`ScopeTreeBuilder::resolve_supplies`]: super::ScopeTreeBuilder::resolve_supplies

use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace, warn};

use crate::core::{BuilderId, ScopeError};
use crate::data::{DataCatalog, DataDependency, DataSupply, DataValue, ScopeRules};
use crate::render::RenderContext;

/// Supplier name shown for supplies injected already resolved.
pub const CONFIGURED_SUPPLY: &str = "<configured>";

/// One supply placed on a scope node.
#[derive(Clone)]
pub struct ResolvedSupply {
    pub dependency: DataDependency,
    /// Name of the supplier that produced the supply.
    pub supplier: String,
    /// Dependencies the supplier reads.
    pub needs: Vec<DataDependency>,
    pub supply: Arc<dyn DataSupply>,
    /// Deferred supplies do not run during setup; they run when the
    /// event-driven supply they depend on runs.
    pub deferred: bool,
}

impl ResolvedSupply {
    pub fn is_static(&self) -> bool {
        self.supply.is_static()
    }

    fn kind(&self) -> &'static str {
        if self.supply.is_event_driven() {
            "event"
        } else if self.supply.is_static() {
            "static"
        } else if self.deferred {
            "deferred"
        } else {
            "dynamic"
        }
    }
}

impl fmt::Debug for ResolvedSupply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {} [{}]", self.dependency, self.supplier, self.kind())
    }
}

/// A resolved scope node.
#[derive(Debug)]
pub struct ResolvedNode {
    pub(super) id: BuilderId,
    pub(super) parent: Option<BuilderId>,
    pub(super) children: Vec<BuilderId>,
    pub(super) label: String,
    pub(super) rules: ScopeRules,
    pub(super) supplies: Vec<ResolvedSupply>,
    /// Indices into `supplies` run when the node's context is created: every
    /// static supply plus the dynamic ones no deferred supply triggers.
    pub(super) setup_supplies: Vec<usize>,
}

impl ResolvedNode {
    pub fn id(&self) -> BuilderId {
        self.id
    }

    pub fn parent(&self) -> Option<BuilderId> {
        self.parent
    }

    pub fn children(&self) -> &[BuilderId] {
        &self.children
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Supplies in the order they run.
    pub fn supplies(&self) -> &[ResolvedSupply] {
        &self.supplies
    }

    /// Supplies run when the node's data context is created, in order.
    pub fn setup_supplies(&self) -> impl Iterator<Item = &ResolvedSupply> {
        self.setup_supplies.iter().map(|&index| &self.supplies[index])
    }

    pub fn supply_of(&self, dependency: &DataDependency) -> Option<&ResolvedSupply> {
        self.supplies.iter().find(|s| s.dependency == *dependency)
    }

    fn declares(&self, dependency: &DataDependency) -> bool {
        self.rules.declares(dependency)
    }
}

/// Serializable description of one node of the plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedNode {
    pub id: BuilderId,
    pub parent: Option<BuilderId>,
    pub label: String,
    pub scopes: Vec<String>,
    pub supplies: Vec<PlannedSupply>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedSupply {
    pub dependency: String,
    pub supplier: String,
    pub kind: String,
    pub late: bool,
}

/// The resolved, read-only supply plan of one page.
pub struct ScopeTree {
    nodes: Vec<ResolvedNode>,
    catalog: Arc<DataCatalog>,
    late_supplies: DashMap<BuilderId, Vec<ResolvedSupply>>,
    /// Serializes late insertions so each is wired exactly once.
    late_lock: Mutex<()>,
    generation: AtomicU64,
}

impl ScopeTree {
    /// Finish resolution: decide which dynamic supplies are deferred, wire
    /// their on-supply actions and cache each node's setup list.
    ///
    /// `nodes` must be indexed by id with every parent before its children.
    pub(super) fn from_resolved(
        mut nodes: Vec<ResolvedNode>,
        catalog: Arc<DataCatalog>,
    ) -> Result<Self, ScopeError> {
        for index in 0..nodes.len() {
            for position in 0..nodes[index].supplies.len() {
                let deferred = {
                    let candidate = &nodes[index].supplies[position];
                    Self::wire_dynamic(&nodes, None, nodes[index].id, position, candidate)
                };
                nodes[index].supplies[position].deferred = deferred;
            }

            let node = &mut nodes[index];
            node.setup_supplies =
                (0..node.supplies.len()).filter(|&i| !node.supplies[i].deferred).collect();
        }

        Ok(Self {
            nodes,
            catalog,
            late_supplies: DashMap::new(),
            late_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    /// Decide whether `candidate` is deferred and, if it is, register it as
    /// an on-supply action of every deferred supply it reads.
    ///
    /// `position` limits same-node providers to supplies ordered before the
    /// candidate. Late supplies pass the late map instead and see the whole
    /// node.
    fn wire_dynamic(
        nodes: &[ResolvedNode],
        late: Option<&DashMap<BuilderId, Vec<ResolvedSupply>>>,
        node: BuilderId,
        position: usize,
        candidate: &ResolvedSupply,
    ) -> bool {
        if candidate.supply.is_static() {
            return false;
        }
        if candidate.supply.is_event_driven() {
            return true;
        }

        let mut deferred = false;
        for need in &candidate.needs {
            let Some(provider) = Self::find_provider(nodes, late, node, position, need) else {
                continue;
            };
            if !provider.deferred {
                continue;
            }
            deferred = true;
            let dependent = Arc::clone(&candidate.supply);
            debug!(
                "Supply of {} on {} re-runs whenever {} is supplied",
                candidate.dependency, node, need
            );
            provider.supply.add_on_supply_action(Arc::new(move |render_context| {
                if !render_context.data().contains(node) {
                    trace!("Skipping supply into {}: no data context", node);
                    return Ok(());
                }
                dependent.supply(render_context, node)
            }));
        }
        deferred
    }

    /// The supply providing `dependency` as seen from `node`: earlier supplies
    /// on the node itself, then each ancestor's.
    fn find_provider(
        nodes: &[ResolvedNode],
        late: Option<&DashMap<BuilderId, Vec<ResolvedSupply>>>,
        node: BuilderId,
        position: usize,
        dependency: &DataDependency,
    ) -> Option<ResolvedSupply> {
        let local = if late.is_some() {
            nodes[node.index()].supplies.len()
        } else {
            position
        };
        if let Some(found) =
            nodes[node.index()].supplies[..local].iter().find(|s| s.dependency == *dependency)
        {
            return Some(found.clone());
        }
        if let Some(late) = late
            && let Some(entries) = late.get(&node)
            && let Some(found) = entries.iter().find(|s| s.dependency == *dependency)
        {
            return Some(found.clone());
        }

        let mut current = nodes[node.index()].parent;
        while let Some(id) = current {
            let resolved = &nodes[id.index()];
            if let Some(found) = resolved.supply_of(dependency) {
                return Some(found.clone());
            }
            if let Some(late) = late
                && let Some(entries) = late.get(&id)
                && let Some(found) = entries.iter().find(|s| s.dependency == *dependency)
            {
                return Some(found.clone());
            }
            current = resolved.parent;
        }
        None
    }

    pub fn root(&self) -> &ResolvedNode {
        &self.nodes[BuilderId::ROOT.index()]
    }

    pub fn node(&self, id: BuilderId) -> Option<&ResolvedNode> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[ResolvedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn catalog(&self) -> &Arc<DataCatalog> {
        &self.catalog
    }

    /// Number of late resolutions so far. Starts at 0.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// True for the root, or when the node declares the dependency's scope.
    pub fn is_in_scope(&self, node: BuilderId, dependency: &DataDependency) -> bool {
        node.is_root() || self.node(node).is_some_and(|n| n.declares(dependency))
    }

    /// Whether the node has the dependency supplied, in its plan or late.
    fn supplies_directly(&self, node: BuilderId, dependency: &DataDependency) -> bool {
        self.node(node).is_some_and(|n| n.supply_of(dependency).is_some())
            || self
                .late_supplies
                .get(&node)
                .is_some_and(|late| late.iter().any(|s| s.dependency == *dependency))
    }

    /// Whether `dependency` is supplied on `node` or any of its ancestors.
    pub fn is_supplied_at_or_above(&self, node: BuilderId, dependency: &DataDependency) -> bool {
        let mut current = self.node(node).map(ResolvedNode::id);
        while let Some(id) = current {
            if self.supplies_directly(id, dependency) {
                return true;
            }
            current = self.node(id).and_then(ResolvedNode::parent);
        }
        false
    }

    /// Like [`ScopeTree::is_supplied_at_or_above`], ignoring late supplies.
    fn is_planned_at_or_above(&self, node: BuilderId, dependency: &DataDependency) -> bool {
        let mut current = self.node(node);
        while let Some(resolved) = current {
            if resolved.supply_of(dependency).is_some() {
                return true;
            }
            current = resolved.parent.and_then(|parent| self.node(parent));
        }
        false
    }

    /// The supply of `dependency` placed directly on `node`.
    pub fn supply_for(
        &self,
        node: BuilderId,
        dependency: &DataDependency,
    ) -> Option<Arc<dyn DataSupply>> {
        let resolved = self.node(node)?;
        if let Some(found) = resolved.supply_of(dependency) {
            return Some(Arc::clone(&found.supply));
        }
        self.late_supplies.get(&node).and_then(|late| {
            late.iter().find(|s| s.dependency == *dependency).map(|s| Arc::clone(&s.supply))
        })
    }

    /// Create the request's data context tree, starting at the root.
    ///
    /// Any existing tree in the render context is discarded first. The root
    /// context is left selected.
    pub fn setup_data_context(&self, render_context: &mut RenderContext) -> Result<(), ScopeError> {
        let root = self.root();
        render_context.set_plan_generation(self.generation());
        render_context.data_mut().clear();
        render_context.data_mut().create_root(root.id);
        render_context.select_data_context(root.id)?;
        self.run_setup_supplies(render_context, root)?;

        for &child in &root.children {
            self.build_data_context_tree(render_context, child)?;
        }
        Ok(())
    }

    fn build_data_context_tree(
        &self,
        render_context: &mut RenderContext,
        id: BuilderId,
    ) -> Result<(), ScopeError> {
        let node = self.node(id).ok_or(ScopeError::UnknownNode {
            node: id,
        })?;
        let parent = node.parent.ok_or(ScopeError::UnknownNode {
            node: id,
        })?;
        render_context.data_mut().create_child(parent, id)?;
        self.run_setup_supplies(render_context, node)?;

        for &child in &node.children {
            self.build_data_context_tree(render_context, child)?;
        }
        Ok(())
    }

    fn run_setup_supplies(
        &self,
        render_context: &mut RenderContext,
        node: &ResolvedNode,
    ) -> Result<(), ScopeError> {
        for &index in &node.setup_supplies {
            node.supplies[index].supply.supply(render_context, node.id)?;
        }

        let late: Vec<ResolvedSupply> = match self.late_supplies.get(&node.id) {
            Some(late) => late.iter().filter(|s| !s.deferred).cloned().collect(),
            None => return Ok(()),
        };
        for resolved in late {
            resolved.supply.supply(render_context, node.id)?;
        }
        Ok(())
    }

    /// Read `dependency` from the selected data context.
    ///
    /// `Ok(None)` means the dependency is supplied but currently has no value.
    /// A dependency that no node on the selected path supplies is reported as
    /// [`ScopeError::MissingAtRender`], as is one resolved late after this
    /// request's contexts were set up.
    pub fn lookup<'a>(
        &self,
        render_context: &'a RenderContext,
        dependency: &DataDependency,
    ) -> Result<Option<&'a DataValue>, ScopeError> {
        let node = render_context.selected().unwrap_or(BuilderId::ROOT);
        if let Some(value) = render_context.data().get(node, dependency) {
            return Ok(Some(value));
        }
        let stale = render_context.plan_generation() < self.generation()
            && !self.is_planned_at_or_above(node, dependency);
        if self.is_supplied_at_or_above(node, dependency) && !stale {
            return Ok(None);
        }
        if stale {
            debug!("Data contexts predate late supplies; {} needs a rebuild", dependency);
        }
        Err(ScopeError::MissingAtRender {
            dependency: dependency.clone(),
            node,
        })
    }

    /// Resolve a dependency discovered missing while rendering, then discard
    /// and rebuild the whole data context tree of this request.
    ///
    /// Resolution starts at the selected node. The selection is restored
    /// after the rebuild. This is a recovery path, not a steady-state one.
    pub fn add_missing_data(
        &self,
        render_context: &mut RenderContext,
        dependency: &DataDependency,
    ) -> Result<(), ScopeError> {
        let node = render_context.selected().unwrap_or(BuilderId::ROOT);
        if self.node(node).is_none() {
            return Err(ScopeError::UnknownNode {
                node,
            });
        }
        warn!(
            "Dependency {} was not resolved for scope node {}; resolving it now and rebuilding the data context tree",
            dependency, node
        );

        let mut visiting = Vec::new();
        self.resolve_late(node, dependency, &mut visiting)?;

        let previous = render_context.selected();
        self.setup_data_context(render_context)?;
        if let Some(previous) = previous {
            render_context.select_data_context(previous)?;
        }
        Ok(())
    }

    fn resolve_late(
        &self,
        node: BuilderId,
        dependency: &DataDependency,
        visiting: &mut Vec<DataDependency>,
    ) -> Result<(), ScopeError> {
        if visiting.contains(dependency) {
            let mut cycle: Vec<String> = visiting.iter().map(ToString::to_string).collect();
            cycle.push(dependency.to_string());
            return Err(ScopeError::CircularSupply {
                node,
                cycle: cycle.join(" → "),
            });
        }

        let mut current = node;
        loop {
            if self.supplies_directly(current, dependency) {
                return Ok(());
            }
            if self.is_in_scope(current, dependency) {
                break;
            }
            let parent = self
                .node(current)
                .ok_or(ScopeError::UnknownNode {
                    node: current,
                })?
                .parent;
            current = match parent {
                Some(parent) => parent,
                None => break,
            };
        }

        let supplier = self.catalog.find_supplier(dependency).ok_or_else(|| {
            ScopeError::UnsatisfiableDependency {
                dependency: dependency.clone(),
                node,
                suggestions: self.catalog.suggestions_for(dependency),
            }
        })?;
        if !supplier.is_supplier_of(dependency) {
            return Err(ScopeError::SupplierMismatch {
                supplier: supplier.name().to_string(),
                dependency: dependency.clone(),
            });
        }

        let needs = supplier.needs().unwrap_or_default();
        visiting.push(dependency.clone());
        for supply in &needs.supplies {
            self.push_late(current, CONFIGURED_SUPPLY, Vec::new(), Arc::clone(supply));
        }
        for need in &needs.dependencies {
            self.resolve_late(current, need, visiting)?;
        }
        for pair in &needs.supplier_dependencies {
            if !self.is_supplied_at_or_above(current, &pair.dependency) {
                let supply = pair.supplier.get_supply(&pair.dependency)?;
                self.push_late(current, pair.supplier.name(), Vec::new(), supply);
            }
        }
        visiting.pop();

        let supply = supplier.get_supply(dependency)?;
        debug!("Late supply of {} placed on {} from '{}'", dependency, current, supplier.name());
        self.push_late(current, supplier.name(), needs.all_dependencies(), supply);
        Ok(())
    }

    /// Add a late supply to `node` unless the node already supplies its
    /// dependency. Returns whether it was added.
    pub(super) fn push_late(
        &self,
        node: BuilderId,
        supplier: &str,
        needs: Vec<DataDependency>,
        supply: Arc<dyn DataSupply>,
    ) -> bool {
        let _guard = self.late_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.supplies_directly(node, supply.dependency()) {
            trace!(
                "{} already supplied on {}; skipping late '{}'",
                supply.dependency(),
                node,
                supplier
            );
            return false;
        }

        let mut resolved = ResolvedSupply {
            dependency: supply.dependency().clone(),
            supplier: supplier.to_string(),
            needs,
            supply,
            deferred: false,
        };
        resolved.deferred =
            Self::wire_dynamic(&self.nodes, Some(&self.late_supplies), node, 0, &resolved);
        self.late_supplies.entry(node).or_default().push(resolved);
        self.generation.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Number of supplies added by render-time repairs.
    pub fn late_supply_count(&self) -> usize {
        self.late_supplies.iter().map(|entry| entry.value().len()).sum()
    }

    /// Serializable description of the plan, in node order.
    pub fn plan(&self) -> Vec<PlannedNode> {
        self.nodes
            .iter()
            .map(|node| {
                let planned = node.supplies.iter().map(|s| (s, false));
                let late: Vec<ResolvedSupply> =
                    self.late_supplies.get(&node.id).map(|l| l.value().clone()).unwrap_or_default();
                PlannedNode {
                    id: node.id,
                    parent: node.parent,
                    label: node.label.clone(),
                    scopes: node.rules.data_scopes.iter().map(ToString::to_string).collect(),
                    supplies: planned
                        .chain(late.iter().map(|s| (s, true)))
                        .map(|(s, late)| PlannedSupply {
                            dependency: s.dependency.to_string(),
                            supplier: s.supplier.clone(),
                            kind: s.kind().to_string(),
                            late,
                        })
                        .collect(),
                }
            })
            .collect()
    }

    /// Human-readable tree of the plan.
    pub fn to_tree_string(&self) -> String {
        let plan = self.plan();
        let mut result = String::new();
        self.build_tree_string(&plan, BuilderId::ROOT, &mut result, "", true, true);
        result
    }

    fn build_tree_string(
        &self,
        plan: &[PlannedNode],
        id: BuilderId,
        result: &mut String,
        prefix: &str,
        is_last: bool,
        is_root: bool,
    ) {
        let planned = &plan[id.index()];
        let connector = match (is_root, is_last) {
            (true, _) => "",
            (false, true) => "└── ",
            (false, false) => "├── ",
        };
        let scopes = if planned.scopes.is_empty() {
            String::new()
        } else {
            format!(" [scopes: {}]", planned.scopes.join(", "))
        };
        result.push_str(&format!("{prefix}{connector}{} {}{scopes}\n", planned.id, planned.label));

        let child_prefix = match (is_root, is_last) {
            (true, _) => String::new(),
            (false, true) => format!("{prefix}    "),
            (false, false) => format!("{prefix}│   "),
        };
        let children = &self.nodes[id.index()].children;
        let total = planned.supplies.len() + children.len();

        for (i, supply) in planned.supplies.iter().enumerate() {
            let connector = if i + 1 == total {
                "└── "
            } else {
                "├── "
            };
            let late = if supply.late {
                ", late"
            } else {
                ""
            };
            result.push_str(&format!(
                "{child_prefix}{connector}{} <- {} ({}{late})\n",
                supply.dependency, supply.supplier, supply.kind
            ));
        }
        for (i, &child) in children.iter().enumerate() {
            let is_last_child = planned.supplies.len() + i + 1 == total;
            self.build_tree_string(plan, child, result, &child_prefix, is_last_child, false);
        }
    }
}

impl fmt::Debug for ScopeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeTree")
            .field("nodes", &self.nodes)
            .field("late_supplies", &self.late_supply_count())
            .finish()
    }
}
