//! Per-request data contexts and the render context that holds them.
//!
//! One [`DataContext`] exists per scope node per request. Contexts form a tree
//! mirroring the resolved plan: a child keeps its parent's id so that a read
//! that misses in the child falls back to the parent. The parent link is a
//! lookup relation only; every context is owned by the request's
//! [`DataContextTree`].

use std::collections::{BTreeMap, HashMap};

use super::HtmlWriter;
use crate::core::{BuilderId, ScopeError};
use crate::data::{DataDependency, DataValue};

/// Parameters of the request being rendered.
pub type RequestParams = BTreeMap<String, String>;

/// Values supplied into one scope node for one request.
#[derive(Debug)]
pub struct DataContext {
    node: BuilderId,
    parent: Option<BuilderId>,
    values: HashMap<DataDependency, DataValue>,
}

impl DataContext {
    fn new(node: BuilderId, parent: Option<BuilderId>) -> Self {
        Self {
            node,
            parent,
            values: HashMap::new(),
        }
    }

    pub fn node(&self) -> BuilderId {
        self.node
    }

    pub fn parent(&self) -> Option<BuilderId> {
        self.parent
    }

    /// Value stored in this context only, without parent fallback.
    pub fn get_local(&self, dependency: &DataDependency) -> Option<&DataValue> {
        self.values.get(dependency)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The live data context tree of one request.
#[derive(Debug, Default)]
pub struct DataContextTree {
    contexts: HashMap<BuilderId, DataContext>,
}

impl DataContextTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) the root context.
    pub fn create_root(&mut self, node: BuilderId) {
        self.contexts.insert(node, DataContext::new(node, None));
    }

    /// Create a child context whose reads fall back to `parent`.
    pub fn create_child(&mut self, parent: BuilderId, node: BuilderId) -> Result<(), ScopeError> {
        if !self.contexts.contains_key(&parent) {
            return Err(ScopeError::UnknownNode {
                node: parent,
            });
        }
        self.contexts.insert(node, DataContext::new(node, Some(parent)));
        Ok(())
    }

    pub fn contains(&self, node: BuilderId) -> bool {
        self.contexts.contains_key(&node)
    }

    pub fn context(&self, node: BuilderId) -> Option<&DataContext> {
        self.contexts.get(&node)
    }

    /// Read `dependency` starting at `node` and walking up the parent chain.
    pub fn get(&self, node: BuilderId, dependency: &DataDependency) -> Option<&DataValue> {
        let mut current = self.contexts.get(&node);
        while let Some(context) = current {
            if let Some(value) = context.values.get(dependency) {
                return Some(value);
            }
            current = context.parent.and_then(|parent| self.contexts.get(&parent));
        }
        None
    }

    /// Store `value` in `node`'s own context; `None` removes any stored value.
    pub fn set(
        &mut self,
        node: BuilderId,
        dependency: DataDependency,
        value: Option<DataValue>,
    ) -> Result<(), ScopeError> {
        let context = self.contexts.get_mut(&node).ok_or(ScopeError::UnknownNode {
            node,
        })?;
        match value {
            Some(value) => {
                context.values.insert(dependency, value);
            }
            None => {
                context.values.remove(&dependency);
            }
        }
        Ok(())
    }

    /// Destroy every context.
    pub fn clear(&mut self) {
        self.contexts.clear();
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Read-only view of the data visible from one scope node.
pub struct DataView<'a> {
    tree: &'a DataContextTree,
    node: BuilderId,
    request: &'a RequestParams,
}

impl<'a> DataView<'a> {
    pub fn node(&self) -> BuilderId {
        self.node
    }

    pub fn get(&self, dependency: &DataDependency) -> Option<&'a DataValue> {
        self.tree.get(self.node, dependency)
    }

    pub fn request(&self) -> &'a RequestParams {
        self.request
    }
}

/// Per-request state: the data context tree, the selected context, the
/// output writer and the request parameters.
///
/// Elements select their own data context before writing and restore the
/// previous selection afterwards:
///
/// ```rust,ignore
/// let previous = render_context.select_data_context(node)?;
/// write_children(render_context)?;
/// render_context.restore_data_context(previous);
/// ```
pub struct RenderContext {
    data: DataContextTree,
    selected: Option<BuilderId>,
    writer: HtmlWriter,
    request: RequestParams,
    repeat_depth: usize,
    plan_generation: u64,
}

impl RenderContext {
    pub fn new(request: RequestParams, writer: HtmlWriter) -> Self {
        Self {
            data: DataContextTree::new(),
            selected: None,
            writer,
            request,
            repeat_depth: 0,
            plan_generation: 0,
        }
    }

    pub fn data(&self) -> &DataContextTree {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataContextTree {
        &mut self.data
    }

    /// Select `node`'s data context, returning the previous selection.
    pub fn select_data_context(
        &mut self,
        node: BuilderId,
    ) -> Result<Option<BuilderId>, ScopeError> {
        if !self.data.contains(node) {
            return Err(ScopeError::UnknownNode {
                node,
            });
        }
        Ok(self.selected.replace(node))
    }

    /// Restore a selection saved by [`RenderContext::select_data_context`].
    pub fn restore_data_context(&mut self, previous: Option<BuilderId>) {
        self.selected = previous;
    }

    pub fn selected(&self) -> Option<BuilderId> {
        self.selected
    }

    /// Read from the selected context, walking up the tree.
    pub fn get(&self, dependency: &DataDependency) -> Option<&DataValue> {
        self.selected.and_then(|node| self.data.get(node, dependency))
    }

    /// A read-only view of the data visible from `node`.
    pub fn view(&self, node: BuilderId) -> DataView<'_> {
        DataView {
            tree: &self.data,
            node,
            request: &self.request,
        }
    }

    pub fn request(&self) -> &RequestParams {
        &self.request
    }

    pub fn writer(&self) -> &HtmlWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut HtmlWriter {
        &mut self.writer
    }

    pub fn into_output(self) -> String {
        self.writer.into_string()
    }

    /// Generation of the plan the data context tree was built from.
    pub fn plan_generation(&self) -> u64 {
        self.plan_generation
    }

    pub(crate) fn set_plan_generation(&mut self, generation: u64) {
        self.plan_generation = generation;
    }

    /// Enter one level of repeating region, failing past `max`.
    pub(crate) fn enter_repeat(&mut self, max: usize) -> Result<(), ScopeError> {
        if self.repeat_depth >= max {
            return Err(ScopeError::RepeatTooDeep {
                depth: self.repeat_depth + 1,
                max,
            });
        }
        self.repeat_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_repeat(&mut self) {
        self.repeat_depth = self.repeat_depth.saturating_sub(1);
    }
}
