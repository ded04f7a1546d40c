//! Runtime element tree.
//!
//! Pages are described declaratively ([`PageDefinition`]) and assembled into a
//! [`Page`]: a resolved [`ScopeTree`] plus the elements that write markup
//! against it. Four element kinds exist:
//!
//! | Kind      | Scope node                   | Writes                          |
//! |-----------|------------------------------|---------------------------------|
//! | page      | always (the root)            | `<main>` with optional title    |
//! | layout    | only when it declares scopes | `<div>`                         |
//! | region    | always                       | `<section>`, items if repeating |
//! | component | never                        | its template, filled in         |
//!
//! Every element that owns a scope node selects that node's data context
//! before writing its children and restores the previous selection after.

mod definition;
mod page;
mod template;

pub use definition::{ElementDefinition, PageDefinition, RepeatDefinition};
pub use page::{Page, PageAssembler, RenderSettings};
pub use template::Template;

use dashmap::DashMap;
use tracing::trace;

use crate::core::{BuilderId, ScopeError};
use crate::data::DataDependency;
use crate::render::RenderContext;
use crate::resolver::ScopeTree;

/// Repetition of a region over a list-typed dependency.
#[derive(Debug, Clone)]
pub struct Repeat {
    pub list: DataDependency,
    pub item: DataDependency,
    pub tag: String,
}

/// An assembled element.
#[derive(Debug, Clone)]
pub enum Element {
    Layout {
        class: Option<String>,
        node: Option<BuilderId>,
        children: Vec<Element>,
    },
    Region {
        class: Option<String>,
        node: BuilderId,
        repeat: Option<Repeat>,
        children: Vec<Element>,
    },
    Component {
        template: String,
    },
}

/// Shared, read-only state elements write against.
pub struct WriteContext<'a> {
    pub tree: &'a ScopeTree,
    pub templates: &'a DashMap<String, Template>,
    pub max_repeat_depth: usize,
}

impl Element {
    pub fn write(
        &self,
        cx: &WriteContext<'_>,
        render_context: &mut RenderContext,
    ) -> Result<(), ScopeError> {
        match self {
            Self::Layout {
                class,
                node,
                children,
            } => {
                render_context.writer_mut().open_element("div", class.as_deref());
                match node {
                    Some(node) => {
                        let previous = render_context.select_data_context(*node)?;
                        write_all(children, cx, render_context)?;
                        render_context.restore_data_context(previous);
                    }
                    None => write_all(children, cx, render_context)?,
                }
                render_context.writer_mut().close_element("div");
            }
            Self::Region {
                class,
                node,
                repeat,
                children,
            } => {
                render_context.writer_mut().open_element("section", class.as_deref());
                let previous = render_context.select_data_context(*node)?;
                match repeat {
                    Some(repeat) => {
                        render_context.enter_repeat(cx.max_repeat_depth)?;
                        let result = write_repeat(*node, repeat, children, cx, render_context);
                        render_context.exit_repeat();
                        result?;
                    }
                    None => write_all(children, cx, render_context)?,
                }
                render_context.restore_data_context(previous);
                render_context.writer_mut().close_element("section");
            }
            Self::Component {
                template,
            } => {
                let parsed = cx
                    .templates
                    .get(template)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| ScopeError::InvalidTemplate {
                        name: template.clone(),
                        reason: "template is not registered".to_string(),
                    })?;
                let text = parsed.render(cx.tree, render_context)?;
                render_context.writer_mut().write_raw(&text);
            }
        }
        Ok(())
    }
}

fn write_all(
    elements: &[Element],
    cx: &WriteContext<'_>,
    render_context: &mut RenderContext,
) -> Result<(), ScopeError> {
    for element in elements {
        element.write(cx, render_context)?;
    }
    Ok(())
}

/// Write `children` once per item of the repeated list.
///
/// The item value lives in the region's own data context and is overwritten
/// for each item. Each item, nested repeats included, is written completely
/// before the next one is supplied.
fn write_repeat(
    node: BuilderId,
    repeat: &Repeat,
    children: &[Element],
    cx: &WriteContext<'_>,
    render_context: &mut RenderContext,
) -> Result<(), ScopeError> {
    let items = match cx.tree.lookup(render_context, &repeat.list)? {
        None => {
            trace!("No {} to repeat over in {}", repeat.list, node);
            return Ok(());
        }
        Some(value) => value.as_array().cloned().ok_or_else(|| ScopeError::DataTypeMismatch {
            dependency: repeat.list.clone(),
            expected: "a list".to_string(),
        })?,
    };
    let supply =
        cx.tree.supply_for(node, &repeat.item).ok_or_else(|| ScopeError::MissingAtRender {
            dependency: repeat.item.clone(),
            node,
        })?;

    trace!("Repeating {} items of {} in {}", items.len(), repeat.list, node);
    for item in items {
        render_context.data_mut().set(node, repeat.item.clone(), Some(item))?;
        supply.supply(render_context, node)?;

        render_context.writer_mut().open_element(&repeat.tag, None);
        write_all(children, cx, render_context)?;
        render_context.writer_mut().close_element(&repeat.tag);
    }
    // Clearing the item also clears the values derived from it
    render_context.data_mut().set(node, repeat.item.clone(), None)?;
    supply.supply(render_context, node)
}
