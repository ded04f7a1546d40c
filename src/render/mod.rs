//! Per-request render state.
//!
//! A [`RenderContext`] is created for every request. It owns the request's
//! [`DataContextTree`], which the resolved plan populates, and the
//! [`HtmlWriter`] elements write to. Nothing in here is shared between
//! requests.

mod context;
mod writer;

pub use context::{DataContext, DataContextTree, DataView, RenderContext, RequestParams};
pub use writer::{HtmlWriter, escape_html};
