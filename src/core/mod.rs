//! Core types shared by every layer: scope node ids and error handling.
//!
//! - [`BuilderId`] identifies a scope node. The same id keys the node in the
//!   resolved plan and its data context in every request.
//! - [`ScopeError`] is the engine's error type; [`ErrorContext`] and
//!   [`user_friendly_error`] turn errors into actionable CLI output.

pub mod error;

pub use error::{ErrorContext, ScopeError, user_friendly_error};

use serde::Serialize;
use std::fmt;

/// Identifier of a scope node (data context builder).
///
/// Ids are arena indices assigned in creation order; the root is always
/// [`BuilderId::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BuilderId(usize);

impl BuilderId {
    /// The root scope node, owned by the page.
    pub const ROOT: BuilderId = BuilderId(0);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
