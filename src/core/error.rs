//! Error handling for pagescope
//!
//! This module provides the engine's error type and user-friendly error
//! reporting for the CLI. It follows two principles:
//! 1. **Strongly-typed errors** so callers can react to specific failures
//!    (the page pipeline, for example, repairs [`ScopeError::MissingAtRender`])
//! 2. **User-friendly messages** with actionable suggestions when an error
//!    reaches the command line
//!
//! # Error Categories
//!
//! - **Resolution** (fatal at startup): [`ScopeError::UnsatisfiableDependency`],
//!   [`ScopeError::SupplierMismatch`], [`ScopeError::CircularSupply`]
//! - **Rendering** (fatal for one request): [`ScopeError::MissingAtRender`] (repaired
//!   once automatically), [`ScopeError::RenderFailed`], [`ScopeError::DataTypeMismatch`],
//!   [`ScopeError::RepeatTooDeep`], [`ScopeError::SupplyFailed`]
//! - **Wiring and configuration**: [`ScopeError::UnknownNode`],
//!   [`ScopeError::InvalidTemplate`], [`ScopeError::PageNotFound`],
//!   [`ScopeError::ConfigError`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use pagescope::core::{ScopeError, user_friendly_error};
//! use pagescope::data::DataDependency;
//!
//! let error = ScopeError::UnsatisfiableDependency {
//!     dependency: DataDependency::unscoped("Custmer"),
//!     node: pagescope::core::BuilderId::ROOT,
//!     suggestions: vec!["Customer".to_string()],
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display(); // Prints the error with a "did you mean" suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use super::BuilderId;
use crate::data::DataDependency;

/// The main error type for engine operations.
#[derive(Error, Debug, Clone)]
pub enum ScopeError {
    /// No in-scope supplier and no catalog entry for a dependency.
    ///
    /// Detected while resolving supplies; the page graph is invalid and must
    /// not serve traffic.
    #[error("No supplier found for '{dependency}' needed in scope node {node}")]
    UnsatisfiableDependency {
        /// The dependency nobody supplies
        dependency: DataDependency,
        /// The node whose consumer asked for it
        node: BuilderId,
        /// Similar dependencies the catalog does know about
        suggestions: Vec<String>,
    },

    /// A supplier was asked to fulfil a dependency it does not supply.
    #[error("Supplier '{supplier}' cannot supply '{dependency}'")]
    SupplierMismatch {
        /// Name of the supplier
        supplier: String,
        /// The dependency it was asked for
        dependency: DataDependency,
    },

    /// Supplies on one scope node depend on each other in a cycle.
    #[error("Circular supply detected in scope node {node}: {cycle}")]
    CircularSupply {
        /// The node holding the cycle
        node: BuilderId,
        /// The dependencies forming the cycle, joined with arrows
        cycle: String,
    },

    /// A dependency read while rendering was never resolved.
    ///
    /// Raised when data is requested that resolution never saw, typically a
    /// template edited after the page was wired. The page pipeline repairs
    /// this once by resolving the dependency and rebuilding the context tree.
    #[error("Dependency '{dependency}' was not resolved for scope node {node}")]
    MissingAtRender {
        /// The dependency that was read
        dependency: DataDependency,
        /// The node whose data context was selected
        node: BuilderId,
    },

    /// Rendering a page failed for this request.
    #[error("Failed to render page '{page}': {reason}")]
    RenderFailed {
        /// Page name
        page: String,
        /// What went wrong
        reason: String,
    },

    /// A value has the wrong shape, such as a repeated list that is not an array.
    #[error("Data for '{dependency}' is not {expected}")]
    DataTypeMismatch {
        /// The dependency whose value was read
        dependency: DataDependency,
        /// What the reader expected
        expected: String,
    },

    /// A supplier failed to produce its value.
    #[error("Supplier '{supplier}' failed to supply '{dependency}': {reason}")]
    SupplyFailed {
        /// Name of the supplier
        supplier: String,
        /// The dependency being supplied
        dependency: DataDependency,
        /// What went wrong
        reason: String,
    },

    /// Repeating regions nested deeper than the configured limit.
    #[error("Repeating regions nested {depth} deep exceed the limit of {max}")]
    RepeatTooDeep {
        /// Current nesting depth
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// A scope node id has no builder node or no data context.
    #[error("Unknown scope node {node}")]
    UnknownNode {
        /// The id that was looked up
        node: BuilderId,
    },

    /// A component template could not be parsed.
    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate {
        /// Template (component) name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// A page name that the site does not define.
    #[error("Page '{name}' not found")]
    PageNotFound {
        /// Requested page name
        name: String,
        /// Pages the site does define
        available: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl ScopeError {
    /// Whether the failure happened while resolving supplies, before any
    /// request could be served.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::UnsatisfiableDependency { .. }
                | Self::SupplierMismatch { .. }
                | Self::CircularSupply { .. }
        )
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// Pairs a [`ScopeError`] with an optional suggestion and details, displayed
/// with terminal colors by the CLI.
///
/// ```rust,no_run
/// use pagescope::core::{ErrorContext, ScopeError};
///
/// let context = ErrorContext::new(ScopeError::ConfigError {
///     message: "missing [pages] table".to_string(),
/// })
/// .with_suggestion("Add at least one [pages.<name>] table")
/// .with_details("A site file needs pages to render");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ScopeError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`ScopeError`]
    #[must_use]
    pub const fn new(error: ScopeError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`ScopeError`] (directly or anywhere in the `anyhow` chain),
/// [`toml::de::Error`] and [`std::io::Error`]; anything else is reported with
/// its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(scope_error) = error.chain().find_map(|cause| cause.downcast_ref::<ScopeError>())
    {
        return create_error_context(scope_error.clone());
    }

    if let Some(toml_error) = error.chain().find_map(|cause| cause.downcast_ref::<toml::de::Error>())
    {
        return ErrorContext::new(ScopeError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the site file. Verify quotes, brackets, and table names")
        .with_details("Element definitions need a 'kind' of \"layout\", \"region\" or \"component\"");
    }

    if let Some(io_error) = error.chain().find_map(|cause| cause.downcast_ref::<std::io::Error>())
        && io_error.kind() == std::io::ErrorKind::NotFound
    {
        return ErrorContext::new(ScopeError::ConfigError {
            message: error.to_string(),
        })
        .with_suggestion("Check that the file exists and the path is correct");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(ScopeError::Other {
        message,
    })
}

/// Map each [`ScopeError`] variant to a context with tailored suggestions.
fn create_error_context(error: ScopeError) -> ErrorContext {
    match &error {
        ScopeError::UnsatisfiableDependency {
            dependency,
            suggestions,
            ..
        } => {
            let context = ErrorContext::new(error.clone()).with_details(
                "Every dependency must be supplied by an enclosing scope or by a supplier registered in the catalog",
            );
            if suggestions.is_empty() {
                context.with_suggestion(format!(
                    "Register a supplier for '{dependency}' (a [[data]] or [[derived]] entry in the site file)"
                ))
            } else {
                context.with_suggestion(format!("Did you mean {}?", suggestions.join(", ")))
            }
        }

        ScopeError::SupplierMismatch {
            supplier,
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Check the dependencies advertised by supplier '{supplier}' against the ones it is configured for"
            ))
            .with_details("A supplier was bound to data it does not produce; this is a wiring bug"),

        ScopeError::CircularSupply {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Break the cycle by deriving one of the values from a different source")
            .with_details("Supplies on one scope node must be orderable so every input is ready before it is read"),

        ScopeError::MissingAtRender {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Enable [engine] repair_missing_data or declare the data before the page is wired"),

        ScopeError::DataTypeMismatch {
            dependency,
            expected,
        } => ErrorContext::new(error.clone()).with_suggestion(format!(
            "Make the value supplied for '{dependency}' {expected}"
        )),

        ScopeError::RepeatTooDeep {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Raise [engine] max_repeat_depth or check for a region repeating over its own item"),

        ScopeError::InvalidTemplate {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Placeholders look like {Type}, {Type@scope} or {Type@scope.field.path}"),

        ScopeError::PageNotFound {
            available,
            ..
        } => {
            let context = ErrorContext::new(error.clone());
            if available.is_empty() {
                context.with_suggestion("Define a page with a [pages.<name>] table")
            } else {
                context.with_suggestion(format!("Available pages: {}", available.join(", ")))
            }
        }

        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_display() {
        let error = ScopeError::UnsatisfiableDependency {
            dependency: DataDependency::scoped("Product", "current"),
            node: BuilderId::new(3),
            suggestions: Vec::new(),
        };
        assert_eq!(
            error.to_string(),
            "No supplier found for 'Product@current' needed in scope node #3"
        );
        assert!(error.is_resolution_error());

        let error = ScopeError::MissingAtRender {
            dependency: DataDependency::unscoped("Banner"),
            node: BuilderId::ROOT,
        };
        assert!(!error.is_resolution_error());
    }

    #[test]
    fn test_error_context_display() {
        let context = ErrorContext::new(ScopeError::ConfigError {
            message: "bad".to_string(),
        })
        .with_suggestion("fix it")
        .with_details("because");

        let text = context.to_string();
        assert!(text.contains("Configuration error: bad"));
        assert!(text.contains("Details: because"));
        assert!(text.contains("Suggestion: fix it"));
    }

    #[test]
    fn test_user_friendly_error_finds_scope_error_in_chain() {
        let result: anyhow::Result<()> = Err(ScopeError::UnsatisfiableDependency {
            dependency: DataDependency::unscoped("Custmer"),
            node: BuilderId::ROOT,
            suggestions: vec!["Customer".to_string()],
        })
        .context("Failed to wire page 'home'");

        let context = user_friendly_error(result.unwrap_err());
        assert!(matches!(context.error, ScopeError::UnsatisfiableDependency { .. }));
        assert_eq!(context.suggestion.as_deref(), Some("Did you mean Customer?"));
    }

    #[test]
    fn test_user_friendly_error_generic_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let context = user_friendly_error(error);
        match context.error {
            ScopeError::Other {
                message,
            } => {
                assert!(message.starts_with("outer"));
                assert!(message.contains("1: root cause"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
