//! Constants shared across the engine.
//!
//! Limits and well-known names used by more than one module live here so
//! the resolver, the render pipeline and the configuration layer agree on
//! them.

/// Prefix of list type names, as in `list<Product>`.
pub const LIST_TYPE_PREFIX: &str = "list<";

/// Suffix of list type names.
pub const LIST_TYPE_SUFFIX: &str = ">";

/// Type name under which the per-request parameters are supplied.
pub const REQUEST_TYPE: &str = "Request";

/// Default nesting limit for repeating regions inside one another.
///
/// Deeper nesting almost always means a region repeats over data derived from
/// its own item. The limit turns that into a render error instead of a stack
/// overflow.
pub const DEFAULT_MAX_REPEAT_DEPTH: usize = 16;

/// Default indentation (in spaces) used by the HTML writer. Zero disables it.
pub const DEFAULT_INDENT: usize = 2;

/// Maximum Levenshtein distance, as a percentage of the requested name length,
/// for a known dependency to be offered as a suggestion.
pub const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Maximum number of suggestions attached to an unsatisfiable dependency error.
pub const MAX_SUGGESTIONS: usize = 3;
