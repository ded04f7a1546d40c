//! Test utilities for pagescope
//!
//! Fixtures for building scope trees and catalogs in unit and integration
//! tests, plus a once-only tracing subscriber.
//!
//! # Example
//!
//! ```rust,no_run
//! use pagescope::test_utils::{TestConsumer, init_test_logging, product_catalog};
//!
//! init_test_logging(None);
//! let catalog = product_catalog();
//! let consumer = TestConsumer::new("greeting")
//!     .with_dependency(pagescope::data::DataDependency::unscoped("Customer"));
//! ```

pub mod fixtures;

pub use fixtures::{
    CountingSupplier, LyingSupplier, SAMPLE_SITE, TestConsumer, current_product_dependency,
    product_catalog, product_list, product_list_dependency,
};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. `RUST_LOG` is used when no level is
/// given; with neither, tests run without a subscriber.
///
/// ```bash
/// RUST_LOG=pagescope=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
