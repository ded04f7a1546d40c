//! Integration test suite for pagescope
//!
//! End-to-end tests that load site files from disk, resolve pages and run
//! the `pagescope` binary.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **common**: temporary site directories and binary invocation
//! - **site**: loading and rendering site files through the library
//! - **commands**: `render`, `plan` and `validate` through the binary
//! - **concurrency**: many requests against one resolved page

mod common;

mod commands;
mod concurrency;
mod site;
