//! Shared helpers for the integration tests.

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding a `site.toml`.
pub struct TestSite {
    dir: TempDir,
}

impl TestSite {
    pub fn new(content: &str) -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp dir")?;
        std::fs::write(dir.path().join("site.toml"), content)
            .context("Failed to write site.toml")?;
        Ok(Self {
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn site_path(&self) -> PathBuf {
        self.dir.path().join("site.toml")
    }

    /// The `pagescope` binary running inside the site directory.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("pagescope").expect("pagescope binary is built");
        cmd.current_dir(self.path()).env_remove("PAGESCOPE_SITE").env_remove("RUST_LOG");
        cmd
    }
}

/// A site whose `broken` page needs a dependency nothing supplies.
pub const BROKEN_SITE: &str = r#"
[engine]
indent = 0

[[data]]
name = "customer"
provides = "Customer"
value = { name = "Ada" }

[pages.home]
[[pages.home.children]]
kind = "component"
template = "Hi {Customer.name}"

[pages.broken]
[[pages.broken.children]]
kind = "component"
template = "{Custmer.name}"
"#;
