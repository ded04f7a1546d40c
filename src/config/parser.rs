//! Generic TOML parsing with file path context.
//!
//! ```rust,no_run
//! use pagescope::config::{SiteConfig, parse_config};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let site: SiteConfig = parse_config(Path::new("site.toml"))?;
//! println!("{} pages", site.pages.len());
//! # Ok(())
//! # }
//! ```
//!
//! Errors carry two levels of context, the failed operation and the
//! underlying I/O or TOML error:
//!
//! ```text
//! Failed to parse config file: /path/to/site.toml
//! Caused by:
//!     invalid type: integer `3`, expected a string
//! ```

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a TOML file into `T`.
///
/// # Errors
///
/// Fails when the file cannot be read or does not deserialize into `T`.
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataDependency;
    use tempfile::tempdir;

    #[test]
    fn test_parse_config() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("deps.toml");

        #[derive(serde::Deserialize)]
        struct Deps {
            needs: Vec<DataDependency>,
        }

        std::fs::write(&config_path, r#"needs = ["Customer", "Product@Current"]"#).unwrap();

        let config: Deps = parse_config(&config_path).unwrap();
        assert_eq!(
            config.needs,
            vec![DataDependency::unscoped("Customer"), DataDependency::scoped("Product", "current")]
        );
    }

    #[test]
    fn test_parse_config_error_names_file() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("invalid.toml");

        #[derive(Debug, serde::Deserialize)]
        struct Deps {
            #[allow(dead_code)] // Only deserialization is checked
            needs: Vec<DataDependency>,
        }

        std::fs::write(&config_path, "needs = [\"@scope\"]").unwrap();
        let error = parse_config::<Deps>(&config_path).unwrap_err();
        assert!(error.to_string().contains("invalid.toml"));

        let missing = parse_config::<Deps>(&temp.path().join("missing.toml")).unwrap_err();
        assert!(missing.to_string().starts_with("Failed to read config file"));
    }
}
