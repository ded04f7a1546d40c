//! Data dependency identities.
//!
//! A [`DataDependency`] names "a value of type T in scope S". It is the key
//! for every lookup the engine performs: supplier matching, deduplication on a
//! scope node, and value storage inside a runtime data context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::constants::{LIST_TYPE_PREFIX, LIST_TYPE_SUFFIX};

/// Values carried through data contexts.
pub type DataValue = serde_json::Value;

/// A named data type.
///
/// Type names compare case-sensitively. List types are spelled
/// `list<Item>` and are normally built with [`DataType::list_of`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DataType(Arc<str>);

impl DataType {
    /// Create a data type from its name.
    pub fn named(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref().trim()))
    }

    /// The list type whose elements are `item`.
    pub fn list_of(item: &DataType) -> Self {
        Self::named(format!("{LIST_TYPE_PREFIX}{}{LIST_TYPE_SUFFIX}", item.name()))
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether this is a list type.
    pub fn is_list(&self) -> bool {
        self.item_type().is_some()
    }

    /// The element type of a list type, `None` for non-list types.
    pub fn item_type(&self) -> Option<DataType> {
        self.0
            .strip_prefix(LIST_TYPE_PREFIX)
            .and_then(|rest| rest.strip_suffix(LIST_TYPE_SUFFIX))
            .filter(|inner| !inner.is_empty())
            .map(DataType::named)
    }
}

impl From<String> for DataType {
    fn from(value: String) -> Self {
        Self::named(value)
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.0.to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType({})", self.0)
    }
}

/// A scope name.
///
/// Scope names are compared case-insensitively, so the name is normalized to
/// lowercase on construction. The empty name is the unscoped default.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ScopeName(Arc<str>);

impl ScopeName {
    /// Create a scope name. Empty and whitespace-only names are unscoped.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref().trim().to_lowercase()))
    }

    /// The unscoped default.
    pub fn unscoped() -> Self {
        Self::default()
    }

    pub fn is_unscoped(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScopeName {
    fn default() -> Self {
        Self(Arc::from(""))
    }
}

impl From<String> for ScopeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<ScopeName> for String {
    fn from(value: ScopeName) -> Self {
        value.0.to_string()
    }
}

impl From<Option<&str>> for ScopeName {
    fn from(value: Option<&str>) -> Self {
        value.map(ScopeName::new).unwrap_or_default()
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeName({:?})", &*self.0)
    }
}

/// Identity of "a value of type T in scope S".
///
/// Two dependencies are equal iff their types match and their scope names
/// match case-insensitively. Immutable once created.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataDependency {
    pub data_type: DataType,
    pub scope: ScopeName,
}

impl DataDependency {
    pub fn new(data_type: DataType, scope: ScopeName) -> Self {
        Self {
            data_type,
            scope,
        }
    }

    /// An unscoped dependency on `type_name`.
    pub fn unscoped(type_name: impl AsRef<str>) -> Self {
        Self::new(DataType::named(type_name), ScopeName::unscoped())
    }

    /// A dependency on `type_name` in `scope`.
    pub fn scoped(type_name: impl AsRef<str>, scope: impl AsRef<str>) -> Self {
        Self::new(DataType::named(type_name), ScopeName::new(scope))
    }

    /// The same type with the scope removed.
    pub fn without_scope(&self) -> Self {
        Self::new(self.data_type.clone(), ScopeName::unscoped())
    }

    pub fn is_scoped(&self) -> bool {
        !self.scope.is_unscoped()
    }

    /// Parse the `Type@scope` notation used in configuration and templates.
    ///
    /// Returns `None` for an empty type name.
    pub fn parse(text: &str) -> Option<Self> {
        let (type_name, scope) = match text.split_once('@') {
            Some((type_name, scope)) => (type_name, scope),
            None => (text, ""),
        };
        let type_name = type_name.trim();
        if type_name.is_empty() {
            return None;
        }
        Some(Self::scoped(type_name, scope))
    }
}

impl TryFrom<String> for DataDependency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid data dependency '{value}'"))
    }
}

impl From<DataDependency> for String {
    fn from(value: DataDependency) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DataDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_unscoped() {
            write!(f, "{}", self.data_type)
        } else {
            write!(f, "{}@{}", self.data_type, self.scope)
        }
    }
}

impl fmt::Debug for DataDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataDependency({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_scope_comparison_is_case_insensitive() {
        let a = DataDependency::scoped("Product", "Current");
        let b = DataDependency::scoped("Product", "current");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_type_comparison_is_case_sensitive() {
        assert_ne!(DataDependency::unscoped("Product"), DataDependency::unscoped("product"));
    }

    #[test]
    fn test_empty_scope_is_unscoped() {
        let dep = DataDependency::scoped("Customer", "  ");
        assert!(!dep.is_scoped());
        assert_eq!(dep, DataDependency::unscoped("Customer"));
        assert_eq!(ScopeName::from(None::<&str>), ScopeName::unscoped());
    }

    #[test]
    fn test_list_types() {
        let product = DataType::named("Product");
        let list = DataType::list_of(&product);
        assert_eq!(list.name(), "list<Product>");
        assert!(list.is_list());
        assert_eq!(list.item_type(), Some(product.clone()));
        assert!(!product.is_list());
        assert!(DataType::named("list<>").item_type().is_none());
    }

    #[test]
    fn test_parse_and_display() {
        let dep = DataDependency::parse("list<Product>@Catalog").unwrap();
        assert_eq!(dep.data_type.name(), "list<Product>");
        assert_eq!(dep.scope.as_str(), "catalog");
        assert_eq!(dep.to_string(), "list<Product>@catalog");

        assert_eq!(DataDependency::parse("Customer").unwrap().to_string(), "Customer");
        assert!(DataDependency::parse("@scope").is_none());
    }

    #[test]
    fn test_deserializes_from_notation() {
        #[derive(Deserialize)]
        struct Holder {
            dependency: DataDependency,
        }

        let holder: Holder = toml::from_str(r#"dependency = "Product@Current""#).unwrap();
        assert_eq!(holder.dependency, DataDependency::scoped("Product", "current"));

        let invalid: Result<Holder, _> = toml::from_str(r#"dependency = "@current""#);
        assert!(invalid.is_err());
    }
}
