//! Dotted path selection inside data values.

use super::DataValue;

/// Select the value at a dotted `path` inside `value`.
///
/// Segments index objects by key and arrays by position. An empty path
/// selects `value` itself.
///
/// ```
/// use pagescope::data::select_path;
/// use serde_json::json;
///
/// let product = json!({ "name": "Lamp", "tags": ["desk", "led"] });
/// assert_eq!(select_path(&product, "tags.1"), Some(&json!("led")));
/// assert_eq!(select_path(&product, ""), Some(&product));
/// assert_eq!(select_path(&product, "price"), None);
/// ```
pub fn select_path<'a>(value: &'a DataValue, path: &str) -> Option<&'a DataValue> {
    path.split('.').filter(|segment| !segment.is_empty()).try_fold(value, |current, segment| {
        match current {
            DataValue::Object(map) => map.get(segment),
            DataValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

/// Text form of a value for embedding in markup.
///
/// Strings are written without quotes and `null` as nothing; composite values
/// fall back to their JSON form.
pub fn display_value(value: &DataValue) -> String {
    match value {
        DataValue::Null => String::new(),
        DataValue::String(text) => text.clone(),
        DataValue::Bool(flag) => flag.to_string(),
        DataValue::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_nested_path() {
        let value = json!({ "customer": { "address": { "city": "Oslo" } } });
        assert_eq!(select_path(&value, "customer.address.city"), Some(&json!("Oslo")));
        assert_eq!(select_path(&value, "customer.phone"), None);
    }

    #[test]
    fn test_select_through_scalar_fails() {
        let value = json!({ "name": "Lamp" });
        assert_eq!(select_path(&value, "name.first"), None);
        assert_eq!(select_path(&json!([1, 2]), "two"), None);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("plain")), "plain");
        assert_eq!(display_value(&json!(null)), "");
        assert_eq!(display_value(&json!(12.5)), "12.5");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }
}
