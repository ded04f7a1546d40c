//! Component templates with data placeholders.
//!
//! A template is plain markup with placeholders naming a dependency and an
//! optional path into its value:
//!
//! - `{Customer}` - the whole unscoped `Customer` value
//! - `{Product@current.name}` - field `name` of `Product` in scope `current`
//! - `{Order.lines.0.sku}` - paths may index arrays
//!
//! Values are HTML-escaped when written. A placeholder whose dependency is
//! supplied but has no value renders as nothing.

use regex::Regex;

use crate::core::ScopeError;
use crate::data::{DataDependency, display_value, select_path};
use crate::render::{RenderContext, escape_html};
use crate::resolver::ScopeTree;

const PLACEHOLDER_PATTERN: &str = r"\{([^{}]*)\}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder {
        dependency: DataDependency,
        path: String,
    },
}

/// A parsed component template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`, failing on empty placeholders or stray braces.
    pub fn parse(name: &str, source: &str) -> Result<Self, ScopeError> {
        let invalid = |reason: String| ScopeError::InvalidTemplate {
            name: name.to_string(),
            reason,
        };
        let regex = Regex::new(PLACEHOLDER_PATTERN).map_err(|e| invalid(e.to_string()))?;

        let mut segments = Vec::new();
        let mut last = 0;
        for captures in regex.captures_iter(source) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            push_text(&mut segments, &source[last..whole.start()], &invalid)?;
            last = whole.end();

            let inner = inner.as_str().trim();
            let (dependency_text, path) = inner.split_once('.').unwrap_or((inner, ""));
            let dependency = DataDependency::parse(dependency_text)
                .ok_or_else(|| invalid(format!("empty placeholder at byte {}", whole.start())))?;
            segments.push(Segment::Placeholder {
                dependency,
                path: path.to_string(),
            });
        }
        push_text(&mut segments, &source[last..], &invalid)?;

        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Dependencies referenced by the placeholders, in first-use order.
    pub fn dependencies(&self) -> Vec<DataDependency> {
        let mut dependencies = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder {
                dependency,
                ..
            } = segment
                && !dependencies.contains(dependency)
            {
                dependencies.push(dependency.clone());
            }
        }
        dependencies
    }

    /// Fill the placeholders from the selected data context.
    pub fn render(
        &self,
        tree: &ScopeTree,
        render_context: &RenderContext,
    ) -> Result<String, ScopeError> {
        let mut output = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Placeholder {
                    dependency,
                    path,
                } => {
                    if let Some(value) = tree
                        .lookup(render_context, dependency)?
                        .and_then(|value| select_path(value, path))
                    {
                        output.push_str(&escape_html(&display_value(value)));
                    }
                }
            }
        }
        Ok(output)
    }
}

fn push_text(
    segments: &mut Vec<Segment>,
    text: &str,
    invalid: &impl Fn(String) -> ScopeError,
) -> Result<(), ScopeError> {
    if text.contains(['{', '}']) {
        return Err(invalid(format!("unbalanced brace in '{text}'")));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_placeholders() {
        let template =
            Template::parse("card", "<b>{Product@Current.name}</b> for {Customer}").unwrap();
        assert_eq!(
            template.dependencies(),
            vec![DataDependency::scoped("Product", "current"), DataDependency::unscoped("Customer")]
        );
        assert_eq!(template.segments.len(), 4);
        assert_eq!(template.segments[2], Segment::Text("</b> for ".to_string()));
    }

    #[test]
    fn test_repeated_dependency_listed_once() {
        let template = Template::parse("t", "{Customer.first} {Customer.last}").unwrap();
        assert_eq!(template.dependencies(), vec![DataDependency::unscoped("Customer")]);
    }

    #[test]
    fn test_plain_text_template() {
        let template = Template::parse("t", "<hr>").unwrap();
        assert!(template.dependencies().is_empty());
        assert_eq!(template.source(), "<hr>");
    }

    #[test]
    fn test_invalid_templates() {
        for source in ["{}", "{ @scope }", "open { brace", "close } brace", "{a{b}"] {
            let result = Template::parse("broken", source);
            assert!(
                matches!(result, Err(ScopeError::InvalidTemplate { ref name, .. }) if name == "broken"),
                "expected '{source}' to be rejected"
            );
        }
    }
}
