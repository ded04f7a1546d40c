//! Minimal HTML output buffer.

/// Escape text for use in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Line-oriented HTML writer with optional indentation.
#[derive(Debug, Clone, Default)]
pub struct HtmlWriter {
    buffer: String,
    indent: usize,
    depth: usize,
}

impl HtmlWriter {
    /// Create a writer indenting nested elements by `indent` spaces.
    pub fn new(indent: usize) -> Self {
        Self {
            buffer: String::new(),
            indent,
            depth: 0,
        }
    }

    fn line(&mut self, content: &str) {
        if self.indent > 0 {
            self.buffer.push_str(&" ".repeat(self.indent * self.depth));
        }
        self.buffer.push_str(content);
        if self.indent > 0 {
            self.buffer.push('\n');
        }
    }

    /// Write an opening tag with an optional class attribute.
    pub fn open_element(&mut self, tag: &str, class: Option<&str>) {
        let tag = match class {
            Some(class) => format!("<{tag} class=\"{}\">", escape_html(class)),
            None => format!("<{tag}>"),
        };
        self.line(&tag);
        self.depth += 1;
    }

    pub fn close_element(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(&format!("</{tag}>"));
    }

    /// Write already-formed markup as one line.
    pub fn write_raw(&mut self, markup: &str) {
        self.line(markup);
    }

    /// Write escaped text as one line.
    pub fn write_text(&mut self, text: &str) {
        self.line(&escape_html(text));
    }

    /// Discard everything written so far.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.depth = 0;
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_indented_output() {
        let mut writer = HtmlWriter::new(2);
        writer.open_element("ul", Some("items"));
        writer.open_element("li", None);
        writer.write_text("a < b");
        writer.close_element("li");
        writer.close_element("ul");

        assert_eq!(
            writer.as_str(),
            "<ul class=\"items\">\n  <li>\n    a &lt; b\n  </li>\n</ul>\n"
        );
    }

    #[test]
    fn test_compact_output_and_clear() {
        let mut writer = HtmlWriter::new(0);
        writer.open_element("p", None);
        writer.write_raw("<b>x</b>");
        writer.close_element("p");
        assert_eq!(writer.as_str(), "<p><b>x</b></p>");

        writer.clear();
        assert!(writer.as_str().is_empty());
    }
}
