/*
 * writer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Markup writer with indentation bookkeeping.
//!
//! The writer never sees the whole tree. It decides how to lay out a closing
//! tag from a single piece of remembered state: the name of the most recently
//! opened tag. If the tag now closing is also the last one opened, nothing
//! else opened in between, so its content was text (or nothing) and the close
//! stays on the same line. Otherwise the node had element children and the
//! close goes on its own, indented line.

use std::io;

use quick_xml::escape::{escape, partial_escape};

use crate::node::{NewTag, TagMarkup};
use crate::sink::Sink;

/// Layout settings for a [`Writer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub indentation: bool,
    pub indentation_size: usize,
    pub line_break: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            indentation: false,
            indentation_size: 4,
            line_break: "\n".to_string(),
        }
    }
}

/// Renders tags and text into a [`Sink`].
#[derive(Debug)]
pub struct Writer<S: Sink> {
    sink: S,
    options: WriterOptions,
    depth: usize,
    last_opened: String,
    first_line: bool,
    skip_content: bool,
}

impl<S: Sink> Writer<S> {
    pub fn new(sink: S, options: WriterOptions) -> Self {
        Self {
            sink,
            options,
            depth: 0,
            last_opened: String::new(),
            first_line: true,
            skip_content: false,
        }
    }

    /// Emit the document declaration.
    pub fn write_header(&mut self, declaration: &str) -> io::Result<()> {
        self.sink.write(declaration)?;
        self.first_line = false;
        Ok(())
    }

    /// Emit an open tag (or a self-closing tag) and go one level deeper.
    ///
    /// Depth is incremented for self-closing tags as well; their close is
    /// still routed through [`Writer::write_close_tag`], which undoes it
    /// without emitting markup.
    pub fn write_open_tag(&mut self, tag: TagMarkup<'_>) -> io::Result<()> {
        if self.options.indentation {
            self.indent()?;
        }
        let markup = render_open(tag);
        self.sink.write(&markup)?;
        self.last_opened.clear();
        self.last_opened.push_str(tag.name);
        self.depth += 1;
        Ok(())
    }

    /// Go one level up and emit the close tag, unless the tag was self-closing.
    pub fn write_close_tag(&mut self, tag: TagMarkup<'_>) -> io::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        if self.options.indentation && self.last_opened != tag.name {
            self.indent()?;
        }
        if !tag.is_self_closing {
            self.sink.write(&format!("</{}>", tag.name))?;
        }
        Ok(())
    }

    /// Emit text, escaping `<`, `>` and `&`, unless content is being skipped.
    ///
    /// Text is plain character data here, the same form attribute values
    /// take; markup that must pass through untouched goes to
    /// [`Writer::write_raw`].
    pub fn write_value(&mut self, text: &str) -> io::Result<()> {
        if self.skip_content || text.is_empty() {
            return Ok(());
        }
        self.sink.write(&partial_escape(text))
    }

    /// Emit a chunk that bypasses indentation and content skipping.
    pub fn write_raw(&mut self, chunk: &str) -> io::Result<()> {
        self.sink.write(chunk)
    }

    /// Render an injected node and its descendants.
    pub fn write_new_tag(&mut self, tag: &NewTag) -> io::Result<()> {
        self.write_open_tag(tag.markup())?;
        if !tag.is_self_closing {
            if !tag.child_nodes.is_empty() {
                for child in &tag.child_nodes {
                    self.write_new_tag(child)?;
                }
            } else if let Some(value) = &tag.value {
                self.write_value(value)?;
            }
        }
        self.write_close_tag(tag.markup())
    }

    pub fn set_skip_content(&mut self, skip: bool) {
        self.skip_content = skip;
    }

    pub fn skips_content(&self) -> bool {
        self.skip_content
    }

    /// Signal end of output to the sink.
    pub fn end(&mut self) -> io::Result<()> {
        self.sink.end()
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn indent(&mut self) -> io::Result<()> {
        if !self.first_line {
            self.sink.write(&self.options.line_break)?;
        }
        self.first_line = false;
        let width = self.depth * self.options.indentation_size;
        if width > 0 {
            self.sink.write(&" ".repeat(width))?;
        }
        Ok(())
    }
}

fn render_open(tag: TagMarkup<'_>) -> String {
    let mut out = String::with_capacity(tag.name.len() + 2);
    out.push('<');
    out.push_str(tag.name);
    for (key, value) in tag.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    if tag.is_self_closing {
        out.push_str(" />");
    } else {
        out.push('>');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::RawNode;
    use pretty_assertions::assert_eq;

    fn indented(size: usize) -> WriterOptions {
        WriterOptions {
            indentation: true,
            indentation_size: size,
            ..Default::default()
        }
    }

    fn render(tag: &NewTag, options: WriterOptions) -> String {
        let mut writer = Writer::new(String::new(), options);
        writer.write_new_tag(tag).unwrap();
        writer.into_sink()
    }

    #[test]
    fn test_open_and_close() {
        assert_eq!(
            render(&NewTag::new("test"), WriterOptions::default()),
            "<test></test>"
        );
    }

    #[test]
    fn test_self_closing() {
        assert_eq!(
            render(&NewTag::new("test").self_closing(), WriterOptions::default()),
            "<test />"
        );
    }

    #[test]
    fn test_value() {
        assert_eq!(
            render(
                &NewTag::new("test").with_value("content"),
                WriterOptions::default()
            ),
            "<test>content</test>"
        );
    }

    #[test]
    fn test_nested_with_attributes() {
        let tag = NewTag::new("parent")
            .with_attribute("key", "value")
            .with_child(
                NewTag::new("child")
                    .with_attribute("key", "value")
                    .with_value("child content"),
            );
        assert_eq!(
            render(&tag, WriterOptions::default()),
            "<parent key=\"value\"><child key=\"value\">child content</child></parent>"
        );
    }

    #[test]
    fn test_children_win_over_value() {
        let tag = NewTag::new("parent").with_child(
            NewTag::new("child")
                .with_value("ignored")
                .with_child(NewTag::new("grandchild").with_value("grandchild content")),
        );
        assert_eq!(
            render(&tag, WriterOptions::default()),
            "<parent><child><grandchild>grandchild content</grandchild></child></parent>"
        );
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let tag = NewTag::new("a").with_attribute("title", "x < \"y\" & z");
        assert_eq!(
            render(&tag, WriterOptions::default()),
            "<a title=\"x &lt; &quot;y&quot; &amp; z\"></a>"
        );
    }

    #[test]
    fn test_text_values_are_escaped() {
        let tag = NewTag::new("a").with_value("1 < 2 & \"3\" > 0");
        assert_eq!(
            render(&tag, WriterOptions::default()),
            "<a>1 &lt; 2 &amp; \"3\" &gt; 0</a>"
        );
    }

    #[test]
    fn test_indentation() {
        let tag = NewTag::new("parent").with_child(
            NewTag::new("child")
                .with_value("child content")
                .with_child(NewTag::new("grandchild").with_value("grandchild content")),
        );
        assert_eq!(
            render(&tag, indented(2)),
            "<parent>\n  <child>\n    <grandchild>grandchild content</grandchild>\n  </child>\n</parent>"
        );
    }

    #[test]
    fn test_indentation_with_self_closing_grandchild() {
        let tag = NewTag::new("parent").with_child(
            NewTag::new("child")
                .with_child(
                    NewTag::new("grandchild")
                        .self_closing()
                        .with_value("grandchild content"),
                )
                .with_child(NewTag::new("grandchild").with_value("grandchild content")),
        );
        assert_eq!(
            render(&tag, indented(2)),
            "<parent>\n  <child>\n    <grandchild />\n    <grandchild>grandchild content</grandchild>\n  </child>\n</parent>"
        );
    }

    #[test]
    fn test_header_forces_line_break_before_root() {
        let mut writer = Writer::new(String::new(), indented(4));
        writer
            .write_header("<?xml version=\"1.0\" encoding=\"UTF-8\"?>")
            .unwrap();
        let root = RawNode::new("root");
        writer.write_open_tag(root.markup()).unwrap();
        writer.write_close_tag(root.markup()).unwrap();
        assert_eq!(
            writer.into_sink(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root></root>"
        );
    }

    #[test]
    fn test_skip_content_gates_values_only() {
        let mut writer = Writer::new(String::new(), WriterOptions::default());
        let node = RawNode::new("p");
        writer.write_open_tag(node.markup()).unwrap();
        writer.set_skip_content(true);
        assert!(writer.skips_content());
        writer.write_value("hidden").unwrap();
        writer.write_raw("<!-- raw -->").unwrap();
        writer.set_skip_content(false);
        assert!(!writer.skips_content());
        writer.write_value("shown").unwrap();
        writer.write_close_tag(node.markup()).unwrap();
        assert_eq!(writer.into_sink(), "<p><!-- raw -->shown</p>");
    }

    #[test]
    fn test_custom_line_break() {
        let options = WriterOptions {
            indentation: true,
            indentation_size: 1,
            line_break: "\r\n".to_string(),
        };
        let tag = NewTag::new("a").with_child(NewTag::new("b"));
        assert_eq!(render(&tag, options), "<a>\r\n <b></b>\r\n</a>");
    }
}
