/*
 * node.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tag node types shared by the tokenizer, the writer and task callbacks.

use indexmap::IndexMap;
use serde::Deserialize;

/// Ordered attribute mapping. Keys are unique; insertion order is kept so
/// attributes serialize in the order they were read.
pub type Attributes = IndexMap<String, String>;

/// A tag as produced by the tokenizer for one open event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    /// The tag name, including any namespace prefix.
    pub name: String,

    /// Attributes in source order, values unescaped.
    pub attributes: Attributes,

    /// True for `<name/>`.
    pub is_self_closing: bool,
}

impl RawNode {
    /// Create a node without attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            is_self_closing: false,
        }
    }

    /// Add an attribute, replacing any previous value for the same key.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Mark the node as self-closing.
    pub fn self_closing(mut self) -> Self {
        self.is_self_closing = true;
        self
    }

    /// Borrow this node as writer input.
    pub fn markup(&self) -> TagMarkup<'_> {
        TagMarkup {
            name: &self.name,
            attributes: &self.attributes,
            is_self_closing: self.is_self_closing,
        }
    }
}

/// What the writer needs to render one tag.
#[derive(Debug, Clone, Copy)]
pub struct TagMarkup<'a> {
    pub name: &'a str,
    pub attributes: &'a Attributes,
    pub is_self_closing: bool,
}

/// A node injected by a task directive and serialized as-is.
///
/// When `child_nodes` is non-empty the `value` is ignored; a self-closing
/// node renders neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct NewTag {
    pub name: String,
    pub attributes: Attributes,
    pub is_self_closing: bool,
    pub value: Option<String>,
    pub child_nodes: Vec<NewTag>,
}

impl NewTag {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the text content.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: NewTag) -> Self {
        self.child_nodes.push(child);
        self
    }

    /// Mark the node as self-closing.
    pub fn self_closing(mut self) -> Self {
        self.is_self_closing = true;
        self
    }

    pub fn markup(&self) -> TagMarkup<'_> {
        TagMarkup {
            name: &self.name,
            attributes: &self.attributes,
            is_self_closing: self.is_self_closing,
        }
    }
}

/// Check that `name` can be written as a tag or attribute name.
///
/// This is a conservative check, not full XML name validation: the name must
/// be non-empty and free of whitespace and markup delimiters.
pub(crate) fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name must not be empty".to_string());
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '<' | '>' | '/' | '"' | '\'' | '=' | '&'))
    {
        return Err(format!("name '{}' contains invalid character {:?}", name, c));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_node_builder_keeps_attribute_order() {
        let node = RawNode::new("item")
            .with_attribute("z", "1")
            .with_attribute("a", "2");

        let keys: Vec<&str> = node.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert!(!node.is_self_closing);
    }

    #[test]
    fn test_new_tag_from_yaml() {
        let tag: NewTag = serde_yaml::from_str(
            "name: note\nattributes: {kind: info}\nvalue: hello\n",
        )
        .unwrap();
        assert_eq!(tag.name, "note");
        assert_eq!(tag.attributes.get("kind").map(String::as_str), Some("info"));
        assert_eq!(tag.value.as_deref(), Some("hello"));
        assert!(tag.child_nodes.is_empty());
    }

    #[test]
    fn test_new_tag_rejects_unknown_keys() {
        let result: Result<NewTag, _> = serde_yaml::from_str("name: note\ncolour: red\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("dc:title").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("two words").is_err());
        assert!(check_name("a<b").is_err());
    }
}
