/*
 * stash.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Per-occurrence scratch storage for task nodes.
//!
//! A stash is a nested map filled while a task's element is open: its own
//! attributes under `$`, its own text under `_`, and, for collecting tasks,
//! descendant attributes and text under tree paths such as `item[1].$`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::node::Attributes;

/// Stash key holding an attribute set.
pub const ATTRIBUTES_KEY: &str = "$";

/// Stash key holding a text value.
pub const VALUE_KEY: &str = "_";

/// Most `Null` entries a single write may add to pad a list.
const MAX_PADDING: usize = 1024;

/// A value stored in a [`Stash`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StashValue {
    /// A text value.
    Text(String),

    /// An indexed list. Short gaps are filled with `Null`; a write more than
    /// `MAX_PADDING` entries past the end is dropped.
    List(Vec<StashValue>),

    /// A map of keys to values, in insertion order.
    Map(IndexMap<String, StashValue>),

    /// A missing value.
    #[default]
    Null,
}

impl StashValue {
    /// Get a nested value by path.
    pub fn get_path(&self, path: &[Segment]) -> Option<&StashValue> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        match (self, first) {
            (StashValue::Map(map), Segment::Key(key)) => map.get(key)?.get_path(rest),
            (StashValue::List(items), Segment::Index(index)) => items.get(*index)?.get_path(rest),
            _ => None,
        }
    }

    /// The text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StashValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn set_path(&mut self, path: &[Segment], value: StashValue) {
        let Some((first, rest)) = path.split_first() else {
            *self = value;
            return;
        };
        match first {
            Segment::Key(key) => {
                if !matches!(self, StashValue::Map(_)) {
                    *self = StashValue::Map(IndexMap::new());
                }
                if let StashValue::Map(map) = self {
                    map.entry(key.clone()).or_default().set_path(rest, value);
                }
            }
            Segment::Index(index) => {
                if !matches!(self, StashValue::List(_)) {
                    *self = StashValue::List(Vec::new());
                }
                if let StashValue::List(items) = self {
                    if items.len() <= *index {
                        let padding = *index - items.len();
                        if padding > MAX_PADDING {
                            tracing::warn!(index, len = items.len(), "Stash index too far past the end of its list");
                            return;
                        }
                        items.resize_with(items.len() + padding + 1, Default::default);
                    }
                    items[*index].set_path(rest, value);
                }
            }
        }
    }
}

impl From<&str> for StashValue {
    fn from(s: &str) -> Self {
        StashValue::Text(s.to_string())
    }
}

impl From<String> for StashValue {
    fn from(s: String) -> Self {
        StashValue::Text(s)
    }
}

impl From<&Attributes> for StashValue {
    fn from(attributes: &Attributes) -> Self {
        StashValue::Map(
            attributes
                .iter()
                .map(|(k, v)| (k.clone(), StashValue::Text(v.clone())))
                .collect(),
        )
    }
}

/// One step of a [`StashPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A structured stash path.
///
/// The textual form joins keys with `.` and writes indices as `[n]`
/// directly after the key they apply to: `group[0].item[2].$`. A key
/// containing `.`, `[`, `]` or `\` has them escaped with `\`, so the element
/// `<dc.title>` is reached with `dc\.title._`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StashPath(Vec<Segment>);

impl StashPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the textual form of a path.
    pub fn parse(input: &str) -> Result<Self, String> {
        if input.is_empty() {
            return Err("empty stash path".to_string());
        }
        let malformed = || format!("malformed index in stash path '{}'", input);
        let mut segments = Vec::new();
        let mut chars = input.chars();
        loop {
            let mut key = String::new();
            let mut next = None;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => key.push(
                        chars
                            .next()
                            .ok_or_else(|| format!("dangling escape in stash path '{}'", input))?,
                    ),
                    '.' | '[' => {
                        next = Some(c);
                        break;
                    }
                    ']' => return Err(malformed()),
                    _ => key.push(c),
                }
            }
            if key.is_empty() {
                return Err(format!("empty key in stash path '{}'", input));
            }
            segments.push(Segment::Key(key));

            while next == Some('[') {
                let mut digits = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    digits.push(c);
                }
                if !closed {
                    return Err(malformed());
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| format!("invalid index in stash path '{}'", input))?;
                segments.push(Segment::Index(index));
                next = chars.next();
                if !matches!(next, None | Some('.') | Some('[')) {
                    return Err(malformed());
                }
            }

            if next.is_none() {
                return Ok(StashPath(segments));
            }
        }
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.0.push(Segment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.0.push(Segment::Index(index));
    }

    /// Return a copy extended with one key.
    pub fn join(&self, key: &str) -> StashPath {
        let mut path = self.clone();
        path.push_key(key);
        path
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any segment is a list index.
    pub fn has_index(&self) -> bool {
        self.0.iter().any(|s| matches!(s, Segment::Index(_)))
    }
}

impl fmt::Display for StashPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    for c in key.chars() {
                        if matches!(c, '.' | '[' | ']' | '\\') {
                            f.write_str("\\")?;
                        }
                        write!(f, "{}", c)?;
                    }
                }
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Nested scratch map owned by one task node occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stash {
    root: IndexMap<String, StashValue>,
}

impl Stash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `path`, creating intermediate maps and lists.
    pub fn set(&mut self, path: &StashPath, value: impl Into<StashValue>) {
        let Some((Segment::Key(first), rest)) = path.segments().split_first() else {
            return;
        };
        self.root
            .entry(first.clone())
            .or_default()
            .set_path(rest, value.into());
    }

    /// Look up the value at `path`.
    pub fn get(&self, path: &StashPath) -> Option<&StashValue> {
        let (first, rest) = path.segments().split_first()?;
        let Segment::Key(first) = first else {
            return None;
        };
        self.root.get(first)?.get_path(rest)
    }

    /// Look up a path given in textual form.
    pub fn lookup(&self, path: &str) -> Option<&StashValue> {
        StashPath::parse(path).ok().and_then(|p| self.get(&p))
    }

    /// Text stored at `path`, if any.
    pub fn text(&self, path: &StashPath) -> Option<&str> {
        self.get(path).and_then(StashValue::as_text)
    }

    /// Attribute set stored at `path`, converted back to [`Attributes`].
    /// Non-text entries are skipped.
    pub fn attributes(&self, path: &StashPath) -> Option<Attributes> {
        match self.get(path)? {
            StashValue::Map(map) => Some(
                map.iter()
                    .filter_map(|(k, v)| v.as_text().map(|t| (k.clone(), t.to_string())))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Replace every `{{path}}` in `template` with the text stored at that
    /// path. A path that is missing or does not hold text is an error.
    pub fn interpolate(&self, template: &str) -> anyhow::Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| anyhow::anyhow!("unterminated '{{{{' in '{}'", template))?;
            let raw_path = after[..end].trim();
            let path = StashPath::parse(raw_path).map_err(|e| anyhow::anyhow!(e))?;
            let text = self
                .text(&path)
                .ok_or_else(|| anyhow::anyhow!("no text value in stash at '{}'", raw_path))?;
            out.push_str(text);
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
