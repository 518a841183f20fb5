/*
 * open_stack.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Bookkeeping for currently open tags.

use std::collections::HashMap;

use crate::node::RawNode;

/// The chain of currently open raw nodes, outermost first.
#[derive(Debug, Default)]
pub struct OpenStack {
    nodes: Vec<RawNode>,
}

impl OpenStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: RawNode) {
        self.nodes.push(node);
    }

    pub fn pop(&mut self) -> Option<RawNode> {
        self.nodes.pop()
    }

    /// The innermost open node.
    pub fn current(&self) -> Option<&RawNode> {
        self.nodes.last()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current().map(|node| node.name.as_str())
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// What the engine remembers about one open tag occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenRecord {
    /// A task matched this occurrence.
    pub is_task: bool,

    /// The open tag was written, so the close must be too.
    pub written: bool,

    /// Index of the task frame whose path scope this occurrence entered.
    pub scope_owner: Option<usize>,
}

/// Open records keyed by tag name.
///
/// Each name maps to a stack, so the same name may be open at several
/// levels at once. A close always resolves to the most recent occurrence.
#[derive(Debug, Default)]
pub struct OpenRecords {
    by_name: HashMap<String, Vec<OpenRecord>>,
}

impl OpenRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, record: OpenRecord) {
        self.by_name.entry(name.to_string()).or_default().push(record);
    }

    /// Remove and return the most recent record for `name`.
    pub fn pop(&mut self, name: &str) -> Option<OpenRecord> {
        let stack = self.by_name.get_mut(name)?;
        let record = stack.pop();
        if stack.is_empty() {
            self.by_name.remove(name);
        }
        record
    }

    /// The most recent record for `name`.
    pub fn last(&self, name: &str) -> Option<&OpenRecord> {
        self.by_name.get(name).and_then(|stack| stack.last())
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(scope_owner: Option<usize>) -> OpenRecord {
        OpenRecord {
            is_task: false,
            written: true,
            scope_owner,
        }
    }

    #[test]
    fn test_stack_tracks_current_node() {
        let mut stack = OpenStack::new();
        assert_eq!(stack.current_name(), None);

        stack.push(RawNode::new("root"));
        stack.push(RawNode::new("child"));
        assert_eq!(stack.current_name(), Some("child"));
        assert_eq!(stack.depth(), 2);

        assert_eq!(stack.pop().map(|n| n.name), Some("child".to_string()));
        assert_eq!(stack.current_name(), Some("root"));
    }

    #[test]
    fn test_same_name_records_nest() {
        let mut records = OpenRecords::new();
        records.push("div", record(None));
        records.push("div", record(Some(0)));

        assert_eq!(records.last("div").and_then(|r| r.scope_owner), Some(0));
        assert_eq!(records.pop("div").and_then(|r| r.scope_owner), Some(0));
        assert_eq!(records.pop("div").map(|r| r.scope_owner), Some(None));
        assert!(records.pop("div").is_none());
        assert!(records.is_empty());
    }
}
