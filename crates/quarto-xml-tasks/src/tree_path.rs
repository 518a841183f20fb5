/*
 * tree_path.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tree path naming for collected descendants.
//!
//! A collecting task node owns a [`PathScope`]. Every descendant that opens
//! inside the scope appends a segment `name[k]`, where `k` counts how many
//! siblings with the same name were seen before it under the same parent
//! path. Counters are assigned as elements open, so indices reflect only
//! what the stream has delivered so far.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::stash::{ATTRIBUTES_KEY, StashPath, VALUE_KEY};

/// How a collecting task keys its descendants in the stash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TreeOption {
    /// Full sibling-disambiguated path (`group[0].item[1]`). Written `true`.
    #[default]
    Path,

    /// The descendant's bare name, without disambiguation. Written `false`.
    Flat,

    /// A fixed key used for every descendant.
    Fixed(String),
}

impl<'de> Deserialize<'de> for TreeOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TreeOptionVisitor;

        impl Visitor<'_> for TreeOptionVisitor {
            type Value = TreeOption;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a boolean or a stash key")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<TreeOption, E> {
                Ok(if v { TreeOption::Path } else { TreeOption::Flat })
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TreeOption, E> {
                Ok(TreeOption::Fixed(v.to_string()))
            }
        }

        deserializer.deserialize_any(TreeOptionVisitor)
    }
}

impl TreeOption {
    /// A `Fixed` key must be a path of plain keys. List indices are not
    /// allowed, so a key can never make the stash pad a list.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            TreeOption::Fixed(key) => fixed_path(key).map(|_| ()),
            TreeOption::Path | TreeOption::Flat => Ok(()),
        }
    }
}

fn fixed_path(key: &str) -> Result<StashPath, String> {
    let path = StashPath::parse(key)?;
    if path.has_index() {
        return Err(format!("fixed tree key '{}' may not contain list indices", key));
    }
    Ok(path)
}

/// Which part of a descendant is being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashTerminal {
    Attributes,
    Text,
}

impl StashTerminal {
    pub fn key(self) -> &'static str {
        match self {
            StashTerminal::Attributes => ATTRIBUTES_KEY,
            StashTerminal::Text => VALUE_KEY,
        }
    }
}

/// Path state of one collecting task node.
#[derive(Debug, Clone, Default)]
pub struct PathScope {
    /// Currently open descendants, as (name, occurrence index).
    open: Vec<(String, usize)>,

    /// Last sibling index handed out per path.
    counters: HashMap<StashPath, usize>,
}

impl PathScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a descendant opening inside this scope.
    pub fn enter(&mut self, name: &str) {
        let key = self.current_path().join(name);
        let index = match self.counters.get_mut(&key) {
            Some(counter) => {
                *counter += 1;
                *counter
            }
            None => {
                self.counters.insert(key, 0);
                0
            }
        };
        self.open.push((name.to_string(), index));
    }

    /// Record the innermost descendant closing.
    pub fn leave(&mut self) {
        self.open.pop();
    }

    /// Number of descendants currently open in this scope.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Path of the innermost open descendant.
    pub fn current_path(&self) -> StashPath {
        let mut path = StashPath::new();
        for (name, index) in &self.open {
            path.push_key(name.as_str());
            path.push_index(*index);
        }
        path
    }

    /// Stash path for the innermost open descendant named `child_name`.
    ///
    /// `Fixed` keys that are not a plain key path are used as a single key.
    pub fn stash_path(
        &self,
        child_name: &str,
        tree: &TreeOption,
        terminal: StashTerminal,
    ) -> StashPath {
        let base = match tree {
            TreeOption::Path => self.current_path(),
            TreeOption::Flat => {
                let mut path = StashPath::new();
                path.push_key(child_name);
                path
            }
            TreeOption::Fixed(key) => fixed_path(key).unwrap_or_else(|_| {
                let mut path = StashPath::new();
                path.push_key(key.as_str());
                path
            }),
        };
        base.join(terminal.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(scope: &PathScope, name: &str, tree: &TreeOption, terminal: StashTerminal) -> String {
        scope.stash_path(name, tree, terminal).to_string()
    }

    #[test]
    fn test_sibling_indices() {
        let mut scope = PathScope::new();
        scope.enter("item");
        assert_eq!(key(&scope, "item", &TreeOption::Path, StashTerminal::Attributes), "item[0].$");
        scope.leave();

        scope.enter("item");
        assert_eq!(key(&scope, "item", &TreeOption::Path, StashTerminal::Text), "item[1]._");
        scope.leave();

        scope.enter("other");
        assert_eq!(key(&scope, "other", &TreeOption::Path, StashTerminal::Text), "other[0]._");
    }

    #[test]
    fn test_nested_counters_are_per_parent_path() {
        let mut scope = PathScope::new();
        scope.enter("group");
        scope.enter("item");
        scope.leave();
        scope.enter("item");
        assert_eq!(
            key(&scope, "item", &TreeOption::Path, StashTerminal::Text),
            "group[0].item[1]._"
        );
        scope.leave();
        scope.leave();

        scope.enter("group");
        scope.enter("item");
        assert_eq!(
            key(&scope, "item", &TreeOption::Path, StashTerminal::Text),
            "group[1].item[0]._"
        );
        assert_eq!(scope.depth(), 2);
    }

    #[test]
    fn test_flat_and_fixed_keys() {
        let mut scope = PathScope::new();
        scope.enter("group");
        scope.enter("item");
        assert_eq!(key(&scope, "item", &TreeOption::Flat, StashTerminal::Attributes), "item.$");
        assert_eq!(
            key(&scope, "item", &TreeOption::Fixed("values".into()), StashTerminal::Text),
            "values._"
        );
    }

    #[test]
    fn test_fixed_keys_with_indices() {
        assert!(TreeOption::Fixed("values.all".into()).validate().is_ok());
        assert!(TreeOption::Fixed("x[18446744073709551615]".into()).validate().is_err());
        assert!(TreeOption::Fixed("a..b".into()).validate().is_err());

        let mut scope = PathScope::new();
        scope.enter("a");
        assert_eq!(
            scope
                .stash_path("a", &TreeOption::Fixed("x[9]".into()), StashTerminal::Text)
                .segments()
                .len(),
            2
        );
    }

    #[test]
    fn test_dotted_names_do_not_merge_with_nesting() {
        let mut scope = PathScope::new();
        scope.enter("a.b");
        scope.leave();
        scope.enter("a");
        scope.enter("b");
        assert_eq!(
            key(&scope, "b", &TreeOption::Path, StashTerminal::Text),
            "a[0].b[0]._"
        );
        scope.leave();
        scope.leave();
        scope.enter("a.b");
        assert_eq!(
            key(&scope, "a.b", &TreeOption::Path, StashTerminal::Text),
            "a\\.b[1]._"
        );
    }

    #[test]
    fn test_tree_option_from_yaml() {
        let t: TreeOption = serde_yaml::from_str("true").unwrap();
        assert_eq!(t, TreeOption::Path);
        let t: TreeOption = serde_yaml::from_str("false").unwrap();
        assert_eq!(t, TreeOption::Flat);
        let t: TreeOption = serde_yaml::from_str("values").unwrap();
        assert_eq!(t, TreeOption::Fixed("values".into()));
        assert!(serde_yaml::from_str::<TreeOption>("[1]").is_err());
    }
}
