/*
 * rules.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Declarative rules loaded from YAML.
//!
//! ```yaml
//! options:
//!   indentation: true
//! rules:
//!   - tag: secret
//!     delete: true
//!   - tag: title
//!     rename: heading
//!     attributes:
//!       id: "title-{{$.lang}}"
//!   - tag: invoice
//!     collect: true
//!     append:
//!       - name: first-item
//!         value: "{{item[0]._}}"
//! ```
//!
//! Attribute values, `rename`, `text` and the values and attributes of
//! appended nodes may reference stash values with `{{path}}`. A field whose
//! placeholders cannot be resolved yet is left out of that invocation's
//! directive; since callbacks are re-run on every stash push, it takes
//! effect once the data has been seen.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::config::RunnerOptions;
use crate::error::{Error, Result};
use crate::node::{NewTag, RawNode, check_name};
use crate::stash::{Stash, StashPath, VALUE_KEY};
use crate::task::{Directive, TaskCallback, TaskNode, TaskRegistry};
use crate::tree_path::TreeOption;

/// Stash key recording the last text produced by a `text` rule.
const REWRITTEN_KEY: &str = "_rewritten";

/// One declarative rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Rule {
    /// Tag name the rule applies to.
    pub tag: String,

    /// Write the tag under this name.
    #[serde(default)]
    pub rename: Option<String>,

    /// Attributes set on top of the original ones.
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Drop the tag and its content.
    #[serde(default)]
    pub delete: bool,

    /// Keep the tag, drop its content.
    #[serde(default)]
    pub delete_children: bool,

    /// Collect descendant attributes and text into the stash.
    #[serde(default)]
    pub collect: bool,

    /// Stash keying of collected descendants.
    #[serde(default)]
    pub tree: Option<TreeOption>,

    /// Replacement for the tag's own text.
    #[serde(default)]
    pub text: Option<String>,

    /// Nodes written just before the tag closes.
    #[serde(default)]
    pub append: Vec<NewTag>,
}

impl Rule {
    /// A rule with no effect.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            rename: None,
            attributes: IndexMap::new(),
            delete: false,
            delete_children: false,
            collect: false,
            tree: None,
            text: None,
            append: Vec::new(),
        }
    }

    /// A rule deleting every `tag`.
    pub fn delete(tag: impl Into<String>) -> Self {
        Self {
            delete: true,
            ..Self::new(tag)
        }
    }

    /// A rule renaming every `tag` to `new_name`.
    pub fn rename(tag: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            rename: Some(new_name.into()),
            ..Self::new(tag)
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        check_name(&self.tag).map_err(|e| format!("tag: {}", e))?;
        if let Some(name) = self.rename.as_deref().filter(|n| !has_placeholder(n)) {
            check_name(name).map_err(|e| format!("rule for '{}': rename: {}", self.tag, e))?;
        }
        for key in self.attributes.keys() {
            check_name(key).map_err(|e| format!("rule for '{}': attribute {}", self.tag, e))?;
        }
        if let Some(tree) = &self.tree {
            tree.validate().map_err(|e| format!("rule for '{}': tree: {}", self.tag, e))?;
        }
        Ok(())
    }

    fn append_nodes(&self, stash: &Stash) -> Vec<NewTag> {
        self.append.iter().map(|tag| render_tag(tag, stash)).collect()
    }

    /// Stash with `_` replaced by the rendered `text`, unless already done.
    fn rewrite_text(&self, template: &str, stash: &Stash) -> Option<Stash> {
        let value_path = StashPath::new().join(VALUE_KEY);
        let marker_path = StashPath::new().join(REWRITTEN_KEY);
        let current = stash.text(&value_path)?;
        if stash.text(&marker_path) == Some(current) {
            return None;
        }
        let rendered = resolve(stash, template)?;
        let mut stash = stash.clone();
        stash.set(&value_path, rendered.as_str());
        stash.set(&marker_path, rendered);
        Some(stash)
    }
}

impl TaskCallback for Rule {
    fn call(
        &self,
        node: &RawNode,
        _task_node: Option<&TaskNode>,
        stash: &Stash,
    ) -> anyhow::Result<Directive> {
        let mut directive = Directive::new()
            .delete_tag(self.delete)
            .delete_child_nodes(self.delete_children)
            .collect(self.collect);
        if let Some(tree) = &self.tree {
            directive = directive.tree(tree.clone());
        }
        if let Some(name) = self.rename.as_deref().and_then(|t| resolve(stash, t)) {
            directive = directive.rename(name);
        }
        if !self.attributes.is_empty() {
            let mut attributes = node.attributes.clone();
            for (key, template) in &self.attributes {
                if let Some(value) = resolve(stash, template) {
                    attributes.insert(key.clone(), value);
                }
            }
            directive = directive.attributes(attributes);
        }
        if let Some(stash) = self.text.as_deref().and_then(|t| self.rewrite_text(t, stash)) {
            directive = directive.stash(stash);
        }
        if !self.append.is_empty() {
            directive.child_nodes = Some(self.append_nodes(stash));
        }
        Ok(directive)
    }
}

fn has_placeholder(template: &str) -> bool {
    template.contains("{{")
}

fn resolve(stash: &Stash, template: &str) -> Option<String> {
    match stash.interpolate(template) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::trace!(template, error = %err, "Placeholder not resolved yet");
            None
        }
    }
}

fn render_tag(tag: &NewTag, stash: &Stash) -> NewTag {
    NewTag {
        name: tag.name.clone(),
        attributes: tag
            .attributes
            .iter()
            .filter_map(|(k, v)| resolve(stash, v).map(|v| (k.clone(), v)))
            .collect(),
        is_self_closing: tag.is_self_closing,
        value: tag.value.as_deref().and_then(|v| resolve(stash, v)),
        child_nodes: tag
            .child_nodes
            .iter()
            .map(|child| render_tag(child, stash))
            .collect(),
    }
}

/// A rule file: runner options plus rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSet {
    pub options: RunnerOptions,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Check every rule and reject duplicate tags.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            rule.validate().map_err(|message| Error::Rules { message })?;
            if !seen.insert(rule.tag.as_str()) {
                return Err(Error::Rules {
                    message: format!("more than one rule for tag '{}'", rule.tag),
                });
            }
        }
        Ok(())
    }

    /// Register every rule as a task.
    pub fn register(&self, registry: &mut TaskRegistry) {
        for rule in &self.rules {
            registry.add_task_callback(rule.tag.clone(), rule.clone());
        }
    }
}

/// Parse and validate a YAML rule file.
pub fn load_rules(yaml: &str) -> Result<RuleSet> {
    if yaml.trim().is_empty() {
        return Ok(RuleSet::default());
    }
    let rules: RuleSet = serde_yaml::from_str(yaml)?;
    rules.validate()?;
    Ok(rules)
}
