/*
 * task.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tasks, directives and task node lifecycle.
//!
//! A task binds a tag name to a callback. When a matching tag opens, the
//! callback is invoked once to produce a [`Directive`], which seeds a
//! [`TaskNode`] for that occurrence. Every later push into the node's stash
//! invokes the callback again with the live node, and the fields it returns
//! are merged into the node.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::config::CallbackPolicy;
use crate::error::{Error, HookStage, Result};
use crate::node::{Attributes, NewTag, RawNode, TagMarkup, check_name};
use crate::stash::{ATTRIBUTES_KEY, Stash, StashPath, StashValue, VALUE_KEY};
use crate::tree_path::{PathScope, StashTerminal, TreeOption};

/// Signature of lifecycle hooks.
pub type HookFn = dyn Fn(&mut TaskNode, &mut HookContext) -> anyhow::Result<()>;

/// A lifecycle hook attached by a directive.
#[derive(Clone)]
pub struct Hook(Rc<HookFn>);

impl Hook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut TaskNode, &mut HookContext) -> anyhow::Result<()> + 'static,
    {
        Hook(Rc::new(f))
    }

    fn call(&self, node: &mut TaskNode, ctx: &mut HookContext) -> anyhow::Result<()> {
        (self.0)(node, ctx)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook(..)")
    }
}

/// The four lifecycle hooks of a task node.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub before_open_write: Option<Hook>,
    pub after_open_write: Option<Hook>,
    pub before_close_write: Option<Hook>,
    pub after_close_write: Option<Hook>,
}

impl Hooks {
    fn get(&self, stage: HookStage) -> Option<&Hook> {
        match stage {
            HookStage::BeforeOpenWrite => self.before_open_write.as_ref(),
            HookStage::AfterOpenWrite => self.after_open_write.as_ref(),
            HookStage::BeforeCloseWrite => self.before_close_write.as_ref(),
            HookStage::AfterCloseWrite => self.after_close_write.as_ref(),
        }
    }

    fn merge(&mut self, other: Hooks) {
        if other.before_open_write.is_some() {
            self.before_open_write = other.before_open_write;
        }
        if other.after_open_write.is_some() {
            self.after_open_write = other.after_open_write;
        }
        if other.before_close_write.is_some() {
            self.before_close_write = other.before_close_write;
        }
        if other.after_close_write.is_some() {
            self.after_close_write = other.after_close_write;
        }
    }
}

/// Output produced by a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    Raw(String),
    Tag(NewTag),
}

/// Handle passed to hooks for emitting extra output.
///
/// Emissions are written right after the hook returns, in the order they
/// were made, regardless of content suppression.
#[derive(Debug)]
pub struct HookContext {
    stage: HookStage,
    emissions: Vec<Emission>,
}

impl HookContext {
    fn new(stage: HookStage) -> Self {
        Self {
            stage,
            emissions: Vec::new(),
        }
    }

    pub fn stage(&self) -> HookStage {
        self.stage
    }

    /// Emit a chunk of markup verbatim.
    pub fn write_raw(&mut self, chunk: impl Into<String>) {
        self.emissions.push(Emission::Raw(chunk.into()));
    }

    /// Emit a complete element.
    pub fn write_new_tag(&mut self, tag: NewTag) {
        self.emissions.push(Emission::Tag(tag));
    }
}

/// Descendant collection settings of a task node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChildOptions {
    /// Push descendant attributes and text into this node's stash.
    pub collect: bool,

    /// How descendants are keyed.
    pub tree: TreeOption,
}

/// Partial [`ChildOptions`] as returned by a callback.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChildOptionsPatch {
    pub collect: Option<bool>,
    pub tree: Option<TreeOption>,
}

impl ChildOptions {
    fn apply(&mut self, patch: ChildOptionsPatch) {
        if let Some(collect) = patch.collect {
            self.collect = collect;
        }
        if let Some(tree) = patch.tree {
            self.tree = tree;
        }
    }
}

/// What a task callback wants done with one tag occurrence.
///
/// Every field is optional. On the first invocation an omitted field takes
/// its default; on recompute an omitted field leaves the node unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Directive {
    pub new_name: Option<String>,
    pub new_attributes: Option<Attributes>,
    pub child_nodes: Option<Vec<NewTag>>,
    pub child_options: Option<ChildOptionsPatch>,
    pub delete_tag: Option<bool>,
    pub delete_child_nodes: Option<bool>,
    pub stash: Option<Stash>,
    #[serde(skip)]
    pub hooks: Hooks,
}

impl Directive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the tag under another name.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

    /// Replace the tag's attributes.
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.new_attributes = Some(attributes);
        self
    }

    /// Append an element written just before the tag closes.
    pub fn child_node(mut self, tag: NewTag) -> Self {
        self.child_nodes.get_or_insert_with(Vec::new).push(tag);
        self
    }

    pub fn collect(mut self, collect: bool) -> Self {
        self.child_options.get_or_insert_with(Default::default).collect = Some(collect);
        self
    }

    pub fn tree(mut self, tree: TreeOption) -> Self {
        self.child_options.get_or_insert_with(Default::default).tree = Some(tree);
        self
    }

    /// Drop the tag and everything inside it from the output.
    pub fn delete_tag(mut self, delete: bool) -> Self {
        self.delete_tag = Some(delete);
        self
    }

    /// Keep the tag but drop everything inside it from the output.
    pub fn delete_child_nodes(mut self, delete: bool) -> Self {
        self.delete_child_nodes = Some(delete);
        self
    }

    /// Replace the node's stash.
    pub fn stash(mut self, stash: Stash) -> Self {
        self.stash = Some(stash);
        self
    }

    pub fn before_open_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut TaskNode, &mut HookContext) -> anyhow::Result<()> + 'static,
    {
        self.hooks.before_open_write = Some(Hook::new(f));
        self
    }

    pub fn after_open_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut TaskNode, &mut HookContext) -> anyhow::Result<()> + 'static,
    {
        self.hooks.after_open_write = Some(Hook::new(f));
        self
    }

    pub fn before_close_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut TaskNode, &mut HookContext) -> anyhow::Result<()> + 'static,
    {
        self.hooks.before_close_write = Some(Hook::new(f));
        self
    }

    pub fn after_close_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut TaskNode, &mut HookContext) -> anyhow::Result<()> + 'static,
    {
        self.hooks.after_close_write = Some(Hook::new(f));
        self
    }

    /// Reject directives that would produce malformed output.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(name) = &self.new_name {
            check_name(name).map_err(|e| format!("new name: {}", e))?;
        }
        if let Some(attributes) = &self.new_attributes {
            check_attribute_names(attributes)?;
        }
        if let Some(children) = &self.child_nodes {
            children.iter().try_for_each(check_new_tag)?;
        }
        if let Some(tree) = self.child_options.as_ref().and_then(|o| o.tree.as_ref()) {
            tree.validate().map_err(|e| format!("tree: {}", e))?;
        }
        Ok(())
    }
}

fn check_attribute_names(attributes: &Attributes) -> std::result::Result<(), String> {
    attributes
        .keys()
        .try_for_each(|key| check_name(key).map_err(|e| format!("attribute {}", e)))
}

fn check_new_tag(tag: &NewTag) -> std::result::Result<(), String> {
    check_name(&tag.name).map_err(|e| format!("child node: {}", e))?;
    check_attribute_names(&tag.attributes)?;
    tag.child_nodes.iter().try_for_each(check_new_tag)
}

/// A task callback.
///
/// Receives the raw node, the live task node (absent on the first call) and
/// the accumulated stash.
pub trait TaskCallback {
    fn call(
        &self,
        node: &RawNode,
        task_node: Option<&TaskNode>,
        stash: &Stash,
    ) -> anyhow::Result<Directive>;
}

impl<F> TaskCallback for F
where
    F: Fn(&RawNode, Option<&TaskNode>, &Stash) -> anyhow::Result<Directive>,
{
    fn call(
        &self,
        node: &RawNode,
        task_node: Option<&TaskNode>,
        stash: &Stash,
    ) -> anyhow::Result<Directive> {
        self(node, task_node, stash)
    }
}

/// A registered task.
#[derive(Clone)]
pub struct TaskDefinition {
    pub name: String,
    callback: Rc<dyn TaskCallback>,
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Tag name to task bindings.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: IndexMap<String, TaskDefinition>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for a tag name.
    pub fn add_task<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&RawNode, Option<&TaskNode>, &Stash) -> anyhow::Result<Directive> + 'static,
    {
        self.add_task_callback(name, callback);
    }

    /// Register any [`TaskCallback`] for a tag name. A second registration
    /// for the same name replaces the first.
    pub fn add_task_callback(&mut self, name: impl Into<String>, callback: impl TaskCallback + 'static) {
        let name = name.into();
        let definition = TaskDefinition {
            name: name.clone(),
            callback: Rc::new(callback),
        };
        if self.tasks.insert(name.clone(), definition).is_some() {
            tracing::warn!(task = %name, "Replacing previously registered task");
        }
    }

    pub fn find_task(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Registered tag names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }
}

/// Live state of one matched tag occurrence.
pub struct TaskNode {
    task: String,
    node: RawNode,
    callback: Rc<dyn TaskCallback>,
    policy: CallbackPolicy,
    hooks: Hooks,

    /// Name the tag is written under.
    pub new_name: String,

    /// Attributes the tag is written with; `None` keeps the raw ones.
    pub new_attributes: Option<Attributes>,

    /// Elements written just before the tag closes.
    pub child_nodes: Vec<NewTag>,

    pub child_options: ChildOptions,
    pub delete_tag: bool,
    pub delete_child_nodes: bool,
    pub stash: Stash,
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("task", &self.task)
            .field("node", &self.node)
            .field("new_name", &self.new_name)
            .field("new_attributes", &self.new_attributes)
            .field("child_nodes", &self.child_nodes)
            .field("child_options", &self.child_options)
            .field("delete_tag", &self.delete_tag)
            .field("delete_child_nodes", &self.delete_child_nodes)
            .field("stash", &self.stash)
            .finish_non_exhaustive()
    }
}

impl TaskNode {
    /// Invoke the task's callback for a freshly opened tag.
    pub fn create(definition: &TaskDefinition, node: RawNode, policy: CallbackPolicy) -> Result<Self> {
        let directive = invoke(
            &definition.name,
            definition.callback.as_ref(),
            &node,
            None,
            &Stash::new(),
            policy,
        )?
        .unwrap_or_default();

        let mut task_node = TaskNode {
            task: definition.name.clone(),
            new_name: node.name.clone(),
            node,
            callback: Rc::clone(&definition.callback),
            policy,
            hooks: Hooks::default(),
            new_attributes: None,
            child_nodes: Vec::new(),
            child_options: ChildOptions::default(),
            delete_tag: false,
            delete_child_nodes: false,
            stash: Stash::new(),
        };
        task_node.apply(directive);
        Ok(task_node)
    }

    /// Re-invoke the callback with the current stash and merge the result.
    pub fn update_options(&mut self) -> Result<()> {
        let callback = Rc::clone(&self.callback);
        let directive = invoke(
            &self.task,
            callback.as_ref(),
            &self.node,
            Some(&*self),
            &self.stash,
            self.policy,
        )?;
        if let Some(directive) = directive {
            tracing::debug!(task = %self.task, "Recomputed directive");
            self.apply(directive);
        }
        Ok(())
    }

    fn apply(&mut self, directive: Directive) {
        let Directive {
            new_name,
            new_attributes,
            child_nodes,
            child_options,
            delete_tag,
            delete_child_nodes,
            stash,
            hooks,
        } = directive;

        if let Some(name) = new_name {
            self.new_name = name;
        }
        if new_attributes.is_some() {
            self.new_attributes = new_attributes;
        }
        if let Some(children) = child_nodes {
            self.child_nodes = children;
        }
        if let Some(patch) = child_options {
            self.child_options.apply(patch);
        }
        if let Some(delete) = delete_tag {
            self.delete_tag = delete;
        }
        if let Some(delete) = delete_child_nodes {
            self.delete_child_nodes = delete;
        }
        if let Some(stash) = stash {
            self.stash = stash;
        }
        self.hooks.merge(hooks);
    }

    /// Name of the task that matched.
    pub fn task_name(&self) -> &str {
        &self.task
    }

    /// The tag as read from the input.
    pub fn node(&self) -> &RawNode {
        &self.node
    }

    /// Original tag name.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn is_self_closing(&self) -> bool {
        self.node.is_self_closing
    }

    /// Whether the directive injected any child nodes.
    pub fn has_child_nodes(&self) -> bool {
        !self.child_nodes.is_empty()
    }

    /// Attributes the tag will be written with.
    pub fn written_attributes(&self) -> &Attributes {
        self.new_attributes.as_ref().unwrap_or(&self.node.attributes)
    }

    /// The tag as it will be written.
    pub fn markup(&self) -> TagMarkup<'_> {
        TagMarkup {
            name: &self.new_name,
            attributes: self.written_attributes(),
            is_self_closing: self.node.is_self_closing,
        }
    }

    /// Store the tag's own attributes under `$` and recompute.
    pub fn push_node_attributes(&mut self) -> Result<()> {
        let path = StashPath::new().join(ATTRIBUTES_KEY);
        let value = StashValue::from(&self.node.attributes);
        self.stash.set(&path, value);
        self.update_options()
    }

    /// Store the tag's own text under `_`, recompute, and return the text
    /// now held there.
    pub fn push_own_content(&mut self, text: &str) -> Result<Option<String>> {
        let path = StashPath::new().join(VALUE_KEY);
        self.push_text(path, text)
    }

    /// Store a descendant's attributes at its tree path and recompute.
    pub fn push_child_attributes(
        &mut self,
        scope: &PathScope,
        child_name: &str,
        attributes: &Attributes,
    ) -> Result<()> {
        let path = scope.stash_path(child_name, &self.child_options.tree, StashTerminal::Attributes);
        tracing::trace!(task = %self.task, path = %path, "Collecting attributes");
        self.stash.set(&path, attributes);
        self.update_options()
    }

    /// Store a descendant's text at its tree path, recompute, and return the
    /// text now held there.
    pub fn push_child_content(
        &mut self,
        scope: &PathScope,
        child_name: &str,
        text: &str,
    ) -> Result<Option<String>> {
        let path = scope.stash_path(child_name, &self.child_options.tree, StashTerminal::Text);
        self.push_text(path, text)
    }

    fn push_text(&mut self, path: StashPath, text: &str) -> Result<Option<String>> {
        tracing::trace!(task = %self.task, path = %path, "Collecting text");
        self.stash.set(&path, text);
        self.update_options()?;
        Ok(self.stash.text(&path).map(str::to_string))
    }

    /// Run the hook for `stage`, if any, and return what it emitted.
    pub(crate) fn run_hook(&mut self, stage: HookStage) -> Result<Vec<Emission>> {
        let Some(hook) = self.hooks.get(stage).cloned() else {
            return Ok(Vec::new());
        };
        let mut ctx = HookContext::new(stage);
        hook.call(self, &mut ctx).map_err(|source| Error::Hook {
            task: self.task.clone(),
            stage,
            source,
        })?;
        Ok(ctx.emissions)
    }
}

/// Call a task callback and apply the fault policy.
///
/// `Ok(None)` means a fault was absorbed.
fn invoke(
    task: &str,
    callback: &dyn TaskCallback,
    node: &RawNode,
    task_node: Option<&TaskNode>,
    stash: &Stash,
    policy: CallbackPolicy,
) -> Result<Option<Directive>> {
    let outcome = callback
        .call(node, task_node, stash)
        .map_err(|source| Error::Callback {
            task: task.to_string(),
            source,
        })
        .and_then(|directive| {
            directive
                .validate()
                .map_err(|message| Error::InvalidDirective {
                    task: task.to_string(),
                    message,
                })?;
            Ok(directive)
        });

    match (outcome, policy) {
        (Ok(directive), _) => Ok(Some(directive)),
        (Err(err), CallbackPolicy::Strict) => Err(err),
        (Err(err), CallbackPolicy::Lenient) => {
            tracing::warn!(
                task = %task,
                first_call = task_node.is_none(),
                error = %err,
                "Ignoring task callback fault"
            );
            Ok(None)
        }
    }
}
