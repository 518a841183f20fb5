/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Event routing.
//!
//! The [`Engine`] consumes one [`XmlEvent`] at a time and turns the flat
//! stream into tree-shaped rewrite decisions. All run state lives here and
//! is dropped with the engine, so every run starts clean.
//!
//! Content suppression is counted. A deleted tag (or a tag whose children
//! are deleted) raises the count for as long as it is open, so nested task
//! nodes inside it stay hidden even if their own directive deletes nothing.
//! Descendant events are still processed: hooks run and stash pushes happen.

use crate::config::RunnerOptions;
use crate::error::{Error, HookStage, Result};
use crate::event::{SelfCloseEvents, XmlEvent};
use crate::node::{RawNode, TagMarkup};
use crate::open_stack::{OpenRecord, OpenRecords, OpenStack};
use crate::sink::Sink;
use crate::task::{Emission, TaskNode, TaskRegistry};
use crate::tree_path::PathScope;
use crate::writer::Writer;

/// Why a task frame raised the suppression count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suppression {
    /// The tag itself is deleted.
    Tag,
    /// Only the tag's content is deleted.
    Children,
}

/// An open task node occurrence.
#[derive(Debug)]
struct TaskFrame {
    task: TaskNode,
    scope: PathScope,
    suppression: Option<Suppression>,
    /// Name the open tag was written under, if it was written.
    written_name: Option<String>,
    /// Open stack depth with this node on top.
    depth: usize,
}

#[derive(Debug, Default)]
struct RunState {
    open: OpenStack,
    records: OpenRecords,
    frames: Vec<TaskFrame>,
    suppressed: usize,
    /// Self-closing tag whose trailing `Close` event is still due.
    pending_self_close: Option<String>,
}

impl RunState {
    /// Index of the innermost task frame collecting descendants.
    fn nearest_collector(&self) -> Option<usize> {
        self.frames
            .iter()
            .rposition(|frame| frame.task.child_options.collect)
    }
}

/// Routes events to the writer and task nodes.
#[derive(Debug)]
pub struct Engine<'r, S: Sink> {
    writer: Writer<S>,
    registry: &'r TaskRegistry,
    options: RunnerOptions,
    self_close_events: SelfCloseEvents,
    state: RunState,
}

impl<'r, S: Sink> Engine<'r, S> {
    pub fn new(sink: S, registry: &'r TaskRegistry, options: &RunnerOptions) -> Self {
        Self {
            writer: Writer::new(sink, options.writer_options()),
            registry,
            options: options.clone(),
            self_close_events: SelfCloseEvents::default(),
            state: RunState::default(),
        }
    }

    /// Declare how the event source reports self-closing tags.
    pub fn with_self_close_events(mut self, mode: SelfCloseEvents) -> Self {
        self.self_close_events = mode;
        self
    }

    /// Emit anything that precedes the first event.
    pub fn start(&mut self) -> Result<()> {
        if self.options.header.print {
            let declaration = self.options.header.declaration();
            self.writer.write_header(&declaration)?;
        }
        Ok(())
    }

    /// Handle one event.
    pub fn handle(&mut self, event: XmlEvent) -> Result<()> {
        tracing::trace!(event = event.kind(), "Routing event");
        let pending_self_close = self.state.pending_self_close.take();

        match event {
            XmlEvent::Open(node) => self.on_open(node),
            XmlEvent::Text(text) => self.on_text(&text),
            XmlEvent::Close(name) => {
                if pending_self_close.as_deref() == Some(name.as_str()) {
                    return Ok(());
                }
                self.on_close(&name)
            }
            XmlEvent::End => self.on_end(),
        }
    }

    /// Give back the sink.
    pub fn into_sink(self) -> S {
        self.writer.into_sink()
    }

    fn on_open(&mut self, node: RawNode) -> Result<()> {
        let name = node.name.clone();
        let is_self_closing = node.is_self_closing;

        let scope_owner = self.state.nearest_collector();
        if let Some(owner) = scope_owner {
            let frame = &mut self.state.frames[owner];
            frame.scope.enter(&node.name);
            if !node.attributes.is_empty() {
                frame
                    .task
                    .push_child_attributes(&frame.scope, &node.name, &node.attributes)?;
            }
        }

        let registry = self.registry;
        match registry.find_task(&node.name) {
            None => {
                let written = self.state.suppressed == 0;
                if written {
                    self.writer.write_open_tag(node.markup())?;
                }
                self.state.open.push(node);
                self.state.records.push(
                    &name,
                    OpenRecord {
                        is_task: false,
                        written,
                        scope_owner,
                    },
                );
            }
            Some(definition) => {
                tracing::debug!(task = %definition.name, "Task matched");
                let mut task =
                    TaskNode::create(definition, node.clone(), self.options.callback_faults)?;
                task.push_node_attributes()?;
                let (suppression, written_name) = self.write_task_open_node(&mut task)?;

                self.state.open.push(node);
                self.state.frames.push(TaskFrame {
                    task,
                    scope: PathScope::new(),
                    suppression,
                    written_name,
                    depth: self.state.open.depth(),
                });
                self.state.records.push(
                    &name,
                    OpenRecord {
                        is_task: true,
                        written: false,
                        scope_owner,
                    },
                );
            }
        }

        if is_self_closing {
            self.on_close(&name)?;
            if self.self_close_events == SelfCloseEvents::Emitted {
                self.state.pending_self_close = Some(name);
            }
        }
        Ok(())
    }

    fn write_task_open_node(
        &mut self,
        task: &mut TaskNode,
    ) -> Result<(Option<Suppression>, Option<String>)> {
        self.run_hook(task, HookStage::BeforeOpenWrite)?;

        let (suppression, written_name) = if task.delete_tag {
            (Some(Suppression::Tag), None)
        } else {
            let written_name = if self.state.suppressed == 0 {
                self.writer.write_open_tag(task.markup())?;
                Some(task.new_name.clone())
            } else {
                None
            };
            let suppression = task.delete_child_nodes.then_some(Suppression::Children);
            (suppression, written_name)
        };
        if suppression.is_some() {
            self.suppress();
        }

        self.run_hook(task, HookStage::AfterOpenWrite)?;
        Ok((suppression, written_name))
    }

    fn on_text(&mut self, text: &str) -> Result<()> {
        if is_indentation(text) {
            if self.options.drops_indentation_text() {
                return Ok(());
            }
            self.writer.write_value(text)?;
            return Ok(());
        }

        let mut value = text.to_string();
        let depth = self.state.open.depth();

        if let Some(frame) = self.state.frames.last_mut() {
            if frame.depth == depth {
                if let Some(rewritten) = frame.task.push_own_content(&value)? {
                    value = rewritten;
                }
            }
        }

        let owner = self
            .state
            .open
            .current_name()
            .and_then(|name| self.state.records.last(name))
            .and_then(|record| record.scope_owner);
        if let (Some(owner), Some(current)) = (owner, self.state.open.current()) {
            let frame = &mut self.state.frames[owner];
            if let Some(rewritten) =
                frame
                    .task
                    .push_child_content(&frame.scope, &current.name, &value)?
            {
                value = rewritten;
            }
        }

        self.writer.write_value(&value)?;
        Ok(())
    }

    fn on_close(&mut self, name: &str) -> Result<()> {
        if self.state.open.current_name() != Some(name) {
            return Err(Error::UnmatchedClose {
                name: name.to_string(),
            });
        }
        let record = self
            .state
            .records
            .pop(name)
            .ok_or_else(|| Error::UnmatchedClose {
                name: name.to_string(),
            })?;

        if !record.is_task {
            let node = self.state.open.pop();
            if record.written {
                if let Some(node) = &node {
                    self.writer.write_close_tag(node.markup())?;
                }
            }
            self.leave_scope(record.scope_owner);
            return Ok(());
        }

        let Some(mut frame) = self.state.frames.pop() else {
            return Err(Error::UnmatchedClose {
                name: name.to_string(),
            });
        };

        if frame.suppression == Some(Suppression::Children) {
            self.unsuppress();
        }
        if !frame.task.delete_tag
            && !frame.task.is_self_closing()
            && frame.task.has_child_nodes()
            && self.state.suppressed == 0
        {
            for child in &frame.task.child_nodes {
                self.writer.write_new_tag(child)?;
            }
        }

        self.state.open.pop();
        self.leave_scope(record.scope_owner);
        self.write_task_close_node(&mut frame)
    }

    fn write_task_close_node(&mut self, frame: &mut TaskFrame) -> Result<()> {
        self.run_hook(&mut frame.task, HookStage::BeforeCloseWrite)?;

        if frame.suppression == Some(Suppression::Tag) {
            self.unsuppress();
        } else if let Some(written_name) = &frame.written_name {
            let markup = TagMarkup {
                name: written_name,
                attributes: frame.task.written_attributes(),
                is_self_closing: frame.task.is_self_closing(),
            };
            self.writer.write_close_tag(markup)?;
        }

        self.run_hook(&mut frame.task, HookStage::AfterCloseWrite)
    }

    fn on_end(&mut self) -> Result<()> {
        if !self.state.open.is_empty() {
            tracing::warn!(
                open = self.state.open.depth(),
                "Input ended with unclosed tags"
            );
        }
        self.writer.end()?;
        Ok(())
    }

    /// Run a hook and write what it emitted, ignoring content suppression.
    fn run_hook(&mut self, task: &mut TaskNode, stage: HookStage) -> Result<()> {
        let emissions = task.run_hook(stage)?;
        if emissions.is_empty() {
            return Ok(());
        }
        let skipping = self.writer.skips_content();
        self.writer.set_skip_content(false);
        let written = emissions.iter().try_for_each(|emission| match emission {
            Emission::Raw(chunk) => self.writer.write_raw(chunk),
            Emission::Tag(tag) => self.writer.write_new_tag(tag),
        });
        self.writer.set_skip_content(skipping);
        written.map_err(Error::from)
    }

    fn leave_scope(&mut self, owner: Option<usize>) {
        if let Some(frame) = owner.and_then(|i| self.state.frames.get_mut(i)) {
            frame.scope.leave();
        }
    }

    fn suppress(&mut self) {
        self.state.suppressed += 1;
        self.writer.set_skip_content(true);
    }

    fn unsuppress(&mut self) {
        self.state.suppressed = self.state.suppressed.saturating_sub(1);
        self.writer.set_skip_content(self.state.suppressed > 0);
    }
}

/// Whitespace-only text that contains a line break.
fn is_indentation(text: &str) -> bool {
    text.contains('\n') && text.trim().is_empty()
}
