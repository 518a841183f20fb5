/*
 * runner.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! End-to-end task runs.

use std::io::BufRead;

use crate::config::RunnerOptions;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::event::{SelfCloseEvents, XmlEvent};
use crate::node::RawNode;
use crate::reader::XmlEventReader;
use crate::sink::Sink;
use crate::stash::Stash;
use crate::task::{Directive, TaskCallback, TaskNode, TaskRegistry};

/// Reads XML from an input, applies registered tasks and writes the result.
///
/// # Example
///
/// ```rust
/// use quarto_xml_tasks::{Directive, TaskRunner};
///
/// let mut runner = TaskRunner::new();
/// runner.add_task("secret", |_, _, _| Ok(Directive::new().delete_tag(true)));
/// runner.set_input("<doc><secret>x</secret><p>y</p></doc>".as_bytes());
///
/// let out = runner.execute(String::new()).unwrap();
/// assert_eq!(out, "<doc><p>y</p></doc>");
/// ```
#[derive(Default)]
pub struct TaskRunner<'a> {
    options: RunnerOptions,
    registry: TaskRegistry,
    input: Option<Box<dyn BufRead + 'a>>,
}

impl<'a> TaskRunner<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RunnerOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TaskRegistry {
        &mut self.registry
    }

    /// Register a task for a tag name.
    pub fn add_task<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&RawNode, Option<&TaskNode>, &Stash) -> anyhow::Result<Directive> + 'static,
    {
        self.registry.add_task(name, callback);
    }

    /// Register any [`TaskCallback`] for a tag name.
    pub fn add_task_callback(&mut self, name: impl Into<String>, callback: impl TaskCallback + 'static) {
        self.registry.add_task_callback(name, callback);
    }

    /// Set the XML input for the next run.
    pub fn set_input(&mut self, input: impl BufRead + 'a) {
        self.input = Some(Box::new(input));
    }

    /// Run the tasks over the input and return the sink.
    ///
    /// # Errors
    ///
    /// Fails before reading anything if no input was set or the options are
    /// invalid. Otherwise fails on the first syntax, structural, hook, I/O
    /// or (under the strict policy) callback error; output written up to
    /// that point stays in the sink.
    pub fn execute<S: Sink>(&mut self, sink: S) -> Result<S> {
        let input = self
            .input
            .take()
            .ok_or_else(|| Error::configuration("input stream is required"))?;

        tracing::debug!(tasks = self.registry.len(), "Starting task run");
        self.run_events(XmlEventReader::new(input), sink)
    }

    /// Run the tasks over an already tokenized event stream in which
    /// self-closing tags carry no `Close` event.
    pub fn run_events<S, I>(&self, events: I, sink: S) -> Result<S>
    where
        S: Sink,
        I: IntoIterator<Item = Result<XmlEvent>>,
    {
        self.run_events_with(events, SelfCloseEvents::Omitted, sink)
    }

    /// Run the tasks over an event stream whose self-closing tags are
    /// reported as `self_close_events` says.
    pub fn run_events_with<S, I>(
        &self,
        events: I,
        self_close_events: SelfCloseEvents,
        sink: S,
    ) -> Result<S>
    where
        S: Sink,
        I: IntoIterator<Item = Result<XmlEvent>>,
    {
        self.options.validate()?;

        let mut engine = Engine::new(sink, &self.registry, &self.options)
            .with_self_close_events(self_close_events);
        engine.start()?;
        for event in events {
            engine.handle(event?)?;
        }
        Ok(engine.into_sink())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_input_is_configuration_error() {
        let mut runner = TaskRunner::new();
        let err = runner.execute(String::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(err.to_string(), "Configuration error: input stream is required");
    }

    #[test]
    fn test_invalid_options_rejected_before_output() {
        let mut runner = TaskRunner::with_options(RunnerOptions {
            indentation_size: 1000,
            ..Default::default()
        });
        runner.set_input("<a/>".as_bytes());
        assert!(matches!(
            runner.execute(String::new()),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_input_is_consumed_by_a_run() {
        let mut runner = TaskRunner::new();
        runner.set_input("<a/>".as_bytes());
        assert_eq!(runner.execute(String::new()).unwrap(), "<a />");
        assert!(runner.execute(String::new()).is_err());
    }

    #[test]
    fn test_run_events() {
        let mut runner = TaskRunner::new();
        runner.add_task("a", |_, _, _| Ok(Directive::new().rename("b")));
        let events = vec![
            Ok(XmlEvent::Open(RawNode::new("a"))),
            Ok(XmlEvent::Close("a".to_string())),
            Ok(XmlEvent::End),
        ];
        assert_eq!(runner.run_events(events, String::new()).unwrap(), "<b></b>");
    }

    #[test]
    fn test_run_events_with_emitted_self_close() {
        let runner = TaskRunner::new();
        let events = vec![
            Ok(XmlEvent::Open(RawNode::new("b"))),
            Ok(XmlEvent::Open(RawNode::new("b").self_closing())),
            Ok(XmlEvent::Close("b".to_string())),
            Ok(XmlEvent::Close("b".to_string())),
            Ok(XmlEvent::End),
        ];
        assert_eq!(
            runner
                .run_events_with(events, SelfCloseEvents::Emitted, String::new())
                .unwrap(),
            "<b><b /></b>"
        );
    }

    #[test]
    fn test_syntax_error_surfaces() {
        let mut runner = TaskRunner::new();
        runner.set_input("<a><b></a>".as_bytes());
        assert!(matches!(
            runner.execute(String::new()),
            Err(Error::Syntax { .. })
        ));
    }
}
