/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Streaming, rule-driven XML tag rewriting for Quarto.
//!
//! This crate rewrites an XML document in a single pass without building a
//! tree. Tasks are registered per tag name; when a matching tag opens, the
//! task's callback returns a [`Directive`] that can:
//!
//! - rename the tag or replace its attributes
//! - delete the tag with its content, or only its content
//! - inject extra child elements before the tag closes
//! - collect descendant attributes and text into a per-occurrence [`Stash`]
//!   and recompute the directive as that data arrives
//! - attach lifecycle hooks around the open and close writes
//!
//! # Architecture
//!
//! - [`XmlEventReader`] turns bytes into [`XmlEvent`]s using quick-xml
//! - [`Engine`] routes events, tracks open tags and task nodes, and decides
//!   what is written
//! - [`Writer`] renders markup into a [`Sink`] with indentation bookkeeping
//! - [`TaskRunner`] wires the three together for a run
//!
//! # Example
//!
//! ```rust
//! use quarto_xml_tasks::{Directive, RunnerOptions, TaskRunner};
//!
//! let mut runner = TaskRunner::with_options(RunnerOptions {
//!     indentation: true,
//!     indentation_size: 2,
//!     ..Default::default()
//! });
//! runner.add_task("title", |_, _, _| Ok(Directive::new().rename("h1")));
//! runner.set_input("<doc>\n<title>Hi</title>\n</doc>".as_bytes());
//!
//! let out = runner.execute(String::new()).unwrap();
//! assert_eq!(out, "<doc>\n  <h1>Hi</h1>\n</doc>");
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod node;
pub mod open_stack;
pub mod reader;
pub mod rules;
pub mod runner;
pub mod sink;
pub mod stash;
pub mod task;
pub mod tree_path;
pub mod writer;

// Re-export main types at crate root
pub use config::{CallbackPolicy, HeaderOptions, RunnerOptions};
pub use engine::Engine;
pub use error::{Error, HookStage, Result};
pub use event::{SelfCloseEvents, XmlEvent};
pub use node::{Attributes, NewTag, RawNode, TagMarkup};
pub use reader::XmlEventReader;
pub use rules::{Rule, RuleSet, load_rules};
pub use runner::TaskRunner;
pub use sink::{IoSink, Sink};
pub use stash::{Stash, StashPath, StashValue};
pub use task::{
    ChildOptions, Directive, Hook, HookContext, TaskCallback, TaskDefinition, TaskNode,
    TaskRegistry,
};
pub use tree_path::TreeOption;
pub use writer::{Writer, WriterOptions};
