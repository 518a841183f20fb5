/*
 * event.rs
 * Copyright (c) 2025 Posit, PBC
 */

use crate::node::RawNode;

/// One structural event delivered by a tokenizer.
///
/// Events arrive one at a time and in document order. The stream is
/// expected to be well formed: every non-self-closing `Open` has a matching
/// `Close`, and `End` comes last. Whether a self-closing `Open` is followed
/// by its own `Close` is a property of the source, see [`SelfCloseEvents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// A start tag (or a self-closing tag).
    Open(RawNode),

    /// Character data, unescaped.
    Text(String),

    /// An end tag.
    Close(String),

    /// End of the stream.
    End,
}

impl XmlEvent {
    /// Short label used in trace logs.
    pub fn kind(&self) -> &'static str {
        match self {
            XmlEvent::Open(_) => "open",
            XmlEvent::Text(_) => "text",
            XmlEvent::Close(_) => "close",
            XmlEvent::End => "end",
        }
    }
}

/// How an event source reports self-closing tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelfCloseEvents {
    /// `<x/>` is a single self-closing `Open`.
    #[default]
    Omitted,

    /// `<x/>` is a self-closing `Open` immediately followed by `Close("x")`.
    Emitted,
}
