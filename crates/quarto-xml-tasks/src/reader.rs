/*
 * reader.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Streaming tokenizer adapter over quick-xml.
//!
//! Produces [`XmlEvent`]s one at a time from any [`BufRead`], holding only
//! the bytes of the current event in memory.
//!
//! - `<x/>` yields a single self-closing `Open`, with no `Close`
//! - attribute values and text are unescaped; the writer escapes both again
//! - CDATA content is delivered as plain text
//! - comments, processing instructions, declarations and doctypes are skipped

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::event::XmlEvent;
use crate::node::{Attributes, RawNode};

/// Pull-based event source.
pub struct XmlEventReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> XmlEventReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            reader,
            buf: Vec::new(),
            finished: false,
        }
    }

    /// Read the next event. Returns `XmlEvent::End` once the input is
    /// exhausted, and `None` after that.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    return Err(Error::Syntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            };

            match event {
                Event::Start(e) => return Ok(Some(XmlEvent::Open(raw_node(&e, false)?))),
                Event::Empty(e) => return Ok(Some(XmlEvent::Open(raw_node(&e, true)?))),
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Ok(Some(XmlEvent::Close(name)));
                }
                Event::Text(e) => {
                    let position = self.reader.buffer_position();
                    let text = e.unescape().map_err(|err| Error::Syntax {
                        message: format!("Invalid text: {}", err),
                        position: Some(position),
                    })?;
                    return Ok(Some(XmlEvent::Text(text.into_owned())));
                }
                Event::CData(e) => {
                    let text = decode(&e, self.reader.buffer_position())?;
                    return Ok(Some(XmlEvent::Text(text)));
                }
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {
                    tracing::debug!(
                        position = self.reader.buffer_position(),
                        "Skipping non-element markup"
                    );
                }
                Event::Eof => {
                    self.finished = true;
                    return Ok(Some(XmlEvent::End));
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for XmlEventReader<R> {
    type Item = Result<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(event) => event.map(Ok),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn raw_node(e: &BytesStart<'_>, is_self_closing: bool) -> Result<RawNode> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Attributes::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|err| Error::Syntax {
            message: format!("Invalid value for attribute '{}' of <{}>: {}", key, name, err),
            position: None,
        })?;
        attributes.insert(key, value.into_owned());
    }
    Ok(RawNode {
        name,
        attributes,
        is_self_closing,
    })
}

fn decode(bytes: &[u8], position: u64) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|err| Error::Syntax {
            message: format!("Invalid UTF-8 in text: {}", err),
            position: Some(position),
        })
}
