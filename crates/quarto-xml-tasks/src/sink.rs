/*
 * sink.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output sinks.
//!
//! The writer renders chunks of markup and hands each one to a [`Sink`] as
//! soon as it is produced. Nothing is buffered beyond the tag currently being
//! rendered.

use std::io::{self, Write};

/// Destination for rendered output.
pub trait Sink {
    /// Write one chunk of output.
    fn write(&mut self, chunk: &str) -> io::Result<()>;

    /// Called once when the input stream has ended.
    fn end(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for String {
    fn write(&mut self, chunk: &str) -> io::Result<()> {
        self.push_str(chunk);
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write(&mut self, chunk: &str) -> io::Result<()> {
        (**self).write(chunk)
    }

    fn end(&mut self) -> io::Result<()> {
        (**self).end()
    }
}

/// A sink over any [`std::io::Write`]. Flushes on `end`.
#[derive(Debug)]
pub struct IoSink<W: Write> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for IoSink<W> {
    fn write(&mut self, chunk: &str) -> io::Result<()> {
        self.inner.write_all(chunk.as_bytes())
    }

    fn end(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_sink_appends() {
        let mut out = String::new();
        out.write("<a>").unwrap();
        out.write("</a>").unwrap();
        out.end().unwrap();
        assert_eq!(out, "<a></a>");
    }

    #[test]
    fn test_io_sink_writes_bytes() {
        let mut sink = IoSink::new(Vec::new());
        sink.write("<é/>").unwrap();
        sink.end().unwrap();
        assert_eq!(sink.into_inner(), "<é/>".as_bytes());
    }

    #[test]
    fn test_mut_ref_sink_forwards() {
        let mut out = String::new();
        {
            let mut by_ref = &mut out;
            Sink::write(&mut by_ref, "x").unwrap();
        }
        assert_eq!(out, "x");
    }
}
