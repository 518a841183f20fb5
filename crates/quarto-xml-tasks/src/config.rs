/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Runner configuration.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::writer::WriterOptions;

/// Largest accepted indentation width.
pub const MAX_INDENTATION_SIZE: usize = 64;

/// What to do when a task callback fails or returns an invalid directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackPolicy {
    /// Log a warning and carry on: a failed first invocation yields an empty
    /// directive, a failed recompute leaves the directive unchanged.
    #[default]
    Lenient,

    /// Abort the run with the error.
    Strict,
}

/// Document declaration settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderOptions {
    pub print: bool,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl HeaderOptions {
    /// Header settings that print the default declaration.
    pub fn printed() -> Self {
        Self {
            print: true,
            ..Default::default()
        }
    }

    /// The `<?xml ...?>` declaration.
    pub fn declaration(&self) -> String {
        let encoding = self.encoding.as_deref().unwrap_or("UTF-8");
        match &self.standalone {
            Some(standalone) => format!(
                "<?xml version=\"1.0\" encoding=\"{}\" standalone=\"{}\"?>",
                encoding, standalone
            ),
            None => format!("<?xml version=\"1.0\" encoding=\"{}\"?>", encoding),
        }
    }
}

/// `header: true` is shorthand for `header: { print: true }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderSetting {
    Flag(bool),
    Options(HeaderOptions),
}

fn deserialize_header<'de, D>(deserializer: D) -> std::result::Result<HeaderOptions, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match HeaderSetting::deserialize(deserializer)? {
        HeaderSetting::Flag(print) => HeaderOptions {
            print,
            ..Default::default()
        },
        HeaderSetting::Options(options) => options,
    })
}

/// Options for a [`crate::TaskRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RunnerOptions {
    /// Put every tag on its own indented line.
    pub indentation: bool,

    /// Spaces per nesting level.
    pub indentation_size: usize,

    /// Line separator used when indenting.
    pub line_break: String,

    /// Document declaration.
    #[serde(deserialize_with = "deserialize_header")]
    pub header: HeaderOptions,

    /// Drop whitespace-only text containing a line break even when
    /// indentation is off.
    pub clear_indentation: bool,

    /// Handling of callback faults.
    pub callback_faults: CallbackPolicy,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            indentation: false,
            indentation_size: 4,
            line_break: "\n".to_string(),
            header: HeaderOptions::default(),
            clear_indentation: false,
            callback_faults: CallbackPolicy::default(),
        }
    }
}

impl RunnerOptions {
    /// Check option values before a run starts.
    pub fn validate(&self) -> Result<()> {
        if self.indentation_size > MAX_INDENTATION_SIZE {
            return Err(Error::configuration(format!(
                "indentation-size must be at most {}, got {}",
                MAX_INDENTATION_SIZE, self.indentation_size
            )));
        }
        if self.indentation && self.line_break.is_empty() {
            return Err(Error::configuration(
                "line-break must not be empty when indentation is enabled",
            ));
        }
        Ok(())
    }

    /// Whether indentation-only text should be dropped.
    pub fn drops_indentation_text(&self) -> bool {
        self.indentation || self.clear_indentation
    }

    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            indentation: self.indentation,
            indentation_size: self.indentation_size,
            line_break: self.line_break.clone(),
        }
    }
}
