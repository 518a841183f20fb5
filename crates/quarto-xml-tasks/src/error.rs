/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for task runs.

use std::fmt;

use thiserror::Error;

/// Lifecycle stage at which a task hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    BeforeOpenWrite,
    AfterOpenWrite,
    BeforeCloseWrite,
    AfterCloseWrite,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookStage::BeforeOpenWrite => "before-open-write",
            HookStage::AfterOpenWrite => "after-open-write",
            HookStage::BeforeCloseWrite => "before-close-write",
            HookStage::AfterCloseWrite => "after-close-write",
        };
        f.write_str(name)
    }
}

/// Errors that can abort a task run.
#[derive(Debug, Error)]
pub enum Error {
    /// The run was started with missing or invalid settings.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A close event arrived for a tag that is not open.
    #[error("Unexpected closing tag </{name}>: no matching open tag")]
    UnmatchedClose { name: String },

    /// A task callback failed.
    #[error("Task '{task}' failed: {source}")]
    Callback {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// A task callback returned a directive that cannot be applied.
    #[error("Invalid directive from task '{task}': {message}")]
    InvalidDirective { task: String, message: String },

    /// A lifecycle hook failed.
    #[error("Hook {stage} of task '{task}' failed: {source}")]
    Hook {
        task: String,
        stage: HookStage,
        #[source]
        source: anyhow::Error,
    },

    /// The tokenizer rejected the input.
    #[error("XML syntax error: {message}")]
    Syntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// A rule file could not be loaded.
    #[error("Invalid rules: {message}")]
    Rules { message: String },

    /// I/O error while reading input or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error from any message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Syntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Syntax {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Rules {
            message: err.to_string(),
        }
    }
}

/// Result type alias for quarto-xml-tasks operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::UnmatchedClose {
            name: "item".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unexpected closing tag </item>: no matching open tag"
        );

        let err = Error::Hook {
            task: "secret".to_string(),
            stage: HookStage::AfterCloseWrite,
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(
            err.to_string(),
            "Hook after-close-write of task 'secret' failed: boom"
        );
    }

    #[test]
    fn test_configuration_helper() {
        let err = Error::configuration("input stream is required");
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(
            err.to_string(),
            "Configuration error: input stream is required"
        );
    }
}
