//! Error types for view rendering.
//!
//! This module provides [`ViewError`], the error type returned by every render
//! operation. Engine failures are carried through unchanged: the adapter never
//! rewrites a MiniJinja error, it only adds the failures it can detect itself
//! (a template file that cannot be located, locals that are not a map).

use std::path::PathBuf;

/// Error type for view operations.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// No file matched the template reference under the lookup root.
    #[error("template not found: \"{reference}\" (looked in {})", .root.display())]
    TemplateNotFound {
        /// The template path that was looked up (e.g. `subdir/template`)
        reference: String,
        /// The directory the reference was resolved against
        root: PathBuf,
    },

    /// Error raised by the template engine (syntax, missing include, filter failure).
    #[error(transparent)]
    Engine(#[from] minijinja::Error),

    /// Failed to read a template file from disk.
    #[error("failed to read template {}: {source}", .path.display())]
    Io {
        /// Path that failed to read
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Locals could not be serialized into template values.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Data shared as locals did not serialize to a map of names.
    #[error("locals must serialize to a map, got {kind}")]
    LocalsNotAMap {
        /// JSON kind of the rejected value
        kind: &'static str,
    },
}

impl ViewError {
    /// Returns the underlying engine error, if this error came from the engine.
    pub fn as_engine_error(&self) -> Option<&minijinja::Error> {
        match self {
            ViewError::Engine(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the error means the requested template does not exist.
    ///
    /// Covers both lookups done by the adapter and includes resolved by the engine.
    pub fn is_not_found(&self) -> bool {
        match self {
            ViewError::TemplateNotFound { .. } => true,
            ViewError::Engine(err) => err.kind() == minijinja::ErrorKind::TemplateNotFound,
            _ => false,
        }
    }
}
