//! Common utilities for riic: addressing into untyped manifest documents

#![deny(missing_docs)]

pub mod document;

pub use document::PathError;

/// Result type alias for document path operations
pub type Result<T> = std::result::Result<T, PathError>;
