// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the pagemill pipeline.
//!
//! This module defines [`PagemillError`], the error enum shared by every
//! stage of the build.
//!
//! # Error Categories
//!
//! - **I/O errors**: template root or data store not readable/writable
//! - **Validation errors**: a data function returned a badly shaped value
//! - **Missing function errors**: a requested data function is not registered
//! - **Compile errors**: generated function not found, minification failure
//! - **Resolution errors**: no template for a request or record
//! - **Transform errors**: an output pass could not rewrite its input
//!
//! Batch operations (fetch, compile, build) abort on the first
//! `Io`/`Validation`/`MissingFunction`/`Compile` error. `Resolution` and
//! `Transform` are caught where they happen and degrade to a visible but
//! non-fatal result.

use thiserror::Error;

/// The main error type for pagemill operations.
#[derive(Error, Debug)]
pub enum PagemillError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A data function returned a value with the wrong shape.
    #[error("Invalid data from {function} ({language}): {message}")]
    Validation {
        /// Language the function was called for.
        language: String,
        /// Name of the data function.
        function: String,
        /// What was wrong with the value.
        message: String,
    },

    /// A data or route function was requested but never registered.
    #[error("Data function not registered: {0}")]
    MissingFunction(String),

    /// A data function failed while producing its value.
    #[error("Data function {function} failed for {language}: {message}")]
    Data {
        /// Language the function was called for.
        language: String,
        /// Name of the data function.
        function: String,
        /// Error reported by the function.
        message: String,
    },

    /// Template compilation or bundle assembly failed.
    #[error("Compile error in {template}: {message}")]
    Compile {
        /// Template path, or `<bundle>` for bundle-level failures.
        template: String,
        /// Description of the failure.
        message: String,
    },

    /// No template could be found for a request or record.
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// An output pass could not rewrite its input.
    #[error("Transform error: {0}")]
    Transform(String),

    /// Lua runtime error (bundle loading, rendering, data sources).
    #[error("Lua execution error: {0}")]
    Lua(#[from] mlua::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid glob or route pattern.
    #[error("Invalid pattern: {0}")]
    Pattern(String),
}

impl PagemillError {
    /// Builds a [`PagemillError::Validation`].
    pub fn validation(
        language: impl Into<String>,
        function: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            language: language.into(),
            function: function.into(),
            message: message.into(),
        }
    }

    /// Builds a [`PagemillError::Compile`].
    pub fn compile(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile {
            template: template.into(),
            message: message.into(),
        }
    }
}

impl From<glob::PatternError> for PagemillError {
    fn from(err: glob::PatternError) -> Self {
        Self::Pattern(err.to_string())
    }
}

impl From<matchit::InsertError> for PagemillError {
    fn from(err: matchit::InsertError) -> Self {
        Self::Pattern(err.to_string())
    }
}

/// Convenience type alias for Results with [`PagemillError`].
pub type Result<T> = std::result::Result<T, PagemillError>;
