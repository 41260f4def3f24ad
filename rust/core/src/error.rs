// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for SOSI parsing and writing.

use thiserror::Error;

/// Result type for SOSI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Soft conditions (encoding fallback, replay skips) are
/// reported as [`crate::Warning`] values instead and never abort a parse.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required header field was absent at the end of header parsing
    #[error("missing required header field {field}")]
    MissingRequiredField { field: &'static str },

    /// A coordinate line had too few tokens or a non-numeric token
    #[error("malformed coordinate at line {line}: {text:?}")]
    MalformedCoordinate { line: usize, text: String },

    /// A curve object had no derivable identifier and was not marked historical
    #[error("curve ending at line {line} has no OBJTYPE identifier and is not marked ..ENDRET H")]
    MissingCurveIdentifier { line: usize },
}
