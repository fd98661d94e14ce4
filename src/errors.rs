/*!
 * Error types for the lipalign library.
 *
 * This module contains custom error types for different parts of the library,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur while breaking a voice text down into phonemes
#[derive(Error, Debug)]
pub enum BreakdownError {
    /// The pronunciation resolver has no entry for a word
    #[error("word not found in pronunciation source: {0}")]
    WordNotFound(String),

    /// The requested language has no registered pronunciation source
    #[error("unknown breakdown language: {0}")]
    UnknownLanguage(String),
}

/// Errors reported by an external phoneme recognizer
#[derive(Error, Debug)]
pub enum RecognizerError {
    /// The recognizer backend is not installed or cannot be reached
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),

    /// The recognizer ran but failed to produce a usable result
    #[error("recognition failed: {0}")]
    Failed(String),
}

/// Errors that can occur while loading or saving project files
#[derive(Error, Debug)]
pub enum ProjectError {
    /// A line of the legacy project format could not be parsed
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number in the project file
        line: usize,
        /// What went wrong on that line
        message: String,
    },

    /// The file ended before all declared entries were read
    #[error("unexpected end of file at line {0}")]
    UnexpectedEof(usize),

    /// A named phoneme set is not present in the registry
    #[error("unknown phoneme set: {0}")]
    UnknownPhonemeSet(String),
}

/// Main library error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from text breakdown
    #[error("Breakdown error: {0}")]
    Breakdown(#[from] BreakdownError),

    /// Error from a recognizer
    #[error("Recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),

    /// Error from project persistence
    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
