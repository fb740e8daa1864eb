//! This module contains the primary error type for the analyzer's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.

pub mod execution;
pub mod located;

use thiserror::Error;

/// The interface result type for the library.
///
/// # Usage
///
/// Any function considered to be part of the public interface of the library
/// should return this result type. Subsystems should return the more-specific
/// child error types as appropriate.
///
/// A walk stops at the first error it meets, so there is only ever one.
pub type Result<T> = std::result::Result<T, LocatedError>;

/// The interface error type for the library.
///
/// All errors returned from the library interface (and hence encountered by the
/// clients of the library) should be members of this enum.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// Errors from the exploded graph walk.
    #[error(transparent)]
    Execution(#[from] execution::Error),
}

/// A library error with the program point at which it occurred.
pub type LocatedError = located::Located<Error>;

impl From<execution::LocatedError> for LocatedError {
    fn from(value: execution::LocatedError) -> Self {
        value.map(Error::from)
    }
}

/// The signal that the analysis of a single unit of code failed.
///
/// This is the only failure that escapes a walk. It carries enough context to
/// be logged by the host, and never affects the analysis of any other unit.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("Analysis failed for {method}: {detail}")]
pub struct AnalysisFailure {
    /// The identity of the method whose walk failed.
    pub method: String,

    /// A description of what went wrong.
    pub detail: String,
}

impl AnalysisFailure {
    /// Constructs a new failure for `method` with the provided `detail`.
    pub fn new(method: impl Into<String>, detail: impl Into<String>) -> Self {
        let method = method.into();
        let detail = detail.into();
        Self { method, detail }
    }
}
