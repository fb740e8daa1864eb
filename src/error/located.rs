//! This module contains the wrapper that ties an error to the program point
//! at which the walk encountered it.

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::graph::point::ProgramPoint;

/// An error raised while the walk was at `location`.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Located<E> {
    pub location: ProgramPoint,
    pub payload:  E,
}

impl<E> Located<E> {
    /// Wraps `payload` as having occurred at `location`.
    #[must_use]
    pub fn new(location: ProgramPoint, payload: E) -> Self {
        Self { location, payload }
    }

    /// Converts the payload, keeping the location.
    #[must_use]
    pub fn map<F>(self, convert: impl FnOnce(E) -> F) -> Located<F> {
        Located::new(self.location, convert(self.payload))
    }
}

impl<E: Display> Display for Located<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.location, self.payload)
    }
}

/// Attaches a [`ProgramPoint`] to the error side of a result.
pub trait Locatable {
    type Located;

    fn locate(self, point: ProgramPoint) -> Self::Located;
}

impl<T, E> Locatable for Result<T, E> {
    type Located = Result<T, Located<E>>;

    fn locate(self, point: ProgramPoint) -> Self::Located {
        self.map_err(|payload| Located::new(point, payload))
    }
}
