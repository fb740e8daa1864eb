//! This module contains the records that the analyzer produces for the
//! reporting layer.

use std::fmt::{Display, Formatter};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{cfg::Span, graph::point::ProgramPoint};

/// A location that a finding refers to.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// The program point in the control flow graph.
    pub point: ProgramPoint,

    /// The source span of the node at `point`, if the host provided one.
    pub span: Option<Span>,
}

impl Location {
    #[must_use]
    pub fn new(point: ProgramPoint, span: Option<Span>) -> Self {
        Self { point, span }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} ({span})", self.point),
            None => write!(f, "{}", self.point),
        }
    }
}

/// A defect found by one of the checks.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// The identifier of the rule that raised the finding.
    pub rule_id: String,

    /// Where the defect manifests.
    pub location: Location,

    /// Other locations relevant to the defect, such as where a resource was
    /// acquired.
    pub secondary_locations: Vec<Location>,

    /// The rendered message.
    pub message: String,

    /// The arguments that were substituted into the message.
    pub message_arguments: Vec<String>,
}

impl Finding {
    /// Constructs a new finding for `rule_id` at `point`.
    pub fn new(
        rule_id: impl Into<String>,
        point: ProgramPoint,
        span: Option<Span>,
        message: impl Into<String>,
    ) -> Self {
        let rule_id = rule_id.into();
        let message = message.into();
        Self {
            rule_id,
            location: Location::new(point, span),
            secondary_locations: Vec::new(),
            message,
            message_arguments: Vec::new(),
        }
    }

    /// Adds a secondary location to the finding.
    #[must_use]
    pub fn with_secondary_location(mut self, location: Location) -> Self {
        self.secondary_locations.push(location);
        self
    }

    /// Records the arguments that were substituted into the message.
    #[must_use]
    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = String>) -> Self {
        self.message_arguments.extend(arguments);
        self
    }
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.location, self.rule_id, self.message)?;
        if !self.secondary_locations.is_empty() {
            write!(f, " (see {})", self.secondary_locations.iter().join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{
        cfg::{BlockId, Span},
        finding::{Finding, Location},
        graph::point::ProgramPoint,
    };

    #[test]
    fn findings_display_their_location_and_rule() {
        let point = ProgramPoint::new(BlockId::new(2), 3);
        let finding = Finding::new(
            "null-dereference",
            point,
            Some(Span::new(10, 4)),
            "'o' is null on at least one execution path.",
        );

        assert_eq!(
            finding.to_string(),
            "B2:3 (10:4) [null-dereference]: 'o' is null on at least one execution path."
        );
    }

    #[test]
    fn findings_carry_secondary_locations_and_arguments() {
        let point = ProgramPoint::new(BlockId::new(1), 0);
        let finding = Finding::new("lock-not-released", point, None, "Unlock 'l'.")
            .with_secondary_location(Location::new(point, None))
            .with_arguments(vec!["l".to_string()]);

        assert_eq!(finding.secondary_locations.len(), 1);
        assert_eq!(finding.message_arguments, vec!["l".to_string()]);
        assert_eq!(finding.to_string(), "B1:0 [lock-not-released]: Unlock 'l'. (see B1:0)");
    }
}
