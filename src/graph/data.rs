//! This module contains miscellaneous small data-types that are used by the
//! exploded graph walker.

use std::collections::HashSet;

use rpds::RedBlackTreeMap;

use crate::{
    finding::Finding,
    graph::point::ProgramPoint,
    value::SymbolicValue,
};

/// A container that tracks how many times a single path has visited each
/// program point.
///
/// It travels with the [`crate::state::ProgramState`] of the path, but is not
/// part of that state's identity, so two paths that reach the same point in
/// equal states are still merged regardless of how they got there.
#[derive(Clone, Debug, Default)]
pub struct VisitCounts {
    data: RedBlackTreeMap<ProgramPoint, usize>,
}

impl VisitCounts {
    /// Constructs a new container in which no point has been visited.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `point` as having been visited once more.
    #[must_use]
    pub fn mark_visited(&self, point: ProgramPoint) -> Self {
        let count = self.count(point).saturating_add(1);
        let data = self.data.insert(point, count);
        Self { data }
    }

    /// Gets the number of times that `point` has been visited.
    #[must_use]
    pub fn count(&self, point: ProgramPoint) -> usize {
        self.data.get(&point).copied().unwrap_or(0)
    }

    /// Checks if `point` has been visited at least `limit` times.
    #[must_use]
    pub fn at_visit_limit(&self, point: ProgramPoint, limit: usize) -> bool {
        self.count(point) >= limit
    }
}

/// The sink into which the checks of a walk publish their findings.
///
/// A finding is published at most once for every combination of rule, program
/// point, and the identity of the value it concerns, no matter how many paths
/// reach the point in a state that exhibits it.
#[derive(Clone, Debug, Default)]
pub struct Findings {
    seen:     HashSet<(String, ProgramPoint, Option<SymbolicValue>)>,
    findings: Vec<Finding>,
}

impl Findings {
    /// Constructs a new, empty, sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `finding`, keyed on the `value` that it concerns.
    ///
    /// Returns `true` if the finding was new, and `false` if an equivalent one
    /// had already been published.
    pub fn publish(&mut self, finding: Finding, value: Option<SymbolicValue>) -> bool {
        let key = (finding.rule_id.clone(), finding.location.point, value);
        if !self.seen.insert(key) {
            return false;
        }
        log::debug!("Found {} at {}", finding.rule_id, finding.location.point);
        self.findings.push(finding);
        true
    }

    /// Gets the findings in the order in which they were published.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Gets the number of findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// Checks if there are no findings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Consumes the sink to get the findings it holds.
    #[must_use]
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

#[cfg(test)]
mod test {
    mod visit_counts {
        use crate::{
            cfg::BlockId,
            graph::{data::VisitCounts, point::ProgramPoint},
        };

        #[test]
        fn can_mark_points_as_visited() {
            let point = ProgramPoint::new(BlockId::new(2), 1);
            let counts = VisitCounts::new().mark_visited(point);

            assert_eq!(counts.count(point), 1);
            assert!(counts.at_visit_limit(point, 1));
            assert!(!counts.at_visit_limit(point, 2));
        }

        #[test]
        fn marking_leaves_the_original_untouched() {
            let point = ProgramPoint::new(BlockId::new(0), 0);
            let counts = VisitCounts::new();
            let marked = counts.mark_visited(point).mark_visited(point);

            assert_eq!(counts.count(point), 0);
            assert_eq!(marked.count(point), 2);
        }
    }

    mod findings {
        use crate::{
            cfg::BlockId,
            finding::Finding,
            graph::{data::Findings, point::ProgramPoint},
            value::SymbolicValue,
        };

        #[test]
        fn equivalent_findings_are_published_once() {
            let point = ProgramPoint::new(BlockId::new(1), 0);
            let value = SymbolicValue::fresh();
            let mut sink = Findings::new();

            assert!(sink.publish(Finding::new("rule", point, None, "m"), Some(value.clone())));
            assert!(!sink.publish(Finding::new("rule", point, None, "m"), Some(value)));
            assert!(sink.publish(
                Finding::new("rule", point, None, "m"),
                Some(SymbolicValue::fresh())
            ));
            assert!(sink.publish(Finding::new("other", point, None, "m"), None));

            assert_eq!(sink.len(), 3);
        }
    }
}
