//! This module contains the report produced by analyzing a single method.

use serde::{Deserialize, Serialize};

use crate::{
    finding::Finding,
    graph::{point::ProgramPoint, Completion},
};

/// The result of walking the exploded graph of a single method.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// The identity of the analyzed method.
    pub method: String,

    /// The findings, in the order in which they were published.
    pub findings: Vec<Finding>,

    /// How the walk came to an end.
    pub completion: Completion,

    /// The number of exploded graph nodes that were processed.
    pub steps: usize,
}

impl AnalysisReport {
    /// Constructs a new report for `method`.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        findings: Vec<Finding>,
        completion: Completion,
        steps: usize,
    ) -> Self {
        let method = method.into();
        Self {
            method,
            findings,
            completion,
            steps,
        }
    }

    /// Checks if the walk explored every reachable node.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }
}

/// Additional utility functions to enable cleaner testing with the report.
impl AnalysisReport {
    /// Gets the findings raised by the rule with the provided `rule_id`.
    pub fn findings_for<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a Finding> {
        self.findings.iter().filter(move |f| f.rule_id == rule_id)
    }

    /// Checks if the report contains a finding for `rule_id` at `point`.
    #[must_use]
    pub fn has_finding(&self, rule_id: &str, point: ProgramPoint) -> bool {
        self.findings_for(rule_id).any(|f| f.location.point == point)
    }

    /// Gets the number of findings in the report.
    #[must_use]
    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }
}

#[cfg(test)]
mod test {
    use crate::{
        cfg::BlockId,
        finding::Finding,
        graph::{point::ProgramPoint, Completion},
        report::AnalysisReport,
    };

    #[test]
    fn findings_can_be_queried_by_rule() {
        let point = ProgramPoint::new(BlockId::new(1), 2);
        let report = AnalysisReport::new(
            "M",
            vec![
                Finding::new("null-dereference", point, None, "'o' is null."),
                Finding::new("lock-not-released", point, None, "Unlock 'l'."),
            ],
            Completion::Complete,
            12,
        );

        assert!(report.is_complete());
        assert_eq!(report.finding_count(), 2);
        assert_eq!(report.findings_for("null-dereference").count(), 1);
        assert!(report.has_finding("lock-not-released", point));
        assert!(!report.has_finding("lock-not-released", ProgramPoint::start_of(BlockId::new(0))));
    }
}
