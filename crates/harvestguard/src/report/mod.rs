//! Results view data (HTML and text rendering live in the harvestguard_report crate).

use crate::scan::{Decision, ScanOutcome, ScanResult};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

/// What the results page shows: the rows of one submission and its message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultsView {
    pub results: Vec<ScanResult>,
    pub message: String,
    pub partial_failure: bool,
    pub generated_utc_rfc3339: String,
}

/// Row counts per decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total: usize,
    pub accepted: usize,
    pub flagged: usize,
    pub errors: usize,
    pub other: usize,
}

impl ResultsView {
    pub fn from_outcome(outcome: &ScanOutcome) -> Self {
        let generated_utc_rfc3339 = time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            results: outcome.results.clone(),
            message: outcome.message.clone(),
            partial_failure: outcome.partial_failure,
            generated_utc_rfc3339,
        }
    }

    pub fn summary(&self) -> ResultsSummary {
        let mut s = ResultsSummary {
            total: self.results.len(),
            ..Default::default()
        };
        for r in &self.results {
            match r.decision {
                Decision::Accept => s.accepted += 1,
                Decision::Flag => s.flagged += 1,
                Decision::Error => s.errors += 1,
                Decision::Other(_) => s.other += 1,
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts() {
        let mut flagged = ScanResult::error_placeholder("b.jpg", "x");
        flagged.decision = Decision::Flag;
        flagged.error = None;
        let mut accepted = flagged.clone();
        accepted.decision = Decision::Accept;
        let outcome = ScanOutcome::batch(vec![
            accepted,
            flagged,
            ScanResult::error_placeholder("c.jpg", "x"),
        ]);
        let view = ResultsView::from_outcome(&outcome);
        assert_eq!(
            view.summary(),
            ResultsSummary {
                total: 3,
                accepted: 1,
                flagged: 1,
                errors: 1,
                other: 0,
            }
        );
        assert!(!view.generated_utc_rfc3339.is_empty());
    }
}
