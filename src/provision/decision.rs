//! Mid-pipeline layout decision strategies.

use crate::model::ParameterProposals;

/// Resolves the pipeline's layout-variation decision.
///
/// Contract: the returned name must be a key present in `proposals`. The
/// workflow verifies this before submitting the selection.
pub trait DecisionStrategy: Send + Sync {
    fn choose(&self, proposals: &ParameterProposals) -> String;
}

/// Default policy when the caller supplies no strategy: take the candidate at
/// the rank midpoint of the proposal list, `len / 2` with floor division in
/// backend order. Deliberately the middle of the sweep rather than either
/// extreme of the parameter range.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidpointDecision;

impl DecisionStrategy for MidpointDecision {
    fn choose(&self, proposals: &ParameterProposals) -> String {
        proposals
            .names()
            .nth(proposals.len() / 2)
            .unwrap_or_default()
            .to_string()
    }
}

impl<F> DecisionStrategy for F
where
    F: Fn(&ParameterProposals) -> String + Send + Sync,
{
    fn choose(&self, proposals: &ParameterProposals) -> String {
        self(proposals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposals(names: &[&str]) -> ParameterProposals {
        ParameterProposals::from_scores(
            names
                .iter()
                .enumerate()
                .map(|(rank, name)| (name.to_string(), rank as f64 / 10.0)),
        )
    }

    #[test]
    fn midpoint_of_three_is_the_middle_candidate() {
        assert_eq!(MidpointDecision.choose(&proposals(&["a", "b", "c"])), "b");
    }

    #[test]
    fn midpoint_of_four_floors_to_index_two() {
        assert_eq!(
            MidpointDecision.choose(&proposals(&["a", "b", "c", "d"])),
            "c"
        );
    }

    #[test]
    fn midpoint_of_one_is_that_candidate() {
        assert_eq!(MidpointDecision.choose(&proposals(&["only"])), "only");
    }

    #[test]
    fn closures_are_strategies() {
        let last = |proposals: &ParameterProposals| {
            proposals.names().last().unwrap_or_default().to_string()
        };
        assert_eq!(last.choose(&proposals(&["a", "b", "c"])), "c");
    }
}
