use crate::availability::Candidate;
use crate::model::UserId;

use super::policy::MatchingPolicy;

/// Driver that has been waiting longest, by availability-index sequence.
///
/// A released driver re-enters the line at the back, which spreads rides
/// across the pool instead of handing them to the same low ids. Equal
/// sequence numbers fall back to the lowest id.
#[derive(Debug, Default, Clone, Copy)]
pub struct LongestIdleMatching;

impl MatchingPolicy for LongestIdleMatching {
    fn select(&self, rider: UserId, candidates: &[Candidate]) -> Option<UserId> {
        candidates
            .iter()
            .filter(|candidate| candidate.driver_id != rider)
            .min_by_key(|candidate| (candidate.available_since, candidate.driver_id))
            .map(|candidate| candidate.driver_id)
    }

    fn name(&self) -> &'static str {
        "longest_idle"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, since: u64) -> Candidate {
        Candidate {
            driver_id: UserId(id),
            available_since: since,
        }
    }

    #[test]
    fn picks_earliest_available() {
        let policy = LongestIdleMatching;
        let candidates = [candidate(2, 9), candidate(5, 1), candidate(9, 3)];
        assert_eq!(policy.select(UserId(1), &candidates), Some(UserId(5)));
    }

    #[test]
    fn ties_break_on_lowest_id() {
        let policy = LongestIdleMatching;
        let candidates = [candidate(8, 4), candidate(3, 4)];
        assert_eq!(policy.select(UserId(1), &candidates), Some(UserId(3)));
    }
}
