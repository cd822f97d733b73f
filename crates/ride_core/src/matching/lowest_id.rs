use crate::availability::Candidate;
use crate::model::UserId;

use super::policy::MatchingPolicy;

/// Lowest driver id among the candidates.
///
/// Stable across calls and across engines, and cheap: O(n) over the
/// candidate slice. Drivers registered earlier get ids first, so under a
/// steady pool this also favours the earliest-registered drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LowestDriverIdMatching;

impl MatchingPolicy for LowestDriverIdMatching {
    fn select(&self, rider: UserId, candidates: &[Candidate]) -> Option<UserId> {
        candidates
            .iter()
            .map(|candidate| candidate.driver_id)
            .filter(|driver| *driver != rider)
            .min()
    }

    fn name(&self) -> &'static str {
        "lowest_driver_id"
    }
}
