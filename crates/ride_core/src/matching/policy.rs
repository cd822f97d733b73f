use serde::{Deserialize, Serialize};

use crate::availability::Candidate;
use crate::model::UserId;

use super::longest_idle::LongestIdleMatching;
use super::lowest_id::LowestDriverIdMatching;

/// Trait for policies that pick one driver out of the eligible set.
///
/// The matching engine hands a policy the candidates that survived
/// eligibility filtering (active, Driver role, not committed, not the rider)
/// and commits whatever the policy returns.
///
/// # Determinism
///
/// For a given rider and candidate slice a policy must always return the same
/// driver, independent of the order the candidates were supplied in. Two
/// engines running the same policy over the same index agree on every pick.
///
/// # Examples
///
/// ```rust
/// use ride_core::availability::Candidate;
/// use ride_core::matching::{LowestDriverIdMatching, MatchingPolicy};
/// use ride_core::UserId;
///
/// let policy = LowestDriverIdMatching;
/// let picked = policy.select(
///     UserId(1),
///     &[
///         Candidate { driver_id: UserId(7), available_since: 1 },
///         Candidate { driver_id: UserId(3), available_since: 2 },
///     ],
/// );
/// assert_eq!(picked, Some(UserId(3)));
/// ```
pub trait MatchingPolicy: Send + Sync {
    /// Pick a driver for `rider`, or `None` when `candidates` is empty.
    fn select(&self, rider: UserId, candidates: &[Candidate]) -> Option<UserId>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Which tie-break policy the engine uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingPolicyKind {
    /// Lowest driver id wins.
    #[default]
    LowestDriverId,
    /// Driver that has been eligible the longest wins; ties by lowest id.
    LongestIdle,
}

impl MatchingPolicyKind {
    pub fn build(self) -> Box<dyn MatchingPolicy> {
        match self {
            MatchingPolicyKind::LowestDriverId => Box::new(LowestDriverIdMatching),
            MatchingPolicyKind::LongestIdle => Box::new(LongestIdleMatching),
        }
    }
}
