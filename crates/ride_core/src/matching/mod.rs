pub mod engine;
pub mod longest_idle;
pub mod lowest_id;
pub mod policy;

pub use engine::MatchingEngine;
pub use longest_idle::LongestIdleMatching;
pub use lowest_id::LowestDriverIdMatching;
pub use policy::{MatchingPolicy, MatchingPolicyKind};
