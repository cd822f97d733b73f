//! Run parameters and grid generation.

use ride_core::MatchingPolicyKind;
use serde::{Deserialize, Serialize};

/// One contention run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionParams {
    pub run_id: usize,
    pub seed: u64,
    pub riders: usize,
    pub drivers: usize,
    pub threads: usize,
    pub ops_per_thread: usize,
    pub policy: MatchingPolicyKind,
}

impl Default for ContentionParams {
    fn default() -> Self {
        Self {
            run_id: 0,
            seed: 42,
            riders: 16,
            drivers: 8,
            threads: 4,
            ops_per_thread: 500,
            policy: MatchingPolicyKind::default(),
        }
    }
}

impl ContentionParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_riders(mut self, riders: usize) -> Self {
        self.riders = riders;
        self
    }

    pub fn with_drivers(mut self, drivers: usize) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_ops_per_thread(mut self, ops: usize) -> Self {
        self.ops_per_thread = ops;
        self
    }

    pub fn with_policy(mut self, policy: MatchingPolicyKind) -> Self {
        self.policy = policy;
        self
    }

    /// Seed for worker thread `index`; distinct per thread and per run.
    pub fn thread_seed(&self, index: usize) -> u64 {
        self.seed
            .wrapping_mul(1_000_003)
            .wrapping_add(index as u64)
    }
}

/// Cartesian grid over run parameters. Empty dimensions use the base value.
#[derive(Debug, Clone, Default)]
pub struct ContentionSpace {
    base: ContentionParams,
    riders: Vec<usize>,
    drivers: Vec<usize>,
    threads: Vec<usize>,
    policies: Vec<MatchingPolicyKind>,
}

impl ContentionSpace {
    pub fn grid() -> Self {
        Self::default()
    }

    pub fn with_base(base: ContentionParams) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    pub fn riders(mut self, values: Vec<usize>) -> Self {
        self.riders = values;
        self
    }

    pub fn drivers(mut self, values: Vec<usize>) -> Self {
        self.drivers = values;
        self
    }

    pub fn threads(mut self, values: Vec<usize>) -> Self {
        self.threads = values;
        self
    }

    pub fn policies(mut self, values: Vec<MatchingPolicyKind>) -> Self {
        self.policies = values;
        self
    }

    /// Expand the grid. Run `i` gets `run_id = i` and `seed = base.seed + i`.
    pub fn generate(&self) -> Vec<ContentionParams> {
        let riders = or_base(&self.riders, self.base.riders);
        let drivers = or_base(&self.drivers, self.base.drivers);
        let threads = or_base(&self.threads, self.base.threads);
        let policies = or_base(&self.policies, self.base.policy);

        let mut runs = Vec::new();
        for &r in &riders {
            for &d in &drivers {
                for &t in &threads {
                    for &policy in &policies {
                        let index = runs.len();
                        runs.push(ContentionParams {
                            run_id: index,
                            seed: self.base.seed.wrapping_add(index as u64),
                            riders: r,
                            drivers: d,
                            threads: t,
                            ops_per_thread: self.base.ops_per_thread,
                            policy,
                        });
                    }
                }
            }
        }
        runs
    }
}

fn or_base<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}
