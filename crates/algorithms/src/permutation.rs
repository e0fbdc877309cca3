//! Seedable permutation service for randomization inference
//!
//! Every random stream is a pure function of `(seed, stream)`: a
//! `ChaCha8Rng` seeded from the top-level seed and switched to the given
//! stream number. The global test uses one stream per draw and the local
//! test one stream per unit, so results never depend on execution order or
//! on how many threads ran the work. Local streams live in the upper half of
//! the stream space so they never coincide with global draws.

use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Default seed used when the caller does not pick one
pub const DEFAULT_SEED: u64 = 123_456_789;

/// First stream reserved for the per-unit local tests
pub const LOCAL_STREAM_BASE: u64 = 1 << 63;

/// Deterministic source of permutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationEngine {
    seed: u64,
}

impl Default for PermutationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl PermutationEngine {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Independent generator for `stream`.
    pub fn rng(&self, stream: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(stream);
        rng
    }

    /// Uniform random permutation of `0..n` drawn from `stream`.
    pub fn permutation(&self, n: usize, stream: u64) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.rng(stream));
        order
    }

    /// Copy `values` into `out` and shuffle it with `stream`.
    ///
    /// `out` is reused so that repeated draws do not allocate.
    pub fn shuffle_into(&self, values: &[f64], stream: u64, out: &mut Vec<f64>) {
        out.clear();
        out.extend_from_slice(values);
        out.shuffle(&mut self.rng(stream));
    }

    /// Sampler for the conditional permutation test of `unit` among `n` units.
    pub fn conditional(&self, n: usize, unit: usize) -> ConditionalSampler {
        ConditionalSampler {
            rng: self.rng(LOCAL_STREAM_BASE | unit as u64),
            unit,
            others: n.saturating_sub(1),
            slots: Vec::new(),
        }
    }
}

/// Draws for one unit's conditional permutation test.
///
/// The unit's own value stays fixed and the other `n − 1` values are
/// randomly reassigned. Only the values landing in the unit's neighbor
/// slots matter, and under a uniform permutation those form a uniform
/// ordered sample without replacement of the other units, which is what
/// [`draw`](Self::draw) returns in O(slots) per call.
#[derive(Debug, Clone)]
pub struct ConditionalSampler {
    rng: ChaCha8Rng,
    unit: usize,
    others: usize,
    slots: Vec<usize>,
}

impl ConditionalSampler {
    /// The held-out unit.
    pub fn unit(&self) -> usize {
        self.unit
    }

    /// Unit indices whose values fill `slots` neighbor positions this draw.
    ///
    /// Never contains the held-out unit. `slots` is clamped to `n − 1`.
    pub fn draw(&mut self, slots: usize) -> &[usize] {
        let amount = slots.min(self.others);
        let picked = index::sample(&mut self.rng, self.others, amount);
        self.slots.clear();
        // Map 0..n-1 onto every unit except the held-out one
        self.slots
            .extend(picked.into_iter().map(|k| if k >= self.unit { k + 1 } else { k }));
        &self.slots
    }
}
