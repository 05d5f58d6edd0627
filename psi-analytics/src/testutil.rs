//! Deterministic input generators and an oracle for the plaintext
//! intersection, used by the integration test scenarios. Not part of
//! the protocol itself — raw set elements, never hashed here; the
//! keyless `element_to_hash` mapping is applied exactly once, inside
//! the bucketing stage (`hashing::CuckooTable`/`SimpleTable`), so
//! generators must not apply it themselves.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `n` elements drawn uniformly from `[0, 2^elem_bitlen)`, seeded for
/// reproducibility across a test run's two parties.
pub fn pseudorandom_elements(n: usize, elem_bitlen: u32, seed: u64) -> Vec<u64> {
    assert!(elem_bitlen <= 63, "element bit length must fit a u64 range");
    let mut rng = StdRng::seed_from_u64(seed);
    let bound = 1u64 << elem_bitlen;
    (0..n).map(|_| rng.gen_range(0..bound)).collect()
}

/// The sequential elements `0..n`, for scenarios where both parties
/// are expected to hold identical sets.
pub fn sequential_elements(n: usize) -> Vec<u64> {
    (0..n as u64).collect()
}

/// The size of the plaintext intersection of two sets, used only as
/// the test oracle the protocol's output is checked against.
pub fn plain_intersection_size(a: &[u64], b: &[u64]) -> usize {
    let a: HashSet<u64> = a.iter().copied().collect();
    b.iter().filter(|x| a.contains(x)).count()
}
