//! Cuckoo and simple hashing tables for bucket-based set intersection,
//! plus the keyless mapping from a raw 64-bit element to its hashed
//! representation in the tables.
//!
//! The client buckets its set with one slot per bin ([`CuckooTable`]);
//! the server buckets its set with up to `nfuns` slots per bin
//! ([`SimpleTable`]), one per candidate hash function, so that whichever
//! function the client's cuckoo insertion happened to use for a shared
//! element, the server has a matching candidate in the same bin.

use rand::rngs::OsRng;
use rand::Rng;

/// Bits of field-element domain reserved to record which of the
/// `nfuns` hash functions produced a given bin assignment. Cuckoo and
/// simple tables embed this identically so that two tables' entries
/// for the same (element, hash function) pair are bit-for-bit equal.
pub const HASH_INDEX_BITS: u32 = 2;

/// Total usable bits per slot value (the Mersenne61 field width).
pub const VALUE_BITS: u32 = 61;

const ELEMENT_HASH_BITS: u32 = VALUE_BITS - HASH_INDEX_BITS;
const ELEMENT_HASH_MASK: u64 = (1u64 << ELEMENT_HASH_BITS) - 1;
const FULL_VALUE_MASK: u64 = (1u64 << VALUE_BITS) - 1;

const GOLDEN_GAMMA: u64 = 0x9E3779B97F4A7C15;

/// The splitmix64 finalizer, used both as the keyless `element_to_hash`
/// mapping and to derive the per-hash-function bin index from it.
#[inline]
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    x
}

/// Maps a raw 64-bit set element to its hashed representation, with no
/// key — both parties must compute the same value for the same
/// element. Idempotent as a pure function: calling it twice on the
/// same input always returns the same output, but it is applied to a
/// given element exactly once per table insertion (applying it twice
/// in the pipeline would desynchronize client and server).
#[inline]
pub fn element_to_hash(element: u64) -> u64 {
    mix64(element) & ELEMENT_HASH_MASK
}

/// Combines an already-hashed element with the index of the hash
/// function that placed it, into the final value stored in a table
/// slot and later used as an OPRF input / polynomial X-coordinate.
#[inline]
pub fn slot_value(element_hash: u64, hash_idx: u8) -> u64 {
    (element_hash & ELEMENT_HASH_MASK) | ((hash_idx as u64) << ELEMENT_HASH_BITS)
}

/// The bin a hashed element falls into under hash function `func_idx`,
/// out of `nbins` bins.
#[inline]
pub fn bin_index(element_hash: u64, func_idx: u8, nbins: usize) -> usize {
    let seeded = element_hash ^ GOLDEN_GAMMA.wrapping_mul(func_idx as u64 + 1);
    (mix64(seeded) % nbins as u64) as usize
}

/// A cuckoo hashing table: one slot per bin. Insertion evicts on
/// collision, cycling through the colliding element's other candidate
/// hash functions, and gives up into a stash after `max_kicks` evictions.
pub struct CuckooTable {
    nbins: usize,
    nfuns: u8,
    max_kicks: usize,
    bins: Vec<Option<(u64, u8)>>,
    stash: Vec<u64>,
}

impl CuckooTable {
    pub fn new(nbins: usize, nfuns: u8) -> Self {
        assert!(nfuns >= 1, "cuckoo table needs at least one hash function");
        assert!(
            (nfuns as u32) < (1 << HASH_INDEX_BITS),
            "hash function index does not fit in {HASH_INDEX_BITS} reserved bits"
        );
        CuckooTable {
            nbins,
            nfuns,
            max_kicks: 200 + nbins,
            bins: vec![None; nbins],
            stash: Vec::new(),
        }
    }

    /// Inserts every element of `elements`, applying [`element_to_hash`]
    /// exactly once per element.
    pub fn insert_all(&mut self, elements: &[u64]) {
        for &e in elements {
            self.insert_one(element_to_hash(e));
        }
    }

    fn insert_one(&mut self, mut current_hash: u64) {
        let mut func_idx: u8 = 0;
        for _ in 0..self.max_kicks {
            let bin = bin_index(current_hash, func_idx, self.nbins);
            match self.bins[bin].replace((current_hash, func_idx)) {
                None => return,
                Some((evicted_hash, evicted_idx)) => {
                    current_hash = evicted_hash;
                    func_idx = (evicted_idx + 1) % self.nfuns;
                }
            }
        }
        self.stash.push(current_hash);
    }

    pub fn stash_size(&self) -> usize {
        self.stash.len()
    }

    pub fn is_stash_empty(&self) -> bool {
        self.stash.is_empty()
    }

    /// One slot value per bin. Empty bins get a fresh random dummy so
    /// which bins are actually occupied is not observable from the
    /// vector alone.
    pub fn as_raw_vector(&self) -> Vec<u64> {
        let mut rng = OsRng;
        self.bins
            .iter()
            .map(|slot| match slot {
                Some((h, idx)) => slot_value(*h, *idx),
                None => rng.gen::<u64>() & FULL_VALUE_MASK,
            })
            .collect()
    }
}

/// A simple hashing table: up to `nfuns` slots per bin, one candidate
/// per hash function. An element lands in every one of its `nfuns`
/// candidate bins, so whichever single bin a peer's [`CuckooTable`]
/// chose for a shared element, this table has a matching entry there.
pub struct SimpleTable {
    nbins: usize,
    nfuns: u8,
    bins: Vec<Vec<u64>>,
}

impl SimpleTable {
    pub fn new(nbins: usize, nfuns: u8) -> Self {
        assert!(nfuns >= 1, "simple table needs at least one hash function");
        assert!(
            (nfuns as u32) < (1 << HASH_INDEX_BITS),
            "hash function index does not fit in {HASH_INDEX_BITS} reserved bits"
        );
        SimpleTable {
            nbins,
            nfuns,
            bins: vec![Vec::new(); nbins],
        }
    }

    /// Inserts every element of `elements` into all `nfuns` of its
    /// candidate bins, applying [`element_to_hash`] exactly once per
    /// element.
    pub fn insert_all(&mut self, elements: &[u64]) {
        for &e in elements {
            let h = element_to_hash(e);
            for func_idx in 0..self.nfuns {
                let bin = bin_index(h, func_idx, self.nbins);
                self.bins[bin].push(slot_value(h, func_idx));
            }
        }
    }

    /// The largest number of candidates landing in a single bin —
    /// the server-side analogue of the client's cuckoo stash: if this
    /// grows far past `nfuns * (elements / nbins)`, `nbins` is too
    /// small for the input set.
    pub fn max_bin_size(&self) -> usize {
        self.bins.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn as_raw_2d_vector(&self) -> Vec<Vec<u64>> {
        self.bins.clone()
    }
}
