//! Arithmetic in `GF(2^61 - 1)`.
//!
//! `p = 2^61 - 1` is a Mersenne prime, so reduction modulo `p` is a
//! shift-and-add rather than a general division: for any `x`,
//! `x mod p == (x & p) + (x >> 61)`, folded until the result fits in
//! `[0, p)`. Every [`Fp61`] value is kept in that canonical range, so
//! equality is plain integer equality.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `2^61 - 1`.
pub const P: u64 = (1u64 << 61) - 1;

/// An element of `GF(2^61 - 1)`, always held in `[0, P)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fp61(u64);

impl Fp61 {
    /// The additive identity.
    pub const ZERO: Fp61 = Fp61(0);
    /// The multiplicative identity.
    pub const ONE: Fp61 = Fp61(1);

    /// Reduces `x` modulo `p` and wraps it as a field element.
    #[inline]
    pub fn from_u64(x: u64) -> Self {
        // x < 2^64 < p^2, so a single fold plus one conditional
        // subtraction always lands in [0, p).
        let folded = (x & P) + (x >> 61);
        Fp61(Self::final_sub(folded))
    }

    /// Returns the canonical `u64` representative in `[0, p)`.
    #[inline]
    pub const fn to_u64(self) -> u64 {
        self.0
    }

    #[inline]
    const fn final_sub(x: u64) -> u64 {
        if x >= P {
            x - P
        } else {
            x
        }
    }

    /// Builds a field element directly from a residue already known to
    /// lie in `[0, p)`. Only used internally and by tests; callers at
    /// the API boundary should go through [`Fp61::from_u64`].
    #[inline]
    fn from_canonical(x: u64) -> Self {
        debug_assert!(x < P, "residue {x} is not in [0, p)");
        Fp61(x)
    }

    /// `self + other`.
    #[inline]
    pub fn add(self, other: Fp61) -> Fp61 {
        // both operands < p < 2^61, so the sum is < 2^62: one fold
        // plus one conditional subtraction suffices.
        let sum = self.0 + other.0;
        let folded = (sum & P) + (sum >> 61);
        Fp61(Self::final_sub(folded))
    }

    /// `self - other`.
    #[inline]
    pub fn sub(self, other: Fp61) -> Fp61 {
        if self.0 >= other.0 {
            Fp61(self.0 - other.0)
        } else {
            Fp61(P - (other.0 - self.0))
        }
    }

    /// `-self`.
    #[inline]
    pub fn neg(self) -> Fp61 {
        if self.0 == 0 {
            Fp61(0)
        } else {
            Fp61(P - self.0)
        }
    }

    /// `self * other`, via a full 128-bit product and Mersenne folding.
    #[inline]
    pub fn mul(self, other: Fp61) -> Fp61 {
        let product = (self.0 as u128) * (other.0 as u128);
        Fp61(Self::reduce_wide(product))
    }

    #[inline]
    fn reduce_wide(mut x: u128) -> u64 {
        let p128 = P as u128;
        while x > p128 {
            x = (x & p128) + (x >> 61);
        }
        if x == p128 {
            0
        } else {
            x as u64
        }
    }

    /// The multiplicative inverse, via Fermat's little theorem
    /// (`self^(p-2)`). Undefined (returns `0`) for `self == 0`; callers
    /// must never invoke this on a zero element — the interpolation
    /// routine in the `poly` crate upholds this by construction (its X
    /// coordinates are pairwise distinct).
    #[inline]
    pub fn inv(self) -> Fp61 {
        debug_assert_ne!(self.0, 0, "inversion of zero is undefined");
        if self.0 == 0 {
            return Fp61(0);
        }
        self.pow(P - 2)
    }

    /// Binary exponentiation.
    pub fn pow(self, mut exp: u64) -> Fp61 {
        let mut base = self;
        let mut acc = Fp61::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc.mul(base);
            }
            base = base.mul(base);
            exp >>= 1;
        }
        acc
    }

    /// `true` if `self` is the additive identity.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Little-endian 8-byte encoding. The top 3 bits are always zero
    /// since every residue fits in 61 bits.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Decodes a little-endian 8-byte encoding, reducing modulo `p` in
    /// case the top bits are non-canonical.
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self::from_u64(u64::from_le_bytes(bytes))
    }
}

impl Add for Fp61 {
    type Output = Fp61;
    #[inline]
    fn add(self, rhs: Fp61) -> Fp61 {
        Fp61::add(self, rhs)
    }
}

impl AddAssign for Fp61 {
    #[inline]
    fn add_assign(&mut self, rhs: Fp61) {
        *self = *self + rhs;
    }
}

impl Sub for Fp61 {
    type Output = Fp61;
    #[inline]
    fn sub(self, rhs: Fp61) -> Fp61 {
        Fp61::sub(self, rhs)
    }
}

impl SubAssign for Fp61 {
    #[inline]
    fn sub_assign(&mut self, rhs: Fp61) {
        *self = *self - rhs;
    }
}

impl Mul for Fp61 {
    type Output = Fp61;
    #[inline]
    fn mul(self, rhs: Fp61) -> Fp61 {
        Fp61::mul(self, rhs)
    }
}

impl MulAssign for Fp61 {
    #[inline]
    fn mul_assign(&mut self, rhs: Fp61) {
        *self = *self * rhs;
    }
}

impl Neg for Fp61 {
    type Output = Fp61;
    #[inline]
    fn neg(self) -> Fp61 {
        Fp61::neg(self)
    }
}

impl fmt::Display for Fp61 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Fp61 {
    fn from(x: u64) -> Self {
        Fp61::from_u64(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    #[test]
    fn round_trip_from_to_u64() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let x: u64 = rng.gen();
            assert_eq!(Fp61::from_u64(x).to_u64(), x % P);
        }
        // boundary values
        assert_eq!(Fp61::from_u64(0).to_u64(), 0);
        assert_eq!(Fp61::from_u64(P).to_u64(), 0);
        assert_eq!(Fp61::from_u64(P - 1).to_u64(), P - 1);
        assert_eq!(Fp61::from_u64(u64::MAX).to_u64(), u64::MAX % P);
    }

    #[test]
    fn add_wraps_at_p() {
        let a = Fp61::from_u64(P - 1);
        let b = Fp61::from_u64(2);
        assert_eq!((a + b).to_u64(), 1);
    }

    #[test]
    fn sub_wraps_below_zero() {
        let a = Fp61::from_u64(1);
        let b = Fp61::from_u64(2);
        assert_eq!((a - b).to_u64(), P - 1);
    }

    #[test]
    fn neg_is_additive_inverse() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let a = Fp61::from_u64(rng.gen());
            assert_eq!((a + (-a)).to_u64(), 0);
        }
    }

    #[test]
    fn mul_matches_u128_reference() {
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..10_000 {
            let a: u64 = rng.gen_range(0..P);
            let b: u64 = rng.gen_range(0..P);
            let expected = ((a as u128) * (b as u128) % (P as u128)) as u64;
            assert_eq!((Fp61::from_u64(a) * Fp61::from_u64(b)).to_u64(), expected);
        }
    }

    #[test]
    fn inv_is_multiplicative_inverse() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..1_000 {
            let a = loop {
                let x = Fp61::from_u64(rng.gen());
                if !x.is_zero() {
                    break x;
                }
            };
            assert_eq!((a * a.inv()).to_u64(), 1);
        }
    }

    #[test]
    fn serialisation_round_trips() {
        let mut rng = StdRng::seed_from_u64(19);
        for _ in 0..1_000 {
            let a = Fp61::from_u64(rng.gen());
            let bytes = a.to_le_bytes();
            assert_eq!(bytes[7] >> 5, 0, "top 3 bits must be zero");
            assert_eq!(Fp61::from_le_bytes(bytes), a);
        }
    }

    #[test]
    fn from_canonical_accepts_in_range_residues() {
        assert_eq!(Fp61::from_canonical(5).to_u64(), 5);
    }
}
