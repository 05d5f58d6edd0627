//! Evaluation and interpolation of polynomials over [`Fp61`].
//!
//! Coefficients are stored low-degree-first: `coeffs[i]` is the
//! coefficient of `x^i`.

use mersenne::Fp61;

/// Evaluates `coeffs` at `x` using Horner's method.
pub fn eval(coeffs: &[Fp61], x: Fp61) -> Fp61 {
    let mut acc = Fp61::ZERO;
    for c in coeffs.iter().rev() {
        acc = acc * x + *c;
    }
    acc
}

/// Interpolates the unique minimal-degree polynomial through the points
/// `(xs[i], ys[i])`, in Newton form, built up incrementally so each new
/// point costs `O(m)` work instead of re-solving from scratch.
///
/// `xs` must be pairwise distinct — a repeated x-coordinate makes the
/// interpolation problem degenerate and this function will divide by
/// zero (via [`Fp61::inv`]) rather than silently returning a wrong
/// polynomial.
///
/// Trailing zero coefficients are dropped, so the returned vector's
/// length is the true degree + 1, not necessarily `xs.len()`.
pub fn interpolate(xs: &[Fp61], ys: &[Fp61]) -> Vec<Fp61> {
    assert_eq!(xs.len(), ys.len(), "interpolate: vector length mismatch");
    let m = xs.len();
    if m == 0 {
        return Vec::new();
    }

    let mut prod: Vec<Fp61> = xs.to_vec();
    let mut res: Vec<Fp61> = vec![Fp61::ZERO; m];

    for k in 0..m {
        let aa = xs[k];

        let mut t1 = Fp61::ONE;
        for i in (0..k).rev() {
            t1 = t1 * aa + prod[i];
        }

        let mut t2 = Fp61::ZERO;
        for i in (0..k).rev() {
            t2 = t2 * aa + res[i];
        }

        t1 = t1.inv();
        t2 = ys[k] - t2;
        t1 = t1 * t2;

        for i in 0..k {
            let delta = prod[i] * t1;
            res[i] = res[i] + delta;
        }
        res[k] = t1;

        if k < m - 1 {
            if k == 0 {
                prod[0] = -prod[0];
            } else {
                let neg_xk = -xs[k];
                prod[k] = neg_xk + prod[k - 1];
                for i in (1..k).rev() {
                    let delta = prod[i] * neg_xk;
                    prod[i] = delta + prod[i - 1];
                }
                prod[0] = prod[0] * neg_xk;
            }
        }
    }

    let mut deg = m;
    while deg > 0 && res[deg - 1].is_zero() {
        deg -= 1;
    }
    res.truncate(deg);
    res
}

/// Pads `coeffs` up to `len` with zero coefficients, for transmission
/// at the fixed wire size `polynomialsize` the two parties agreed on.
///
/// Panics if `coeffs` already has more than `len` coefficients — that
/// indicates a miscalibrated `Context`, not a value to silently drop.
pub fn pad_to(mut coeffs: Vec<Fp61>, len: usize) -> Vec<Fp61> {
    assert!(
        coeffs.len() <= len,
        "polynomial of degree {} does not fit in {} coefficients",
        coeffs.len().saturating_sub(1),
        len
    );
    coeffs.resize(len, Fp61::ZERO);
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rand_fp(rng: &mut StdRng) -> Fp61 {
        Fp61::from_u64(rng.gen())
    }

    #[test]
    fn eval_of_constant_polynomial() {
        let c = Fp61::from_u64(42);
        assert_eq!(eval(&[c], Fp61::from_u64(1234)), c);
    }

    #[test]
    fn eval_matches_direct_sum() {
        // p(x) = 1 + 2x + 3x^2
        let coeffs = [Fp61::from_u64(1), Fp61::from_u64(2), Fp61::from_u64(3)];
        let x = Fp61::from_u64(5);
        let expected = Fp61::from_u64(1) + Fp61::from_u64(2) * x + Fp61::from_u64(3) * x * x;
        assert_eq!(eval(&coeffs, x), expected);
    }

    #[test]
    fn interpolate_then_eval_round_trips() {
        let mut rng = StdRng::seed_from_u64(42);
        for m in [1usize, 2, 5, 16, 64] {
            let mut xs = Vec::with_capacity(m);
            while xs.len() < m {
                let candidate = rand_fp(&mut rng);
                if !xs.contains(&candidate) {
                    xs.push(candidate);
                }
            }
            let ys: Vec<Fp61> = (0..m).map(|_| rand_fp(&mut rng)).collect();

            let coeffs = interpolate(&xs, &ys);
            for (x, y) in xs.iter().zip(ys.iter()) {
                assert_eq!(eval(&coeffs, *x), *y);
            }
        }
    }

    #[test]
    fn interpolate_drops_trailing_zero_coefficients() {
        // three points on the line y = x, interpolation should collapse
        // to degree 1 (two coefficients), not degree 2.
        let xs = [Fp61::from_u64(1), Fp61::from_u64(2), Fp61::from_u64(3)];
        let ys = xs;
        let coeffs = interpolate(&xs, &ys);
        assert_eq!(coeffs.len(), 2);
        assert_eq!(coeffs[0], Fp61::ZERO);
        assert_eq!(coeffs[1], Fp61::ONE);
    }

    #[test]
    fn pad_to_extends_with_zero() {
        let coeffs = vec![Fp61::from_u64(7)];
        let padded = pad_to(coeffs, 4);
        assert_eq!(padded.len(), 4);
        assert_eq!(padded[0], Fp61::from_u64(7));
        assert!(padded[1..].iter().all(|c| c.is_zero()));
    }

    #[test]
    #[should_panic]
    fn pad_to_rejects_oversize_input() {
        let coeffs = vec![Fp61::ZERO; 5];
        let _ = pad_to(coeffs, 4);
    }
}
