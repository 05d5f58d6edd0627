//! The `(neles, polynomialsize, nmegabins)` calibration the reference
//! tabulates by running the tail-bound analysis offline: the chance
//! that any megabin receives more real entries than `polynomialsize`
//! stays below the statistical security parameter (2⁻⁴⁰).

/// One calibrated operating point.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationRow {
    pub neles: usize,
    pub polynomialsize: usize,
    pub nmegabins: usize,
}

const TABLE: [CalibrationRow; 3] = [
    CalibrationRow { neles: 1 << 12, polynomialsize: 975, nmegabins: 16 },
    CalibrationRow { neles: 1 << 16, polynomialsize: 1021, nmegabins: 248 },
    CalibrationRow { neles: 1 << 20, polynomialsize: 1024, nmegabins: 4002 },
];

/// Returns `(polynomialsize, nmegabins)` for a given input-set size.
///
/// Exact tabulated sizes return their measured calibration directly.
/// Anything else falls back to the nearest tabulated row, scaling
/// `nmegabins` by how much larger the actual set is — this keeps the
/// expected entries-per-megabin ratio roughly where the tabulated row
/// measured it safe, rather than extrapolating the tail bound itself.
/// This is a conservative approximation, not a re-derivation of the
/// statistical argument; an operator calibrating a new deployment size
/// should replace it with a measured row.
pub fn calibrate(neles: usize) -> (usize, usize) {
    if let Some(row) = TABLE.iter().find(|r| r.neles == neles) {
        return (row.polynomialsize, row.nmegabins);
    }

    let nearest = TABLE
        .iter()
        .min_by_key(|r| (r.neles as i64 - neles as i64).abs())
        .expect("calibration table is non-empty");

    let scale = (neles as f64 / nearest.neles as f64).max(1.0);
    let nmegabins = ((nearest.nmegabins as f64) * scale).ceil() as usize;
    (nearest.polynomialsize, nmegabins.max(1))
}
