use serde::{Deserialize, Serialize};

use crate::calibration::calibrate;
use crate::error::PsiError;

/// The element bit width the whole protocol is calibrated around —
/// the Mersenne61 field width.
pub const MAXBITLEN: u32 = 61;

/// Cuckoo/simple hashing functions per element. Fixed by the
/// calibration table; not configurable per session.
pub const NFUNS: u8 = 3;

const EPSILON: f64 = 1.27;

/// Which analytics function the 2PC hand-off computes over the
/// intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyticsType {
    /// No analytics gate — only bucketing, OPRF and polynomial
    /// exchange run; useful for benchmarking the core alone.
    None,
    /// `|A ∩ B| > threshold`.
    Threshold,
    /// `|A ∩ B|`.
    Sum,
    /// `|A ∩ B|` if that exceeds `threshold`, else `0`.
    SumIfGtThreshold,
}

/// Session parameters agreed by both parties before a run. Cheap to
/// construct and to serialize across a side channel (e.g. the binaries
/// in `psi-demo` exchanging a shared `Context` via `serde_json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub address: String,
    pub port: u16,
    pub role: circuit::Role,
    pub neles: usize,
    pub nbins: usize,
    pub threshold: u64,
    pub polynomialsize: usize,
    pub nmegabins: usize,
    pub polynomialbytelength: usize,
    pub analytics_type: AnalyticsType,
}

impl Context {
    pub fn new(
        address: impl Into<String>,
        port: u16,
        role: circuit::Role,
        neles: usize,
        threshold: u64,
        analytics_type: AnalyticsType,
    ) -> Result<Self, PsiError> {
        if neles == 0 {
            return Err(PsiError::Configuration("neles must be positive".into()));
        }

        let nbins = (EPSILON * neles as f64).ceil() as usize;
        let (polynomialsize, nmegabins) = calibrate(neles);
        let polynomialbytelength = 8 * polynomialsize;

        let nbinsinmegabin = ceil_divide(nbins, nmegabins);
        debug_assert!(
            nmegabins * nbinsinmegabin <= 2 * nbins,
            "megabin sizing invariant violated: nmegabins={nmegabins} nbinsinmegabin={nbinsinmegabin} nbins={nbins}"
        );

        Ok(Context {
            address: address.into(),
            port,
            role,
            neles,
            nbins,
            threshold,
            polynomialsize,
            nmegabins,
            polynomialbytelength,
            analytics_type,
        })
    }

    pub fn nbinsinmegabin(&self) -> usize {
        ceil_divide(self.nbins, self.nmegabins)
    }

    pub fn aux_port(&self) -> u16 {
        self.port + 1
    }
}

pub fn ceil_divide(numerator: usize, denominator: usize) -> usize {
    (numerator + denominator - 1) / denominator
}
