use std::cmp;

use crate::com::*;

/* approximate bits of one vector component magnitude */
pub(crate) static MV_EST_RATE: [i32; 256] = [
    1, 4, 4, 6, 6, 6, 6, 8, 8, 8, 8, 8, 8, 8, 8, 10, //
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 12, //
    12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, //
    12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 14, //
    14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, //
    14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, //
    14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, //
    14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 16, //
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, //
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, //
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, //
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, //
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, //
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, //
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, //
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 18, //
];

#[inline]
fn rate(v: i32) -> i32 {
    MV_EST_RATE[cmp::min(v.abs(), 255) as usize]
}

/// Estimated bits to code the vector `(dx, dy)` against the predictor
/// `(predx, predy)`.
#[inline]
pub(crate) fn mv_est_bits(dx: i32, dy: i32, predx: i32, predy: i32) -> i32 {
    1 + cmp::min(rate(dx) + rate(dy), rate(dx - predx) + rate(dy - predy))
}

/// Lagrangian cost of a distortion and rate pair.
#[inline]
pub(crate) fn rd_cost(dd: i32, dr: i32, lambda: i32) -> i32 {
    (dd << LAMBDA_SCALE) + dr * lambda
}
