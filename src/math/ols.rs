//! SVD-based least squares building blocks.
//!
//! Every iteration unit solves the same kind of problem for many columns at once:
//!
//! ```text
//! minimize ‖Y - X B‖²   (X: n × p design, Y: n × m data, B: p × m)
//! ```
//!
//! The design is shared by all `m` columns, so we factor it once and apply its
//! Moore–Penrose pseudo-inverse to the whole data block: `B = pinv(X) Y`.
//!
//! Implementation choices:
//! - SVD rather than normal equations, so rank-deficient designs still produce
//!   the minimum-norm solution instead of failing.
//! - Singular values below `rcond * σ_max` are treated as zero; the number kept
//!   is the effective rank used for residual degrees of freedom.

use nalgebra::DMatrix;

/// Pseudo-inverse of `x` plus its effective rank.
///
/// Returns `None` for an empty matrix or when the SVD does not produce finite
/// factors.
pub fn pseudo_inverse(x: &DMatrix<f64>, rcond: f64) -> Option<(DMatrix<f64>, usize)> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return None;
    }

    let svd = x.clone().svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let s = svd.singular_values;

    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    if !s_max.is_finite() {
        return None;
    }
    let cutoff = rcond.max(0.0) * s_max;

    let mut rank = 0;
    let mut v = v_t.transpose();
    for (j, mut col) in v.column_iter_mut().enumerate() {
        let sj = s[j];
        if sj > cutoff && sj > 0.0 {
            col /= sj;
            rank += 1;
        } else {
            col.fill(0.0);
        }
    }

    let pinv = v * u.transpose();
    if pinv.iter().all(|v| v.is_finite()) {
        Some((pinv, rank))
    } else {
        None
    }
}
