//! Characteristic-object lattice construction.
//!
//! A characteristic object (CO) is one point in the Cartesian product of the
//! per-criterion characteristic value lists. The lattice enumerates every CO
//! in row-major order with the last criterion varying fastest; this order is
//! the index contract shared by the SJ vector, the preference table, and the
//! MEJ rows and columns, so nothing downstream may reorder it.

use nalgebra::DMatrix;

use crate::validation::{validate_cvalues, ValidationError};

/// Enumerate all characteristic objects for the given characteristic values.
///
/// Returns an N×M matrix where N is the product of the per-criterion list
/// lengths and M the number of criteria; row `i` is the `i`-th CO.
pub fn build_lattice(cvalues: &[Vec<f64>]) -> Result<DMatrix<f64>, ValidationError> {
    validate_cvalues(cvalues)?;

    let m = cvalues.len();
    let n: usize = cvalues.iter().map(|cv| cv.len()).product();

    let mut lattice = DMatrix::<f64>::zeros(n, m);
    for row in 0..n {
        let mut rem = row;
        for k in (0..m).rev() {
            let len = cvalues[k].len();
            lattice[(row, k)] = cvalues[k][rem % len];
            rem /= len;
        }
    }
    Ok(lattice)
}

/// Row strides of the lattice enumeration: moving one landmark step along
/// criterion `k` moves `strides[k]` rows.
pub(crate) fn lattice_strides(cvalues: &[Vec<f64>]) -> Vec<usize> {
    let m = cvalues.len();
    let mut strides = vec![1; m];
    for k in (0..m.saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * cvalues[k + 1].len();
    }
    strides
}

/// Partition each criterion's observed range into `intervals` equal-width
/// buckets and return the bucket boundaries as that criterion's
/// characteristic values (`intervals + 1` per criterion).
///
/// A convenience for callers with data but no expert model. Fails on a
/// constant column, whose range cannot be partitioned.
pub fn make_cvalues(
    matrix: &DMatrix<f64>,
    intervals: usize,
) -> Result<Vec<Vec<f64>>, ValidationError> {
    if matrix.ncols() == 0 {
        return Err(ValidationError::NoCriteria);
    }
    if intervals == 0 {
        return Err(ValidationError::CvaluesTooShort {
            criterion: 0,
            len: 1,
        });
    }

    let mut cvalues = Vec::with_capacity(matrix.ncols());
    for criterion in 0..matrix.ncols() {
        let col = matrix.column(criterion);
        let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !lo.is_finite() || !hi.is_finite() {
            return Err(ValidationError::CvaluesNotFinite { criterion });
        }
        if lo >= hi {
            return Err(ValidationError::CvaluesNotIncreasing {
                criterion,
                position: 1,
            });
        }
        let step = (hi - lo) / intervals as f64;
        let mut cv: Vec<f64> = (0..intervals).map(|i| lo + step * i as f64).collect();
        // Exact upper bound instead of an accumulated lo + step*intervals.
        cv.push(hi);
        cvalues.push(cv);
    }
    Ok(cvalues)
}
