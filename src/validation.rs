//! Boundary validators shared by model construction and evaluation.
//!
//! Everything here runs before any lattice construction or interpolation, so
//! malformed input surfaces as a descriptive error instead of a half-built
//! model.

use nalgebra::DMatrix;
use thiserror::Error;

use crate::methods::CriterionType;

/// Weights may drift from 1.0 by this much before being rejected.
pub const WEIGHT_SUM_TOL: f64 = 0.01;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("criterion {criterion}: needs at least 2 characteristic values, got {len}")]
    CvaluesTooShort { criterion: usize, len: usize },
    #[error(
        "criterion {criterion}: characteristic values must be strictly increasing \
         (violated at position {position})"
    )]
    CvaluesNotIncreasing { criterion: usize, position: usize },
    #[error("criterion {criterion}: characteristic values must be finite")]
    CvaluesNotFinite { criterion: usize },
    #[error("no criteria given")]
    NoCriteria,
    #[error("matrix has {got} criteria columns but {expected} were expected")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("got {weights} weights and {types} types for {criteria} criteria")]
    CardinalityMismatch {
        criteria: usize,
        weights: usize,
        types: usize,
    },
    #[error("weights must be positive and sum to 1, but their sum is {sum}")]
    InvalidWeights { sum: f64 },
}

/// Check per-criterion characteristic value lists: at least two entries each,
/// finite, strictly ascending.
pub fn validate_cvalues(cvalues: &[Vec<f64>]) -> Result<(), ValidationError> {
    if cvalues.is_empty() {
        return Err(ValidationError::NoCriteria);
    }
    for (criterion, cv) in cvalues.iter().enumerate() {
        validate_cvalue_list(criterion, cv)?;
    }
    Ok(())
}

/// Check a single characteristic value list; `criterion` only labels the
/// error.
pub fn validate_cvalue_list(criterion: usize, cv: &[f64]) -> Result<(), ValidationError> {
    if cv.len() < 2 {
        return Err(ValidationError::CvaluesTooShort {
            criterion,
            len: cv.len(),
        });
    }
    if cv.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::CvaluesNotFinite { criterion });
    }
    for position in 1..cv.len() {
        if cv[position - 1] >= cv[position] {
            return Err(ValidationError::CvaluesNotIncreasing {
                criterion,
                position,
            });
        }
    }
    Ok(())
}

/// Check that an alternative matrix has the expected number of criteria
/// columns.
pub fn validate_matrix_criteria(
    matrix: &DMatrix<f64>,
    expected: usize,
) -> Result<(), ValidationError> {
    if matrix.ncols() != expected {
        return Err(ValidationError::DimensionMismatch {
            expected,
            got: matrix.ncols(),
        });
    }
    Ok(())
}

/// Check matrix/weights/types cardinality agreement and weight validity for a
/// ranking-method call.
pub fn validate_decision_input(
    matrix: &DMatrix<f64>,
    weights: &[f64],
    types: &[CriterionType],
) -> Result<(), ValidationError> {
    let criteria = matrix.ncols();
    if weights.len() != criteria || types.len() != criteria {
        return Err(ValidationError::CardinalityMismatch {
            criteria,
            weights: weights.len(),
            types: types.len(),
        });
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() >= WEIGHT_SUM_TOL || weights.iter().any(|w| *w <= 0.0) {
        return Err(ValidationError::InvalidWeights { sum });
    }
    Ok(())
}
