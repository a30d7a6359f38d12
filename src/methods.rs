//! Ranking-method collaborator contract.
//!
//! A ranking method maps a decision matrix (alternatives × criteria), a
//! weight vector summing to 1, and per-criterion directions to one preference
//! score per alternative. The expert functions delegate to this contract when
//! scoring the characteristic-object lattice; a reference TOPSIS
//! implementation is provided.

use std::cmp::Ordering;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::{validate_decision_input, ValidationError};

/// Direction of a criterion: higher values are better (profit) or worse
/// (cost).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionType {
    Profit,
    Cost,
}

impl CriterionType {
    pub fn is_cost(self) -> bool {
        matches!(self, CriterionType::Cost)
    }
}

#[derive(Debug, Error)]
pub enum MethodError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("criterion {criterion} is constant; min-max normalization is undefined")]
    ConstantCriterion { criterion: usize },
}

/// A matrix/weights/types → preference-scores evaluator.
///
/// `reverse_ranking` fixes the method's orientation for [`rank_preferences`]:
/// true means a higher score is better (rank 1).
pub trait McdaMethod {
    fn evaluate(
        &self,
        matrix: &DMatrix<f64>,
        weights: &[f64],
        types: &[CriterionType],
    ) -> Result<Vec<f64>, MethodError>;

    fn reverse_ranking(&self) -> bool {
        true
    }
}

/// Competitive ranking: rank = 1 + number of strictly better scores, ties
/// share a rank. `descending` selects the higher-is-better orientation.
pub fn rank_preferences(scores: &[f64], descending: bool) -> Vec<usize> {
    scores
        .iter()
        .map(|&s| {
            let better = scores
                .iter()
                .filter(|&&other| {
                    let ord = other.partial_cmp(&s).unwrap_or(Ordering::Equal);
                    if descending {
                        ord == Ordering::Greater
                    } else {
                        ord == Ordering::Less
                    }
                })
                .count();
            better + 1
        })
        .collect()
}

/// Min-max rescale a score vector into [0, 1] in place. A constant vector has
/// no spread to express, so it collapses to uniform ties at 0.5.
pub(crate) fn minmax_scale(scores: &mut [f64]) {
    let lo = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi - lo <= 0.0 {
        scores.iter_mut().for_each(|s| *s = 0.5);
        return;
    }
    scores.iter_mut().for_each(|s| *s = (*s - lo) / (hi - lo));
}

// ---------------------------------------------------------------------
//  TOPSIS
// ---------------------------------------------------------------------

/// Technique for Order of Preference by Similarity to Ideal Solution, with
/// min-max normalization. Preference is the closeness coefficient
/// `D⁻ / (D⁻ + D⁺)` against the positive and negative ideal solutions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Topsis;

impl McdaMethod for Topsis {
    fn evaluate(
        &self,
        matrix: &DMatrix<f64>,
        weights: &[f64],
        types: &[CriterionType],
    ) -> Result<Vec<f64>, MethodError> {
        validate_decision_input(matrix, weights, types)?;

        let (rows, cols) = matrix.shape();
        let mut weighted = DMatrix::<f64>::zeros(rows, cols);
        for k in 0..cols {
            let col = matrix.column(k);
            let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if hi - lo <= 0.0 {
                return Err(MethodError::ConstantCriterion { criterion: k });
            }
            for i in 0..rows {
                let norm = (matrix[(i, k)] - lo) / (hi - lo);
                let norm = if types[k].is_cost() { 1.0 - norm } else { norm };
                weighted[(i, k)] = norm * weights[k];
            }
        }

        let pis: Vec<f64> = (0..cols)
            .map(|k| weighted.column(k).iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .collect();
        let nis: Vec<f64> = (0..cols)
            .map(|k| weighted.column(k).iter().copied().fold(f64::INFINITY, f64::min))
            .collect();

        let scores = (0..rows)
            .map(|i| {
                let mut d_pos = 0.0;
                let mut d_neg = 0.0;
                for k in 0..cols {
                    d_pos += (weighted[(i, k)] - pis[k]).powi(2);
                    d_neg += (weighted[(i, k)] - nis[k]).powi(2);
                }
                let (d_pos, d_neg) = (d_pos.sqrt(), d_neg.sqrt());
                d_neg / (d_neg + d_pos)
            })
            .collect();
        Ok(scores)
    }
}
