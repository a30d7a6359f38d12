//! The COMET model: identification and preference interpolation.
//!
//! Identification happens exactly once, at construction: the characteristic
//! object lattice is built, the expert function judges it, and the resulting
//! preference table is frozen. Evaluation is then a pure function from an
//! alternative matrix to a preference vector, safe to share across threads.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::expert::{ExpertError, ExpertFunction, SubmodelExpert};
use crate::lattice::{build_lattice, lattice_strides, make_cvalues};
use crate::mej::Mej;
use crate::methods::rank_preferences;
use crate::validation::{validate_matrix_criteria, ValidationError};

/// What to do with an alternative whose criterion value falls outside the
/// characteristic value range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPolicy {
    /// Fail with [`CometError::OutOfDomain`] naming the offender.
    #[default]
    Reject,
    /// Clamp to the criterion's landmark range and log a warning.
    Clamp,
}

#[derive(Debug, Error)]
pub enum CometError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Expert(#[from] ExpertError),
    #[error(
        "alternative {alternative}: criterion {criterion} value {value} is outside \
         the domain [{lo}, {hi}]"
    )]
    OutOfDomain {
        alternative: usize,
        criterion: usize,
        value: f64,
        lo: f64,
        hi: f64,
    },
    #[error("expert function produced {got} judgements for {expected} characteristic objects")]
    ExpertShape { expected: usize, got: usize },
    #[error("percent_step must lie strictly between 0 and 1, got {0}")]
    InvalidStep(f64),
    #[error(
        "local weights: criterion {criterion} value {value} is outside the \
         domain [{lo}, {hi}]"
    )]
    SweepPointOutOfDomain {
        criterion: usize,
        value: f64,
        lo: f64,
        hi: f64,
    },
}

/// An identified COMET model.
///
/// Owns its lattice, SJ, MEJ, and preference table exclusively; all of them
/// are read-only after construction.
#[derive(Debug)]
pub struct Comet {
    cvalues: Vec<Vec<f64>>,
    lattice: DMatrix<f64>,
    strides: Vec<usize>,
    sj: DVector<f64>,
    mej: Mej,
    p: Vec<f64>,
    policy: DomainPolicy,
}

impl Comet {
    /// Identify a model: build the lattice, run the expert function once, and
    /// freeze the preference table. The expert function is consumed — the
    /// transition to the identified state is irrevocable.
    pub fn new(cvalues: Vec<Vec<f64>>, expert: ExpertFunction) -> Result<Self, CometError> {
        Self::with_policy(cvalues, expert, DomainPolicy::default())
    }

    pub fn with_policy(
        cvalues: Vec<Vec<f64>>,
        mut expert: ExpertFunction,
        policy: DomainPolicy,
    ) -> Result<Self, CometError> {
        let lattice = build_lattice(&cvalues)?;
        let n = lattice.nrows();
        debug!(
            criteria = cvalues.len(),
            characteristic_objects = n,
            "identifying COMET model"
        );

        let (sj, mej) = expert.evaluate(&lattice)?;
        if sj.len() != n || mej.len() != n {
            return Err(CometError::ExpertShape {
                expected: n,
                got: mej.len(),
            });
        }

        // The diagonal contributes a constant 0.5 to every row sum, so an
        // all-losing object scores 0.5 and an all-winning one n - 0.5.
        // Centering it out maps SJ onto [0, 1] exactly.
        let p: Vec<f64> = sj.iter().map(|s| (s - 0.5) / (n - 1) as f64).collect();
        debug!(characteristic_objects = n, "COMET model identified");

        Ok(Self {
            strides: lattice_strides(&cvalues),
            cvalues,
            lattice,
            sj,
            mej,
            p,
            policy,
        })
    }

    /// Preference value per alternative row, by product-weighted multilinear
    /// interpolation over the 2^M corners of each alternative's bracketing
    /// hyper-rectangle in CO space. Exact at lattice points.
    pub fn evaluate(&self, matrix: &DMatrix<f64>) -> Result<Vec<f64>, CometError> {
        validate_matrix_criteria(matrix, self.cvalues.len())?;
        (0..matrix.nrows())
            .map(|alternative| {
                let row: Vec<f64> = matrix.row(alternative).iter().copied().collect();
                self.interpolate(&row, alternative)
            })
            .collect()
    }

    /// Locate the bracketing landmark pair for one criterion value. Returns
    /// the lower landmark index and the fractional position within the
    /// bracket.
    fn bracket(
        &self,
        criterion: usize,
        value: f64,
        alternative: usize,
    ) -> Result<(usize, f64), CometError> {
        let cv = &self.cvalues[criterion];
        let (lo, hi) = (cv[0], cv[cv.len() - 1]);

        // Non-finite values have no clamp target; they are rejected under
        // either policy.
        let value = if !value.is_finite() {
            return Err(CometError::OutOfDomain {
                alternative,
                criterion,
                value,
                lo,
                hi,
            });
        } else if value < lo || value > hi {
            match self.policy {
                DomainPolicy::Reject => {
                    return Err(CometError::OutOfDomain {
                        alternative,
                        criterion,
                        value,
                        lo,
                        hi,
                    })
                }
                DomainPolicy::Clamp => {
                    warn!(alternative, criterion, value, lo, hi, "clamping out-of-domain value");
                    value.clamp(lo, hi)
                }
            }
        } else {
            value
        };

        let upper = cv.partition_point(|&c| c < value).clamp(1, cv.len() - 1);
        let lower = upper - 1;
        let t = (value - cv[lower]) / (cv[upper] - cv[lower]);
        Ok((lower, t))
    }

    fn interpolate(&self, alternative: &[f64], index: usize) -> Result<f64, CometError> {
        let m = self.cvalues.len();
        let brackets: Vec<(usize, f64)> = alternative
            .iter()
            .enumerate()
            .map(|(k, &v)| self.bracket(k, v, index))
            .collect::<Result<_, _>>()?;

        let mut preference = 0.0;
        for corner in 0..(1usize << m) {
            let mut weight = 1.0;
            let mut row = 0;
            for (k, &(lower, t)) in brackets.iter().enumerate() {
                let take_upper = corner & (1 << k) != 0;
                weight *= if take_upper { t } else { 1.0 - t };
                row += (lower + usize::from(take_upper)) * self.strides[k];
            }
            if weight != 0.0 {
                preference += weight * self.p[row];
            }
        }
        Ok(preference)
    }

    /// Competitive ranking of a preference vector; higher preference is
    /// better (rank 1), ties share a rank.
    pub fn rank(&self, preferences: &[f64]) -> Vec<usize> {
        rank_preferences(preferences, true)
    }

    /// Equal-width characteristic value buckets for a raw decision matrix;
    /// see [`crate::lattice::make_cvalues`].
    pub fn make_cvalues(
        matrix: &DMatrix<f64>,
        intervals: usize,
    ) -> Result<Vec<Vec<f64>>, ValidationError> {
        make_cvalues(matrix, intervals)
    }

    /// Local criterion importance around one alternative: sweep each
    /// criterion across its domain in `percent_step` increments with the
    /// other criteria fixed, and normalize the resulting preference ranges
    /// to sum 1. A criterion the preference is constant in gets weight 0.
    pub fn local_weights(&self, alternative: &[f64], percent_step: f64) -> Result<Vec<f64>, CometError> {
        if !(0.0 < percent_step && percent_step < 1.0) {
            return Err(CometError::InvalidStep(percent_step));
        }
        let m = self.cvalues.len();
        if alternative.len() != m {
            return Err(ValidationError::DimensionMismatch {
                expected: m,
                got: alternative.len(),
            }
            .into());
        }

        // The probe point is this single alternative, so a stray coordinate
        // is reported against its criterion rather than a row index.
        let mut base = alternative.to_vec();
        for (k, v) in base.iter_mut().enumerate() {
            let cv = &self.cvalues[k];
            let (lo, hi) = (cv[0], cv[cv.len() - 1]);
            if !v.is_finite() || *v < lo || *v > hi {
                match self.policy {
                    DomainPolicy::Clamp if v.is_finite() => {
                        warn!(criterion = k, value = *v, lo, hi, "clamping out-of-domain value");
                        *v = v.clamp(lo, hi);
                    }
                    _ => {
                        return Err(CometError::SweepPointOutOfDomain {
                            criterion: k,
                            value: *v,
                            lo,
                            hi,
                        })
                    }
                }
            }
        }

        let mut ranges = vec![0.0; m];
        for k in 0..m {
            let cv = &self.cvalues[k];
            let (lo, hi) = (cv[0], cv[cv.len() - 1]);
            let step = (hi - lo) * percent_step;

            let mut min_p = f64::INFINITY;
            let mut max_p = f64::NEG_INFINITY;
            let mut value = lo;
            while value <= hi {
                let mut probe = base.clone();
                probe[k] = value;
                let p = self.interpolate(&probe, 0)?;
                min_p = min_p.min(p);
                max_p = max_p.max(p);
                value += step;
            }
            ranges[k] = max_p - min_p;
        }

        let total: f64 = ranges.iter().sum();
        if total > 0.0 {
            ranges.iter_mut().for_each(|r| *r /= total);
        }
        Ok(ranges)
    }

    // -- Identified state accessors ----------------------------------------

    /// Preference value per characteristic object (SJ normalized to [0, 1]).
    pub fn p(&self) -> &[f64] {
        &self.p
    }

    /// Raw row-sum judgement score per characteristic object.
    pub fn sj(&self) -> &DVector<f64> {
        &self.sj
    }

    pub fn mej(&self) -> &Mej {
        &self.mej
    }

    pub fn cvalues(&self) -> &[Vec<f64>] {
        &self.cvalues
    }

    /// The CO lattice, one characteristic object per row.
    pub fn characteristic_objects(&self) -> &DMatrix<f64> {
        &self.lattice
    }

    pub fn domain_policy(&self) -> DomainPolicy {
        self.policy
    }

    /// Wrap this identified model as an expert function for a coarser model.
    pub fn into_expert(self) -> ExpertFunction {
        ExpertFunction::Submodel(SubmodelExpert::new(Arc::new(self)))
    }
}
