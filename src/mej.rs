//! Matrix of Expert Judgements (MEJ).
//!
//! Square matrix over the characteristic-object lattice. Entry `(i, j)` is
//! 1 if object `i` is strictly preferred to object `j`, 0 for the reverse,
//! 0.5 for a tie. The matrix is anti-symmetric around 0.5 with a 0.5
//! diagonal; row sums form the SJ vector, the raw preference score per
//! object.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MejError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("judgement matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("judgement matrix is not anti-symmetric at ({i}, {j}): {a} + {b} != 1")]
    NotAntiSymmetric { i: usize, j: usize, a: f64, b: f64 },
    #[error("judgement matrix diagonal must be 0.5, got {value} at {i}")]
    BadDiagonal { i: usize, value: f64 },
    #[error("{path}: line {line}: cannot parse {value:?} as a number")]
    Parse {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("{path}: line {line} has {got} values, expected {expected}")]
    RaggedRow {
        path: PathBuf,
        line: usize,
        expected: usize,
        got: usize,
    },
    #[error("{0} already exists; pass allow_overwrite to replace it")]
    AlreadyExists(PathBuf),
}

/// Anti-symmetric pairwise judgement matrix over the CO lattice.
///
/// Immutable once built. Derivations from score vectors go through
/// [`Mej::from_scores`], which is anti-symmetric by construction; judgement
/// matrices from any other source are checked in [`Mej::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mej {
    values: DMatrix<f64>,
}

impl Mej {
    /// Wrap a judgement matrix, checking squareness, the 0.5 diagonal, and
    /// anti-symmetry around 0.5.
    pub fn new(values: DMatrix<f64>) -> Result<Self, MejError> {
        let (rows, cols) = values.shape();
        if rows != cols {
            return Err(MejError::NotSquare { rows, cols });
        }
        for i in 0..rows {
            if values[(i, i)] != 0.5 {
                return Err(MejError::BadDiagonal {
                    i,
                    value: values[(i, i)],
                });
            }
            for j in (i + 1)..rows {
                let a = values[(i, j)];
                let b = values[(j, i)];
                if a + b != 1.0 {
                    return Err(MejError::NotAntiSymmetric { i, j, a, b });
                }
            }
        }
        Ok(Self { values })
    }

    /// Derive judgements from a per-object score vector, higher is better:
    /// `score_i > score_j` gives 1, equality 0.5, otherwise 0.
    pub fn from_scores(scores: &[f64]) -> Self {
        let n = scores.len();
        let mut values = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            values[(i, i)] = 0.5;
            for j in (i + 1)..n {
                let v = if scores[i] > scores[j] {
                    1.0
                } else if scores[i] == scores[j] {
                    0.5
                } else {
                    0.0
                };
                values[(i, j)] = v;
                values[(j, i)] = 1.0 - v;
            }
        }
        Self { values }
    }

    /// Number of judged objects.
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// SJ vector: row sums, the unnormalized preference score per object.
    pub fn sj(&self) -> DVector<f64> {
        let n = self.len();
        DVector::from_iterator(n, (0..n).map(|i| self.values.row(i).sum()))
    }

    /// Fraction of transitively consistent judgement triads, in [0, 1].
    ///
    /// For objects i < j < k with a = m[i][j], b = m[j][k], c = m[i][k]:
    /// two agreeing judgements pin the third (strict preference propagates
    /// through a tie; a tie chain stays a tie), while opposing strict
    /// judgements leave c unconstrained. Advisory diagnostic only — an
    /// inconsistent matrix is still evaluated.
    pub fn triads_consistency(&self) -> f64 {
        let n = self.len();
        if n < 3 {
            return 1.0;
        }
        let m = &self.values;
        let mut total = 0usize;
        let mut inconsistent = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                for k in (j + 1)..n {
                    total += 1;
                    let a = m[(i, j)];
                    let b = m[(j, k)];
                    let c = m[(i, k)];
                    let expected = if a >= 0.5 && b >= 0.5 && a + b > 1.0 {
                        Some(1.0)
                    } else if a <= 0.5 && b <= 0.5 && a + b < 1.0 {
                        Some(0.0)
                    } else if a == 0.5 && b == 0.5 {
                        Some(0.5)
                    } else {
                        None
                    };
                    if let Some(want) = expected {
                        if c != want {
                            inconsistent += 1;
                        }
                    }
                }
            }
        }
        1.0 - inconsistent as f64 / total as f64
    }

    /// Write the matrix as comma-separated rows. Rust's shortest-round-trip
    /// float formatting is used, so [`Mej::read_csv`] reproduces the matrix
    /// bit-exactly.
    pub fn write_csv(&self, path: impl AsRef<Path>, allow_overwrite: bool) -> Result<(), MejError> {
        let path = path.as_ref();
        if path.exists() && !allow_overwrite {
            return Err(MejError::AlreadyExists(path.to_path_buf()));
        }
        let mut file = File::create(path)?;
        let n = self.len();
        for i in 0..n {
            let row: Vec<String> = (0..n).map(|j| self.values[(i, j)].to_string()).collect();
            writeln!(file, "{}", row.join(","))?;
        }
        Ok(())
    }

    /// Read a matrix previously written by [`Mej::write_csv`], re-running the
    /// constructor checks.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, MejError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut row = Vec::new();
            for field in line.split(',') {
                let value = field.trim();
                row.push(value.parse::<f64>().map_err(|_| MejError::Parse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    value: value.to_string(),
                })?);
            }
            if let Some(first) = rows.first() {
                if row.len() != first.len() {
                    return Err(MejError::RaggedRow {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        expected: first.len(),
                        got: row.len(),
                    });
                }
            }
            rows.push(row);
        }

        let n = rows.len();
        let cols = rows.first().map_or(0, Vec::len);
        let values = DMatrix::from_fn(n, cols, |i, j| rows[i][j]);
        Self::new(values)
    }
}
