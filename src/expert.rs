//! Expert functions: the strategies that judge the characteristic objects.
//!
//! Every variant consumes the CO lattice and produces the SJ vector together
//! with the full Matrix of Expert Judgements. The set is closed — each
//! variant is a small value type holding only its own parameters, dispatched
//! through [`ExpertFunction::evaluate`].

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::comet::{Comet, CometError};
use crate::mej::{Mej, MejError};
use crate::methods::{minmax_scale, CriterionType, McdaMethod, MethodError};
use crate::validation::ValidationError;

/// Scores a lattice treated as a decision matrix, one score per row.
pub type EvaluationFn = Box<dyn Fn(&DMatrix<f64>) -> Vec<f64> + Send + Sync>;

/// Judges one pair of characteristic objects directly: 1 if the first is
/// better, 0 if the second is, 0.5 for a tie.
pub type PairwiseFn = Box<dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync>;

#[derive(Debug, Error)]
pub enum ExpertError {
    #[error(transparent)]
    Method(#[from] MethodError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Judgement(#[from] MejError),
    #[error("evaluation function returned {got} scores for {expected} characteristic objects")]
    ScoreLength { expected: usize, got: usize },
    #[error("pairwise function returned {value} for objects ({i}, {j}); expected 0, 0.5 or 1")]
    InvalidJudgementValue { i: usize, j: usize, value: f64 },
    #[error("compromise expert needs at least one evaluation function")]
    NoEvaluators,
    #[error("at least one expected solution point is required")]
    NoEsps,
    #[error("expected solution point {esp} has {got} coordinates for {expected} criteria")]
    EspShape {
        esp: usize,
        expected: usize,
        got: usize,
    },
    #[error("criterion {criterion}: bounds must satisfy lo < hi, got [{lo}, {hi}]")]
    InvalidBounds { criterion: usize, lo: f64, hi: f64 },
    #[error("expected solution point {esp} is outside the bounds of criterion {criterion}")]
    EspOutOfBounds { esp: usize, criterion: usize },
    #[error("psi must lie strictly between 0 and 1, got {0}")]
    PsiOutOfRange(f64),
    #[error("sub-model evaluation failed: {0}")]
    Submodel(#[source] Box<CometError>),
}

/// The closed set of expert-function strategies.
pub enum ExpertFunction {
    /// Delegate scoring to a ranking method over the lattice.
    Method(MethodExpert),
    /// Blend several independent evaluation functions.
    Compromise(CompromiseExpert),
    /// Judge each pair through a caller-supplied closure.
    Function(FunctionExpert),
    /// Prefer objects close to expected solution points.
    Esp(EspExpert),
    /// Elicit each pairwise judgement from a human.
    Manual(ManualExpert),
    /// Delegate scoring to an already-identified COMET model.
    Submodel(SubmodelExpert),
}

impl ExpertFunction {
    /// Produce `(SJ, MEJ)` for the lattice. Called exactly once, during model
    /// identification.
    pub fn evaluate(&mut self, lattice: &DMatrix<f64>) -> Result<(DVector<f64>, Mej), ExpertError> {
        let mej = match self {
            ExpertFunction::Method(e) => e.judge(lattice)?,
            ExpertFunction::Compromise(e) => e.judge(lattice)?,
            ExpertFunction::Function(e) => e.judge(lattice)?,
            ExpertFunction::Esp(e) => e.judge(lattice)?,
            ExpertFunction::Manual(e) => e.judge(lattice)?,
            ExpertFunction::Submodel(e) => e.judge(lattice)?,
        };
        let sj = mej.sj();
        Ok((sj, mej))
    }
}

fn lattice_row(lattice: &DMatrix<f64>, i: usize) -> Vec<f64> {
    lattice.row(i).iter().copied().collect()
}

// ---------------------------------------------------------------------
//  Method-delegated expert
// ---------------------------------------------------------------------

/// Applies a ranking method to the lattice as if it were a decision matrix;
/// the MEJ follows from pairwise comparison of the resulting scores.
pub struct MethodExpert {
    method: Box<dyn McdaMethod + Send + Sync>,
    weights: Vec<f64>,
    types: Vec<CriterionType>,
}

impl MethodExpert {
    pub fn new(
        method: impl McdaMethod + Send + Sync + 'static,
        weights: Vec<f64>,
        types: Vec<CriterionType>,
    ) -> Self {
        Self {
            method: Box::new(method),
            weights,
            types,
        }
    }

    fn judge(&self, lattice: &DMatrix<f64>) -> Result<Mej, ExpertError> {
        let scores = self.method.evaluate(lattice, &self.weights, &self.types)?;
        if scores.len() != lattice.nrows() {
            return Err(ExpertError::ScoreLength {
                expected: lattice.nrows(),
                got: scores.len(),
            });
        }
        Ok(Mej::from_scores(&scores))
    }
}

// ---------------------------------------------------------------------
//  Compromise expert
// ---------------------------------------------------------------------

/// Averages several independent evaluations of the lattice, each min-max
/// rescaled to [0, 1] first so no single scale dominates the blend.
pub struct CompromiseExpert {
    evaluators: Vec<EvaluationFn>,
}

impl CompromiseExpert {
    pub fn new(evaluators: Vec<EvaluationFn>) -> Self {
        Self { evaluators }
    }

    fn judge(&self, lattice: &DMatrix<f64>) -> Result<Mej, ExpertError> {
        if self.evaluators.is_empty() {
            return Err(ExpertError::NoEvaluators);
        }
        let n = lattice.nrows();
        let mut blended = vec![0.0; n];
        for evaluator in &self.evaluators {
            let mut scores = evaluator(lattice);
            if scores.len() != n {
                return Err(ExpertError::ScoreLength {
                    expected: n,
                    got: scores.len(),
                });
            }
            minmax_scale(&mut scores);
            for (acc, s) in blended.iter_mut().zip(scores.iter()) {
                *acc += s;
            }
        }
        let k = self.evaluators.len() as f64;
        blended.iter_mut().for_each(|s| *s /= k);
        Ok(Mej::from_scores(&blended))
    }
}

// ---------------------------------------------------------------------
//  Function expert
// ---------------------------------------------------------------------

/// Fills the upper triangle through a direct pairwise closure; the lower
/// triangle is mirrored.
pub struct FunctionExpert {
    pairwise: PairwiseFn,
}

impl FunctionExpert {
    pub fn new(pairwise: PairwiseFn) -> Self {
        Self { pairwise }
    }

    fn judge(&self, lattice: &DMatrix<f64>) -> Result<Mej, ExpertError> {
        let n = lattice.nrows();
        let mut values = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            values[(i, i)] = 0.5;
            let co_i = lattice_row(lattice, i);
            for j in (i + 1)..n {
                let co_j = lattice_row(lattice, j);
                let v = (self.pairwise)(&co_i, &co_j);
                if v != 0.0 && v != 0.5 && v != 1.0 {
                    return Err(ExpertError::InvalidJudgementValue { i, j, value: v });
                }
                values[(i, j)] = v;
                values[(j, i)] = 1.0 - v;
            }
        }
        Ok(Mej::new(values)?)
    }
}

// ---------------------------------------------------------------------
//  ESP expert
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
}

/// How per-ESP distances are combined when several expected solution points
/// are given. This is distinct from the corner interpolation inside
/// [`Comet::evaluate`](crate::comet::Comet::evaluate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceAggregation {
    Minimum,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EspConfig {
    pub metric: DistanceMetric,
    pub aggregation: DistanceAggregation,
    /// Spread of synthesized characteristic values around each ESP
    /// coordinate, in (0, 1). None keeps the ESP coordinate itself as the
    /// only extra landmark.
    pub cvalues_psi: Option<f64>,
    /// Spread psi relative to the whole domain width instead of the
    /// ESP-to-bound gaps.
    pub full_domain_psi: bool,
}

impl Default for EspConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Euclidean,
            aggregation: DistanceAggregation::Minimum,
            cvalues_psi: None,
            full_domain_psi: false,
        }
    }
}

/// Prefers characteristic objects close to expert-specified expected solution
/// points (ESPs). Lattice and ESPs are normalized to [0, 1] per criterion by
/// the domain bounds before distances are taken.
#[derive(Debug)]
pub struct EspExpert {
    esps: Vec<Vec<f64>>,
    bounds: Vec<(f64, f64)>,
    config: EspConfig,
}

impl EspExpert {
    pub fn new(
        esps: Vec<Vec<f64>>,
        bounds: Vec<(f64, f64)>,
        config: EspConfig,
    ) -> Result<Self, ExpertError> {
        if esps.is_empty() {
            return Err(ExpertError::NoEsps);
        }
        if let Some(psi) = config.cvalues_psi {
            if !(0.0 < psi && psi < 1.0) {
                return Err(ExpertError::PsiOutOfRange(psi));
            }
        }
        for (criterion, &(lo, hi)) in bounds.iter().enumerate() {
            if !(lo < hi) || !lo.is_finite() || !hi.is_finite() {
                return Err(ExpertError::InvalidBounds { criterion, lo, hi });
            }
        }
        for (e, esp) in esps.iter().enumerate() {
            if esp.len() != bounds.len() {
                return Err(ExpertError::EspShape {
                    esp: e,
                    expected: bounds.len(),
                    got: esp.len(),
                });
            }
            for (criterion, (&v, &(lo, hi))) in esp.iter().zip(bounds.iter()).enumerate() {
                if v < lo || v > hi {
                    return Err(ExpertError::EspOutOfBounds { esp: e, criterion });
                }
            }
        }
        Ok(Self {
            esps,
            bounds,
            config,
        })
    }

    fn normalize(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .zip(self.bounds.iter())
            .map(|(&v, &(lo, hi))| (v - lo) / (hi - lo))
            .collect()
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self.config.metric {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => {
                a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
            }
        }
    }

    fn judge(&self, lattice: &DMatrix<f64>) -> Result<Mej, ExpertError> {
        if lattice.ncols() != self.bounds.len() {
            return Err(ValidationError::DimensionMismatch {
                expected: self.bounds.len(),
                got: lattice.ncols(),
            }
            .into());
        }
        let nesps: Vec<Vec<f64>> = self.esps.iter().map(|esp| self.normalize(esp)).collect();

        // Closer is better, so judgements compare negated distances.
        let neg_distances: Vec<f64> = (0..lattice.nrows())
            .map(|i| {
                let co = self.normalize(&lattice_row(lattice, i));
                let per_esp = nesps.iter().map(|nesp| self.distance(&co, nesp));
                let d = match self.config.aggregation {
                    DistanceAggregation::Minimum => per_esp.fold(f64::INFINITY, f64::min),
                    DistanceAggregation::Mean => per_esp.sum::<f64>() / self.esps.len() as f64,
                };
                -d
            })
            .collect();
        Ok(Mej::from_scores(&neg_distances))
    }

    /// Synthesize per-criterion characteristic values from the ESPs: always
    /// the domain bounds, plus each ESP coordinate — surrounded by a
    /// psi-scaled spread when configured — clipped to the bounds,
    /// deduplicated, sorted ascending.
    pub fn make_cvalues(&self) -> Vec<Vec<f64>> {
        let mut cvalues = Vec::with_capacity(self.bounds.len());
        for (k, &(lo, hi)) in self.bounds.iter().enumerate() {
            let mut cv = vec![lo, hi];
            for esp in &self.esps {
                let e = esp[k];
                match self.config.cvalues_psi {
                    None => cv.push(e),
                    Some(psi) => {
                        let (l, u) = if self.config.full_domain_psi {
                            let s = psi * (hi - lo);
                            (s, s)
                        } else {
                            (psi * (e - lo), psi * (hi - e))
                        };
                        cv.extend([
                            (e - l).clamp(lo, hi),
                            e,
                            (e + u).clamp(lo, hi),
                        ]);
                    }
                }
            }
            cv.sort_by(f64::total_cmp);
            cv.dedup();
            cvalues.push(cv);
        }
        cvalues
    }
}

// ---------------------------------------------------------------------
//  Manual expert
// ---------------------------------------------------------------------

/// One answer to a pairwise comparison question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    FirstBetter,
    SecondBetter,
    Tie,
}

impl Judgement {
    fn value(self) -> f64 {
        match self {
            Judgement::FirstBetter => 1.0,
            Judgement::SecondBetter => 0.0,
            Judgement::Tie => 0.5,
        }
    }
}

/// One pairwise comparison put to the prompter.
#[derive(Debug)]
pub struct PairQuestion<'a> {
    /// Lattice indices of the compared objects.
    pub pair: (usize, usize),
    /// 1-based question number and the total N(N−1)/2 count.
    pub number: usize,
    pub total: usize,
    /// Spreadsheet-style labels of the compared objects.
    pub labels: (&'a str, &'a str),
    /// The objects' criterion values.
    pub objects: (&'a [f64], &'a [f64]),
    pub criteria_names: &'a [String],
}

/// Answer source for manual elicitation. The terminal implementation blocks
/// on human input; a scripted implementation makes elicitation deterministic
/// under test.
pub trait Prompter {
    fn compare(&mut self, question: &PairQuestion<'_>) -> Judgement;
}

/// Replays a fixed answer sequence, cycling on exhaustion.
pub struct ScriptedPrompter {
    answers: VecDeque<Judgement>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Judgement>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn compare(&mut self, _question: &PairQuestion<'_>) -> Judgement {
        match self.answers.pop_front() {
            Some(answer) => {
                self.answers.push_back(answer);
                answer
            }
            None => Judgement::Tie,
        }
    }
}

/// Prompts through an input/output stream pair (stdin/stdout by default).
/// The answer is the label of the better object, or an empty line for a tie;
/// anything else is re-asked in place.
pub struct StreamPrompter<R, W> {
    input: R,
    output: W,
}

impl StreamPrompter<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self {
            input: std::io::BufReader::new(std::io::stdin()),
            output: std::io::stdout(),
        }
    }
}

impl<R: BufRead, W: Write> StreamPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn show_question(&mut self, q: &PairQuestion<'_>) -> std::io::Result<()> {
        writeln!(self.output, "=== {} / {} ===", q.number, q.total)?;
        writeln!(self.output, "Evaluate the following characteristic objects:")?;
        for (label, object) in [(q.labels.0, q.objects.0), (q.labels.1, q.objects.1)] {
            let cells: Vec<String> = q
                .criteria_names
                .iter()
                .zip(object.iter())
                .map(|(name, v)| format!("{name}={v}"))
                .collect();
            writeln!(self.output, "  {label}: {}", cells.join(", "))?;
        }
        writeln!(
            self.output,
            "Input \"{}\" or \"{}\" for the better object, empty line for a tie.",
            q.labels.0, q.labels.1
        )?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> Prompter for StreamPrompter<R, W> {
    fn compare(&mut self, question: &PairQuestion<'_>) -> Judgement {
        // An unreadable stream degrades to ties rather than aborting the
        // whole identification with a half-built MEJ.
        if self.show_question(question).is_err() {
            return Judgement::Tie;
        }
        loop {
            let _ = write!(self.output, ">>> ");
            let _ = self.output.flush();
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return Judgement::Tie,
                Ok(_) => {}
            }
            let answer = line.trim();
            if answer == question.labels.0 {
                return Judgement::FirstBetter;
            }
            if answer == question.labels.1 {
                return Judgement::SecondBetter;
            }
            if answer.is_empty() {
                return Judgement::Tie;
            }
            let _ = writeln!(
                self.output,
                "Valid answers: \"{}\", \"{}\" or an empty line.",
                question.labels.0, question.labels.1
            );
        }
    }
}

/// Spreadsheet-style label for the `i`-th (0-based) characteristic object:
/// A, B, …, Z, AA, AB, …
pub fn co_label(i: usize) -> String {
    let mut i = i + 1;
    let mut letters = Vec::new();
    while i > 0 {
        i -= 1;
        letters.push(b'A' + (i % 26) as u8);
        i /= 26;
    }
    letters.reverse();
    letters.into_iter().map(char::from).collect()
}

/// Elicits every upper-triangle pairwise judgement from a prompter. Pairs are
/// visited in increasing diagonal distance, then index, so a repeated run
/// with the same answers reproduces the same MEJ.
pub struct ManualExpert {
    criteria_names: Vec<String>,
    prompter: Box<dyn Prompter + Send>,
}

impl ManualExpert {
    pub fn new(
        criteria_names: Vec<String>,
        prompter: impl Prompter + Send + 'static,
    ) -> Self {
        Self {
            criteria_names,
            prompter: Box::new(prompter),
        }
    }

    fn judge(&mut self, lattice: &DMatrix<f64>) -> Result<Mej, ExpertError> {
        let n = lattice.nrows();
        let total = n * (n - 1) / 2;
        debug!(objects = n, questions = total, "starting manual elicitation");

        let labels: Vec<String> = (0..n).map(co_label).collect();
        let rows: Vec<Vec<f64>> = (0..n).map(|i| lattice_row(lattice, i)).collect();

        let mut values = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            values[(i, i)] = 0.5;
        }

        let mut number = 0;
        for diag in 1..n {
            for i in 0..(n - diag) {
                let j = i + diag;
                number += 1;
                let question = PairQuestion {
                    pair: (i, j),
                    number,
                    total,
                    labels: (&labels[i], &labels[j]),
                    objects: (&rows[i], &rows[j]),
                    criteria_names: &self.criteria_names,
                };
                let v = self.prompter.compare(&question).value();
                values[(i, j)] = v;
                values[(j, i)] = 1.0 - v;
            }
        }
        Ok(Mej::new(values)?)
    }
}

// ---------------------------------------------------------------------
//  Sub-model delegation
// ---------------------------------------------------------------------

/// Scores the lattice through an already-identified COMET model. The shared
/// model is read-only post-identification, so `Arc` is sufficient.
pub struct SubmodelExpert {
    model: Arc<Comet>,
}

impl SubmodelExpert {
    pub fn new(model: Arc<Comet>) -> Self {
        Self { model }
    }

    fn judge(&self, lattice: &DMatrix<f64>) -> Result<Mej, ExpertError> {
        let scores = self
            .model
            .evaluate(lattice)
            .map_err(|e| ExpertError::Submodel(Box::new(e)))?;
        Ok(Mej::from_scores(&scores))
    }
}
