#![forbid(unsafe_code)]

//! # comet-mcda
//!
//! The COMET (Characteristic Objects METhod) evaluation engine for
//! multi-criteria decision analysis.
//!
//! Instead of scoring alternatives directly, COMET identifies a preference
//! model over a small lattice of *characteristic objects* — every combination
//! of per-criterion landmark values — judged pairwise by an expert function.
//! Once identified, the model assigns any alternative a preference in [0, 1]
//! by multilinear interpolation over the lattice corners that bracket it.
//!
//! ```
//! use comet_mcda::{Comet, CriterionType, ExpertFunction, MethodExpert, Topsis};
//! use nalgebra::DMatrix;
//!
//! let cvalues = vec![vec![0.0, 500.0, 1000.0], vec![1.0, 5.0]];
//! let expert = ExpertFunction::Method(MethodExpert::new(
//!     Topsis,
//!     vec![0.5, 0.5],
//!     vec![CriterionType::Profit, CriterionType::Profit],
//! ));
//! let comet = Comet::new(cvalues, expert).unwrap();
//!
//! let alternatives = DMatrix::from_row_slice(2, 2, &[700.0, 3.0, 100.0, 4.0]);
//! let preferences = comet.evaluate(&alternatives).unwrap();
//! let ranking = comet.rank(&preferences);
//! assert_eq!(preferences.len(), 2);
//! assert_eq!(ranking.len(), 2);
//! ```

pub mod comet;
pub mod expert;
pub mod lattice;
pub mod mej;
pub mod methods;
pub mod structural;
pub mod validation;

pub use comet::{Comet, CometError, DomainPolicy};
pub use expert::{
    co_label, CompromiseExpert, DistanceAggregation, DistanceMetric, EspConfig, EspExpert,
    ExpertError, ExpertFunction, FunctionExpert, Judgement, ManualExpert, MethodExpert,
    PairQuestion, Prompter, ScriptedPrompter, StreamPrompter, SubmodelExpert,
};
pub use lattice::{build_lattice, make_cvalues};
pub use mej::{Mej, MejError};
pub use methods::{rank_preferences, CriterionType, McdaMethod, MethodError, Topsis};
pub use structural::{
    NodeRef, NodeResult, StructuralComet, StructuralError, StructuralResults, Submodel,
};
pub use validation::ValidationError;
