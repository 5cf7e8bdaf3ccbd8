//! Budget alert evaluation with per-period deduplication

mod evaluator;

pub use evaluator::{AlertEvaluator, EvaluationMode, Transition};
