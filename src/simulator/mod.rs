//! Local RLS simulation: predicates are lowered into a small typed form and
//! evaluated against mock rows, without a database.

/// Session identity and settings.
pub mod context;
/// PolicyEngine: permissive/restrictive combination over mock tables.
pub mod engine;
/// Evaluation of lowered predicates with three-valued logic.
pub mod evaluator;
/// SQL predicate → [`translator::Evaluable`] lowering.
pub mod translator;
/// Runtime values and row type.
pub mod value;

pub use context::SessionContext;
pub use engine::{PolicyEngine, RestrictiveMode};
pub use translator::{to_evaluable, Evaluable};
pub use value::{Datum, Row};
