/// Helper-call rendering (classified predicate → readable call), parsing, and the canonical SQL inverse.
pub mod helper_call;
/// Pattern enum, classified expression/policy types, idiom defaults.
pub mod patterns;
/// Top-level classification: literals, idiom table, AND/OR composition.
pub mod policy_classifier;
/// Individual idiom recognizers, tried in a fixed priority order.
pub mod recognizers;

pub use helper_call::{render, HelperCall};
pub use patterns::{BoolOp, ClassifiedExpression, ClassifiedPolicy, Pattern};
pub use policy_classifier::{classify, classify_policies};
