//! Manage `PostgreSQL` Row-Level Security policies as code.
//!
//! Raw predicates from `pg_policies` are classified into a closed set of
//! helper idioms, rendered as readable helper calls and turned back into
//! canonical SQL. A local engine evaluates the same predicates against mock
//! rows with `PostgreSQL`'s permissive/restrictive combination rules, so
//! policy sets can be tested without a database.
#![warn(missing_docs)]

/// Predicate classification into helper idioms, helper-call rendering and parsing.
pub mod classifier;
/// Error types shared across the crate.
pub mod error;
/// Scenario files and the assertion runner.
pub mod harness;
/// Rendered config, deploy SQL and markdown report output.
pub mod output;
/// SQL expression parsing and AST helpers.
pub mod parser;
/// Policy model, config definitions, introspection rows and DDL.
pub mod policy;
/// Local RLS simulation: translator, evaluator and policy engine.
pub mod simulator;
