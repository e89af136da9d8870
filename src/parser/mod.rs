/// SQL expression helpers used across classifier and translator code paths.
pub mod expr;
/// Identifier and table-name normalization helpers (schema-qualified names, quoted identifiers).
pub mod names;
/// Thin wrapper around `sqlparser` for standalone predicate parsing.
pub mod sql_parser;
