use std::path::PathBuf;

use thiserror::Error;

/// A policy or helper definition that cannot be loaded.
///
/// Raised while building [`crate::policy::Policy`] values and is never
/// retried: the offending definition has to be fixed at the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A required field was absent or empty.
    #[error("policy '{policy}': missing required field '{field}'")]
    MissingField {
        /// Name of the policy (or `<unnamed>` when the name itself is missing).
        policy: String,
        /// Name of the missing field.
        field: &'static str,
    },
    /// Both an expression and a helper were supplied for the same clause.
    #[error("policy '{policy}': '{first}' and '{second}' are mutually exclusive")]
    ConflictingFields {
        /// Name of the policy.
        policy: String,
        /// First conflicting field.
        first: &'static str,
        /// Second conflicting field.
        second: &'static str,
    },
    /// A command name or `pg_policies.cmd` code that is not recognized.
    #[error("unknown policy command '{0}'")]
    UnknownCommand(String),
    /// A `pg_policies.permissive` value other than PERMISSIVE/RESTRICTIVE.
    #[error("unknown policy mode '{0}'")]
    UnknownMode(String),
    /// Two policies share the same `(table, name)` identity.
    #[error("duplicate policy '{name}' on table '{table}'")]
    DuplicatePolicy {
        /// Table the policies are attached to.
        table: String,
        /// Shared policy name.
        name: String,
    },
    /// A helper call string that does not parse.
    #[error("invalid helper call '{input}': {reason}")]
    InvalidHelper {
        /// The helper text as written.
        input: String,
        /// Why parsing failed.
        reason: String,
    },
}

/// A predicate that could not be evaluated against a row.
///
/// The engine treats every variant as "access denied".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationFailure {
    /// The predicate text is not valid SQL.
    #[error("could not parse expression: {0}")]
    Parse(String),
    /// The predicate uses a construct outside the supported subset.
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    /// A column referenced by the predicate is absent from the row.
    #[error("unbound column '{0}'")]
    UnboundColumn(String),
    /// `current_setting` was called for a key the session does not define.
    #[error("unrecognized configuration parameter '{0}'")]
    MissingSetting(String),
    /// Operands have types that cannot be combined by the operator.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// Errors raised while loading a harness scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The scenario is not valid JSON for the expected shape.
    #[error("invalid scenario JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A policy in the scenario is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Errors raised while writing rendered artifacts.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The requested artifact name is unsafe or empty.
    #[error("invalid output name '{name}': {reason}")]
    InvalidName {
        /// Name as supplied.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// A file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Path that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Rendered config could not be serialized.
    #[error("failed to serialize rendered config: {0}")]
    Json(#[from] serde_json::Error),
}
