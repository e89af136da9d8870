use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigurationError, EvaluationFailure};
use crate::parser::names::qualified_relation_name;
use crate::policy::{Policy, PolicyCommand, PolicyMode, PolicySet};
use crate::simulator::context::SessionContext;
use crate::simulator::evaluator::{evaluate, Bindings};
use crate::simulator::translator::{to_evaluable, Evaluable};
use crate::simulator::value::Row;

/// How RESTRICTIVE policies take part in a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictiveMode {
    /// PostgreSQL semantics: every applicable restrictive policy must pass
    /// in addition to at least one permissive policy.
    #[default]
    Enforce,
    /// Restrictive predicates are skipped; only the permissive OR decides.
    Ignore,
}

impl fmt::Display for RestrictiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestrictiveMode::Enforce => "enforce",
            RestrictiveMode::Ignore => "ignore",
        })
    }
}

impl FromStr for RestrictiveMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(RestrictiveMode::Enforce),
            "ignore" => Ok(RestrictiveMode::Ignore),
            other => Err(ConfigurationError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Clause {
    Using,
    WithCheck,
}

#[derive(Debug, Clone)]
struct CompiledPolicy {
    using: Result<Evaluable, EvaluationFailure>,
    with_check: Result<Evaluable, EvaluationFailure>,
}

impl CompiledPolicy {
    fn compile(policy: &Policy) -> Self {
        Self {
            using: to_evaluable(&policy.expression),
            with_check: to_evaluable(policy.write_predicate()),
        }
    }

    fn clause(&self, clause: Clause) -> &Result<Evaluable, EvaluationFailure> {
        match clause {
            Clause::Using => &self.using,
            Clause::WithCheck => &self.with_check,
        }
    }
}

/// In-memory RLS simulator over mock tables.
///
/// Each decision is a function of the data, the policies, the active
/// [`SessionContext`] and the clock at the moment of the call. Predicates are
/// translated once, when the engine is built.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    data: BTreeMap<String, Vec<Row>>,
    policies: PolicySet,
    compiled: BTreeMap<(String, String), CompiledPolicy>,
    context: SessionContext,
    clock: Option<DateTime<Utc>>,
    restrictive: RestrictiveMode,
}

impl PolicyEngine {
    /// Create an engine with no tables and an empty session.
    pub fn new(policies: PolicySet) -> Self {
        let compiled = policies
            .iter()
            .map(|p| (p.identity(), CompiledPolicy::compile(p)))
            .collect();
        Self {
            data: BTreeMap::new(),
            policies,
            compiled,
            context: SessionContext::default(),
            clock: None,
            restrictive: RestrictiveMode::default(),
        }
    }

    /// Add or replace a mock table.
    #[must_use]
    pub fn with_table(mut self, table: &str, rows: Vec<Row>) -> Self {
        self.data.insert(qualified_relation_name(table), rows);
        self
    }

    /// Pin `now()` and `current_date` to a fixed instant.
    #[must_use]
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    /// Choose how restrictive policies are combined.
    #[must_use]
    pub fn with_restrictive_mode(mut self, mode: RestrictiveMode) -> Self {
        self.restrictive = mode;
        self
    }

    /// Replace the active session.
    pub fn set_context(&mut self, context: SessionContext) {
        self.context = context;
    }

    /// The active session.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The policies the engine enforces.
    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    /// Rows of `table` visible to the active session.
    ///
    /// Unknown tables yield no rows.
    pub fn select(&self, table: &str) -> Vec<Row> {
        let Some(rows) = self.data.get(&qualified_relation_name(table)) else {
            return Vec::new();
        };
        rows.iter()
            .filter(|row| self.decide(table, &[PolicyCommand::Select], row, Clause::Using))
            .cloned()
            .collect()
    }

    /// Whether the active session may insert or update `row` in `table`.
    pub fn can_write(&self, table: &str, row: &Row) -> bool {
        self.decide(
            table,
            &[PolicyCommand::Insert, PolicyCommand::Update],
            row,
            Clause::WithCheck,
        )
    }

    /// Whether the active session may delete `row` from `table`.
    pub fn can_delete(&self, table: &str, row: &Row) -> bool {
        self.decide(table, &[PolicyCommand::Delete], row, Clause::Using)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn decide(&self, table: &str, commands: &[PolicyCommand], row: &Row, clause: Clause) -> bool {
        let mut applicable = self
            .policies
            .applicable(table, commands, &self.context.role)
            .peekable();
        if applicable.peek().is_none() {
            debug!(table, role = %self.context.role, "no applicable policy, RLS unenforced");
            return true;
        }

        let bindings = Bindings {
            row,
            context: &self.context,
            now: self.now(),
        };
        let mut permitted = false;
        for policy in applicable {
            match policy.mode() {
                PolicyMode::Permissive => {
                    if !permitted && self.passes(policy, clause, &bindings) {
                        permitted = true;
                    }
                }
                PolicyMode::Restrictive => {
                    if self.restrictive == RestrictiveMode::Enforce
                        && !self.passes(policy, clause, &bindings)
                    {
                        return false;
                    }
                }
            }
        }
        permitted
    }

    fn passes(&self, policy: &Policy, clause: Clause, bindings: &Bindings<'_>) -> bool {
        let result = match self.compiled.get(&policy.identity()) {
            Some(compiled) => compiled
                .clause(clause)
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|predicate| evaluate(predicate, bindings)),
            None => Err(EvaluationFailure::Unsupported(format!(
                "policy '{}' was never compiled",
                policy.name
            ))),
        };
        match result {
            Ok(allowed) => allowed,
            Err(error) => {
                warn!(
                    policy = %policy.name,
                    table = %policy.table,
                    %error,
                    "policy predicate failed to evaluate, denying"
                );
                false
            }
        }
    }
}
