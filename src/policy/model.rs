use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::parser::names::{is_public_role, normalize_identifier, qualified_relation_name};

/// The command a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyCommand {
    /// Policy applies to SELECT queries only.
    Select,
    /// Policy applies to INSERT queries only.
    Insert,
    /// Policy applies to UPDATE queries only.
    Update,
    /// Policy applies to DELETE queries only.
    Delete,
    /// Policy applies to all DML commands.
    All,
}

impl PolicyCommand {
    /// Parse a `pg_policy.polcmd` one-letter code (`r`, `a`, `w`, `d`, `*`).
    pub fn from_pg_code(code: &str) -> Result<Self, ConfigurationError> {
        match code.trim() {
            "r" => Ok(PolicyCommand::Select),
            "a" => Ok(PolicyCommand::Insert),
            "w" => Ok(PolicyCommand::Update),
            "d" => Ok(PolicyCommand::Delete),
            "*" => Ok(PolicyCommand::All),
            other => Err(ConfigurationError::UnknownCommand(other.to_string())),
        }
    }

    /// True when a policy declared for `self` governs the `requested` command.
    pub fn covers(self, requested: PolicyCommand) -> bool {
        self == PolicyCommand::All || self == requested
    }
}

impl fmt::Display for PolicyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyCommand::Select => write!(f, "SELECT"),
            PolicyCommand::Insert => write!(f, "INSERT"),
            PolicyCommand::Update => write!(f, "UPDATE"),
            PolicyCommand::Delete => write!(f, "DELETE"),
            PolicyCommand::All => write!(f, "ALL"),
        }
    }
}

impl FromStr for PolicyCommand {
    type Err = ConfigurationError;

    /// Accepts command names in any casing as well as the one-letter codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SELECT" => Ok(PolicyCommand::Select),
            "INSERT" => Ok(PolicyCommand::Insert),
            "UPDATE" => Ok(PolicyCommand::Update),
            "DELETE" => Ok(PolicyCommand::Delete),
            "ALL" => Ok(PolicyCommand::All),
            _ => PolicyCommand::from_pg_code(&s.trim().to_ascii_lowercase()),
        }
    }
}

/// Policy combination mode in `PostgreSQL` RLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyMode {
    /// OR-combined policy branch.
    Permissive,
    /// AND-combined policy branch.
    Restrictive,
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyMode::Permissive => write!(f, "PERMISSIVE"),
            PolicyMode::Restrictive => write!(f, "RESTRICTIVE"),
        }
    }
}

impl FromStr for PolicyMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PERMISSIVE" => Ok(PolicyMode::Permissive),
            "RESTRICTIVE" => Ok(PolicyMode::Restrictive),
            _ => Err(ConfigurationError::UnknownMode(s.to_string())),
        }
    }
}

/// A row-level security policy attached to one table.
///
/// Identified by `(table, name)`. An empty role set means `PUBLIC`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    /// Policy name as declared in the DDL.
    pub name: String,
    /// Table the policy is attached to (optionally schema-qualified).
    pub table: String,
    /// DML command the policy restricts.
    pub command: PolicyCommand,
    /// Roles in `TO (...)`; `public` matches every session.
    pub roles: BTreeSet<String>,
    /// `false` marks a RESTRICTIVE policy.
    pub permissive: bool,
    /// USING predicate.
    pub expression: String,
    /// WITH CHECK predicate, when it differs from USING.
    pub with_check: Option<String>,
}

impl Policy {
    /// Create a permissive policy for `PUBLIC`.
    pub fn new(name: &str, table: &str, command: PolicyCommand, expression: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            command,
            roles: BTreeSet::new(),
            permissive: true,
            expression: expression.to_string(),
            with_check: None,
        }
    }

    /// Restrict the policy to the given roles.
    #[must_use]
    pub fn for_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Set the WITH CHECK predicate.
    #[must_use]
    pub fn with_check(mut self, expression: &str) -> Self {
        self.with_check = Some(expression.to_string());
        self
    }

    /// Make the policy RESTRICTIVE.
    #[must_use]
    pub fn restrictive(mut self) -> Self {
        self.permissive = false;
        self
    }

    /// Policy mode derived from the `permissive` flag.
    pub fn mode(&self) -> PolicyMode {
        if self.permissive {
            PolicyMode::Permissive
        } else {
            PolicyMode::Restrictive
        }
    }

    /// True when the policy applies to sessions running as `role`.
    pub fn applies_to_role(&self, role: &str) -> bool {
        if self.roles.is_empty() {
            return true;
        }
        let role = normalize_identifier(role);
        self.roles
            .iter()
            .any(|r| is_public_role(r) || normalize_identifier(r) == role)
    }

    /// Normalized `(schema.table, name)` identity; unqualified tables are in `public`.
    pub fn identity(&self) -> (String, String) {
        (
            qualified_relation_name(&self.table),
            normalize_identifier(&self.name),
        )
    }

    /// True when the policy is attached to `table` in the same schema.
    pub fn is_on_table(&self, table: &str) -> bool {
        qualified_relation_name(&self.table) == qualified_relation_name(table)
    }

    /// Predicate checked against new row versions: WITH CHECK, falling back
    /// to USING as PostgreSQL does when no WITH CHECK clause is given.
    pub fn write_predicate(&self) -> &str {
        self.with_check.as_deref().unwrap_or(&self.expression)
    }

    /// Reject policies without a name or table.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::MissingField {
                policy: "<unnamed>".to_string(),
                field: "name",
            });
        }
        if self.table.trim().is_empty() {
            return Err(ConfigurationError::MissingField {
                policy: self.name.clone(),
                field: "table",
            });
        }
        Ok(())
    }
}

/// All policies of one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Validate and collect policies, rejecting duplicate `(table, name)` pairs.
    pub fn new(policies: Vec<Policy>) -> Result<Self, ConfigurationError> {
        let mut seen = BTreeSet::new();
        for policy in &policies {
            policy.validate()?;
            if !seen.insert(policy.identity()) {
                return Err(ConfigurationError::DuplicatePolicy {
                    table: policy.table.clone(),
                    name: policy.name.clone(),
                });
            }
        }
        Ok(Self { policies })
    }

    /// Every policy in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True when the set holds no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Look up a policy by its `(table, name)` identity.
    pub fn get(&self, table: &str, name: &str) -> Option<&Policy> {
        let name = normalize_identifier(name);
        self.policies
            .iter()
            .find(|p| p.is_on_table(table) && normalize_identifier(&p.name) == name)
    }

    /// Policies on `table` governing any of `commands` for sessions running as `role`.
    pub fn applicable<'a>(
        &'a self,
        table: &'a str,
        commands: &'a [PolicyCommand],
        role: &'a str,
    ) -> impl Iterator<Item = &'a Policy> + 'a {
        self.policies.iter().filter(move |p| {
            p.is_on_table(table)
                && commands.iter().any(|c| p.command.covers(*c))
                && p.applies_to_role(role)
        })
    }
}

impl<'a> IntoIterator for &'a PolicySet {
    type Item = &'a Policy;
    type IntoIter = std::slice::Iter<'a, Policy>;

    fn into_iter(self) -> Self::IntoIter {
        self.policies.iter()
    }
}
