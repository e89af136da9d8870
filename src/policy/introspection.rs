//! Rows of `pg_policies`, as exported by the introspection query layer.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::parser::names::{is_public_role, normalize_identifier, unquote_identifier};
use crate::policy::model::{Policy, PolicyCommand, PolicyMode, PolicySet};

/// The `roles` column: either PostgreSQL's array literal text (`{a,b}`) or
/// an already-decoded JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PgRoles {
    /// `{a,"Some Role"}`
    Literal(String),
    /// `["a", "Some Role"]`
    List(Vec<String>),
}

impl PgRoles {
    /// Role names with quoting removed.
    pub fn names(&self) -> Vec<String> {
        match self {
            PgRoles::Literal(text) => parse_roles(text),
            PgRoles::List(list) => list
                .iter()
                .map(|r| unquote_identifier(r.trim()).to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }
}

/// One `pg_policies` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgPolicyRow {
    /// Schema of the table.
    #[serde(default)]
    pub schemaname: Option<String>,
    /// Table name.
    #[serde(default)]
    pub tablename: Option<String>,
    /// Policy name.
    #[serde(default)]
    pub policyname: Option<String>,
    /// `PERMISSIVE` or `RESTRICTIVE`.
    #[serde(default)]
    pub permissive: Option<String>,
    /// Roles the policy applies to.
    #[serde(default)]
    pub roles: Option<PgRoles>,
    /// Command: one-letter code (`r`, `a`, `w`, `d`, `*`) or name.
    #[serde(default)]
    pub cmd: Option<String>,
    /// USING predicate.
    #[serde(default)]
    pub qual: Option<String>,
    /// WITH CHECK predicate.
    #[serde(default)]
    pub with_check: Option<String>,
}

impl PgPolicyRow {
    /// Convert into a [`Policy`].
    ///
    /// Tables outside `public` are schema-qualified. A missing USING clause
    /// (typical for INSERT policies) becomes an empty predicate.
    pub fn to_policy(&self) -> Result<Policy, ConfigurationError> {
        let name = required(self.policyname.as_deref(), "<unnamed>", "policyname")?;
        let table = required(self.tablename.as_deref(), name, "tablename")?;
        let table = match self.schemaname.as_deref().map(str::trim) {
            Some(schema) if !schema.is_empty() && normalize_identifier(schema) != "public" => {
                format!("{schema}.{table}")
            }
            _ => table.to_string(),
        };

        let command = match self.cmd.as_deref() {
            Some(cmd) => cmd.parse()?,
            None => PolicyCommand::All,
        };
        let mode = match self.permissive.as_deref() {
            Some(mode) => mode.parse()?,
            None => PolicyMode::Permissive,
        };

        let mut policy = Policy::new(name, &table, command, self.qual.as_deref().unwrap_or(""));
        let roles = self.roles.as_ref().map(PgRoles::names).unwrap_or_default();
        if !roles.iter().any(|r| is_public_role(r)) {
            policy = policy.for_roles(roles);
        }
        if let Some(check) = &self.with_check {
            policy = policy.with_check(check);
        }
        if mode == PolicyMode::Restrictive {
            policy = policy.restrictive();
        }
        Ok(policy)
    }
}

fn required<'a>(
    value: Option<&'a str>,
    policy: &str,
    field: &'static str,
) -> Result<&'a str, ConfigurationError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigurationError::MissingField {
            policy: policy.to_string(),
            field,
        })
}

/// Parse a PostgreSQL array literal of role names (`{a,"b c"}`).
pub fn parse_roles(text: &str) -> Vec<String> {
    let inner = text.trim();
    let inner = inner.strip_prefix('{').unwrap_or(inner);
    let inner = inner.strip_suffix('}').unwrap_or(inner);
    inner
        .split(',')
        .map(|r| unquote_identifier(r.trim()).to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Convert introspection rows into a validated [`PolicySet`].
pub fn policies_from_rows(rows: &[PgPolicyRow]) -> Result<PolicySet, ConfigurationError> {
    let policies = rows
        .iter()
        .map(PgPolicyRow::to_policy)
        .collect::<Result<Vec<_>, _>>()?;
    PolicySet::new(policies)
}
