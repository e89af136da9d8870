//! Policies as written in configuration files.
//!
//! A definition names its predicate either as raw SQL (`expression`) or as a
//! helper call (`helper`, e.g. `tenantId("org_id")`), which is expanded to
//! the helper's canonical SQL.

use serde::{Deserialize, Serialize};

use crate::classifier::helper_call;
use crate::error::ConfigurationError;
use crate::parser::names::is_public_role;
use crate::policy::model::{Policy, PolicyCommand, PolicySet};

/// One policy entry in a config or scenario file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDefinition {
    /// Policy name.
    #[serde(default)]
    pub name: String,
    /// Target table.
    #[serde(default)]
    pub table: String,
    /// Command name (`SELECT`, `insert`, ...) or one-letter code; `ALL` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Roles the policy applies to; `public` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// `false` for a RESTRICTIVE policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissive: Option<bool>,
    /// USING predicate as SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// USING predicate as a helper call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper: Option<String>,
    /// WITH CHECK predicate as SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_check: Option<String>,
    /// WITH CHECK predicate as a helper call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_check_helper: Option<String>,
}

impl PolicyDefinition {
    /// Resolve defaults and helper calls into a [`Policy`].
    pub fn into_policy(self) -> Result<Policy, ConfigurationError> {
        let label = if self.name.trim().is_empty() {
            "<unnamed>".to_string()
        } else {
            self.name.clone()
        };

        let expression = predicate(&label, self.expression, self.helper, ("expression", "helper"))?
            .ok_or_else(|| ConfigurationError::MissingField {
                policy: label.clone(),
                field: "expression",
            })?;
        let with_check = predicate(
            &label,
            self.with_check,
            self.with_check_helper,
            ("with_check", "with_check_helper"),
        )?;

        let command = match self.command {
            Some(command) => command.parse()?,
            None => PolicyCommand::All,
        };

        let mut policy = Policy::new(&self.name, &self.table, command, &expression);
        if let Some(roles) = self.roles {
            if !roles.iter().any(|r| is_public_role(r)) {
                policy = policy.for_roles(roles);
            }
        }
        if let Some(check) = with_check {
            policy = policy.with_check(&check);
        }
        if self.permissive == Some(false) {
            policy = policy.restrictive();
        }
        policy.validate()?;
        Ok(policy)
    }
}

fn predicate(
    policy: &str,
    sql: Option<String>,
    helper: Option<String>,
    fields: (&'static str, &'static str),
) -> Result<Option<String>, ConfigurationError> {
    match (sql, helper) {
        (Some(_), Some(_)) => Err(ConfigurationError::ConflictingFields {
            policy: policy.to_string(),
            first: fields.0,
            second: fields.1,
        }),
        (Some(sql), None) => Ok(Some(sql)),
        (None, Some(helper)) => helper_call::parse(&helper)?
            .to_sql()
            .map(Some)
            .ok_or_else(|| ConfigurationError::InvalidHelper {
                input: helper.clone(),
                reason: "helper has no canonical SQL form".to_string(),
            }),
        (None, None) => Ok(None),
    }
}

/// Build a validated [`PolicySet`] from definitions.
pub fn build_policy_set(
    definitions: impl IntoIterator<Item = PolicyDefinition>,
) -> Result<PolicySet, ConfigurationError> {
    let policies = definitions
        .into_iter()
        .map(PolicyDefinition::into_policy)
        .collect::<Result<Vec<_>, _>>()?;
    PolicySet::new(policies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Policy, ConfigurationError> {
        serde_json::from_str::<PolicyDefinition>(json)
            .unwrap()
            .into_policy()
    }

    #[test]
    fn defaults_apply() {
        let policy = parse(r#"{"name":"p","table":"docs","expression":"true"}"#).unwrap();
        assert_eq!(policy.command, PolicyCommand::All);
        assert!(policy.roles.is_empty());
        assert!(policy.permissive);
        assert_eq!(policy.with_check, None);
    }

    #[test]
    fn helper_expands_to_canonical_sql() {
        let policy = parse(
            r#"{"name":"p","table":"docs","command":"select","roles":["reader"],
                "helper":"tenantId(\"org_id\")","with_check_helper":"noAccess()","permissive":false}"#,
        )
        .unwrap();
        assert_eq!(
            policy.expression,
            "org_id = current_setting('app.tenant_id')::uuid"
        );
        assert_eq!(policy.with_check.as_deref(), Some("false"));
        assert_eq!(policy.command, PolicyCommand::Select);
        assert!(!policy.permissive);
        assert!(policy.applies_to_role("reader"));
        assert!(!policy.applies_to_role("writer"));
    }

    #[test]
    fn public_in_roles_means_everyone() {
        let policy =
            parse(r#"{"name":"p","table":"t","roles":["public","x"],"expression":"true"}"#)
                .unwrap();
        assert!(policy.roles.is_empty());
    }

    #[test]
    fn missing_predicate_is_a_configuration_error() {
        assert_eq!(
            parse(r#"{"name":"p","table":"t"}"#),
            Err(ConfigurationError::MissingField {
                policy: "p".into(),
                field: "expression",
            })
        );
    }

    #[test]
    fn missing_table_is_a_configuration_error() {
        assert!(matches!(
            parse(r#"{"name":"p","expression":"true"}"#),
            Err(ConfigurationError::MissingField { field: "table", .. })
        ));
    }

    #[test]
    fn expression_and_helper_conflict() {
        assert!(matches!(
            parse(r#"{"name":"p","table":"t","expression":"true","helper":"publicAccess()"}"#),
            Err(ConfigurationError::ConflictingFields { first: "expression", .. })
        ));
    }

    #[test]
    fn bad_helper_and_command_are_rejected() {
        assert!(matches!(
            parse(r#"{"name":"p","table":"t","helper":"sometimes()"}"#),
            Err(ConfigurationError::InvalidHelper { .. })
        ));
        assert!(matches!(
            parse(r#"{"name":"p","table":"t","command":"upsert","expression":"true"}"#),
            Err(ConfigurationError::UnknownCommand(_))
        ));
    }

    #[test]
    fn duplicates_are_rejected_by_the_set() {
        let def: PolicyDefinition =
            serde_json::from_str(r#"{"name":"p","table":"t","expression":"true"}"#).unwrap();
        assert!(matches!(
            build_policy_set(vec![def.clone(), def]),
            Err(ConfigurationError::DuplicatePolicy { .. })
        ));
    }
}
