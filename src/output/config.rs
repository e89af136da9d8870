use crate::classifier::{render, ClassifiedPolicy};
use crate::policy::PolicyDefinition;

/// Policy definitions that use the rendered helper call in place of the
/// extracted SQL.
///
/// The result loads back through [`PolicyDefinition::into_policy`]: helpers
/// expand to their canonical SQL and raw-SQL helpers pass through.
pub fn rendered_definitions(policies: &[ClassifiedPolicy]) -> Vec<PolicyDefinition> {
    policies
        .iter()
        .map(|cp| {
            let policy = &cp.policy;
            let roles = if policy.roles.is_empty() {
                vec!["public".to_string()]
            } else {
                policy.roles.iter().cloned().collect()
            };
            PolicyDefinition {
                name: policy.name.clone(),
                table: policy.table.clone(),
                command: Some(policy.command.to_string()),
                roles: Some(roles),
                permissive: Some(policy.permissive),
                expression: None,
                helper: Some(render(&cp.using_classification)),
                with_check: None,
                with_check_helper: cp.with_check_classification.as_ref().map(render),
            }
        })
        .collect()
}
