use crate::parser::names::{qualified_relation_name, quote_identifier, quote_qualified_name};
use crate::policy::model::{Policy, PolicyCommand, PolicySet};

impl Policy {
    /// `CREATE POLICY` statement for this policy.
    ///
    /// INSERT policies carry only WITH CHECK, SELECT and DELETE only USING;
    /// UPDATE and ALL add WITH CHECK when one is set.
    pub fn create_statement(&self) -> String {
        let mut sql = format!(
            "CREATE POLICY {} ON {}",
            quote_identifier(&self.name),
            quote_qualified_name(&self.table)
        );
        if !self.permissive {
            sql.push_str(" AS RESTRICTIVE");
        }
        sql.push_str(&format!(" FOR {}", self.command));

        let roles: Vec<String> = self.roles.iter().map(|r| quote_identifier(r)).collect();
        if roles.is_empty() {
            sql.push_str(" TO public");
        } else {
            sql.push_str(&format!(" TO {}", roles.join(", ")));
        }

        match self.command {
            PolicyCommand::Insert => {
                sql.push_str(&format!(" WITH CHECK ({})", or_true(self.write_predicate())));
            }
            PolicyCommand::Select | PolicyCommand::Delete => {
                sql.push_str(&format!(" USING ({})", or_true(&self.expression)));
            }
            PolicyCommand::Update | PolicyCommand::All => {
                sql.push_str(&format!(" USING ({})", or_true(&self.expression)));
                if let Some(check) = &self.with_check {
                    sql.push_str(&format!(" WITH CHECK ({})", or_true(check)));
                }
            }
        }
        sql.push(';');
        sql
    }

    /// `DROP POLICY IF EXISTS` statement for this policy.
    pub fn drop_statement(&self) -> String {
        format!(
            "DROP POLICY IF EXISTS {} ON {};",
            quote_identifier(&self.name),
            quote_qualified_name(&self.table)
        )
    }
}

fn or_true(predicate: &str) -> &str {
    let trimmed = predicate.trim();
    if trimmed.is_empty() {
        "true"
    } else {
        trimmed
    }
}

/// `ALTER TABLE … ENABLE ROW LEVEL SECURITY` for `table`.
pub fn enable_rls_statement(table: &str) -> String {
    format!(
        "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
        quote_qualified_name(table)
    )
}

/// Idempotent deploy script: enable RLS once per table, then drop and
/// recreate every policy.
pub fn deploy_script(policies: &PolicySet) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut out = String::new();
    for policy in policies {
        let key = qualified_relation_name(&policy.table);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push_str(&format!("-- {}\n", policy.table));
        out.push_str(&enable_rls_statement(&policy.table));
        out.push('\n');
        for same_table in policies.iter().filter(|p| p.is_on_table(&policy.table)) {
            out.push_str(&same_table.drop_statement());
            out.push('\n');
            out.push_str(&same_table.create_statement());
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
