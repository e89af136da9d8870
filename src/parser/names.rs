/// Return the identifier without surrounding double quotes.
pub fn unquote_identifier(ident: &str) -> &str {
    ident
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(ident)
}

/// Normalize an identifier for case-insensitive matching.
///
/// Trims whitespace, removes surrounding double quotes on a single identifier,
/// and lowercases the result.
pub fn normalize_identifier(ident: &str) -> String {
    unquote_identifier(ident.trim()).to_ascii_lowercase()
}

/// Split a potentially schema-qualified name into `(schema, relation)`.
///
/// Handles dots inside quoted identifiers, e.g. `"my.schema"."table.name"`.
pub fn split_schema_and_relation(name: &str) -> Option<(String, String)> {
    let mut in_quotes = false;
    let mut start = 0usize;
    let mut parts: Vec<&str> = Vec::new();

    for (idx, ch) in name.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => {
                parts.push(name[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(name[start..].trim());

    if parts.len() < 2 {
        return None;
    }

    let schema = unquote_identifier(parts[parts.len() - 2]).to_string();
    let relation = unquote_identifier(parts[parts.len() - 1]).to_string();
    Some((schema, relation))
}

/// Normalize an object name to its terminal relation/function identifier.
///
/// Examples:
/// - `"public.docs"` -> `"docs"`
/// - `"\"pg_catalog\".\"now\""` -> `"now"`
/// - `"CURRENT_DATE"` -> `"current_date"`
pub fn normalize_relation_name(name: &str) -> String {
    if let Some((_, relation)) = split_schema_and_relation(name.trim()) {
        return normalize_identifier(&relation);
    }
    normalize_identifier(name)
}

/// Normalize a table name to `schema.relation`, defaulting the schema to
/// `public`.
///
/// `docs`, `public.docs` and `"Public"."DOCS"` all map to `public.docs`;
/// `billing.docs` stays distinct from them.
pub fn qualified_relation_name(name: &str) -> String {
    match split_schema_and_relation(name.trim()) {
        Some((schema, relation)) => format!(
            "{}.{}",
            normalize_identifier(&schema),
            normalize_identifier(&relation)
        ),
        None => format!("public.{}", normalize_identifier(name)),
    }
}

/// True for the pseudo-role `public`, which every session belongs to.
pub fn is_public_role(role: &str) -> bool {
    normalize_identifier(role) == "public"
}

/// Quote an identifier for DDL output when PostgreSQL would otherwise fold
/// or reject it.
///
/// Lowercase `[a-z_][a-z0-9_$]*` names are emitted as-is; anything else is
/// wrapped in double quotes with embedded quotes doubled.
pub fn quote_identifier(ident: &str) -> String {
    let mut chars = ident.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$');
    if simple {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Quote a possibly schema-qualified table name component by component.
pub fn quote_qualified_name(name: &str) -> String {
    match split_schema_and_relation(name) {
        Some((schema, relation)) => {
            format!("{}.{}", quote_identifier(&schema), quote_identifier(&relation))
        }
        None => quote_identifier(unquote_identifier(name.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_schema_and_relation_handles_quoted_dots() {
        assert_eq!(
            split_schema_and_relation(r#""my.schema"."table.name""#),
            Some(("my.schema".to_string(), "table.name".to_string()))
        );
        assert_eq!(split_schema_and_relation("docs"), None);
    }

    #[test]
    fn normalize_relation_name_handles_schema_quotes_and_case() {
        assert_eq!(normalize_relation_name("pg_catalog.now"), "now");
        assert_eq!(normalize_relation_name(r#""pg_catalog"."now""#), "now");
        assert_eq!(normalize_relation_name("CURRENT_SETTING"), "current_setting");
    }

    #[test]
    fn qualified_relation_name_defaults_to_public_and_keeps_other_schemas() {
        assert_eq!(qualified_relation_name("docs"), "public.docs");
        assert_eq!(qualified_relation_name(r#""Public"."DOCS""#), "public.docs");
        assert_eq!(qualified_relation_name("billing.docs"), "billing.docs");
        assert_ne!(
            qualified_relation_name("app.docs"),
            qualified_relation_name("billing.docs")
        );
    }

    #[test]
    fn public_role_matches_any_casing() {
        assert!(is_public_role("public"));
        assert!(is_public_role("PUBLIC"));
        assert!(is_public_role(" \"public\" "));
        assert!(!is_public_role("authenticated"));
    }

    #[test]
    fn quote_identifier_only_quotes_when_needed() {
        assert_eq!(quote_identifier("user_isolation"), "user_isolation");
        assert_eq!(quote_identifier("UserDocs"), "\"UserDocs\"");
        assert_eq!(quote_identifier("my policy"), "\"my policy\"");
        assert_eq!(quote_identifier("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_qualified_name("app.Docs"), "app.\"Docs\"");
    }
}
