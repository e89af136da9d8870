use sqlparser::ast::{
    DataType, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Value,
};

use crate::parser::names::normalize_relation_name;

/// Remove any number of redundant parentheses around an expression.
pub fn strip_nesting(expr: &Expr) -> &Expr {
    match expr {
        Expr::Nested(inner) => strip_nesting(inner),
        _ => expr,
    }
}

/// Remove parentheses and type casts (`::uuid`, `::text`, `CAST(… AS …)`).
pub fn strip_casts(expr: &Expr) -> &Expr {
    match expr {
        Expr::Nested(inner) | Expr::Cast { expr: inner, .. } => strip_casts(inner),
        _ => expr,
    }
}

/// Extract a simple column name from an expression.
///
/// Supports plain identifiers (`owner_id`) and qualified identifiers
/// (`public.docs.owner_id`), returning only the terminal column component
/// with its original casing.
pub fn extract_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => Some(parts.last()?.value.clone()),
        Expr::Nested(inner) => extract_column_name(inner),
        Expr::Cast { expr, .. } => extract_column_name(expr),
        _ => None,
    }
}

/// Extract a single-quoted string literal, looking through casts.
pub fn string_literal(expr: &Expr) -> Option<String> {
    match strip_casts(expr) {
        Expr::Value(v) => match &v.value {
            Value::SingleQuotedString(s)
            | Value::EscapedStringLiteral(s)
            | Value::DollarQuotedString(sqlparser::ast::DollarQuotedString { value: s, .. }) => {
                Some(s.clone())
            }
            _ => None,
        },
        _ => None,
    }
}

/// Extract a constant boolean (`TRUE` / `FALSE`), looking through casts.
pub fn constant_bool(expr: &Expr) -> Option<bool> {
    match strip_casts(expr) {
        Expr::Value(v) => match &v.value {
            Value::Boolean(b) => Some(*b),
            _ => None,
        },
        _ => None,
    }
}

/// Extract the expression payload from a SQL function argument.
pub fn function_arg_expr(arg: &FunctionArg) -> Option<&Expr> {
    match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
        | FunctionArg::Named {
            arg: FunctionArgExpr::Expr(expr),
            ..
        }
        | FunctionArg::ExprNamed {
            arg: FunctionArgExpr::Expr(expr),
            ..
        } => Some(expr),
        _ => None,
    }
}

/// Lowercased terminal name of a called function (`pg_catalog.NOW` → `now`).
pub fn normalized_function_name(func: &Function) -> String {
    normalize_relation_name(&func.name.to_string())
}

/// Positional argument expressions of a function call.
///
/// Keyword-style calls without parentheses (`current_date`) yield an empty
/// list. Subquery arguments are not supported and yield `None`.
pub fn function_args(func: &Function) -> Option<Vec<&Expr>> {
    match &func.args {
        FunctionArguments::None => Some(Vec::new()),
        FunctionArguments::List(list) => list.args.iter().map(function_arg_expr).collect(),
        FunctionArguments::Subquery(_) => None,
    }
}

/// Match a function call (through casts and parentheses) and return its
/// normalized name and positional arguments.
pub fn function_call(expr: &Expr) -> Option<(String, Vec<&Expr>)> {
    let Expr::Function(func) = strip_casts(expr) else {
        return None;
    };
    Some((normalized_function_name(func), function_args(func)?))
}

/// Key of a `current_setting('key')` call, looking through casts on both the
/// call and its argument. The optional `missing_ok` argument is ignored here.
pub fn current_setting_key(expr: &Expr) -> Option<String> {
    let (name, args) = function_call(expr)?;
    if name != "current_setting" || args.is_empty() || args.len() > 2 {
        return None;
    }
    string_literal(args[0])
}

/// True when a cast target is PostgreSQL's `interval` type.
pub fn is_interval_type(data_type: &DataType) -> bool {
    data_type
        .to_string()
        .trim()
        .to_ascii_lowercase()
        .starts_with("interval")
}

/// Textual interval specification of an interval literal.
///
/// Accepts `interval '30 days'`, `interval '30' day` and the deparsed form
/// `'30 days'::interval`; returns the spec with the leading field appended
/// when one was given separately (`"30 day"`).
pub fn interval_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Nested(inner) => interval_literal(inner),
        Expr::Interval(interval) => {
            let text = string_literal(&interval.value)?;
            match &interval.leading_field {
                Some(field) => Some(format!("{} {}", text.trim(), field)),
                None => Some(text),
            }
        }
        Expr::Cast {
            expr: inner,
            data_type,
            ..
        } if is_interval_type(data_type) => string_literal(inner),
        _ => None,
    }
}

/// Split an interval spec such as `"30 days"` into `(30, "days")`.
///
/// The unit is lowercased; the amount must be an integer.
pub fn split_interval(spec: &str) -> Option<(i64, String)> {
    let mut parts = spec.split_whitespace();
    let amount = parts.next()?.parse().ok()?;
    let unit = parts.next()?.to_ascii_lowercase();
    if parts.next().is_some() {
        return None;
    }
    Some((amount, unit))
}
