use chrono::{DateTime, Utc};

use crate::error::EvaluationFailure;
use crate::simulator::context::SessionContext;
use crate::simulator::translator::{ArithOp, CompareOp, Evaluable};
use crate::simulator::value::{parse_timestamp_millis, Datum, Row};

/// Everything a predicate may read: one row, the session and the clock.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    /// Row under test.
    pub row: &'a Row,
    /// Active session.
    pub context: &'a SessionContext,
    /// Value of `now()`.
    pub now: DateTime<Utc>,
}

/// Evaluate a lowered predicate to a row decision.
///
/// NULL counts as `false`, as it does for RLS filtering. A non-boolean
/// result is a type mismatch.
pub fn evaluate(predicate: &Evaluable, bindings: &Bindings<'_>) -> Result<bool, EvaluationFailure> {
    match truth(eval(predicate, bindings)?)? {
        Some(b) => Ok(b),
        None => Ok(false),
    }
}

fn eval(e: &Evaluable, b: &Bindings<'_>) -> Result<Datum, EvaluationFailure> {
    match e {
        Evaluable::Literal(d) => Ok(d.clone()),
        Evaluable::Column(name) => column(b.row, name),
        Evaluable::Setting { key, missing_ok } => match b.context.setting(key) {
            Some(v) => Ok(Datum::Text(v.to_string())),
            None if *missing_ok => Ok(Datum::Null),
            None => Err(EvaluationFailure::MissingSetting(key.clone())),
        },
        Evaluable::CurrentRole => Ok(Datum::Text(b.context.role.clone())),
        Evaluable::Now => Ok(Datum::Timestamp(b.now.timestamp_millis())),
        Evaluable::CurrentDate => Ok(Datum::Timestamp(
            b.now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map_or(b.now.timestamp_millis(), |dt| dt.and_utc().timestamp_millis()),
        )),
        Evaluable::Timestamp(inner) => {
            let value = eval(inner, b)?;
            value.to_timestamp().ok_or_else(|| {
                EvaluationFailure::TypeMismatch(format!("cannot read {value} as a timestamp"))
            })
        }
        Evaluable::Compare { left, op, right } => compare(&eval(left, b)?, *op, &eval(right, b)?),
        Evaluable::Arith { left, op, right } => arith(&eval(left, b)?, *op, &eval(right, b)?),
        Evaluable::And(l, r) => {
            let left = truth(eval(l, b)?)?;
            if left == Some(false) {
                return Ok(Datum::Bool(false));
            }
            Ok(match (left, truth(eval(r, b)?)?) {
                (_, Some(false)) => Datum::Bool(false),
                (Some(true), Some(true)) => Datum::Bool(true),
                _ => Datum::Null,
            })
        }
        Evaluable::Or(l, r) => {
            let left = truth(eval(l, b)?)?;
            if left == Some(true) {
                return Ok(Datum::Bool(true));
            }
            Ok(match (left, truth(eval(r, b)?)?) {
                (_, Some(true)) => Datum::Bool(true),
                (Some(false), Some(false)) => Datum::Bool(false),
                _ => Datum::Null,
            })
        }
        Evaluable::Not(inner) => Ok(truth(eval(inner, b)?)?.map_or(Datum::Null, |v| Datum::Bool(!v))),
        Evaluable::IsNull { expr, negated } => {
            let is_null = eval(expr, b)? == Datum::Null;
            Ok(Datum::Bool(is_null != *negated))
        }
        Evaluable::InList {
            expr,
            list,
            negated,
        } => {
            let needle = eval(expr, b)?;
            if needle == Datum::Null {
                return Ok(Datum::Null);
            }
            let mut saw_null = false;
            for candidate in list {
                match compare(&needle, CompareOp::Eq, &eval(candidate, b)?)? {
                    Datum::Bool(true) => return Ok(Datum::Bool(!*negated)),
                    Datum::Null => saw_null = true,
                    _ => {}
                }
            }
            Ok(if saw_null {
                Datum::Null
            } else {
                Datum::Bool(*negated)
            })
        }
    }
}

fn column(row: &Row, name: &str) -> Result<Datum, EvaluationFailure> {
    row.get(name)
        .or_else(|| {
            row.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(Datum::from)
        .ok_or_else(|| EvaluationFailure::UnboundColumn(name.to_string()))
}

fn truth(value: Datum) -> Result<Option<bool>, EvaluationFailure> {
    match value {
        Datum::Bool(b) => Ok(Some(b)),
        Datum::Null => Ok(None),
        Datum::Text(ref t) => parse_bool(t).map(Some).ok_or_else(|| not_boolean(&value)),
        other => Err(not_boolean(&other)),
    }
}

fn not_boolean(value: &Datum) -> EvaluationFailure {
    EvaluationFailure::TypeMismatch(format!(
        "expected boolean, found {} {value}",
        value.type_name()
    ))
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn compare(left: &Datum, op: CompareOp, right: &Datum) -> Result<Datum, EvaluationFailure> {
    let ordering = match (left, right) {
        (Datum::Null, _) | (_, Datum::Null) => return Ok(Datum::Null),
        (Datum::Number(a), Datum::Number(b)) => a.partial_cmp(b),
        (Datum::Text(a), Datum::Text(b)) => Some(a.cmp(b)),
        (Datum::Bool(a), Datum::Bool(b)) => Some(a.cmp(b)),
        (Datum::Timestamp(a), Datum::Timestamp(b)) | (Datum::Interval(a), Datum::Interval(b)) => {
            Some(a.cmp(b))
        }
        (Datum::Number(a), Datum::Text(t)) => t.trim().parse::<f64>().ok().and_then(|b| a.partial_cmp(&b)),
        (Datum::Text(t), Datum::Number(b)) => t.trim().parse::<f64>().ok().and_then(|a| a.partial_cmp(b)),
        (Datum::Bool(a), Datum::Text(t)) => parse_bool(t).map(|b| a.cmp(&b)),
        (Datum::Text(t), Datum::Bool(b)) => parse_bool(t).map(|a| a.cmp(b)),
        (Datum::Timestamp(a), Datum::Text(t)) => parse_timestamp_millis(t).map(|b| a.cmp(&b)),
        (Datum::Text(t), Datum::Timestamp(b)) => parse_timestamp_millis(t).map(|a| a.cmp(b)),
        _ => None,
    };
    let ordering = ordering.ok_or_else(|| {
        EvaluationFailure::TypeMismatch(format!(
            "cannot compare {} {left} {op} {} {right}",
            left.type_name(),
            right.type_name()
        ))
    })?;
    Ok(Datum::Bool(op.holds(ordering)))
}

fn arith(left: &Datum, op: ArithOp, right: &Datum) -> Result<Datum, EvaluationFailure> {
    let apply = |a: i64, b: i64| match op {
        ArithOp::Add => a.saturating_add(b),
        ArithOp::Sub => a.saturating_sub(b),
    };
    Ok(match (left, right) {
        (Datum::Null, _) | (_, Datum::Null) => Datum::Null,
        (Datum::Timestamp(t), Datum::Interval(i)) => Datum::Timestamp(apply(*t, *i)),
        (Datum::Interval(i), Datum::Timestamp(t)) if op == ArithOp::Add => {
            Datum::Timestamp(t.saturating_add(*i))
        }
        (Datum::Interval(a), Datum::Interval(b)) => Datum::Interval(apply(*a, *b)),
        (Datum::Timestamp(a), Datum::Timestamp(b)) if op == ArithOp::Sub => {
            Datum::Interval(a.saturating_sub(*b))
        }
        (Datum::Number(a), Datum::Number(b)) => Datum::Number(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
        }),
        (Datum::Text(_), Datum::Interval(_)) => match left.to_timestamp() {
            Some(ts) => return arith(&ts, op, right),
            None => return Err(arith_mismatch(left, op, right)),
        },
        _ => return Err(arith_mismatch(left, op, right)),
    })
}

fn arith_mismatch(left: &Datum, op: ArithOp, right: &Datum) -> EvaluationFailure {
    EvaluationFailure::TypeMismatch(format!(
        "cannot compute {} {op} {}",
        left.type_name(),
        right.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::translator::to_evaluable;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn check(sql: &str, r: &Row, ctx: &SessionContext) -> Result<bool, EvaluationFailure> {
        let predicate = to_evaluable(sql)?;
        evaluate(
            &predicate,
            &Bindings {
                row: r,
                context: ctx,
                now: fixed_now(),
            },
        )
    }

    #[test]
    fn user_equality_against_setting() {
        let ctx = SessionContext::new("u1", "authenticated_user");
        let sql = "user_id = current_setting('app.current_user_id')::uuid";
        assert!(check(sql, &row(json!({"user_id": "u1"})), &ctx).unwrap());
        assert!(!check(sql, &row(json!({"user_id": "u2"})), &ctx).unwrap());
    }

    #[test]
    fn column_lookup_falls_back_to_case_insensitive() {
        let ctx = SessionContext::new("u1", "r");
        assert!(check("Owner = 'a'", &row(json!({"owner": "a"})), &ctx).unwrap());
    }

    #[test]
    fn missing_column_and_setting_are_errors() {
        let ctx = SessionContext::new("u1", "r");
        assert_eq!(
            check("tenant_id = 't'", &row(json!({})), &ctx),
            Err(EvaluationFailure::UnboundColumn("tenant_id".into()))
        );
        assert_eq!(
            check("tenant_id = current_setting('app.tenant_id')", &row(json!({"tenant_id": "t"})), &ctx),
            Err(EvaluationFailure::MissingSetting("app.tenant_id".into()))
        );
        assert_eq!(
            check(
                "tenant_id = current_setting('app.tenant_id', true)",
                &row(json!({"tenant_id": "t"})),
                &ctx
            ),
            Ok(false)
        );
    }

    #[test]
    fn recent_data_window() {
        let ctx = SessionContext::default();
        let sql = "created_at >= current_date - interval '30 days'";
        assert!(check(sql, &row(json!({"created_at": "2024-06-01"})), &ctx).unwrap());
        assert!(check(sql, &row(json!({"created_at": "2024-05-16T00:00:00Z"})), &ctx).unwrap());
        assert!(!check(sql, &row(json!({"created_at": "2024-05-15T23:59:59Z"})), &ctx).unwrap());
    }

    #[test]
    fn time_window_uses_the_clock() {
        let ctx = SessionContext::default();
        let sql = "seen_at >= now() - interval '2 hours'";
        assert!(check(sql, &row(json!({"seen_at": "2024-06-15 10:00:00"})), &ctx).unwrap());
        assert!(!check(sql, &row(json!({"seen_at": "2024-06-15 09:59:59"})), &ctx).unwrap());
    }

    #[test]
    fn three_valued_logic() {
        let ctx = SessionContext::default();
        let r = row(json!({"a": null, "b": true, "c": false}));
        assert!(!check("a = 1", &r, &ctx).unwrap());
        assert!(!check("NOT (a = 1)", &r, &ctx).unwrap());
        assert!(check("a = 1 OR b", &r, &ctx).unwrap());
        assert!(!check("a = 1 AND b", &r, &ctx).unwrap());
        assert!(check("NOT (a = 1 AND c)", &r, &ctx).unwrap());
        assert!(check("a IS NULL AND b IS NOT NULL", &r, &ctx).unwrap());
    }

    #[test]
    fn short_circuit_skips_failing_operand() {
        let ctx = SessionContext::default();
        let r = row(json!({"flag": false}));
        assert_eq!(check("flag AND missing = 1", &r, &ctx), Ok(false));
        assert!(check("NOT flag OR missing = 1", &r, &ctx).unwrap());
        assert!(check("missing = 1 OR NOT flag", &r, &ctx).is_err());
    }

    #[test]
    fn in_list_semantics() {
        let ctx = SessionContext::new("u", "editor");
        let r = row(json!({"level": 2, "status": "open"}));
        assert!(check("level IN (1, 2)", &r, &ctx).unwrap());
        assert!(check("status NOT IN ('closed', 'archived')", &r, &ctx).unwrap());
        assert!(!check("level NOT IN (1, NULL)", &r, &ctx).unwrap());
        assert!(check("current_user IN ('admin', 'editor')", &r, &ctx).unwrap());
    }

    #[test]
    fn numbers_compare_with_numeric_text() {
        let ctx = SessionContext::new("7", "r");
        let r = row(json!({"id": 7}));
        assert!(check("id = current_setting('app.current_user_id')::int", &r, &ctx).unwrap());
        assert!(check("id + 1 > 7", &r, &ctx).unwrap());
    }

    #[test]
    fn mismatched_types_fail() {
        let ctx = SessionContext::default();
        let r = row(json!({"id": 7, "name": "x"}));
        assert!(matches!(
            check("id = name", &r, &ctx),
            Err(EvaluationFailure::TypeMismatch(_))
        ));
        assert!(matches!(check("name", &r, &ctx), Err(EvaluationFailure::TypeMismatch(_))));
    }
}
