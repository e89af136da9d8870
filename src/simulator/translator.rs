use std::fmt;

use sqlparser::ast::{BinaryOperator, DataType, Expr, Function, UnaryOperator, Value};
use tracing::debug;

use crate::error::EvaluationFailure;
use crate::parser::expr::{
    constant_bool, function_args, interval_literal, is_interval_type, normalized_function_name,
    split_interval, string_literal,
};
use crate::parser::sql_parser::parse_expression;
use crate::simulator::value::Datum;

const MILLIS_PER_MINUTE: i64 = 60_000;
const MILLIS_PER_HOUR: i64 = 3_600_000;
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Comparison operators supported by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>` / `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    fn from_sql(op: &BinaryOperator) -> Option<Self> {
        Some(match op {
            BinaryOperator::Eq => CompareOp::Eq,
            BinaryOperator::NotEq => CompareOp::NotEq,
            BinaryOperator::Lt => CompareOp::Lt,
            BinaryOperator::LtEq => CompareOp::LtEq,
            BinaryOperator::Gt => CompareOp::Gt,
            BinaryOperator::GtEq => CompareOp::GtEq,
            _ => return None,
        })
    }

    /// Whether `left.cmp(right) == ordering` satisfies this operator.
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::NotEq => ordering != Equal,
            CompareOp::Lt => ordering == Less,
            CompareOp::LtEq => ordering != Greater,
            CompareOp::Gt => ordering == Greater,
            CompareOp::GtEq => ordering != Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        })
    }
}

/// `+` or `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
        })
    }
}

/// A predicate lowered into the closed set of operations the evaluator
/// understands.
///
/// Built once per policy; holds no references to the SQL AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluable {
    /// Constant value.
    Literal(Datum),
    /// Row field lookup.
    Column(String),
    /// Session setting lookup (`current_setting`).
    Setting {
        /// Setting key, e.g. `app.current_user_id`.
        key: String,
        /// Yield NULL instead of failing when the key is unset.
        missing_ok: bool,
    },
    /// `current_user` / `session_user`: the session's role.
    CurrentRole,
    /// `now()` and friends.
    Now,
    /// `current_date`: midnight UTC of the clock's day.
    CurrentDate,
    /// Coerce the operand to a timestamp.
    Timestamp(Box<Evaluable>),
    /// Binary comparison.
    Compare {
        /// Left operand.
        left: Box<Evaluable>,
        /// Operator.
        op: CompareOp,
        /// Right operand.
        right: Box<Evaluable>,
    },
    /// Numeric or timestamp/interval arithmetic.
    Arith {
        /// Left operand.
        left: Box<Evaluable>,
        /// Operator.
        op: ArithOp,
        /// Right operand.
        right: Box<Evaluable>,
    },
    /// Three-valued conjunction.
    And(Box<Evaluable>, Box<Evaluable>),
    /// Three-valued disjunction.
    Or(Box<Evaluable>, Box<Evaluable>),
    /// Three-valued negation.
    Not(Box<Evaluable>),
    /// `IS [NOT] NULL`.
    IsNull {
        /// Operand.
        expr: Box<Evaluable>,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
    /// `[NOT] IN (...)`.
    InList {
        /// Value looked up in the list.
        expr: Box<Evaluable>,
        /// Candidate values.
        list: Vec<Evaluable>,
        /// `NOT IN` when set.
        negated: bool,
    },
}

impl Evaluable {
    fn is_temporal(&self) -> bool {
        match self {
            Evaluable::Now | Evaluable::CurrentDate | Evaluable::Timestamp(_) => true,
            Evaluable::Arith { left, right, .. } => {
                left.is_temporal()
                    || right.is_temporal()
                    || matches!(**left, Evaluable::Literal(Datum::Interval(_)))
                    || matches!(**right, Evaluable::Literal(Datum::Interval(_)))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Evaluable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluable::Literal(d) => write!(f, "{d}"),
            Evaluable::Column(c) => write!(f, "row.{c}"),
            Evaluable::Setting { key, missing_ok } => {
                if *missing_ok {
                    write!(f, "setting('{key}', missing_ok)")
                } else {
                    write!(f, "setting('{key}')")
                }
            }
            Evaluable::CurrentRole => write!(f, "current_role()"),
            Evaluable::Now => write!(f, "now()"),
            Evaluable::CurrentDate => write!(f, "current_date()"),
            Evaluable::Timestamp(inner) => write!(f, "timestamp({inner})"),
            Evaluable::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            Evaluable::Arith { left, op, right } => write!(f, "({left} {op} {right})"),
            Evaluable::And(l, r) => write!(f, "({l} AND {r})"),
            Evaluable::Or(l, r) => write!(f, "({l} OR {r})"),
            Evaluable::Not(inner) => write!(f, "NOT ({inner})"),
            Evaluable::IsNull { expr, negated } => {
                let not = if *negated { " NOT" } else { "" };
                write!(f, "{expr} IS{not} NULL")
            }
            Evaluable::InList {
                expr,
                list,
                negated,
            } => {
                let not = if *negated { " NOT" } else { "" };
                let items: Vec<String> = list.iter().map(ToString::to_string).collect();
                write!(f, "{expr}{not} IN ({})", items.join(", "))
            }
        }
    }
}

/// Translate a raw SQL predicate into its evaluable form.
///
/// Lowering rules, each applied wherever its construct appears:
/// 1. Type casts are dropped; `'N unit'::interval` becomes an interval
///    literal and date/timestamp casts become timestamp coercions.
/// 2. `current_setting('key'[, missing_ok])` becomes a session setting lookup.
/// 3. Interval literals become milliseconds (`day`, `hour`, `minute`; other
///    units count as zero), so `now() - interval '2 hours'` is plain
///    timestamp arithmetic.
/// 4. A comparison with a temporal side coerces the other side to a
///    timestamp.
/// 5. Enclosing parentheses are dropped.
///
/// An empty predicate is `true`.
pub fn to_evaluable(expression: &str) -> Result<Evaluable, EvaluationFailure> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Ok(Evaluable::Literal(Datum::Bool(true)));
    }
    let expr = parse_expression(trimmed).map_err(EvaluationFailure::Parse)?;
    lower(&expr)
}

/// Lower an already-parsed predicate.
pub fn lower(expr: &Expr) -> Result<Evaluable, EvaluationFailure> {
    match expr {
        Expr::Nested(inner) => lower(inner),
        Expr::Cast {
            expr: inner,
            data_type,
            ..
        } => lower_cast(expr, inner, data_type),
        Expr::Interval(_) => interval(expr),
        Expr::Identifier(ident) => Ok(Evaluable::Column(ident.value.clone())),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|p| Evaluable::Column(p.value.clone()))
            .ok_or_else(|| unsupported(expr)),
        Expr::Value(v) => literal(&v.value)
            .map(Evaluable::Literal)
            .ok_or_else(|| unsupported(expr)),
        Expr::Function(func) => lower_function(func, expr),
        Expr::BinaryOp { left, op, right } => lower_binary(left, op, right),
        Expr::UnaryOp { op, expr: inner } => match op {
            UnaryOperator::Not => Ok(Evaluable::Not(Box::new(lower(inner)?))),
            UnaryOperator::Plus => lower(inner),
            UnaryOperator::Minus => Ok(match lower(inner)? {
                Evaluable::Literal(Datum::Number(n)) => Evaluable::Literal(Datum::Number(-n)),
                other => Evaluable::Arith {
                    left: Box::new(Evaluable::Literal(Datum::Number(0.0))),
                    op: ArithOp::Sub,
                    right: Box::new(other),
                },
            }),
            _ => Err(unsupported(expr)),
        },
        Expr::IsNull(inner) => Ok(Evaluable::IsNull {
            expr: Box::new(lower(inner)?),
            negated: false,
        }),
        Expr::IsNotNull(inner) => Ok(Evaluable::IsNull {
            expr: Box::new(lower(inner)?),
            negated: true,
        }),
        Expr::InList {
            expr: inner,
            list,
            negated,
        } => Ok(Evaluable::InList {
            expr: Box::new(lower(inner)?),
            list: list.iter().map(lower).collect::<Result<_, _>>()?,
            negated: *negated,
        }),
        _ => Err(unsupported(expr)),
    }
}

fn lower_cast(whole: &Expr, inner: &Expr, data_type: &DataType) -> Result<Evaluable, EvaluationFailure> {
    if is_interval_type(data_type) {
        return interval(whole);
    }
    let target = data_type.to_string().to_ascii_lowercase();
    if target.starts_with("timestamp") || target == "date" {
        return Ok(Evaluable::Timestamp(Box::new(lower(inner)?)));
    }
    lower(inner)
}

fn lower_function(func: &Function, expr: &Expr) -> Result<Evaluable, EvaluationFailure> {
    let name = normalized_function_name(func);
    let args = function_args(func).ok_or_else(|| unsupported(expr))?;
    match (name.as_str(), args.as_slice()) {
        ("current_setting", [key]) => setting(key, None),
        ("current_setting", [key, missing_ok]) => setting(key, Some(missing_ok)),
        (
            "now" | "current_timestamp" | "localtimestamp" | "transaction_timestamp"
            | "statement_timestamp",
            [],
        ) => Ok(Evaluable::Now),
        ("current_date", []) => Ok(Evaluable::CurrentDate),
        ("current_user" | "session_user" | "user" | "current_role", []) => {
            Ok(Evaluable::CurrentRole)
        }
        _ => Err(EvaluationFailure::Unsupported(format!(
            "function {name}() with {} argument(s)",
            args.len()
        ))),
    }
}

fn setting(key: &Expr, missing_ok: Option<&Expr>) -> Result<Evaluable, EvaluationFailure> {
    let key = string_literal(key).ok_or_else(|| {
        EvaluationFailure::Unsupported(format!("current_setting with non-literal key {key}"))
    })?;
    let missing_ok = match missing_ok {
        Some(arg) => constant_bool(arg).ok_or_else(|| {
            EvaluationFailure::Unsupported(format!("current_setting missing_ok argument {arg}"))
        })?,
        None => false,
    };
    Ok(Evaluable::Setting { key, missing_ok })
}

fn lower_binary(left: &Expr, op: &BinaryOperator, right: &Expr) -> Result<Evaluable, EvaluationFailure> {
    let l = Box::new(lower(left)?);
    let r = Box::new(lower(right)?);
    if let Some(op) = CompareOp::from_sql(op) {
        let (left, right) = coerce_temporal(l, r);
        return Ok(Evaluable::Compare { left, op, right });
    }
    match op {
        BinaryOperator::And => Ok(Evaluable::And(l, r)),
        BinaryOperator::Or => Ok(Evaluable::Or(l, r)),
        BinaryOperator::Plus => Ok(Evaluable::Arith {
            left: l,
            op: ArithOp::Add,
            right: r,
        }),
        BinaryOperator::Minus => Ok(Evaluable::Arith {
            left: l,
            op: ArithOp::Sub,
            right: r,
        }),
        other => Err(EvaluationFailure::Unsupported(format!("operator {other}"))),
    }
}

fn coerce_temporal(
    left: Box<Evaluable>,
    right: Box<Evaluable>,
) -> (Box<Evaluable>, Box<Evaluable>) {
    match (left.is_temporal(), right.is_temporal()) {
        (true, false) => (left, Box::new(Evaluable::Timestamp(right))),
        (false, true) => (Box::new(Evaluable::Timestamp(left)), right),
        _ => (left, right),
    }
}

fn interval(expr: &Expr) -> Result<Evaluable, EvaluationFailure> {
    let spec = interval_literal(expr).ok_or_else(|| unsupported(expr))?;
    Ok(Evaluable::Literal(Datum::Interval(interval_millis(&spec)?)))
}

/// Milliseconds in an interval spec such as `"30 days"`.
///
/// Units other than minutes, hours and days count as zero.
pub fn interval_millis(spec: &str) -> Result<i64, EvaluationFailure> {
    let (amount, unit) = split_interval(spec)
        .ok_or_else(|| EvaluationFailure::Unsupported(format!("interval '{spec}'")))?;
    let unit_millis = match unit.as_str() {
        "day" | "days" => MILLIS_PER_DAY,
        "hour" | "hours" => MILLIS_PER_HOUR,
        "minute" | "minutes" => MILLIS_PER_MINUTE,
        other => {
            debug!(unit = other, "interval unit not supported, treating as zero");
            0
        }
    };
    Ok(amount.saturating_mul(unit_millis))
}

fn literal(value: &Value) -> Option<Datum> {
    match value {
        Value::Boolean(b) => Some(Datum::Bool(*b)),
        Value::Null => Some(Datum::Null),
        Value::Number(n, _) => n.to_string().parse().ok().map(Datum::Number),
        Value::SingleQuotedString(s) | Value::EscapedStringLiteral(s) => Some(Datum::Text(s.clone())),
        Value::DollarQuotedString(d) => Some(Datum::Text(d.value.clone())),
        _ => None,
    }
}

fn unsupported(expr: &Expr) -> EvaluationFailure {
    EvaluationFailure::Unsupported(expr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Box<Evaluable> {
        Box::new(Evaluable::Column(name.to_string()))
    }

    #[test]
    fn empty_predicate_is_true() {
        assert_eq!(to_evaluable("  ").unwrap(), Evaluable::Literal(Datum::Bool(true)));
    }

    #[test]
    fn casts_are_stripped_and_settings_rewritten() {
        let e = to_evaluable("(user_id::text = current_setting('app.current_user_id')::uuid)")
            .unwrap();
        assert_eq!(
            e,
            Evaluable::Compare {
                left: col("user_id"),
                op: CompareOp::Eq,
                right: Box::new(Evaluable::Setting {
                    key: "app.current_user_id".into(),
                    missing_ok: false,
                }),
            }
        );
    }

    #[test]
    fn missing_ok_flag_is_read() {
        let e = to_evaluable("current_setting('app.tenant_id', true) IS NULL").unwrap();
        let Evaluable::IsNull { expr, negated } = e else {
            panic!("expected IS NULL");
        };
        assert!(!negated);
        assert_eq!(
            *expr,
            Evaluable::Setting {
                key: "app.tenant_id".into(),
                missing_ok: true,
            }
        );
    }

    #[test]
    fn interval_arithmetic_becomes_timestamp_math() {
        let e = to_evaluable("created_at >= current_date - interval '30 days'").unwrap();
        assert_eq!(
            e,
            Evaluable::Compare {
                left: Box::new(Evaluable::Timestamp(col("created_at"))),
                op: CompareOp::GtEq,
                right: Box::new(Evaluable::Arith {
                    left: Box::new(Evaluable::CurrentDate),
                    op: ArithOp::Sub,
                    right: Box::new(Evaluable::Literal(Datum::Interval(30 * MILLIS_PER_DAY))),
                }),
            }
        );
    }

    #[test]
    fn bare_temporal_comparisons_coerce_the_other_side() {
        let e = to_evaluable("current_date >= due_on").unwrap();
        assert_eq!(
            e,
            Evaluable::Compare {
                left: Box::new(Evaluable::CurrentDate),
                op: CompareOp::GtEq,
                right: Box::new(Evaluable::Timestamp(col("due_on"))),
            }
        );
    }

    #[test]
    fn interval_units() {
        assert_eq!(interval_millis("2 hours").unwrap(), 2 * MILLIS_PER_HOUR);
        assert_eq!(interval_millis("1 day").unwrap(), MILLIS_PER_DAY);
        assert_eq!(interval_millis("15 MINUTES").unwrap(), 15 * MILLIS_PER_MINUTE);
        assert_eq!(interval_millis("3 weeks").unwrap(), 0);
        assert!(interval_millis("soon").is_err());
    }

    #[test]
    fn unsupported_functions_fail() {
        let err = to_evaluable("auth.uid() = user_id").unwrap_err();
        assert!(matches!(err, EvaluationFailure::Unsupported(ref m) if m.contains("uid")));
    }

    #[test]
    fn parse_errors_are_reported() {
        assert!(matches!(
            to_evaluable("user_id = = 1"),
            Err(EvaluationFailure::Parse(_))
        ));
    }

    #[test]
    fn display_shows_the_evaluable_form() {
        let e = to_evaluable("user_id = current_setting('app.current_user_id') AND NOT archived")
            .unwrap();
        assert_eq!(
            e.to_string(),
            "(row.user_id = setting('app.current_user_id') AND NOT (row.archived))"
        );
    }

    #[test]
    fn in_lists_and_negative_numbers() {
        let e = to_evaluable("level NOT IN (-1, 2)").unwrap();
        assert_eq!(
            e,
            Evaluable::InList {
                expr: col("level"),
                list: vec![
                    Evaluable::Literal(Datum::Number(-1.0)),
                    Evaluable::Literal(Datum::Number(2.0)),
                ],
                negated: true,
            }
        );
    }
}
