use sqlparser::ast::{BinaryOperator, Expr};
use tracing::debug;

use crate::classifier::patterns::{
    BoolOp, ClassifiedExpression, ClassifiedPolicy, Pattern, COMPLEX_CONFIDENCE_FACTOR,
};
use crate::classifier::recognizers;
use crate::parser::expr::{constant_bool, strip_nesting};
use crate::parser::sql_parser::parse_expression;
use crate::policy::PolicySet;

const NO_MATCH_REASON: &str = "Expression does not match any known pattern";
const NO_PART_MATCH_REASON: &str = "No operand of the AND/OR expression matches a known pattern";

/// Classify a raw SQL predicate as extracted from `pg_policies`.
///
/// Never fails: anything unrecognized comes back as [`Pattern::Custom`] with
/// confidence `0` and a reason.
pub fn classify(expression: &str) -> ClassifiedExpression {
    let trimmed = expression.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("true") {
        return constant(Pattern::PublicAccess, trimmed);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return constant(Pattern::NoAccess, trimmed);
    }

    match parse_expression(trimmed) {
        Ok(expr) => classify_node(&expr, trimmed.to_string()),
        Err(e) => ClassifiedExpression::custom(trimmed, format!("Could not parse expression: {e}")),
    }
}

/// Classify the USING and WITH CHECK predicates of every policy.
pub fn classify_policies(policies: &PolicySet) -> Vec<ClassifiedPolicy> {
    policies
        .iter()
        .map(|policy| {
            let using_classification = classify(&policy.expression);
            let with_check_classification = policy.with_check.as_deref().map(classify);
            debug!(
                policy = %policy.name,
                table = %policy.table,
                pattern = using_classification.pattern.name(),
                confidence = using_classification.confidence,
                "classified policy"
            );
            ClassifiedPolicy {
                policy: policy.clone(),
                using_classification,
                with_check_classification,
            }
        })
        .collect()
}

/// Classify an already-parsed predicate.
pub fn classify_expr(expr: &Expr) -> ClassifiedExpression {
    classify_node(expr, strip_nesting(expr).to_string())
}

fn classify_node(expr: &Expr, raw: String) -> ClassifiedExpression {
    let expr = strip_nesting(expr);

    if let Some(value) = constant_bool(expr) {
        let pattern = if value {
            Pattern::PublicAccess
        } else {
            Pattern::NoAccess
        };
        return constant(pattern, &raw);
    }

    if let Some((pattern, confidence)) = recognizers::match_idiom(expr) {
        return ClassifiedExpression {
            pattern,
            confidence,
            raw,
        };
    }

    if let Expr::BinaryOp { left, op, right } = expr {
        let op = match op {
            BinaryOperator::And => Some(BoolOp::And),
            BinaryOperator::Or => Some(BoolOp::Or),
            _ => None,
        };
        if let Some(op) = op {
            let mut operands = Vec::new();
            collect_operands(left, op, &mut operands);
            collect_operands(right, op, &mut operands);
            return classify_composite(op, &operands, raw);
        }
    }

    ClassifiedExpression::custom(&raw, NO_MATCH_REASON)
}

/// Flatten a left-deep chain such as `a AND b AND c` into its operands.
/// Parenthesized groups stay whole.
fn collect_operands<'a>(expr: &'a Expr, op: BoolOp, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } if op == BoolOp::And => {
            collect_operands(left, op, out);
            collect_operands(right, op, out);
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } if op == BoolOp::Or => {
            collect_operands(left, op, out);
            collect_operands(right, op, out);
        }
        _ => out.push(expr),
    }
}

fn classify_composite(op: BoolOp, operands: &[&Expr], raw: String) -> ClassifiedExpression {
    let parts: Vec<ClassifiedExpression> = operands
        .iter()
        .map(|operand| classify_expr(operand))
        .filter(ClassifiedExpression::is_recognized)
        .collect();

    if parts.is_empty() {
        return ClassifiedExpression::custom(&raw, NO_PART_MATCH_REASON);
    }

    let weakest = parts.iter().map(|p| p.confidence).fold(1.0, f64::min);
    ClassifiedExpression {
        pattern: Pattern::Complex { op, parts },
        confidence: weakest * COMPLEX_CONFIDENCE_FACTOR,
        raw,
    }
}

fn constant(pattern: Pattern, raw: &str) -> ClassifiedExpression {
    ClassifiedExpression {
        pattern,
        confidence: 1.0,
        raw: raw.to_string(),
    }
}
