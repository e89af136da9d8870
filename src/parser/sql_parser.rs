use sqlparser::ast::Expr;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

/// Parse a standalone SQL boolean predicate, as stored in `pg_policies.qual`.
///
/// The whole input must be consumed; trailing tokens are an error.
pub fn parse_expression(sql: &str) -> Result<Expr, String> {
    let dialect = PostgreSqlDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(sql)
        .map_err(|e| e.to_string())?;
    let expr = parser.parse_expr().map_err(|e| e.to_string())?;

    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(format!("unexpected trailing input starting at '{}'", next.token));
    }
    Ok(expr)
}
