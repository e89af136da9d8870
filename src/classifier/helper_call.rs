//! Readable helper calls for classified predicates.
//!
//! [`render`] turns a [`ClassifiedExpression`] into text such as
//! `currentUserId("author_id")`, omitting trailing arguments equal to the
//! idiom's default. [`parse`] reads that text back, and
//! [`HelperCall::to_sql`] produces the canonical SQL predicate for it.

use crate::classifier::patterns::{
    ClassifiedExpression, Pattern, CURRENT_USER_ID_SETTING, DEFAULT_OWNER_COLUMN,
    DEFAULT_RECENT_COLUMN, DEFAULT_RECENT_DAYS, DEFAULT_TENANT_COLUMN, DEFAULT_USER_COLUMN,
    TENANT_ID_SETTING, USER_ROLE_SETTING,
};
use crate::error::ConfigurationError;

/// A parsed helper call: either a recognized idiom or verbatim SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperCall {
    /// One of the parameterized or constant idioms.
    Idiom(Pattern),
    /// A quoted SQL literal passed through unchanged.
    Raw(String),
}

impl HelperCall {
    /// Canonical SQL predicate for this helper.
    ///
    /// `None` for an idiom without a canonical form (custom or complex),
    /// which [`parse`] never produces.
    pub fn to_sql(&self) -> Option<String> {
        match self {
            HelperCall::Idiom(pattern) => canonical_sql(pattern),
            HelperCall::Raw(sql) => Some(sql.clone()),
        }
    }
}

/// Render a classification as a helper call.
///
/// Unrecognized predicates render as a quoted literal of the raw SQL;
/// composite ones as the same literal followed by a marker comment.
pub fn render(classified: &ClassifiedExpression) -> String {
    match &classified.pattern {
        Pattern::PublicAccess => "publicAccess()".to_string(),
        Pattern::NoAccess => "noAccess()".to_string(),
        Pattern::CurrentUserId { column } => call(
            "currentUserId",
            &trim_defaults(vec![(Arg::text(column), Arg::text(DEFAULT_USER_COLUMN))]),
        ),
        Pattern::TenantId { column } => call(
            "tenantId",
            &trim_defaults(vec![(Arg::text(column), Arg::text(DEFAULT_TENANT_COLUMN))]),
        ),
        Pattern::RoleCheck { role } => call("roleCheck", &[Arg::text(role)]),
        Pattern::RecentData { column, days } => call(
            "recentData",
            &trim_defaults(vec![
                (Arg::text(column), Arg::text(DEFAULT_RECENT_COLUMN)),
                (Arg::Int(*days), Arg::Int(DEFAULT_RECENT_DAYS)),
            ]),
        ),
        Pattern::TimeWindow { column, hours } => {
            call("timeWindow", &[Arg::text(column), Arg::Int(*hours)])
        }
        Pattern::OwnerOnly {
            user_column,
            owner_column,
        } => call(
            "ownerOnly",
            &trim_defaults(vec![
                (Arg::text(user_column), Arg::text(DEFAULT_USER_COLUMN)),
                (Arg::text(owner_column), Arg::text(DEFAULT_OWNER_COLUMN)),
            ]),
        ),
        Pattern::Complex { op, parts } => format!(
            "{} /* complex: {op} of {} recognized part(s), review manually */",
            quote(&classified.raw),
            parts.len()
        ),
        Pattern::Custom { .. } => quote(&classified.raw),
    }
}

/// Canonical SQL predicate of an idiom. `None` for custom and complex
/// patterns, which have no canonical form.
pub fn canonical_sql(pattern: &Pattern) -> Option<String> {
    let sql = match pattern {
        Pattern::PublicAccess => "true".to_string(),
        Pattern::NoAccess => "false".to_string(),
        Pattern::CurrentUserId { column } => {
            format!("{column} = current_setting('{CURRENT_USER_ID_SETTING}')::uuid")
        }
        Pattern::TenantId { column } => {
            format!("{column} = current_setting('{TENANT_ID_SETTING}')::uuid")
        }
        Pattern::RoleCheck { role } => format!(
            "current_setting('{USER_ROLE_SETTING}') = '{}'",
            role.replace('\'', "''")
        ),
        Pattern::RecentData { column, days } => {
            format!("{column} >= current_date - interval '{days} days'")
        }
        Pattern::TimeWindow { column, hours } => {
            format!("{column} >= now() - interval '{hours} hours'")
        }
        Pattern::OwnerOnly {
            user_column,
            owner_column,
        } => format!("{user_column} = {owner_column}"),
        Pattern::Complex { .. } | Pattern::Custom { .. } => return None,
    };
    Some(sql)
}

/// Parse helper text produced by [`render`] (or written by hand).
pub fn parse(input: &str) -> Result<HelperCall, ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidHelper {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let mut scanner = Scanner::new(input);
    scanner.skip_ws();

    if scanner.peek() == Some('"') {
        let sql = scanner.string().map_err(|e| invalid(&e))?;
        scanner.skip_trailing_comment().map_err(|e| invalid(&e))?;
        return Ok(HelperCall::Raw(sql));
    }

    let name = scanner.ident();
    if name.is_empty() {
        return Err(invalid("expected a helper name or a quoted SQL literal"));
    }
    scanner.skip_ws();
    if !scanner.eat('(') {
        return Err(invalid("expected '('"));
    }
    let args = scanner.args().map_err(|e| invalid(&e))?;
    scanner.skip_trailing_comment().map_err(|e| invalid(&e))?;

    build_pattern(&name, &args)
        .map(HelperCall::Idiom)
        .map_err(|e| invalid(&e))
}

fn build_pattern(name: &str, args: &[Arg]) -> Result<Pattern, String> {
    let arity = |min: usize, max: usize| -> Result<(), String> {
        if args.len() < min || args.len() > max {
            Err(format!(
                "{name} takes {min}..={max} argument(s), got {}",
                args.len()
            ))
        } else {
            Ok(())
        }
    };

    let pattern = match name {
        "publicAccess" => {
            arity(0, 0)?;
            Pattern::PublicAccess
        }
        "noAccess" => {
            arity(0, 0)?;
            Pattern::NoAccess
        }
        "currentUserId" => {
            arity(0, 1)?;
            Pattern::CurrentUserId {
                column: text_arg(args, 0, DEFAULT_USER_COLUMN)?,
            }
        }
        "tenantId" => {
            arity(0, 1)?;
            Pattern::TenantId {
                column: text_arg(args, 0, DEFAULT_TENANT_COLUMN)?,
            }
        }
        "roleCheck" => {
            arity(1, 1)?;
            Pattern::RoleCheck {
                role: text_arg(args, 0, "")?,
            }
        }
        "recentData" => {
            arity(0, 2)?;
            Pattern::RecentData {
                column: text_arg(args, 0, DEFAULT_RECENT_COLUMN)?,
                days: int_arg(args, 1, DEFAULT_RECENT_DAYS)?,
            }
        }
        "timeWindow" => {
            arity(2, 2)?;
            Pattern::TimeWindow {
                column: text_arg(args, 0, "")?,
                hours: int_arg(args, 1, 0)?,
            }
        }
        "ownerOnly" => {
            arity(0, 2)?;
            Pattern::OwnerOnly {
                user_column: text_arg(args, 0, DEFAULT_USER_COLUMN)?,
                owner_column: text_arg(args, 1, DEFAULT_OWNER_COLUMN)?,
            }
        }
        other => return Err(format!("unknown helper '{other}'")),
    };
    Ok(pattern)
}

fn text_arg(args: &[Arg], index: usize, default: &str) -> Result<String, String> {
    match args.get(index) {
        None => Ok(default.to_string()),
        Some(Arg::Text(s)) => Ok(s.clone()),
        Some(Arg::Int(_)) => Err(format!("argument {} must be a string", index + 1)),
    }
}

fn int_arg(args: &[Arg], index: usize, default: i64) -> Result<i64, String> {
    match args.get(index) {
        None => Ok(default),
        Some(Arg::Int(n)) => Ok(*n),
        Some(Arg::Text(_)) => Err(format!("argument {} must be an integer", index + 1)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Text(String),
    Int(i64),
}

impl Arg {
    fn text(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

/// Drop trailing `(value, default)` pairs whose value equals the default.
fn trim_defaults(mut pairs: Vec<(Arg, Arg)>) -> Vec<Arg> {
    while pairs.last().is_some_and(|(value, default)| value == default) {
        pairs.pop();
    }
    pairs.into_iter().map(|(value, _)| value).collect()
}

fn call(name: &str, args: &[Arg]) -> String {
    let mut out = format!("{name}(");
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match arg {
            Arg::Text(s) => out.push_str(&quote(s)),
            Arg::Int(n) => out.push_str(&n.to_string()),
        }
    }
    out.push(')');
    out
}

/// Double-quote a string, escaping backslashes, quotes and control characters.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
            out.push(c);
            self.chars.next();
        }
        out
    }

    fn string(&mut self) -> Result<String, String> {
        if !self.eat('"') {
            return Err("expected '\"'".to_string());
        }
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err("unterminated string".to_string()),
                Some('"') => return Ok(out),
                Some('\\') => match self.chars.next() {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('"' | '\\')) => out.push(c),
                    Some(c) => return Err(format!("unknown escape '\\{c}'")),
                    None => return Err("unterminated string".to_string()),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn int(&mut self) -> Result<i64, String> {
        let mut digits = String::new();
        if self.eat('-') {
            digits.push('-');
        }
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.chars.next();
        }
        digits
            .parse()
            .map_err(|_| format!("invalid integer '{digits}'"))
    }

    fn args(&mut self) -> Result<Vec<Arg>, String> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            self.skip_ws();
            let arg = if self.peek() == Some('"') {
                Arg::Text(self.string()?)
            } else {
                Arg::Int(self.int()?)
            };
            args.push(arg);
            self.skip_ws();
            if self.eat(')') {
                return Ok(args);
            }
            if !self.eat(',') {
                return Err("expected ',' or ')'".to_string());
            }
        }
    }

    /// Allow a single `/* … */` comment and whitespace after the call.
    fn skip_trailing_comment(&mut self) -> Result<(), String> {
        self.skip_ws();
        if self.eat('/') {
            if !self.eat('*') {
                return Err("expected '/*'".to_string());
            }
            let mut prev = '\0';
            loop {
                match self.chars.next() {
                    None => return Err("unterminated comment".to_string()),
                    Some('/') if prev == '*' => break,
                    Some(c) => prev = c,
                }
            }
            self.skip_ws();
        }
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(format!("unexpected trailing '{c}'")),
        }
    }
}
