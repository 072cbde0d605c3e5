//! Decision condition evaluator.
//!
//! A small, explicitly scoped expression language for `when` clauses. The
//! only name in scope is `payload`; there are no function calls and no way to
//! reach anything outside the payload value.
//!
//! Supported:
//! - Field access: `payload.user.id`, `payload.items.length`, `payload.items.0`
//! - Comparisons: `==`, `!=`, `===`, `!==`, `>`, `<`, `>=`, `<=`
//! - Logical: `&&`, `||`, `!` (short-circuiting), parentheses
//! - Literals: strings (single or double quoted), numbers, `true`, `false`,
//!   `null`, `undefined`
//!
//! Mixed-type comparisons convert booleans, `null` and numeric strings to
//! numbers the way JavaScript does; two strings order lexicographically.
//!
//! Reading a property of a missing value is an evaluation error, as is any
//! name other than `payload`. [`evaluate_condition`] turns every error into a
//! logged warning and `false`.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0} is not defined")]
    UndefinedReference(String),
    #[error("cannot read properties of {base} (reading '{property}')")]
    PropertyOfMissing { base: &'static str, property: String },
}

/// Evaluate `expression` with `payload` in scope
pub fn evaluate(expression: &str, payload: &Value) -> Result<bool, ExpressionError> {
    let expr = parse(expression)?;
    Ok(eval(&expr, payload)?.truthy())
}

/// Decision-node entry point: failures are logged and read as `false`
pub fn evaluate_condition(expression: &str, payload: &Value) -> bool {
    match evaluate(expression, payload) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("⚠️ Error evaluating condition \"{}\": {}", expression, e);
            false
        }
    }
}

/// Parse once; useful for validating expressions ahead of time
pub fn parse(expression: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Parse("empty expression".into()));
    }
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ExpressionError::Parse(format!("unexpected token: {:?}", token)));
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let after = chars.get(i + 2).copied();

        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' if next == Some('=') => {
                let strict = after == Some('=');
                tokens.push(Token::Op(if strict { CompareOp::StrictEq } else { CompareOp::Eq }));
                i += if strict { 3 } else { 2 };
            }
            '!' if next == Some('=') => {
                let strict = after == Some('=');
                tokens.push(Token::Op(if strict { CompareOp::StrictNe } else { CompareOp::Ne }));
                i += if strict { 3 } else { 2 };
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '>' | '<' => {
                let inclusive = next == Some('=');
                let op = match (c, inclusive) {
                    ('>', true) => CompareOp::Ge,
                    ('>', false) => CompareOp::Gt,
                    ('<', true) => CompareOp::Le,
                    _ => CompareOp::Lt,
                };
                tokens.push(Token::Op(op));
                i += if inclusive { 2 } else { 1 };
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' | '\'' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == c)
                    .map(|offset| start + offset)
                    .ok_or_else(|| ExpressionError::Parse("unterminated string literal".into()))?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::Parse(format!("invalid number: {}", text)))?;
                tokens.push(Token::Num(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '$' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "null" => Token::Null,
                    "undefined" => Token::Undefined,
                    _ => Token::Path(word),
                });
            }
            other => {
                return Err(ExpressionError::Parse(format!(
                    "unexpected character: {}",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST and recursive descent parser. Precedence: ! > comparison > && > ||
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Gt,
    Lt,
    Ge,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.parse_unary()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.parse_unary()?;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self
            .advance()
            .cloned()
            .ok_or_else(|| ExpressionError::Parse("unexpected end of expression".into()))?;

        match token {
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Num(n) => Ok(Expr::Literal(Literal::Num(n))),
            Token::Bool(b) => Ok(Expr::Literal(Literal::Bool(b))),
            Token::Null => Ok(Expr::Literal(Literal::Null)),
            Token::Undefined => Ok(Expr::Literal(Literal::Undefined)),
            Token::Path(path) => {
                let segments: Vec<String> = path.split('.').map(str::to_string).collect();
                if segments.iter().any(String::is_empty) {
                    return Err(ExpressionError::Parse(format!("malformed path: {}", path)));
                }
                Ok(Expr::Path(segments))
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExpressionError::Parse("expected ')'".into())),
                }
            }
            other => Err(ExpressionError::Parse(format!("expected value, got {:?}", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum EvalValue {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    /// Arrays and objects
    Json(Value),
}

impl EvalValue {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => EvalValue::Null,
            Value::Bool(b) => EvalValue::Bool(*b),
            Value::Number(n) => EvalValue::Num(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => EvalValue::Str(s.clone()),
            other => EvalValue::Json(other.clone()),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            EvalValue::Undefined | EvalValue::Null => false,
            EvalValue::Bool(b) => *b,
            EvalValue::Num(n) => *n != 0.0 && !n.is_nan(),
            EvalValue::Str(s) => !s.is_empty(),
            EvalValue::Json(_) => true,
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, EvalValue::Undefined | EvalValue::Null)
    }

    /// Numeric conversion for relational and loose comparisons; `None` is NaN
    fn to_number(&self) -> Option<f64> {
        match self {
            EvalValue::Num(n) => Some(*n),
            EvalValue::Null => Some(0.0),
            EvalValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            EvalValue::Str(s) => string_to_number(s),
            EvalValue::Undefined | EvalValue::Json(_) => None,
        }
    }
}

fn eval(expr: &Expr, payload: &Value) -> Result<EvalValue, ExpressionError> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Str(s) => EvalValue::Str(s.clone()),
            Literal::Num(n) => EvalValue::Num(*n),
            Literal::Bool(b) => EvalValue::Bool(*b),
            Literal::Null => EvalValue::Null,
            Literal::Undefined => EvalValue::Undefined,
        }),
        Expr::Path(segments) => resolve(segments, payload),
        Expr::Not(inner) => Ok(EvalValue::Bool(!eval(inner, payload)?.truthy())),
        Expr::And(left, right) => {
            let left = eval(left, payload)?;
            if !left.truthy() {
                return Ok(left);
            }
            eval(right, payload)
        }
        Expr::Or(left, right) => {
            let left = eval(left, payload)?;
            if left.truthy() {
                return Ok(left);
            }
            eval(right, payload)
        }
        Expr::Compare(left, op, right) => {
            let left = eval(left, payload)?;
            let right = eval(right, payload)?;
            Ok(EvalValue::Bool(compare(&left, *op, &right)))
        }
    }
}

fn resolve(segments: &[String], payload: &Value) -> Result<EvalValue, ExpressionError> {
    let (root, rest) = segments
        .split_first()
        .ok_or_else(|| ExpressionError::Parse("empty path".into()))?;
    if root != "payload" {
        return Err(ExpressionError::UndefinedReference(root.clone()));
    }

    let mut current = Some(payload);
    for (position, segment) in rest.iter().enumerate() {
        let last = position + 1 == rest.len();
        let value = match current {
            None => {
                return Err(ExpressionError::PropertyOfMissing {
                    base: "undefined",
                    property: segment.clone(),
                })
            }
            Some(Value::Null) => {
                return Err(ExpressionError::PropertyOfMissing {
                    base: "null",
                    property: segment.clone(),
                })
            }
            Some(value) => value,
        };

        // `length` only resolves as the final segment
        current = match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) if segment == "length" && last => {
                return Ok(EvalValue::Num(items.len() as f64));
            }
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::String(s) if segment == "length" && last => {
                return Ok(EvalValue::Num(s.chars().count() as f64));
            }
            _ => None,
        };
    }

    Ok(current.map(EvalValue::from_json).unwrap_or(EvalValue::Undefined))
}

fn compare(left: &EvalValue, op: CompareOp, right: &EvalValue) -> bool {
    match op {
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::Ne => !loose_eq(left, right),
        CompareOp::StrictEq => strict_eq(left, right),
        CompareOp::StrictNe => !strict_eq(left, right),
        CompareOp::Gt | CompareOp::Lt | CompareOp::Ge | CompareOp::Le => {
            let ordering = match (left, right) {
                (EvalValue::Str(l), EvalValue::Str(r)) => Some(l.cmp(r)),
                _ => match (left.to_number(), right.to_number()) {
                    (Some(l), Some(r)) => l.partial_cmp(&r),
                    _ => None,
                },
            };
            match (ordering, op) {
                (Some(o), CompareOp::Gt) => o.is_gt(),
                (Some(o), CompareOp::Lt) => o.is_lt(),
                (Some(o), CompareOp::Ge) => o.is_ge(),
                (Some(o), CompareOp::Le) => o.is_le(),
                _ => false,
            }
        }
    }
}

fn strict_eq(left: &EvalValue, right: &EvalValue) -> bool {
    match (left, right) {
        (EvalValue::Undefined, EvalValue::Undefined) | (EvalValue::Null, EvalValue::Null) => true,
        (EvalValue::Bool(l), EvalValue::Bool(r)) => l == r,
        (EvalValue::Num(l), EvalValue::Num(r)) => l == r,
        (EvalValue::Str(l), EvalValue::Str(r)) => l == r,
        (EvalValue::Json(l), EvalValue::Json(r)) => l == r,
        _ => false,
    }
}

/// `==`: nullish values equal each other; booleans and numeric strings
/// compare as numbers
fn loose_eq(left: &EvalValue, right: &EvalValue) -> bool {
    if left.is_nullish() || right.is_nullish() {
        return left.is_nullish() && right.is_nullish();
    }
    match (left, right) {
        (EvalValue::Bool(_), EvalValue::Bool(_)) => strict_eq(left, right),
        (EvalValue::Bool(b), other) | (other, EvalValue::Bool(b)) => {
            loose_eq(&EvalValue::Num(if *b { 1.0 } else { 0.0 }), other)
        }
        (EvalValue::Num(n), EvalValue::Str(s)) | (EvalValue::Str(s), EvalValue::Num(n)) => {
            string_to_number(s) == Some(*n)
        }
        _ => strict_eq(left, right),
    }
}

/// Blank strings are 0; anything that is not a decimal literal or
/// `Infinity` has no numeric value
fn string_to_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    match trimmed {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
    {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_comparison_against_payload_field() {
        assert!(evaluate("payload.id > 0", &json!({ "id": 5 })).unwrap());
        assert!(!evaluate("payload.id > 0", &json!({ "id": -1 })).unwrap());
    }

    #[test]
    fn string_params_order_against_numbers() {
        let payload = json!({ "request": { "params": { "id": "5", "name": "ada" } } });
        assert!(evaluate("payload.request.params.id > 0", &payload).unwrap());
        assert!(evaluate("payload.request.params.id <= 5", &payload).unwrap());
        assert!(!evaluate("payload.request.params.id < 5", &payload).unwrap());
        // Non-numeric text never orders against a number
        assert!(!evaluate("payload.request.params.name > 0", &payload).unwrap());
        assert!(!evaluate("payload.request.params.name <= 0", &payload).unwrap());
        // Two strings still compare lexicographically
        assert!(evaluate("payload.request.params.id > '10'", &payload).unwrap());
    }

    #[test]
    fn booleans_coerce_to_numbers() {
        let payload = json!({ "active": true, "count": 1, "flag": "1", "off": false });
        assert!(evaluate("payload.active == 1", &payload).unwrap());
        assert!(evaluate("payload.active == payload.flag", &payload).unwrap());
        assert!(evaluate("payload.off == 0", &payload).unwrap());
        assert!(evaluate("payload.active > payload.off", &payload).unwrap());
        assert!(!evaluate("payload.active === 1", &payload).unwrap());
        assert!(evaluate("payload.count >= true", &payload).unwrap());
    }

    #[test]
    fn string_equality_with_either_quote_style() {
        let payload = json!({ "request": { "method": "POST" } });
        assert!(evaluate("payload.request.method === 'POST'", &payload).unwrap());
        assert!(evaluate(r#"payload.request.method == "POST""#, &payload).unwrap());
        assert!(evaluate("payload.request.method !== 'GET'", &payload).unwrap());
    }

    #[test]
    fn logical_connectives_and_parentheses() {
        let payload = json!({ "a": 1, "b": 2, "admin": false });
        assert!(evaluate("payload.a == 1 && payload.b == 2", &payload).unwrap());
        assert!(evaluate("payload.a == 9 || payload.b == 2", &payload).unwrap());
        assert!(evaluate("!(payload.admin || payload.a > 5)", &payload).unwrap());
        assert!(evaluate("!payload.admin", &payload).unwrap());
    }

    #[test]
    fn missing_field_is_undefined_not_an_error() {
        let payload = json!({ "user": {} });
        assert!(!evaluate("payload.user.id", &payload).unwrap());
        assert!(evaluate("payload.user.id == null", &payload).unwrap());
        assert!(evaluate("payload.user.id === undefined", &payload).unwrap());
        assert!(!evaluate("payload.user.id === null", &payload).unwrap());
    }

    #[test]
    fn property_of_missing_value_is_an_error() {
        let err = evaluate("payload.user.id > 0", &json!({})).unwrap_err();
        assert_eq!(
            err,
            ExpressionError::PropertyOfMissing {
                base: "undefined",
                property: "id".to_string()
            }
        );
    }

    #[test]
    fn only_payload_is_in_scope() {
        let err = evaluate("process.exit == 1", &json!({})).unwrap_err();
        assert_eq!(err, ExpressionError::UndefinedReference("process".to_string()));
    }

    #[test]
    fn short_circuit_skips_failing_right_operand() {
        assert!(evaluate("payload.ok || payload.missing.deep", &json!({ "ok": true })).unwrap());
        assert!(!evaluate("payload.ok && payload.missing.deep", &json!({ "ok": false })).unwrap());
    }

    #[test]
    fn array_length_and_index_access() {
        let payload = json!({ "items": [10, 20, 30], "name": "abc" });
        assert!(evaluate("payload.items.length == 3", &payload).unwrap());
        assert!(evaluate("payload.items.1 == 20", &payload).unwrap());
        assert!(evaluate("payload.name.length >= 3", &payload).unwrap());
    }

    #[test]
    fn numeric_string_loosely_equals_number() {
        let payload = json!({ "id": "42" });
        assert!(evaluate("payload.id == 42", &payload).unwrap());
        assert!(!evaluate("payload.id === 42", &payload).unwrap());
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(evaluate("", &json!({})), Err(ExpressionError::Parse(_))));
        assert!(matches!(evaluate("payload.id >", &json!({})), Err(ExpressionError::Parse(_))));
        assert!(matches!(evaluate("(payload.id", &json!({})), Err(ExpressionError::Parse(_))));
        assert!(matches!(evaluate("payload.id ; 1", &json!({})), Err(ExpressionError::Parse(_))));
    }

    #[test]
    fn condition_failures_read_as_false() {
        assert!(!evaluate_condition("this is not valid ==", &json!({})));
        assert!(!evaluate_condition("payload.a.b.c", &json!({})));
        assert!(evaluate_condition("payload.flag", &json!({ "flag": true })));
    }
}
