//! Content filter expressions
//!
//! SQL predicates over sample members, parsed with `sqlparser`'s generic
//! dialect and lowered into a small evaluator:
//!
//! ```text
//! x > 10 AND color = 'BLUE'
//! NOT (shapesize BETWEEN %0 AND %1) OR color LIKE 'G%'
//! position.coords[2] <> 0
//! ```
//!
//! Supported: `= <> != < <= > >=`, `[NOT] BETWEEN a AND b`, `[NOT] LIKE`
//! (`%` any run, `_` one character), `[NOT] MATCH` or `SIMILAR TO`
//! (shell-style glob), `AND`, `OR`, `NOT`, parentheses, numeric, string and
//! boolean literals and positional parameters `%0..%n`. Keywords are
//! case-insensitive.
//!
//! A predicate over a member the sample does not have is false.

use std::cmp::Ordering;

use contracts::{
    lookup_path, parse_member_path, ContentFilter, ContractError, DataMap, PathSegment, Value,
};
use glob::Pattern;
use sqlparser::ast::{BinaryOperator, Expr as SqlExpr, UnaryOperator, Value as SqlValue};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

/// A parsed content filter, ready to evaluate against sample data
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    expr: Expr,
}

impl CompiledFilter {
    /// Parse `filter.expression`, binding `filter.parameters`
    ///
    /// # Errors
    /// `ContractError::InvalidSelector` carrying the parser's message.
    pub fn compile(filter: &ContentFilter) -> Result<Self, ContractError> {
        let lowering = Lowering {
            params: &filter.parameters,
        };
        let expr = parse(&filter.expression)
            .and_then(|ast| lowering.predicate(&ast))
            .map_err(|e| invalid(&filter.expression, e))?;
        Ok(Self { expr })
    }

    pub fn matches(&self, data: &DataMap) -> bool {
        self.expr.eval(data)
    }
}

fn invalid(expression: &str, message: String) -> ContractError {
    ContractError::invalid_selector(format!("filter '{expression}': {message}"))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn test(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Int(i128),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Literal {
    /// Interpret a bound parameter: quoted string, number, boolean, else raw text
    fn from_param(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return Literal::Str(raw[1..raw.len() - 1].replace("''", "'"));
        }
        if let Ok(i) = raw.parse::<i128>() {
            return Literal::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Literal::Float(f);
        }
        match raw.to_ascii_uppercase().as_str() {
            "TRUE" => Literal::Bool(true),
            "FALSE" => Literal::Bool(false),
            _ => Literal::Str(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
enum Operand {
    Field(Vec<PathSegment>),
    Literal(Literal),
}

/// Scalar view used during comparison
#[derive(Debug, Clone, Copy)]
enum Scalar<'a> {
    Int(i128),
    Float(f64),
    Str(&'a str),
    Bool(bool),
}

impl Operand {
    fn resolve<'a>(&'a self, data: &'a DataMap) -> Option<Scalar<'a>> {
        match self {
            Operand::Field(path) => match lookup_path(data, path)? {
                Value::Bool(b) => Some(Scalar::Bool(*b)),
                Value::Int(i) => Some(Scalar::Int(i128::from(*i))),
                Value::UInt(u) => Some(Scalar::Int(i128::from(*u))),
                Value::Float(f) => Some(Scalar::Float(*f)),
                Value::String(s) => Some(Scalar::Str(s)),
                Value::Sequence(_) | Value::Struct(_) => None,
            },
            Operand::Literal(Literal::Int(i)) => Some(Scalar::Int(*i)),
            Operand::Literal(Literal::Float(f)) => Some(Scalar::Float(*f)),
            Operand::Literal(Literal::Str(s)) => Some(Scalar::Str(s)),
            Operand::Literal(Literal::Bool(b)) => Some(Scalar::Bool(*b)),
        }
    }
}

impl Scalar<'_> {
    fn as_f64(self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(i as f64),
            Scalar::Float(f) => Some(f),
            Scalar::Str(s) => s.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }
}

fn compare(a: Scalar<'_>, b: Scalar<'_>) -> Option<Ordering> {
    match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => Some(x.cmp(&y)),
        (Scalar::Str(x), Scalar::Str(y)) => Some(x.cmp(y)),
        (Scalar::Bool(x), Scalar::Bool(y)) => Some(x.cmp(&y)),
        (Scalar::Bool(_), _) | (_, Scalar::Bool(_)) => None,
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

#[derive(Debug, Clone)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    Between {
        value: Operand,
        low: Operand,
        high: Operand,
        negated: bool,
    },
    Like {
        value: Operand,
        pattern: Pattern,
        negated: bool,
    },
}

impl Expr {
    fn eval(&self, data: &DataMap) -> bool {
        match self {
            Expr::And(a, b) => a.eval(data) && b.eval(data),
            Expr::Or(a, b) => a.eval(data) || b.eval(data),
            Expr::Not(e) => !e.eval(data),
            Expr::Compare { left, op, right } => {
                match (left.resolve(data), right.resolve(data)) {
                    (Some(l), Some(r)) => compare(l, r).is_some_and(|o| op.test(o)),
                    _ => false,
                }
            }
            Expr::Between {
                value,
                low,
                high,
                negated,
            } => {
                let (Some(v), Some(lo), Some(hi)) =
                    (value.resolve(data), low.resolve(data), high.resolve(data))
                else {
                    return false;
                };
                let inside = compare(v, lo).is_some_and(|o| o != Ordering::Less)
                    && compare(v, hi).is_some_and(|o| o != Ordering::Greater);
                inside != *negated
            }
            Expr::Like {
                value,
                pattern,
                negated,
            } => match value.resolve(data) {
                Some(Scalar::Str(s)) => pattern.matches(s) != *negated,
                _ => false,
            },
        }
    }
}

/// Parse with the generic SQL dialect, rejecting trailing input
fn parse(expression: &str) -> Result<SqlExpr, String> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, expression)
        .tokenize()
        .map_err(|e| e.to_string())?;
    let mut parser = Parser::new(&dialect).with_tokens(rewrite_tokens(tokens));
    let expr = parser.parse_expr().map_err(|e| e.to_string())?;
    parser
        .expect_token(&Token::EOF)
        .map_err(|e| e.to_string())?;
    Ok(expr)
}

/// `%n` becomes a placeholder token and `MATCH` becomes `SIMILAR TO`
fn rewrite_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut rewritten = Vec::with_capacity(tokens.len());
    let mut tokens = tokens.into_iter().peekable();
    while let Some(token) = tokens.next() {
        match token {
            Token::Mod if matches!(tokens.peek(), Some(Token::Number(..))) => {
                if let Some(Token::Number(index, _)) = tokens.next() {
                    rewritten.push(Token::Placeholder(format!("%{index}")));
                }
            }
            Token::Word(word)
                if word.quote_style.is_none() && word.value.eq_ignore_ascii_case("MATCH") =>
            {
                rewritten.push(Token::make_keyword("SIMILAR"));
                rewritten.push(Token::Whitespace(Whitespace::Space));
                rewritten.push(Token::make_keyword("TO"));
            }
            other => rewritten.push(other),
        }
    }
    rewritten
}

fn comparison(op: &BinaryOperator) -> Option<CmpOp> {
    let op = match op {
        BinaryOperator::Eq => CmpOp::Eq,
        BinaryOperator::NotEq => CmpOp::Ne,
        BinaryOperator::Lt => CmpOp::Lt,
        BinaryOperator::LtEq => CmpOp::Le,
        BinaryOperator::Gt => CmpOp::Gt,
        BinaryOperator::GtEq => CmpOp::Ge,
        _ => return None,
    };
    Some(op)
}

/// Translate a SQL LIKE pattern into a glob pattern
fn like_to_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '%' => glob.push('*'),
            '_' => glob.push('?'),
            other => glob.push_str(&Pattern::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    glob
}

/// Lowers the SQL syntax tree into the evaluator's predicate tree
struct Lowering<'p> {
    params: &'p [String],
}

impl Lowering<'_> {
    fn predicate(&self, expr: &SqlExpr) -> Result<Expr, String> {
        match expr {
            SqlExpr::Nested(inner) => self.predicate(inner),
            SqlExpr::UnaryOp {
                op: UnaryOperator::Not,
                expr: inner,
            } => Ok(Expr::Not(Box::new(self.predicate(inner)?))),
            SqlExpr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => Ok(Expr::And(
                    Box::new(self.predicate(left)?),
                    Box::new(self.predicate(right)?),
                )),
                BinaryOperator::Or => Ok(Expr::Or(
                    Box::new(self.predicate(left)?),
                    Box::new(self.predicate(right)?),
                )),
                other => {
                    let op =
                        comparison(other).ok_or_else(|| format!("unsupported operator '{other}'"))?;
                    Ok(Expr::Compare {
                        left: self.operand(left)?,
                        op,
                        right: self.operand(right)?,
                    })
                }
            },
            SqlExpr::Between {
                expr: value,
                negated,
                low,
                high,
            } => Ok(Expr::Between {
                value: self.operand(value)?,
                low: self.operand(low)?,
                high: self.operand(high)?,
                negated: *negated,
            }),
            SqlExpr::Like {
                negated,
                expr: value,
                pattern,
                ..
            } => Ok(Expr::Like {
                value: self.operand(value)?,
                pattern: self.pattern(pattern, true)?,
                negated: *negated,
            }),
            SqlExpr::SimilarTo {
                negated,
                expr: value,
                pattern,
                ..
            } => Ok(Expr::Like {
                value: self.operand(value)?,
                pattern: self.pattern(pattern, false)?,
                negated: *negated,
            }),
            other => Err(format!("expected a predicate, found '{other}'")),
        }
    }

    fn operand(&self, expr: &SqlExpr) -> Result<Operand, String> {
        match expr {
            SqlExpr::Nested(inner) => self.operand(inner),
            SqlExpr::Identifier(ident) => Ok(Operand::Field(vec![PathSegment::Member(
                ident.value.clone(),
            )])),
            SqlExpr::CompoundIdentifier(idents) => Ok(Operand::Field(
                idents
                    .iter()
                    .map(|ident| PathSegment::Member(ident.value.clone()))
                    .collect(),
            )),
            SqlExpr::Value(value) => self.literal(value).map(Operand::Literal),
            SqlExpr::UnaryOp {
                op: UnaryOperator::Minus,
                expr: inner,
            } => match self.operand(inner)? {
                Operand::Literal(Literal::Int(i)) => Ok(Operand::Literal(Literal::Int(-i))),
                Operand::Literal(Literal::Float(f)) => Ok(Operand::Literal(Literal::Float(-f))),
                _ => Err(format!("cannot negate '{inner}'")),
            },
            other => {
                // indexed member access such as `pos.coords[2]`
                let text = other.to_string();
                let is_path = text.contains('[')
                    && text
                        .chars()
                        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'));
                match parse_member_path(&text) {
                    Some(path) if is_path => Ok(Operand::Field(path)),
                    _ => Err(format!("expected a member or literal, found '{other}'")),
                }
            }
        }
    }

    fn literal(&self, value: &SqlValue) -> Result<Literal, String> {
        match value {
            SqlValue::Number(text, _) => {
                if let Ok(int) = text.parse::<i128>() {
                    return Ok(Literal::Int(int));
                }
                text.parse::<f64>()
                    .map(Literal::Float)
                    .map_err(|_| format!("invalid number '{text}'"))
            }
            SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
                Ok(Literal::Str(s.clone()))
            }
            SqlValue::Boolean(b) => Ok(Literal::Bool(*b)),
            SqlValue::Placeholder(name) => self.parameter(name),
            other => Err(format!("unsupported literal '{other}'")),
        }
    }

    fn parameter(&self, name: &str) -> Result<Literal, String> {
        let index: usize = name
            .strip_prefix('%')
            .and_then(|index| index.parse().ok())
            .ok_or_else(|| format!("unsupported placeholder '{name}'"))?;
        self.params
            .get(index)
            .map(|raw| Literal::from_param(raw))
            .ok_or_else(|| {
                format!(
                    "parameter %{index} not bound ({} parameters given)",
                    self.params.len()
                )
            })
    }

    fn pattern(&self, expr: &SqlExpr, sql_like: bool) -> Result<Pattern, String> {
        let text = match self.operand(expr)? {
            Operand::Literal(Literal::Str(s)) => s,
            _ => return Err("pattern must be a string".into()),
        };
        let glob = if sql_like { like_to_glob(&text) } else { text };
        Pattern::new(&glob).map_err(|e| format!("invalid pattern '{glob}': {e}"))
    }
}
