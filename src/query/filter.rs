//! `$filter` expression parsing and evaluation
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := and_expr ( "or" and_expr )*
//! and_expr:= cmp ( "and" cmp )*
//! cmp     := "(" expr ")" | property op literal
//! op      := eq | ne | gt | ge | lt | le
//! literal := 'string' | integer | float | true | false | null
//! ```
//!
//! Every referenced property must already be known on the entity type,
//! declared or inferred; validation runs before evaluation and names the
//! first unknown key in scan order.

use serde_json::{Map, Value};

use super::errors::{QueryError, QueryResult};
use crate::schema::SchemaRegistry;

/// A comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// A literal on the right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

/// A parsed `$filter` expression
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Or(Box<FilterExpr>, Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Compare {
        property: String,
        op: CompareOp,
        literal: Literal,
    },
}

impl FilterExpr {
    /// Parse a raw `$filter` value
    pub fn parse(raw: &str) -> QueryResult<Self> {
        let tokens = tokenize(raw)?;
        let mut parser = Parser {
            raw,
            tokens,
            pos: 0,
        };
        let expr = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(QueryError::parse("$filter", raw));
        }
        Ok(expr)
    }

    /// Referenced property names in scan order
    pub fn property_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Or(l, r) | Self::And(l, r) => {
                l.collect_names(out);
                r.collect_names(out);
            }
            Self::Compare { property, .. } => out.push(property),
        }
    }

    /// Fail with the first property name that does not resolve on the
    /// entity type, declared or inferred.
    ///
    /// Unknown keys fail the whole expression whether they sit under `and`
    /// or `or`. The metadata namespace (`__` prefix) is always known.
    pub fn validate(&self, entity_type: &str, registry: &SchemaRegistry) -> QueryResult<()> {
        for name in self.property_names() {
            if !name.starts_with("__") && registry.resolve_property(entity_type, name).is_none() {
                return Err(QueryError::UnknownKey(name.to_string()));
            }
        }
        Ok(())
    }

    /// Evaluate against a record's property map
    pub fn matches(&self, properties: &Map<String, Value>) -> bool {
        match self {
            Self::Or(l, r) => l.matches(properties) || r.matches(properties),
            Self::And(l, r) => l.matches(properties) && r.matches(properties),
            Self::Compare {
                property,
                op,
                literal,
            } => {
                let value = properties.get(property).unwrap_or(&Value::Null);
                compare(value, *op, literal)
            }
        }
    }
}

fn compare(value: &Value, op: CompareOp, literal: &Literal) -> bool {
    match op {
        CompareOp::Eq => equals(value, literal),
        CompareOp::Ne => !equals(value, literal),
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            let ord = match (value, literal) {
                (Value::Number(n), Literal::Int(i)) => {
                    n.as_f64().partial_cmp(&Some(*i as f64))
                }
                (Value::Number(n), Literal::Float(f)) => n.as_f64().partial_cmp(&Some(*f)),
                (Value::String(s), Literal::String(lit)) => Some(s.as_str().cmp(lit.as_str())),
                _ => None,
            };
            match ord {
                Some(ord) => match op {
                    CompareOp::Gt => ord.is_gt(),
                    CompareOp::Ge => ord.is_ge(),
                    CompareOp::Lt => ord.is_lt(),
                    CompareOp::Le => ord.is_le(),
                    _ => unreachable!(),
                },
                None => false,
            }
        }
    }
}

/// Numbers compare through f64 so an integer write matches a float literal
fn equals(value: &Value, literal: &Literal) -> bool {
    match (value, literal) {
        (Value::Null, Literal::Null) => true,
        (Value::Bool(b), Literal::Bool(lit)) => b == lit,
        (Value::Number(n), Literal::Int(i)) => n.as_f64() == Some(*i as f64),
        (Value::Number(n), Literal::Float(f)) => n.as_f64() == Some(*f),
        (Value::String(s), Literal::String(lit)) => s == lit,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
}

fn tokenize(raw: &str) -> QueryResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        // '' inside a string literal is an escaped quote
                        Some('\'') => {
                            if chars.peek() == Some(&'\'') {
                                chars.next();
                                s.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some(ch) => s.push(ch),
                        None => return Err(QueryError::parse("$filter", raw)),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '-' | '0'..='9' => {
                let mut num = String::new();
                if c == '-' {
                    num.push(c);
                    chars.next();
                }
                let mut is_float = false;
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        num.push(d);
                        chars.next();
                    } else if d == '.' && !is_float {
                        is_float = true;
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if is_float {
                    let f = num
                        .parse::<f64>()
                        .map_err(|_| QueryError::parse("$filter", raw))?;
                    tokens.push(Token::Float(f));
                } else {
                    let i = num
                        .parse::<i64>()
                        .map_err(|_| QueryError::parse("$filter", raw))?;
                    tokens.push(Token::Int(i));
                }
            }
            _ if c.is_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => return Err(QueryError::parse("$filter", raw)),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    raw: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn fail(&self) -> QueryError {
        QueryError::parse("$filter", self.raw)
    }

    fn or_expr(&mut self) -> QueryResult<FilterExpr> {
        let mut left = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Ident(kw)) if kw == "or") {
            self.next();
            let right = self.and_expr()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> QueryResult<FilterExpr> {
        let mut left = self.comparison()?;
        while matches!(self.peek(), Some(Token::Ident(kw)) if kw == "and") {
            self.next();
            let right = self.comparison()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> QueryResult<FilterExpr> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let expr = self.or_expr()?;
            if self.next() != Some(Token::RParen) {
                return Err(self.fail());
            }
            return Ok(expr);
        }
        let property = match self.next() {
            Some(Token::Ident(name)) => name,
            _ => return Err(self.fail()),
        };
        let op = match self.next() {
            Some(Token::Ident(op)) => match op.as_str() {
                "eq" => CompareOp::Eq,
                "ne" => CompareOp::Ne,
                "gt" => CompareOp::Gt,
                "ge" => CompareOp::Ge,
                "lt" => CompareOp::Lt,
                "le" => CompareOp::Le,
                _ => return Err(self.fail()),
            },
            _ => return Err(self.fail()),
        };
        let literal = match self.next() {
            Some(Token::Str(s)) => Literal::String(s),
            Some(Token::Int(i)) => Literal::Int(i),
            Some(Token::Float(f)) => Literal::Float(f),
            Some(Token::Ident(kw)) => match kw.as_str() {
                "true" => Literal::Bool(true),
                "false" => Literal::Bool(false),
                "null" => Literal::Null,
                _ => return Err(self.fail()),
            },
            _ => return Err(self.fail()),
        };
        Ok(FilterExpr::Compare {
            property,
            op,
            literal,
        })
    }
}
