//! Predicate expressions attached to a rule set's `predicate` field, e.g.
//! `contains(user.spec.traits["team"], "sre") && equals(resource.labels["env"], "prod")`.
//! A small hand-written recursive-descent parser turns the source text
//! into an `Expr` tree; `Expr::eval` walks it against an `AuthContext`.

use meridian_core::model::Traits;
use meridian_core::{ErrorKind, MeridianError};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Contains(Field, String),
    Equals(Field, String),
    Literal(bool),
}

#[derive(Debug, Clone)]
pub enum Field {
    UserTrait(String),
    ResourceLabel(String),
}

pub struct EvalContext<'a> {
    pub user_traits: &'a Traits,
    pub resource_labels: &'a BTreeMap<String, String>,
}

impl Expr {
    pub fn eval(&self, ctx: &EvalContext) -> bool {
        match self {
            Expr::And(a, b) => a.eval(ctx) && b.eval(ctx),
            Expr::Or(a, b) => a.eval(ctx) || b.eval(ctx),
            Expr::Not(e) => !e.eval(ctx),
            Expr::Literal(b) => *b,
            Expr::Contains(field, needle) => field_values(field, ctx).iter().any(|v| v == needle),
            Expr::Equals(field, expected) => {
                field_values(field, ctx).len() == 1 && field_values(field, ctx)[0] == *expected
            }
        }
    }

    pub fn parse(source: &str) -> Result<Expr, MeridianError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(MeridianError::new(
                ErrorKind::InvalidArgument,
                format!("unexpected trailing input in predicate expression: {source}"),
            ));
        }
        Ok(expr)
    }
}

fn field_values(field: &Field, ctx: &EvalContext) -> Vec<String> {
    match field {
        Field::UserTrait(name) => ctx.user_traits.get(name).cloned().unwrap_or_default(),
        Field::ResourceLabel(name) => ctx
            .resource_labels
            .get(name)
            .map(|v| vec![v.clone()])
            .unwrap_or_default(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    Dot,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
}

fn tokenize(source: &str) -> Result<Vec<Token>, MeridianError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    s.push(chars[i]);
                    i += 1;
                }
                if i == chars.len() {
                    return Err(MeridianError::new(
                        ErrorKind::InvalidArgument,
                        "unterminated string literal in predicate expression",
                    ));
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut s = String::new();
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    s.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token::Ident(s));
            }
            other => {
                return Err(MeridianError::new(
                    ErrorKind::InvalidArgument,
                    format!("unexpected character '{other}' in predicate expression"),
                ))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: &Token) -> Result<(), MeridianError> {
        match self.advance() {
            Some(ref t) if t == want => Ok(()),
            other => Err(MeridianError::new(
                ErrorKind::InvalidArgument,
                format!("expected {want:?}, found {other:?}"),
            )),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, MeridianError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, MeridianError> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, MeridianError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, MeridianError> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if name == "contains" || name == "equals" => {
                self.expect(&Token::LParen)?;
                let field = self.parse_field()?;
                self.expect(&Token::Comma)?;
                let value = self.parse_string()?;
                self.expect(&Token::RParen)?;
                Ok(if name == "contains" {
                    Expr::Contains(field, value)
                } else {
                    Expr::Equals(field, value)
                })
            }
            Some(Token::Ident(name)) if name == "true" => Ok(Expr::Literal(true)),
            Some(Token::Ident(name)) if name == "false" => Ok(Expr::Literal(false)),
            other => Err(MeridianError::new(
                ErrorKind::InvalidArgument,
                format!("expected predicate term, found {other:?}"),
            )),
        }
    }

    fn parse_field(&mut self) -> Result<Field, MeridianError> {
        let root = match self.advance() {
            Some(Token::Ident(s)) => s,
            other => {
                return Err(MeridianError::new(
                    ErrorKind::InvalidArgument,
                    format!("expected field path, found {other:?}"),
                ))
            }
        };
        self.expect(&Token::Dot)?;
        match root.as_str() {
            "user" => {
                // Accept any dotted path ending in `.traits[...]`, so both
                // `user.traits[...]` and `user.spec.traits[...]` parse.
                let mut last = match self.advance() {
                    Some(Token::Ident(s)) => s,
                    other => {
                        return Err(MeridianError::new(
                            ErrorKind::InvalidArgument,
                            format!("expected field path segment, found {other:?}"),
                        ))
                    }
                };
                while matches!(self.peek(), Some(Token::Dot)) {
                    self.advance();
                    last = match self.advance() {
                        Some(Token::Ident(s)) => s,
                        other => {
                            return Err(MeridianError::new(
                                ErrorKind::InvalidArgument,
                                format!("expected field path segment, found {other:?}"),
                            ))
                        }
                    };
                }
                if last != "traits" {
                    return Err(MeridianError::new(
                        ErrorKind::InvalidArgument,
                        format!("unsupported user field path ending in '{last}'"),
                    ));
                }
                self.expect(&Token::LBracket)?;
                let key = self.parse_string()?;
                self.expect(&Token::RBracket)?;
                Ok(Field::UserTrait(key))
            }
            "resource" => {
                self.expect(&Token::Ident("labels".to_string()))?;
                self.expect(&Token::LBracket)?;
                let key = self.parse_string()?;
                self.expect(&Token::RBracket)?;
                Ok(Field::ResourceLabel(key))
            }
            other => Err(MeridianError::new(
                ErrorKind::InvalidArgument,
                format!("unknown field root '{other}'"),
            )),
        }
    }

    fn parse_string(&mut self) -> Result<String, MeridianError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(s),
            other => Err(MeridianError::new(
                ErrorKind::InvalidArgument,
                format!("expected string literal, found {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_matches_multivalued_trait() {
        let expr = Expr::parse(r#"contains(user.spec.traits["team"], "sre")"#).unwrap();
        let mut traits = Traits::new();
        traits.insert("team".into(), vec!["sre".into(), "platform".into()]);
        let ctx = EvalContext {
            user_traits: &traits,
            resource_labels: &BTreeMap::new(),
        };
        assert!(expr.eval(&ctx));
    }

    #[test]
    fn and_or_not_compose() {
        let expr = Expr::parse(
            r#"contains(user.traits["team"], "sre") && !equals(resource.labels["env"], "dev")"#,
        )
        .unwrap();
        let mut traits = Traits::new();
        traits.insert("team".into(), vec!["sre".into()]);
        let mut labels = BTreeMap::new();
        labels.insert("env".into(), "prod".into());
        let ctx = EvalContext {
            user_traits: &traits,
            resource_labels: &labels,
        };
        assert!(expr.eval(&ctx));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Expr::parse(r#"contains(user.traits["team"], "sre)"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
