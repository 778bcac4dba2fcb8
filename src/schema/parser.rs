use serde_json::Value;

use super::error::SchemaError;
use super::lexer::{tokenize, Spanned, Token};

/// Syntax tree of a schema expression. Nothing here is evaluated; the
/// compiler decides which calls and literals mean something.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Call {
        namespace: String,
        name: String,
        args: Vec<Expr>,
        offset: usize,
    },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Literal(Value),
}

pub fn parse(source: &str) -> Result<Expr, SchemaError> {
    if source.trim().is_empty() {
        return Err(SchemaError::Empty);
    }

    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };
    let expr = parser.expr()?;
    parser.expect(Token::Eof, "end of expression")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Spanned {
        // tokenize always ends with Eof, and we never advance past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Spanned {
        let spanned = self.peek().clone();
        if spanned.token != Token::Eof {
            self.pos += 1;
        }
        spanned
    }

    fn unexpected(&self, expected: &str) -> SchemaError {
        let current = self.peek();
        SchemaError::Expected {
            expected: expected.to_string(),
            found: current.token.describe(),
            offset: current.offset,
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), SchemaError> {
        if self.peek().token == token {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if &self.peek().token == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, SchemaError> {
        let Spanned { token, offset } = self.peek().clone();
        match token {
            Token::LBrace => self.object(),
            Token::LBracket => self.array(),
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::Num(n) => {
                self.advance();
                Ok(Expr::Literal(n))
            }
            Token::Ident(ident) => match ident.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Literal(Value::Bool(true)))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Literal(Value::Bool(false)))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Literal(Value::Null))
                }
                _ => self.call(ident, offset),
            },
            _ => Err(self.unexpected("a schema expression")),
        }
    }

    fn call(&mut self, namespace: String, offset: usize) -> Result<Expr, SchemaError> {
        self.advance();
        self.expect(Token::Dot, "'.' after namespace")?;

        let name = match self.peek().token.clone() {
            Token::Ident(name) => {
                self.advance();
                name
            }
            _ => return Err(self.unexpected("a builder name")),
        };

        self.expect(Token::LParen, "'('")?;
        let args = self.list(Token::RParen, "',' or ')'")?;

        Ok(Expr::Call { namespace, name, args, offset })
    }

    fn array(&mut self) -> Result<Expr, SchemaError> {
        self.advance();
        Ok(Expr::Array(self.list(Token::RBracket, "',' or ']'")?))
    }

    /// Comma separated expressions up to `close`, trailing comma allowed
    fn list(&mut self, close: Token, expected: &str) -> Result<Vec<Expr>, SchemaError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.expr()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, expected)?;
                return Ok(items);
            }
        }
    }

    fn object(&mut self) -> Result<Expr, SchemaError> {
        self.advance();
        let mut entries = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expr::Object(entries));
            }

            let key = match self.peek().token.clone() {
                Token::Ident(key) | Token::Str(key) => {
                    self.advance();
                    key
                }
                _ => return Err(self.unexpected("a property name")),
            };
            self.expect(Token::Colon, "':'")?;
            entries.push((key, self.expr()?));

            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace, "',' or '}'")?;
                return Ok(Expr::Object(entries));
            }
        }
    }
}
