use serde_json::{Number, Value};

use super::error::SchemaError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Num(Value),
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::Str(s) => format!("string '{}'", s),
            Token::Num(n) => format!("number {}", n),
            Token::Dot => "'.'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Eof => "end of expression".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, SchemaError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];

        let single = match ch {
            '.' => Some(Token::Dot),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            _ => None,
        };

        if let Some(token) = single {
            tokens.push(Spanned { token, offset });
            i += 1;
            continue;
        }

        if ch.is_whitespace() {
            i += 1;
        } else if ch == '\'' || ch == '"' {
            let (text, next) = read_string(&chars, i)?;
            tokens.push(Spanned { token: Token::Str(text), offset });
            i = next;
        } else if ch == '-' || ch.is_ascii_digit() {
            let start = i;
            i += 1;
            while i < chars.len() && is_number_char(chars[i].1) {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
            tokens.push(Spanned { token: Token::Num(parse_number(&text, offset)?), offset });
        } else if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$') {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
            tokens.push(Spanned { token: Token::Ident(text), offset });
        } else {
            return Err(SchemaError::UnexpectedChar { ch, offset });
        }
    }

    tokens.push(Spanned { token: Token::Eof, offset: source.len() });
    Ok(tokens)
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')
}

fn parse_number(text: &str, offset: usize) -> Result<Value, SchemaError> {
    let invalid = || SchemaError::InvalidNumber { text: text.to_string(), offset };

    if !text.contains(['.', 'e', 'E']) {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
    }

    let f: f64 = text.parse().map_err(|_| invalid())?;
    Number::from_f64(f).map(Value::Number).ok_or_else(invalid)
}

fn read_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), SchemaError> {
    let (offset, quote) = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let ch = chars[i].1;
        if ch == quote {
            return Ok((text, i + 1));
        }
        if ch == '\\' {
            i += 1;
            let Some(&(_, escaped)) = chars.get(i) else { break };
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                'u' => {
                    let hex: String = chars.iter().skip(i + 1).take(4).map(|(_, c)| c).collect();
                    let decoded = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or(SchemaError::UnexpectedChar { ch: 'u', offset: chars[i].0 })?;
                    text.push(decoded);
                    i += 4;
                }
                other => text.push(other),
            }
        } else {
            text.push(ch);
        }
        i += 1;
    }

    Err(SchemaError::UnterminatedString { offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn tokenizes_builder_call() {
        assert_eq!(
            kinds("Type.String({ minLength: 2 })"),
            vec![
                Token::Ident("Type".into()),
                Token::Dot,
                Token::Ident("String".into()),
                Token::LParen,
                Token::LBrace,
                Token::Ident("minLength".into()),
                Token::Colon,
                Token::Num(json!(2)),
                Token::RBrace,
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn reads_strings_and_numbers() {
        assert_eq!(
            kinds(r#"'it\'s' "a\"b" -1.5 1e3"#),
            vec![
                Token::Str("it's".into()),
                Token::Str("a\"b".into()),
                Token::Num(json!(-1.5)),
                Token::Num(json!(1000.0)),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        assert_eq!(
            tokenize("Type.Literal('abc").unwrap_err(),
            SchemaError::UnterminatedString { offset: 13 }
        );
    }

    #[test]
    fn rejects_stray_characters() {
        assert!(matches!(
            tokenize("process.exit(1); Type.String()"),
            Err(SchemaError::UnexpectedChar { ch: ';', .. })
        ));
    }
}
