//! Argument tokenizer: splits a comma-separated argument list respecting
//! quoted strings, then classifies each token's syntactic kind.

use logos::Logos;

use crate::error::{ErrorKind, RvmError};
use crate::instruction::{Arg, ArgKind, ArgLiteral, Pos};

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t]+")]
enum Token {
    #[regex(r"-?[0-9]+\.[0-9]+")]
    Float,
    #[regex(r"-?[0-9]+")]
    Int,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", priority = 3)]
    PlainIdentifier,
    #[regex(r"[A-Za-z][A-Za-z0-9_\-]*")]
    HyphenatedWord,
}

/// Splits `"a, \"b, c\", 3"` into `["a", "\"b, c\"", "3"]`, keeping commas
/// inside string literals intact.
pub fn split_args(src: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escape = false;
    for c in src.chars() {
        if escape {
            current.push(c);
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => {
                current.push(c);
                escape = true;
            }
            '"' => {
                in_string = !in_string;
                current.push(c);
            }
            ',' if !in_string => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !out.is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

/// Classifies one raw argument token into an [`Arg`].
pub fn classify_literal(raw: &str, pos: &Pos) -> Result<Arg, RvmError> {
    if raw.starts_with('"') {
        let body = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')).ok_or_else(|| {
            RvmError::new(ErrorKind::SyntaxError, pos.clone(), raw.to_string(), "unterminated string literal")
        })?;
        let unescaped = unescape(body, pos)?;
        return Ok(Arg { pos: pos.clone(), kind: ArgKind::String, literal: ArgLiteral::Str(unescaped) });
    }

    let mut lexer = Token::lexer(raw);
    match lexer.next() {
        Some(Ok(Token::Int)) if lexer.slice() == raw => {
            let n: i64 = raw.parse().unwrap();
            Ok(Arg { pos: pos.clone(), kind: ArgKind::Number, literal: ArgLiteral::Int(n) })
        }
        Some(Ok(Token::Float)) if lexer.slice() == raw => {
            let f: f64 = raw.parse().unwrap();
            Ok(Arg { pos: pos.clone(), kind: ArgKind::Number, literal: ArgLiteral::Float(f) })
        }
        Some(Ok(Token::PlainIdentifier)) if lexer.slice() == raw => {
            Ok(Arg { pos: pos.clone(), kind: ArgKind::Identifier, literal: ArgLiteral::Name(raw.to_string()) })
        }
        Some(Ok(Token::HyphenatedWord)) if lexer.slice() == raw => {
            Ok(Arg { pos: pos.clone(), kind: ArgKind::Keyword, literal: ArgLiteral::Name(raw.to_string()) })
        }
        _ => Ok(Arg { pos: pos.clone(), kind: ArgKind::Unknown, literal: ArgLiteral::Name(raw.to_string()) }),
    }
}

fn unescape(body: &str, pos: &Pos) -> Result<String, RvmError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(RvmError::new(ErrorKind::SyntaxError, pos.clone(), body.to_string(), "truncated \\x escape"));
                };
                let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                    .map_err(|_| RvmError::new(ErrorKind::SyntaxError, pos.clone(), body.to_string(), "invalid \\x escape"))?;
                out.push(byte as char);
            }
            Some(other) => {
                return Err(RvmError::new(ErrorKind::SyntaxError, pos.clone(), body.to_string(), format!("unknown escape '\\{other}'")));
            }
            None => return Err(RvmError::new(ErrorKind::SyntaxError, pos.clone(), body.to_string(), "trailing backslash")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_respecting_quoted_commas() {
        let parts = split_args(r#"a, "b, c", 3"#);
        assert_eq!(parts, vec!["a", "\"b, c\"", "3"]);
    }

    #[test]
    fn classifies_number_identifier_and_keyword() {
        let pos = Pos::unknown();
        assert_eq!(classify_literal("42", &pos).unwrap().kind, ArgKind::Number);
        assert_eq!(classify_literal("foo", &pos).unwrap().kind, ArgKind::Identifier);
        assert_eq!(classify_literal("tp-int", &pos).unwrap().kind, ArgKind::Keyword);
    }

    #[test]
    fn unescapes_newline_and_hex() {
        let pos = Pos::unknown();
        let arg = classify_literal("\"a\\nb\\x41\"", &pos).unwrap();
        assert_eq!(arg.literal, ArgLiteral::Str("a\nbA".to_string()));
    }
}
