//! Restricted SQL lexer.
//!
//! Tokenizes with sqlparser's PostgreSQL rules, so comments, string literals
//! (standard, `E'…'` and dollar-quoted) and quoted identifiers end exactly
//! where the server ends them. The result is reduced to the handful of token
//! shapes the validator inspects. Whitespace and comments are dropped.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token as SqlToken, Tokenizer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unquoted word: keyword or identifier.
    Word(String),
    /// `"name"`; always an identifier.
    Quoted(String),
    /// String or numeric literal, as written. Its content is never inspected.
    Literal(String),
    /// One of `( ) , . = * ;`.
    Symbol(char),
    /// Any other operator or punctuation (`<=`, `::`, `#`, `$1`, …).
    Operator(String),
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    pub fn is_symbol(&self, symbol: char) -> bool {
        matches!(self, Token::Symbol(c) if *c == symbol)
    }

    /// Identifier text, if this token can name a table, alias or column.
    pub fn ident(&self) -> Option<&str> {
        match self {
            Token::Word(w) if !w.starts_with(|c: char| c.is_ascii_digit()) => Some(w),
            Token::Quoted(q) => Some(q),
            _ => None,
        }
    }

    pub fn text(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Quoted(q) => format!("\"{}\"", q),
            Token::Literal(l) => l.clone(),
            Token::Symbol(c) => c.to_string(),
            Token::Operator(o) => o.clone(),
        }
    }
}

/// Tokenize `sql`; fails on input the server could not tokenize either
/// (unterminated literal or comment).
pub fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    let dialect = PostgreSqlDialect {};
    let raw = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| e.to_string())?;

    Ok(raw.into_iter().filter_map(convert).collect())
}

fn convert(token: SqlToken) -> Option<Token> {
    let converted = match token {
        SqlToken::Whitespace(_) => return None,
        SqlToken::Word(word) => match word.quote_style {
            Some(_) => Token::Quoted(word.value),
            None => Token::Word(word.value),
        },
        SqlToken::LParen => Token::Symbol('('),
        SqlToken::RParen => Token::Symbol(')'),
        SqlToken::Comma => Token::Symbol(','),
        SqlToken::Period => Token::Symbol('.'),
        SqlToken::Eq => Token::Symbol('='),
        SqlToken::Mul => Token::Symbol('*'),
        SqlToken::SemiColon => Token::Symbol(';'),
        literal @ (SqlToken::Number(..)
        | SqlToken::SingleQuotedString(_)
        | SqlToken::DollarQuotedString(_)
        | SqlToken::NationalStringLiteral(_)
        | SqlToken::EscapedStringLiteral(_)
        | SqlToken::HexStringLiteral(_)) => Token::Literal(literal.to_string()),
        other => Token::Operator(other.to_string()),
    };
    Some(converted)
}
