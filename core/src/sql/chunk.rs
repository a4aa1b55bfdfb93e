use std::borrow::Cow;
use std::fmt::Write;

use super::escape_id_into;
use super::tokens::Token;
use crate::value::SqlValue;

/// A SQL chunk represents a part of an SQL statement.
///
/// - `Token` - SQL keywords and operators (SELECT, FROM, =, etc.)
/// - `Ident` - Escaped identifiers (`table_name`, `column_name`)
/// - `Raw` - Unescaped raw SQL text (function calls)
/// - `Number` - Unsigned integer literal (LIMIT/OFFSET)
/// - `Param` - Positional placeholder carrying its value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlChunk {
    /// Renders as: keyword with automatic spacing rules
    Token(Token),

    /// Renders as: `name` (backtick escaped)
    Ident(Cow<'static, str>),

    /// Renders as: text (no quotes, as-is)
    Raw(Cow<'static, str>),

    /// Renders as: the decimal literal
    Number(u64),

    /// Renders as: ?
    Param(SqlValue),
}

impl SqlChunk {
    #[inline]
    pub const fn ident_static(name: &'static str) -> Self {
        Self::Ident(Cow::Borrowed(name))
    }

    #[inline]
    pub fn ident(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Ident(name.into())
    }

    #[inline]
    pub fn raw(text: impl Into<Cow<'static, str>>) -> Self {
        Self::Raw(text.into())
    }

    /// Write chunk content to buffer
    pub(crate) fn write(&self, buf: &mut String) {
        match self {
            SqlChunk::Token(token) => buf.push_str(token.as_str()),
            SqlChunk::Ident(name) => escape_id_into(name, buf),
            SqlChunk::Raw(text) => buf.push_str(text),
            SqlChunk::Number(n) => {
                let _ = write!(buf, "{n}");
            }
            SqlChunk::Param(_) => buf.push('?'),
        }
    }

    /// Keywords, identifiers, literals and placeholders are separated by a
    /// space from each other.
    pub(crate) const fn is_word_like(&self) -> bool {
        match self {
            SqlChunk::Token(t) => !t.is_punctuation() && !t.is_operator(),
            SqlChunk::Ident(_) | SqlChunk::Raw(_) | SqlChunk::Number(_) | SqlChunk::Param(_) => {
                true
            }
        }
    }
}

impl From<Token> for SqlChunk {
    fn from(value: Token) -> Self {
        SqlChunk::Token(value)
    }
}

/// Canonical spacing logic for SQL chunk rendering.
pub(crate) fn chunk_needs_space(current: &SqlChunk, next: &SqlChunk) -> bool {
    if let SqlChunk::Raw(text) = current
        && text.ends_with(' ')
    {
        return false;
    }
    if let SqlChunk::Raw(text) = next
        && text.starts_with(' ')
    {
        return false;
    }

    match (current, next) {
        // No space before closing/separator punctuation
        (_, SqlChunk::Token(Token::RPAREN | Token::COMMA | Token::DOT)) => false,
        // No space after opening punctuation
        (SqlChunk::Token(Token::LPAREN | Token::DOT), _) => false,
        // Space after comma
        (SqlChunk::Token(Token::COMMA), _) => true,
        // Space after closing paren if next is word-like (e.g., ") AND")
        (SqlChunk::Token(Token::RPAREN), next) => next.is_word_like(),
        // Space before opening paren if preceded by word-like (e.g., "IN (")
        (current, SqlChunk::Token(Token::LPAREN)) => current.is_word_like(),
        // Space around comparison operators
        (SqlChunk::Token(t), _) if t.is_operator() => true,
        (_, SqlChunk::Token(t)) if t.is_operator() => true,
        // Space between all word-like chunks
        _ => current.is_word_like() && next.is_word_like(),
    }
}
