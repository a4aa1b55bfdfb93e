mod chunk;
mod tokens;

pub use chunk::*;
pub use tokens::*;

use core::fmt::{self, Display};
use std::borrow::Cow;

use smallvec::SmallVec;

use crate::value::SqlValue;

/// SQL fragment builder with flat chunk storage.
///
/// Uses `SmallVec<[SqlChunk; 8]>` for inline storage of typical SQL fragments
/// without heap allocation. Parameters travel with the fragment and are
/// emitted as positional `?` markers in render order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    pub chunks: SmallVec<[SqlChunk; 8]>,
}

impl Sql {
    // ==================== constructors ====================

    /// Creates an empty SQL fragment
    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates SQL with a single token
    #[inline]
    pub fn token(t: Token) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Token(t)],
        }
    }

    /// Creates SQL with a quoted identifier
    #[inline]
    pub fn ident(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Ident(name.into())],
        }
    }

    /// Creates SQL with raw text (unquoted)
    #[inline]
    pub fn raw(text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Raw(text.into())],
        }
    }

    /// Creates SQL with a single unsigned integer literal.
    #[inline]
    pub fn number(value: u64) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Number(value)],
        }
    }

    /// Creates SQL with a single parameter value
    #[inline]
    pub fn param(value: impl Into<SqlValue>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Param(value.into())],
        }
    }

    /// Creates a qualified column reference: `alias`.`column`
    pub fn column(
        alias: impl Into<Cow<'static, str>>,
        column: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            chunks: smallvec::smallvec![
                SqlChunk::Ident(alias.into()),
                SqlChunk::Token(Token::DOT),
                SqlChunk::Ident(column.into()),
            ],
        }
    }

    /// Creates a whole-table projection: `alias`.*
    pub fn all_columns(alias: impl Into<Cow<'static, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![
                SqlChunk::Ident(alias.into()),
                SqlChunk::Token(Token::DOT),
                SqlChunk::Token(Token::STAR),
            ],
        }
    }

    // ==================== builder methods ====================

    /// Append another SQL fragment (flat extend)
    #[inline]
    pub fn append(mut self, other: impl Into<Sql>) -> Self {
        self.append_mut(other);
        self
    }

    #[inline]
    pub fn append_mut(&mut self, other: impl Into<Sql>) {
        let other = other.into();
        if self.chunks.is_empty() {
            self.chunks = other.chunks;
            return;
        }
        if other.chunks.is_empty() {
            return;
        }
        self.chunks.extend(other.chunks);
    }

    /// Push a single chunk
    #[inline]
    pub fn push(mut self, chunk: impl Into<SqlChunk>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    #[inline]
    pub fn push_mut(&mut self, chunk: impl Into<SqlChunk>) {
        self.chunks.push(chunk.into());
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    // ==================== combinators ====================

    /// Joins multiple SQL fragments with a separator
    pub fn join<I>(sqls: I, separator: Token) -> Sql
    where
        I: IntoIterator<Item = Sql>,
    {
        let mut iter = sqls.into_iter();
        let Some(mut result) = iter.next() else {
            return Sql::empty();
        };
        for item in iter {
            result.chunks.push(SqlChunk::Token(separator));
            result.chunks.extend(item.chunks);
        }
        result
    }

    /// Wrap in parentheses: (self)
    #[inline]
    pub fn parens(self) -> Self {
        Sql::token(Token::LPAREN).append(self).push(Token::RPAREN)
    }

    /// Creates an aliased version: self AS `name`
    pub fn alias(self, name: impl Into<Cow<'static, str>>) -> Sql {
        self.push(Token::AS).push(SqlChunk::Ident(name.into()))
    }

    // ==================== rendering ====================

    /// Renders the SQL text only.
    pub fn sql(&self) -> String {
        let mut buf = String::with_capacity(self.chunks.len().saturating_mul(8).max(64));
        self.write_to(&mut buf);
        buf
    }

    /// Iterates parameters in placeholder order.
    pub fn params(&self) -> impl Iterator<Item = &SqlValue> {
        self.chunks.iter().filter_map(|chunk| match chunk {
            SqlChunk::Param(value) => Some(value),
            _ => None,
        })
    }

    /// Renders the text and collects the parameters in a single pass.
    pub fn build(self) -> Statement {
        let mut sql = String::with_capacity(self.chunks.len().saturating_mul(8).max(64));
        self.write_to(&mut sql);
        let params = self
            .chunks
            .into_iter()
            .filter_map(|chunk| match chunk {
                SqlChunk::Param(value) => Some(value),
                _ => None,
            })
            .collect();
        Statement { sql, params }
    }

    fn write_to(&self, buf: &mut String) {
        for (i, chunk) in self.chunks.iter().enumerate() {
            chunk.write(buf);
            if let Some(next) = self.chunks.get(i + 1)
                && chunk_needs_space(chunk, next)
            {
                buf.push(' ');
            }
        }
    }
}

impl From<Token> for Sql {
    fn from(value: Token) -> Self {
        Sql::token(value)
    }
}

impl FromIterator<SqlChunk> for Sql {
    fn from_iter<I: IntoIterator<Item = SqlChunk>>(iter: I) -> Self {
        Self {
            chunks: iter.into_iter().collect(),
        }
    }
}

impl Display for Sql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

/// A rendered statement: SQL text with positional `?` markers and the
/// parameters bound to them, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            f.write_str(" -- [")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{param}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// Escapes an identifier with backticks, doubling embedded backticks.
pub fn escape_id(name: &str) -> String {
    let mut buf = String::with_capacity(name.len() + 2);
    escape_id_into(name, &mut buf);
    buf
}

pub(crate) fn escape_id_into(name: &str, buf: &mut String) {
    buf.push('`');
    for ch in name.chars() {
        if ch == '`' {
            buf.push('`');
        }
        buf.push(ch);
    }
    buf.push('`');
}
