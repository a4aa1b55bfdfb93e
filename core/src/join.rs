//! Join nodes attached to a query.

use std::borrow::Cow;

use crate::error::Result;
use crate::filter::{Filter, Scope};
use crate::schema::EntityDef;
use crate::sql::{Sql, Token};

/// The type of JOIN operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinType {
    fn to_sql(self) -> Sql {
        let kind = match self {
            JoinType::Inner => Token::INNER,
            JoinType::Left => Token::LEFT,
            JoinType::Right => Token::RIGHT,
        };
        Sql::token(kind).push(Token::JOIN)
    }
}

/// A joined table: `<kind> JOIN table [AS alias] ON <filter>`.
///
/// Selectable joins add `alias.*` to the projection so their columns are
/// available to post-fetch hooks.
#[derive(Debug, Clone)]
pub struct JoinNode {
    pub kind: JoinType,
    pub table: Cow<'static, str>,
    pub def: Option<&'static EntityDef>,
    pub alias: Cow<'static, str>,
    pub on: Filter,
    pub selectable: bool,
}

impl JoinNode {
    pub fn new(
        kind: JoinType,
        def: &'static EntityDef,
        alias: impl Into<Cow<'static, str>>,
        on: Filter,
    ) -> Self {
        Self {
            kind,
            table: Cow::Borrowed(def.table()),
            def: Some(def),
            alias: alias.into(),
            on,
            selectable: true,
        }
    }

    /// Joins a table without an entity definition, such as a link table.
    pub fn table(
        kind: JoinType,
        table: impl Into<Cow<'static, str>>,
        alias: impl Into<Cow<'static, str>>,
        on: Filter,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            def: None,
            alias: alias.into(),
            on,
            selectable: true,
        }
    }

    /// Keeps the join out of the projection.
    pub fn hidden(mut self) -> Self {
        self.selectable = false;
        self
    }

    /// Renders the clause. The ON filter defaults to the join's own alias.
    pub fn to_sql(&self, scope: &Scope<'_>) -> Result<Sql> {
        let mut sql = self
            .kind
            .to_sql()
            .append(Sql::ident(self.table.clone()));
        if self.alias != self.table {
            sql = sql.alias(self.alias.clone());
        }
        let on_scope = scope.rebase(&self.alias);
        Ok(sql.push(Token::ON).append(self.on.compile(&on_scope)?))
    }
}
