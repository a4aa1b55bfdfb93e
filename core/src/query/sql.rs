//! SQL generation for [`Query`].

use std::borrow::Cow;

use super::{OrderBy, Query};
use crate::error::Result;
use crate::filter::Scope;
use crate::sql::{Sql, SqlChunk, Token};
use crate::storage::{ProjectedTable, Statement};

/// Alias and column name of the single `COUNT(*)` cell.
pub(super) const COUNT_ALIAS: &str = "count";

impl Query {
    /// Tables contributing columns to the SELECT, in projection order.
    pub fn projection(&self) -> Vec<ProjectedTable> {
        let mut projection = Vec::with_capacity(1 + self.joins.len());
        projection.push(match &self.columns {
            Some(columns) => {
                let extra = self.required.iter().filter(|column| !columns.contains(*column));
                ProjectedTable::columns(
                    self.alias.as_ref(),
                    self.def.table(),
                    columns.iter().chain(extra).copied(),
                )
            }
            None => ProjectedTable::all(self.alias.as_ref(), self.def.table()),
        });
        projection.extend(
            self.joins
                .iter()
                .filter(|join| join.selectable)
                .map(|join| ProjectedTable::all(join.alias.as_ref(), join.table.as_ref())),
        );
        projection
    }

    /// Renders the SELECT statement.
    ///
    /// ```ignore
    /// let statement = Query::new(dogs())
    ///     .r#where([("name", "Rex"), ("name2", "Max")])?
    ///     .to_sql()?;
    /// assert_eq!(
    ///     statement.sql,
    ///     "SELECT `dogs`.* FROM `dogs` WHERE `dogs`.`name` = ? AND `dogs`.`name2` = ?"
    /// );
    /// ```
    pub fn to_sql(&self) -> Result<Statement> {
        let columns = Sql::join(
            self.projection().into_iter().map(|table| match table.columns {
                Some(columns) => Sql::join(
                    columns
                        .into_iter()
                        .map(|column| Sql::column(table.alias.clone(), column)),
                    Token::COMMA,
                ),
                None => Sql::all_columns(table.alias),
            }),
            Token::COMMA,
        );

        let mut sql = Sql::token(Token::SELECT)
            .append(columns)
            .append(self.from_clause()?);

        if !self.order.is_empty() {
            let scope = self.scope();
            let terms = self.order.iter().map(|(selector, direction)| {
                scope.column(selector).push(match direction {
                    OrderBy::Asc => Token::ASC,
                    OrderBy::Desc => Token::DESC,
                })
            });
            sql = sql
                .push(Token::ORDER)
                .push(Token::BY)
                .append(Sql::join(terms, Token::COMMA));
        }

        if let Some(limit) = self.limit {
            sql = sql.push(Token::LIMIT).push(SqlChunk::Number(limit));
        }
        if let Some(offset) = self.offset {
            // SQLite and MySQL only accept OFFSET after a LIMIT
            if self.limit.is_none() {
                sql = sql.push(Token::LIMIT).push(SqlChunk::Raw(Cow::Borrowed("-1")));
            }
            sql = sql.push(Token::OFFSET).push(SqlChunk::Number(offset));
        }

        Ok(sql.build())
    }

    pub(super) fn count_sql(&self) -> Result<(Statement, Vec<ProjectedTable>)> {
        let sql = Sql::token(Token::SELECT)
            .append(Sql::raw("COUNT(*)").alias(COUNT_ALIAS))
            .append(self.from_clause()?);
        let projection = vec![ProjectedTable::columns(COUNT_ALIAS, "", [COUNT_ALIAS])];
        Ok((sql.build(), projection))
    }

    /// `FROM table [AS alias] joins [WHERE filter]`
    fn from_clause(&self) -> Result<Sql> {
        let mut sql = Sql::token(Token::FROM).append(Sql::ident(self.def.table()));
        if self.alias != self.def.table() {
            sql = sql.alias(self.alias.clone());
        }

        let scope = self.scope();
        for join in &self.joins {
            sql = sql.append(join.to_sql(&scope)?);
        }
        if let Some(filter) = &self.filter {
            sql = sql.push(Token::WHERE).append(filter.compile(&scope)?);
        }
        Ok(sql)
    }

    fn scope(&self) -> Scope<'_> {
        let mut scope = Scope::new(&self.alias).with_entity(self.def, &self.alias);
        for join in &self.joins {
            if let Some(def) = join.def {
                scope = scope.with_entity(def, &join.alias);
            }
        }
        scope
    }
}
