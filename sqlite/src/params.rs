//! Placeholder expansion for list parameters.

use tether_core::{SqlValue, Statement};

use crate::error::SqliteError;

/// Rewrites `statement` so that every [`SqlValue::List`] parameter gets one
/// `?` per element.
///
/// An empty list becomes `NULL`, so `x IN (NULL)` matches nothing. Markers
/// inside quoted strings and identifiers are left alone.
///
/// ```ignore
/// let statement = Statement::new(
///     "SELECT * FROM `dogs` WHERE `id` IN (?) AND `name` = ?",
///     vec![SqlValue::List(vec![1.into(), 2.into()]), "Rex".into()],
/// );
/// let (sql, params) = expand_params(&statement)?;
/// assert_eq!(sql, "SELECT * FROM `dogs` WHERE `id` IN (?, ?) AND `name` = ?");
/// assert_eq!(params.len(), 3);
/// ```
pub fn expand_params(statement: &Statement) -> Result<(String, Vec<SqlValue>), SqliteError> {
    if !statement.params.iter().any(|p| matches!(p, SqlValue::List(_))) {
        let markers = count_markers(&statement.sql);
        if markers != statement.params.len() {
            return Err(SqliteError::ParamCount {
                markers,
                params: statement.params.len(),
            });
        }
        return Ok((statement.sql.clone(), statement.params.clone()));
    }

    let mut sql = String::with_capacity(statement.sql.len() + 16);
    let mut params = Vec::with_capacity(statement.params.len());
    let mut pending = statement.params.iter();
    let mut markers = 0;
    let mut quote: Option<char> = None;

    for c in statement.sql.chars() {
        match (quote, c) {
            (Some(open), c) if c == open => {
                quote = None;
                sql.push(c);
            }
            (Some(_), c) => sql.push(c),
            (None, '\'' | '"' | '`') => {
                quote = Some(c);
                sql.push(c);
            }
            (None, '?') => {
                markers += 1;
                match pending.next() {
                    Some(SqlValue::List(items)) => {
                        let start = params.len();
                        flatten(items, &mut params);
                        let count = params.len() - start;
                        if count == 0 {
                            sql.push_str("NULL");
                        } else {
                            for i in 0..count {
                                if i > 0 {
                                    sql.push_str(", ");
                                }
                                sql.push('?');
                            }
                        }
                    }
                    Some(value) => {
                        params.push(value.clone());
                        sql.push('?');
                    }
                    None => sql.push('?'),
                }
            }
            (None, c) => sql.push(c),
        }
    }

    if markers != statement.params.len() {
        return Err(SqliteError::ParamCount {
            markers,
            params: statement.params.len(),
        });
    }
    Ok((sql, params))
}

fn flatten(items: &[SqlValue], out: &mut Vec<SqlValue>) {
    for item in items {
        match item {
            SqlValue::List(nested) => flatten(nested, out),
            other => out.push(other.clone()),
        }
    }
}

fn count_markers(sql: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut markers = 0;
    for c in sql.chars() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '?') => markers += 1,
            _ => {}
        }
    }
    markers
}
