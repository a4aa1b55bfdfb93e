use std::borrow::Cow;

use super::{Filter, MatchMode, Operand, Predicate, Qualifier, Selector, Sign};
use crate::error::Result;
use crate::schema::EntityDef;
use crate::sql::{Sql, Token};
use crate::value::{SqlValue, Value};

/// Alias resolution for one compilation.
///
/// Unqualified selectors use the default alias. Entity qualifiers resolve to
/// the alias registered for that entity, or to its table name.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    default: &'a str,
    entities: Vec<(&'static EntityDef, &'a str)>,
}

impl<'a> Scope<'a> {
    pub fn new(default_alias: &'a str) -> Self {
        Self {
            default: default_alias,
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, def: &'static EntityDef, alias: &'a str) -> Self {
        self.entities.push((def, alias));
        self
    }

    /// Same entity aliases with a different default.
    pub fn rebase<'b>(&self, default_alias: &'b str) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope {
            default: default_alias,
            entities: self.entities.clone(),
        }
    }

    fn alias_of(&self, selector: &Selector) -> String {
        match selector.qualifier() {
            None => self.default.to_owned(),
            Some(Qualifier::Alias(alias)) => alias.to_string(),
            Some(Qualifier::Entity(def)) => self
                .entities
                .iter()
                .find(|(candidate, _)| candidate.is(def))
                .map_or_else(|| def.table().to_owned(), |(_, alias)| (*alias).to_owned()),
        }
    }

    pub(crate) fn column(&self, selector: &Selector) -> Sql {
        Sql::column(
            self.alias_of(selector),
            Cow::Owned(selector.column().to_owned()),
        )
    }
}

impl Filter {
    /// Compiles the tree into a WHERE fragment with positional parameters.
    pub fn compile(&self, scope: &Scope<'_>) -> Result<Sql> {
        self.validate()?;
        Ok(compile_node(self, scope))
    }

    /// Compiles with `alias` as the only known table.
    pub fn to_sql(&self, alias: &str) -> Result<Sql> {
        self.compile(&Scope::new(alias))
    }
}

fn compile_node(filter: &Filter, scope: &Scope<'_>) -> Sql {
    match filter {
        Filter::Leaf(predicate) => compile_leaf(predicate, scope),
        Filter::And(left, right) => compile_operand(left, scope)
            .push(Token::AND)
            .append(compile_operand(right, scope)),
        Filter::Or(left, right) => compile_operand(left, scope)
            .push(Token::OR)
            .append(compile_operand(right, scope)),
        Filter::Not(inner) => Sql::token(Token::NOT).append(compile_node(inner, scope).parens()),
    }
}

/// Leaves stand alone; compound operands are parenthesized.
fn compile_operand(filter: &Filter, scope: &Scope<'_>) -> Sql {
    let sql = compile_node(filter, scope);
    if filter.is_leaf() { sql } else { sql.parens() }
}

fn compile_leaf(predicate: &Predicate, scope: &Scope<'_>) -> Sql {
    let column = scope.column(&predicate.selector);
    let value = match &predicate.operand {
        Operand::Column(other) => {
            return comparison(column, predicate.sign).append(scope.column(other));
        }
        Operand::Value(value) => value,
    };

    match (predicate.sign, value) {
        (Sign::Eq, Value::Null) => column.push(Token::IS).push(Token::NULL),
        (Sign::Ne, Value::Null) => column.push(Token::IS).push(Token::NOT).push(Token::NULL),
        (Sign::Eq | Sign::In, Value::List(items)) => in_list(column, items, false),
        (Sign::Ne | Sign::NotIn, Value::List(items)) => in_list(column, items, true),
        (Sign::Match(mode), value) => {
            let against = Sql::param(value.to_param()).append(match_mode(mode));
            Sql::token(Token::MATCH)
                .append(column.parens())
                .push(Token::AGAINST)
                .append(against.parens())
        }
        (sign, value) => comparison(column, sign).append(Sql::param(value.to_param())),
    }
}

fn comparison(column: Sql, sign: Sign) -> Sql {
    match sign {
        Sign::Eq => column.push(Token::EQ),
        Sign::Ne => column.push(Token::NE),
        Sign::Lt => column.push(Token::LT),
        Sign::Le => column.push(Token::LE),
        Sign::Gt => column.push(Token::GT),
        Sign::Ge => column.push(Token::GE),
        Sign::Like => column.push(Token::LIKE),
        Sign::NotLike => column.push(Token::NOT).push(Token::LIKE),
        Sign::In => column.push(Token::IN),
        Sign::NotIn => column.push(Token::NOT).push(Token::IN),
        Sign::Match(_) => column.push(Token::MATCH),
    }
}

fn match_mode(mode: MatchMode) -> Sql {
    match mode {
        MatchMode::Boolean => Sql::token(Token::IN)
            .push(Token::BOOLEAN)
            .push(Token::MODE),
        MatchMode::NaturalLanguage => Sql::token(Token::IN)
            .push(Token::NATURAL)
            .push(Token::LANGUAGE)
            .push(Token::MODE),
        MatchMode::QueryExpansion => Sql::token(Token::WITH)
            .push(Token::QUERY)
            .push(Token::EXPANSION),
    }
}

/// List membership with SQL null semantics spelled out.
///
/// `NULL` never matches `IN (...)`, so null elements become an explicit
/// `IS NULL` branch. An empty list matches nothing, or everything when
/// negated.
fn in_list(column: Sql, items: &[Value], negated: bool) -> Sql {
    let has_null = items.iter().any(Value::is_null);
    let mut rest = items
        .iter()
        .filter(|item| !item.is_null())
        .map(Value::to_param)
        .collect::<Vec<_>>();

    let null_check = |column: Sql| {
        if negated {
            column.push(Token::IS).push(Token::NOT).push(Token::NULL)
        } else {
            column.push(Token::IS).push(Token::NULL)
        }
    };
    let membership = |column: Sql, values: Vec<SqlValue>| {
        let keyword = if negated {
            column.push(Token::NOT).push(Token::IN)
        } else {
            column.push(Token::IN)
        };
        keyword.append(Sql::param(SqlValue::List(values)).parens())
    };

    match (has_null, rest.len()) {
        (false, 0) => Sql::token(if negated { Token::TRUE } else { Token::FALSE }),
        (false, _) => membership(column, rest),
        (true, 0) => null_check(column),
        (true, n) => {
            let head = if n == 1 {
                let single = rest.pop().unwrap_or_default();
                comparison(column.clone(), if negated { Sign::Ne } else { Sign::Eq })
                    .append(Sql::param(single))
            } else {
                membership(column.clone(), rest)
            };
            head.push(if negated { Token::AND } else { Token::OR })
                .append(null_check(column))
                .parens()
        }
    }
}
