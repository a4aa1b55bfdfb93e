//! Filter trees and their compilation into parameterized WHERE fragments.
//!
//! A [`Filter`] is an immutable tree of leaf comparisons combined with
//! AND, OR and NOT. Leaves name a column through a [`Selector`], which may
//! carry a table alias or an entity qualifier.

mod compile;
pub mod conditions;

pub use compile::Scope;
pub use conditions::*;

use core::fmt;
use std::borrow::Cow;

use crate::error::{Result, UsageError};
use crate::schema::EntityDef;
use crate::value::Value;

/// Qualifies a selector with the table it belongs to.
#[derive(Clone)]
pub enum Qualifier {
    /// Explicit table alias
    Alias(Cow<'static, str>),
    /// Resolves to the alias the entity has in the compiling query
    Entity(&'static EntityDef),
}

impl PartialEq for Qualifier {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Qualifier::Alias(a), Qualifier::Alias(b)) => a == b,
            (Qualifier::Entity(a), Qualifier::Entity(b)) => a.is(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Alias(alias) => f.debug_tuple("Alias").field(alias).finish(),
            Qualifier::Entity(def) => f.debug_tuple("Entity").field(&def.table()).finish(),
        }
    }
}

/// Column reference inside a filter.
///
/// `"name"` targets the compiling query's own alias, `"d.name"` the alias
/// `d`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    column: Cow<'static, str>,
    qualifier: Option<Qualifier>,
}

impl Selector {
    pub fn new(column: impl Into<Cow<'static, str>>) -> Self {
        Self {
            column: column.into(),
            qualifier: None,
        }
    }

    /// Qualifies with an explicit alias.
    pub fn of(mut self, alias: impl Into<Cow<'static, str>>) -> Self {
        self.qualifier = Some(Qualifier::Alias(alias.into()));
        self
    }

    /// Qualifies with whatever alias `def` has in the compiling query.
    pub fn on(mut self, def: &'static EntityDef) -> Self {
        self.qualifier = Some(Qualifier::Entity(def));
        self
    }

    #[inline]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[inline]
    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }
}

impl From<&'static str> for Selector {
    fn from(path: &'static str) -> Self {
        match path.split_once('.') {
            Some((alias, column)) => Selector::new(column).of(alias),
            None => Selector::new(path),
        }
    }
}

impl From<String> for Selector {
    fn from(path: String) -> Self {
        match path.split_once('.') {
            Some((alias, column)) => Selector::new(column.to_owned()).of(alias.to_owned()),
            None => Selector::new(path),
        }
    }
}

/// Full-text search mode for [`Sign::Match`].
///
/// The modes map to MySQL's `AGAINST (... IN <mode>)` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Boolean,
    NaturalLanguage,
    QueryExpansion,
}

/// Comparison operator of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    Match(MatchMode),
    In,
    NotIn,
}

impl Sign {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Sign::Eq => "=",
            Sign::Ne => "<>",
            Sign::Lt => "<",
            Sign::Le => "<=",
            Sign::Gt => ">",
            Sign::Ge => ">=",
            Sign::Like => "LIKE",
            Sign::NotLike => "NOT LIKE",
            Sign::Match(_) => "MATCH",
            Sign::In => "IN",
            Sign::NotIn => "NOT IN",
        }
    }

    /// The sign selecting exactly the complementary rows, if there is one.
    pub const fn inverse(&self) -> Option<Sign> {
        Some(match self {
            Sign::Eq => Sign::Ne,
            Sign::Ne => Sign::Eq,
            Sign::Lt => Sign::Ge,
            Sign::Ge => Sign::Lt,
            Sign::Gt => Sign::Le,
            Sign::Le => Sign::Gt,
            Sign::Like => Sign::NotLike,
            Sign::NotLike => Sign::Like,
            Sign::In => Sign::NotIn,
            Sign::NotIn => Sign::In,
            Sign::Match(_) => return None,
        })
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a leaf comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    /// Another column, used by join conditions
    Column(Selector),
}

/// A single comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub selector: Selector,
    pub sign: Sign,
    pub operand: Operand,
}

/// Immutable filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Leaf(Predicate),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn leaf(selector: impl Into<Selector>, sign: Sign, value: impl Into<Value>) -> Self {
        Filter::Leaf(Predicate {
            selector: selector.into(),
            sign,
            operand: Operand::Value(value.into()),
        })
    }

    #[inline]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Filter::Leaf(_))
    }

    pub fn and(self, other: Filter) -> Filter {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Filter {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Negates the filter.
    ///
    /// Invertible leaves flip their sign in place and a negated negation
    /// unwraps, so `x.negate().negate() == x` for every tree built from
    /// invertible leaves.
    #[allow(clippy::should_implement_trait)]
    pub fn negate(self) -> Filter {
        match self {
            Filter::Leaf(Predicate {
                selector,
                sign,
                operand,
            }) => match sign.inverse() {
                Some(inverse) => Filter::Leaf(Predicate {
                    selector,
                    sign: inverse,
                    operand,
                }),
                None => Filter::Not(Box::new(Filter::Leaf(Predicate {
                    selector,
                    sign,
                    operand,
                }))),
            },
            Filter::Not(inner) => *inner,
            other => Filter::Not(Box::new(other)),
        }
    }

    /// Checks operand shapes against their signs.
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Leaf(predicate) => predicate.validate(),
            Filter::And(l, r) | Filter::Or(l, r) => {
                l.validate()?;
                r.validate()
            }
            Filter::Not(inner) => inner.validate(),
        }
    }
}

impl Predicate {
    fn validate(&self) -> Result<()> {
        let invalid = |operand: &'static str| -> Result<()> {
            Err(UsageError::InvalidOperand {
                column: self.selector.column().to_owned(),
                sign: self.sign.as_str(),
                operand,
            }
            .into())
        };
        match (&self.operand, self.sign) {
            (Operand::Column(_), Sign::In | Sign::NotIn | Sign::Match(_)) => invalid("column"),
            (Operand::Column(_), _) => Ok(()),
            (Operand::Value(Value::List(_)), Sign::Eq | Sign::Ne | Sign::In | Sign::NotIn) => {
                Ok(())
            }
            (Operand::Value(Value::List(_)), _) => invalid("list"),
            (Operand::Value(_), Sign::In | Sign::NotIn) => Err(UsageError::InExpectsList {
                column: self.selector.column().to_owned(),
            }
            .into()),
            (Operand::Value(Value::Null), Sign::Match(_) | Sign::Like | Sign::NotLike) => {
                invalid("null")
            }
            (Operand::Value(_), _) => Ok(()),
        }
    }
}

impl core::ops::Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        self.negate()
    }
}

/// Conversion of filter-shaped arguments accepted by the query builder.
///
/// Implemented for a ready [`Filter`], a list of filters (combined with
/// AND), a `(column, value)` equality, a `(column, sign, value)` comparison
/// and a list of `(column, value)` equalities.
pub trait IntoFilter {
    fn into_filter(self) -> Result<Filter>;
}

impl IntoFilter for Filter {
    fn into_filter(self) -> Result<Filter> {
        self.validate()?;
        Ok(self)
    }
}

impl IntoFilter for Vec<Filter> {
    fn into_filter(self) -> Result<Filter> {
        let filter = all(self)?;
        filter.validate()?;
        Ok(filter)
    }
}

impl<const N: usize> IntoFilter for [Filter; N] {
    fn into_filter(self) -> Result<Filter> {
        Vec::from(self).into_filter()
    }
}

impl<S, V> IntoFilter for (S, V)
where
    S: Into<Selector>,
    V: Into<Value>,
{
    fn into_filter(self) -> Result<Filter> {
        eq(self.0, self.1).into_filter()
    }
}

impl<S, V> IntoFilter for (S, Sign, V)
where
    S: Into<Selector>,
    V: Into<Value>,
{
    fn into_filter(self) -> Result<Filter> {
        Filter::leaf(self.0, self.1, self.2).into_filter()
    }
}

impl<S, V> IntoFilter for Vec<(S, V)>
where
    S: Into<Selector>,
    V: Into<Value>,
{
    fn into_filter(self) -> Result<Filter> {
        let filter = from_pairs(self)?;
        filter.validate()?;
        Ok(filter)
    }
}

impl<S, V, const N: usize> IntoFilter for [(S, V); N]
where
    S: Into<Selector>,
    V: Into<Value>,
{
    fn into_filter(self) -> Result<Filter> {
        Vec::from(self).into_filter()
    }
}
