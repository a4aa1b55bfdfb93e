use super::{Filter, MatchMode, Operand, Predicate, Selector, Sign};
use crate::error::{Result, UsageError};
use crate::value::Value;

/// Create an equality condition (=)
///
/// A null value compiles to `IS NULL`, a list value to `IN`.
///
/// # Example
/// ```ignore
/// let condition = eq("name", "Rex");
/// assert_eq!(condition.to_sql("dogs")?.sql(), "`dogs`.`name` = ?");
/// ```
pub fn eq(selector: impl Into<Selector>, value: impl Into<Value>) -> Filter {
    Filter::leaf(selector, Sign::Eq, value)
}

/// Create a not-equal condition (<>)
pub fn neq(selector: impl Into<Selector>, value: impl Into<Value>) -> Filter {
    Filter::leaf(selector, Sign::Ne, value)
}

/// Create a greater-than condition (>)
pub fn gt(selector: impl Into<Selector>, value: impl Into<Value>) -> Filter {
    Filter::leaf(selector, Sign::Gt, value)
}

/// Create a greater-than-or-equal condition (>=)
pub fn gte(selector: impl Into<Selector>, value: impl Into<Value>) -> Filter {
    Filter::leaf(selector, Sign::Ge, value)
}

/// Create a less-than condition (<)
pub fn lt(selector: impl Into<Selector>, value: impl Into<Value>) -> Filter {
    Filter::leaf(selector, Sign::Lt, value)
}

/// Create a less-than-or-equal condition (<=)
pub fn lte(selector: impl Into<Selector>, value: impl Into<Value>) -> Filter {
    Filter::leaf(selector, Sign::Le, value)
}

/// Create a LIKE condition
pub fn like(selector: impl Into<Selector>, pattern: impl Into<Value>) -> Filter {
    Filter::leaf(selector, Sign::Like, pattern)
}

/// Create a NOT LIKE condition
pub fn not_like(selector: impl Into<Selector>, pattern: impl Into<Value>) -> Filter {
    Filter::leaf(selector, Sign::NotLike, pattern)
}

/// Create an IN condition
///
/// # Example
/// ```ignore
/// let condition = in_array("id", [1, 3]);
/// assert_eq!(condition.to_sql("dogs")?.sql(), "`dogs`.`id` IN (?)");
/// ```
pub fn in_array<I, T>(selector: impl Into<Selector>, values: I) -> Filter
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
    Filter::leaf(selector, Sign::In, Value::List(values))
}

/// Create a NOT IN condition
pub fn not_in_array<I, T>(selector: impl Into<Selector>, values: I) -> Filter
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
    Filter::leaf(selector, Sign::NotIn, Value::List(values))
}

/// Create an IS NULL condition
pub fn is_null(selector: impl Into<Selector>) -> Filter {
    Filter::leaf(selector, Sign::Eq, Value::Null)
}

/// Create an IS NOT NULL condition
pub fn is_not_null(selector: impl Into<Selector>) -> Filter {
    Filter::leaf(selector, Sign::Ne, Value::Null)
}

/// Create a full-text match in boolean mode
///
/// Renders MySQL `MATCH ... AGAINST` syntax. SQLite has no such operator and
/// fails to prepare the statement, which surfaces as a storage error.
///
/// # Example
/// ```ignore
/// let condition = match_against("bio", "+good -bad");
/// assert_eq!(
///     condition.to_sql("dogs")?.sql(),
///     "MATCH (`dogs`.`bio`) AGAINST (? IN BOOLEAN MODE)"
/// );
/// ```
pub fn match_against(selector: impl Into<Selector>, text: impl Into<Value>) -> Filter {
    match_with_mode(selector, text, MatchMode::Boolean)
}

/// Create a full-text match with an explicit search mode
///
/// MySQL syntax, see [`match_against`].
pub fn match_with_mode(
    selector: impl Into<Selector>,
    text: impl Into<Value>,
    mode: MatchMode,
) -> Filter {
    Filter::leaf(selector, Sign::Match(mode), text)
}

/// Compare two columns, e.g. for join conditions
///
/// # Example
/// ```ignore
/// let on = compare_columns("animal.id", Sign::Eq, "dogs.animal_id");
/// ```
pub fn compare_columns(
    left: impl Into<Selector>,
    sign: Sign,
    right: impl Into<Selector>,
) -> Filter {
    Filter::Leaf(Predicate {
        selector: left.into(),
        sign,
        operand: Operand::Column(right.into()),
    })
}

/// Create a column equality condition
pub fn eq_columns(left: impl Into<Selector>, right: impl Into<Selector>) -> Filter {
    compare_columns(left, Sign::Eq, right)
}

/// Negate a condition
///
/// Leaves with an inverse sign are flipped instead of wrapped.
pub fn not(filter: Filter) -> Filter {
    filter.negate()
}

/// Combine two conditions with AND
pub fn and(left: Filter, right: Filter) -> Filter {
    left.and(right)
}

/// Combine two conditions with OR
pub fn or(left: Filter, right: Filter) -> Filter {
    left.or(right)
}

/// Combine conditions with AND as a right-associative chain
///
/// An empty input is a usage error.
///
/// # Example
/// ```ignore
/// let condition = all([eq("a", 1), eq("b", 2), eq("c", 3)])?;
/// assert_eq!(condition, and(eq("a", 1), and(eq("b", 2), eq("c", 3))));
/// ```
pub fn all(filters: impl IntoIterator<Item = Filter>) -> Result<Filter> {
    fold_right(filters, Filter::and)
}

/// Combine conditions with OR as a right-associative chain
pub fn any(filters: impl IntoIterator<Item = Filter>) -> Result<Filter> {
    fold_right(filters, Filter::or)
}

/// Equalities from a flat `(column, value)` mapping, combined with AND
///
/// # Example
/// ```ignore
/// let condition = from_pairs([("name", "Rex"), ("color", "brown")])?;
/// assert_eq!(condition, and(eq("name", "Rex"), eq("color", "brown")));
/// ```
pub fn from_pairs<S, V>(pairs: impl IntoIterator<Item = (S, V)>) -> Result<Filter>
where
    S: Into<Selector>,
    V: Into<Value>,
{
    all(pairs.into_iter().map(|(selector, value)| eq(selector, value)))
}

fn fold_right(
    filters: impl IntoIterator<Item = Filter>,
    combine: fn(Filter, Filter) -> Filter,
) -> Result<Filter> {
    let mut filters = filters.into_iter().collect::<Vec<_>>();
    let Some(mut acc) = filters.pop() else {
        return Err(UsageError::EmptyFilter.into());
    };
    while let Some(filter) = filters.pop() {
        acc = combine(filter, acc);
    }
    Ok(acc)
}
