use std::borrow::Cow;
use std::rc::Rc;

use super::{OrderBy, Query};
use crate::db::Db;
use crate::entity::EntityRef;
use crate::error::Result;
use crate::filter::{IntoFilter, Selector};
use crate::join::{JoinNode, JoinType};
use crate::relation::Relation;
use crate::schema::EntityDef;
use crate::storage::AliasedRow;

/// Anything that names a relation of a given entity.
///
/// A `&str` may be a dotted path such as `"animal.owner"`, which loads
/// `owner` nested under `animal`.
pub trait WithRelation {
    fn resolve(self, owner: &'static EntityDef) -> Result<Relation>;
}

impl WithRelation for Relation {
    fn resolve(self, _owner: &'static EntityDef) -> Result<Relation> {
        Ok(self)
    }
}

impl WithRelation for &str {
    fn resolve(self, owner: &'static EntityDef) -> Result<Relation> {
        let (head, rest) = match self.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (self, None),
        };
        let relation = owner.relation(head)?.clone();
        match rest {
            Some(rest) => relation.with(rest),
            None => Ok(relation),
        }
    }
}

impl Query {
    /// Restricts the base projection to `columns`. The primary key is always
    /// selected.
    pub fn select(mut self, columns: impl IntoIterator<Item = &'static str>) -> Result<Self> {
        let mut selected = Vec::new();
        let primary = self.def.primary().name();
        selected.push(primary);
        for column in columns {
            self.def.require_column(column)?;
            if !selected.contains(&column) {
                selected.push(column);
            }
        }
        self.columns = Some(selected);
        Ok(self)
    }

    // ==================== filters ====================

    /// Replaces the filter.
    pub fn r#where(mut self, filter: impl IntoFilter) -> Result<Self> {
        self.filter = Some(filter.into_filter()?);
        Ok(self)
    }

    /// Combines with the current filter using AND.
    pub fn and_where(mut self, filter: impl IntoFilter) -> Result<Self> {
        let filter = filter.into_filter()?;
        self.filter = Some(match self.filter.take() {
            Some(current) => current.and(filter),
            None => filter,
        });
        Ok(self)
    }

    /// Combines with the current filter using OR.
    pub fn or_where(mut self, filter: impl IntoFilter) -> Result<Self> {
        let filter = filter.into_filter()?;
        self.filter = Some(match self.filter.take() {
            Some(current) => current.or(filter),
            None => filter,
        });
        Ok(self)
    }

    /// Replaces the filter with its negation.
    pub fn where_not(self, filter: impl IntoFilter) -> Result<Self> {
        let filter = filter.into_filter()?;
        self.r#where(filter.negate())
    }

    pub fn and_where_not(self, filter: impl IntoFilter) -> Result<Self> {
        let filter = filter.into_filter()?;
        self.and_where(filter.negate())
    }

    pub fn or_where_not(self, filter: impl IntoFilter) -> Result<Self> {
        let filter = filter.into_filter()?;
        self.or_where(filter.negate())
    }

    // ==================== joins ====================

    /// Inner join `def` as `alias`. Unqualified columns in `on` refer to the
    /// joined table.
    pub fn join(
        self,
        def: &'static EntityDef,
        alias: impl Into<Cow<'static, str>>,
        on: impl IntoFilter,
    ) -> Result<Self> {
        self.join_kind(JoinType::Inner, def, alias, on)
    }

    pub fn left_join(
        self,
        def: &'static EntityDef,
        alias: impl Into<Cow<'static, str>>,
        on: impl IntoFilter,
    ) -> Result<Self> {
        self.join_kind(JoinType::Left, def, alias, on)
    }

    pub fn right_join(
        self,
        def: &'static EntityDef,
        alias: impl Into<Cow<'static, str>>,
        on: impl IntoFilter,
    ) -> Result<Self> {
        self.join_kind(JoinType::Right, def, alias, on)
    }

    fn join_kind(
        self,
        kind: JoinType,
        def: &'static EntityDef,
        alias: impl Into<Cow<'static, str>>,
        on: impl IntoFilter,
    ) -> Result<Self> {
        let on = on.into_filter()?;
        Ok(self.join_node(JoinNode::new(kind, def, alias, on)))
    }

    /// Attaches a prepared join node.
    pub fn join_node(mut self, node: JoinNode) -> Self {
        self.joins.push(node);
        self
    }

    // ==================== shaping ====================

    pub fn order_by(mut self, column: impl Into<Selector>, direction: OrderBy) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit_offset(self, limit: u64, offset: u64) -> Self {
        self.limit(limit).offset(offset)
    }

    // ==================== relations ====================

    /// Loads `relation` on every fetched entity.
    ///
    /// ```ignore
    /// Query::new(dogs()).with("animal")?.with("tags")?;
    /// Query::new(dogs()).with(dogs().relation("owner")?.clone().with("animal")?)?;
    /// ```
    pub fn with(self, relation: impl WithRelation) -> Result<Self> {
        let relation = relation.resolve(self.def)?;
        relation.apply(self)
    }

    /// Registers a post-fetch hook.
    pub fn hook(
        mut self,
        hook: impl Fn(&Db, &[EntityRef], &[AliasedRow]) -> Result<()> + 'static,
    ) -> Self {
        self.hooks.push(Rc::new(hook));
        self
    }

    /// Keeps `column` of the base entity in the projection whatever
    /// `select` chooses.
    pub(crate) fn require_column(mut self, column: &'static str) -> Self {
        if !self.required.contains(&column) {
            self.required.push(column);
        }
        self
    }

    /// Whether a join with `alias` is already attached.
    pub(crate) fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|join| join.alias == alias)
    }
}
