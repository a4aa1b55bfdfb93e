use core::fmt;
use std::sync::Arc;

use crate::codec::StructuredCodec;
use crate::value::Field;

/// Declared storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Number,
    String,
    Boolean,
    Date,
    DateTime,
    /// Compound value serialized as JSON text
    Structured,
}

impl ColumnType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Structured => "structured",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of write a save transform runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// Rewrites a field right before it is diffed and written.
pub type SaveTransform = fn(Field, WriteKind) -> Field;

/// Column declaration.
///
/// ```ignore
/// let id = ColumnDef::integer("id").primary().auto_increment();
/// let name = ColumnDef::string("name").nullable();
/// ```
#[derive(Clone)]
pub struct ColumnDef {
    name: &'static str,
    ty: ColumnType,
    primary: bool,
    auto_increment: bool,
    nullable: bool,
    skip_update: bool,
    has_default: bool,
    codec: Option<Arc<dyn StructuredCodec>>,
    transform: Option<SaveTransform>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            primary: false,
            auto_increment: false,
            nullable: false,
            skip_update: false,
            has_default: false,
            codec: None,
            transform: None,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub const fn number(name: &'static str) -> Self {
        Self::new(name, ColumnType::Number)
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, ColumnType::String)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::new(name, ColumnType::Date)
    }

    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, ColumnType::DateTime)
    }

    pub const fn structured(name: &'static str) -> Self {
        Self::new(name, ColumnType::Structured)
    }

    /// Shorthand for an auto-incremented integer primary key.
    pub const fn id(name: &'static str) -> Self {
        Self::integer(name).primary().auto_increment()
    }

    // ==================== builder methods ====================

    pub const fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// The storage assigns this column on insert; it is never written.
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Changes to this column alone never trigger an UPDATE.
    pub const fn skip_update(mut self) -> Self {
        self.skip_update = true;
        self
    }

    /// The storage fills this column when an insert omits it.
    pub const fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn StructuredCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub const fn transform(mut self, transform: SaveTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    // ==================== accessors ====================

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub const fn ty(&self) -> ColumnType {
        self.ty
    }

    #[inline]
    pub const fn is_primary(&self) -> bool {
        self.primary
    }

    #[inline]
    pub const fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    #[inline]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub const fn is_skip_update(&self) -> bool {
        self.skip_update
    }

    #[inline]
    pub const fn has_default(&self) -> bool {
        self.has_default
    }

    #[inline]
    pub fn codec_ref(&self) -> Option<&dyn StructuredCodec> {
        self.codec.as_deref()
    }

    #[inline]
    pub const fn save_transform(&self) -> Option<SaveTransform> {
        self.transform
    }

    /// Whether an insert may leave this column out.
    pub const fn is_optional_on_insert(&self) -> bool {
        self.nullable || self.has_default || self.auto_increment
    }
}

impl fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("primary", &self.primary)
            .field("auto_increment", &self.auto_increment)
            .field("nullable", &self.nullable)
            .field("skip_update", &self.skip_update)
            .field("has_default", &self.has_default)
            .field("codec", &self.codec)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}
