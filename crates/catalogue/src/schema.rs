//! Static schema descriptors for catalogue records.
//!
//! The descriptors describe each record's shape (fields, defaults, declared
//! ordering, uniqueness) for consumers that work on the shape rather than the
//! Rust type: DDL rendering, admin listings, serializers.

/// Column type of a declared field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Primary key.
    Id,
    /// Bounded text.
    Text { max_len: usize },
    /// Bounded slug text.
    Slug { max_len: usize },
    Bool,
    /// Non-negative small integer (`0..=32767`).
    PositiveSmallInt,
    /// Many-to-one reference to another table.
    ForeignKey { target: &'static str },
    /// Many-to-many link to another table.
    ManyToMany { target: &'static str },
}

/// Declared default for a field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldDefault {
    Bool(bool),
    Int(i64),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub kind: FieldKind,
    /// `false` means the field may be left empty.
    pub required: bool,
    pub unique: bool,
    pub default: Option<FieldDefault>,
    pub help_text: Option<&'static str>,
}

impl FieldSchema {
    pub const fn new(name: &'static str, verbose_name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            verbose_name,
            kind,
            required: true,
            unique: false,
            default: None,
            help_text: None,
        }
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub const fn default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn help(mut self, text: &'static str) -> Self {
        self.help_text = Some(text);
        self
    }
}

/// One term of a declared ordering.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrderTerm {
    Asc(&'static str),
    Desc(&'static str),
}

impl OrderTerm {
    pub fn field(&self) -> &'static str {
        match self {
            OrderTerm::Asc(f) | OrderTerm::Desc(f) => f,
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, OrderTerm::Desc(_))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub name: &'static str,
    pub app_label: &'static str,
    pub table: &'static str,
    pub verbose_name: &'static str,
    pub verbose_name_plural: &'static str,
    pub fields: &'static [FieldSchema],
    pub ordering: &'static [OrderTerm],
    pub unique_together: &'static [&'static [&'static str]],
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every uniqueness constraint: single unique fields first, then the
    /// composite ones.
    pub fn unique_constraints(&self) -> Vec<Vec<&'static str>> {
        let singles = self.fields.iter().filter(|f| f.unique).map(|f| vec![f.name]);
        let composites = self.unique_together.iter().map(|set| set.to_vec());
        singles.chain(composites).collect()
    }
}

/// A record with a declared schema and a declared default ordering.
pub trait CatalogueRecord {
    /// Key whose natural order is the record's declared ordering.
    type SortKey: Ord;

    fn schema() -> &'static EntitySchema;

    fn sort_key(&self) -> Self::SortKey;
}

/// Sort records into their declared ordering.
pub fn sort_records<T: CatalogueRecord>(records: &mut [T]) {
    records.sort_by_cached_key(|r| r.sort_key());
}
