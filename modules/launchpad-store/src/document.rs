// Document model, query filters and field-level update operators.
//
// Paths are dot-separated field names. Update paths may also contain:
//   `$`        the first element of the array matched by the query filter
//   `$[ident]` every element matched by the array filter named `ident`

use launchpad_common::{EntityKind, RecordId};
use serde_json::{Map, Value};

/// A stored document: a JSON object carrying its own `_id`.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Entities(EntityKind),
    Accounts,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Entities(kind) => kind.collection(),
            Collection::Accounts => "accounts",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// --- Filters ---

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field at `path` equals `value`. A missing field equals `null`.
    Eq(String, Value),
    /// Array at `path` contains `value`.
    Contains(String, Value),
    /// Array at `path` does not contain `value` (or is missing).
    NotContains(String, Value),
    /// Array at `path` has an element whose `field` equals `value`.
    ElemMatch {
        path: String,
        field: String,
        value: Value,
    },
    /// Array at `path` has no element whose `field` equals `value`.
    NoElemMatch {
        path: String,
        field: String,
        value: Value,
    },
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn id(id: &RecordId) -> Self {
        Filter::eq(launchpad_common::fields::RECORD_ID, id.as_str())
    }

    pub fn contains(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Contains(path.into(), value.into())
    }

    pub fn not_contains(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::NotContains(path.into(), value.into())
    }

    pub fn elem_match(
        path: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Filter::ElemMatch {
            path: path.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn no_elem_match(
        path: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Filter::NoElemMatch {
            path: path.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Filter::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Filter::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Filter::And(parts)
    }
}

// --- Updates ---

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set(String, Value),
    /// Applied only when the update inserts a new document.
    SetOnInsert(String, Value),
    Unset(String),
    Inc(String, i64),
    AddToSet(String, Value),
    Push(String, Value),
    /// Remove every array element equal to the value.
    Pull(String, Value),
    /// Remove every array element whose `field` equals `value`.
    PullWhere {
        path: String,
        field: String,
        value: Value,
    },
}

impl UpdateOp {
    pub fn path(&self) -> &str {
        match self {
            UpdateOp::Set(p, _)
            | UpdateOp::SetOnInsert(p, _)
            | UpdateOp::Unset(p)
            | UpdateOp::Inc(p, _)
            | UpdateOp::AddToSet(p, _)
            | UpdateOp::Push(p, _)
            | UpdateOp::Pull(p, _) => p,
            UpdateOp::PullWhere { path, .. } => path,
        }
    }
}

/// Selects the elements an `$[ident]` path segment targets.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayFilter {
    pub ident: String,
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub ops: Vec<UpdateOp>,
    pub array_filters: Vec<ArrayFilter>,
    pub upsert: bool,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(path.into(), value.into()));
        self
    }

    pub fn set_on_insert(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::SetOnInsert(path.into(), value.into()));
        self
    }

    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(path.into()));
        self
    }

    pub fn inc(mut self, path: impl Into<String>, by: i64) -> Self {
        self.ops.push(UpdateOp::Inc(path.into(), by));
        self
    }

    pub fn add_to_set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::AddToSet(path.into(), value.into()));
        self
    }

    pub fn push(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Push(path.into(), value.into()));
        self
    }

    pub fn pull(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Pull(path.into(), value.into()));
        self
    }

    pub fn pull_where(
        mut self,
        path: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.ops.push(UpdateOp::PullWhere {
            path: path.into(),
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn array_filter(
        mut self,
        ident: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.array_filters.push(ArrayFilter {
            ident: ident.into(),
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<RecordId>,
}

impl UpdateResult {
    /// True when the update changed an existing document or inserted one.
    pub fn changed(&self) -> bool {
        self.modified > 0 || self.upserted_id.is_some()
    }
}
