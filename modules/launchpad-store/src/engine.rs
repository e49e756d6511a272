// Filter evaluation and update application over JSON documents.
//
// Backends load a document, run `matches`/`apply_update` here and persist the
// result under their own single-document atomicity (a lock, a row lock).

use launchpad_common::{fields, RecordId};
use serde_json::{Map, Value};

use crate::document::{ArrayFilter, Document, Filter, Update, UpdateOp};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Field(&'a str),
    Positional,
    Filtered(&'a str),
}

fn invalid(path: &str, reason: &str) -> StoreError {
    StoreError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_path(path: &str) -> Result<Vec<Segment<'_>>, StoreError> {
    if path.is_empty() {
        return Err(invalid(path, "empty path"));
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let segment = if part == "$" {
            Segment::Positional
        } else if let Some(ident) = part.strip_prefix("$[").and_then(|p| p.strip_suffix(']')) {
            if ident.is_empty() {
                return Err(invalid(path, "empty array filter identifier"));
            }
            Segment::Filtered(ident)
        } else if part.is_empty() || part.starts_with('$') {
            return Err(invalid(path, "malformed segment"));
        } else {
            Segment::Field(part)
        };
        segments.push(segment);
    }

    if !matches!(segments.first(), Some(Segment::Field(_))) {
        return Err(invalid(path, "path must start with a field name"));
    }
    let consecutive_selectors = segments
        .windows(2)
        .any(|pair| !matches!(pair[0], Segment::Field(_)) && !matches!(pair[1], Segment::Field(_)));
    if consecutive_selectors {
        return Err(invalid(path, "array selectors must follow a field"));
    }

    Ok(segments)
}

// --- Reads ---

/// Value at a dotted path of plain field names.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn array_at<'a>(doc: &'a Document, path: &str) -> Option<&'a Vec<Value>> {
    get_path(doc, path)?.as_array()
}

fn elem_field_eq(elem: &Value, field: &str, value: &Value) -> bool {
    elem.get(field) == Some(value)
}

pub fn matches(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(path, value) => get_path(doc, path).unwrap_or(&Value::Null) == value,
        Filter::Contains(path, value) => {
            array_at(doc, path).is_some_and(|items| items.contains(value))
        }
        Filter::NotContains(path, value) => {
            !array_at(doc, path).is_some_and(|items| items.contains(value))
        }
        Filter::ElemMatch { path, field, value } => array_at(doc, path)
            .is_some_and(|items| items.iter().any(|item| elem_field_eq(item, field, value))),
        Filter::NoElemMatch { path, field, value } => !array_at(doc, path)
            .is_some_and(|items| items.iter().any(|item| elem_field_eq(item, field, value))),
        Filter::And(parts) => parts.iter().all(|part| matches(doc, part)),
    }
}

/// The document's `_id`, if it has a string one.
pub fn document_id(doc: &Document) -> Option<RecordId> {
    doc.get(fields::RECORD_ID)
        .and_then(Value::as_str)
        .map(|s| RecordId(s.to_string()))
}

// --- Writes ---

enum ArrayCondition<'a> {
    Equals(&'a Value),
    FieldEquals(&'a str, &'a Value),
}

impl ArrayCondition<'_> {
    fn holds(&self, item: &Value) -> bool {
        match self {
            ArrayCondition::Equals(value) => item == *value,
            ArrayCondition::FieldEquals(field, value) => elem_field_eq(item, field, value),
        }
    }
}

fn array_conditions<'a>(filter: &'a Filter, array_path: &str, out: &mut Vec<ArrayCondition<'a>>) {
    match filter {
        Filter::Contains(path, value) if path == array_path => out.push(ArrayCondition::Equals(value)),
        Filter::ElemMatch { path, field, value } if path == array_path => {
            out.push(ArrayCondition::FieldEquals(field, value))
        }
        Filter::And(parts) => {
            for part in parts {
                array_conditions(part, array_path, out);
            }
        }
        _ => {}
    }
}

struct Ctx<'a> {
    filter: &'a Filter,
    array_filters: &'a [ArrayFilter],
    op_path: &'a str,
}

impl Ctx<'_> {
    /// Index of the first element satisfying the query's condition on this array.
    fn positional(&self, array_path: &str, items: &[Value]) -> Result<usize, StoreError> {
        let mut conditions = Vec::new();
        array_conditions(self.filter, array_path, &mut conditions);
        if conditions.is_empty() {
            return Err(invalid(
                self.op_path,
                "positional operator needs a query condition on the array",
            ));
        }
        items
            .iter()
            .position(|item| conditions.iter().all(|c| c.holds(item)))
            .ok_or_else(|| invalid(self.op_path, "positional operator found no matching element"))
    }

    fn filtered(&self, ident: &str, items: &[Value]) -> Result<Vec<usize>, StoreError> {
        let filter = self
            .array_filters
            .iter()
            .find(|f| f.ident == ident)
            .ok_or_else(|| invalid(self.op_path, "no array filter for identifier"))?;
        Ok(items
            .iter()
            .enumerate()
            .filter(|(_, item)| elem_field_eq(item, &filter.field, &filter.value))
            .map(|(index, _)| index)
            .collect())
    }
}

fn creates_missing(op: &UpdateOp) -> bool {
    !matches!(
        op,
        UpdateOp::Unset(_) | UpdateOp::Pull(..) | UpdateOp::PullWhere { .. }
    )
}

fn apply_in_object(
    obj: &mut Map<String, Value>,
    segments: &[Segment<'_>],
    prefix: &str,
    op: &UpdateOp,
    ctx: &Ctx<'_>,
) -> Result<(), StoreError> {
    let Some((Segment::Field(name), rest)) = segments.split_first() else {
        return Err(invalid(ctx.op_path, "expected a field name"));
    };
    let name = *name;
    let path = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    };

    let Some(next) = rest.first() else {
        return apply_terminal(obj, name, &path, op);
    };

    if let Segment::Field(_) = next {
        if !obj.contains_key(name) {
            if !creates_missing(op) {
                return Ok(());
            }
            obj.insert(name.to_string(), Value::Object(Map::new()));
        }
        return match obj.get_mut(name) {
            Some(Value::Object(child)) => apply_in_object(child, rest, &path, op, ctx),
            _ => Err(StoreError::TypeMismatch {
                path,
                expected: "object",
            }),
        };
    }

    let items = match obj.get_mut(name) {
        Some(Value::Array(items)) => items,
        None if matches!(next, Segment::Filtered(_)) => return Ok(()),
        None => return Err(invalid(ctx.op_path, "positional operator on a missing array")),
        Some(_) => {
            return Err(StoreError::TypeMismatch {
                path,
                expected: "array",
            })
        }
    };

    let indices = match next {
        Segment::Filtered(ident) => ctx.filtered(ident, items.as_slice())?,
        _ => vec![ctx.positional(&path, items.as_slice())?],
    };

    let rest = &rest[1..];
    for index in indices {
        if rest.is_empty() {
            apply_to_element(&mut items[index], ctx.op_path, op)?;
            continue;
        }
        match &mut items[index] {
            Value::Object(elem) => apply_in_object(elem, rest, &path, op, ctx)?,
            _ => {
                return Err(StoreError::TypeMismatch {
                    path: path.clone(),
                    expected: "array of objects",
                })
            }
        }
    }
    Ok(())
}

fn array_entry<'a>(
    obj: &'a mut Map<String, Value>,
    name: &str,
    path: &str,
) -> Result<&'a mut Vec<Value>, StoreError> {
    match obj
        .entry(name.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(items) => Ok(items),
        _ => Err(StoreError::TypeMismatch {
            path: path.to_string(),
            expected: "array",
        }),
    }
}

fn existing_array<'a>(
    obj: &'a mut Map<String, Value>,
    name: &str,
    path: &str,
) -> Result<Option<&'a mut Vec<Value>>, StoreError> {
    match obj.get_mut(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(StoreError::TypeMismatch {
            path: path.to_string(),
            expected: "array",
        }),
    }
}

fn apply_terminal(
    obj: &mut Map<String, Value>,
    name: &str,
    path: &str,
    op: &UpdateOp,
) -> Result<(), StoreError> {
    match op {
        UpdateOp::Set(_, value) | UpdateOp::SetOnInsert(_, value) => {
            obj.insert(name.to_string(), value.clone());
        }
        UpdateOp::Unset(_) => {
            obj.remove(name);
        }
        UpdateOp::Inc(_, by) => {
            let current = match obj.get(name) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| StoreError::TypeMismatch {
                    path: path.to_string(),
                    expected: "integer",
                })?,
            };
            obj.insert(name.to_string(), Value::from(current + by));
        }
        UpdateOp::AddToSet(_, value) => {
            let items = array_entry(obj, name, path)?;
            if !items.contains(value) {
                items.push(value.clone());
            }
        }
        UpdateOp::Push(_, value) => {
            array_entry(obj, name, path)?.push(value.clone());
        }
        UpdateOp::Pull(_, value) => {
            if let Some(items) = existing_array(obj, name, path)? {
                items.retain(|item| item != value);
            }
        }
        UpdateOp::PullWhere { field, value, .. } => {
            if let Some(items) = existing_array(obj, name, path)? {
                items.retain(|item| !elem_field_eq(item, field, value));
            }
        }
    }
    Ok(())
}

fn apply_to_element(elem: &mut Value, op_path: &str, op: &UpdateOp) -> Result<(), StoreError> {
    match op {
        UpdateOp::Set(_, value) | UpdateOp::SetOnInsert(_, value) => {
            *elem = value.clone();
            Ok(())
        }
        _ => Err(invalid(op_path, "only set can target an array element directly")),
    }
}

/// Apply `update` to `doc` in place. Returns whether the document changed.
///
/// `inserting` enables `SetOnInsert` and permits writing `_id`.
pub fn apply_update(
    doc: &mut Document,
    filter: &Filter,
    update: &Update,
    inserting: bool,
) -> Result<bool, StoreError> {
    let before = doc.clone();

    for op in &update.ops {
        if matches!(op, UpdateOp::SetOnInsert(..)) && !inserting {
            continue;
        }
        let path = op.path();
        if !inserting && (path == fields::RECORD_ID || path.starts_with("_id.")) {
            return Err(invalid(path, "_id is immutable"));
        }
        let segments = parse_path(path)?;
        let ctx = Ctx {
            filter,
            array_filters: &update.array_filters,
            op_path: path,
        };
        apply_in_object(doc, &segments, "", op, &ctx)?;
    }

    Ok(*doc != before)
}

fn seed_equalities(doc: &mut Document, filter: &Filter) -> Result<(), StoreError> {
    match filter {
        Filter::Eq(path, value) => {
            let seed = Update::new().set(path.clone(), value.clone());
            apply_update(doc, &Filter::And(vec![]), &seed, true)?;
        }
        Filter::And(parts) => {
            for part in parts {
                seed_equalities(doc, part)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Document an upsert inserts when nothing matched: the filter's equality
/// fields, then every op including `SetOnInsert`, then a fresh `_id` if none
/// was given.
pub fn build_upsert(filter: &Filter, update: &Update) -> Result<(Document, RecordId), StoreError> {
    let mut doc = Document::new();
    seed_equalities(&mut doc, filter)?;
    apply_update(&mut doc, filter, update, true)?;

    let id = match document_id(&doc) {
        Some(id) => id,
        None => {
            let id = RecordId::new();
            doc.insert(fields::RECORD_ID.to_string(), Value::from(id.as_str()));
            id
        }
    };
    Ok((doc, id))
}
