//! Conversion of [`Value`] snapshots into canonical [`Node`] trees
//!
//! Canonicalization is total: every value maps to some node and nothing
//! here can fail.

use chrono::{DateTime, Utc};

use crate::inspect::{snapshot, Inspect};
use crate::node::{Fields, Kind, Node, Primitive, Tagged};
use crate::value::{effective_type_name, Value, GENERIC_RECORD_NAME};

/// Field used to wrap non-record rows of a heterogeneous collection
pub const ROW_VALUE_FIELD: &str = "value";

/// Canonicalize anything that can be inspected
pub fn canonicalize<T: Inspect + ?Sized>(value: &T) -> Node {
    canonicalize_value(&snapshot(value))
}

/// Canonicalize an already captured snapshot
pub fn canonicalize_value(value: &Value) -> Node {
    match value {
        Value::Boxed(inner) => canonicalize_value(inner),
        Value::Null => Node::null(),
        Value::Bool(b) => Node::bool(*b),
        Value::Number(n) => Node::Primitive(Primitive::Number(n.clone())),
        Value::Text(s) => Node::text(s.as_str()),
        Value::Date(date) => Node::tagged(
            Kind::Date,
            [("utc", Node::text(utc_string(date)))].into_iter().collect(),
        ),
        Value::Pattern(source) => Node::tagged(
            Kind::Pattern,
            [("pattern", Node::text(source.as_str()))]
                .into_iter()
                .collect(),
        ),
        Value::Token(description) => {
            let fields = match description.as_deref() {
                Some(key) if !key.is_empty() => [("key", Node::text(key))].into_iter().collect(),
                _ => Fields::new(),
            };
            Node::tagged(Kind::Token, fields)
        }
        Value::Sequence(items) => collection(Kind::Sequence, items),
        Value::Set(items) => collection(Kind::Set, items),
        Value::Record { type_name, fields } => Node::tagged(
            Kind::Record(effective_type_name(type_name.as_deref()).to_string()),
            fields
                .iter()
                .map(|(key, value)| (key.as_str(), canonicalize_value(value)))
                .collect(),
        ),
        Value::Circular => Node::tagged(Kind::Circular, Fields::new()),
        Value::Raw(json) => Node::Raw(json.clone()),
    }
}

/// RFC 1123 style UTC timestamp, e.g. `Tue, 19 Oct 2026 12:00:00 GMT`
pub fn utc_string(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn collection(kind: Kind, items: &[Value]) -> Node {
    if !items.iter().any(Value::is_record_shaped) {
        return Node::collection(kind, items.iter().map(canonicalize_value).collect());
    }

    let mut rows = items.iter().map(row_of).collect::<Vec<_>>().into_iter();
    let Some(first) = rows.next() else {
        return Node::collection(kind, Vec::new());
    };
    let rest = rows.collect::<Vec<_>>();

    // Every column seen in any row, so a renderer can take row 0 as the schema
    let mut exemplar = Fields::new();
    for row in std::iter::once(&first).chain(rest.iter()) {
        for key in row.fields.keys() {
            exemplar.insert(key, Node::null());
        }
    }
    for (key, value) in first.fields {
        exemplar.insert(key, value);
    }

    let mut values = Vec::with_capacity(rest.len() + 1);
    values.push(Node::tagged(
        Kind::Record(GENERIC_RECORD_NAME.to_string()),
        exemplar,
    ));
    values.extend(rest.into_iter().map(Node::Tagged));
    Node::collection(kind, values)
}

/// Row form of a collection element: records as-is, anything else wrapped
fn row_of(value: &Value) -> Tagged {
    if let node @ Value::Record { .. } = value.unboxed() {
        if let Node::Tagged(tagged) = canonicalize_value(node) {
            return tagged;
        }
    }

    Tagged {
        kind: Kind::Record(GENERIC_RECORD_NAME.to_string()),
        fields: [(ROW_VALUE_FIELD, canonicalize_value(value))]
            .into_iter()
            .collect(),
        values: None,
    }
}
