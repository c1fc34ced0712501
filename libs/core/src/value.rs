use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde_json::Number;

/// Type label used when a record has no discoverable name
pub const ANONYMOUS_TYPE_NAME: &str = "Function";

/// Type label for plain keyed records such as maps
pub const GENERIC_RECORD_NAME: &str = "record";

/// Names that count as "no name at all"
const UNNAMED_ALIASES: [&str; 3] = ["", "anonymous", "Anonymous"];

/// Snapshot of a runtime value, prior to canonicalization
///
/// Produced by [`Inspect`](crate::Inspect) implementations. The variants
/// cover every shape the canonicalizer knows how to tag; anything else
/// can be carried through untouched as [`Value::Raw`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),

    /// A wrapper around another value (`Box`, `Rc`, `Arc`, ...)
    Boxed(Box<Value>),

    Date(DateTime<Utc>),

    /// Literal source form of a regular expression, e.g. `/ab+c/i`
    Pattern(String),

    /// A unique token with an optional description
    Token(Option<String>),

    Sequence(Vec<Value>),
    Set(Vec<Value>),

    Record {
        type_name: Option<String>,
        fields: Vec<(String, Value)>,
    },

    /// Back-reference to a value already being inspected
    Circular,

    /// Pre-built wire JSON, emitted as-is
    Raw(serde_json::Value),
}

impl Value {
    /// Number from a float; non-finite values have no JSON form and become `Null`
    pub fn from_f64(value: f64) -> Self {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn boxed(value: Value) -> Self {
        Value::Boxed(Box::new(value))
    }

    /// A generic keyed record
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::named_record(GENERIC_RECORD_NAME, fields)
    }

    pub fn named_record<K, I>(type_name: impl Into<String>, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record {
            type_name: Some(type_name.into()),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Strip any number of boxed wrappers
    pub fn unboxed(&self) -> &Value {
        let mut current = self;
        while let Value::Boxed(inner) = current {
            current = inner;
        }
        current
    }

    /// Records and collections; these trigger exemplar normalization
    /// when they appear inside a sequence or set
    pub fn is_record_shaped(&self) -> bool {
        matches!(
            self.unboxed(),
            Value::Record { .. } | Value::Sequence(_) | Value::Set(_)
        )
    }
}

/// Resolve the effective type name of a record
///
/// Missing names and the conventional unnamed aliases fall back to
/// [`ANONYMOUS_TYPE_NAME`].
pub fn effective_type_name(type_name: Option<&str>) -> &str {
    match type_name {
        Some(name) if !UNNAMED_ALIASES.contains(&name) => name,
        _ => ANONYMOUS_TYPE_NAME,
    }
}

/// Short, human-facing name of a Rust type
///
/// `my_crate::model::Point<u8>` becomes `Point`; closures yield an empty
/// string so they resolve to the anonymous label.
pub fn type_name_of<T: ?Sized>() -> String {
    short_type_name(std::any::type_name::<T>())
}

pub(crate) fn short_type_name(full: &str) -> String {
    if full.contains("{{closure}}") {
        return String::new();
    }

    let without_generics = match full.find('<') {
        Some(index) => &full[..index],
        None => full,
    };

    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .trim_start_matches(['&', '*'])
        .trim()
        .to_string()
}

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique, symbol-like token
///
/// Two tokens never compare equal unless one is a clone of the other,
/// even when they share a description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    id: u64,
    description: Option<String>,
}

impl Token {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
            description: Some(description.into()),
        }
    }

    /// Token without a description
    pub fn anonymous() -> Self {
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
            description: None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.description.as_deref().unwrap_or(""))
    }
}
