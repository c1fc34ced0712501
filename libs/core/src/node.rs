use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Number;

use crate::error::{Error, Result};

/// Reserved key carrying a tagged node's kind
pub const KIND_KEY: &str = "$type";

/// Reserved key carrying a sequence's or set's children
pub const VALUES_KEY: &str = "$values";

/// Prefix of reserved keys; field names starting with it are escaped
/// on the wire by doubling it
const RESERVED_PREFIX: char = '$';

fn escape_key(key: &str) -> std::borrow::Cow<'_, str> {
    if key.starts_with(RESERVED_PREFIX) {
        format!("{}{}", RESERVED_PREFIX, key).into()
    } else {
        key.into()
    }
}

fn unescape_key(mut key: String) -> String {
    if key.starts_with("$$") {
        key.remove(0);
    }
    key
}

/// Canonical, transport-ready representation of a value
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Primitive(Primitive),
    Tagged(Tagged),

    /// Passed through without tagging
    Raw(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

/// Discriminator of a tagged node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Date,
    Pattern,
    Token,
    Sequence,
    Set,
    Circular,

    /// A keyed record, named after its effective type
    Record(String),
}

impl Kind {
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Date => "date",
            Kind::Pattern => "pattern",
            Kind::Token => "token",
            Kind::Sequence => "sequence",
            Kind::Set => "set",
            Kind::Circular => "circular",
            Kind::Record(name) => name,
        }
    }

    fn parse(tag: &str) -> Self {
        match tag {
            "date" => Kind::Date,
            "pattern" => Kind::Pattern,
            "token" => Kind::Token,
            "sequence" => Kind::Sequence,
            "set" => Kind::Set,
            "circular" => Kind::Circular,
            name => Kind::Record(name.to_string()),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Kind::Sequence | Kind::Set)
    }
}

/// Ordered field list with map-like insertion
///
/// Re-inserting an existing key replaces its value in place, so the
/// original key order is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Node)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Node)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, Node)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, Node);
    type IntoIter = std::vec::IntoIter<(String, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A node with a kind and kind-specific payload
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    pub kind: Kind,
    pub fields: Fields,

    /// Children of a sequence or set; `None` for every other kind
    pub values: Option<Vec<Node>>,
}

impl Node {
    pub fn null() -> Self {
        Node::Primitive(Primitive::Null)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Node::Primitive(Primitive::Text(value.into()))
    }

    pub fn number(value: impl Into<Number>) -> Self {
        Node::Primitive(Primitive::Number(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Node::Primitive(Primitive::Bool(value))
    }

    pub fn tagged(kind: Kind, fields: Fields) -> Self {
        Node::Tagged(Tagged {
            kind,
            fields,
            values: None,
        })
    }

    pub fn collection(kind: Kind, values: Vec<Node>) -> Self {
        Node::Tagged(Tagged {
            kind,
            fields: Fields::new(),
            values: Some(values),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Primitive(Primitive::Null))
    }

    /// Kind of a tagged node; primitives and raw nodes have none
    pub fn kind(&self) -> Option<&Kind> {
        match self {
            Node::Tagged(tagged) => Some(&tagged.kind),
            _ => None,
        }
    }

    pub fn as_tagged(&self) -> Option<&Tagged> {
        match self {
            Node::Tagged(tagged) => Some(tagged),
            _ => None,
        }
    }

    /// Field of a tagged node
    pub fn field(&self, key: &str) -> Option<&Node> {
        self.as_tagged().and_then(|tagged| tagged.fields.get(key))
    }

    /// Children of a sequence or set
    pub fn values(&self) -> Option<&[Node]> {
        self.as_tagged().and_then(|tagged| tagged.values.as_deref())
    }

    /// Rebuild a node from its wire JSON
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;

        Ok(match json {
            Json::Null => Node::null(),
            Json::Bool(b) => Node::bool(b),
            Json::Number(n) => Node::Primitive(Primitive::Number(n)),
            Json::String(s) => Node::text(s),
            Json::Array(items) => Node::Raw(Json::Array(items)),
            Json::Object(mut map) => {
                let tag = match map.remove(KIND_KEY) {
                    Some(Json::String(tag)) => tag,
                    Some(other) => {
                        return Err(Error::malformed(format!(
                            "{} must be a string, got {}",
                            KIND_KEY, other
                        )))
                    }
                    None => return Ok(Node::Raw(Json::Object(map))),
                };

                let kind = Kind::parse(&tag);
                let values = match map.remove(VALUES_KEY) {
                    Some(Json::Array(items)) => Some(
                        items
                            .into_iter()
                            .map(Node::from_json)
                            .collect::<Result<Vec<_>>>()?,
                    ),
                    Some(other) => {
                        return Err(Error::malformed(format!(
                            "{} must be an array, got {}",
                            VALUES_KEY, other
                        )))
                    }
                    None if kind.is_collection() => {
                        return Err(Error::malformed(format!("{} without {}", tag, VALUES_KEY)))
                    }
                    None => None,
                };

                let fields = map
                    .into_iter()
                    .map(|(k, v)| Node::from_json(v).map(|node| (unescape_key(k), node)))
                    .collect::<Result<Fields>>()?;

                Node::Tagged(Tagged {
                    kind,
                    fields,
                    values,
                })
            }
        })
    }

    /// Wire JSON of this node
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(Into::into)
    }
}

impl Serialize for Primitive {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Primitive::Null => serializer.serialize_unit(),
            Primitive::Bool(b) => serializer.serialize_bool(*b),
            Primitive::Number(n) => n.serialize(serializer),
            Primitive::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Tagged {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = 1 + self.fields.len() + usize::from(self.values.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(KIND_KEY, self.kind.as_str())?;
        for (key, value) in self.fields.iter() {
            map.serialize_entry(&escape_key(key), value)?;
        }
        if let Some(values) = &self.values {
            map.serialize_entry(VALUES_KEY, values)?;
        }
        map.end()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Primitive(primitive) => primitive.serialize(serializer),
            Node::Tagged(tagged) => tagged.serialize(serializer),
            Node::Raw(json) => json.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Node::from_json(json).map_err(serde::de::Error::custom)
    }
}

impl From<Primitive> for Node {
    fn from(primitive: Primitive) -> Self {
        Node::Primitive(primitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_node_serializes_kind_first() {
        let node = Node::tagged(
            Kind::Record("Point".into()),
            [("x", Node::number(1)), ("y", Node::number(2))]
                .into_iter()
                .collect(),
        );

        let text = serde_json::to_string(&node).unwrap();
        assert_eq!(text, r#"{"$type":"Point","x":1,"y":2}"#);
    }

    #[test]
    fn collections_carry_values_key() {
        let node = Node::collection(Kind::Set, vec![Node::text("a"), Node::null()]);
        assert_eq!(
            node.to_json().unwrap(),
            json!({"$type": "set", "$values": ["a", null]})
        );
    }

    #[test]
    fn wire_form_decodes_back_to_same_tree() {
        let node = Node::collection(
            Kind::Sequence,
            vec![
                Node::tagged(
                    Kind::Date,
                    [("utc", Node::text("Thu, 01 Jan 1970 00:00:00 GMT"))]
                        .into_iter()
                        .collect(),
                ),
                Node::tagged(Kind::Token, Fields::new()),
                Node::bool(false),
            ],
        );

        let json = node.to_json().unwrap();
        assert_eq!(Node::from_json(json).unwrap(), node);
    }

    #[test]
    fn untagged_object_decodes_as_raw() {
        let json = json!({"plain": 1});
        assert_eq!(Node::from_json(json.clone()).unwrap(), Node::Raw(json));
    }

    #[test]
    fn collection_without_values_is_malformed() {
        let result = Node::from_json(json!({"$type": "sequence"}));
        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn reserved_looking_field_names_are_escaped() {
        let node = Node::tagged(
            Kind::Record("record".into()),
            [("$type", Node::number(5)), ("$$x", Node::null())]
                .into_iter()
                .collect(),
        );

        let text = serde_json::to_string(&node).unwrap();
        assert_eq!(text, r#"{"$type":"record","$$type":5,"$$$x":null}"#);

        let decoded = Node::from_json(node.to_json().unwrap()).unwrap();
        assert_eq!(decoded.kind(), Some(&Kind::Record("record".into())));
        assert_eq!(decoded.field("$type"), Some(&Node::number(5)));
        assert_eq!(decoded.field("$$x"), Some(&Node::null()));
    }

    #[test]
    fn values_field_name_does_not_clash_with_children() {
        let node = Node::tagged(
            Kind::Record("Bag".into()),
            [("$values", Node::number(1))].into_iter().collect(),
        );

        assert_eq!(
            node.to_json().unwrap(),
            json!({"$type": "Bag", "$$values": 1})
        );
        let decoded = Node::from_json(node.to_json().unwrap()).unwrap();
        assert_eq!(decoded.values(), None);
        assert_eq!(decoded.field("$values"), Some(&Node::number(1)));
    }

    #[test]
    fn fields_insert_replaces_in_place() {
        let mut fields = Fields::new();
        fields.insert("a", Node::null());
        fields.insert("b", Node::null());
        fields.insert("a", Node::number(1));
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&Node::number(1)));
    }
}
