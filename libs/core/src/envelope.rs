use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::node::{Node, KIND_KEY};

/// Kind of the outer wire envelope
pub const CONTAINER_KIND: &str = "dump-container";

/// Kind of a markup leaf
pub const MARKUP_KIND: &str = "html";

/// What a dump container carries
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerValue {
    Tree(Node),
    Markup(String),
}

/// Wire envelope sent to the viewer
///
/// Serializes as
/// `{"$type":"dump-container","$value":…,"title":…,"source":…}`, with the
/// title and source omitted when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpContainer {
    pub value: ContainerValue,
    pub title: Option<String>,
    pub source: Option<String>,
}

impl DumpContainer {
    pub fn tree(node: Node) -> Self {
        Self {
            value: ContainerValue::Tree(node),
            title: None,
            source: None,
        }
    }

    pub fn markup(markup: impl Into<String>) -> Self {
        Self {
            value: ContainerValue::Markup(markup.into()),
            title: None,
            source: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }
}

impl Serialize for ContainerValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContainerValue::Tree(node) => node.serialize(serializer),
            ContainerValue::Markup(markup) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(KIND_KEY, MARKUP_KIND)?;
                map.serialize_entry("$html", markup)?;
                map.end()
            }
        }
    }
}

impl Serialize for DumpContainer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 2 + usize::from(self.title.is_some()) + usize::from(self.source.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(KIND_KEY, CONTAINER_KIND)?;
        map.serialize_entry("$value", &self.value)?;
        if let Some(title) = &self.title {
            map.serialize_entry("title", title)?;
        }
        if let Some(source) = &self.source {
            map.serialize_entry("source", source)?;
        }
        map.end()
    }
}
