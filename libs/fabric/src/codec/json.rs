use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Error, Result};

/// JSON codec; the viewer expects textual payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Codec(e.to_string()))
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_core::{DumpContainer, Node};

    #[test]
    fn encodes_container_as_text() {
        let bytes = JsonCodec
            .encode(&DumpContainer::tree(Node::bool(true)))
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"$type":"dump-container","$value":true}"#
        );
    }

    #[test]
    fn decode_reports_codec_error() {
        let result: Result<serde_json::Value> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(Error::Codec(_))));
    }
}
