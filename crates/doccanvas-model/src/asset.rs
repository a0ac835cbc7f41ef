//! Assets referenced by a canvas model
//!
//! Assets are binary payloads (logos, signatures, stamps, pictures) owned
//! by exactly one project. Payloads are serialized as standard base64.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Asset identifier (`ast_` followed by 16 hex characters)
pub type AssetId = String;

/// Classification of an asset's role in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Company or product logo
    Logo,
    /// Handwritten signature
    Signature,
    /// Stamp or seal
    Stamp,
    /// Generic picture
    #[default]
    Image,
    /// Vector shape
    Shape,
    /// Text box
    Textbox,
}

impl ObjectType {
    /// All object types
    pub const ALL: [ObjectType; 6] = [
        ObjectType::Logo,
        ObjectType::Signature,
        ObjectType::Stamp,
        ObjectType::Image,
        ObjectType::Shape,
        ObjectType::Textbox,
    ];

    /// Wire name of the object type
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Logo => "logo",
            ObjectType::Signature => "signature",
            ObjectType::Stamp => "stamp",
            ObjectType::Image => "image",
            ObjectType::Shape => "shape",
            ObjectType::Textbox => "textbox",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown object type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown object type: {0}")]
pub struct ParseObjectTypeError(pub String);

impl FromStr for ObjectType {
    type Err = ParseObjectTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseObjectTypeError(s.to_string()))
    }
}

/// A binary asset extracted from, or destined for, a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Deterministic asset id
    pub id: AssetId,
    /// Owning project
    pub project_id: String,
    /// File name (e.g. `image1.png`)
    pub filename: String,
    /// MIME type (e.g. `image/png`)
    pub mime_type: String,
    /// Binary payload
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    /// Payload length in bytes
    pub byte_size: u64,
    /// Classified role
    pub object_type: ObjectType,
    /// Classification confidence in [0, 1]
    pub confidence: f32,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Payload encoded as a `data:` URL
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, base64_payload::encode(&self.payload))
    }
}

/// Binary payload supplied for an asset at export time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBuffer {
    /// Binary payload
    #[serde(with = "base64_payload")]
    pub bytes: Vec<u8>,
    /// File name, used for the media extension
    pub filename: String,
    /// MIME type
    pub mime_type: String,
}

impl AssetBuffer {
    /// Create a new asset buffer
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }
}

impl From<&Asset> for AssetBuffer {
    fn from(asset: &Asset) -> Self {
        Self::new(asset.payload.clone(), &asset.filename, &asset.mime_type)
    }
}

mod base64_payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Asset {
        Asset {
            id: "ast_0123456789abcdef".to_string(),
            project_id: "proj-1".to_string(),
            filename: "logo.png".to_string(),
            mime_type: "image/png".to_string(),
            payload: vec![0x89, b'P', b'N'],
            byte_size: 3,
            object_type: ObjectType::Logo,
            confidence: 0.8,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_object_type_parse_and_display() {
        for t in ObjectType::ALL {
            assert_eq!(t.as_str().parse::<ObjectType>().unwrap(), t);
            assert_eq!(t.to_string(), t.as_str());
        }
        assert!("Logo".parse::<ObjectType>().is_err());
        assert_eq!(ObjectType::default(), ObjectType::Image);
    }

    #[test]
    fn test_payload_serializes_as_base64() {
        let json = serde_json::to_value(asset()).unwrap();
        assert_eq!(json["payload"], "iVBO");
        assert_eq!(json["object_type"], "logo");

        let parsed: Asset = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.payload, vec![0x89, b'P', b'N']);
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let mut json = serde_json::to_value(asset()).unwrap();
        json["payload"] = serde_json::Value::String("***".to_string());
        assert!(serde_json::from_value::<Asset>(json).is_err());
    }

    #[test]
    fn test_data_url() {
        assert_eq!(asset().data_url(), "data:image/png;base64,iVBO");
    }

    #[test]
    fn test_asset_buffer_from_asset() {
        let buffer = AssetBuffer::from(&asset());
        assert_eq!(buffer.filename, "logo.png");
        assert_eq!(buffer.bytes.len(), 3);
    }
}
