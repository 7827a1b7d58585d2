//! Record envelope for stored documents.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;
use crate::value::Document;

/// A stored record with metadata.
///
/// The payload is the JSON-serialized [`Document`]; the envelope itself is
/// rkyv-encoded.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Serialized document bytes.
    pub data: Vec<u8>,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: u64,

    /// Whether this record is a tombstone (soft delete).
    pub deleted: bool,
}

impl Record {
    /// Create a new record with the current timestamp.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            created_at: super::key::current_timestamp(),
            deleted: false,
        }
    }

    /// Create a record from a document.
    pub fn from_document(document: &Document) -> Result<Self, Error> {
        let data =
            serde_json::to_vec(document).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Self::new(data))
    }

    /// Decode the stored document.
    pub fn document(&self) -> Result<Document, Error> {
        serde_json::from_slice(&self.data).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Create a tombstone record for soft deletion.
    pub fn tombstone() -> Self {
        Self {
            data: Vec::new(),
            created_at: super::key::current_timestamp(),
            deleted: true,
        }
    }

    /// Serialize the envelope to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize an envelope from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
