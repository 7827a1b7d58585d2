//! Record ids and versioned key encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Size of a record id in bytes.
pub const RECORD_ID_SIZE: usize = 16;

/// Size of a version timestamp in bytes.
pub const VERSION_TS_SIZE: usize = 8;

/// Total versioned key size.
pub const KEY_SIZE: usize = RECORD_ID_SIZE + VERSION_TS_SIZE;

/// A 16-byte record identifier.
///
/// Ids are generated from a nanosecond timestamp plus a process-wide counter
/// and carry UUIDv4 version bits. They render as 32 hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; RECORD_ID_SIZE]);

impl RecordId {
    /// Wrap raw id bytes.
    pub fn from_bytes(bytes: [u8; RECORD_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh id.
    pub fn generate() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::time::{SystemTime, UNIX_EPOCH};

        // Counter keeps ids unique even within one timestamp tick.
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_nanos() as u64;
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

        let mut id = [0u8; RECORD_ID_SIZE];
        id[..8].copy_from_slice(&now.to_le_bytes());
        id[8..16].copy_from_slice(&counter.to_le_bytes());

        // UUIDv4 version and variant bits.
        id[6] = (id[6] & 0x0f) | 0x40;
        id[8] = (id[8] & 0x3f) | 0x80;

        Self(id)
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; RECORD_ID_SIZE] {
        &self.0
    }

    /// Render as 32 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from 32 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidKey)?;
        let bytes: [u8; RECORD_ID_SIZE] = bytes.try_into().map_err(|_| Error::InvalidKey)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.to_hex())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RecordId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A versioned key combining record id and version timestamp.
///
/// Key format: `[record_id (16 bytes)][version_ts (8 bytes, big-endian)]`
///
/// Big-endian encoding makes lexicographic ordering match numeric ordering,
/// so range scans return versions in chronological order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionedKey {
    /// Record identifier.
    pub id: RecordId,

    /// Version timestamp in microseconds since Unix epoch.
    pub version_ts: u64,
}

impl VersionedKey {
    /// Create a new versioned key.
    pub fn new(id: RecordId, version_ts: u64) -> Self {
        Self { id, version_ts }
    }

    /// Create a key with the current timestamp.
    pub fn now(id: RecordId) -> Self {
        Self::new(id, current_timestamp())
    }

    /// Encode the key to bytes.
    pub fn encode(&self) -> [u8; KEY_SIZE] {
        let mut buf = [0u8; KEY_SIZE];
        buf[..RECORD_ID_SIZE].copy_from_slice(self.id.as_bytes());
        buf[RECORD_ID_SIZE..].copy_from_slice(&self.version_ts.to_be_bytes());
        buf
    }

    /// Decode a key from bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_SIZE {
            return None;
        }

        let mut id = [0u8; RECORD_ID_SIZE];
        id.copy_from_slice(&bytes[..RECORD_ID_SIZE]);

        let mut ts_bytes = [0u8; VERSION_TS_SIZE];
        ts_bytes.copy_from_slice(&bytes[RECORD_ID_SIZE..]);

        Some(Self {
            id: RecordId::from_bytes(id),
            version_ts: u64::from_be_bytes(ts_bytes),
        })
    }

    /// Minimum key for a record (version 0).
    pub fn min_for_record(id: RecordId) -> Self {
        Self::new(id, 0)
    }

    /// Maximum key for a record (max version).
    pub fn max_for_record(id: RecordId) -> Self {
        Self::new(id, u64::MAX)
    }
}

impl fmt::Debug for VersionedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedKey")
            .field("id", &self.id.to_hex())
            .field("version_ts", &self.version_ts)
            .finish()
    }
}

/// Current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_hex_roundtrip() {
        let id = RecordId::generate();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert_eq!(RecordId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn test_record_id_uniqueness() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let id = RecordId::from_bytes([7u8; 16]);
        let key = VersionedKey::new(id, 1234567890123456u64);

        let encoded = key.encode();
        let decoded = VersionedKey::decode(&encoded).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_lexicographic_ordering() {
        let id = RecordId::from_bytes([0u8; 16]);

        let enc1 = VersionedKey::new(id, 100).encode();
        let enc2 = VersionedKey::new(id, 200).encode();
        let enc3 = VersionedKey::new(id, 300).encode();

        assert!(enc1 < enc2);
        assert!(enc2 < enc3);
    }

    #[test]
    fn test_decode_invalid_length() {
        assert!(VersionedKey::decode(&[0u8; 10]).is_none());
        assert!(VersionedKey::decode(&[0u8; 30]).is_none());
    }

    #[test]
    fn test_record_id_serde_as_hex() {
        let id = RecordId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));

        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
