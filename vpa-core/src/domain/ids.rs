//! ID types.
//!
//! - `SignalEventId`: sequential counter, assigned by the rule engine.
//! - `ConfigHash`: BLAKE3 fingerprint of a loaded, merged `VPAConfig`, used
//!   to tag journal records and golden-fixture cache keys with the exact
//!   threshold set a run used.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential signal event identifier, assigned by the rule engine in
/// detector-registration order within a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalEventId(pub u64);

impl fmt::Display for SignalEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignalEventId({})", self.0)
    }
}

/// Monotonically increasing signal event ID generator, owned by the
/// pipeline orchestrator for the lifetime of a session.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn next_signal_event_id(&mut self) -> SignalEventId {
        let id = SignalEventId(self.next);
        self.next += 1;
        id
    }
}

/// 32-byte BLAKE3 hash of a canonical JSON encoding of a `VPAConfig`.
///
/// Two configs that deep-merge to the same effective tree hash identically,
/// regardless of how the base/override split was structured.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConfigHash([u8; 32]);

impl ConfigHash {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigHash({})", &self.as_hex()[..16])
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl From<ConfigHash> for String {
    fn from(h: ConfigHash) -> String {
        h.as_hex()
    }
}

impl TryFrom<String> for ConfigHash {
    type Error = String;

    fn try_from(hex: String) -> Result<Self, Self::Error> {
        let bytes: Vec<u8> = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| "expected 32 bytes".to_string())?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_gen_is_monotonic() {
        let mut gen = IdGen::default();
        let a = gen.next_signal_event_id();
        let b = gen.next_signal_event_id();
        assert!(b.0 > a.0);
    }

    #[test]
    fn blake3_hash_is_deterministic() {
        let h1 = ConfigHash::from_bytes(b"vol.avg_window_N=20,trend.window_K=14");
        let h2 = ConfigHash::from_bytes(b"vol.avg_window_N=20,trend.window_K=14");
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_config_different_hash() {
        let h1 = ConfigHash::from_bytes(b"trend.window_K=14");
        let h2 = ConfigHash::from_bytes(b"trend.window_K=21");
        assert_ne!(h1, h2);
    }

    #[test]
    fn hash_serialization_roundtrip() {
        let h = ConfigHash::from_bytes(b"test config");
        let json = serde_json::to_string(&h).unwrap();
        let deser: ConfigHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, deser);
    }

    #[test]
    fn hash_hex_is_64_chars() {
        let h = ConfigHash::from_bytes(b"run-1");
        assert_eq!(h.as_hex().len(), 64);
    }
}
