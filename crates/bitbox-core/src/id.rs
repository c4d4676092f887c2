use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A 128-bit opaque process identifier.
///
/// Generated uniformly at random (`Uuid::new_v4`, CSPRNG-backed);
/// uniqueness within a registry is probabilistic, not guaranteed. Displays
/// and parses as the canonical hyphenated hex form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(Uuid);

impl ProcessId {
    /// Generate a fresh, uniformly random process ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The raw 16 bytes of the identifier, e.g. for wire encoding.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Construct a `ProcessId` from raw 16 bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_distinct() {
        let a = ProcessId::new();
        let b = ProcessId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = ProcessId::new();
        let text = id.to_string();
        let parsed: ProcessId = text.parse().expect("valid id text parses");
        assert_eq!(id, parsed);
    }

    #[test]
    fn round_trips_through_bytes() {
        let id = ProcessId::new();
        let bytes = *id.as_bytes();
        assert_eq!(ProcessId::from_bytes(bytes), id);
    }

    #[test]
    fn rejects_garbage_text() {
        assert!("not-a-uuid".parse::<ProcessId>().is_err());
    }
}
