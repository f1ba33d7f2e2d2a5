//! Identity pairs.

use crate::error::{ModelError, ModelResult};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identity of a schema element: a local numeric ID plus a global UID.
///
/// - `id` is 1-based and monotonic within its parent scope
/// - `uid` is random and unique across the whole model, retired UIDs included
///
/// Serialized as the string `"<id>:<uid>"`. The unset pair serializes as an
/// empty string, which is how a fresh model stores its counters.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IdUid {
    id: u32,
    uid: u64,
}

impl IdUid {
    /// The unset pair.
    pub const UNSET: Self = Self { id: 0, uid: 0 };

    /// Creates an identity pair.
    #[inline]
    #[must_use]
    pub const fn new(id: u32, uid: u64) -> Self {
        Self { id, uid }
    }

    /// Returns the local ID.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Returns the global UID.
    #[inline]
    #[must_use]
    pub const fn uid(self) -> u64 {
        self.uid
    }

    /// Returns true if neither component has been assigned.
    #[inline]
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.id == 0 && self.uid == 0
    }

    /// Checks that both components are assigned.
    pub fn validate(self) -> ModelResult<()> {
        if self.id == 0 {
            return Err(ModelError::invalid_id_uid(self.to_string(), "id is zero"));
        }
        if self.uid == 0 {
            return Err(ModelError::invalid_id_uid(self.to_string(), "uid is zero"));
        }
        Ok(())
    }

    /// Returns the local ID following this one, or `None` on overflow.
    #[must_use]
    pub const fn next_id(self) -> Option<u32> {
        self.id.checked_add(1)
    }
}

impl fmt::Debug for IdUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdUid({}:{})", self.id, self.uid)
    }
}

impl fmt::Display for IdUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            Ok(())
        } else {
            write!(f, "{}:{}", self.id, self.uid)
        }
    }
}

impl FromStr for IdUid {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::UNSET);
        }

        let (id, uid) = s
            .split_once(':')
            .ok_or_else(|| ModelError::invalid_id_uid(s, "expected format <id>:<uid>"))?;
        let id = id
            .parse::<u32>()
            .map_err(|e| ModelError::invalid_id_uid(s, format!("bad id: {e}")))?;
        let uid = uid
            .parse::<u64>()
            .map_err(|e| ModelError::invalid_id_uid(s, format!("bad uid: {e}")))?;

        Ok(Self { id, uid })
    }
}

impl From<(u32, u64)> for IdUid {
    fn from((id, uid): (u32, u64)) -> Self {
        Self::new(id, uid)
    }
}

impl Serialize for IdUid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IdUid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
