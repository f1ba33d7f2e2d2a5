//! Property flag bits.
//!
//! Flag meanings belong to the storage engine. The model stores the raw
//! bitset without interpreting it; index identities are requested through the
//! binding's `index` attribute.

use bitflags::bitflags;

bitflags! {
    /// Property flags as understood by the storage engine.
    ///
    /// Unknown bits are kept as-is (`from_bits_retain`), the model passes
    /// flags through verbatim.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u32 {
        /// Primary key.
        const ID = 1;
        /// Stored as a non-primitive type.
        const NON_PRIMITIVE_TYPE = 1 << 1;
        /// Value must not be null.
        const NOT_NULL = 1 << 2;
        /// Value index.
        const INDEXED = 1 << 3;
        /// Reserved by the storage engine.
        const RESERVED = 1 << 4;
        /// Unique constraint.
        const UNIQUE = 1 << 5;
        /// IDs are assigned from a monotonic sequence.
        const ID_MONOTONIC_SEQUENCE = 1 << 6;
        /// IDs may be assigned by the application.
        const ID_SELF_ASSIGNABLE = 1 << 7;
        /// Partial index skipping null values.
        const INDEX_PARTIAL_SKIP_NULL = 1 << 8;
        /// Partial index skipping zero values.
        const INDEX_PARTIAL_SKIP_ZERO = 1 << 9;
        /// Virtual property, not stored.
        const VIRTUAL = 1 << 10;
        /// 32-bit hash index.
        const INDEX_HASH = 1 << 11;
        /// 64-bit hash index.
        const INDEX_HASH64 = 1 << 12;
        /// Unsigned integer.
        const UNSIGNED = 1 << 13;
        /// Companion of the ID property (e.g. a date-based partition key).
        const ID_COMPANION = 1 << 14;
    }
}

impl PropertyFlags {
    /// Interprets a raw flag value, keeping unknown bits.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self::from_bits_retain(raw)
    }
}
