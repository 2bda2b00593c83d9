//! Configuration options for codec loading, encoding, and decoding.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smartstring::{LazyCompact, SmartString};
use std::sync::Arc;

type DcclString = SmartString<LazyCompact>;

/// Default payload limit: 256 bytes, the ceiling this stack's codec crates
/// use when no tighter per-link budget has been configured.
pub const DEFAULT_PAYLOAD_LIMIT_BITS: usize = 256 * 8;

/// Payload limit matching a single acoustic-modem transmission unit, a much
/// tighter budget than [`DEFAULT_PAYLOAD_LIMIT_BITS`].
pub const COMPACT_PAYLOAD_LIMIT_BITS: usize = 32 * 8;

/// Default cap on nested message recursion depth.
pub const DEFAULT_MAX_RECURSION_DEPTH: u32 = 16;

/// Configuration for the codec façade: size budgets and strictness knobs.
#[derive(Clone)]
pub struct Config {
    /// Maximum number of bits a single encoded message (including its identity
    /// prefix) may occupy. Enforced at `load` time against `max_size`, and
    /// again at `encode` time against the actual `size`.
    pub payload_limit_bits: usize,

    /// Maximum depth of nested message-typed fields.
    pub max_recursion_depth: u32,

    /// When true, loading a schema whose `max_size` exceeds `payload_limit_bits`
    /// is rejected outright. When false, oversize schemas still load (useful
    /// while iterating on a schema) but individual `encode` calls that would
    /// exceed the limit still fail.
    pub strict: bool,

    /// Per-message-type overrides, keyed by schema name.
    message_options: Arc<RwLock<FxHashMap<DcclString, MessageOptions>>>,
}

/// Per-schema overrides layered on top of the global [`Config`].
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageOptions {
    /// Overrides `Config::payload_limit_bits` for this one schema.
    pub payload_limit_bits: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            payload_limit_bits: DEFAULT_PAYLOAD_LIMIT_BITS,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            strict: true,
            message_options: Arc::new(RwLock::new(FxHashMap::default())),
        }
    }
}

impl Config {
    /// Creates a configuration with the given payload limit, in bytes.
    #[must_use]
    pub fn new(payload_limit_bytes: usize) -> Self {
        Self {
            payload_limit_bits: payload_limit_bytes * 8,
            ..Default::default()
        }
    }

    /// A permissive preset: a generous payload limit and non-strict loading,
    /// suitable for development and for messages carried over a reliable link.
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            payload_limit_bits: DEFAULT_PAYLOAD_LIMIT_BITS * 4,
            strict: false,
            ..Default::default()
        }
    }

    /// A tight preset matching a single acoustic-modem transmission unit.
    #[must_use]
    pub fn compact() -> Self {
        Self {
            payload_limit_bits: COMPACT_PAYLOAD_LIMIT_BITS,
            strict: true,
            ..Default::default()
        }
    }

    /// Sets per-schema overrides, keyed by schema name.
    pub fn set_message_options(&self, schema_name: impl Into<DcclString>, options: MessageOptions) {
        self.message_options.write().insert(schema_name.into(), options);
    }

    /// Reads per-schema overrides previously set with [`Config::set_message_options`].
    #[must_use]
    pub fn get_message_options(&self, schema_name: &str) -> Option<MessageOptions> {
        self.message_options.read().get(schema_name).cloned()
    }

    /// Effective payload limit for a given schema, applying any override.
    #[must_use]
    pub fn payload_limit_bits_for(&self, schema_name: &str) -> usize {
        self.get_message_options(schema_name)
            .and_then(|o| o.payload_limit_bits)
            .unwrap_or(self.payload_limit_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_payload_limit_is_256_bytes() {
        let config = Config::default();
        assert_eq!(config.payload_limit_bits, 2048);
        assert!(config.strict);
    }

    #[test]
    fn presets_differ() {
        let relaxed = Config::relaxed();
        assert!(!relaxed.strict);
        assert_eq!(relaxed.payload_limit_bits, 8192);

        let compact = Config::compact();
        assert!(compact.strict);
        assert_eq!(compact.payload_limit_bits, 256);
    }

    #[test]
    fn message_options_override_limit() {
        let config = Config::default();
        config.set_message_options(
            "telemetry",
            MessageOptions {
                payload_limit_bits: Some(1024),
            },
        );
        assert_eq!(config.payload_limit_bits_for("telemetry"), 1024);
        assert_eq!(config.payload_limit_bits_for("other"), config.payload_limit_bits);
    }
}
