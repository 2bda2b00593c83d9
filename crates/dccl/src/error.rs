//! Error hierarchy for schema loading, encoding, and decoding.

use smartstring::{LazyCompact, SmartString};

type DcclString = SmartString<LazyCompact>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by [`crate::facade::Facade`] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A schema failed to load or validate.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A value could not be encoded into the wire format.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// A wire payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors raised while building or loading a [`crate::descriptor::MessageDescriptor`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// No field codec is registered under the requested name in the requested group.
    #[error("no field codec named '{name}' registered in group '{group}'")]
    UnknownCodec { group: DcclString, name: DcclString },

    /// A field descriptor is internally inconsistent (bad range, zero-width, etc).
    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: DcclString, reason: DcclString },

    /// A message's maximum encoded size exceeds the configured payload limit.
    #[error("message '{message}' max size {max_bits} bits exceeds payload limit {limit_bits} bits")]
    Oversize {
        message: DcclString,
        max_bits: usize,
        limit_bits: usize,
    },

    /// A `required_if`/`omit_if` predicate referenced a field that has not been
    /// declared earlier in traversal order (no forward references allowed).
    #[error("predicate on field '{field}' references '{referenced}', which has not been declared yet")]
    ForwardReference { field: DcclString, referenced: DcclString },

    /// A predicate expression failed to parse.
    #[error("failed to parse predicate '{expr}': {reason}")]
    PredicateParse { expr: DcclString, reason: DcclString },

    /// A message-typed field refers to a schema id that has not been loaded yet.
    #[error("message field '{field}' refers to unloaded schema id {schema_id}")]
    UnloadedSchema { field: DcclString, schema_id: u32 },

    /// Schema id collides with one already loaded under a different name.
    #[error("schema id {schema_id} already loaded as '{existing}', cannot load as '{name}'")]
    DuplicateSchemaId {
        schema_id: u32,
        existing: DcclString,
        name: DcclString,
    },
}

/// Errors raised while encoding a [`crate::value::MessageValue`].
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The fully encoded message would exceed the configured payload limit.
    #[error("encoded message is {size_bits} bits, exceeding the {limit_bits} bit payload limit")]
    OversizeMessage { size_bits: usize, limit_bits: usize },

    /// A field marked required (statically, or via `required_if`) had no value.
    #[error("required field '{field}' has no value")]
    RequiredFieldMissing { field: DcclString },

    /// A scalar value fell outside the range its codec can represent.
    #[error("field '{field}' value out of range: {reason}")]
    OutOfRange { field: DcclString, reason: DcclString },

    /// A repeated field carried more elements than its declared maximum count.
    #[error("field '{field}' has {count} elements, exceeding max count {max_count}")]
    TooManyElements {
        field: DcclString,
        count: usize,
        max_count: usize,
    },

    /// A predicate evaluated to, or compared against, a value of the wrong type.
    #[error("predicate on field '{field}' produced a type error: {reason}")]
    PredicateTypeError { field: DcclString, reason: DcclString },

    /// The value supplied for a field did not match its declared wire type
    /// (e.g. a `Str` value for an `Int` field). Indicates caller/codec misuse.
    #[error("field '{field}' expected a value of kind {expected}, found {found}")]
    TypeMismatch {
        field: DcclString,
        expected: DcclString,
        found: DcclString,
    },

    /// Recursion depth (nested message fields) exceeded the configured maximum.
    #[error("message nesting exceeded max recursion depth {max_depth}")]
    RecursionDepthExceeded { max_depth: usize },
}

/// Errors raised while decoding a wire payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Fewer bits remained in the buffer than the operation needed.
    #[error("truncated message: needed {needed} more bits, {available} available")]
    TruncatedMessage { needed: usize, available: usize },

    /// The identity prefix or a field's raw bits could not be interpreted.
    #[error("invalid encoding: {reason}")]
    InvalidEncoding { reason: DcclString },

    /// The identity prefix named a schema id that has not been loaded.
    #[error("unknown schema id {schema_id}")]
    UnknownSchemaId { schema_id: u32 },

    /// A decoded scalar fell outside the range its codec declares representable.
    #[error("field '{field}' decoded value out of range: {reason}")]
    OutOfRange { field: DcclString, reason: DcclString },

    /// A predicate evaluated to, or compared against, a value of the wrong type
    /// while deciding whether a field is present during decode.
    #[error("predicate on field '{field}' produced a type error: {reason}")]
    PredicateTypeError { field: DcclString, reason: DcclString },

    /// Decoded bytes were not valid UTF-8 for a `Str` field.
    #[error("field '{field}' is not valid UTF-8")]
    InvalidUtf8 { field: DcclString },

    /// Recursion depth (nested message fields) exceeded the configured maximum.
    #[error("message nesting exceeded max recursion depth {max_depth}")]
    RecursionDepthExceeded { max_depth: usize },
}
