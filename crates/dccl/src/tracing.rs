//! Performance tracing support for schema and message codec operations.

use fastrace::{Span, prelude::LocalSpan};
use std::time::Instant;

const LOAD_SPAN: &str = "dccl.schema.load";
const ENCODE_SPAN: &str = "dccl.message.encode";
const DECODE_SPAN: &str = "dccl.message.decode";

/// Creates a distributed tracing span for loading a schema into a facade.
///
/// # Examples
///
/// ```rust
/// use dccl::tracing::load_span;
///
/// let _span = load_span("Ping");
/// // Schema validation and size-checking happens within this span
/// ```
#[inline]
pub fn load_span(_schema_name: &str) -> Span {
    Span::enter_with_local_parent(LOAD_SPAN)
}

/// Creates a distributed tracing span for encoding a message.
///
/// Marked `#[inline]` for minimal overhead on the hot encode path.
#[inline]
pub fn encode_span(_schema_name: &str) -> Span {
    Span::enter_with_local_parent(ENCODE_SPAN)
}

/// Creates a distributed tracing span for decoding a message.
///
/// The schema isn't known until the identity prefix is read, so unlike
/// [`encode_span`] this span carries no `schema` property; callers that want
/// one can call [`Span::add_property`] on the returned span once the
/// descriptor is resolved.
#[inline]
pub fn decode_span() -> Span {
    Span::enter_with_local_parent(DECODE_SPAN)
}

/// Measures encoding performance metrics.
pub struct EncodingMetrics {
    start: Instant,
    schema_name: String,
    field_count: usize,
}

impl EncodingMetrics {
    /// Creates a new encoding metrics tracker.
    pub fn new(schema_name: String) -> Self {
        Self {
            start: Instant::now(),
            schema_name,
            field_count: 0,
        }
    }

    /// Records that a field has been encoded.
    pub fn record_field(&mut self) {
        self.field_count += 1;
    }

    /// Completes the encoding metrics and logs the results.
    pub fn complete(self, encoded_size_bits: usize) {
        let duration = self.start.elapsed();
        log::debug!(
            "dccl encoding completed: schema={}, fields={}, size_bits={}, duration={:?}",
            self.schema_name,
            self.field_count,
            encoded_size_bits,
            duration
        );
    }

    /// Gets the schema name being encoded.
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Gets the current field count.
    pub fn field_count(&self) -> usize {
        self.field_count
    }
}

/// Measures decoding performance metrics.
pub struct DecodingMetrics {
    start: Instant,
    input_size_bits: usize,
}

impl DecodingMetrics {
    /// Creates a new decoding metrics tracker.
    pub fn new(input_size_bits: usize) -> Self {
        Self {
            start: Instant::now(),
            input_size_bits,
        }
    }

    /// Completes the decoding metrics and logs the results.
    pub fn complete(self, schema_name: &str, field_count: usize) {
        let duration = self.start.elapsed();
        log::debug!(
            "dccl decoding completed: schema={}, fields={}, input_size_bits={}, duration={:?}",
            schema_name,
            field_count,
            self.input_size_bits,
            duration
        );
    }

    /// Gets the input size being decoded, in bits.
    pub fn input_size_bits(&self) -> usize {
        self.input_size_bits
    }
}

/// Records bit buffer allocation metrics.
pub fn record_buffer_allocation(_size_bits: usize, _purpose: &str) {
    let _span = LocalSpan::enter_with_local_parent("buffer_allocation");
}

/// Records schema lookup metrics.
pub fn record_schema_lookup(_schema_name: &str, _found: bool, _duration_ns: u64) {
    let _span = LocalSpan::enter_with_local_parent("schema_lookup");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_metrics_roundtrip() {
        let mut metrics = EncodingMetrics::new("Ping".to_string());
        metrics.record_field();
        metrics.record_field();
        assert_eq!(metrics.field_count(), 2);
        metrics.complete(16);
    }

    #[test]
    fn decoding_metrics_roundtrip() {
        let metrics = DecodingMetrics::new(32);
        assert_eq!(metrics.input_size_bits(), 32);
        metrics.complete("Ping", 3);
    }

    #[test]
    fn spans_construct_without_panicking() {
        let _load = load_span("Ping");
        let _encode = encode_span("Ping");
        let _decode = decode_span();
    }

    #[test]
    fn utility_functions_do_not_panic() {
        record_buffer_allocation(1024, "test_buffer");
        record_schema_lookup("Ping", true, 1000);
        record_schema_lookup("Unknown", false, 500);
    }
}
