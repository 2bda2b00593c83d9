//! Codec façade: the single entry point applications use to load schemas and
//! encode or decode messages against them.

use crate::bitbuffer::BitBuffer;
use crate::config::Config;
use crate::descriptor::{MessageDescriptor, SchemaId};
use crate::error::{DecodeError, EncodeError, Result, SchemaError};
use crate::message_codec::Engine;
use crate::registry::Registry;
use crate::schema::SchemaSet;
use crate::value::MessageValue;

#[cfg(feature = "tracing")]
use crate::tracing::{decode_span, encode_span, load_span, DecodingMetrics, EncodingMetrics};

/// Bits used by the wire identity prefix's "small id" flag.
const SMALL_ID_BITS: u32 = 7;
/// Bits used by the wire identity prefix's "large id" payload.
const LARGE_ID_BITS: u32 = 15;
/// Largest schema id representable in the compact (8-bit total) prefix form.
const SMALL_ID_MAX: u32 = (1 << SMALL_ID_BITS) - 1;
/// Largest schema id representable at all (16-bit total prefix form).
const LARGE_ID_MAX: u32 = (1 << LARGE_ID_BITS) - 1;

/// Loads schemas and performs bit-level encoding/decoding against them.
///
/// A `Facade` is cheap to keep around for the lifetime of an application: it
/// owns the loaded schema set and a reusable field-codec registry, and every
/// `encode`/`decode` call builds its own short-lived [`crate::context::Context`]
/// rather than mutating any shared traversal state.
pub struct Facade {
    config: Config,
    schemas: SchemaSet,
    engine: Engine,
}

impl Facade {
    /// Creates an empty façade with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let max_recursion_depth = config.max_recursion_depth;
        Self {
            config,
            schemas: SchemaSet::new(),
            engine: Engine::new(Registry::with_defaults(), max_recursion_depth),
        }
    }

    /// Direct access to the registry, for registering custom named codecs
    /// before loading schemas that reference them.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.engine.registry
    }

    /// Loads a schema, validating every field's codec and range, and
    /// checking the schema's maximum encoded size against the configured
    /// payload limit. Any message-typed fields must name a schema already
    /// loaded (load dependencies before dependents).
    ///
    /// # Errors
    /// Returns [`SchemaError`] if a field's codec cannot be resolved, a
    /// message-typed field names an unloaded schema, or (in strict mode)
    /// the schema's maximum size exceeds the payload limit.
    pub fn load(&mut self, descriptor: MessageDescriptor) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = load_span(&descriptor.name);

        self.engine.validate(&self.schemas, &descriptor)?;

        let limit = self.config.payload_limit_bits_for(&descriptor.name);
        let max_bits = self.engine.max_size(&self.schemas, &descriptor)?;
        if self.config.strict && max_bits > limit {
            return Err(SchemaError::Oversize {
                message: descriptor.name,
                max_bits,
                limit_bits: limit,
            }
            .into());
        }

        let id = descriptor.id.0;
        if id > LARGE_ID_MAX {
            return Err(SchemaError::InvalidField {
                field: descriptor.name,
                reason: format!("schema id {id} exceeds the maximum representable id {LARGE_ID_MAX}").into(),
            }
            .into());
        }
        self.schemas.insert(descriptor)
    }

    /// Encodes `msg` (built against the schema named `msg.descriptor_name`)
    /// into a byte-padded wire payload, prefixed with its schema identity.
    pub fn encode(&self, msg: &MessageValue) -> Result<Vec<u8>> {
        #[cfg(feature = "tracing")]
        let _span = encode_span(&msg.descriptor_name);
        #[cfg(feature = "tracing")]
        let mut metrics = EncodingMetrics::new(msg.descriptor_name.to_string());

        let buf = self.encode_bits(msg)?;

        #[cfg(feature = "tracing")]
        for _ in msg.iter() {
            metrics.record_field();
        }

        #[cfg(feature = "tracing")]
        metrics.complete(buf.len());
        Ok(buf.to_bytes())
    }

    /// Encodes `msg` into its bare identity-prefixed bits, with no byte
    /// padding applied. Used directly by [`Facade::encode`] (which pads the
    /// single result) and by [`Facade::encode_repeated`] (which appends many
    /// of these before padding the whole concatenation exactly once).
    fn encode_bits(&self, msg: &MessageValue) -> Result<BitBuffer> {
        let descriptor = self.lookup_by_name(&msg.descriptor_name)?;
        let mut buf = BitBuffer::new();
        encode_identity(&mut buf, descriptor.id);
        buf.append(&self.engine.encode(&self.schemas, &descriptor, msg)?);

        let limit = self.config.payload_limit_bits_for(&descriptor.name);
        if buf.len() > limit {
            return Err(EncodeError::OversizeMessage {
                size_bits: buf.len(),
                limit_bits: limit,
            }
            .into());
        }
        Ok(buf)
    }

    /// Decodes a single message from `bytes`, using its identity prefix to
    /// select the schema.
    pub fn decode(&self, bytes: &[u8]) -> Result<MessageValue> {
        #[cfg(feature = "tracing")]
        let _span = decode_span();
        #[cfg(feature = "tracing")]
        let metrics = DecodingMetrics::new(bytes.len() * 8);

        let mut buf = BitBuffer::from_bytes(bytes, bytes.len() * 8);
        let id = decode_identity(&mut buf)?;
        let descriptor = self
            .schemas
            .get(id)
            .ok_or(DecodeError::UnknownSchemaId { schema_id: id.0 })?;
        let decoded = self.engine.decode(&self.schemas, &descriptor, &mut buf)?;

        #[cfg(feature = "tracing")]
        metrics.complete(&descriptor.name, decoded.iter().count());
        Ok(decoded)
    }

    /// Encodes a heterogeneous sequence of messages back to back. Each
    /// carries its own identity prefix, so the sequence may freely mix
    /// schemas; decoding walks the concatenation with [`Facade::decode_repeated`].
    ///
    /// Messages are packed bit-contiguously (one is not padded out to a byte
    /// boundary before the next begins) with byte padding applied exactly
    /// once, at the very end of the whole concatenation — per §6's wire
    /// format note that repeated concatenation carries no outer framing
    /// between messages.
    pub fn encode_repeated(&self, msgs: &[MessageValue]) -> Result<Vec<u8>> {
        let mut buf = BitBuffer::new();
        for msg in msgs {
            buf.append(&self.encode_bits(msg)?);
        }
        Ok(buf.to_bytes())
    }

    /// Decodes a byte-concatenated sequence of messages produced by
    /// [`Facade::encode_repeated`]. Stops once fewer bits remain than the
    /// smallest possible identity prefix (8 bits): since the whole stream is
    /// only ever byte-padded once, at the very end, any such remainder is
    /// trailing zero padding rather than a truncated message.
    pub fn decode_repeated(&self, bytes: &[u8]) -> Result<Vec<MessageValue>> {
        let mut buf = BitBuffer::from_bytes(bytes, bytes.len() * 8);
        let mut out = Vec::new();
        while buf.len() >= 1 + SMALL_ID_BITS as usize {
            let id = decode_identity(&mut buf)?;
            let descriptor = self
                .schemas
                .get(id)
                .ok_or(DecodeError::UnknownSchemaId { schema_id: id.0 })?;
            out.push(self.engine.decode(&self.schemas, &descriptor, &mut buf)?);
        }
        Ok(out)
    }

    /// Exact encoded size of `msg`, in bits, including its identity prefix.
    pub fn size(&self, msg: &MessageValue) -> Result<usize> {
        let descriptor = self.lookup_by_name(&msg.descriptor_name)?;
        Ok(identity_size(descriptor.id) + self.engine.size(&self.schemas, &descriptor, msg)?)
    }

    /// Smallest possible encoded size for the named schema, in bits,
    /// including its identity prefix.
    pub fn min_size(&self, schema_name: &str) -> Result<usize> {
        let descriptor = self.lookup_by_name(schema_name)?;
        Ok(identity_size(descriptor.id) + self.engine.min_size(&self.schemas, &descriptor)?)
    }

    /// Largest possible encoded size for the named schema, in bits,
    /// including its identity prefix.
    pub fn max_size(&self, schema_name: &str) -> Result<usize> {
        let descriptor = self.lookup_by_name(schema_name)?;
        Ok(identity_size(descriptor.id) + self.engine.max_size(&self.schemas, &descriptor)?)
    }

    /// A human-readable summary of the named schema's field layout.
    pub fn info(&self, schema_name: &str) -> Result<String> {
        let descriptor = self.lookup_by_name(schema_name)?;
        self.engine.info(&self.schemas, &descriptor)
    }

    fn lookup_by_name(&self, name: &str) -> Result<std::sync::Arc<MessageDescriptor>> {
        self.schemas.get_by_name(name).ok_or_else(|| {
            SchemaError::UnknownCodec {
                group: "schema".into(),
                name: name.into(),
            }
            .into()
        })
    }
}

fn encode_identity(buf: &mut BitBuffer, id: SchemaId) {
    if id.0 <= SMALL_ID_MAX {
        buf.push_bits(0, 1);
        buf.push_bits(u64::from(id.0), SMALL_ID_BITS);
    } else {
        buf.push_bits(1, 1);
        buf.push_bits(u64::from(id.0), LARGE_ID_BITS);
    }
}

fn decode_identity(buf: &mut BitBuffer) -> Result<SchemaId> {
    let large = buf.take_bits(1)? == 1;
    let id = if large {
        buf.take_bits(LARGE_ID_BITS)?
    } else {
        buf.take_bits(SMALL_ID_BITS)?
    };
    Ok(SchemaId(id as u32))
}

fn identity_size(id: SchemaId) -> usize {
    if id.0 <= SMALL_ID_MAX {
        1 + SMALL_ID_BITS as usize
    } else {
        1 + LARGE_ID_BITS as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDescriptorBuilder, MessageDescriptorBuilder, WireType};

    fn ping_descriptor() -> MessageDescriptor {
        MessageDescriptorBuilder::new("Ping", 1u32)
            .field(FieldDescriptorBuilder::new("seq", 1, WireType::Int { min: 0, max: 255 }).build())
            .build()
    }

    #[test]
    fn round_trips_through_identity_prefix() {
        let mut facade = Facade::new(Config::default());
        facade.load(ping_descriptor()).unwrap();

        let mut msg = MessageValue::new("Ping");
        msg.set_scalar("seq", 7i64);
        let bytes = facade.encode(&msg).unwrap();
        let decoded = facade.decode(&bytes).unwrap();
        assert_eq!(decoded.get_scalar("seq"), Some(&crate::value::WireValue::Int(7)));
    }

    #[test]
    fn unknown_schema_id_on_decode_errors() {
        let facade = Facade::new(Config::default());
        assert!(facade.decode(&[0x00, 0x00]).is_err());
    }

    #[test]
    fn encode_repeated_round_trips_heterogeneous_batch() {
        let mut facade = Facade::new(Config::default());
        facade.load(ping_descriptor()).unwrap();
        facade
            .load(
                MessageDescriptorBuilder::new("Pong", 2u32)
                    .field(FieldDescriptorBuilder::new("ack", 1, WireType::Bool).build())
                    .build(),
            )
            .unwrap();

        let mut ping = MessageValue::new("Ping");
        ping.set_scalar("seq", 3i64);
        let mut pong = MessageValue::new("Pong");
        pong.set_scalar("ack", true);

        let bytes = facade.encode_repeated(&[ping, pong]).unwrap();
        let decoded = facade.decode_repeated(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].descriptor_name, "Ping");
        assert_eq!(decoded[1].descriptor_name, "Pong");
    }

    #[test]
    fn oversize_schema_rejected_in_strict_mode() {
        let mut facade = Facade::new(Config::new(1)); // 8-bit payload limit
        let descriptor = MessageDescriptorBuilder::new("Big", 1u32)
            .field(FieldDescriptorBuilder::new("blob", 1, WireType::Bytes { max_len: 64 }).build())
            .build();
        assert!(facade.load(descriptor).is_err());
    }

    #[test]
    fn min_size_le_max_size_le_payload_limit_in_strict_mode() {
        let mut facade = Facade::new(Config::default());
        facade.load(ping_descriptor()).unwrap();
        let min = facade.min_size("Ping").unwrap();
        let max = facade.max_size("Ping").unwrap();
        assert!(min <= max);
        assert!(max <= facade.config.payload_limit_bits);
    }
}
