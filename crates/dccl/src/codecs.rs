//! Leaf field codecs: the primitive wire-type implementations of the field
//! codec contract (`size` / `encode` / `decode` / `min_size` / `max_size` /
//! `validate` / `info`).
//!
//! Message-typed fields are not represented here: they are intercepted
//! earlier, in [`crate::message_codec`], which recurses into the nested
//! descriptor directly rather than going through a leaf codec.

use smartstring::{LazyCompact, SmartString};

use crate::bitbuffer::{bits_for_max_value, offset_decode, offset_encode, BitBuffer};
use crate::descriptor::{FieldDescriptor, WireType};
use crate::error::{DecodeError, EncodeError, Result, SchemaError};
use crate::value::WireValue;

type DcclString = SmartString<LazyCompact>;

/// A concrete, fully parameterized leaf field codec.
///
/// Tagged enum rather than a boxed trait object: the set of primitive wire
/// kinds is closed, and matching on it directly lets the compiler check
/// every variant is handled everywhere the contract is implemented.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCodecKind {
    Bool,
    /// Offset-encoded integer: `bits = ceil(log2(max - min + 1))`.
    Int { bits: u32, min: i64 },
    Enum { bits: u32, values: Vec<DcclString> },
    /// Quantized float: encoded as an offset integer over `[min, max]` at
    /// `10^precision` steps per unit.
    Float { bits: u32, min: f64, max: f64, precision: u8 },
    Str { len_bits: u32, max_len: usize },
    Bytes { len_bits: u32, max_len: usize },
    /// Wraps another leaf codec with a one-bit presence prefix.
    Presence { inner: Box<FieldCodecKind> },
}

impl FieldCodecKind {
    /// Builds the canonical codec for `field`'s wire type, with no presence
    /// wrapping. The registry applies [`FieldCodecKind::with_presence`]
    /// separately when the field declares a plain presence bit.
    pub fn for_wire_type(field: &FieldDescriptor) -> Result<FieldCodecKind> {
        let kind = match &field.wire_type {
            WireType::Bool => FieldCodecKind::Bool,
            WireType::Int { min, max } => {
                if max < min {
                    return Err(SchemaError::InvalidField {
                        field: field.name.clone(),
                        reason: "max is less than min".into(),
                    }
                    .into());
                }
                let span = (*max as i128) - (*min as i128);
                let bits = bits_for_max_value(span as u64);
                FieldCodecKind::Int { bits, min: *min }
            }
            WireType::FixedInt { bits, signed } => {
                let min = if *signed { -(1i64 << (bits - 1)) } else { 0 };
                FieldCodecKind::Int { bits: *bits, min }
            }
            WireType::Enum { values } => {
                if values.is_empty() {
                    return Err(SchemaError::InvalidField {
                        field: field.name.clone(),
                        reason: "enum has no values".into(),
                    }
                    .into());
                }
                let bits = bits_for_max_value(values.len() as u64 - 1);
                FieldCodecKind::Enum {
                    bits,
                    values: values.clone(),
                }
            }
            WireType::Float { min, max, precision } => {
                if max < min {
                    return Err(SchemaError::InvalidField {
                        field: field.name.clone(),
                        reason: "max is less than min".into(),
                    }
                    .into());
                }
                let scale = 10f64.powi(i32::from(*precision));
                let span = ((max - min) * scale).round() as u64;
                let bits = bits_for_max_value(span);
                FieldCodecKind::Float {
                    bits,
                    min: *min,
                    max: *max,
                    precision: *precision,
                }
            }
            WireType::Str { max_len } => FieldCodecKind::Str {
                len_bits: bits_for_max_value(*max_len as u64),
                max_len: *max_len,
            },
            WireType::Bytes { max_len } => FieldCodecKind::Bytes {
                len_bits: bits_for_max_value(*max_len as u64),
                max_len: *max_len,
            },
            WireType::Message { .. } => {
                return Err(SchemaError::InvalidField {
                    field: field.name.clone(),
                    reason: "message-typed fields are not resolved through the leaf registry".into(),
                }
                .into())
            }
        };
        Ok(kind)
    }

    /// Wraps `self` in a [`FieldCodecKind::Presence`] one-bit prefix.
    #[must_use]
    pub fn with_presence(self) -> FieldCodecKind {
        FieldCodecKind::Presence { inner: Box::new(self) }
    }

    /// Bits needed to encode `value` (or, for `Presence`, to encode the
    /// presence bit plus the inner value when `value` is `Some`).
    pub fn size(&self, value: Option<&WireValue>, field: &FieldDescriptor) -> Result<usize> {
        match self {
            FieldCodecKind::Bool => Ok(1),
            FieldCodecKind::Int { bits, .. } | FieldCodecKind::Enum { bits, .. } | FieldCodecKind::Float { bits, .. } => {
                Ok(*bits as usize)
            }
            FieldCodecKind::Str { len_bits, .. } => {
                let len = value
                    .and_then(WireValue::as_str)
                    .map(str::len)
                    .unwrap_or(0);
                Ok(*len_bits as usize + len * 8)
            }
            FieldCodecKind::Bytes { len_bits, .. } => {
                let len = value
                    .and_then(WireValue::as_bytes)
                    .map(<[u8]>::len)
                    .unwrap_or(0);
                Ok(*len_bits as usize + len * 8)
            }
            FieldCodecKind::Presence { inner } => match value {
                None => Ok(1),
                Some(v) => Ok(1 + inner.size(Some(v), field)?),
            },
        }
    }

    /// Encodes `value` into `buf`.
    ///
    /// `value` is `None` only for [`FieldCodecKind::Presence`]; every other
    /// variant requires `Some` (the message codec only calls `encode` for
    /// fields it has already determined should be present).
    pub fn encode(&self, buf: &mut BitBuffer, value: Option<&WireValue>, field: &FieldDescriptor) -> Result<()> {
        match self {
            FieldCodecKind::Presence { inner } => match value {
                None => {
                    buf.push_bits(0, 1);
                    Ok(())
                }
                Some(v) => {
                    buf.push_bits(1, 1);
                    inner.encode(buf, Some(v), field)
                }
            },
            _ => {
                let value = value.ok_or_else(|| EncodeError::RequiredFieldMissing {
                    field: field.name.clone(),
                })?;
                self.encode_present(buf, value, field)
            }
        }
    }

    fn encode_present(&self, buf: &mut BitBuffer, value: &WireValue, field: &FieldDescriptor) -> Result<()> {
        match self {
            FieldCodecKind::Bool => {
                let b = value.as_bool().ok_or_else(|| type_mismatch(field, "bool", value))?;
                buf.push_bits(u64::from(b), 1);
            }
            FieldCodecKind::Int { bits, min } => {
                let v = value.as_int().ok_or_else(|| type_mismatch(field, "int", value))?;
                let max = min.wrapping_add(max_span(*bits) as i64);
                if v < *min || v > max {
                    return Err(EncodeError::OutOfRange {
                        field: field.name.clone(),
                        reason: format!("{v} not in [{min}, {max}]").into(),
                    }
                    .into());
                }
                buf.push_bits(offset_encode(v, *min), *bits);
            }
            FieldCodecKind::Enum { bits, values } => {
                let s = value.as_str().ok_or_else(|| type_mismatch(field, "enum", value))?;
                let idx = values
                    .iter()
                    .position(|v| v == s)
                    .ok_or_else(|| EncodeError::OutOfRange {
                        field: field.name.clone(),
                        reason: format!("'{s}' is not a declared enum value").into(),
                    })?;
                buf.push_bits(idx as u64, *bits);
            }
            FieldCodecKind::Float { bits, min, max, precision } => {
                let v = value.as_float().ok_or_else(|| type_mismatch(field, "float", value))?;
                if v < *min || v > *max {
                    return Err(EncodeError::OutOfRange {
                        field: field.name.clone(),
                        reason: format!("{v} not in [{min}, {max}]").into(),
                    }
                    .into());
                }
                let scale = 10f64.powi(i32::from(*precision));
                let quantized = ((v - min) * scale).round() as u64;
                buf.push_bits(quantized.min(max_span(*bits)), *bits);
            }
            FieldCodecKind::Str { len_bits, max_len } => {
                let s = value.as_str().ok_or_else(|| type_mismatch(field, "str", value))?;
                if s.len() > *max_len {
                    return Err(EncodeError::OutOfRange {
                        field: field.name.clone(),
                        reason: format!("length {} exceeds max {}", s.len(), max_len).into(),
                    }
                    .into());
                }
                buf.push_bits(s.len() as u64, *len_bits);
                for byte in s.as_bytes() {
                    buf.push_bits(u64::from(*byte), 8);
                }
            }
            FieldCodecKind::Bytes { len_bits, max_len } => {
                let b = value.as_bytes().ok_or_else(|| type_mismatch(field, "bytes", value))?;
                if b.len() > *max_len {
                    return Err(EncodeError::OutOfRange {
                        field: field.name.clone(),
                        reason: format!("length {} exceeds max {}", b.len(), max_len).into(),
                    }
                    .into());
                }
                buf.push_bits(b.len() as u64, *len_bits);
                for byte in b {
                    buf.push_bits(u64::from(*byte), 8);
                }
            }
            FieldCodecKind::Presence { .. } => unreachable!("presence handled in encode()"),
        }
        Ok(())
    }

    /// Decodes a value from `buf`. Returns `None` only when `self` is
    /// [`FieldCodecKind::Presence`] and the presence bit was clear.
    pub fn decode(&self, buf: &mut BitBuffer, field: &FieldDescriptor) -> Result<Option<WireValue>> {
        match self {
            FieldCodecKind::Presence { inner } => {
                if buf.take_bits(1)? == 1 {
                    Ok(inner.decode(buf, field)?)
                } else {
                    Ok(None)
                }
            }
            FieldCodecKind::Bool => Ok(Some(WireValue::Bool(buf.take_bits(1)? == 1))),
            FieldCodecKind::Int { bits, min } => {
                let raw = buf.take_bits(*bits)?;
                Ok(Some(WireValue::Int(offset_decode(raw, *min))))
            }
            FieldCodecKind::Enum { bits, values } => {
                let idx = buf.take_bits(*bits)? as usize;
                let value = values.get(idx).ok_or_else(|| DecodeError::OutOfRange {
                    field: field.name.clone(),
                    reason: format!("enum index {idx} out of range").into(),
                })?;
                Ok(Some(WireValue::Str(value.to_string())))
            }
            FieldCodecKind::Float { bits, min, precision, .. } => {
                let raw = buf.take_bits(*bits)?;
                let scale = 10f64.powi(i32::from(*precision));
                let v = min + (raw as f64) / scale;
                Ok(Some(WireValue::Float(v)))
            }
            FieldCodecKind::Str { len_bits, max_len } => {
                let len = buf.take_bits(*len_bits)? as usize;
                if len > *max_len {
                    return Err(DecodeError::InvalidEncoding {
                        reason: format!("string length {len} exceeds max {max_len}").into(),
                    }
                    .into());
                }
                let mut bytes = Vec::with_capacity(len);
                for _ in 0..len {
                    bytes.push(buf.take_bits(8)? as u8);
                }
                let s = String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
                    field: field.name.clone(),
                })?;
                Ok(Some(WireValue::Str(s)))
            }
            FieldCodecKind::Bytes { len_bits, max_len } => {
                let len = buf.take_bits(*len_bits)? as usize;
                if len > *max_len {
                    return Err(DecodeError::InvalidEncoding {
                        reason: format!("byte length {len} exceeds max {max_len}").into(),
                    }
                    .into());
                }
                let mut bytes = Vec::with_capacity(len);
                for _ in 0..len {
                    bytes.push(buf.take_bits(8)? as u8);
                }
                Ok(Some(WireValue::Bytes(bytes)))
            }
        }
    }

    /// Smallest possible encoding, e.g. for a field that may be omitted or empty.
    #[must_use]
    pub fn min_size(&self) -> usize {
        match self {
            FieldCodecKind::Bool => 1,
            FieldCodecKind::Int { bits, .. } | FieldCodecKind::Enum { bits, .. } | FieldCodecKind::Float { bits, .. } => {
                *bits as usize
            }
            FieldCodecKind::Str { len_bits, .. } | FieldCodecKind::Bytes { len_bits, .. } => *len_bits as usize,
            FieldCodecKind::Presence { .. } => 1,
        }
    }

    /// Largest possible encoding.
    #[must_use]
    pub fn max_size(&self) -> usize {
        match self {
            FieldCodecKind::Bool => 1,
            FieldCodecKind::Int { bits, .. } | FieldCodecKind::Enum { bits, .. } | FieldCodecKind::Float { bits, .. } => {
                *bits as usize
            }
            FieldCodecKind::Str { len_bits, max_len } | FieldCodecKind::Bytes { len_bits, max_len } => {
                *len_bits as usize + max_len * 8
            }
            FieldCodecKind::Presence { inner } => 1 + inner.max_size(),
        }
    }

    /// Checks internal consistency (non-zero ranges, etc). Most invariants
    /// are already enforced at construction time by [`Self::for_wire_type`];
    /// this additionally rejects zero-width codecs on non-degenerate types.
    pub fn validate(&self, field: &FieldDescriptor) -> Result<()> {
        match self {
            FieldCodecKind::Int { bits, .. } if *bits > 64 => Err(SchemaError::InvalidField {
                field: field.name.clone(),
                reason: "integer codec exceeds 64 bits".into(),
            }
            .into()),
            FieldCodecKind::Presence { inner } => inner.validate(field),
            _ => Ok(()),
        }
    }

    /// Human-readable summary, as returned by [`crate::facade::Facade::info`].
    #[must_use]
    pub fn info(&self, field: &FieldDescriptor) -> String {
        match self {
            FieldCodecKind::Bool => format!("{}: bool (1 bit)", field.name),
            FieldCodecKind::Int { bits, min } => format!("{}: int[{min}..] ({bits} bits)", field.name),
            FieldCodecKind::Enum { bits, values } => {
                format!("{}: enum{:?} ({bits} bits)", field.name, values)
            }
            FieldCodecKind::Float { bits, min, max, precision } => {
                format!("{}: float[{min}..{max}]@{precision} ({bits} bits)", field.name)
            }
            FieldCodecKind::Str { max_len, .. } => format!("{}: str[<={max_len}]", field.name),
            FieldCodecKind::Bytes { max_len, .. } => format!("{}: bytes[<={max_len}]", field.name),
            FieldCodecKind::Presence { inner } => format!("optional {}", inner.info(field)),
        }
    }
}

fn max_span(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn type_mismatch(field: &FieldDescriptor, expected: &str, found: &WireValue) -> crate::error::Error {
    EncodeError::TypeMismatch {
        field: field.name.clone(),
        expected: expected.into(),
        found: found.kind_name().into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldDescriptorBuilder;

    fn int_field(min: i64, max: i64) -> FieldDescriptor {
        FieldDescriptorBuilder::new("x", 1, WireType::Int { min, max }).build()
    }

    #[test]
    fn int_codec_round_trips_scenario_a() {
        let field = int_field(0, 63);
        let codec = FieldCodecKind::for_wire_type(&field).unwrap();
        assert_eq!(codec, FieldCodecKind::Int { bits: 6, min: 0 });

        let mut buf = BitBuffer::new();
        codec.encode(&mut buf, Some(&WireValue::Int(40)), &field).unwrap();
        assert_eq!(buf.len(), 6);
        let decoded = codec.decode(&mut buf, &field).unwrap();
        assert_eq!(decoded, Some(WireValue::Int(40)));
    }

    #[test]
    fn signed_int_uses_offset_encoding() {
        let field = int_field(-10, 10);
        let codec = FieldCodecKind::for_wire_type(&field).unwrap();
        let mut buf = BitBuffer::new();
        codec.encode(&mut buf, Some(&WireValue::Int(-5)), &field).unwrap();
        let decoded = codec.decode(&mut buf, &field).unwrap();
        assert_eq!(decoded, Some(WireValue::Int(-5)));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let field = int_field(0, 10);
        let codec = FieldCodecKind::for_wire_type(&field).unwrap();
        let mut buf = BitBuffer::new();
        assert!(codec.encode(&mut buf, Some(&WireValue::Int(11)), &field).is_err());
    }

    #[test]
    fn presence_wrapper_round_trips_absence() {
        let field = FieldDescriptorBuilder::new("maybe", 1, WireType::Bool)
            .optional()
            .build();
        let codec = FieldCodecKind::for_wire_type(&field).unwrap().with_presence();
        let mut buf = BitBuffer::new();
        codec.encode(&mut buf, None, &field).unwrap();
        assert_eq!(buf.len(), 1);
        assert_eq!(codec.decode(&mut buf, &field).unwrap(), None);
    }

    #[test]
    fn string_codec_prefixes_length() {
        let field = FieldDescriptorBuilder::new("s", 1, WireType::Str { max_len: 255 }).build();
        let codec = FieldCodecKind::for_wire_type(&field).unwrap();
        let mut buf = BitBuffer::new();
        codec
            .encode(&mut buf, Some(&WireValue::Str("hi".to_owned())), &field)
            .unwrap();
        assert_eq!(buf.len(), 8 + 2 * 8);
        assert_eq!(codec.decode(&mut buf, &field).unwrap(), Some(WireValue::Str("hi".to_owned())));
    }

    #[test]
    fn enum_codec_encodes_index() {
        let field = FieldDescriptorBuilder::new(
            "e",
            1,
            WireType::Enum {
                values: vec!["A".into(), "B".into(), "C".into()],
            },
        )
        .build();
        let codec = FieldCodecKind::for_wire_type(&field).unwrap();
        assert_eq!(codec, FieldCodecKind::Enum { bits: 2, values: vec!["A".into(), "B".into(), "C".into()] });
        let mut buf = BitBuffer::new();
        codec.encode(&mut buf, Some(&WireValue::Str("B".to_owned())), &field).unwrap();
        assert_eq!(codec.decode(&mut buf, &field).unwrap(), Some(WireValue::Str("B".to_owned())));
    }
}
