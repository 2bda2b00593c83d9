//! Runtime value representation: what gets encoded, and what decode produces.

use smartstring::{LazyCompact, SmartString};

type DcclString = SmartString<LazyCompact>;

/// A single scalar or nested value carried by a field.
///
/// Tagged enum rather than a type-erased `Any`: every wire kind a leaf codec
/// can produce is enumerated here, so matching on it is exhaustive and the
/// compiler catches a codec returning the wrong kind for its field.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Message(Box<MessageValue>),
}

impl WireValue {
    /// Short name of the variant, used in error messages and `info()` output.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            WireValue::Bool(_) => "bool",
            WireValue::Int(_) => "int",
            WireValue::UInt(_) => "uint",
            WireValue::Float(_) => "float",
            WireValue::Str(_) => "str",
            WireValue::Bytes(_) => "bytes",
            WireValue::Message(_) => "message",
        }
    }

    /// Extracts a `bool`, or `None` if this is not a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extracts an `i64`, widening from `UInt` when it fits.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            WireValue::Int(v) => Some(*v),
            WireValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Extracts a `u64`, widening from non-negative `Int` when it fits.
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            WireValue::UInt(v) => Some(*v),
            WireValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Extracts an `f64`, widening from `Int`/`UInt` for mixed-type comparisons.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            WireValue::Float(v) => Some(*v),
            WireValue::Int(v) => Some(*v as f64),
            WireValue::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Extracts a `&str`, or `None` if this is not a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Extracts a `&[u8]`, or `None` if this is not `Bytes`.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            WireValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Extracts a nested [`MessageValue`], or `None` if this is not a `Message`.
    #[must_use]
    pub fn as_message(&self) -> Option<&MessageValue> {
        match self {
            WireValue::Message(m) => Some(m.as_ref()),
            _ => None,
        }
    }
}

/// What a named field in a [`MessageValue`] currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSlot {
    /// The field has no value (and decode produced none, or the caller never set it).
    Absent,
    /// A single scalar, nested message, or union selection.
    Single(WireValue),
    /// Zero or more repetitions of the field's declared type.
    Repeated(Vec<WireValue>),
}

impl FieldSlot {
    /// The contained single value, if this slot is [`FieldSlot::Single`].
    #[must_use]
    pub fn as_single(&self) -> Option<&WireValue> {
        match self {
            FieldSlot::Single(v) => Some(v),
            _ => None,
        }
    }

    /// The contained repeated values, if this slot is [`FieldSlot::Repeated`].
    #[must_use]
    pub fn as_repeated(&self) -> Option<&[WireValue]> {
        match self {
            FieldSlot::Repeated(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Whether this slot carries no value at all.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldSlot::Absent)
    }
}

/// A materialized message: the schema it was built against, and its fields
/// by name. Field order follows insertion (builder/decode) order, not the
/// descriptor's declared order — codecs look fields up by name, not position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageValue {
    /// Name of the [`crate::descriptor::MessageDescriptor`] this was built against.
    pub descriptor_name: DcclString,
    fields: Vec<(DcclString, FieldSlot)>,
}

impl MessageValue {
    /// An empty message value for the named schema.
    #[must_use]
    pub fn new(descriptor_name: impl Into<DcclString>) -> Self {
        Self {
            descriptor_name: descriptor_name.into(),
            fields: Vec::new(),
        }
    }

    /// Sets (overwriting any prior value) the slot for `field`.
    pub fn set(&mut self, field: impl Into<DcclString>, slot: FieldSlot) {
        let field = field.into();
        if let Some(existing) = self.fields.iter_mut().find(|(name, _)| *name == field) {
            existing.1 = slot;
        } else {
            self.fields.push((field, slot));
        }
    }

    /// Convenience for `set(field, FieldSlot::Single(value.into()))`.
    pub fn set_scalar(&mut self, field: impl Into<DcclString>, value: impl Into<WireValue>) {
        self.set(field, FieldSlot::Single(value.into()));
    }

    /// Convenience for `set(field, FieldSlot::Repeated(values))`.
    pub fn set_repeated(&mut self, field: impl Into<DcclString>, values: Vec<WireValue>) {
        self.set(field, FieldSlot::Repeated(values));
    }

    /// The slot for `field`, or [`FieldSlot::Absent`] if it was never set.
    #[must_use]
    pub fn get(&self, field: &str) -> &FieldSlot {
        static ABSENT: FieldSlot = FieldSlot::Absent;
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map_or(&ABSENT, |(_, slot)| slot)
    }

    /// Shorthand for `get(field).as_single()`.
    #[must_use]
    pub fn get_scalar(&self, field: &str) -> Option<&WireValue> {
        self.get(field).as_single()
    }

    /// Iterates over every `(name, slot)` pair that has been set.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSlot)> {
        self.fields.iter().map(|(name, slot)| (name.as_str(), slot))
    }
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        WireValue::Bool(v)
    }
}
impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        WireValue::Int(v)
    }
}
impl From<u64> for WireValue {
    fn from(v: u64) -> Self {
        WireValue::UInt(v)
    }
}
impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        WireValue::Float(v)
    }
}
impl From<String> for WireValue {
    fn from(v: String) -> Self {
        WireValue::Str(v)
    }
}
impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::Str(v.to_owned())
    }
}
impl From<Vec<u8>> for WireValue {
    fn from(v: Vec<u8>) -> Self {
        WireValue::Bytes(v)
    }
}
impl From<MessageValue> for WireValue {
    fn from(v: MessageValue) -> Self {
        WireValue::Message(Box::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut msg = MessageValue::new("ping");
        msg.set_scalar("a", 42i64);
        msg.set_scalar("b", true);
        assert_eq!(msg.get_scalar("a"), Some(&WireValue::Int(42)));
        assert_eq!(msg.get_scalar("b"), Some(&WireValue::Bool(true)));
        assert!(msg.get("missing").is_absent());
    }

    #[test]
    fn overwriting_a_field_replaces_it() {
        let mut msg = MessageValue::new("ping");
        msg.set_scalar("a", 1i64);
        msg.set_scalar("a", 2i64);
        assert_eq!(msg.get_scalar("a"), Some(&WireValue::Int(2)));
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(WireValue::UInt(5).as_int(), Some(5));
        assert_eq!(WireValue::Int(5).as_uint(), Some(5));
        assert_eq!(WireValue::Int(-1).as_uint(), None);
        assert_eq!(WireValue::UInt(3).as_float(), Some(3.0));
    }
}
