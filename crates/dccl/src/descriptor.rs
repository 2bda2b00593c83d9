//! Message schema data model: fields, unions, and the builders that assemble them.

use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};

use crate::predicate::Predicate;

type DcclString = SmartString<LazyCompact>;

/// A stable numeric identifier for a loaded schema, carried in the wire
/// identity prefix so a decoder can pick the right [`MessageDescriptor`]
/// without any external framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub u32);

impl From<u32> for SchemaId {
    fn from(v: u32) -> Self {
        SchemaId(v)
    }
}

/// The wire-level shape of a field's value, independent of its presence rules.
#[derive(Debug, Clone, PartialEq)]
pub enum WireType {
    Bool,
    /// Integer value known to lie in `min..=max`; width is derived at load time.
    Int { min: i64, max: i64 },
    /// Integer with an explicit bit width, not derived from a value range.
    FixedInt { bits: u32, signed: bool },
    /// One of a closed set of named values.
    Enum { values: Vec<DcclString> },
    /// IEEE-754-equivalent value, quantized to `precision` decimal digits and
    /// encoded as a ranged integer over `min..=max`.
    Float { min: f64, max: f64, precision: u8 },
    /// Length-prefixed UTF-8 text, at most `max_len` bytes.
    Str { max_len: usize },
    /// Length-prefixed raw bytes, at most `max_len` bytes.
    Bytes { max_len: usize },
    /// A nested message, encoded recursively via its own descriptor.
    Message { schema: SchemaId },
}

/// Whether a field carries one value or a bounded sequence of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Singular,
    Repeated { max_count: usize },
}

/// Dynamic presence rules layered on top of a field's static declaration.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    /// If true and the predicate evaluates to true, the field is omitted
    /// regardless of whether a value was supplied.
    pub omit_if: Option<Predicate>,
    /// If true and the predicate evaluates to true, the field must carry a
    /// value (encode fails with `RequiredFieldMissing` if it does not).
    pub required_if: Option<Predicate>,
    /// Whether this field uses a one-bit presence prefix when no dynamic
    /// condition determines its presence (plain optional field).
    pub presence_bit: bool,
}

/// One field in a [`MessageDescriptor`].
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: DcclString,
    /// 1-based declaration order; also governs traversal/evaluation order.
    pub tag: u16,
    pub wire_type: WireType,
    pub label: Label,
    pub presence: Presence,
    /// True if this field belongs to the header portion rather than the body.
    pub in_head: bool,
    /// Explicit field-codec name override (registry lookup by name).
    pub codec_name: Option<DcclString>,
    /// Field-codec group override; inherited by any nested message field.
    pub codec_group: Option<DcclString>,
    /// Bit width override for the repeated-count prefix; defaults to
    /// `ceil(log2(max_count + 1))` when unset.
    pub count_bits: Option<u32>,
}

impl FieldDescriptor {
    /// Whether this field is allowed to hold multiple values.
    #[must_use]
    pub fn is_repeated(&self) -> bool {
        matches!(self.label, Label::Repeated { .. })
    }

    /// The declared maximum repetition count, or 1 for a singular field.
    #[must_use]
    pub fn max_count(&self) -> usize {
        match self.label {
            Label::Singular => 1,
            Label::Repeated { max_count } => max_count,
        }
    }
}

/// A group of mutually exclusive fields: at most one may carry a value.
#[derive(Debug, Clone)]
pub struct UnionDescriptor {
    pub name: DcclString,
    /// Tags of the fields making up the alternatives, in declaration order.
    pub member_tags: Vec<u16>,
}

/// A complete message schema: its fields, grouped unions, and identity.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub name: DcclString,
    pub id: SchemaId,
    pub fields: Vec<FieldDescriptor>,
    pub unions: Vec<UnionDescriptor>,
}

impl MessageDescriptor {
    /// The field declared with `tag`, if any.
    #[must_use]
    pub fn field_by_tag(&self, tag: u16) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// The field declared with `name`, if any.
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The union (if any) that `tag` is a member of.
    #[must_use]
    pub fn union_for_tag(&self, tag: u16) -> Option<&UnionDescriptor> {
        self.unions.iter().find(|u| u.member_tags.contains(&tag))
    }

    /// Fields in `in_head` order first, then body order, each group sorted by tag.
    ///
    /// Most messages carry only a handful of header fields, so this stays on
    /// the stack rather than allocating for every encode/decode traversal.
    #[must_use]
    pub fn head_fields(&self) -> SmallVec<[&FieldDescriptor; crate::SMALL_FIELD_COLLECTION_SIZE]> {
        let mut v: SmallVec<[&FieldDescriptor; crate::SMALL_FIELD_COLLECTION_SIZE]> =
            self.fields.iter().filter(|f| f.in_head).collect();
        v.sort_by_key(|f| f.tag);
        v
    }

    /// Body fields (`in_head == false`), sorted by tag.
    #[must_use]
    pub fn body_fields(&self) -> SmallVec<[&FieldDescriptor; crate::SMALL_FIELD_COLLECTION_SIZE]> {
        let mut v: SmallVec<[&FieldDescriptor; crate::SMALL_FIELD_COLLECTION_SIZE]> =
            self.fields.iter().filter(|f| !f.in_head).collect();
        v.sort_by_key(|f| f.tag);
        v
    }
}

/// Fluent builder for a single [`FieldDescriptor`].
pub struct FieldDescriptorBuilder {
    name: DcclString,
    tag: u16,
    wire_type: WireType,
    label: Label,
    presence: Presence,
    in_head: bool,
    codec_name: Option<DcclString>,
    codec_group: Option<DcclString>,
    count_bits: Option<u32>,
}

impl FieldDescriptorBuilder {
    /// Starts building a field with `name`, `tag` and `wire_type`.
    #[must_use]
    pub fn new(name: impl Into<DcclString>, tag: u16, wire_type: WireType) -> Self {
        Self {
            name: name.into(),
            tag,
            wire_type,
            label: Label::Singular,
            presence: Presence::default(),
            in_head: false,
            codec_name: None,
            codec_group: None,
            count_bits: None,
        }
    }

    /// Marks the field repeated, with at most `max_count` elements.
    #[must_use]
    pub fn repeated(mut self, max_count: usize) -> Self {
        self.label = Label::Repeated { max_count };
        self
    }

    /// Places the field in the message header rather than its body.
    #[must_use]
    pub fn in_head(mut self) -> Self {
        self.in_head = true;
        self
    }

    /// Sets an `omit_if` dynamic-presence predicate.
    #[must_use]
    pub fn omit_if(mut self, predicate: Predicate) -> Self {
        self.presence.omit_if = Some(predicate);
        self
    }

    /// Sets a `required_if` dynamic-presence predicate.
    #[must_use]
    pub fn required_if(mut self, predicate: Predicate) -> Self {
        self.presence.required_if = Some(predicate);
        self
    }

    /// `only_if(p)` is shorthand for pairing `required_if(p)` with
    /// `omit_if(!p)`: the field is present exactly when `p` holds, absent
    /// otherwise, with no third state.
    #[must_use]
    pub fn only_if(mut self, predicate: Predicate) -> Self {
        self.presence.omit_if = Some(Predicate::Not(Box::new(predicate.clone())));
        self.presence.required_if = Some(predicate);
        self
    }

    /// Enables a one-bit presence prefix for this (statically optional) field.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.presence.presence_bit = true;
        self
    }

    /// Overrides the field-codec name used to resolve this field in the registry.
    #[must_use]
    pub fn codec(mut self, name: impl Into<DcclString>) -> Self {
        self.codec_name = Some(name.into());
        self
    }

    /// Overrides the codec group inherited by this field and its descendants.
    #[must_use]
    pub fn codec_group(mut self, group: impl Into<DcclString>) -> Self {
        self.codec_group = Some(group.into());
        self
    }

    /// Overrides the bit width of the repeated-count prefix.
    #[must_use]
    pub fn count_bits(mut self, bits: u32) -> Self {
        self.count_bits = Some(bits);
        self
    }

    /// Finalizes the field descriptor.
    #[must_use]
    pub fn build(self) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name,
            tag: self.tag,
            wire_type: self.wire_type,
            label: self.label,
            presence: self.presence,
            in_head: self.in_head,
            codec_name: self.codec_name,
            codec_group: self.codec_group,
            count_bits: self.count_bits,
        }
    }
}

/// Fluent builder for a [`MessageDescriptor`].
pub struct MessageDescriptorBuilder {
    name: DcclString,
    id: SchemaId,
    fields: Vec<FieldDescriptor>,
    unions: Vec<UnionDescriptor>,
}

impl MessageDescriptorBuilder {
    /// Starts building a schema named `name` with wire identity `id`.
    #[must_use]
    pub fn new(name: impl Into<DcclString>, id: impl Into<SchemaId>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            fields: Vec::new(),
            unions: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares a union over the fields carrying the given tags; at most one
    /// of them may be set when encoding.
    #[must_use]
    pub fn union(mut self, name: impl Into<DcclString>, member_tags: Vec<u16>) -> Self {
        self.unions.push(UnionDescriptor {
            name: name.into(),
            member_tags,
        });
        self
    }

    /// Finalizes the message descriptor.
    #[must_use]
    pub fn build(self) -> MessageDescriptor {
        MessageDescriptor {
            name: self.name,
            id: self.id,
            fields: self.fields,
            unions: self.unions,
        }
    }
}
