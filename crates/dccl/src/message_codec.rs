//! Default message codec: header/body traversal, union case-bit encoding,
//! dynamic-condition application, and recursion into nested messages.

use crate::bitbuffer::{bits_for_max_value, BitBuffer};
use crate::context::{Context, Part};
use crate::descriptor::{FieldDescriptor, MessageDescriptor, UnionDescriptor, WireType};
use crate::error::{DecodeError, EncodeError, Error, Result, SchemaError};
use crate::registry::{Registry, DEFAULT_GROUP};
use crate::schema::SchemaSet;
use crate::value::{FieldSlot, MessageValue, WireValue};

/// Drives the header/body/union/field traversal of the default message codec.
///
/// Stateless beyond its registry: the traversal context and recursion depth
/// are threaded through each call rather than stored, so one `Engine` can
/// serve concurrent encode/decode calls without interior mutability.
pub struct Engine {
    pub registry: Registry,
    pub max_recursion_depth: u32,
}

impl Engine {
    #[must_use]
    pub fn new(registry: Registry, max_recursion_depth: u32) -> Self {
        Self {
            registry,
            max_recursion_depth,
        }
    }

    /// Encodes `msg` against `descriptor` into a fresh bit buffer.
    pub fn encode(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor, msg: &MessageValue) -> Result<BitBuffer> {
        let mut buf = BitBuffer::new();
        let mut ctx = Context::new();
        {
            let mut guard = ctx.push(msg.clone(), Part::Body, DEFAULT_GROUP.into());
            self.encode_fields(schemas, descriptor, msg, &mut buf, guard.context(), 0)?;
        }
        Ok(buf)
    }

    /// Decodes one message of shape `descriptor` from `buf`, consuming
    /// exactly as many bits as its fields require.
    pub fn decode(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor, buf: &mut BitBuffer) -> Result<MessageValue> {
        let mut ctx = Context::new();
        let built = {
            let mut guard = ctx.push(MessageValue::new(descriptor.name.clone()), Part::Body, DEFAULT_GROUP.into());
            self.decode_fields(schemas, descriptor, buf, guard.context(), 0)?;
            guard.context().current_message().cloned().expect("frame just pushed")
        };
        Ok(built)
    }

    /// Exact encoded size of `msg` against `descriptor`, in bits.
    pub fn size(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor, msg: &MessageValue) -> Result<usize> {
        Ok(self.encode(schemas, descriptor, msg)?.len())
    }

    /// Smallest possible encoding of `descriptor`, assuming every omittable
    /// field is omitted. See the design notes on dynamic-condition fields:
    /// a field guarded by `omit_if`/`required_if` is optimistically assumed
    /// omittable, so this is a lower bound, not necessarily achievable by
    /// every legal value of the message.
    pub fn min_size(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor) -> Result<usize> {
        let mut total = 0usize;
        for field in descriptor.head_fields() {
            total += self.min_size_field(schemas, descriptor, field)?;
        }
        for union in &descriptor.unions {
            total += bits_for_max_value(union.member_tags.len() as u64) as usize;
        }
        for field in descriptor.body_fields() {
            if descriptor.union_for_tag(field.tag).is_some() {
                continue;
            }
            total += self.min_size_field(schemas, descriptor, field)?;
        }
        Ok(total)
    }

    /// Largest possible encoding of `descriptor`, assuming every optional
    /// field is present, every repeated field reaches its maximum count, and
    /// (for a union) the costliest member is the one selected.
    pub fn max_size(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor) -> Result<usize> {
        let mut total = 0usize;
        for field in descriptor.head_fields() {
            total += self.max_size_field(schemas, descriptor, field)?;
        }
        for union in &descriptor.unions {
            let case_bits = bits_for_max_value(union.member_tags.len() as u64) as usize;
            let mut worst = 0usize;
            for tag in &union.member_tags {
                let field = descriptor
                    .field_by_tag(*tag)
                    .expect("union member tag must name a declared field");
                worst = worst.max(self.max_size_field(schemas, descriptor, field)?);
            }
            total += case_bits + worst;
        }
        for field in descriptor.body_fields() {
            if descriptor.union_for_tag(field.tag).is_some() {
                continue;
            }
            total += self.max_size_field(schemas, descriptor, field)?;
        }
        Ok(total)
    }

    /// Human-readable per-field layout summary.
    pub fn info(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor) -> Result<String> {
        let mut lines = vec![format!("{} (schema id {})", descriptor.name, descriptor.id.0)];
        for field in descriptor.head_fields() {
            lines.push(format!("  [head] {}", self.info_field(schemas, field)?));
        }
        for field in descriptor.body_fields() {
            lines.push(format!("  [body] {}", self.info_field(schemas, field)?));
        }
        Ok(lines.join("\n"))
    }

    /// Validates every field's codec and range declarations, and that every
    /// message-typed field names an already-loaded schema.
    pub fn validate(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor) -> Result<()> {
        for field in &descriptor.fields {
            self.resolve_for_validation(schemas, field)?;
        }
        check_forward_references(descriptor)?;
        Ok(())
    }

    fn resolve_for_validation(&self, schemas: &SchemaSet, field: &FieldDescriptor) -> Result<()> {
        match &field.wire_type {
            WireType::Message { schema } => schemas
                .get(*schema)
                .map(|_| ())
                .ok_or_else(|| {
                    SchemaError::UnloadedSchema {
                        field: field.name.clone(),
                        schema_id: schema.0,
                    }
                    .into()
                }),
            _ => self.registry.resolve(field, DEFAULT_GROUP).map(|_| ()),
        }
    }

    fn min_size_field(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor, field: &FieldDescriptor) -> Result<usize> {
        let always_present = field.presence.omit_if.is_none()
            && field.presence.required_if.is_none()
            && !field.presence.presence_bit;
        if field.is_repeated() {
            let count_bits = field.count_bits.unwrap_or_else(|| bits_for_max_value(field.max_count() as u64));
            return Ok(count_bits as usize);
        }
        if !always_present {
            return Ok(if field.presence.presence_bit { 1 } else { 0 });
        }
        self.leaf_or_nested_size(schemas, descriptor, field, true)
    }

    fn max_size_field(&self, schemas: &SchemaSet, descriptor: &MessageDescriptor, field: &FieldDescriptor) -> Result<usize> {
        if field.is_repeated() {
            let count_bits = field.count_bits.unwrap_or_else(|| bits_for_max_value(field.max_count() as u64));
            let element = self.leaf_or_nested_size(schemas, descriptor, field, false)?;
            return Ok(count_bits as usize + field.max_count() * element);
        }
        // The codec `Registry::resolve` returns for a `presence_bit` field is
        // already wrapped in `FieldCodecKind::Presence`, which accounts for
        // that bit itself; adding it again here would double-count it.
        self.leaf_or_nested_size(schemas, descriptor, field, false)
    }

    fn leaf_or_nested_size(
        &self,
        schemas: &SchemaSet,
        descriptor: &MessageDescriptor,
        field: &FieldDescriptor,
        min: bool,
    ) -> Result<usize> {
        match &field.wire_type {
            WireType::Message { schema } => {
                let nested = schemas.get(*schema).ok_or_else(|| SchemaError::UnloadedSchema {
                    field: field.name.clone(),
                    schema_id: schema.0,
                })?;
                if min {
                    self.min_size(schemas, &nested)
                } else {
                    self.max_size(schemas, &nested)
                }
            }
            _ => {
                let codec = self.registry.resolve(field, DEFAULT_GROUP)?;
                let _ = descriptor;
                Ok(if min { codec.min_size() } else { codec.max_size() })
            }
        }
    }

    fn info_field(&self, schemas: &SchemaSet, field: &FieldDescriptor) -> Result<String> {
        match &field.wire_type {
            WireType::Message { schema } => {
                let nested = schemas.get(*schema).ok_or_else(|| SchemaError::UnloadedSchema {
                    field: field.name.clone(),
                    schema_id: schema.0,
                })?;
                Ok(format!("{}: message {}", field.name, nested.name))
            }
            _ => {
                let codec = self.registry.resolve(field, DEFAULT_GROUP)?;
                Ok(codec.info(field))
            }
        }
    }

    fn encode_fields(
        &self,
        schemas: &SchemaSet,
        descriptor: &MessageDescriptor,
        msg: &MessageValue,
        buf: &mut BitBuffer,
        ctx: &mut Context,
        depth: u32,
    ) -> Result<()> {
        for field in descriptor.head_fields() {
            self.encode_field(schemas, field, msg, buf, ctx, depth)?;
        }
        for union in &descriptor.unions {
            self.encode_union(schemas, union, descriptor, msg, buf, ctx, depth)?;
        }
        for field in descriptor.body_fields() {
            if descriptor.union_for_tag(field.tag).is_some() {
                continue;
            }
            self.encode_field(schemas, field, msg, buf, ctx, depth)?;
        }
        Ok(())
    }

    fn encode_union(
        &self,
        schemas: &SchemaSet,
        union: &UnionDescriptor,
        descriptor: &MessageDescriptor,
        msg: &MessageValue,
        buf: &mut BitBuffer,
        ctx: &mut Context,
        depth: u32,
    ) -> Result<()> {
        let mut selected: Option<(usize, &FieldDescriptor)> = None;
        for (idx, tag) in union.member_tags.iter().enumerate() {
            let field = descriptor
                .field_by_tag(*tag)
                .expect("union member tag must name a declared field");
            if !msg.get(&field.name).is_absent() {
                if selected.is_some() {
                    return Err(EncodeError::OutOfRange {
                        field: union.name.clone(),
                        reason: "more than one union member carries a value".into(),
                    }
                    .into());
                }
                selected = Some((idx, field));
            }
        }
        let case_bits = bits_for_max_value(union.member_tags.len() as u64);
        match selected {
            None => buf.push_bits(0, case_bits),
            Some((idx, field)) => {
                buf.push_bits((idx + 1) as u64, case_bits);
                let value = msg.get_scalar(&field.name).expect("presence checked above");
                self.encode_one(schemas, field, value, buf, ctx, depth)?;
            }
        }
        Ok(())
    }

    fn encode_field(
        &self,
        schemas: &SchemaSet,
        field: &FieldDescriptor,
        msg: &MessageValue,
        buf: &mut BitBuffer,
        ctx: &mut Context,
        depth: u32,
    ) -> Result<()> {
        let omit = match &field.presence.omit_if {
            Some(pred) => eval_bool(pred, ctx, field, true)?,
            None => false,
        };
        if omit {
            return Ok(());
        }
        let has_dynamic = field.presence.omit_if.is_some() || field.presence.required_if.is_some();

        if field.is_repeated() {
            let values = msg.get(&field.name).as_repeated().unwrap_or(&[]);
            if values.len() > field.max_count() {
                return Err(EncodeError::TooManyElements {
                    field: field.name.clone(),
                    count: values.len(),
                    max_count: field.max_count(),
                }
                .into());
            }
            let count_bits = field.count_bits.unwrap_or_else(|| bits_for_max_value(field.max_count() as u64));
            buf.push_bits(values.len() as u64, count_bits);
            for value in values {
                self.encode_one(schemas, field, value, buf, ctx, depth)?;
            }
            return Ok(());
        }

        match msg.get(&field.name) {
            FieldSlot::Absent => {
                if has_dynamic {
                    // `omit_if` already returned above when it evaluated true, so a
                    // dynamic field reaching here is expected on the wire whether or
                    // not `required_if` itself fired.
                    return Err(EncodeError::RequiredFieldMissing {
                        field: field.name.clone(),
                    }
                    .into());
                }
                let codec = self.registry.resolve(field, ctx.current_group())?;
                codec.encode(buf, None, field)
            }
            FieldSlot::Single(value) => self.encode_one(schemas, field, value, buf, ctx, depth),
            FieldSlot::Repeated(_) => unreachable!("repeated fields handled above"),
        }
    }

    fn encode_one(
        &self,
        schemas: &SchemaSet,
        field: &FieldDescriptor,
        value: &WireValue,
        buf: &mut BitBuffer,
        ctx: &mut Context,
        depth: u32,
    ) -> Result<()> {
        match &field.wire_type {
            WireType::Message { schema } => {
                if depth + 1 > self.max_recursion_depth {
                    return Err(EncodeError::RecursionDepthExceeded {
                        max_depth: self.max_recursion_depth as usize,
                    }
                    .into());
                }
                let nested_descriptor = schemas.get(*schema).ok_or_else(|| SchemaError::UnloadedSchema {
                    field: field.name.clone(),
                    schema_id: schema.0,
                })?;
                let nested_msg = value.as_message().ok_or_else(|| mismatch(field, "message", value))?;
                let group = field.codec_group.clone().unwrap_or_else(|| ctx.current_group().into());
                let mut guard = ctx.push(nested_msg.clone(), Part::Body, group);
                self.encode_fields(schemas, &nested_descriptor, nested_msg, buf, guard.context(), depth + 1)
            }
            _ => {
                let codec = self.registry.resolve(field, ctx.current_group())?;
                codec.encode(buf, Some(value), field)
            }
        }
    }

    fn decode_fields(
        &self,
        schemas: &SchemaSet,
        descriptor: &MessageDescriptor,
        buf: &mut BitBuffer,
        ctx: &mut Context,
        depth: u32,
    ) -> Result<()> {
        for field in descriptor.head_fields() {
            self.decode_field(schemas, field, buf, ctx, depth)?;
        }
        for union in &descriptor.unions {
            self.decode_union(schemas, union, descriptor, buf, ctx, depth)?;
        }
        for field in descriptor.body_fields() {
            if descriptor.union_for_tag(field.tag).is_some() {
                continue;
            }
            self.decode_field(schemas, field, buf, ctx, depth)?;
        }
        Ok(())
    }

    fn decode_union(
        &self,
        schemas: &SchemaSet,
        union: &UnionDescriptor,
        descriptor: &MessageDescriptor,
        buf: &mut BitBuffer,
        ctx: &mut Context,
        depth: u32,
    ) -> Result<()> {
        let case_bits = bits_for_max_value(union.member_tags.len() as u64);
        let case = buf.take_bits(case_bits)? as usize;
        if case == 0 {
            return Ok(());
        }
        let tag = *union.member_tags.get(case - 1).ok_or_else(|| DecodeError::InvalidEncoding {
            reason: format!("union '{}' case {case} out of range", union.name).into(),
        })?;
        let field = descriptor
            .field_by_tag(tag)
            .expect("union member tag must name a declared field");
        let value = self.decode_one(schemas, field, buf, ctx, depth)?;
        ctx.current_message_mut()
            .expect("frame pushed by caller")
            .set_scalar(field.name.clone(), value);
        Ok(())
    }

    fn decode_field(
        &self,
        schemas: &SchemaSet,
        field: &FieldDescriptor,
        buf: &mut BitBuffer,
        ctx: &mut Context,
        depth: u32,
    ) -> Result<()> {
        let omit = match &field.presence.omit_if {
            Some(pred) => eval_bool(pred, ctx, field, false)?,
            None => false,
        };
        if omit {
            return Ok(());
        }
        let has_dynamic = field.presence.omit_if.is_some() || field.presence.required_if.is_some();

        if field.is_repeated() {
            let count_bits = field.count_bits.unwrap_or_else(|| bits_for_max_value(field.max_count() as u64));
            let count = buf.take_bits(count_bits)? as usize;
            if count > field.max_count() {
                return Err(DecodeError::InvalidEncoding {
                    reason: format!("field '{}' count {count} exceeds max {}", field.name, field.max_count()).into(),
                }
                .into());
            }
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(self.decode_one(schemas, field, buf, ctx, depth)?);
            }
            ctx.current_message_mut()
                .expect("frame pushed by caller")
                .set_repeated(field.name.clone(), values);
            return Ok(());
        }

        // `omit` alone decides presence on decode: a dynamic field that was not
        // omitted is on the wire regardless of whether `required_if` itself fired,
        // mirroring encode_field's `!omit ⟹ present` rule.
        if has_dynamic {
            let value = self.decode_one(schemas, field, buf, ctx, depth)?;
            ctx.current_message_mut()
                .expect("frame pushed by caller")
                .set_scalar(field.name.clone(), value);
            return Ok(());
        }

        match &field.wire_type {
            WireType::Message { .. } => {
                let value = self.decode_one(schemas, field, buf, ctx, depth)?;
                ctx.current_message_mut()
                    .expect("frame pushed by caller")
                    .set_scalar(field.name.clone(), value);
            }
            _ => {
                let codec = self.registry.resolve(field, ctx.current_group())?;
                if let Some(value) = codec.decode(buf, field)? {
                    ctx.current_message_mut()
                        .expect("frame pushed by caller")
                        .set_scalar(field.name.clone(), value);
                }
            }
        }
        Ok(())
    }

    fn decode_one(
        &self,
        schemas: &SchemaSet,
        field: &FieldDescriptor,
        buf: &mut BitBuffer,
        ctx: &mut Context,
        depth: u32,
    ) -> Result<WireValue> {
        match &field.wire_type {
            WireType::Message { schema } => {
                if depth + 1 > self.max_recursion_depth {
                    return Err(DecodeError::RecursionDepthExceeded {
                        max_depth: self.max_recursion_depth as usize,
                    }
                    .into());
                }
                let nested_descriptor = schemas.get(*schema).ok_or(DecodeError::UnknownSchemaId { schema_id: schema.0 })?;
                let group = field.codec_group.clone().unwrap_or_else(|| ctx.current_group().into());
                let mut guard = ctx.push(MessageValue::new(nested_descriptor.name.clone()), Part::Body, group);
                self.decode_fields(schemas, &nested_descriptor, buf, guard.context(), depth + 1)?;
                let built = guard.context().current_message().cloned().expect("frame just pushed");
                Ok(WireValue::Message(Box::new(built)))
            }
            _ => {
                let codec = self.registry.resolve(field, ctx.current_group())?;
                codec
                    .decode(buf, field)?
                    .ok_or_else(|| DecodeError::InvalidEncoding {
                        reason: format!("field '{}' unexpectedly absent", field.name).into(),
                    }
                    .into())
            }
        }
    }
}

fn eval_bool(pred: &crate::predicate::Predicate, ctx: &Context, field: &FieldDescriptor, encoding: bool) -> Result<bool> {
    let value = pred.eval(ctx).map_err(|e| wrap_predicate_error(field, &e.to_string(), encoding))?;
    value
        .as_bool()
        .ok_or_else(|| wrap_predicate_error(field, "predicate did not evaluate to a bool", encoding))
}

fn wrap_predicate_error(field: &FieldDescriptor, reason: &str, encoding: bool) -> Error {
    if encoding {
        EncodeError::PredicateTypeError {
            field: field.name.clone(),
            reason: reason.into(),
        }
        .into()
    } else {
        DecodeError::PredicateTypeError {
            field: field.name.clone(),
            reason: reason.into(),
        }
        .into()
    }
}

fn mismatch(field: &FieldDescriptor, expected: &str, found: &WireValue) -> Error {
    EncodeError::TypeMismatch {
        field: field.name.clone(),
        expected: expected.into(),
        found: found.kind_name().into(),
    }
    .into()
}

/// Rejects a schema where a field's `omit_if`/`required_if` predicate names
/// a sibling field (`ups == 0`, a bare or dotted path) that is declared
/// later than it in traversal order — the same order [`Engine::encode_fields`]
/// and [`Engine::decode_fields`] walk: head fields by tag, then each union's
/// members together at the union's position, then remaining body fields by tag.
fn check_forward_references(descriptor: &MessageDescriptor) -> Result<()> {
    let mut order: Vec<&str> = Vec::with_capacity(descriptor.fields.len());
    for field in descriptor.head_fields() {
        order.push(field.name.as_str());
    }
    for union in &descriptor.unions {
        for tag in &union.member_tags {
            if let Some(field) = descriptor.field_by_tag(*tag) {
                order.push(field.name.as_str());
            }
        }
    }
    for field in descriptor.body_fields() {
        if descriptor.union_for_tag(field.tag).is_none() {
            order.push(field.name.as_str());
        }
    }

    let mut declared: rustc_hash::FxHashSet<&str> = rustc_hash::FxHashSet::default();
    for name in order {
        let field = descriptor.field_by_name(name).expect("name came from this descriptor's own fields");
        for predicate in [&field.presence.omit_if, &field.presence.required_if].into_iter().flatten() {
            for path in field_refs(predicate) {
                if path.ups == 0 {
                    if let Some(sibling) = path.segments.first() {
                        if !declared.contains(sibling.as_str()) {
                            return Err(SchemaError::ForwardReference {
                                field: field.name.clone(),
                                referenced: sibling.as_str().into(),
                            }
                            .into());
                        }
                    }
                }
            }
        }
        declared.insert(name);
    }
    Ok(())
}

fn field_refs(predicate: &crate::predicate::Predicate) -> Vec<&crate::predicate::FieldPath> {
    use crate::predicate::Predicate;
    match predicate {
        Predicate::Literal(_) => Vec::new(),
        Predicate::FieldRef(path) => vec![path],
        Predicate::Not(inner) => field_refs(inner),
        Predicate::And(a, b) | Predicate::Or(a, b) | Predicate::Cmp(_, a, b) => {
            let mut refs = field_refs(a);
            refs.extend(field_refs(b));
            refs
        }
    }
}
