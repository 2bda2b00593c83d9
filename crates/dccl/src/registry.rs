//! Field codec registry: resolves a field descriptor to a concrete
//! [`FieldCodecKind`], honoring explicit per-field overrides, group
//! inheritance, and a fallback to the default group.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smartstring::{LazyCompact, SmartString};

use crate::codecs::FieldCodecKind;
use crate::descriptor::{FieldDescriptor, WireType};
use crate::error::{Result, SchemaError};

type DcclString = SmartString<LazyCompact>;

/// A codec constructor: given a field descriptor, builds the codec it
/// should use. Most entries are the built-in `FieldCodecKind::for_wire_type`;
/// a caller may register alternates (e.g. a more compact integer packing)
/// under a distinct name.
pub type CodecConstructor = Arc<dyn Fn(&FieldDescriptor) -> Result<FieldCodecKind> + Send + Sync>;

/// The name of the group every schema inherits from when nothing else applies.
pub const DEFAULT_GROUP: &str = "default";

/// Group-scoped table of named field codec constructors.
///
/// Resolution order for a field in group `g`:
/// 1. The field's explicit `codec_name`, looked up in `g`.
/// 2. The field's explicit `codec_name`, looked up in [`DEFAULT_GROUP`].
/// 3. The wire type's canonical name (`"bool"`, `"int"`, ...), looked up in `g`.
/// 4. The wire type's canonical name, looked up in [`DEFAULT_GROUP`].
pub struct Registry {
    entries: RwLock<FxHashMap<(DcclString, DcclString), CodecConstructor>>,
}

impl Registry {
    /// A registry pre-populated with the built-in primitive codecs under
    /// [`DEFAULT_GROUP`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self {
            entries: RwLock::new(FxHashMap::default()),
        };
        for name in ["bool", "int", "enum", "float", "string", "bytes"] {
            registry.register(DEFAULT_GROUP, name, Arc::new(FieldCodecKind::for_wire_type));
        }
        registry
    }

    /// Registers (or replaces) the constructor for `name` within `group`.
    pub fn register(&self, group: impl Into<DcclString>, name: impl Into<DcclString>, ctor: CodecConstructor) {
        self.entries.write().insert((group.into(), name.into()), ctor);
    }

    /// Resolves `field`'s codec within `group`, applying the presence-bit
    /// wrapper if the field declares a plain optional presence prefix.
    pub fn resolve(&self, field: &FieldDescriptor, group: &str) -> Result<FieldCodecKind> {
        let name = field
            .codec_name
            .clone()
            .unwrap_or_else(|| canonical_name(&field.wire_type).into());

        let entries = self.entries.read();
        let ctor = entries
            .get(&(DcclString::from(group), name.clone()))
            .or_else(|| entries.get(&(DcclString::from(DEFAULT_GROUP), name.clone())))
            .cloned()
            .ok_or_else(|| SchemaError::UnknownCodec {
                group: group.into(),
                name: name.clone(),
            })?;
        drop(entries);

        let kind = ctor(field)?;
        kind.validate(field)?;
        Ok(if field.presence.presence_bit {
            kind.with_presence()
        } else {
            kind
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn canonical_name(wire_type: &WireType) -> &'static str {
    match wire_type {
        WireType::Bool => "bool",
        WireType::Int { .. } | WireType::FixedInt { .. } => "int",
        WireType::Enum { .. } => "enum",
        WireType::Float { .. } => "float",
        WireType::Str { .. } => "string",
        WireType::Bytes { .. } => "bytes",
        WireType::Message { .. } => "message",
    }
}
