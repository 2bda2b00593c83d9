//! # `dccl` — Dynamic Compact Control Language
//!
//! A bit-level message codec for bandwidth-constrained links (originally
//! designed for underwater acoustic modems, equally at home over any link
//! where every bit costs). Messages are described once as a
//! [`descriptor::MessageDescriptor`] schema — fields, their wire types, and
//! any dynamic presence rules — and a [`facade::Facade`] turns values
//! conforming to that schema into dense, byte-padded bit strings and back.
//!
//! ## Architecture
//!
//! - [`bitbuffer`] — the MSB-first bit-level buffer every codec reads from
//!   and writes to.
//! - [`value`] — [`value::WireValue`] and [`value::MessageValue`], the
//!   runtime representation of what gets encoded and what decode produces.
//! - [`descriptor`] — the schema data model ([`descriptor::MessageDescriptor`],
//!   [`descriptor::FieldDescriptor`]) and its fluent builders.
//! - [`predicate`] — the small expression language behind `omit_if` and
//!   `required_if` dynamic presence rules.
//! - [`context`] — the scoped ancestor-stack traversal context predicates
//!   are evaluated against.
//! - [`registry`] — resolves a field to a concrete [`codecs::FieldCodecKind`],
//!   honoring named overrides and group inheritance.
//! - [`codecs`] — the primitive leaf field codecs themselves.
//! - [`message_codec`] — the default message codec: header/body traversal,
//!   unions, repeated fields, and recursion into nested messages.
//! - [`facade`] — the public entry point: [`facade::Facade::load`],
//!   `encode`, `decode`, `encode_repeated`, `decode_repeated`, `size`,
//!   `min_size`, `max_size`, `info`.
//!
//! ## Usage
//!
//! ```
//! use dccl::descriptor::{FieldDescriptorBuilder, MessageDescriptorBuilder, WireType};
//! use dccl::value::MessageValue;
//! use dccl::{Config, Facade};
//!
//! let mut facade = Facade::new(Config::default());
//! facade
//!     .load(
//!         MessageDescriptorBuilder::new("Ping", 1u32)
//!             .field(FieldDescriptorBuilder::new("seq", 1, WireType::Int { min: 0, max: 255 }).build())
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let mut msg = MessageValue::new("Ping");
//! msg.set_scalar("seq", 7i64);
//! let bytes = facade.encode(&msg).unwrap();
//! let decoded = facade.decode(&bytes).unwrap();
//! assert_eq!(decoded.get_scalar("seq"), msg.get_scalar("seq"));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2024_incompatible_pat,
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![warn(clippy::all, clippy::pedantic, rust_2024_compatibility)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod bitbuffer;
pub mod codecs;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod facade;
pub mod message_codec;
pub mod predicate;
pub mod registry;
pub mod schema;
pub mod value;

#[cfg(feature = "tracing")]
pub mod tracing;

pub use config::Config;
pub use error::{DecodeError, EncodeError, Error, Result, SchemaError};
pub use facade::Facade;

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Inline capacity of the `SmallVec` backing [`descriptor::MessageDescriptor::head_fields`]
/// and [`descriptor::MessageDescriptor::body_fields`] before they'd spill to the heap.
pub const SMALL_FIELD_COLLECTION_SIZE: usize = 8;
