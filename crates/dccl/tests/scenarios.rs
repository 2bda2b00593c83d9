//! End-to-end scenarios straight out of the DCCL wire-format write-up: each
//! test pins down an exact bit layout, not just a round-trip.

use dccl::descriptor::{FieldDescriptorBuilder, Label, MessageDescriptorBuilder, WireType};
use dccl::message_codec::Engine;
use dccl::predicate::Predicate;
use dccl::registry::Registry;
use dccl::schema::SchemaSet;
use dccl::value::{MessageValue, WireValue};
use dccl::{Config, Facade};

fn engine() -> Engine {
    Engine::new(Registry::with_defaults(), 16)
}

/// Scenario A: `state: enum{S0,S1,S2}`, `a: uint[0..63]`, `b: int[-100..100]`
/// optional. Encoding `{state=S1, a=40, b=50}` lays out as
/// `01 101000 1 10010110` (17 bits), and round-trips exactly.
#[test]
fn scenario_a_basic_layout() {
    let descriptor = MessageDescriptorBuilder::new("ScenarioA", 1u32)
        .field(
            FieldDescriptorBuilder::new(
                "state",
                1,
                WireType::Enum {
                    values: vec!["S0".into(), "S1".into(), "S2".into()],
                },
            )
            .build(),
        )
        .field(FieldDescriptorBuilder::new("a", 2, WireType::Int { min: 0, max: 63 }).build())
        .field(
            FieldDescriptorBuilder::new("b", 3, WireType::Int { min: -100, max: 100 })
                .optional()
                .build(),
        )
        .build();
    let schemas = SchemaSet::new();
    let engine = engine();

    let mut msg = MessageValue::new("ScenarioA");
    msg.set_scalar("state", "S1");
    msg.set_scalar("a", 40i64);
    msg.set_scalar("b", 50i64);

    let buf = engine.encode(&schemas, &descriptor, &msg).unwrap();
    assert_eq!(buf.len(), 17);
    // 01 101000 1 10010110
    assert_eq!(buf.to_bytes(), vec![0b01_101000, 0b1_1001011, 0b0_0000000]);

    let mut decode_buf = buf;
    let decoded = engine.decode(&schemas, &descriptor, &mut decode_buf).unwrap();
    assert_eq!(decoded.get_scalar("state"), Some(&WireValue::Str("S1".into())));
    assert_eq!(decoded.get_scalar("a"), Some(&WireValue::Int(40)));
    assert_eq!(decoded.get_scalar("b"), Some(&WireValue::Int(50)));
}

/// Scenario B: `omit_if: a > 30` on field `b`. With `a=40` the predicate
/// fires and `b` vanishes entirely; with `a=20` it is encoded normally.
#[test]
fn scenario_b_omit_if_drops_field_above_threshold() {
    let descriptor = MessageDescriptorBuilder::new("ScenarioB", 2u32)
        .field(FieldDescriptorBuilder::new("a", 1, WireType::Int { min: 0, max: 63 }).build())
        .field(
            FieldDescriptorBuilder::new("b", 2, WireType::Int { min: 0, max: 255 })
                .omit_if(Predicate::parse("a > 30").unwrap())
                .build(),
        )
        .build();
    let schemas = SchemaSet::new();
    let engine = engine();

    let mut above = MessageValue::new("ScenarioB");
    above.set_scalar("a", 40i64);
    above.set_scalar("b", 50i64);
    let buf = engine.encode(&schemas, &descriptor, &above).unwrap();
    assert_eq!(buf.len(), 6); // only `a`'s 6 bits; `b` omitted entirely
    let decoded = engine.decode(&schemas, &descriptor, &mut buf.clone()).unwrap();
    assert!(decoded.get("b").is_absent());

    let mut below = MessageValue::new("ScenarioB");
    below.set_scalar("a", 20i64);
    below.set_scalar("b", 50i64);
    let buf = engine.encode(&schemas, &descriptor, &below).unwrap();
    assert_eq!(buf.len(), 6 + 8); // `b` encoded normally
    let decoded = engine.decode(&schemas, &descriptor, &mut buf.clone()).unwrap();
    assert_eq!(decoded.get_scalar("b"), Some(&WireValue::Int(50)));
}

/// Scenario C: union `choice{x: uint[0..15], y: bool}`. 2 case bits, then
/// the selected alternative as if required; no alternative set writes `00`.
#[test]
fn scenario_c_union_case_bits() {
    let descriptor = MessageDescriptorBuilder::new("ScenarioC", 3u32)
        .field(FieldDescriptorBuilder::new("x", 1, WireType::Int { min: 0, max: 15 }).build())
        .field(FieldDescriptorBuilder::new("y", 2, WireType::Bool).build())
        .union("choice", vec![1, 2])
        .build();
    let schemas = SchemaSet::new();
    let engine = engine();

    let mut x_set = MessageValue::new("ScenarioC");
    x_set.set_scalar("x", 5i64);
    let buf = engine.encode(&schemas, &descriptor, &x_set).unwrap();
    assert_eq!(buf.to_bytes()[0] >> 2, 0b01_0101); // case=01, x=0101, 6 bits total

    let mut y_set = MessageValue::new("ScenarioC");
    y_set.set_scalar("y", true);
    let buf = engine.encode(&schemas, &descriptor, &y_set).unwrap();
    assert_eq!(buf.len(), 3);
    assert_eq!(buf.to_bytes()[0] >> 5, 0b101); // case=10, y=1

    let empty = MessageValue::new("ScenarioC");
    let buf = engine.encode(&schemas, &descriptor, &empty).unwrap();
    assert_eq!(buf.len(), 2);
    assert_eq!(buf.to_bytes()[0] >> 6, 0b00);

    let mut decode_buf = buf;
    let decoded = engine.decode(&schemas, &descriptor, &mut decode_buf).unwrap();
    assert!(decoded.get("x").is_absent());
    assert!(decoded.get("y").is_absent());
}

/// Property 5, union exclusivity: setting more than one member of the same
/// union is rejected at encode time rather than silently picking one.
#[test]
fn union_rejects_more_than_one_member_set() {
    let descriptor = MessageDescriptorBuilder::new("ScenarioCExclusive", 9u32)
        .field(FieldDescriptorBuilder::new("x", 1, WireType::Int { min: 0, max: 15 }).build())
        .field(FieldDescriptorBuilder::new("y", 2, WireType::Bool).build())
        .union("choice", vec![1, 2])
        .build();
    let schemas = SchemaSet::new();
    let engine = engine();

    let mut both = MessageValue::new("ScenarioCExclusive");
    both.set_scalar("x", 5i64);
    both.set_scalar("y", true);
    let err = engine.encode(&schemas, &descriptor, &both).unwrap_err();
    assert!(matches!(err, dccl::Error::Encode(dccl::EncodeError::OutOfRange { .. })));
}

/// Scenario D: `d: repeated uint[0..255]`, max 8, 4-bit length prefix.
/// Five elements round-trip with a `0101` count prefix ahead of them.
#[test]
fn scenario_d_repeated_with_count_prefix() {
    let descriptor = MessageDescriptorBuilder::new("ScenarioD", 4u32)
        .field(
            FieldDescriptorBuilder::new("d", 1, WireType::Int { min: 0, max: 255 })
                .repeated(8)
                .build(),
        )
        .build();
    let schemas = SchemaSet::new();
    let engine = engine();

    let values = [50i64, 100, 150, 200, 250];
    let mut msg = MessageValue::new("ScenarioD");
    msg.set_repeated("d", values.iter().map(|v| WireValue::Int(*v)).collect());

    let buf = engine.encode(&schemas, &descriptor, &msg).unwrap();
    assert_eq!(buf.len(), 4 + 5 * 8);
    assert_eq!(buf.to_bytes()[0] >> 4, 0b0101); // count = 5

    let mut decode_buf = buf;
    let decoded = engine.decode(&schemas, &descriptor, &mut decode_buf).unwrap();
    let got: Vec<i64> = decoded
        .get("d")
        .as_repeated()
        .unwrap()
        .iter()
        .map(|v| v.as_int().unwrap())
        .collect();
    assert_eq!(got, values);
}

/// Scenario E: a schema whose `max_size` exceeds the configured payload
/// limit is rejected at `load`, not discovered later at `encode`.
#[test]
fn scenario_e_oversize_schema_rejected_at_load() {
    let mut facade = Facade::new(Config::new(32)); // 256-bit limit
    let descriptor = MessageDescriptorBuilder::new("ScenarioE", 5u32)
        .field(FieldDescriptorBuilder::new("blob", 1, WireType::Bytes { max_len: 64 }).build())
        .build();
    let err = facade.load(descriptor).unwrap_err();
    assert!(matches!(err, dccl::Error::Schema(dccl::SchemaError::Oversize { .. })));
}

/// Scenario F: `encode_repeated([msgA, msgB])` interleaves each message's
/// own identity prefix with its body bits and `decode_repeated` recovers
/// both messages, in order, even though they belong to different schemas.
#[test]
fn scenario_f_heterogeneous_repeated_round_trip() {
    let mut facade = Facade::new(Config::default());
    facade
        .load(
            MessageDescriptorBuilder::new("MsgA", 10u32)
                .field(FieldDescriptorBuilder::new("v", 1, WireType::Int { min: 0, max: 255 }).build())
                .build(),
        )
        .unwrap();
    facade
        .load(
            MessageDescriptorBuilder::new("MsgB", 11u32)
                .field(FieldDescriptorBuilder::new("flag", 1, WireType::Bool).build())
                .build(),
        )
        .unwrap();

    let mut a = MessageValue::new("MsgA");
    a.set_scalar("v", 200i64);
    let mut b = MessageValue::new("MsgB");
    b.set_scalar("flag", true);

    let bytes = facade.encode_repeated(&[a, b]).unwrap();
    let decoded = facade.decode_repeated(&bytes).unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].descriptor_name, "MsgA");
    assert_eq!(decoded[0].get_scalar("v"), Some(&WireValue::Int(200)));
    assert_eq!(decoded[1].descriptor_name, "MsgB");
    assert_eq!(decoded[1].get_scalar("flag"), Some(&WireValue::Bool(true)));
}

/// `only_if` is a single predicate standing in for a paired
/// `required_if`/`omit_if`: the field is present exactly when it holds.
#[test]
fn only_if_governs_presence_both_ways() {
    let descriptor = MessageDescriptorBuilder::new("OnlyIf", 6u32)
        .field(FieldDescriptorBuilder::new("mode", 1, WireType::Int { min: 0, max: 1 }).build())
        .field(
            FieldDescriptorBuilder::new("detail", 2, WireType::Int { min: 0, max: 15 })
                .only_if(Predicate::parse("mode == 1").unwrap())
                .build(),
        )
        .build();
    let schemas = SchemaSet::new();
    let engine = engine();

    let mut present = MessageValue::new("OnlyIf");
    present.set_scalar("mode", 1i64);
    present.set_scalar("detail", 9i64);
    let mut buf = engine.encode(&schemas, &descriptor, &present).unwrap();
    let decoded = engine.decode(&schemas, &descriptor, &mut buf).unwrap();
    assert_eq!(decoded.get_scalar("detail"), Some(&WireValue::Int(9)));

    let mut missing = MessageValue::new("OnlyIf");
    missing.set_scalar("mode", 1i64);
    let err = engine.encode(&schemas, &descriptor, &missing).unwrap_err();
    assert!(matches!(err, dccl::Error::Encode(dccl::EncodeError::RequiredFieldMissing { .. })));

    let mut absent = MessageValue::new("OnlyIf");
    absent.set_scalar("mode", 0i64);
    let mut buf = engine.encode(&schemas, &descriptor, &absent).unwrap();
    assert_eq!(buf.len(), 1); // only `mode`
    let decoded = engine.decode(&schemas, &descriptor, &mut buf).unwrap();
    assert!(decoded.get("detail").is_absent());
}

/// Idempotence of `load`: loading the same schema shape twice into separate
/// façades produces identical `info()` output.
#[test]
fn load_is_idempotent_across_facades() {
    let make = || {
        MessageDescriptorBuilder::new("Idempotent", 7u32)
            .field(FieldDescriptorBuilder::new("x", 1, WireType::Int { min: 0, max: 15 }).build())
            .build()
    };
    let mut first = Facade::new(Config::default());
    first.load(make()).unwrap();
    let mut second = Facade::new(Config::default());
    second.load(make()).unwrap();
    assert_eq!(first.info("Idempotent").unwrap(), second.info("Idempotent").unwrap());
}

/// Min/max bounds: a repeated field's reported bounds track its count prefix
/// plus worst-case element count, and always bracket the encoded size.
#[test]
fn bounds_bracket_every_encoded_size() {
    let descriptor = MessageDescriptorBuilder::new("Bounds", 8u32)
        .field(
            FieldDescriptorBuilder::new("items", 1, WireType::Int { min: 0, max: 255 })
                .repeated(4)
                .build(),
        )
        .build();
    assert!(matches!(descriptor.fields[0].label, Label::Repeated { max_count: 4 }));

    let schemas = SchemaSet::new();
    let engine = engine();
    let min = engine.min_size(&schemas, &descriptor).unwrap();
    let max = engine.max_size(&schemas, &descriptor).unwrap();

    for count in 0..=4 {
        let mut msg = MessageValue::new("Bounds");
        msg.set_repeated("items", (0..count).map(|i| WireValue::Int(i as i64)).collect());
        let size = engine.size(&schemas, &descriptor, &msg).unwrap();
        assert!(min <= size, "min {min} should be <= size {size}");
        assert!(size <= max, "size {size} should be <= max {max}");
    }
}
