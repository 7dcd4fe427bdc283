//! End-to-end decode scenarios built from hand-assembled wire bytes,
//! covering the protocol's concrete worked examples and its boundary
//! and invariant behaviours.

mod common;

use common::*;
use javaser::error::ErrorKind;
use javaser::Value;

#[test]
fn integer_array_zero_through_nine() {
    // ac ed 00 05 75 72 00 02 5b 49 4d ba 60 26 76 ea b2 a5 02 00 00 78 70
    // 00 00 00 0a <10 x i32, 0..9>
    let mut bytes = vec![
        0xAC, 0xED, 0x00, 0x05, // header
        0x75, // TC_ARRAY
        0x72, // TC_CLASSDESC
        0x00, 0x02, 0x5B, 0x49, // name "[I"
        0x4D, 0xBA, 0x60, 0x26, 0x76, 0xEA, 0xB2, 0xA5, // serialVersionUID
        0x02, // flags: SC_SERIALIZABLE
        0x00, 0x00, // field_count = 0
        0x78, // TC_ENDBLOCKDATA (empty class annotation)
        0x70, // TC_NULL (no superclass)
        0x00, 0x00, 0x00, 0x0A, // element count = 10
    ];
    for i in 0..10i32 {
        bytes.extend_from_slice(&i.to_be_bytes());
    }

    let value = decode(bytes).unwrap();
    let expected = Value::Sequence((0..10).map(Value::Int).collect());
    assert_eq!(value, expected);
}

/// `Person { int age, int ssn, String firstName, String lastName }`.
fn person_stream(age: i32, ssn: i32, first: &str, last: &str) -> Vec<u8> {
    StreamBuilder::new()
        .u8(TC_OBJECT)
        .u8(TC_CLASSDESC)
        .name("Person")
        .i64(0) // serialVersionUID
        .u8(SC_SERIALIZABLE)
        .u16(4) // field_count
        .field(b'I', "age")
        .field(b'I', "ssn")
        .field(b'L', "firstName")
        .string("Ljava.lang.String;")
        .field(b'L', "lastName")
        .reference(BASE_HANDLE + 1) // shares the firstName field's class-name string
        .u8(TC_ENDBLOCKDATA) // empty class annotation
        .u8(TC_NULL) // no superclass
        .i32(age)
        .i32(ssn)
        .string(first)
        .string(last)
        .finish()
}

#[test]
fn simple_object_person() {
    let bytes = person_stream(27, 23432, "Jack", "Homan");
    let value = decode(bytes).unwrap();
    match value {
        Value::Object(fields) => {
            assert_eq!(fields.get("age"), Some(&Value::Int(27)));
            assert_eq!(fields.get("ssn"), Some(&Value::Int(23432)));
            assert_eq!(fields.get("firstName"), Some(&Value::String("Jack".into())));
            assert_eq!(fields.get("lastName"), Some(&Value::String("Homan".into())));
            // Field order must match declaration order.
            let keys: Vec<_> = fields.keys().cloned().collect();
            assert_eq!(keys, vec!["age", "ssn", "firstName", "lastName"]);
        }
        other => panic!("expected an object, got {other:?}"),
    }
}

/// `java.lang.Integer { int value }`, the sole-field boxed-primitive
/// short-circuit.
fn boxed_integer_stream(value: i32) -> Vec<u8> {
    StreamBuilder::new()
        .u8(TC_OBJECT)
        .u8(TC_CLASSDESC)
        .name("java.lang.Integer")
        .i64(0)
        .u8(SC_SERIALIZABLE)
        .u16(1)
        .field(b'I', "value")
        .u8(TC_ENDBLOCKDATA)
        .u8(TC_NULL)
        .i32(value)
        .finish()
}

#[test]
fn boxed_integer_unwraps_to_bare_host_integer() {
    let bytes = boxed_integer_stream(42);
    assert_eq!(decode(bytes).unwrap(), Value::Int(42));
}

/// `java.util.BitSet { long[] bits }`, with a custom `writeObject` that
/// writes no block data (flags carry `SC_WRITE_METHOD`, the annotation
/// region is a bare `TC_ENDBLOCKDATA`).
fn bitset_stream(words: &[i64]) -> Vec<u8> {
    let mut b = StreamBuilder::new()
        .u8(TC_OBJECT)
        .u8(TC_CLASSDESC)
        .name("java.util.BitSet")
        .i64(0)
        .u8(SC_SERIALIZABLE | SC_WRITE_METHOD)
        .u16(1)
        .field(b'[', "bits")
        .string("[J")
        .u8(TC_ENDBLOCKDATA)
        .u8(TC_NULL)
        // field value: the bits array itself
        .u8(TC_ARRAY)
        .u8(TC_CLASSDESC)
        .name("[J")
        .i64(0)
        .u8(SC_SERIALIZABLE)
        .u16(0)
        .u8(TC_ENDBLOCKDATA)
        .u8(TC_NULL)
        .u32(words.len() as u32);
    for w in words {
        b = b.i64(*w);
    }
    // object-annotation region: no block data at all
    b.u8(TC_ENDBLOCKDATA).finish()
}

#[test]
fn bitset_reinterprets_bit_words_as_a_set_of_indices() {
    // bits 0, 3, and 64 set: word 0 = 0b1001 (bits 0 and 3), word 1 = 1 (bit 64)
    let bytes = bitset_stream(&[0b1001, 0b1]);
    let value = decode(bytes).unwrap();
    match value {
        Value::Set(items) => {
            let mut ints: Vec<i64> = items.into_iter().map(|v| v.as_int().unwrap()).collect();
            ints.sort();
            assert_eq!(ints, vec![0, 3, 64]);
        }
        other => panic!("expected a set, got {other:?}"),
    }
}

/// `java.util.HashMap`, block data `bucket_count, entry_count` then
/// `entry_count` key/value stream-item pairs (values are boxed
/// `java.lang.Integer`s, as a real `HashMap<String, Integer>` writes them).
fn hash_map_stream(entries: &[(&str, i32)], bucket_count: u32) -> Vec<u8> {
    let mut b = StreamBuilder::new()
        .u8(TC_OBJECT)
        .u8(TC_CLASSDESC)
        .name("java.util.HashMap")
        .i64(0)
        .u8(SC_SERIALIZABLE | SC_WRITE_METHOD)
        .u16(0)
        .u8(TC_ENDBLOCKDATA)
        .u8(TC_NULL)
        .u8(TC_BLOCKDATA)
        .u8(8) // block length
        .u32(bucket_count)
        .u32(entries.len() as u32);
    let mut counter = HandleCounter::new(BASE_HANDLE + 2); // after HashMap's own classdesc + object handles
    let mut classdesc = None;
    for (k, v) in entries {
        b = b.string(k);
        counter.skip(); // the key string itself reserved a handle
        b = push_boxed_int(b, &mut counter, &mut classdesc, *v);
    }
    b.u8(TC_ENDBLOCKDATA).finish()
}

#[test]
fn hash_map_two_entries() {
    let bytes = hash_map_stream(&[("a", 1), ("b", 2)], 16);
    let value = decode(bytes).unwrap();
    match value {
        Value::Map(entries) => {
            let mut pairs: Vec<(String, i64)> = entries
                .into_iter()
                .map(|(k, v)| (k.as_str().unwrap().to_string(), v.as_int().unwrap()))
                .collect();
            pairs.sort();
            assert_eq!(
                pairs,
                vec![("a".to_string(), 1), ("b".to_string(), 2)]
            );
        }
        other => panic!("expected a map, got {other:?}"),
    }
}

#[test]
fn hash_map_rejects_entry_count_equal_to_bucket_count() {
    let bytes = hash_map_stream(&[("a", 1)], 1);
    let err = decode(bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidBlockData(_)));
}

/// `java.util.PriorityQueue`, block data `max(2, size + 1)` then `size`
/// stream items (boxed `java.lang.Integer`s, as `PriorityQueue<Integer>`
/// writes them).
fn priority_queue_stream(wire_size: u32, elements: &[i32]) -> Vec<u8> {
    let mut b = StreamBuilder::new()
        .u8(TC_OBJECT)
        .u8(TC_CLASSDESC)
        .name("java.util.PriorityQueue")
        .i64(0)
        .u8(SC_SERIALIZABLE | SC_WRITE_METHOD)
        .u16(0)
        .u8(TC_ENDBLOCKDATA)
        .u8(TC_NULL)
        .u8(TC_BLOCKDATA)
        .u8(4)
        .u32(wire_size);
    let mut counter = HandleCounter::new(BASE_HANDLE + 2);
    let mut classdesc = None;
    for e in elements {
        b = push_boxed_int(b, &mut counter, &mut classdesc, *e);
    }
    b.u8(TC_ENDBLOCKDATA).finish()
}

#[test]
fn priority_queue_wire_size_four_yields_three_elements() {
    let bytes = priority_queue_stream(4, &[3, 1, 2]);
    let value = decode(bytes).unwrap();
    match value {
        Value::Sequence(items) => {
            let ints: Vec<i64> = items.into_iter().map(|v| v.as_int().unwrap()).collect();
            assert_eq!(ints, vec![3, 1, 2]);
        }
        other => panic!("expected a sequence, got {other:?}"),
    }
}

#[test]
fn empty_array_list_decodes_to_empty_sequence() {
    let bytes = StreamBuilder::new()
        .u8(TC_OBJECT)
        .u8(TC_CLASSDESC)
        .name("java.util.ArrayList")
        .i64(0)
        .u8(SC_SERIALIZABLE | SC_WRITE_METHOD)
        .u16(0)
        .u8(TC_ENDBLOCKDATA)
        .u8(TC_NULL)
        .u8(TC_BLOCKDATA)
        .u8(4)
        .u32(0) // size = 0
        .u8(TC_ENDBLOCKDATA)
        .finish();
    assert_eq!(decode(bytes).unwrap(), Value::Sequence(Vec::new()));
}

#[test]
fn empty_short_string_consumes_exactly_three_bytes() {
    let bytes = StreamBuilder::new().u8(TC_STRING).u16(0).finish();
    assert_eq!(decode(bytes).unwrap(), Value::String(String::new()));
}

#[test]
fn long_string_above_sixty_four_k() {
    let len = 70_000usize;
    let text = "x".repeat(len);
    let mut bytes = vec![0xAC, 0xED, 0x00, 0x05, 0x7C]; // TC_LONGSTRING
    bytes.extend_from_slice(&(len as u64).to_be_bytes());
    bytes.extend_from_slice(text.as_bytes());
    let value = decode(bytes).unwrap();
    assert_eq!(value, Value::String(text));
}

#[test]
fn primitive_array_consumes_exactly_n_times_element_size() {
    // `[D` (double array) of 3 elements: header + array-classdesc + count
    // + exactly 24 payload bytes, nothing more, nothing less.
    let bytes = StreamBuilder::new()
        .u8(TC_ARRAY)
        .u8(TC_CLASSDESC)
        .name("[D")
        .i64(0)
        .u8(SC_SERIALIZABLE)
        .u16(0)
        .u8(TC_ENDBLOCKDATA)
        .u8(TC_NULL)
        .u32(3)
        .raw(&1.5f64.to_be_bytes())
        .raw(&2.5f64.to_be_bytes())
        .raw(&3.5f64.to_be_bytes())
        .finish();
    let value = decode(bytes).unwrap();
    assert_eq!(
        value,
        Value::Sequence(vec![
            Value::Double(1.5),
            Value::Double(2.5),
            Value::Double(3.5)
        ])
    );
}

#[test]
fn bad_first_byte_is_malformed_header() {
    let bytes = vec![0x00, 0xED, 0x00, 0x05, TC_NULL];
    let err = decode(bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MalformedHeader(_)));
}

#[test]
fn forward_reference_is_rejected() {
    // References a handle that hasn't been assigned yet.
    let bytes = StreamBuilder::new().reference(BASE_HANDLE + 5).finish();
    let err = decode(bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::HandleNotFound(_)));
}

#[test]
fn shared_string_reference_is_structurally_equal_to_the_original() {
    // TC_STRING "shared", then TC_REFERENCE back to it as a second
    // top-level value.
    let bytes = StreamBuilder::new()
        .string("shared")
        .reference(BASE_HANDLE)
        .finish();
    let values = decode_all(bytes).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0], values[1]);
    assert_eq!(values[0], Value::String("shared".to_string()));
}

#[test]
fn two_person_objects_share_one_handle_table() {
    // Two independently-built Person streams glued together must still
    // decode correctly under decode_all, with the second stream's
    // field-name strings and class descriptor re-registered as fresh
    // handles (no cross-stream sharing assumed, but no corruption either).
    let mut bytes = person_stream(27, 23432, "Jack", "Homan");
    bytes.extend_from_slice(&person_stream(40, 11111, "Jill", "Doe")[4..]); // skip second header
    let values = decode_all(bytes).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(
        values[0].as_object().unwrap().get("firstName"),
        Some(&Value::String("Jack".to_string()))
    );
    assert_eq!(
        values[1].as_object().unwrap().get("firstName"),
        Some(&Value::String("Jill".to_string()))
    );
}

#[test]
fn recursion_limit_is_enforced_on_pathological_nesting() {
    use javaser::{decode_bytes_with_options, DecoderOptions};

    // A chain of nested single-element object arrays, each one
    // referencing its element through a fresh TC_ARRAY, deep enough to
    // trip a small max_depth.
    let mut b = StreamBuilder::new();
    let depth = 20;
    for _ in 0..depth {
        b = b
            .u8(TC_ARRAY)
            .u8(TC_CLASSDESC)
            .name("[Ljava.lang.Object;")
            .i64(0)
            .u8(SC_SERIALIZABLE)
            .u16(0)
            .u8(TC_ENDBLOCKDATA)
            .u8(TC_NULL)
            .u32(1);
    }
    let bytes = b.u8(TC_NULL).finish();

    let options = DecoderOptions {
        max_depth: 5,
        ..DecoderOptions::default()
    };
    let err = decode_bytes_with_options(&bytes, options).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RecursionLimitExceeded(5)));
}
