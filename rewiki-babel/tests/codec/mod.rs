//! Codec behaviour seen from outside the crate.

use proptest::prelude::*;
use rewiki_babel::{Codec, CodecValue, DecodeError, ErrorEnvelope, PageTitle};
use serde_json::json;
use std::collections::BTreeMap;

fn title() -> impl Strategy<Value = PageTitle> {
    "[A-Z][a-z]{0,8}( [a-z]{1,5})?".prop_map(|raw| PageTitle::new(&raw).unwrap())
}

fn leaf() -> impl Strategy<Value = CodecValue> {
    prop_oneof![
        Just(CodecValue::Null),
        any::<bool>().prop_map(CodecValue::Bool),
        any::<i64>().prop_map(CodecValue::Int),
        (-1.0e12..1.0e12f64).prop_map(CodecValue::Float),
        "[a-z _]{0,12}".prop_map(CodecValue::String),
        title().prop_map(CodecValue::Title),
    ]
}

fn value() -> impl Strategy<Value = CodecValue> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(CodecValue::List),
            prop::collection::btree_map("(_type_|[a-z]{1,6})", inner.clone(), 0..4)
                .prop_map(CodecValue::Map),
            (
                "[a-z][a-z-]{0,10}",
                prop::option::of("[a-zA-Z $0-9]{0,16}"),
                prop::collection::vec(inner, 0..3)
            )
                .prop_map(|(key, message, params)| {
                    let mut envelope = ErrorEnvelope::new(key).unwrap().with_params(params);
                    if let Some(message) = message {
                        envelope = envelope.with_message(message);
                    }
                    CodecValue::Error(Box::new(envelope))
                }),
        ]
    })
}

proptest! {
    #[test]
    fn values_survive_encode_decode(v in value()) {
        let codec = Codec::new();
        prop_assert_eq!(codec.decode_value(&codec.encode_value(&v)).unwrap(), v);
    }
}

#[test]
fn test_maps_with_reserved_keys_are_wrapped() {
    let codec = Codec::new();
    let mut entries = BTreeMap::new();
    entries.insert("_type_".to_string(), CodecValue::from("title"));
    let value = CodecValue::Map(entries);

    let tree = codec.encode_value(&value);
    assert_eq!(tree, json!({"_type_": "map", "value": {"_type_": "title"}}));
    assert_eq!(codec.decode_value(&tree).unwrap(), value);
}

#[test]
fn test_typed_values_carry_their_hint() {
    let codec = Codec::new();
    let title = CodecValue::Title(PageTitle::new("main_page").unwrap());
    let tree = codec.encode_value(&title);
    assert_eq!(tree["_type_"], "title");
    assert_eq!(codec.decode_value(&tree).unwrap(), title);
}

#[test]
fn test_unknown_type_hint() {
    let codec = Codec::new();
    let err = codec
        .decode_value(&json!({"_type_": "revision", "id": 4}))
        .unwrap_err();
    assert!(matches!(err, DecodeError::UnknownType(ref hint) if hint == "revision"));
}

#[test]
fn test_bad_list_elements_are_skipped() {
    let codec = Codec::new();
    let tree = json!([1, {"_type_": "nope"}, "two"]);
    assert_eq!(
        codec.decode_value(&tree).unwrap(),
        CodecValue::List(vec![CodecValue::Int(1), CodecValue::from("two")])
    );
}

#[test]
fn test_envelopes_compare_by_value() {
    let a = ErrorEnvelope::new("bad-title")
        .unwrap()
        .with_message("Bad title: $1")
        .with_param(CodecValue::List(vec![CodecValue::from("x")]));
    let b = ErrorEnvelope::new("bad-title")
        .unwrap()
        .with_message("Bad title: $1")
        .with_param(CodecValue::List(vec![CodecValue::from("x")]));
    assert_eq!(a, b);
    assert_ne!(a, b.clone().with_param("y"));
    assert_ne!(a, ErrorEnvelope::new("bad-title").unwrap());
}

#[test]
fn test_envelope_clones_are_independent() {
    let original = ErrorEnvelope::new("k")
        .unwrap()
        .with_param(CodecValue::List(vec![CodecValue::Int(1)]));
    let mut copy = original.clone();
    if let Some(CodecValue::List(items)) = copy.params_mut().first_mut() {
        items.push(CodecValue::Int(2));
    }
    assert_eq!(original.params(), &[CodecValue::List(vec![CodecValue::Int(1)])]);
    assert_ne!(original, copy);
}

#[test]
fn test_empty_message_is_kept_and_missing_is_omitted() {
    let codec = Codec::new();
    let with_empty = ErrorEnvelope::new("k").unwrap().with_message("");
    let tree = codec.encode_hinted(&with_empty);
    assert_eq!(tree, json!({"_type_": "error", "key": "k", "message": ""}));

    let bare = ErrorEnvelope::new("k").unwrap();
    assert_eq!(
        codec.encode_hinted(&bare),
        json!({"_type_": "error", "key": "k"})
    );
    assert_eq!(codec.decode::<ErrorEnvelope>(&tree).unwrap(), with_empty);
}
