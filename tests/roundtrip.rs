#![allow(missing_docs)]

use proptest::prelude::*;
use tabwire::{Arena, Inbound, Receiver, Tabwire, Value};

// Drives a full transfer over an in-memory channel.
fn roundtrip(arena: &mut Arena, payload: Value) -> tabwire::Result<Inbound> {
    let mut channel: Vec<String> = Vec::new();
    Tabwire::send(arena, payload, "out.lua", &mut channel)?;
    let mut receiver = Receiver::new();
    for line in &channel {
        receiver.feed(line)?;
    }
    receiver.finish()
}

// --- ARENA SEMANTICS ---

#[test]
fn insert_replaces_equal_keys() {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::str("k"), Value::Number(1.0));
    arena.insert(node, Value::str("k"), Value::Number(2.0));
    assert_eq!(arena.pairs(node).len(), 1);
    assert_eq!(arena.get(node, &Value::str("k")), Some(&Value::Number(2.0)));
}

#[test]
fn nan_keys_always_append() {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::Number(f64::NAN), Value::Number(1.0));
    arena.insert(node, Value::Number(f64::NAN), Value::Number(2.0));
    assert_eq!(arena.pairs(node).len(), 2);
}

#[test]
fn string_and_number_keys_are_distinct() {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::Number(2.0), Value::str("num"));
    arena.insert(node, Value::str("2"), Value::str("str"));
    assert_eq!(arena.get(node, &Value::Number(2.0)), Some(&Value::str("num")));
    assert_eq!(arena.get(node, &Value::str("2")), Some(&Value::str("str")));
}

#[test]
fn isomorphism_distinguishes_sharing_from_duplication() {
    // One shared child on the left, two structurally equal children on the
    // right: not isomorphic.
    let mut left = Arena::new();
    let lr = left.add_node();
    let lc = left.add_node();
    left.insert(lr, Value::str("p"), Value::Node(lc));
    left.insert(lr, Value::str("q"), Value::Node(lc));

    let mut right = Arena::new();
    let rr = right.add_node();
    let rc1 = right.add_node();
    let rc2 = right.add_node();
    right.insert(rr, Value::str("p"), Value::Node(rc1));
    right.insert(rr, Value::str("q"), Value::Node(rc2));

    assert!(!left.isomorphic(&Value::Node(lr), &right, &Value::Node(rr)));
    assert!(left.isomorphic(&Value::Node(lr), &left.clone(), &Value::Node(lr)));
}

// --- ROUND TRIPS ---

#[test]
fn empty_composite_roundtrips() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    let payload = Value::Node(node);

    let inbound = roundtrip(&mut arena, payload.clone())?;
    assert!(arena.isomorphic(&payload, inbound.arena(), inbound.payload()));
    assert_eq!(inbound.file_name(), "out.lua");
    Ok(())
}

#[test]
fn scalar_payload_roundtrips() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let inbound = roundtrip(&mut arena, Value::Number(3.5))?;
    assert_eq!(inbound.payload(), &Value::Number(3.5));
    Ok(())
}

#[test]
fn self_cycle_roundtrips() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::str("me"), Value::Node(node));
    let payload = Value::Node(node);

    let inbound = roundtrip(&mut arena, payload.clone())?;
    assert!(arena.isomorphic(&payload, inbound.arena(), inbound.payload()));

    // The cycle must close onto the same node, not a copy.
    let Value::Node(back) = inbound.payload() else {
        panic!("payload is not a composite");
    };
    assert_eq!(
        inbound.arena().get(*back, &Value::str("me")),
        Some(&Value::Node(*back))
    );
    Ok(())
}

#[test]
fn shared_subnode_stays_shared() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let root = arena.add_node();
    let child = arena.add_node();
    arena.insert(child, Value::Number(1.0), Value::str("payload"));
    arena.insert(root, Value::str("first"), Value::Node(child));
    arena.insert(root, Value::str("second"), Value::Node(child));
    let payload = Value::Node(root);

    let inbound = roundtrip(&mut arena, payload.clone())?;
    assert!(arena.isomorphic(&payload, inbound.arena(), inbound.payload()));

    let Value::Node(r) = inbound.payload() else {
        panic!("payload is not a composite");
    };
    let first = inbound.arena().get(*r, &Value::str("first"));
    let second = inbound.arena().get(*r, &Value::str("second"));
    assert!(first.is_some());
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn mutual_cycle_roundtrips() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let a = arena.add_node();
    let b = arena.add_node();
    arena.insert(a, Value::str("next"), Value::Node(b));
    arena.insert(b, Value::str("next"), Value::Node(a));
    arena.insert(b, Value::str("tag"), Value::Number(7.0));
    let payload = Value::Node(a);

    let inbound = roundtrip(&mut arena, payload.clone())?;
    assert!(arena.isomorphic(&payload, inbound.arena(), inbound.payload()));
    Ok(())
}

#[test]
fn composite_key_roundtrips() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let root = arena.add_node();
    let key = arena.add_node();
    arena.insert(key, Value::Number(1.0), Value::str("k"));
    arena.insert(root, Value::Node(key), Value::str("keyed"));
    let payload = Value::Node(root);

    let inbound = roundtrip(&mut arena, payload.clone())?;
    assert!(arena.isomorphic(&payload, inbound.arena(), inbound.payload()));
    Ok(())
}

#[test]
fn special_numbers_survive_bit_exactly() -> tabwire::Result<()> {
    let specials = [
        0.0,
        -0.0,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::MIN_POSITIVE,
        5e-324, // smallest subnormal
        f64::MAX,
        0.1,
        -12345.678,
        2f64.powi(53),
    ];
    let mut arena = Arena::new();
    let node = arena.add_node();
    for (i, x) in specials.iter().enumerate() {
        arena.insert(node, Value::Number((i + 1) as f64), Value::Number(*x));
    }
    arena.insert(node, Value::str("nan"), Value::Number(f64::NAN));

    let inbound = roundtrip(&mut arena, Value::Node(node))?;
    let Value::Node(back) = inbound.payload() else {
        panic!("payload is not a composite");
    };
    for (i, x) in specials.iter().enumerate() {
        let got = inbound
            .arena()
            .get(*back, &Value::Number((i + 1) as f64))
            .expect("entry lost in transit");
        let Value::Number(y) = got else {
            panic!("entry changed kind");
        };
        assert_eq!(y.to_bits(), x.to_bits(), "index {}", i + 1);
    }
    let Some(Value::Number(nan)) = inbound.arena().get(*back, &Value::str("nan")) else {
        panic!("nan entry lost");
    };
    assert!(nan.is_nan());
    Ok(())
}

#[test]
fn arbitrary_byte_strings_roundtrip() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    let all_bytes: Vec<u8> = (0..=255).collect();
    arena.insert(node, Value::Number(1.0), Value::Str(all_bytes.clone()));

    let inbound = roundtrip(&mut arena, Value::Node(node))?;
    let Value::Node(back) = inbound.payload() else {
        panic!("payload is not a composite");
    };
    assert_eq!(
        inbound.arena().get(*back, &Value::Number(1.0)),
        Some(&Value::Str(all_bytes))
    );
    Ok(())
}

#[test]
fn digit_string_and_number_keys_stay_distinct_in_transit() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::Number(2.0), Value::str("num"));
    arena.insert(node, Value::str("2"), Value::str("str"));

    let inbound = roundtrip(&mut arena, Value::Node(node))?;
    let Value::Node(back) = inbound.payload() else {
        panic!("payload is not a composite");
    };
    assert_eq!(
        inbound.arena().get(*back, &Value::Number(2.0)),
        Some(&Value::str("num"))
    );
    assert_eq!(
        inbound.arena().get(*back, &Value::str("2")),
        Some(&Value::str("str"))
    );
    assert_eq!(inbound.arena().pairs(*back).len(), 2);
    Ok(())
}

#[test]
fn repeated_scalars_pool_into_references() -> tabwire::Result<()> {
    // The same long string twice must not cost twice the symbols.
    let long: String = "x".repeat(100);
    let mut single = Arena::new();
    let s = single.add_node();
    single.insert(s, Value::Number(1.0), Value::str(long.as_str()));

    let mut double = Arena::new();
    let d = double.add_node();
    double.insert(d, Value::Number(1.0), Value::str(long.as_str()));
    double.insert(d, Value::Number(2.0), Value::str(long.as_str()));

    let mut ch_single: Vec<String> = Vec::new();
    let mut ch_double: Vec<String> = Vec::new();
    Tabwire::send(&mut single, Value::Node(s), "a.lua", &mut ch_single)?;
    Tabwire::send(&mut double, Value::Node(d), "a.lua", &mut ch_double)?;

    let len = |ch: &[String]| ch.iter().map(String::len).sum::<usize>();
    assert!(len(&ch_double) < len(&ch_single) + 10);
    Ok(())
}

#[test]
fn reencoding_a_decoded_graph_is_identical() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let root = arena.add_node();
    let child = arena.add_node();
    arena.insert(root, Value::Number(1.0), Value::str("head"));
    arena.insert(root, Value::str("child"), Value::Node(child));
    arena.insert(root, Value::str("loop"), Value::Node(root));
    arena.insert(child, Value::str("owner"), Value::Node(root));
    arena.insert(child, Value::Number(1.0), Value::Number(0.25));

    let mut first: Vec<String> = Vec::new();
    Tabwire::send(&mut arena, Value::Node(root), "g.lua", &mut first)?;

    let mut receiver = Receiver::new();
    for line in &first {
        receiver.feed(line)?;
    }
    let inbound = receiver.finish()?;
    let payload = inbound.payload().clone();
    let mut rebuilt = inbound.arena().clone();

    let mut second: Vec<String> = Vec::new();
    Tabwire::send(&mut rebuilt, payload, "g.lua", &mut second)?;
    assert_eq!(first, second);
    Ok(())
}

// --- JSON BOUNDARY ---

#[cfg(feature = "json")]
#[test]
fn json_nulls_are_silently_dropped() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let v = arena.from_json(r#"{"keep": 1, "drop": null, "list": [10, null, 20]}"#)?;
    let Value::Node(obj) = v else {
        panic!("object did not convert to a composite");
    };
    assert_eq!(arena.get(obj, &Value::str("keep")), Some(&Value::Number(1.0)));
    assert!(arena.get(obj, &Value::str("drop")).is_none());

    let Some(Value::Node(list)) = arena.get(obj, &Value::str("list")).cloned() else {
        panic!("array did not convert to a composite");
    };
    // Nulls are omitted and the array part compacts.
    assert_eq!(arena.get(list, &Value::Number(1.0)), Some(&Value::Number(10.0)));
    assert_eq!(arena.get(list, &Value::Number(2.0)), Some(&Value::Number(20.0)));
    assert!(arena.get(list, &Value::Number(3.0)).is_none());
    Ok(())
}

#[cfg(feature = "json")]
#[test]
fn json_egress_refuses_cycles() {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::str("me"), Value::Node(node));
    assert!(arena.to_json(&Value::Node(node)).is_none());

    let mut flat = Arena::new();
    let list = flat.add_node();
    flat.insert(list, Value::Number(1.0), Value::Number(1.0));
    flat.insert(list, Value::Number(2.0), Value::Bool(true));
    assert_eq!(
        flat.to_json(&Value::Node(list)),
        Some(serde_json::json!([1.0, true]))
    );
}

#[cfg(feature = "json")]
#[test]
fn json_egress_bounds_nesting_depth() {
    let chain = |arena: &mut Arena, depth: usize| {
        let top = arena.add_node();
        let mut current = top;
        for _ in 1..depth {
            let next = arena.add_node();
            arena.insert(current, Value::str("next"), Value::Node(next));
            current = next;
        }
        Value::Node(top)
    };

    let mut shallow = Arena::new();
    let v = chain(&mut shallow, 50);
    assert!(shallow.to_json(&v).is_some());

    let mut deep = Arena::new();
    let v = chain(&mut deep, 200);
    assert!(deep.to_json(&v).is_none());
}

// --- PROPERTIES ---

proptest! {
    #[test]
    fn flat_tables_roundtrip(entries in proptest::collection::vec(("[a-z]{1,8}", any::<f64>()), 0..16)) {
        let mut arena = Arena::new();
        let node = arena.add_node();
        for (key, x) in &entries {
            arena.insert(node, Value::str(key.as_str()), Value::Number(*x));
        }
        let payload = Value::Node(node);
        let inbound = roundtrip(&mut arena, payload.clone()).expect("transfer failed");
        prop_assert!(arena.isomorphic(&payload, inbound.arena(), inbound.payload()));
    }

    #[test]
    fn nested_lists_roundtrip(layers in proptest::collection::vec(
        proptest::collection::vec(any::<f64>(), 0..6), 1..5))
    {
        let mut arena = Arena::new();
        let top = arena.add_node();
        let mut current = top;
        for (i, layer) in layers.iter().enumerate() {
            for (j, x) in layer.iter().enumerate() {
                arena.insert(current, Value::Number((j + 1) as f64), Value::Number(*x));
            }
            if i + 1 < layers.len() {
                let next = arena.add_node();
                arena.insert(current, Value::str("next"), Value::Node(next));
                current = next;
            }
        }
        let payload = Value::Node(top);
        let inbound = roundtrip(&mut arena, payload.clone()).expect("transfer failed");
        prop_assert!(arena.isomorphic(&payload, inbound.arena(), inbound.payload()));
    }
}
