#![allow(missing_docs)]

use proptest::prelude::*;
use tabwire::script::{
    format_number, format_string, generate, parse_number_literal, parse_string_literal,
};
use tabwire::{Arena, Receiver, Tabwire, Value};

// --- NUMERIC LITERALS ---

#[test]
fn shortest_number_literals() {
    assert_eq!(format_number(0.0), "0");
    assert_eq!(format_number(-0.0), "-0");
    assert_eq!(format_number(1.0), "1");
    assert_eq!(format_number(-45.0), "-45");
    assert_eq!(format_number(100.0), "100");
    assert_eq!(format_number(0.5), "0.5");
    assert_eq!(format_number(0.25), "1/4");
    assert_eq!(format_number(1e300), "1e300");
    assert_eq!(format_number(5e-324), "5e-324");
    assert_eq!(format_number(2f64.powi(80)), "1*2^80");
}

#[test]
fn nonfinite_numbers_render_as_divisions() {
    assert_eq!(format_number(f64::NAN), "0/0");
    assert_eq!(format_number(f64::INFINITY), "1/0");
    assert_eq!(format_number(f64::NEG_INFINITY), "-1/0");

    assert!(parse_number_literal("0/0").is_some_and(f64::is_nan));
    assert_eq!(parse_number_literal("1/0"), Some(f64::INFINITY));
    assert_eq!(parse_number_literal("-1/0"), Some(f64::NEG_INFINITY));
}

#[test]
fn number_literal_forms_parse() {
    assert_eq!(parse_number_literal("42"), Some(42.0));
    assert_eq!(parse_number_literal("-0.125"), Some(-0.125));
    assert_eq!(parse_number_literal("3e-2"), Some(3e-2));
    assert_eq!(parse_number_literal("3/4"), Some(0.75));
    assert_eq!(parse_number_literal("-3*2^-2"), Some(-0.75));
    assert_eq!(parse_number_literal("1*2^-1074"), Some(5e-324));
    assert!(parse_number_literal("abc").is_none());
}

// --- STRING LITERALS ---

#[test]
fn minimal_string_quoting() {
    assert_eq!(format_string(b"hello"), "\"hello\"");
    assert_eq!(format_string(b"say \"hi\""), "'say \"hi\"'");
    assert_eq!(format_string(b"it's"), "\"it's\"");
    // Ties prefer double quotes.
    assert_eq!(format_string(b""), "\"\"");
    assert_eq!(format_string(b"a\nb\tc"), "\"a\\nb\\tc\"");
}

#[test]
fn decimal_escapes_pad_before_digits() {
    assert_eq!(format_string(&[7]), "\"\\7\"");
    assert_eq!(format_string(&[7, b'1']), "\"\\0071\"");
    assert_eq!(parse_string_literal("\"\\0071\""), Some(vec![7, b'1']));
    assert_eq!(parse_string_literal("\"\\65\""), Some(vec![65]));
    assert!(parse_string_literal("\"unterminated").is_none());
}

// --- PROGRAM SHAPE ---

#[test]
fn single_use_tables_inline_into_the_return() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::Number(1.0), Value::Number(10.0));
    arena.insert(node, Value::Number(2.0), Value::Number(20.0));
    arena.insert(node, Value::str("name"), Value::str("x"));

    let script = generate(&arena, &[Value::Node(node)])?;
    assert_eq!(script, "return {10, 20, name = \"x\"}\n");
    Ok(())
}

#[test]
fn scalar_roots_return_directly() -> tabwire::Result<()> {
    let arena = Arena::new();
    let script = generate(&arena, &[Value::Number(1.0), Value::Bool(true)])?;
    assert_eq!(script, "return 1, true\n");
    Ok(())
}

#[test]
fn shared_tables_get_a_name() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let root = arena.add_node();
    let child = arena.add_node();
    arena.insert(child, Value::Number(1.0), Value::Number(1.0));
    arena.insert(child, Value::Number(2.0), Value::Number(2.0));
    arena.insert(root, Value::str("left"), Value::Node(child));
    arena.insert(root, Value::str("right"), Value::Node(child));

    let script = generate(&arena, &[Value::Node(root)])?;
    assert_eq!(script, "local a = {1, 2}\nreturn {left = a, right = a}\n");
    Ok(())
}

#[test]
fn self_cycles_close_through_assignments() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::str("name"), Value::str("loop"));
    arena.insert(node, Value::str("me"), Value::Node(node));

    let script = generate(&arena, &[Value::Node(node)])?;
    assert_eq!(
        script,
        "local a = {name = \"loop\"}\na.me = a\nreturn a\n"
    );
    Ok(())
}

#[test]
fn inlining_stops_at_the_depth_bound() -> tabwire::Result<()> {
    // A five-deep single-use chain: the literal may nest three levels, so
    // exactly one intermediate definition appears.
    let mut arena = Arena::new();
    let ids: Vec<_> = (0..5).map(|_| arena.add_node()).collect();
    for w in ids.windows(2) {
        arena.insert(w[0], Value::str("k"), Value::Node(w[1]));
    }

    let script = generate(&arena, &[Value::Node(ids[0])])?;
    assert_eq!(script, "local a = {k = {k = {k = {}}}}\nreturn {k = a}\n");
    Ok(())
}

#[test]
fn freed_names_are_reused() -> tabwire::Result<()> {
    // root -> e (twice), e -> a2 (twice), a2 -> b (twice): once the middle
    // definition has consumed both references to the leaf, the leaf's name
    // is free for the next definition.
    let mut arena = Arena::new();
    let root = arena.add_node();
    let e = arena.add_node();
    let mid = arena.add_node();
    let leaf = arena.add_node();
    arena.insert(root, Value::str("e1"), Value::Node(e));
    arena.insert(root, Value::str("e2"), Value::Node(e));
    arena.insert(e, Value::str("p"), Value::Node(mid));
    arena.insert(e, Value::str("q"), Value::Node(mid));
    arena.insert(mid, Value::str("x"), Value::Node(leaf));
    arena.insert(mid, Value::str("y"), Value::Node(leaf));

    let script = generate(&arena, &[Value::Node(root)])?;
    assert_eq!(
        script,
        "local a = {}\nlocal b = {x = a, y = a}\nlocal a = {p = b, q = b}\nreturn {e1 = a, e2 = a}\n"
    );
    Ok(())
}

#[test]
fn name_pool_overflows_into_an_indexed_table() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let root = arena.add_node();
    for i in 0..30 {
        let child = arena.add_node();
        arena.insert(child, Value::Number(1.0), Value::Number(f64::from(i)));
        arena.insert(root, Value::str(format!("p{i}")), Value::Node(child));
        arena.insert(root, Value::str(format!("q{i}")), Value::Node(child));
    }

    let script = generate(&arena, &[Value::Node(root)])?;
    assert!(script.contains("local x = {}\n"));
    assert!(script.contains("x[1] = {25}\n"));
    assert!(script.contains("x[5] = {29}\n"));
    assert!(!script.contains("local x = {25}"));
    Ok(())
}

#[test]
fn keys_render_in_natural_order() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::str("b"), Value::Number(3.0));
    arena.insert(node, Value::str("a10"), Value::Number(2.0));
    arena.insert(node, Value::str("a2"), Value::Number(1.0));
    arena.insert(node, Value::Number(0.5), Value::Number(0.0));
    arena.insert(node, Value::Bool(true), Value::Number(4.0));
    arena.insert(node, Value::Bool(false), Value::Number(5.0));

    let script = generate(&arena, &[Value::Node(node)])?;
    assert_eq!(
        script,
        "return {[0.5] = 0, a2 = 1, a10 = 2, b = 3, [false] = 5, [true] = 4}\n"
    );
    Ok(())
}

#[test]
fn keyword_and_odd_keys_are_bracketed() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::str("end"), Value::Number(1.0));
    arena.insert(node, Value::str("two words"), Value::Number(2.0));
    arena.insert(node, Value::str("fine_3"), Value::Number(3.0));

    let script = generate(&arena, &[Value::Node(node)])?;
    assert_eq!(
        script,
        "return {[\"end\"] = 1, fine_3 = 3, [\"two words\"] = 2}\n"
    );
    Ok(())
}

#[test]
fn generation_is_deterministic() -> tabwire::Result<()> {
    let build = || {
        let mut arena = Arena::new();
        let root = arena.add_node();
        let shared = arena.add_node();
        arena.insert(shared, Value::str("v"), Value::Number(0.1));
        arena.insert(root, Value::str("s1"), Value::Node(shared));
        arena.insert(root, Value::str("s2"), Value::Node(shared));
        arena.insert(root, Value::str("loop"), Value::Node(root));
        (arena, root)
    };
    let (arena_a, root_a) = build();
    let (arena_b, root_b) = build();
    let first = generate(&arena_a, &[Value::Node(root_a)])?;
    let second = generate(&arena_b, &[Value::Node(root_b)])?;
    assert_eq!(first, second);
    assert_eq!(first, generate(&arena_a, &[Value::Node(root_a)])?);
    Ok(())
}

#[test]
fn write_script_uses_the_transferred_name() -> tabwire::Result<()> {
    let mut arena = Arena::new();
    let node = arena.add_node();
    arena.insert(node, Value::str("k"), Value::Number(1.0));

    let mut channel: Vec<String> = Vec::new();
    Tabwire::send(&mut arena, Value::Node(node), "state.lua", &mut channel)?;
    let mut receiver = Receiver::new();
    for line in &channel {
        receiver.feed(line)?;
    }
    let inbound = receiver.finish()?;

    let dir = tempfile::tempdir()?;
    let path = inbound.write_script(dir.path())?;
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("state.lua"));
    let written = std::fs::read_to_string(&path)?;
    assert_eq!(written, inbound.script()?);
    Ok(())
}

// --- PROPERTIES ---

proptest! {
    #[test]
    fn number_literals_roundtrip(bits in any::<u64>()) {
        let x = f64::from_bits(bits);
        let text = format_number(x);
        let back = parse_number_literal(&text).expect("rendered literal must parse");
        if x.is_nan() {
            prop_assert!(back.is_nan());
        } else {
            prop_assert_eq!(back.to_bits(), x.to_bits(), "literal {}", text);
        }
    }

    #[test]
    fn string_literals_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let text = format_string(&bytes);
        prop_assert_eq!(parse_string_literal(&text), Some(bytes));
    }
}
