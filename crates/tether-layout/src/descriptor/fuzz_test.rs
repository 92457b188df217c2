// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Property tests: generated descriptors parse, corrupted ones never do.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use proptest::sample::select;

use super::*;

fn ident() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,6}"
}

fn long_ident() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{1,6}"
}

fn attr_value() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i64>().prop_map(|n| n.to_string()),
        "[a-z][a-z0-9_.]{0,5}",
    ]
}

fn suffix() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => Just(String::new()),
        1 => ident().prop_map(|n| format!("({n})")),
        1 => (ident(), attr_value()).prop_map(|(k, v)| format!("({k}={v})")),
        1 => Just("%1".to_owned()),
    ]
}

fn value_core() -> impl Strategy<Value = String> {
    let order = select(vec!["", "<", ">"]);
    prop_oneof![
        (select(vec!['i', 'u']), select(vec![8u32, 16, 32, 64]), order.clone())
            .prop_map(|(t, w, o)| format!("{t}{w}{o}")),
        (select(vec![32u32, 64]), order).prop_map(|(w, o)| format!("f{w}{o}")),
        (1u32..8).prop_map(|n| format!("x{}", n * 8)),
        select(vec!["u64:v", "u32:v", "i64:(i32 i32)v"]).prop_map(str::to_owned),
    ]
}

/// Text of a layout that the grammar accepts and that describes a valid layout.
fn layout_text() -> impl Strategy<Value = String> {
    let leaf = (value_core(), suffix()).prop_map(|(c, s)| format!("{c}{s}"));
    leaf.prop_recursive(3, 24, 4, |inner| {
        let group = prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(|m| format!("[{}]", m.join(" "))),
            prop::collection::vec(inner.clone(), 2..4).prop_map(|m| format!("[{}]", m.join("|"))),
            // Element alignment 1 keeps every element size a multiple of it.
            (1u64..5, inner.clone()).prop_map(|(n, e)| format!("[{n} {e}%1]")),
            inner
                .clone()
                .prop_map(|e| format!("u64:[{e}]")),
        ];
        (group, suffix()).prop_map(|(g, s)| format!("{g}{s}"))
    })
}

fn function_text() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(layout_text(), 0..4),
        prop::option::of(0usize..4),
        prop::option::of(layout_text()),
    )
        .prop_map(|(args, variadic, ret)| {
            let mut text = String::from("(");
            for (i, arg) in args.iter().enumerate() {
                if variadic == Some(i) {
                    text.push_str("...");
                }
                text.push(' ');
                text.push_str(arg);
            }
            if variadic.is_some_and(|v| v >= args.len()) {
                text.push_str("...");
            }
            text.push(')');
            text.push_str(ret.as_deref().unwrap_or("v"));
            text
        })
}

proptest! {
    #[test]
    fn generated_layouts_parse(text in layout_text()) {
        prop_assert!(parse_layout(&text).is_ok(), "{text}");
    }

    #[test]
    fn generated_functions_parse(text in function_text()) {
        prop_assert!(parse_function(&text).is_ok(), "{text}");
    }

    #[test]
    fn rendering_is_lossless(text in layout_text()) {
        let layout = parse_layout(&text).unwrap();
        let rendered = layout.to_string();
        prop_assert_eq!(parse_layout(&rendered).unwrap(), layout, "{} -> {}", text, rendered);
    }

    #[test]
    fn function_rendering_is_lossless(text in function_text()) {
        let function = parse_function(&text).unwrap();
        let rendered = function.to_string();
        prop_assert_eq!(parse_function(&rendered).unwrap(), function);
    }

    #[test]
    fn valid_layouts_compose(a in layout_text(), b in layout_text(), c in layout_text()) {
        let spaced = format!("[{a} {b} {c}]");
        prop_assert!(parse_layout(&spaced).is_ok());
        let union = format!("[{a}|{b}|{c}]");
        prop_assert!(parse_layout(&union).is_ok());
        let function = format!("({a} {b}){c}");
        prop_assert!(parse_function(&function).is_ok());
        let arrayed = format!("u64:[{a} {b}]");
        prop_assert!(parse_layout(&arrayed).is_ok());
    }

    #[test]
    fn whitespace_in_names_fails(l in layout_text(), name in long_ident(), at in 1usize..7) {
        let at = at.min(name.len() - 1);
        let text = format!("{l}({} {})", &name[..at], &name[at..]);
        prop_assert_eq!(parse(&text).unwrap_err().reason, Reason::EmbeddedWhitespace);
    }

    #[test]
    fn double_equals_fails(l in layout_text(), key in ident(), value in attr_value()) {
        let text = format!("{l}({key}=={value})");
        prop_assert_eq!(parse(&text).unwrap_err().reason, Reason::DuplicateEquals);
    }

    #[test]
    fn missing_name_fails(l in layout_text(), value in attr_value()) {
        prop_assert_eq!(parse(&format!("{l}(={value})")).unwrap_err().reason, Reason::EmptyName);
        prop_assert_eq!(parse(&format!("{l}()")).unwrap_err().reason, Reason::EmptyName);
    }

    #[test]
    fn dangling_qualifiers_fail(l in layout_text()) {
        prop_assert_eq!(
            parse(&format!("[{l} u64:]")).unwrap_err().reason,
            Reason::DanglingPointer
        );
        prop_assert_eq!(
            parse(&format!("[{l} [3]]")).unwrap_err().reason,
            Reason::DanglingCount
        );
    }

    #[test]
    fn unbalanced_brackets_fail(l in layout_text()) {
        let close = format!("{l}]");
        prop_assert!(parse(&close).is_err());
        let open_bracket = format!("[{l}");
        prop_assert!(parse(&open_bracket).is_err());
        let open_paren = format!("({l}");
        prop_assert!(parse(&open_paren).is_err());
    }

    /// A broken construct stays broken wherever it is embedded.
    #[test]
    fn corruption_is_context_free(
        prefix in layout_text(),
        suffix in layout_text(),
        broken in select(vec!["i32(a b)", "i32(a==1)", "u64:", "[2]", "i07", "[i32|]", "i32()"]),
    ) {
        let reference = parse(broken).unwrap_err().reason;
        let contexts = [
            format!("[{prefix} {broken} {suffix}]"),
            format!("[{prefix}|{broken}|{suffix}]"),
            format!("({prefix} {broken}){suffix}"),
            format!("[4 {broken}]"),
        ];
        for text in &contexts {
            let err = parse(text).unwrap_err();
            prop_assert_eq!(&err.reason, &reference, "{}", text);
        }
    }
}
