// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Tests for layout paths.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;

/// `struct { u8 tag; [4 x struct { i32 x; i32 y; }] points; }`, `points` at 4.
fn shape() -> Layout {
    let point =
        Layout::structure([Layout::i32().with_name("x"), Layout::i32().with_name("y")]).unwrap();
    Layout::structure([
        Layout::u8().with_name("tag"),
        Layout::sequence(4, point).unwrap().with_name("points"),
    ])
    .unwrap()
}

#[test]
fn field_offsets() {
    let s = shape();
    assert_eq!(s.offset_of(&[PathElement::field("tag")]).unwrap(), 0);
    assert_eq!(s.offset_of(&[PathElement::field("points")]).unwrap(), 4);
    assert_eq!(s.offset_of(&[PathElement::Member(1)]).unwrap(), 4);
}

#[test]
fn fixed_element_offsets() {
    let s = shape();
    let path = [
        PathElement::field("points"),
        PathElement::index(2),
        PathElement::field("y"),
    ];
    assert_eq!(s.offset_of(&path).unwrap(), 4 + 2 * 8 + 4);
    assert_eq!(s.select(&path).unwrap(), Layout::i32().with_name("y"));
}

#[test]
fn open_elements_record_stride_and_bound() {
    let s = shape();
    let resolved = s
        .path(&[
            PathElement::field("points"),
            PathElement::open(),
            PathElement::field("x"),
        ])
        .unwrap();
    assert_eq!(resolved.offset, 4);
    assert_eq!(resolved.strides, vec![8]);
    assert_eq!(resolved.bounds, vec![Some(4)]);
    assert_eq!(resolved.dimensions(), 1);
    assert_eq!(resolved.layout.name(), Some("x"));
}

#[test]
fn open_element_of_incomplete_sequence_is_unbounded() {
    let open = Layout::sequence(0, Layout::u16()).unwrap();
    let resolved = open.path(&[PathElement::open()]).unwrap();
    assert_eq!(resolved.bounds, vec![None]);
    assert_eq!(resolved.strides, vec![2]);
    assert_eq!(open.offset_of(&[PathElement::index(1000)]).unwrap(), 2000);
}

#[test]
fn union_members_start_at_zero() {
    let u = Layout::union([Layout::i64().with_name("i"), Layout::f64().with_name("f")]).unwrap();
    assert_eq!(u.offset_of(&[PathElement::field("f")]).unwrap(), 0);
}

#[test]
fn bad_paths() {
    let s = shape();
    assert!(matches!(
        s.path(&[PathElement::field("missing")]),
        Err(LayoutError::BadPath(_))
    ));
    assert!(matches!(
        s.path(&[PathElement::Member(2)]),
        Err(LayoutError::BadPath(_))
    ));
    assert!(matches!(
        s.path(&[PathElement::field("points"), PathElement::index(4)]),
        Err(LayoutError::BadPath(_))
    ));
    assert!(matches!(
        s.path(&[PathElement::field("tag"), PathElement::open()]),
        Err(LayoutError::BadPath(_))
    ));
    assert!(matches!(
        s.path(&[PathElement::index(0)]),
        Err(LayoutError::BadPath(_))
    ));
}

#[test]
fn offset_of_rejects_open_elements() {
    let s = shape();
    assert!(matches!(
        s.offset_of(&[PathElement::field("points"), PathElement::open()]),
        Err(LayoutError::BadPath(_))
    ));
}

#[test]
fn empty_path_selects_root() {
    let s = shape();
    let resolved = s.path(&[]).unwrap();
    assert_eq!(resolved.offset, 0);
    assert!(resolved.layout.ptr_eq(&s));
}
