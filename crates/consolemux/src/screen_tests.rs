// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn feed_plain_text() {
    let mut screen = Screen::new(80, 24);
    screen.feed(b"hello world");
    let lines = screen.visible_text();
    assert!(lines[0].contains("hello world"));
    assert_eq!(screen.seq(), 1);
}

#[test]
fn feed_ansi_color() {
    let mut screen = Screen::new(80, 24);
    screen.feed(b"\x1b[31mhi\x1b[0m");
    let lines = screen.visible_text();
    assert!(lines[0].contains("hi"));
}

#[test]
fn resize_changes_dimensions() {
    let mut screen = Screen::new(80, 24);
    screen.resize(40, 10);
    assert_eq!(screen.visible_text().len(), 10);
}

#[test]
fn empty_feed_is_noop() {
    let mut screen = Screen::new(80, 24);
    screen.feed(b"");
    assert_eq!(screen.seq(), 0);
}

#[test]
fn split_utf8_sequence_across_feeds() {
    let mut screen = Screen::new(80, 24);
    let bytes = "❯".as_bytes();
    assert_eq!(bytes.len(), 3);
    screen.feed(&bytes[..1]);
    screen.feed(&bytes[1..]);
    let lines = screen.visible_text();
    assert!(lines[0].contains('\u{276f}'));
}
