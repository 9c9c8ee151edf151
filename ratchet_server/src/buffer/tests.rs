// Copyright 2015-2021 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::buffer::SegmentedBuffer;
use bytes::BytesMut;

fn segmented(parts: &[&[u8]]) -> SegmentedBuffer {
    let mut buf = SegmentedBuffer::new();
    for part in parts {
        buf.push(BytesMut::from(*part));
    }
    buf
}

#[test]
fn length_across_segments() {
    let buf = segmented(&[b"GET ", b"/chat", b" HTTP/1.1"]);
    assert_eq!(buf.len(), 18);
    assert!(!buf.is_empty());
    assert_eq!(buf.peek(), Some(b'G'));
}

#[test]
fn empty_segments_are_discarded() {
    let buf = segmented(&[b"", b"a", b""]);
    assert_eq!(buf.len(), 1);
    assert_eq!(buf.first_span(), Some(b"a".as_ref()));
}

#[test]
fn index_of_crosses_boundaries() {
    let buf = segmented(&[b"GET /cha", b"t HTTP/1.1\r", b"\n"]);
    assert_eq!(buf.index_of(b' '), Some(3));
    assert_eq!(buf.index_of(b'\n'), Some(19));
    assert_eq!(buf.index_of(b'X'), None);
}

#[test]
fn advance_drains_whole_and_partial_segments() {
    let mut buf = segmented(&[b"abc", b"def", b"ghi"]);
    buf.advance(4);
    assert_eq!(buf.len(), 5);
    assert_eq!(buf.peek(), Some(b'e'));

    buf.advance(5);
    assert!(buf.is_empty());
    assert_eq!(buf.peek(), None);
}

#[test]
fn copy_to_is_non_destructive() {
    let buf = segmented(&[b"ab", b"cd", b"ef"]);
    let mut dst = [0u8; 4];
    assert_eq!(buf.copy_to(&mut dst), 4);
    assert_eq!(&dst, b"abcd");
    assert_eq!(buf.len(), 6);

    let mut large = [0u8; 16];
    assert_eq!(buf.copy_to(&mut large), 6);
    assert_eq!(&large[..6], b"abcdef");
}

#[test]
fn split_payload_is_zero_copy_over_segments() {
    let mut buf = segmented(&[b"abc", b"def", b"ghi"]);
    let payload = buf.split_payload(5);

    assert_eq!(payload.len(), 5);
    assert_eq!(payload.to_vec(), b"abcde");
    let spans: Vec<&[u8]> = payload.spans().collect();
    assert_eq!(spans, vec![b"abc".as_ref(), b"de".as_ref()]);

    assert_eq!(buf.len(), 4);
    assert_eq!(buf.peek(), Some(b'f'));
}

#[test]
fn view_slicing() {
    let buf = segmented(&[b"one ", b"two ", b"three"]);
    let view = buf.view();

    assert_eq!(view.len(), 13);
    assert!(!view.is_single_span());
    assert_eq!(view.first_span(), b"one ".as_ref());
    assert!(view.slice(4).slice_to(3).is_single_span());

    let mut copied = [0u8; 7];
    assert_eq!(view.copy_to(&mut copied), 7);
    assert_eq!(&copied, b"one two");
    assert_eq!(view.slice(4).to_ascii_string(), "two three");
    assert_eq!(view.slice_to(3).to_ascii_string(), "one");
    assert_eq!(view.slice(2).slice_to(5).to_ascii_string(), "e two");
    assert_eq!(view.slice(13).len(), 0);
}

#[test]
fn view_split_at_byte() {
    let buf = segmented(&[b"Host", b": ser", b"ver\r"]);
    let view = buf.view();

    let (name, value) = view.split_at_byte(b':').unwrap();
    assert_eq!(name.to_ascii_string(), "Host");
    assert_eq!(value.trim_start().to_ascii_string(), "server\r");
    assert!(view.split_at_byte(b'=').is_none());
}

#[test]
fn trim_and_strip() {
    let buf = segmented(&[b"  \t", b" 13", b"\r"]);
    let view = buf.view();

    let trimmed = view.trim_start();
    assert_eq!(trimmed.to_ascii_string(), "13\r");

    let stripped = trimmed.strip_suffix_byte(b'\r').unwrap();
    assert_eq!(stripped.to_ascii_string(), "13");
    assert!(stripped.strip_suffix_byte(b'\r').is_none());
}

#[test]
fn case_insensitive_comparison_over_spans() {
    let buf = segmented(&[b"Sec-WebSo", b"cket-", b"Key"]);
    let view = buf.view();

    assert!(view.eq_ignore_ascii_case(b"sec-websocket-key"));
    assert!(view.eq_ignore_ascii_case(b"SEC-WEBSOCKET-KEY"));
    assert!(!view.eq_ignore_ascii_case(b"sec-websocket-accept"));
    assert!(!view.eq_ignore_ascii_case(b"sec-websocket-ke"));
}

#[test]
fn extraction_outlives_the_buffer() {
    let owned = {
        let buf = segmented(&[b"He", b"llo"]);
        buf.view().to_vec()
    };
    assert_eq!(owned, b"Hello");
}

#[test]
fn utf8_extraction() {
    let buf = segmented(&["héllo".as_bytes()]);
    assert_eq!(buf.view().to_utf8_string().unwrap(), "héllo");

    let bad = segmented(&[&[0xFF, 0xFE]]);
    assert!(bad.view().to_utf8_string().is_err());
}
