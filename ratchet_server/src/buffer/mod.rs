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

#[cfg(test)]
mod tests;

use bytes::{Buf, BytesMut};
use std::collections::VecDeque;
use std::string::FromUtf8Error;

/// An owned queue of buffer segments fed by socket reads. Parsers treat it
/// as one logical byte stream; segment boundaries may fall anywhere,
/// including mid-token or mid-CRLF.
#[derive(Debug, Default)]
pub struct SegmentedBuffer {
    segments: VecDeque<BytesMut>,
    len: usize,
}

impl SegmentedBuffer {
    pub fn new() -> SegmentedBuffer {
        SegmentedBuffer::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a segment. Empty segments are discarded so that the front
    /// segment is non-empty whenever the buffer is.
    pub fn push(&mut self, segment: BytesMut) {
        if !segment.is_empty() {
            self.len += segment.len();
            self.segments.push_back(segment);
        }
    }

    /// Releases `count` bytes from the front of the stream. Whole segments
    /// are dropped as they drain.
    pub fn advance(&mut self, mut count: usize) {
        while count > 0 {
            match self.segments.front_mut() {
                Some(front) if front.len() > count => {
                    front.advance(count);
                    self.len -= count;
                    count = 0;
                }
                Some(front) => {
                    let drained = front.len();
                    self.len -= drained;
                    count -= drained;
                    self.segments.pop_front();
                }
                None => break,
            }
        }
    }

    /// Offset of the first occurrence of `byte`, scanning across segment
    /// boundaries.
    pub fn index_of(&self, byte: u8) -> Option<usize> {
        let mut offset = 0;
        for segment in &self.segments {
            if let Some(i) = segment.iter().position(|&b| b == byte) {
                return Some(offset + i);
            }
            offset += segment.len();
        }
        None
    }

    pub fn peek(&self) -> Option<u8> {
        self.segments.front().and_then(|s| s.first().copied())
    }

    /// Copies up to `dst.len()` bytes from the front of the stream without
    /// consuming them. Returns the number of bytes copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        for segment in &self.segments {
            if copied == dst.len() {
                break;
            }
            let n = (dst.len() - copied).min(segment.len());
            dst[copied..copied + n].copy_from_slice(&segment[..n]);
            copied += n;
        }
        copied
    }

    pub fn first_span(&self) -> Option<&[u8]> {
        self.segments.front().map(|s| s.as_ref())
    }

    pub fn view(&self) -> ByteView<'_> {
        ByteView::from_spans(self.segments.iter().map(|s| s.as_ref()))
    }

    /// A view over the first `end` bytes of the stream.
    pub fn view_to(&self, end: usize) -> ByteView<'_> {
        self.view().slice_to(end)
    }

    /// Detaches the first `count` bytes as an owned payload without copying
    /// byte data; segments are split at the boundary.
    pub fn split_payload(&mut self, count: usize) -> Payload {
        let mut remaining = count.min(self.len);
        let taken = remaining;
        let mut spans = Vec::new();

        while remaining > 0 {
            match self.segments.pop_front() {
                Some(mut front) => {
                    if front.len() <= remaining {
                        remaining -= front.len();
                        spans.push(front);
                    } else {
                        let head = front.split_to(remaining);
                        self.segments.push_front(front);
                        spans.push(head);
                        remaining = 0;
                    }
                }
                None => break,
            }
        }

        self.len -= taken;
        Payload { spans, len: taken }
    }
}

/// A read-only view over a possibly non-contiguous byte sequence. Slicing
/// is cheap and never copies; extraction (`to_vec` and friends) clones the
/// bytes out so the result can outlive the underlying buffer.
#[derive(Clone, Debug)]
pub struct ByteView<'a> {
    spans: Vec<&'a [u8]>,
    len: usize,
}

impl<'a> ByteView<'a> {
    pub(crate) fn from_spans<I>(spans: I) -> ByteView<'a>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let spans: Vec<&'a [u8]> = spans.into_iter().filter(|s| !s.is_empty()).collect();
        let len = spans.iter().map(|s| s.len()).sum();
        ByteView { spans, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first_span(&self) -> &'a [u8] {
        self.spans.first().copied().unwrap_or(&[])
    }

    pub fn is_single_span(&self) -> bool {
        self.spans.len() <= 1
    }

    pub fn spans(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.spans.iter().copied()
    }

    /// Logical bytes of the view, in stream order.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.spans.iter().flat_map(|s| s.iter().copied())
    }

    /// A view with the first `from` bytes dropped.
    pub fn slice(&self, from: usize) -> ByteView<'a> {
        let mut skipped = 0;
        let mut spans = Vec::with_capacity(self.spans.len());
        for span in self.spans.iter().copied() {
            if skipped + span.len() <= from {
                skipped += span.len();
            } else {
                let within = from.saturating_sub(skipped);
                spans.push(&span[within..]);
                skipped += within;
            }
        }
        let len = self.len.saturating_sub(from);
        ByteView { spans, len }
    }

    /// A view over the first `end` bytes.
    pub fn slice_to(&self, end: usize) -> ByteView<'a> {
        let mut taken = 0;
        let mut spans = Vec::with_capacity(self.spans.len());
        for span in self.spans.iter().copied() {
            if taken == end {
                break;
            }
            let n = (end - taken).min(span.len());
            spans.push(&span[..n]);
            taken += n;
        }
        ByteView { spans, len: taken }
    }

    pub fn index_of(&self, byte: u8) -> Option<usize> {
        let mut offset = 0;
        for span in &self.spans {
            if let Some(i) = span.iter().position(|&b| b == byte) {
                return Some(offset + i);
            }
            offset += span.len();
        }
        None
    }

    pub fn peek(&self) -> Option<u8> {
        self.spans.first().and_then(|s| s.first().copied())
    }

    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        for span in &self.spans {
            if copied == dst.len() {
                break;
            }
            let n = (dst.len() - copied).min(span.len());
            dst[copied..copied + n].copy_from_slice(&span[..n]);
            copied += n;
        }
        copied
    }

    /// Splits the view around the first occurrence of `byte`; the byte
    /// itself belongs to neither half.
    pub fn split_at_byte(&self, byte: u8) -> Option<(ByteView<'a>, ByteView<'a>)> {
        let at = self.index_of(byte)?;
        Some((self.slice_to(at), self.slice(at + 1)))
    }

    /// A view with leading ASCII whitespace removed.
    pub fn trim_start(&self) -> ByteView<'a> {
        let skip = self
            .bytes()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.slice(skip)
    }

    /// A view with the trailing `byte` removed, or `None` if the view does
    /// not end with it.
    pub fn strip_suffix_byte(&self, byte: u8) -> Option<ByteView<'a>> {
        let last = self.spans.last().and_then(|s| s.last().copied())?;
        if last == byte {
            Some(self.slice_to(self.len - 1))
        } else {
            None
        }
    }

    /// Case-insensitive ASCII comparison against a contiguous needle,
    /// crossing span boundaries as required.
    pub fn eq_ignore_ascii_case(&self, other: &[u8]) -> bool {
        self.len == other.len()
            && self
                .bytes()
                .zip(other.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Clones the viewed bytes into owned storage, detached from the
    /// buffer's lifetime.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for span in &self.spans {
            out.extend_from_slice(span);
        }
        out
    }

    /// The viewed bytes as characters, one per byte.
    pub fn to_ascii_string(&self) -> String {
        self.bytes().map(char::from).collect()
    }

    pub fn to_utf8_string(&self) -> Result<String, FromUtf8Error> {
        String::from_utf8(self.to_vec())
    }
}

/// An owned, possibly non-contiguous frame payload. Spans keep the
/// zero-copy segmentation of the read path; `spans_mut` exposes them for
/// in-place unmasking.
#[derive(Debug, Default)]
pub struct Payload {
    spans: Vec<BytesMut>,
    len: usize,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn view(&self) -> ByteView<'_> {
        ByteView::from_spans(self.spans.iter().map(|s| s.as_ref()))
    }

    pub fn spans(&self) -> impl Iterator<Item = &[u8]> {
        self.spans.iter().map(|s| s.as_ref())
    }

    pub fn spans_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        self.spans.iter_mut().map(|s| s.as_mut())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.view().to_vec()
    }

    pub fn into_vec(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for span in &self.spans {
            out.extend_from_slice(span);
        }
        out
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Payload {
        let len = bytes.len();
        if len == 0 {
            Payload::default()
        } else {
            Payload {
                spans: vec![BytesMut::from(bytes.as_slice())],
                len,
            }
        }
    }
}
