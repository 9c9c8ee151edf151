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

use crate::buffer::{ByteView, SegmentedBuffer};
use crate::errors::ProtocolError;
use fnv::FnvHashMap;
use std::borrow::Cow;
use std::mem;

/// Canonical casings for headers commonly seen on upgrade requests. A
/// received name matching one of these case-insensitively is stored in the
/// canonical form; anything else is stored as the raw ASCII received.
pub(crate) static KNOWN_HEADERS: &[&str] = &[
    "Accept",
    "Accept-Encoding",
    "Accept-Language",
    "Cache-Control",
    "Connection",
    "Cookie",
    "Host",
    "Origin",
    "Pragma",
    "Sec-WebSocket-Accept",
    "Sec-WebSocket-Extensions",
    "Sec-WebSocket-Key",
    "Sec-WebSocket-Key1",
    "Sec-WebSocket-Key2",
    "Sec-WebSocket-Origin",
    "Sec-WebSocket-Protocol",
    "Sec-WebSocket-Version",
    "Upgrade",
    "User-Agent",
];

/// A header name in its canonical casing. Comparison and hashing are
/// case-sensitive; canonicalisation happens once, on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderName(Cow<'static, str>);

impl HeaderName {
    pub fn from_raw(name: &[u8]) -> HeaderName {
        for canonical in KNOWN_HEADERS {
            if canonical.as_bytes().eq_ignore_ascii_case(name) {
                return HeaderName(Cow::Borrowed(*canonical));
            }
        }
        HeaderName(Cow::Owned(
            name.iter().copied().map(char::from).collect(),
        ))
    }

    fn from_view(name: &ByteView<'_>) -> HeaderName {
        for canonical in KNOWN_HEADERS {
            if name.eq_ignore_ascii_case(canonical.as_bytes()) {
                return HeaderName(Cow::Borrowed(*canonical));
            }
        }
        HeaderName(Cow::Owned(name.to_ascii_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub type HeaderValue = Vec<u8>;

/// A parsed upgrade request. Every field is cloned out of the input buffer
/// at extraction time, so the request outlives the bytes it was parsed
/// from; it is dropped in full before frame IO begins.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub http_version: String,
    headers: FnvHashMap<HeaderName, HeaderValue>,
}

impl Request {
    /// Looks a header up by name: case-insensitive for the known headers
    /// (via canonicalisation), case-sensitive against the stored raw form
    /// otherwise.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .get(&HeaderName::from_raw(name.as_bytes()))
            .map(|v| v.as_slice())
    }

    pub fn contains_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ParseState {
    StartLine,
    Headers,
}

#[derive(Debug)]
pub enum ParseProgress {
    Complete(Request),
    /// More input is required; nothing incomplete was consumed.
    Partial,
}

/// Incremental request parser: a two-state machine with no backtracking.
/// Each call consumes exactly the bytes of the lines it completes and
/// leaves anything incomplete in the buffer for the next call.
#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    method: String,
    path: String,
    http_version: String,
    headers: FnvHashMap<HeaderName, HeaderValue>,
}

impl Default for RequestParser {
    fn default() -> Self {
        RequestParser::new()
    }
}

impl RequestParser {
    pub fn new() -> RequestParser {
        RequestParser {
            state: ParseState::StartLine,
            method: String::new(),
            path: String::new(),
            http_version: String::new(),
            headers: FnvHashMap::default(),
        }
    }

    pub fn parse(&mut self, buf: &mut SegmentedBuffer) -> Result<ParseProgress, ProtocolError> {
        loop {
            match self.state {
                ParseState::StartLine => {
                    let lf = match buf.index_of(b'\n') {
                        Some(i) => i,
                        None => return Ok(ParseProgress::Partial),
                    };
                    self.read_start_line(&buf.view_to(lf))?;
                    buf.advance(lf + 1);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => match buf.peek() {
                    None => return Ok(ParseProgress::Partial),
                    Some(b'\r') => match buf.view().slice(1).peek() {
                        None => return Ok(ParseProgress::Partial),
                        Some(b'\n') => {
                            buf.advance(2);
                            return Ok(ParseProgress::Complete(self.take_request()));
                        }
                        Some(_) => return Err(ProtocolError::Malformed),
                    },
                    Some(_) => {
                        let lf = match buf.index_of(b'\n') {
                            Some(i) => i,
                            None => return Ok(ParseProgress::Partial),
                        };
                        self.read_header_line(&buf.view_to(lf))?;
                        buf.advance(lf + 1);
                    }
                },
            }
        }
    }

    /// `METHOD SP PATH SP HTTP-VERSION CR`; any absent delimiter is fatal.
    fn read_start_line(&mut self, line: &ByteView<'_>) -> Result<(), ProtocolError> {
        let (method, rest) = line.split_at_byte(b' ').ok_or(ProtocolError::Malformed)?;
        let (path, rest) = rest.split_at_byte(b' ').ok_or(ProtocolError::Malformed)?;
        let version = rest
            .strip_suffix_byte(b'\r')
            .ok_or(ProtocolError::Malformed)?;

        self.method = method.to_ascii_string();
        self.path = path.to_ascii_string();
        self.http_version = version.to_ascii_string();
        Ok(())
    }

    /// `NAME : VALUE CR`, leading whitespace trimmed from both halves.
    /// Duplicate names overwrite; the handshake only needs the last value.
    fn read_header_line(&mut self, line: &ByteView<'_>) -> Result<(), ProtocolError> {
        let (name, value) = line.split_at_byte(b':').ok_or(ProtocolError::Malformed)?;
        let value = value
            .strip_suffix_byte(b'\r')
            .ok_or(ProtocolError::Malformed)?
            .trim_start();

        let name = HeaderName::from_view(&name.trim_start());
        self.headers.insert(name, value.to_vec());
        Ok(())
    }

    fn take_request(&mut self) -> Request {
        self.state = ParseState::StartLine;
        Request {
            method: mem::take(&mut self.method),
            path: mem::take(&mut self.path),
            http_version: mem::take(&mut self.http_version),
            headers: mem::take(&mut self.headers),
        }
    }
}

pub(crate) fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}
