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

mod request;

pub use request::{HeaderName, HeaderValue, ParseProgress, Request, RequestParser};

use crate::errors::ProtocolError;
use crate::protocol::ProtocolVariant;
use bytes::{BufMut, BytesMut};
use request::trim_ascii;
use sha1::{Digest, Sha1};

pub(crate) const ACCEPT_KEY: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const WEBSOCKET_STR: &str = "websocket";
const UPGRADE_STR: &str = "upgrade";
const SUPPORTED_VERSIONS: &[&str] = &["4", "5", "6", "7", "8", "13"];
const KEY_LENGTH: usize = 24;

const SWITCHING_PROTOCOLS: &[u8] = b"HTTP/1.1 101 Switching Protocols\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Accept: ";

/// The outcome of validating an upgrade request: the selected variant plus
/// everything the connection keeps once the request itself is released.
#[derive(Debug)]
pub struct Negotiated {
    pub variant: ProtocolVariant,
    pub host: String,
    pub origin: Option<String>,
    pub subprotocol: Option<String>,
    pub path: String,
    pub key: Vec<u8>,
}

/// Validates upgrade semantics and selects a protocol variant.
///
/// The strict rule wants `Upgrade` among the comma-separated `Connection`
/// tokens and `Upgrade: websocket`. With `lenient` set (the default), a
/// request that fails the strict rule is still treated as an upgrade when
/// it carries the RFC 6455 version/key pair or the hybi-00 key pair;
/// several browsers have shipped non-conforming `Connection` headers.
pub fn negotiate(request: &Request, lenient: bool) -> Result<Negotiated, ProtocolError> {
    let host = request
        .header("Host")
        .map(ascii_string)
        .ok_or(ProtocolError::MissingHost)?;

    let version = request.header("Sec-WebSocket-Version");
    let key = request.header("Sec-WebSocket-Key");
    let has_hybi00_keys =
        request.contains_header("Sec-WebSocket-Key1") && request.contains_header("Sec-WebSocket-Key2");

    let mut is_upgrade = request
        .header("Upgrade")
        .map(|v| trim_ascii(v).eq_ignore_ascii_case(WEBSOCKET_STR.as_bytes()))
        .unwrap_or(false)
        && request
            .header("Connection")
            .map(connection_has_upgrade_token)
            .unwrap_or(false);

    if !is_upgrade && lenient {
        is_upgrade = (version.is_some() && key.is_some()) || has_hybi00_keys;
    }

    if !is_upgrade {
        return Err(ProtocolError::NotAnUpgrade);
    }

    let variant = match version {
        None if has_hybi00_keys => ProtocolVariant::Hixie76,
        None => return Err(ProtocolError::NotAnUpgrade),
        Some(value) => {
            let value = trim_ascii(value);
            if SUPPORTED_VERSIONS.iter().any(|v| v.as_bytes() == value) {
                // The trimmed value is one or two ASCII digits by now.
                let version = value
                    .iter()
                    .fold(0u8, |acc, digit| acc * 10 + (digit - b'0'));
                ProtocolVariant::Rfc6455 { version }
            } else {
                return Err(ProtocolError::UnsupportedVersion(ascii_string(value)));
            }
        }
    };

    let origin = request
        .header("Origin")
        .or_else(|| request.header("Sec-WebSocket-Origin"))
        .map(ascii_string);
    let subprotocol = request
        .header("Sec-WebSocket-Protocol")
        .map(|v| ascii_string(trim_ascii(v)));

    Ok(Negotiated {
        variant,
        host,
        origin,
        subprotocol,
        path: request.path.clone(),
        key: key.map(|k| k.to_vec()).unwrap_or_default(),
    })
}

/// Produces the accept token for a negotiated connection, or refuses the
/// variant. This is the step that fails for a detected hybi-00 peer.
pub fn upgrade(negotiated: &Negotiated) -> Result<String, ProtocolError> {
    match negotiated.variant {
        ProtocolVariant::Rfc6455 { .. } => accept_token(&negotiated.key),
        ProtocolVariant::Hixie76 => Err(ProtocolError::UnsupportedVariant),
    }
}

/// Computes `base64(sha1(key ++ GUID))` from a raw `Sec-WebSocket-Key`
/// value. Non-base64 bytes are skipped from both ends first (clients have
/// been seen padding the key with whitespace); the remainder must be
/// exactly 24 characters.
pub fn accept_token(key: &[u8]) -> Result<String, ProtocolError> {
    let mut start = 0;
    let mut end = key.len();
    while start < end && !is_base64_byte(key[start]) {
        start += 1;
    }
    while end > start && !is_base64_byte(key[end - 1]) {
        end -= 1;
    }

    let trimmed = &key[start..end];
    if trimmed.len() != KEY_LENGTH {
        return Err(ProtocolError::MalformedKey);
    }

    let mut digest = Sha1::new();
    Digest::update(&mut digest, trimmed);
    Digest::update(&mut digest, ACCEPT_KEY);
    Ok(base64::encode(digest.finalize()))
}

/// Appends the 101 response. The byte sequence is fixed: header casing,
/// spacing and terminators are part of the contract.
pub fn write_response(dst: &mut BytesMut, accept: &str) {
    dst.reserve(SWITCHING_PROTOCOLS.len() + accept.len() + 4);
    dst.put_slice(SWITCHING_PROTOCOLS);
    dst.put_slice(accept.as_bytes());
    dst.put_slice(b"\r\n\r\n");
}

fn connection_has_upgrade_token(value: &[u8]) -> bool {
    value
        .split(|&b| b == b',')
        .any(|token| trim_ascii(token).eq_ignore_ascii_case(UPGRADE_STR.as_bytes()))
}

fn is_base64_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
}

fn ascii_string(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}
