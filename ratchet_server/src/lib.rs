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

//! A pipelined WebSocket server core. The HTTP upgrade request is parsed
//! straight out of the segmented read buffer, the handshake is negotiated
//! per RFC 6455 (with a forgiving mode for browsers that mangle the
//! `Connection` header) and frames are decoded and unmasked with zero-copy
//! semantics wherever the segmentation allows it.

mod buffer;
mod connection;
mod errors;
mod handshake;
mod protocol;
mod server;
#[cfg(test)]
mod test_fixture;

pub use buffer::{ByteView, Payload, SegmentedBuffer};
pub use connection::{Connection, ConnectionHandler};
pub use errors::{Error, ErrorKind, ProtocolError};
pub use handshake::{
    accept_token, negotiate, upgrade, write_response, HeaderName, HeaderValue, Negotiated,
    ParseProgress, Request, RequestParser,
};
pub use protocol::{
    apply_mask, apply_mask_slice, ControlCode, DataCode, DecodeResult, FrameDecoder, FrameHeader,
    HeaderFlags, OpCode, OpCodeParseErr, ProtocolVariant, MAX_HEADER_SIZE,
};
pub use server::{serve_connection, ServerConfig, WebSocketServer};

use tokio::io::{AsyncRead, AsyncWrite};

pub trait WebSocketStream: AsyncRead + AsyncWrite + Unpin {}
impl<S> WebSocketStream for S where S: AsyncRead + AsyncWrite + Unpin {}
