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


use crate::buffer::{Payload, SegmentedBuffer};
use crate::errors::{Error, ProtocolError};
use crate::handshake::{self, Negotiated, ParseProgress, Request, RequestParser};
use crate::protocol::{
    apply_mask, ControlCode, DataCode, DecodeResult, FrameDecoder, FrameHeader, HeaderFlags,
    OpCode, ProtocolVariant,
};
use crate::server::ServerConfig;
use crate::WebSocketStream;
use bytes::BytesMut;
use futures::future::{ready, BoxFuture, FutureExt};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const READ_SIZE: usize = 8 * 1024;

type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Application hooks for one connection. Every hook may suspend; the frame
/// loop awaits each one before reading the next frame, so hooks observe
/// frames in wire order.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Accept or refuse a negotiated connection before the 101 is written.
    fn on_authenticate<'a>(&'a self, _conn: &'a mut Connection) -> BoxFuture<'a, bool> {
        ready(true).boxed()
    }

    fn on_handshake_complete<'a>(&'a self, _conn: &'a mut Connection) -> BoxFuture<'a, ()> {
        ready(()).boxed()
    }

    fn on_text<'a>(&'a self, _conn: &'a mut Connection, _data: &'a str) -> BoxFuture<'a, ()> {
        ready(()).boxed()
    }

    /// Binary and continuation frames. The payload arrives still masked;
    /// call [`apply_mask`] with the frame's key for the plaintext.
    fn on_binary<'a>(
        &'a self,
        _conn: &'a mut Connection,
        _frame: FrameHeader,
        _payload: Payload,
    ) -> BoxFuture<'a, ()> {
        ready(()).boxed()
    }

    fn on_ping<'a>(
        &'a self,
        _conn: &'a mut Connection,
        _frame: FrameHeader,
        _payload: Payload,
    ) -> BoxFuture<'a, ()> {
        ready(()).boxed()
    }

    fn on_pong<'a>(
        &'a self,
        _conn: &'a mut Connection,
        _frame: FrameHeader,
        _payload: Payload,
    ) -> BoxFuture<'a, ()> {
        ready(()).boxed()
    }

    fn on_close<'a>(
        &'a self,
        _conn: &'a mut Connection,
        _frame: FrameHeader,
        _payload: Payload,
    ) -> BoxFuture<'a, ()> {
        ready(()).boxed()
    }
}

/// The read side of a connection: an IO half feeding the segmented buffer,
/// one segment per socket read.
pub(crate) struct InputChannel<R> {
    io: R,
    pub(crate) buffer: SegmentedBuffer,
}

impl<R> InputChannel<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(io: R) -> InputChannel<R> {
        InputChannel {
            io,
            buffer: SegmentedBuffer::new(),
        }
    }

    /// Appends one freshly read segment. Returns the number of bytes read;
    /// zero marks the end of the stream.
    pub(crate) async fn read(&mut self) -> io::Result<usize> {
        let mut segment = BytesMut::with_capacity(READ_SIZE);
        let count = self.io.read_buf(&mut segment).await?;
        if count != 0 {
            self.buffer.push(segment);
        }
        Ok(count)
    }
}

/// The write side: frames and responses are staged into a buffer that is
/// drained and flushed in one step, which is also where backpressure is
/// inherited from.
pub(crate) struct OutputChannel {
    io: BoxWriter,
    buffer: BytesMut,
}

impl OutputChannel {
    pub(crate) fn new(io: BoxWriter) -> OutputChannel {
        OutputChannel {
            io,
            buffer: BytesMut::new(),
        }
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub(crate) async fn flush(&mut self) -> io::Result<()> {
        self.io.write_all(&self.buffer).await?;
        self.buffer.clear();
        self.io.flush().await
    }

    pub(crate) async fn complete(&mut self) -> io::Result<()> {
        self.io.shutdown().await
    }
}

/// An upgraded WebSocket connection, created during the handshake and
/// owned by its task until either side closes the transport. Exposes the
/// negotiated metadata and the frame-level write primitives; outgoing
/// server frames are never masked.
pub struct Connection {
    output: OutputChannel,
    host: String,
    origin: Option<String>,
    subprotocol: Option<String>,
    request_line: String,
    variant: ProtocolVariant,
}

impl Connection {
    fn new(output: OutputChannel, negotiated: &Negotiated) -> Connection {
        Connection {
            output,
            host: negotiated.host.clone(),
            origin: negotiated.origin.clone(),
            subprotocol: negotiated.subprotocol.clone(),
            request_line: negotiated.path.clone(),
            variant: negotiated.variant,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    /// The request path from the start line.
    pub fn path(&self) -> &str {
        &self.request_line
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Writes a single frame and awaits the flush.
    pub async fn write_frame(
        &mut self,
        opcode: OpCode,
        fin: bool,
        payload: &[u8],
    ) -> Result<(), Error> {
        let flags = if fin {
            HeaderFlags::FIN
        } else {
            HeaderFlags::empty()
        };
        FrameHeader::write_into(self.output.buffer_mut(), opcode, flags, None, payload.len());
        self.output.buffer_mut().extend_from_slice(payload);
        self.output.flush().await.map_err(Into::into)
    }

    pub async fn send_text(&mut self, data: &str) -> Result<(), Error> {
        self.write_frame(OpCode::DataCode(DataCode::Text), true, data.as_bytes())
            .await
    }

    pub async fn send_binary(&mut self, data: &[u8]) -> Result<(), Error> {
        self.write_frame(OpCode::DataCode(DataCode::Binary), true, data)
            .await
    }

    pub async fn send_ping(&mut self, data: &[u8]) -> Result<(), Error> {
        self.write_frame(OpCode::ControlCode(ControlCode::Ping), true, data)
            .await
    }

    pub async fn send_pong(&mut self, data: &[u8]) -> Result<(), Error> {
        self.write_frame(OpCode::ControlCode(ControlCode::Pong), true, data)
            .await
    }

    pub async fn send_close(&mut self, code: u16, reason: &str) -> Result<(), Error> {
        let mut payload = code.to_be_bytes().to_vec();
        payload.extend_from_slice(reason.as_bytes());
        self.write_frame(OpCode::ControlCode(ControlCode::Close), true, &payload)
            .await
    }

    async fn send_handshake_response(&mut self, accept: &str) -> Result<(), Error> {
        handshake::write_response(self.output.buffer_mut(), accept);
        self.output.flush().await.map_err(Into::into)
    }

    fn into_output(self) -> OutputChannel {
        self.output
    }
}

/// Runs one accepted connection to completion: request parse,
/// authentication, handshake, frame loop, teardown. Every exit path runs
/// the same teardown and no error escapes past this function.
pub(crate) async fn run<S, H>(stream: S, config: ServerConfig, handler: &H) -> Result<(), Error>
where
    S: WebSocketStream + Send + 'static,
    H: ConnectionHandler,
{
    let (rx, tx) = tokio::io::split(stream);
    let mut input = InputChannel::new(rx);
    let output = OutputChannel::new(Box::new(tx));

    let (mut output, result) = session(&mut input, output, &config, handler).await;
    if let Err(e) = &result {
        debug!(error = %e, "websocket connection closed with error");
    }

    // Output half first, then input; neither failure matters past this
    // point.
    let _ = output.complete().await;
    drop(input);

    result
}

async fn session<R, H>(
    input: &mut InputChannel<R>,
    output: OutputChannel,
    config: &ServerConfig,
    handler: &H,
) -> (OutputChannel, Result<(), Error>)
where
    R: AsyncRead + Unpin,
    H: ConnectionHandler,
{
    let negotiated = {
        let request = match parse_request(input).await {
            Ok(request) => request,
            Err(e) => return (output, Err(e)),
        };
        match handshake::negotiate(&request, config.allow_clients_missing_connection_headers) {
            Ok(negotiated) => negotiated,
            Err(e) => return (output, Err(e.into())),
        }
        // The request and every header clone it owns are released here,
        // before any frame IO.
    };

    let mut conn = Connection::new(output, &negotiated);

    if !handler.on_authenticate(&mut conn).await {
        return (conn.into_output(), Err(ProtocolError::AuthRefused.into()));
    }

    let accept = match handshake::upgrade(&negotiated) {
        Ok(accept) => accept,
        Err(e) => return (conn.into_output(), Err(e.into())),
    };

    if let Err(e) = conn.send_handshake_response(&accept).await {
        return (conn.into_output(), Err(e));
    }

    debug!(host = %conn.host(), path = %conn.path(), "websocket handshake complete");
    handler.on_handshake_complete(&mut conn).await;

    let result = frame_loop(input, &mut conn, config.max_payload_bytes, handler).await;
    (conn.into_output(), result)
}

/// Drives the incremental request parser, reading more input whenever the
/// parser reports it is mid-line.
async fn parse_request<R>(input: &mut InputChannel<R>) -> Result<Request, Error>
where
    R: AsyncRead + Unpin,
{
    let mut parser = RequestParser::new();
    loop {
        match parser.parse(&mut input.buffer)? {
            ParseProgress::Complete(request) => return Ok(request),
            ParseProgress::Partial => {
                if input.read().await? == 0 {
                    return Err(ProtocolError::UnexpectedEof.into());
                }
            }
        }
    }
}

async fn frame_loop<R, H>(
    input: &mut InputChannel<R>,
    conn: &mut Connection,
    max_payload: usize,
    handler: &H,
) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
    H: ConnectionHandler,
{
    let mut decoder = FrameDecoder::default();
    loop {
        match decoder.decode(&mut input.buffer, max_payload)? {
            DecodeResult::Incomplete(_) => {
                // Any leftover partial frame dies with the stream.
                if input.read().await? == 0 {
                    return Ok(());
                }
            }
            DecodeResult::Finished(header, payload) => {
                header.validate_client_frame()?;
                dispatch(conn, handler, header, payload).await?;
            }
        }
    }
}

async fn dispatch<H>(
    conn: &mut Connection,
    handler: &H,
    header: FrameHeader,
    mut payload: Payload,
) -> Result<(), Error>
where
    H: ConnectionHandler,
{
    match header.opcode {
        OpCode::DataCode(DataCode::Text) => {
            if let Some(mask) = header.mask {
                apply_mask(mask, &mut payload);
            }
            let text = String::from_utf8(payload.into_vec())?;
            handler.on_text(conn, &text).await;
        }
        OpCode::DataCode(_) => handler.on_binary(conn, header, payload).await,
        OpCode::ControlCode(ControlCode::Ping) => handler.on_ping(conn, header, payload).await,
        OpCode::ControlCode(ControlCode::Pong) => handler.on_pong(conn, header, payload).await,
        OpCode::ControlCode(ControlCode::Close) => handler.on_close(conn, header, payload).await,
    }
    Ok(())
}
