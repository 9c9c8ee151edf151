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
use crate::errors::ProtocolError;
use crate::protocol::{HeaderFlags, OpCode};
use bytes::{BufMut, BytesMut};
use either::Either;
use std::convert::TryFrom;

const U16_MAX: usize = u16::MAX as usize;

/// The longest possible frame header: 2 base bytes, an 8-byte extended
/// length and a 4-byte masking key.
pub const MAX_HEADER_SIZE: usize = 14;

/// A decoded frame header. The masking key, where present, is kept
/// little-endian in the order it arrived on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub opcode: OpCode,
    pub flags: HeaderFlags,
    pub mask: Option<u32>,
    pub payload_len: usize,
}

impl FrameHeader {
    pub fn new(opcode: OpCode, flags: HeaderFlags, mask: Option<u32>, payload_len: usize) -> Self {
        FrameHeader {
            opcode,
            flags,
            mask,
            payload_len,
        }
    }

    pub fn is_final(&self) -> bool {
        self.flags.is_fin()
    }

    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Client-to-server framing rules, checked at dispatch time.
    pub fn validate_client_frame(&self) -> Result<(), ProtocolError> {
        if self.mask.is_none() {
            // rfc6455 § 6.1: a client must mask every frame it sends
            return Err(ProtocolError::UnmaskedFrame);
        }
        if self.is_control() && !self.is_final() {
            // rfc6455 § 5.4: control frames must not be fragmented
            return Err(ProtocolError::FragmentedControl);
        }
        Ok(())
    }

    /// Attempts to decode a header from the front of `source` without
    /// consuming anything. Yields the header and its encoded length, or the
    /// number of further bytes required before another attempt can succeed.
    ///
    /// The header may straddle segment boundaries, so up to
    /// [`MAX_HEADER_SIZE`] bytes are copied onto the stack unless the first
    /// segment already holds them contiguously.
    pub fn read_from(
        source: &SegmentedBuffer,
    ) -> Result<Either<(FrameHeader, usize), usize>, ProtocolError> {
        let available = source.len();
        if available < 2 {
            return Ok(Either::Right(2 - available));
        }

        let mut stack = [0u8; MAX_HEADER_SIZE];
        let head: &[u8] = match source.first_span() {
            Some(span) if span.len() >= MAX_HEADER_SIZE => span,
            _ => {
                let n = source.copy_to(&mut stack);
                &stack[..n]
            }
        };

        let first = head[0];
        let flags = HeaderFlags::from_bits_truncate(first);
        let opcode = OpCode::try_from(first & 0xF)?;

        let second = head[1];
        let masked = second & 0x80 != 0;
        let length_code = second & 0x7F;

        let (base_len, mask_offset) = match length_code {
            126 => (4, 4),
            127 => (10, 10),
            _ => (2, 2),
        };
        let header_len = if masked { base_len + 4 } else { base_len };

        if available < header_len {
            return Ok(Either::Right(header_len - available));
        }

        let payload_len: usize = match length_code {
            126 => u16::from_be_bytes([head[2], head[3]]) as usize,
            127 => {
                // The 64-bit length is read as two big-endian words; anything
                // that cannot be represented as a signed 32-bit value is
                // refused outright.
                let high = u32::from_be_bytes([head[2], head[3], head[4], head[5]]);
                let low = u32::from_be_bytes([head[6], head[7], head[8], head[9]]);
                if high != 0 || low > i32::MAX as u32 {
                    return Err(ProtocolError::PayloadTooLarge);
                }
                low as usize
            }
            n => usize::from(n),
        };

        let mask = if masked {
            let mut key = [0u8; 4];
            key.copy_from_slice(&head[mask_offset..mask_offset + 4]);
            Some(u32::from_le_bytes(key))
        } else {
            None
        };

        Ok(Either::Left((
            FrameHeader {
                opcode,
                flags,
                mask,
                payload_len,
            },
            header_len,
        )))
    }

    /// Symmetric construction: appends a header for `payload_len` bytes to
    /// `dst`, including the masking key when one is given.
    pub fn write_into(
        dst: &mut BytesMut,
        opcode: OpCode,
        flags: HeaderFlags,
        mask: Option<u32>,
        payload_len: usize,
    ) {
        let masked = mask.is_some();
        let (second, mut offset) = if masked { (0x80u8, 6) } else { (0x0u8, 2) };

        if payload_len > U16_MAX {
            offset += 8;
        } else if payload_len > 125 {
            offset += 2;
        }

        dst.reserve(offset);
        let first = flags.bits() | u8::from(opcode);

        if payload_len < 126 {
            dst.extend_from_slice(&[first, second | payload_len as u8]);
        } else if payload_len <= U16_MAX {
            dst.extend_from_slice(&[first, second | 126]);
            dst.put_u16(payload_len as u16);
        } else {
            dst.extend_from_slice(&[first, second | 127]);
            dst.put_u64(payload_len as u64);
        }

        if let Some(mask) = mask {
            dst.put_u32_le(mask);
        }
    }
}

/// Resumable frame decoder. Decoding never consumes input until the whole
/// frame is buffered; a suspended decode picks up where it left off.
#[derive(Debug)]
pub enum FrameDecoder {
    DecodingHeader,
    DecodingPayload(FrameHeader, usize),
}

impl Default for FrameDecoder {
    fn default() -> Self {
        FrameDecoder::DecodingHeader
    }
}

#[derive(Debug)]
pub enum DecodeResult {
    /// At least this many further bytes are needed.
    Incomplete(usize),
    /// A complete frame; the payload is split out of the buffer zero-copy
    /// and is still masked.
    Finished(FrameHeader, Payload),
}

impl FrameDecoder {
    pub fn decode(
        &mut self,
        buf: &mut SegmentedBuffer,
        max_payload: usize,
    ) -> Result<DecodeResult, ProtocolError> {
        loop {
            match self {
                FrameDecoder::DecodingHeader => match FrameHeader::read_from(buf)? {
                    Either::Left((header, header_len)) => {
                        if header.payload_len > max_payload {
                            return Err(ProtocolError::PayloadTooLarge);
                        }
                        *self = FrameDecoder::DecodingPayload(header, header_len);
                    }
                    Either::Right(count) => return Ok(DecodeResult::Incomplete(count)),
                },
                FrameDecoder::DecodingPayload(header, header_len) => {
                    let frame_len = *header_len + header.payload_len;
                    if buf.len() < frame_len {
                        return Ok(DecodeResult::Incomplete(frame_len - buf.len()));
                    }

                    buf.advance(*header_len);
                    let payload = buf.split_payload(header.payload_len);

                    let result = DecodeResult::Finished(*header, payload);
                    *self = FrameDecoder::DecodingHeader;
                    return Ok(result);
                }
            }
        }
    }
}
