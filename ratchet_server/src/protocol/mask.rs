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

use crate::buffer::Payload;

/// XORs the masking key over a payload in place. The key is applied to the
/// logical byte stream: it does not restart at span boundaries, so a span
/// ending mid-key leaves the rotated remainder for the next span.
pub fn apply_mask(mask: u32, payload: &mut Payload) {
    let mut key = widen(mask);
    for span in payload.spans_mut() {
        key = xor_span(key, span);
    }
}

/// Single-span form of [`apply_mask`], for contiguous buffers.
pub fn apply_mask_slice(mask: u32, bytes: &mut [u8]) {
    xor_span(widen(mask), bytes);
}

/// The 4-byte key duplicated across a 64-bit word, first wire byte lowest.
fn widen(mask: u32) -> u64 {
    (u64::from(mask) << 32) | u64::from(mask)
}

/// XORs a word-aligned stride of 8 bytes at a time; the 1..=7 byte tail is
/// folded in bytewise, rotating the key so alignment survives into the next
/// span. Full 8-byte chunks leave the key where it was (8 is a multiple of
/// the key length).
fn xor_span(mut key: u64, span: &mut [u8]) -> u64 {
    let mut chunks = span.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = u64::from_le_bytes(word) ^ key;
        chunk.copy_from_slice(&masked.to_le_bytes());
    }

    for byte in chunks.into_remainder() {
        *byte ^= key as u8;
        key = key.rotate_right(8);
    }

    key
}
