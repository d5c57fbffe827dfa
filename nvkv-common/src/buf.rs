// Copyright 2026 foyer Project Authors
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

use bytes::{Buf, BufMut};

/// Max encoded length of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Extend [`Buf`] with LEB128 varint decoding.
pub trait BufExt: Buf {
    /// Gets an unsigned LEB128 varint from self and advance the current position.
    ///
    /// Returns `None` if the buffer ends before the varint terminates or the varint overflows 64 bits.
    fn get_varint(&mut self) -> Option<u64> {
        let mut v = 0u64;
        for i in 0..MAX_VARINT_LEN {
            if !self.has_remaining() {
                return None;
            }
            let byte = self.get_u8();
            if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
                return None;
            }
            v |= ((byte & 0x7f) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Some(v);
            }
        }
        None
    }

    /// Gets a zigzag encoded signed varint from self and advance the current position.
    fn get_varint_signed(&mut self) -> Option<i64> {
        self.get_varint().map(zigzag_decode)
    }
}

impl<T: Buf> BufExt for T {}

/// Extend [`BufMut`] with LEB128 varint encoding.
pub trait BufMutExt: BufMut {
    /// Writes an unsigned LEB128 varint to self and advance the current position.
    ///
    /// The caller must make sure at least [`varint_len`] bytes remain.
    fn put_varint(&mut self, mut v: u64) {
        while v >= 0x80 {
            self.put_u8((v as u8) | 0x80);
            v >>= 7;
        }
        self.put_u8(v as u8);
    }

    /// Writes a zigzag encoded signed varint to self and advance the current position.
    fn put_varint_signed(&mut self, v: i64) {
        self.put_varint(zigzag_encode(v));
    }
}

impl<T: BufMut> BufMutExt for T {}

/// Encoded length of `v` as an unsigned LEB128 varint.
pub fn varint_len(v: u64) -> usize {
    let bits = 64 - (v | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Map signed integers to unsigned ones so small magnitudes stay short on the wire.
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}
