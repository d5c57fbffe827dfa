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

//! Transcoding between the RAM layout of a cached value and its compact wire form.

use std::fmt::Debug;

use bytes::{Buf, BufMut};

use crate::{
    buf::{varint_len, BufExt, BufMutExt},
    error::{Error, Result},
};

/// A serialization descriptor attached to a node.
///
/// `raw` always refers to the RAM layout of the value (exactly [`Transcode::raw_len`] bytes), `wire` to the compact
/// representation written to the persistent store.
pub trait Transcode: Send + Sync + Debug + 'static {
    /// Size of the RAM layout the descriptor was generated for.
    fn raw_len(&self) -> usize;

    /// Upper bound of the encoded size of any value.
    fn max_encoded_len(&self) -> usize;

    /// Encode `raw` into `out`, returning the encoded length.
    fn encode(&self, raw: &[u8], out: &mut [u8]) -> Result<usize>;

    /// Decode `wire` into `raw`, returning the decoded (RAM layout) length.
    fn decode(&self, wire: &[u8], raw: &mut [u8]) -> Result<usize>;
}

/// Kind of a field in a [`FieldTable`].
///
/// Integers and floats are little-endian in the RAM layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `u8`, varint on the wire.
    U8,
    /// `u16`, varint on the wire.
    U16,
    /// `u32`, varint on the wire.
    U32,
    /// `u64`, varint on the wire.
    U64,
    /// `i8`, zigzag varint on the wire.
    I8,
    /// `i16`, zigzag varint on the wire.
    I16,
    /// `i32`, zigzag varint on the wire.
    I32,
    /// `i64`, zigzag varint on the wire.
    I64,
    /// `f32`, 4 raw bytes on the wire.
    F32,
    /// `f64`, 8 raw bytes on the wire.
    F64,
    /// `bool`, 1 byte on the wire.
    Bool,
    /// Fixed capacity byte array. Trailing zeros are trimmed on the wire.
    Bytes(usize),
    /// Fixed capacity NUL padded string. Only the bytes before the first NUL go on the wire.
    Str(usize),
}

impl FieldKind {
    /// Size of the field in the RAM layout.
    pub fn raw_len(&self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 | FieldKind::Bool => 1,
            FieldKind::U16 | FieldKind::I16 => 2,
            FieldKind::U32 | FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::U64 | FieldKind::I64 | FieldKind::F64 => 8,
            FieldKind::Bytes(n) | FieldKind::Str(n) => *n,
        }
    }

    /// Upper bound of the encoded size of the field, or `None` if it does not fit in `usize`.
    pub fn max_encoded_len(&self) -> Option<usize> {
        match self {
            FieldKind::U8 | FieldKind::I8 => Some(varint_len(u8::MAX as u64)),
            FieldKind::U16 | FieldKind::I16 => Some(varint_len(u16::MAX as u64)),
            FieldKind::U32 | FieldKind::I32 => Some(varint_len(u32::MAX as u64)),
            FieldKind::U64 | FieldKind::I64 => Some(varint_len(u64::MAX)),
            FieldKind::F32 => Some(4),
            FieldKind::F64 => Some(8),
            FieldKind::Bool => Some(1),
            FieldKind::Bytes(n) | FieldKind::Str(n) => varint_len(*n as u64).checked_add(*n),
        }
    }
}

/// A field of a [`FieldTable`]: where it lives in the RAM layout and how it is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Byte offset of the field in the RAM layout.
    pub offset: usize,
    /// Field kind.
    pub kind: FieldKind,
}

impl Field {
    /// Create a field descriptor.
    pub const fn new(offset: usize, kind: FieldKind) -> Self {
        Self { offset, kind }
    }
}

/// Field descriptor driven transcoder.
///
/// Fields are encoded positionally in declaration order, without tags. Bytes not covered by any field (padding) are
/// not persisted and decode as zero.
#[derive(Debug, Clone)]
pub struct FieldTable {
    fields: Vec<Field>,
    raw_len: usize,
    max_encoded_len: usize,
}

impl FieldTable {
    /// Create a field table for a RAM layout of `raw_len` bytes.
    ///
    /// Fails if any field falls outside of the layout, or if the encoded size bound does not fit in `usize`.
    pub fn new(raw_len: usize, fields: impl IntoIterator<Item = Field>) -> Result<Self> {
        let fields: Vec<Field> = fields.into_iter().collect();
        let mut max_encoded_len: usize = 0;
        for field in fields.iter() {
            match field.offset.checked_add(field.kind.raw_len()) {
                Some(end) if end <= raw_len => {}
                _ => {
                    return Err(Error::codec("field out of layout bounds")
                        .with_context("offset", field.offset)
                        .with_context("kind", format!("{:?}", field.kind))
                        .with_context("raw_len", raw_len))
                }
            }
            max_encoded_len = field
                .kind
                .max_encoded_len()
                .and_then(|len| max_encoded_len.checked_add(len))
                .ok_or_else(|| {
                    Error::codec("encoded size overflow")
                        .with_context("offset", field.offset)
                        .with_context("kind", format!("{:?}", field.kind))
                })?;
        }
        Ok(Self {
            fields,
            raw_len,
            max_encoded_len,
        })
    }
}

fn load(raw: &[u8], offset: usize, width: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..width].copy_from_slice(&raw[offset..offset + width]);
    u64::from_le_bytes(bytes)
}

fn store(raw: &mut [u8], offset: usize, width: usize, v: u64) {
    raw[offset..offset + width].copy_from_slice(&v.to_le_bytes()[..width]);
}

fn sign_extend(v: u64, width: usize) -> i64 {
    let shift = 64 - 8 * width as u32;
    ((v << shift) as i64) >> shift
}

fn ensure(out: &impl BufMut, required: usize, capacity: usize) -> Result<()> {
    if out.remaining_mut() < required {
        return Err(Error::buffer_size_limit(capacity, required));
    }
    Ok(())
}

impl Transcode for FieldTable {
    fn raw_len(&self) -> usize {
        self.raw_len
    }

    fn max_encoded_len(&self) -> usize {
        self.max_encoded_len
    }

    fn encode(&self, raw: &[u8], out: &mut [u8]) -> Result<usize> {
        if raw.len() < self.raw_len {
            return Err(Error::codec("raw value shorter than layout")
                .with_context("len", raw.len())
                .with_context("raw_len", self.raw_len));
        }

        let capacity = out.len();
        let mut w = &mut out[..];

        for field in self.fields.iter() {
            let offset = field.offset;
            match field.kind {
                FieldKind::U8 | FieldKind::U16 | FieldKind::U32 | FieldKind::U64 => {
                    let v = load(raw, offset, field.kind.raw_len());
                    ensure(&w, varint_len(v), capacity)?;
                    w.put_varint(v);
                }
                FieldKind::I8 | FieldKind::I16 | FieldKind::I32 | FieldKind::I64 => {
                    let width = field.kind.raw_len();
                    let v = sign_extend(load(raw, offset, width), width);
                    ensure(&w, varint_len(crate::buf::zigzag_encode(v)), capacity)?;
                    w.put_varint_signed(v);
                }
                FieldKind::F32 | FieldKind::F64 | FieldKind::Bool => {
                    let width = field.kind.raw_len();
                    ensure(&w, width, capacity)?;
                    if field.kind == FieldKind::Bool {
                        w.put_u8((raw[offset] != 0) as u8);
                    } else {
                        w.put_slice(&raw[offset..offset + width]);
                    }
                }
                FieldKind::Bytes(n) | FieldKind::Str(n) => {
                    let data = &raw[offset..offset + n];
                    let len = match field.kind {
                        FieldKind::Str(_) => data.iter().position(|b| *b == 0).unwrap_or(n),
                        _ => data.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0),
                    };
                    ensure(&w, varint_len(len as u64) + len, capacity)?;
                    w.put_varint(len as u64);
                    w.put_slice(&data[..len]);
                }
            }
        }

        Ok(capacity - w.len())
    }

    fn decode(&self, wire: &[u8], raw: &mut [u8]) -> Result<usize> {
        if raw.len() < self.raw_len {
            return Err(Error::buffer_size_limit(raw.len(), self.raw_len));
        }

        let truncated = || Error::codec("truncated wire value").with_context("len", wire.len());

        raw[..self.raw_len].fill(0);
        let mut r = wire;

        for field in self.fields.iter() {
            let offset = field.offset;
            let width = field.kind.raw_len();
            match field.kind {
                FieldKind::U8 | FieldKind::U16 | FieldKind::U32 | FieldKind::U64 => {
                    let v = r.get_varint().ok_or_else(truncated)?;
                    if width < 8 && v >> (8 * width) != 0 {
                        return Err(Error::codec("unsigned field overflow").with_context("offset", offset));
                    }
                    store(raw, offset, width, v);
                }
                FieldKind::I8 | FieldKind::I16 | FieldKind::I32 | FieldKind::I64 => {
                    let v = r.get_varint_signed().ok_or_else(truncated)?;
                    if sign_extend(v as u64, width) != v {
                        return Err(Error::codec("signed field overflow").with_context("offset", offset));
                    }
                    store(raw, offset, width, v as u64);
                }
                FieldKind::F32 | FieldKind::F64 | FieldKind::Bool => {
                    if r.remaining() < width {
                        return Err(truncated());
                    }
                    if field.kind == FieldKind::Bool {
                        raw[offset] = (r.get_u8() != 0) as u8;
                    } else {
                        r.copy_to_slice(&mut raw[offset..offset + width]);
                    }
                }
                FieldKind::Bytes(n) | FieldKind::Str(n) => {
                    let len = r.get_varint().ok_or_else(truncated)? as usize;
                    if len > n {
                        return Err(Error::codec("byte field overflow")
                            .with_context("offset", offset)
                            .with_context("len", len)
                            .with_context("capacity", n));
                    }
                    if r.remaining() < len {
                        return Err(truncated());
                    }
                    r.copy_to_slice(&mut raw[offset..offset + len]);
                }
            }
        }

        if r.has_remaining() {
            return Err(Error::codec("trailing bytes after last field").with_context("trailing", r.remaining()));
        }

        Ok(self.raw_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    // struct { value: u32, temp: i16, pad: [u8; 2], ratio: f32, enabled: bool, name: [u8; 16] }
    const RAW_LEN: usize = 29;

    fn table() -> FieldTable {
        FieldTable::new(
            RAW_LEN,
            [
                Field::new(0, FieldKind::U32),
                Field::new(4, FieldKind::I16),
                Field::new(8, FieldKind::F32),
                Field::new(12, FieldKind::Bool),
                Field::new(13, FieldKind::Str(16)),
            ],
        )
        .unwrap()
    }

    fn raw(value: u32, temp: i16, ratio: f32, enabled: bool, name: &str) -> [u8; RAW_LEN] {
        let mut raw = [0u8; RAW_LEN];
        raw[0..4].copy_from_slice(&value.to_le_bytes());
        raw[4..6].copy_from_slice(&temp.to_le_bytes());
        raw[8..12].copy_from_slice(&ratio.to_le_bytes());
        raw[12] = enabled as u8;
        raw[13..13 + name.len()].copy_from_slice(name.as_bytes());
        raw
    }

    #[test]
    fn test_field_table_restores_layout() {
        let table = table();
        let src = raw(42, -7, 0.5, true, "gyro");

        let mut wire = [0u8; 64];
        let len = table.encode(&src, &mut wire).unwrap();
        // 1 (42) + 1 (-7) + 4 + 1 + 1 + 4 ("gyro")
        assert_eq!(len, 12);
        assert!(len <= table.max_encoded_len());

        let mut dst = [0xffu8; RAW_LEN];
        assert_eq!(table.decode(&wire[..len], &mut dst).unwrap(), RAW_LEN);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_padding_is_not_persisted() {
        let table = table();
        let mut src = raw(1, 1, 1.0, false, "");
        src[6] = 0xaa;
        src[7] = 0xbb;

        let mut wire = [0u8; 64];
        let len = table.encode(&src, &mut wire).unwrap();
        let mut dst = [0u8; RAW_LEN];
        table.decode(&wire[..len], &mut dst).unwrap();
        assert_eq!(&dst[6..8], &[0, 0]);
        assert_eq!(&dst[..6], &src[..6]);
    }

    #[test]
    fn test_encode_out_too_small() {
        let table = table();
        let src = raw(u32::MAX, i16::MIN, 0.0, true, "0123456789abcdef");
        let mut wire = [0u8; 8];
        let err = table.encode(&src, &mut wire).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BufferSizeLimit);
    }

    #[test]
    fn test_decode_rejects_bad_wire() {
        let table = FieldTable::new(1, [Field::new(0, FieldKind::U8)]).unwrap();
        let mut dst = [0u8; 1];

        // 300 does not fit a u8.
        assert_eq!(table.decode(&[0xac, 0x02], &mut dst).unwrap_err().kind(), ErrorKind::Codec);
        // truncated
        assert_eq!(table.decode(&[], &mut dst).unwrap_err().kind(), ErrorKind::Codec);
        // trailing
        assert_eq!(table.decode(&[0x01, 0x01], &mut dst).unwrap_err().kind(), ErrorKind::Codec);
        assert_eq!(table.decode(&[0x01], &mut dst).unwrap(), 1);
        assert_eq!(dst, [1]);
    }

    #[test]
    fn test_field_out_of_bounds() {
        assert!(FieldTable::new(4, [Field::new(2, FieldKind::U32)]).is_err());
        // The end of the field wraps around.
        let err = FieldTable::new(usize::MAX, [Field::new(1, FieldKind::Bytes(usize::MAX))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_max_encoded_len_overflow() {
        assert_eq!(FieldKind::Bytes(usize::MAX).max_encoded_len(), None);

        let err = FieldTable::new(usize::MAX, [Field::new(0, FieldKind::Bytes(usize::MAX))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);

        let half = usize::MAX / 2;
        let fields = [
            Field::new(0, FieldKind::Bytes(half)),
            Field::new(half, FieldKind::Str(half)),
        ];
        let err = FieldTable::new(usize::MAX, fields).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_max_encoded_len() {
        let table = table();
        assert_eq!(table.max_encoded_len(), 5 + 3 + 4 + 1 + (1 + 16));
    }
}
