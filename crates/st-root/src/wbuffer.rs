//! Binary writer for ROOT's big-endian streamer encoding.
//!
//! Mirrors [`RBuffer`](crate::rbuffer::RBuffer): every `write_*` here has a
//! `read_*` counterpart that consumes exactly the same bytes.

use crate::error::{Result, RootError};
use crate::rbuffer::BYTE_COUNT_MASK;

/// `kNotDeleted` bit, written into every streamed `TObject`.
const TOBJECT_NOT_DELETED: u32 = 0x0200_0000;

/// `kNewClassTag`: a class name follows inline.
const NEW_CLASS_TAG: u32 = 0xFFFF_FFFF;

/// Placeholder for an object whose byte count is patched on close.
#[must_use = "an opened object must be closed with WBuffer::end_object"]
#[derive(Debug)]
pub struct ObjectToken {
    start: usize,
}

/// A growable big-endian output buffer.
#[derive(Debug, Default, Clone)]
pub struct WBuffer {
    data: Vec<u8>,
}

impl WBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with reserved capacity.
    pub fn with_capacity(n: usize) -> Self {
        Self { data: Vec::with_capacity(n) }
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, b: &[u8]) {
        self.data.extend_from_slice(b);
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    /// Write a single signed byte.
    pub fn write_i8(&mut self, v: i8) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian u16.
    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian i16.
    pub fn write_i16(&mut self, v: i16) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian u32.
    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian i32.
    pub fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian u64.
    pub fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian f32.
    pub fn write_f32(&mut self, v: f32) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian f64.
    pub fn write_f64(&mut self, v: f64) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a ROOT-encoded string (short or long length form).
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() < 255 {
            self.write_u8(bytes.len() as u8);
        } else {
            let len = u32::try_from(bytes.len()).map_err(|_| {
                RootError::Serialization(format!("string of {} bytes too long", bytes.len()))
            })?;
            self.write_u8(255);
            self.write_u32(len);
        }
        self.write_bytes(bytes);
        Ok(())
    }

    /// Open an object: reserve the byte-count word and write `version`.
    pub fn begin_object(&mut self, version: u16) -> ObjectToken {
        let start = self.data.len();
        self.write_u32(0);
        self.write_u16(version);
        ObjectToken { start }
    }

    /// Open an object streamed through a pointer: byte-count word,
    /// `kNewClassTag`, then the NUL-terminated class name.
    pub fn begin_tagged_object(&mut self, class_name: &str) -> Result<ObjectToken> {
        if class_name.as_bytes().contains(&0) {
            return Err(RootError::Serialization(format!("class name {class_name:?} contains NUL")));
        }
        let start = self.data.len();
        self.write_u32(0);
        self.write_u32(NEW_CLASS_TAG);
        self.write_bytes(class_name.as_bytes());
        self.write_u8(0);
        Ok(ObjectToken { start })
    }

    /// Close an object opened with [`begin_object`](Self::begin_object),
    /// patching its byte count.
    pub fn end_object(&mut self, token: ObjectToken) -> Result<()> {
        let count = self.data.len() - token.start - 4;
        if count as u64 >= BYTE_COUNT_MASK as u64 {
            return Err(RootError::Serialization(format!(
                "object of {count} bytes exceeds the byte-count limit"
            )));
        }
        let word = (count as u32) | BYTE_COUNT_MASK;
        self.data[token.start..token.start + 4].copy_from_slice(&word.to_be_bytes());
        Ok(())
    }

    /// Write a `TObject` header (version 1, no unique id).
    pub fn write_tobject(&mut self) {
        self.write_u16(1);
        self.write_u32(0);
        self.write_u32(TOBJECT_NOT_DELETED);
    }

    /// Write a `TNamed`: byte-counted TObject + fName + fTitle.
    pub fn write_tnamed(&mut self, name: &str, title: &str) -> Result<()> {
        let tok = self.begin_object(1);
        self.write_tobject();
        self.write_string(name)?;
        self.write_string(title)?;
        self.end_object(tok)
    }

    /// Write a `TArrayD`: u32 count followed by the values.
    pub fn write_tarray_f64(&mut self, values: &[f64]) -> Result<()> {
        self.write_u32(array_len(values.len())?);
        for &v in values {
            self.write_f64(v);
        }
        Ok(())
    }

    /// Write a `TArrayI`: u32 count followed by the values.
    pub fn write_tarray_i32(&mut self, values: &[i32]) -> Result<()> {
        self.write_u32(array_len(values.len())?);
        for &v in values {
            self.write_i32(v);
        }
        Ok(())
    }
}

fn array_len(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| RootError::Serialization(format!("array of {n} elements too long")))
}
