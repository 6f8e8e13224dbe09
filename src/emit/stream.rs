//! Little-endian byte stream backing IL emission.
//!
//! [`CodeStream`] is a thin append-only buffer with positional back-patching.
//! The assembler writes opcodes and operands through it and later patches
//! branch displacements once the target offset is known. Patching never
//! changes the length of the stream, which keeps every previously recorded
//! offset stable.

use crate::{
    emit::opcodes::{OpCode, FE_PREFIX},
    Error, Result,
};

/// Reserve floor for the instruction buffer.
///
/// Covers the largest fixed-size instruction (`ldc.i8` and friends) plus a
/// prefixed opcode, so a reserve before each instruction never reallocates
/// mid-write.
const INSTRUCTION_RESERVE: usize = 11;

/// Append-only little-endian code buffer with back-patch support.
#[derive(Debug, Default, Clone)]
pub struct CodeStream {
    bytes: Vec<u8>,
}

impl CodeStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        CodeStream { bytes: Vec::new() }
    }

    /// Current length in bytes, which is also the offset of the next write.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Immutable view of the emitted bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the stream and returns the underlying buffer.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Grows the spare capacity to at least `extra` bytes, with a floor of
    /// [`INSTRUCTION_RESERVE`].
    pub fn reserve(&mut self, extra: usize) {
        self.bytes.reserve(extra.max(INSTRUCTION_RESERVE));
    }

    /// Writes the opcode byte(s) of `op`, including the `0xFE` prefix for
    /// extended instructions.
    pub fn put_opcode(&mut self, op: &OpCode) {
        if op.prefix == FE_PREFIX {
            self.bytes.push(FE_PREFIX);
        }
        self.bytes.push(op.code);
    }

    /// Appends a single byte.
    pub fn put_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    /// Appends a signed byte.
    pub fn put_i8(&mut self, value: i8) {
        self.bytes.push(value as u8);
    }

    /// Appends a 16-bit value in little-endian order.
    pub fn put_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a signed 16-bit value in little-endian order.
    pub fn put_i16(&mut self, value: i16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a 32-bit value in little-endian order.
    pub fn put_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a signed 32-bit value in little-endian order.
    pub fn put_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a 64-bit value in little-endian order.
    pub fn put_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a signed 64-bit value in little-endian order.
    pub fn put_i64(&mut self, value: i64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a 32-bit float in little-endian order.
    pub fn put_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a 64-bit float in little-endian order.
    pub fn put_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Overwrites a single signed byte at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `offset` is past the end of the
    /// stream.
    pub fn patch_i8(&mut self, offset: usize, value: i8) -> Result<()> {
        let slot = self.bytes.get_mut(offset).ok_or(Error::OutOfBounds)?;
        *slot = value as u8;
        Ok(())
    }

    /// Overwrites a signed 32-bit little-endian value at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the 4-byte window starting at
    /// `offset` does not lie entirely within the stream.
    pub fn patch_i32(&mut self, offset: usize, value: i32) -> Result<()> {
        let slot = self
            .bytes
            .get_mut(offset..offset + 4)
            .ok_or(Error::OutOfBounds)?;
        slot.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Overwrites an unsigned 32-bit little-endian value at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the 4-byte window starting at
    /// `offset` does not lie entirely within the stream.
    pub fn patch_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let slot = self
            .bytes
            .get_mut(offset..offset + 4)
            .ok_or(Error::OutOfBounds)?;
        slot.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}
