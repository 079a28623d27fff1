//! Caller-side buffers
//!
//! File operations never touch caller memory directly. Data crosses the
//! boundary through [`UserSliceReader::copy_in`] and
//! [`UserSliceWriter::copy_out`], either of which may fail with
//! [`DriverError::CopyFault`] the way `copy_from_user`/`copy_to_user` do when
//! the caller hands over a bad address.

use crate::error::{DriverError, Result};

/// Source of bytes a caller passed to `write`
pub trait UserSliceReader {
    /// Number of bytes the caller asked to write
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst` from the caller's buffer
    fn copy_in(&mut self, dst: &mut [u8]) -> Result<()>;
}

/// Destination a caller passed to `read`
pub trait UserSliceWriter {
    /// Number of bytes the caller is able to receive
    fn capacity(&self) -> usize;

    /// Copy all of `src` to the caller. Copies that run past the caller's
    /// buffer fault rather than truncate; callers clamp `src` to
    /// [`capacity`](Self::capacity) first when a short transfer is wanted.
    fn copy_out(&mut self, src: &[u8]) -> Result<()>;
}

/// Caller write buffer backed by a byte slice
#[derive(Debug)]
pub struct SliceReader<'a> {
    data: &'a [u8],
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl UserSliceReader for SliceReader<'_> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_in(&mut self, dst: &mut [u8]) -> Result<()> {
        let src = self.data.get(..dst.len()).ok_or(DriverError::CopyFault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Caller read buffer backed by a mutable byte slice
#[derive(Debug)]
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
}

impl<'a> SliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }
}

impl UserSliceWriter for SliceWriter<'_> {
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn copy_out(&mut self, src: &[u8]) -> Result<()> {
        let dst = self
            .buf
            .get_mut(..src.len())
            .ok_or(DriverError::CopyFault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Caller buffer whose address is invalid: it claims `len` bytes but every
/// copy in either direction faults.
#[derive(Debug, Clone, Copy)]
pub struct BadAddress {
    pub len: usize,
}

impl UserSliceReader for BadAddress {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_in(&mut self, _dst: &mut [u8]) -> Result<()> {
        Err(DriverError::CopyFault)
    }
}

impl UserSliceWriter for BadAddress {
    fn capacity(&self) -> usize {
        self.len
    }

    fn copy_out(&mut self, _src: &[u8]) -> Result<()> {
        Err(DriverError::CopyFault)
    }
}
