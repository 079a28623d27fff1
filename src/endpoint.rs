//! The conversion endpoint: open/read/write/close on the shared context
//!
//! A write takes a fixed-width token such as `"100F"` or `"037C"`, converts
//! it to the other scale and stores the decimal text; a read hands that text
//! back. Open and close only log.
//!
//! ```text
//! write("100F") ─▶ stage ─▶ token "100F" ─▶ prefix "100", unit 'F'
//!                                          ─▶ (100 - 32) * 5 / 9 = 37
//!                                          ─▶ commit "37", writes += 1
//! read()        ─▶ "37", reads += 1
//! ```
//!
//! A token whose unit byte is neither `F` nor `C` is still accepted: nothing
//! is converted, the numeric prefix itself becomes the stored text, and the
//! write counts as successful.

use crate::context::{ConversionContext, ConversionStats};
use crate::convert::Unit;
use crate::error::{DriverError, Result};
use crate::miscdev::{FileInfo, FileOperations};
use crate::token::{self, ResultText, MAX_WRITE_BYTES};
use crate::user::{UserSliceReader, UserSliceWriter};
use std::sync::Arc;

/// File operations of the conversion device
#[derive(Debug, Clone)]
pub struct ConversionEndpoint {
    ctx: Arc<ConversionContext>,
}

impl ConversionEndpoint {
    pub fn new(ctx: Arc<ConversionContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<ConversionContext> {
        &self.ctx
    }

    pub fn stats(&self) -> ConversionStats {
        self.ctx.stats()
    }

    /// Turn a staged token into the text to store.
    ///
    /// Pure: nothing is committed here, so a parse failure leaves the
    /// context untouched.
    fn convert_token(file: &FileInfo, staged: &[u8]) -> Result<ResultText> {
        let token = token::extract_token(staged);
        let (prefix, unit_byte) = token::split_unit(token);

        let value = token::parse_value(prefix).inspect_err(|_| {
            tracing::warn!(
                device = %file.device.name(),
                prefix = %String::from_utf8_lossy(prefix),
                "could not parse entered value into integer"
            );
        })?;

        match unit_byte.and_then(Unit::from_byte) {
            Some(unit) => {
                let converted = unit.convert(value);
                tracing::info!(
                    device = %file.device.name(),
                    "{} {} = approximately {} {}",
                    value,
                    unit.name(),
                    converted,
                    unit.target().name()
                );
                Ok(ResultText::from_value(converted))
            }
            None => {
                tracing::info!(
                    device = %file.device.name(),
                    unit = ?unit_byte.map(char::from),
                    "could not convert temperature; inappropriate unit specified"
                );
                Ok(ResultText::truncating(token::numeric_prefix(prefix)))
            }
        }
    }
}

impl FileOperations for ConversionEndpoint {
    fn open(&self, file: &FileInfo) -> Result<()> {
        tracing::info!(
            device = %file.device.name(),
            comm = %file.caller.comm,
            pid = file.caller.pid,
            "opening \"{}\" now; f_flags = {:#x}",
            file.device.path(),
            file.access.flags()
        );
        Ok(())
    }

    fn read(&self, file: &FileInfo, out: &mut dyn UserSliceWriter) -> Result<usize> {
        tracing::info!(
            device = %file.device.name(),
            comm = %file.caller.comm,
            "wants to read (upto) {} bytes",
            out.capacity()
        );

        let mut state = self.ctx.lock();
        let len = state.last_result.len();
        if len == 0 {
            tracing::warn!(device = %file.device.name(), "no temperature available");
            return Err(DriverError::NoDataAvailable);
        }

        let count = len.min(out.capacity());
        out.copy_out(&state.last_result.as_bytes()[..count])
            .inspect_err(|_| {
                tracing::warn!(device = %file.device.name(), "copy to caller failed");
            })?;

        state.stats.reads += 1;
        let stats = state.stats;
        drop(state);

        tracing::info!(
            device = %file.device.name(),
            reads = stats.reads,
            writes = stats.writes,
            "{} bytes read",
            count
        );
        Ok(count)
    }

    fn write(&self, file: &FileInfo, input: &mut dyn UserSliceReader) -> Result<usize> {
        let count = input.len();
        if count > MAX_WRITE_BYTES {
            tracing::warn!(
                device = %file.device.name(),
                "count {} exceeds max # of bytes allowed, aborting write",
                count
            );
            return Err(DriverError::InputTooLarge {
                len: count,
                max: MAX_WRITE_BYTES,
            });
        }
        tracing::info!(
            device = %file.device.name(),
            comm = %file.caller.comm,
            "wants to write {} bytes",
            count
        );

        let mut staged = Vec::new();
        staged
            .try_reserve_exact(count)
            .map_err(|_| DriverError::OutOfMemory)?;
        staged.resize(count, 0);

        input.copy_in(&mut staged).inspect_err(|_| {
            tracing::warn!(device = %file.device.name(), "copy from caller failed");
        })?;

        let result = Self::convert_token(file, &staged)?;
        let stats = self.ctx.commit_write(result);

        tracing::info!(
            device = %file.device.name(),
            reads = stats.reads,
            writes = stats.writes,
            "{} bytes written",
            count
        );
        Ok(count)
    }

    fn release(&self, file: &FileInfo) {
        tracing::info!(
            device = %file.device.name(),
            comm = %file.caller.comm,
            "closing \"{}\"",
            file.device.path()
        );
    }
}
