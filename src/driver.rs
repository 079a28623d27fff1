//! Driver init and teardown
//!
//! [`ConvertDriver::init`] registers the node and creates the one
//! [`ConversionContext`] all its open files share; dropping the driver
//! removes the node again.

use crate::config::DriverConfig;
use crate::context::{ConversionContext, ConversionStats};
use crate::endpoint::ConversionEndpoint;
use crate::error::{DriverError, Result};
use crate::miscdev::{AccessMode, Caller, DeviceHandle, MiscRegistry, OpenFile, Registration};
use std::sync::Arc;

/// A registered temperature conversion device
#[derive(Debug)]
pub struct ConvertDriver {
    registration: Registration<ConversionEndpoint>,
    ctx: Arc<ConversionContext>,
}

impl ConvertDriver {
    /// Register the node described by `config` in `registry`
    pub fn init(registry: &Arc<MiscRegistry>, config: &DriverConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DriverError::InvalidConfig(e.to_string()))?;
        let placeholder = config.placeholder().ok_or_else(|| {
            DriverError::InvalidConfig("placeholder does not fit the result buffer".to_string())
        })?;

        let ctx = Arc::new(ConversionContext::new(placeholder));
        let registration = registry
            .register(config.misc_options(), ConversionEndpoint::new(Arc::clone(&ctx)))
            .inspect_err(|e| {
                tracing::warn!("misc device registration failed, aborting: {}", e);
            })?;

        let device = registration.device();
        tracing::info!(
            "temperature converter misc driver (major # {}) registered, minor# = {}, dev node is {}",
            device.major(),
            device.minor(),
            device.path()
        );

        Ok(Self {
            registration,
            ctx,
        })
    }

    pub fn device(&self) -> &DeviceHandle {
        self.registration.device()
    }

    pub fn context(&self) -> &Arc<ConversionContext> {
        &self.ctx
    }

    pub fn stats(&self) -> ConversionStats {
        self.ctx.stats()
    }

    /// Open the node
    pub fn open(&self, caller: Caller, access: AccessMode) -> Result<OpenFile<ConversionEndpoint>> {
        self.registration.open(caller, access)
    }
}

impl Drop for ConvertDriver {
    fn drop(&mut self) {
        // The node itself goes away when `registration` is dropped right after
        tracing::info!(
            device = %self.registration.device().name(),
            "deregistering temperature converter driver"
        );
    }
}
