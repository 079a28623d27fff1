//! convertdrv - Temperature conversion misc character device
//!
//! A single device node accepts a fixed-width token such as `"100F"` or
//! `"037C"`, converts the value to the other scale with integer arithmetic,
//! and hands the decimal result back to later readers. All open files share
//! one [`context::ConversionContext`] guarded by a mutex.
//!
//! ```
//! use convertdrv::config::DriverConfig;
//! use convertdrv::driver::ConvertDriver;
//! use convertdrv::miscdev::{AccessMode, Caller, MiscRegistry};
//!
//! let registry = MiscRegistry::new();
//! let driver = ConvertDriver::init(&registry, &DriverConfig::default()).unwrap();
//! let file = driver.open(Caller::new(1, 1000, "doc"), AccessMode::ReadWrite).unwrap();
//!
//! file.write(b"100F").unwrap();
//! let mut buf = [0u8; 8];
//! let n = file.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"37");
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod convert;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod miscdev;
pub mod token;
pub mod user;
