//! Integration tests for the conversion endpoint
//!
//! Exercises the device the way a user-space program would: register the
//! driver, open the node, write tokens, read results back.

use convertdrv::config::DriverConfig;
use convertdrv::context::ConversionStats;
use convertdrv::driver::ConvertDriver;
use convertdrv::error::{DriverError, ParseErrorKind};
use convertdrv::miscdev::{AccessMode, Caller, MiscRegistry};
use convertdrv::user::BadAddress;
use std::sync::Arc;

fn setup() -> (Arc<MiscRegistry>, ConvertDriver) {
    let registry = MiscRegistry::new();
    let driver = ConvertDriver::init(&registry, &DriverConfig::default()).unwrap();
    (registry, driver)
}

fn caller() -> Caller {
    Caller::new(1234, 1000, "cat")
}

/// Write `token` on one handle, read the result on a fresh one
fn convert(driver: &ConvertDriver, token: &[u8]) -> Result<String, DriverError> {
    let writer = driver.open(caller(), AccessMode::WriteOnly)?;
    writer.write(token)?;
    writer.close();

    let reader = driver.open(caller(), AccessMode::ReadOnly)?;
    let mut buf = [0u8; 32];
    let n = reader.read(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

#[test]
fn test_documented_examples() {
    let (_registry, driver) = setup();
    assert_eq!(convert(&driver, b"100F").unwrap(), "37");
    assert_eq!(convert(&driver, b"037C").unwrap(), "98");
}

#[test]
fn test_echo_style_writes() {
    // `echo 212F > /dev/convertdrv` sends a trailing newline
    let (_registry, driver) = setup();
    assert_eq!(convert(&driver, b"212F\n").unwrap(), "100");
    assert_eq!(convert(&driver, b"100C\n").unwrap(), "212");
    assert_eq!(convert(&driver, b"-40C\n").unwrap(), "-40");
}

#[test]
fn test_extreme_values_fit_result_buffer() {
    let (_registry, driver) = setup();
    assert_eq!(convert(&driver, b"999C").unwrap(), "1830");
    assert_eq!(convert(&driver, b"-99C").unwrap(), "-146");
    assert_eq!(convert(&driver, b"999F").unwrap(), "537");
    assert_eq!(convert(&driver, b"-99F").unwrap(), "-72");
}

#[test]
fn test_truncating_division() {
    let (_registry, driver) = setup();
    // (33 - 32) * 5 / 9 = 0.55.. -> 0
    assert_eq!(convert(&driver, b"033F").unwrap(), "0");
    // (0 - 32) * 5 / 9 = -17.7.. -> -17
    assert_eq!(convert(&driver, b"000F").unwrap(), "-17");
    // F -> C -> F does not come back to 100
    assert_eq!(convert(&driver, b"100F").unwrap(), "37");
    assert_eq!(convert(&driver, b"037C").unwrap(), "98");
}

#[test]
fn test_read_before_write_returns_placeholder() {
    let (_registry, driver) = setup();
    let file = driver.open(caller(), AccessMode::ReadOnly).unwrap();
    let mut buf = [0u8; 8];
    let n = file.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"None");
    assert_eq!(driver.stats(), ConversionStats { reads: 1, writes: 0 });
}

#[test]
fn test_repeated_reads_return_same_value() {
    let (_registry, driver) = setup();
    let file = driver.open(caller(), AccessMode::ReadWrite).unwrap();
    file.write(b"100F").unwrap();

    let mut buf = [0u8; 8];
    for _ in 0..3 {
        let n = file.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"37");
    }
    assert_eq!(driver.stats(), ConversionStats { reads: 3, writes: 1 });
}

#[test]
fn test_unrecognized_unit_is_not_an_error() {
    let (_registry, driver) = setup();
    let file = driver.open(caller(), AccessMode::ReadWrite).unwrap();
    assert_eq!(file.write(b"100K").unwrap(), 4);
    assert_eq!(driver.stats().writes, 1);

    let mut buf = [0u8; 8];
    let n = file.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"100");
}

#[test]
fn test_lowercase_unit_not_converted() {
    let (_registry, driver) = setup();
    assert_eq!(convert(&driver, b"100f").unwrap(), "100");
}

#[test]
fn test_unpadded_value_misses_unit() {
    // The unit is always read from offset 3, so "37C\n" puts '\n' there and
    // leaves "37C" as the prefix, which does not parse
    let (_registry, driver) = setup();
    let err = convert(&driver, b"37C\n").unwrap_err();
    assert_eq!(err, DriverError::ParseError(ParseErrorKind::Invalid));
    assert_eq!(driver.stats().writes, 0);
}

#[test]
fn test_non_numeric_prefix() {
    let (_registry, driver) = setup();
    let file = driver.open(caller(), AccessMode::WriteOnly).unwrap();
    let err = file.write(b"abcF").unwrap_err();
    assert_eq!(err, DriverError::ParseError(ParseErrorKind::Invalid));
    assert_eq!(err.errno(), libc::EINVAL);
    assert_eq!(driver.stats().writes, 0);
    assert_eq!(driver.context().last_result().as_bytes(), b"None");
}

#[test]
fn test_input_too_large() {
    let (_registry, driver) = setup();
    let file = driver.open(caller(), AccessMode::WriteOnly).unwrap();
    let err = file.write(b"1000F\n").unwrap_err();
    assert_eq!(err, DriverError::InputTooLarge { len: 6, max: 5 });
    assert_eq!(driver.stats(), ConversionStats::default());
    assert_eq!(driver.context().last_result().as_bytes(), b"None");
}

#[test]
fn test_five_bytes_is_the_limit() {
    let (_registry, driver) = setup();
    let file = driver.open(caller(), AccessMode::WriteOnly).unwrap();
    assert_eq!(file.write(b"100FX").unwrap(), 5);
    assert_eq!(driver.context().last_result().as_bytes(), b"37");
}

#[test]
fn test_copy_faults_leave_state_untouched() {
    let (_registry, driver) = setup();
    let file = driver.open(caller(), AccessMode::ReadWrite).unwrap();
    file.write(b"100F").unwrap();

    let err = file.write_from(&mut BadAddress { len: 4 }).unwrap_err();
    assert_eq!(err.errno(), libc::EFAULT);
    let err = file.read_into(&mut BadAddress { len: 8 }).unwrap_err();
    assert_eq!(err.errno(), libc::EFAULT);

    assert_eq!(driver.stats(), ConversionStats { reads: 0, writes: 1 });
    assert_eq!(driver.context().last_result().as_bytes(), b"37");
}

#[test]
fn test_seek_is_rejected() {
    let (_registry, driver) = setup();
    let file = driver.open(caller(), AccessMode::ReadWrite).unwrap();
    let err = file.seek(2).unwrap_err();
    assert_eq!(err, DriverError::NotSeekable);
    assert_eq!(err.errno(), libc::ESPIPE);
}

#[test]
fn test_last_writer_wins_across_handles() {
    let (_registry, driver) = setup();
    let a = driver.open(caller(), AccessMode::ReadWrite).unwrap();
    let b = driver.open(Caller::new(99, 1001, "other"), AccessMode::ReadWrite).unwrap();

    a.write(b"100F").unwrap();
    b.write(b"037C").unwrap();

    let mut buf = [0u8; 8];
    let n = a.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"98");
}
