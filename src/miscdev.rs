//! In-process misc character devices
//!
//! A small registry that behaves like the kernel's misc-device layer:
//!
//! ```text
//!  MiscRegistry ──register()──▶ Registration<T> ──open()──▶ OpenFile<T>
//!   (major 10,                  (owns Arc<T>,              (read / write /
//!    minor map)                  node name + mode)          seek / close)
//! ```
//!
//! Drivers implement [`FileOperations`]; the registry routes every
//! open/read/write/release on the node to those hooks. Nodes are streams:
//! seeking always fails with [`DriverError::NotSeekable`].

use crate::error::{DriverError, Result};
use crate::user::{SliceReader, SliceWriter, UserSliceReader, UserSliceWriter};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Major number shared by every misc device
pub const MISC_MAJOR: u32 = 10;

/// Dynamic minors are handed out from the top of this range downward
pub const DYNAMIC_MINORS: u8 = 64;

/// Largest minor a device may request explicitly (255 means "dynamic")
pub const MAX_FIXED_MINOR: u8 = 254;

/// Task name length limit, including the terminator
const TASK_COMM_LEN: usize = 16;

/// Identity of the task issuing a file operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub pid: u32,
    pub uid: u32,
    pub comm: String,
}

impl Caller {
    pub fn new(pid: u32, uid: u32, comm: &str) -> Self {
        let comm = comm.chars().take(TASK_COMM_LEN - 1).collect();
        Self { pid, uid, comm }
    }

    /// The current process
    pub fn current() -> Self {
        let comm = std::env::args_os()
            .next()
            .and_then(|arg0| {
                std::path::Path::new(&arg0)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let uid = nix::unistd::getuid().as_raw();
        Self::new(std::process::id(), uid, &comm)
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

/// Requested access mode for an open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }

    /// `open(2)` flag bits for this mode
    pub fn flags(self) -> i32 {
        match self {
            AccessMode::ReadOnly => libc::O_RDONLY,
            AccessMode::WriteOnly => libc::O_WRONLY,
            AccessMode::ReadWrite => libc::O_RDWR,
        }
    }
}

/// Registration request for a misc device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiscDeviceOptions {
    /// Node name under `/dev`
    pub name: String,
    /// Permission bits of the node
    pub mode: u32,
    /// Fixed minor, or `None` for a dynamically assigned one
    pub minor: Option<u8>,
}

/// Name and numbers of a registered node, handed to file operations for
/// diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    name: String,
    minor: u8,
}

impl DeviceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    pub fn major(&self) -> u32 {
        MISC_MAJOR
    }

    pub fn path(&self) -> String {
        format!("/dev/{}", self.name)
    }
}

/// Everything a file operation knows about the handle it runs on
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub device: DeviceHandle,
    pub caller: Caller,
    pub access: AccessMode,
}

/// Hooks a misc device driver provides.
///
/// All hooks take `&self`: one instance serves every open file, so any state
/// it keeps is shared across callers.
pub trait FileOperations: Send + Sync {
    fn open(&self, file: &FileInfo) -> Result<()>;

    /// Copy data to the caller, returning the number of bytes transferred
    fn read(&self, file: &FileInfo, out: &mut dyn UserSliceWriter) -> Result<usize>;

    /// Consume data from the caller, returning the number of bytes accepted
    fn write(&self, file: &FileInfo, input: &mut dyn UserSliceReader) -> Result<usize>;

    fn release(&self, file: &FileInfo);
}

/// Registry of misc devices and their minors
#[derive(Debug, Default)]
pub struct MiscRegistry {
    minors: Mutex<BTreeMap<u8, String>>,
}

impl MiscRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `fops` under a new node.
    ///
    /// The node stays registered until the returned [`Registration`] is
    /// dropped.
    pub fn register<T: FileOperations>(
        self: &Arc<Self>,
        options: MiscDeviceOptions,
        fops: T,
    ) -> Result<Registration<T>> {
        let minor = {
            let mut minors = self.minors.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some((&minor, name)) = minors.iter().find(|(_, name)| **name == options.name) {
                return Err(DriverError::Busy {
                    name: name.clone(),
                    minor,
                });
            }

            let minor = match options.minor {
                Some(minor) if minors.contains_key(&minor) => {
                    return Err(DriverError::Busy {
                        name: options.name,
                        minor,
                    });
                }
                Some(minor) => minor,
                None => (0..DYNAMIC_MINORS)
                    .rev()
                    .find(|m| !minors.contains_key(m))
                    .ok_or(DriverError::NoFreeMinor)?,
            };

            minors.insert(minor, options.name.clone());
            minor
        };

        tracing::debug!(
            name = %options.name,
            major = MISC_MAJOR,
            minor,
            mode = %format!("{:#o}", options.mode),
            "misc device registered"
        );

        Ok(Registration {
            registry: Arc::clone(self),
            device: DeviceHandle {
                name: options.name,
                minor,
            },
            mode: options.mode,
            fops: Arc::new(fops),
        })
    }

    /// Minor currently held by `name`
    pub fn lookup(&self, name: &str) -> Option<u8> {
        self.minors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&minor, _)| minor)
    }

    pub fn len(&self) -> usize {
        self.minors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deregister(&self, minor: u8) {
        self.minors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&minor);
    }
}

/// A live misc device node. Dropping it removes the node.
pub struct Registration<T: FileOperations> {
    registry: Arc<MiscRegistry>,
    device: DeviceHandle,
    mode: u32,
    fops: Arc<T>,
}

impl<T: FileOperations> Registration<T> {
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// The driver's file operations
    pub fn fops(&self) -> &T {
        &self.fops
    }

    /// Open the node on behalf of `caller`.
    ///
    /// Root bypasses the permission bits; everyone else is checked against
    /// the "other" bits of the node's mode.
    pub fn open(&self, caller: Caller, access: AccessMode) -> Result<OpenFile<T>> {
        if !caller.is_root() {
            let other = self.mode & 0o007;
            let denied = (access.readable() && other & 0o004 == 0)
                || (access.writable() && other & 0o002 == 0);
            if denied {
                tracing::warn!(
                    device = %self.device.name,
                    comm = %caller.comm,
                    uid = caller.uid,
                    "open denied by node mode {:#o}",
                    self.mode
                );
                return Err(DriverError::PermissionDenied {
                    path: self.device.path(),
                });
            }
        }

        let info = FileInfo {
            device: self.device.clone(),
            caller,
            access,
        };
        self.fops.open(&info)?;

        Ok(OpenFile {
            fops: Arc::clone(&self.fops),
            info,
            released: false,
        })
    }
}

impl<T: FileOperations> Drop for Registration<T> {
    fn drop(&mut self) {
        self.registry.deregister(self.device.minor);
        tracing::debug!(
            name = %self.device.name,
            minor = self.device.minor,
            "misc device deregistered"
        );
    }
}

impl<T: FileOperations> std::fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("device", &self.device)
            .field("mode", &format_args!("{:#o}", self.mode))
            .finish()
    }
}

/// An open file on a misc device node
pub struct OpenFile<T: FileOperations> {
    fops: Arc<T>,
    info: FileInfo,
    released: bool,
}

impl<T: FileOperations> std::fmt::Debug for OpenFile<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFile")
            .field("info", &self.info)
            .field("released", &self.released)
            .finish()
    }
}

impl<T: FileOperations> OpenFile<T> {
    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    /// Read into `buf`, returning the number of bytes transferred
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_into(&mut SliceWriter::new(buf))
    }

    pub fn read_into(&self, out: &mut dyn UserSliceWriter) -> Result<usize> {
        if !self.info.access.readable() {
            return Err(DriverError::BadFileMode("reading"));
        }
        self.fops.read(&self.info, out)
    }

    /// Write `data`, returning the number of bytes accepted
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.write_from(&mut SliceReader::new(data))
    }

    pub fn write_from(&self, input: &mut dyn UserSliceReader) -> Result<usize> {
        if !self.info.access.writable() {
            return Err(DriverError::BadFileMode("writing"));
        }
        self.fops.write(&self.info, input)
    }

    /// Misc nodes are opened non-seekable
    pub fn seek(&self, _offset: i64) -> Result<u64> {
        Err(DriverError::NotSeekable)
    }

    /// Release the file. Dropping the handle has the same effect.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.fops.release(&self.info);
        }
    }
}

impl<T: FileOperations> Drop for OpenFile<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the last write back on read and counts releases
    #[derive(Default)]
    struct Echo {
        last: Mutex<Vec<u8>>,
        releases: AtomicUsize,
    }

    impl FileOperations for Echo {
        fn open(&self, _file: &FileInfo) -> Result<()> {
            Ok(())
        }

        fn read(&self, _file: &FileInfo, out: &mut dyn UserSliceWriter) -> Result<usize> {
            let last = self.last.lock().unwrap();
            out.copy_out(&last)?;
            Ok(last.len())
        }

        fn write(&self, _file: &FileInfo, input: &mut dyn UserSliceReader) -> Result<usize> {
            let mut buf = vec![0; input.len()];
            input.copy_in(&mut buf)?;
            *self.last.lock().unwrap() = buf;
            Ok(input.len())
        }

        fn release(&self, _file: &FileInfo) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn options(name: &str, minor: Option<u8>) -> MiscDeviceOptions {
        MiscDeviceOptions {
            name: name.to_string(),
            mode: 0o666,
            minor,
        }
    }

    fn user() -> Caller {
        Caller::new(1000, 1000, "tester")
    }

    #[test]
    fn test_dynamic_minor_allocated_from_top() {
        let registry = MiscRegistry::new();
        let a = registry.register(options("a", None), Echo::default()).unwrap();
        let b = registry.register(options("b", None), Echo::default()).unwrap();
        assert_eq!(a.device().minor(), DYNAMIC_MINORS - 1);
        assert_eq!(b.device().minor(), DYNAMIC_MINORS - 2);
        assert_eq!(a.device().major(), MISC_MAJOR);
        assert_eq!(a.device().path(), "/dev/a");
    }

    #[test]
    fn test_duplicate_name_or_minor_is_busy() {
        let registry = MiscRegistry::new();
        let _a = registry
            .register(options("a", Some(42)), Echo::default())
            .unwrap();

        let err = registry
            .register(options("a", None), Echo::default())
            .unwrap_err();
        assert!(matches!(err, DriverError::Busy { minor: 42, .. }));

        let err = registry
            .register(options("b", Some(42)), Echo::default())
            .unwrap_err();
        assert!(matches!(err, DriverError::Busy { minor: 42, .. }));
    }

    #[test]
    fn test_drop_deregisters() {
        let registry = MiscRegistry::new();
        let reg = registry.register(options("a", None), Echo::default()).unwrap();
        assert_eq!(registry.lookup("a"), Some(DYNAMIC_MINORS - 1));
        drop(reg);
        assert!(registry.is_empty());
        assert_eq!(registry.lookup("a"), None);
    }

    #[test]
    fn test_dynamic_minors_exhausted() {
        let registry = MiscRegistry::new();
        let regs: Vec<_> = (0..DYNAMIC_MINORS)
            .map(|i| {
                registry
                    .register(options(&format!("dev{i}"), None), Echo::default())
                    .unwrap()
            })
            .collect();
        assert_eq!(regs.len(), DYNAMIC_MINORS as usize);

        let err = registry
            .register(options("one-too-many", None), Echo::default())
            .unwrap_err();
        assert_eq!(err, DriverError::NoFreeMinor);
    }

    #[test]
    fn test_open_read_write_through_hooks() {
        let registry = MiscRegistry::new();
        let reg = registry.register(options("echo", None), Echo::default()).unwrap();
        let file = reg.open(user(), AccessMode::ReadWrite).unwrap();
        assert_eq!(file.info().device, *reg.device());
        assert_eq!(file.info().caller.comm, "tester");
        assert_eq!(file.info().access, AccessMode::ReadWrite);

        assert_eq!(file.write(b"hey").unwrap(), 3);
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"hey");
    }

    #[test]
    fn test_access_mode_enforced_on_handle() {
        let registry = MiscRegistry::new();
        let reg = registry.register(options("echo", None), Echo::default()).unwrap();

        let ro = reg.open(user(), AccessMode::ReadOnly).unwrap();
        assert_eq!(ro.write(b"x"), Err(DriverError::BadFileMode("writing")));

        let wo = reg.open(user(), AccessMode::WriteOnly).unwrap();
        assert_eq!(
            wo.read(&mut [0u8; 4]),
            Err(DriverError::BadFileMode("reading"))
        );
    }

    #[test]
    fn test_mode_bits_checked_for_non_root() {
        let registry = MiscRegistry::new();
        let reg = registry
            .register(
                MiscDeviceOptions {
                    name: "ro".to_string(),
                    mode: 0o644,
                    minor: None,
                },
                Echo::default(),
            )
            .unwrap();
        assert_eq!(reg.mode(), 0o644);

        assert!(reg.open(user(), AccessMode::ReadOnly).is_ok());
        let err = reg.open(user(), AccessMode::ReadWrite).unwrap_err();
        assert_eq!(err.errno(), libc::EACCES);

        let root = Caller::new(1, 0, "init");
        assert!(reg.open(root, AccessMode::ReadWrite).is_ok());
    }

    #[test]
    fn test_seek_not_supported() {
        let registry = MiscRegistry::new();
        let reg = registry.register(options("echo", None), Echo::default()).unwrap();
        let file = reg.open(user(), AccessMode::ReadOnly).unwrap();
        assert_eq!(file.seek(0), Err(DriverError::NotSeekable));
    }

    #[test]
    fn test_release_runs_once() {
        let registry = MiscRegistry::new();
        let reg = registry.register(options("echo", None), Echo::default()).unwrap();

        let file = reg.open(user(), AccessMode::ReadOnly).unwrap();
        file.close();
        assert_eq!(reg.fops().releases.load(Ordering::SeqCst), 1);

        {
            let _file = reg.open(user(), AccessMode::ReadOnly).unwrap();
        }
        assert_eq!(reg.fops().releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_current_caller() {
        let caller = Caller::current();
        assert_eq!(caller.pid, std::process::id());
        assert_eq!(caller.uid, nix::unistd::getuid().as_raw());
        assert!(caller.comm.chars().count() < TASK_COMM_LEN);
    }

    #[test]
    fn test_caller_comm_truncated() {
        let caller = Caller::new(1, 1, "a-very-long-process-name");
        assert_eq!(caller.comm.len(), TASK_COMM_LEN - 1);
        assert_eq!(caller.comm, "a-very-long-pro");
    }

    #[test]
    fn test_access_mode_flags() {
        assert_eq!(AccessMode::ReadOnly.flags(), libc::O_RDONLY);
        assert_eq!(AccessMode::ReadWrite.flags(), libc::O_RDWR);
        assert!(AccessMode::ReadWrite.readable() && AccessMode::ReadWrite.writable());
        assert!(!AccessMode::WriteOnly.readable());
    }
}
