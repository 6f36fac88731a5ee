//! [`I2cDriver`] backed by an `i2c-dev` style character device.

use std::ffi::{CStr, OsStr};
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::unistd;

use crate::driver::{I2cDriver, KernelMsg};
use crate::error::OsError;

/// `ioctl` request for a combined read/write transfer.
pub const I2C_RDWR: u32 = 0x0707;

/// Kernel `struct i2c_rdwr_ioctl_data`.
#[repr(C)]
struct RdwrIoctlData {
    msgs: *mut libc::c_void,
    nmsgs: u32,
}

nix::ioctl_write_ptr_bad!(i2c_rdwr, I2C_RDWR, RdwrIoctlData);

/// Driver for buses exposed as device nodes, e.g. `/dev/i2c-1`.
///
/// Registration publishes the bus under its alias as a symbolic link, so
/// that `open(alias)` reaches the registered bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevI2c;

fn as_path(path: &CStr) -> &Path {
    Path::new(OsStr::from_bytes(path.to_bytes()))
}

impl I2cDriver for DevI2c {
    fn register_bus(&self, bus_path: &CStr, alias: &CStr) -> Result<(), OsError> {
        std::os::unix::fs::symlink(as_path(bus_path), as_path(alias))?;
        Ok(())
    }

    fn open(&self, bus_path: &CStr) -> Result<RawFd, OsError> {
        let fd =
            fcntl::open(bus_path, OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty())?;
        Ok(fd)
    }

    fn close(&self, fd: RawFd) -> Result<(), OsError> {
        unistd::close(fd)?;
        Ok(())
    }

    fn rdwr(&self, fd: RawFd, msgs: &mut [KernelMsg<'_>]) -> Result<(), OsError> {
        let nmsgs = u32::try_from(msgs.len()).map_err(|_| Errno::EINVAL)?;
        let data = RdwrIoctlData { msgs: msgs.as_mut_ptr().cast(), nmsgs };
        // SAFETY: `KernelMsg` is layout compatible with `i2c_msg`, and each
        // message borrows a live buffer of its stated length for the whole
        // call. `msgs` is exclusively borrowed, so nothing else observes the
        // buffers the kernel fills.
        unsafe { i2c_rdwr(fd, &data) }?;
        Ok(())
    }
}
