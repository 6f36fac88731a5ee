use std::ffi::{CStr, CString};
use std::os::fd::RawFd;
use std::sync::Arc;

use crate::driver::I2cDriver;
use crate::error::{Error, Result};

/// Owner of one open bus descriptor.
///
/// The descriptor is closed exactly once: by [`release`](Self::release) or,
/// failing that, when the handle is dropped. Releasing an already released
/// handle does nothing. The descriptor itself is never handed out beyond
/// the duration of a driver call, and releasing needs `&mut self`, so it
/// cannot be closed under a transfer in flight.
pub struct BusHandle<D: I2cDriver> {
    fd: Option<RawFd>,
    path: CString,
    driver: Arc<D>,
}

impl<D: I2cDriver> BusHandle<D> {
    /// Open the bus at `path`. Only called by `BusManager`.
    pub(crate) fn open(driver: Arc<D>, path: CString) -> Result<Self> {
        let fd = driver.open(&path).map_err(Error::BusOpenFailed)?;
        tracing::debug!(path = ?path, fd, "opened i2c bus");
        Ok(Self { fd: Some(fd), path, driver })
    }

    /// The live descriptor, or `InvalidHandle` once released.
    pub(crate) fn fd(&self) -> Result<RawFd> {
        self.fd.ok_or(Error::InvalidHandle)
    }

    pub(crate) fn driver(&self) -> &D {
        &self.driver
    }

    pub fn path(&self) -> &CStr {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Close the descriptor now.
    ///
    /// Only the first call reaches the driver; later calls return `Ok(())`.
    pub fn release(&mut self) -> Result<()> {
        let Some(fd) = self.fd.take() else {
            return Ok(());
        };
        tracing::debug!(path = ?self.path, fd, "closing i2c bus");
        self.driver.close(fd).map_err(Error::CloseFailed)
    }
}

impl<D: I2cDriver> Drop for BusHandle<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(path = ?self.path, "{e}");
        }
    }
}

impl<D: I2cDriver> core::fmt::Debug for BusHandle<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusHandle")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}
