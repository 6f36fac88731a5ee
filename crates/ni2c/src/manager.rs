use std::ffi::CString;
use std::sync::Arc;

use crate::driver::I2cDriver;
use crate::error::{Error, Result};
use crate::handle::BusHandle;
use crate::message::{RawMessage, Response};

/// Entry point for bus registration, opening and transfers.
///
/// Cheap to clone; every clone and every handle it opens share the driver.
pub struct BusManager<D: I2cDriver> {
    driver: Arc<D>,
}

impl<D: I2cDriver> Clone for BusManager<D> {
    fn clone(&self) -> Self {
        Self { driver: self.driver.clone() }
    }
}

impl<D: I2cDriver> BusManager<D> {
    pub fn new(driver: D) -> Self {
        Self { driver: Arc::new(driver) }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Register the bus controller at `bus_path` under `alias`.
    ///
    /// This changes OS-wide state and is not undone by anything here.
    pub fn register_bus(&self, bus_path: &[u8], alias: &[u8]) -> Result<()> {
        let bus_path = CString::new(bus_path).map_err(|_| Error::InvalidBus)?;
        let alias = CString::new(alias).map_err(|_| Error::InvalidAlias)?;

        self.driver
            .register_bus(&bus_path, &alias)
            .map_err(Error::RegisterFailed)?;
        tracing::info!(bus = ?bus_path, alias = ?alias, "registered i2c bus");
        Ok(())
    }

    /// Open the bus at `bus_path`. The returned handle owns the descriptor.
    pub fn open(&self, bus_path: &[u8]) -> Result<BusHandle<D>> {
        let path = CString::new(bus_path).map_err(|_| Error::InvalidBus)?;
        BusHandle::open(self.driver.clone(), path)
    }

    /// See [`transfer`](crate::transfer::transfer).
    pub fn transfer(
        &self,
        handle: &BusHandle<D>,
        messages: &[RawMessage<'_>],
    ) -> Result<Vec<Response>> {
        crate::transfer::transfer(handle, messages)
    }
}
