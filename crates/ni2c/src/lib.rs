//! Native I2C bus access for managed host runtimes.
//!
//! A [`BusManager`] registers and opens buses through an [`I2cDriver`].
//! Each open bus is a [`BusHandle`] that owns its descriptor and closes it
//! exactly once, at the latest when the handle is dropped. [`transfer`]
//! runs an ordered list of read and write messages as a single combined
//! driver call and returns one [`Response`] per message, in order.
//!
//! [`DevI2c`] drives Linux style `i2c-dev` device nodes; tests substitute
//! their own driver.

pub mod cli;
pub mod config;
mod driver;
mod error;
mod handle;
mod i2c_dev;
mod manager;
mod message;
pub mod system;
mod transfer;

pub use config::{BusConfig, Config};
pub use driver::{I2cDriver, KernelMsg};
pub use error::{
    Error, ErrorKind, MessageField, OsError, PwriteStage, Result, TimeField,
};
pub use handle::BusHandle;
pub use i2c_dev::{DevI2c, I2C_RDWR};
pub use manager::BusManager;
pub use message::{
    Message, MessageFlags, Operation, Payload, RawMessage, Response,
};
pub use transfer::transfer;
