//! The seam between this crate and the operating system's I2C driver.

use core::marker::PhantomData;
use std::ffi::CStr;
use std::os::fd::RawFd;

use crate::error::OsError;
use crate::message::MessageFlags;

/// Operating system services needed to manage and drive an I2C bus.
///
/// Implementations must be callable from any thread. Nothing here is
/// serialized: two transfers on the same descriptor may reach the driver
/// concurrently, and ordering between them is up to the OS.
pub trait I2cDriver: Send + Sync {
    /// Make the bus controller at `bus_path` reachable under `alias`.
    fn register_bus(&self, bus_path: &CStr, alias: &CStr) -> Result<(), OsError>;

    /// Open the bus device for reading and writing.
    fn open(&self, bus_path: &CStr) -> Result<RawFd, OsError>;

    fn close(&self, fd: RawFd) -> Result<(), OsError>;

    /// Execute `msgs` as one combined transfer.
    ///
    /// Either every message completes or the call fails as a whole. Read
    /// messages are filled in place.
    fn rdwr(&self, fd: RawFd, msgs: &mut [KernelMsg<'_>]) -> Result<(), OsError>;
}

/// One segment of a combined transfer, laid out as the kernel's `i2c_msg`.
///
/// The message borrows its data buffer for `'a`: shared for a write,
/// exclusive for a read, so the buffer cannot move, be freed or be touched
/// by anyone else while the driver holds it.
#[repr(C)]
pub struct KernelMsg<'a> {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
    _buf: PhantomData<&'a mut [u8]>,
}

impl<'a> KernelMsg<'a> {
    /// A message sending `data`. The read flag is cleared.
    ///
    /// `None` if `data` is longer than `u16::MAX`.
    pub(crate) fn write(
        addr: u16,
        flags: MessageFlags,
        data: &'a [u8],
    ) -> Option<Self> {
        Some(Self {
            addr,
            flags: flags.difference(MessageFlags::RD).bits(),
            len: u16::try_from(data.len()).ok()?,
            // The driver only reads through this pointer, RD is not set.
            buf: data.as_ptr().cast_mut(),
            _buf: PhantomData,
        })
    }

    /// A message receiving into `buf`. The read flag is set.
    ///
    /// `None` if `buf` is longer than `u16::MAX`.
    pub(crate) fn read(
        addr: u16,
        flags: MessageFlags,
        buf: &'a mut [u8],
    ) -> Option<Self> {
        Some(Self {
            addr,
            flags: flags.union(MessageFlags::RD).bits(),
            len: u16::try_from(buf.len()).ok()?,
            buf: buf.as_mut_ptr(),
            _buf: PhantomData,
        })
    }

    pub fn addr(&self) -> u16 {
        self.addr
    }

    pub fn flags(&self) -> MessageFlags {
        MessageFlags::from_bits_retain(self.flags)
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_read(&self) -> bool {
        self.flags().is_read()
    }

    /// The message buffer: outgoing bytes for a write, the receive area for
    /// a read.
    pub fn data(&self) -> &[u8] {
        // SAFETY: `buf` came from a slice of exactly `len` bytes that stays
        // borrowed for 'a, which outlives `&self`.
        unsafe { core::slice::from_raw_parts(self.buf, self.len()) }
    }

    /// Mutable access to the receive buffer. `None` for writes.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        if !self.is_read() {
            return None;
        }
        // SAFETY: RD is only ever set by `read`, which took the buffer
        // exclusively for 'a. `&mut self` keeps this access unique.
        Some(unsafe { core::slice::from_raw_parts_mut(self.buf, self.len()) })
    }
}

impl core::fmt::Debug for KernelMsg<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelMsg")
            .field("addr", &format_args!("{:#06x}", self.addr))
            .field("flags", &format_args!("{:#06x}", self.flags))
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_kernel_i2c_msg() {
        // addr, flags, len, padding, buf
        assert_eq!(
            core::mem::size_of::<KernelMsg<'_>>(),
            2 * core::mem::size_of::<*mut u8>()
        );
        assert_eq!(
            core::mem::align_of::<KernelMsg<'_>>(),
            core::mem::align_of::<*mut u8>()
        );
    }

    #[test]
    fn write_clears_and_read_sets_rd() {
        let data = [1, 2, 3];
        let flags = MessageFlags::RD | MessageFlags::STOP;
        let msg = KernelMsg::write(0x50, flags, &data).unwrap();
        assert!(!msg.is_read());
        assert_eq!(msg.flags(), MessageFlags::STOP);
        assert_eq!(msg.data(), &data);

        let mut buf = [0u8; 2];
        let mut msg =
            KernelMsg::read(0x51, MessageFlags::empty(), &mut buf).unwrap();
        assert!(msg.is_read());
        msg.data_mut().unwrap().copy_from_slice(&[7, 8]);
        drop(msg);
        assert_eq!(buf, [7, 8]);
    }

    #[test]
    fn writes_have_no_mutable_view() {
        let data = [9];
        let mut msg =
            KernelMsg::write(0x50, MessageFlags::empty(), &data).unwrap();
        assert!(msg.data_mut().is_none());
    }

    #[test]
    fn oversized_buffers_are_refused() {
        let mut big = vec![0u8; usize::from(u16::MAX) + 1];
        assert!(KernelMsg::write(0x50, MessageFlags::empty(), &big).is_none());
        assert!(KernelMsg::read(0x50, MessageFlags::empty(), &mut big).is_none());

        let mut max = vec![0u8; usize::from(u16::MAX)];
        let msg = KernelMsg::read(0x50, MessageFlags::empty(), &mut max).unwrap();
        assert_eq!(msg.len(), usize::from(u16::MAX));
    }
}
