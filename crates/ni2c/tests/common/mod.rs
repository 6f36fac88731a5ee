#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::os::fd::RawFd;
use std::sync::Mutex;

use ni2c::{BusManager, I2cDriver, KernelMsg, MessageFlags, OsError};
use nix::errno::Errno;

// ---------------------------------------------------------------------------
// Fake driver
// ---------------------------------------------------------------------------

/// What the driver saw of one message in a combined transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Logged {
    Write { addr: u16, flags: MessageFlags, data: Vec<u8> },
    Read { addr: u16, flags: MessageFlags, len: usize },
}

#[derive(Default)]
struct State {
    next_fd: RawFd,
    open: HashSet<RawFd>,
    opened: Vec<String>,
    closes: HashMap<RawFd, usize>,
    bad_closes: usize,
    registered: Vec<(String, String)>,
    transfers: Vec<Vec<Logged>>,
}

/// Records every call; fills reads with `fill`; fails on request.
pub struct FakeDriver {
    state: Mutex<State>,
    fill: u8,
    fail_open: Option<Errno>,
    fail_register: Option<Errno>,
    fail_rdwr: Option<Errno>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self {
            state: Mutex::new(State { next_fd: 3, ..State::default() }),
            fill: 0xAA,
            fail_open: None,
            fail_register: None,
            fail_rdwr: None,
        }
    }
}

impl FakeDriver {
    pub fn with_fill(mut self, fill: u8) -> Self {
        self.fill = fill;
        self
    }

    pub fn failing_open(mut self, errno: Errno) -> Self {
        self.fail_open = Some(errno);
        self
    }

    pub fn failing_register(mut self, errno: Errno) -> Self {
        self.fail_register = Some(errno);
        self
    }

    pub fn failing_rdwr(mut self, errno: Errno) -> Self {
        self.fail_rdwr = Some(errno);
        self
    }

    /// Combined transfers seen so far, each as its list of messages.
    pub fn transfers(&self) -> Vec<Vec<Logged>> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn rdwr_calls(&self) -> usize {
        self.state.lock().unwrap().transfers.len()
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn open_fds(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    pub fn close_count(&self, fd: RawFd) -> usize {
        self.state.lock().unwrap().closes.get(&fd).copied().unwrap_or(0)
    }

    /// Closes of descriptors that were not open.
    pub fn bad_closes(&self) -> usize {
        self.state.lock().unwrap().bad_closes
    }

    pub fn registered(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().registered.clone()
    }
}

fn lossy(s: &CStr) -> String {
    s.to_string_lossy().into_owned()
}

impl I2cDriver for FakeDriver {
    fn register_bus(&self, bus_path: &CStr, alias: &CStr) -> Result<(), OsError> {
        if let Some(errno) = self.fail_register {
            return Err(errno.into());
        }
        self.state
            .lock()
            .unwrap()
            .registered
            .push((lossy(bus_path), lossy(alias)));
        Ok(())
    }

    fn open(&self, bus_path: &CStr) -> Result<RawFd, OsError> {
        if let Some(errno) = self.fail_open {
            return Err(errno.into());
        }
        let mut state = self.state.lock().unwrap();
        let fd = state.next_fd;
        state.next_fd += 1;
        state.open.insert(fd);
        state.opened.push(lossy(bus_path));
        Ok(fd)
    }

    fn close(&self, fd: RawFd) -> Result<(), OsError> {
        let mut state = self.state.lock().unwrap();
        *state.closes.entry(fd).or_default() += 1;
        if state.open.remove(&fd) {
            Ok(())
        } else {
            state.bad_closes += 1;
            Err(Errno::EBADF.into())
        }
    }

    fn rdwr(&self, fd: RawFd, msgs: &mut [KernelMsg<'_>]) -> Result<(), OsError> {
        let mut state = self.state.lock().unwrap();
        if !state.open.contains(&fd) {
            return Err(Errno::EBADF.into());
        }

        let log = msgs
            .iter()
            .map(|m| {
                if m.is_read() {
                    Logged::Read { addr: m.addr(), flags: m.flags(), len: m.len() }
                } else {
                    Logged::Write {
                        addr: m.addr(),
                        flags: m.flags(),
                        data: m.data().to_vec(),
                    }
                }
            })
            .collect();
        state.transfers.push(log);

        if let Some(errno) = self.fail_rdwr {
            return Err(errno.into());
        }
        for msg in msgs.iter_mut() {
            if let Some(buf) = msg.data_mut() {
                buf.fill(self.fill);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn manager() -> BusManager<FakeDriver> {
    BusManager::new(FakeDriver::default())
}

pub fn manager_with(driver: FakeDriver) -> BusManager<FakeDriver> {
    BusManager::new(driver)
}
