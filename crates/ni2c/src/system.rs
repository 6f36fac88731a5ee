//! Clock, mount, raw device and shell helpers that ship alongside the bus
//! layer. Each one is a thin wrapper around a single OS facility.

use std::ffi::{CString, OsStr};
use std::fs::OpenOptions;
use std::os::fd::IntoRawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::Command;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use nix::time::{clock_gettime, clock_settime, ClockId};
use nix::sys::time::TimeSpec;
use nix::unistd::{self, SysconfVar};
use serde::{Deserialize, Serialize};

use crate::error::{Error, OsError, PwriteStage, Result, TimeField};

/// Tick rate assumed when the OS does not report one.
const DEFAULT_TICKS_PER_SECOND: i64 = 100;

/// Longest accepted shell command line, in bytes.
pub const MAX_COMMAND_LEN: usize = 254;
pub const MAX_SHELL_ARGS: usize = 128;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Calendar time split the way the RTOS clock API expects it.
///
/// `ticks` counts clock ticks elapsed within the current second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub ticks: u32,
}

impl TimeOfDay {
    fn from_datetime(dt: NaiveDateTime, ticks_per_second: i64) -> Self {
        let nanos = i64::from(dt.nanosecond() % 1_000_000_000);
        Self {
            year: u32::try_from(dt.year()).unwrap_or(0),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            ticks: u32::try_from(nanos * ticks_per_second / NANOS_PER_SECOND)
                .unwrap_or(0),
        }
    }

    /// Check every field and convert to a UTC date-time.
    ///
    /// The year must be after 1987. Fields are checked from year down to
    /// ticks and the first failure is reported.
    pub fn to_datetime(&self, ticks_per_second: i64) -> Result<NaiveDateTime> {
        let year = i32::try_from(self.year)
            .ok()
            .filter(|y| *y > 1987)
            .ok_or(Error::InvalidTime(TimeField::Year))?;
        if !(1..=12).contains(&self.month) {
            return Err(Error::InvalidTime(TimeField::Month));
        }
        let date = NaiveDate::from_ymd_opt(year, self.month, self.day)
            .ok_or(Error::InvalidTime(TimeField::Day))?;
        if self.hour > 23 {
            return Err(Error::InvalidTime(TimeField::Hour));
        }
        if self.minute > 59 {
            return Err(Error::InvalidTime(TimeField::Minute));
        }
        if self.second > 59 {
            return Err(Error::InvalidTime(TimeField::Second));
        }
        if i64::from(self.ticks) >= ticks_per_second {
            return Err(Error::InvalidTime(TimeField::Ticks));
        }

        let nanos = i64::from(self.ticks) * NANOS_PER_SECOND / ticks_per_second;
        date.and_hms_nano_opt(
            self.hour,
            self.minute,
            self.second,
            u32::try_from(nanos)
                .map_err(|_| Error::InvalidTime(TimeField::Ticks))?,
        )
        .ok_or(Error::InvalidTime(TimeField::Second))
    }
}

pub fn clock_ticks_per_second() -> i64 {
    match unistd::sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(ticks)) if ticks > 0 => i64::from(ticks),
        _ => DEFAULT_TICKS_PER_SECOND,
    }
}

/// Ticks elapsed on the monotonic clock.
pub fn clock_ticks_since_boot() -> Result<i64> {
    let now = clock_gettime(ClockId::CLOCK_MONOTONIC)
        .map_err(|e| Error::ClockGetFailed(e.into()))?;
    let tps = clock_ticks_per_second();
    let (sec, nsec) = (i64::from(now.tv_sec()), i64::from(now.tv_nsec()));
    Ok(sec * tps + nsec * tps / NANOS_PER_SECOND)
}

/// Current wall-clock time in UTC.
pub fn clock_get_tod() -> TimeOfDay {
    TimeOfDay::from_datetime(Utc::now().naive_utc(), clock_ticks_per_second())
}

/// Set the wall clock. Needs the privilege to change system time.
pub fn clock_set(tod: &TimeOfDay) -> Result<()> {
    let dt = tod.to_datetime(clock_ticks_per_second())?.and_utc();
    let ts =
        TimeSpec::new(dt.timestamp() as _, dt.timestamp_subsec_nanos() as _);
    clock_settime(ClockId::CLOCK_REALTIME, ts)
        .map_err(|e| Error::ClockSetFailed(e.into()))?;
    tracing::info!(time = %dt, "system clock set");
    Ok(())
}

/// Unmount the filesystem mounted at `path`.
pub fn unmount(path: &[u8]) -> Result<()> {
    let path = CString::new(path).map_err(|_| Error::InvalidPath)?;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    let res = nix::mount::umount(path.as_c_str());
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let res = nix::mount::unmount(path.as_c_str(), nix::mount::MntFlags::empty());

    res.map_err(|e| Error::UnmountFailed(e.into()))
}

/// Write `data` at byte `offset` of the device or file at `path`.
///
/// Opens, writes and closes; each failure names the step. Returns the
/// number of bytes written.
pub fn pwrite(path: &[u8], data: &[u8], offset: i64) -> Result<usize> {
    let offset = u64::try_from(offset).map_err(|_| Error::InvalidOffset)?;
    if path.contains(&0) {
        return Err(Error::InvalidPath);
    }
    let stage = |stage| {
        move |e: std::io::Error| Error::Pwrite { stage, err: e.into() }
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(OsStr::from_bytes(path))
        .map_err(stage(PwriteStage::Open))?;
    let written =
        file.write_at(data, offset).map_err(stage(PwriteStage::Pwrite))?;

    // Dropping a `File` ignores close errors, so close by hand.
    unistd::close(file.into_raw_fd()).map_err(|e| Error::Pwrite {
        stage: PwriteStage::Close,
        err: OsError::from(e),
    })?;
    Ok(written)
}

/// Run `command` with argument vector `argv` and wait for its exit status.
///
/// `argv[0]` is the program name the command sees; the remaining elements
/// are its arguments. A command killed by a signal reports `128 + signal`.
pub fn shell_execute(command: &[u8], argv: &[&[u8]]) -> Result<i32> {
    if command.is_empty()
        || command.len() > MAX_COMMAND_LEN
        || command.contains(&0)
    {
        return Err(Error::InvalidCommand);
    }
    if argv.len() > MAX_SHELL_ARGS {
        return Err(Error::TooManyArgs);
    }

    let mut cmd = Command::new(OsStr::from_bytes(command));
    if let Some((arg0, args)) = argv.split_first() {
        cmd.arg0(OsStr::from_bytes(arg0));
        cmd.args(args.iter().map(|a| OsStr::from_bytes(a)));
    }

    tracing::debug!(
        command = %String::from_utf8_lossy(command),
        argc = argv.len(),
        "shell"
    );
    let status = cmd.status().map_err(|e| Error::ShellFailed(e.into()))?;
    Ok(status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1))
}
