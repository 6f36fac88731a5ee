use derive_more::{Display, From};
use nix::errno::Errno;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// An error code reported by the operating system.
///
/// Displays as the OS-provided description (`strerror`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{}", _0.desc())]
pub struct OsError(Errno);

impl OsError {
    pub fn errno(&self) -> Errno {
        self.0
    }

    /// Human readable message for this error.
    pub fn message(&self) -> &'static str {
        self.0.desc()
    }
}

impl From<Errno> for OsError {
    fn from(errno: Errno) -> Self {
        Self(errno)
    }
}

impl From<io::Error> for OsError {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Self(Errno::from_raw(code)),
            None => Self(Errno::UnknownErrno),
        }
    }
}

/// The part of a transfer message that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MessageField {
    /// Not an `(addr, flags, data)` triple at all.
    #[display("shape")]
    Shape,
    #[display("address")]
    Addr,
    #[display("flags")]
    Flags,
    #[display("read length")]
    Len,
    #[display("write buffer")]
    Buf,
}

/// The time-of-day component that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TimeField {
    #[display("year")]
    Year,
    #[display("month")]
    Month,
    #[display("day")]
    Day,
    #[display("hour")]
    Hour,
    #[display("minute")]
    Minute,
    #[display("second")]
    Second,
    #[display("ticks")]
    Ticks,
}

/// Step of a positional device write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PwriteStage {
    #[display("open")]
    Open,
    #[display("pwrite")]
    Pwrite,
    #[display("close")]
    Close,
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("invalid bus path")]
    #[from(skip)]
    InvalidBus,
    #[display("invalid bus alias")]
    #[from(skip)]
    InvalidAlias,
    #[display("bus registration failed: {_0}")]
    #[from(skip)]
    RegisterFailed(OsError),
    #[display("bus open failed: {_0}")]
    #[from(skip)]
    BusOpenFailed(OsError),
    #[display("bus handle is closed")]
    #[from(skip)]
    InvalidHandle,
    #[display("bus close failed: {_0}")]
    #[from(skip)]
    CloseFailed(OsError),
    #[display("message {index}: invalid {field}")]
    #[from(skip)]
    InvalidMessage { index: usize, field: MessageField },
    #[display("out of memory while preparing transfer")]
    #[from(skip)]
    AllocFailed,
    #[display("combined transfer failed: {_0}")]
    #[from(skip)]
    IoctlFailed(OsError),

    #[display("invalid path")]
    #[from(skip)]
    InvalidPath,
    #[display("reading the clock failed: {_0}")]
    #[from(skip)]
    ClockGetFailed(OsError),
    #[display("invalid time of day: {_0}")]
    #[from(skip)]
    InvalidTime(TimeField),
    #[display("setting the clock failed: {_0}")]
    #[from(skip)]
    ClockSetFailed(OsError),
    #[display("unmount failed: {_0}")]
    #[from(skip)]
    UnmountFailed(OsError),
    #[display("{stage} failed: {err}")]
    #[from(skip)]
    Pwrite { stage: PwriteStage, err: OsError },
    #[display("negative write offset")]
    #[from(skip)]
    InvalidOffset,
    #[display("shell command line too long")]
    #[from(skip)]
    InvalidCommand,
    #[display("too many shell arguments")]
    #[from(skip)]
    TooManyArgs,
    #[display("shell command failed: {_0}")]
    #[from(skip)]
    ShellFailed(OsError),

    #[display("invalid message argument: {_0}")]
    #[from(skip)]
    InvalidArgument(String),

    // External
    #[display("config: {_0}")]
    ConfigIo(io::Error),
    #[display("config: {_0}")]
    ConfigParse(serde_json::Error),
}

/// Stable tag naming the class of an [`Error`], as seen by host callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidBus,
    InvalidAlias,
    RegisterFailed,
    BusOpenFailed,
    InvalidHandle,
    CloseFailed,
    InvalidMessage,
    InvalidMessageAddr,
    InvalidMessageFlags,
    InvalidMessageLen,
    InvalidMessageBuf,
    AllocFailed,
    IoctlFailed,
    InvalidPath,
    ClockGetFailed,
    InvalidYear,
    InvalidMonth,
    InvalidDay,
    InvalidHour,
    InvalidMinute,
    InvalidSecond,
    InvalidTicks,
    ClockSetFailed,
    UnmountFailed,
    Open,
    Pwrite,
    Close,
    InvalidOffset,
    InvalidCommand,
    TooManyArgs,
    ShellFailed,
    InvalidArgument,
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidBus => "invalid_bus",
            ErrorKind::InvalidAlias => "invalid_alias",
            ErrorKind::RegisterFailed => "register_failed",
            ErrorKind::BusOpenFailed => "bus_open_failed",
            ErrorKind::InvalidHandle => "invalid_handle",
            ErrorKind::CloseFailed => "close_failed",
            ErrorKind::InvalidMessage => "invalid_message",
            ErrorKind::InvalidMessageAddr => "invalid_message_addr",
            ErrorKind::InvalidMessageFlags => "invalid_message_flags",
            ErrorKind::InvalidMessageLen => "invalid_message_len",
            ErrorKind::InvalidMessageBuf => "invalid_message_buf",
            ErrorKind::AllocFailed => "alloc_failed",
            ErrorKind::IoctlFailed => "ioctl_failed",
            ErrorKind::InvalidPath => "invalid_path",
            ErrorKind::ClockGetFailed => "clock_get_failed",
            ErrorKind::InvalidYear => "invalid_year",
            ErrorKind::InvalidMonth => "invalid_month",
            ErrorKind::InvalidDay => "invalid_day",
            ErrorKind::InvalidHour => "invalid_hour",
            ErrorKind::InvalidMinute => "invalid_minute",
            ErrorKind::InvalidSecond => "invalid_second",
            ErrorKind::InvalidTicks => "invalid_ticks",
            ErrorKind::ClockSetFailed => "clock_set_failed",
            ErrorKind::UnmountFailed => "unmount_failed",
            ErrorKind::Open => "open",
            ErrorKind::Pwrite => "pwrite",
            ErrorKind::Close => "close",
            ErrorKind::InvalidOffset => "invalid_offset",
            ErrorKind::InvalidCommand => "invalid_command",
            ErrorKind::TooManyArgs => "too_many_args",
            ErrorKind::ShellFailed => "shell_failed",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Config => "config",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidBus => ErrorKind::InvalidBus,
            Error::InvalidAlias => ErrorKind::InvalidAlias,
            Error::RegisterFailed(_) => ErrorKind::RegisterFailed,
            Error::BusOpenFailed(_) => ErrorKind::BusOpenFailed,
            Error::InvalidHandle => ErrorKind::InvalidHandle,
            Error::CloseFailed(_) => ErrorKind::CloseFailed,
            Error::InvalidMessage { field, .. } => match field {
                MessageField::Shape => ErrorKind::InvalidMessage,
                MessageField::Addr => ErrorKind::InvalidMessageAddr,
                MessageField::Flags => ErrorKind::InvalidMessageFlags,
                MessageField::Len => ErrorKind::InvalidMessageLen,
                MessageField::Buf => ErrorKind::InvalidMessageBuf,
            },
            Error::AllocFailed => ErrorKind::AllocFailed,
            Error::IoctlFailed(_) => ErrorKind::IoctlFailed,
            Error::InvalidPath => ErrorKind::InvalidPath,
            Error::ClockGetFailed(_) => ErrorKind::ClockGetFailed,
            Error::InvalidTime(field) => match field {
                TimeField::Year => ErrorKind::InvalidYear,
                TimeField::Month => ErrorKind::InvalidMonth,
                TimeField::Day => ErrorKind::InvalidDay,
                TimeField::Hour => ErrorKind::InvalidHour,
                TimeField::Minute => ErrorKind::InvalidMinute,
                TimeField::Second => ErrorKind::InvalidSecond,
                TimeField::Ticks => ErrorKind::InvalidTicks,
            },
            Error::ClockSetFailed(_) => ErrorKind::ClockSetFailed,
            Error::UnmountFailed(_) => ErrorKind::UnmountFailed,
            Error::Pwrite { stage, .. } => match stage {
                PwriteStage::Open => ErrorKind::Open,
                PwriteStage::Pwrite => ErrorKind::Pwrite,
                PwriteStage::Close => ErrorKind::Close,
            },
            Error::InvalidOffset => ErrorKind::InvalidOffset,
            Error::InvalidCommand => ErrorKind::InvalidCommand,
            Error::TooManyArgs => ErrorKind::TooManyArgs,
            Error::ShellFailed(_) => ErrorKind::ShellFailed,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::ConfigIo(_) | Error::ConfigParse(_) => ErrorKind::Config,
        }
    }

    /// The OS error behind this failure, if the OS reported one.
    pub fn os_error(&self) -> Option<OsError> {
        match self {
            Error::RegisterFailed(e)
            | Error::BusOpenFailed(e)
            | Error::CloseFailed(e)
            | Error::IoctlFailed(e)
            | Error::ClockGetFailed(e)
            | Error::ClockSetFailed(e)
            | Error::UnmountFailed(e)
            | Error::ShellFailed(e)
            | Error::Pwrite { err: e, .. } => Some(*e),
            _ => None,
        }
    }

    /// Index of the offending message for transfer validation failures.
    pub fn message_index(&self) -> Option<usize> {
        match self {
            Error::InvalidMessage { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ConfigIo(e) => Some(e),
            Error::ConfigParse(e) => Some(e),
            _ => None,
        }
    }
}
