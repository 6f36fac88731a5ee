//! Python bindings for `ni2c`.
//!
//! A bus is a `Bus` object. Its descriptor is closed by `Bus.close()`, by
//! leaving a `with` block, or when the object is garbage collected,
//! whichever comes first. Failures raise `I2cError(kind, detail)` where
//! `kind` is a stable tag such as `"ioctl_failed"` and `detail` is the OS
//! message, the index of the offending message, or a description.

use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ni2c::system::{self, TimeOfDay};
use ni2c::{BusHandle, BusManager, DevI2c, Error, Payload, RawMessage, Response};
use pyo3::buffer::PyBuffer;
use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyList};

create_exception!(ni2c_py, I2cError, PyException);

type Tod = (u32, u32, u32, u32, u32, u32, u32);

fn manager() -> &'static BusManager<DevI2c> {
    static MANAGER: OnceLock<BusManager<DevI2c>> = OnceLock::new();
    MANAGER.get_or_init(|| BusManager::new(DevI2c))
}

fn convert_error(err: Error) -> PyErr {
    let kind = err.kind().as_str();
    if let Some(os) = err.os_error() {
        I2cError::new_err((kind, os.message()))
    } else if let Some(index) = err.message_index() {
        I2cError::new_err((kind, index))
    } else {
        I2cError::new_err((kind, err.to_string()))
    }
}

fn path_bytes(path: &Path) -> &[u8] {
    path.as_os_str().as_bytes()
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// An open I2C bus.
#[pyclass(name = "Bus", module = "ni2c_py")]
struct PyBus {
    handle: BusHandle<DevI2c>,
}

#[pymethods]
impl PyBus {
    #[getter]
    fn path<'py>(&self, py: Python<'py>) -> Bound<'py, PyBytes> {
        PyBytes::new(py, self.handle.path().to_bytes())
    }

    #[getter]
    fn closed(&self) -> bool {
        !self.handle.is_open()
    }

    /// Close the bus. Closing a closed bus does nothing.
    fn close(&mut self) -> PyResult<()> {
        self.handle.release().map_err(convert_error)
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    fn __exit__(
        &mut self,
        _exc_type: PyObject,
        _exc_value: PyObject,
        _traceback: PyObject,
    ) -> PyResult<bool> {
        self.close()?;
        Ok(false)
    }

    fn __repr__(&self) -> String {
        format!(
            "Bus({:?}, closed={})",
            self.handle.path(),
            !self.handle.is_open()
        )
    }
}

// ---------------------------------------------------------------------------
// I2C
// ---------------------------------------------------------------------------

/// Register the bus controller at `bus_path` under the device path `alias`.
#[pyfunction]
fn register_bus(bus_path: PathBuf, alias: PathBuf) -> PyResult<()> {
    manager()
        .register_bus(path_bytes(&bus_path), path_bytes(&alias))
        .map_err(convert_error)
}

/// Open the bus device at `bus_path`.
#[pyfunction]
fn open(bus_path: PathBuf) -> PyResult<PyBus> {
    let handle = manager().open(path_bytes(&bus_path)).map_err(convert_error)?;
    Ok(PyBus { handle })
}

/// Data of a host message, kept alive until the transfer returns.
enum HostData<'py> {
    Bytes(Bound<'py, PyBytes>),
    /// Copied out of a `bytearray`, `memoryview` or other byte buffer.
    Copied(Vec<u8>),
    Len(i64),
}

struct HostMessage<'py> {
    addr: i64,
    flags: i64,
    data: HostData<'py>,
}

impl HostMessage<'_> {
    fn as_raw(&self) -> RawMessage<'_> {
        let payload = match &self.data {
            HostData::Bytes(bytes) => Payload::Bytes(bytes.as_bytes()),
            HostData::Copied(data) => Payload::Bytes(data),
            HostData::Len(len) => Payload::Len(*len),
        };
        RawMessage { addr: self.addr, flags: self.flags, payload }
    }
}

// Values Python can hold but i64 cannot become -1, which is out of range
// for every field. Data that is neither a byte buffer nor an int becomes a
// negative length, which fails as a bad length for reads and as a bad
// buffer for writes.
fn int_field(value: &Bound<'_, PyAny>) -> i64 {
    value.extract::<i64>().unwrap_or(-1)
}

fn host_data<'py>(value: &Bound<'py, PyAny>) -> HostData<'py> {
    if let Ok(bytes) = value.downcast::<PyBytes>() {
        return HostData::Bytes(bytes.clone());
    }
    if let Ok(len) = value.extract::<i64>() {
        return HostData::Len(len);
    }
    match PyBuffer::<u8>::get(value).and_then(|buf| buf.to_vec(value.py())) {
        Ok(data) => HostData::Copied(data),
        Err(_) => HostData::Len(int_field(value)),
    }
}

/// `None` unless `msg` is an `(addr, flags, data)` tuple.
fn unpack<'py>(msg: &Bound<'py, PyAny>) -> Option<HostMessage<'py>> {
    let (addr, flags, data): (
        Bound<'py, PyAny>,
        Bound<'py, PyAny>,
        Bound<'py, PyAny>,
    ) = msg.extract().ok()?;
    Some(HostMessage {
        addr: int_field(&addr),
        flags: int_field(&flags),
        data: host_data(&data),
    })
}

/// Run `messages` as one combined transfer.
///
/// Each message is a tuple `(addr, flags, data)`: `data` is the bytes to
/// write (`bytes`, `bytearray` or any byte buffer), or the number of bytes
/// to read when `flags` has the read bit set. Returns one entry per
/// message, in order: `None` for a write, the received `bytes` for a read.
/// A message that is not such a tuple fails with `invalid_message` and its
/// index, in the same order as every other message check.
#[pyfunction]
fn transfer<'py>(
    py: Python<'py>,
    bus: PyRef<'py, PyBus>,
    messages: Vec<Bound<'py, PyAny>>,
) -> PyResult<Bound<'py, PyList>> {
    let host: Vec<Option<HostMessage<'py>>> =
        messages.iter().map(unpack).collect();
    let raw: Vec<RawMessage<'_>> = host
        .iter()
        .map(|msg| match msg {
            Some(msg) => msg.as_raw(),
            None => RawMessage::malformed(),
        })
        .collect();

    let handle = &bus.handle;
    let responses = py
        .allow_threads(|| ni2c::transfer(handle, &raw))
        .map_err(convert_error)?;

    PyList::new(
        py,
        responses.iter().map(|response| match response {
            Response::Ok => py.None(),
            Response::Data(data) => PyBytes::new(py, data).into_any().unbind(),
        }),
    )
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[pyfunction]
fn clock_get_ticks_per_second() -> i64 {
    system::clock_ticks_per_second()
}

#[pyfunction]
fn clock_get_ticks_since_boot() -> PyResult<i64> {
    system::clock_ticks_since_boot().map_err(convert_error)
}

/// `(year, month, day, hour, minute, second, ticks)` in UTC.
#[pyfunction]
fn clock_get_tod() -> Tod {
    let t = system::clock_get_tod();
    (t.year, t.month, t.day, t.hour, t.minute, t.second, t.ticks)
}

#[pyfunction]
fn clock_set(tod: Tod) -> PyResult<()> {
    let (year, month, day, hour, minute, second, ticks) = tod;
    let tod = TimeOfDay { year, month, day, hour, minute, second, ticks };
    system::clock_set(&tod).map_err(convert_error)
}

#[pyfunction]
fn unmount(path: PathBuf) -> PyResult<()> {
    system::unmount(path_bytes(&path)).map_err(convert_error)
}

/// Write `data` at `offset` of the device at `path`; returns bytes written.
#[pyfunction]
fn pwrite(path: PathBuf, data: &[u8], offset: i64) -> PyResult<usize> {
    system::pwrite(path_bytes(&path), data, offset).map_err(convert_error)
}

#[pyfunction]
fn shell_execute_cmd(
    py: Python<'_>,
    command: PathBuf,
    argv: Vec<Vec<u8>>,
) -> PyResult<i32> {
    let argv: Vec<&[u8]> = argv.iter().map(Vec::as_slice).collect();
    py.allow_threads(|| system::shell_execute(path_bytes(&command), &argv))
        .map_err(convert_error)
}

/// Native I2C bus access and board system calls.
#[pymodule]
fn ni2c_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBus>()?;
    m.add_function(wrap_pyfunction!(register_bus, m)?)?;
    m.add_function(wrap_pyfunction!(open, m)?)?;
    m.add_function(wrap_pyfunction!(transfer, m)?)?;
    m.add_function(wrap_pyfunction!(clock_get_ticks_per_second, m)?)?;
    m.add_function(wrap_pyfunction!(clock_get_ticks_since_boot, m)?)?;
    m.add_function(wrap_pyfunction!(clock_get_tod, m)?)?;
    m.add_function(wrap_pyfunction!(clock_set, m)?)?;
    m.add_function(wrap_pyfunction!(unmount, m)?)?;
    m.add_function(wrap_pyfunction!(pwrite, m)?)?;
    m.add_function(wrap_pyfunction!(shell_execute_cmd, m)?)?;

    m.add("I2cError", m.py().get_type::<I2cError>())?;

    Ok(())
}
