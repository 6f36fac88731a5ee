//! Combined transfers: many messages, one driver call.

use crate::driver::{I2cDriver, KernelMsg};
use crate::error::{Error, MessageField, Result};
use crate::handle::BusHandle;
use crate::message::{MessageFlags, Operation, RawMessage, Response};

/// Vec with exactly `n` slots reserved, or `AllocFailed`.
fn reserve<T>(n: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| Error::AllocFailed)?;
    Ok(v)
}

/// Zero-filled receive buffer of exactly `len` bytes.
fn receive_buffer(len: u16) -> Result<Vec<u8>> {
    let len = usize::from(len);
    let mut buf = reserve(len)?;
    buf.resize(len, 0);
    Ok(buf)
}

/// One validated message together with its data: the bytes to send, or the
/// receive buffer the driver fills.
enum Segment<'a> {
    Write(&'a [u8]),
    Read(Vec<u8>),
}

impl Segment<'_> {
    fn into_response(self) -> Response {
        match self {
            Segment::Write(_) => Response::Ok,
            Segment::Read(buf) => Response::Data(buf),
        }
    }
}

/// Run `messages` against the bus behind `handle` as one combined transfer.
///
/// Returns one [`Response`] per message, in input order: `Ok` for a write,
/// the received bytes for a read. An empty message list returns an empty
/// response list without touching the handle or the driver.
///
/// Messages are validated in order and the first bad one aborts the whole
/// transfer before the driver is called. A driver failure is reported as
/// `IoctlFailed` and discards every receive buffer; there are no partial
/// results.
pub fn transfer<D: I2cDriver>(
    handle: &BusHandle<D>,
    messages: &[RawMessage<'_>],
) -> Result<Vec<Response>> {
    if messages.is_empty() {
        return Ok(Vec::new());
    }

    let fd = handle.fd()?;

    // Receive buffers are allocated up front; the driver writes straight
    // into them.
    let mut segments: Vec<(u16, MessageFlags, Segment<'_>)> =
        reserve(messages.len())?;
    for (index, raw) in messages.iter().enumerate() {
        let msg = raw.validate(index)?;
        let segment = match msg.op {
            Operation::Write(data) => Segment::Write(data),
            Operation::Read(len) => Segment::Read(receive_buffer(len)?),
        };
        segments.push((msg.addr, msg.flags, segment));
    }

    let mut responses = reserve(segments.len())?;
    {
        let mut kmsgs = reserve(segments.len())?;
        for (index, (addr, flags, segment)) in segments.iter_mut().enumerate() {
            let kmsg = match segment {
                Segment::Write(data) => KernelMsg::write(*addr, *flags, *data)
                    .ok_or(MessageField::Buf),
                Segment::Read(buf) => KernelMsg::read(*addr, *flags, buf)
                    .ok_or(MessageField::Len),
            }
            .map_err(|field| Error::InvalidMessage { index, field })?;
            tracing::trace!(?kmsg, "queued");
            kmsgs.push(kmsg);
        }

        tracing::debug!(fd, count = kmsgs.len(), "combined transfer");
        handle.driver().rdwr(fd, &mut kmsgs).map_err(Error::IoctlFailed)?;
    }

    responses.extend(segments.into_iter().map(|(_, _, s)| s.into_response()));
    Ok(responses)
}
