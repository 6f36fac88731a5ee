//! Text forms of messages and responses used by the `ni2c` tool.
//!
//! A message is written `w@ADDR[+FLAGS]:BYTE,BYTE,...` to send bytes or
//! `r@ADDR[+FLAGS]:LEN` to receive `LEN` bytes. Numbers are decimal, or
//! hexadecimal with a `0x` prefix.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::Error;
use crate::message::{MessageFlags, RawMessage, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPayload {
    Write(Vec<u8>),
    Read(i64),
}

/// One message given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageArg {
    pub addr: i64,
    pub flags: i64,
    pub payload: ArgPayload,
}

impl MessageArg {
    pub fn as_raw(&self) -> RawMessage<'_> {
        match &self.payload {
            ArgPayload::Write(data) => RawMessage::write(self.addr, self.flags, data),
            ArgPayload::Read(len) => RawMessage::read(self.addr, self.flags, *len),
        }
    }
}

fn parse_number(s: &str) -> Result<i64, Error> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| Error::InvalidArgument(format!("not a number: {s:?}")))
}

impl FromStr for MessageArg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::InvalidArgument(s.to_string());

        let (dir, rest) = s.split_once('@').ok_or_else(bad)?;
        let (target, body) = rest.split_once(':').ok_or_else(bad)?;
        let (addr, flags) = match target.split_once('+') {
            Some((addr, flags)) => (parse_number(addr)?, parse_number(flags)?),
            None => (parse_number(target)?, 0),
        };

        let payload = match dir {
            "w" | "W" => {
                let data = body
                    .split(',')
                    .filter(|b| !b.trim().is_empty())
                    .map(|b| {
                        let n = parse_number(b)?;
                        u8::try_from(n).map_err(|_| {
                            Error::InvalidArgument(format!("not a byte: {b:?}"))
                        })
                    })
                    .collect::<Result<Vec<u8>, Error>>()?;
                ArgPayload::Write(data)
            }
            "r" | "R" => ArgPayload::Read(parse_number(body)?),
            _ => return Err(bad()),
        };

        let flags = match payload {
            ArgPayload::Read(_) => flags | i64::from(MessageFlags::RD.bits()),
            ArgPayload::Write(_) => flags,
        };
        Ok(Self { addr, flags, payload })
    }
}

/// `ok` for a write, space separated hex bytes for a read.
pub fn format_response(response: &Response) -> String {
    match response {
        Response::Ok => "ok".to_string(),
        Response::Data(data) => {
            let mut out = String::with_capacity(data.len() * 3);
            for (i, b) in data.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                let _ = write!(out, "{b:02x}");
            }
            out
        }
    }
}

/// Parse a run of hex digits, optionally separated by spaces, into bytes.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, Error> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(Error::InvalidArgument(format!("bad hex bytes: {s:?}")));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| Error::InvalidArgument(format!("not hex: {s:?}")))
        })
        .collect()
}
