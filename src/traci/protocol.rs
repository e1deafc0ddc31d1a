//! TraCI wire format.
//!
//! Everything on the wire is big-endian. A message is a u32 total length
//! (covering the length field itself) followed by commands. Each command
//! carries a u8 length covering its length and identifier bytes; content
//! longer than 255 bytes uses a zero marker followed by an i32 extended
//! length. Strings are an i32 byte count plus UTF-8 bytes; string lists are
//! an i32 element count plus strings.

use std::io::{Read, Write};

use anyhow::{bail, Context};

/// Command identifiers.
pub mod command {
    pub const GET_VERSION: u8 = 0x00;
    pub const SIM_STEP: u8 = 0x02;
    pub const CLOSE: u8 = 0x7f;
    pub const GET_VEHICLE_VARIABLE: u8 = 0xa4;
    pub const RESPONSE_VEHICLE_VARIABLE: u8 = 0xb4;
    pub const GET_SIM_VARIABLE: u8 = 0xab;
    pub const RESPONSE_SIM_VARIABLE: u8 = 0xbb;
}

/// Variable identifiers.
pub mod variable {
    pub const ID_LIST: u8 = 0x00;
    pub const SPEED: u8 = 0x40;
    pub const POSITION: u8 = 0x42;
    pub const TIME: u8 = 0x66;
    pub const ACCELERATION: u8 = 0x72;
    pub const MIN_EXPECTED_VEHICLES: u8 = 0x7d;
}

/// Payload type identifiers.
pub mod data_type {
    pub const POSITION_2D: u8 = 0x01;
    pub const INTEGER: u8 = 0x09;
    pub const DOUBLE: u8 = 0x0b;
    pub const STRING: u8 = 0x0c;
    pub const STRING_LIST: u8 = 0x0e;
    pub const COMPOUND: u8 = 0x0f;
}

/// Status result code for a successful command.
pub const RESULT_OK: u8 = 0x00;
/// Status result code for a rejected command.
pub const RESULT_ERROR: u8 = 0xff;

pub fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_f64(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_string(buf: &mut Vec<u8>, value: &str) {
    put_i32(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

/// Frames one command: length prefix, identifier, payload.
pub fn encode_command(id: u8, payload: &[u8]) -> Vec<u8> {
    let short_len = payload.len() + 2;
    let mut out = Vec::with_capacity(short_len + 4);
    if short_len <= u8::MAX as usize {
        out.push(short_len as u8);
    } else {
        out.push(0);
        put_i32(&mut out, (payload.len() + 6) as i32);
    }
    out.push(id);
    out.extend_from_slice(payload);
    out
}

/// Writes one message containing the given framed commands.
pub fn write_message(stream: &mut impl Write, commands: &[Vec<u8>]) -> anyhow::Result<()> {
    let body: usize = commands.iter().map(Vec::len).sum();
    let total = (body + 4) as u32;
    stream.write_all(&total.to_be_bytes())?;
    for command in commands {
        stream.write_all(command)?;
    }
    stream.flush()?;
    Ok(())
}

/// Reads one whole message body, with the length prefix stripped.
pub fn read_message(stream: &mut impl Read) -> anyhow::Result<Vec<u8>> {
    let mut len = [0u8; 4];
    stream
        .read_exact(&mut len)
        .context("connection closed while reading message length")?;
    let total = u32::from_be_bytes(len) as usize;
    anyhow::ensure!(total >= 4, "message length {total} below minimum frame size");

    let mut body = vec![0u8; total - 4];
    stream
        .read_exact(&mut body)
        .context("connection closed mid-message")?;
    Ok(body)
}

/// Sequential reader over a message or command payload.
pub struct Decoder {
    buf: Vec<u8>,
    pos: usize,
}

impl Decoder {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> anyhow::Result<&[u8]> {
        anyhow::ensure!(
            self.remaining() >= n,
            "truncated TraCI payload: wanted {n} bytes, {} left",
            self.remaining()
        );
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> anyhow::Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> anyhow::Result<i32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(i32::from_be_bytes(raw))
    }

    pub fn read_f64(&mut self) -> anyhow::Result<f64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(f64::from_be_bytes(raw))
    }

    pub fn read_string(&mut self) -> anyhow::Result<String> {
        let len = self.read_i32()?;
        anyhow::ensure!(len >= 0, "negative string length {len}");
        let bytes = self.take(len as usize)?.to_vec();
        String::from_utf8(bytes).context("TraCI string is not UTF-8")
    }

    pub fn read_string_list(&mut self) -> anyhow::Result<Vec<String>> {
        let count = self.read_i32()?;
        anyhow::ensure!(count >= 0, "negative string-list length {count}");
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    /// Reads one framed command, returning its identifier and payload.
    pub fn read_command(&mut self) -> anyhow::Result<(u8, Decoder)> {
        let short = self.read_u8()?;
        let (total, header) = if short == 0 {
            (self.read_i32()? as usize, 5usize)
        } else {
            (short as usize, 1usize)
        };
        anyhow::ensure!(total >= header + 1, "command frame of {total} bytes too short");

        let id = self.read_u8()?;
        let payload = self.take(total - header - 1)?.to_vec();
        Ok((id, Decoder::new(payload)))
    }
}

/// Consumes a status command and fails on anything but `RESULT_OK`.
pub fn check_status(message: &mut Decoder, expected_command: u8) -> anyhow::Result<()> {
    let (id, mut payload) = message.read_command()?;
    anyhow::ensure!(
        id == expected_command,
        "status reply for command 0x{id:02x}, expected 0x{expected_command:02x}"
    );

    let result = payload.read_u8()?;
    let description = payload.read_string()?;
    if result != RESULT_OK {
        bail!("sumo rejected command 0x{expected_command:02x}: {description}");
    }
    Ok(())
}
