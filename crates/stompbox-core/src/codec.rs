//! STOMP text wire codec
//!
//! Frame format:
//! ```text
//! COMMAND\n
//! header1:value1\n
//! header2:value2\n
//! \n
//! body...\0
//! ```
//!
//! A single line-feed octet with no terminator is the heartbeat probe and
//! decodes to a bare `PING` frame.
//!
//! Bodies containing NUL octets are not round-trip safe: NUL is the frame
//! terminator, and any NUL octets that survive the scan are stripped from
//! the parsed body. This is a documented limitation of the text framing.

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;

use crate::{Command, Error, Frame, Result, HEARTBEAT, LF, NUL};

/// Parse raw transport bytes into a frame.
///
/// Header lines without a colon are silently skipped; a duplicated header
/// key keeps the later value. An unrecognized command token fails with
/// [`Error::UnknownCommand`] carrying the raw token, distinct from the
/// generic [`Error::MalformedFrame`].
pub fn parse(data: &[u8]) -> Result<Frame> {
    if data == HEARTBEAT {
        return Ok(Frame::new(Command::Ping));
    }

    let text =
        std::str::from_utf8(data).map_err(|e| Error::MalformedFrame(e.to_string()))?;

    let mut lines = text.split('\n');

    let token = lines.next().unwrap_or("").trim();
    let command =
        Command::parse(token).ok_or_else(|| Error::UnknownCommand(token.to_string()))?;

    let mut headers = HashMap::new();
    let mut body = String::new();
    let mut in_headers = true;

    for line in lines {
        if in_headers {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                in_headers = false;
            } else if let Some((key, value)) = trimmed.split_once(':') {
                headers.insert(key.trim().to_string(), value.trim().to_string());
            }
            // header lines without a colon are skipped
        } else {
            body.push_str(line);
            body.push('\n');
        }
        // NUL anywhere in the current line terminates the scan
        if line.contains('\0') {
            break;
        }
    }

    // Drop the newline introduced by accumulation, then the NUL sentinel.
    if !body.is_empty() {
        body.pop();
        body.retain(|c| c != '\0');
    }

    Ok(Frame {
        command,
        headers,
        body,
    })
}

/// Serialize a frame into wire bytes: command line, header lines, a blank
/// separator, the body, and the NUL terminator.
pub fn serialize(frame: &Frame) -> Bytes {
    let header_len: usize = frame
        .headers
        .iter()
        .map(|(k, v)| k.len() + v.len() + 2)
        .sum();
    let mut buf =
        BytesMut::with_capacity(frame.command.as_str().len() + header_len + frame.body.len() + 3);

    buf.put_slice(frame.command.as_str().as_bytes());
    buf.put_u8(LF);
    for (key, value) in &frame.headers {
        buf.put_slice(key.as_bytes());
        buf.put_u8(b':');
        buf.put_slice(value.as_bytes());
        buf.put_u8(LF);
    }
    buf.put_u8(LF);
    buf.put_slice(frame.body.as_bytes());
    buf.put_u8(NUL);
    buf.freeze()
}
