//! The chooser subprocess wire framing (spec.md §6): each message is
//! `Length:` followed by an 8-hex-digit length, a newline, then that
//! many bytes of XML. Only the framing is implemented here — parsing
//! the XML payload and spawning a chooser process are both out of
//! scope (spec.md §1).

use std::io::{self, Read, Write};

use crate::errors::{Error, Result};

const PREFIX: &str = "Length:";

/// Write one frame: `Length:XXXXXXXX\n` followed by `payload`.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > 0xFFFF_FFFF {
        return Err(Error::SafeException(format!("frame payload too large: {} bytes", payload.len())));
    }
    write!(writer, "{PREFIX}{:08x}\n", payload.len())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Read one frame, or `Ok(None)` at a clean EOF before any bytes of the
/// next frame have arrived.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; PREFIX.len() + 8 + 1];
    match read_exact_or_eof(reader, &mut header)? {
        false => return Ok(None),
        true => {}
    }

    let header_text = std::str::from_utf8(&header)
        .map_err(|_| bad_frame("header is not valid UTF-8"))?;
    let Some(rest) = header_text.strip_prefix(PREFIX) else {
        return Err(bad_frame(&format!("missing '{PREFIX}' prefix")));
    };
    let Some(hex_len) = rest.strip_suffix('\n') else {
        return Err(bad_frame("header not newline-terminated"));
    };
    let len = u32::from_str_radix(hex_len, 16).map_err(|_| bad_frame("length is not 8 hex digits"))? as usize;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated frame header"))),
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(true)
}

fn bad_frame(reason: &str) -> Error {
    Error::SafeException(format!("malformed chooser frame: {reason}"))
}
