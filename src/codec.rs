//! Little-endian read/write primitives for the archive header format.
//!
//! Every reader maps a short read to [`Error::TruncatedInput`]; no other
//! validation happens at this layer.

use crate::config::{FILETIME_TICKS_PER_SECOND, FILETIME_UNIX_EPOCH_DELTA, MAX_NAME_LEN};
use crate::error::{Error, Result};
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// A timestamp in 100-nanosecond intervals since 1601-01-01.
///
/// Kept at full precision; Unix seconds are derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FileTime(pub i64);

impl FileTime {
    /// Convert from whole seconds since the Unix epoch.
    pub fn from_unix_secs(secs: i64) -> Self {
        Self(secs * FILETIME_TICKS_PER_SECOND + FILETIME_UNIX_EPOCH_DELTA)
    }

    /// Seconds since the Unix epoch, truncated toward zero.
    pub fn as_unix_secs(self) -> i64 {
        (self.0 - FILETIME_UNIX_EPOCH_DELTA) / FILETIME_TICKS_PER_SECOND
    }

    /// Seconds since the Unix epoch including the sub-second fraction.
    pub fn as_unix_secs_f64(self) -> f64 {
        (self.0 - FILETIME_UNIX_EPOCH_DELTA) as f64 / FILETIME_TICKS_PER_SECOND as f64
    }

    /// Convert from a system time, keeping 100ns precision.
    pub fn from_system_time(time: SystemTime) -> Self {
        let ticks = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_nanos() / 100) as i64,
            Err(e) => -((e.duration().as_nanos() / 100) as i64),
        };
        Self(ticks + FILETIME_UNIX_EPOCH_DELTA)
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }
}

fn read_array<R: Read, const N: usize>(r: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

fn truncated(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::TruncatedInput
    } else {
        Error::Io(e)
    }
}

/// Read a signed 32-bit integer.
pub fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    Ok(i32::from_le_bytes(read_array(r)?))
}

/// Write a signed 32-bit integer.
pub fn write_i32<W: Write>(w: &mut W, value: i32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Read an unsigned 32-bit integer.
pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(r)?))
}

/// Write an unsigned 32-bit integer.
pub fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Read a single byte.
pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    Ok(read_array::<R, 1>(r)?[0])
}

/// Write a single byte.
pub fn write_u8<W: Write>(w: &mut W, value: u8) -> Result<()> {
    w.write_all(&[value])?;
    Ok(())
}

/// Read `len` bytes and decode them as Latin-1.
pub fn read_string_exact<R: Read>(r: &mut R, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf.into_iter().map(char::from).collect())
}

/// Read a string preceded by its one-byte length.
pub fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = read_u8(r)? as usize;
    read_string_exact(r, len)
}

/// Encode a string as Latin-1 bytes.
///
/// Fails for characters above U+00FF and for names that do not fit the
/// one-byte length prefix.
pub fn encode_latin1(s: &str) -> Result<Vec<u8>> {
    let bytes = s
        .chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| Error::InvalidName(s.to_string())))
        .collect::<Result<Vec<u8>>>()?;
    if bytes.len() > MAX_NAME_LEN {
        return Err(Error::InvalidName(format!(
            "{} ({} bytes, max {})",
            s,
            bytes.len(),
            MAX_NAME_LEN
        )));
    }
    Ok(bytes)
}

/// Write a Latin-1 string, optionally preceded by its one-byte length.
pub fn write_string<W: Write>(w: &mut W, s: &str, with_len: bool) -> Result<()> {
    let bytes = encode_latin1(s)?;
    if with_len {
        write_u8(w, bytes.len() as u8)?;
    }
    w.write_all(&bytes)?;
    Ok(())
}

/// Read a 64-bit legacy timestamp.
pub fn read_filetime<R: Read>(r: &mut R) -> Result<FileTime> {
    Ok(FileTime(i64::from_le_bytes(read_array(r)?)))
}

/// Write a 64-bit legacy timestamp.
pub fn write_filetime<W: Write>(w: &mut W, time: FileTime) -> Result<()> {
    w.write_all(&time.0.to_le_bytes())?;
    Ok(())
}
