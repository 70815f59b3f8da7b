//! Bounds marker
//!
//! Records which access mode produced a file's segment bounds.
//!
//! ## Format
//! ```text
//! ┌───────────────┬──────────────────────────┐
//! │ Len: u16 (BE) │ Access mode name (UTF-8) │
//! └───────────────┴──────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::config::AccessMode;
use crate::error::{Result, StrataError};

/// Write the access-mode marker
pub fn write_access_mode(out: &mut dyn Write, mode: AccessMode) -> Result<()> {
    let name = mode.name().as_bytes();
    let mut buf = BytesMut::with_capacity(2 + name.len());
    buf.put_u16(name.len() as u16);
    buf.put_slice(name);
    out.write_all(&buf)?;
    Ok(())
}

/// Read back the access-mode name stored by `write_access_mode`
pub fn read_access_mode(input: &mut dyn Read) -> Result<String> {
    let mut len = [0u8; 2];
    input.read_exact(&mut len)?;
    let len = (&len[..]).get_u16() as usize;

    let mut name = vec![0u8; len];
    input.read_exact(&mut name)?;
    String::from_utf8(name)
        .map_err(|e| StrataError::Serialization(format!("Invalid access mode marker: {}", e)))
}

/// Fail unless the stored marker names `configured`
pub fn check_access_mode(input: &mut dyn Read, configured: AccessMode) -> Result<()> {
    let stored = read_access_mode(input)?;
    if stored != configured.name() {
        tracing::error!(
            stored = %stored,
            configured = %configured,
            "Segment bounds were built under a different access mode"
        );
        return Err(StrataError::AccessModeMismatch {
            stored,
            configured: configured.name().to_string(),
        });
    }
    Ok(())
}
