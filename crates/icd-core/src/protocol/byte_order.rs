//! Big-endian (network order) conversions for the numeric types the ICD
//! uses on the wire.
//!
//! All multi-byte values are written most-significant byte first, whatever
//! the host's native endianness.  The plain `decode_*` helpers index the
//! slice directly: an out-of-bounds offset is a caller bug and panics.  The
//! `try_decode_*` variants are for untrusted input and return
//! [`IcdError::InsufficientData`] instead.

use crate::protocol::error::IcdError;

/// Encodes an `f64` as 8 big-endian bytes.
pub fn encode_f64(value: f64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Encodes a `u16` as 2 big-endian bytes.
pub fn encode_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Encodes a `u32` as 4 big-endian bytes.
pub fn encode_u32(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Decodes an `f64` from `bytes[offset..offset + 8]`.
///
/// # Panics
///
/// Panics if fewer than 8 bytes are available at `offset`.
pub fn decode_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_be_bytes(raw)
}

/// Decodes a `u16` from `bytes[offset..offset + 2]`.
///
/// # Panics
///
/// Panics if fewer than 2 bytes are available at `offset`.
pub fn decode_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Decodes a `u32` from `bytes[offset..offset + 4]`.
///
/// # Panics
///
/// Panics if fewer than 4 bytes are available at `offset`.
pub fn decode_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Returns an error unless `bytes` holds at least `len` bytes from `offset`.
pub fn require_len(bytes: &[u8], offset: usize, len: usize) -> Result<(), IcdError> {
    if bytes.len() < offset + len {
        Err(IcdError::InsufficientData {
            needed: offset + len,
            available: bytes.len(),
        })
    } else {
        Ok(())
    }
}

/// Checked variant of [`decode_u16`].
pub fn try_decode_u16(bytes: &[u8], offset: usize) -> Result<u16, IcdError> {
    require_len(bytes, offset, 2)?;
    Ok(decode_u16(bytes, offset))
}

/// Checked variant of [`decode_u32`].
pub fn try_decode_u32(bytes: &[u8], offset: usize) -> Result<u32, IcdError> {
    require_len(bytes, offset, 4)?;
    Ok(decode_u32(bytes, offset))
}

/// Checked variant of [`decode_f64`].
pub fn try_decode_f64(bytes: &[u8], offset: usize) -> Result<f64, IcdError> {
    require_len(bytes, offset, 8)?;
    Ok(decode_f64(bytes, offset))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
