//! Message fields: the typed, positionally ordered elements of a message.
//!
//! Every field kind exposes a scale/offset pair and a natural
//! (engineering-unit) value that converts to and from bytes.  What differs
//! is how the value is packed:
//!
//! | Kind        | Wire size | Natural → wire                                   |
//! |-------------|-----------|--------------------------------------------------|
//! | `Float`     | 8 bytes   | IEEE-754 double, unchanged                       |
//! | `ScaledU16` | 2 bytes   | `(natural + offset) / scale`, clamped to 0–65535 |
//! | `Bits`      | 1/2/4     | aggregate of the packed sub-fields               |
//!
//! New field kinds are added as new variants of [`Field`].

use crate::protocol::bit_field::{checked_unsigned, BitField};
use crate::protocol::byte_order::{encode_f64, encode_u16, try_decode_f64, try_decode_u16};
use crate::protocol::error::IcdError;

/// Largest raw value a [`ScaledU16Field`] can hold.
const SCALED_U16_MAX: f64 = u16::MAX as f64;

/// A plain double-precision value (scale 1, offset 0).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloatField {
    value: f64,
}

/// An unsigned 16-bit raw value with a linear scale and offset.
///
/// Assigning a natural value never fails: anything outside the representable
/// range is silently clamped to 0 or 65535.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledU16Field {
    scale: f64,
    offset: f64,
    raw: u16,
}

impl ScaledU16Field {
    /// Creates a field with the given initial natural value, scale, and offset.
    pub fn new(initial: f64, scale: f64, offset: f64) -> Self {
        let mut field = Self {
            scale,
            offset,
            raw: 0,
        };
        field.set_natural(initial);
        field
    }

    /// The clamped raw integer that goes on the wire.
    pub fn raw(&self) -> u16 {
        self.raw
    }

    /// Natural value represented by the current raw integer.
    pub fn natural(&self) -> f64 {
        f64::from(self.raw) * self.scale - self.offset
    }

    /// Stores `natural` as `(natural + offset) / scale`, clamped to `0..=65535`.
    pub fn set_natural(&mut self, natural: f64) {
        self.raw = clamp_raw((natural + self.offset) / self.scale);
    }
}

/// One element of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Float(FloatField),
    ScaledU16(ScaledU16Field),
    Bits(BitField),
}

impl Field {
    /// A floating field holding `initial`.
    pub fn float(initial: f64) -> Self {
        Field::Float(FloatField { value: initial })
    }

    /// A scaled, clamped unsigned 16-bit field.
    pub fn scaled_u16(initial: f64, scale: f64, offset: f64) -> Self {
        Field::ScaledU16(ScaledU16Field::new(initial, scale, offset))
    }

    /// Wraps an already-declared bit field.
    pub fn bits(field: BitField) -> Self {
        Field::Bits(field)
    }

    pub fn scale(&self) -> f64 {
        match self {
            Field::ScaledU16(f) => f.scale,
            Field::Float(_) | Field::Bits(_) => 1.0,
        }
    }

    pub fn offset(&self) -> f64 {
        match self {
            Field::ScaledU16(f) => f.offset,
            Field::Float(_) | Field::Bits(_) => 0.0,
        }
    }

    /// Number of bytes this field occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            Field::Float(_) => 8,
            Field::ScaledU16(_) => 2,
            Field::Bits(b) => b.encoded_len(),
        }
    }

    /// Current natural value.  For bit fields this is the aggregate integer.
    pub fn value(&self) -> f64 {
        match self {
            Field::Float(f) => f.value,
            Field::ScaledU16(f) => f.natural(),
            Field::Bits(b) => f64::from(b.value()),
        }
    }

    /// Assigns a natural value using the field kind's own rules.
    ///
    /// # Errors
    ///
    /// Only bit fields can fail: the value must be a non-negative integer that
    /// fits in the base width.
    pub fn set_value(&mut self, value: f64) -> Result<(), IcdError> {
        match self {
            Field::Float(f) => f.value = value,
            Field::ScaledU16(f) => f.set_natural(value),
            Field::Bits(b) => {
                let raw = checked_unsigned(value, b.base_width())?;
                b.set_value(raw)?;
            }
        }
        Ok(())
    }

    /// Appends this field's wire representation to `buf`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Field::Float(f) => buf.extend_from_slice(&encode_f64(f.value)),
            Field::ScaledU16(f) => buf.extend_from_slice(&encode_u16(f.raw)),
            Field::Bits(b) => b.write_to(buf),
        }
    }

    /// Returns this field's wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf
    }

    /// Decodes this field from `bytes` at `offset`, returning the number of
    /// bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::InsufficientData`] if the slice is too short.
    pub fn parse(&mut self, bytes: &[u8], offset: usize) -> Result<usize, IcdError> {
        match self {
            Field::Float(f) => {
                f.value = try_decode_f64(bytes, offset)?;
                Ok(8)
            }
            Field::ScaledU16(f) => {
                f.raw = try_decode_u16(bytes, offset)?;
                Ok(2)
            }
            Field::Bits(b) => b.parse(bytes, offset),
        }
    }

    /// Short kind name used in console listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Field::Float(_) => "float",
            Field::ScaledU16(_) => "scaled-u16",
            Field::Bits(_) => "bits",
        }
    }
}

fn clamp_raw(x: f64) -> u16 {
    if x.is_nan() {
        return 0;
    }
    x.round().clamp(0.0, SCALED_U16_MAX) as u16
}

// ── Tests ─────────────────────────────────────────────────────────────────────
