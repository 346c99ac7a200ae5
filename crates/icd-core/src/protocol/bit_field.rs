//! Bit-packed fields: one byte, word, or double word subdivided into named
//! sub-fields.
//!
//! # How the packing works (for beginners)
//!
//! A bit field owns a single unsigned integer (its *aggregate* value) and a
//! list of named bit ranges inside it.  Writing a sub-field clears its range
//! and ORs the new bits in; writing the aggregate re-reads every sub-field
//! from its range.  With sub-fields `a@0/1`, `b@1/3`, `c@4/6` on a 16-bit
//! field the layout is:
//!
//! ```text
//! bit: 15 ... 10 | 9 8 7 6 5 4 | 3 2 1 | 0
//!       unused   |      c      |   b   | a
//! ```
//!
//! The container is always 8, 16, or 32 bits: the smallest that holds the
//! declared length.  Sub-fields are not checked for overlap; two sub-fields
//! sharing bits simply observe each other's writes.

use crate::protocol::byte_order::{encode_u32, require_len, try_decode_u16, try_decode_u32};
use crate::protocol::error::IcdError;

/// One named bit range inside a [`BitField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    name: String,
    offset: u32,
    width: u32,
    value: u32,
}

impl Subfield {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the least-significant bit of this range.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Number of bits in this range (1–32).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current unsigned value of the range.
    pub fn value(&self) -> u32 {
        self.value
    }

    fn mask(&self) -> u32 {
        low_mask(self.width) << self.offset
    }
}

/// A field whose integer value is split into independently addressable
/// sub-fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitField {
    base_width: u32,
    value: u32,
    subfields: Vec<Subfield>,
}

impl BitField {
    /// Creates a bit field able to hold `bit_len` bits.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::InvalidBitLength`] if `bit_len` is 0 or above 32.
    pub fn new(bit_len: u32) -> Result<Self, IcdError> {
        let base_width = match bit_len {
            1..=8 => 8,
            9..=16 => 16,
            17..=32 => 32,
            _ => return Err(IcdError::InvalidBitLength(bit_len)),
        };
        Ok(Self {
            base_width,
            value: 0,
            subfields: Vec::new(),
        })
    }

    /// Container width in bits: 8, 16, or 32.
    pub fn base_width(&self) -> u32 {
        self.base_width
    }

    /// Number of bytes this field occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        (self.base_width / 8) as usize
    }

    /// Current aggregate value.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Declared sub-fields in declaration order.
    pub fn subfields(&self) -> &[Subfield] {
        &self.subfields
    }

    /// Declares a named sub-field of `width` bits starting at bit `offset`.
    ///
    /// The new sub-field immediately reflects the bits already present in the
    /// aggregate value.
    ///
    /// # Errors
    ///
    /// - [`IcdError::ZeroWidthSubfield`] when `width` is 0.
    /// - [`IcdError::SubfieldOutOfRange`] when `offset + width` exceeds the
    ///   base width.
    /// - [`IcdError::DuplicateSubfield`] when the name is already taken.
    pub fn add_subfield(&mut self, name: &str, offset: u32, width: u32) -> Result<(), IcdError> {
        if width == 0 {
            return Err(IcdError::ZeroWidthSubfield(name.to_string()));
        }
        if offset.saturating_add(width) > self.base_width {
            return Err(IcdError::SubfieldOutOfRange {
                name: name.to_string(),
                offset,
                width,
                base_width: self.base_width,
            });
        }
        if self.subfields.iter().any(|s| s.name == name) {
            return Err(IcdError::DuplicateSubfield(name.to_string()));
        }

        let mut sub = Subfield {
            name: name.to_string(),
            offset,
            width,
            value: 0,
        };
        sub.value = (self.value & sub.mask()) >> offset;
        self.subfields.push(sub);
        Ok(())
    }

    /// Builder-style [`add_subfield`](Self::add_subfield).
    ///
    /// # Errors
    ///
    /// Same as [`add_subfield`](Self::add_subfield).
    pub fn with_subfield(mut self, name: &str, offset: u32, width: u32) -> Result<Self, IcdError> {
        self.add_subfield(name, offset, width)?;
        Ok(self)
    }

    /// Reads the current value of a named sub-field.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::UnknownSubfield`] if no such sub-field exists.
    pub fn subfield(&self, name: &str) -> Result<u32, IcdError> {
        self.subfields
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.value)
            .ok_or_else(|| IcdError::UnknownSubfield(name.to_string()))
    }

    /// Writes a named sub-field and re-packs the aggregate value.
    ///
    /// # Errors
    ///
    /// - [`IcdError::UnknownSubfield`] if no such sub-field exists.
    /// - [`IcdError::ValueOutOfRange`] if `value` needs more than the
    ///   sub-field's width.
    pub fn set_subfield(&mut self, name: &str, value: u32) -> Result<(), IcdError> {
        let sub = self
            .subfields
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| IcdError::UnknownSubfield(name.to_string()))?;

        if value > low_mask(sub.width) {
            return Err(IcdError::ValueOutOfRange {
                value: f64::from(value),
                bits: sub.width,
            });
        }

        sub.value = value;
        let mask = sub.mask();
        self.value = (self.value & !mask) | ((value << sub.offset) & mask);

        // Overlapping sub-fields share bits, so refresh everyone else.
        self.unpack();
        Ok(())
    }

    /// Writes all bits at once and unpacks every sub-field.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::ValueOutOfRange`] if `value` does not fit in the
    /// base width.
    pub fn set_value(&mut self, value: u32) -> Result<(), IcdError> {
        if value > low_mask(self.base_width) {
            return Err(IcdError::ValueOutOfRange {
                value: f64::from(value),
                bits: self.base_width,
            });
        }
        self.value = value;
        self.unpack();
        Ok(())
    }

    /// Appends `base_width / 8` big-endian bytes to `buf`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        let full = encode_u32(self.value);
        buf.extend_from_slice(&full[4 - self.encoded_len()..]);
    }

    /// Reads `base_width / 8` bytes at `offset` and unpacks every sub-field.
    ///
    /// Returns the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::InsufficientData`] if the slice is too short.
    pub fn parse(&mut self, bytes: &[u8], offset: usize) -> Result<usize, IcdError> {
        let len = self.encoded_len();
        self.value = match len {
            1 => {
                require_len(bytes, offset, 1)?;
                u32::from(bytes[offset])
            }
            2 => u32::from(try_decode_u16(bytes, offset)?),
            _ => try_decode_u32(bytes, offset)?,
        };
        self.unpack();
        Ok(len)
    }

    fn unpack(&mut self) {
        let value = self.value;
        for sub in &mut self.subfields {
            sub.value = (value & sub.mask()) >> sub.offset;
        }
    }
}

/// Converts a console-supplied number into an unsigned value of `bits` bits.
///
/// # Errors
///
/// - [`IcdError::NotAnInteger`] for NaN, infinities, fractions, or negatives.
/// - [`IcdError::ValueOutOfRange`] when the value needs more than `bits` bits.
pub fn checked_unsigned(value: f64, bits: u32) -> Result<u32, IcdError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(IcdError::NotAnInteger(value));
    }
    if value > f64::from(low_mask(bits)) {
        return Err(IcdError::ValueOutOfRange { value, bits });
    }
    Ok(value as u32)
}

/// All-ones mask of the lowest `width` bits.
fn low_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
