//! Error type shared by every part of the ICD codec.

use thiserror::Error;

/// Errors raised while defining, mutating, encoding, or decoding messages.
///
/// Definition-time variants (`InvalidBitLength`, `SubfieldOutOfRange`, ...)
/// signal programming errors in a message-type definition; they abort the
/// offending call and leave the field untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IcdError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// A bit field was declared with a length outside `1..=32`.
    #[error("invalid bit field length {0}: must be between 1 and 32")]
    InvalidBitLength(u32),

    /// A sub-field was declared with zero width.
    #[error("sub-field '{0}' must be at least one bit wide")]
    ZeroWidthSubfield(String),

    /// A sub-field does not fit inside the bit field's base container.
    #[error("sub-field '{name}' at bit {offset} with width {width} exceeds {base_width}-bit container")]
    SubfieldOutOfRange {
        name: String,
        offset: u32,
        width: u32,
        base_width: u32,
    },

    /// A sub-field name was declared twice on the same bit field.
    #[error("duplicate sub-field '{0}'")]
    DuplicateSubfield(String),

    /// No sub-field with this name exists.
    #[error("unknown sub-field '{0}'")]
    UnknownSubfield(String),

    /// A value does not fit in the number of bits available to it.
    #[error("value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: f64, bits: u32 },

    /// Bit-packed values must be whole numbers.
    #[error("value {0} is not a non-negative integer")]
    NotAnInteger(f64),

    /// A field name was declared twice on the same message.
    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    /// No field with this name exists on the message.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// The fields encode to more bytes than the message declares.
    #[error("fields encode to {actual} bytes but declared length is {declared}")]
    PayloadTooLong { declared: usize, actual: usize },

    /// The first byte of a frame was not the sync byte.
    #[error("bad sync byte: 0x{0:02X}")]
    BadSync(u8),

    /// A frame carried a different message id than the message decoding it.
    #[error("message id mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    IdMismatch { expected: u8, actual: u8 },

    /// A frame declared a different payload length than the message definition.
    #[error("declared length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: u8, actual: u8 },
}
