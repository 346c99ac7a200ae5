//! The message container: an ordered, named set of fields behind a fixed
//! 4-byte header.
//!
//! Wire format:
//! ```text
//! [sync:1 = 0xAA][id:1][seq:1][declared_len:1][fields...][crc slot]
//! ```
//! The frame is always `4 + declared_len` bytes long.  `declared_len` is
//! supplied by the message definition and nominally includes a trailing CRC;
//! the CRC is **not** computed in this version, so whatever the fields do
//! not fill is left as zero bytes.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::protocol::bit_field::checked_unsigned;
use crate::protocol::byte_order::require_len;
use crate::protocol::error::IcdError;
use crate::protocol::field::Field;
use crate::protocol::sequence::SequenceCounter;

/// Constant first byte of every frame.
pub const SYNC_BYTE: u8 = 0xAA;

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// The decoded 4-byte frame header.
///
/// Hosts use this to route an incoming frame to the right [`Message`]
/// definition before asking that message to parse the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub id: u8,
    pub sequence: u8,
    pub declared_length: u8,
}

impl FrameHeader {
    /// Decodes the header at the start of `bytes`.
    ///
    /// # Errors
    ///
    /// - [`IcdError::InsufficientData`] if fewer than 4 bytes are available.
    /// - [`IcdError::BadSync`] if the first byte is not [`SYNC_BYTE`].
    pub fn decode(bytes: &[u8]) -> Result<Self, IcdError> {
        require_len(bytes, 0, FRAME_HEADER_SIZE)?;
        if bytes[0] != SYNC_BYTE {
            return Err(IcdError::BadSync(bytes[0]));
        }
        Ok(Self {
            id: bytes[1],
            sequence: bytes[2],
            declared_length: bytes[3],
        })
    }

    /// Total frame size implied by this header.
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + usize::from(self.declared_length)
    }
}

/// One wire-format packet type.
///
/// Fields are kept in a single ordered list (wire order); the name index
/// stores positions into that list, so both views always see the same field
/// instances.
#[derive(Debug)]
pub struct Message {
    name: String,
    id: u8,
    declared_length: u8,
    sequence: SequenceCounter,
    last_received_sequence: Option<u8>,
    fields: Vec<(String, Field)>,
    index: HashMap<String, usize>,
}

impl Message {
    /// Creates an empty message definition.
    pub fn new(name: impl Into<String>, id: u8, declared_length: u8) -> Self {
        Self {
            name: name.into(),
            id,
            declared_length,
            sequence: SequenceCounter::new(),
            last_received_sequence: None,
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Appends a field.  The order of calls is the wire order.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::DuplicateField`] if the name is already used.
    pub fn add_field(&mut self, name: &str, field: Field) -> Result<(), IcdError> {
        if self.index.contains_key(name) {
            return Err(IcdError::DuplicateField(name.to_string()));
        }
        self.index.insert(name.to_string(), self.fields.len());
        self.fields.push((name.to_string(), field));
        Ok(())
    }

    /// Builder-style [`add_field`](Self::add_field).
    ///
    /// # Errors
    ///
    /// Same as [`add_field`](Self::add_field).
    pub fn with_field(mut self, name: &str, field: Field) -> Result<Self, IcdError> {
        self.add_field(name, field)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn declared_length(&self) -> u8 {
        self.declared_length
    }

    /// Sequence number the next [`serialize`](Self::serialize) will use.
    pub fn next_sequence(&self) -> u8 {
        self.sequence.current()
    }

    /// Sequence byte of the last frame accepted by [`parse_frame`](Self::parse_frame).
    pub fn last_received_sequence(&self) -> Option<u8> {
        self.last_received_sequence
    }

    /// Fields in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Looks a field up by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i].1)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.fields[i].1),
            None => None,
        }
    }

    /// Encoded size of all fields (excluding header and CRC slot).
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|(_, f)| f.encoded_len()).sum()
    }

    /// Every addressable item: each field name, plus `field.sub` for every
    /// bit sub-field.
    pub fn item_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (name, field) in &self.fields {
            names.push(name.clone());
            if let Field::Bits(bits) = field {
                names.extend(bits.subfields().iter().map(|s| format!("{name}.{}", s.name())));
            }
        }
        names
    }

    /// Reads an item's natural value.
    ///
    /// `item` is either a field name or `field.subfield` for bit fields.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::UnknownField`] or [`IcdError::UnknownSubfield`]
    /// for names that do not resolve.
    pub fn get(&self, item: &str) -> Result<f64, IcdError> {
        if let Some(field) = self.field(item) {
            return Ok(field.value());
        }
        let (field_name, sub) = split_item(item)?;
        match self.field(field_name) {
            Some(Field::Bits(bits)) => bits.subfield(sub).map(f64::from),
            Some(_) => Err(IcdError::UnknownSubfield(item.to_string())),
            None => Err(IcdError::UnknownField(field_name.to_string())),
        }
    }

    /// Writes an item's natural value using the field's clamp/pack rules.
    ///
    /// # Errors
    ///
    /// Unknown names as for [`get`](Self::get); bit fields additionally
    /// reject values that are fractional, negative, or too wide.
    pub fn set(&mut self, item: &str, value: f64) -> Result<(), IcdError> {
        if let Some(field) = self.field_mut(item) {
            return field.set_value(value);
        }
        let (field_name, sub) = split_item(item)?;
        match self.field_mut(field_name) {
            Some(Field::Bits(bits)) => {
                let width = bits
                    .subfields()
                    .iter()
                    .find(|s| s.name() == sub)
                    .map(|s| s.width())
                    .ok_or_else(|| IcdError::UnknownSubfield(sub.to_string()))?;
                bits.set_subfield(sub, checked_unsigned(value, width)?)
            }
            Some(_) => Err(IcdError::UnknownSubfield(item.to_string())),
            None => Err(IcdError::UnknownField(field_name.to_string())),
        }
    }

    /// Encodes the message into a `declared_length + 4` byte frame and
    /// advances the sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::PayloadTooLong`] if the fields encode to more bytes
    /// than `declared_length`; the sequence number is not consumed.
    pub fn serialize(&self) -> Result<Vec<u8>, IcdError> {
        let declared = usize::from(self.declared_length);
        let actual = self.payload_len();
        if actual > declared {
            warn!(
                "message '{}' fields need {actual} bytes but only {declared} are declared",
                self.name
            );
            return Err(IcdError::PayloadTooLong { declared, actual });
        }

        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + declared);
        buf.push(SYNC_BYTE);
        buf.push(self.id);
        buf.push(self.sequence.next());
        buf.push(self.declared_length);
        for (_, field) in &self.fields {
            field.write_to(&mut buf);
        }
        // CRC slot: reserved but not computed.
        buf.resize(FRAME_HEADER_SIZE + declared, 0);
        Ok(buf)
    }

    /// Decodes every field from `bytes` starting at `start`, in wire order.
    ///
    /// Returns the number of bytes consumed.  On error, fields decoded before
    /// the failure keep their new values.
    ///
    /// # Errors
    ///
    /// Returns [`IcdError::InsufficientData`] if the slice runs out.
    pub fn parse(&mut self, bytes: &[u8], start: usize) -> Result<usize, IcdError> {
        require_len(bytes, start, self.payload_len())?;
        let mut cursor = start;
        for (_, field) in &mut self.fields {
            cursor += field.parse(bytes, cursor)?;
        }
        Ok(cursor - start)
    }

    /// Decodes a complete frame (header + payload) addressed to this message.
    ///
    /// Returns the total frame length consumed.
    ///
    /// # Errors
    ///
    /// - [`IcdError::BadSync`], [`IcdError::IdMismatch`], or
    ///   [`IcdError::LengthMismatch`] if the header does not match this
    ///   definition.
    /// - [`IcdError::InsufficientData`] if the frame is truncated.
    pub fn parse_frame(&mut self, bytes: &[u8]) -> Result<usize, IcdError> {
        let header = FrameHeader::decode(bytes)?;
        if header.id != self.id {
            debug!(
                "frame for id {:#04x} offered to '{}' ({:#04x})",
                header.id, self.name, self.id
            );
            return Err(IcdError::IdMismatch {
                expected: self.id,
                actual: header.id,
            });
        }
        if header.declared_length != self.declared_length {
            return Err(IcdError::LengthMismatch {
                expected: self.declared_length,
                actual: header.declared_length,
            });
        }
        require_len(bytes, 0, header.frame_len())?;
        self.parse(bytes, FRAME_HEADER_SIZE)?;
        self.last_received_sequence = Some(header.sequence);
        trace!("'{}' accepted frame seq {}", self.name, header.sequence);
        Ok(header.frame_len())
    }
}

fn split_item(item: &str) -> Result<(&str, &str), IcdError> {
    item.rsplit_once('.')
        .ok_or_else(|| IcdError::UnknownField(item.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
