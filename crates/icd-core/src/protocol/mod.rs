//! Protocol module containing the byte-order helpers, field kinds, and the
//! message container.

pub mod bit_field;
pub mod byte_order;
pub mod error;
pub mod field;
pub mod message;
pub mod sequence;

pub use bit_field::{BitField, Subfield};
pub use error::IcdError;
pub use field::Field;
pub use message::{FrameHeader, Message};
pub use sequence::SequenceCounter;
