//! Rolling one-byte sequence counter for ICD message frames.
//!
//! # What is a sequence number? (for beginners)
//!
//! Every frame a message serializes carries a sequence byte in its header.
//! A receiver that sees 7, 8, 10 knows frame 9 went missing; one that sees
//! 8 twice knows it got a duplicate.
//!
//! The ICD only reserves one byte for it, so the counter wraps from 255 back
//! to 0.  It can never go negative or above 255 because it *is* a `u8`.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU8` internally so a message can be serialized
//! through a shared reference.  `fetch_add` on an atomic integer wraps on
//! overflow instead of panicking, which is exactly the rolling behaviour the
//! wire format wants.

use std::sync::atomic::{AtomicU8, Ordering};

/// A rolling 8-bit sequence counter.
///
/// # Examples
///
/// ```rust
/// use icd_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU8,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose next value is `value`.
    pub fn starting_at(value: u8) -> Self {
        Self {
            inner: AtomicU8::new(value),
        }
    }

    /// Returns the current sequence number and advances the counter,
    /// wrapping from 255 to 0.
    pub fn next(&self) -> u8 {
        // `Relaxed` is enough: the value orders frames, it does not publish
        // other memory.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) will hand out.
    pub fn current(&self) -> u8 {
        self.inner.load(Ordering::Relaxed)
    }
}
