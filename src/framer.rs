//! Delimiter framing over a shared lossy ring.
//!
//! The receive side holds a [`FrameProducer`] (an interrupt handler on the
//! target, a reader task on the host) and the command loop holds the single
//! [`Framer`]. Both talk to the same ring; every ring operation takes the
//! lock for that one operation only, so the producer can run between any two
//! consumer reads.

use crate::ringbuf::RingBuffer;
use crate::RING_CAPACITY;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("message exceeded {0} bytes before a delimiter was seen")]
    Truncated(usize),
    #[error("ring drained after {0} bytes without a delimiter")]
    Underrun(usize),
}

#[derive(Debug)]
struct Shared<const N: usize> {
    ring: Mutex<RingBuffer<N>>,
    // Delimiters received but not yet drained by the consumer
    pending: AtomicUsize,
    delimiter: u8,
}

impl<const N: usize> Shared<N> {
    fn ring(&self) -> MutexGuard<'_, RingBuffer<N>> {
        // Ring mutations never panic midway, so a poisoned ring is still consistent
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer half. Cheap to clone; every clone feeds the same ring.
#[derive(Debug)]
pub struct FrameProducer<const N: usize = RING_CAPACITY> {
    shared: Arc<Shared<N>>,
}

impl<const N: usize> Clone for FrameProducer<N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<const N: usize> FrameProducer<N> {
    /// Byte-received path. Never blocks waiting for the consumer.
    pub fn receive_byte(&self, byte: u8) {
        self.shared.ring().write(byte);

        if byte == self.shared.delimiter {
            self.shared.pending.fetch_add(1, Ordering::Release);
        }
    }

    pub fn receive(&self, bytes: &[u8]) {
        for &byte in bytes {
            self.receive_byte(byte);
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.shared.delimiter
    }
}

/// Lossy single-producer/single-consumer byte channel over one ring.
pub fn channel<const N: usize>(delimiter: u8) -> (FrameProducer<N>, Framer<N>) {
    let framer = Framer::new(delimiter);
    (framer.producer(), framer)
}

/// Consumer half. Exactly one exists per ring.
#[derive(Debug)]
pub struct Framer<const N: usize = RING_CAPACITY> {
    shared: Arc<Shared<N>>,
}

impl<const N: usize> Framer<N> {
    pub fn new(delimiter: u8) -> Self {
        Self {
            shared: Arc::new(Shared {
                ring: Mutex::new(RingBuffer::new()),
                pending: AtomicUsize::new(0),
                delimiter,
            }),
        }
    }

    pub fn producer(&self) -> FrameProducer<N> {
        FrameProducer {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.shared.delimiter
    }

    pub fn is_message_ready(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire) > 0
    }

    pub fn pending_messages(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Lower the ready flag by one drained message.
    pub fn clear_ready(&self) {
        // Saturating: a producer racing with a reset must not wrap the counter
        let _ = self
            .shared
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn buffered_len(&self) -> usize {
        self.shared.ring().len()
    }

    /// Copy one framed message into `dst`.
    ///
    /// On success the delimiter's slot in `dst` holds a `0` terminator and
    /// the message length (delimiter excluded) is returned. The ready flag is
    /// left untouched; the caller clears it once the message is handled.
    pub fn pull_message(&self, dst: &mut [u8]) -> Result<usize, FramingError> {
        for i in 0..dst.len() {
            let byte = match self.shared.ring().read_next() {
                Some(byte) => byte,
                None => return Err(FramingError::Underrun(i)),
            };

            if byte == self.shared.delimiter {
                dst[i] = 0;
                return Ok(i);
            }
            dst[i] = byte;
        }

        Err(FramingError::Truncated(dst.len()))
    }

    /// Drop bytes up to and including the next delimiter.
    ///
    /// Returns the number of bytes dropped, delimiter included.
    pub fn discard_until_delimiter(&self) -> usize {
        let mut dropped = 0;
        while let Some(byte) = self.shared.ring().read_next() {
            dropped += 1;
            if byte == self.shared.delimiter {
                break;
            }
        }
        dropped
    }

    /// Non-blocking pull: `WouldBlock` until a delimiter has arrived.
    ///
    /// A truncated message is skipped through its delimiter so the next poll
    /// starts on a message boundary.
    pub fn poll_message(&self, dst: &mut [u8]) -> nb::Result<usize, FramingError> {
        if !self.is_message_ready() {
            return Err(nb::Error::WouldBlock);
        }

        let result = self.pull_message(dst);
        if let Err(FramingError::Truncated(_)) = result {
            self.discard_until_delimiter();
        }
        self.clear_ready();

        result.map_err(nb::Error::Other)
    }

    /// Forget every buffered byte and pending message.
    pub fn reset(&self) {
        self.shared.ring().clear();
        self.shared.pending.store(0, Ordering::Release);
    }
}
