//! OBC link context.
//!
//! [`ObcInterface`] owns the framer and the transport for the lifetime of the
//! link. Configuring it hands the transport a [`FrameProducer`] so received
//! bytes land in the ring; tearing it down releases the transport again.

use crate::commands::Reply;
use crate::framer::{self, FrameProducer, Framer};
use crate::TX_BUFFER_SIZE;
use arrayvec::ArrayVec;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

/// Reply body plus its delimiter.
pub const TX_FRAME_SIZE: usize = TX_BUFFER_SIZE + 1;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport already initialised")]
    AlreadyInitialised,
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("transport failed to start: {0}")]
    Transport(#[from] TransportError),
    #[error("reply of {0} bytes does not fit a transmit frame")]
    FrameOverflow(usize),
    #[error("short transmit: {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },
}

/// Physical link to the OBC.
pub trait Transport {
    /// Start delivering received bytes to `rx`.
    fn init(&mut self, rx: FrameProducer) -> Result<(), TransportError>;
    fn deinit(&mut self);
    /// Best effort; returns the number of bytes actually sent.
    fn transmit(&mut self, bytes: &[u8]) -> usize;
}

#[derive(Debug)]
pub struct ObcInterface<T: Transport> {
    framer: Framer,
    transport: T,
}

impl<T: Transport> ObcInterface<T> {
    pub fn configure(mut transport: T, delimiter: u8) -> Result<Self, InterfaceError> {
        let (producer, framer) = framer::channel(delimiter);
        transport.init(producer)?;

        info!("OBC interface configured, delimiter {:?}", char::from(delimiter));
        Ok(Self { framer, transport })
    }

    /// Stop the transport and hand it back.
    pub fn teardown(mut self) -> T {
        self.transport.deinit();
        info!("OBC interface torn down");
        self.transport
    }

    pub fn framer(&self) -> &Framer {
        &self.framer
    }

    pub fn producer(&self) -> FrameProducer {
        self.framer.producer()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Frame `body` with the delimiter and transmit it in one call.
    pub fn send_raw(&mut self, body: &str) -> Result<usize, InterfaceError> {
        let mut frame: ArrayVec<u8, TX_FRAME_SIZE> = ArrayVec::new();
        frame
            .try_extend_from_slice(body.as_bytes())
            .map_err(|_| InterfaceError::FrameOverflow(body.len()))?;
        frame
            .try_push(self.framer.delimiter())
            .map_err(|_| InterfaceError::FrameOverflow(body.len()))?;

        let sent = self.transport.transmit(&frame);
        if sent != frame.len() {
            warn!("Short transmit: {} of {} bytes", sent, frame.len());
            return Err(InterfaceError::ShortWrite {
                sent,
                expected: frame.len(),
            });
        }
        Ok(sent)
    }

    pub fn send_reply(&mut self, reply: &Reply) -> Result<usize, InterfaceError> {
        self.send_raw(reply.as_str())
    }
}

#[derive(Debug, Default)]
struct MemoryLink {
    rx: Option<FrameProducer>,
    sent: Vec<u8>,
    inits: u32,
}

/// In-process loopback used by tests and the doc examples.
///
/// Clones share the same link, so a test can keep one handle for injecting
/// bytes and reading back transmissions while the interface owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    link: Arc<Mutex<MemoryLink>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn link(&self) -> MutexGuard<'_, MemoryLink> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver bytes as if received from the OBC. Dropped when not initialised.
    pub fn inject(&self, bytes: &[u8]) {
        let rx = self.link().rx.clone();
        if let Some(rx) = rx {
            rx.receive(bytes);
        }
    }

    pub fn is_active(&self) -> bool {
        self.link().rx.is_some()
    }

    pub fn init_count(&self) -> u32 {
        self.link().inits
    }

    pub fn sent(&self) -> Vec<u8> {
        self.link().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut self.link().sent)
    }

    pub fn take_sent_string(&self) -> String {
        String::from_utf8_lossy(&self.take_sent()).into_owned()
    }
}

impl Transport for MemoryTransport {
    fn init(&mut self, rx: FrameProducer) -> Result<(), TransportError> {
        let mut link = self.link();
        if link.rx.is_some() {
            return Err(TransportError::AlreadyInitialised);
        }
        link.rx = Some(rx);
        link.inits += 1;
        Ok(())
    }

    fn deinit(&mut self) {
        self.link().rx = None;
    }

    fn transmit(&mut self, bytes: &[u8]) -> usize {
        self.link().sent.extend_from_slice(bytes);
        bytes.len()
    }
}
