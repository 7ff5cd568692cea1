//! # ADCS Command Front End
//!
//! Command and telemetry front end for a satellite attitude determination and
//! control (ADCS) board. The onboard computer (OBC) talks to it over a serial
//! link with short `!`-terminated JSON-like commands; this crate turns that
//! byte stream back into messages, tokenizes them without allocating, routes
//! each command to the owning subsystem and formats the reply.
//!
//! ## Features
//!
//! - **Lossy ring buffer**: fixed capacity, overwrite-oldest receive path
//! - **Delimiter framing**: producer/consumer split usable from an interrupt or a thread
//! - **Allocation-free tokenizer**: flat token pool with child iteration
//! - **Table-driven router**: reaction wheels, magnetorquers, sun sensors,
//!   magnetometer, IMU and power mode
//! - **Host emulation**: in-memory subsystems plus stdio/TCP transports
//!
//! ## Quick Start
//!
//! ```rust
//! use adcs::{AdcsConfig, AdcsController, EmulatedHardware, MemoryTransport};
//!
//! let transport = MemoryTransport::new();
//! let mut controller =
//!     AdcsController::new(transport.clone(), EmulatedHardware::new(), AdcsConfig::default())
//!         .unwrap();
//!
//! transport.inject(br#"{"fwVersion":"read"}!"#);
//! controller.run_pending().unwrap();
//!
//! assert!(transport.take_sent_string().starts_with(r#"{"fwVersion":"#));
//! ```
//!
//! ## Architecture
//!
//! - [`ringbuf`] - Fixed-capacity lossy byte ring
//! - [`framer`] - Delimiter framing and the ready flag
//! - [`jtok`] - Tokenizer, token pool and validity gate
//! - [`commands`] - Static command table and handlers
//! - [`subsystems`] - Subsystem traits and emulated implementations
//! - [`interface`] - OBC link context and transports
//! - [`host`] - Reader thread and raw terminal for the host emulator
//! - [`controller`] - Poll/parse/dispatch/reply loop
//! - [`config`] - Runtime configuration

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]

pub mod commands;
pub mod config;
pub mod controller;
pub mod framer;
pub mod host;
pub mod interface;
pub mod jtok;
pub mod ringbuf;
pub mod subsystems;

use static_assertions::const_assert;

/// Message delimiter agreed with the OBC.
pub const DELIMITER: u8 = b'!';

/// Byte that stops the host emulator's receive task (Ctrl-D).
pub const QUIT_BYTE: u8 = 0x04;

pub const RING_CAPACITY: usize = 2000;
pub const MAX_MESSAGE_LEN: usize = 500;
pub const TX_BUFFER_SIZE: usize = 500;
pub const TOKEN_POOL_SIZE: usize = 32;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const HW_VERSION: &str = "adcs-hw-emulated";

// A whole message (plus its delimiter) must fit in the ring
const_assert!(MAX_MESSAGE_LEN < RING_CAPACITY);
// Room for the reply delimiter
const_assert!(TX_BUFFER_SIZE > 1);
// Object, key and verb at minimum
const_assert!(TOKEN_POOL_SIZE >= 3);

pub use commands::{CommandError, Reply};
pub use config::AdcsConfig;
pub use controller::{AdcsController, ControllerStats, PollOutcome};
pub use framer::{FrameProducer, Framer, FramingError};
pub use interface::{MemoryTransport, ObcInterface, Transport};
pub use jtok::{ParseError, Token, TokenKind, TokenPool, Tokens};
pub use ringbuf::RingBuffer;
pub use subsystems::{AdcsHardware, Axis, EmulatedHardware};
