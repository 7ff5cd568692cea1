use crate::commands::{self, BuildInfo, CommandContext, CommandError, Reply, JSON_FORMAT_REPLY};
use crate::config::{AdcsConfig, ConfigError};
use crate::framer::{FrameProducer, FramingError};
use crate::interface::{InterfaceError, ObcInterface, Transport};
use crate::jtok::{self, ParseError, TokenPool};
use crate::subsystems::AdcsHardware;
use crate::{MAX_MESSAGE_LEN, TOKEN_POOL_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("interface error: {0}")]
    Interface(#[from] InterfaceError),
}

/// What happened to one pulled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Replied,
    FramingFailed(FramingError),
    ParseFailed(ParseError),
    /// Parsed, but not an object led by a string key.
    NotACommand,
    CommandFailed(CommandError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStats {
    pub messages: u32,
    pub replies: u32,
    pub framing_errors: u32,
    pub parse_errors: u32,
    pub gate_rejections: u32,
    pub unknown_commands: u32,
    pub rejected_commands: u32,
    pub transmit_errors: u32,
    pub last_process_time_us: u32,
}

/// Consumer side of the OBC link: pull, parse, route, reply.
pub struct AdcsController<T: Transport, H: AdcsHardware> {
    interface: ObcInterface<T>,
    hw: H,
    config: AdcsConfig,

    // Preallocated per-message buffers
    pool: TokenPool<TOKEN_POOL_SIZE>,
    message: [u8; MAX_MESSAGE_LEN],

    stats: ControllerStats,
}

impl<T: Transport, H: AdcsHardware> AdcsController<T, H> {
    pub fn new(transport: T, hw: H, config: AdcsConfig) -> Result<Self, ControllerError> {
        config.validate()?;
        let interface = ObcInterface::configure(transport, config.delimiter)?;

        Ok(Self {
            interface,
            hw,
            config,
            pool: TokenPool::new(),
            message: [0; MAX_MESSAGE_LEN],
            stats: ControllerStats::default(),
        })
    }

    /// Handle at most one framed message. `Ok(None)` when nothing is ready.
    pub fn poll(&mut self) -> Result<Option<PollOutcome>, ControllerError> {
        let limit = self.config.max_message_len;
        let len = match self.interface.framer().poll_message(&mut self.message[..limit]) {
            Err(nb::Error::WouldBlock) => return Ok(None),
            Err(nb::Error::Other(e)) => {
                warn!("Dropping message: {}", e);
                let outcome = PollOutcome::FramingFailed(e);
                self.record(outcome, Instant::now());
                self.respond(Err(JSON_FORMAT_REPLY))?;
                return Ok(Some(outcome));
            }
            Ok(len) => len,
        };

        let started = Instant::now();
        let (outcome, response) =
            evaluate(&self.message[..len], &mut self.pool, &mut self.hw, &self.config);
        self.record(outcome, started);
        self.respond(response)?;

        Ok(Some(outcome))
    }

    /// Drain every message currently flagged ready.
    pub fn run_pending(&mut self) -> Result<usize, ControllerError> {
        let mut handled = 0;
        while self.poll()?.is_some() {
            handled += 1;
        }
        Ok(handled)
    }

    /// Run one already-framed message (delimiter stripped) through the pipeline.
    pub fn process_message(&mut self, message: &[u8]) -> Result<PollOutcome, ControllerError> {
        let started = Instant::now();
        let (outcome, response) = evaluate(message, &mut self.pool, &mut self.hw, &self.config);
        self.record(outcome, started);
        self.respond(response)?;
        Ok(outcome)
    }

    fn record(&mut self, outcome: PollOutcome, started: Instant) {
        let stats = &mut self.stats;
        stats.messages = stats.messages.saturating_add(1);

        let counter = match outcome {
            PollOutcome::Replied => &mut stats.replies,
            PollOutcome::FramingFailed(_) => &mut stats.framing_errors,
            PollOutcome::ParseFailed(_) => &mut stats.parse_errors,
            PollOutcome::NotACommand => &mut stats.gate_rejections,
            PollOutcome::CommandFailed(CommandError::UnknownCommand) => &mut stats.unknown_commands,
            PollOutcome::CommandFailed(_) => &mut stats.rejected_commands,
        };
        *counter = counter.saturating_add(1);

        stats.last_process_time_us = started.elapsed().as_micros() as u32;
    }

    fn respond(&mut self, response: Result<Reply, &'static str>) -> Result<(), ControllerError> {
        let sent = match response {
            Ok(reply) => self.interface.send_reply(&reply),
            Err(diagnostic) => self.interface.send_raw(diagnostic),
        };

        match sent {
            Ok(_) => Ok(()),
            Err(InterfaceError::ShortWrite { sent, expected }) => {
                // Link stays up; the OBC will time out and retry
                warn!("Reply truncated on the wire ({} of {} bytes)", sent, expected);
                self.stats.transmit_errors = self.stats.transmit_errors.saturating_add(1);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn producer(&self) -> FrameProducer {
        self.interface.producer()
    }

    pub fn interface(&self) -> &ObcInterface<T> {
        &self.interface
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn config(&self) -> &AdcsConfig {
        &self.config
    }

    pub fn get_stats(&self) -> &ControllerStats {
        &self.stats
    }

    /// Tear the link down and return the transport and hardware.
    pub fn shutdown(self) -> (T, H) {
        (self.interface.teardown(), self.hw)
    }
}

/// Parse, gate and route one message.
fn evaluate<H: AdcsHardware>(
    message: &[u8],
    pool: &mut TokenPool<TOKEN_POOL_SIZE>,
    hw: &mut H,
    config: &AdcsConfig,
) -> (PollOutcome, Result<Reply, &'static str>) {
    if let Err(e) = jtok::parse(message, pool) {
        debug!(code = e.code(), "Parse failed: {}", e);
        return (PollOutcome::ParseFailed(e), Err(JSON_FORMAT_REPLY));
    }

    if !jtok::is_valid_top_level(pool.as_slice()) {
        debug!(tokens = pool.len(), "Message is not a command object");
        return (PollOutcome::NotACommand, Err(JSON_FORMAT_REPLY));
    }

    let mut ctx = CommandContext {
        hw,
        info: BuildInfo {
            fw_version: &config.fw_version,
            hw_version: &config.hw_version,
        },
    };

    match commands::dispatch(pool.view(message), &mut ctx) {
        Ok(reply) => {
            debug!("Reply: {}", reply);
            (PollOutcome::Replied, Ok(reply))
        }
        Err(e) => {
            warn!("Command rejected: {}", e);
            (PollOutcome::CommandFailed(e), Err(e.reply_body()))
        }
    }
}
