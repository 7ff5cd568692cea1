//! Command table and subsystem handlers.
//!
//! Every command is an object whose first member is the command key:
//!
//! ```text
//! {"pwm_rw_x":"read"}
//! {"pwm_rw_x":"write","value":1234}
//! {"rw_speed":"write","value":[100,-250,0]}
//! {"sunSen":"reset"}
//! ```
//!
//! The table is scanned in order and the first entry whose key matches token 1
//! exactly wins. Handlers walk forward from the key with a [`TokenCursor`] and
//! either build a reply or reject the command without touching any subsystem.

use crate::jtok::{TokenKind, Tokens};
use crate::subsystems::{AdcsHardware, Axis, Direction, PowerMode, SubsystemError, AXIS_COUNT};
use crate::TX_BUFFER_SIZE;
use arrayvec::ArrayString;
use core::fmt::{self, Display, Write};
use core::str::FromStr;
use thiserror::Error;
use tracing::trace;

/// One outgoing reply body, delimiter not included.
pub type Reply = ArrayString<TX_BUFFER_SIZE>;

pub const JSON_FORMAT_REPLY: &str = r#"{"error":"json format"}"#;
pub const UNKNOWN_COMMAND_REPLY: &str = r#"{"ADCS":"unknown command"}"#;
pub const UNSUPPORTED_COMMAND_REPLY: &str = r#"{"ADCS":"unsupported command"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no handler registered for the command key")]
    UnknownCommand,
    #[error("verb not supported for this command")]
    UnsupportedVerb,
    #[error("write without a \"value\" member")]
    MissingValue,
    #[error("value does not parse to the expected type")]
    InvalidValue,
    #[error("expected {expected} values, got {found}")]
    AxisCount { expected: usize, found: usize },
    #[error("subsystem rejected the value: {0}")]
    Rejected(#[from] SubsystemError),
    #[error("reply does not fit the transmit buffer")]
    ReplyOverflow,
}

impl CommandError {
    /// Diagnostic body sent back to the OBC.
    pub fn reply_body(self) -> &'static str {
        match self {
            CommandError::UnknownCommand => UNKNOWN_COMMAND_REPLY,
            _ => UNSUPPORTED_COMMAND_REPLY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Read,
    Write,
    Reset,
}

/// Version strings reported by `fwVersion` / `hwVersion`.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo<'a> {
    pub fw_version: &'a str,
    pub hw_version: &'a str,
}

impl Default for BuildInfo<'static> {
    fn default() -> Self {
        Self {
            fw_version: crate::FW_VERSION,
            hw_version: crate::HW_VERSION,
        }
    }
}

pub struct CommandContext<'a> {
    pub hw: &'a mut dyn AdcsHardware,
    pub info: BuildInfo<'a>,
}

/// Position in the token stream, starting on the command key.
#[derive(Debug, Clone, Copy)]
pub struct TokenCursor<'a> {
    tokens: Tokens<'a>,
    index: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: Tokens<'a>, index: usize) -> Self {
        Self { tokens, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tokens(&self) -> Tokens<'a> {
        self.tokens
    }

    pub fn advance(&mut self) -> usize {
        self.index += 1;
        self.index
    }

    /// Step onto the verb following the key.
    pub fn verb(&mut self) -> Result<Verb, CommandError> {
        let index = self.advance();
        match self.tokens.bytes(index) {
            Some(b"read") => Ok(Verb::Read),
            Some(b"write") => Ok(Verb::Write),
            Some(b"reset") => Ok(Verb::Reset),
            _ => Err(CommandError::UnsupportedVerb),
        }
    }

    /// Step over the `"value"` key onto its payload token.
    pub fn value(&mut self) -> Result<usize, CommandError> {
        let key = self.advance();
        if !self.tokens.text_eq(key, "value") {
            return Err(CommandError::MissingValue);
        }

        let payload = self.advance();
        if self.tokens.get(payload).is_none() {
            return Err(CommandError::MissingValue);
        }
        Ok(payload)
    }
}

pub type Handler =
    fn(&mut TokenCursor<'_>, &mut CommandContext<'_>) -> Result<Reply, CommandError>;

pub struct CommandEntry {
    pub key: &'static str,
    pub handler: Handler,
}

static COMMAND_TABLE: &[CommandEntry] = &[
    CommandEntry { key: "fwVersion", handler: fw_version },
    CommandEntry { key: "hwVersion", handler: hw_version },
    CommandEntry { key: "pwm_rw_x", handler: pwm_rw_x },
    CommandEntry { key: "pwm_rw_y", handler: pwm_rw_y },
    CommandEntry { key: "pwm_rw_z", handler: pwm_rw_z },
    CommandEntry { key: "dir_rw_x", handler: dir_rw_x },
    CommandEntry { key: "dir_rw_y", handler: dir_rw_y },
    CommandEntry { key: "dir_rw_z", handler: dir_rw_z },
    CommandEntry { key: "rw_speed", handler: rw_speed },
    CommandEntry { key: "rw_current", handler: rw_current },
    CommandEntry { key: "mqtr_volts", handler: mqtr_volts },
    CommandEntry { key: "sunSen", handler: sun_sensors },
    CommandEntry { key: "magSen", handler: magnetometer },
    CommandEntry { key: "imu", handler: imu },
    CommandEntry { key: "current", handler: current },
    CommandEntry { key: "powerMode", handler: power_mode },
];

pub fn command_table() -> &'static [CommandEntry] {
    COMMAND_TABLE
}

/// Route a gated token sequence to its handler.
pub fn dispatch(tokens: Tokens<'_>, ctx: &mut CommandContext<'_>) -> Result<Reply, CommandError> {
    let entry = COMMAND_TABLE
        .iter()
        .find(|entry| tokens.text_eq(1, entry.key))
        .ok_or(CommandError::UnknownCommand)?;

    trace!(key = entry.key, "dispatching command");

    let mut cursor = TokenCursor::new(tokens, 1);
    (entry.handler)(&mut cursor, ctx)
}

fn reply(args: fmt::Arguments<'_>) -> Result<Reply, CommandError> {
    let mut out = Reply::new();
    out.write_fmt(args).map_err(|_| CommandError::ReplyOverflow)?;
    Ok(out)
}

fn written(key: &str) -> Result<Reply, CommandError> {
    reply(format_args!("{{\"{key}\":\"written\"}}"))
}

fn reset_done(key: &str) -> Result<Reply, CommandError> {
    reply(format_args!("{{\"{key}\":\"reset\"}}"))
}

/// Formats a slice as a bracketed, comma separated list.
struct List<'a, T>(&'a [T]);

impl<T: Display> Display for List<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('[')?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_char(',')?;
            }
            write!(f, "{value}")?;
        }
        f.write_char(']')
    }
}

/// Parse one scalar token; the whole token must be consumed.
fn parse_scalar<T: FromStr>(tokens: Tokens<'_>, index: usize) -> Result<T, CommandError> {
    match tokens.kind(index) {
        Some(TokenKind::Primitive | TokenKind::String) => {}
        _ => return Err(CommandError::InvalidValue),
    }

    tokens
        .text(index)
        .and_then(|text| text.parse().ok())
        .ok_or(CommandError::InvalidValue)
}

/// Parse a three-element array of scalars without touching any state.
fn parse_axes<T: FromStr + Copy + Default>(
    tokens: Tokens<'_>,
    index: usize,
) -> Result<[T; AXIS_COUNT], CommandError> {
    if tokens.kind(index) != Some(TokenKind::Array) {
        return Err(CommandError::InvalidValue);
    }

    let found = tokens.children(index).count();
    if found != AXIS_COUNT {
        return Err(CommandError::AxisCount {
            expected: AXIS_COUNT,
            found,
        });
    }

    let mut values = [T::default(); AXIS_COUNT];
    for (slot, child) in values.iter_mut().zip(tokens.children(index)) {
        *slot = parse_scalar(tokens, child)?;
    }
    Ok(values)
}

fn fw_version(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => reply(format_args!("{{\"fwVersion\":\"{}\"}}", ctx.info.fw_version)),
        _ => Err(CommandError::UnsupportedVerb),
    }
}

fn hw_version(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => reply(format_args!("{{\"hwVersion\":\"{}\"}}", ctx.info.hw_version)),
        _ => Err(CommandError::UnsupportedVerb),
    }
}

fn wheel_pwm(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
    key: &str,
    axis: Axis,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let pwm = ctx.hw.reaction_wheels().pwm(axis);
            reply(format_args!("{{\"{key}\":{pwm}}}"))
        }
        Verb::Write => {
            let index = cursor.value()?;
            let pwm: u16 = parse_scalar(cursor.tokens(), index)?;
            ctx.hw.reaction_wheels().set_pwm(axis, pwm)?;
            written(key)
        }
        Verb::Reset => Err(CommandError::UnsupportedVerb),
    }
}

fn pwm_rw_x(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    wheel_pwm(cursor, ctx, "pwm_rw_x", Axis::X)
}

fn pwm_rw_y(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    wheel_pwm(cursor, ctx, "pwm_rw_y", Axis::Y)
}

fn pwm_rw_z(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    wheel_pwm(cursor, ctx, "pwm_rw_z", Axis::Z)
}

fn wheel_direction(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
    key: &str,
    axis: Axis,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let direction = ctx.hw.reaction_wheels().direction(axis);
            reply(format_args!("{{\"{key}\":\"{}\"}}", direction.as_str()))
        }
        Verb::Write => {
            let index = cursor.value()?;
            let direction = cursor
                .tokens()
                .bytes(index)
                .and_then(Direction::from_wire)
                .ok_or(CommandError::InvalidValue)?;
            ctx.hw.reaction_wheels().set_direction(axis, direction)?;
            written(key)
        }
        Verb::Reset => Err(CommandError::UnsupportedVerb),
    }
}

fn dir_rw_x(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    wheel_direction(cursor, ctx, "dir_rw_x", Axis::X)
}

fn dir_rw_y(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    wheel_direction(cursor, ctx, "dir_rw_y", Axis::Y)
}

fn dir_rw_z(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    wheel_direction(cursor, ctx, "dir_rw_z", Axis::Z)
}

fn rw_speed(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let wheels = ctx.hw.reaction_wheels();
            let rpm = Axis::ALL.map(|axis| wheels.speed_rpm(axis));
            reply(format_args!("{{\"rw_speed\":{}}}", List(&rpm)))
        }
        Verb::Write => {
            let index = cursor.value()?;
            let rpm: [i16; AXIS_COUNT] = parse_axes(cursor.tokens(), index)?;
            ctx.hw.reaction_wheels().set_speeds_rpm(rpm)?;
            written("rw_speed")
        }
        Verb::Reset => Err(CommandError::UnsupportedVerb),
    }
}

fn rw_current(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let wheels = ctx.hw.reaction_wheels();
            let current = Axis::ALL.map(|axis| wheels.current_ma(axis));
            reply(format_args!("{{\"rw_current\":{}}}", List(&current)))
        }
        _ => Err(CommandError::UnsupportedVerb),
    }
}

fn mqtr_volts(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let coils = ctx.hw.magnetorquers();
            let mv = Axis::ALL.map(|axis| coils.coil_voltage_mv(axis));
            reply(format_args!("{{\"mqtr_volts\":{}}}", List(&mv)))
        }
        Verb::Write => {
            let index = cursor.value()?;
            let mv: [i16; AXIS_COUNT] = parse_axes(cursor.tokens(), index)?;
            ctx.hw.magnetorquers().set_coil_voltages_mv(mv)?;
            written("mqtr_volts")
        }
        Verb::Reset => Err(CommandError::UnsupportedVerb),
    }
}

fn sun_sensors(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let reading = ctx.hw.sun_sensors().read();
            reply(format_args!(
                "{{\"sunSen\":{{\"lux\":{},\"temp\":{}}}}}",
                List(&reading.lux),
                List(&reading.temp_c)
            ))
        }
        Verb::Reset => {
            ctx.hw.sun_sensors().reset();
            reset_done("sunSen")
        }
        Verb::Write => Err(CommandError::UnsupportedVerb),
    }
}

fn magnetometer(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let field = ctx.hw.magnetometer().field_mgauss();
            reply(format_args!("{{\"magSen\":{}}}", List(&field)))
        }
        Verb::Reset => {
            ctx.hw.magnetometer().reset();
            reset_done("magSen")
        }
        Verb::Write => Err(CommandError::UnsupportedVerb),
    }
}

fn imu(cursor: &mut TokenCursor<'_>, ctx: &mut CommandContext<'_>) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let reading = ctx.hw.imu().read();
            reply(format_args!(
                "{{\"imu\":{{\"gyro\":{},\"accel\":{}}}}}",
                List(&reading.gyro_mdps),
                List(&reading.accel_mg)
            ))
        }
        _ => Err(CommandError::UnsupportedVerb),
    }
}

fn current(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let ma = ctx.hw.power().current_ma();
            reply(format_args!("{{\"current\":{ma}}}"))
        }
        _ => Err(CommandError::UnsupportedVerb),
    }
}

fn power_mode(
    cursor: &mut TokenCursor<'_>,
    ctx: &mut CommandContext<'_>,
) -> Result<Reply, CommandError> {
    match cursor.verb()? {
        Verb::Read => {
            let mode = ctx.hw.power().mode();
            reply(format_args!("{{\"powerMode\":\"{}\"}}", mode.as_str()))
        }
        Verb::Write => {
            let index = cursor.value()?;
            let mode = cursor
                .tokens()
                .bytes(index)
                .and_then(PowerMode::from_wire)
                .ok_or(CommandError::InvalidValue)?;
            ctx.hw.power().set_mode(mode)?;
            written("powerMode")
        }
        Verb::Reset => Err(CommandError::UnsupportedVerb),
    }
}
