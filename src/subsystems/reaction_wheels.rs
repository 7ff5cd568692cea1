use super::{Axis, SubsystemError, AXIS_COUNT};
use serde::{Deserialize, Serialize};

/// Largest accepted pulse width; `u16::MAX` is reserved as "invalid".
pub const PWM_MAX: u16 = u16::MAX - 1;
pub const RW_SPEED_MAX_RPM: i16 = 8000;

const RW_MAX_CURRENT_MA: u32 = 450;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Clockwise,
    AntiClockwise,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Clockwise => "clock",
            Direction::AntiClockwise => "antiClock",
        }
    }

    pub fn from_wire(s: &[u8]) -> Option<Self> {
        match s {
            b"clock" => Some(Direction::Clockwise),
            b"antiClock" => Some(Direction::AntiClockwise),
            _ => None,
        }
    }
}

pub trait ReactionWheels {
    fn pwm(&self, axis: Axis) -> u16;
    fn set_pwm(&mut self, axis: Axis, pwm: u16) -> Result<(), SubsystemError>;
    fn direction(&self, axis: Axis) -> Direction;
    fn set_direction(&mut self, axis: Axis, direction: Direction) -> Result<(), SubsystemError>;
    fn speed_rpm(&self, axis: Axis) -> i16;
    /// All three wheels change together or not at all.
    fn set_speeds_rpm(&mut self, rpm: [i16; AXIS_COUNT]) -> Result<(), SubsystemError>;
    fn current_ma(&self, axis: Axis) -> u16;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionWheelState {
    pub pwm: [u16; AXIS_COUNT],
    pub direction: [Direction; AXIS_COUNT],
    pub speed_rpm: [i16; AXIS_COUNT],
}

#[derive(Debug, Clone)]
pub struct EmulatedReactionWheels {
    state: ReactionWheelState,
}

impl EmulatedReactionWheels {
    pub fn new() -> Self {
        Self {
            state: ReactionWheelState {
                pwm: [0; AXIS_COUNT],
                direction: [Direction::Clockwise; AXIS_COUNT],
                speed_rpm: [0; AXIS_COUNT],
            },
        }
    }

    pub fn get_state(&self) -> ReactionWheelState {
        self.state.clone()
    }
}

impl Default for EmulatedReactionWheels {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactionWheels for EmulatedReactionWheels {
    fn pwm(&self, axis: Axis) -> u16 {
        self.state.pwm[axis.index()]
    }

    fn set_pwm(&mut self, axis: Axis, pwm: u16) -> Result<(), SubsystemError> {
        if pwm > PWM_MAX {
            return Err(SubsystemError::OutOfRange {
                quantity: "pwm",
                value: i32::from(pwm),
            });
        }
        self.state.pwm[axis.index()] = pwm;
        Ok(())
    }

    fn direction(&self, axis: Axis) -> Direction {
        self.state.direction[axis.index()]
    }

    fn set_direction(&mut self, axis: Axis, direction: Direction) -> Result<(), SubsystemError> {
        self.state.direction[axis.index()] = direction;
        Ok(())
    }

    fn speed_rpm(&self, axis: Axis) -> i16 {
        self.state.speed_rpm[axis.index()]
    }

    fn set_speeds_rpm(&mut self, rpm: [i16; AXIS_COUNT]) -> Result<(), SubsystemError> {
        let limit = RW_SPEED_MAX_RPM.unsigned_abs();
        if let Some(&bad) = rpm.iter().find(|v| v.unsigned_abs() > limit) {
            return Err(SubsystemError::OutOfRange {
                quantity: "rw_speed",
                value: i32::from(bad),
            });
        }
        self.state.speed_rpm = rpm;
        Ok(())
    }

    fn current_ma(&self, axis: Axis) -> u16 {
        // Coil current tracks duty cycle
        let pwm = u32::from(self.state.pwm[axis.index()]);
        (pwm * RW_MAX_CURRENT_MA / u32::from(PWM_MAX)) as u16
    }
}
