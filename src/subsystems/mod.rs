pub mod magnetorquers;
pub mod power;
pub mod reaction_wheels;
pub mod sensors;

pub use magnetorquers::{EmulatedMagnetorquers, Magnetorquers, MagnetorquerState, MQTR_MAX_MV};
pub use power::{EmulatedPower, PowerMode, PowerState, PowerSystem};
pub use reaction_wheels::{
    Direction, EmulatedReactionWheels, ReactionWheelState, ReactionWheels, PWM_MAX,
    RW_SPEED_MAX_RPM,
};
pub use sensors::{
    EmulatedImu, EmulatedMagnetometer, EmulatedSunSensors, Imu, ImuReading, Magnetometer,
    SunSensorReading, SunSensors, SUN_SENSOR_FACES,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const AXIS_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubsystemError {
    #[error("{quantity} value {value} outside allowed range")]
    OutOfRange { quantity: &'static str, value: i32 },
    #[error("subsystem unavailable")]
    Unavailable,
}

/// Everything the command router can reach.
///
/// Real boards wire these to the peripheral drivers; the host build uses
/// [`EmulatedHardware`].
pub trait AdcsHardware {
    fn reaction_wheels(&mut self) -> &mut dyn ReactionWheels;
    fn magnetorquers(&mut self) -> &mut dyn Magnetorquers;
    fn sun_sensors(&mut self) -> &mut dyn SunSensors;
    fn magnetometer(&mut self) -> &mut dyn Magnetometer;
    fn imu(&mut self) -> &mut dyn Imu;
    fn power(&mut self) -> &mut dyn PowerSystem;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareState {
    pub reaction_wheels: ReactionWheelState,
    pub magnetorquers: MagnetorquerState,
    pub sun_sensors: SunSensorReading,
    pub magnetometer_mgauss: [i16; AXIS_COUNT],
    pub imu: ImuReading,
    pub power: PowerState,
}

#[derive(Debug, Clone, Default)]
pub struct EmulatedHardware {
    pub reaction_wheels: EmulatedReactionWheels,
    pub magnetorquers: EmulatedMagnetorquers,
    pub sun_sensors: EmulatedSunSensors,
    pub magnetometer: EmulatedMagnetometer,
    pub imu: EmulatedImu,
    pub power: EmulatedPower,
}

impl EmulatedHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every emulated subsystem.
    pub fn get_state(&self) -> HardwareState {
        HardwareState {
            reaction_wheels: self.reaction_wheels.get_state(),
            magnetorquers: self.magnetorquers.get_state(),
            sun_sensors: self.sun_sensors.read(),
            magnetometer_mgauss: self.magnetometer.field_mgauss(),
            imu: self.imu.read(),
            power: self.power.get_state(),
        }
    }
}

impl AdcsHardware for EmulatedHardware {
    fn reaction_wheels(&mut self) -> &mut dyn ReactionWheels {
        &mut self.reaction_wheels
    }

    fn magnetorquers(&mut self) -> &mut dyn Magnetorquers {
        &mut self.magnetorquers
    }

    fn sun_sensors(&mut self) -> &mut dyn SunSensors {
        &mut self.sun_sensors
    }

    fn magnetometer(&mut self) -> &mut dyn Magnetometer {
        &mut self.magnetometer
    }

    fn imu(&mut self) -> &mut dyn Imu {
        &mut self.imu
    }

    fn power(&mut self) -> &mut dyn PowerSystem {
        &mut self.power
    }
}
