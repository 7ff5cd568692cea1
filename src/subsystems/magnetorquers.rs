use super::{Axis, SubsystemError, AXIS_COUNT};
use serde::{Deserialize, Serialize};

/// Coil drive limit in either polarity.
pub const MQTR_MAX_MV: i16 = 3300;

pub trait Magnetorquers {
    fn coil_voltage_mv(&self, axis: Axis) -> i16;
    /// All three coils change together or not at all.
    fn set_coil_voltages_mv(&mut self, mv: [i16; AXIS_COUNT]) -> Result<(), SubsystemError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetorquerState {
    pub coil_mv: [i16; AXIS_COUNT],
}

#[derive(Debug, Clone, Default)]
pub struct EmulatedMagnetorquers {
    coil_mv: [i16; AXIS_COUNT],
}

impl EmulatedMagnetorquers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_state(&self) -> MagnetorquerState {
        MagnetorquerState { coil_mv: self.coil_mv }
    }
}

impl Magnetorquers for EmulatedMagnetorquers {
    fn coil_voltage_mv(&self, axis: Axis) -> i16 {
        self.coil_mv[axis.index()]
    }

    fn set_coil_voltages_mv(&mut self, mv: [i16; AXIS_COUNT]) -> Result<(), SubsystemError> {
        for &value in &mv {
            if !(-MQTR_MAX_MV..=MQTR_MAX_MV).contains(&value) {
                return Err(SubsystemError::OutOfRange {
                    quantity: "mqtr_volts",
                    value: i32::from(value),
                });
            }
        }

        self.coil_mv = mv;

        // NASA Rule 5: Safety assertions for invariants
        debug_assert!(self.coil_mv.iter().all(|v| v.abs() <= MQTR_MAX_MV));
        Ok(())
    }
}
