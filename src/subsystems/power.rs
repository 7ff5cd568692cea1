use super::SubsystemError;
use serde::{Deserialize, Serialize};

const BUS_VOLTAGE_MV: u16 = 3300;

// Board draw per mode, wheels and coils excluded
const NOMINAL_CURRENT_MA: u16 = 180;
const LOW_POWER_CURRENT_MA: u16 = 90;
const SLEEP_CURRENT_MA: u16 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerMode {
    Nominal,
    LowPower,
    Sleep,
}

impl PowerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerMode::Nominal => "nominal",
            PowerMode::LowPower => "lowPower",
            PowerMode::Sleep => "sleep",
        }
    }

    pub fn from_wire(s: &[u8]) -> Option<Self> {
        match s {
            b"nominal" => Some(PowerMode::Nominal),
            b"lowPower" => Some(PowerMode::LowPower),
            b"sleep" => Some(PowerMode::Sleep),
            _ => None,
        }
    }

    fn board_current_ma(self) -> u16 {
        match self {
            PowerMode::Nominal => NOMINAL_CURRENT_MA,
            PowerMode::LowPower => LOW_POWER_CURRENT_MA,
            PowerMode::Sleep => SLEEP_CURRENT_MA,
        }
    }
}

pub trait PowerSystem {
    fn mode(&self) -> PowerMode;
    fn set_mode(&mut self, mode: PowerMode) -> Result<(), SubsystemError>;
    fn current_ma(&self) -> u16;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerState {
    pub mode: PowerMode,
    pub current_ma: u16,
    pub bus_voltage_mv: u16,
    pub power_draw_mw: u16,
    pub mode_changes: u32,
}

#[derive(Debug, Clone)]
pub struct EmulatedPower {
    state: PowerState,
}

impl EmulatedPower {
    pub fn new() -> Self {
        let mode = PowerMode::Nominal;
        Self {
            state: PowerState {
                mode,
                current_ma: mode.board_current_ma(),
                bus_voltage_mv: BUS_VOLTAGE_MV,
                power_draw_mw: Self::draw_mw(mode.board_current_ma()),
                mode_changes: 0,
            },
        }
    }

    fn draw_mw(current_ma: u16) -> u16 {
        (u32::from(BUS_VOLTAGE_MV) * u32::from(current_ma) / 1000) as u16
    }

    pub fn get_state(&self) -> PowerState {
        self.state.clone()
    }
}

impl Default for EmulatedPower {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSystem for EmulatedPower {
    fn mode(&self) -> PowerMode {
        self.state.mode
    }

    fn set_mode(&mut self, mode: PowerMode) -> Result<(), SubsystemError> {
        if mode != self.state.mode {
            self.state.mode_changes = self.state.mode_changes.saturating_add(1);
        }

        self.state.mode = mode;
        self.state.current_ma = mode.board_current_ma();
        self.state.power_draw_mw = Self::draw_mw(self.state.current_ma);

        // NASA Rule 5: Safety assertions for invariants
        debug_assert!(
            self.state.current_ma <= NOMINAL_CURRENT_MA,
            "Board current {} exceeds nominal {}",
            self.state.current_ma,
            NOMINAL_CURRENT_MA
        );
        Ok(())
    }

    fn current_ma(&self) -> u16 {
        self.state.current_ma
    }
}
