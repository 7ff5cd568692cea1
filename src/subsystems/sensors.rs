use super::AXIS_COUNT;
use serde::{Deserialize, Serialize};

pub const SUN_SENSOR_FACES: usize = 6;

const DEFAULT_SUN_LUX: [u16; SUN_SENSOR_FACES] = [1200, 0, 860, 0, 310, 0];
const DEFAULT_SUN_TEMP_C: [i16; SUN_SENSOR_FACES] = [21, 18, 20, 17, 19, 16];
const DEFAULT_FIELD_MGAUSS: [i16; AXIS_COUNT] = [212, -87, 395];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunSensorReading {
    pub lux: [u16; SUN_SENSOR_FACES],
    pub temp_c: [i16; SUN_SENSOR_FACES],
}

impl Default for SunSensorReading {
    fn default() -> Self {
        Self {
            lux: DEFAULT_SUN_LUX,
            temp_c: DEFAULT_SUN_TEMP_C,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImuReading {
    pub gyro_mdps: [i16; AXIS_COUNT],
    pub accel_mg: [i16; AXIS_COUNT],
}

pub trait SunSensors {
    fn read(&self) -> SunSensorReading;
    fn reset(&mut self);
}

pub trait Magnetometer {
    fn field_mgauss(&self) -> [i16; AXIS_COUNT];
    fn reset(&mut self);
}

pub trait Imu {
    fn read(&self) -> ImuReading;
}

/// Sun sensor faces with settable illumination.
#[derive(Debug, Clone, Default)]
pub struct EmulatedSunSensors {
    reading: SunSensorReading,
    resets: u32,
}

impl EmulatedSunSensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reading(&mut self, reading: SunSensorReading) {
        self.reading = reading;
    }

    pub fn reset_count(&self) -> u32 {
        self.resets
    }
}

impl SunSensors for EmulatedSunSensors {
    fn read(&self) -> SunSensorReading {
        self.reading
    }

    fn reset(&mut self) {
        self.reading = SunSensorReading::default();
        self.resets = self.resets.saturating_add(1);
    }
}

#[derive(Debug, Clone)]
pub struct EmulatedMagnetometer {
    field_mgauss: [i16; AXIS_COUNT],
    resets: u32,
}

impl EmulatedMagnetometer {
    pub fn new() -> Self {
        Self {
            field_mgauss: DEFAULT_FIELD_MGAUSS,
            resets: 0,
        }
    }

    pub fn set_field(&mut self, field_mgauss: [i16; AXIS_COUNT]) {
        self.field_mgauss = field_mgauss;
    }

    pub fn reset_count(&self) -> u32 {
        self.resets
    }
}

impl Default for EmulatedMagnetometer {
    fn default() -> Self {
        Self::new()
    }
}

impl Magnetometer for EmulatedMagnetometer {
    fn field_mgauss(&self) -> [i16; AXIS_COUNT] {
        self.field_mgauss
    }

    fn reset(&mut self) {
        self.field_mgauss = DEFAULT_FIELD_MGAUSS;
        self.resets = self.resets.saturating_add(1);
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmulatedImu {
    reading: ImuReading,
}

impl EmulatedImu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reading(&mut self, reading: ImuReading) {
        self.reading = reading;
    }
}

impl Imu for EmulatedImu {
    fn read(&self) -> ImuReading {
        self.reading
    }
}
