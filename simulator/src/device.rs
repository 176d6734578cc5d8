use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Vital reading as POSTed to the ingestor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalReading {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub thermal_value: i32,
    pub battery_level: f64,
    pub memory_usage: f64,
}

/// A fake handset whose readings drift over time instead of jumping around.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub device_id: String,
    thermal: i32,
    battery: f64,
    charging: bool,
    memory: f64,
}

impl SimulatedDevice {
    pub fn new(device_id: String, rng: &mut impl Rng) -> Self {
        Self {
            device_id,
            thermal: rng.gen_range(0..=1),
            battery: rng.gen_range(40.0..100.0),
            charging: false,
            memory: rng.gen_range(30.0..70.0),
        }
    }

    /// Advances the device state and returns the next reading.
    pub fn next_reading(&mut self, rng: &mut impl Rng) -> VitalReading {
        if self.charging {
            self.battery = (self.battery + rng.gen_range(0.5..2.0)).min(100.0);
            if self.battery >= 100.0 {
                self.charging = false;
            }
        } else {
            self.battery = (self.battery - rng.gen_range(0.0..0.8)).max(0.0);
            if self.battery < 15.0 {
                self.charging = true;
            }
        }

        // Thermal tier moves at most one step per reading
        self.thermal = (self.thermal + rng.gen_range(-1..=1)).clamp(0, 3);
        self.memory = (self.memory + rng.gen_range(-5.0..5.0)).clamp(5.0, 98.0);

        VitalReading {
            device_id: self.device_id.clone(),
            timestamp: Utc::now(),
            thermal_value: self.thermal,
            battery_level: (self.battery * 10.0).round() / 10.0,
            memory_usage: (self.memory * 10.0).round() / 10.0,
        }
    }
}

/// Pushes one field of `reading` out of its valid range.
pub fn corrupt(reading: &mut VitalReading, rng: &mut impl Rng) {
    match rng.gen_range(0..3) {
        0 => reading.thermal_value = rng.gen_range(4..10),
        1 => reading.battery_level = rng.gen_range(100.5..200.0),
        _ => reading.memory_usage = -rng.gen_range(0.5..50.0),
    }
}
