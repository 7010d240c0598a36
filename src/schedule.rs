//! Exploration schedules

use serde::{Deserialize, Serialize};

/// Maps an elapsed step count to a value, e.g. an exploration probability.
pub trait Schedule {
    fn value(&self, t: usize) -> f64;
}

/// Linear interpolation from `initial` at `t = 0` to `final_value` at
/// `t = schedule_length`, held constant afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSchedule {
    pub schedule_length: usize,
    pub initial: f64,
    pub final_value: f64,
}

impl LinearSchedule {
    pub fn new(schedule_length: usize, initial: f64, final_value: f64) -> Self {
        Self {
            schedule_length,
            initial,
            final_value,
        }
    }
}

impl Schedule for LinearSchedule {
    fn value(&self, t: usize) -> f64 {
        if t >= self.schedule_length {
            return self.final_value;
        }
        let fraction = t as f64 / self.schedule_length as f64;
        self.initial + fraction * (self.final_value - self.initial)
    }
}
