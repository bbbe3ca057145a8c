// src/clock.rs
//
// Grid-quantized step clock.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Musical meter, e.g. 7/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub num: usize,
    pub denom: usize,
}

impl TimeSignature {
    pub const fn new(num: usize, denom: usize) -> Self {
        Self { num, denom }
    }

    /// Steps in one bar at `step_size` steps per whole note.
    #[inline]
    pub fn steps(&self, step_size: usize) -> usize {
        (step_size / self.denom) * self.num
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.denom)
    }
}

impl FromStr for TimeSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::args(format!("not a valid time signature: {s}"));

        let (num, denom) = s.split_once('/').ok_or_else(invalid)?;
        let num: usize = num.trim().parse().map_err(|_| invalid())?;
        let denom: usize = denom.trim().parse().map_err(|_| invalid())?;
        if num == 0 || denom == 0 || !denom.is_power_of_two() {
            return Err(invalid());
        }
        Ok(Self { num, denom })
    }
}

/// Counts samples since the audio thread started and reports where in the
/// current block the next grid tick lands.
///
/// BPM is always a quarter-note tempo, whatever the time signature.
#[derive(Debug, Clone)]
pub struct StepClock {
    sample_rate: f64,

    /// Samples rendered so far
    samples: u64,

    /// Absolute sample position of the next tick
    next_tick: u64,
}

impl StepClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            samples: 0,
            next_tick: 0,
        }
    }

    /// Samples between ticks, truncated to a whole sample.
    pub fn tick_period(&self, bpm: f64, step_size: usize, triplets: bool) -> u64 {
        let mut ticks_per_quarter = step_size as f64 / 4.0;
        if triplets {
            ticks_per_quarter = ticks_per_quarter / 2.0 * 3.0;
        }
        let ticks_per_sec = bpm * ticks_per_quarter / 60.0;
        ((self.sample_rate / ticks_per_sec) as u64).max(1)
    }

    /// Advance by one block of `frames` samples and return the in-block
    /// offset of the tick inside it, if any.
    ///
    /// A tick that is already overdue (the period shrank after a tempo
    /// change) fires at offset 0. At most one tick is reported per block.
    pub fn tick(&mut self, frames: usize, bpm: f64, step_size: usize, triplets: bool) -> Option<usize> {
        let offset = self.next_tick.saturating_sub(self.samples);
        self.samples += frames as u64;

        if offset < frames as u64 {
            let period = self.tick_period(bpm, step_size, triplets);
            self.next_tick = self.next_tick.max(self.samples - frames as u64) + period;
            return Some(offset as usize);
        }
        None
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}
