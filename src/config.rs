// src/config.rs

use crate::clock::TimeSignature;

/// Setup-time engine configuration.
///
/// Everything here is fixed once the engine is built: pool sizes, queue
/// capacities and scratch buffers are allocated from it up front.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,

    /// Largest block the host will ask for.
    pub block_size: usize,

    /// Voices per instrument.
    pub voices: usize,

    /// Event queue capacity per instrument (power of two).
    pub queue_capacity: usize,

    /// Grid steps per whole note (16 = sixteenth notes).
    pub step_size: usize,

    pub time_signature: TimeSignature,

    pub bpm: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            block_size: 512,
            voices: 12,
            queue_capacity: 64,
            step_size: 16,
            time_signature: TimeSignature::new(7, 8),
            bpm: 120.0,
        }
    }
}

impl EngineConfig {
    /// Frames per instrument sub-block: the granularity at which queued
    /// events start, about 0.35 ms (16 frames at 44.1 kHz).
    pub fn sub_block_frames(&self) -> usize {
        ((self.sample_rate * 0.000_35).ceil() as usize).max(1)
    }
}
