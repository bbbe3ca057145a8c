// src/event.rs

/// A note trigger expressed in sample time.
///
/// Events:
/// - are produced by a clock (or the control thread)
/// - are RT-safe (plain `Copy` data)
/// - are consumed by an instrument exactly once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Event {
    /// MIDI note number.
    pub pitch: i32,

    /// Sample offset within the block the event targets.
    pub offset: usize,

    pub velocity: i32,

    /// Note length in samples. Zero plays a sample to its end.
    pub duration: usize,
}

impl Event {
    #[inline]
    pub fn new(pitch: i32, offset: usize, velocity: i32, duration: usize) -> Self {
        Self {
            pitch,
            offset,
            velocity,
            duration,
        }
    }

    /// Linear gain derived from velocity (0..=127).
    #[inline]
    pub fn velocity_gain(velocity: i32) -> f64 {
        velocity.clamp(0, 127) as f64 / 127.0
    }
}
