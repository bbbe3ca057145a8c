// src/voice.rs

/// Lifecycle of a voice slot: `Free → Active → Released → Free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,
    Active,
    Released,
}

/// A reusable slot that renders one note at a time.
///
/// Voices:
/// - are owned by exactly one instrument's pool
/// - are created at setup and never reallocated
/// - do NOT allocate or block in any method
pub trait Voice: Send {
    /// Begin a new note. Only called on a `Free` voice.
    fn start(&mut self, pitch: i32, velocity: i32, duration: usize);

    /// Render `buf.len()` samples, adding into `buf`.
    fn render(&mut self, buf: &mut [f32]);

    fn state(&self) -> VoiceState;

    /// Another note on `pitch` is about to start in the same instrument.
    fn notify(&mut self, pitch: i32);
}
