// src/lib.rs
//
// Library entry point: the render engine, the control session and the
// pieces they are built from.

mod audio_buffer;
mod bridge;
mod config;
mod engine;
mod error;
mod event;
mod event_queue;
mod instrument;
mod voice;

pub mod clock;
pub mod dsp;
pub mod lang;
pub mod presets;
pub mod props;
pub mod sampler;
pub mod sequencer;
pub mod state;
pub mod step_sequencer;
pub mod synth;

// Public surface
pub use audio_buffer::AudioBuffer;
pub use bridge::create_engine;
pub use config::EngineConfig;
pub use engine::{Engine, Source, Ticker};
pub use error::{Error, Result};
pub use event::Event;
pub use event_queue::{EventConsumer, EventProducer, event_queue};
pub use instrument::Instrument;
pub use sampler::{SampleLoader, Sound, WavLoader};
pub use state::{Session, sound_name};
pub use voice::{Voice, VoiceState};
