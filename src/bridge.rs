//! Wiring between the control path and the audio engine.
//!
//! # Architecture
//!
//! - **Control thread** owns the [`Session`]: property stores, the step
//!   grid and the sample loader
//! - **Audio thread** owns the [`Engine`]: the clocks and the instruments
//! - They share nothing but published property values, the published grid
//!   and the instruments' event queues
//!
//! # Usage
//!
//! ```ignore
//! let (mut session, mut engine) = create_engine(EngineConfig::default(), Box::new(WavLoader));
//!
//! // Control thread
//! session.exec("load kick.wav")?;
//! session.exec("a '*")?;
//!
//! // Audio thread, once per block
//! engine.process(&mut out);
//! ```

use log::info;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::props::Props;
use crate::sampler::{SampleLoader, sampler};
use crate::sequencer::{PROP_BPM, Sequencer};
use crate::state::{Grid, Session, SharedGrid};
use crate::step_sequencer::StepSequencer;
use crate::synth::synth;

/// Build the sampler, the synth and both sequencers, and split them into
/// the control half and the render half.
///
/// All allocation happens here.
pub fn create_engine(config: EngineConfig, loader: Box<dyn SampleLoader>) -> (Session, Engine) {
    let mut sampler_props = Props::new();
    let mut synth_props = Props::new();
    let mut transport_props = Props::new();

    let (sampler, sampler_events) = sampler(&mut sampler_props, &config);
    let (synth, synth_events) = synth(&mut synth_props, &config);

    let mut sequencer = Sequencer::new(&mut transport_props, config.sample_rate, config.bpm);
    let synth_target = sequencer.add_target(Box::new(synth_events));

    let grid = SharedGrid::new(Grid::new(config.time_signature, config.step_size));
    let bpm = transport_props
        .handle(PROP_BPM)
        .expect("sequencer registers bpm");
    let steps = StepSequencer::new(config.sample_rate, bpm, grid.clone(), sampler_events);

    let mut engine = Engine::new();
    engine.add_ticker(Box::new(steps));
    engine.add_ticker(Box::new(sequencer));
    engine.add_source(Box::new(sampler));
    engine.add_source(Box::new(synth));

    info!(
        "engine ready: {} Hz, {} frame blocks, {} voices per instrument, {} at {} bpm",
        config.sample_rate, config.block_size, config.voices, config.time_signature, config.bpm
    );

    let session = Session::new(
        config,
        grid,
        sampler_props,
        synth_props,
        transport_props,
        loader,
        synth_target,
    );
    (session, engine)
}
