// src/step_sequencer.rs

use log::warn;

use crate::clock::StepClock;
use crate::engine::Ticker;
use crate::event::Event;
use crate::event_queue::EventProducer;
use crate::props::Prop;
use crate::state::SharedGrid;

const VELOCITY: i32 = 127;

/// Plays the drum grid: on each clock tick, every unmuted track with the
/// current step set sends its pitch to the sampler.
///
/// Runs on the audio thread and reads the grid through its published
/// snapshot, so an edit never lands half way through a step.
pub struct StepSequencer {
    clock: StepClock,
    bpm: Prop,
    grid: SharedGrid,
    step: usize,
    events: EventProducer,
}

impl StepSequencer {
    pub fn new(sample_rate: f64, bpm: Prop, grid: SharedGrid, events: EventProducer) -> Self {
        Self {
            clock: StepClock::new(sample_rate),
            bpm,
            grid,
            step: 0,
            events,
        }
    }

    /// Index of the step that plays on the next tick.
    pub fn step(&self) -> usize {
        self.step
    }
}

impl Ticker for StepSequencer {
    fn tick(&mut self, frames: usize) {
        let grid = self.grid.load();
        let Some(offset) = self.clock.tick(frames, self.bpm.float(), grid.step_size, grid.triplets)
        else {
            return;
        };

        // The table may have shrunk since the last tick.
        let num_steps = grid.num_steps();
        if self.step >= num_steps {
            self.step = 0;
        }

        for track in grid.tracks.iter().flatten() {
            if track.muted || !track.hit(self.step) {
                continue;
            }
            let event = Event::new(track.pitch, offset, VELOCITY, 0);
            if self.events.try_push(event).is_err() {
                warn!("step sequencer: event queue full, dropping note {}", track.pitch);
            }
        }

        self.step += 1;
        if self.step >= num_steps {
            self.step = 0;
        }
    }
}
