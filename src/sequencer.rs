// src/sequencer.rs

use std::sync::Arc;

use log::warn;

use crate::engine::Ticker;
use crate::event::Event;
use crate::event_queue::EventProducer;
use crate::props::{self, Prop, Props, Value};
use crate::state::{ClipMap, Note, PPQN};

pub const PROP_BPM: &str = "bpm";
pub const PROP_CLIPS: &str = "clips";

/// Upper bound on notes scheduled in one block, across all clips.
const MAX_NOTES_PER_BLOCK: usize = 256;

/// Receives notes from the sequencer.
pub trait Playable: Send {
    fn play_note(&mut self, offset: usize, pitch: i32, velocity: i32, duration: usize);
}

impl Playable for EventProducer {
    /// Runs on the audio thread, so a full queue drops the note instead of
    /// spinning.
    fn play_note(&mut self, offset: usize, pitch: i32, velocity: i32, duration: usize) {
        if self.try_push(Event::new(pitch, offset, velocity, duration)).is_err() {
            warn!("sequencer: event queue full, dropping note {pitch}");
        }
    }
}

/// Pulse-quantized clip sequencer (960 PPQN).
///
/// Each block it works out which clip notes fall inside the block and sends
/// them to their clip's target with a sample offset. Runs on the audio
/// thread; the only state it owns is the pulse counter.
pub struct Sequencer {
    bpm: Prop,
    clips: Prop,
    sample_rate: f64,
    total_pulses: u64,
    targets: Vec<Box<dyn Playable>>,

    /// Pre-allocated scratch for sorting a block's notes by offset
    scheduled: Vec<(usize, Event)>,
}

impl Sequencer {
    /// Registers `bpm` and `clips` in `props`.
    pub fn new(props: &mut Props, sample_rate: f64, bpm: f64) -> Self {
        Self {
            bpm: props.register(PROP_BPM, props::float_in(1.0, 500.0), bpm),
            clips: props.register(PROP_CLIPS, props::clips(), ClipMap::new()),
            sample_rate,
            total_pulses: 0,
            targets: Vec::new(),
            scheduled: Vec::with_capacity(MAX_NOTES_PER_BLOCK),
        }
    }

    /// Setup only: adds a target and returns the index clips use to refer
    /// to it.
    pub fn add_target(&mut self, target: Box<dyn Playable>) -> usize {
        self.targets.push(target);
        self.targets.len() - 1
    }

    /// Pulses elapsed since the sequencer started.
    pub fn position(&self) -> u64 {
        self.total_pulses
    }

    /// Schedule every note that falls within the next `num_samples`.
    pub fn tick(&mut self, num_samples: usize) {
        let bpm = self.bpm.float();
        let beats_per_sec = bpm / 60.0;

        // Pulses per block are fractional; truncating makes the next pulse
        // a few samples early, which is not audible.
        let num_pulses = (PPQN * beats_per_sec / (self.sample_rate / num_samples as f64)).floor() as u64;
        let samples_per_pulse = self.sample_rate / (PPQN * beats_per_sec);

        let clips = self.clips.load();
        if let Value::Clips(clips) = &**clips {
            self.schedule(clips, num_pulses, samples_per_pulse, beats_per_sec);
        }

        self.scheduled.sort_unstable_by_key(|(_, event)| event.offset);
        for (target, event) in self.scheduled.drain(..) {
            if let Some(target) = self.targets.get_mut(target) {
                target.play_note(event.offset, event.pitch, event.velocity, event.duration);
            }
        }

        self.total_pulses += num_pulses;
    }

    fn schedule(&mut self, clips: &Arc<ClipMap>, num_pulses: u64, samples_per_pulse: f64, beats_per_sec: f64) {
        for clip in clips.values() {
            if clip.length == 0 {
                continue;
            }
            let pos = self.total_pulses % clip.length;
            let next_pos = pos + num_pulses;

            for note in &clip.notes {
                let end = next_pos.min(clip.length);
                if note.pos >= pos && note.pos < end {
                    self.push(clip.target, note, note.pos - pos, samples_per_pulse, beats_per_sec);
                }
                // Past the loop point: also look at the start of the clip.
                if next_pos > clip.length && note.pos < next_pos - clip.length {
                    let distance = clip.length - pos + note.pos;
                    self.push(clip.target, note, distance, samples_per_pulse, beats_per_sec);
                }
            }
        }
    }

    fn push(&mut self, target: usize, note: &Note, distance: u64, samples_per_pulse: f64, beats_per_sec: f64) {
        let offset = (distance as f64 * samples_per_pulse).round() as usize;
        let duration = (note.length * self.sample_rate / beats_per_sec) as usize;

        if self.scheduled.len() < self.scheduled.capacity() {
            let event = Event::new(note.pitch, offset, note.velocity, duration);
            self.scheduled.push((target, event));
        } else {
            warn!("sequencer: too many notes in one block, dropping note {}", note.pitch);
        }
    }
}

impl Ticker for Sequencer {
    fn tick(&mut self, frames: usize) {
        Sequencer::tick(self, frames);
    }
}
