// Clips: looping note sequences positioned in PPQN pulses.
//
// Clips are immutable once published. The control path edits a copy of the
// whole `ClipMap` and swaps it in through the `clips` property.

use std::collections::BTreeMap;

/// Pulses per quarter note.
pub const PPQN: f64 = 960.0;

/// Velocity given to notes added without one.
pub const DEFAULT_VELOCITY: i32 = 100;

/// A single note in a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Position in pulses from the start of the clip
    pub pos: u64,

    /// MIDI note number
    pub pitch: i32,

    pub velocity: i32,

    /// Length in beats
    pub length: f64,
}

/// A looping sequence of notes played on one target instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Loop length in pulses
    pub length: u64,

    /// Index of the sequencer target the notes are sent to
    pub target: usize,

    pub notes: Vec<Note>,
}

impl Clip {
    /// An empty clip `length` beats long.
    pub fn new(length: f64, target: usize) -> Self {
        Self {
            length: (length.max(0.0) * PPQN) as u64,
            target,
            notes: Vec::new(),
        }
    }

    /// Add a note at `position` beats, lasting `length` beats.
    ///
    /// Pitches outside the MIDI range 1..=127 are ignored.
    pub fn add_note(&mut self, position: f64, pitch: i32, length: f64) {
        if !(1..=127).contains(&pitch) {
            return;
        }
        self.notes.push(Note {
            pos: (position.max(0.0) * PPQN) as u64,
            pitch,
            velocity: DEFAULT_VELOCITY,
            length,
        });
    }

    /// Clip length in beats.
    pub fn beats(&self) -> f64 {
        self.length as f64 / PPQN
    }
}

/// All clips by name.
pub type ClipMap = BTreeMap<String, Clip>;
