// src/instrument.rs

use log::warn;

use crate::audio_buffer::AudioBuffer;
use crate::config::EngineConfig;
use crate::dsp::{db_to_gain, mix_into};
use crate::engine::Source;
use crate::event::Event;
use crate::event_queue::{EventConsumer, EventProducer, event_queue};
use crate::props::{self, Prop, Props};
use crate::voice::{Voice, VoiceState};

pub const PROP_LEVEL: &str = "level";

/// A fixed pool of voices fed by one event queue.
///
/// Runs on the audio thread. Everything it touches while rendering is
/// allocated in [`Instrument::new`].
pub struct Instrument {
    name: &'static str,
    voices: Vec<Box<dyn Voice>>,
    events: EventConsumer,

    /// Events whose offset lies beyond the current block, rebased to the
    /// next one. Never grows past its initial capacity.
    deferred: Vec<Event>,

    /// Mono mix of all voices for one chunk
    scratch: Vec<f32>,

    /// Frames between event checks
    sub_block: usize,

    level: Prop,
}

impl Instrument {
    /// Build an instrument around `voices` and return the producer half of
    /// its event queue. Registers `level` (dB) in `props`.
    pub fn new(
        name: &'static str,
        props: &mut Props,
        voices: Vec<Box<dyn Voice>>,
        config: &EngineConfig,
    ) -> (Self, EventProducer) {
        let (producer, events) = event_queue(config.queue_capacity);
        let level = props.register(PROP_LEVEL, props::level(), 0.0);

        let instrument = Self {
            name,
            voices,
            events,
            deferred: Vec::with_capacity(config.queue_capacity),
            scratch: vec![0.0; config.block_size.max(1)],
            sub_block: config.sub_block_frames(),
            level,
        };
        (instrument, producer)
    }

    /// Voices that are currently sounding.
    pub fn active_voices(&self) -> usize {
        self.voices
            .iter()
            .filter(|v| v.state() != VoiceState::Free)
            .count()
    }

    /// Start every queued or deferred event with an offset before `cutoff`.
    fn trigger_due(&mut self, cutoff: usize) {
        let Self {
            name,
            voices,
            events,
            deferred,
            ..
        } = self;

        deferred.retain(|event| {
            if event.offset < cutoff {
                start_note(name, voices, *event);
                false
            } else {
                true
            }
        });
        events.drain_until(Some(cutoff), |event| start_note(name, voices, event));
    }

    /// Carry everything still pending over to the next block.
    fn defer_pending(&mut self, frames: usize) {
        let Self {
            name,
            events,
            deferred,
            ..
        } = self;

        for event in deferred.iter_mut() {
            event.offset = event.offset.saturating_sub(frames);
        }

        events.drain_until(None, |mut event| {
            event.offset = event.offset.saturating_sub(frames);
            if deferred.len() < deferred.capacity() {
                deferred.push(event);
            } else {
                warn!("{name}: deferred events full, dropping note {}", event.pitch);
            }
        });
    }
}

fn start_note(name: &str, voices: &mut [Box<dyn Voice>], event: Event) {
    for voice in voices.iter_mut() {
        voice.notify(event.pitch);
    }

    match voices.iter_mut().find(|v| v.state() == VoiceState::Free) {
        Some(voice) => voice.start(event.pitch, event.velocity, event.duration),
        None => warn!("{name}: no free voice, dropping note {}", event.pitch),
    }
}

impl Source for Instrument {
    fn process(&mut self, out: &mut AudioBuffer) {
        let frames = out.frames;
        let gain = db_to_gain(self.level.float()) as f32;
        let chunk_len = self.scratch.len();

        let mut base = 0;
        while base < frames {
            let chunk = (frames - base).min(chunk_len);

            let mut n = 0;
            while n < chunk {
                let end = (n + self.sub_block).min(chunk);
                self.trigger_due(base + end);

                let buf = &mut self.scratch[n..end];
                for voice in self.voices.iter_mut() {
                    if voice.state() != VoiceState::Free {
                        voice.render(buf);
                    }
                }
                n = end;
            }

            let mixed = &mut self.scratch[..chunk];
            for channel in out.channels_mut().take(2) {
                mix_into(&mut channel[base..base + chunk], mixed, gain);
            }
            mixed.fill(0.0);

            base += chunk;
        }

        self.defer_pending(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Renders a constant 1.0 for `duration` samples from the frame it is
    /// started on. A note on `choked_by` cuts it off.
    struct Gate {
        state: VoiceState,
        remaining: usize,
        choked_by: Option<i32>,
    }

    impl Gate {
        fn new(choked_by: Option<i32>) -> Self {
            Self {
                state: VoiceState::Free,
                remaining: 0,
                choked_by,
            }
        }
    }

    impl Voice for Gate {
        fn start(&mut self, _pitch: i32, _velocity: i32, duration: usize) {
            self.state = VoiceState::Active;
            self.remaining = duration;
        }

        fn render(&mut self, buf: &mut [f32]) {
            for sample in buf.iter_mut() {
                if self.remaining == 0 {
                    self.state = VoiceState::Free;
                    return;
                }
                *sample += 1.0;
                self.remaining -= 1;
            }
        }

        fn state(&self) -> VoiceState {
            self.state
        }

        fn notify(&mut self, pitch: i32) {
            if self.state == VoiceState::Active && self.choked_by == Some(pitch) {
                self.state = VoiceState::Released;
                self.remaining = 0;
            }
        }
    }

    fn instrument(voices: usize) -> (Instrument, EventProducer, Props) {
        choking_instrument(voices, None)
    }

    fn choking_instrument(voices: usize, choked_by: Option<i32>) -> (Instrument, EventProducer, Props) {
        let mut props = Props::new();
        let config = EngineConfig {
            block_size: 64,
            ..EngineConfig::default()
        };
        let pool = (0..voices)
            .map(|_| Box::new(Gate::new(choked_by)) as Box<dyn Voice>)
            .collect();
        let (instrument, producer) = Instrument::new("test", &mut props, pool, &config);
        (instrument, producer, props)
    }

    fn render(instrument: &mut Instrument, frames: usize) -> Vec<f32> {
        let mut data = vec![0.0f32; frames * 2];
        let mut out = AudioBuffer::new(&mut data, 2);
        instrument.process(&mut out);
        data
    }

    #[test]
    fn test_events_start_on_their_sub_block() {
        let (mut inst, mut producer, _props) = instrument(4);
        producer.push(Event::new(60, 40, 127, 1000));

        let out = render(&mut inst, 64);
        // Sub-blocks are 16 frames: offset 40 starts at frame 32.
        assert_eq!(out[31], 0.0);
        assert_eq!(out[32], 1.0);
        assert_eq!(out[64 + 32], 1.0);
    }

    #[test]
    fn test_level_is_applied_in_db() {
        let (mut inst, mut producer, props) = instrument(1);
        props.set(PROP_LEVEL, -20.0).unwrap();
        producer.push(Event::new(60, 0, 127, 1000));

        let out = render(&mut inst, 16);
        assert!((out[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_late_events_are_carried_to_the_next_block() {
        let (mut inst, mut producer, _props) = instrument(2);
        producer.push(Event::new(60, 70, 127, 1000));

        let first = render(&mut inst, 64);
        assert!(first.iter().all(|s| *s == 0.0));
        assert_eq!(inst.active_voices(), 0);

        let second = render(&mut inst, 64);
        // 70 - 64 = 6, which falls in the first sub-block
        assert_eq!(second[0], 1.0);
        assert_eq!(inst.active_voices(), 1);
    }

    #[test]
    fn test_notes_beyond_the_pool_are_dropped() {
        let (mut inst, mut producer, _props) = instrument(2);
        for pitch in 60..63 {
            producer.push(Event::new(pitch, 0, 127, 1000));
        }

        let out = render(&mut inst, 16);
        assert_eq!(out[0], 2.0);
        assert_eq!(inst.active_voices(), 2);
    }

    #[test]
    fn test_choke_cuts_the_sounding_voice_before_the_new_note_starts() {
        let (mut inst, mut producer, _props) = choking_instrument(2, Some(61));
        producer.push(Event::new(60, 0, 127, 1000));
        producer.push(Event::new(61, 20, 127, 1000));

        let out = render(&mut inst, 32);
        assert!(out[..16].iter().all(|s| *s == 1.0));
        // Without the choke the second sub-block would hold both notes.
        assert!(out[16..32].iter().all(|s| *s == 1.0));
        assert_eq!(inst.active_voices(), 1);
    }

    #[test]
    fn test_blocks_larger_than_scratch_are_chunked() {
        let (mut inst, mut producer, _props) = instrument(1);
        producer.push(Event::new(60, 100, 127, 10));

        let out = render(&mut inst, 256);
        let sounding: Vec<usize> = (0..256).filter(|&i| out[i] != 0.0).collect();
        assert_eq!(sounding, (96..106).collect::<Vec<_>>());
    }
}
