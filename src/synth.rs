// src/synth.rs
//
// Two-oscillator subtractive synth.

use crate::config::EngineConfig;
use crate::dsp::{Envelope, LowpassFilter, Oscillator, midi_to_freq};
use crate::event::Event;
use crate::event_queue::EventProducer;
use crate::instrument::Instrument;
use crate::props::{self, Prop, Props};
use crate::voice::{Voice, VoiceState};

pub const PROP_CUTOFF: &str = "cutoff";
pub const PROP_ENV_ATTACK: &str = "env.attack";
pub const PROP_ENV_DECAY: &str = "env.decay";
pub const PROP_ENV_SUSTAIN: &str = "env.sustain";
pub const PROP_ENV_RELEASE: &str = "env.release";
pub const PROP_OSC1_WAVE: &str = "osc1.wave";
pub const PROP_OSC2_WAVE: &str = "osc2.wave";

/// Fixed output scaling so a handful of voices stay below full scale.
const VOICE_GAIN: f64 = 0.1;

/// Release used when a new note on the same pitch cuts a voice short.
const RETRIGGER_RELEASE: f64 = 0.001;

#[derive(Clone)]
struct SynthProps {
    cutoff: Prop,
    attack: Prop,
    decay: Prop,
    sustain: Prop,
    release: Prop,
    osc1: Prop,
    osc2: Prop,
}

impl SynthProps {
    fn register(props: &mut Props) -> Self {
        Self {
            cutoff: props.register(PROP_CUTOFF, props::float_in(0.0, 20_000.0), 1000.0),
            attack: props.register(PROP_ENV_ATTACK, props::env_time(), 0.01),
            decay: props.register(PROP_ENV_DECAY, props::env_time(), 0.5),
            sustain: props.register(PROP_ENV_SUSTAIN, props::float_in(0.0, 1.0), 1.0),
            release: props.register(PROP_ENV_RELEASE, props::env_time(), 0.1),
            osc1: props.register(PROP_OSC1_WAVE, props::waveform(), "saw"),
            osc2: props.register(PROP_OSC2_WAVE, props::waveform(), "square"),
        }
    }
}

pub struct SynthVoice {
    props: SynthProps,
    sample_rate: f64,
    state: VoiceState,
    osc1: Oscillator,
    osc2: Oscillator,
    filter: LowpassFilter,
    env: Envelope,

    /// Per-voice scratch; one block long
    buf: Vec<f32>,

    pitch: i32,
    gain: f64,
    duration: usize,
    samples_played: usize,
}

impl SynthVoice {
    fn new(props: SynthProps, sample_rate: f64, block_size: usize) -> Self {
        Self {
            props,
            sample_rate,
            state: VoiceState::Free,
            osc1: Oscillator::default(),
            osc2: Oscillator::default(),
            filter: LowpassFilter::new(),
            env: Envelope::new(sample_rate),
            buf: vec![0.0; block_size.max(1)],
            pitch: 0,
            gain: 0.0,
            duration: 0,
            samples_played: 0,
        }
    }

    fn stop(&mut self) {
        if self.state == VoiceState::Active {
            self.env.release = RETRIGGER_RELEASE;
            self.env.start_release();
            self.state = VoiceState::Released;
        }
    }

    fn reset(&mut self) {
        self.pitch = 0;
        self.filter.reset();
        self.osc1.reset();
        self.osc2.reset();
        self.env.reset();
        self.state = VoiceState::Free;
    }
}

impl Voice for SynthVoice {
    fn start(&mut self, pitch: i32, velocity: i32, duration: usize) {
        self.pitch = pitch;
        self.gain = VOICE_GAIN * Event::velocity_gain(velocity);
        self.duration = duration;
        self.samples_played = 0;

        self.env.attack = self.props.attack.float();
        self.env.decay = self.props.decay.float();
        self.env.sustain = self.props.sustain.float();
        self.env.release = self.props.release.float();
        self.env.start_attack();

        let freq = midi_to_freq(pitch);
        self.osc1.wave = self.props.osc1.wave();
        self.osc1.set_frequency(freq, self.sample_rate);
        self.osc2.wave = self.props.osc2.wave();
        self.osc2.set_frequency(freq, self.sample_rate);

        self.state = VoiceState::Active;
    }

    fn render(&mut self, buf: &mut [f32]) {
        self.filter.set_cutoff(self.props.cutoff.float(), self.sample_rate);

        // The instrument never hands out more than one block.
        let n = buf.len().min(self.buf.len());
        let tmp = &mut self.buf[..n];
        self.osc1.process(tmp);
        self.osc2.process(tmp);
        self.filter.process(tmp);
        self.env.process(tmp);

        for (out, sample) in buf.iter_mut().zip(tmp.iter_mut()) {
            *out += (self.gain * *sample as f64) as f32;
            *sample = 0.0;
        }
        self.samples_played += n;

        if self.samples_played >= self.duration && self.state == VoiceState::Active {
            self.state = VoiceState::Released;
            self.env.start_release();
        }
        if self.state == VoiceState::Released && self.env.is_idle() {
            self.reset();
        }
    }

    fn state(&self) -> VoiceState {
        self.state
    }

    fn notify(&mut self, pitch: i32) {
        if self.pitch == pitch {
            self.stop();
        }
    }
}

/// Build the synth and register its properties: `level`, `cutoff`,
/// `env.attack`, `env.decay`, `env.sustain`, `env.release`, `osc1.wave`,
/// `osc2.wave`.
pub fn synth(props: &mut Props, config: &EngineConfig) -> (Instrument, EventProducer) {
    let synth_props = SynthProps::register(props);
    let voices = (0..config.voices)
        .map(|_| {
            Box::new(SynthVoice::new(synth_props.clone(), config.sample_rate, config.block_size)) as Box<dyn Voice>
        })
        .collect();
    Instrument::new("synth", props, voices, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice() -> (SynthVoice, Props) {
        let mut props = Props::new();
        let synth_props = SynthProps::register(&mut props);
        (SynthVoice::new(synth_props, 44_100.0, 512), props)
    }

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }

    #[test]
    fn test_note_lifecycle() {
        let (mut voice, props) = voice();
        props.set(PROP_ENV_RELEASE, 0.001).unwrap();

        voice.start(57, 127, 1024);
        assert_eq!(voice.state(), VoiceState::Active);

        let mut buf = [0.0f32; 512];
        voice.render(&mut buf);
        assert!(peak(&buf) > 0.0);
        assert!(peak(&buf) < 0.5);
        assert_eq!(voice.state(), VoiceState::Active);

        voice.render(&mut [0.0f32; 512]);
        assert_eq!(voice.state(), VoiceState::Released);

        voice.render(&mut [0.0f32; 512]);
        assert_eq!(voice.state(), VoiceState::Free);
    }

    #[test]
    fn test_render_is_additive() {
        let (mut voice, props) = voice();
        props.set(PROP_OSC1_WAVE, "off").unwrap();
        props.set(PROP_OSC2_WAVE, "off").unwrap();

        voice.start(60, 127, 44_100);
        let mut buf = [0.5f32; 64];
        voice.render(&mut buf);
        assert!(buf.iter().all(|s| *s == 0.5));
    }

    #[test]
    fn test_same_pitch_cuts_the_voice() {
        let (mut voice, _props) = voice();
        voice.start(60, 127, 44_100);
        voice.render(&mut [0.0f32; 64]);

        voice.notify(61);
        assert_eq!(voice.state(), VoiceState::Active);

        voice.notify(60);
        assert_eq!(voice.state(), VoiceState::Released);

        voice.render(&mut [0.0f32; 128]);
        assert_eq!(voice.state(), VoiceState::Free);
    }

    #[test]
    fn test_props_are_validated() {
        let (_voice, props) = voice();
        assert!(props.set(PROP_ENV_SUSTAIN, 1.5).is_err());
        assert!(props.set(PROP_ENV_ATTACK, 0.0).is_err());
        assert!(props.set(PROP_CUTOFF, 800.0).is_ok());
    }
}
