// End-to-end: commands on the control side, blocks rendered on the other.

use std::path::{Path, PathBuf};

use ringo::props::Value;
use ringo::{AudioBuffer, Engine, EngineConfig, Error, SampleLoader, Session, Sound, create_engine};

/// Every "file" is a short burst of DC.
struct BurstLoader;

impl SampleLoader for BurstLoader {
    fn load(&self, path: &Path) -> ringo::Result<Sound> {
        Ok(Sound {
            samples: vec![0.5; 2048],
            path: path.to_path_buf(),
        })
    }
}

fn setup() -> (Session, Engine) {
    let config = EngineConfig {
        time_signature: "4/4".parse().unwrap(),
        ..EngineConfig::default()
    };
    create_engine(config, Box::new(BurstLoader))
}

/// Render `seconds` of audio and return its peak.
fn peak(engine: &mut Engine, seconds: f64) -> f32 {
    let block = 512;
    let mut data = vec![0.0f32; block * 2];
    let mut peak = 0.0f32;
    for _ in 0..(seconds * 44_100.0 / block as f64) as usize {
        let mut out = AudioBuffer::new(&mut data, 2);
        engine.process(&mut out);
        peak = peak.max(out.peak());
    }
    peak
}

#[test]
fn test_pattern_plays_loaded_sound() {
    let (mut session, mut engine) = setup();
    session.exec("load kick.wav").unwrap();
    session.exec("a '*").unwrap();

    let steps = session.grid().load().track(0).unwrap().steps.clone();
    assert_eq!(steps, vec![1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]);

    assert!(peak(&mut engine, 1.0) > 0.4);
}

#[test]
fn test_muted_sound_is_silent() {
    let (mut session, mut engine) = setup();
    session.exec("load kick.wav").unwrap();
    session.exec("a '*").unwrap();
    session.exec("mute a").unwrap();

    assert_eq!(peak(&mut engine, 1.0), 0.0);
}

#[test]
fn test_synth_clip_plays() {
    let (mut session, mut engine) = setup();
    session.exec("clip riff 4").unwrap();
    session.exec("note riff 0 57 1").unwrap();
    session.exec("set cutoff 2000").unwrap();

    assert!(peak(&mut engine, 0.5) > 0.0);

    session.exec("unclip riff").unwrap();
    // Let the last note release, then expect silence.
    peak(&mut engine, 1.0);
    assert_eq!(peak(&mut engine, 0.5), 0.0);
}

#[test]
fn test_validation_errors_leave_state_unchanged() {
    let (mut session, _engine) = setup();
    session.exec("load kick.wav").unwrap();

    assert!(matches!(session.exec("bpm 900"), Err(Error::InvalidValue { .. })));
    assert!(matches!(*session.get("bpm").unwrap(), Value::Float(f) if f == 120.0));

    assert!(matches!(session.exec("gain a 12"), Err(Error::Arguments(_))));
    assert!(matches!(session.exec("decay z 1"), Err(Error::InvalidSound(_))));
    assert!(matches!(session.exec("wobble 3"), Err(Error::UnknownCommand(_))));
    assert!(matches!(session.exec("a '*/*/*/*/*"), Err(Error::Pattern(_))));
    assert!(matches!(session.exec("a '2,4 17"), Err(Error::Arguments(_))));

    // The failed line above must not have applied its match expression.
    let grid = session.grid().load();
    assert!(grid.track(0).unwrap().steps.iter().all(|s| *s == 0));
}

#[test]
fn test_beat_resizes_tables() {
    let (mut session, _engine) = setup();
    session.exec("load kick.wav").unwrap();
    session.exec("load snare.wav").unwrap();
    session.exec("b 1 5").unwrap();

    session.exec("beat 7 8").unwrap();
    let grid = session.grid().load();
    assert_eq!(grid.track(1).unwrap().steps, vec![0; 14]);
}

#[test]
fn test_choke_groups() {
    let (mut session, _engine) = setup();
    for file in ["hh-closed.wav", "hh-open.wav", "kick.wav"] {
        session.exec(&format!("load {file}")).unwrap();
    }
    session.exec("choke a b").unwrap();

    let mask = |pitch: i32| match *session.get(&format!("choke.{pitch}")).unwrap() {
        Value::Int(mask) => mask,
        ref other => panic!("unexpected {other}"),
    };
    assert_eq!(mask(60), 0b10);
    assert_eq!(mask(61), 0b01);
    assert_eq!(mask(62), 0);
}

#[test]
fn test_load_into_named_slot_and_delete() {
    let (mut session, _engine) = setup();
    session
        .load_sound(&PathBuf::from("samples/clap.wav"), Some(3))
        .unwrap();
    session.exec("d 1 3").unwrap();
    assert_eq!(session.grid().load().track(3).unwrap().pitch, 63);

    session.exec("delete d").unwrap();
    assert!(session.grid().load().track(3).is_none());
    assert!(matches!(session.exec("d 1"), Err(Error::InvalidSound(_))));
}

#[test]
fn test_preset_and_comments() {
    let (mut session, _engine) = setup();
    session.exec("# a comment").unwrap();
    session.exec("").unwrap();
    session.exec("preset lame-bass").unwrap();
    assert!(matches!(*session.get("cutoff").unwrap(), Value::Float(f) if f == 900.0));
    assert!(matches!(session.exec("preset nope"), Err(Error::NoSuchPreset(_))));
}

#[test]
fn test_sampler_level_scales_output() {
    let (mut session, mut engine) = setup();
    session.exec("load kick.wav").unwrap();
    session.exec("a '*").unwrap();
    assert!(peak(&mut engine, 1.0) > 0.4);

    session.exec("set sampler.level -40").unwrap();
    let quiet = peak(&mut engine, 1.0);
    assert!(quiet > 0.0 && quiet < 0.01, "peak {quiet}");
}

#[test]
fn test_bpm_sets_the_step_rate() {
    // Step 2 lands 0.125 s in at 120 bpm and 0.25 s in at 60 bpm.
    let (mut session, mut engine) = setup();
    session.exec("load samples/kick.wav").unwrap();
    session.exec("a 2").unwrap();
    assert!(peak(&mut engine, 0.2) > 0.4);

    let (mut session, mut engine) = setup();
    session.exec("load samples/kick.wav").unwrap();
    session.exec("a 2").unwrap();
    session.exec("bpm 60").unwrap();
    assert_eq!(peak(&mut engine, 0.2), 0.0);
    assert!(peak(&mut engine, 0.1) > 0.4);
}
