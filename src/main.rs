// src/main.rs
//
// Offline host: loads samples, runs a command script and renders the
// result to a WAV file, calling the engine block by block the way an audio
// callback would.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;
use ringo::clock::TimeSignature;
use ringo::{AudioBuffer, Engine, EngineConfig, WavLoader, create_engine, sound_name};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tempo in quarter notes per minute
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,

    /// Time signature
    #[arg(long, default_value = "7/8")]
    beat: TimeSignature,

    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    /// Frames per rendered block
    #[arg(long, default_value_t = 512)]
    block_size: usize,

    /// Length of the rendering
    #[arg(long, default_value_t = 8.0)]
    seconds: f64,

    /// Command script to run before rendering, one command per line
    #[arg(long)]
    run: Option<PathBuf>,

    /// Output filename
    #[arg(long, default_value = "ringo.wav")]
    out: PathBuf,

    /// Samples to load, mapped to a, b, c, ...
    samples: Vec<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = EngineConfig {
        sample_rate: args.sample_rate as f64,
        block_size: args.block_size.max(1),
        time_signature: args.beat,
        bpm: args.bpm,
        ..EngineConfig::default()
    };
    let (mut session, mut engine) = create_engine(config, Box::new(WavLoader));

    for path in &args.samples {
        let slot = session.load_sound(path, None)?;
        println!("{}: {}", sound_name(slot), path.display());
    }

    if let Some(script) = &args.run {
        let text = std::fs::read_to_string(script)?;
        for (n, line) in text.lines().enumerate() {
            session
                .exec(line)
                .map_err(|e| format!("{}:{}: {e}", script.display(), n + 1))?;
        }
    }

    render(&mut engine, &args, &args.out)?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn render(engine: &mut Engine, args: &Args, out: &Path) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: args.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(out, spec)?;

    let block_size = args.block_size.max(1);
    let total = (args.seconds.max(0.0) * args.sample_rate as f64) as usize;
    let mut planar = vec![0.0f32; block_size * 2];
    let mut interleaved = Vec::with_capacity(block_size * 2);

    let mut rendered = 0;
    while rendered < total {
        let frames = (total - rendered).min(block_size);
        let mut block = AudioBuffer::new(&mut planar[..frames * 2], 2);
        engine.process(&mut block);

        block.interleave_into(&mut interleaved);
        for sample in &interleaved {
            writer.write_sample(*sample)?;
        }
        rendered += frames;
    }

    writer.finalize()?;
    info!("rendered {rendered} frames");
    Ok(())
}
