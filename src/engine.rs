// src/engine.rs

use crate::audio_buffer::AudioBuffer;

/// Something that adds audio into the output block.
pub trait Source: Send {
    /// Add `out.frames` frames into `out`. Must not allocate or block.
    fn process(&mut self, out: &mut AudioBuffer);
}

/// Something that advances with the sample clock and may emit events.
pub trait Ticker: Send {
    /// Called once per block, before any source renders it.
    fn tick(&mut self, frames: usize);
}

/// Render entry point, owned by the audio thread.
///
/// `process` never allocates or locks once setup is done. Musical timing
/// lives in the tickers; the engine only orders them.
#[derive(Default)]
pub struct Engine {
    /// Clocks and sequencers, ticked in registration order
    tickers: Vec<Box<dyn Ticker>>,

    /// Instruments, summed into the output
    sources: Vec<Box<dyn Source>>,

    /// Frames rendered so far
    sample_pos: u64,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Setup only: registers a ticker.
    pub fn add_ticker(&mut self, ticker: Box<dyn Ticker>) {
        self.tickers.push(ticker);
    }

    /// Setup only: registers a source.
    pub fn add_source(&mut self, source: Box<dyn Source>) {
        self.sources.push(source);
    }

    /// Render one block.
    ///
    /// Called once per audio block from the audio callback. The output is
    /// cleared, every ticker runs for the block (so events it emits are
    /// already queued), then every source adds its output.
    pub fn process(&mut self, out: &mut AudioBuffer) {
        out.clear();

        for ticker in self.tickers.iter_mut() {
            ticker.tick(out.frames);
        }

        for source in self.sources.iter_mut() {
            source.process(out);
        }

        self.sample_pos += out.frames as u64;
    }

    pub fn sample_position(&self) -> u64 {
        self.sample_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTicker(Arc<AtomicUsize>);

    impl Ticker for CountingTicker {
        fn tick(&mut self, frames: usize) {
            self.0.fetch_add(frames, Ordering::SeqCst);
        }
    }

    struct Dc(f32);

    impl Source for Dc {
        fn process(&mut self, out: &mut AudioBuffer) {
            for channel in out.channels_mut() {
                for sample in channel {
                    *sample += self.0;
                }
            }
        }
    }

    #[test]
    fn test_block_is_cleared_then_summed() {
        let ticked = Arc::new(AtomicUsize::new(0));
        let mut engine = Engine::new();
        engine.add_ticker(Box::new(CountingTicker(ticked.clone())));
        engine.add_source(Box::new(Dc(0.25)));
        engine.add_source(Box::new(Dc(0.5)));

        let mut data = [9.0f32; 16];
        let mut out = AudioBuffer::new(&mut data, 2);
        engine.process(&mut out);

        assert!(data.iter().all(|s| *s == 0.75));
        assert_eq!(ticked.load(Ordering::SeqCst), 8);
        assert_eq!(engine.sample_position(), 8);
    }
}
