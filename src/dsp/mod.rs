// src/dsp/mod.rs
//
// DSP primitives shared by the voices.

mod envelope;
mod filter;
mod mixer;
mod oscillator;

pub use envelope::*;
pub use filter::*;
pub use mixer::*;
pub use oscillator::*;
